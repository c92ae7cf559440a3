//! Texts sent to chats. All of them use Telegram's HTML markup.

use reqwest::Url;
use crate::entry::EntryRecord;
use crate::error::AppError;
use crate::extractor::escape_html;
use crate::telegram::{Update, MAX_MESSAGE_CHARS};

/// Announcement of a new entry, sent to every user.
pub fn entry_notification(entry: &EntryRecord, news_url: &Url) -> String {
    format!(
        "❗️Обновление в <a href=\"{news}\">ЛК Директора</a>❗️\n\
         <b>{date}</b> {title}\n\
         💾 <a href=\"{doc}\">Посмотреть/скачать документ(ы)</a>",
        news = escape_html(news_url.as_str()),
        date = entry.entry_date,
        title = entry.entry_title,
        doc = document_link(entry, news_url),
    )
}

/// Resolves a site-relative document link; the stored value is escaped, so
/// it is unescaped for resolution and escaped again for the markup.
fn document_link(entry: &EntryRecord, base: &Url) -> String {
    let raw = unescape_html(&entry.entry_doc);
    match base.join(&raw) {
        Ok(url) => escape_html(url.as_str()),
        Err(_) => entry.entry_doc.clone(),
    }
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Reply to the start command.
pub fn start_reply(chat_id: i64) -> String {
    format!(
        "Ваш <b>chat_id = {chat_id}</b>. Для получения уведомлений передайте его администратору бота.\n\n\
         <b>❗️ВНИМАНИЕ❗️</b>\n\
         Бот находится в разработке и предоставляется как есть. \
         Бот ни при каких условиях не может являться основным источником уведомлений! \
         Администратор не несёт ответственности за скорость, качество и точность уведомлений, \
         а также за несвоевременно просмотренные сообщения в личном кабинете!"
    )
}

/// Budget for the offending update in an error report.
const UPDATE_REPORT_CHARS: usize = 1500;

/// Failure report for administrators. Each `<pre>` block is cut to fit the
/// message limit before it is closed, so the markup always stays balanced.
pub fn error_report(context: &str, err: &AppError, update: Option<&Update>) -> String {
    let mut text = format!("An exception was raised while {}\n\n", escape_html(context));

    if let Some(update) = update {
        let json = serde_json::to_string_pretty(update).unwrap_or_default();
        let budget = UPDATE_REPORT_CHARS.min(remaining(&text));
        text.push_str(&pre_block(&format!("update = {}", json), budget));
        text.push_str("\n\n");
    }

    let detail = format!("{}: {}", err.kind(), err);
    let budget = remaining(&text);
    text.push_str(&pre_block(&detail, budget));
    text
}

fn remaining(text: &str) -> usize {
    MAX_MESSAGE_CHARS.saturating_sub(text.chars().count())
}

/// `<pre>`-wrapped, escaped text no longer than `max_chars` in total.
fn pre_block(raw: &str, max_chars: usize) -> String {
    const OPEN: &str = "<pre>";
    const CLOSE: &str = "</pre>";
    let inner = max_chars.saturating_sub(OPEN.len() + CLOSE.len());
    format!("{}{}{}", OPEN, escape_truncated(raw, inner), CLOSE)
}

/// Escapes `raw`, stopping before an escaped piece would exceed `max_chars`.
/// Entities are never split; a cut is marked with an ellipsis.
fn escape_truncated(raw: &str, max_chars: usize) -> String {
    let escaped = escape_html(raw);
    if escaped.chars().count() <= max_chars {
        return escaped;
    }

    let limit = max_chars.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    let mut buf = [0u8; 4];
    for ch in raw.chars() {
        let piece = escape_html(ch.encode_utf8(&mut buf));
        let len = piece.chars().count();
        if used + len > limit {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    if max_chars > 0 {
        out.push('…');
    }
    out
}

// Rendering through `mail-builder`
//
// The builder writes complete messages; parts and header values are cut back
// out of its output so they can be placed into an existing tree.

use chrono::{DateTime, Utc};
use mail_builder::headers::address::Address;
use mail_builder::headers::content_type::ContentType;
use mail_builder::headers::text::Text;
use mail_builder::headers::Header;
use mail_builder::mime::MimePart;
use mail_builder::MessageBuilder;

use super::MailMessage;
use crate::error::{MailError, MailResult};

/// Headers the builder adds to every message it writes.
const BUILDER_HEADERS: [&str; 3] = ["Message-ID", "Date", "MIME-Version"];

pub(crate) fn build_error(error: std::io::Error) -> MailError {
    MailError::Build(error.to_string())
}

pub(crate) fn content_type(essence: &str) -> ContentType<'static> {
    ContentType::new(essence.to_string())
}

/// Writes `part` as a message and parses it back without the message-level
/// headers the builder adds.
pub(crate) fn render_part(part: MimePart<'_>) -> MailResult<MailMessage> {
    let bytes = MessageBuilder::new().body(part).write_to_vec().map_err(build_error)?;
    let mut message = MailMessage::parse(&bytes)?;
    for name in BUILDER_HEADERS {
        message.headers.remove(name);
    }
    Ok(message)
}

/// Value of a `name:` field as the builder would write it, without the
/// final line break.
fn render_value(name: &str, value: &impl Header) -> MailResult<String> {
    let mut out = Vec::new();
    value.write_header(&mut out, name.len() + 2).map_err(build_error)?;
    let text = String::from_utf8(out).map_err(|e| MailError::Build(e.to_string()))?;
    Ok(text.trim().to_string())
}

/// RFC 2047 encoded `text` for the `name` field. ASCII text stays readable.
///
/// # Errors
///
/// [`MailError::Build`] when the value cannot be written.
pub fn encode_text(name: &str, text: &str) -> MailResult<String> {
    render_value(name, &Text::new(text.to_string()))
}

/// A single mailbox for the `name` field, the display name encoded when it
/// is not ASCII.
///
/// # Errors
///
/// [`MailError::Build`] when the value cannot be written.
pub fn encode_mailbox(name: &str, display: Option<&str>, address: &str) -> MailResult<String> {
    let mailbox = Address::new_address(display.map(str::to_string), address.to_string());
    render_value(name, &mailbox)
}

/// Normalizes every line break to CRLF.
pub fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 40);
    let mut previous = '\0';
    for c in text.chars() {
        if c == '\n' && previous != '\r' {
            out.push('\r');
        }
        out.push(c);
        previous = c;
    }
    out
}

/// RFC 5322 date-time.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc2822()
}

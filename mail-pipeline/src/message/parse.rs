// Conversion of `mail-parser` output into the message tree
//
// mail-parser decodes while parsing; the tree keeps the undecoded text, so
// every field and leaf body is cut out of the input by the parser's offsets.

use mail_parser::{Encoding, Header, Message, MessagePart, PartType};

use super::{Body, HeaderField, Headers, MailMessage, Multipart};
use crate::error::{MailError, MailResult};

fn slice(raw: &[u8], start: usize, end: usize) -> &[u8] {
    raw.get(start..end.max(start)).unwrap_or_default()
}

/// Name as written and everything after the colon, minus the line break.
fn field(raw: &[u8], header: &Header<'_>) -> HeaderField {
    let name = slice(raw, header.offset_field, header.offset_start.saturating_sub(1));
    let value = slice(raw, header.offset_start, header.offset_end);
    HeaderField::from_raw(
        String::from_utf8_lossy(name).trim_end().to_string(),
        String::from_utf8_lossy(value).trim_end_matches(['\r', '\n']).to_string(),
    )
}

/// Builds the tree below `part`. Nested `message/rfc822` parts stay leaves.
fn convert(raw: &[u8], parts: &[MessagePart<'_>], part: &MessagePart<'_>) -> MailMessage {
    let headers = Headers::from(part.headers.iter().map(|header| field(raw, header)).collect::<Vec<_>>());
    let body = match &part.body {
        PartType::Multipart(ids) => {
            let boundary = headers
                .get("Content-Type")
                .and_then(|value| super::ContentType::parse(&value).boundary().map(str::to_string))
                .unwrap_or_default();
            Body::Multipart(Multipart {
                boundary,
                parts: ids
                    .iter()
                    .filter_map(|id| parts.get(*id))
                    .map(|child| convert(raw, parts, child))
                    .collect(),
            })
        }
        _ => Body::Single(slice(raw, part.offset_body, part.offset_end).to_vec()),
    };
    MailMessage { headers, body }
}

pub(crate) fn parse_message(bytes: &[u8]) -> MailResult<MailMessage> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(MailError::Empty);
    }
    let message = Message::parse(bytes).ok_or(MailError::Empty)?;
    let root = message.parts.first().ok_or(MailError::Empty)?;
    if root.headers.is_empty() {
        let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        return Err(MailError::MalformedHeader(
            String::from_utf8_lossy(first_line).trim_end().to_string(),
        ));
    }
    Ok(convert(bytes, &message.parts, root))
}

/// Body of a standalone single part with the transfer encoding removed.
/// Text parts come back as UTF-8 whatever their charset.
pub(crate) fn decode_single(bytes: &[u8]) -> MailResult<Vec<u8>> {
    let message = Message::parse(bytes).ok_or(MailError::Empty)?;
    let part = message
        .parts
        .first()
        .ok_or_else(|| MailError::MissingPart("body".to_string()))?;
    if part.is_encoding_problem {
        let encoding = match part.encoding {
            Encoding::Base64 => "base64",
            Encoding::QuotedPrintable => "quoted-printable",
            Encoding::None => "message",
        };
        return Err(MailError::InvalidEncoding {
            encoding: encoding.to_string(),
            reason: "body does not decode".to_string(),
        });
    }
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => Ok(text.as_bytes().to_vec()),
        PartType::Binary(data) | PartType::InlineBinary(data) => Ok(data.to_vec()),
        // an unencoded nested message shares the raw input; an encoded one
        // carries its decoded bytes
        PartType::Message(nested) => match part.encoding {
            Encoding::None => Ok(slice(bytes, part.offset_body, part.offset_end).to_vec()),
            Encoding::Base64 | Encoding::QuotedPrintable => Ok(nested.raw_message.to_vec()),
        },
        PartType::Multipart(_) => Err(MailError::MissingPart("single part body".to_string())),
    }
}

//! RFC 5322 / MIME message model
//!
//! [`MailMessage`] is used both for complete messages and for body parts.
//! Parsing goes through `mail-parser`; header fields keep their raw (folded)
//! value and bodies keep their transfer-encoded bytes, so a parsed message
//! writes back unchanged apart from multipart preambles and epilogues, which
//! are dropped. New content is rendered with `mail-builder`.

mod build;
mod parse;

pub use build::{encode_mailbox, encode_text, format_date, to_crlf};

use std::fmt;

use mail_builder::mime::MimePart;
use uuid::Uuid;

use crate::error::MailResult;

pub const CRLF: &str = "\r\n";

// ============================================================================
// HEADERS
// ============================================================================

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    /// Everything after the colon, folding line breaks included
    raw_value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: &str) -> Self {
        Self {
            name: name.into(),
            raw_value: format!(" {value}"),
        }
    }

    pub(crate) fn from_raw(name: String, raw_value: String) -> Self {
        Self { name, raw_value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// Unfolded, trimmed value.
    pub fn value(&self) -> String {
        let mut unfolded = String::with_capacity(self.raw_value.len());
        for line in self.raw_value.split('\n') {
            unfolded.push_str(line.strip_suffix('\r').unwrap_or(line));
        }
        unfolded.trim().to_string()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header multimap with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.fields.iter().find(|f| f.is(name)).map(HeaderField::value)
    }

    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.fields.iter().filter(|f| f.is(name)).map(HeaderField::value).collect()
    }

    pub fn fields(&self, name: &str) -> impl Iterator<Item = &HeaderField> {
        let name = name.to_string();
        self.fields.iter().filter(move |f| f.is(&name))
    }

    pub fn count(&self, name: &str) -> usize {
        self.fields.iter().filter(|f| f.is(name)).count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is(name))
    }

    /// Replaces the first field named `name` in place and drops the others,
    /// or appends when absent.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_field(HeaderField::new(name, value));
    }

    /// Like [`Headers::set`], RFC 2047 encoding non-ASCII text.
    ///
    /// # Errors
    ///
    /// See [`encode_text`].
    pub fn set_text(&mut self, name: &str, value: &str) -> MailResult<()> {
        let encoded = encode_text(name, value)?;
        self.set(name, &encoded);
        Ok(())
    }

    pub fn set_field(&mut self, field: HeaderField) {
        let name = field.name.clone();
        let mut replacement = Some(field);
        self.fields = std::mem::take(&mut self.fields)
            .into_iter()
            .filter_map(|f| if f.is(&name) { replacement.take() } else { Some(f) })
            .collect();
        if let Some(field) = replacement {
            self.fields.push(field);
        }
    }

    pub fn add(&mut self, name: &str, value: &str) {
        self.fields.push(HeaderField::new(name, value));
    }

    pub fn add_field(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    /// Removes every field named `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| !f.is(name));
        before - self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            out.extend_from_slice(field.name.as_bytes());
            out.push(b':');
            out.extend_from_slice(field.raw_value.as_bytes());
            out.extend_from_slice(CRLF.as_bytes());
        }
    }
}

impl From<Vec<HeaderField>> for Headers {
    fn from(fields: Vec<HeaderField>) -> Self {
        Self { fields }
    }
}

// ============================================================================
// STRUCTURED HEADER VALUES
// ============================================================================

/// Splits `value; a=b; c="d"` into the leading token and its parameters.
fn split_parameters(value: &str) -> (String, Vec<(String, String)>) {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    let mut iter = segments.into_iter();
    let head = iter.next().unwrap_or_default().trim().to_ascii_lowercase();
    let params = iter
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            Some((
                name.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();
    (head, params)
}

/// Parsed `Content-Type`; absent or unparseable values mean `text/plain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<mime::Mime>() {
            Ok(parsed) => Self {
                essence: parsed.essence_str().to_ascii_lowercase(),
                params: parsed
                    .params()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_ascii_lowercase(),
                            value.as_str().trim_matches('"').to_string(),
                        )
                    })
                    .collect(),
            },
            Err(_) => {
                let (essence, params) = split_parameters(value);
                if essence.contains('/') {
                    Self { essence, params }
                } else {
                    Self::text_plain()
                }
            }
        }
    }

    pub fn text_plain() -> Self {
        Self {
            essence: mime::TEXT_PLAIN.essence_str().to_string(),
            params: Vec::new(),
        }
    }

    /// Lowercased `type/subtype`.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn main_type(&self) -> &str {
        self.essence.split('/').next().unwrap_or_default()
    }

    pub fn sub_type(&self) -> &str {
        self.essence.split('/').nth(1).unwrap_or_default()
    }

    pub fn is(&self, essence: &str) -> bool {
        self.essence.eq_ignore_ascii_case(essence)
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == mime::MULTIPART.as_str()
    }

    pub fn is_text(&self) -> bool {
        self.main_type() == mime::TEXT.as_str()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param(mime::BOUNDARY.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.param(mime::CHARSET.as_str())
    }
}

/// Parsed `Content-Disposition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    kind: String,
    params: Vec<(String, String)>,
}

impl Disposition {
    pub fn parse(value: &str) -> Self {
        let (kind, params) = split_parameters(value);
        Self { kind, params }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    pub fn filename(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == "filename")
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Other(String),
}

impl TransferEncoding {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "binary" => TransferEncoding::Binary,
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            other => TransferEncoding::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Other(name) => name,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BODY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub boundary: String,
    pub parts: Vec<MailMessage>,
}

impl Multipart {
    pub fn new(parts: Vec<MailMessage>) -> Self {
        Self {
            boundary: format!("----=_Part_{}", Uuid::new_v4().simple()),
            parts,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                out.extend_from_slice(CRLF.as_bytes());
            }
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(CRLF.as_bytes());
            part.write_to(out);
        }
        if !self.parts.is_empty() {
            out.extend_from_slice(CRLF.as_bytes());
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--");
        out.extend_from_slice(CRLF.as_bytes());
    }
}

/// Message body: transfer-encoded bytes or nested parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Single(Vec<u8>),
    Multipart(Multipart),
}

impl Default for Body {
    fn default() -> Self {
        Body::Single(Vec::new())
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    pub headers: Headers,
    pub body: Body,
}

impl MailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a complete message.
    ///
    /// # Errors
    ///
    /// [`MailError::Empty`](crate::error::MailError::Empty) for blank input
    /// and [`MailError::MalformedHeader`](crate::error::MailError::MalformedHeader)
    /// when the input does not start with a header field.
    pub fn parse(bytes: &[u8]) -> MailResult<Self> {
        parse::parse_message(bytes)
    }

    /// Single-part message with the given headers and transfer-encoded body.
    pub fn single(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Single(body),
        }
    }

    /// A `multipart/{subtype}` part holding `parts`.
    pub fn multipart(subtype: &str, parts: Vec<MailMessage>) -> Self {
        let multipart = Multipart::new(parts);
        let mut headers = Headers::new();
        headers.set(
            "Content-Type",
            &format!("multipart/{subtype}; boundary=\"{}\"", multipart.boundary),
        );
        Self {
            headers,
            body: Body::Multipart(multipart),
        }
    }

    /// Body part rendered from a `mail-builder` part.
    ///
    /// # Errors
    ///
    /// [`MailError::Build`](crate::error::MailError::Build) when the part
    /// cannot be written.
    pub fn from_part(part: MimePart<'_>) -> MailResult<Self> {
        build::render_part(part)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.headers.write_to(out);
        out.extend_from_slice(CRLF.as_bytes());
        match &self.body {
            Body::Single(bytes) => out.extend_from_slice(bytes),
            Body::Multipart(multipart) => multipart.write_to(out),
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("Content-Type")
            .map_or_else(ContentType::text_plain, |value| ContentType::parse(&value))
    }

    pub fn is_mime_type(&self, essence: &str) -> bool {
        self.content_type().is(essence)
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.headers.get("Content-Disposition").map(|value| Disposition::parse(&value))
    }

    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("Content-Transfer-Encoding")
            .map_or(TransferEncoding::SevenBit, |value| TransferEncoding::parse(&value))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    pub fn parts(&self) -> &[MailMessage] {
        match &self.body {
            Body::Multipart(multipart) => &multipart.parts,
            Body::Single(_) => &[],
        }
    }

    pub fn parts_mut(&mut self) -> Option<&mut Vec<MailMessage>> {
        match &mut self.body {
            Body::Multipart(multipart) => Some(&mut multipart.parts),
            Body::Single(_) => None,
        }
    }

    /// Transfer-encoded body bytes of a single part.
    pub fn raw_body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Single(bytes) => Some(bytes),
            Body::Multipart(_) => None,
        }
    }

    /// Body bytes with the Content-Transfer-Encoding removed. Text parts are
    /// converted to UTF-8; a `message/rfc822` part yields the embedded
    /// message.
    ///
    /// # Errors
    ///
    /// Fails for multipart bodies and undecodable content.
    pub fn decoded_body(&self) -> MailResult<Vec<u8>> {
        let raw = self
            .raw_body()
            .ok_or_else(|| crate::error::MailError::MissingPart("single part body".to_string()))?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        parse::decode_single(&self.to_bytes())
    }

    /// Decoded body as text.
    ///
    /// # Errors
    ///
    /// See [`MailMessage::decoded_body`].
    pub fn text(&self) -> MailResult<String> {
        let bytes = self.decoded_body()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Takes over the content headers and body of a rendered part; other
    /// headers, a Content-Disposition absent from `content` included, stay.
    pub fn adopt(&mut self, content: MailMessage) {
        if !content.headers.contains("Content-Transfer-Encoding") {
            self.headers.remove("Content-Transfer-Encoding");
        }
        for field in content.headers.iter() {
            self.headers.set_field(field.clone());
        }
        self.body = content.body;
    }

    /// Replaces the body with `text` as `text/{subtype}` in UTF-8.
    ///
    /// # Errors
    ///
    /// See [`MailMessage::from_part`].
    pub fn set_text(&mut self, text: &str, subtype: &str) -> MailResult<()> {
        let content_type = build::content_type(&format!("text/{subtype}")).attribute("charset", "utf-8");
        let rendered = build::render_part(MimePart::new(content_type, to_crlf(text)))?;
        self.adopt(rendered);
        Ok(())
    }

    /// Replaces the body with `bytes`, transfer encoded by `mail-builder`.
    ///
    /// # Errors
    ///
    /// See [`MailMessage::from_part`].
    pub fn set_binary(&mut self, content_type: &str, bytes: &[u8]) -> MailResult<()> {
        let rendered = build::render_part(MimePart::new(build::content_type(content_type), bytes.to_vec()))?;
        self.adopt(rendered);
        Ok(())
    }

    /// Depth-first visit of this part and every nested part, stopping at the
    /// first error.
    ///
    /// # Errors
    ///
    /// The first error returned by `visit`.
    pub fn try_for_each_part_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut MailMessage) -> Result<(), E>,
    ) -> Result<(), E> {
        visit(self)?;
        if let Some(parts) = self.parts_mut() {
            for part in parts {
                part.try_for_each_part_mut(visit)?;
            }
        }
        Ok(())
    }

    /// First part, depth-first and including `self`, matching `predicate`.
    pub fn find_part_mut(&mut self, predicate: &impl Fn(&MailMessage) -> bool) -> Option<&mut MailMessage> {
        if predicate(self) {
            return Some(self);
        }
        match &mut self.body {
            Body::Multipart(multipart) => multipart
                .parts
                .iter_mut()
                .find_map(|part| part.find_part_mut(predicate)),
            Body::Single(_) => None,
        }
    }
}

use std::collections::BTreeSet;
use std::fmt;

use mail_parser::{Addr, HeaderValue, Message};

use crate::error::MailResult;
use crate::message::{encode_mailbox, Headers};

/// Address headers compared between the envelope and the signed message.
pub const ADDRESS_HEADERS: [&str; 6] = ["From", "Sender", "Reply-To", "To", "Cc", "Bcc"];

pub const RECIPIENT_HEADERS: [&str; 3] = ["To", "Cc", "Bcc"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Lowercased address used for every comparison.
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }

    /// Value for the `name` header, the display name quoted or RFC 2047
    /// encoded as needed.
    ///
    /// # Errors
    ///
    /// See [`encode_mailbox`].
    pub fn to_header_value(&self, name: &str) -> MailResult<String> {
        encode_mailbox(name, self.display_name(), &self.address)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name() {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

fn push_addr(addr: &Addr<'_>, out: &mut Vec<Mailbox>) {
    let Some(address) = addr.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
        return;
    };
    out.push(Mailbox {
        name: addr.name.as_deref().map(ToString::to_string),
        address: address.to_string(),
    });
}

/// Parses an address-list header value; groups are flattened and entries
/// without an address are dropped.
pub fn parse_mailboxes(value: &str) -> Vec<Mailbox> {
    let raw = format!("To: {value}\r\n\r\n");
    let Some(message) = Message::parse(raw.as_bytes()) else {
        return Vec::new();
    };
    let mut mailboxes = Vec::new();
    match message.to() {
        HeaderValue::Address(addr) => push_addr(addr, &mut mailboxes),
        HeaderValue::AddressList(list) => list.iter().for_each(|addr| push_addr(addr, &mut mailboxes)),
        HeaderValue::Group(group) => group.addresses.iter().for_each(|addr| push_addr(addr, &mut mailboxes)),
        HeaderValue::GroupList(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .for_each(|addr| push_addr(addr, &mut mailboxes)),
        _ => {}
    }
    mailboxes
}

/// Mailboxes of every field named `name`, in header order.
pub fn mailboxes(headers: &Headers, name: &str) -> Vec<Mailbox> {
    headers
        .get_all(name)
        .iter()
        .flat_map(|value| parse_mailboxes(value))
        .collect()
}

/// All To, Cc and Bcc mailboxes.
pub fn recipients(headers: &Headers) -> Vec<Mailbox> {
    RECIPIENT_HEADERS
        .iter()
        .flat_map(|name| mailboxes(headers, name))
        .collect()
}

/// Lowercased address set of a header.
pub fn address_set(headers: &Headers, name: &str) -> BTreeSet<String> {
    mailboxes(headers, name).iter().map(Mailbox::key).collect()
}

/// `true` when both headers carry the same address set. Two absent
/// headers match; an absent and a present one do not, even when the present
/// one holds no address.
pub fn header_matches(left: &Headers, right: &Headers, name: &str) -> bool {
    left.contains(name) == right.contains(name) && address_set(left, name) == address_set(right, name)
}

/// Address headers whose sets differ between `left` and `right`.
pub fn mismatched_headers(left: &Headers, right: &Headers) -> Vec<&'static str> {
    ADDRESS_HEADERS
        .iter()
        .copied()
        .filter(|name| !header_matches(left, right, name))
        .collect()
}

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::codes::ErrorCode;

/// Ordered, duplicate-free list of error codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeList {
    codes: Vec<ErrorCode>,
}

impl CodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a code unless it is already present. Returns `true` when added.
    pub fn add(&mut self, code: ErrorCode) -> bool {
        if self.codes.contains(&code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    pub fn contains(&self, code: ErrorCode) -> bool {
        self.codes.contains(&code)
    }

    pub fn codes(&self) -> &[ErrorCode] {
        &self.codes
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorCode> {
        self.codes.iter()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl From<Vec<ErrorCode>> for CodeList {
    fn from(codes: Vec<ErrorCode>) -> Self {
        let mut list = Self::new();
        for code in codes {
            list.add(code);
        }
        list
    }
}

/// Per-address code lists with sender/recipient classification.
///
/// Addresses are keyed lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressErrors {
    address_errors: BTreeMap<String, CodeList>,
    senders: Vec<String>,
    recipients: Vec<String>,
}

impl AddressErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, address: &str, code: ErrorCode, sender: bool) -> bool {
        let key = address.to_lowercase();
        let role = if sender { &mut self.senders } else { &mut self.recipients };
        if !role.contains(&key) {
            role.push(key.clone());
        }
        self.address_errors.entry(key).or_default().add(code)
    }

    pub fn is_error(&self, address: &str) -> bool {
        self.address_errors
            .get(&address.to_lowercase())
            .is_some_and(|codes| !codes.is_empty())
    }

    pub fn codes_for(&self, address: &str) -> &[ErrorCode] {
        self.address_errors
            .get(&address.to_lowercase())
            .map_or(&[], CodeList::codes)
    }

    pub fn senders(&self) -> &[String] {
        &self.senders
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn first_sender(&self) -> Option<&str> {
        self.senders.first().map(String::as_str)
    }

    /// Codes of all given addresses, deduplicated in first-seen order.
    pub fn codes_of<'a>(&self, addresses: impl IntoIterator<Item = &'a String>) -> CodeList {
        let mut merged = CodeList::new();
        for address in addresses {
            for code in self.codes_for(address) {
                merged.add(*code);
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.address_errors.values().all(CodeList::is_empty)
    }
}

/// Exactly one code per failed RCPT TO address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RcptToErrors {
    address_errors: BTreeMap<String, ErrorCode>,
    recipients: Vec<String>,
}

impl RcptToErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the code for an address. The first code recorded wins.
    pub fn add(&mut self, address: &str, code: ErrorCode) -> bool {
        let key = address.to_lowercase();
        if self.address_errors.contains_key(&key) {
            return false;
        }
        self.recipients.push(key.clone());
        self.address_errors.insert(key, code);
        true
    }

    pub fn is_error(&self, address: &str) -> bool {
        self.address_errors.contains_key(&address.to_lowercase())
    }

    pub fn code_for(&self, address: &str) -> Option<ErrorCode> {
        self.address_errors.get(&address.to_lowercase()).copied()
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn codes(&self) -> CodeList {
        let mut merged = CodeList::new();
        for address in &self.recipients {
            if let Some(code) = self.address_errors.get(address) {
                merged.add(*code);
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.address_errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorContextKind {
    SignEncrypt,
    Decrypt,
    SignVerify,
    EncryptFormat,
    AddressCert,
    AddressVersion,
    RcptTo,
}

impl ErrorContextKind {
    pub const ALL: [ErrorContextKind; 7] = [
        ErrorContextKind::SignEncrypt,
        ErrorContextKind::Decrypt,
        ErrorContextKind::SignVerify,
        ErrorContextKind::EncryptFormat,
        ErrorContextKind::AddressCert,
        ErrorContextKind::AddressVersion,
        ErrorContextKind::RcptTo,
    ];

    pub fn is_address_scoped(self) -> bool {
        matches!(
            self,
            ErrorContextKind::AddressCert | ErrorContextKind::AddressVersion | ErrorContextKind::RcptTo
        )
    }
}

impl fmt::Display for ErrorContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorContextKind::SignEncrypt => "sign_encrypt",
            ErrorContextKind::Decrypt => "decrypt",
            ErrorContextKind::SignVerify => "sign_verify",
            ErrorContextKind::EncryptFormat => "encrypt_format",
            ErrorContextKind::AddressCert => "address_cert",
            ErrorContextKind::AddressVersion => "address_version",
            ErrorContextKind::RcptTo => "rcpt_to",
        };
        f.write_str(name)
    }
}

/// Error context of one concern, carrying its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorContext {
    SignEncrypt(CodeList),
    Decrypt(CodeList),
    SignVerify(CodeList),
    EncryptFormat(CodeList),
    AddressCert(AddressErrors),
    AddressVersion(AddressErrors),
    RcptTo(RcptToErrors),
}

impl ErrorContext {
    pub fn kind(&self) -> ErrorContextKind {
        match self {
            ErrorContext::SignEncrypt(_) => ErrorContextKind::SignEncrypt,
            ErrorContext::Decrypt(_) => ErrorContextKind::Decrypt,
            ErrorContext::SignVerify(_) => ErrorContextKind::SignVerify,
            ErrorContext::EncryptFormat(_) => ErrorContextKind::EncryptFormat,
            ErrorContext::AddressCert(_) => ErrorContextKind::AddressCert,
            ErrorContext::AddressVersion(_) => ErrorContextKind::AddressVersion,
            ErrorContext::RcptTo(_) => ErrorContextKind::RcptTo,
        }
    }

    /// All codes of the context, deduplicated in first-seen order.
    pub fn codes(&self) -> CodeList {
        match self {
            ErrorContext::SignEncrypt(list)
            | ErrorContext::Decrypt(list)
            | ErrorContext::SignVerify(list)
            | ErrorContext::EncryptFormat(list) => list.clone(),
            ErrorContext::AddressCert(errors) | ErrorContext::AddressVersion(errors) => {
                errors.codes_of(errors.senders().iter().chain(errors.recipients()))
            }
            ErrorContext::RcptTo(errors) => errors.codes(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ErrorContext::SignEncrypt(list)
            | ErrorContext::Decrypt(list)
            | ErrorContext::SignVerify(list)
            | ErrorContext::EncryptFormat(list) => list.is_empty(),
            ErrorContext::AddressCert(errors) | ErrorContext::AddressVersion(errors) => errors.is_empty(),
            ErrorContext::RcptTo(errors) => errors.is_empty(),
        }
    }
}

/// Per-transaction bag holding one context per concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorContexts {
    pub sign_encrypt: CodeList,
    pub decrypt: CodeList,
    pub sign_verify: CodeList,
    pub encrypt_format: CodeList,
    pub address_cert: AddressErrors,
    pub address_version: AddressErrors,
    pub rcpt_to: RcptToErrors,
}

impl ErrorContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a code to a code-list context. Idempotent per context.
    ///
    /// Address-scoped kinds need an address and are rejected with `false`.
    pub fn accumulate(&mut self, kind: ErrorContextKind, code: ErrorCode) -> bool {
        if kind.is_address_scoped() {
            tracing::warn!(context = %kind, code = code.id(), "address-scoped context needs an address");
            return false;
        }
        match kind {
            ErrorContextKind::SignEncrypt => self.sign_encrypt.add(code),
            ErrorContextKind::Decrypt => self.decrypt.add(code),
            ErrorContextKind::SignVerify => self.sign_verify.add(code),
            ErrorContextKind::EncryptFormat => self.encrypt_format.add(code),
            ErrorContextKind::AddressCert | ErrorContextKind::AddressVersion | ErrorContextKind::RcptTo => false,
        }
    }

    /// Snapshot of a single context.
    pub fn context(&self, kind: ErrorContextKind) -> ErrorContext {
        match kind {
            ErrorContextKind::SignEncrypt => ErrorContext::SignEncrypt(self.sign_encrypt.clone()),
            ErrorContextKind::Decrypt => ErrorContext::Decrypt(self.decrypt.clone()),
            ErrorContextKind::SignVerify => ErrorContext::SignVerify(self.sign_verify.clone()),
            ErrorContextKind::EncryptFormat => ErrorContext::EncryptFormat(self.encrypt_format.clone()),
            ErrorContextKind::AddressCert => ErrorContext::AddressCert(self.address_cert.clone()),
            ErrorContextKind::AddressVersion => ErrorContext::AddressVersion(self.address_version.clone()),
            ErrorContextKind::RcptTo => ErrorContext::RcptTo(self.rcpt_to.clone()),
        }
    }

    /// Non-empty contexts in declaration order.
    pub fn non_empty(&self) -> Vec<ErrorContext> {
        ErrorContextKind::ALL
            .iter()
            .map(|kind| self.context(*kind))
            .filter(|context| !context.is_empty())
            .collect()
    }

    /// `true` when any address-scoped context holds an error for the
    /// address; such recipients are removed before encryption.
    pub fn is_address_ineligible(&self, address: &str) -> bool {
        self.address_cert.is_error(address) || self.address_version.is_error(address) || self.rcpt_to.is_error(address)
    }

    pub fn is_empty(&self) -> bool {
        ErrorContextKind::ALL
            .iter()
            .all(|kind| self.context(*kind).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::*;
    use proptest::prelude::*;

    #[test]
    fn test_accumulate_is_idempotent() {
        let mut contexts = ErrorContexts::new();
        assert!(contexts.accumulate(ErrorContextKind::SignEncrypt, CODE_X009));
        assert!(!contexts.accumulate(ErrorContextKind::SignEncrypt, CODE_X009));
        assert!(contexts.accumulate(ErrorContextKind::Decrypt, CODE_X009));
        assert_eq!(contexts.sign_encrypt.codes(), &[CODE_X009]);
        assert_eq!(contexts.decrypt.codes(), &[CODE_X009]);
    }

    #[test]
    fn test_address_scoped_kinds_rejected_without_address() {
        let mut contexts = ErrorContexts::new();
        assert!(!contexts.accumulate(ErrorContextKind::AddressCert, CODE_X005));
        assert!(contexts.is_empty());
    }

    #[test]
    fn test_address_errors_are_case_insensitive() {
        let mut errors = AddressErrors::new();
        errors.add("Arzt@Praxis.KIM.telematik", CODE_X005, false);
        assert!(errors.is_error("arzt@praxis.kim.telematik"));
        assert_eq!(errors.recipients(), &["arzt@praxis.kim.telematik".to_string()]);
        assert!(errors.senders().is_empty());
        assert!(!errors.is_error("other@praxis.kim.telematik"));
    }

    #[test]
    fn test_address_errors_classify_senders() {
        let mut errors = AddressErrors::new();
        errors.add("sender@a.kim.telematik", CODE_X006, true);
        errors.add("sender@a.kim.telematik", CODE_X007, true);
        errors.add("rcpt@b.kim.telematik", CODE_X005, false);
        assert_eq!(errors.first_sender(), Some("sender@a.kim.telematik"));
        assert_eq!(errors.codes_for("sender@a.kim.telematik"), &[CODE_X006, CODE_X007]);

        let context = ErrorContext::AddressCert(errors);
        assert_eq!(context.codes().codes(), &[CODE_X006, CODE_X007, CODE_X005]);
    }

    #[test]
    fn test_rcpt_to_keeps_first_code() {
        let mut errors = RcptToErrors::new();
        assert!(errors.add("a@b.de", CODE_X024));
        assert!(!errors.add("A@B.de", CODE_4001));
        assert_eq!(errors.code_for("a@b.de"), Some(CODE_X024));
        assert_eq!(errors.recipients().len(), 1);
    }

    #[test]
    fn test_non_empty_contexts_in_order() {
        let mut contexts = ErrorContexts::new();
        contexts.accumulate(ErrorContextKind::EncryptFormat, CODE_X019);
        contexts.address_version.add("x@y.de", CODE_4001, false);
        contexts.accumulate(ErrorContextKind::SignEncrypt, CODE_X013);

        let kinds: Vec<_> = contexts.non_empty().iter().map(ErrorContext::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorContextKind::SignEncrypt,
                ErrorContextKind::EncryptFormat,
                ErrorContextKind::AddressVersion
            ]
        );
        assert!(contexts.is_address_ineligible("X@Y.de"));
    }

    #[test]
    fn test_rcpt_to_error_makes_address_ineligible() {
        let mut contexts = ErrorContexts::new();
        assert!(!contexts.is_address_ineligible("labor@kim.telematik"));
        contexts.rcpt_to.add("Labor@KIM.telematik", CODE_X024);
        assert!(contexts.is_address_ineligible("labor@kim.telematik"));
        assert!(!contexts.is_address_ineligible("apotheke@kim.telematik"));
    }

    proptest! {
        #[test]
        fn prop_code_list_never_holds_duplicates(indices in proptest::collection::vec(0usize..ALL.len(), 0..64)) {
            let mut list = CodeList::new();
            for index in &indices {
                if let Some(code) = ALL.get(*index) {
                    list.add(*code);
                }
            }
            let mut seen = std::collections::HashSet::new();
            for code in list.iter() {
                prop_assert!(seen.insert(code.id()));
            }
        }
    }
}

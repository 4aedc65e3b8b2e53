use error_common::{ErrorCode, ErrorContextKind, ErrorContexts};
use logger_redacted::TransactionLog;

/// State of one mail transaction: the mailbox user, their retention setting,
/// the accumulated error contexts and the transaction log.
///
/// Owned by the protocol handler and lent to each pipeline run.
#[derive(Debug, Clone)]
pub struct MailTransaction {
    pub user_address: String,
    /// Account specific retention, overriding the configured default
    pub retention_days: Option<u32>,
    pub errors: ErrorContexts,
    pub log: TransactionLog,
}

impl MailTransaction {
    pub fn new(user_address: impl Into<String>) -> Self {
        Self {
            user_address: user_address.into(),
            retention_days: None,
            errors: ErrorContexts::new(),
            log: TransactionLog::new(),
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = Some(days);
        self
    }

    pub fn id(&self) -> &str {
        self.log.id()
    }

    /// Records `code` in a code-list context and logs it once.
    pub fn record(&mut self, kind: ErrorContextKind, code: ErrorCode) {
        if self.errors.accumulate(kind, code) {
            self.log.warn(&format!("{kind}: {code}"));
        }
    }

    pub fn record_all(&mut self, kind: ErrorContextKind, codes: &[ErrorCode]) {
        for code in codes {
            self.record(kind, *code);
        }
    }

    /// Records a certificate problem for a sender or recipient address.
    pub fn record_address_cert(&mut self, address: &str, code: ErrorCode, sender: bool) {
        if self.errors.address_cert.add(address, code, sender) {
            self.log.warn(&format!("{}: {address}: {code}", ErrorContextKind::AddressCert));
        }
    }

    /// Records a KOM-LE version problem for a sender or recipient address.
    pub fn record_address_version(&mut self, address: &str, code: ErrorCode, sender: bool) {
        if self.errors.address_version.add(address, code, sender) {
            self.log
                .warn(&format!("{}: {address}: {code}", ErrorContextKind::AddressVersion));
        }
    }

    pub fn record_rcpt_to(&mut self, address: &str, code: ErrorCode) {
        if self.errors.rcpt_to.add(address, code) {
            self.log.warn(&format!("{}: {address}: {code}", ErrorContextKind::RcptTo));
        }
    }
}

// Delivery status notifications (RFC 3464) and the decrypt failure notice
//
// Both messages carry one KIM header per error code; the header value is the
// code id, the body lists `id - text`.

use chrono::Utc;
use config_engine::GatewayConfig;
use error_common::{AddressErrors, CodeList, ErrorCode, ErrorContext};
use mail_builder::headers::content_type::ContentType;
use mail_builder::headers::raw::Raw;
use mail_builder::mime::MimePart;
use mail_builder::MessageBuilder;
use uuid::Uuid;

use crate::address::{mailboxes, recipients, Mailbox, ADDRESS_HEADERS};
use crate::error::{MailError, MailResult};
use crate::constants::{X_KIM_CM_VERSION, X_KIM_DECRYPTION_RESULT, X_KIM_FEHLERMELDUNG, X_KIM_INTEGRITY_CHECK_RESULT};
use crate::message::{format_date, to_crlf, Headers, MailMessage, CRLF};

pub const SIGN_ENCRYPT_TEXT: &str = "Es sind Fehler beim Signieren und Verschlüsseln der Mail aufgetreten.";
pub const SIGN_VERIFY_TEXT: &str = "Es sind Fehler beim Verifizieren der Mail-Signatur aufgetreten.";
pub const DECRYPT_TEXT: &str = "Beim Entschlüsseln ist ein Fehler aufgetreten. Die Gründe werden aufgeführt.";
pub const ALL_RECIPIENTS_FAILED_TEXT: &str =
    "Die Mail konnte nicht versandt werden. Für alle Empfänger wurden beim Versand Probleme festgestellt:";
pub const SOME_RECIPIENTS_FAILED_TEXT: &str =
    "Die Mail konnte versandt werden. Für einige Empfänger wurden beim Versand Probleme festgestellt:";

const DSN_SUBJECT_PREFIX: &str = "Unzustellbar";

/// Addressing of generated notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsnSettings {
    /// `From` of the notification; `postmaster@` the origin domain when unset.
    pub sender: Option<String>,
    /// Notified address; the origin sender when unset.
    pub notify: Option<String>,
    pub reporting_mta: String,
    pub cm_version: String,
}

impl DsnSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            sender: config.dsn.sender.clone(),
            notify: None,
            reporting_mta: config.dsn.reporting_mta.clone().unwrap_or_else(local_host_name),
            cm_version: config.cm_version.clone(),
        }
    }

    pub fn with_notify(mut self, address: impl Into<String>) -> Self {
        self.notify = Some(address.into());
        self
    }
}

fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Body text, KIM header and failed recipients of one error context.
struct Notice {
    text: String,
    header: &'static str,
    codes: CodeList,
    failed: Vec<String>,
}

fn code_lines(codes: &CodeList) -> String {
    codes.iter().map(ErrorCode::dsn_line).collect()
}

fn origin_recipients(origin: &MailMessage) -> Vec<String> {
    recipients(&origin.headers).iter().map(Mailbox::key).collect()
}

fn address_notice(origin: &MailMessage, errors: &AddressErrors, sender_context: bool) -> Notice {
    if sender_context {
        let sender = errors.first_sender().unwrap_or_default().to_string();
        let codes = errors.codes_of(errors.senders().iter().take(1));
        let text = format!(
            "Die Mail konnte nicht versandt werden. Für den Sender {sender} wurden beim Versand Probleme festgestellt.\r\n{}",
            code_lines(&codes)
        );
        return Notice {
            text,
            header: X_KIM_FEHLERMELDUNG,
            codes,
            failed: origin_recipients(origin),
        };
    }
    let failed = errors.recipients().to_vec();
    let codes = errors.codes_of(errors.recipients());
    recipient_notice(origin, failed, codes)
}

fn recipient_notice(origin: &MailMessage, failed: Vec<String>, codes: CodeList) -> Notice {
    let all_failed = origin_recipients(origin).iter().all(|address| failed.contains(address));
    let lead = if all_failed {
        ALL_RECIPIENTS_FAILED_TEXT
    } else {
        SOME_RECIPIENTS_FAILED_TEXT
    };
    let text = format!("{lead}\r\n{}\r\n{}", failed.join(","), code_lines(&codes));
    Notice {
        text,
        header: X_KIM_FEHLERMELDUNG,
        codes,
        failed,
    }
}

fn notice(origin: &MailMessage, context: &ErrorContext, sender_context: bool) -> Notice {
    let list_notice = |lead: &str, header: &'static str, codes: &CodeList| Notice {
        text: format!("{lead}\r\n{}", code_lines(codes)),
        header,
        codes: codes.clone(),
        failed: origin_recipients(origin),
    };
    match context {
        ErrorContext::SignEncrypt(codes) | ErrorContext::EncryptFormat(codes) => {
            list_notice(SIGN_ENCRYPT_TEXT, X_KIM_FEHLERMELDUNG, codes)
        }
        ErrorContext::SignVerify(codes) => list_notice(SIGN_VERIFY_TEXT, X_KIM_INTEGRITY_CHECK_RESULT, codes),
        ErrorContext::Decrypt(codes) => list_notice(DECRYPT_TEXT, X_KIM_DECRYPTION_RESULT, codes),
        ErrorContext::AddressCert(errors) | ErrorContext::AddressVersion(errors) => {
            address_notice(origin, errors, sender_context)
        }
        ErrorContext::RcptTo(errors) => recipient_notice(origin, errors.recipients().to_vec(), errors.codes()),
    }
}

fn delivery_status(origin: &MailMessage, settings: &DsnSettings, failed: &[String]) -> String {
    let arrival = origin
        .headers
        .get("Date")
        .unwrap_or_else(|| format_date(Utc::now()));
    let mut status = format!("Reporting-MTA: dns; {}{CRLF}Arrival-Date: {arrival}{CRLF}", settings.reporting_mta);
    for address in failed {
        status.push_str(&format!(
            "{CRLF}Final-Recipient: rfc822; {address}{CRLF}Action: failed{CRLF}Status: 5.0.0{CRLF}"
        ));
    }
    status
}

fn original_headers(origin: &MailMessage) -> String {
    let mut block = Vec::new();
    origin.headers.write_to(&mut block);
    String::from_utf8_lossy(&block).into_owned()
}

/// Delivery status notification for one error context, sent back to the
/// origin sender.
///
/// `sender_context` selects the sender variant of the address contexts.
///
/// # Errors
///
/// [`MailError::Build`](crate::error::MailError::Build) when the
/// notification cannot be written.
pub fn render_dsn(
    origin: &MailMessage,
    context: &ErrorContext,
    sender_context: bool,
    settings: &DsnSettings,
) -> MailResult<MailMessage> {
    let notice = notice(origin, context, sender_context);

    let origin_sender = mailboxes(&origin.headers, "From").into_iter().next();
    let notify = settings
        .notify
        .clone()
        .or_else(|| origin_sender.as_ref().map(|mailbox| mailbox.address.clone()));
    let from = settings.sender.clone().unwrap_or_else(|| {
        let domain = notify
            .as_deref()
            .and_then(|address| address.rsplit_once('@'))
            .map_or(settings.reporting_mta.as_str(), |(_, domain)| domain);
        format!("postmaster@{domain}")
    });
    let subject = format!(
        "{DSN_SUBJECT_PREFIX}: {}",
        origin.headers.get("Subject").unwrap_or_default()
    );
    let message_id = format!("{}@{}", Uuid::new_v4().simple(), settings.reporting_mta);

    let report = MimePart::new(
        ContentType::new("multipart/report").attribute("report-type", "delivery-status"),
        vec![
            MimePart::new(
                ContentType::new("text/plain").attribute("charset", "utf-8"),
                to_crlf(&notice.text),
            ),
            MimePart::new("message/delivery-status", delivery_status(origin, settings, &notice.failed)),
            MimePart::new("text/rfc822-headers", original_headers(origin)),
        ],
    );

    let mut builder = MessageBuilder::new()
        .from(from.as_str())
        .subject(subject.as_str())
        .message_id(message_id.as_str())
        .header("Auto-Submitted", Raw::new("auto-replied"))
        .header(X_KIM_CM_VERSION, Raw::new(settings.cm_version.as_str()));
    if let Some(notify) = &notify {
        builder = builder.to(notify.as_str());
    }
    for code in notice.codes.iter() {
        builder = builder.header(notice.header, Raw::new(code.id()));
    }
    let bytes = builder.body(report).write_to_vec().map_err(|e| MailError::Build(e.to_string()))?;
    MailMessage::parse(&bytes)
}

/// Replacement delivered instead of a mail that could not be decrypted: the
/// reasons as text plus the untouched original as `message/rfc822`.
///
/// # Errors
///
/// [`MailError::Build`](crate::error::MailError::Build) when a part cannot
/// be written.
pub fn render_decrypt_failure(origin: &MailMessage, codes: &[ErrorCode]) -> MailResult<MailMessage> {
    let reasons: String = codes.iter().map(|code| format!("{}\n", code.text())).collect();
    let text = MailMessage::from_part(MimePart::new(
        ContentType::new("text/plain").attribute("charset", "utf-8"),
        to_crlf(&reasons),
    ))?;

    let mut embedded_headers = Headers::new();
    embedded_headers.set("Content-Type", "message/rfc822");
    let embedded = MailMessage::single(embedded_headers, origin.to_bytes());

    let mut notice = MailMessage::multipart("mixed", vec![text, embedded]);
    let content_type = notice.headers.get("Content-Type").unwrap_or_default();

    let mut headers = Headers::new();
    for name in ["Date"].into_iter().chain(ADDRESS_HEADERS) {
        for field in origin.headers.fields(name) {
            headers.add_field(field.clone());
        }
    }
    headers.set_text("Subject", DECRYPT_TEXT)?;
    for code in codes {
        headers.add(X_KIM_DECRYPTION_RESULT, code.id());
    }
    headers.set("MIME-Version", "1.0");
    headers.set("Content-Type", &content_type);
    notice.headers = headers;
    Ok(notice)
}

/// CRLF normalized body text of a rendered notice, for logs and tests.
pub fn notice_text(message: &MailMessage) -> Option<String> {
    message.parts().first().and_then(|part| part.text().ok()).map(|text| to_crlf(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_common::codes::{CODE_4008, CODE_4115, CODE_X005, CODE_X009, CODE_X011, CODE_X024};
    use error_common::{ErrorContextKind, ErrorContexts};

    fn origin() -> MailMessage {
        let raw = "From: Praxis <praxis@kim.telematik>\r\n\
                   To: a@kim.telematik, b@kim.telematik\r\n\
                   Subject: Befund\r\n\
                   Date: Fri, 15 Mar 2024 08:30:00 +0000\r\n\r\nHallo";
        MailMessage::parse(raw.as_bytes()).unwrap()
    }

    fn settings() -> DsnSettings {
        DsnSettings {
            sender: None,
            notify: None,
            reporting_mta: "gateway.kim.telematik".to_string(),
            cm_version: "1.5.1".to_string(),
        }
    }

    fn address(message: &MailMessage, name: &str) -> Option<String> {
        mailboxes(&message.headers, name).into_iter().next().map(|mailbox| mailbox.address)
    }

    #[test]
    fn test_sign_encrypt_dsn() {
        let mut errors = ErrorContexts::new();
        errors.accumulate(ErrorContextKind::SignEncrypt, CODE_X009);
        errors.accumulate(ErrorContextKind::SignEncrypt, CODE_X011);
        let dsn = render_dsn(&origin(), &errors.context(ErrorContextKind::SignEncrypt), false, &settings()).unwrap();

        assert!(dsn.content_type().is("multipart/report"));
        assert_eq!(dsn.content_type().param("report-type"), Some("delivery-status"));
        assert_eq!(address(&dsn, "To").as_deref(), Some("praxis@kim.telematik"));
        assert_eq!(address(&dsn, "From").as_deref(), Some("postmaster@kim.telematik"));
        assert_eq!(dsn.headers.get("Auto-Submitted").as_deref(), Some("auto-replied"));
        assert_eq!(dsn.headers.get(X_KIM_CM_VERSION).as_deref(), Some("1.5.1"));
        assert!(dsn
            .headers
            .get("Message-ID")
            .is_some_and(|id| id.ends_with("@gateway.kim.telematik>")));
        assert_eq!(dsn.headers.get_all(X_KIM_FEHLERMELDUNG), vec!["X009", "X011"]);

        let text = notice_text(&dsn).unwrap();
        assert!(text.starts_with("Es sind Fehler beim Signieren und Verschlüsseln der Mail aufgetreten.\r\n"));
        assert!(text.contains(&CODE_X009.dsn_line()));
        assert!(text.contains(&CODE_X011.dsn_line()));

        assert!(dsn.parts()[1].is_mime_type("message/delivery-status"));
        let status = dsn.parts()[1].text().unwrap();
        assert!(status.contains("Reporting-MTA: dns; gateway.kim.telematik"));
        assert!(status.contains("Final-Recipient: rfc822; a@kim.telematik\r\nAction: failed\r\nStatus: 5.0.0"));
        assert!(status.contains("Final-Recipient: rfc822; b@kim.telematik"));
        assert!(dsn.parts()[2].is_mime_type("text/rfc822-headers"));
        assert!(dsn.parts()[2].text().unwrap().contains("Subject: Befund"));

        let bytes = dsn.to_bytes();
        let parsed = mail_parser::Message::parse(&bytes).unwrap();
        assert_eq!(parsed.subject(), Some("Unzustellbar: Befund"));
    }

    #[test]
    fn test_recipient_dsn_some_and_all() {
        let mut errors = ErrorContexts::new();
        errors.address_cert.add("a@kim.telematik", CODE_X005, false);
        let context = errors.context(ErrorContextKind::AddressCert);
        let text = notice_text(&render_dsn(&origin(), &context, false, &settings()).unwrap()).unwrap();
        assert!(text.starts_with(SOME_RECIPIENTS_FAILED_TEXT));
        assert!(text.contains("\r\na@kim.telematik\r\n"));

        errors.address_cert.add("b@kim.telematik", CODE_X005, false);
        let context = errors.context(ErrorContextKind::AddressCert);
        let dsn = render_dsn(&origin(), &context, false, &settings()).unwrap();
        let text = notice_text(&dsn).unwrap();
        assert!(text.starts_with(ALL_RECIPIENTS_FAILED_TEXT));
        assert!(text.contains("\r\na@kim.telematik,b@kim.telematik\r\n"));
        // codes are deduplicated
        assert_eq!(text.matches("X005 - ").count(), 1);
        assert_eq!(dsn.headers.get_all(X_KIM_FEHLERMELDUNG), vec!["X005"]);
    }

    #[test]
    fn test_sender_dsn() {
        let mut errors = ErrorContexts::new();
        errors.address_version.add("praxis@kim.telematik", CODE_4008, true);
        let context = errors.context(ErrorContextKind::AddressVersion);
        let text = notice_text(&render_dsn(&origin(), &context, true, &settings()).unwrap()).unwrap();
        assert!(text.starts_with(
            "Die Mail konnte nicht versandt werden. Für den Sender praxis@kim.telematik wurden beim Versand Probleme festgestellt.\r\n"
        ));
        assert!(text.contains(&CODE_4008.dsn_line()));
    }

    #[test]
    fn test_rcpt_to_and_sign_verify_headers() {
        let mut errors = ErrorContexts::new();
        errors.rcpt_to.add("b@kim.telematik", CODE_X024);
        errors.accumulate(ErrorContextKind::SignVerify, CODE_4115);

        let dsn = render_dsn(&origin(), &errors.context(ErrorContextKind::RcptTo), false, &settings()).unwrap();
        assert_eq!(dsn.headers.get_all(X_KIM_FEHLERMELDUNG), vec!["X024"]);

        let settings = settings().with_notify("empfang@kim.telematik");
        let dsn = render_dsn(&origin(), &errors.context(ErrorContextKind::SignVerify), false, &settings).unwrap();
        assert_eq!(address(&dsn, "To").as_deref(), Some("empfang@kim.telematik"));
        assert_eq!(dsn.headers.get_all(X_KIM_INTEGRITY_CHECK_RESULT), vec!["4115"]);
        assert!(notice_text(&dsn).unwrap().starts_with(SIGN_VERIFY_TEXT));
    }

    #[test]
    fn test_decrypt_failure_notice() {
        let origin = origin();
        let notice = render_decrypt_failure(&origin, &[CODE_X009, CODE_4115]).unwrap();

        assert!(notice.is_mime_type("multipart/mixed"));
        assert_eq!(notice.headers.get("From"), origin.headers.get("From"));
        assert_eq!(notice.headers.get("Date"), origin.headers.get("Date"));
        assert_eq!(notice.headers.get_all(X_KIM_DECRYPTION_RESULT), vec!["X009", "4115"]);
        assert!(notice.headers.get("Subject").unwrap().is_ascii());
        let bytes = notice.to_bytes();
        let parsed = mail_parser::Message::parse(&bytes).unwrap();
        assert_eq!(parsed.subject(), Some(DECRYPT_TEXT));

        let text = notice.parts()[0].text().unwrap();
        assert!(text.contains(CODE_4115.text()));
        let embedded = &notice.parts()[1];
        assert!(embedded.is_mime_type("message/rfc822"));
        assert_eq!(embedded.raw_body().unwrap(), origin.to_bytes().as_slice());
        assert_eq!(embedded.decoded_body().unwrap(), origin.to_bytes());
    }
}

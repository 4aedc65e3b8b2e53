// Sender and recipient check of an outgoing mail before it is signed
//
// From must name exactly the sending account. Reply-To pointing elsewhere is
// dropped. To, Cc and Bcc keep only addresses that have an encryption
// certificate and no recorded address error.

use crypto::RecipientCertificate;
use error_common::codes::CODE_X020;
use error_common::{ErrorContextKind, GatewayError};
use logger_redacted::redacted_warn;

use crate::address::{mailboxes, recipients, Mailbox, RECIPIENT_HEADERS};
use crate::error::{PipelineError, PipelineResult};
use crate::message::MailMessage;
use crate::transaction::MailTransaction;

/// Checks and rewrites the address headers of `message` for the account in
/// `tx.user_address`.
///
/// All problems are collected before failing; the first one is returned
/// after X020 has been recorded in the EncryptFormat context.
///
/// # Errors
///
/// [`GatewayError::Format`] when From is missing or names more than one
/// mailbox, [`GatewayError::AddressEligibility`] when From is another
/// account or no recipient is left.
pub fn check_sending_mail(
    tx: &mut MailTransaction,
    message: &mut MailMessage,
    recipient_certs: &[RecipientCertificate],
) -> PipelineResult<()> {
    let sender = tx.user_address.to_lowercase();
    let mut failure = None;

    let from = mailboxes(&message.headers, "From");
    match from.len() {
        0 => failure = Some(GatewayError::Format(format!("no From header for {sender}"))),
        1 => {}
        count => {
            failure = Some(GatewayError::Format(format!("{count} From addresses for {sender}")));
        }
    }
    if let Some(first) = from.first().filter(|mailbox| mailbox.key() != sender) {
        message.headers.remove("From");
        failure.get_or_insert(GatewayError::AddressEligibility {
            address: first.key(),
            reason: format!("From does not match the sending account {sender}"),
        });
    }

    if let Some(reply_to) = mailboxes(&message.headers, "Reply-To")
        .first()
        .filter(|mailbox| mailbox.key() != sender)
    {
        redacted_warn!(transaction = tx.id(); "removing Reply-To {}", reply_to.address);
        message.headers.remove("Reply-To");
    }

    for name in RECIPIENT_HEADERS {
        keep_deliverable(tx, message, name, recipient_certs)?;
    }
    if recipients(&message.headers).is_empty() {
        failure.get_or_insert(GatewayError::AddressEligibility {
            address: sender,
            reason: "no recipient left after filtering".to_string(),
        });
    }

    match failure {
        None => Ok(()),
        Some(error) => {
            tx.record(ErrorContextKind::EncryptFormat, CODE_X020);
            tx.log.error(&error.to_string());
            Err(PipelineError::Gateway(error))
        }
    }
}

/// Rewrites header `name` with the recipients that can receive the mail,
/// removing it when none is left.
fn keep_deliverable(
    tx: &MailTransaction,
    message: &mut MailMessage,
    name: &str,
    recipient_certs: &[RecipientCertificate],
) -> PipelineResult<()> {
    if !message.headers.contains(name) {
        return Ok(());
    }
    let all = mailboxes(&message.headers, name);
    let kept: Vec<&Mailbox> = all
        .iter()
        .filter(|mailbox| {
            let key = mailbox.key();
            let deliverable = !tx.errors.is_address_ineligible(&key)
                && recipient_certs.iter().any(|cert| cert.mail_address().eq_ignore_ascii_case(&key));
            if !deliverable {
                redacted_warn!(header = name; "removing {} from {}", mailbox.address, name);
            }
            deliverable
        })
        .collect();
    if kept.len() == all.len() {
        return Ok(());
    }
    if kept.is_empty() {
        message.headers.remove(name);
        return Ok(());
    }
    let values = kept
        .iter()
        .map(|mailbox| mailbox.to_header_value(name))
        .collect::<Result<Vec<_>, _>>()?;
    message.headers.set(name, &values.join(", "));
    Ok(())
}

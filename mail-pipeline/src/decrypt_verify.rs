use std::sync::Arc;

use config_engine::{GatewayConfig, KomLeVersion};
use crypto::extract_signed_content;
use device_manager::{CardHandle, TokenDevice};
use error_common::codes::{
    CODE_4008, CODE_4009, CODE_4010, CODE_4011, CODE_4115, CODE_4253, CODE_X001, CODE_X014, CODE_X021, CODE_X022,
    CODE_X023,
};
use error_common::{log_error, ErrorCode, ErrorContextKind, GatewayError};
use logger_redacted::redacted_warn;
use mail_builder::headers::content_type::ContentType;
use mail_builder::mime::MimePart;
use tracing::{debug, info, warn};

use crate::address::mismatched_headers;
use crate::constants::{REPORT_FILENAME, SIGNATURE_BANNER, X_KOM_LE_VERSION};
use crate::error::{MailResult, PipelineError, PipelineResult};
use crate::message::{Headers, MailMessage};
use crate::report::{ReportArtifact, SignReportRenderer, PDF_CONTENT_TYPE};
use crate::selector::select_decryption_card;
use crate::transaction::MailTransaction;
use crate::validator::{validate, ValidationMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Not a KIM mail; delivered as received.
    PassedThrough(Vec<u8>),
    /// Decrypted inner message. `integrity_ok` is `false` when the signed
    /// addressing headers differ from the outer ones.
    Decrypted { message: Vec<u8>, integrity_ok: bool },
}

impl DecryptOutcome {
    pub fn bytes(&self) -> &[u8] {
        match self {
            DecryptOutcome::PassedThrough(bytes) => bytes,
            DecryptOutcome::Decrypted { message, .. } => message,
        }
    }
}

const STAGE: &str = "decrypt verify mail";

/// Content headers moved to the body part when a message is wrapped.
const CONTENT_HEADERS: [&str; 5] = [
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-Disposition",
    "Content-ID",
    "Content-Description",
];

/// Decrypts an incoming KIM mail, verifies its signature and restores the
/// original message with the verification report attached.
pub struct DecryptVerifyExtractor {
    device: Arc<dyn TokenDevice>,
    renderer: Arc<dyn SignReportRenderer>,
    config: Arc<GatewayConfig>,
}

impl DecryptVerifyExtractor {
    pub fn new(device: Arc<dyn TokenDevice>, renderer: Arc<dyn SignReportRenderer>, config: Arc<GatewayConfig>) -> Self {
        Self {
            device,
            renderer,
            config,
        }
    }

    /// # Errors
    ///
    /// Every failing step records its codes (Decrypt context, SignVerify for
    /// the signature check) and returns a [`GatewayError`]. A header mismatch
    /// is not an error; it is reported through `integrity_ok`.
    pub async fn extract(&self, tx: &mut MailTransaction, encrypted: &[u8]) -> PipelineResult<DecryptOutcome> {
        tx.log.enter(STAGE);
        let result = self.run(tx, encrypted).await;
        if let Err(PipelineError::Gateway(error)) = &result {
            log_error(STAGE, error);
        }
        tx.log.leave(STAGE);
        result
    }

    async fn run(&self, tx: &mut MailTransaction, encrypted: &[u8]) -> PipelineResult<DecryptOutcome> {
        let outer = MailMessage::parse(encrypted).map_err(|e| {
            fail(tx, ErrorContextKind::Decrypt, &[CODE_4010], GatewayError::Format(format!("mail unparseable: {e}")))
        })?;

        let Some(value) = outer.headers.get(X_KOM_LE_VERSION) else {
            info!(transaction = tx.id(), "No KOM-LE version header, passing mail through");
            return Ok(DecryptOutcome::PassedThrough(encrypted.to_vec()));
        };
        self.check_version(tx, &value)?;

        let validation = validate(tx, &outer, ValidationMode::Decrypt);
        let (Some(envelope), Some(cms)) = (validation.envelope, validation.encrypted_bytes) else {
            return Err(fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_4010],
                GatewayError::Format("invalid KIM envelope".to_string()),
            ));
        };

        let targets = match envelope.targets_for(&tx.user_address) {
            Ok(targets) if !targets.is_empty() => targets,
            Ok(_) => {
                let error = GatewayError::CardNotFound(format!("no recipient entry for {}", tx.user_address));
                return Err(fail(tx, ErrorContextKind::Decrypt, &[CODE_X022], error));
            }
            Err(e) => {
                let error = GatewayError::Format(format!("recipient-emails attribute: {e}"));
                return Err(fail(tx, ErrorContextKind::Decrypt, &[CODE_X022], error));
            }
        };
        debug!(targets = targets.len(), "Resolved decryption targets");

        let cards = self.device.list_cards().await.map_err(|e| {
            fail(tx, ErrorContextKind::Decrypt, &[CODE_4011], GatewayError::DeviceCall(format!("listing cards: {e}")))
        })?;
        let card = select_decryption_card(self.device.as_ref(), &cards, &targets)
            .await
            .map_err(|e| {
                fail(tx, ErrorContextKind::Decrypt, &[CODE_4009, CODE_X021], GatewayError::CardNotFound(e.to_string()))
            })?;

        let decrypted = self.decrypt(tx, &card, &cms).await?;
        let signed = signed_data(tx, &decrypted)?;
        let content = extract_signed_content(&signed).map_err(|e| {
            fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_X023, CODE_4253],
                GatewayError::Format(format!("signed content: {e}")),
            )
        })?;

        let report = self.verify(tx, &signed).await?;

        let mut inner = MailMessage::parse(strip_preamble(&content)).map_err(|e| {
            fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_X023, CODE_4253],
                GatewayError::Format(format!("inner message: {e}")),
            )
        })?;

        let mismatched = mismatched_headers(&inner.headers, &outer.headers);
        let integrity_ok = mismatched.is_empty();
        if !integrity_ok {
            tx.record(ErrorContextKind::SignVerify, CODE_X001);
            redacted_warn!(transaction = tx.id(); "signed headers differ from envelope: {}", mismatched.join(", "));
        }

        copy_transport_headers(&outer.headers, &mut inner.headers);
        append_banner(&mut inner)
            .and_then(|()| attach_report(&mut inner, &report))
            .map_err(|e| {
                fail(
                    tx,
                    ErrorContextKind::Decrypt,
                    &[CODE_4011],
                    GatewayError::Format(format!("restoring decrypted mail: {e}")),
                )
            })?;

        tx.log.info("mail decrypted and verified");
        Ok(DecryptOutcome::Decrypted {
            message: inner.to_bytes(),
            integrity_ok,
        })
    }

    fn check_version(&self, tx: &mut MailTransaction, value: &str) -> PipelineResult<()> {
        let version: KomLeVersion = value.parse().map_err(|_| {
            fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_X014, CODE_4008],
                GatewayError::Version(format!("unsupported KOM-LE version {value}")),
            )
        })?;
        if !self.config.komle_version.supports(version) {
            let error = GatewayError::Version(format!(
                "mail version {version} is newer than local version {}",
                self.config.komle_version
            ));
            return Err(fail(tx, ErrorContextKind::Decrypt, &[CODE_4008], error));
        }
        Ok(())
    }

    async fn decrypt(&self, tx: &mut MailTransaction, card: &CardHandle, cms: &[u8]) -> PipelineResult<Vec<u8>> {
        tx.log.info(&format!("decrypting with card {card}"));
        let response = self.device.decrypt(card, cms).await.map_err(|e| {
            fail(tx, ErrorContextKind::Decrypt, &[CODE_4011], GatewayError::DeviceCall(format!("decrypt: {e}")))
        })?;
        if !response.status.is_ok() {
            let error = GatewayError::DeviceCall(format!("decrypt response: {}", response.status));
            return Err(fail(tx, ErrorContextKind::Decrypt, &[CODE_4011], error));
        }
        match response.document {
            Some(document) if !document.is_empty() => Ok(document),
            _ => Err(fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_4011],
                GatewayError::DeviceCall("empty decrypt response document".to_string()),
            )),
        }
    }

    async fn verify(&self, tx: &mut MailTransaction, signed: &[u8]) -> PipelineResult<ReportArtifact> {
        let response = self.device.verify(signed).await.map_err(|e| {
            fail(tx, ErrorContextKind::SignVerify, &[CODE_4011], GatewayError::DeviceCall(format!("verify: {e}")))
        })?;
        if !response.status.is_ok() {
            let error = GatewayError::Integrity(format!("verify response: {}", response.status));
            return Err(fail(tx, ErrorContextKind::SignVerify, &[CODE_4115, CODE_4011], error));
        }
        let Some(report) = response.report else {
            let error = GatewayError::Integrity("verification without report".to_string());
            return Err(fail(tx, ErrorContextKind::SignVerify, &[CODE_4253, CODE_4011], error));
        };
        info!(result = %report.high_level_result, "Signature verified");

        self.renderer.render(&report).map_err(|e| {
            fail(tx, ErrorContextKind::SignVerify, &[CODE_4011], GatewayError::Format(e.to_string()))
        })
    }
}

fn fail(tx: &mut MailTransaction, kind: ErrorContextKind, codes: &[ErrorCode], error: GatewayError) -> PipelineError {
    tx.record_all(kind, codes);
    tx.log.error(&error.to_string());
    PipelineError::Gateway(error)
}

/// SignedData bytes carried by the decrypted MIME part.
fn signed_data(tx: &mut MailTransaction, decrypted: &[u8]) -> PipelineResult<Vec<u8>> {
    MailMessage::parse(decrypted)
        .map_err(|e| e.to_string())
        .and_then(|part| part.decoded_body().map_err(|e| e.to_string()))
        .and_then(|body| {
            if body.is_empty() {
                Err("empty signed part".to_string())
            } else {
                Ok(body)
            }
        })
        .map_err(|reason| {
            fail(
                tx,
                ErrorContextKind::Decrypt,
                &[CODE_X023, CODE_4253],
                GatewayError::Format(format!("decrypted part: {reason}")),
            )
        })
}

/// Drops the `Content-Type: message/rfc822` wrapper added before signing.
fn strip_preamble(content: &[u8]) -> &[u8] {
    const WRAPPER: &[u8] = b"content-type: message/rfc822";
    let starts_with_wrapper = content
        .get(..WRAPPER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(WRAPPER));
    if !starts_with_wrapper {
        return content;
    }
    [&b"\r\n\r\n"[..], b"\n\n"]
        .iter()
        .filter_map(|separator| {
            content
                .windows(separator.len())
                .position(|window| window == *separator)
                .map(|position| position + separator.len())
        })
        .min()
        .and_then(|start| content.get(start..))
        .unwrap_or(content)
}

fn copy_transport_headers(outer: &Headers, inner: &mut Headers) {
    if let Some(return_path) = outer.fields("Return-Path").next() {
        inner.set_field(return_path.clone());
    }
    for received in outer.fields("Received") {
        inner.add_field(received.clone());
    }
    if let Some(reply_to) = outer.fields("Reply-To").next() {
        inner.set_field(reply_to.clone());
    }
}

fn append_banner(message: &mut MailMessage) -> MailResult<()> {
    message.try_for_each_part_mut(&mut |part| {
        let content_type = part.content_type();
        if part.is_multipart() || !content_type.is_text() {
            return Ok(());
        }
        let text = match part.text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Text part undecodable, no banner added");
                return Ok(());
            }
        };
        let subtype = content_type.sub_type().to_string();
        let updated = if subtype.eq_ignore_ascii_case("html") {
            let banner = SIGNATURE_BANNER.replace('\n', "<br>");
            let split = text
                .to_ascii_lowercase()
                .rfind("</body>")
                .and_then(|position| Some((text.get(..position)?, text.get(position..)?)));
            match split {
                Some((head, tail)) => format!("{head}{banner}{tail}"),
                None => format!("{text}<br>{banner}"),
            }
        } else {
            format!("{text}\n{SIGNATURE_BANNER}")
        };
        part.set_text(&updated, &subtype)
    })
}

fn report_part(report: &ReportArtifact) -> MailResult<MailMessage> {
    MailMessage::from_part(
        MimePart::new(
            ContentType::new(PDF_CONTENT_TYPE).attribute("name", REPORT_FILENAME),
            report.bytes.clone(),
        )
        .attachment(REPORT_FILENAME),
    )
}

/// Adds the report to the first multipart/mixed, wrapping the body in a new
/// one when there is none.
fn attach_report(message: &mut MailMessage, report: &ReportArtifact) -> MailResult<()> {
    let attachment = report_part(report)?;
    let mixed = message.find_part_mut(&|part| part.is_multipart() && part.is_mime_type("multipart/mixed"));
    if let Some(parts) = mixed.and_then(MailMessage::parts_mut) {
        parts.push(attachment);
        return Ok(());
    }

    let mut body = MailMessage::new();
    for name in CONTENT_HEADERS {
        for field in message.headers.fields(name) {
            body.headers.add_field(field.clone());
        }
        message.headers.remove(name);
    }
    body.body = std::mem::take(&mut message.body);

    let wrapper = MailMessage::multipart("mixed", vec![body, attachment]);
    for field in wrapper.headers.iter() {
        message.headers.set_field(field.clone());
    }
    message.body = wrapper.body;
    Ok(())
}

mod common;

use std::sync::Arc;

use common::*;
use crypto::CmsEnvelope;
use device_manager::{MockTokenDevice, OperationStatus, PinStatus, SignResponse};
use error_common::codes::{CODE_X005, CODE_X009, CODE_X010, CODE_X013, CODE_X020, CODE_X024};
use error_common::ErrorKind;
use mail_pipeline::address::address_set;
use mail_pipeline::constants::{KOM_LE_SUBJECT, X_KIM_DIENSTKENNUNG, X_KIM_KON_VERSION, X_KOM_LE_VERSION};
use mail_pipeline::{MailMessage, MailTransaction, SignEncryptComposer, SignEncryptOutcome};

fn loopback() -> Arc<LoopbackDevice> {
    Arc::new(LoopbackDevice::new().with_card("smcb-1", enc_cert(SENDER, 1)))
}

async fn compose(
    device: Arc<LoopbackDevice>,
    tx: &mut MailTransaction,
    recipients: &[crypto::RecipientCertificate],
) -> mail_pipeline::PipelineResult<SignEncryptOutcome> {
    let composer = SignEncryptComposer::new(device, config());
    composer
        .compose(tx, &origin_mail(), recipients, &[recipient(SENDER, 1)])
        .await
}

#[tokio::test]
async fn test_compose_kim_mail() {
    let device = loopback();
    let mut tx = MailTransaction::new(SENDER);
    let recipients = vec![recipient(RECIPIENT_A, 2), recipient(RECIPIENT_B, 3)];

    let outcome = compose(device.clone(), &mut tx, &recipients).await.unwrap();
    let SignEncryptOutcome::Composed(bytes) = outcome else {
        panic!("expected a composed mail");
    };
    assert!(tx.errors.is_empty());
    assert_eq!(LoopbackDevice::count(&device.sign_calls), 1);
    assert_eq!(LoopbackDevice::count(&device.encrypt_calls), 1);

    let mail = MailMessage::parse(&bytes).unwrap();
    assert_eq!(mail.headers.get("Subject").as_deref(), Some(KOM_LE_SUBJECT));
    assert_eq!(mail.headers.get(X_KOM_LE_VERSION).as_deref(), Some("1.5+"));
    assert_eq!(
        mail.headers.get(X_KIM_DIENSTKENNUNG).as_deref(),
        Some("Arztbrief;eArztbrief;V1.2")
    );
    assert_eq!(mail.headers.get("Message-ID").as_deref(), Some("<befund-1@kim.telematik>"));
    assert!(mail.headers.contains("Expires"));
    assert!(mail.headers.get(X_KIM_KON_VERSION).is_some());
    assert_eq!(
        address_set(&mail.headers, "To").into_iter().collect::<Vec<_>>(),
        vec![RECIPIENT_A.to_string(), RECIPIENT_B.to_string()]
    );

    // both recipients and the sender can decrypt
    let envelope = CmsEnvelope::from_der(&mail.decoded_body().unwrap()).unwrap();
    assert_eq!(envelope.recipient_count(), 3);
    assert_eq!(envelope.recipient_emails().unwrap().len(), 3);
}

#[tokio::test]
async fn test_ineligible_recipient_is_dropped() {
    let device = loopback();
    let mut tx = MailTransaction::new(SENDER);
    tx.record_address_cert(RECIPIENT_B, CODE_X005, false);

    let outcome = compose(device, &mut tx, &[recipient(RECIPIENT_A, 2)]).await.unwrap();
    let mail = MailMessage::parse(outcome.bytes()).unwrap();
    let to = address_set(&mail.headers, "To");
    assert!(to.contains(RECIPIENT_A));
    assert!(!to.contains(RECIPIENT_B));
}

#[tokio::test]
async fn test_rcpt_to_failure_gets_no_copy() {
    let device = loopback();
    let mut tx = MailTransaction::new(SENDER);
    tx.record_rcpt_to(RECIPIENT_B, CODE_X024);
    let recipients = vec![recipient(RECIPIENT_A, 2), recipient(RECIPIENT_B, 3)];

    let outcome = compose(device, &mut tx, &recipients).await.unwrap();
    let mail = MailMessage::parse(outcome.bytes()).unwrap();
    let to = address_set(&mail.headers, "To");
    assert!(to.contains(RECIPIENT_A));
    assert!(!to.contains(RECIPIENT_B));

    // recipient A and the sender only
    let envelope = CmsEnvelope::from_der(&mail.decoded_body().unwrap()).unwrap();
    assert_eq!(envelope.recipient_count(), 2);
    let emails: Vec<String> = envelope
        .recipient_emails()
        .unwrap()
        .into_iter()
        .map(|entry| entry.email.to_lowercase())
        .collect();
    assert!(!emails.contains(&RECIPIENT_B.to_string()));
}

#[tokio::test]
async fn test_foreign_from_is_rejected_before_signing() {
    let device = loopback();
    let composer = SignEncryptComposer::new(device.clone(), config());
    let mut tx = MailTransaction::new("empfang@kim.telematik");
    let result = composer
        .compose(&mut tx, &origin_mail(), &[recipient(RECIPIENT_A, 2)], &[])
        .await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::AddressEligibility));
    assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X020]);
    assert_eq!(LoopbackDevice::count(&device.sign_calls), 0);
}

#[tokio::test]
async fn test_no_deliverable_recipient_is_rejected() {
    let device = loopback();
    let composer = SignEncryptComposer::new(device.clone(), config());
    let mut tx = MailTransaction::new(SENDER);
    let result = composer.compose(&mut tx, &origin_mail(), &[], &[recipient(SENDER, 1)]).await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::AddressEligibility));
    assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X020]);
    assert_eq!(LoopbackDevice::count(&device.sign_calls), 0);
}

#[tokio::test]
async fn test_sender_certificate_not_duplicated() {
    let device = loopback();
    let mut tx = MailTransaction::new(SENDER);
    // the sender also receives a copy
    let recipients = vec![recipient(RECIPIENT_A, 2), recipient(&SENDER.to_uppercase(), 1)];

    let outcome = compose(device, &mut tx, &recipients).await.unwrap();
    let mail = MailMessage::parse(outcome.bytes()).unwrap();
    let envelope = CmsEnvelope::from_der(&mail.decoded_body().unwrap()).unwrap();
    assert_eq!(envelope.recipient_count(), 2);
}

#[tokio::test]
async fn test_sign_failure_stops_before_encryption() {
    let mut device = MockTokenDevice::new();
    device
        .expect_list_cards()
        .returning(|| Ok(vec![smcb("smcb-1", PinStatus::Verified)]));
    device.expect_ecc_encryption_available().return_const(false);
    device.expect_sign().times(1).returning(|_, _, _| {
        Ok(SignResponse {
            status: OperationStatus::failed("card error"),
            signature: None,
        })
    });
    device.expect_encrypt().times(0);

    let composer = SignEncryptComposer::new(Arc::new(device), config());
    let mut tx = MailTransaction::new(SENDER);
    let result = composer
        .compose(&mut tx, &origin_mail(), &[recipient(RECIPIENT_A, 2)], &[])
        .await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::DeviceCall));
    assert_eq!(tx.errors.sign_encrypt.codes(), &[CODE_X009]);
    assert!(tx.log.contains("X009"));
}

#[tokio::test]
async fn test_no_signing_card() {
    let mut device = MockTokenDevice::new();
    device
        .expect_list_cards()
        .returning(|| Ok(vec![smcb("smcb-1", PinStatus::Blocked), smcb("smcb-2", PinStatus::Verifiable)]));
    device.expect_ecc_encryption_available().return_const(true);
    device.expect_sign().times(0);

    let composer = SignEncryptComposer::new(Arc::new(device), config());
    let mut tx = MailTransaction::new(SENDER);
    let result = composer
        .compose(&mut tx, &origin_mail(), &[recipient(RECIPIENT_A, 2)], &[])
        .await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::CardNotFound));
    assert_eq!(tx.errors.sign_encrypt.codes(), &[CODE_X010]);
}

#[tokio::test]
async fn test_unparseable_origin() {
    let composer = SignEncryptComposer::new(Arc::new(MockTokenDevice::new()), config());
    let mut tx = MailTransaction::new(SENDER);
    let result = composer.compose(&mut tx, b"", &[], &[]).await;

    assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::Format));
    assert_eq!(tx.errors.sign_encrypt.codes(), &[CODE_X013]);
}

#[tokio::test]
async fn test_already_encrypted_mail_is_forwarded_unchanged() {
    let mut tx = MailTransaction::new(SENDER);
    let kim = compose(loopback(), &mut tx, &[recipient(RECIPIENT_A, 2)])
        .await
        .unwrap()
        .into_bytes();

    let wrapper = [
        format!(
            "From: {SENDER}\r\nTo: {RECIPIENT_A}\r\nSubject: Befund\r\n\
             Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n\
             --outer\r\nContent-Type: text/plain\r\n\r\nsiehe Anhang\r\n\
             --outer\r\nContent-Type: message/rfc822\r\n\r\n"
        )
        .into_bytes(),
        kim.clone(),
        b"\r\n--outer--\r\n".to_vec(),
    ]
    .concat();

    let device = loopback();
    let composer = SignEncryptComposer::new(device.clone(), config());
    let mut tx = MailTransaction::new(SENDER);
    let outcome = composer
        .compose(&mut tx, &wrapper, &[recipient(RECIPIENT_A, 2)], &[])
        .await
        .unwrap();

    assert_eq!(outcome, SignEncryptOutcome::AlreadyEncrypted(kim));
    assert_eq!(LoopbackDevice::count(&device.sign_calls), 0);
    assert_eq!(LoopbackDevice::count(&device.encrypt_calls), 0);
}

#[tokio::test]
async fn test_invalid_embedded_message_is_encrypted_normally() {
    let wrapper = format!(
        "From: {SENDER}\r\nTo: {RECIPIENT_A}\r\nSubject: Weiterleitung\r\n\
         Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n\
         --outer\r\nContent-Type: text/plain\r\n\r\nsiehe Anhang\r\n\
         --outer\r\nContent-Type: message/rfc822\r\n\r\n\
         From: x@kim.telematik\r\nSubject: alt\r\n\r\nText\r\n\
         --outer--\r\n"
    );

    let device = loopback();
    let composer = SignEncryptComposer::new(device.clone(), config());
    let mut tx = MailTransaction::new(SENDER);
    let outcome = composer
        .compose(&mut tx, wrapper.as_bytes(), &[recipient(RECIPIENT_A, 2)], &[])
        .await
        .unwrap();

    assert!(matches!(outcome, SignEncryptOutcome::Composed(_)));
    assert_eq!(LoopbackDevice::count(&device.sign_calls), 1);
}

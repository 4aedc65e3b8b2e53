// Header names and fixed values of the KIM mail format

pub const X_KOM_LE_VERSION: &str = "X-KOM-LE-Version";
pub const X_KIM_DIENSTKENNUNG: &str = "X-KIM-Dienstkennung";
pub const X_KIM_CM_VERSION: &str = "X-KIM-CMVersion";
pub const X_KIM_PT_VERSION: &str = "X-KIM-PTVersion";
pub const X_KIM_KON_VERSION: &str = "X-KIM-KONVersion";
pub const X_KIM_FEHLERMELDUNG: &str = "X-KIM-Fehlermeldung";
pub const X_KIM_DECRYPTION_RESULT: &str = "X-KIM-DecryptionResult";
pub const X_KIM_INTEGRITY_CHECK_RESULT: &str = "X-KIM-IntegrityCheckResult";

/// Prefix of the KIM headers carried over into the encrypted mail
pub const X_KIM_PREFIX: &str = "x-kim";

pub const KOM_LE_SUBJECT: &str = "KOM-LE-Nachricht";

pub const SMIME_MEDIA_TYPE: &str = "application/pkcs7-mime";
pub const SMIME_SIGNED_CONTENT_TYPE: &str = "application/pkcs7-mime; smime-type=signed-data; name=smime.p7m";
pub const SMIME_ENVELOPED_CONTENT_TYPE: &str =
    "application/pkcs7-mime; smime-type=authenticated-enveloped-data; name=smime.p7m";
pub const SMIME_FILENAME: &str = "smime.p7m";
pub const SMIME_DISPOSITION: &str = "attachment; filename=smime.p7m";

/// Prepended to the origin mail before signing
pub const MESSAGE_RFC822_PREAMBLE: &str = "Content-Type: message/rfc822\r\n\r\n";

pub const REPORT_FILENAME: &str = "Signaturpruefbericht.pdf";

pub const SIGNATURE_BANNER: &str =
    "----------------------------------\n!!!Die Signatur wurde erfolgreich geprueft!!!\n----------------------------------";

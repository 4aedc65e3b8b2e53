// KIM error code catalogue
// Identifiers and texts are part of the KIM wire contract (X-KIM-Fehlermeldung,
// X-KIM-DecryptionResult, X-KIM-IntegrityCheckResult headers and DSN bodies).

use serde::Serialize;
use std::fmt;

/// A single catalogue entry: stable identifier plus German operator text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCode {
    id: &'static str,
    text: &'static str,
}

impl ErrorCode {
    const fn new(id: &'static str, text: &'static str) -> Self {
        Self { id, text }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    /// Line used in DSN bodies: `id - text` terminated by CRLF.
    pub fn dsn_line(&self) -> String {
        format!("{} - {}\r\n", self.id, self.text)
    }

    /// Looks up a catalogue entry by identifier.
    pub fn from_id(id: &str) -> Option<ErrorCode> {
        ALL.iter().copied().find(|code| code.id == id)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.text)
    }
}

pub mod client_module {
    use super::ErrorCode;

    pub const CODE_4001: ErrorCode = ErrorCode::new("4001", "Empfänger entfernt, wegen falscher KIM-Version");
    pub const CODE_4002: ErrorCode = ErrorCode::new("4002", "Anhang konnte nicht zum KOM-LE-Attachment-Service übertragen werden");
    pub const CODE_4003: ErrorCode = ErrorCode::new("4003", "keine eindeutige Telematik-ID mit Verschlüsselungszertifikat gefunden");
    pub const CODE_4004: ErrorCode = ErrorCode::new("4004", "Nachricht nicht für alle Empfänger verschlüsselbar");
    pub const CODE_4005: ErrorCode = ErrorCode::new(
        "4005",
        "Für einen Empfänger existieren mehrere Verschlüsselungszertifikate mit unterschiedlichen Telematik-IDs",
    );
    pub const CODE_4006: ErrorCode = ErrorCode::new("4006", "Anhang konnte nicht vom KOM-LE-Attachment-Service geladen werden");
    pub const CODE_4007: ErrorCode = ErrorCode::new("4007", "beim Entschlüsseln eines Anhangs ist ein Fehler aufgetreten");
    pub const CODE_4008: ErrorCode = ErrorCode::new(
        "4008",
        "Das verwendete Client-Modul unterstützt die in der Mail verwendete Version nicht",
    );
    pub const CODE_4009: ErrorCode = ErrorCode::new(
        "4009",
        "Die KIM-Nachricht konnte auf Grund eines nicht verfügbaren Schlüssels nicht entschlüsselt werden",
    );
    pub const CODE_4010: ErrorCode = ErrorCode::new(
        "4010",
        "Die KIM-Nachricht konnte aufgrund des falschen Formats nicht entschlüsselt werden",
    );
    pub const CODE_4011: ErrorCode = ErrorCode::new("4011", "Der Konnektor steht für die Entschlüsselung nicht zur Verfügung");
    pub const CODE_4012: ErrorCode = ErrorCode::new(
        "4012",
        "Die Prüfsumme des Anhangs stimmt nicht mit der dem Anhang beigefügten Prüfsumme überein. \
         Der empfangene Anhang entspricht eventuell nicht dem originalen Anhang",
    );
    pub const CODE_4013: ErrorCode = ErrorCode::new(
        "4013",
        "Anhang konnte nicht heruntergeladen werden, da durch zu häufigen Zugriff der KOM-LE-Attachment-Service den Abruf verweigert.",
    );
    pub const CODE_4014: ErrorCode = ErrorCode::new(
        "4014",
        "Die Prüfung der Nachricht hat ergeben, dass die Nachricht nach dem Verschlüsseln manipuliert wurde. \
         Möglicherweise wurde die verschlüsselte Nachricht auch an einen nicht empfangsberechtigten Personenkreis versendet.",
    );
    pub const CODE_4015: ErrorCode = ErrorCode::new(
        "4015",
        "Die Prüfung der Signatur der Nachricht hat ergeben, dass die Nachricht manipuliert wurde, um einem anderen \
         Nutzer das Entschlüsseln der Nachricht mit einem Schlüssel, der nicht in seinem Besitz ist, zu ermöglichen",
    );
    pub const CODE_4016: ErrorCode = ErrorCode::new("4016", "Bei der Aktualisierung der PKCS#12-Datei ist ein Fehler aufgetreten");
    pub const CODE_4017: ErrorCode = ErrorCode::new(
        "4017",
        "Die KIM-Version des Client-Moduls ist kleiner als die im Verzeichnisdienst zu seinem Eintrag hinterlegte Version",
    );
}

pub mod signature {
    use super::ErrorCode;

    pub const CODE_4112: ErrorCode = ErrorCode::new("4112", "Die digitale Signatur konnte aufgrund des falschen Formats nicht geprüft werden");
    pub const CODE_4115: ErrorCode = ErrorCode::new("4115", "Die Integrität der Nachricht wurde verletzt");
    pub const CODE_4206: ErrorCode = ErrorCode::new("4206", "Der Zertifizierungspfad des Signaturzertifikats kann nicht validiert werden");
    pub const CODE_4253: ErrorCode = ErrorCode::new("4253", "Die digitale Signatur ist nicht vorhanden");
    pub const CODE_4264: ErrorCode = ErrorCode::new(
        "4264",
        "Die digitale Signatur ist mathematisch korrekt, der Zertifikatsstatus des Signaturzertifikats konnte aber nicht geprüft werden",
    );
}

pub mod gateway {
    use super::ErrorCode;

    pub const CODE_X001: ErrorCode = ErrorCode::new(
        "X001",
        "Die digitale Signatur ist mathematisch korrekt und der Zertifikatsstatus des Signaturzertifikats konnte erfolgreich \
         geprüft werden, aber beim Vergleich der Header-Elemente from, sender, reply-to, to und cc der äußeren Nachricht mit denen der inneren Nachricht \
         wurden Abweichungen festgestellt.",
    );
    pub const CODE_X002: ErrorCode = ErrorCode::new(
        "X002",
        "Die digitale Signatur konnte aufgrund eines nicht zuordenbaren Fehlercodes des Konnektors nicht geprüft werden",
    );
    pub const CODE_X003: ErrorCode = ErrorCode::new(
        "X003",
        "Die digitale Signatur ist mathematisch korrekt und der Zertifikatsstatus des Signaturzertifikats \
         konnte erfolgreich geprüft werden, aber das recipient-emails-Attribut aus signerInfos enthält nicht die gleichen Werte wie das \
         recipient-emails-Attribut aus dem enveloped-data CMS-Objekt",
    );
    pub const CODE_X004: ErrorCode = ErrorCode::new("X004", "Der Gematik-Verzeichnisdienst seht nicht zur Verfügung");
    pub const CODE_X005: ErrorCode = ErrorCode::new("X005", "Für einen Empfänger existiert kein Verschlüsselungszertifikat");
    pub const CODE_X006: ErrorCode = ErrorCode::new("X006", "Für den Absender existiert kein Verschlüsselungszertifikat");
    pub const CODE_X007: ErrorCode = ErrorCode::new(
        "X007",
        "Für den Absender existieren mehrere Verschlüsselungszertifikate mit unterschiedlichen Telematik-IDs",
    );
    pub const CODE_X008: ErrorCode = ErrorCode::new(
        "X008",
        "Für den Absender ist eine höhere KIM-Version im Gematik-Verzeichnisdienst hinterlegt als die Version des KIM-Clientmoduls",
    );
    pub const CODE_X009: ErrorCode = ErrorCode::new("X009", "Bei der Signierung der Mail ist ein Fehler aufgetreten");
    pub const CODE_X010: ErrorCode = ErrorCode::new(
        "X010",
        "Fehler bei der Selektion der Karte zum Signieren. Entweder steht der Konnektor nicht zur Verfügung oder der PIN-STATUS der SMC-B ist nicht verifiziert",
    );
    pub const CODE_X011: ErrorCode = ErrorCode::new("X011", "Bei der Verschlüsselung der Mail ist ein Fehler aufgetreten");
    pub const CODE_X012: ErrorCode = ErrorCode::new(
        "X012",
        "Beim Fertigstellen der signierten und verschlüsselten Mail ist ein Fehler aufgetreten",
    );
    pub const CODE_X013: ErrorCode = ErrorCode::new("X013", "Beim Überprüfen der zu versendenden Mail ist ein Fehler aufgetreten");
    pub const CODE_X014: ErrorCode = ErrorCode::new(
        "X014",
        "Header X-KOM-LE-Version mit der entsprechenden Version (1.0 oder 1.5) nicht gesetzt",
    );
    pub const CODE_X015: ErrorCode = ErrorCode::new("X015", "Subject nicht auf KOM-LE-Nachricht gesetzt");
    pub const CODE_X016: ErrorCode = ErrorCode::new("X016", "Content-Type nicht auf application/pkcs7-mime gesetzt");
    pub const CODE_X017: ErrorCode = ErrorCode::new(
        "X017",
        "EnvelopedData im falschen Format, fehlerhafte OID: 1.2.840.113549.1.7.3 statt 1.2.840.113549.1.9.16.1.23",
    );
    pub const CODE_X018: ErrorCode = ErrorCode::new("X018", "EncryptedRecipientInfos nicht verfügbar");
    pub const CODE_X019: ErrorCode = ErrorCode::new("X019", "EncryptedRecipientEmails nicht verfügbar");
    pub const CODE_X020: ErrorCode = ErrorCode::new(
        "X020",
        "Beim Überprüfen des Encrypt-Formats der Mail ist ein unbekannter Fehler aufgetreten",
    );
    pub const CODE_X021: ErrorCode = ErrorCode::new("X021", "Die Karte für das Entschlüsseln konnte nicht gefunden werden");
    pub const CODE_X022: ErrorCode = ErrorCode::new(
        "X022",
        "CertIssuerAndSerialNumber in ContentInfo konnte für die Empfänger-Adresse nicht gefunden werden",
    );
    pub const CODE_X023: ErrorCode = ErrorCode::new(
        "X023",
        "Verschlüsselte Mail konnte nicht extrahiert werden und der signed Inhalt nicht geparst werden",
    );
    pub const CODE_X024: ErrorCode = ErrorCode::new("X024", "Der SMTP-Befehl RCPT-TO für den Empfänger ist fehlgeschlagen");
}

pub use client_module::*;
pub use gateway::*;
pub use signature::*;

/// Every catalogue entry in catalogue order.
pub const ALL: &[ErrorCode] = &[
    CODE_4001, CODE_4002, CODE_4003, CODE_4004, CODE_4005, CODE_4006, CODE_4007, CODE_4008,
    CODE_4009, CODE_4010, CODE_4011, CODE_4012, CODE_4013, CODE_4014, CODE_4015, CODE_4016,
    CODE_4017, CODE_4112, CODE_4115, CODE_4206, CODE_4253, CODE_4264, CODE_X001, CODE_X002,
    CODE_X003, CODE_X004, CODE_X005, CODE_X006, CODE_X007, CODE_X008, CODE_X009, CODE_X010,
    CODE_X011, CODE_X012, CODE_X013, CODE_X014, CODE_X015, CODE_X016, CODE_X017, CODE_X018,
    CODE_X019, CODE_X020, CODE_X021, CODE_X022, CODE_X023, CODE_X024,
];

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    // Card serial numbers of German health cards start with the country prefix 80276
    static ref ICCSN_REGEX: Regex = Regex::new(r"\b80276\d{15}\b").unwrap();
    static ref TELEMATIK_ID_REGEX: Regex = Regex::new(r"\b\d{1,2}-\d[0-9A-Za-z.\-]{5,}\b").unwrap();
}

/// Identifier redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_iccsn: bool,
    pub redact_telematik_ids: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_iccsn: true,
            redact_telematik_ids: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// Redactor for log messages mentioning mail addresses or card identifiers
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        if self.config.redact_iccsn {
            result = self.redact_iccsn(&result);
        }

        if self.config.redact_telematik_ids {
            result = self.redact_telematik_ids(&result);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Redacts a single mail address, e.g. for a structured log field.
    pub fn redact_address(&self, address: &str) -> String {
        if self.config.hash_for_correlation {
            format!("EMAIL[{}]", self.hash_value(&address.to_lowercase()))
        } else {
            mask_address(address)
        }
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX
            .replace_all(text, |caps: &regex::Captures| self.redact_address(&caps[0]))
            .to_string()
    }

    fn redact_iccsn(&self, text: &str) -> String {
        ICCSN_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("ICCSN[{}]", self.hash_value(&caps[0]))
                } else {
                    let iccsn = &caps[0];
                    let tail = iccsn.get(iccsn.len().saturating_sub(4)..).unwrap_or_default();
                    format!("80276***********{tail}")
                }
            })
            .to_string()
    }

    fn redact_telematik_ids(&self, text: &str) -> String {
        TELEMATIK_ID_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("TID[{}]", self.hash_value(&caps[0]))
                } else {
                    let tid = &caps[0];
                    let prefix = tid.split('-').next().unwrap_or_default();
                    format!("{prefix}-***")
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8]) // first 8 bytes keep the hash short
    }
}

fn mask_address(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            let domain_first = domain.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain_first}***")
        }
        None => "***@***".to_string(),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One contact to be messaged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Store row id; `None` for in-memory queues.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email: String,
    /// Phone as uploaded, before correction.
    pub phone_raw: String,
    /// Digits after country/area correction. Empty until normalized.
    #[serde(default)]
    pub phone_normalized: String,
    /// Original spreadsheet fields, lowercase keys.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Replaces the primary text template for this record.
    #[serde(default)]
    pub template_override: Option<String>,
}

impl ContactRecord {
    /// Look up a template field by name, case-insensitive.
    ///
    /// Standard names (`nome`/`name`, `empresa`/`company`, `email`,
    /// `telefone`/`phone`) resolve to the typed fields; anything else falls
    /// through to the uploaded field map.
    pub fn field(&self, key: &str) -> Option<&str> {
        let key = key.trim().to_lowercase();
        let value = match key.as_str() {
            "nome" | "name" => Some(self.name.as_str()),
            "empresa" | "company" => Some(self.company.as_str()),
            "email" => Some(self.email.as_str()),
            "telefone" | "phone" => Some(self.phone_raw.as_str()),
            _ => None,
        };
        value
            .filter(|v| !v.is_empty())
            .or_else(|| self.fields.get(&key).map(String::as_str))
    }

    /// Address actually dialed: the normalized digits when present.
    pub fn dial_digits(&self) -> &str {
        if self.phone_normalized.is_empty() {
            &self.phone_raw
        } else {
            &self.phone_normalized
        }
    }
}

/// Why a record was skipped without dialing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidPhone,
    ShortPhone,
    DuplicateInBatch,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPhone => "invalid phone",
            Self::ShortPhone => "short phone",
            Self::DuplicateInBatch => "duplicate within batch",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details accompanying a successful delivery report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMeta {
    /// Rendered primary text, as delivered.
    pub rendered_message: String,
    pub timestamp: DateTime<Utc>,
    /// Attempts consumed, counting the successful one.
    pub attempts: u32,
}

/// Details accompanying a failed-delivery report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMeta {
    /// Last failure reason.
    pub error: String,
    pub attempts: u32,
}

/// Terminal status of one record within an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    Sent(SentMeta),
    Error(ErrorMeta),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent(_) => "sent",
            Self::Error(_) => "error",
            Self::Skipped(_) => "skipped",
        }
    }
}

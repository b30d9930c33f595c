use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Send pacing, retry, and message-slot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Wait applied between records.
    #[serde(default = "default_interval")]
    pub interval: IntervalPolicy,
    /// Delivery attempts per record before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base in milliseconds; attempt N waits N x base before retrying.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Drop records whose normalized phone repeats an earlier record's.
    #[serde(default = "default_true")]
    pub remove_duplicates: bool,
    #[serde(default)]
    pub nine_variant: NineVariantPolicy,
    #[serde(default)]
    pub phone: PhoneConfig,
    #[serde(default)]
    pub messages: MessageSlots,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            remove_duplicates: true,
            nine_variant: NineVariantPolicy::default(),
            phone: PhoneConfig::default(),
            messages: MessageSlots::default(),
        }
    }
}

impl SenderConfig {
    /// Clamp interval bounds and the retry limit to sane minimums.
    pub fn normalize(&mut self) {
        self.interval = self.interval.clamped();
        self.max_attempts = self.max_attempts.max(1);
    }
}

/// Wait between records: a constant, or a uniform draw redrawn every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IntervalPolicy {
    Fixed { seconds: u64 },
    Random { min: u64, max: u64 },
}

impl IntervalPolicy {
    /// Clamp bounds to at least one second and `min <= max`.
    pub fn clamped(self) -> Self {
        match self {
            Self::Fixed { seconds } => Self::Fixed {
                seconds: seconds.max(1),
            },
            Self::Random { min, max } => {
                let min = min.max(1);
                Self::Random {
                    min,
                    max: max.max(min),
                }
            }
        }
    }
}

/// How the 9-digit mobile variant of a number is used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NineVariantPolicy {
    /// Dial the number exactly as normalized.
    #[default]
    Off,
    /// Send to both variants as independent records, the sibling queued
    /// immediately after its source.
    Expand,
    /// Dial the alternate variant on the second delivery attempt.
    Fallback,
}

impl NineVariantPolicy {
    /// Human-readable name for display (e.g. in `status`).
    pub fn display_name(&self) -> &str {
        match self {
            Self::Off => "off",
            Self::Expand => "expand",
            Self::Fallback => "fallback",
        }
    }
}

/// Country and area-code correction applied before dialing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    /// Country calling code prepended to bare national numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Area code prepended when a number arrives without one (8 or 9 digits).
    /// `None` leaves such numbers alone.
    #[serde(default)]
    pub auto_fill_area_code: Option<String>,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            auto_fill_area_code: None,
        }
    }
}

/// Message templates sent per record. A slot is enabled when its template is
/// non-empty; enabled slots are delivered in field order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSlots {
    #[serde(default)]
    pub text_1: Option<String>,
    #[serde(default)]
    pub text_2: Option<String>,
    #[serde(default)]
    pub text_3: Option<String>,
    /// Outbound document link, delivered with a rich preview.
    #[serde(default)]
    pub file_link: Option<String>,
    /// Outbound image link, delivered with a rich preview.
    #[serde(default)]
    pub image_link: Option<String>,
}

impl MessageSlots {
    /// Enabled slots in delivery order.
    pub fn enabled(&self) -> Vec<(SlotKind, &str)> {
        let mut slots = Vec::new();
        if let Some(t) = non_empty(&self.text_1) {
            slots.push((SlotKind::Text1, t));
        }
        if let Some(t) = non_empty(&self.text_2) {
            slots.push((SlotKind::Text2, t));
        }
        if let Some(t) = non_empty(&self.text_3) {
            slots.push((SlotKind::Text3, t));
        }
        if let Some(t) = non_empty(&self.file_link) {
            slots.push((SlotKind::FileLink, t));
        }
        if let Some(t) = non_empty(&self.image_link) {
            slots.push((SlotKind::ImageLink, t));
        }
        slots
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().is_empty()
    }
}

fn non_empty(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().filter(|t| !t.trim().is_empty())
}

/// Identity of a message slot within a record's delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    Text1,
    Text2,
    Text3,
    FileLink,
    ImageLink,
}

impl SlotKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text1 => "text-1",
            Self::Text2 => "text-2",
            Self::Text3 => "text-3",
            Self::FileLink => "file-link",
            Self::ImageLink => "image-link",
        }
    }

    /// Link slots request a rich URL preview from the gateway.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::FileLink | Self::ImageLink)
    }
}

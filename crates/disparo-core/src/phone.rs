//! Phone normalization: free-text input to canonical dialable digits.

use crate::config::PhoneConfig;
use crate::error::DisparoError;

/// Result of normalizing a raw phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhone {
    /// Canonical digits to dial.
    pub digits: String,
    /// Fewer than 7 digits. Unsendable; callers skip instead of dialing.
    pub short: bool,
}

/// Normalize a raw phone into canonical dialable digits.
///
/// Strips everything but digits, fills in a missing area code when one is
/// configured (numbers arriving with only 8 or 9 digits), and prepends the
/// country code to bare national numbers (10 or 11 digits). Errors when no
/// digits remain at all.
pub fn normalize(raw: &str, opts: &PhoneConfig) -> Result<NormalizedPhone, DisparoError> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(DisparoError::InvalidPhone(raw.to_string()));
    }

    if let Some(area) = opts
        .auto_fill_area_code
        .as_deref()
        .filter(|a| !a.is_empty())
    {
        if digits.len() == 8 || digits.len() == 9 {
            digits = format!("{area}{digits}");
        }
    }

    if !opts.country_code.is_empty()
        && !digits.starts_with(&opts.country_code)
        && (digits.len() == 10 || digits.len() == 11)
    {
        digits = format!("{}{digits}", opts.country_code);
    }

    let short = digits.len() < 7;
    Ok(NormalizedPhone { digits, short })
}

/// Toggle position for the mobile "9": ninth digit counting from the right.
const NINE_POSITION_FROM_RIGHT: usize = 9;

/// Sibling of a number with the mobile "9" toggled.
///
/// Removes the digit when that position already holds a 9, otherwise inserts
/// one so it lands immediately after the area code. `None` when the number
/// is too short to have the position at all.
pub fn nine_variant(digits: &str) -> Option<String> {
    toggle_nine_at(digits, NINE_POSITION_FROM_RIGHT)
}

fn toggle_nine_at(digits: &str, position_from_right: usize) -> Option<String> {
    let mut out: Vec<char> = digits.chars().filter(|c| c.is_ascii_digit()).collect();
    if out.len() < position_from_right {
        return None;
    }
    let index = out.len() - position_from_right;
    if out[index] == '9' {
        out.remove(index);
    } else {
        out.insert(index + 1, '9');
    }
    Some(out.into_iter().collect())
}

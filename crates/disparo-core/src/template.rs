//! Message template rendering: `{field}` placeholders over a contact record.

use crate::record::ContactRecord;

/// Render a template against a record.
///
/// Placeholders are `{identifier}` runs matched case-insensitively against
/// the record's fields. Unknown placeholders render as empty text rather
/// than erroring or leaving the braces behind; an unterminated `{` is kept
/// as literal text. Never fails, safe for speculative previews.
pub fn render(template: &str, record: &ContactRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                if let Some(value) = record.field(&after[..close]) {
                    out.push_str(value);
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

//! Queue preparation: normalize, expand 9-variant siblings, drop duplicates.

use std::collections::HashSet;

use disparo_core::config::{NineVariantPolicy, SenderConfig};
use disparo_core::phone;
use disparo_core::record::ContactRecord;

/// A record list ready to send, with preparation tallies.
#[derive(Debug, Clone, Default)]
pub struct PreparedQueue {
    pub records: Vec<ContactRecord>,
    pub duplicates_removed: usize,
    pub siblings_added: usize,
}

/// Normalize phones, synthesize 9-variant siblings, and drop duplicates.
///
/// Records whose phone yields no digits keep an empty normalized phone and
/// stay in the queue; the worker reports them skipped so every uploaded row
/// remains accounted for. Siblings are interleaved immediately after their
/// source record. The duplicate filter runs last and keeps the first
/// occurrence of each number, so a sibling colliding with a record further
/// down wins by position.
pub fn prepare_queue(records: Vec<ContactRecord>, sender: &SenderConfig) -> PreparedQueue {
    let mut prepared = PreparedQueue::default();

    let mut normalized: Vec<ContactRecord> = records
        .into_iter()
        .map(|mut record| {
            record.phone_normalized = match phone::normalize(&record.phone_raw, &sender.phone) {
                Ok(n) => n.digits,
                Err(_) => String::new(),
            };
            record
        })
        .collect();

    if sender.nine_variant == NineVariantPolicy::Expand {
        let mut expanded = Vec::with_capacity(normalized.len() * 2);
        for record in normalized {
            let sibling = if record.phone_normalized.is_empty() {
                None
            } else {
                phone::nine_variant(&record.phone_normalized)
                    .map(|digits| sibling_of(&record, digits))
            };
            expanded.push(record);
            if let Some(sibling) = sibling {
                expanded.push(sibling);
                prepared.siblings_added += 1;
            }
        }
        normalized = expanded;
    }

    if sender.remove_duplicates {
        let mut seen: HashSet<String> = HashSet::new();
        let before = normalized.len();
        normalized.retain(|record| {
            if record.phone_normalized.is_empty() {
                return true;
            }
            seen.insert(record.phone_normalized.clone())
        });
        prepared.duplicates_removed = before - normalized.len();
    }

    prepared.records = normalized;
    prepared
}

fn sibling_of(record: &ContactRecord, digits: String) -> ContactRecord {
    ContactRecord {
        id: None,
        phone_raw: digits.clone(),
        phone_normalized: digits,
        ..record.clone()
    }
}

use indexmap::IndexMap;

use crate::domain::message::{FingerprintGroup, MessageRecord};

/// Partition records by fingerprint and keep the buckets with more than one
/// member. Groups come out in first-seen fingerprint order and members in
/// input order, so a fixed scan order always yields the same groups.
pub fn group_duplicates(records: Vec<MessageRecord>) -> Vec<FingerprintGroup> {
    let mut buckets: IndexMap<String, Vec<MessageRecord>> = IndexMap::new();
    for record in records {
        buckets
            .entry(record.fingerprint.clone())
            .or_default()
            .push(record);
    }

    buckets
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(fingerprint, members)| FingerprintGroup {
            fingerprint,
            members,
        })
        .collect()
}

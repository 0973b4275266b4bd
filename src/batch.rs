use std::num::NonZeroUsize;

use crate::pipeline::RecordSet;

/// Split `records` into contiguous groups of at most `max_size`, keeping order.
///
/// Every group but the last holds exactly `max_size` records.
pub fn chunk<T: Clone>(records: &RecordSet<T>, max_size: NonZeroUsize) -> Vec<RecordSet<T>> {
    let entries: Vec<(&str, &T)> = records.iter().collect();
    entries
        .chunks(max_size.get())
        .map(|group| {
            group
                .iter()
                .map(|&(key, value)| (key.to_owned(), value.clone()))
                .collect()
        })
        .collect()
}

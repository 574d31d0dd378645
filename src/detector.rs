use std::collections::HashSet;

use crate::model::feed_row::{FeedRow, RawFeedRow};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub row_index: usize,
    pub reason: String,
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Rows whose key was absent from the previous poll, in feed order.
    pub new_rows: Vec<FeedRow>,
    pub parse_failures: Vec<ParseFailure>,
    pub total_rows: usize,
    /// Every parsed key of this poll; what `commit` remembers.
    pub keys: HashSet<String>,
}

/// Remembers only the previous poll's dedup keys.
///
/// The key set is replaced, not merged, each pass: an unchanged row is never
/// reported twice in a row, and a row that drops out and later returns is new again.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    quote_asset: String,
    previous: HashSet<String>,
}

impl ChangeDetector {
    pub fn new(quote_asset: &str) -> Self {
        Self {
            quote_asset: quote_asset.to_string(),
            previous: HashSet::new(),
        }
    }

    /// Observe then commit in one step.
    pub fn detect(&mut self, rows: &[RawFeedRow]) -> Detection {
        let detection = self.observe(rows);
        self.commit(detection.keys.clone());
        detection
    }

    /// Classify rows against the previous poll without changing what is remembered.
    pub fn observe(&self, rows: &[RawFeedRow]) -> Detection {
        let mut detection = Detection {
            total_rows: rows.len(),
            keys: HashSet::with_capacity(rows.len()),
            ..Detection::default()
        };

        for (row_index, raw) in rows.iter().enumerate() {
            let row = match FeedRow::parse(raw, &self.quote_asset) {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(row_index, error = %e, "Skipping malformed feed row");
                    detection.parse_failures.push(ParseFailure {
                        row_index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let key = row.dedup_key();
            let unseen = !self.previous.contains(&key);
            // `insert` is false for a duplicate inside this same batch.
            if detection.keys.insert(key) && unseen {
                detection.new_rows.push(row);
            }
        }
        detection
    }

    /// Replace the remembered keys. Keys left out are reported as new on the next poll.
    pub fn commit(&mut self, keys: HashSet<String>) {
        self.previous = keys;
    }

    pub fn remembered(&self) -> usize {
        self.previous.len()
    }
}

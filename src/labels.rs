//! Label normalization and aggregation.
//!
//! Labels come back from the classifier as free text, so `Bug`, `#bug` and
//! ` BUG ` must all count as the same label. [`normalize`] produces the
//! aggregation key and [`aggregate`] counts keys across records.

use std::collections::HashMap;

use crate::models::{FeedbackRecord, LabelCount};

/// Canonical form of a label: trimmed, lower-cased, leading `#`s removed.
///
/// Whitespace between leading hashes goes too, so `"# #bug"` is `bug`.
///
/// Returns an empty string for labels with no content; those are skipped by
/// [`aggregate`]. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Count normalized labels across `records`, most frequent first.
///
/// Ties keep first-seen order (walking records, then labels, in sequence).
pub fn aggregate(records: &[FeedbackRecord]) -> Vec<LabelCount> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<LabelCount> = Vec::new();

    for label in records.iter().flat_map(|r| r.labels.iter()) {
        let key = normalize(label);
        if key.is_empty() {
            continue;
        }
        match positions.get(&key) {
            Some(&i) => counts[i].count += 1,
            None => {
                positions.insert(key.clone(), counts.len());
                counts.push(LabelCount {
                    label: key,
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(labels: &[&str]) -> FeedbackRecord {
        FeedbackRecord::new("text", labels.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn normalize_ignores_case_hashes_and_whitespace() {
        assert_eq!(normalize("#Bug"), "bug");
        assert_eq!(normalize("bug"), "bug");
        assert_eq!(normalize("  BUG "), "bug");
        assert_eq!(normalize("##Feature Request"), "feature request");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["#Bug", "  # Spaced ", "###", "", "Ünïcode", "a#b", " #  #x"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn normalize_empty_labels() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("###"), "");
        assert_eq!(normalize(" # "), "");
    }

    #[test]
    fn aggregate_merges_variants() {
        let counts = aggregate(&[record(&["Bug", "#Bug"])]);
        assert_eq!(
            counts,
            vec![LabelCount {
                label: "bug".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn aggregate_sorts_descending_with_first_seen_ties() {
        let records = vec![
            record(&["ux", "pricing"]),
            record(&["Bug", "UX"]),
            record(&["bug", "#pricing"]),
            record(&["bug"]),
        ];
        let counts = aggregate(&records);
        let labels: Vec<_> = counts.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["bug", "ux", "pricing"]);
        assert_eq!(counts[0].count, 3);
        assert!(counts.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn aggregate_skips_empty_labels() {
        let records = vec![record(&["", "  ", "#", "Bug"]), record(&[])];
        let counts = aggregate(&records);
        let total: usize = counts.iter().map(|c| c.count).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn aggregate_total_matches_non_empty_labels() {
        let records = vec![
            record(&["a", "#b", "##"]),
            record(&["A", "c", " "]),
            record(&["B"]),
        ];
        let non_empty = records
            .iter()
            .flat_map(|r| r.labels.iter())
            .filter(|l| !normalize(l).is_empty())
            .count();
        let total: usize = aggregate(&records).iter().map(|c| c.count).sum();
        assert_eq!(total, non_empty);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate(&[]).is_empty());
    }
}

//! Change detection between a listing and the stored watermark.
//!
//! The pinned and sequential streams are evaluated independently:
//!
//! - pinned: the live row count is compared with the stored count; growth
//!   means the first `live - stored` pinned rows are new
//! - sequential: the number of the first row is compared with the stored
//!   maximum; growth means the first `live - stored` rows are new, clamped to
//!   the rows actually on the page
//!
//! A live value below the stored one is a correction: nothing is new but the
//! watermark moves down to the live value.

use crate::error::Result;
use crate::models::{ListingSnapshot, RawRow, Watermark, WatermarkField, WatermarkUpdate};

/// What changed on a listing since the stored watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePlan {
    /// Watermark read before the cycle
    pub stored: Watermark,

    /// Live values to persist once the batch is accepted
    pub next: Watermark,

    /// Number of leading pinned rows that are new
    pub pinned_new: usize,

    /// Number of leading sequential rows that are new
    pub sequential_new: usize,
}

impl ChangePlan {
    /// Whether any row is new.
    pub fn has_new(&self) -> bool {
        self.pinned_new > 0 || self.sequential_new > 0
    }

    /// One write per field whose live value differs from the stored one.
    pub fn updates(&self) -> Vec<WatermarkUpdate> {
        WatermarkField::ALL
            .into_iter()
            .filter(|&field| self.next.get(field) != self.stored.get(field))
            .map(|field| WatermarkUpdate {
                field,
                value: self.next.get(field),
            })
            .collect()
    }

    /// New pinned rows in page order.
    pub fn new_pinned<'a>(&self, snapshot: &'a ListingSnapshot) -> &'a [RawRow] {
        &snapshot.pinned[..self.pinned_new.min(snapshot.pinned.len())]
    }

    /// New sequential rows in page order.
    pub fn new_sequential<'a>(&self, snapshot: &'a ListingSnapshot) -> &'a [RawRow] {
        &snapshot.sequential[..self.sequential_new.min(snapshot.sequential.len())]
    }
}

/// Compare a validated listing with the stored watermark.
///
/// `window` optionally caps how many sequential rows one listing may yield.
/// Fails only when the first sequential row carries no usable number.
pub fn detect_changes(
    snapshot: &ListingSnapshot,
    stored: Watermark,
    window: Option<usize>,
) -> Result<ChangePlan> {
    let live_pinned = snapshot.pinned_count();
    let live_max = snapshot.sequential_max()?;

    let pinned_new = if live_pinned > stored.pinned_count {
        (live_pinned - stored.pinned_count) as usize
    } else {
        0
    };

    let sequential_new = if live_max > stored.sequential_max {
        let gap = usize::try_from(live_max - stored.sequential_max).unwrap_or(usize::MAX);
        let present = gap.min(snapshot.sequential.len());
        window.map_or(present, |cap| present.min(cap))
    } else {
        0
    };

    Ok(ChangePlan {
        stored,
        next: Watermark::new(live_pinned, live_max),
        pinned_new,
        sequential_new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, title: &str) -> RawRow {
        RawRow {
            id_text: Some(id.to_string()),
            title: Some(title.to_string()),
            ..RawRow::default()
        }
    }

    fn pinned(titles: &[&str]) -> Vec<RawRow> {
        titles
            .iter()
            .map(|t| RawRow {
                has_marker: true,
                ..row("공지", t)
            })
            .collect()
    }

    fn sequential(ids: &[u64]) -> Vec<RawRow> {
        ids.iter()
            .map(|n| row(&n.to_string(), &format!("Notice {n}")))
            .collect()
    }

    fn titles(rows: &[RawRow]) -> Vec<&str> {
        rows.iter().filter_map(|r| r.title.as_deref()).collect()
    }

    #[test]
    fn test_no_change_is_idempotent() {
        let snapshot = ListingSnapshot {
            pinned: pinned(&["A", "B"]),
            sequential: sequential(&[50, 49, 48]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(2, 50), None).unwrap();

        assert!(!plan.has_new());
        assert!(plan.new_pinned(&snapshot).is_empty());
        assert!(plan.new_sequential(&snapshot).is_empty());
        assert!(plan.updates().is_empty());
    }

    #[test]
    fn test_pinned_decrease_is_correction() {
        let snapshot = ListingSnapshot {
            pinned: pinned(&["A", "B", "C"]),
            sequential: sequential(&[50]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(5, 50), None).unwrap();

        assert_eq!(plan.pinned_new, 0);
        assert_eq!(plan.next.pinned_count, 3);
        assert_eq!(
            plan.updates(),
            vec![WatermarkUpdate {
                field: WatermarkField::Pinned,
                value: 3
            }]
        );
    }

    #[test]
    fn test_sequential_decrease_is_correction() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: sequential(&[98, 97]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(0, 100), None).unwrap();

        assert_eq!(plan.sequential_new, 0);
        assert_eq!(plan.next.sequential_max, 98);
        assert_eq!(plan.updates().len(), 1);
    }

    #[test]
    fn test_sequential_window_matches_gap() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: sequential(&[104, 103, 102, 101, 100, 99]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(0, 100), None).unwrap();

        assert_eq!(
            titles(plan.new_sequential(&snapshot)),
            vec!["Notice 104", "Notice 103", "Notice 102", "Notice 101"]
        );
        assert_eq!(plan.next.sequential_max, 104);
    }

    #[test]
    fn test_sequential_window_clamped_to_rows_present() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: sequential(&[104, 101]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(0, 100), None).unwrap();

        assert_eq!(plan.sequential_new, 2);
        assert_eq!(plan.next.sequential_max, 104);
        assert_eq!(
            plan.updates(),
            vec![WatermarkUpdate {
                field: WatermarkField::Sequential,
                value: 104
            }]
        );
    }

    #[test]
    fn test_configured_window_caps_sequential() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: sequential(&[110, 109, 108, 107]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(0, 100), Some(3)).unwrap();

        assert_eq!(plan.sequential_new, 3);
        assert_eq!(plan.next.sequential_max, 110);
    }

    #[test]
    fn test_both_streams_grow() {
        let snapshot = ListingSnapshot {
            pinned: pinned(&["A", "B", "C"]),
            sequential: sequential(&[51, 50, 49]),
        };
        let plan = detect_changes(&snapshot, Watermark::new(2, 50), None).unwrap();

        assert_eq!(titles(plan.new_pinned(&snapshot)), vec!["A"]);
        assert_eq!(titles(plan.new_sequential(&snapshot)), vec!["Notice 51"]);
        assert_eq!(plan.next, Watermark::new(3, 51));
        assert_eq!(plan.updates().len(), 2);
    }

    #[test]
    fn test_non_numeric_first_row_fails() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: vec![row("N/A", "broken")],
        };
        assert!(detect_changes(&snapshot, Watermark::default(), None).is_err());
    }
}

//! Parsed state of one listing page fetch.

use crate::error::{AppError, Result};

/// Raw cell captures for one listing row.
///
/// Captured while the document is alive so that only rows that turn out to
/// be new are turned into notice records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// Row carries the board's pinned marker
    pub has_marker: bool,
    pub id_text: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub href: Option<String>,
    pub department: Option<String>,
    pub date: Option<String>,
}

/// Pinned and sequential rows in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSnapshot {
    pub pinned: Vec<RawRow>,
    pub sequential: Vec<RawRow>,
}

impl ListingSnapshot {
    pub fn pinned_count(&self) -> u64 {
        self.pinned.len() as u64
    }

    /// Number of the first (highest-numbered) sequential row.
    pub fn sequential_max(&self) -> Result<u64> {
        let first = self
            .sequential
            .first()
            .ok_or_else(|| AppError::parse("sequential rows", "listing has no sequential rows"))?;
        let text = first
            .id_text
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| AppError::parse("sequential id", "first row has no id cell"))?;
        text.parse()
            .map_err(|e| AppError::parse("sequential id", format!("'{text}' is not a number: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> RawRow {
        RawRow {
            id_text: Some(id.to_string()),
            ..RawRow::default()
        }
    }

    #[test]
    fn test_sequential_max_reads_first_row() {
        let snapshot = ListingSnapshot {
            pinned: vec![RawRow::default()],
            sequential: vec![row(" 104 "), row("103")],
        };
        assert_eq!(snapshot.sequential_max().unwrap(), 104);
        assert_eq!(snapshot.pinned_count(), 1);
    }

    #[test]
    fn test_sequential_max_rejects_non_numeric() {
        let snapshot = ListingSnapshot {
            pinned: Vec::new(),
            sequential: vec![row("공지")],
        };
        assert!(matches!(
            snapshot.sequential_max(),
            Err(AppError::Parse { .. })
        ));
    }

    #[test]
    fn test_sequential_max_requires_rows() {
        assert!(ListingSnapshot::default().sequential_max().is_err());
    }
}

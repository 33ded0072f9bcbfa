//! Transaction log
//!
//! Append-only record of the create/modify/delete actions one import
//! session actually applied, for audit and reporting. A failed or aborted
//! import leaves the log as the trail of what succeeded before the
//! failure; there is no rollback.

use caravan_model::ObjectKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Action applied to one object on the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxAction {
    Created,
    Modified,
    Deleted,
}

/// One applied action
///
/// `seq` is monotone per session and is the authoritative ordering;
/// timestamps can tie at clock resolution.
#[derive(Debug, Clone, Serialize)]
pub struct TxEntry {
    pub seq: u64,
    pub kind: ObjectKind,
    pub display_name: String,
    pub action: TxAction,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-session log
///
/// Accessed strictly sequentially by the install coordinator; entries are
/// never mutated after append.
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: Vec<TxEntry>,
}

impl TransactionLog {
    /// Create an empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one action, returning its sequence number
    pub fn append(
        &mut self,
        kind: ObjectKind,
        display_name: impl Into<String>,
        action: TxAction,
    ) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(TxEntry {
            seq,
            kind,
            display_name: display_name.into(),
            action,
            timestamp: Utc::now(),
        });
        seq
    }

    /// All entries in append order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TxEntry] {
        &self.entries
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if log is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the log as a JSON report for operators
    ///
    /// # Errors
    /// Serialization failure only; entry contents are plain data.
    pub fn to_report_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_ordered_and_monotone() {
        let mut log = TransactionLog::new();
        log.append(ObjectKind::new("role"), "Contributor", TxAction::Created);
        log.append(ObjectKind::new("community"), "Editors", TxAction::Created);
        log.append(ObjectKind::new("community"), "Editors", TxAction::Modified);

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].seq, 0);
        assert_eq!(entries[1].seq, 1);
        assert_eq!(entries[2].seq, 2);
        assert_eq!(entries[0].action, TxAction::Created);
        assert_eq!(entries[2].action, TxAction::Modified);
    }

    #[test]
    fn report_json_contains_actions() {
        let mut log = TransactionLog::new();
        log.append(ObjectKind::new("role"), "Contributor", TxAction::Created);

        let report = log.to_report_json().unwrap();
        assert!(report.contains("Created"));
        assert!(report.contains("Contributor"));
    }
}

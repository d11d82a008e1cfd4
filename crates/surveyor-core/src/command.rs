//! Optimistic local mutations with explicit compensation
//!
//! A mutation captures the pre-image of the local state, applies its change
//! before the remote write completes, and either commits or restores the
//! pre-image when the remote write fails.

use surveyor_types::{Damage, Scan};
use tracing::{debug, warn};

/// What the client currently believes about one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LocalState {
    pub scan: Option<Scan>,
    pub damages: Vec<Damage>,
}

#[derive(Debug)]
#[must_use = "a transaction must be committed or compensated"]
pub(crate) struct Transaction {
    label: &'static str,
    pre_image: LocalState,
}

impl Transaction {
    pub fn begin(label: &'static str, state: &LocalState) -> Self {
        debug!(mutation = label, "Capturing pre-image");
        Self {
            label,
            pre_image: state.clone(),
        }
    }

    pub fn commit(self) {
        debug!(mutation = self.label, "Committed");
    }

    /// Restore everything the mutation touched
    pub fn compensate(self, state: &mut LocalState) {
        warn!(mutation = self.label, "Remote write failed, restoring local state");
        *state = self.pre_image;
    }

    /// Restore only the scan row, keeping changes to the damage list
    pub fn compensate_scan(self, state: &mut LocalState) {
        warn!(
            mutation = self.label,
            "Aggregate write failed, restoring scan totals"
        );
        state.scan = self.pre_image.scan;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn damage(id: &str) -> Damage {
        serde_json::from_value(json!({"id": id, "scan_id": "s", "part_name": "Hood", "damage_type": "Dent"}))
            .unwrap()
    }

    #[test]
    fn test_compensate_restores_pre_image() {
        let mut state = LocalState {
            scan: None,
            damages: vec![damage("a"), damage("b")],
        };
        let tx = Transaction::begin("remove", &state);
        state.damages.retain(|d| d.id != "a");
        assert_eq!(state.damages.len(), 1);

        tx.compensate(&mut state);
        assert_eq!(state.damages.len(), 2);
        assert_eq!(state.damages[0].id, "a");
    }

    #[test]
    fn test_compensate_scan_keeps_damages() {
        let mut state = LocalState::default();
        let tx = Transaction::begin("add", &state);
        state.damages.push(damage("new"));

        tx.compensate_scan(&mut state);
        assert_eq!(state.damages.len(), 1);
        assert!(state.scan.is_none());
    }
}

//! Scans and their running aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::damage::Damage;
use crate::wire;

/// A row of the `scans` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    #[serde(rename = "user_id", alias = "owner_id", default)]
    pub owner_id: String,
    #[serde(default)]
    pub car_name: String,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub processed_image_url: Option<String>,
    #[serde(default)]
    pub heatmap_image_url: Option<String>,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub damage_count: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "pdf_url")]
    pub report_pdf_url: Option<String>,
}

impl Scan {
    pub fn aggregates(&self) -> ScanAggregates {
        ScanAggregates {
            total_cost: self.total_cost,
            damage_count: self.damage_count,
        }
    }

    pub fn set_aggregates(&mut self, aggregates: ScanAggregates) {
        self.total_cost = aggregates.total_cost;
        self.damage_count = aggregates.damage_count;
    }
}

/// The two denormalized columns a scan keeps in step with its damages.
/// Nothing on the server enforces them; the client rewrites both after
/// every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanAggregates {
    pub total_cost: f64,
    pub damage_count: u32,
}

impl ScanAggregates {
    pub fn after_add(self, cost: f64) -> Self {
        Self {
            total_cost: self.total_cost + cost,
            damage_count: self.damage_count.saturating_add(1),
        }
    }

    /// Floors at zero: a drifted total never goes negative
    pub fn after_remove(self, cost: f64) -> Self {
        Self {
            total_cost: (self.total_cost - cost).max(0.0),
            damage_count: self.damage_count.saturating_sub(1),
        }
    }

    pub fn from_damages(damages: &[Damage]) -> Self {
        Self {
            total_cost: damages.iter().map(Damage::effective_cost).sum(),
            damage_count: damages.len() as u32,
        }
    }

    /// Equal within a hundredth of a currency unit
    pub fn matches(&self, other: &ScanAggregates) -> bool {
        self.damage_count == other.damage_count
            && (self.total_cost - other.total_cost).abs() < 0.01
    }
}

/// Render a cost with thousands separators, e.g. `18,000`
pub fn format_cost(cost: f64) -> String {
    let rounded = cost.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scan_reads_user_id_column() {
        let scan: Scan = serde_json::from_value(json!({
            "id": "abc123",
            "user_id": "user-1",
            "car_name": "Honda City",
            "created_at": "2025-01-02T03:04:05.123456",
            "total_cost": 8500,
            "damage_count": 2,
            "status": "complete",
            "pdf_url": "https://cdn/report.pdf"
        }))
        .unwrap();

        assert_eq!(scan.owner_id, "user-1");
        assert_eq!(scan.total_cost, 8500.0);
        assert_eq!(scan.report_pdf_url.as_deref(), Some("https://cdn/report.pdf"));
        assert!(scan.created_at.is_some());

        let value = serde_json::to_value(&scan).unwrap();
        assert_eq!(value["user_id"], "user-1");
    }

    #[test]
    fn test_delete_scenario_aggregates() {
        let before = ScanAggregates {
            total_cost: 8500.0,
            damage_count: 3,
        };
        let after = before.after_remove(3000.0);
        assert_eq!(after.total_cost, 5500.0);
        assert_eq!(after.damage_count, 2);
    }

    #[test]
    fn test_remove_floors_at_zero() {
        let before = ScanAggregates {
            total_cost: 1000.0,
            damage_count: 0,
        };
        let after = before.after_remove(5000.0);
        assert_eq!(after.total_cost, 0.0);
        assert_eq!(after.damage_count, 0);
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "0");
        assert_eq!(format_cost(999.4), "999");
        assert_eq!(format_cost(18000.0), "18,000");
        assert_eq!(format_cost(1234567.0), "1,234,567");
        assert_eq!(format_cost(-5500.0), "-5,500");
    }
}

//! Cost breakdown of the damages currently loaded for a scan

use std::fmt;

use surveyor_types::{
    format_cost, Confidence, Damage, DamageGrade, DamageStatus, DamageType, Scan, ScanAggregates,
};

/// Coarse severity bucket used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityBand {
    Low,
    Medium,
    High,
}

impl SeverityBand {
    pub fn from_severity(severity: u8) -> Self {
        if severity > 70 {
            SeverityBand::High
        } else if severity > 40 {
            SeverityBand::Medium
        } else {
            SeverityBand::Low
        }
    }
}

impl fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityBand::Low => write!(f, "low"),
            SeverityBand::Medium => write!(f, "medium"),
            SeverityBand::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub damage_id: String,
    pub part_name: String,
    pub damage_type: DamageType,
    pub severity: u8,
    pub band: SeverityBand,
    pub cost: f64,
    pub action: String,
    pub status: DamageStatus,
    pub confidence: Option<Confidence>,
    pub is_manual: bool,
    pub requires_verification: bool,
}

impl From<&Damage> for ReportLine {
    fn from(damage: &Damage) -> Self {
        let severity = damage.display_severity();
        Self {
            damage_id: damage.id.clone(),
            part_name: damage.part_name.clone(),
            damage_type: damage.damage_type.clone(),
            severity,
            band: SeverityBand::from_severity(severity),
            cost: damage.effective_cost(),
            action: damage.action.clone(),
            status: damage.status,
            confidence: damage.confidence,
            is_manual: damage.is_manual,
            requires_verification: damage.requires_verification(),
        }
    }
}

/// Stored totals disagree with the rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateDrift {
    pub stored: ScanAggregates,
    pub computed: ScanAggregates,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub scan_id: String,
    pub car_name: String,
    pub stored: ScanAggregates,
    pub lines: Vec<ReportLine>,
}

impl Report {
    pub fn build(scan: &Scan, damages: &[Damage]) -> Self {
        Self {
            scan_id: scan.id.clone(),
            car_name: scan.car_name.clone(),
            stored: scan.aggregates(),
            lines: damages.iter().map(ReportLine::from).collect(),
        }
    }

    pub fn computed(&self) -> ScanAggregates {
        ScanAggregates {
            total_cost: self.computed_total(),
            damage_count: self.lines.len() as u32,
        }
    }

    pub fn computed_total(&self) -> f64 {
        self.lines.iter().map(|line| line.cost).sum()
    }

    /// Totals are rewritten by each client without coordination, so they
    /// can drift from the rows. Nothing here corrects it.
    pub fn aggregate_drift(&self) -> Option<AggregateDrift> {
        let computed = self.computed();
        (!self.stored.matches(&computed)).then_some(AggregateDrift {
            stored: self.stored,
            computed,
        })
    }

    pub fn pending_verification(&self) -> impl Iterator<Item = &ReportLine> {
        self.lines.iter().filter(|line| line.requires_verification)
    }

    pub fn grade(&self) -> DamageGrade {
        DamageGrade::from_total_cost(self.computed_total())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan {} ({})", self.scan_id, self.car_name)?;
        writeln!(
            f,
            "{:<10} {:<26} {:<12} {:>9} {:>10}  {:<12} {}",
            "ID", "PART", "TYPE", "SEVERITY", "COST", "STATUS", "ACTION"
        )?;
        for line in &self.lines {
            let marker = if line.requires_verification { " *" } else { "" };
            writeln!(
                f,
                "{:<10} {:<26} {:<12} {:>4} {:<4} {:>10}  {:<12} {}{}",
                truncate(&line.damage_id, 10),
                truncate(&line.part_name, 26),
                line.damage_type.as_str(),
                line.severity,
                line.band.to_string(),
                format_cost(line.cost),
                line.status.to_string(),
                line.action,
                marker
            )?;
        }
        writeln!(
            f,
            "Total: ₹{} across {} damage(s), grade {}",
            format_cost(self.computed_total()),
            self.lines.len(),
            self.grade()
        )?;
        if let Some(drift) = self.aggregate_drift() {
            writeln!(
                f,
                "Stored total ₹{} / {} damage(s) differs from the rows",
                format_cost(drift.stored.total_cost),
                drift.stored.damage_count
            )?;
        }
        if self.pending_verification().next().is_some() {
            writeln!(f, "* needs three close-up photos to verify")?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).chain(['…']).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scan(total_cost: f64, damage_count: u32) -> Scan {
        serde_json::from_value(json!({
            "id": "abc123",
            "car_name": "Honda City",
            "total_cost": total_cost,
            "damage_count": damage_count
        }))
        .unwrap()
    }

    fn damages() -> Vec<Damage> {
        serde_json::from_value(json!([
            {"id": "d1", "scan_id": "abc123", "type": "Dent", "part": "Hood",
             "severity": 62, "cost": 3000, "detection_source": "ai"},
            {"id": "d2", "scan_id": "abc123", "damage_type": "Scratch", "part_name": "Trunk",
             "is_manual": true, "detection_source": "manual", "preliminary_severity": 50,
             "preliminary_cost": 5000, "cost": 0, "action": "Pending AI Verification"},
            {"id": "d3", "scan_id": "abc123", "damage_type": "Crack", "part_name": "Roof",
             "preliminary_severity": 30, "final_severity": 85, "confidence": "high",
             "cost": 500}
        ]))
        .unwrap()
    }

    #[test]
    fn test_bands() {
        assert_eq!(SeverityBand::from_severity(71), SeverityBand::High);
        assert_eq!(SeverityBand::from_severity(70), SeverityBand::Medium);
        assert_eq!(SeverityBand::from_severity(41), SeverityBand::Medium);
        assert_eq!(SeverityBand::from_severity(40), SeverityBand::Low);
    }

    #[test]
    fn test_lines_use_display_values() {
        let report = Report::build(&scan(8500.0, 3), &damages());

        let severities: Vec<_> = report.lines.iter().map(|l| (l.severity, l.band)).collect();
        assert_eq!(
            severities,
            vec![
                (62, SeverityBand::Medium),
                (50, SeverityBand::Medium),
                (85, SeverityBand::High)
            ]
        );
        // Zero cost falls back to the preliminary estimate
        assert_eq!(report.lines[1].cost, 5000.0);
        assert_eq!(report.computed_total(), 8500.0);
        assert_eq!(report.aggregate_drift(), None);
        assert_eq!(report.grade(), DamageGrade::Severe);
    }

    #[test]
    fn test_pending_verification() {
        let report = Report::build(&scan(8500.0, 3), &damages());
        let pending: Vec<_> = report
            .pending_verification()
            .map(|l| l.damage_id.as_str())
            .collect();
        assert_eq!(pending, vec!["d2"]);
    }

    #[test]
    fn test_drift_reported() {
        let report = Report::build(&scan(12000.0, 4), &damages());
        let drift = report.aggregate_drift().unwrap();
        assert_eq!(drift.stored.total_cost, 12000.0);
        assert_eq!(drift.computed.total_cost, 8500.0);
        assert_eq!(drift.computed.damage_count, 3);
        assert!(report.to_string().contains("differs from the rows"));
    }

    #[test]
    fn test_display_lists_every_damage() {
        let text = Report::build(&scan(8500.0, 3), &damages()).to_string();
        assert!(text.contains("Hood"));
        assert!(text.contains("Trunk"));
        assert!(text.contains("Roof"));
        assert!(text.contains("Total: ₹8,500 across 3 damage(s), grade Severe"));
        assert!(text.contains("* needs three close-up photos"));
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(&scan(0.0, 0), &[]);
        assert_eq!(report.computed_total(), 0.0);
        assert_eq!(report.grade(), DamageGrade::Minor);
        assert_eq!(report.aggregate_drift(), None);
    }
}

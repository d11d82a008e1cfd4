//! Damage records
//!
//! A damage is either detected by the inference service (bulk-inserted with
//! its scan) or marked by hand in the client. Manual dents and scratches stay
//! `preliminary` until the refinement service scores them from three
//! close-up photos.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;
use crate::wire;

/// Severity given to a manual damage before refinement
pub const MANUAL_DEFAULT_SEVERITY: u8 = 50;

/// Cost given to a manual damage before refinement
pub const MANUAL_DEFAULT_COST: f64 = 5000.0;

pub const ACTION_PENDING_VERIFICATION: &str = "Pending AI Verification";
pub const ACTION_MANUAL_ENTRY: &str = "Manual Entry";
const ACTION_FALLBACK: &str = "Repair";

/// Damage types offered when marking by hand
pub const MANUAL_DAMAGE_TYPES: [&str; 5] = ["Dent", "Scratch", "Paint Chip", "Crack", "Other"];

/// Body panels offered when marking by hand
pub const CAR_PARTS: [&str; 17] = [
    "Front Bumper",
    "Rear Bumper",
    "Hood",
    "Roof",
    "Trunk",
    "Front Left Door",
    "Front Right Door",
    "Rear Left Door",
    "Rear Right Door",
    "Front Left Fender",
    "Front Right Fender",
    "Rear Left Fender",
    "Rear Right Fender",
    "Front Left Quarter Panel",
    "Front Right Quarter Panel",
    "Rear Left Quarter Panel",
    "Rear Right Quarter Panel",
];

/// Kind of damage. Labels are matched case-insensitively; anything the
/// client has no rule for is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DamageType {
    Dent,
    Scratch,
    PaintChip,
    Crack,
    Other(String),
}

impl DamageType {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "dent" => DamageType::Dent,
            "scratch" => DamageType::Scratch,
            "paint chip" | "paint_chip" | "paintchip" => DamageType::PaintChip,
            "crack" => DamageType::Crack,
            _ => DamageType::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DamageType::Dent => "Dent",
            DamageType::Scratch => "Scratch",
            DamageType::PaintChip => "Paint Chip",
            DamageType::Crack => "Crack",
            DamageType::Other(label) => label,
        }
    }

    /// Dents and scratches cannot be costed from a single wide shot
    pub fn requires_verification(&self) -> bool {
        matches!(self, DamageType::Dent | DamageType::Scratch)
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DamageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DamageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(DamageType::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    #[default]
    Ai,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageStatus {
    #[default]
    Preliminary,
    Verified,
}

impl fmt::Display for DamageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageStatus::Preliminary => write!(f, "preliminary"),
            DamageStatus::Verified => write!(f, "verified"),
        }
    }
}

/// Agreement between the three close-up severity scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Location on the scan image as percentages (0-100) of the image content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(alias = "x")]
    pub x_pct: f64,
    #[serde(alias = "y")]
    pub y_pct: f64,
}

impl Position {
    pub fn new(x_pct: f64, y_pct: f64) -> Result<Self, ValidationError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(x_pct) || !in_range(y_pct) {
            return Err(ValidationError::PositionOutOfRange { x: x_pct, y: y_pct });
        }
        Ok(Self { x_pct, y_pct })
    }
}

/// A row of the `damages` table in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DamageRow")]
pub struct Damage {
    pub id: String,
    pub scan_id: String,
    pub part_name: String,
    pub damage_type: DamageType,
    pub is_manual: bool,
    pub detection_source: DetectionSource,
    pub preliminary_severity: u8,
    pub final_severity: Option<u8>,
    pub preliminary_cost: f64,
    pub cost: f64,
    pub action: String,
    pub status: DamageStatus,
    pub confidence: Option<Confidence>,
    pub severity_scores: Option<Vec<u8>>,
    pub notes: Option<String>,
    pub position: Option<Position>,
}

impl Damage {
    /// Severity to show: the refined score once there is one
    pub fn display_severity(&self) -> u8 {
        self.final_severity.unwrap_or(self.preliminary_severity)
    }

    /// Cost that counts toward the scan total. A zero cost falls back to the
    /// preliminary estimate.
    pub fn effective_cost(&self) -> f64 {
        if self.cost > 0.0 {
            self.cost
        } else {
            self.preliminary_cost.max(0.0)
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == DamageStatus::Verified
    }

    /// Manual dents and scratches must be refined before they are final
    pub fn requires_verification(&self) -> bool {
        self.detection_source == DetectionSource::Manual
            && self.damage_type.requires_verification()
            && !self.is_verified()
    }
}

/// Wire shape of a damage row. Older rows and raw detector output use
/// `type`, `part` and `severity`; everything is optional here and
/// normalized in `From<DamageRow> for Damage`.
#[derive(Deserialize)]
struct DamageRow {
    #[serde(default, deserialize_with = "wire::optional_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_id")]
    scan_id: Option<String>,
    #[serde(default, alias = "part")]
    part_name: Option<String>,
    #[serde(default, alias = "type")]
    damage_type: Option<DamageType>,
    #[serde(default)]
    is_manual: Option<bool>,
    #[serde(default)]
    detection_source: Option<DetectionSource>,
    #[serde(default, alias = "severity")]
    preliminary_severity: Option<u8>,
    #[serde(default)]
    final_severity: Option<u8>,
    #[serde(default)]
    preliminary_cost: Option<f64>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    status: Option<DamageStatus>,
    #[serde(default)]
    confidence: Option<Confidence>,
    #[serde(default)]
    severity_scores: Option<Vec<u8>>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    position: Option<Position>,
}

impl From<DamageRow> for Damage {
    fn from(row: DamageRow) -> Self {
        let id = row.id.unwrap_or_default();
        let detection_source = row.detection_source.unwrap_or(if row.is_manual == Some(true) {
            DetectionSource::Manual
        } else {
            DetectionSource::Ai
        });

        // verified <=> refined severity and confidence are both present
        let refined = row.final_severity.is_some() && row.confidence.is_some();
        let status = if refined {
            DamageStatus::Verified
        } else {
            DamageStatus::Preliminary
        };
        if let Some(stated) = row.status {
            if stated != status {
                tracing::warn!(
                    damage_id = %id,
                    stated = %stated,
                    normalized = %status,
                    "Damage status disagrees with refinement fields"
                );
            }
        }

        Damage {
            id,
            scan_id: row.scan_id.unwrap_or_default(),
            part_name: row
                .part_name
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            damage_type: row
                .damage_type
                .unwrap_or_else(|| DamageType::Other("Unknown".to_string())),
            is_manual: row.is_manual.unwrap_or(false) || detection_source == DetectionSource::Manual,
            detection_source,
            preliminary_severity: row
                .preliminary_severity
                .or(row.final_severity)
                .unwrap_or(MANUAL_DEFAULT_SEVERITY),
            final_severity: row.final_severity,
            preliminary_cost: row.preliminary_cost.or(row.cost).unwrap_or(0.0),
            cost: row.cost.or(row.preliminary_cost).unwrap_or(0.0),
            action: row
                .action
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| ACTION_FALLBACK.to_string()),
            status,
            confidence: row.confidence,
            severity_scores: row.severity_scores,
            notes: row.notes.filter(|n| !n.trim().is_empty()),
            position: row.position,
        }
    }
}

/// User input for a hand-marked damage
#[derive(Debug, Clone, PartialEq)]
pub struct DamageDraft {
    pub damage_type: DamageType,
    pub part_name: String,
    pub notes: Option<String>,
    pub position: Option<Position>,
}

impl DamageDraft {
    pub fn new(damage_type: DamageType, part_name: impl Into<String>) -> Self {
        Self {
            damage_type,
            part_name: part_name.into(),
            notes: None,
            position: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.damage_type.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("damage type"));
        }
        if self.part_name.trim().is_empty() {
            return Err(ValidationError::MissingField("part"));
        }
        Ok(())
    }
}

/// Insert payload for the `damages` table; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDamage {
    pub scan_id: String,
    pub part_name: String,
    pub damage_type: DamageType,
    pub is_manual: bool,
    pub detection_source: DetectionSource,
    pub preliminary_severity: u8,
    pub preliminary_cost: f64,
    pub final_severity: Option<u8>,
    pub cost: f64,
    pub action: String,
    pub status: DamageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl NewDamage {
    /// Row for a hand-marked damage with the pre-refinement defaults
    pub fn manual(scan_id: &str, draft: &DamageDraft) -> Self {
        let action = if draft.damage_type.requires_verification() {
            ACTION_PENDING_VERIFICATION
        } else {
            ACTION_MANUAL_ENTRY
        };

        Self {
            scan_id: scan_id.to_string(),
            part_name: draft.part_name.trim().to_string(),
            damage_type: draft.damage_type.clone(),
            is_manual: true,
            detection_source: DetectionSource::Manual,
            preliminary_severity: MANUAL_DEFAULT_SEVERITY,
            preliminary_cost: MANUAL_DEFAULT_COST,
            final_severity: None,
            cost: MANUAL_DEFAULT_COST,
            action: action.to_string(),
            status: DamageStatus::Preliminary,
            notes: draft.notes.clone().filter(|n| !n.trim().is_empty()),
            position: draft.position,
        }
    }
}

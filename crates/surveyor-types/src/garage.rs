//! Cars in the user's garage and insurance claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::damage::Damage;
use crate::error::ValidationError;
use crate::upload::ImageUpload;
use crate::wire;

/// Storage bucket that holds car photos and documents
pub const CAR_FILES_BUCKET: &str = "images";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    pub model_name: String,
    #[serde(default)]
    pub reg_number: String,
    #[serde(default)]
    pub car_photo_url: Option<String>,
    #[serde(default)]
    pub insurance_doc_url: Option<String>,
    #[serde(default)]
    pub rc_doc_url: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCar {
    pub model_name: String,
    pub reg_number: String,
    pub car_photo_url: Option<String>,
    pub insurance_doc_url: Option<String>,
    pub rc_doc_url: Option<String>,
}

impl NewCar {
    pub fn new(model_name: impl Into<String>, reg_number: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            reg_number: reg_number.into(),
            car_photo_url: None,
            insurance_doc_url: None,
            rc_doc_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model_name.trim().is_empty() {
            return Err(ValidationError::MissingField("model name"));
        }
        if self.reg_number.trim().is_empty() {
            return Err(ValidationError::MissingField("registration number"));
        }
        Ok(())
    }
}

/// Files attached when a car is registered, uploaded before the row is
/// inserted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarDocuments {
    pub photo: Option<ImageUpload>,
    pub insurance: Option<ImageUpload>,
    pub rc: Option<ImageUpload>,
}

impl CarDocuments {
    /// The photo must be an image; documents may be any file type
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(photo) = &self.photo {
            photo.validate()?;
        }
        for document in [&self.insurance, &self.rc].into_iter().flatten() {
            document.validate_size()?;
        }
        Ok(())
    }
}

/// Object name for an uploaded car file, e.g. `car_1700000000000_front.jpg`
pub fn car_object_name(prefix: &str, millis: i64, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}_{millis}_{safe}")
}

/// Coarse grade filed with a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageGrade {
    Minor,
    Moderate,
    Severe,
}

impl DamageGrade {
    pub fn from_total_cost(total_cost: f64) -> Self {
        if total_cost > 2000.0 {
            DamageGrade::Severe
        } else if total_cost > 1000.0 {
            DamageGrade::Moderate
        } else {
            DamageGrade::Minor
        }
    }
}

impl std::fmt::Display for DamageGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DamageGrade::Minor => write!(f, "Minor"),
            DamageGrade::Moderate => write!(f, "Moderate"),
            DamageGrade::Severe => write!(f, "Severe"),
        }
    }
}

/// One damage as filed with a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLine {
    pub part: String,
    pub damage_type: String,
    pub severity: u8,
    pub action: String,
    pub estimated_cost: f64,
}

impl From<&Damage> for ClaimLine {
    fn from(damage: &Damage) -> Self {
        Self {
            part: damage.part_name.clone(),
            damage_type: damage.damage_type.as_str().to_string(),
            severity: damage.display_severity(),
            action: damage.action.clone(),
            estimated_cost: damage.effective_cost(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub car_name: String,
}

/// A row of the `claims` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::optional_id")]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub total_cost: f64,
    pub damage_grade: DamageGrade,
    #[serde(default)]
    pub breakdown: Vec<ClaimLine>,
    #[serde(default)]
    pub vehicle_info: Option<VehicleInfo>,
    #[serde(default, deserialize_with = "wire::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClaim {
    pub scan_id: String,
    pub image_url: Option<String>,
    pub total_cost: f64,
    pub damage_grade: DamageGrade,
    pub breakdown: Vec<ClaimLine>,
    pub vehicle_info: VehicleInfo,
}

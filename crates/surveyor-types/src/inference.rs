//! Requests to and replies from the inference service

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::damage::{Confidence, DamageType};
use crate::error::{ResponseError, ValidationError};
use crate::scan::format_cost;
use crate::upload::ImageUpload;
use crate::wire;

/// Payload of `POST /analyze`
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub image: ImageUpload,
    pub user_id: String,
    pub car_name: String,
}

/// One damage as reported by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedDamage {
    #[serde(alias = "type")]
    pub damage_type: DamageType,
    #[serde(alias = "part")]
    pub part_name: String,
    #[serde(default)]
    pub severity: Option<u8>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Reply of `POST /analyze`. On failure the service answers with an
/// `{error, details}` body instead of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_id")]
    pub scan_id: Option<String>,
    #[serde(default, alias = "total_estimate")]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub damages: Vec<DetectedDamage>,
    #[serde(default)]
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub processed_image_url: Option<String>,
    #[serde(default)]
    pub heatmap_image_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AnalysisResponse {
    /// The scan the service created, or why there is none
    pub fn scan_id(&self) -> Result<&str, ResponseError> {
        if let Some(error) = &self.error {
            let reason = match &self.details {
                Some(serde_json::Value::String(details)) => format!("{error}: {details}"),
                Some(serde_json::Value::Null) | None => error.clone(),
                Some(details) => format!("{error}: {details}"),
            };
            return Err(ResponseError::Rejected(reason));
        }
        match self.scan_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ResponseError::MissingField("scan_id")),
        }
    }
}

/// Close-up photo angles used for refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Angle {
    Left,
    Center,
    Right,
}

impl Angle {
    pub const ALL: [Angle; 3] = [Angle::Left, Angle::Center, Angle::Right];

    /// Multipart field name expected by the refinement endpoint
    pub fn form_field(self) -> &'static str {
        match self {
            Angle::Left => "file_left",
            Angle::Center => "file_center",
            Angle::Right => "file_right",
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Angle::Left => write!(f, "left"),
            Angle::Center => write!(f, "center"),
            Angle::Right => write!(f, "right"),
        }
    }
}

impl std::str::FromStr for Angle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Angle::Left),
            "center" | "centre" => Ok(Angle::Center),
            "right" => Ok(Angle::Right),
            _ => Err(ValidationError::MissingField("angle")),
        }
    }
}

/// All three close-ups. Having one of these means every slot is filled.
#[derive(Debug, Clone, PartialEq)]
pub struct AnglePhotos {
    pub left: ImageUpload,
    pub center: ImageUpload,
    pub right: ImageUpload,
}

impl AnglePhotos {
    pub fn get(&self, angle: Angle) -> &ImageUpload {
        match angle {
            Angle::Left => &self.left,
            Angle::Center => &self.center,
            Angle::Right => &self.right,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        Angle::ALL
            .iter()
            .try_for_each(|angle| self.get(*angle).validate())
    }
}

/// Payload of `POST /analyze/refine`
#[derive(Debug, Clone)]
pub struct RefineRequest {
    pub damage_id: String,
    pub part_name: String,
    pub damage_type: DamageType,
    pub photos: AnglePhotos,
}

/// Reply of `POST /analyze/refine`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefineResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "wire::optional_id")]
    pub damage_id: Option<String>,
    #[serde(default)]
    pub final_severity: Option<u8>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub severity_scores: Option<Vec<u8>>,
    #[serde(default)]
    pub closeup_urls: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RefineResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Accept the verdict only when the service reports success and every
    /// field a verified damage needs is present
    pub fn into_result(self) -> Result<VerificationResult, ResponseError> {
        if !self.is_success() {
            return Err(ResponseError::Rejected(
                self.message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Refinement failed".to_string()),
            ));
        }

        Ok(VerificationResult {
            final_severity: self
                .final_severity
                .ok_or(ResponseError::MissingField("final_severity"))?,
            action: self.action.ok_or(ResponseError::MissingField("action"))?,
            cost: self.cost.ok_or(ResponseError::MissingField("cost"))?,
            confidence: self
                .confidence
                .ok_or(ResponseError::MissingField("confidence"))?,
            severity_scores: self.severity_scores.unwrap_or_default(),
        })
    }
}

/// A successful refinement verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub final_severity: u8,
    pub action: String,
    pub cost: f64,
    pub confidence: Confidence,
    pub severity_scores: Vec<u8>,
}

impl VerificationResult {
    pub fn summary(&self) -> String {
        format!(
            "Refinement Complete!\n\nFinal Severity: {}/100\nAction: {}\nCost: ₹{}\nConfidence: {}",
            self.final_severity,
            self.action,
            format_cost(self.cost),
            self.confidence
        )
    }
}

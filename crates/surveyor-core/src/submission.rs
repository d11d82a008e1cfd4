//! Single-shot scan upload to the inference service

use surveyor_types::{
    AnalysisResponse, AnalyzeRequest, ImageUpload, ResponseError, Session, ValidationError,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::{BackendError, InferenceBackend, ProgressSender};
use crate::routes::Route;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Analysis failed: {0}")]
    Backend(#[from] BackendError),

    /// The service replied without a scan
    #[error("{0}")]
    Response(#[from] ResponseError),
}

#[derive(Debug, Clone)]
pub struct ScanSubmission {
    pub image: ImageUpload,
    pub user_id: String,
    pub car_name: String,
}

impl ScanSubmission {
    pub fn new(image: ImageUpload, user_id: impl Into<String>, car_name: impl Into<String>) -> Self {
        Self {
            image,
            user_id: user_id.into(),
            car_name: car_name.into(),
        }
    }

    pub fn for_session(session: &Session, image: ImageUpload, car_name: impl Into<String>) -> Self {
        Self::new(image, session.user_id.clone(), car_name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.image.validate()?;
        if self.car_name.trim().is_empty() {
            return Err(ValidationError::MissingField("car name"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user id"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedScan {
    pub scan_id: String,
    pub analysis: AnalysisResponse,
    /// Where to go next
    pub route: Route,
}

/// Validate, upload, and return the created scan. Nothing is sent when
/// validation fails. Progress follows the image bytes.
#[instrument(skip(inference, submission, progress), fields(car = %submission.car_name))]
pub async fn submit_scan(
    inference: &dyn InferenceBackend,
    submission: ScanSubmission,
    progress: Option<ProgressSender>,
) -> Result<SubmittedScan, SubmissionError> {
    submission.validate()?;

    let request = AnalyzeRequest {
        image: submission.image,
        user_id: submission.user_id,
        car_name: submission.car_name.trim().to_string(),
    };
    info!(bytes = request.image.len(), "Uploading scan");
    let analysis = inference.analyze(&request, progress).await?;

    let scan_id = match analysis.scan_id() {
        Ok(id) => id.to_string(),
        Err(err) => {
            warn!(error = %err, "Analysis returned no scan");
            return Err(err.into());
        }
    };
    info!(%scan_id, damages = analysis.damages.len(), "Scan created");

    Ok(SubmittedScan {
        route: Route::ScanDetail(scan_id.clone()),
        scan_id,
        analysis,
    })
}

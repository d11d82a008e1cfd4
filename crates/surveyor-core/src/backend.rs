//! Seams to the external collaborators
//!
//! The hosted relational store, the inference service and the auth endpoint
//! are all reached through these traits; `surveyor-remote` provides the HTTP
//! implementations.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use surveyor_types::{
    AnalysisResponse, AnalyzeRequest, Car, Claim, Damage, ImageUpload, NewCar, NewClaim,
    NewDamage, RefineRequest, RefineResponse, Scan, ScanAggregates, Session, UploadProgress,
};

/// Receives upload progress while the image part is being sent
pub type ProgressSender = watch::Sender<UploadProgress>;

/// Failure of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The service understood the request and declined it
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not signed in")]
    Unauthorized,
}

/// Tables of the hosted store used by the workflow
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn fetch_scan(&self, scan_id: &str) -> Result<Scan, BackendError>;

    /// Scans owned by a user, newest first
    async fn list_scans(&self, owner_id: &str) -> Result<Vec<Scan>, BackendError>;

    async fn update_scan_aggregates(
        &self,
        scan_id: &str,
        aggregates: ScanAggregates,
    ) -> Result<(), BackendError>;

    async fn fetch_damages(&self, scan_id: &str) -> Result<Vec<Damage>, BackendError>;

    /// Insert and return the stored row with its assigned id
    async fn insert_damage(&self, damage: &NewDamage) -> Result<Damage, BackendError>;

    async fn delete_damage(&self, damage_id: &str) -> Result<(), BackendError>;

    /// Cars in the garage, newest first
    async fn list_cars(&self) -> Result<Vec<Car>, BackendError>;

    async fn insert_car(&self, car: &NewCar) -> Result<Car, BackendError>;

    async fn insert_claim(&self, claim: &NewClaim) -> Result<Claim, BackendError>;

    /// Store a file in a public bucket and return its public URL
    async fn upload_object(
        &self,
        bucket: &str,
        object_name: &str,
        file: &ImageUpload,
    ) -> Result<String, BackendError>;
}

/// The remote AI service
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// `POST /analyze`. Progress, when requested, follows the bytes of the
    /// image part, not any server-side processing.
    async fn analyze(
        &self,
        request: &AnalyzeRequest,
        progress: Option<ProgressSender>,
    ) -> Result<AnalysisResponse, BackendError>;

    /// `POST /analyze/refine`
    async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, BackendError>;
}

/// Hosted identity provider
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// `None` when the account must be confirmed before a session is issued
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError>;

    async fn sign_out(&self, session: &Session) -> Result<(), BackendError>;
}

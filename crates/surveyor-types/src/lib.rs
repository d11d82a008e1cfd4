//! Shared data model for the damage surveyor
//!
//! Canonical shapes of the rows in the hosted store (`scans`, `damages`,
//! `cars`, `claims`) and of the inference service payloads. Legacy field
//! names are migrated at deserialization so the rest of the workspace only
//! ever sees one schema.

pub mod damage;
pub mod error;
pub mod garage;
pub mod identity;
pub mod inference;
pub mod scan;
pub mod upload;

mod wire;

pub use damage::{
    Confidence, Damage, DamageDraft, DamageStatus, DamageType, DetectionSource, NewDamage,
    Position, ACTION_MANUAL_ENTRY, ACTION_PENDING_VERIFICATION, CAR_PARTS, MANUAL_DAMAGE_TYPES,
};
pub use error::{ResponseError, ValidationError};
pub use garage::{
    car_object_name, Car, CarDocuments, Claim, ClaimLine, DamageGrade, NewCar, NewClaim,
    VehicleInfo, CAR_FILES_BUCKET,
};
pub use identity::Session;
pub use inference::{
    AnalysisResponse, AnalyzeRequest, Angle, AnglePhotos, DetectedDamage, RefineRequest,
    RefineResponse, VerificationResult,
};
pub use scan::{format_cost, Scan, ScanAggregates};
pub use upload::{ImageUpload, UploadProgress, MAX_IMAGE_BYTES};

//! Damage surveyor workflow core
//!
//! Client-side state for the damage assessment workflow, independent of any
//! transport:
//!
//! - [`store::DamageStore`]: in-memory reflection of one scan's damages,
//!   re-fetched after every mutation
//! - [`verification::VerificationFlow`]: three-photo refinement state machine
//! - [`marking::MarkingTool`]: hand annotation of damage locations
//! - [`submission`]: single-shot scan upload
//! - [`report::Report`]: cost breakdown of the loaded damages
//! - [`session::SessionContext`] and [`routes`]: identity gate for views
//!
//! Remote collaborators are reached through the traits in [`backend`].

pub mod backend;
pub mod error;
pub mod garage;
pub mod marking;
pub mod report;
pub mod routes;
pub mod session;
pub mod store;
pub mod submission;
pub mod verification;

mod command;

#[cfg(test)]
pub(crate) mod fakes;

pub use backend::{AuthBackend, BackendError, InferenceBackend, ProgressSender, RecordBackend};
pub use error::StoreError;
pub use garage::Garage;
pub use marking::{
    MarkedDamage, MarkerId, MarkingTool, ObjectFit, PendingMarker, Rect, RenderedImage, Size,
};
pub use report::{AggregateDrift, Report, ReportLine, SeverityBand};
pub use routes::{guard, Route, RouteDecision};
pub use session::{SessionContext, SessionError, SignUp};
pub use store::{AddOutcome, DamageStore, RemoveOutcome};
pub use submission::{submit_scan, ScanSubmission, SubmissionError, SubmittedScan};
pub use verification::{
    PhotoSlots, VerificationError, VerificationFlow, VerificationState, VerificationTarget,
};

//! Three-photo refinement of a single damage
//!
//! ```text
//! Idle -> Collecting -> Submitting -> Verified
//!              ^             |
//!              +--- failed --+
//! ```
//!
//! Photos are kept across a failed submission so the user can retry without
//! re-selecting them.

use std::mem;

use surveyor_types::{
    Angle, AnglePhotos, Damage, DamageType, ImageUpload, ResponseError, ValidationError,
    VerificationResult,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::DamageStore;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No damage is being verified")]
    NotCollecting,

    /// The service answered but declined the photos
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to analyze photos: {0}")]
    Failed(String),
}

impl From<StoreError> for VerificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(err) => VerificationError::Validation(err),
            StoreError::Response(ResponseError::Rejected(message)) => {
                VerificationError::Rejected(message)
            }
            other => VerificationError::Failed(other.to_string()),
        }
    }
}

/// The damage a flow is refining
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationTarget {
    pub damage_id: String,
    pub part_name: String,
    pub damage_type: DamageType,
    pub current_severity: u8,
}

impl From<&Damage> for VerificationTarget {
    fn from(damage: &Damage) -> Self {
        Self {
            damage_id: damage.id.clone(),
            part_name: damage.part_name.clone(),
            damage_type: damage.damage_type.clone(),
            current_severity: damage.display_severity(),
        }
    }
}

/// One optional photo per angle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoSlots {
    left: Option<ImageUpload>,
    center: Option<ImageUpload>,
    right: Option<ImageUpload>,
}

impl PhotoSlots {
    fn slot_mut(&mut self, angle: Angle) -> &mut Option<ImageUpload> {
        match angle {
            Angle::Left => &mut self.left,
            Angle::Center => &mut self.center,
            Angle::Right => &mut self.right,
        }
    }

    pub fn get(&self, angle: Angle) -> Option<&ImageUpload> {
        match angle {
            Angle::Left => self.left.as_ref(),
            Angle::Center => self.center.as_ref(),
            Angle::Right => self.right.as_ref(),
        }
    }

    pub fn filled(&self) -> usize {
        Angle::ALL.iter().filter(|a| self.get(**a).is_some()).count()
    }

    pub fn missing(&self) -> Vec<Angle> {
        Angle::ALL
            .into_iter()
            .filter(|a| self.get(*a).is_none())
            .collect()
    }

    /// All three photos, if every slot is filled
    pub fn complete(&self) -> Option<AnglePhotos> {
        Some(AnglePhotos {
            left: self.left.clone()?,
            center: self.center.clone()?,
            right: self.right.clone()?,
        })
    }
}

impl From<AnglePhotos> for PhotoSlots {
    fn from(photos: AnglePhotos) -> Self {
        Self {
            left: Some(photos.left),
            center: Some(photos.center),
            right: Some(photos.right),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum VerificationState {
    #[default]
    Idle,
    Collecting {
        target: VerificationTarget,
        photos: PhotoSlots,
        error: Option<String>,
    },
    Submitting {
        target: VerificationTarget,
        photos: AnglePhotos,
    },
    Verified {
        target: VerificationTarget,
        result: VerificationResult,
    },
}

#[derive(Debug, Default)]
pub struct VerificationFlow {
    state: VerificationState,
}

impl VerificationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn target(&self) -> Option<&VerificationTarget> {
        match &self.state {
            VerificationState::Idle => None,
            VerificationState::Collecting { target, .. }
            | VerificationState::Submitting { target, .. }
            | VerificationState::Verified { target, .. } => Some(target),
        }
    }

    /// Start collecting photos for a damage, discarding any previous flow
    pub fn open(&mut self, target: impl Into<VerificationTarget>) {
        let target = target.into();
        info!(damage_id = %target.damage_id, "Verification opened");
        self.state = VerificationState::Collecting {
            target,
            photos: PhotoSlots::default(),
            error: None,
        };
    }

    /// Put a photo into an angle slot, replacing what was there. Invalid
    /// images are rejected and leave the slot unchanged.
    pub fn attach(&mut self, angle: Angle, image: ImageUpload) -> Result<(), VerificationError> {
        let VerificationState::Collecting { photos, error, .. } = &mut self.state else {
            return Err(VerificationError::NotCollecting);
        };
        if let Err(err) = image.validate() {
            *error = Some(err.to_string());
            return Err(err.into());
        }
        *photos.slot_mut(angle) = Some(image);
        *error = None;
        Ok(())
    }

    pub fn detach(&mut self, angle: Angle) {
        if let VerificationState::Collecting { photos, .. } = &mut self.state {
            *photos.slot_mut(angle) = None;
        }
    }

    pub fn missing_angles(&self) -> Vec<Angle> {
        match &self.state {
            VerificationState::Collecting { photos, .. } => photos.missing(),
            _ => Vec::new(),
        }
    }

    pub fn ready(&self) -> bool {
        matches!(&self.state, VerificationState::Collecting { photos, .. } if photos.filled() == 3)
    }

    /// Inline message shown under the photo slots
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            VerificationState::Collecting { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Send the three photos through the store. An incomplete set is
    /// rejected here without any request. On failure the flow goes back to
    /// collecting with the photos kept.
    pub async fn submit(
        &mut self,
        store: &mut DamageStore,
    ) -> Result<VerificationResult, VerificationError> {
        let (target, photos) = match mem::take(&mut self.state) {
            VerificationState::Collecting { target, photos, .. } => match photos.complete() {
                Some(complete) => (target, complete),
                None => {
                    let err = ValidationError::IncompletePhotos;
                    self.state = VerificationState::Collecting {
                        target,
                        photos,
                        error: Some(err.to_string()),
                    };
                    return Err(err.into());
                }
            },
            other => {
                self.state = other;
                return Err(VerificationError::NotCollecting);
            }
        };

        self.state = VerificationState::Submitting {
            target: target.clone(),
            photos: photos.clone(),
        };

        match store.verify(&target.damage_id, photos.clone()).await {
            Ok(result) => {
                info!(
                    damage_id = %target.damage_id,
                    final_severity = result.final_severity,
                    "Damage verified"
                );
                self.state = VerificationState::Verified {
                    target,
                    result: result.clone(),
                };
                Ok(result)
            }
            Err(err) => {
                let err = VerificationError::from(err);
                warn!(damage_id = %target.damage_id, error = %err, "Verification failed");
                self.state = VerificationState::Collecting {
                    target,
                    photos: photos.into(),
                    error: Some(err.to_string()),
                };
                Err(err)
            }
        }
    }

    pub fn close(&mut self) {
        self.state = VerificationState::Idle;
    }
}

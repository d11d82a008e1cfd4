//! Dashboard scans, the digital garage and insurance claims

use std::sync::Arc;

use chrono::Utc;
use surveyor_types::{
    car_object_name, Car, CarDocuments, Claim, ClaimLine, Damage, DamageGrade, ImageUpload,
    NewCar, NewClaim, Scan, Session, VehicleInfo, CAR_FILES_BUCKET,
};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::backend::RecordBackend;

pub struct Garage {
    records: Arc<dyn RecordBackend>,
}

impl Garage {
    pub fn new(records: Arc<dyn RecordBackend>) -> Self {
        Self { records }
    }

    /// The signed-in user's scans, newest first
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub async fn scans(&self, session: &Session) -> Result<Vec<Scan>, StoreError> {
        let mut scans = self.records.list_scans(&session.user_id).await?;
        // Undated rows sort last
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    pub async fn cars(&self) -> Result<Vec<Car>, StoreError> {
        Ok(self.records.list_cars().await?)
    }

    /// Register a car. Attached files are uploaded first, in order, and the
    /// row is only inserted once all of them are stored.
    #[instrument(skip_all, fields(model = %car.model_name))]
    pub async fn add_car(
        &self,
        mut car: NewCar,
        documents: CarDocuments,
    ) -> Result<Car, StoreError> {
        car.validate()?;
        documents.validate()?;

        let millis = Utc::now().timestamp_millis();
        if let Some(photo) = &documents.photo {
            car.car_photo_url = Some(self.upload("car", "Photo", photo, millis).await?);
        }
        if let Some(insurance) = &documents.insurance {
            car.insurance_doc_url =
                Some(self.upload("insurance", "Insurance", insurance, millis).await?);
        }
        if let Some(rc) = &documents.rc {
            car.rc_doc_url = Some(self.upload("rc", "RC", rc, millis).await?);
        }

        let stored = self.records.insert_car(&car).await?;
        info!(car_id = %stored.id, "Car added");
        Ok(stored)
    }

    async fn upload(
        &self,
        prefix: &str,
        what: &'static str,
        file: &ImageUpload,
        millis: i64,
    ) -> Result<String, StoreError> {
        let name = car_object_name(prefix, millis, &file.file_name);
        let url = self
            .records
            .upload_object(CAR_FILES_BUCKET, &name, file)
            .await
            .map_err(|source| StoreError::Upload { what, source })?;
        debug!(object = %name, "Uploaded");
        Ok(url)
    }

    /// File a claim for a scan, graded by its stored total, with the scan's
    /// damages as the line items
    #[instrument(skip_all, fields(scan_id = %scan.id))]
    pub async fn file_claim(&self, scan: &Scan, damages: &[Damage]) -> Result<Claim, StoreError> {
        let claim = NewClaim {
            scan_id: scan.id.clone(),
            image_url: scan
                .processed_image_url
                .clone()
                .or_else(|| scan.original_image_url.clone()),
            total_cost: scan.total_cost,
            damage_grade: DamageGrade::from_total_cost(scan.total_cost),
            breakdown: damages.iter().map(ClaimLine::from).collect(),
            vehicle_info: VehicleInfo {
                car_name: scan.car_name.clone(),
            },
        };
        let stored = self.records.insert_claim(&claim).await?;
        info!(claim_id = %stored.id, grade = %stored.damage_grade, "Claim filed");
        Ok(stored)
    }
}

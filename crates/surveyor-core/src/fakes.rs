//! In-memory backends for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use surveyor_types::{
    AnalysisResponse, AnalyzeRequest, AnglePhotos, Car, Claim, Damage, ImageUpload, NewCar,
    NewClaim, NewDamage, RefineRequest, RefineResponse, Scan, ScanAggregates, Session,
    UploadProgress,
};

use crate::backend::{
    AuthBackend, BackendError, InferenceBackend, ProgressSender, RecordBackend,
};

pub fn scan(id: &str, total_cost: f64, damage_count: u32) -> Scan {
    serde_json::from_value(json!({
        "id": id,
        "user_id": "user-1",
        "car_name": "Honda City",
        "total_cost": total_cost,
        "damage_count": damage_count,
    }))
    .unwrap()
}

/// A preliminary detector row
pub fn stored_damage(id: &str, scan_id: &str, cost: f64) -> Damage {
    serde_json::from_value(json!({
        "id": id,
        "scan_id": scan_id,
        "part_name": "Front Bumper",
        "damage_type": "Scratch",
        "detection_source": "ai",
        "preliminary_severity": 40,
        "preliminary_cost": cost,
        "cost": cost,
        "action": "Buffing & Polishing",
    }))
    .unwrap()
}

pub fn jpeg(name: &str) -> ImageUpload {
    ImageUpload::from_bytes(name, vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10])
}

pub fn photos() -> AnglePhotos {
    AnglePhotos {
        left: jpeg("left.jpg"),
        center: jpeg("center.jpg"),
        right: jpeg("right.jpg"),
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        access_token: format!("token-{user_id}"),
        refresh_token: None,
        expires_at: Some(Utc::now() + Duration::hours(1)),
    }
}

#[derive(Default)]
struct RecordsInner {
    scans: Vec<Scan>,
    damages: Vec<Damage>,
    cars: Vec<Car>,
    claims: Vec<Claim>,
    objects: Vec<String>,
    next_id: u32,
    calls: usize,
    fail_deletes: bool,
    fail_aggregate_writes: bool,
    fail_uploads: bool,
}

#[derive(Default)]
pub struct FakeRecords {
    inner: Mutex<RecordsInner>,
}

impl FakeRecords {
    pub fn new(scan: Scan) -> Self {
        let records = Self::default();
        records.add_scan(scan);
        records
    }

    pub fn add_scan(&self, scan: Scan) {
        self.inner.lock().unwrap().scans.push(scan);
    }

    pub fn seed(&self, damage: Damage) {
        self.inner.lock().unwrap().damages.push(damage);
    }

    pub fn fail_deletes(&self) {
        self.inner.lock().unwrap().fail_deletes = true;
    }

    pub fn fail_aggregate_writes(&self) {
        self.inner.lock().unwrap().fail_aggregate_writes = true;
    }

    pub fn fail_uploads(&self) {
        self.inner.lock().unwrap().fail_uploads = true;
    }

    /// Stored files as `bucket/object_name`, in upload order
    pub fn objects(&self) -> Vec<String> {
        self.inner.lock().unwrap().objects.clone()
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }

    /// The first scan row as currently stored
    pub fn scan_row(&self) -> Scan {
        self.inner.lock().unwrap().scans[0].clone()
    }

    pub fn damage_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.damages.iter().map(|d| d.id.clone()).collect()
    }

    pub fn claims(&self) -> Vec<Claim> {
        self.inner.lock().unwrap().claims.clone()
    }

    /// What the refinement service does to the row on success
    pub fn apply_refinement(&self, damage_id: &str, response: &RefineResponse) {
        let mut inner = self.inner.lock().unwrap();
        let Some(row) = inner.damages.iter_mut().find(|d| d.id == damage_id) else {
            return;
        };
        let mut value = serde_json::to_value(&*row).unwrap();
        value["final_severity"] = json!(response.final_severity);
        value["confidence"] = json!(response.confidence);
        value["severity_scores"] = json!(response.severity_scores);
        value["cost"] = json!(response.cost);
        value["action"] = json!(response.action);
        *row = serde_json::from_value(value).unwrap();
    }

    fn next_id(inner: &mut RecordsInner) -> String {
        inner.next_id += 1;
        format!("srv-{}", inner.next_id)
    }
}

#[async_trait]
impl RecordBackend for FakeRecords {
    async fn fetch_scan(&self, scan_id: &str) -> Result<Scan, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        inner
            .scans
            .iter()
            .find(|s| s.id == scan_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("scan {scan_id}")))
    }

    async fn list_scans(&self, owner_id: &str) -> Result<Vec<Scan>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let mut scans: Vec<Scan> = inner
            .scans
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    async fn update_scan_aggregates(
        &self,
        scan_id: &str,
        aggregates: ScanAggregates,
    ) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_aggregate_writes {
            return Err(BackendError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let scan = inner
            .scans
            .iter_mut()
            .find(|s| s.id == scan_id)
            .ok_or_else(|| BackendError::NotFound(format!("scan {scan_id}")))?;
        scan.set_aggregates(aggregates);
        Ok(())
    }

    async fn fetch_damages(&self, scan_id: &str) -> Result<Vec<Damage>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        Ok(inner
            .damages
            .iter()
            .filter(|d| d.scan_id == scan_id)
            .cloned()
            .collect())
    }

    async fn insert_damage(&self, damage: &NewDamage) -> Result<Damage, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let mut value = serde_json::to_value(damage).unwrap();
        value["id"] = json!(Self::next_id(&mut inner));
        let stored: Damage = serde_json::from_value(value)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        inner.damages.push(stored.clone());
        Ok(stored)
    }

    async fn delete_damage(&self, damage_id: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_deletes {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        inner.damages.retain(|d| d.id != damage_id);
        Ok(())
    }

    async fn list_cars(&self) -> Result<Vec<Car>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        Ok(inner.cars.iter().rev().cloned().collect())
    }

    async fn insert_car(&self, car: &NewCar) -> Result<Car, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let mut value = serde_json::to_value(car).unwrap();
        value["id"] = json!(Self::next_id(&mut inner));
        let stored: Car = serde_json::from_value(value)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        inner.cars.push(stored.clone());
        Ok(stored)
    }

    async fn insert_claim(&self, claim: &NewClaim) -> Result<Claim, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        let mut value = serde_json::to_value(claim).unwrap();
        value["id"] = json!(Self::next_id(&mut inner));
        let stored: Claim = serde_json::from_value(value)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        inner.claims.push(stored.clone());
        Ok(stored)
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object_name: &str,
        _file: &ImageUpload,
    ) -> Result<String, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_uploads {
            return Err(BackendError::Status {
                status: 413,
                message: "Payload too large".to_string(),
            });
        }
        let key = format!("{bucket}/{object_name}");
        inner.objects.push(key.clone());
        Ok(format!("https://files.test/{key}"))
    }
}

type QueuedRefine = (RefineResponse, Option<Arc<FakeRecords>>);

#[derive(Default)]
struct InferenceInner {
    analysis: Option<Result<AnalysisResponse, BackendError>>,
    refine_queue: VecDeque<Result<QueuedRefine, BackendError>>,
    analyze_calls: usize,
    refine_calls: usize,
    last_refine: Option<(String, String)>,
}

#[derive(Default)]
pub struct FakeInference {
    inner: Mutex<InferenceInner>,
}

impl FakeInference {
    pub fn analysis(&self, response: AnalysisResponse) {
        self.inner.lock().unwrap().analysis = Some(Ok(response));
    }

    pub fn analysis_fails(&self, error: BackendError) {
        self.inner.lock().unwrap().analysis = Some(Err(error));
    }

    /// Queue a refinement reply. With `records`, a successful reply is also
    /// written to the matching row, as the real service does.
    pub fn respond_with(&self, response: RefineResponse, records: Option<Arc<FakeRecords>>) {
        self.inner
            .lock()
            .unwrap()
            .refine_queue
            .push_back(Ok((response, records)));
    }

    pub fn refine_fails(&self, error: BackendError) {
        self.inner.lock().unwrap().refine_queue.push_back(Err(error));
    }

    pub fn analyze_calls(&self) -> usize {
        self.inner.lock().unwrap().analyze_calls
    }

    pub fn refine_calls(&self) -> usize {
        self.inner.lock().unwrap().refine_calls
    }

    /// `(part_name, damage_type)` of the last refinement request
    pub fn last_refine(&self) -> Option<(String, String)> {
        self.inner.lock().unwrap().last_refine.clone()
    }
}

#[async_trait]
impl InferenceBackend for FakeInference {
    async fn analyze(
        &self,
        request: &AnalyzeRequest,
        progress: Option<ProgressSender>,
    ) -> Result<AnalysisResponse, BackendError> {
        let analysis = {
            let mut inner = self.inner.lock().unwrap();
            inner.analyze_calls += 1;
            inner.analysis.clone()
        };
        if let Some(progress) = progress {
            let total = request.image.len();
            let _ = progress.send(UploadProgress { sent: total / 2, total });
            let _ = progress.send(UploadProgress { sent: total, total });
        }
        analysis.unwrap_or_else(|| Ok(AnalysisResponse::default()))
    }

    async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, BackendError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner.refine_calls += 1;
            inner.last_refine = Some((
                request.part_name.clone(),
                request.damage_type.as_str().to_string(),
            ));
            inner.refine_queue.pop_front()
        };
        let (response, records) =
            next.unwrap_or_else(|| Err(BackendError::Transport("no reply queued".to_string())))?;
        if let Some(records) = records {
            if response.is_success() {
                records.apply_refinement(&request.damage_id, &response);
            }
        }
        Ok(response)
    }
}

#[derive(Default)]
struct AuthInner {
    accounts: Vec<(String, String)>,
    confirm_sign_ups: bool,
    fail_sign_out: bool,
    sign_out_calls: usize,
}

#[derive(Default)]
pub struct FakeAuth {
    inner: Mutex<AuthInner>,
}

impl FakeAuth {
    pub fn with_account(email: &str, password: &str) -> Self {
        let auth = Self::default();
        auth.inner
            .lock()
            .unwrap()
            .accounts
            .push((email.to_string(), password.to_string()));
        auth
    }

    /// Sign-ups return no session until confirmed
    pub fn require_confirmation(&self) {
        self.inner.lock().unwrap().confirm_sign_ups = true;
    }

    pub fn fail_sign_out(&self) {
        self.inner.lock().unwrap().fail_sign_out = true;
    }

    pub fn sign_out_calls(&self) -> usize {
        self.inner.lock().unwrap().sign_out_calls
    }
}

#[async_trait]
impl AuthBackend for FakeAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .iter()
            .find(|(e, p)| e == email && p == password)
            .map(|(e, _)| Session {
                email: Some(e.clone()),
                ..session(e.split('@').next().unwrap_or(e))
            })
            .ok_or_else(|| BackendError::Rejected("Invalid login credentials".to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.iter().any(|(e, _)| e == email) {
            return Err(BackendError::Rejected("User already registered".to_string()));
        }
        inner
            .accounts
            .push((email.to_string(), password.to_string()));
        if inner.confirm_sign_ups {
            return Ok(None);
        }
        Ok(Some(Session {
            email: Some(email.to_string()),
            ..session(email.split('@').next().unwrap_or(email))
        }))
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sign_out_calls += 1;
        if inner.fail_sign_out {
            return Err(BackendError::Transport("offline".to_string()));
        }
        Ok(())
    }
}

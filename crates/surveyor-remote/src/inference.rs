//! Client for the AI inference service

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::de::DeserializeOwned;
use surveyor_core::{BackendError, InferenceBackend, ProgressSender};
use surveyor_types::{AnalysisResponse, AnalyzeRequest, Angle, RefineRequest, RefineResponse};
use tracing::{debug, info, instrument, warn};

use crate::config::{RemoteConfig, RemoteConfigError};
use crate::error::{status_error, transport};
use crate::progress::image_part;

#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteConfigError> {
        Ok(Self::with_client(config.http_client()?, &config.api_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST multipart");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            let err = status_error(status, &body);
            warn!(%url, error = %err, "Inference request failed");
            return Err(err);
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    #[instrument(skip_all, fields(car = %request.car_name, bytes = request.image.len()))]
    async fn analyze(
        &self,
        request: &AnalyzeRequest,
        progress: Option<ProgressSender>,
    ) -> Result<AnalysisResponse, BackendError> {
        let form = Form::new()
            .part("file", image_part(&request.image, progress)?)
            .text("user_id", request.user_id.clone())
            .text("car_name", request.car_name.clone());

        let analysis: AnalysisResponse = self.post_form("/analyze", form).await?;
        match &analysis.error {
            Some(error) => warn!(%error, "Analysis rejected"),
            None => info!(scan_id = ?analysis.scan_id, "Analysis complete"),
        }
        Ok(analysis)
    }

    #[instrument(skip_all, fields(damage_id = %request.damage_id))]
    async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, BackendError> {
        let mut form = Form::new()
            .text("damage_id", request.damage_id.clone())
            .text("part_name", request.part_name.clone())
            .text("damage_type", request.damage_type.as_str().to_string());
        for angle in Angle::ALL {
            form = form.part(angle.form_field(), image_part(request.photos.get(angle), None)?);
        }

        let refined: RefineResponse = self.post_form("/analyze/refine", form).await?;
        info!(status = %refined.status, final_severity = ?refined.final_severity, "Refinement answered");
        Ok(refined)
    }
}

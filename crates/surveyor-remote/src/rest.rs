//! PostgREST-style access to the hosted tables and file storage
//!
//! Rows are addressed with `column=eq.value` filters. Inserts ask for the
//! stored row back with `Prefer: return=representation` so the caller gets
//! the server-assigned id. Files go to `/storage/v1/object/{bucket}/{name}`
//! and are read back through the bucket's public URL.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use surveyor_core::{BackendError, RecordBackend};
use surveyor_types::{
    Car, Claim, Damage, ImageUpload, NewCar, NewClaim, NewDamage, Scan, ScanAggregates,
    Session,
};
use tracing::{debug, info, instrument};

use crate::config::{RemoteConfig, RemoteConfigError};
use crate::error::{check, transport};
use crate::progress::file_body;

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    storage_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteConfigError> {
        let (url, key) = config.store()?;
        Ok(Self::with_client(config.http_client()?, url, key))
    }

    pub fn with_client(http: Client, store_url: &str, api_key: impl Into<String>) -> Self {
        let store_url = store_url.trim_end_matches('/');
        Self {
            http,
            base_url: format!("{store_url}/rest/v1"),
            storage_url: format!("{store_url}/storage/v1"),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Act as a signed-in user so row-level policies apply
    pub fn with_session(mut self, session: &Session) -> Self {
        self.access_token = Some(session.access_token.clone());
        self
    }

    fn request(&self, method: Method, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.authorized(method, format!("{}/{}", self.base_url, table))
            .query(query)
    }

    fn authorized(&self, method: Method, url: String) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        debug!(table, ?query, "select");
        let response = self
            .request(Method::GET, table, query)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .request(Method::POST, table, &[])
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(transport)?;
        let mut rows: Vec<T> = check(response).await?.json().await.map_err(transport)?;
        if rows.is_empty() {
            return Err(BackendError::Decode(format!("No data returned from insert into {table}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), BackendError> {
        let response = builder.send().await.map_err(transport)?;
        check(response).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn all() -> (&'static str, String) {
    ("select", "*".to_string())
}

#[async_trait]
impl RecordBackend for RestClient {
    #[instrument(skip(self))]
    async fn fetch_scan(&self, scan_id: &str) -> Result<Scan, BackendError> {
        let mut rows: Vec<Scan> = self
            .select("scans", &[all(), ("id", eq(scan_id))])
            .await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("scan {scan_id}")));
        }
        Ok(rows.swap_remove(0))
    }

    #[instrument(skip(self))]
    async fn list_scans(&self, owner_id: &str) -> Result<Vec<Scan>, BackendError> {
        self.select(
            "scans",
            &[
                all(),
                ("user_id", eq(owner_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn update_scan_aggregates(
        &self,
        scan_id: &str,
        aggregates: ScanAggregates,
    ) -> Result<(), BackendError> {
        self.send_empty(
            self.request(Method::PATCH, "scans", &[("id", eq(scan_id))])
                .json(&json!({
                    "total_cost": aggregates.total_cost,
                    "damage_count": aggregates.damage_count,
                })),
        )
        .await?;
        info!(
            total_cost = aggregates.total_cost,
            damage_count = aggregates.damage_count,
            "Scan totals written"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_damages(&self, scan_id: &str) -> Result<Vec<Damage>, BackendError> {
        self.select("damages", &[all(), ("scan_id", eq(scan_id))])
            .await
    }

    #[instrument(skip_all, fields(scan_id = %damage.scan_id))]
    async fn insert_damage(&self, damage: &NewDamage) -> Result<Damage, BackendError> {
        self.insert("damages", damage).await
    }

    #[instrument(skip(self))]
    async fn delete_damage(&self, damage_id: &str) -> Result<(), BackendError> {
        self.send_empty(self.request(Method::DELETE, "damages", &[("id", eq(damage_id))]))
            .await
    }

    #[instrument(skip(self))]
    async fn list_cars(&self) -> Result<Vec<Car>, BackendError> {
        self.select("cars", &[all(), ("order", "created_at.desc".to_string())])
            .await
    }

    #[instrument(skip_all)]
    async fn insert_car(&self, car: &NewCar) -> Result<Car, BackendError> {
        self.insert("cars", car).await
    }

    #[instrument(skip_all, fields(scan_id = %claim.scan_id))]
    async fn insert_claim(&self, claim: &NewClaim) -> Result<Claim, BackendError> {
        self.insert("claims", claim).await
    }

    #[instrument(skip(self, file), fields(len = file.len()))]
    async fn upload_object(
        &self,
        bucket: &str,
        object_name: &str,
        file: &ImageUpload,
    ) -> Result<String, BackendError> {
        let response = self
            .authorized(
                Method::POST,
                format!("{}/object/{bucket}/{object_name}", self.storage_url),
            )
            .header(CONTENT_TYPE, &file.content_type)
            .body(file_body(file, None))
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        info!("File stored");
        Ok(format!(
            "{}/object/public/{bucket}/{object_name}",
            self.storage_url
        ))
    }
}

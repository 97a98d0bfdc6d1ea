//! HTTP client for the ordering API.

use super::{Result, StorefrontError};
use crate::models::{
    Ack, BranchSettingsResponse, BranchSummary, CreateOrder, CreateServiceRequest, Language, Menu,
    OrderStatus, PlacedOrder, PromoList, PromoValidation, RestaurantTable, ServiceRequestAck,
    SubmitFeedback, ValidatePromo,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Operations the storefront needs from the server.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn branches(&self) -> Result<Vec<BranchSummary>>;
    async fn settings(&self, branch_id: i64) -> Result<BranchSettingsResponse>;
    async fn languages(&self) -> Result<Vec<Language>>;
    async fn menu(&self, branch_id: i64, language: &str) -> Result<Menu>;
    async fn tables(&self, branch_id: i64) -> Result<Vec<RestaurantTable>>;
    async fn place_order(&self, order: &CreateOrder) -> Result<PlacedOrder>;
    async fn order_status(&self, order_uid: &str) -> Result<OrderStatus>;
    async fn promo_codes(&self) -> Result<PromoList>;
    async fn validate_promo(&self, code: &str) -> Result<PromoValidation>;
    async fn submit_feedback(&self, feedback: &SubmitFeedback) -> Result<Ack>;
    async fn service_request(&self, request: &CreateServiceRequest) -> Result<ServiceRequestAck>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Calls `<base_url>/index.php?<endpoint>=1`, the form the API dispatches on.
#[derive(Debug, Clone)]
pub struct HttpStorefrontApi {
    http: Client,
    base_url: String,
}

impl HttpStorefrontApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/index.php?{}=1", self.base_url, endpoint)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(endpoint);
        debug!(%url, "GET");
        let resp = self.http.get(&url).query(query).send().await?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<T> {
        let url = self.url(endpoint);
        debug!(%url, "POST");
        let resp = self.http.post(&url).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        Err(StorefrontError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    async fn branches(&self) -> Result<Vec<BranchSummary>> {
        self.get("branches", &[]).await
    }

    async fn settings(&self, branch_id: i64) -> Result<BranchSettingsResponse> {
        self.get("settings", &[("branch_id", branch_id.to_string())]).await
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        self.get("languages", &[]).await
    }

    async fn menu(&self, branch_id: i64, language: &str) -> Result<Menu> {
        self.get(
            "menu",
            &[("branch_id", branch_id.to_string()), ("language", language.to_string())],
        )
        .await
    }

    async fn tables(&self, branch_id: i64) -> Result<Vec<RestaurantTable>> {
        self.get("tables", &[("branch_id", branch_id.to_string())]).await
    }

    async fn place_order(&self, order: &CreateOrder) -> Result<PlacedOrder> {
        self.post("orders", order).await
    }

    async fn order_status(&self, order_uid: &str) -> Result<OrderStatus> {
        self.get("order_status", &[("order_uid", order_uid.to_string())]).await
    }

    async fn promo_codes(&self) -> Result<PromoList> {
        self.get("promocode", &[]).await
    }

    async fn validate_promo(&self, code: &str) -> Result<PromoValidation> {
        let body = ValidatePromo {
            code: Some(code.to_string()),
        };
        self.post("promocode", &body).await
    }

    async fn submit_feedback(&self, feedback: &SubmitFeedback) -> Result<Ack> {
        self.post("feedback", feedback).await
    }

    async fn service_request(&self, request: &CreateServiceRequest) -> Result<ServiceRequestAck> {
        self.post("service_request", request).await
    }
}

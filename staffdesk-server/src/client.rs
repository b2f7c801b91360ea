use axum::body::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use staffdesk_engine::{
    fulfillment::Action,
    types::{
        decode, Campaign, ConfirmCodRequest, LoginRequest, LoginResponse, RejectRequest,
        SellerOrderDetail, SellerOrderPage, Validate,
    },
    ContractError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://apiv2.shopybucks.com";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("{message} ({status})")]
    Rejected { status: u16, message: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ApiError {
    /// The session token is missing, expired or revoked.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 401, .. })
    }

    /// The message to show staff: the backend's own wording when it gave one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Typed client of the operations backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        BackendClient {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    /// A client that sends `token` as a bearer credential on every request.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        BackendClient {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        fallback: &str,
    ) -> Result<Bytes, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        debug!("requesting {}", url);
        let transport = |source| ApiError::Transport {
            url: url.to_owned(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        debug!("{} answered {} ({} bytes)", url, status, body.len());

        if status.is_success() {
            return Ok(body);
        }
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_owned());
        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected the session for {}", url);
        }
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T>(&self, path: &str, fallback: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Validate,
    {
        let url = self.url(path);
        let body = self.send(self.http.get(&url), &url, fallback).await?;
        Ok(decode(&body)?)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        payload: Option<&B>,
        fallback: &str,
    ) -> Result<Bytes, ApiError> {
        let url = self.url(path);
        let mut request = self.http.post(&url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        self.send(request, &url, fallback).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let body = self
            .post("/auth/employee/login", Some(&request), "Invalid credentials")
            .await?;
        let response: LoginResponse = decode(&body)?;
        info!("logged in as {}", email);
        Ok(response)
    }

    pub async fn seller_orders(&self, page: u32, limit: u32) -> Result<SellerOrderPage, ApiError> {
        self.get(
            &format!("/api/admin/seller-orders?page={}&limit={}", page, limit),
            "Failed to load orders",
        )
        .await
    }

    pub async fn seller_order(&self, id: u64) -> Result<SellerOrderDetail, ApiError> {
        self.get(
            &format!("/api/admin/seller-orders/{}", id),
            "Failed to load order",
        )
        .await
    }

    /// Trigger a fulfillment step. `remarks` only travels with
    /// [`Action::ConfirmCod`].
    pub async fn fulfill(
        &self,
        id: u64,
        action: Action,
        remarks: Option<&str>,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/fulfillment/{}/{}", action.path_segment(), id);
        match action {
            Action::ConfirmCod => {
                let body = ConfirmCodRequest {
                    remarks: remarks.unwrap_or_default().to_owned(),
                };
                self.post(&path, Some(&body), action.failure_message())
                    .await?;
            }
            Action::MarkPacked | Action::CreateShipment => {
                self.post::<()>(&path, None, action.failure_message())
                    .await?;
            }
        }
        info!("seller order {}: {}", id, action.success_message());
        Ok(())
    }

    /// The order's invoice as PDF bytes.
    pub async fn invoice(&self, id: u64) -> Result<Bytes, ApiError> {
        let url = self.url(&format!("/api/invoices/{}", id));
        self.send(self.http.get(&url), &url, "Failed to download invoice")
            .await
    }

    pub async fn pending_campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        self.get("/employee/campaigns/pending", "Failed to fetch pending campaigns")
            .await
    }

    pub async fn all_campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        self.get("/employee/campaigns/all", "Failed to fetch campaigns")
            .await
    }

    pub async fn campaign(&self, id: u64) -> Result<Campaign, ApiError> {
        self.get(
            &format!("/employee/campaigns/details/{}", id),
            "Failed to fetch campaign",
        )
        .await
    }

    pub async fn approve_campaign(&self, id: u64) -> Result<(), ApiError> {
        self.post::<()>(
            &format!("/employee/campaigns/{}/approve", id),
            None,
            "Failed to approve campaign",
        )
        .await?;
        info!("campaign {} approved", id);
        Ok(())
    }

    pub async fn reject_campaign(&self, id: u64, reason: &str) -> Result<(), ApiError> {
        let body = RejectRequest {
            reason: reason.to_owned(),
        };
        self.post(
            &format!("/employee/campaigns/{}/reject", id),
            Some(&body),
            "Failed to reject campaign",
        )
        .await?;
        info!("campaign {} rejected", id);
        Ok(())
    }
}

//! JSON endpoints of the dashboard server.
//!
//! Everything except `/healthz`, `/login` and `/api/*` sits behind
//! [`require_session`], which only checks that the session cookie is present;
//! the backend decides whether the token is any good. Unknown paths go through
//! the same check in [`fallback`].

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use staffdesk_engine::{
    campaign::CampaignView,
    compute_progression,
    fulfillment::{Action, OrderView},
    types::SellerOrderSummary,
    ContractError, ProgressionResult, Stepper,
};
use tracing::{debug, error, info, warn};

use crate::client::{ApiError, BackendClient};

pub const SESSION_COOKIE: &str = "employee_token";
const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;
const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;

pub struct AppState {
    pub backend: BackendClient,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

/// Session token lifted from the cookie by [`require_session`].
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/progression", get(progression))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(order_detail))
        .route("/orders/:id/confirm-cod", post(confirm_cod))
        .route("/orders/:id/mark-packed", post(mark_packed))
        .route("/orders/:id/create-shipment", post(create_shipment))
        .route("/orders/:id/invoice", get(invoice))
        .route("/campaigns", get(all_campaigns))
        .route("/campaigns/pending", get(pending_campaigns))
        .route("/campaigns/:id", get(campaign_detail))
        .route("/campaigns/:id/approve", post(approve_campaign))
        .route("/campaigns/:id/reject", post(reject_campaign))
        .route_layer(middleware::from_fn(require_session));

    Router::new()
        .merge(gated)
        .route("/healthz", get(healthz))
        .route("/api/auth/set-cookie", post(set_cookie))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .fallback(fallback)
        .with_state(state)
}

// ---------- errors ----------

pub enum AppError {
    Api(ApiError),
    BadRequest(String),
    Conflict(String),
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        AppError::Api(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "error": message.into() }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, error_body(message)).into_response()
            }
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, error_body(message)).into_response()
            }
            AppError::Api(e) if e.is_unauthorized() => {
                warn!("backend rejected session: {}", e);
                let mut headers = HeaderMap::new();
                headers.insert(SET_COOKIE, clear_cookie());
                (
                    StatusCode::UNAUTHORIZED,
                    headers,
                    Json(json!({ "error": e.user_message(), "login": "/login" })),
                )
                    .into_response()
            }
            AppError::Api(ApiError::Rejected { status, message })
                if (400..500).contains(&status) =>
            {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, error_body(message)).into_response()
            }
            AppError::Api(e) => {
                error!("backend call failed: {}", e);
                (StatusCode::BAD_GATEWAY, error_body(e.user_message())).into_response()
            }
        }
    }
}

// ---------- session cookie ----------

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

fn session_cookie(token: &str, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("employee_token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Cookie values may not carry separators or whitespace.
fn valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'))
}

/// Paths reachable without a session cookie.
fn is_public(path: &str) -> bool {
    path == "/healthz" || path == "/login" || path.starts_with("/api/")
}

fn login_required(path: &str) -> Response {
    debug!("no session cookie for {}, login required", path);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "login required", "login": "/login" })),
    )
        .into_response()
}

async fn require_session(mut request: Request, next: Next) -> Response {
    match session_token(request.headers()) {
        Some(token) => {
            request.extensions_mut().insert(SessionToken(token));
            next.run(request).await
        }
        None => login_required(request.uri().path()),
    }
}

async fn fallback(request: Request) -> Response {
    let path = request.uri().path();
    if !is_public(path) && session_token(request.headers()).is_none() {
        return login_required(path);
    }
    (StatusCode::NOT_FOUND, error_body(format!("no route for {}", path))).into_response()
}

fn backend(state: &AppState, token: &SessionToken) -> BackendClient {
    state.backend.with_token(&token.0)
}

// ---------- ungated ----------

#[derive(Serialize)]
struct Healthz {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<Healthz> {
    Json(Healthz {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct SetCookieRequest {
    token: Option<String>,
}

fn with_session_cookie(token: &str, secure: bool) -> Result<Response, AppError> {
    let cookie = session_cookie(token, secure)
        .ok_or_else(|| AppError::BadRequest("Token is not a valid cookie value".into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((
        headers,
        Json(json!({ "success": true, "message": "Cookie set successfully" })),
    )
        .into_response())
}

async fn set_cookie(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SetCookieRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body.map_err(|e| {
        warn!("set-cookie body rejected: {}", e);
        AppError::BadRequest(format!("Failed to set cookie: {}", e.body_text()))
    })?;
    let token = body
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Token is required".into()))?;
    if !valid_token(&token) {
        return Err(AppError::BadRequest("Token is not a valid cookie value".into()));
    }
    info!("session cookie set");
    with_session_cookie(&token, state.secure_cookies)
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    form: Result<Json<LoginForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(form) = form?;
    let response = match state.backend.login(&form.email, &form.password).await {
        Ok(response) => response,
        Err(ApiError::Rejected { message, .. }) => {
            info!("login refused for {}", form.email);
            return Ok((StatusCode::UNAUTHORIZED, error_body(message)).into_response());
        }
        Err(e) => return Err(e.into()),
    };
    if !valid_token(&response.token) {
        return Err(AppError::Api(ApiError::Contract(ContractError::malformed(
            "login response",
            "token is not cookie-safe",
        ))));
    }
    with_session_cookie(&response.token, state.secure_cookies)
}

async fn logout() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_cookie());
    (headers, Json(json!({ "success": true }))).into_response()
}

// ---------- progression ----------

#[derive(Deserialize)]
struct ProgressionQuery {
    status: String,
}

#[derive(Serialize)]
struct ProgressionBody {
    progression: ProgressionResult,
    stepper: Stepper,
}

async fn progression(
    query: Result<Query<ProgressionQuery>, QueryRejection>,
) -> Result<Json<ProgressionBody>, AppError> {
    let Query(query) = query?;
    let progression = compute_progression(&query.status);
    if progression.is_unrecognized() {
        warn!("unrecognized order status `{}`", query.status);
    }
    let stepper = Stepper::from(&progression);
    Ok(Json(ProgressionBody {
        progression,
        stepper,
    }))
}

// ---------- orders ----------

#[derive(Deserialize)]
struct OrdersQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct OrderList {
    count: usize,
    orders: Vec<SellerOrderSummary>,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    query: Result<Query<OrdersQuery>, QueryRejection>,
) -> Result<Json<OrderList>, AppError> {
    let Query(query) = query?;
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if page == 0 || limit == 0 {
        return Err(AppError::BadRequest("page and limit start at 1".into()));
    }
    let orders = backend(&state, &token).seller_orders(page, limit).await?.orders;
    Ok(Json(OrderList {
        count: orders.len(),
        orders,
    }))
}

async fn order_detail(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    let Path(id) = id?;
    let order = backend(&state, &token).seller_order(id).await?;
    Ok(Json(OrderView::new(order)))
}

#[derive(Deserialize)]
struct ConfirmCodForm {
    #[serde(default)]
    remarks: String,
}

async fn run_action(
    state: &AppState,
    token: &SessionToken,
    id: u64,
    action: Action,
    remarks: Option<&str>,
) -> Result<Json<OrderView>, AppError> {
    let client = backend(state, token);
    let view = OrderView::new(client.seller_order(id).await?);
    if !view.allows(action) {
        return Err(AppError::Conflict(format!(
            "{} is not available for an order in {} state",
            action, view.order.status
        )));
    }
    client.fulfill(id, action, remarks).await?;
    Ok(Json(OrderView::new(client.seller_order(id).await?)))
}

async fn confirm_cod(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
    form: Option<Json<ConfirmCodForm>>,
) -> Result<Json<OrderView>, AppError> {
    let Path(id) = id?;
    let remarks = form.map(|Json(form)| form.remarks).unwrap_or_default();
    run_action(&state, &token, id, Action::ConfirmCod, Some(&remarks)).await
}

async fn mark_packed(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    let Path(id) = id?;
    run_action(&state, &token, id, Action::MarkPacked, None).await
}

async fn create_shipment(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    let Path(id) = id?;
    run_action(&state, &token, id, Action::CreateShipment, None).await
}

async fn invoice(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    let pdf = backend(&state, &token).invoice(id).await?;
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"invoice-{}.pdf\"", id))
    {
        headers.insert(CONTENT_DISPOSITION, disposition);
    }
    Ok((headers, pdf).into_response())
}

// ---------- campaigns ----------

async fn pending_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<Vec<CampaignView>>, AppError> {
    let campaigns = backend(&state, &token).pending_campaigns().await?;
    Ok(Json(campaigns.into_iter().map(CampaignView::new).collect()))
}

async fn all_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<Vec<CampaignView>>, AppError> {
    let campaigns = backend(&state, &token).all_campaigns().await?;
    Ok(Json(campaigns.into_iter().map(CampaignView::new).collect()))
}

async fn campaign_detail(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<CampaignView>, AppError> {
    let Path(id) = id?;
    let campaign = backend(&state, &token).campaign(id).await?;
    Ok(Json(CampaignView::new(campaign)))
}

async fn approve_campaign(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Path(id) = id?;
    backend(&state, &token).approve_campaign(id).await?;
    Ok(Json(json!({ "success": true, "id": id, "action": "APPROVED" })))
}

#[derive(Deserialize)]
struct RejectForm {
    #[serde(default)]
    reason: String,
}

async fn reject_campaign(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    id: Result<Path<u64>, PathRejection>,
    form: Result<Json<RejectForm>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Path(id) = id?;
    let Json(form) = form?;
    if form.reason.trim().is_empty() {
        return Err(AppError::BadRequest("a rejection reason is required".into()));
    }
    backend(&state, &token).reject_campaign(id, &form.reason).await?;
    Ok(Json(json!({ "success": true, "id": id, "action": "REJECTED" })))
}

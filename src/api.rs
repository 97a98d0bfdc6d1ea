//! HTTP surface.
//!
//! Endpoints are selected the way the storefront calls them: by a trigger key
//! in the query string (`/api/index.php?menu=1&branch_id=2`). The path form
//! `/api/menu?branch_id=2` is accepted too; a trigger key wins when both are
//! present.

use crate::commands::{branches, feedback, menu, orders, promo, service};
use crate::db::{Database, DatabaseExt};
use crate::error::{ApiError, Result};
use crate::models::{CreateOrder, CreateServiceRequest, SubmitFeedback, ValidatePromo};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header::CONTENT_TYPE, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Branches,
    Settings,
    Languages,
    Menu,
    Tables,
    OrderStatus,
    Orders,
    PromoCode,
    Feedback,
    ServiceRequest,
}

impl Endpoint {
    /// Trigger precedence when a query string carries more than one key.
    const ALL: [Endpoint; 10] = [
        Endpoint::Branches,
        Endpoint::Settings,
        Endpoint::Languages,
        Endpoint::Menu,
        Endpoint::Tables,
        Endpoint::OrderStatus,
        Endpoint::Orders,
        Endpoint::PromoCode,
        Endpoint::Feedback,
        Endpoint::ServiceRequest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Branches => "branches",
            Endpoint::Settings => "settings",
            Endpoint::Languages => "languages",
            Endpoint::Menu => "menu",
            Endpoint::Tables => "tables",
            Endpoint::OrderStatus => "order_status",
            Endpoint::Orders => "orders",
            Endpoint::PromoCode => "promocode",
            Endpoint::Feedback => "feedback",
            Endpoint::ServiceRequest => "service_request",
        }
    }

    pub fn from_query(params: &HashMap<String, String>) -> Option<Self> {
        Self::ALL.into_iter().find(|e| params.contains_key(e.name()))
    }

    pub fn from_path(segment: &str) -> Option<Self> {
        let segment = segment.trim_end_matches('/');
        Self::ALL.into_iter().find(|e| e.name() == segment)
    }
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api", any(dispatch_query))
        .route("/api/:endpoint", any(dispatch_path))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::EndpointNotFound
}

async fn dispatch_query(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response> {
    let endpoint = Endpoint::from_query(&params);
    dispatch(&state, method, endpoint, &params, &body).await
}

async fn dispatch_path(
    State(state): State<AppState>,
    method: Method,
    Path(segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response> {
    let endpoint = Endpoint::from_query(&params).or_else(|| Endpoint::from_path(&segment));
    dispatch(&state, method, endpoint, &params, &body).await
}

async fn dispatch(
    state: &AppState,
    method: Method,
    endpoint: Option<Endpoint>,
    params: &HashMap<String, String>,
    body: &Bytes,
) -> Result<Response> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }

    let endpoint = endpoint.ok_or(ApiError::EndpointNotFound)?;
    let db = state.db().clone();

    match endpoint {
        Endpoint::Branches => {
            require(&method, Method::GET)?;
            respond(db.call(|conn| branches::list_branches(conn)).await?)
        }
        Endpoint::Settings => {
            require(&method, Method::GET)?;
            let branch_id = int_param(params, "branch_id")?;
            respond(db.call(move |conn| branches::get_settings(conn, branch_id)).await?)
        }
        Endpoint::Languages => {
            require(&method, Method::GET)?;
            respond(db.call(|conn| branches::list_languages(conn)).await?)
        }
        Endpoint::Menu => {
            require(&method, Method::GET)?;
            let branch_id = int_param(params, "branch_id")?;
            let language = params.get("language").cloned();
            respond(
                db.call(move |conn| menu::get_menu(conn, branch_id, language.as_deref()))
                    .await?,
            )
        }
        Endpoint::Tables => {
            require(&method, Method::GET)?;
            let branch_id = int_param(params, "branch_id")?;
            respond(db.call(move |conn| branches::list_tables(conn, branch_id)).await?)
        }
        Endpoint::OrderStatus => {
            require(&method, Method::GET)?;
            let order_uid = str_param(params, "order_uid")?;
            respond(db.call(move |conn| orders::get_order_status(conn, &order_uid)).await?)
        }
        Endpoint::Orders => {
            require(&method, Method::POST)?;
            let order: CreateOrder = parse_body(body)?;
            respond(db.call(move |conn| orders::place_order(conn, order)).await?)
        }
        Endpoint::PromoCode => match method {
            Method::GET => respond(db.call(|conn| promo::list_promos(conn)).await?),
            Method::POST => {
                let request: ValidatePromo = parse_body(body)?;
                respond(
                    db.call(move |conn| promo::validate_promo(conn, request.code.as_deref()))
                        .await?,
                )
            }
            _ => Err(ApiError::MethodNotAllowed),
        },
        Endpoint::Feedback => {
            require(&method, Method::POST)?;
            let request: SubmitFeedback = parse_body(body)?;
            respond(db.call(move |conn| feedback::submit_feedback(conn, request)).await?)
        }
        Endpoint::ServiceRequest => {
            require(&method, Method::POST)?;
            let request: CreateServiceRequest = parse_body(body)?;
            respond(
                db.call(move |conn| service::create_service_request(conn, request))
                    .await?,
            )
        }
    }
}

fn respond<T: Serialize>(value: T) -> Result<Response> {
    Ok(Json(value).into_response())
}

fn require(method: &Method, expected: Method) -> Result<()> {
    if *method == expected {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed)
    }
}

fn str_param(params: &HashMap<String, String>, name: &str) -> Result<String> {
    params.get(name).cloned().ok_or_else(|| ApiError::missing_param(name))
}

fn int_param(params: &HashMap<String, String>, name: &str) -> Result<i64> {
    str_param(params, name)?
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid parameter: {}", name)))
}

/// An empty or non-object body counts as `{}`, so missing fields are reported
/// by name. A JSON object with mistyped fields is rejected.
pub fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value)
            .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e))),
        _ => Ok(T::default()),
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, FromRequest, FromRequestParts, Path, Query, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    calculator::{Calculator, CalculatorError, Operator, parse_content},
    config::Config,
    domain::{DomainError, Stack, validate_page_limit},
    id::parse_stack_id,
    state::{JsonSnapshotStore, StoreError},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<JsonSnapshotStore>>,
}

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    details: Map<String, Value>,
}

impl ApiError {
    fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            details: Map::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            "validation_error",
            StatusCode::UNPROCESSABLE_ENTITY,
            message,
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", StatusCode::NOT_FOUND, message)
    }

    pub fn division_by_zero(message: impl Into<String>) -> Self {
        Self::new(
            "division_by_zero",
            StatusCode::METHOD_NOT_ALLOWED,
            message,
        )
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(
            "unsupported_operation",
            StatusCode::NOT_IMPLEMENTED,
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl From<CalculatorError> for ApiError {
    fn from(value: CalculatorError) -> Self {
        match &value {
            CalculatorError::Validation(_) => ApiError::validation(value.to_string()),
            CalculatorError::DivisionByZero => ApiError::division_by_zero(value.to_string()),
            CalculatorError::UnsupportedOperation { op } => {
                ApiError::unsupported_operation(value.to_string()).with_detail("op", op.as_str())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        let status = match value {
            DomainError::MissingStack { .. } => StatusCode::NOT_FOUND,
            DomainError::InvalidPageLimit { .. } | DomainError::NonFiniteValue => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        ApiError::new(value.code(), status, value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(domain) => domain.into(),
            StoreError::SchemaVersionMismatch { .. }
            | StoreError::Io(_)
            | StoreError::SerdeJson(_) => {
                error!(error = %value, "stack store failure");
                ApiError::internal(value.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: Map<String, Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S>,
    <axum::Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.to_string()))?;
        Ok(Self(value))
    }
}

pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Deserialize)]
struct CreateStackRequest {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ListStacksQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PushValueQuery {
    new_value: f64,
}

#[derive(Debug, Serialize)]
struct DeleteStackResponse {
    ok: bool,
}

pub fn build_router(config: Config, store: Arc<Mutex<JsonSnapshotStore>>) -> Router {
    let app_state = AppState {
        config: Arc::new(config),
        store,
    };

    let rpn = Router::new()
        .route("/op", get(list_operators))
        .route("/op/:op/stack/:stack_id", post(apply_operand_to_stack))
        .route("/stack", post(create_stack).get(list_stacks))
        .route(
            "/stack/:stack_id",
            get(get_stack).post(push_value).delete(delete_stack),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/rpn", rpn)
        .fallback(fallback_not_found)
        .layer(Extension(app_state))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version::VERSION,
    }))
}

async fn fallback_not_found() -> ApiError {
    ApiError::not_found("not found")
}

fn stack_id_from_path(raw: &str) -> Result<Uuid, ApiError> {
    parse_stack_id(raw).ok_or_else(|| {
        ApiError::validation(format!("invalid stack id: {raw}")).with_detail("stack_id", raw)
    })
}

async fn list_operators() -> Json<Vec<Operator>> {
    Json(Operator::ALL.to_vec())
}

async fn apply_operand_to_stack(
    Extension(state): Extension<AppState>,
    ApiPath((op, stack_id)): ApiPath<(String, String)>,
) -> Result<Json<Stack>, ApiError> {
    let stack_id = stack_id_from_path(&stack_id)?;

    // Held across load, calculate and write-back so concurrent operations on
    // one stack cannot interleave.
    let mut store = state.store.lock().await;
    let stack = store
        .get_stack(&stack_id)
        .ok_or(DomainError::MissingStack { stack_id })?;

    let outcome = Calculator::new(stack.content.clone())
        .and_then(|calculator| calculator.apply_operand(op.parse()?));
    let content = match outcome {
        Ok(content) => content,
        Err(e) => {
            warn!(%stack_id, op = %op, error = %e, "operation rejected");
            return Err(e.into());
        }
    };

    let stack = store
        .replace_content(&stack_id, content)?
        .ok_or(DomainError::MissingStack { stack_id })?;
    info!(%stack_id, op = %op, len = stack.content.len(), "applied operator");
    Ok(Json(stack))
}

async fn create_stack(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<CreateStackRequest>,
) -> Result<Json<Stack>, ApiError> {
    let content = parse_content(&req.content).map_err(CalculatorError::from)?;
    let stack = {
        let mut store = state.store.lock().await;
        store.create_stack(content)?
    };
    info!(stack_id = %stack.id, len = stack.content.len(), "created stack");
    Ok(Json(stack))
}

async fn list_stacks(
    Extension(state): Extension<AppState>,
    ApiQuery(query): ApiQuery<ListStacksQuery>,
) -> Result<Json<Vec<Stack>>, ApiError> {
    let max = state.config.list_limit_max();
    let limit = query.limit.unwrap_or(max);
    validate_page_limit(limit, max)?;

    let store = state.store.lock().await;
    Ok(Json(store.list_stacks(query.offset, limit)))
}

async fn get_stack(
    Extension(state): Extension<AppState>,
    ApiPath(stack_id): ApiPath<String>,
) -> Result<Json<Stack>, ApiError> {
    let stack_id = stack_id_from_path(&stack_id)?;
    let store = state.store.lock().await;
    let stack = store
        .get_stack(&stack_id)
        .ok_or(DomainError::MissingStack { stack_id })?;
    Ok(Json(stack))
}

async fn push_value(
    Extension(state): Extension<AppState>,
    ApiPath(stack_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PushValueQuery>,
) -> Result<Json<Stack>, ApiError> {
    let stack_id = stack_id_from_path(&stack_id)?;
    let stack = {
        let mut store = state.store.lock().await;
        store
            .push_value(&stack_id, query.new_value)?
            .ok_or(DomainError::MissingStack { stack_id })?
    };
    info!(%stack_id, len = stack.content.len(), "pushed value");
    Ok(Json(stack))
}

async fn delete_stack(
    Extension(state): Extension<AppState>,
    ApiPath(stack_id): ApiPath<String>,
) -> Result<Json<DeleteStackResponse>, ApiError> {
    let stack_id = stack_id_from_path(&stack_id)?;
    let deleted = {
        let mut store = state.store.lock().await;
        store.delete_stack(&stack_id)?
    };
    if !deleted {
        return Err(DomainError::MissingStack { stack_id }.into());
    }
    info!(%stack_id, "deleted stack");
    Ok(Json(DeleteStackResponse { ok: true }))
}

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::state::{AppState, Readiness};
use crate::translate::{TranslateError, TranslateRequest, TranslateResponse};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/translate", post(translate))
        .route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let (status, model) = match state.readiness() {
        Readiness::Ready(translator) => ("ok", translator.model_name().to_string()),
        Readiness::Loading => ("loading", state.settings.model_name.clone()),
    };
    Json(json!({
        "status": status,
        "model": model,
    }))
}

async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, TranslateError> {
    let translator = state.translator()?;
    let response = translator.translate(request).await?;
    Ok(Json(response))
}

impl IntoResponse for TranslateError {
    fn into_response(self) -> Response {
        let status = match &self {
            TranslateError::InvalidInput(_) | TranslateError::UnsupportedLanguage { .. } => {
                StatusCode::BAD_REQUEST
            }
            TranslateError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            TranslateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            TranslateError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.is_client_error() {
            debug!("Rejected translation request: {}", self);
        } else if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Translation failed: {:#}", self);
        } else {
            warn!("Translation unavailable: {}", self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

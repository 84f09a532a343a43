use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::app::AppState;

/// ヘルス応答。
#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// liveness。プロセスが応答できるかのみを見る。
pub(crate) async fn live() -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        detail: None,
    })
}

/// readiness。モデルゲートウェイへの疎通を確認する。
///
/// 生成パスが無効化されている場合、ゲートウェイは到達不能でも ready とする。
pub(crate) async fn ready(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthReport>) {
    if !state.config().generative_enabled() {
        return (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                detail: Some("generative path disabled".to_string()),
            }),
        );
    }

    match state.generative().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                detail: None,
            }),
        ),
        Err(error) => {
            warn!(?error, "model-gateway health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport {
                    status: "degraded",
                    detail: Some("model-gateway unreachable".to_string()),
                }),
            )
        }
    }
}

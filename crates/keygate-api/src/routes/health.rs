//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy")
    pub status: String,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 활성 키쌍 정보
    pub keys: KeyStatus,
}

/// 활성 키쌍 상태. 키 자체는 포함하지 않습니다.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyStatus {
    /// 키 출처 ("environment" | "external_file" | "config")
    pub source: String,

    /// 공개키 지문
    pub fingerprint: String,

    /// 마지막 로드 시각 (ISO 8601)
    pub loaded_at: String,

    /// 외부 파일 재로드 가능 여부
    pub reloadable: bool,
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크 (readiness probe용).
///
/// 키쌍이 로드되지 않으면 서버가 시작되지 않으므로 항상 healthy입니다.
/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let material = state.keys.current();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        keys: KeyStatus {
            source: material.source().to_string(),
            fingerprint: material.fingerprint().to_string(),
            loaded_at: material.loaded_at().to_rfc3339(),
            reloadable: state.keys.is_external_file_enabled(),
        },
    };

    (StatusCode::OK, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

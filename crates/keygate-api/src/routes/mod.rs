//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/auth` - 로그인, 토큰 갱신, SMS 코드, 공개키, 현재 사용자

pub mod auth;
pub mod health;

pub use auth::{
    auth_router, LoginRequest, PublicKeyResponse, RefreshRequest, SmsSendRequest,
    SmsSendResponse,
};
pub use health::{health_router, HealthResponse, KeyStatus};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // 인증 엔드포인트
        .nest("/auth", auth_router())
}

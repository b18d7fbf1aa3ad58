//! RSA 토큰 인증 HTTP 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 로그인/토큰 갱신/SMS 코드 API
//! - 모든 요청 앞에서 실행되는 Bearer 토큰 인증 필터
//! - 요청 범위 인증 컨텍스트
//! - 헬스 체크 엔드포인트
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 인증 필터와 인증 컨텍스트
//! - [`error`]: 응답 envelope와 에러 매핑
//! - [`server`]: 라우터 조립과 백그라운드 태스크

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{authenticate_request, AuthContext, Authenticated, MaybeAuthenticated};
pub use error::{ApiError, ApiResponse, ApiResult, AppStatus};
pub use routes::*;
pub use server::{create_router, reload_keys, shutdown_signal, ReloadError};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;

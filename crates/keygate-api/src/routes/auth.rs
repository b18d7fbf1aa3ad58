//! 인증 API.
//!
//! # 엔드포인트
//!
//! - `POST /auth/login` - 비밀번호 또는 SMS 코드 로그인
//! - `POST /auth/refresh` - Refresh Token으로 Access Token 재발급
//! - `POST /auth/sms/send` - SMS 인증 코드 발송
//! - `GET /auth/public-key` - 비밀값 암호화용 공개키
//! - `GET /auth/me` - 현재 사용자 (인증 필요)

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, Instrument};

use keygate_core::service::is_blank;
use keygate_core::sms::mask_phone;
use keygate_core::{AuthMethod, Credential, LoginResponse, PrincipalView, RefreshResponse};

use crate::auth::Authenticated;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

// =============================================================================
// 요청/응답 타입
// =============================================================================

/// 로그인 요청.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// 사용자명, 이메일 또는 휴대폰 번호
    pub account: String,
    /// 비밀번호 또는 SMS 코드
    pub secret: String,
    /// 인증 방식 (`PASSWORD` | `PHONE_CODE`)
    #[serde(rename = "type")]
    pub auth_type: AuthMethod,
    /// 외부 인증 제공자 (federated 전용)
    #[serde(default)]
    pub platform: Option<String>,
    /// `secret`이 공개키로 암호화되었는지 여부
    #[serde(default)]
    pub encrypted: bool,
}

/// 토큰 갱신 요청.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// SMS 발송 요청.
#[derive(Debug, Deserialize)]
pub struct SmsSendRequest {
    pub phone: String,
}

/// SMS 발송 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct SmsSendResponse {
    /// 마스킹된 휴대폰 번호
    pub phone: String,
    /// 코드 유효 시간 (초)
    pub expires_in: u64,
    /// 발송된 코드 (`sms.expose_code` 설정 시에만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// 공개키 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Base64 SPKI DER 공개키
    pub public_key: String,
    /// 공개키 지문
    pub fingerprint: String,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

// =============================================================================
// 핸들러
// =============================================================================

/// 로그인.
///
/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = json_body(payload)?;

    let secret = state
        .auth
        .prepare_secret(&request.secret, request.encrypted)?;
    if request.account.trim().is_empty() || is_blank(&secret) {
        return Err(ApiError::bad_request("계정과 비밀값은 필수입니다"));
    }

    let credential = match request.auth_type {
        AuthMethod::Password => Credential::Password {
            account: request.account,
            secret,
        },
        AuthMethod::PhoneCode => {
            Credential::phone_code(request.account, secret.expose_secret().to_string())
        }
        AuthMethod::Federated => Credential::Federated {
            provider: request.platform.unwrap_or_default(),
            authorization_code: secret.expose_secret().to_string(),
        },
    };

    let span = keygate_core::auth_span!("login", credential.method(), credential.account());
    let response = state.auth.login(&credential).instrument(span).await?;

    Ok(ApiResponse::success(response))
}

/// Access Token 재발급.
///
/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<RefreshResponse> {
    let request = json_body(payload)?;
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::bad_request("refresh_token은 필수입니다"));
    }

    Ok(ApiResponse::success(state.auth.refresh(&request.refresh_token)?))
}

/// SMS 인증 코드 발송.
///
/// 실제 SMS 게이트웨이 연동은 없으며 코드는 메모리에만 저장됩니다.
/// POST /auth/sms/send
pub async fn send_sms_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SmsSendRequest>, JsonRejection>,
) -> ApiResult<SmsSendResponse> {
    let request = json_body(payload)?;
    let issued = state.sms.send_code(request.phone.trim()).await?;

    let code = if state.config.sms.expose_code {
        info!(phone = %mask_phone(&issued.phone), "SMS code exposed in response");
        Some(issued.code)
    } else {
        None
    };

    Ok(ApiResponse::success(SmsSendResponse {
        phone: mask_phone(&issued.phone),
        expires_in: issued.expires_in.as_secs(),
        code,
    }))
}

/// 활성 공개키.
///
/// GET /auth/public-key
pub async fn public_key(State(state): State<Arc<AppState>>) -> ApiResult<PublicKeyResponse> {
    let material = state.keys.current();

    Ok(ApiResponse::success(PublicKeyResponse {
        public_key: material.public_key_string().to_string(),
        fingerprint: material.fingerprint().to_string(),
    }))
}

/// 현재 사용자.
///
/// GET /auth/me
pub async fn me(Authenticated(principal): Authenticated) -> ApiResult<PrincipalView> {
    Ok(ApiResponse::success(PrincipalView::from(principal.as_ref())))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/sms/send", post(send_sms_code))
        .route("/public-key", get(public_key))
        .route("/me", get(me))
}

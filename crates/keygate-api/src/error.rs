//! 통합 API 응답 타입.
//!
//! 모든 엔드포인트는 `{ "code", "msg", "data" }` 형식의 envelope를 반환합니다.
//! 에러 응답은 HTTP 상태 코드와 별도로 envelope의 `code`에 세분화된 값을 담습니다
//! (예: 만료된 토큰은 HTTP 401 + `code` 407).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use keygate_core::{AuthError, SmsError, TokenError};

/// envelope 상태 코드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Success,
    ClientError,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    /// 토큰 검증 실패 (형식, 서명, 파싱)
    ValidateTokenFail,
    /// 토큰 만료
    TokenExpired,
    TooManyRequests,
    ServerError,
}

impl AppStatus {
    /// envelope `code` 값.
    pub fn code(self) -> i32 {
        match self {
            AppStatus::Success => 200,
            AppStatus::ClientError => 400,
            AppStatus::Unauthorized => 401,
            AppStatus::Forbidden => 403,
            AppStatus::NotFound => 404,
            AppStatus::MethodNotAllowed => 405,
            AppStatus::ValidateTokenFail => 406,
            AppStatus::TokenExpired => 407,
            AppStatus::TooManyRequests => 429,
            AppStatus::ServerError => 500,
        }
    }

    /// 응답 HTTP 상태.
    pub fn http_status(self) -> StatusCode {
        match self {
            AppStatus::Success => StatusCode::OK,
            AppStatus::ClientError => StatusCode::BAD_REQUEST,
            AppStatus::Unauthorized | AppStatus::ValidateTokenFail | AppStatus::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppStatus::Forbidden => StatusCode::FORBIDDEN,
            AppStatus::NotFound => StatusCode::NOT_FOUND,
            AppStatus::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppStatus::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppStatus::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 응답 envelope.
///
/// ```json
/// { "code": 200, "msg": "success", "data": { "token": "..." } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 성공 응답.
    pub fn success(data: T) -> Self {
        Self {
            code: AppStatus::Success.code(),
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// 데이터 없는 응답.
    pub fn message(status: AppStatus, msg: impl Into<String>) -> Self {
        Self {
            code: status.code(),
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// API 에러.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: AppStatus,
    message: String,
}

impl ApiError {
    pub fn new(status: AppStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(AppStatus::ClientError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppStatus::ServerError, message)
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::new(AppStatus::TokenExpired, err.to_string()),
            TokenError::Issue(_) => Self::internal("토큰을 발급할 수 없습니다"),
            TokenError::Malformed | TokenError::SignatureInvalid | TokenError::Parse(_) => {
                Self::new(AppStatus::ValidateTokenFail, err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_internal() {
            // 내부 상세는 로그에만 남김
            error!(error = %err, "Internal authentication failure");
            return Self::internal("서버 내부 오류");
        }

        match err {
            AuthError::Token(token) => token.into(),
            AuthError::InvalidCredentials
            | AuthError::UserNotFound(_)
            | AuthError::NotAuthenticated => Self::new(AppStatus::Unauthorized, err.to_string()),
            AuthError::Forbidden => Self::new(AppStatus::Forbidden, err.to_string()),
            AuthError::UnsupportedAuthMethod(_) | AuthError::InvalidRequest(_) => {
                Self::bad_request(err.to_string())
            }
            AuthError::Crypto(_) | AuthError::Directory(_) => Self::internal("서버 내부 오류"),
        }
    }
}

impl From<SmsError> for ApiError {
    fn from(err: SmsError) -> Self {
        match err {
            SmsError::InvalidPhone(_) => Self::bad_request(err.to_string()),
            SmsError::TooFrequent { .. } => Self::new(AppStatus::TooManyRequests, err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let http_status = self.status.http_status();
        if http_status.is_server_error() {
            error!(code = self.status.code(), message = %self.message, "Request failed");
        } else {
            warn!(code = self.status.code(), message = %self.message, "Request rejected");
        }

        (
            http_status,
            Json(ApiResponse::message(self.status, self.message)),
        )
            .into_response()
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_core::AuthMethod;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_success_serialization() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["msg"], "success");
        assert_eq!(json["data"], 42);
    }

    #[test]
    fn test_token_error_mapping() {
        assert_eq!(ApiError::from(TokenError::Expired).status(), AppStatus::TokenExpired);
        assert_eq!(
            ApiError::from(TokenError::SignatureInvalid).status(),
            AppStatus::ValidateTokenFail
        );
        assert_eq!(
            ApiError::from(TokenError::Parse("x".to_string())).status(),
            AppStatus::ValidateTokenFail
        );
        assert_eq!(
            ApiError::from(AuthError::Token(TokenError::Malformed)).status(),
            AppStatus::ValidateTokenFail
        );
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            AppStatus::Unauthorized
        );
        assert_eq!(
            ApiError::from(AuthError::UnsupportedAuthMethod(AuthMethod::Federated)).status(),
            AppStatus::ClientError
        );
        assert_eq!(ApiError::from(AuthError::Forbidden).status(), AppStatus::Forbidden);

        let internal = ApiError::from(AuthError::Directory("connection refused".to_string()));
        assert_eq!(internal.status(), AppStatus::ServerError);
        assert!(!internal.message().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_expired_token_response() {
        let response = ApiError::from(TokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["code"], 407);
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_sms_throttle_response() {
        let response = ApiError::from(SmsError::TooFrequent {
            retry_after_secs: 30,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await["code"], 429);
    }
}

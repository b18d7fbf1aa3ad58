//! 요청 인증 필터와 추출기.
//!
//! 모든 라우트 앞에서 한 번 실행됩니다.
//!
//! 1. `Authorization` 헤더가 없거나 `Bearer `로 시작하지 않으면 미인증 상태로 통과
//! 2. 토큰 검증 실패 → envelope 에러 응답 (핸들러 미실행)
//! 3. subject의 사용자가 없으면 → envelope 에러 응답
//! 4. Principal을 [`AuthContext`]와 요청 extension에 바인딩하고 다음 단계 실행

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use keygate_core::{AuthError, Principal};

use super::context::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// 요청 extension에 저장되는 인증 사용자.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Arc<Principal>);

/// `Authorization: Bearer <token>`에서 토큰을 꺼냅니다.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
}

/// 요청 인증 필터.
///
/// `axum::middleware::from_fn_with_state`로 라우터 전체에 적용합니다.
pub async fn authenticate_request(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return AuthContext::scope(None, next.run(request)).await;
    };

    match state.auth.authenticate_token(&token).await {
        Ok(principal) => {
            let principal = Arc::new(principal);
            debug!(
                user_id = principal.id,
                path = %request.uri().path(),
                "Request authenticated"
            );
            request
                .extensions_mut()
                .insert(CurrentPrincipal(principal.clone()));
            AuthContext::scope(Some(principal), next.run(request)).await
        }
        Err(e) => {
            debug!(
                reason = e.reason(),
                path = %request.uri().path(),
                "Bearer token rejected"
            );
            ApiError::from(e).into_response()
        }
    }
}

/// 인증 필수 추출기.
///
/// ```rust,ignore
/// async fn me(Authenticated(principal): Authenticated) -> impl IntoResponse {
///     format!("Hello, {}!", principal.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Arc<Principal>);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPrincipal>()
            .map(|current| current.0.clone())
            .or_else(AuthContext::current_principal)
            .map(Authenticated)
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }
}

/// 선택적 인증 추출기.
///
/// 인증되지 않은 요청에서도 실패하지 않습니다.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<Arc<Principal>>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(
            parts
                .extensions
                .get::<CurrentPrincipal>()
                .map(|current| current.0.clone())
                .or_else(AuthContext::current_principal),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/probe",
                get(move |MaybeAuthenticated(principal): MaybeAuthenticated| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let from_context = AuthContext::current_user_id();
                        assert_eq!(from_context, principal.as_ref().map(|p| p.id));
                        match from_context {
                            Some(id) => id.to_string(),
                            None => "anonymous".to_string(),
                        }
                    }
                }),
            )
            .route(
                "/fail",
                get(|| async {
                    assert!(AuthContext::is_authenticated());
                    ApiError::internal("handler failed")
                }),
            )
            .layer(middleware::from_fn_with_state(state, authenticate_request))
    }

    fn request(uri: &str, authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_no_header_passes_unauthenticated() {
        let state = Arc::new(create_test_state());
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_bearer_header_passes_unauthenticated() {
        let state = Arc::new(create_test_state());
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", Some("Basic YWxpY2U6cHcxMjM=")))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "anonymous");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_token_binds_principal() {
        let state = Arc::new(create_test_state());
        let token = state.tokens.issue_access("7").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "7");
        // 요청이 끝나면 컨텍스트는 비어 있어야 함
        assert!(AuthContext::current_principal().is_none());
    }

    #[tokio::test]
    async fn test_invalid_token_short_circuits() {
        let state = Arc::new(create_test_state());
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", Some("Bearer not.a.token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["code"], 406);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_short_circuits() {
        let state = Arc::new(create_test_state());
        let token = state.tokens.issue("7", Duration::from_secs(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["code"], 407);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_short_circuits() {
        let state = Arc::new(create_test_state());
        let token = state.tokens.issue_access("99").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let response = app(state, calls.clone())
            .oneshot(request("/probe", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["code"], 401);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_released_after_handler_error() {
        let state = Arc::new(create_test_state());
        let token = state.tokens.issue_access("7").unwrap();

        let response = app(state, Arc::new(AtomicUsize::new(0)))
            .oneshot(request("/fail", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(AuthContext::current_principal().is_none());
    }
}

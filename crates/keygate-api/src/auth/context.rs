//! 요청 범위 인증 컨텍스트.
//!
//! 인증 필터가 설정한 Principal은 해당 요청의 future 안에서만 보입니다.
//! `tokio::task_local!` 범위가 끝나면(정상 종료, 에러 응답, panic, 취소 모두) 자동으로 해제되므로
//! 다른 요청으로 새어 나가지 않습니다. `tokio::spawn`한 태스크로는 전파되지 않습니다.

use std::future::Future;
use std::sync::Arc;

use keygate_core::{AuthError, Principal};

tokio::task_local! {
    static CURRENT_PRINCIPAL: Option<Arc<Principal>>;
}

/// 현재 요청의 인증 정보 조회.
pub struct AuthContext;

impl AuthContext {
    /// 주어진 Principal을 바인딩한 상태로 future를 실행합니다.
    pub async fn scope<F>(principal: Option<Arc<Principal>>, f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_PRINCIPAL.scope(principal, f).await
    }

    /// 현재 Principal. 범위 밖이거나 인증되지 않았으면 `None`.
    pub fn current_principal() -> Option<Arc<Principal>> {
        CURRENT_PRINCIPAL.try_with(|p| p.clone()).ok().flatten()
    }

    pub fn is_authenticated() -> bool {
        Self::current_principal().is_some()
    }

    /// 인증된 Principal을 요구합니다.
    pub fn require_authenticated() -> Result<Arc<Principal>, AuthError> {
        Self::current_principal().ok_or(AuthError::NotAuthenticated)
    }

    pub fn current_user_id() -> Option<i64> {
        Self::current_principal().map(|p| p.id)
    }

    pub fn current_username() -> Option<String> {
        Self::current_principal().map(|p| p.username.clone())
    }

    /// 현재 사용자가 주어진 내부 ID인지 확인합니다. 미인증이면 `false`.
    pub fn is_current_user(id: i64) -> bool {
        Self::current_user_id() == Some(id)
    }

    /// 현재 사용자가 주어진 외부 사용자 ID인지 확인합니다. 미인증이면 `false`.
    pub fn is_current_user_id(user_id: &str) -> bool {
        Self::current_principal().is_some_and(|p| p.user_id == user_id)
    }

    /// 현재 사용자 본인임을 요구합니다.
    pub fn require_current_user(id: i64) -> Result<Arc<Principal>, AuthError> {
        let principal = Self::require_authenticated()?;
        if principal.id != id {
            return Err(AuthError::Forbidden);
        }
        Ok(principal)
    }

    /// 현재 사용자가 주어진 외부 사용자 ID 본인임을 요구합니다.
    pub fn require_current_user_id(user_id: &str) -> Result<Arc<Principal>, AuthError> {
        let principal = Self::require_authenticated()?;
        if principal.user_id != user_id {
            return Err(AuthError::Forbidden);
        }
        Ok(principal)
    }
}

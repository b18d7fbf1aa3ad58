//! 인증 방식 디스패처.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::credential::{AuthMethod, Credential};
use super::strategy::AuthenticationStrategy;
use crate::error::{AuthError, AuthResult};
use crate::principal::Principal;

/// 자격증명을 인증 방식에 맞는 전략으로 전달합니다.
///
/// 전략 등록은 생성 단계에서만 이루어지며, 이후에는 읽기 전용으로 공유됩니다.
#[derive(Default)]
pub struct AuthenticationDispatcher {
    strategies: HashMap<AuthMethod, Arc<dyn AuthenticationStrategy>>,
}

impl AuthenticationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전략을 등록합니다. 같은 방식의 기존 전략은 교체되어 반환됩니다.
    pub fn register(
        &mut self,
        strategy: Arc<dyn AuthenticationStrategy>,
    ) -> Option<Arc<dyn AuthenticationStrategy>> {
        self.strategies.insert(strategy.method(), strategy)
    }

    /// 빌더 형태의 등록.
    pub fn with_strategy(mut self, strategy: Arc<dyn AuthenticationStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// 해당 방식의 전략이 등록되어 있는지 확인합니다.
    pub fn supports(&self, method: AuthMethod) -> bool {
        self.strategies.contains_key(&method)
    }

    /// 등록된 인증 방식 목록.
    pub fn methods(&self) -> Vec<AuthMethod> {
        self.strategies.keys().copied().collect()
    }

    /// 자격증명을 인증합니다.
    pub async fn dispatch(&self, credential: &Credential) -> AuthResult<Principal> {
        let method = credential.method();
        let result = match self.strategies.get(&method) {
            Some(strategy) => strategy.authenticate(credential).await,
            None => Err(AuthError::UnsupportedAuthMethod(method)),
        };

        match result {
            Ok(principal) => {
                info!(
                    user_id = principal.id,
                    method = %method,
                    "Authentication succeeded"
                );
                Ok(principal)
            }
            Err(e) => {
                warn!(
                    account = %credential.account(),
                    method = %method,
                    reason = e.reason(),
                    "Authentication failed"
                );
                Err(e)
            }
        }
    }
}

//! 요청 인증.
//!
//! - [`middleware`]: Bearer 토큰 인증 필터와 추출기
//! - [`context`]: 요청 범위 인증 컨텍스트

pub mod context;
pub mod middleware;

pub use context::AuthContext;
pub use middleware::{
    authenticate_request, bearer_token, Authenticated, CurrentPrincipal, MaybeAuthenticated,
};

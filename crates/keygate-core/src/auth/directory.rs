//! 사용자 디렉터리.
//!
//! 계정/ID로 사용자를 조회하는 저장소 추상화와 메모리 구현.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::SeedUser;
use crate::error::{AuthError, AuthResult};
use crate::principal::{AuthRecord, CredentialType, Principal, UserStatus};

/// 사용자 조회 저장소.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 계정 식별자(사용자명, 이메일, 휴대폰 번호)로 조회합니다.
    ///
    /// 반환된 Principal의 `auth`는 식별자와 일치한 인증 레코드입니다.
    async fn find_by_account(&self, account: &str) -> AuthResult<Option<Principal>>;

    /// 내부 숫자 ID로 조회합니다.
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Principal>>;
}

/// 디렉터리에 저장되는 사용자.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
    /// 인증 레코드 (첫 번째가 기본 레코드)
    pub records: Vec<AuthRecord>,
}

impl UserRecord {
    pub fn new(id: i64, user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            username: username.into(),
            avatar: None,
            status: UserStatus::Active,
            records: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: AuthRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    fn to_principal(&self, record: &AuthRecord) -> Principal {
        Principal {
            id: self.id,
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            status: self.status,
            auth: record.clone(),
        }
    }
}

impl From<&SeedUser> for UserRecord {
    fn from(seed: &SeedUser) -> Self {
        let mut user = UserRecord::new(seed.id, seed.user_id.clone(), seed.username.clone());
        if let Some(avatar) = &seed.avatar {
            user = user.with_avatar(avatar.clone());
        }
        user.status = seed.status;

        if let Some(hash) = &seed.password_hash {
            user.records.push(AuthRecord::password(
                CredentialType::Password,
                seed.username.clone(),
                hash.clone(),
            ));
            if let Some(email) = &seed.email {
                user.records
                    .push(AuthRecord::password(CredentialType::Email, email.clone(), hash.clone()));
            }
        }
        if let Some(phone) = &seed.phone {
            user.records.push(AuthRecord::phone(phone.clone()));
        }
        user
    }
}

/// 메모리 기반 사용자 디렉터리.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<i64, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정의 초기 사용자 목록으로 생성합니다.
    ///
    /// 다른 사용자가 이미 쓰는 계정 식별자를 가진 항목은 건너뜁니다 (먼저 나온 항목 우선).
    pub fn from_seed(seeds: &[SeedUser]) -> Self {
        let mut users = HashMap::with_capacity(seeds.len());

        for seed in seeds {
            let user = UserRecord::from(seed);
            if let Some(identifier) = conflicting_identifier(&users, &user) {
                warn!(
                    user_id = %user.user_id,
                    identifier,
                    "Seed user skipped: account identifier already registered"
                );
                continue;
            }
            if user.records.is_empty() {
                warn!(user_id = %user.user_id, "Seed user has no credentials and cannot log in");
            }
            users.insert(user.id, user);
        }

        Self {
            users: RwLock::new(users),
        }
    }

    /// 사용자를 추가하거나 같은 ID의 사용자를 교체합니다.
    ///
    /// 계정 식별자가 다른 사용자의 것과 겹치면 거부합니다.
    pub async fn insert(&self, user: UserRecord) -> AuthResult<()> {
        let mut users = self.users.write().await;
        if let Some(identifier) = conflicting_identifier(&users, &user) {
            return Err(AuthError::InvalidRequest(format!(
                "account identifier already registered: {identifier}"
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }

    pub async fn remove(&self, id: i64) -> Option<UserRecord> {
        self.users.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

/// `user`의 식별자 중 다른 ID의 사용자가 이미 쓰는 것을 찾습니다.
fn conflicting_identifier<'a>(
    users: &HashMap<i64, UserRecord>,
    user: &'a UserRecord,
) -> Option<&'a str> {
    user.records
        .iter()
        .map(|record| record.identifier.as_str())
        .find(|identifier| {
            users.values().any(|other| {
                other.id != user.id
                    && other.records.iter().any(|record| record.identifier == *identifier)
            })
        })
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_account(&self, account: &str) -> AuthResult<Option<Principal>> {
        let users = self.users.read().await;
        let found = users.values().find_map(|user| {
            user.records
                .iter()
                .find(|record| record.identifier == account)
                .map(|record| user.to_principal(record))
        });
        Ok(found)
    }

    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Principal>> {
        let users = self.users.read().await;
        Ok(users.get(&id).and_then(|user| {
            user.records
                .first()
                .map(|record| user.to_principal(record))
        }))
    }
}

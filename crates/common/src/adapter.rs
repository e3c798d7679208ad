use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::types::{Account, NewUser, Session, User, VerificationToken};

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("account {provider}/{provider_account_id} has no user id")]
    UnlinkedAccount {
        provider: String,
        provider_account_id: String,
    },

    #[error("invalid stored record: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AdapterError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Persistence interface for users, linked accounts, sessions and
/// verification tokens.
///
/// Lookups return `Ok(None)` for missing records; mutations of missing
/// records return [`AdapterError::NotFound`].
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn create_user(&self, user: NewUser) -> AdapterResult<User>;

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>>;

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<User>>;

    async fn update_user(&self, user: User) -> AdapterResult<User>;

    /// Delete a user along with its accounts and sessions.
    async fn delete_user(&self, id: &str) -> AdapterResult<Option<User>>;

    /// Link an account to `account.user_id`; relinking the same
    /// provider account replaces the stored tokens.
    async fn link_account(&self, account: Account) -> AdapterResult<Account>;

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<Account>>;

    async fn create_session(&self, session: Session) -> AdapterResult<Session>;

    /// Expired sessions are deleted and reported as missing.
    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<(Session, User)>>;

    async fn update_session(
        &self,
        session_token: &str,
        expires: DateTime<Utc>,
    ) -> AdapterResult<Option<Session>>;

    async fn delete_session(&self, session_token: &str) -> AdapterResult<Option<Session>>;

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken>;

    /// Single use: the token is deleted when returned.
    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> AdapterResult<Option<VerificationToken>>;
}

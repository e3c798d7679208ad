use std::collections::HashMap;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tokio::sync::RwLock,
    tracing::debug,
};

use warden_common::{
    Account, Adapter, AdapterError, AdapterResult, NewUser, Session, User, VerificationToken,
};

type AccountKey = (String, String);

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    accounts: HashMap<AccountKey, Account>,
    sessions: HashMap<String, Session>,
    verification_tokens: HashMap<AccountKey, VerificationToken>,
}

/// In-process adapter backed by hash maps.
#[derive(Default)]
pub struct MemoryAdapter {
    state: RwLock<State>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn account_key(provider: &str, provider_account_id: &str) -> AccountKey {
    (provider.to_string(), provider_account_id.to_string())
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn create_user(&self, user: NewUser) -> AdapterResult<User> {
        let user = user.into_user(crate::new_id());
        self.state
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        debug!(user_id = %user.id, "created user");
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<User>> {
        let state = self.state.read().await;
        let user = state
            .accounts
            .get(&account_key(provider, provider_account_id))
            .and_then(|a| a.user_id.as_deref())
            .and_then(|id| state.users.get(id))
            .cloned();
        Ok(user)
    }

    async fn update_user(&self, user: User) -> AdapterResult<User> {
        let mut state = self.state.write().await;
        let Some(existing) = state.users.get_mut(&user.id) else {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: user.id,
            });
        };
        *existing = user.clone();
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<Option<User>> {
        let mut state = self.state.write().await;
        let removed = state.users.remove(id);
        if removed.is_some() {
            state
                .accounts
                .retain(|_, a| a.user_id.as_deref() != Some(id));
            state.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    async fn link_account(&self, account: Account) -> AdapterResult<Account> {
        let Some(user_id) = account.user_id.as_deref() else {
            return Err(AdapterError::UnlinkedAccount {
                provider: account.provider,
                provider_account_id: account.provider_account_id,
            });
        };
        let mut state = self.state.write().await;
        if !state.users.contains_key(user_id) {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            });
        }
        state.accounts.insert(
            account_key(&account.provider, &account.provider_account_id),
            account.clone(),
        );
        Ok(account)
    }

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<Account>> {
        Ok(self
            .state
            .write()
            .await
            .accounts
            .remove(&account_key(provider, provider_account_id)))
    }

    async fn create_session(&self, session: Session) -> AdapterResult<Session> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&session.user_id) {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: session.user_id,
            });
        }
        state
            .sessions
            .insert(session.session_token.clone(), session.clone());
        Ok(session)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<(Session, User)>> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get(session_token).cloned() else {
            return Ok(None);
        };
        if session.is_expired_at(Utc::now()) {
            state.sessions.remove(session_token);
            return Ok(None);
        }
        let user = state.users.get(&session.user_id).cloned();
        Ok(user.map(|u| (session, u)))
    }

    async fn update_session(
        &self,
        session_token: &str,
        expires: DateTime<Utc>,
    ) -> AdapterResult<Option<Session>> {
        let mut state = self.state.write().await;
        Ok(state.sessions.get_mut(session_token).map(|s| {
            s.expires = expires;
            s.clone()
        }))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<Option<Session>> {
        Ok(self.state.write().await.sessions.remove(session_token))
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        self.state.write().await.verification_tokens.insert(
            (token.identifier.clone(), token.token.clone()),
            token.clone(),
        );
        Ok(token)
    }

    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> AdapterResult<Option<VerificationToken>> {
        Ok(self
            .state
            .write()
            .await
            .verification_tokens
            .remove(&(identifier.to_string(), token.to_string())))
    }
}

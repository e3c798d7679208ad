use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tracing::debug,
};

use warden_common::{
    Account, Adapter, AdapterError, AdapterResult, NewUser, ProviderType, Session, TokenSet, User,
    VerificationToken,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    email_verified: Option<i64>,
    image: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            email_verified: row.email_verified.map(from_millis),
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    provider: String,
    provider_account_id: String,
    user_id: String,
    account_type: String,
    expires_at: Option<i64>,
    tokens_json: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = AdapterError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let provider_type = row
            .account_type
            .parse::<ProviderType>()
            .map_err(|_| AdapterError::Corrupt(format!("account type '{}'", row.account_type)))?;
        let tokens: TokenSet = serde_json::from_str(&row.tokens_json)?;
        Ok(Self {
            provider: row.provider,
            provider_type,
            provider_account_id: row.provider_account_id,
            user_id: Some(row.user_id),
            expires_at: row.expires_at,
            tokens,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_token: String,
    user_id: String,
    expires: i64,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            session_token: row.session_token,
            user_id: row.user_id,
            expires: from_millis(row.expires),
        }
    }
}

#[derive(sqlx::FromRow)]
struct VerificationTokenRow {
    identifier: String,
    token: String,
    expires: i64,
}

impl From<VerificationTokenRow> for VerificationToken {
    fn from(row: VerificationTokenRow) -> Self {
        Self {
            identifier: row.identifier,
            token: row.token,
            expires: from_millis(row.expires),
        }
    }
}

/// sqlx adapter over a SQLite pool.
pub struct SqliteAdapter {
    pool: sqlx::SqlitePool,
}

impl SqliteAdapter {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the adapter tables if they do not exist yet.
    pub async fn init(pool: &sqlx::SqlitePool) -> AdapterResult<()> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS users (
                id             TEXT PRIMARY KEY,
                name           TEXT,
                email          TEXT UNIQUE,
                email_verified INTEGER,
                image          TEXT
            )"#,
            r#"CREATE TABLE IF NOT EXISTS accounts (
                provider            TEXT    NOT NULL,
                provider_account_id TEXT    NOT NULL,
                user_id             TEXT    NOT NULL REFERENCES users(id),
                account_type        TEXT    NOT NULL,
                expires_at          INTEGER,
                tokens_json         TEXT    NOT NULL,
                PRIMARY KEY (provider, provider_account_id)
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id)",
            r#"CREATE TABLE IF NOT EXISTS sessions (
                session_token TEXT    PRIMARY KEY,
                user_id       TEXT    NOT NULL REFERENCES users(id),
                expires       INTEGER NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
            r#"CREATE TABLE IF NOT EXISTS verification_tokens (
                identifier TEXT    NOT NULL,
                token      TEXT    NOT NULL,
                expires    INTEGER NOT NULL,
                PRIMARY KEY (identifier, token)
            )"#,
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(AdapterError::backend)?;
        }
        Ok(())
    }

    async fn user_exists(&self, id: &str) -> AdapterResult<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(AdapterError::backend)?;
        Ok(count > 0)
    }

    async fn fetch_session(&self, session_token: &str) -> AdapterResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_token = ?")
            .bind(session_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(AdapterError::backend)?;
        Ok(row.map(Session::from))
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn create_user(&self, user: NewUser) -> AdapterResult<User> {
        let user = user.into_user(crate::new_id());
        sqlx::query(
            "INSERT INTO users (id, name, email, email_verified, image) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.email_verified.map(|d| d.timestamp_millis()))
        .bind(&user.image)
        .execute(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        debug!(user_id = %user.id, "created user");
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AdapterError::backend)?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AdapterError::backend)?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT u.* FROM users u
               JOIN accounts a ON a.user_id = u.id
               WHERE a.provider = ? AND a.provider_account_id = ?"#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        Ok(row.map(User::from))
    }

    async fn update_user(&self, user: User) -> AdapterResult<User> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, email_verified = ?, image = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.email_verified.map(|d| d.timestamp_millis()))
        .bind(&user.image)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        if result.rows_affected() == 0 {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: user.id,
            });
        }
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<Option<User>> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await.map_err(AdapterError::backend)?;
        for statement in [
            "DELETE FROM accounts WHERE user_id = ?",
            "DELETE FROM sessions WHERE user_id = ?",
            "DELETE FROM users WHERE id = ?",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(AdapterError::backend)?;
        }
        tx.commit().await.map_err(AdapterError::backend)?;

        Ok(Some(user))
    }

    async fn link_account(&self, account: Account) -> AdapterResult<Account> {
        let Some(user_id) = account.user_id.as_deref() else {
            return Err(AdapterError::UnlinkedAccount {
                provider: account.provider,
                provider_account_id: account.provider_account_id,
            });
        };
        if !self.user_exists(user_id).await? {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: user_id.to_string(),
            });
        }

        let tokens_json = serde_json::to_string(&account.tokens)?;
        sqlx::query(
            r#"INSERT INTO accounts (
                provider, provider_account_id, user_id, account_type, expires_at, tokens_json
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (provider, provider_account_id) DO UPDATE SET
                user_id = excluded.user_id,
                account_type = excluded.account_type,
                expires_at = excluded.expires_at,
                tokens_json = excluded.tokens_json"#,
        )
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(user_id)
        .bind(account.provider_type.as_str())
        .bind(account.expires_at)
        .bind(&tokens_json)
        .execute(&self.pool)
        .await
        .map_err(AdapterError::backend)?;

        Ok(account)
    }

    async fn unlink_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AdapterResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "DELETE FROM accounts WHERE provider = ? AND provider_account_id = ? RETURNING *",
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        row.map(Account::try_from).transpose()
    }

    async fn create_session(&self, session: Session) -> AdapterResult<Session> {
        if !self.user_exists(&session.user_id).await? {
            return Err(AdapterError::NotFound {
                kind: "user",
                id: session.user_id,
            });
        }
        sqlx::query("INSERT INTO sessions (session_token, user_id, expires) VALUES (?, ?, ?)")
            .bind(&session.session_token)
            .bind(&session.user_id)
            .bind(session.expires.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(AdapterError::backend)?;
        Ok(session)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<(Session, User)>> {
        let Some(session) = self.fetch_session(session_token).await? else {
            return Ok(None);
        };
        if session.is_expired_at(Utc::now()) {
            self.delete_session(session_token).await?;
            return Ok(None);
        }
        let user = self.get_user(&session.user_id).await?;
        Ok(user.map(|u| (session, u)))
    }

    async fn update_session(
        &self,
        session_token: &str,
        expires: DateTime<Utc>,
    ) -> AdapterResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "UPDATE sessions SET expires = ? WHERE session_token = ? RETURNING *",
        )
        .bind(expires.timestamp_millis())
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        Ok(row.map(Session::from))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "DELETE FROM sessions WHERE session_token = ? RETURNING *",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        Ok(row.map(Session::from))
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        sqlx::query(
            r#"INSERT INTO verification_tokens (identifier, token, expires) VALUES (?, ?, ?)
               ON CONFLICT (identifier, token) DO UPDATE SET expires = excluded.expires"#,
        )
        .bind(&token.identifier)
        .bind(&token.token)
        .bind(token.expires.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        Ok(token)
    }

    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> AdapterResult<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationTokenRow>(
            "DELETE FROM verification_tokens WHERE identifier = ? AND token = ? RETURNING *",
        )
        .bind(identifier)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AdapterError::backend)?;
        Ok(row.map(VerificationToken::from))
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

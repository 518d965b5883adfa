//! Identity provider seam and the SQLite/JWT backed implementation
//!
//! The provider owns credentials and custom claims. Everything else in the
//! crate talks to it through [`IdentityProvider`], so the process entry point
//! decides which implementation is wired in.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::ProviderError;
use super::models::{CustomClaims, IdTokenClaims, Identity, NewAccount, ProviderUser, SignIn};
use crate::common::{generate_user_id, safe_email_log, Clock};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a signed ID token and return the identity it asserts
    async fn verify_token(&self, token: &str) -> Result<Identity, ProviderError>;

    async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError>;

    async fn get_user_by_email(&self, email: &str) -> Result<ProviderUser, ProviderError>;

    /// Replace the account's custom claims
    async fn set_custom_claims(&self, uid: &str, claims: &CustomClaims)
        -> Result<(), ProviderError>;

    async fn create_user(&self, account: NewAccount) -> Result<ProviderUser, ProviderError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignIn, ProviderError>;
}

#[derive(FromRow)]
struct AccountRow {
    uid: String,
    email: String,
    email_verified: bool,
    password_hash: String,
    display_name: Option<String>,
    custom_claims: String,
    disabled: bool,
    created_at: DateTime<Utc>,
    last_sign_in_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    fn into_user(self) -> ProviderUser {
        let custom_claims = CustomClaims::from_json(&self.custom_claims).unwrap_or_else(|e| {
            warn!(uid = %self.uid, error = %e, "Stored custom claims are malformed, using defaults");
            CustomClaims::default()
        });
        ProviderUser {
            uid: self.uid,
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.display_name,
            custom_claims,
            disabled: self.disabled,
            created_at: self.created_at,
            last_sign_in_at: self.last_sign_in_at,
        }
    }
}

/// Provider backed by the `auth_accounts` table, issuing HS256 ID tokens
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    db: SqlitePool,
    jwt_secret: String,
    issuer: String,
    token_ttl: Duration,
    clock: Arc<dyn Clock>,
    hash_params: Params,
}

impl LocalIdentityProvider {
    pub fn new(
        db: SqlitePool,
        jwt_secret: String,
        issuer: String,
        token_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            issuer,
            token_ttl,
            clock,
            hash_params: Params::default(),
        }
    }

    /// Override the argon2 cost parameters (memory KiB, iterations, lanes)
    pub fn with_hash_cost(mut self, m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
        match Params::new(m_cost, t_cost, p_cost, None) {
            Ok(params) => self.hash_params = params,
            Err(e) => warn!(error = %e, "Invalid argon2 parameters, keeping defaults"),
        }
        self
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.hash_params.clone())
    }

    fn hash_password(&self, password: &str) -> Result<String, ProviderError> {
        let mut salt_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| ProviderError::Backend(format!("salt encoding: {}", e)))?;
        let phc = self
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ProviderError::Backend(format!("password hashing: {}", e)))?;
        Ok(phc.to_string())
    }

    fn verify_password(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .hasher()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Mint an ID token for an account. `auth_time` is when credentials were presented.
    pub fn mint_id_token(
        &self,
        user: &ProviderUser,
        auth_time: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), ProviderError> {
        let now = self.clock.now();
        let expires_at = now + self.token_ttl;
        let claims = IdTokenClaims {
            sub: user.uid.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            auth_time: auth_time.timestamp(),
            claims: user.custom_claims.clone(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ProviderError::Backend(format!("token signing: {}", e)))?;

        Ok((token, expires_at))
    }

    async fn fetch_account(&self, column: &str, value: &str) -> Result<AccountRow, ProviderError> {
        let sql = format!("SELECT * FROM auth_accounts WHERE {} = ?", column);
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ProviderError::UserNotFound)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<Identity, ProviderError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[self.issuer.as_str()]);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;

        let decoded = decode::<IdTokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        let claims = decoded.claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(ProviderError::InvalidToken("token expired".into()));
        }

        let auth_time = Utc
            .timestamp_opt(claims.auth_time, 0)
            .single()
            .ok_or_else(|| ProviderError::InvalidToken("bad auth_time".into()))?;

        Ok(Identity {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            claims: claims.claims,
            auth_time,
        })
    }

    async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError> {
        Ok(self.fetch_account("uid", uid).await?.into_user())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<ProviderUser, ProviderError> {
        Ok(self.fetch_account("email", email).await?.into_user())
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> Result<(), ProviderError> {
        let blob = serde_json::to_string(claims)
            .map_err(|e| ProviderError::Backend(format!("claims serialization: {}", e)))?;

        let result = sqlx::query("UPDATE auth_accounts SET custom_claims = ? WHERE uid = ?")
            .bind(&blob)
            .bind(uid)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ProviderError::UserNotFound);
        }

        debug!(uid = %uid, role = %claims.role, "Custom claims updated");
        Ok(())
    }

    async fn create_user(&self, account: NewAccount) -> Result<ProviderUser, ProviderError> {
        match self.get_user_by_email(&account.email).await {
            Ok(_) => return Err(ProviderError::EmailExists),
            Err(ProviderError::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        let uid = account.uid.unwrap_or_else(generate_user_id);
        let password_hash = self.hash_password(&account.password)?;
        let claims_blob = serde_json::to_string(&account.claims)
            .map_err(|e| ProviderError::Backend(format!("claims serialization: {}", e)))?;
        let now = self.clock.now();

        sqlx::query(
            r#"
            INSERT INTO auth_accounts (
                uid, email, email_verified, password_hash, display_name, custom_claims, disabled, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&uid)
        .bind(&account.email)
        .bind(account.email_verified)
        .bind(&password_hash)
        .bind(&account.display_name)
        .bind(&claims_blob)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ProviderError::EmailExists
            }
            _ => ProviderError::Database(e),
        })?;

        info!(uid = %uid, email = %safe_email_log(&account.email), "Provider account created");
        self.get_user(&uid).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignIn, ProviderError> {
        let row = match self.fetch_account("email", email).await {
            Ok(row) => row,
            Err(ProviderError::UserNotFound) => return Err(ProviderError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        if !self.verify_password(password, &row.password_hash) {
            warn!(email = %safe_email_log(email), "Password sign-in rejected");
            return Err(ProviderError::InvalidCredentials);
        }
        if row.disabled {
            return Err(ProviderError::Disabled);
        }

        let now = self.clock.now();
        let mut user = row.into_user();
        user.custom_claims.last_login = Some(now);
        user.last_sign_in_at = Some(now);

        let blob = serde_json::to_string(&user.custom_claims)
            .map_err(|e| ProviderError::Backend(format!("claims serialization: {}", e)))?;
        sqlx::query("UPDATE auth_accounts SET last_sign_in_at = ?, custom_claims = ? WHERE uid = ?")
            .bind(now)
            .bind(&blob)
            .bind(&user.uid)
            .execute(&self.db)
            .await?;

        let (id_token, expires_at) = self.mint_id_token(&user, now)?;
        info!(uid = %user.uid, "Password sign-in succeeded");

        Ok(SignIn {
            id_token,
            expires_at,
            user,
        })
    }
}

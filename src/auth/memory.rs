use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::provider::{AuthProvider, AuthSession, AuthUser};
use crate::auth::{issue_token, verify_token, AuthError, Claims};
use crate::config::AuthConfig;

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    password_hash: String,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    refresh_tokens: HashMap<String, String>,
}

/// In-process auth provider issuing real HS256 tokens.
///
/// Refresh tokens are single use; each refresh rotates them.
pub struct MemoryAuthProvider {
    config: AuthConfig,
    accounts: RwLock<Accounts>,
}

impl MemoryAuthProvider {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            accounts: RwLock::new(Accounts::default()),
        }
    }

    fn hash_password(account_id: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(account_id.as_bytes());
        hasher.update(b":");
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn session_for(&self, accounts: &mut Accounts, account: &Account) -> Result<AuthSession, AuthError> {
        let claims = Claims::new(&self.config, &account.id, &account.email);
        let access_token = issue_token(&self.config, &claims)?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        accounts.refresh_tokens.insert(refresh_token.clone(), account.id.clone());
        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_in: self.config.token_expiry_secs,
            user: AuthUser { id: account.id.clone(), email: account.email.clone() },
        })
    }
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .by_email
            .get(&normalise_email(email))
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        if Self::hash_password(&account.id, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        self.session_for(&mut accounts, &account)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let mut accounts = self.accounts.write().await;
        let account_id = accounts
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AuthError::InvalidCredentials)?;
        let account = accounts
            .by_email
            .values()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        self.session_for(&mut accounts, &account)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = match verify_token(&self.config, access_token) {
            Ok(claims) => claims,
            // Nothing to revoke for a dead token
            Err(AuthError::Expired) | Err(AuthError::InvalidToken(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.accounts
            .write()
            .await
            .refresh_tokens
            .retain(|_, owner| *owner != claims.sub);
        Ok(())
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalise_email(email);
        let mut accounts = self.accounts.write().await;
        if accounts.by_email.contains_key(&email) {
            return Err(AuthError::UserExists(email));
        }
        let id = Uuid::new_v4().to_string();
        let account = Account {
            password_hash: Self::hash_password(&id, password),
            id: id.clone(),
            email: email.clone(),
        };
        accounts.by_email.insert(email.clone(), account);
        Ok(AuthUser { id, email })
    }

    async fn delete_user(&self, auth_id: &str) -> Result<(), AuthError> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.by_email.len();
        accounts.by_email.retain(|_, a| a.id != auth_id);
        if accounts.by_email.len() == before {
            return Err(AuthError::UserNotFound(auth_id.to_string()));
        }
        accounts.refresh_tokens.retain(|_, owner| owner != auth_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn provider() -> MemoryAuthProvider {
        MemoryAuthProvider::new(AppConfig::development().auth)
    }

    #[tokio::test]
    async fn sign_in_issues_verifiable_token() {
        let auth = provider();
        let user = auth.create_user("Staff@Example.com", "correct horse").await.unwrap();
        let session = auth.sign_in("staff@example.com", "correct horse").await.unwrap();
        assert_eq!(session.user.id, user.id);
        let claims = verify_token(&auth.config, &session.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn wrong_password_rejected() {
        let auth = provider();
        auth.create_user("a@example.com", "password-1").await.unwrap();
        assert!(matches!(
            auth.sign_in("a@example.com", "password-2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.sign_in("b@example.com", "password-1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_rotate() {
        let auth = provider();
        auth.create_user("a@example.com", "password-1").await.unwrap();
        let first = auth.sign_in("a@example.com", "password-1").await.unwrap();
        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(auth.refresh(&first.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn sign_out_revokes_refresh_tokens() {
        let auth = provider();
        auth.create_user("a@example.com", "password-1").await.unwrap();
        let session = auth.sign_in("a@example.com", "password-1").await.unwrap();
        auth.sign_out(&session.access_token).await.unwrap();
        assert!(auth.refresh(&session.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_and_missing_accounts() {
        let auth = provider();
        let user = auth.create_user("a@example.com", "password-1").await.unwrap();
        assert!(matches!(
            auth.create_user("A@example.com", "password-2").await,
            Err(AuthError::UserExists(_))
        ));
        auth.delete_user(&user.id).await.unwrap();
        assert!(matches!(auth.delete_user(&user.id).await, Err(AuthError::UserNotFound(_))));
    }
}

//! Local account management.
//!
//! Accounts live in the SQLite store with salted SHA-256 password
//! digests. A signed session token keeps the user signed in across
//! process restarts; the HMAC secret behind it is kept in the OS keyring
//! when one is available, with the kv store as fallback.

mod token;

pub use token::SessionToken;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result, ValidationError};
use crate::store::sqlite::UserRecord;
use crate::store::SqliteStore;

const SESSION_TOKEN_KEY: &str = "auth.session_token";
const DEVICE_SECRET_KEYRING_KEY: &str = "device-secret";
const DEVICE_SECRET_KV_KEY: &str = "auth.device_secret";
const MIN_PASSWORD_LEN: usize = 6;
const RESET_CODE_TTL_MINUTES: i64 = 60;

/// Thin wrapper around the OS keyring for credential storage.
mod keyring_store {
    const SERVICE: &str = "evergreen-focus";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }
}

/// Public view of an account. Never carries password material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub is_anonymous: bool,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            photo_url: record.photo_url.clone(),
            is_anonymous: record.is_anonymous,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ResetEntry {
    code_hash: String,
    expires_at: DateTime<Utc>,
}

/// Email/password and guest authentication over the local store.
pub struct AuthService {
    store: Arc<SqliteStore>,
    secret: Vec<u8>,
    current: Mutex<Option<UserProfile>>,
}

impl AuthService {
    /// Construct with the device secret from the keyring (or kv
    /// fallback), generating one on first use.
    pub fn new(store: Arc<SqliteStore>) -> Result<Self> {
        let secret = device_secret(&store)?;
        Ok(Self::with_secret(store, secret))
    }

    /// Construct with an explicit signing secret. Used by tests and
    /// embedders that manage their own secret storage.
    pub fn with_secret(store: Arc<SqliteStore>, secret: Vec<u8>) -> Self {
        Self {
            store,
            secret,
            current: Mutex::new(None),
        }
    }

    fn current_lock(&self) -> MutexGuard<'_, Option<UserProfile>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Re-establish the signed-in user from the persisted token, if any.
    /// Invalid or orphaned tokens are discarded, not errors.
    pub fn restore(&self) -> Result<Option<UserProfile>> {
        let Some(raw) = self.store.kv_get(SESSION_TOKEN_KEY)? else {
            return Ok(None);
        };
        let parsed = match token::verify(&self.secret, &raw) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("stored session token rejected: {e}");
                self.store.kv_delete(SESSION_TOKEN_KEY)?;
                return Ok(None);
            }
        };
        let Some(record) = self.store.user_by_id(&parsed.user_id)? else {
            self.store.kv_delete(SESSION_TOKEN_KEY)?;
            return Ok(None);
        };
        let profile = UserProfile::from(&record);
        *self.current_lock() = Some(profile.clone());
        Ok(Some(profile))
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.current_lock().clone()
    }

    fn require_current(&self) -> Result<UserProfile> {
        self.current_user()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    fn establish(&self, record: &UserRecord) -> Result<UserProfile> {
        let signed = token::sign(&self.secret, &SessionToken::new(&record.id))?;
        self.store.kv_set(SESSION_TOKEN_KEY, &signed)?;
        let profile = UserProfile::from(record);
        *self.current_lock() = Some(profile.clone());
        Ok(profile)
    }

    // ── Account operations ───────────────────────────────────────────

    /// Create an email/password account and sign it in.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        if self.store.user_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken(email).into());
        }
        let salt = generate_salt()?;
        let hash = hash_password(&salt, password);
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email),
            display_name: display_name.map(str::to_string),
            photo_url: None,
            password_salt: Some(salt),
            password_hash: Some(hash),
            is_anonymous: false,
            created_at: Utc::now(),
        };
        self.store.insert_user(&record)?;
        tracing::info!(user = %record.id, "account created");
        self.establish(&record)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = normalize_email(email)?;
        let Some(record) = self.store.user_by_email(&email)? else {
            return Err(AuthError::InvalidCredentials.into());
        };
        verify_password(&record, password)?;
        self.establish(&record)
    }

    /// Create and sign in a guest account with no credentials.
    pub fn sign_in_anonymous(&self) -> Result<UserProfile> {
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: None,
            display_name: None,
            photo_url: None,
            password_salt: None,
            password_hash: None,
            is_anonymous: true,
            created_at: Utc::now(),
        };
        self.store.insert_user(&record)?;
        tracing::info!(user = %record.id, "guest session created");
        self.establish(&record)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.store.kv_delete(SESSION_TOKEN_KEY)?;
        *self.current_lock() = None;
        Ok(())
    }

    // ── Profile & password ───────────────────────────────────────────

    /// Update profile fields. `None` leaves a field unchanged.
    pub fn update_profile(
        &self,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<UserProfile> {
        let current = self.require_current()?;
        let Some(record) = self.store.user_by_id(&current.id)? else {
            return Err(AuthError::NotAuthenticated.into());
        };
        let name = display_name
            .map(str::to_string)
            .or(record.display_name);
        let photo = photo_url.map(str::to_string).or(record.photo_url);
        self.store
            .update_user_profile(&current.id, name.as_deref(), photo.as_deref())?;

        let Some(updated) = self.store.user_by_id(&current.id)? else {
            return Err(AuthError::NotAuthenticated.into());
        };
        let profile = UserProfile::from(&updated);
        *self.current_lock() = Some(profile.clone());
        Ok(profile)
    }

    /// Change the password, re-authenticating with the current one.
    pub fn update_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let current = self.require_current()?;
        if current.is_anonymous {
            return Err(AuthError::AnonymousAccount.into());
        }
        let Some(record) = self.store.user_by_id(&current.id)? else {
            return Err(AuthError::NotAuthenticated.into());
        };
        verify_password(&record, current_password)?;
        check_password_strength(new_password)?;

        let salt = generate_salt()?;
        let hash = hash_password(&salt, new_password);
        self.store.update_user_password(&current.id, &salt, &hash)?;
        Ok(())
    }

    /// Issue a one-hour password reset code for the account.
    ///
    /// The caller delivers the code to the user; there is no mail
    /// transport at this layer.
    pub fn request_password_reset(&self, email: &str) -> Result<String> {
        let email = normalize_email(email)?;
        if self.store.user_by_email(&email)?.is_none() {
            return Err(AuthError::AccountNotFound(email).into());
        }
        let code = generate_reset_code()?;
        let entry = ResetEntry {
            code_hash: hash_password(&email, &code),
            expires_at: Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES),
        };
        self.store
            .kv_set(&reset_key(&email), &serde_json::to_string(&entry)?)?;
        Ok(code)
    }

    /// Redeem a reset code and set a new password. The code is single
    /// use and expires.
    pub fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        let email = normalize_email(email)?;
        let Some(raw) = self.store.kv_get(&reset_key(&email))? else {
            return Err(AuthError::ResetCodeInvalid.into());
        };
        let entry: ResetEntry = serde_json::from_str(&raw)?;
        if entry.expires_at < Utc::now() || entry.code_hash != hash_password(&email, code) {
            return Err(AuthError::ResetCodeInvalid.into());
        }
        check_password_strength(new_password)?;

        let Some(record) = self.store.user_by_email(&email)? else {
            return Err(AuthError::AccountNotFound(email).into());
        };
        let salt = generate_salt()?;
        let hash = hash_password(&salt, new_password);
        self.store.update_user_password(&record.id, &salt, &hash)?;
        self.store.kv_delete(&reset_key(&email))?;
        Ok(())
    }

    /// Delete the signed-in account and every session record it owns.
    /// Registered accounts must re-authenticate with their password.
    /// Returns the number of session records removed.
    pub fn delete_account(&self, password: Option<&str>) -> Result<u64> {
        let current = self.require_current()?;
        let Some(record) = self.store.user_by_id(&current.id)? else {
            return Err(AuthError::NotAuthenticated.into());
        };
        if !record.is_anonymous {
            let password = password.ok_or(AuthError::InvalidCredentials)?;
            verify_password(&record, password)?;
        }
        use crate::store::SessionStore;
        let removed = self.store.delete_sessions_for_owner(&current.id)?;
        self.store.delete_user(&current.id)?;
        self.sign_out()?;
        tracing::info!(user = %current.id, sessions = removed, "account deleted");
        Ok(removed)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ValidationError::InvalidEmail(email)),
    }
}

fn check_password_strength(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

fn generate_salt() -> Result<String, AuthError> {
    let mut buf = [0u8; 16];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::CredentialStore(e.to_string()))?;
    Ok(hex::encode(buf))
}

fn generate_reset_code() -> Result<String, AuthError> {
    let mut buf = [0u8; 4];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::CredentialStore(e.to_string()))?;
    let n = u32::from_le_bytes(buf) % 1_000_000;
    Ok(format!("{n:06}"))
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_password(record: &UserRecord, password: &str) -> Result<(), AuthError> {
    let (Some(salt), Some(hash)) = (&record.password_salt, &record.password_hash) else {
        return Err(AuthError::InvalidCredentials);
    };
    if hash_password(salt, password) != *hash {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(())
}

fn reset_key(email: &str) -> String {
    format!("auth.reset.{email}")
}

/// Load or create the per-device token-signing secret. Keyring first,
/// kv store when no keyring backend is usable.
fn device_secret(store: &SqliteStore) -> Result<Vec<u8>> {
    match keyring_store::get(DEVICE_SECRET_KEYRING_KEY) {
        Ok(Some(encoded)) => {
            return hex::decode(&encoded)
                .map_err(|e| AuthError::CredentialStore(e.to_string()).into());
        }
        Ok(None) => {}
        Err(e) => {
            tracing::debug!("keyring unavailable, using kv fallback: {e}");
        }
    }
    if let Some(encoded) = store.kv_get(DEVICE_SECRET_KV_KEY)? {
        return hex::decode(&encoded)
            .map_err(|e| AuthError::CredentialStore(e.to_string()).into());
    }

    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::CredentialStore(e.to_string()))?;
    let encoded = hex::encode(buf);
    if let Err(e) = keyring_store::set(DEVICE_SECRET_KEYRING_KEY, &encoded) {
        tracing::debug!("keyring write failed, using kv fallback: {e}");
        store.kv_set(DEVICE_SECRET_KV_KEY, &encoded)?;
    }
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (Arc<SqliteStore>, AuthService) {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let auth = AuthService::with_secret(Arc::clone(&store), b"unit-test-secret".to_vec());
        (store, auth)
    }

    #[test]
    fn sign_up_and_restore() {
        let (store, auth) = service();
        let profile = auth
            .sign_up("Fern@Example.com", "hunter22", Some("Fern"))
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("fern@example.com"));
        assert!(!profile.is_anonymous);

        // A fresh service over the same store picks the session back up
        let auth2 = AuthService::with_secret(store, b"unit-test-secret".to_vec());
        let restored = auth2.restore().unwrap().expect("session persists");
        assert_eq!(restored.id, profile.id);
    }

    #[test]
    fn sign_up_rejects_duplicates_and_weak_input() {
        let (_store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();

        let dup = auth.sign_up("a@b.c", "secret2", None).unwrap_err();
        assert!(matches!(
            dup,
            crate::CoreError::Auth(AuthError::EmailTaken(_))
        ));

        let weak = auth.sign_up("new@b.c", "short", None).unwrap_err();
        assert!(matches!(
            weak,
            crate::CoreError::Auth(AuthError::WeakPassword { min_len: 6 })
        ));

        let bad_email = auth.sign_up("not-an-email", "secret1", None).unwrap_err();
        assert!(matches!(bad_email, crate::CoreError::Validation(_)));
    }

    #[test]
    fn sign_in_checks_credentials() {
        let (_store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();
        auth.sign_out().unwrap();

        let wrong = auth.sign_in("a@b.c", "wrong-password").unwrap_err();
        assert!(matches!(
            wrong,
            crate::CoreError::Auth(AuthError::InvalidCredentials)
        ));

        let unknown = auth.sign_in("nobody@b.c", "secret1").unwrap_err();
        assert!(matches!(
            unknown,
            crate::CoreError::Auth(AuthError::InvalidCredentials)
        ));

        let ok = auth.sign_in("A@B.C", "secret1").unwrap();
        assert_eq!(ok.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn anonymous_sign_in_creates_guest() {
        let (_store, auth) = service();
        let guest = auth.sign_in_anonymous().unwrap();
        assert!(guest.is_anonymous);
        assert!(guest.email.is_none());
        assert_eq!(auth.current_user().unwrap().id, guest.id);
    }

    #[test]
    fn sign_out_clears_session() {
        let (store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();
        auth.sign_out().unwrap();
        assert!(auth.current_user().is_none());

        let auth2 = AuthService::with_secret(store, b"unit-test-secret".to_vec());
        assert!(auth2.restore().unwrap().is_none());
    }

    #[test]
    fn tampered_token_is_discarded_on_restore() {
        let (store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();
        store
            .kv_set(SESSION_TOKEN_KEY, "bogus.token")
            .unwrap();

        let auth2 = AuthService::with_secret(Arc::clone(&store), b"unit-test-secret".to_vec());
        assert!(auth2.restore().unwrap().is_none());
        // The bad token is cleaned up
        assert!(store.kv_get(SESSION_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn update_profile_merges_fields() {
        let (_store, auth) = service();
        auth.sign_up("a@b.c", "secret1", Some("Fern")).unwrap();

        let updated = auth.update_profile(None, Some("https://img/1.png")).unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Fern"));
        assert_eq!(updated.photo_url.as_deref(), Some("https://img/1.png"));

        let renamed = auth.update_profile(Some("Fern A."), None).unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Fern A."));
        assert_eq!(renamed.photo_url.as_deref(), Some("https://img/1.png"));
    }

    #[test]
    fn update_profile_requires_sign_in() {
        let (_store, auth) = service();
        let err = auth.update_profile(Some("x"), None).unwrap_err();
        assert!(matches!(
            err,
            crate::CoreError::Auth(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn update_password_reauthenticates() {
        let (_store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();

        let wrong = auth.update_password("nope", "newsecret").unwrap_err();
        assert!(matches!(
            wrong,
            crate::CoreError::Auth(AuthError::InvalidCredentials)
        ));

        auth.update_password("secret1", "newsecret").unwrap();
        auth.sign_out().unwrap();
        assert!(auth.sign_in("a@b.c", "secret1").is_err());
        assert!(auth.sign_in("a@b.c", "newsecret").is_ok());
    }

    #[test]
    fn guests_cannot_change_password() {
        let (_store, auth) = service();
        auth.sign_in_anonymous().unwrap();
        let err = auth.update_password("x", "whatever1").unwrap_err();
        assert!(matches!(
            err,
            crate::CoreError::Auth(AuthError::AnonymousAccount)
        ));
    }

    #[test]
    fn password_reset_flow() {
        let (_store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();
        auth.sign_out().unwrap();

        let code = auth.request_password_reset("a@b.c").unwrap();
        assert_eq!(code.len(), 6);

        // Six zeros collides with a real code once in a million runs
        if code != "000000" {
            let bad = auth
                .confirm_password_reset("a@b.c", "000000", "newsecret")
                .unwrap_err();
            assert!(matches!(
                bad,
                crate::CoreError::Auth(AuthError::ResetCodeInvalid)
            ));
        }

        auth.confirm_password_reset("a@b.c", &code, "newsecret")
            .unwrap();
        assert!(auth.sign_in("a@b.c", "newsecret").is_ok());

        // Codes are single use
        let reused = auth
            .confirm_password_reset("a@b.c", &code, "anothersecret")
            .unwrap_err();
        assert!(matches!(
            reused,
            crate::CoreError::Auth(AuthError::ResetCodeInvalid)
        ));
    }

    #[test]
    fn expired_reset_code_is_rejected() {
        let (store, auth) = service();
        auth.sign_up("a@b.c", "secret1", None).unwrap();

        let entry = ResetEntry {
            code_hash: hash_password("a@b.c", "123456"),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        store
            .kv_set(&reset_key("a@b.c"), &serde_json::to_string(&entry).unwrap())
            .unwrap();

        let err = auth
            .confirm_password_reset("a@b.c", "123456", "newsecret")
            .unwrap_err();
        assert!(matches!(
            err,
            crate::CoreError::Auth(AuthError::ResetCodeInvalid)
        ));
    }

    #[test]
    fn reset_for_unknown_account_fails() {
        let (_store, auth) = service();
        let err = auth.request_password_reset("ghost@b.c").unwrap_err();
        assert!(matches!(
            err,
            crate::CoreError::Auth(AuthError::AccountNotFound(_))
        ));
    }

    #[test]
    fn delete_account_wipes_sessions() {
        use crate::ledger::{FocusSession, SessionOutcome};
        use crate::store::SessionStore;

        let (store, auth) = service();
        let profile = auth.sign_up("a@b.c", "secret1", None).unwrap();

        store
            .insert_session(&FocusSession::new(&profile.id, SessionOutcome::Completed, 25))
            .unwrap();
        store
            .insert_session(&FocusSession::new(&profile.id, SessionOutcome::Failed, 10))
            .unwrap();

        let missing_pw = auth.delete_account(None).unwrap_err();
        assert!(matches!(
            missing_pw,
            crate::CoreError::Auth(AuthError::InvalidCredentials)
        ));

        let removed = auth.delete_account(Some("secret1")).unwrap();
        assert_eq!(removed, 2);
        assert!(auth.current_user().is_none());
        assert!(store.user_by_email("a@b.c").unwrap().is_none());
        assert!(store.sessions_for_owner(&profile.id).unwrap().is_empty());
    }

    #[test]
    fn guest_delete_needs_no_password() {
        let (_store, auth) = service();
        auth.sign_in_anonymous().unwrap();
        assert_eq!(auth.delete_account(None).unwrap(), 0);
        assert!(auth.current_user().is_none());
    }
}

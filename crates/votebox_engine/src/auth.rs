/* 📖 # How are users identified?

Two ways. A successful `/login/` stores a random token in the SessionTable
and hands it to the client as the `sessionid` cookie; later requests carrying
that cookie are resolved back to the user id. Clients that do not keep
cookies can send HTTP Basic credentials with each request instead.

Passwords are stored as a hex SHA3-256 digest over a random per-account salt
followed by the password bytes.
*/

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nanoid::nanoid;
use parking_lot::Mutex;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use votebox_base::{HttpHeaders, VoteboxResult};

use crate::model::{Account, NewAccount, UserId};
use crate::store::PollStore;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// A salted password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: String,
    digest: String,
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt.
    pub fn create(password: &str) -> Self {
        Self::with_salt(nanoid!(), password)
    }

    pub fn with_salt(salt: impl Into<String>, password: &str) -> Self {
        let salt = salt.into();
        let digest = hex::encode(digest(&salt, password));
        Self { salt, digest }
    }

    /// Check `password` against the stored digest in constant time.
    pub fn verify(&self, password: &str) -> bool {
        let Ok(stored) = hex::decode(&self.digest) else {
            return false;
        };
        let candidate = digest(&self.salt, password);
        candidate.as_slice().ct_eq(stored.as_slice()).into()
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn digest(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha3_256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Result of checking credentials, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    AuthMissing,
    InvalidAuth,
    UnsupportedAuth,
    WrongLogin,
    Inactive,
    Success,
}

impl AuthStatus {
    pub fn code(self) -> &'static str {
        match self {
            AuthStatus::AuthMissing => "auth_missing",
            AuthStatus::InvalidAuth => "invalid_auth",
            AuthStatus::UnsupportedAuth => "unsupported_auth",
            AuthStatus::WrongLogin => "wrong_login",
            AuthStatus::Inactive => "inactive",
            AuthStatus::Success => "success",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Split an `Authorization` header value into Basic credentials.
///
/// ```
/// use votebox_engine::auth::{AuthStatus, parse_basic_auth};
///
/// assert_eq!(
///     parse_basic_auth(Some("Basic dXNlcjE6c2VjcmV0")),
///     Ok(("user1".to_string(), "secret".to_string()))
/// );
/// assert_eq!(parse_basic_auth(None), Err(AuthStatus::AuthMissing));
/// ```
pub fn parse_basic_auth(header: Option<&str>) -> Result<(String, String), AuthStatus> {
    let header = header.ok_or(AuthStatus::AuthMissing)?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    let [scheme, encoded] = parts.as_slice() else {
        return Err(AuthStatus::InvalidAuth);
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthStatus::UnsupportedAuth);
    }
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| AuthStatus::InvalidAuth)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthStatus::InvalidAuth)?;
    let (username, password) = decoded.split_once(':').ok_or(AuthStatus::InvalidAuth)?;
    Ok((username.to_string(), password.to_string()))
}

/// Look up an account by credentials. Inactive accounts are returned too.
pub fn authenticate(
    store: &dyn PollStore,
    username: &str,
    password: &str,
) -> VoteboxResult<Option<Account>> {
    Ok(store
        .account_by_username(username)?
        .filter(|account| account.password.verify(password)))
}

/// Resolve an `Authorization` header to an active account.
///
/// The error side never carries [`AuthStatus::Success`].
pub fn basic_auth(
    store: &dyn PollStore,
    header: Option<&str>,
) -> VoteboxResult<Result<Account, AuthStatus>> {
    let (username, password) = match parse_basic_auth(header) {
        Ok(credentials) => credentials,
        Err(status) => return Ok(Err(status)),
    };
    Ok(match authenticate(store, &username, &password)? {
        None => Err(AuthStatus::WrongLogin),
        Some(account) if !account.is_active => Err(AuthStatus::Inactive),
        Some(account) => Ok(account),
    })
}

/// Outcome of [`register_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(UserId),
    UsernameTaken,
}

/// Create an active account unless the username is already in use.
pub fn register_account(
    store: &mut dyn PollStore,
    username: &str,
    password: &str,
) -> VoteboxResult<Registration> {
    if store.account_by_username(username)?.is_some() {
        debug!(username, "username taken");
        return Ok(Registration::UsernameTaken);
    }
    let id = store.insert_account(NewAccount {
        username: username.to_string(),
        password: PasswordHash::create(password),
        is_active: true,
    })?;
    info!(username, user = %id, "registered account");
    Ok(Registration::Created(id))
}

/// Logged-in sessions, keyed by cookie token.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, UserId>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `user` and return its token.
    pub fn create(&self, user: UserId) -> String {
        let token = nanoid!(32);
        self.sessions.lock().insert(token.clone(), user);
        token
    }

    pub fn get(&self, token: &str) -> Option<UserId> {
        self.sessions.lock().get(token).copied()
    }

    /// End a session. Returns the user it belonged to.
    pub fn remove(&self, token: &str) -> Option<UserId> {
        self.sessions.lock().remove(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// The session token from the request's `Cookie` header, if any.
pub fn session_token(headers: &HttpHeaders) -> Option<&str> {
    headers
        .get("cookie")?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that stores a session token.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly")
}

/// `Set-Cookie` value that deletes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn store_with_users() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store
            .insert_account(NewAccount {
                username: "user1".to_string(),
                password: PasswordHash::create("secret"),
                is_active: true,
            })
            .unwrap();
        store
            .insert_account(NewAccount {
                username: "sleeper".to_string(),
                password: PasswordHash::create("secret"),
                is_active: false,
            })
            .unwrap();
        store
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    #[test]
    fn test_password_hash() {
        let hash = PasswordHash::with_salt("pepper", "secret");
        assert!(hash.verify("secret"));
        assert!(!hash.verify("Secret"));
        assert_eq!(hash.salt(), "pepper");
        assert_eq!(hash.digest().len(), 64);
        assert_eq!(hash, PasswordHash::with_salt("pepper", "secret"));

        let first = PasswordHash::create("secret");
        let second = PasswordHash::create("secret");
        assert_ne!(first.salt(), second.salt());
        assert_ne!(first.digest(), second.digest());
    }

    #[test]
    fn test_password_hash_rejects_malformed_digest() {
        let hash = PasswordHash::with_salt("pepper", "secret");
        let truncated = PasswordHash {
            salt: "pepper".to_string(),
            digest: hash.digest()[..62].to_string(),
        };
        assert!(!truncated.verify("secret"));

        let not_hex = PasswordHash {
            salt: "pepper".to_string(),
            digest: "z".repeat(64),
        };
        assert!(!not_hex.verify("secret"));
    }

    #[test]
    fn test_parse_basic_auth_failures() {
        assert_eq!(parse_basic_auth(None), Err(AuthStatus::AuthMissing));
        assert_eq!(parse_basic_auth(Some("Basic")), Err(AuthStatus::InvalidAuth));
        assert_eq!(
            parse_basic_auth(Some("Basic a b")),
            Err(AuthStatus::InvalidAuth)
        );
        assert_eq!(
            parse_basic_auth(Some("Bearer dXNlcjE6c2VjcmV0")),
            Err(AuthStatus::UnsupportedAuth)
        );
        assert_eq!(
            parse_basic_auth(Some("Basic !!!!")),
            Err(AuthStatus::InvalidAuth)
        );
        let no_colon = basic("user1");
        assert_eq!(
            parse_basic_auth(Some(no_colon.as_str())),
            Err(AuthStatus::InvalidAuth)
        );
    }

    #[test]
    fn test_parse_basic_auth_scheme_case_and_colons() {
        let header = format!("bAsIc {}", STANDARD.encode("user1:pa:ss"));
        assert_eq!(
            parse_basic_auth(Some(header.as_str())),
            Ok(("user1".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_basic_auth() {
        let store = store_with_users();
        let account = basic_auth(&store, Some(basic("user1:secret").as_str()))
            .unwrap()
            .unwrap();
        assert_eq!(account.username, "user1");

        assert_eq!(
            basic_auth(&store, Some(basic("user1:wrong").as_str())).unwrap(),
            Err(AuthStatus::WrongLogin)
        );
        assert_eq!(
            basic_auth(&store, Some(basic("nobody:secret").as_str())).unwrap(),
            Err(AuthStatus::WrongLogin)
        );
        assert_eq!(
            basic_auth(&store, Some(basic("sleeper:secret").as_str())).unwrap(),
            Err(AuthStatus::Inactive)
        );
        assert_eq!(
            basic_auth(&store, None).unwrap(),
            Err(AuthStatus::AuthMissing)
        );
    }

    #[test]
    fn test_authenticate_returns_inactive_accounts() {
        let store = store_with_users();
        let account = authenticate(&store, "sleeper", "secret").unwrap().unwrap();
        assert!(!account.is_active);
        assert!(authenticate(&store, "sleeper", "nope").unwrap().is_none());
    }

    #[test]
    fn test_register_account() {
        let mut store = store_with_users();
        let result = register_account(&mut store, "user2", "pw").unwrap();
        assert_eq!(result, Registration::Created(UserId::new(3)));
        assert!(authenticate(&store, "user2", "pw").unwrap().is_some());
        assert_eq!(
            register_account(&mut store, "user2", "other").unwrap(),
            Registration::UsernameTaken
        );
    }

    #[test]
    fn test_session_table() {
        let sessions = SessionTable::new();
        assert!(sessions.is_empty());
        let token = sessions.create(UserId::new(1));
        assert_eq!(token.len(), 32);
        assert_eq!(sessions.get(&token), Some(UserId::new(1)));
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.remove(&token), Some(UserId::new(1)));
        assert_eq!(sessions.get(&token), None);
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HttpHeaders::new();
        assert_eq!(session_token(&headers), None);

        headers.insert("Cookie", "theme=dark; sessionid=abc123; lang=en");
        assert_eq!(session_token(&headers), Some("abc123"));

        headers.insert("Cookie", "sessionid=");
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_cookie_values() {
        assert_eq!(session_cookie("abc"), "sessionid=abc; Path=/; HttpOnly");
        assert_eq!(
            clear_session_cookie(),
            "sessionid=; Path=/; HttpOnly; Max-Age=0"
        );
    }
}

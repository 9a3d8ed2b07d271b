use crate::{error::LurkError, proto::socks5::consts::auth as auth_consts};
use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

const USER_AUTH_VERSION: u8 = 0x01;
const AUTH_SUCCESS: u8 = 0x00;
const AUTH_FAILURE: u8 = 0x01;

/// Outcome of a completed authentication handshake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    pub identity: String,
    pub payload: HashMap<String, String>,
}

impl AuthContext {
    pub fn anonymous() -> AuthContext {
        AuthContext::default()
    }
}

/// A single pluggable authentication method.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// SOCKS5 method code this authenticator advertises, e.g. `0x00` for no-auth.
    fn code(&self) -> u8;

    /// Runs the method-specific sub-negotiation. The method-selection byte
    /// has already been written by the caller before this is invoked for
    /// `NoAuthAuthenticator`; `PasswordAuthenticator` writes it itself since
    /// RFC 1929 folds the selection message into its own first write.
    async fn authenticate(&self, stream: &mut TcpStream) -> Result<AuthContext>;
}

/// No authentication: the client is accepted with an empty identity.
pub struct NoAuthAuthenticator;

#[async_trait]
impl Authenticator for NoAuthAuthenticator {
    fn code(&self) -> u8 {
        auth_consts::SOCKS5_AUTH_METHOD_NONE
    }

    async fn authenticate(&self, _stream: &mut TcpStream) -> Result<AuthContext> {
        Ok(AuthContext::anonymous())
    }
}

/// A lookup of valid `user -> password` pairs, built from the `CREDENTIALS`
/// environment variable (comma-separated `user/pass` entries).
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(credentials: HashMap<String, String>) -> CredentialStore {
        CredentialStore { credentials }
    }

    /// Parses `user1/pass1,user2/pass2,...`. Entries that don't split into
    /// exactly one `/`, or that have an empty user or password, are skipped.
    pub fn parse(raw: &str) -> CredentialStore {
        let mut credentials = HashMap::new();

        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let mut parts = entry.splitn(2, '/');
            let (Some(user), Some(pass)) = (parts.next(), parts.next()) else {
                continue;
            };
            if entry.matches('/').count() != 1 || user.is_empty() || pass.is_empty() {
                continue;
            }

            credentials.insert(user.to_string(), pass.to_string());
        }

        CredentialStore::new(credentials)
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn valid(&self, user: &str, pass: &str) -> bool {
        self.credentials.get(user).map(|p| p == pass).unwrap_or(false)
    }
}

/// RFC 1929 username/password authentication.
pub struct PasswordAuthenticator {
    credentials: CredentialStore,
}

impl PasswordAuthenticator {
    pub fn new(credentials: CredentialStore) -> PasswordAuthenticator {
        PasswordAuthenticator { credentials }
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    fn code(&self) -> u8 {
        auth_consts::SOCKS5_AUTH_METHOD_PASSWORD
    }

    async fn authenticate(&self, stream: &mut TcpStream) -> Result<AuthContext> {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await?;
        let (version, user_len) = (header[0], header[1]);
        ensure!(version == USER_AUTH_VERSION, LurkError::UnsupportedAuthVersion(version));

        let mut user = vec![0u8; user_len as usize];
        stream.read_exact(&mut user).await?;
        let user = String::from_utf8(user).map_err(LurkError::DomainNameDecodingFailed)?;

        let pass_len = stream.read_u8().await?;
        let mut pass = vec![0u8; pass_len as usize];
        stream.read_exact(&mut pass).await?;
        let pass = String::from_utf8(pass).map_err(LurkError::DomainNameDecodingFailed)?;

        if self.credentials.valid(&user, &pass) {
            stream.write_all(&[USER_AUTH_VERSION, AUTH_SUCCESS]).await?;
            Ok(AuthContext {
                identity: user.clone(),
                payload: HashMap::from([("Username".to_string(), user)]),
            })
        } else {
            stream.write_all(&[USER_AUTH_VERSION, AUTH_FAILURE]).await?;
            bail!(LurkError::AuthenticationFailed)
        }
    }
}

/// The set of authenticators a server has registered, keyed by method code.
///
/// Selection picks the first method in the *client's* advertised order that
/// the server has registered (RFC 1928 §3 leaves the choice to the server,
/// but `liamylian/lsocks`'s reference server walks the client list in order
/// and stops at the first match, which this mirrors).
pub struct AuthenticatorSet {
    by_code: HashMap<u8, Box<dyn Authenticator>>,
}

impl AuthenticatorSet {
    pub fn new() -> AuthenticatorSet {
        AuthenticatorSet { by_code: HashMap::new() }
    }

    pub fn register(mut self, authenticator: Box<dyn Authenticator>) -> AuthenticatorSet {
        self.by_code.insert(authenticator.code(), authenticator);
        self
    }

    /// Builds the default set: user/pass auth if credentials are configured,
    /// otherwise no-auth only (mirrors `socks5.New()` in the original).
    pub fn from_credentials(credentials: CredentialStore) -> AuthenticatorSet {
        if credentials.is_empty() {
            AuthenticatorSet::new().register(Box::new(NoAuthAuthenticator))
        } else {
            AuthenticatorSet::new().register(Box::new(PasswordAuthenticator::new(credentials)))
        }
    }

    pub fn select(&self, client_methods: &[u8]) -> Option<&dyn Authenticator> {
        client_methods.iter().find_map(|code| self.by_code.get(code).map(|a| a.as_ref()))
    }
}

impl Default for AuthenticatorSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_credentials() {
        let store = CredentialStore::parse("admin/secret,guest/guest123");
        assert!(store.valid("admin", "secret"));
        assert!(store.valid("guest", "guest123"));
        assert!(!store.valid("admin", "wrong"));
    }

    #[test]
    fn skips_malformed_credential_entries() {
        let store = CredentialStore::parse("admin/secret,malformed,/nouser,noPass/,a/b/c,  ");
        assert!(store.valid("admin", "secret"));
        assert!(!store.valid("", "nouser"));
        assert!(!store.valid("noPass", ""));
        assert_eq!(1, store.credentials.len());
    }

    #[test]
    fn empty_credentials_parse_to_empty_store() {
        assert!(CredentialStore::parse("").is_empty());
    }

    #[test]
    fn selection_honors_client_order_not_registration_order() {
        let set = AuthenticatorSet::new()
            .register(Box::new(NoAuthAuthenticator))
            .register(Box::new(PasswordAuthenticator::new(CredentialStore::default())));

        // Client prefers password (0x02) over no-auth (0x00); selection must
        // return the first *client-ordered* match, i.e. password.
        let selected = set.select(&[0x02, 0x00]).expect("should select a method");
        assert_eq!(auth_consts::SOCKS5_AUTH_METHOD_PASSWORD, selected.code());

        let selected = set.select(&[0x00, 0x02]).expect("should select a method");
        assert_eq!(auth_consts::SOCKS5_AUTH_METHOD_NONE, selected.code());
    }

    #[test]
    fn selection_returns_none_when_no_method_overlaps() {
        let set = AuthenticatorSet::new().register(Box::new(NoAuthAuthenticator));
        assert!(set.select(&[0x02, 0x01]).is_none());
    }

    #[test]
    fn credentials_gate_which_methods_are_registered() {
        let with_creds = AuthenticatorSet::from_credentials(CredentialStore::parse("u/p"));
        assert!(with_creds.select(&[0x00]).is_none());
        assert!(with_creds.select(&[0x02]).is_some());

        let without_creds = AuthenticatorSet::from_credentials(CredentialStore::default());
        assert!(without_creds.select(&[0x00]).is_some());
        assert!(without_creds.select(&[0x02]).is_none());
    }
}

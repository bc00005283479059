use std::collections::HashMap;
use std::env;
use std::fmt;

/// An authorization token. Never printed.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("no secret stored under '{0}'")]
    NotFound(String),

    #[error("secret '{0}' is empty")]
    Empty(String),
}

/// Resolves a credential handle to a token
pub trait SecretStore: Send + Sync {
    fn resolve(&self, handle: &str) -> Result<ApiToken, SecretError>;
}

/// Treats the handle as an environment variable name
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn resolve(&self, handle: &str) -> Result<ApiToken, SecretError> {
        let value = env::var(handle).map_err(|_| SecretError::NotFound(handle.to_string()))?;
        if value.trim().is_empty() {
            return Err(SecretError::Empty(handle.to_string()));
        }
        Ok(ApiToken::new(value.trim()))
    }
}

/// In-memory store, mostly for tests and embedding
#[derive(Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn with(mut self, handle: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(handle.into(), value.into());
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve(&self, handle: &str) -> Result<ApiToken, SecretError> {
        match self.secrets.get(handle) {
            Some(value) if value.is_empty() => Err(SecretError::Empty(handle.to_string())),
            Some(value) => Ok(ApiToken::new(value.clone())),
            None => Err(SecretError::NotFound(handle.to_string())),
        }
    }
}

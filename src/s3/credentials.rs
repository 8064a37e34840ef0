//! S3 Credentials Module
//!
//! Resolves the static credentials used by [`super::S3Client`].
//!
//! Configured keys take precedence. When neither key is configured the client
//! falls back to the AWS SDK default provider chain (environment variables,
//! shared profile, instance metadata).
//!
//! # Example
//!
//! ```
//! use stream_uploadr::s3::CredentialsProvider;
//!
//! let creds = CredentialsProvider::from_keys(Some("access-key"), Some("secret-key"))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(creds.access_key_id(), "access-key");
//! assert_eq!(creds.secret_access_key(), "secret-key");
//! ```

use crate::config::S3Config;
use std::fmt;
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Incomplete credentials: {0}")]
    Incomplete(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Credentials for AWS authentication
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

// Keys must never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Factory methods for resolving credentials
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Resolve credentials from an access/secret key pair.
    ///
    /// Returns `Ok(None)` when neither key is set and an error when only one is.
    pub fn from_keys(
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> Result<Option<Credentials>, CredentialsError> {
        let access_key = access_key.map(str::trim).filter(|k| !k.is_empty());
        let secret_key = secret_key.map(str::trim).filter(|k| !k.is_empty());

        match (access_key, secret_key) {
            (Some(access), Some(secret)) => Ok(Some(Credentials::new(access, secret))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CredentialsError::Incomplete(
                "access_key is set but secret_key is missing".into(),
            )),
            (None, Some(_)) => Err(CredentialsError::Incomplete(
                "secret_key is set but access_key is missing".into(),
            )),
        }
    }

    /// Load credentials from S3Config
    pub fn from_config(config: &S3Config) -> Result<Option<Credentials>, CredentialsError> {
        let credentials =
            Self::from_keys(config.access_key.as_deref(), config.secret_key.as_deref())?;

        if let Some(creds) = &credentials {
            if creds.access_key_id().contains(char::is_whitespace) {
                return Err(CredentialsError::InvalidCredentials(
                    "access_key must not contain whitespace".into(),
                ));
            }
        }

        Ok(credentials)
    }
}

//! Credential resolution and bearer-token acquisition.

use crate::defaults;
use crate::error::{Result, VoxlineError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the service credentials come from: a downloaded credentials file,
/// an explicit apikey/hostname pair, or both (explicit values win).
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    file: Option<PathBuf>,
    apikey: Option<String>,
    hostname: Option<String>,
}

/// Credentials after resolution, ready to dial with.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub apikey: String,
    pub hostname: String,
}

#[derive(Deserialize)]
struct CredentialsFile {
    speech_to_text: Vec<ServiceEntry>,
}

#[derive(Deserialize)]
struct ServiceEntry {
    credentials: ServiceCredentials,
}

#[derive(Deserialize)]
struct ServiceCredentials {
    apikey: String,
    url: String,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads apikey and service URL from the vendor's credentials JSON.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Supplies the apikey and service hostname directly.
    pub fn api_key(mut self, apikey: impl Into<String>, hostname: impl Into<String>) -> Self {
        self.apikey = Some(apikey.into());
        self.hostname = Some(hostname.into());
        self
    }

    /// Resolves to a concrete apikey/hostname pair. Explicit values take
    /// precedence over the file; having neither is a configuration error.
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        let mut apikey = self.apikey.clone();
        let mut hostname = self.hostname.clone();

        if (apikey.is_none() || hostname.is_none())
            && let Some(path) = &self.file
        {
            let raw = std::fs::read_to_string(path)?;
            let parsed: CredentialsFile = serde_json::from_str(&raw).map_err(|e| {
                VoxlineError::Configuration {
                    message: format!("malformed credentials file {}: {e}", path.display()),
                }
            })?;
            let entry = parsed.speech_to_text.into_iter().next().ok_or_else(|| {
                VoxlineError::Configuration {
                    message: format!(
                        "credentials file {} has no speech_to_text entry",
                        path.display()
                    ),
                }
            })?;
            apikey.get_or_insert(entry.credentials.apikey);
            hostname.get_or_insert(hostname_from_url(&entry.credentials.url));
        }

        match (apikey, hostname) {
            (Some(apikey), Some(hostname)) => Ok(ResolvedCredentials { apikey, hostname }),
            _ => Err(VoxlineError::Configuration {
                message: "no credentials: supply a credentials file or an apikey and hostname"
                    .to_string(),
            }),
        }
    }
}

/// Strips the scheme and any path from a service URL, keeping the host.
fn hostname_from_url(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("wss://"))
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    match rest.split_once('/') {
        Some((host, _)) => host.to_string(),
        None => rest.to_string(),
    }
}

/// Exchanges an apikey for a short-lived bearer token.
pub trait TokenProvider: Send + Sync {
    fn fetch(&self, apikey: &str) -> Result<String>;
}

/// Token provider backed by the IAM token endpoint.
pub struct IamTokenProvider {
    url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Default for IamTokenProvider {
    fn default() -> Self {
        Self {
            url: defaults::TOKEN_URL.to_string(),
            timeout: defaults::TOKEN_TIMEOUT,
        }
    }
}

impl IamTokenProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl TokenProvider for IamTokenProvider {
    fn fetch(&self, apikey: &str) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| VoxlineError::Auth {
                message: format!("token client: {e}"),
            })?;

        let response = client
            .post(&self.url)
            .form(&[
                ("grant_type", defaults::TOKEN_GRANT_TYPE),
                ("apikey", apikey),
            ])
            .send()
            .map_err(|e| VoxlineError::Auth {
                message: format!("token request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(VoxlineError::Auth {
                message: format!("token endpoint returned {}", response.status()),
            });
        }

        let body: TokenResponse = response.json().map_err(|e| VoxlineError::Auth {
            message: format!("malformed token response: {e}"),
        })?;
        Ok(body.access_token)
    }
}

/// Fixed-token provider for tests and pre-issued tokens.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn fetch(&self, _apikey: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}

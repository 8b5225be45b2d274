//! Client configuration.

use serde::Deserialize;

use crate::error::{ColoreError, Result};

pub const DEFAULT_BASE_URI: &str = "http://localhost:9240";
pub const DEFAULT_USER_AGENT: &str = "Colore Client";

/// Fixed configuration held by a client for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Namespace all document ids live under.
    pub app: String,
    /// Service root, without a trailing slash.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Ask the service for backtraces on errors; sent as `backtrace=true` on every call.
    #[serde(default)]
    pub backtrace: bool,
}

fn default_base_uri() -> String {
    DEFAULT_BASE_URI.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ClientConfig {
    pub fn new(app: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            base_uri: trim_base_uri(base_uri.into()),
            user_agent: default_user_agent(),
            backtrace: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_backtrace(mut self, backtrace: bool) -> Self {
        self.backtrace = backtrace;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// `COLORE_APP` is required; `COLORE_BASE_URI`, `COLORE_USER_AGENT` and
    /// `COLORE_BACKTRACE` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app = lookup("COLORE_APP")
            .ok_or_else(|| ColoreError::Config("COLORE_APP is not set".to_string()))?;
        let base_uri = lookup("COLORE_BASE_URI").unwrap_or_else(default_base_uri);

        let mut config = Self::new(app, base_uri);
        if let Some(user_agent) = lookup("COLORE_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(flag) = lookup("COLORE_BACKTRACE") {
            config.backtrace = parse_flag(&flag);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.is_empty() {
            return Err(ColoreError::Config("app must not be empty".to_string()));
        }
        if self.app.contains('/') {
            return Err(ColoreError::Config(format!(
                "app '{}' must not contain '/'",
                self.app
            )));
        }
        if !(self.base_uri.starts_with("http://") || self.base_uri.starts_with("https://")) {
            return Err(ColoreError::Config(format!(
                "base URI '{}' is not an http(s) URL",
                self.base_uri
            )));
        }
        Ok(())
    }
}

fn trim_base_uri(base_uri: String) -> String {
    base_uri.trim_end_matches('/').to_string()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

//! Environment-based configuration for the Tableau Server connection.

use std::env;

use crate::mcp::error::TableauError;

/// How the server signs in: a personal access token is preferred over a
/// username and password when both are configured.
#[derive(Clone)]
pub enum Credentials {
    PersonalAccessToken { name: String, secret: String },
    Password { username: String, password: String },
}

impl Credentials {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PersonalAccessToken { .. } => "personal access token",
            Self::Password { .. } => "username/password",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonalAccessToken { name, .. } => {
                f.debug_struct("PersonalAccessToken").field("name", name).finish_non_exhaustive()
            }
            Self::Password { username, .. } => {
                f.debug_struct("Password").field("username", username).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableauConfig {
    pub server_url: String,
    /// Site content URL; empty selects the default site.
    pub site_content_url: String,
    pub credentials: Credentials,
    /// Fixed REST API version. `None` asks the server for its version.
    pub api_version: Option<String>,
}

impl TableauConfig {
    pub fn from_env() -> Result<Self, TableauError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TableauError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_url = get("TABLEAU_SERVER_URL")
            .ok_or_else(|| TableauError::MissingConfig("TABLEAU_SERVER_URL not set in environment".to_string()))?
            .trim()
            .trim_end_matches('/')
            .to_string();

        let credentials = match (get("TABLEAU_TOKEN_NAME"), get("TABLEAU_TOKEN_VALUE")) {
            (Some(name), Some(secret)) => Credentials::PersonalAccessToken { name, secret },
            _ => match (get("TABLEAU_USERNAME"), get("TABLEAU_PASSWORD")) {
                (Some(username), Some(password)) => Credentials::Password { username, password },
                _ => {
                    return Err(TableauError::MissingConfig(
                        "No valid authentication credentials found \
                     (set TABLEAU_TOKEN_NAME/TABLEAU_TOKEN_VALUE or TABLEAU_USERNAME/TABLEAU_PASSWORD)"
                        .to_string(),
                    ));
                }
            },
        };

        Ok(Self {
            server_url,
            site_content_url: lookup("TABLEAU_SITE_ID").unwrap_or_default().trim().to_string(),
            credentials,
            api_version: get("TABLEAU_API_VERSION"),
        })
    }
}

//! HTTP client and session handling for the Tableau Server REST API.
//!
//! This module provides:
//! - A shared HTTP client with connect/read timeouts and request tracing middleware
//! - Lazy sign-in with a personal access token or username/password
//! - Paginated list retrieval, binary exports and streamed data source downloads
//! - The production `TableauApi` implementation used by all tools

use std::{fs::File, io::Seek, time::Duration};

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Method, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder, Result as MiddlewareResult};
use reqwest_tracing::{ReqwestOtelSpanBackend, TracingMiddleware, default_on_request_end, reqwest_otel_span};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::{Span, debug, info, warn};

use super::config::{Credentials, TableauConfig};
use crate::mcp::error::TableauError;
use crate::mcp::tableau::{DataSource, Group, PermissionRule, Project, Site, TableauApi, User, View, Workbook};

/// Version used only to ask the server which REST API version it speaks.
const DISCOVERY_API_VERSION: &str = "2.4";
const PAGE_SIZE: u64 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest wait for the next chunk of any response.
const READ_TIMEOUT: Duration = Duration::from_secs(120);
/// Whole-request cap for JSON calls. Content exports are only bounded by
/// `READ_TIMEOUT`, however long the transfer takes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const AUTH_HEADER: &str = "X-Tableau-Auth";

// Span backend for outbound calls. Headers and bodies are left out because
// they carry the auth token and sign-in secrets.
#[allow(dead_code)]
struct CustomTracing;

impl ReqwestOtelSpanBackend for CustomTracing {
    fn on_request_start(req: &Request, _extension: &mut Extensions) -> Span {
        reqwest_otel_span!(name = "tableau-api-request", req)
    }

    fn on_request_end(span: &Span, outcome: &MiddlewareResult<Response>, _extension: &mut Extensions) {
        default_on_request_end(span, outcome);
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    site_id: String,
    user_id: String,
    api_version: String,
}

pub struct RestClient {
    config: TableauConfig,
    http: ClientWithMiddleware,
    request_timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl RestClient {
    pub fn new(config: TableauConfig) -> Result<Self, TableauError> {
        Self::with_request_timeout(config, REQUEST_TIMEOUT)
    }

    pub(crate) fn with_request_timeout(config: TableauConfig, request_timeout: Duration) -> Result<Self, TableauError> {
        let inner = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).read_timeout(READ_TIMEOUT).build()?;
        let http = ClientBuilder::new(inner).with(TracingMiddleware::<CustomTracing>::new()).build();
        Ok(Self { config, http, request_timeout, session: Mutex::new(None) })
    }

    fn api_url(&self, version: &str, path: &str) -> String {
        format!("{}/api/{version}/{path}", self.config.server_url)
    }

    fn site_url(&self, session: &Session, path: &str) -> String {
        let base = self.api_url(&session.api_version, &format!("sites/{}", session.site_id));
        if path.is_empty() { base } else { format!("{base}/{path}") }
    }

    async fn api_version(&self) -> Result<String, TableauError> {
        if let Some(version) = &self.config.api_version {
            return Ok(version.clone());
        }

        let url = self.api_url(DISCOVERY_API_VERSION, "serverinfo");
        let request = self.http.get(&url).header("Accept", "application/json").timeout(self.request_timeout);
        let body: Value = check(request.send().await?).await?.json().await?;

        body["serverInfo"]["restApiVersion"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("serverinfo response had no restApiVersion").into())
    }

    async fn sign_in(&self) -> Result<Session, TableauError> {
        let api_version = self.api_version().await?;
        let site = json!({ "contentUrl": self.config.site_content_url });
        let credentials = match &self.config.credentials {
            Credentials::PersonalAccessToken { name, secret } => json!({
                "personalAccessTokenName": name,
                "personalAccessTokenSecret": secret,
                "site": site,
            }),
            Credentials::Password { username, password } => json!({
                "name": username,
                "password": password,
                "site": site,
            }),
        };

        let url = self.api_url(&api_version, "auth/signin");
        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
            .json(&json!({ "credentials": credentials }))
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        let session = parse_sign_in(&body, api_version)?;
        info!(
            site_id = %session.site_id,
            user_id = %session.user_id,
            api_version = %session.api_version,
            method = self.config.credentials.kind(),
            "Successfully authenticated with Tableau Server"
        );
        Ok(session)
    }

    async fn session(&self) -> Result<Session, TableauError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.sign_in().await.inspect_err(|e| warn!(error = %e, "Authentication failed"))?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// A JSON API call, capped by the whole-request timeout.
    fn request(&self, method: Method, session: &Session, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTH_HEADER, session.token.as_str())
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
    }

    /// A content export. Only the client's read timeout applies.
    async fn content(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, TableauError> {
        let session = self.session().await?;
        let url = self.site_url(&session, path);
        let response = self.http.get(&url).header(AUTH_HEADER, session.token.as_str()).query(query).send().await?;
        check(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, TableauError> {
        let session = self.session().await?;
        let url = self.site_url(&session, path);
        let response = self.request(Method::GET, &session, &url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, TableauError> {
        Ok(self.content(path, &[]).await?.bytes().await?.into())
    }

    /// Writes the response body chunk by chunk into an anonymous temp file.
    async fn download_to_file(&self, path: &str, query: &[(&str, &str)]) -> Result<File, TableauError> {
        let mut response = self.content(path, query).await?;
        let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!(path, written, "download stored in temp file");

        let mut file = file.into_std().await;
        file.rewind()?;
        Ok(file)
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<T, TableauError> {
        let body = self.get_json(path).await?;
        Ok(serde_json::from_value(body[key].clone())?)
    }

    /// Collects every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        plural: &str,
        singular: &str,
    ) -> Result<Vec<T>, TableauError> {
        let session = self.session().await?;
        let url = self.site_url(&session, path);
        let mut items = Vec::new();
        let mut page_number: u64 = 1;

        loop {
            let response = self
                .request(Method::GET, &session, &url)
                .query(&[("pageSize", PAGE_SIZE), ("pageNumber", page_number)])
                .send()
                .await?;
            let body: Value = check(response).await?.json().await?;
            let (page, total) = page_items::<T>(&body, plural, singular)?;
            let fetched = page.len();
            items.extend(page);

            debug!(path, page_number, fetched, total = ?total, "fetched page");
            match total {
                Some(total) if fetched > 0 && (items.len() as u64) < total => page_number += 1,
                _ => break,
            }
        }

        Ok(items)
    }

    async fn permissions(&self, path: &str) -> Result<Vec<PermissionRule>, TableauError> {
        let body = self.get_json(path).await?;
        let rules = body["permissions"]["granteeCapabilities"].clone();
        if rules.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(rules)?)
    }
}

#[async_trait]
impl TableauApi for RestClient {
    async fn ensure_authenticated(&self) -> Result<(), TableauError> {
        self.session().await.map(|_| ())
    }

    async fn workbooks(&self) -> Result<Vec<Workbook>, TableauError> {
        self.get_all("workbooks", "workbooks", "workbook").await
    }

    async fn workbook(&self, workbook_id: &str) -> Result<Workbook, TableauError> {
        self.get_one(&format!("workbooks/{workbook_id}"), "workbook").await
    }

    async fn workbook_views(&self, workbook_id: &str) -> Result<Vec<View>, TableauError> {
        let body = self.get_json(&format!("workbooks/{workbook_id}/views")).await?;
        Ok(page_items(&body, "views", "view")?.0)
    }

    async fn workbook_permissions(&self, workbook_id: &str) -> Result<Vec<PermissionRule>, TableauError> {
        self.permissions(&format!("workbooks/{workbook_id}/permissions")).await
    }

    async fn view(&self, view_id: &str) -> Result<View, TableauError> {
        self.get_one(&format!("views/{view_id}"), "view").await
    }

    async fn view_csv(&self, view_id: &str) -> Result<Vec<u8>, TableauError> {
        self.get_bytes(&format!("views/{view_id}/data")).await
    }

    async fn view_image(&self, view_id: &str) -> Result<Vec<u8>, TableauError> {
        self.get_bytes(&format!("views/{view_id}/image")).await
    }

    async fn datasources(&self) -> Result<Vec<DataSource>, TableauError> {
        self.get_all("datasources", "datasources", "datasource").await
    }

    async fn download_datasource(&self, datasource_id: &str, include_extract: bool) -> Result<File, TableauError> {
        let query: &[(&str, &str)] = if include_extract { &[] } else { &[("includeExtract", "False")] };
        self.download_to_file(&format!("datasources/{datasource_id}/content"), query).await
    }

    async fn users(&self) -> Result<Vec<User>, TableauError> {
        self.get_all("users", "users", "user").await
    }

    async fn groups(&self) -> Result<Vec<Group>, TableauError> {
        self.get_all("groups", "groups", "group").await
    }

    async fn group_users(&self, group_id: &str) -> Result<Vec<User>, TableauError> {
        self.get_all(&format!("groups/{group_id}/users"), "users", "user").await
    }

    async fn projects(&self) -> Result<Vec<Project>, TableauError> {
        self.get_all("projects", "projects", "project").await
    }

    async fn project_permissions(&self, project_id: &str) -> Result<Vec<PermissionRule>, TableauError> {
        self.permissions(&format!("projects/{project_id}/permissions")).await
    }

    async fn site(&self) -> Result<Site, TableauError> {
        self.get_one("", "site").await
    }

    async fn sign_out(&self) -> Result<(), TableauError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let url = self.api_url(&session.api_version, "auth/signout");
        check(self.request(Method::POST, &session, &url).send().await?).await?;
        info!("Signed out of Tableau Server");
        Ok(())
    }
}

/// Turns a non-2xx response into `TableauError::Api` using the server's
/// `error.summary` / `error.detail` when present.
async fn check(response: Response) -> Result<Response, TableauError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(api_error(status, &text))
}

fn api_error(status: StatusCode, body: &str) -> TableauError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let summary = v["error"]["summary"].as_str()?.to_string();
            Some(match v["error"]["detail"].as_str() {
                Some(detail) if !detail.is_empty() => format!("{summary}: {detail}"),
                _ => summary,
            })
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                trimmed.to_string()
            }
        });
    TableauError::Api { status: status.as_u16(), message }
}

fn parse_sign_in(body: &Value, api_version: String) -> Result<Session, TableauError> {
    let credentials = &body["credentials"];
    let field = |value: &Value, name: &str| {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TableauError::NotAuthenticated(format!("sign-in response had no {name}")))
    };

    Ok(Session {
        token: field(&credentials["token"], "token")?,
        site_id: field(&credentials["site"]["id"], "site id")?,
        user_id: field(&credentials["user"]["id"], "user id")?,
        api_version,
    })
}

/// Items of one list page plus the server's `totalAvailable`, if reported.
fn page_items<T: DeserializeOwned>(
    body: &Value,
    plural: &str,
    singular: &str,
) -> Result<(Vec<T>, Option<u64>), TableauError> {
    let items = match &body[plural][singular] {
        Value::Null => Vec::new(),
        value => serde_json::from_value(value.clone())?,
    };
    let total = match &body["pagination"]["totalAvailable"] {
        Value::String(s) => s.parse().ok(),
        value => value.as_u64(),
    };
    Ok((items, total))
}

//! The Tableau Server client seam.
//!
//! `TableauApi` is everything the tools need from the server. The production
//! implementation lives in `mcp::http::RestClient`; tests use the in-memory
//! stub from `stub`.

pub mod lookup;
pub mod model;
#[cfg(test)]
pub mod stub;

use std::fs::File;

use async_trait::async_trait;

use crate::mcp::error::TableauError;
pub use model::{Capability, DataSource, Grantee, Group, PermissionRule, Project, Site, User, View, Workbook};

#[async_trait]
pub trait TableauApi: Send + Sync {
    /// Signs in if there is no live session yet.
    async fn ensure_authenticated(&self) -> Result<(), TableauError>;

    async fn workbooks(&self) -> Result<Vec<Workbook>, TableauError>;
    async fn workbook(&self, workbook_id: &str) -> Result<Workbook, TableauError>;
    async fn workbook_views(&self, workbook_id: &str) -> Result<Vec<View>, TableauError>;
    async fn workbook_permissions(&self, workbook_id: &str) -> Result<Vec<PermissionRule>, TableauError>;

    async fn view(&self, view_id: &str) -> Result<View, TableauError>;
    async fn view_csv(&self, view_id: &str) -> Result<Vec<u8>, TableauError>;
    async fn view_image(&self, view_id: &str) -> Result<Vec<u8>, TableauError>;

    async fn datasources(&self) -> Result<Vec<DataSource>, TableauError>;
    /// Streams the data source content into an anonymous temp file, rewound to
    /// the start. The file is removed once dropped.
    async fn download_datasource(&self, datasource_id: &str, include_extract: bool) -> Result<File, TableauError>;

    async fn users(&self) -> Result<Vec<User>, TableauError>;
    async fn groups(&self) -> Result<Vec<Group>, TableauError>;
    async fn group_users(&self, group_id: &str) -> Result<Vec<User>, TableauError>;

    async fn projects(&self) -> Result<Vec<Project>, TableauError>;
    async fn project_permissions(&self, project_id: &str) -> Result<Vec<PermissionRule>, TableauError>;

    /// The site the session is signed in to.
    async fn site(&self) -> Result<Site, TableauError>;

    async fn sign_out(&self) -> Result<(), TableauError>;
}

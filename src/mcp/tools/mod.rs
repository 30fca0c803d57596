//! MCP tools for interacting with the Tableau Server API.
//!
//! Each module implements a family of tools:
//! - `workbooks`: List workbooks and views, search content, audit usage
//! - `views`: Export view data as CSV and render view images
//! - `datasources`: List and download published data sources
//! - `permissions`: Workbook and project permission reports
//! - `users`: Users, their permissions and group memberships
//! - `groups`: Groups and member counts
//! - `site`: Site details and content summary
//!
//! Every tool fetches through the shared `TableauApi` and returns a single
//! content item. "Not found" outcomes are ordinary text results.

pub mod datasources;
pub mod format;
pub mod groups;
pub mod permissions;
pub mod site;
pub mod users;
pub mod views;
pub mod workbooks;

use rmcp::model::Content;

use crate::mcp::error::TableauError;

pub type ToolResult = Result<Content, TableauError>;

pub fn text(body: impl Into<String>) -> ToolResult {
    Ok(Content::text(body))
}

#[cfg(test)]
pub(crate) fn text_of(content: &Content) -> &str {
    content.as_text().map(|t| t.text.as_str()).unwrap_or_default()
}

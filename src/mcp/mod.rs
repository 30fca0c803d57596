//! Tableau Server Model Context Protocol implementation.
//!
//! This crate provides MCP tools and resources for browsing a Tableau Server site.
//! The implementation is organized into:
//!
//! - `error`: Error types and conversions
//! - `http`: Configuration, sign-in and the REST client
//! - `tableau`: The server-client seam, records and name lookups
//! - `tools`: Individual MCP tools for specific Tableau operations
//! - `resources`: Workbook and view-data resources
//!
//! The main entry point is the `TableauMCPFactory` which provides the MCP server
//! implementation and manages all tools.

pub mod error;
pub mod http;
pub mod resources;
pub mod tableau;
pub mod tools;

use std::{future::Future, sync::Arc};

use axum::http::request;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, InitializeRequestParam, InitializeResult,
        ListResourcesResult, PaginatedRequestParam, ProtocolVersion, ReadResourceRequestParam,
        ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use tracing::{error, info};

use crate::mcp::{
    error::TableauError,
    tableau::TableauApi,
    tools::{
        ToolResult, datasources,
        datasources::DatasourceRequest,
        groups, permissions, site, users,
        users::UserRequest,
        views,
        views::ViewRequest,
        workbooks,
        workbooks::{SearchRequest, WorkbookRequest},
    },
};

const NOT_AUTHENTICATED: &str =
    "Error: Not authenticated with Tableau Server. Please check your credentials.";

#[derive(Clone)]
pub struct TableauMCPFactory {
    api: Arc<dyn TableauApi>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TableauMCPFactory {
    pub fn new(api: Arc<dyn TableauApi>) -> Self {
        Self { api, tool_router: Self::tool_router() }
    }

    /// Signs in if needed, then runs one tool. Tool failures are logged and
    /// handed back to the client as error text; only bad arguments surface as
    /// protocol errors.
    async fn run(
        &self,
        tool: &str,
        call: impl Future<Output = ToolResult> + Send,
    ) -> Result<CallToolResult, ErrorData> {
        if let Err(e) = self.api.ensure_authenticated().await {
            error!(tool, error = %e, "Tool call without a Tableau session");
            return Ok(CallToolResult::error(vec![Content::text(NOT_AUTHENTICATED)]));
        }

        info!(tool, "tool invocation");
        match call.await {
            Ok(content) => Ok(CallToolResult::success(vec![content])),
            Err(TableauError::InvalidParams(msg)) => Err(TableauError::InvalidParams(msg).into()),
            Err(e) => {
                error!(tool, error = %e, "Error in tool");
                Ok(CallToolResult::error(vec![Content::text(format!("Error executing tool {tool}: {e}"))]))
            }
        }
    }

    // Thin delegating methods so the `tool_router` proc-macro (which scans
    // this impl block) can discover and register the tools. The
    // implementations live in `mcp::tools::*`.

    #[tool(description = "List all available Tableau workbooks")]
    async fn list_workbooks(&self) -> Result<CallToolResult, ErrorData> {
        self.run("list_workbooks", workbooks::list_workbooks(self.api.as_ref())).await
    }

    #[tool(description = "List all views in a specific workbook")]
    async fn list_views(
        &self,
        params: Parameters<WorkbookRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("list_views", workbooks::list_views(self.api.as_ref(), params)).await
    }

    #[tool(description = "Get data from a specific Tableau view as CSV")]
    async fn get_view_data(
        &self,
        params: Parameters<ViewRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("get_view_data", views::get_view_data(self.api.as_ref(), params)).await
    }

    #[tool(description = "Get an image of a Tableau view/dashboard")]
    async fn get_view_image(
        &self,
        params: Parameters<ViewRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("get_view_image", views::get_view_image(self.api.as_ref(), params)).await
    }

    #[tool(description = "Search for Tableau content (workbooks, views) by name or description")]
    async fn search_content(
        &self,
        params: Parameters<SearchRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("search_content", workbooks::search_content(self.api.as_ref(), params)).await
    }

    #[tool(description = "List all available Tableau data sources")]
    async fn list_datasources(&self) -> Result<CallToolResult, ErrorData> {
        self.run("list_datasources", datasources::list_datasources(self.api.as_ref())).await
    }

    #[tool(description = "Download complete dataset from a Tableau data source (gets ALL raw data)")]
    async fn download_datasource(
        &self,
        params: Parameters<DatasourceRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("download_datasource", datasources::download_datasource(self.api.as_ref(), params)).await
    }

    #[tool(
        description = "List all users and groups with access to a specific workbook and their permission levels"
    )]
    async fn list_workbook_permissions(
        &self,
        params: Parameters<WorkbookRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("list_workbook_permissions", permissions::list_workbook_permissions(self.api.as_ref(), params))
            .await
    }

    #[tool(description = "List all users on the Tableau Server with their details")]
    async fn list_all_users(&self) -> Result<CallToolResult, ErrorData> {
        self.run("list_all_users", users::list_all_users(self.api.as_ref())).await
    }

    #[tool(description = "List all groups on the Tableau Server with member counts")]
    async fn list_all_groups(&self) -> Result<CallToolResult, ErrorData> {
        self.run("list_all_groups", groups::list_all_groups(self.api.as_ref())).await
    }

    #[tool(description = "Get all permissions and access levels for a specific user")]
    async fn get_user_permissions(
        &self,
        params: Parameters<UserRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("get_user_permissions", users::get_user_permissions(self.api.as_ref(), params)).await
    }

    #[tool(description = "List all projects and their permission settings")]
    async fn list_projects_permissions(&self) -> Result<CallToolResult, ErrorData> {
        self.run("list_projects_permissions", permissions::list_projects_permissions(self.api.as_ref())).await
    }

    #[tool(description = "Get Tableau Server site information and administrative details")]
    async fn get_site_info(&self) -> Result<CallToolResult, ErrorData> {
        self.run("get_site_info", site::get_site_info(self.api.as_ref())).await
    }

    #[tool(description = "Get usage statistics and access audit for a workbook")]
    async fn audit_workbook_usage(
        &self,
        params: Parameters<WorkbookRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("audit_workbook_usage", workbooks::audit_workbook_usage(self.api.as_ref(), params)).await
    }

    #[tool(description = "List all groups that a specific user belongs to")]
    async fn list_user_groups(
        &self,
        params: Parameters<UserRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run("list_user_groups", users::list_user_groups(self.api.as_ref(), params)).await
    }
}

#[tool_handler]
impl ServerHandler for TableauMCPFactory {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Tableau Server MCP Server: browse workbooks and views, export view data and images, \
                 download data sources, and audit users, groups and permissions"
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, ErrorData> {
        if let Some(http_request_part) = context.extensions.get::<request::Parts>() {
            let initialize_headers = &http_request_part.headers;
            let initialize_uri = &http_request_part.uri;
            info!(?initialize_headers, %initialize_uri, "initialize from http server");
        }
        Ok(self.get_info())
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        if let Err(e) = self.api.ensure_authenticated().await {
            error!(error = %e, "Resource listing without a Tableau session");
            return Ok(ListResourcesResult::with_all_items(Vec::new()));
        }
        let resources = resources::list_resources(self.api.as_ref()).await;
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let body = resources::read_resource(self.api.as_ref(), &request.uri).await;
        Ok(ReadResourceResult { contents: vec![ResourceContents::text(body, request.uri)] })
    }
}

//! Tools for browsing workbooks: listing, views, search and usage audits.

use rmcp::handler::server::wrapper::Parameters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ToolResult, text};
use crate::mcp::{
    error::TableauError,
    tableau::{
        Grantee, TableauApi, View, Workbook,
        lookup::{contains_lowercase, find_by_name},
        model::display_timestamp,
    },
};

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct WorkbookRequest {
    #[schemars(description = "Name of the workbook (case-insensitive), e.g. Superstore")]
    pub workbook_name: String,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Search query matched against workbook names and descriptions and view names")]
    pub query: String,
}

fn workbook_line(wb: &Workbook) -> String {
    let mut line = format!("• **{}**", wb.name);
    if let Some(description) = wb.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!(" - {description}"));
    }
    line
}

pub async fn list_workbooks(api: &dyn TableauApi) -> ToolResult {
    let workbooks = api.workbooks().await?;
    if workbooks.is_empty() {
        return text("No workbooks found on the Tableau Server.");
    }

    let lines: Vec<String> = workbooks
        .iter()
        .map(|wb| {
            format!(
                "{} (ID: {}, Created: {})",
                workbook_line(wb),
                wb.id,
                display_timestamp(wb.created_at.as_ref())
            )
        })
        .collect();

    text(format!("## Available Tableau Workbooks\n\n{}", lines.join("\n")))
}

fn view_line(view: &View) -> String {
    let mut line = format!("• **{}** (ID: {})", view.name, view.id);
    if let Some(url) = view.content_url.as_deref() {
        line.push_str(&format!(" - URL: {url}"));
    }
    line
}

pub async fn list_views(api: &dyn TableauApi, Parameters(args): Parameters<WorkbookRequest>) -> ToolResult {
    let workbook_name = TableauError::require("workbook_name", &args.workbook_name)?;
    let workbooks = api.workbooks().await?;
    let Some(workbook) = find_by_name(&workbooks, workbook_name) else {
        return text(format!("Workbook '{workbook_name}' not found."));
    };

    let views = api.workbook_views(&workbook.id).await?;
    if views.is_empty() {
        return text(format!("No views found in workbook '{workbook_name}'."));
    }

    let lines: Vec<String> = views.iter().map(view_line).collect();
    text(format!("## Views in Workbook '{workbook_name}'\n\n{}", lines.join("\n")))
}

pub async fn search_content(api: &dyn TableauApi, Parameters(args): Parameters<SearchRequest>) -> ToolResult {
    let query = TableauError::require("query", &args.query)?;
    let needle = query.to_lowercase();

    let workbooks = api.workbooks().await?;
    let matching_workbooks: Vec<&Workbook> = workbooks
        .iter()
        .filter(|wb| {
            contains_lowercase(&wb.name, &needle)
                || wb.description.as_deref().is_some_and(|d| contains_lowercase(d, &needle))
        })
        .collect();

    // Views are only searched inside workbooks that matched.
    let mut matching_views: Vec<(View, &str)> = Vec::new();
    for wb in matching_workbooks.iter().copied() {
        let workbook_name = wb.name.as_str();
        match api.workbook_views(&wb.id).await {
            Ok(views) => matching_views.extend(
                views
                    .into_iter()
                    .filter(|v| contains_lowercase(&v.name, &needle))
                    .map(move |v| (v, workbook_name)),
            ),
            Err(e) => debug!(workbook = %wb.name, error = %e, "skipping views during search"),
        }
    }

    let mut result = format!("## Search Results for '{query}'\n\n");

    if !matching_workbooks.is_empty() {
        result.push_str("### Matching Workbooks:\n");
        for wb in matching_workbooks.iter().copied() {
            result.push_str(&workbook_line(wb));
            result.push('\n');
        }
        result.push('\n');
    }

    if !matching_views.is_empty() {
        result.push_str("### Matching Views:\n");
        for (view, workbook_name) in &matching_views {
            result.push_str(&format!("• **{}** (in workbook: {workbook_name})\n", view.name));
        }
        result.push('\n');
    }

    if matching_workbooks.is_empty() && matching_views.is_empty() {
        result.push_str("No matching content found.");
    }

    text(result)
}

pub async fn audit_workbook_usage(api: &dyn TableauApi, Parameters(args): Parameters<WorkbookRequest>) -> ToolResult {
    let workbook_name = TableauError::require("workbook_name", &args.workbook_name)?;
    let workbooks = api.workbooks().await?;
    let Some(workbook) = find_by_name(&workbooks, workbook_name) else {
        return text(format!("Workbook '{workbook_name}' not found."));
    };

    let mut result = format!("## Usage Audit for Workbook '{workbook_name}'\n\n");
    result.push_str(&format!("**Created:** {}\n", display_timestamp(workbook.created_at.as_ref())));
    result.push_str(&format!("**Updated:** {}\n", display_timestamp(workbook.updated_at.as_ref())));
    result.push_str(&format!(
        "**Size:** {} bytes\n",
        workbook.size.map_or_else(|| "Unknown".to_string(), |s| s.to_string())
    ));
    result.push_str(&format!("**Project:** {}\n\n", workbook.project_name().unwrap_or("Unknown")));

    let views = api.workbook_views(&workbook.id).await?;
    if !views.is_empty() {
        result.push_str(&format!("### 📈 Views ({}):\n", views.len()));
        for view in &views {
            result.push_str(&format!("• **{}** (ID: {})\n", view.name, view.id));
        }
        result.push('\n');
    }

    match api.workbook_permissions(&workbook.id).await {
        Ok(rules) if rules.is_empty() => {
            result.push_str("### 🔐 Access Control:\nInherits permissions from project\n");
        }
        Ok(rules) => {
            let users = rules.iter().filter(|r| matches!(r.grantee, Grantee::User(_))).count();
            let groups = rules.len() - users;
            result.push_str("### 🔐 Access Control:\n");
            result.push_str(&format!("**Explicit Permissions:** {} rules\n", rules.len()));
            result.push_str(&format!("**Direct User Access:** {users} users\n"));
            result.push_str(&format!("**Group-based Access:** {groups} groups\n"));
        }
        Err(e) => {
            result.push_str(&format!("### 🔐 Access Control:\nCould not retrieve permissions: {e}\n"));
        }
    }

    result.push_str(
        "\n💡 **Recommendation:** Use the `list_workbook_permissions` tool for detailed access information.",
    );

    text(result)
}

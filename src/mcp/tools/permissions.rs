//! Permission reports for workbooks and projects.

use std::collections::HashMap;

use rmcp::handler::server::wrapper::Parameters;

use super::{ToolResult, text, workbooks::WorkbookRequest};
use crate::mcp::{
    error::TableauError,
    tableau::{Grantee, PermissionRule, Project, TableauApi, Workbook, lookup::find_by_name},
};

/// Capabilities per grantee id, merged across rules in first-seen order. A
/// capability repeated for the same grantee keeps its latest mode.
type GranteeCapabilities<'a> = Vec<(&'a str, Vec<(&'a str, &'a str)>)>;

fn merge_rules<'a>(rules: impl Iterator<Item = &'a PermissionRule>) -> GranteeCapabilities<'a> {
    let mut merged: GranteeCapabilities<'a> = Vec::new();
    for rule in rules {
        let id = rule.grantee.id();
        let entry = match merged.iter().position(|(existing, _)| *existing == id) {
            Some(index) => &mut merged[index].1,
            None => {
                merged.push((id, Vec::new()));
                let last = merged.len() - 1;
                &mut merged[last].1
            }
        };
        for capability in &rule.capabilities {
            match entry.iter_mut().find(|(name, _)| *name == capability.name) {
                Some(existing) => existing.1 = capability.mode.as_str(),
                None => entry.push((capability.name.as_str(), capability.mode.as_str())),
            }
        }
    }
    merged
}

fn render_grantees(
    heading: &str,
    grantees: &GranteeCapabilities<'_>,
    names: &HashMap<&str, &str>,
    unknown: &str,
) -> String {
    let mut section = format!("{heading}\n");
    for (id, capabilities) in grantees {
        let name = names.get(id).map_or_else(|| format!("{unknown}: {id}"), |n| (*n).to_string());
        section.push_str(&format!("\n**{name}**\n"));
        for (capability, mode) in capabilities {
            section.push_str(&format!("  • {capability}: {mode}\n"));
        }
    }
    section.push('\n');
    section
}

async fn render_workbook_permissions(
    api: &dyn TableauApi,
    workbook_name: &str,
    workbook: &Workbook,
) -> Result<String, TableauError> {
    let rules = api.workbook_permissions(&workbook.id).await?;
    let mut result = format!("## Permissions for Workbook '{workbook_name}'\n\n");

    if rules.is_empty() {
        result.push_str("No explicit permissions set (inherits from project).\n");
    } else {
        let user_rules = merge_rules(rules.iter().filter(|r| matches!(r.grantee, Grantee::User(_))));
        let group_rules = merge_rules(rules.iter().filter(|r| matches!(r.grantee, Grantee::Group(_))));

        if !user_rules.is_empty() {
            let users = api.users().await?;
            let names: HashMap<&str, &str> = users.iter().map(|u| (u.id.as_str(), u.name.as_str())).collect();
            result.push_str(&render_grantees("### 👤 User Permissions:", &user_rules, &names, "User ID"));
        }

        if !group_rules.is_empty() {
            let groups = api.groups().await?;
            let names: HashMap<&str, &str> = groups.iter().map(|g| (g.id.as_str(), g.name.as_str())).collect();
            result.push_str(&render_grantees("### 👥 Group Permissions:", &group_rules, &names, "Group ID"));
        }
    }

    result.push_str("### 📁 Project Information:\n");
    result.push_str(&format!("**Project:** {}\n", workbook.project_name().unwrap_or("Unknown")));
    result.push_str(&format!("**Owner:** {}\n", workbook.owner_id().unwrap_or("Unknown")));
    Ok(result)
}

pub async fn list_workbook_permissions(
    api: &dyn TableauApi,
    Parameters(args): Parameters<WorkbookRequest>,
) -> ToolResult {
    let workbook_name = TableauError::require("workbook_name", &args.workbook_name)?;
    let workbooks = api.workbooks().await?;
    let Some(workbook) = find_by_name(&workbooks, workbook_name) else {
        return text(format!("Workbook '{workbook_name}' not found."));
    };

    text(render_workbook_permissions(api, workbook_name, workbook).await?)
}

fn in_project(workbook: &Workbook, project: &Project) -> bool {
    workbook.project.as_ref().is_some_and(|p| match p.id.as_deref() {
        Some(id) => id == project.id,
        None => p.name.as_deref() == Some(project.name.as_str()),
    })
}

pub async fn list_projects_permissions(api: &dyn TableauApi) -> ToolResult {
    let projects = api.projects().await?;
    if projects.is_empty() {
        return text("No projects found on the Tableau Server.");
    }

    let workbooks = api.workbooks().await?;
    let mut result = format!("## All Projects and Permissions ({} total)\n\n", projects.len());

    for project in &projects {
        result.push_str(&format!("### 📁 {}\n", project.name));
        result.push_str(&format!(
            "**Description:** {}\n",
            project.description.as_deref().filter(|d| !d.is_empty()).unwrap_or("No description")
        ));
        result.push_str(&format!(
            "**Content Permissions:** {}\n",
            project.content_permissions.as_deref().unwrap_or("Unknown")
        ));
        let count = workbooks.iter().filter(|wb| in_project(wb, project)).count();
        result.push_str(&format!("**Workbooks:** {count}\n"));

        match api.project_permissions(&project.id).await {
            Ok(rules) if rules.is_empty() => result.push_str("**Permissions:** Inherited from parent\n"),
            Ok(rules) => result.push_str(&format!("**Explicit Permissions:** {} rules\n", rules.len())),
            Err(_) => result.push_str("**Permissions:** Could not retrieve\n"),
        }

        result.push('\n');
    }

    text(result)
}

//! Group listing with member counts.

use super::{ToolResult, text};
use crate::mcp::tableau::TableauApi;

pub async fn list_all_groups(api: &dyn TableauApi) -> ToolResult {
    let groups = api.groups().await?;
    if groups.is_empty() {
        return text("No groups found on the Tableau Server.");
    }

    let mut result = format!("## All Tableau Server Groups ({} total)\n\n", groups.len());
    for group in &groups {
        result.push_str(&format!("• **{}**", group.name));
        if let Some(domain) = group.domain_name() {
            result.push_str(&format!(" (Domain: {domain})"));
        }
        match api.group_users(&group.id).await {
            Ok(members) => result.push_str(&format!(" - {} members", members.len())),
            Err(_) => result.push_str(" - Member count unavailable"),
        }
        result.push('\n');
    }

    text(result)
}

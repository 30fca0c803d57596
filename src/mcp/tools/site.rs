//! Site information and content summary.

use super::{
    ToolResult,
    format::{group_in_order, humanize_role},
    text,
};
use crate::mcp::tableau::TableauApi;

fn quota(value: Option<u64>) -> String {
    value.filter(|v| *v > 0).map_or_else(|| "Unlimited".to_string(), |v| v.to_string())
}

pub async fn get_site_info(api: &dyn TableauApi) -> ToolResult {
    let site = api.site().await?;

    let mut result = String::from("## Tableau Server Site Information\n\n");
    result.push_str(&format!("**Site Name:** {}\n", site.name));
    result.push_str(&format!("**Site ID:** {}\n", site.id));
    result.push_str(&format!(
        "**Content URL:** {}\n",
        site.content_url.as_deref().filter(|u| !u.is_empty()).unwrap_or("Default site")
    ));
    result.push_str(&format!("**Admin Mode:** {}\n", site.admin_mode.as_deref().unwrap_or("Unknown")));
    result.push_str(&format!("**State:** {}\n", site.state.as_deref().unwrap_or("Unknown")));
    result.push_str(&format!("**Storage Quota:** {}\n", quota(site.storage_quota)));
    result.push_str(&format!("**User Quota:** {}\n\n", quota(site.user_quota)));

    let users = api.users().await?;
    let workbooks = api.workbooks().await?;
    let datasources = api.datasources().await?;
    let projects = api.projects().await?;
    let groups = api.groups().await?;

    result.push_str("### 📊 Content Summary:\n");
    result.push_str(&format!("• **Users:** {}\n", users.len()));
    result.push_str(&format!("• **Groups:** {}\n", groups.len()));
    result.push_str(&format!("• **Projects:** {}\n", projects.len()));
    result.push_str(&format!("• **Workbooks:** {}\n", workbooks.len()));
    result.push_str(&format!("• **Data Sources:** {}\n\n", datasources.len()));

    result.push_str("### 👤 User Roles:\n");
    for (role, members) in group_in_order(&users, |u| u.site_role.as_str()) {
        result.push_str(&format!("• **{}:** {}\n", humanize_role(role), members.len()));
    }

    text(result)
}

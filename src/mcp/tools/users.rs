//! User directory tools: listing, per-user permission summaries and group
//! memberships.

use rmcp::handler::server::wrapper::Parameters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    ToolResult,
    format::{group_in_order, humanize_role, last_login},
    text,
};
use crate::mcp::{
    error::TableauError,
    tableau::{
        TableauApi,
        lookup::{find_by_name, group_memberships},
    },
};

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct UserRequest {
    #[schemars(description = "Tableau username (case-insensitive), e.g. jsmith")]
    pub username: String,
}

pub async fn list_all_users(api: &dyn TableauApi) -> ToolResult {
    let users = api.users().await?;
    if users.is_empty() {
        return text("No users found on the Tableau Server.");
    }

    let mut result = format!("## All Tableau Server Users ({} total)\n\n", users.len());
    for (role, members) in group_in_order(&users, |u| u.site_role.as_str()) {
        result.push_str(&format!("### 🔰 {} ({} users):\n", humanize_role(role), members.len()));
        for user in members {
            result.push_str(&format!("• **{}**", user.name));
            if let Some(full_name) = user.full_name.as_deref().filter(|n| !n.is_empty()) {
                result.push_str(&format!(" ({full_name})"));
            }
            result.push_str(&format!(" - Last Login: {}\n", last_login(user.last_login.as_ref())));
        }
        result.push('\n');
    }

    text(result)
}

pub async fn get_user_permissions(api: &dyn TableauApi, Parameters(args): Parameters<UserRequest>) -> ToolResult {
    let username = TableauError::require("username", &args.username)?;
    let users = api.users().await?;
    let Some(user) = find_by_name(&users, username) else {
        return text(format!("User '{username}' not found."));
    };

    let mut result = format!("## Permissions for User '{}'\n\n", user.name);
    result.push_str(&format!(
        "**Full Name:** {}\n",
        user.full_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Not specified")
    ));
    result.push_str(&format!("**Site Role:** {}\n", user.site_role));
    result.push_str(&format!("**Last Login:** {}\n\n", last_login(user.last_login.as_ref())));

    let workbooks = api.workbooks().await?;
    let owned: Vec<&str> = workbooks
        .iter()
        .filter(|wb| wb.owner_id() == Some(user.id.as_str()))
        .map(|wb| wb.name.as_str())
        .collect();
    if !owned.is_empty() {
        result.push_str(&format!("### 📊 Owned Workbooks ({}):\n", owned.len()));
        for name in &owned {
            result.push_str(&format!("• {name}\n"));
        }
        result.push('\n');
    }

    match group_memberships(api, &user.id).await {
        Ok(memberships) if memberships.is_empty() => {}
        Ok(memberships) => {
            result.push_str(&format!("### 👥 Group Memberships ({}):\n", memberships.len()));
            for membership in &memberships {
                result.push_str(&format!("• {}\n", membership.group.name));
            }
            result.push('\n');
        }
        Err(e) => result.push_str(&format!("### 👥 Group Memberships: Could not retrieve ({e})\n\n")),
    }

    text(result)
}

pub async fn list_user_groups(api: &dyn TableauApi, Parameters(args): Parameters<UserRequest>) -> ToolResult {
    let username = TableauError::require("username", &args.username)?;
    let users = api.users().await?;
    let Some(user) = find_by_name(&users, username) else {
        return text(format!("User '{username}' not found."));
    };

    let mut result = format!("## Group Memberships for '{}'\n\n", user.name);
    let memberships = group_memberships(api, &user.id).await?;

    if memberships.is_empty() {
        result.push_str("User is not a member of any groups.\n");
        return text(result);
    }

    result.push_str(&format!("**Total Groups:** {}\n\n", memberships.len()));
    for membership in &memberships {
        result.push_str(&format!("• **{}**", membership.group.name));
        if let Some(domain) = membership.group.domain_name() {
            result.push_str(&format!(" (Domain: {domain})"));
        }
        let others = membership.members.iter().filter(|m| m.id != user.id).count();
        result.push_str(&format!(" - {others} other members\n"));
    }

    text(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tableau::{
        model::{DomainRef, IdRef},
        stub::{StubTableau, group, user, workbook},
    };
    use crate::mcp::tools::text_of;
    use chrono::{TimeZone, Utc};

    fn request(name: &str) -> Parameters<UserRequest> {
        Parameters(UserRequest { username: name.to_string() })
    }

    fn directory() -> StubTableau {
        let mut stub = StubTableau::default();
        let mut alice = user("u-1", "alice");
        alice.full_name = Some("Alice Smith".to_string());
        alice.site_role = "SiteAdministratorCreator".to_string();
        alice.last_login = Utc.with_ymd_and_hms(2025, 5, 6, 7, 8, 9).single();
        stub.users = vec![alice, user("u-2", "bob"), user("u-3", "carol")];

        let mut analysts = group("g-1", "Analysts");
        analysts.domain = Some(DomainRef { name: Some("local".to_string()) });
        stub.groups = vec![analysts, group("g-2", "Admins"), group("g-3", "Broken")];
        let members = vec![user("u-1", "alice"), user("u-2", "bob"), user("u-3", "carol")];
        stub.group_members.insert("g-1".to_string(), members);
        stub.group_members.insert("g-2".to_string(), vec![user("u-2", "bob")]);

        let mut sales = workbook("wb-1", "Sales");
        sales.owner = Some(IdRef { id: "u-1".to_string() });
        stub.workbooks = vec![sales, workbook("wb-2", "Ops")];
        stub
    }

    #[tokio::test]
    async fn users_are_grouped_by_role() {
        let stub = directory();
        let content = list_all_users(&stub).await.unwrap();
        let body = text_of(&content);

        assert!(body.starts_with("## All Tableau Server Users (3 total)\n\n"));
        assert!(body.contains(
            "### 🔰 Site Administrator Creator (1 users):\n• **alice** (Alice Smith) - Last Login: 2025-05-06 07:08:09+00:00\n"
        ));
        assert!(body.contains("### 🔰 Viewer (2 users):\n• **bob** - Last Login: Never\n• **carol** - Last Login: Never\n"));
    }

    #[tokio::test]
    async fn user_permissions_list_owned_workbooks_and_groups() {
        let stub = directory();
        let content = get_user_permissions(&stub, request("ALICE")).await.unwrap();
        let body = text_of(&content);

        assert!(body.starts_with("## Permissions for User 'alice'\n\n**Full Name:** Alice Smith\n"));
        assert!(body.contains("**Site Role:** SiteAdministratorCreator\n"));
        assert!(body.contains("### 📊 Owned Workbooks (1):\n• Sales\n"));
        assert!(body.contains("### 👥 Group Memberships (1):\n• Analysts\n"));
    }

    #[tokio::test]
    async fn user_permissions_report_group_failures_inline() {
        let mut stub = directory();
        stub.failing.insert("groups");
        let content = get_user_permissions(&stub, request("bob")).await.unwrap();
        let body = text_of(&content);

        assert!(body.contains("**Full Name:** Not specified\n"));
        assert!(!body.contains("Owned Workbooks"));
        assert!(body.contains("### 👥 Group Memberships: Could not retrieve ("));
    }

    #[tokio::test]
    async fn user_groups_count_other_members() {
        let stub = directory();
        let content = list_user_groups(&stub, request("bob")).await.unwrap();
        let body = text_of(&content);

        assert!(body.contains("**Total Groups:** 2\n\n"));
        assert!(body.contains("• **Analysts** (Domain: local) - 2 other members\n"));
        assert!(body.contains("• **Admins** - 0 other members\n"));
    }

    #[tokio::test]
    async fn user_without_groups_and_unknown_user() {
        let mut stub = directory();
        stub.users.push(user("u-4", "dave"));
        let lonely = list_user_groups(&stub, request("dave")).await.unwrap();
        assert!(text_of(&lonely).ends_with("User is not a member of any groups.\n"));

        let missing = list_user_groups(&stub, request("erin")).await.unwrap();
        assert_eq!(text_of(&missing), "User 'erin' not found.");
    }
}

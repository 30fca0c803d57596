//! Name lookups over already-fetched lists.

use tracing::{debug, warn};

use super::{Group, TableauApi, User, View, Workbook, model::DataSource};
use crate::mcp::error::TableauError;

pub trait Named {
    fn name(&self) -> &str;
}

macro_rules! named {
    ($($ty:ty),*) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

named!(Workbook, View, DataSource, User, Group);

/// Case-insensitive name comparison.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Case-insensitive substring test; `needle` is expected lowercased already.
pub fn contains_lowercase(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// First item whose name matches `name`, ignoring case.
pub fn find_by_name<'a, T: Named>(items: &'a [T], name: &str) -> Option<&'a T> {
    items.iter().find(|item| same_name(item.name(), name))
}

/// Finds a view by name, either inside one named workbook or across every
/// workbook. Workbooks whose views cannot be fetched are skipped.
pub async fn find_view(
    api: &dyn TableauApi,
    view_name: &str,
    workbook_name: Option<&str>,
) -> Result<Option<View>, TableauError> {
    let workbooks = api.workbooks().await?;

    let targets: Vec<&Workbook> = match workbook_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => find_by_name(&workbooks, name.trim()).into_iter().collect(),
        None => workbooks.iter().collect(),
    };

    for workbook in targets {
        match api.workbook_views(&workbook.id).await {
            Ok(views) => {
                if let Some(view) = views.into_iter().find(|v| same_name(&v.name, view_name)) {
                    return Ok(Some(view));
                }
            }
            Err(e) => warn!(workbook = %workbook.name, error = %e, "could not get views for workbook"),
        }
    }

    Ok(None)
}

/// A group the user belongs to, together with its full member list.
pub struct Membership {
    pub group: Group,
    pub members: Vec<User>,
}

/// Every group containing `user_id`. Groups whose members cannot be listed
/// are skipped.
pub async fn group_memberships(api: &dyn TableauApi, user_id: &str) -> Result<Vec<Membership>, TableauError> {
    let groups = api.groups().await?;
    let mut memberships = Vec::new();

    for group in groups {
        match api.group_users(&group.id).await {
            Ok(members) if members.iter().any(|u| u.id == user_id) => {
                memberships.push(Membership { group, members });
            }
            Ok(_) => {}
            Err(e) => debug!(group = %group.name, error = %e, "skipping group with unreadable members"),
        }
    }

    Ok(memberships)
}

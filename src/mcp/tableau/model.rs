//! Read-only records returned by the Tableau REST API.
//!
//! The server serializes most attributes as strings (the JSON form is a
//! mechanical translation of its XML schema), so numeric fields accept
//! either representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub owner: Option<IdRef>,
}

impl Workbook {
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.name.as_deref())
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_url: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

impl DataSource {
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub site_role: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<DomainRef>,
}

impl Group {
    pub fn domain_name(&self) -> Option<&str> {
        self.domain.as_ref().and_then(|d| d.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_permissions: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub admin_mode: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub storage_quota: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub user_quota: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grantee {
    User(String),
    Group(String),
}

impl Grantee {
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Group(id) => id,
        }
    }
}

/// One `granteeCapabilities` entry: every capability granted or denied to a
/// single user or group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawGranteeCapabilities")]
pub struct PermissionRule {
    pub grantee: Grantee,
    pub capabilities: Vec<Capability>,
}

#[derive(Deserialize)]
struct RawGranteeCapabilities {
    #[serde(default)]
    user: Option<IdRef>,
    #[serde(default)]
    group: Option<IdRef>,
    #[serde(default)]
    capabilities: CapabilityList,
}

#[derive(Default, Deserialize)]
struct CapabilityList {
    #[serde(default)]
    capability: Vec<Capability>,
}

impl TryFrom<RawGranteeCapabilities> for PermissionRule {
    type Error = String;

    fn try_from(raw: RawGranteeCapabilities) -> Result<Self, Self::Error> {
        let grantee = match (raw.user, raw.group) {
            (Some(user), _) => Grantee::User(user.id),
            (None, Some(group)) => Grantee::Group(group.id),
            (None, None) => return Err("permission rule has neither a user nor a group grantee".to_string()),
        };
        Ok(Self { grantee, capabilities: raw.capabilities.capability })
    }
}

/// Renders a server timestamp the way the tool output shows it.
pub fn display_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    ts.map_or_else(|| "None".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S%:z").to_string())
}

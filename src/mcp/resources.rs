//! MCP resources: one JSON metadata document per workbook, plus raw CSV for
//! views.
//!
//! - `tableau://workbooks/{id}`: workbook metadata with its views
//! - `tableau://views/{id}/data`: the view's CSV export

use rmcp::model::{AnnotateAble, RawResource, Resource};
use serde_json::json;
use tracing::error;

use crate::mcp::{
    error::TableauError,
    tableau::{TableauApi, model::display_timestamp},
};

const WORKBOOK_PREFIX: &str = "tableau://workbooks/";
const VIEW_PREFIX: &str = "tableau://views/";
const VIEW_DATA_SUFFIX: &str = "/data";

pub fn workbook_uri(workbook_id: &str) -> String {
    format!("{WORKBOOK_PREFIX}{workbook_id}")
}

/// Resources for every workbook. Listing failures yield no resources.
pub async fn list_resources(api: &dyn TableauApi) -> Vec<Resource> {
    let workbooks = match api.workbooks().await {
        Ok(workbooks) => workbooks,
        Err(e) => {
            error!(error = %e, "Error listing resources");
            return Vec::new();
        }
    };

    workbooks
        .iter()
        .map(|wb| {
            let mut raw = RawResource::new(workbook_uri(&wb.id), format!("Workbook: {}", wb.name));
            raw.description = Some(format!("Tableau workbook: {}", wb.name));
            raw.mime_type = Some("application/json".to_string());
            raw.no_annotation()
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum ResourceTarget<'a> {
    Workbook(&'a str),
    ViewData(&'a str),
}

fn parse_uri(uri: &str) -> Option<ResourceTarget<'_>> {
    if let Some(id) = uri.strip_prefix(WORKBOOK_PREFIX) {
        return (!id.is_empty() && !id.contains('/')).then_some(ResourceTarget::Workbook(id));
    }
    uri.strip_prefix(VIEW_PREFIX)
        .and_then(|rest| rest.strip_suffix(VIEW_DATA_SUFFIX))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .map(ResourceTarget::ViewData)
}

async fn workbook_metadata(api: &dyn TableauApi, workbook_id: &str) -> Result<String, TableauError> {
    let workbook = api.workbook(workbook_id).await?;
    let views = api.workbook_views(workbook_id).await?;

    let metadata = json!({
        "id": workbook.id,
        "name": workbook.name,
        "description": workbook.description,
        "created_at": display_timestamp(workbook.created_at.as_ref()),
        "updated_at": display_timestamp(workbook.updated_at.as_ref()),
        "project_name": workbook.project_name(),
        "owner_id": workbook.owner_id(),
        "size": workbook.size,
        "views": views.iter().map(|v| json!({ "id": v.id, "name": v.name })).collect::<Vec<_>>(),
    });
    Ok(serde_json::to_string_pretty(&metadata)?)
}

async fn view_data(api: &dyn TableauApi, view_id: &str) -> Result<String, TableauError> {
    let view = api.view(view_id).await?;
    let bytes = api.view_csv(&view.id).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Body of the resource at `uri`; failures are reported in the text.
pub async fn read_resource(api: &dyn TableauApi, uri: &str) -> String {
    if let Err(e) = api.ensure_authenticated().await {
        error!(error = %e, "Resource read without a Tableau session");
        return "Error: Not authenticated with Tableau Server".to_string();
    }

    let result = match parse_uri(uri) {
        Some(ResourceTarget::Workbook(id)) => workbook_metadata(api, id).await,
        Some(ResourceTarget::ViewData(id)) => view_data(api, id).await,
        None => return format!("Error: Unknown resource URI: {uri}"),
    };

    result.unwrap_or_else(|e| {
        error!(%uri, error = %e, "Error reading resource");
        format!("Error reading resource: {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tableau::stub::{StubTableau, view, workbook};

    fn stub() -> StubTableau {
        let mut stub = StubTableau::default();
        let mut sales = workbook("wb-1", "Sales");
        sales.size = Some(7);
        stub.workbooks = vec![sales];
        stub.views.insert("wb-1".to_string(), vec![view("v-1", "Overview")]);
        stub.csv.insert("v-1".to_string(), b"a,b\n1,2\n".to_vec());
        stub
    }

    #[test]
    fn uris_are_classified() {
        assert_eq!(parse_uri("tableau://workbooks/wb-1"), Some(ResourceTarget::Workbook("wb-1")));
        assert_eq!(parse_uri("tableau://views/v-1/data"), Some(ResourceTarget::ViewData("v-1")));
        assert_eq!(parse_uri("tableau://views/v-1"), None);
        assert_eq!(parse_uri("tableau://workbooks/"), None);
        assert_eq!(parse_uri("file:///etc/passwd"), None);
    }

    #[tokio::test]
    async fn workbooks_are_listed_as_json_resources() {
        let resources = list_resources(&stub()).await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "tableau://workbooks/wb-1");
        assert_eq!(resources[0].name, "Workbook: Sales");
        assert_eq!(resources[0].mime_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn listing_failure_yields_no_resources() {
        let mut stub = stub();
        stub.failing.insert("workbooks");
        assert!(list_resources(&stub).await.is_empty());
    }

    #[tokio::test]
    async fn workbook_resource_is_metadata_json() {
        let body = read_resource(&stub(), "tableau://workbooks/wb-1").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["name"], "Sales");
        assert_eq!(value["size"], 7);
        assert_eq!(value["views"][0]["name"], "Overview");
        assert!(value["project_name"].is_null());
    }

    #[tokio::test]
    async fn view_resource_is_raw_csv() {
        assert_eq!(read_resource(&stub(), "tableau://views/v-1/data").await, "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn unknown_and_failing_uris_are_reported() {
        let stub = stub();
        assert_eq!(
            read_resource(&stub, "tableau://projects/p-1").await,
            "Error: Unknown resource URI: tableau://projects/p-1"
        );
        assert!(read_resource(&stub, "tableau://views/v-404/data").await.starts_with("Error reading resource:"));
    }

    #[tokio::test]
    async fn unauthenticated_reads_are_refused() {
        let mut stub = stub();
        stub.auth_error = Some("bad token".to_string());
        assert_eq!(
            read_resource(&stub, "tableau://workbooks/wb-1").await,
            "Error: Not authenticated with Tableau Server"
        );
    }
}

//! Tools for exporting view data and rendering view images.

use base64::{Engine, engine::general_purpose::STANDARD};
use rmcp::{handler::server::wrapper::Parameters, model::Content};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ToolResult, text};
use crate::mcp::{
    error::TableauError,
    tableau::{TableauApi, lookup::find_view},
};

const PREVIEW_ROWS: usize = 5;

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct ViewRequest {
    #[schemars(description = "Name of the view (case-insensitive)")]
    pub view_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Name of the workbook containing the view (optional if the view name is unique)")]
    pub workbook_name: Option<String>,
}

/// Parses view CSV into rows; ragged rows are kept as-is.
pub fn parse_csv(data: &str) -> Result<Vec<Vec<String>>, TableauError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(data.as_bytes());
    reader
        .records()
        .map(|record| Ok(record?.iter().map(str::to_string).collect()))
        .collect()
}

/// Markdown summary of a view's CSV export: columns, row count, a short
/// preview table and the full data.
pub fn render_view_data(view_name: &str, csv_data: &str, rows: &[Vec<String>]) -> String {
    let Some((headers, data_rows)) = rows.split_first() else {
        return format!("No data found in view '{view_name}'.");
    };

    let mut summary = format!("## Data from View '{view_name}'\n\n");
    summary.push_str(&format!("**Columns:** {}\n", headers.join(", ")));
    summary.push_str(&format!("**Rows:** {}\n\n", data_rows.len()));

    if !data_rows.is_empty() {
        summary.push_str(&format!("**Preview (first {PREVIEW_ROWS} rows):**\n\n"));
        summary.push_str(&format!("| {} |\n", headers.join(" | ")));
        summary.push_str(&format!("| {} |\n", vec!["---"; headers.len()].join(" | ")));
        for row in data_rows.iter().take(PREVIEW_ROWS) {
            summary.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        if data_rows.len() > PREVIEW_ROWS {
            summary.push_str(&format!("\n... and {} more rows.\n", data_rows.len() - PREVIEW_ROWS));
        }
    }

    summary.push_str(&format!("\n**Full CSV Data:**\n```csv\n{csv_data}\n```"));
    summary
}

pub async fn get_view_data(api: &dyn TableauApi, Parameters(args): Parameters<ViewRequest>) -> ToolResult {
    let view_name = TableauError::require("view_name", &args.view_name)?;
    let Some(view) = find_view(api, view_name, args.workbook_name.as_deref()).await? else {
        return text(format!("View '{view_name}' not found."));
    };

    let bytes = api.view_csv(&view.id).await?;
    let csv_data = String::from_utf8_lossy(&bytes);
    let rows = parse_csv(&csv_data)?;

    text(render_view_data(view_name, &csv_data, &rows))
}

pub async fn get_view_image(api: &dyn TableauApi, Parameters(args): Parameters<ViewRequest>) -> ToolResult {
    let view_name = TableauError::require("view_name", &args.view_name)?;
    let Some(view) = find_view(api, view_name, args.workbook_name.as_deref()).await? else {
        return text(format!("View '{view_name}' not found."));
    };

    let image = api.view_image(&view.id).await?;
    Ok(Content::image(STANDARD.encode(image), "image/png"))
}

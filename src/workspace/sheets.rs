//! Sheets API operations.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::endpoints::SHEETS_BASE_URL;
use crate::error::Result;
use crate::workspace::client::WorkspaceClient;
use crate::workspace::drive::DriveFile;

/// A range of cell values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,

    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// Result of an update or append call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(default)]
    pub updated_cells: Option<u64>,

    #[serde(default)]
    pub updates: Option<Box<UpdateResult>>,
}

impl UpdateResult {
    /// Cell count for both direct updates and append envelopes.
    pub fn cell_count(&self) -> u64 {
        self.updated_cells
            .or_else(|| self.updates.as_ref().and_then(|u| u.updated_cells))
            .unwrap_or(0)
    }
}

/// A created spreadsheet
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    pub spreadsheet_id: String,

    #[serde(default)]
    pub spreadsheet_url: Option<String>,
}

impl WorkspaceClient {
    /// List spreadsheets the identity can access, most recently modified
    /// first. Spreadsheets are Drive files, so this goes through Drive.
    pub async fn list_spreadsheets(
        &self,
        identity: &str,
        max_results: u32,
    ) -> Result<Vec<DriveFile>> {
        let query = "mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false";
        self.search_drive_files(identity, query, max_results).await
    }

    /// Read a range of values.
    pub async fn get_sheet_values(
        &self,
        identity: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueRange> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            SHEETS_BASE_URL,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        self.get_json(identity, &url).await
    }

    /// Overwrite a range of values.
    pub async fn update_sheet_values(
        &self,
        identity: &str,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateResult> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}?valueInputOption=USER_ENTERED",
            SHEETS_BASE_URL,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        self.put_json(identity, &url, &json!({ "values": values }))
            .await
    }

    /// Append rows after the last row of a range.
    pub async fn append_sheet_values(
        &self,
        identity: &str,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateResult> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            SHEETS_BASE_URL,
            spreadsheet_id,
            urlencoding::encode(range)
        );
        self.post_json(identity, &url, &json!({ "values": values }))
            .await
    }

    /// Create an empty spreadsheet.
    pub async fn create_spreadsheet(&self, identity: &str, title: &str) -> Result<Spreadsheet> {
        let url = format!("{}/spreadsheets", SHEETS_BASE_URL);
        self.post_json(identity, &url, &json!({ "properties": { "title": title } }))
            .await
    }
}

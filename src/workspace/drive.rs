//! Drive API operations.

use serde::Deserialize;
use serde_json::json;

use crate::config::endpoints::DRIVE_BASE_URL;
use crate::error::{ApiError, Result, WorkspaceMcpError};
use crate::workspace::client::WorkspaceClient;

const FILE_FIELDS: &str = "id,name,mimeType,modifiedTime,size,webViewLink";

/// A Drive file or folder
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub modified_time: Option<String>,

    #[serde(default)]
    pub size: Option<String>,

    #[serde(default)]
    pub web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Downloaded or exported file content
#[derive(Debug)]
pub struct FileContent {
    pub file: DriveFile,
    pub text: String,
}

impl WorkspaceClient {
    /// Search files with a Drive query expression.
    pub async fn search_drive_files(
        &self,
        identity: &str,
        query: &str,
        page_size: u32,
    ) -> Result<Vec<DriveFile>> {
        let url = format!(
            "{}/files?q={}&pageSize={}&fields=files({})",
            DRIVE_BASE_URL,
            urlencoding::encode(query),
            page_size,
            FILE_FIELDS
        );
        let list: FileList = self.get_json(identity, &url).await?;
        Ok(list.files)
    }

    /// List the children of a folder (`root` for the Drive root).
    pub async fn list_drive_items(
        &self,
        identity: &str,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<DriveFile>> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        self.search_drive_files(identity, &query, page_size).await
    }

    /// Fetch file content as text. Google-native files are exported to a
    /// text format; regular files are downloaded directly.
    pub async fn get_drive_file_content(
        &self,
        identity: &str,
        file_id: &str,
    ) -> Result<FileContent> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_BASE_URL, file_id, FILE_FIELDS
        );
        let file: DriveFile = self.get_json(identity, &url).await?;

        let mime_type = file.mime_type.clone().unwrap_or_default();
        let text = if mime_type.starts_with("application/vnd.google-apps.") {
            let export_mime = export_mime_type(&mime_type).ok_or_else(|| {
                WorkspaceMcpError::Api(ApiError::Unsupported {
                    message: format!("no text export for {}", mime_type),
                })
            })?;
            let url = format!(
                "{}/files/{}/export?mimeType={}",
                DRIVE_BASE_URL,
                file_id,
                urlencoding::encode(export_mime)
            );
            self.get_text(identity, &url).await?
        } else {
            let url = format!("{}/files/{}?alt=media", DRIVE_BASE_URL, file_id);
            self.get_text(identity, &url).await?
        };

        Ok(FileContent { file, text })
    }

    /// Create a folder, optionally under a parent.
    pub async fn create_drive_folder(
        &self,
        identity: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        let mut body = json!({
            "name": name,
            "mimeType": "application/vnd.google-apps.folder",
        });
        if let Some(parent) = parent_id {
            body["parents"] = json!([parent]);
        }
        let url = format!("{}/files?fields={}", DRIVE_BASE_URL, FILE_FIELDS);
        self.post_json(identity, &url, &body).await
    }

    /// Move a file to the trash.
    pub async fn trash_drive_file(&self, identity: &str, file_id: &str) -> Result<DriveFile> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_BASE_URL, file_id, FILE_FIELDS
        );
        self.patch_json(identity, &url, &json!({ "trashed": true }))
            .await
    }
}

/// Text export format for Google-native MIME types.
fn export_mime_type(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.google-apps.document" => Some("text/plain"),
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        "application/vnd.google-apps.presentation" => Some("text/plain"),
        "application/vnd.google-apps.script" => Some("application/vnd.google-apps.script+json"),
        _ => None,
    }
}

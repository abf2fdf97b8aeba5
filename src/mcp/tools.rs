//! MCP tool definitions and handlers.
//!
//! Every Workspace tool takes `user_google_email` and resolves it to a
//! credential before calling the API; the two auth tools drive the
//! interactive authorization handshake.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{clasp, AuthStrategy, CredentialStore, FlowCoordinator, FlowStart};
use crate::error::Result;
use crate::mcp::types::{CallToolResult, Tool};
use crate::workspace::calendar::CreateEventParams;
use crate::workspace::gmail::SendEmailParams;
use crate::workspace::WorkspaceClient;

/// Tool handler
pub struct ToolHandler {
    workspace: Arc<WorkspaceClient>,

    /// Absent when no OAuth keys file is configured (clasp-only setups)
    flows: Option<Arc<FlowCoordinator>>,

    store: Arc<CredentialStore>,
    clasprc_path: PathBuf,
    oauth_keys_path: PathBuf,
}

impl ToolHandler {
    pub fn new(
        workspace: Arc<WorkspaceClient>,
        flows: Option<Arc<FlowCoordinator>>,
        store: Arc<CredentialStore>,
        clasprc_path: PathBuf,
        oauth_keys_path: PathBuf,
    ) -> Self {
        Self {
            workspace,
            flows,
            store,
            clasprc_path,
            oauth_keys_path,
        }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            // Auth
            tool_def(
                "start_google_auth",
                "Start the Google OAuth authorization flow and return the authorization URL",
                start_auth_schema(),
            ),
            tool_def(
                "complete_google_auth",
                "Complete the Google OAuth flow with the redirect URL from the browser",
                complete_auth_schema(),
            ),
            // Gmail
            tool_def(
                "search_gmail_messages",
                "Search for Gmail messages matching a query",
                search_gmail_schema(),
            ),
            tool_def(
                "get_gmail_message",
                "Get a specific Gmail message by ID",
                get_gmail_message_schema(),
            ),
            tool_def(
                "send_gmail_message",
                "Send a Gmail message",
                send_gmail_schema(),
            ),
            tool_def(
                "list_gmail_labels",
                "List all Gmail labels for the user",
                identity_only_schema(),
            ),
            tool_def(
                "modify_gmail_labels",
                "Add or remove labels on a Gmail message",
                modify_labels_schema(),
            ),
            // Drive
            tool_def(
                "search_drive_files",
                "Search for files and folders in Google Drive",
                search_drive_schema(),
            ),
            tool_def(
                "list_drive_items",
                "List the contents of a Drive folder",
                list_drive_schema(),
            ),
            tool_def(
                "get_drive_file_content",
                "Fetch the content of a Drive file as text",
                file_id_schema(),
            ),
            tool_def(
                "create_drive_folder",
                "Create a folder in Google Drive",
                create_folder_schema(),
            ),
            tool_def(
                "trash_drive_file",
                "Move a Drive file to the trash",
                file_id_schema(),
            ),
            // Sheets
            tool_def(
                "list_spreadsheets",
                "List spreadsheets accessible to the user",
                list_spreadsheets_schema(),
            ),
            tool_def(
                "get_sheet_values",
                "Read a range of values from a spreadsheet",
                sheet_range_schema(false),
            ),
            tool_def(
                "update_sheet_values",
                "Overwrite a range of values in a spreadsheet",
                sheet_range_schema(true),
            ),
            tool_def(
                "append_sheet_values",
                "Append rows after a range in a spreadsheet",
                sheet_range_schema(true),
            ),
            tool_def(
                "create_spreadsheet",
                "Create a new spreadsheet",
                create_spreadsheet_schema(),
            ),
            // Calendar
            tool_def(
                "list_calendars",
                "List calendars the user can access",
                identity_only_schema(),
            ),
            tool_def(
                "get_calendar_events",
                "List events on a calendar",
                get_events_schema(),
            ),
            tool_def(
                "create_calendar_event",
                "Create a calendar event",
                create_event_schema(),
            ),
            tool_def(
                "delete_calendar_event",
                "Delete a calendar event",
                delete_event_schema(),
            ),
            // Docs
            tool_def(
                "get_doc_content",
                "Fetch a Google Doc as plain text",
                doc_id_schema(),
            ),
            tool_def("create_doc", "Create a new Google Doc", create_doc_schema()),
            tool_def(
                "append_doc_text",
                "Append text to the end of a Google Doc",
                append_doc_schema(),
            ),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        match name {
            "start_google_auth" => self.handle_start_auth(args).await,
            "complete_google_auth" => self.handle_complete_auth(args).await,
            "search_gmail_messages" => self.handle_search_gmail(args).await,
            "get_gmail_message" => self.handle_get_gmail_message(args).await,
            "send_gmail_message" => self.handle_send_gmail(args).await,
            "list_gmail_labels" => self.handle_list_labels(args).await,
            "modify_gmail_labels" => self.handle_modify_labels(args).await,
            "search_drive_files" => self.handle_search_drive(args).await,
            "list_drive_items" => self.handle_list_drive(args).await,
            "get_drive_file_content" => self.handle_drive_content(args).await,
            "create_drive_folder" => self.handle_create_folder(args).await,
            "trash_drive_file" => self.handle_trash_file(args).await,
            "list_spreadsheets" => self.handle_list_spreadsheets(args).await,
            "get_sheet_values" => self.handle_get_values(args).await,
            "update_sheet_values" => self.handle_update_values(args).await,
            "append_sheet_values" => self.handle_append_values(args).await,
            "create_spreadsheet" => self.handle_create_spreadsheet(args).await,
            "list_calendars" => self.handle_list_calendars(args).await,
            "get_calendar_events" => self.handle_get_events(args).await,
            "create_calendar_event" => self.handle_create_event(args).await,
            "delete_calendar_event" => self.handle_delete_event(args).await,
            "get_doc_content" => self.handle_get_doc(args).await,
            "create_doc" => self.handle_create_doc(args).await,
            "append_doc_text" => self.handle_append_doc(args).await,
            _ => CallToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    // ==================== Auth Tools ====================

    async fn handle_start_auth(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: Option<String>,
            strategy: Option<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let requested = match args.strategy.as_deref() {
            None => None,
            Some(name) => match AuthStrategy::parse(name) {
                Some(strategy) => Some(strategy),
                None => {
                    return CallToolResult::error(format!(
                        "Unknown strategy '{}'. Use clasp, oauth2, or oauth2.1",
                        name
                    ))
                }
            },
        };

        // clasp needs no browser handshake at all. An explicit OAuth
        // request still runs the browser flow even when a session exists,
        // so a different account can be authorized.
        let clasp_present = clasp::session_available(&self.clasprc_path);
        match requested {
            Some(AuthStrategy::ClaspSession) => {
                return if clasp_present {
                    CallToolResult::text(
                        "A clasp session was detected. No browser authorization is needed; \
                         Workspace tools will use it directly.",
                    )
                } else {
                    CallToolResult::error(format!(
                        "No clasp session found at {}. Run 'clasp login' first or choose \
                         the oauth2 strategy",
                        self.clasprc_path.display()
                    ))
                };
            }
            None if clasp_present => {
                return CallToolResult::text(
                    "A clasp session was detected. No browser authorization is needed; \
                     Workspace tools will use it directly. To authorize a different \
                     account, call start_google_auth with an explicit strategy.",
                );
            }
            _ => {}
        }
        let strategy = requested.unwrap_or(AuthStrategy::OAuth2);

        let Some(flows) = &self.flows else {
            return CallToolResult::error(format!(
                "OAuth is not configured: place your client keys at {} (or set \
                 WORKSPACE_MCP_OAUTH_PATH) and restart the server",
                self.oauth_keys_path.display()
            ));
        };

        match flows.begin(strategy, args.user_google_email) {
            Ok(FlowStart::Authorization { url, .. }) => CallToolResult::text(format!(
                "Google OAuth Authentication\n\
                 ============================\n\n\
                 1. Open this URL in your browser:\n\n   {}\n\n\
                 2. Sign in and authorize the application\n\n\
                 3. You will be redirected to http://localhost (the page will not load)\n\n\
                 4. Copy the FULL URL from your browser address bar\n   \
                 (looks like: http://localhost/?code=4/0A...&state=...)\n\n\
                 5. Call complete_google_auth with the redirect URL",
                url
            )),
            Ok(FlowStart::LocalSession) => CallToolResult::text(
                "A clasp session was detected. No browser authorization is needed.",
            ),
            Err(e) => CallToolResult::error(e.to_string()),
        }
    }

    async fn handle_complete_auth(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            redirect_url: String,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let Some(flows) = &self.flows else {
            return CallToolResult::error(
                "OAuth is not configured; run start_google_auth for setup instructions",
            );
        };

        let completed = match flows.complete(&args.redirect_url).await {
            Ok(completed) => completed,
            Err(e) => return CallToolResult::error(e.to_string()),
        };

        let identity = completed
            .identity
            .clone()
            .unwrap_or_else(|| "default".to_string());
        if let Err(e) = self.store.save(&identity, completed.credential).await {
            return CallToolResult::error(e.to_string());
        }

        let label = completed.identity.as_deref().unwrap_or("authenticated user");
        CallToolResult::text(format!(
            "Authentication successful for {}.\n\nYou can now use all Workspace tools.",
            label
        ))
    }

    // ==================== Gmail Tools ====================

    async fn handle_search_gmail(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            #[serde(default)]
            query: String,
            max_results: Option<u32>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .search_gmail_messages(
                &args.user_google_email,
                &args.query,
                args.max_results.unwrap_or(10),
            )
            .await;
        respond(result.map(|messages| {
            if messages.is_empty() {
                return "No messages matched the query.".to_string();
            }
            let mut out = format!("Found {} message(s):\n", messages.len());
            for message in &messages {
                out.push_str(&format!(
                    "\nID: {}\n  From: {}\n  Subject: {}\n  Date: {}\n",
                    message.id,
                    message.header("From").unwrap_or("unknown"),
                    message.header("Subject").unwrap_or("(no subject)"),
                    message.header("Date").unwrap_or("unknown"),
                ));
            }
            out
        }))
    }

    async fn handle_get_gmail_message(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            message_id: String,
            format: Option<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .get_gmail_message(
                &args.user_google_email,
                &args.message_id,
                args.format.as_deref().unwrap_or("full"),
            )
            .await;
        respond(result.map(|message| {
            format!(
                "From: {}\nTo: {}\nSubject: {}\nDate: {}\nLabels: {}\n\n{}",
                message.header("From").unwrap_or("unknown"),
                message.header("To").unwrap_or("unknown"),
                message.header("Subject").unwrap_or("(no subject)"),
                message.header("Date").unwrap_or("unknown"),
                message.label_ids.join(", "),
                message.body_text(),
            )
        }))
    }

    async fn handle_send_gmail(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            to: String,
            subject: String,
            body: String,
            cc: Option<String>,
            bcc: Option<String>,
            #[serde(default)]
            html: bool,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let params = SendEmailParams {
            to: args.to,
            cc: args.cc,
            bcc: args.bcc,
            subject: args.subject,
            body: args.body,
            html: args.html,
        };
        let result = self
            .workspace
            .send_gmail_message(&args.user_google_email, params)
            .await;
        respond(result.map(|message| format!("Message sent. ID: {}", message.id)))
    }

    async fn handle_list_labels(&self, args: Value) -> CallToolResult {
        let args: IdentityArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .list_gmail_labels(&args.user_google_email)
            .await;
        respond(result.map(|labels| {
            let mut out = format!("{} label(s):\n", labels.len());
            for label in &labels {
                out.push_str(&format!(
                    "  {} (ID: {}{})\n",
                    label.name,
                    label.id,
                    label
                        .label_type
                        .as_deref()
                        .map(|t| format!(", {}", t))
                        .unwrap_or_default(),
                ));
            }
            out
        }))
    }

    async fn handle_modify_labels(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            message_id: String,
            #[serde(default)]
            add_labels: Vec<String>,
            #[serde(default)]
            remove_labels: Vec<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        if args.add_labels.is_empty() && args.remove_labels.is_empty() {
            return CallToolResult::error("Provide add_labels and/or remove_labels");
        }

        let result = self
            .workspace
            .modify_gmail_labels(
                &args.user_google_email,
                &args.message_id,
                args.add_labels,
                args.remove_labels,
            )
            .await;
        respond(result.map(|message| {
            format!(
                "Labels updated for message {}. Current labels: {}",
                message.id,
                message.label_ids.join(", "),
            )
        }))
    }

    // ==================== Drive Tools ====================

    async fn handle_search_drive(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            query: String,
            page_size: Option<u32>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .search_drive_files(
                &args.user_google_email,
                &args.query,
                args.page_size.unwrap_or(10),
            )
            .await;
        respond(result.map(format_drive_files))
    }

    async fn handle_list_drive(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            folder_id: Option<String>,
            page_size: Option<u32>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .list_drive_items(
                &args.user_google_email,
                args.folder_id.as_deref().unwrap_or("root"),
                args.page_size.unwrap_or(25),
            )
            .await;
        respond(result.map(format_drive_files))
    }

    async fn handle_drive_content(&self, args: Value) -> CallToolResult {
        let args: FileIdArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .get_drive_file_content(&args.user_google_email, &args.file_id)
            .await;
        respond(result.map(|content| {
            format!(
                "File: {} ({})\n\n{}",
                content.file.name,
                content.file.mime_type.as_deref().unwrap_or("unknown type"),
                content.text,
            )
        }))
    }

    async fn handle_create_folder(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            name: String,
            parent_id: Option<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .create_drive_folder(
                &args.user_google_email,
                &args.name,
                args.parent_id.as_deref(),
            )
            .await;
        respond(result.map(|folder| format!("Folder created: {} (ID: {})", folder.name, folder.id)))
    }

    async fn handle_trash_file(&self, args: Value) -> CallToolResult {
        let args: FileIdArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .trash_drive_file(&args.user_google_email, &args.file_id)
            .await;
        respond(result.map(|file| format!("Moved to trash: {} (ID: {})", file.name, file.id)))
    }

    // ==================== Sheets Tools ====================

    async fn handle_list_spreadsheets(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            max_results: Option<u32>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .list_spreadsheets(&args.user_google_email, args.max_results.unwrap_or(25))
            .await;
        respond(result.map(format_drive_files))
    }

    async fn handle_get_values(&self, args: Value) -> CallToolResult {
        let args: SheetRangeArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .get_sheet_values(&args.user_google_email, &args.spreadsheet_id, &args.range)
            .await;
        respond(result.map(|values| {
            if values.values.is_empty() {
                return "The range is empty.".to_string();
            }
            let mut out = format!("{}:\n", values.range.as_deref().unwrap_or(&args.range));
            for row in &values.values {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                out.push_str(&cells.join("\t"));
                out.push('\n');
            }
            out
        }))
    }

    async fn handle_update_values(&self, args: Value) -> CallToolResult {
        let args: SheetValuesArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .update_sheet_values(
                &args.user_google_email,
                &args.spreadsheet_id,
                &args.range,
                args.values,
            )
            .await;
        respond(result.map(|update| format!("Updated {} cell(s).", update.cell_count())))
    }

    async fn handle_append_values(&self, args: Value) -> CallToolResult {
        let args: SheetValuesArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .append_sheet_values(
                &args.user_google_email,
                &args.spreadsheet_id,
                &args.range,
                args.values,
            )
            .await;
        respond(result.map(|update| format!("Appended {} cell(s).", update.cell_count())))
    }

    async fn handle_create_spreadsheet(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            title: String,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .create_spreadsheet(&args.user_google_email, &args.title)
            .await;
        respond(result.map(|sheet| {
            format!(
                "Spreadsheet created. ID: {}{}",
                sheet.spreadsheet_id,
                sheet
                    .spreadsheet_url
                    .map(|url| format!("\nURL: {}", url))
                    .unwrap_or_default(),
            )
        }))
    }

    // ==================== Calendar Tools ====================

    async fn handle_list_calendars(&self, args: Value) -> CallToolResult {
        let args: IdentityArgs = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self.workspace.list_calendars(&args.user_google_email).await;
        respond(result.map(|calendars| {
            let mut out = format!("{} calendar(s):\n", calendars.len());
            for calendar in &calendars {
                out.push_str(&format!(
                    "  {} (ID: {}){}\n",
                    calendar.summary.as_deref().unwrap_or("(unnamed)"),
                    calendar.id,
                    if calendar.primary { " [primary]" } else { "" },
                ));
            }
            out
        }))
    }

    async fn handle_get_events(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            calendar_id: Option<String>,
            time_min: Option<String>,
            time_max: Option<String>,
            max_results: Option<u32>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .get_calendar_events(
                &args.user_google_email,
                args.calendar_id.as_deref().unwrap_or("primary"),
                args.time_min.as_deref(),
                args.time_max.as_deref(),
                args.max_results.unwrap_or(25),
            )
            .await;
        respond(result.map(|events| {
            if events.is_empty() {
                return "No events in the requested window.".to_string();
            }
            let mut out = format!("{} event(s):\n", events.len());
            for event in &events {
                out.push_str(&format!(
                    "  {} | {} -> {} (ID: {})\n",
                    event.summary.as_deref().unwrap_or("(no title)"),
                    event.start.as_ref().map(|t| t.display()).unwrap_or("?"),
                    event.end.as_ref().map(|t| t.display()).unwrap_or("?"),
                    event.id,
                ));
            }
            out
        }))
    }

    async fn handle_create_event(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            calendar_id: Option<String>,
            summary: String,
            description: Option<String>,
            start: String,
            end: String,
            #[serde(default)]
            attendees: Vec<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let params = CreateEventParams {
            summary: args.summary,
            description: args.description,
            start: args.start,
            end: args.end,
            attendees: args.attendees,
        };
        let result = self
            .workspace
            .create_calendar_event(
                &args.user_google_email,
                args.calendar_id.as_deref().unwrap_or("primary"),
                params,
            )
            .await;
        respond(result.map(|event| {
            format!(
                "Event created: {} (ID: {}){}",
                event.summary.as_deref().unwrap_or("(no title)"),
                event.id,
                event
                    .html_link
                    .map(|link| format!("\nLink: {}", link))
                    .unwrap_or_default(),
            )
        }))
    }

    async fn handle_delete_event(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            calendar_id: Option<String>,
            event_id: String,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .delete_calendar_event(
                &args.user_google_email,
                args.calendar_id.as_deref().unwrap_or("primary"),
                &args.event_id,
            )
            .await;
        respond(result.map(|_| format!("Event {} deleted.", args.event_id)))
    }

    // ==================== Docs Tools ====================

    async fn handle_get_doc(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            document_id: String,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .get_doc(&args.user_google_email, &args.document_id)
            .await;
        respond(result.map(|document| {
            format!(
                "{}\n\n{}",
                document.title.as_deref().unwrap_or("(untitled)"),
                document.body_text(),
            )
        }))
    }

    async fn handle_create_doc(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            title: String,
            content: Option<String>,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .create_doc(
                &args.user_google_email,
                &args.title,
                args.content.as_deref(),
            )
            .await;
        respond(result.map(|document| {
            format!(
                "Document created: {} (ID: {})",
                document.title.as_deref().unwrap_or(&args.title),
                document.document_id,
            )
        }))
    }

    async fn handle_append_doc(&self, args: Value) -> CallToolResult {
        #[derive(Deserialize)]
        struct Args {
            user_google_email: String,
            document_id: String,
            text: String,
        }
        let args: Args = match parse_args(args) {
            Ok(a) => a,
            Err(e) => return CallToolResult::error(e),
        };

        let result = self
            .workspace
            .append_doc_text(&args.user_google_email, &args.document_id, &args.text)
            .await;
        respond(result.map(|_| format!("Text appended to document {}.", args.document_id)))
    }
}

// ==================== Shared argument shapes ====================

#[derive(Deserialize)]
struct IdentityArgs {
    user_google_email: String,
}

#[derive(Deserialize)]
struct FileIdArgs {
    user_google_email: String,
    file_id: String,
}

#[derive(Deserialize)]
struct SheetRangeArgs {
    user_google_email: String,
    spreadsheet_id: String,
    range: String,
}

#[derive(Deserialize)]
struct SheetValuesArgs {
    user_google_email: String,
    spreadsheet_id: String,
    range: String,
    values: Vec<Vec<Value>>,
}

// ==================== Helpers ====================

fn parse_args<T: DeserializeOwned>(args: Value) -> std::result::Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))
}

fn respond(result: Result<String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::text(text),
        Err(e) => CallToolResult::error(e.to_string()),
    }
}

fn format_drive_files(files: Vec<crate::workspace::drive::DriveFile>) -> String {
    if files.is_empty() {
        return "No files found.".to_string();
    }
    let mut out = format!("{} item(s):\n", files.len());
    for file in &files {
        out.push_str(&format!(
            "  {} (ID: {}, Type: {}, Modified: {})\n",
            file.name,
            file.id,
            file.mime_type.as_deref().unwrap_or("unknown"),
            file.modified_time.as_deref().unwrap_or("unknown"),
        ));
    }
    out
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn tool_def(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

// ==================== Input schemas ====================

fn identity_property() -> Value {
    json!({
        "type": "string",
        "description": "The user's Google email address"
    })
}

fn identity_only_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "user_google_email": identity_property() },
        "required": ["user_google_email"]
    })
}

fn start_auth_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "strategy": {
                "type": "string",
                "enum": ["clasp", "oauth2", "oauth2.1"],
                "description": "Authentication strategy (default: oauth2)"
            }
        }
    })
}

fn complete_auth_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "redirect_url": {
                "type": "string",
                "description": "The full URL from the browser after authorization"
            }
        },
        "required": ["redirect_url"]
    })
}

fn search_gmail_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "query": { "type": "string", "description": "Gmail search query" },
            "max_results": { "type": "integer", "description": "Maximum messages to return (default: 10)" }
        },
        "required": ["user_google_email"]
    })
}

fn get_gmail_message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "message_id": { "type": "string" },
            "format": { "type": "string", "enum": ["full", "metadata", "minimal"] }
        },
        "required": ["user_google_email", "message_id"]
    })
}

fn send_gmail_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "to": { "type": "string", "description": "Recipient address(es), comma-separated" },
            "subject": { "type": "string" },
            "body": { "type": "string" },
            "cc": { "type": "string" },
            "bcc": { "type": "string" },
            "html": { "type": "boolean", "description": "Treat body as HTML" }
        },
        "required": ["user_google_email", "to", "subject", "body"]
    })
}

fn modify_labels_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "message_id": { "type": "string" },
            "add_labels": { "type": "array", "items": { "type": "string" } },
            "remove_labels": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["user_google_email", "message_id"]
    })
}

fn search_drive_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "query": { "type": "string", "description": "Drive query, e.g. name contains 'report'" },
            "page_size": { "type": "integer" }
        },
        "required": ["user_google_email", "query"]
    })
}

fn list_drive_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "folder_id": { "type": "string", "description": "Folder ID (default: root)" },
            "page_size": { "type": "integer" }
        },
        "required": ["user_google_email"]
    })
}

fn file_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "file_id": { "type": "string" }
        },
        "required": ["user_google_email", "file_id"]
    })
}

fn create_folder_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "name": { "type": "string" },
            "parent_id": { "type": "string" }
        },
        "required": ["user_google_email", "name"]
    })
}

fn list_spreadsheets_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "max_results": { "type": "integer" }
        },
        "required": ["user_google_email"]
    })
}

fn sheet_range_schema(with_values: bool) -> Value {
    let mut properties = json!({
        "user_google_email": identity_property(),
        "spreadsheet_id": { "type": "string" },
        "range": { "type": "string", "description": "A1 notation, e.g. Sheet1!A1:C10" }
    });
    let mut required = vec!["user_google_email", "spreadsheet_id", "range"];
    if with_values {
        properties["values"] = json!({
            "type": "array",
            "items": { "type": "array" },
            "description": "Rows of cell values"
        });
        required.push("values");
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn create_spreadsheet_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "title": { "type": "string" }
        },
        "required": ["user_google_email", "title"]
    })
}

fn get_events_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "calendar_id": { "type": "string", "description": "Calendar ID (default: primary)" },
            "time_min": { "type": "string", "description": "RFC 3339 lower bound" },
            "time_max": { "type": "string", "description": "RFC 3339 upper bound" },
            "max_results": { "type": "integer" }
        },
        "required": ["user_google_email"]
    })
}

fn create_event_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "calendar_id": { "type": "string" },
            "summary": { "type": "string" },
            "description": { "type": "string" },
            "start": { "type": "string", "description": "RFC 3339 timestamp, or YYYY-MM-DD for all-day" },
            "end": { "type": "string" },
            "attendees": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["user_google_email", "summary", "start", "end"]
    })
}

fn delete_event_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "calendar_id": { "type": "string" },
            "event_id": { "type": "string" }
        },
        "required": ["user_google_email", "event_id"]
    })
}

fn doc_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "document_id": { "type": "string" }
        },
        "required": ["user_google_email", "document_id"]
    })
}

fn create_doc_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "title": { "type": "string" },
            "content": { "type": "string", "description": "Initial document text" }
        },
        "required": ["user_google_email", "title"]
    })
}

fn append_doc_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_google_email": identity_property(),
            "document_id": { "type": "string" },
            "text": { "type": "string" }
        },
        "required": ["user_google_email", "document_id", "text"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_schema_is_an_object() {
        for schema in [
            start_auth_schema(),
            complete_auth_schema(),
            search_gmail_schema(),
            get_gmail_message_schema(),
            send_gmail_schema(),
            modify_labels_schema(),
            search_drive_schema(),
            list_drive_schema(),
            file_id_schema(),
            create_folder_schema(),
            list_spreadsheets_schema(),
            sheet_range_schema(false),
            sheet_range_schema(true),
            create_spreadsheet_schema(),
            get_events_schema(),
            create_event_schema(),
            delete_event_schema(),
            doc_id_schema(),
            create_doc_schema(),
            append_doc_schema(),
            identity_only_schema(),
        ] {
            assert_eq!(schema["type"], "object");
        }
    }

    #[test]
    fn test_sheet_values_schema_requires_values() {
        let schema = sheet_range_schema(true);
        let required: Vec<String> =
            serde_json::from_value(schema["required"].clone()).unwrap();
        assert!(required.contains(&"values".to_string()));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!("text")), "text");
        assert_eq!(cell_to_string(&json!(42)), "42");
        assert_eq!(cell_to_string(&json!(true)), "true");
    }
}

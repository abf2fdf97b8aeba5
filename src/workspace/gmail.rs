//! Gmail API operations.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::endpoints::{GMAIL_BASE_URL, USER_ID};
use crate::error::Result;
use crate::workspace::client::WorkspaceClient;

/// A Gmail message as returned by the API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default)]
    pub label_ids: Vec<String>,

    #[serde(default)]
    pub snippet: Option<String>,

    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A MIME part of a message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub body: Option<MessagePartBody>,

    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
}

/// A Gmail label
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,

    #[serde(default, rename = "type")]
    pub label_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

/// Outgoing email parameters
#[derive(Debug, Clone, Default)]
pub struct SendEmailParams {
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    raw: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyMessageRequest {
    add_label_ids: Vec<String>,
    remove_label_ids: Vec<String>,
}

fn messages_url() -> String {
    format!("{}/users/{}/messages", GMAIL_BASE_URL, USER_ID)
}

impl WorkspaceClient {
    /// Search for messages, returning each with its metadata headers.
    pub async fn search_gmail_messages(
        &self,
        identity: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<Message>> {
        let url = format!(
            "{}?q={}&maxResults={}",
            messages_url(),
            urlencoding::encode(query),
            max_results
        );
        let list: MessageList = self.get_json(identity, &url).await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for message_ref in list.messages {
            let url = format!(
                "{}/{}?format=metadata&metadataHeaders=From&metadataHeaders=Subject&metadataHeaders=Date",
                messages_url(),
                message_ref.id
            );
            messages.push(self.get_json(identity, &url).await?);
        }
        Ok(messages)
    }

    /// Fetch one message. `format` is "full", "metadata", or "minimal".
    pub async fn get_gmail_message(
        &self,
        identity: &str,
        message_id: &str,
        format: &str,
    ) -> Result<Message> {
        let url = format!("{}/{}?format={}", messages_url(), message_id, format);
        self.get_json(identity, &url).await
    }

    /// Send an email, returning the created message.
    pub async fn send_gmail_message(
        &self,
        identity: &str,
        params: SendEmailParams,
    ) -> Result<Message> {
        let raw = build_rfc822_message(&params);
        let request = SendMessageRequest {
            raw: URL_SAFE_NO_PAD.encode(raw.as_bytes()),
        };
        let url = format!("{}/send", messages_url());
        self.post_json(identity, &url, &request).await
    }

    /// List all labels for the account.
    pub async fn list_gmail_labels(&self, identity: &str) -> Result<Vec<Label>> {
        let url = format!("{}/users/{}/labels", GMAIL_BASE_URL, USER_ID);
        let list: LabelList = self.get_json(identity, &url).await?;
        Ok(list.labels)
    }

    /// Add and remove labels on a message.
    pub async fn modify_gmail_labels(
        &self,
        identity: &str,
        message_id: &str,
        add_labels: Vec<String>,
        remove_labels: Vec<String>,
    ) -> Result<Message> {
        let url = format!("{}/{}/modify", messages_url(), message_id);
        let request = ModifyMessageRequest {
            add_label_ids: add_labels,
            remove_label_ids: remove_labels,
        };
        self.post_json(identity, &url, &request).await
    }
}

impl Message {
    /// First value of a header on the top-level payload.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }

    /// Decoded body text: text/plain preferred, text/html as fallback.
    pub fn body_text(&self) -> String {
        let Some(payload) = &self.payload else {
            return String::new();
        };
        let mut plain = String::new();
        let mut html = String::new();
        collect_text(payload, &mut plain, &mut html);
        if plain.is_empty() {
            html
        } else {
            plain
        }
    }
}

/// Walk the MIME tree collecting decoded text parts.
fn collect_text(part: &MessagePart, plain: &mut String, html: &mut String) {
    let mime_type = part.mime_type.as_deref().unwrap_or("");
    if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
        if mime_type.starts_with("text/") {
            match decode_base64url_string(data) {
                Ok(decoded) => {
                    if mime_type == "text/plain" {
                        plain.push_str(&decoded);
                    } else if mime_type == "text/html" {
                        html.push_str(&decoded);
                    }
                }
                Err(e) => tracing::debug!("failed to decode {} part: {}", mime_type, e),
            }
        }
    }
    for nested in &part.parts {
        collect_text(nested, plain, html);
    }
}

/// Decode base64url data from the Gmail API, tolerating padded variants.
fn decode_base64url_string(data: &str) -> std::result::Result<String, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .or_else(|_| STANDARD.decode(data))
        .map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Encode text for a MIME header (RFC 2047) when it is not plain ASCII.
fn encode_mime_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n') {
        return text.to_string();
    }
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Assemble a raw RFC 822 message for the Gmail send endpoint.
fn build_rfc822_message(params: &SendEmailParams) -> String {
    let mut message = String::new();
    message.push_str(&format!("To: {}\r\n", params.to));
    if let Some(cc) = params.cc.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!("Cc: {}\r\n", cc));
    }
    if let Some(bcc) = params.bcc.as_deref().filter(|s| !s.is_empty()) {
        message.push_str(&format!("Bcc: {}\r\n", bcc));
    }
    message.push_str(&format!(
        "Subject: {}\r\n",
        encode_mime_header(&params.subject)
    ));
    message.push_str("MIME-Version: 1.0\r\n");
    let content_type = if params.html {
        "text/html"
    } else {
        "text/plain"
    };
    message.push_str(&format!(
        "Content-Type: {}; charset=\"UTF-8\"\r\n\r\n",
        content_type
    ));
    message.push_str(&params.body);
    message
}

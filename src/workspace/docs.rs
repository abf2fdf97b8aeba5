//! Docs API operations.

use serde::Deserialize;
use serde_json::json;

use crate::config::endpoints::DOCS_BASE_URL;
use crate::error::Result;
use crate::workspace::client::WorkspaceClient;

/// A Google Doc
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub document_id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub body: Option<DocBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocBody {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuralElement {
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub content: Option<String>,
}

impl Document {
    /// Plain text of the document body.
    pub fn body_text(&self) -> String {
        let Some(body) = &self.body else {
            return String::new();
        };
        let mut text = String::new();
        for element in &body.content {
            let Some(paragraph) = &element.paragraph else {
                continue;
            };
            for piece in &paragraph.elements {
                if let Some(content) = piece.text_run.as_ref().and_then(|r| r.content.as_deref()) {
                    text.push_str(content);
                }
            }
        }
        text
    }
}

impl WorkspaceClient {
    /// Fetch a document with its body content.
    pub async fn get_doc(&self, identity: &str, document_id: &str) -> Result<Document> {
        let url = format!("{}/documents/{}", DOCS_BASE_URL, document_id);
        self.get_json(identity, &url).await
    }

    /// Create a document, optionally seeding it with text.
    pub async fn create_doc(
        &self,
        identity: &str,
        title: &str,
        content: Option<&str>,
    ) -> Result<Document> {
        let url = format!("{}/documents", DOCS_BASE_URL);
        let document: Document = self
            .post_json(identity, &url, &json!({ "title": title }))
            .await?;

        if let Some(content) = content.filter(|c| !c.is_empty()) {
            self.append_doc_text(identity, &document.document_id, content)
                .await?;
        }
        Ok(document)
    }

    /// Append text at the end of a document.
    pub async fn append_doc_text(
        &self,
        identity: &str,
        document_id: &str,
        text: &str,
    ) -> Result<()> {
        let url = format!("{}/documents/{}:batchUpdate", DOCS_BASE_URL, document_id);
        let body = json!({
            "requests": [{
                "insertText": {
                    "text": text,
                    "endOfSegmentLocation": {}
                }
            }]
        });
        let _: serde_json::Value = self.post_json(identity, &url, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_extraction() {
        let json = serde_json::json!({
            "documentId": "d1",
            "title": "Notes",
            "body": {
                "content": [
                    { "sectionBreak": {} },
                    { "paragraph": { "elements": [
                        { "textRun": { "content": "Hello " } },
                        { "textRun": { "content": "world\n" } }
                    ] } },
                    { "paragraph": { "elements": [
                        { "textRun": { "content": "Second line\n" } }
                    ] } }
                ]
            }
        });
        let document: Document = serde_json::from_value(json).unwrap();
        assert_eq!(document.body_text(), "Hello world\nSecond line\n");
    }

    #[test]
    fn test_body_text_empty_document() {
        let document: Document =
            serde_json::from_str(r#"{"documentId": "d1"}"#).unwrap();
        assert_eq!(document.body_text(), "");
    }
}

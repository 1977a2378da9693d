//! MIME-driven text extraction for downloaded document bytes.

use tracing::debug;

use crate::error::{CoreError, CoreResult};

pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    /// Extract plain text from raw bytes according to the declared MIME type.
    /// PDF and DOCX are supported; `text/*` falls back to lossy UTF-8.
    pub fn extract_text(mime_type: &str, bytes: &[u8]) -> CoreResult<String> {
        let normalized = mime_type
            .split(';')
            .next()
            .unwrap_or(mime_type)
            .trim()
            .to_lowercase();

        match normalized.as_str() {
            "application/pdf" => Self::extract_pdf(bytes),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/msword" => Self::extract_docx(bytes),
            mime if mime.starts_with("text/") || mime == "application/json" => {
                Ok(String::from_utf8_lossy(bytes).to_string())
            }
            other => Err(CoreError::validation(format!(
                "Unsupported MIME type for text extraction: {other}"
            ))),
        }
    }

    fn extract_pdf(bytes: &[u8]) -> CoreResult<String> {
        use lopdf::Document;

        let doc = Document::load_mem(bytes)
            .map_err(|e| CoreError::validation(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc.get_pages().len();
        let mut content = String::new();

        for page_num in 1..=page_count {
            if let Ok(text) = doc.extract_text(&[page_num as u32]) {
                content.push_str(&text);
                content.push('\n');
            }
        }

        debug!(pages = page_count, chars = content.len(), "extracted pdf");
        Ok(content)
    }

    fn extract_docx(bytes: &[u8]) -> CoreResult<String> {
        use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};

        let docx = read_docx(bytes)
            .map_err(|e| CoreError::validation(format!("Failed to parse DOCX: {e}")))?;

        let mut content = String::new();
        for child in docx.document.children {
            if let DocumentChild::Paragraph(paragraph) = child {
                for child in paragraph.children {
                    if let ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let RunChild::Text(text) = child {
                                content.push_str(&text.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }
}

//! PDF validation, staging and text extraction.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::core::errors::RagError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_SIGNATURE: &[u8] = b"%PDF-";
/// Readers tolerate leading bytes before the header up to this offset.
const SIGNATURE_WINDOW: usize = 1024;

/// Rejects anything that is not a PDF before it is written or parsed.
pub fn ensure_pdf(content_type: Option<&str>, bytes: &[u8]) -> Result<(), RagError> {
    let declared = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase());
    if declared.as_deref() != Some(PDF_CONTENT_TYPE) {
        return Err(RagError::UnsupportedFormat(format!(
            "expected {PDF_CONTENT_TYPE}, got {}",
            content_type.unwrap_or("no content type")
        )));
    }
    let head = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    if !head
        .windows(PDF_SIGNATURE.len())
        .any(|window| window == PDF_SIGNATURE)
    {
        return Err(RagError::UnsupportedFormat(
            "file has no PDF signature in its first 1024 bytes".to_string(),
        ));
    }
    Ok(())
}

/// Uploaded PDF written to the upload directory. The file is deleted when
/// this value drops, whether ingestion succeeded or not.
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn write(upload_dir: &Path, bytes: &[u8]) -> Result<Self, RagError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".pdf")
            .tempfile_in(upload_dir)
            .map_err(|err| RagError::Ingestion(format!("failed to stage upload: {err}")))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|err| RagError::Ingestion(format!("failed to stage upload: {err}")))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Clone)]
pub struct PdfText {
    /// `(page number, normalized text)` for pages that produced text.
    pub pages: Vec<(u32, String)>,
    pub page_count: usize,
}

impl PdfText {
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|(_, text)| text.chars().count()).sum()
    }
}

/// Extracts the text of every page. Pages that fail to decode are skipped
/// with a warning; a document with no text at all is rejected.
pub fn extract_pages(path: &Path) -> Result<PdfText, RagError> {
    let document = lopdf::Document::load(path)
        .map_err(|err| RagError::Ingestion(format!("failed to parse PDF: {err}")))?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let page_count = page_numbers.len();

    let mut pages = Vec::new();
    for number in page_numbers {
        match document.extract_text(&[number]) {
            Ok(raw) => {
                let text = normalize_whitespace(&raw);
                if !text.is_empty() {
                    pages.push((number, text));
                }
            }
            Err(err) => {
                tracing::warn!(page = number, "skipping unreadable PDF page: {err}");
            }
        }
    }

    if pages.is_empty() {
        return Err(RagError::Validation(
            "PDF contains no extractable text".to_string(),
        ));
    }

    Ok(PdfText { pages, page_count })
}

/// Collapses runs of spaces inside each line and drops blank lines.
fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

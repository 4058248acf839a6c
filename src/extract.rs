//! Content-sniffing text extraction for uploaded documents.
//!
//! The content type is detected from the file's leading bytes, never from the
//! filename, so a renamed upload cannot bypass validation. Supported formats:
//! plain text (lossy UTF-8 decode), PDF (all pages in order), and DOCX
//! (non-empty paragraphs joined with newlines).

use std::io::Read;
use std::path::Path;

use crate::error::RetrievalError;

/// How many leading bytes the plain-text heuristic inspects.
const TEXT_SNIFF_BYTES: usize = 8192;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Content type detected from a file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedType {
    PlainText,
    Pdf,
    Docx,
}

/// Detect the content type of `bytes`, or `None` when unsupported.
///
/// PDF detection tolerates a UTF-8 BOM and leading ASCII whitespace before
/// the `%PDF` marker. A ZIP container only counts as DOCX when it carries
/// `word/document.xml`. Anything else is plain text as long as the sniffed
/// head contains no NUL byte.
pub fn detect_type(bytes: &[u8]) -> Option<DetectedType> {
    let mut head = bytes;
    if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
        head = &head[3..];
    }
    while let Some((first, rest)) = head.split_first() {
        if first.is_ascii_whitespace() {
            head = rest;
        } else {
            break;
        }
    }

    if head.starts_with(b"%PDF") {
        return Some(DetectedType::Pdf);
    }

    if head.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        let is_docx = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map(|archive| archive.file_names().any(|n| n == "word/document.xml"))
            .unwrap_or(false);
        return if is_docx { Some(DetectedType::Docx) } else { None };
    }

    let sniff = &bytes[..bytes.len().min(TEXT_SNIFF_BYTES)];
    if sniff.contains(&0) {
        None
    } else {
        Some(DetectedType::PlainText)
    }
}

/// Read a file and extract its plain text.
///
/// Empty extracted text is a valid `Ok("")` result, not an error.
pub fn extract_file(path: &Path) -> Result<String, RetrievalError> {
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes)
}

/// Extract plain text from in-memory file content.
///
/// The result is stripped of leading and trailing whitespace.
pub fn extract_bytes(bytes: &[u8]) -> Result<String, RetrievalError> {
    let detected = detect_type(bytes).ok_or_else(|| {
        RetrievalError::UnsupportedType("content matches no supported format".to_string())
    })?;

    let text = match detected {
        DetectedType::PlainText => String::from_utf8_lossy(bytes).into_owned(),
        DetectedType::Pdf => extract_pdf(bytes)?,
        DetectedType::Docx => extract_docx(bytes)?,
    };

    Ok(text.trim().to_string())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, RetrievalError> {
    // pdf-extract walks every page in order; pages without text contribute nothing.
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| RetrievalError::Extract(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, RetrievalError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RetrievalError::Extract(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| RetrievalError::Extract(e.to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| RetrievalError::Extract(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(RetrievalError::Extract(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraphs(&doc_xml)
}

/// Collect `w:t` runs grouped by `w:p` paragraph, joining non-empty
/// paragraphs with newlines in document order.
///
/// Run text is taken verbatim — a paragraph split across runs keeps the
/// spacing carried inside each run. Trimming happens per paragraph only.
fn extract_paragraphs(xml: &[u8]) -> Result<String, RetrievalError> {
    let mut reader = quick_xml::Reader::from_reader(xml);

    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                paragraph.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = false;
                } else if e.local_name().as_ref() == b"p" {
                    if !paragraph.trim().is_empty() {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(paragraph.trim());
                    }
                    paragraph.clear();
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(RetrievalError::Extract(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_from_xml(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        docx_from_xml(&body)
    }

    /// Minimal single-page PDF with correct xref byte offsets so the parser
    /// accepts it.
    fn pdf_bytes(phrase: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
        out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", stream.len()).as_bytes());
        out.extend_from_slice(stream.as_bytes());
        out.extend_from_slice(b"endstream endobj\n");
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn detects_pdf_by_magic() {
        assert_eq!(detect_type(b"%PDF-1.4\nrest"), Some(DetectedType::Pdf));
        // BOM and leading whitespace before the marker are tolerated.
        assert_eq!(
            detect_type(b"\xEF\xBB\xBF  \n%PDF-1.7"),
            Some(DetectedType::Pdf)
        );
    }

    #[test]
    fn detects_docx_by_container_content() {
        let bytes = docx_bytes(&["hello"]);
        assert_eq!(detect_type(&bytes), Some(DetectedType::Docx));
    }

    #[test]
    fn plain_zip_is_not_supported() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("notes.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"hello").unwrap();
            zip.finish().unwrap();
        }
        assert_eq!(detect_type(&buf), None);
        assert!(matches!(
            extract_bytes(&buf),
            Err(RetrievalError::UnsupportedType(_))
        ));
    }

    #[test]
    fn binary_content_is_not_supported() {
        let bytes = [0u8, 159, 146, 150, 0, 1, 2];
        assert_eq!(detect_type(&bytes), None);
    }

    #[test]
    fn detection_ignores_filename_extension() {
        // "document.txt" content that is actually a DOCX container.
        let bytes = docx_bytes(&["spoofed upload"]);
        assert_eq!(extract_bytes(&bytes).unwrap(), "spoofed upload");
    }

    #[test]
    fn plain_text_decodes_lossily() {
        let mut bytes = b"caf".to_vec();
        bytes.push(0xE9); // lone latin-1 byte, not valid UTF-8
        bytes.extend_from_slice(b" menu");
        let text = extract_bytes(&bytes).unwrap();
        assert_eq!(text, "caf\u{FFFD} menu");
    }

    #[test]
    fn plain_text_is_trimmed() {
        assert_eq!(extract_bytes(b"  hello world \n").unwrap(), "hello world");
    }

    #[test]
    fn empty_text_is_ok_not_error() {
        assert_eq!(extract_bytes(b"   \n  ").unwrap(), "");
    }

    #[test]
    fn docx_paragraphs_joined_with_newlines() {
        let bytes = docx_bytes(&["First paragraph.", "", "Second paragraph."]);
        let text = extract_bytes(&bytes).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn docx_runs_keep_their_spacing() {
        // One paragraph split across two runs; the trailing space inside the
        // first run must survive extraction.
        let bytes = docx_from_xml(
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>",
        );
        assert_eq!(extract_bytes(&bytes).unwrap(), "Hello world");
    }

    #[test]
    fn pdf_page_text_is_extracted() {
        let bytes = pdf_bytes("retrieval engine handbook");
        assert_eq!(detect_type(&bytes), Some(DetectedType::Pdf));
        let text = extract_bytes(&bytes).unwrap();
        assert!(
            text.contains("retrieval") && text.contains("handbook"),
            "extracted: {:?}",
            text
        );
    }

    #[test]
    fn corrupt_pdf_is_an_extract_error() {
        let err = extract_bytes(b"%PDF-1.4 but not really a pdf").unwrap_err();
        assert!(matches!(err, RetrievalError::Extract(_)));
    }
}

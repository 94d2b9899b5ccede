// src/text_extract.rs

use lopdf::Document;
use std::panic;
use tracing::{debug, info, warn};

/// Below this many characters the first pass is treated as a miss and the
/// page-by-page fallback runs as well.
const MIN_PRIMARY_CHARS: usize = 100;

/// Best-effort text from PDF bytes.
///
/// Phase 1 is `pdf-extract` over the whole document. If that yields too
/// little, phase 2 walks the pages with `lopdf` and appends what it finds.
/// Nothing here fails: every error is logged and the result may be empty.
pub fn extract_text(pdf_bytes: &[u8]) -> String {
    let mut text = String::new();

    // --- Phase 1: full-document extraction ---
    // pdf-extract panics on some malformed inputs instead of returning Err.
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf_bytes)) {
        Ok(Ok(extracted)) => text.push_str(&extracted),
        Ok(Err(e)) => warn!(error = %e, "pdf-extract failed"),
        Err(_) => warn!("pdf-extract panicked"),
    }

    let primary_chars = text.trim().chars().count();
    if primary_chars > MIN_PRIMARY_CHARS {
        info!(chars = primary_chars, "Text extracted successfully");
        return text.trim().to_string();
    }

    // --- Phase 2: per-page fallback ---
    debug!(
        chars = primary_chars,
        "First pass too short, falling back to page text"
    );
    match page_text(pdf_bytes) {
        Ok(pages) => text.push_str(&pages),
        Err(e) => warn!(error = %e, "lopdf could not load document"),
    }

    let text = text.trim().to_string();
    info!(chars = text.chars().count(), "Text extraction finished");
    text
}

fn page_text(pdf_bytes: &[u8]) -> Result<String, lopdf::Error> {
    let doc = Document::load_mem(pdf_bytes)?;
    let mut text = String::new();

    for page_num in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_num]) {
            Ok(page) => text.push_str(&page),
            Err(e) => warn!(page = page_num, error = %e, "Skipping unreadable page"),
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_yield_empty_text() {
        assert_eq!(extract_text(b"this is not a pdf"), "");
    }

    #[test]
    fn empty_input_yields_empty_text() {
        assert_eq!(extract_text(&[]), "");
    }
}

//! Content-type detection by file content, not extension.
//!
//! Classification order: binary magic-byte signatures first, then a text
//! heuristic that recognizes HTML documents, then plain text for any other
//! valid UTF-8. A file whose content matches nothing is unsupported and the
//! dispatcher answers with the generic "MIME type not supported" text.
//!
//! Extension never participates: a PNG saved as `about.html` is an image.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes inspected from the head of the file.
const SNIFF_LEN: usize = 8192;

/// Detect the MIME type of a file by inspecting its leading bytes.
///
/// Returns `Ok(None)` when no signature or text heuristic matches.
pub fn sniff(path: &Path) -> std::io::Result<Option<&'static str>> {
    let mut head = vec![0u8; SNIFF_LEN];
    let mut file = File::open(path)?;
    let mut filled = 0;
    loop {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == head.len() {
            break;
        }
    }
    head.truncate(filled);

    Ok(sniff_bytes(&head))
}

/// Classify a leading chunk of file content.
pub fn sniff_bytes(head: &[u8]) -> Option<&'static str> {
    if head.is_empty() {
        return Some("application/x-empty");
    }

    if let Some(kind) = infer::get(head) {
        return Some(kind.mime_type());
    }

    if looks_like_html(head) {
        return Some("text/html");
    }

    if is_mostly_text(head) {
        return Some("text/plain");
    }

    None
}

/// HTML heuristic: the first non-whitespace byte opens a tag and an
/// `<html` or `<!doctype` marker appears in the inspected chunk.
fn looks_like_html(head: &[u8]) -> bool {
    let trimmed = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| &head[i..])
        .unwrap_or_default();
    if trimmed.first() != Some(&b'<') {
        return false;
    }

    let lower = String::from_utf8_lossy(trimmed).to_lowercase();
    lower.contains("<html") || lower.contains("<!doctype")
}

/// Text heuristic: valid UTF-8 (allowing a multi-byte character cut at the
/// chunk boundary) with no NUL bytes.
fn is_mostly_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // Only the trailing bytes of a split character may be invalid.
        Err(err) => err.valid_up_to() + 4 > head.len() && err.error_len().is_none(),
    }
}

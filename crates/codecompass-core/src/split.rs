//! Splitting concatenated JSON documents.
//!
//! The upstream writes JSON objects back to back with no separator, and one
//! transport chunk may carry several of them. A `}` immediately followed by
//! a `{` marks a boundary. The braces consumed by the split are restored so
//! every piece is a standalone candidate document.

/// The two-character sequence separating adjacent documents.
pub const DOCUMENT_BOUNDARY: &str = "}{";

/// Splits `text` into candidate JSON documents.
///
/// Pieces are not validated; a chunk boundary may leave the first or last
/// piece incomplete.
pub fn split_documents(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = text.split(DOCUMENT_BOUNDARY).collect();
    let last = parts.len() - 1;

    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let mut doc = String::with_capacity(part.len() + 2);
            if i > 0 {
                doc.push('{');
            }
            doc.push_str(part);
            if i < last {
                doc.push('}');
            }
            doc
        })
        .collect()
}

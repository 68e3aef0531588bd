use std::fmt::Write as _;

use super::types::ContextBundle;

/// Render a bundle as numbered source blocks for the answer prompt.
///
/// Each snippet is cut to `max_snippet_chars` characters. An empty bundle
/// renders as an empty string.
#[must_use]
pub fn format_context(bundle: &ContextBundle, max_snippet_chars: usize) -> String {
    let mut out = String::new();
    let mut n = 0;
    for hit in bundle.hits() {
        let text = hit.text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        n += 1;
        let _ = write!(out, "[Source {n}");
        if let Some(page) = hit.page {
            let _ = write!(out, ", page {page}");
        }
        out.push_str("]\n");
        match text.char_indices().nth(max_snippet_chars) {
            Some((cut, _)) => {
                out.push_str(&text[..cut]);
                out.push_str("...");
            }
            None => out.push_str(text),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use medassist_index::SearchHit;

    use super::*;

    #[test]
    fn empty_bundle_renders_empty() {
        assert_eq!(format_context(&ContextBundle::default(), 100), "");
    }

    #[test]
    fn numbers_sources_and_pages() {
        let bundle = ContextBundle::merge(
            [vec![
                SearchHit::new("a", 0.9, "OPD runs 9am to 5pm.").with_page(4),
                SearchHit::new("b", 0.5, "  Address: 12 Main Road. "),
            ]],
            10,
        );
        assert_eq!(
            format_context(&bundle, 100),
            "[Source 1, page 4]\nOPD runs 9am to 5pm.\n\n[Source 2]\nAddress: 12 Main Road."
        );
    }

    #[test]
    fn truncates_long_snippets_on_char_boundary() {
        let bundle = ContextBundle::merge([vec![SearchHit::new("a", 1.0, "ééééé")]], 1);
        assert_eq!(format_context(&bundle, 2), "[Source 1]\néé...");
    }
}

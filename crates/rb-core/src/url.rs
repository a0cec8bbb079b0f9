//! URL helpers

/// Prefix of every inline redirect document.
pub const INLINE_DOCUMENT_PREFIX: &str = "data:text/html;charset=utf-8,";

/// Encode `html` as a self-contained `data:` URL.
pub fn inline_document_url(html: &str) -> String {
    let encoded = urlencoding::encode(html);
    let mut url = String::with_capacity(INLINE_DOCUMENT_PREFIX.len() + encoded.len());
    url.push_str(INLINE_DOCUMENT_PREFIX);
    url.push_str(&encoded);
    url
}

/// Shorten a URL for log lines. Inline documents can be arbitrarily long.
pub fn preview(url: &str, max_chars: usize) -> &str {
    match url.char_indices().nth(max_chars) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_document_url() {
        assert_eq!(
            inline_document_url("<h1>X</h1>"),
            "data:text/html;charset=utf-8,%3Ch1%3EX%3C%2Fh1%3E"
        );
    }

    #[test]
    fn test_inline_document_url_utf8() {
        assert_eq!(inline_document_url("é"), "data:text/html;charset=utf-8,%C3%A9");
        assert_eq!(inline_document_url("a b"), "data:text/html;charset=utf-8,a%20b");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("abcdef", 3), "abc");
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("ééé", 2), "éé");
    }
}

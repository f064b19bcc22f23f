//! UTF-8 safe text helpers used for log previews and prompt budgets.

/// Bytes of model output shown in log previews.
pub(crate) const PREVIEW_BYTES: usize = 200;

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
///
/// If the byte at `max_bytes` is inside a multi-byte character, the slice is
/// shortened to the preceding character boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line, bounded preview of model output for structured log fields.
pub(crate) fn preview(s: &str) -> String {
    let cut = truncate_utf8(s, PREVIEW_BYTES);
    let mut out = cut.replace(['\n', '\r'], " ");
    if cut.len() < s.len() {
        out.push('…');
    }
    out
}

/// Message length as the user sees it, in characters.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_utf8("hello world", 5), "hello");
        assert_eq!(truncate_utf8("hi", 10), "hi");
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        // 'é' is two bytes; cutting at byte 2 lands inside it.
        assert_eq!(truncate_utf8("hé", 2), "h");
        assert_eq!(truncate_utf8("日本語", 4), "日");
    }

    #[test]
    fn test_preview_flattens_and_marks_truncation() {
        assert_eq!(preview("a\nb"), "a b");
        let long = "x".repeat(PREVIEW_BYTES + 10);
        let p = preview(&long);
        assert!(p.ends_with('…'));
        assert_eq!(p.chars().count(), PREVIEW_BYTES + 1);
    }

    #[test]
    fn test_char_len_counts_chars() {
        assert_eq!(char_len("日本"), 2);
    }
}

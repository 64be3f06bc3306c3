//! Attribute value sanitizers.

/// Attributes whose values are URLs or otherwise load or submit resources.
const URL_PROPS: &[&str] = &[
    "href",
    "src",
    "action",
    "data",
    "integrity",
    "nonce",
    "referrerpolicy",
    "formaction",
    "formtarget",
];

/// Keep word characters, whitespace and `-:./`; drop everything else.
pub fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace() || matches!(c, '-' | ':' | '.' | '/')
        })
        .collect()
}

/// Return `url` unchanged when it is relative or uses http(s), otherwise an
/// empty string.
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim_start_matches(|c: char| c.is_whitespace() || c.is_control());
    match scheme(trimmed) {
        None => url.to_string(),
        Some(scheme) if scheme == "http" || scheme == "https" => url.to_string(),
        Some(_) => String::new(),
    }
}

fn scheme(url: &str) -> Option<String> {
    let end = url.find(|c: char| matches!(c, ':' | '/' | '?' | '#'))?;
    if !url[end..].starts_with(':') {
        return None;
    }
    let candidate = &url[..end];
    let valid = candidate.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') || c.is_whitespace());
    // Browsers strip tabs and newlines inside a scheme.
    valid.then(|| {
        candidate
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
    })
}

/// Whether `key` takes URL sanitization rather than character filtering.
pub fn should_sanitize_prop(key: &str) -> bool {
    key.starts_with("on") || URL_PROPS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_filter_strips_markup() {
        assert_eq!(sanitize_value("hello <b>world</b>"), "hello bworld/b");
        assert_eq!(sanitize_value("a-b_c: d./e"), "a-b_c: d./e");
        assert_eq!(sanitize_value("x\"onmouseover=\"y"), "xonmouseovery");
    }

    #[test]
    fn urls_allow_http_and_relative() {
        assert_eq!(sanitize_url("https://example.com/a"), "https://example.com/a");
        assert_eq!(sanitize_url("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(sanitize_url("/relative/path"), "/relative/path");
        assert_eq!(sanitize_url("page?x=a:b"), "page?x=a:b");
        assert_eq!(sanitize_url("//cdn.example.com/x.js"), "//cdn.example.com/x.js");
    }

    #[test]
    fn urls_reject_other_schemes() {
        assert_eq!(sanitize_url("javascript:alert(1)"), "");
        assert_eq!(sanitize_url("  JavaScript:alert(1)"), "");
        assert_eq!(sanitize_url("java\tscript:alert(1)"), "");
        assert_eq!(sanitize_url("data:text/html,x"), "");
    }

    #[test]
    fn url_props_are_recognized() {
        assert!(should_sanitize_prop("href"));
        assert!(should_sanitize_prop("formaction"));
        assert!(!should_sanitize_prop("title"));
    }
}

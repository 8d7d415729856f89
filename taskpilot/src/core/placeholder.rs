//! Detection of placeholder tokens the model invented instead of using a
//! real value (`path/to/...`, `<your-api-key>`, `example.com`, ...).
//!
//! Pure and deterministic: a fixed ordered pattern list is applied
//! case-insensitively and every match is returned, deduplicated per input
//! while preserving first-seen order.

use std::sync::LazyLock;

use regex::Regex;

/// Ordered pattern list. Order is part of the contract: earlier patterns
/// report their matches first.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // path/to/... fragments, with or without a leading slash.
        r"(?i)/?path/to/[^\s'\x22]*",
        // example.com / example.org, including subdomains.
        r"(?i)\b(?:[\w-]+\.)*example\.(?:com|org)\b",
        // <angle-bracket> tokens. Requires a letter right after `<`, so shell
        // redirections (`sort < input.txt`) and process substitution do not
        // match.
        r"<[A-Za-z][\w ./-]*>",
        // [bracket] tokens whose inner text looks like a placeholder word.
        r"(?i)\[[^\[\]]*(?:name|your|path|url|key|token|id|value|project|file|dir|host|port|user|email|branch|repo)[^\[\]]*\]",
        // Generic placeholder words, word-bounded so `foobar` and `embargo`
        // do not match while hyphenated compounds like `update-bar-chart` do.
        r"(?i)\b(?:placeholder|changeme|change-me|your-project|your_project|yourproject|my-project|myproject|some-value|somevalue|foo|bar|baz)\b",
        // Generic directory markers.
        r"(?i)/(?:repo|folder)/",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("placeholder pattern should be valid"))
    .collect()
});

/// Return every placeholder token found in `text`, in pattern order.
///
/// Empty input returns an empty vec.
pub fn detect(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut found = Vec::new();
    for pattern in PATTERNS.iter() {
        for matched in pattern.find_iter(text) {
            let token = matched.as_str().to_string();
            if !found.contains(&token) {
                found.push(token);
            }
        }
    }
    found
}

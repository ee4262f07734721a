//! Sandbox directory naming.

/// Turn a git ref into a single, safe path component.
///
/// Path separators and other punctuation become `-`, consecutive hyphens
/// collapse, and a name that would be empty or dot-only becomes `head`.
///
/// # Examples
///
/// ```
/// use gatekeep::sandbox::sanitize_ref;
///
/// assert_eq!(sanitize_ref("feature/login"), "feature-login");
/// assert_eq!(sanitize_ref("../../etc"), "etc");
/// ```
pub fn sanitize_ref(reference: &str) -> String {
    let mut result = String::new();
    let mut last_was_hyphen = true;

    for c in reference.chars() {
        let keep_dot = c == '.' && !last_was_hyphen && !result.ends_with('.');
        if c.is_ascii_alphanumeric() || c == '_' || keep_dot {
            result.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    let trimmed = result.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "head".to_string()
    } else {
        trimmed.to_string()
    }
}

//! Glob pattern compilation and the legacy `$self`/`$here` token
//! expansion used by the capability registry.
//!
//! A pattern that fails to compile, or a token that can't be expanded
//! (e.g. `$here` with no known location), is treated as "does not match"
//! rather than an error — fail-closed, with a warning logged once per
//! occurrence.

use regex::Regex;
use tracing::warn;

/// Expands `$self` and `$here` tokens in `pattern`, then compiles the
/// result to an anchored regex. `*` matches any run of characters,
/// mirroring shell-glob semantics; everything else is matched literally.
pub fn expand_and_compile(pattern: &str, self_id: &str, here_id: Option<&str>) -> Option<Regex> {
    let mut expanded = pattern.replace("$self", self_id);
    if expanded.contains("$here") {
        match here_id {
            Some(here) => expanded = expanded.replace("$here", here),
            None => {
                warn!(pattern, "glob pattern references $here but subject has no known location");
                return None;
            }
        }
    }

    let parts: Vec<&str> = expanded.split('*').collect();
    let mut regex_src = String::from("^");
    for (i, part) in parts.iter().enumerate() {
        regex_src.push_str(&regex::escape(part));
        if i + 1 < parts.len() {
            regex_src.push_str(".*");
        }
    }
    regex_src.push('$');

    match Regex::new(&regex_src) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern = expanded, error = %err, "glob pattern failed to compile");
            None
        }
    }
}

pub fn matches(pattern: &str, candidate: &str, self_id: &str, here_id: Option<&str>) -> bool {
    match expand_and_compile(pattern, self_id, here_id) {
        Some(re) => re.is_match(candidate),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_exactly() {
        assert!(matches("look", "look", "01ABC", None));
        assert!(!matches("look", "dig", "01ABC", None));
    }

    #[test]
    fn wildcard_matches_prefix() {
        assert!(matches("object:*", "object:01XYZ", "01ABC", None));
        assert!(!matches("object:*", "location:01XYZ", "01ABC", None));
    }

    #[test]
    fn self_token_expands_to_subject_id() {
        assert!(matches("character:$self", "character:01ABC", "01ABC", None));
        assert!(!matches("character:$self", "character:01XYZ", "01ABC", None));
    }

    #[test]
    fn here_token_expands_to_current_location() {
        assert!(matches("location:$here:*", "location:01LOC:exits", "01ABC", Some("01LOC")));
    }

    #[test]
    fn here_token_without_location_fails_closed() {
        assert!(!matches("location:$here", "location:01LOC", "01ABC", None));
    }
}

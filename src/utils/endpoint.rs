use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}/]+)\}").expect("placeholder regex is valid"));

/// Placeholder names in an endpoint template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str()))
        .collect()
}

pub fn substitute(template: &str, name: &str, encoded_value: &str) -> String {
    template.replace(&format!("{{{}}}", name), encoded_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_placeholders_in_order() {
        assert_eq!(
            placeholders("/repos/{owner}/{repo}/issues/{number}"),
            vec!["owner", "repo", "number"]
        );
        assert!(placeholders("/status").is_empty());
    }

    #[test]
    fn substitute_replaces_every_occurrence() {
        assert_eq!(substitute("/a/{id}/b/{id}", "id", "7"), "/a/7/b/7");
    }
}

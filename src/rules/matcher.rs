//! Rule Matcher (component A). Pure suffix matching with a label-boundary
//! check, fixing the boundary bug the teacher's blocker carried (bare
//! `ends_with` admits `evilgoogle.com` into `google.com`).

use std::collections::HashSet;

/// A rule set: lowercased suffixes without leading dots.
pub type RuleSet = HashSet<String>;

/// `name` must already be normalized (lowercase, no trailing dot).
pub fn matches(name: &str, suffixes: &RuleSet) -> bool {
    suffixes.iter().any(|suffix| matches_suffix(name, suffix))
}

fn matches_suffix(name: &str, suffix: &str) -> bool {
    let suffix = suffix.trim().trim_start_matches('.');
    if suffix.is_empty() {
        return false;
    }
    if name == suffix {
        return true;
    }
    match name.strip_suffix(suffix) {
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

pub fn build_rule_set<I, S>(suffixes: I) -> RuleSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    suffixes
        .into_iter()
        .map(|s| s.into().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let set = build_rule_set(["site.com"]);
        assert!(matches("site.com", &set));
    }

    #[test]
    fn subdomain_matches() {
        let set = build_rule_set(["site.com"]);
        assert!(matches("www.site.com", &set));
    }

    #[test]
    fn boundary_violation_does_not_match() {
        let set = build_rule_set(["site.com"]);
        assert!(!matches("evilsite.com", &set));
    }

    #[test]
    fn unrelated_domain_does_not_match() {
        let set = build_rule_set(["site.com"]);
        assert!(!matches("other.com", &set));
    }

    #[test]
    fn empty_suffix_never_matches() {
        let set = build_rule_set([""]);
        assert!(!matches("anything.com", &set));
    }
}

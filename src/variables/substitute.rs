//! `${name}` substitution against the variable store.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::store::VariableStore;

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^{}]+)\}").unwrap_or_else(|e| panic!("Invalid variable regex: {e}"))
});

/// Replace every `${name}` with the named variable's current value.
///
/// Unknown names are left in place so that a missing variable is visible in
/// the output rather than silently producing an empty string.
#[must_use]
pub fn substitute(template: &str, variables: &VariableStore) -> String {
    if !template.contains("${") {
        return template.to_string();
    }
    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            variables
                .value(&caps[1])
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names referenced by `${name}` templates in a string.
#[must_use]
pub fn referenced_names(template: &str) -> Vec<String> {
    VARIABLE_PATTERN
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variable;

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store.insert(Variable::new("scene").with_value("Intro")).unwrap();
        store.insert(Variable::new("count").with_value(3)).unwrap();
        store
    }

    #[test]
    fn test_substitute_known_names() {
        let result = substitute("Switched to ${scene} (${count})", &store());
        assert_eq!(result, "Switched to Intro (3)");
    }

    #[test]
    fn test_unknown_names_left_in_place() {
        let result = substitute("Hello ${missing}", &store());
        assert_eq!(result, "Hello ${missing}");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(substitute("no templates", &store()), "no templates");
    }

    #[test]
    fn test_referenced_names() {
        assert_eq!(
            referenced_names("${a} and ${b}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}

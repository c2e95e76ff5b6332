//! View element matching by name, attributes, classes and styles.
//!
//! A [`MatchResult`] lists exactly which parts of the element the pattern
//! looked at, which is what upcast converters mark as consumed.

use crate::node::ViewElement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherPattern {
    #[serde(default)]
    pub name: Option<String>,
    /// `None` values match any value
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, Option<String>>,
}

impl MatcherPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new().with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), Some(value.into()));
        self
    }

    pub fn with_any_attribute(mut self, key: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), None);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), Some(value.into()));
        self
    }

    pub fn with_any_style(mut self, property: impl Into<String>) -> Self {
        self.styles.insert(property.into(), None);
        self
    }

    pub fn match_element(&self, element: &ViewElement) -> Option<MatchResult> {
        let mut result = MatchResult::default();

        if let Some(name) = &self.name {
            if element.name() != name {
                return None;
            }
            result.name = true;
        }

        for (key, expected) in &self.attributes {
            let actual = element.attributes().get(key)?;
            if expected.as_ref().is_some_and(|expected| expected != actual) {
                return None;
            }
            result.attributes.push(key.clone());
        }

        for class in &self.classes {
            if !element.has_class(class) {
                return None;
            }
            result.classes.push(class.clone());
        }

        for (property, expected) in &self.styles {
            let actual = element.get_style(property)?;
            if expected.as_deref().is_some_and(|expected| expected != actual) {
                return None;
            }
            result.styles.push(property.clone());
        }

        Some(result)
    }
}

/// The parts of an element a pattern matched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub name: bool,
    pub attributes: Vec<String>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

/// Any-of matcher over several patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matcher {
    patterns: Vec<MatcherPattern>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: MatcherPattern) -> Self {
        self.add(pattern);
        self
    }

    pub fn add(&mut self, pattern: MatcherPattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First matching pattern and what it matched
    pub fn match_element(&self, element: &ViewElement) -> Option<(&MatcherPattern, MatchResult)> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.match_element(element).map(|result| (pattern, result)))
    }

    pub fn match_all(&self, element: &ViewElement) -> Vec<(&MatcherPattern, MatchResult)> {
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.match_element(element).map(|result| (pattern, result)))
            .collect()
    }

    /// Name every pattern requires, when they all agree on one
    pub fn element_name(&self) -> Option<&str> {
        let first = self.patterns.first()?.name.as_deref()?;
        self.patterns
            .iter()
            .all(|pattern| pattern.name.as_deref() == Some(first))
            .then_some(first)
    }
}

impl From<MatcherPattern> for Matcher {
    fn from(pattern: MatcherPattern) -> Self {
        Matcher::new().with_pattern(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn link() -> ViewElement {
        ViewElement::attribute("a", 5)
            .with_attribute("href", "https://example.com")
            .with_class("external")
            .with_style("color", "red")
    }

    #[test]
    fn test_match_reports_matched_parts() {
        let pattern = MatcherPattern::name("a")
            .with_any_attribute("href")
            .with_class("external")
            .with_style("color", "red");

        assert_eq!(
            pattern.match_element(&link()),
            Some(MatchResult {
                name: true,
                attributes: vec!["href".to_string()],
                classes: vec!["external".to_string()],
                styles: vec!["color".to_string()],
            })
        );
    }

    #[test]
    fn test_mismatch() {
        assert!(MatcherPattern::name("b").match_element(&link()).is_none());
        assert!(MatcherPattern::new()
            .with_attribute("href", "https://other.org")
            .match_element(&link())
            .is_none());
        assert!(MatcherPattern::new().with_any_style("font-weight").match_element(&link()).is_none());
    }

    #[test]
    fn test_matcher_any_of() {
        let matcher = Matcher::new()
            .with_pattern(MatcherPattern::name("strong"))
            .with_pattern(MatcherPattern::name("b"));
        let bold = ViewElement::attribute("b", 10);

        let (pattern, _) = matcher.match_element(&bold).expect("Should match");
        assert_eq!(pattern.name.as_deref(), Some("b"));
        assert_eq!(matcher.element_name(), None);
        assert_eq!(Matcher::from(MatcherPattern::name("p")).element_name(), Some("p"));
    }
}

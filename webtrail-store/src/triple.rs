//! The flat (subject, predicate, object) fact — the only unit the
//! underlying store persists. Nodes and relationships decompose into
//! bundles of these.

use serde::{Deserialize, Serialize};

/// A single stored fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// A triple-pattern query: `None` slots are wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
}

impl TriplePattern {
    /// Match everything in the store
    pub fn any() -> Self {
        Self::default()
    }

    /// All triples for one subject
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// All triples with one predicate
    pub fn predicate(predicate: impl Into<String>) -> Self {
        Self {
            predicate: Some(predicate.into()),
            ..Self::default()
        }
    }

    /// Bind the predicate slot
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Bind the object slot
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Fully bound pattern (existence check)
    pub fn exact(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: Some(subject.into()),
            predicate: Some(predicate.into()),
            object: Some(object.into()),
        }
    }

    /// Whether a triple matches this pattern
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_deref().map_or(true, |s| s == triple.subject)
            && self
                .predicate
                .as_deref()
                .map_or(true, |p| p == triple.predicate)
            && self.object.as_deref().map_or(true, |o| o == triple.object)
    }

    /// True when no slot is bound
    pub fn is_wildcard(&self) -> bool {
        self.subject.is_none() && self.predicate.is_none() && self.object.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Triple {
        Triple::new("page:1-a", "url", "https://example.com")
    }

    #[test]
    fn test_wildcard_matches_everything() {
        assert!(TriplePattern::any().matches(&sample()));
        assert!(TriplePattern::any().is_wildcard());
    }

    #[test]
    fn test_subject_pattern() {
        assert!(TriplePattern::subject("page:1-a").matches(&sample()));
        assert!(!TriplePattern::subject("page:2-b").matches(&sample()));
    }

    #[test]
    fn test_predicate_object_pattern() {
        let pattern = TriplePattern::predicate("url").with_object("https://example.com");
        assert!(pattern.matches(&sample()));

        let miss = TriplePattern::predicate("url").with_object("https://missing.com");
        assert!(!miss.matches(&sample()));
    }

    #[test]
    fn test_exact_pattern() {
        let pattern = TriplePattern::exact("page:1-a", "url", "https://example.com");
        assert!(pattern.matches(&sample()));
        assert!(!pattern.is_wildcard());
    }

    #[test]
    fn test_triple_serialization_round_trip() {
        let triple = sample();
        let json = serde_json::to_string(&triple).unwrap();
        let back: Triple = serde_json::from_str(&json).unwrap();
        assert_eq!(triple, back);
    }
}

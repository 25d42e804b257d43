use serde::{Deserialize, Serialize};

/// One extracted fact: `(subject, subject_type, relation, object, object_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triplet {
    pub subject: String,
    pub subject_type: String,
    pub relation: String,
    pub object: String,
    pub object_type: String,
}

impl Triplet {
    pub fn new(
        subject: impl Into<String>,
        subject_type: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            subject_type: subject_type.into(),
            relation: relation.into(),
            object: object.into(),
            object_type: object_type.into(),
        }
    }
}

impl std::fmt::Display for Triplet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) --[{}]--> {} ({})",
            self.subject, self.subject_type, self.relation, self.object, self.object_type
        )
    }
}

/// Strip stray quoting, brackets and whitespace from both ends of a field.
pub fn clean_field(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_stray_quotes_and_brackets() {
        assert_eq!(clean_field(" \"'[Ministry of Finance]'\" "), "Ministry of Finance");
        assert_eq!(clean_field("O'Brien"), "O'Brien");
        assert_eq!(clean_field("[]"), "");
    }
}

//! Common types used across tabload

use serde::{Deserialize, Serialize};

/// Semantic column type, the shared vocabulary for schema inference,
/// catalog introspection, and DDL generation.
///
/// Comparison is always by semantic category: a `BIGINT` and an `INTEGER`
/// column are both [`SemanticType::Integer`], never distinguished by width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Float,
    Boolean,
    Datetime,
    Text,
}

impl SemanticType {
    /// SQL declared type used when tabload creates columns of this type.
    pub fn decl_sql(self) -> &'static str {
        match self {
            SemanticType::Integer => "BIGINT",
            SemanticType::Float => "DOUBLE",
            SemanticType::Boolean => "BOOLEAN",
            SemanticType::Datetime => "TIMESTAMP",
            SemanticType::Text => "VARCHAR",
        }
    }

    /// Map a declared SQL type from catalog introspection back into the
    /// semantic vocabulary. Unrecognized declarations fall back to `Text`,
    /// mirroring SQLite's affinity rules: INT* wins first, then textual
    /// types, then REAL/FLOA/DOUB.
    pub fn from_decl(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("INT") {
            SemanticType::Integer
        } else if upper.contains("BOOL") {
            SemanticType::Boolean
        } else if upper.contains("DATE") || upper.contains("TIME") {
            SemanticType::Datetime
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SemanticType::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SemanticType::Float
        } else {
            SemanticType::Text
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticType::Integer => write!(f, "integer"),
            SemanticType::Float => write!(f, "float"),
            SemanticType::Boolean => write!(f, "boolean"),
            SemanticType::Datetime => write!(f, "datetime"),
            SemanticType::Text => write!(f, "text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_decl_integer_family() {
        assert_eq!(SemanticType::from_decl("INTEGER"), SemanticType::Integer);
        assert_eq!(SemanticType::from_decl("BIGINT"), SemanticType::Integer);
        assert_eq!(SemanticType::from_decl("int"), SemanticType::Integer);
        assert_eq!(
            SemanticType::from_decl("UNSIGNED BIG INT"),
            SemanticType::Integer
        );
    }

    #[test]
    fn test_from_decl_float_family() {
        assert_eq!(SemanticType::from_decl("DOUBLE"), SemanticType::Float);
        assert_eq!(SemanticType::from_decl("REAL"), SemanticType::Float);
        assert_eq!(SemanticType::from_decl("FLOAT"), SemanticType::Float);
    }

    #[test]
    fn test_from_decl_text_and_temporal() {
        assert_eq!(SemanticType::from_decl("VARCHAR(255)"), SemanticType::Text);
        assert_eq!(SemanticType::from_decl("TEXT"), SemanticType::Text);
        assert_eq!(SemanticType::from_decl("TIMESTAMP"), SemanticType::Datetime);
        assert_eq!(SemanticType::from_decl("DATE"), SemanticType::Datetime);
        assert_eq!(SemanticType::from_decl("BOOLEAN"), SemanticType::Boolean);
        // unknown declarations keep text affinity
        assert_eq!(SemanticType::from_decl("BLOB"), SemanticType::Text);
    }

    #[test]
    fn test_decl_roundtrip() {
        for ty in [
            SemanticType::Integer,
            SemanticType::Float,
            SemanticType::Boolean,
            SemanticType::Datetime,
            SemanticType::Text,
        ] {
            assert_eq!(SemanticType::from_decl(ty.decl_sql()), ty);
        }
    }
}

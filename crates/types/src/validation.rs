//! Identifier validation for objects and relations.
//!
//! Identifiers become key segments, so they must never contain the key
//! separator bytes (`\0` between type and id, `\x1f` between tuple fields).

use std::fmt;

use crate::{Object, ObjectIdentifier, Relation, RelationIdentifier, config::ValidationConfig};

/// Separator between an object type and its id in keys.
pub const TYPE_ID_SEPARATOR: u8 = 0x00;

/// Separator between relation tuple fields in keys.
pub const FIELD_SEPARATOR: u8 = 0x1f;

/// Validation error with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a required key segment.
///
/// Segments must:
/// - Be non-empty
/// - Not exceed `config.max_identifier_bytes` in UTF-8 byte length
/// - Not contain `\0` or `\x1f`
///
/// # Errors
///
/// Returns [`ValidationError`] naming `field` when a rule is violated.
pub fn validate_identifier(
    field: &str,
    value: &str,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError {
            field: field.to_string(),
            constraint: "must not be empty".to_string(),
        });
    }
    validate_optional_identifier(field, value, config)
}

/// Validates a key segment that may be empty (e.g. `subject_relation`).
///
/// # Errors
///
/// Returns [`ValidationError`] if the segment is too long or contains a
/// separator byte.
pub fn validate_optional_identifier(
    field: &str,
    value: &str,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    if value.len() > config.max_identifier_bytes {
        return Err(ValidationError {
            field: field.to_string(),
            constraint: format!(
                "length {} bytes exceeds maximum {} bytes",
                value.len(),
                config.max_identifier_bytes
            ),
        });
    }
    if let Some(pos) = value.bytes().position(|b| b == TYPE_ID_SEPARATOR || b == FIELD_SEPARATOR) {
        return Err(ValidationError {
            field: field.to_string(),
            constraint: format!("contains a reserved separator byte at offset {pos}"),
        });
    }
    Ok(())
}

/// Validates an object's identity and display name.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_object(obj: &Object, config: &ValidationConfig) -> Result<(), ValidationError> {
    validate_identifier("type", &obj.r#type, config)?;
    validate_identifier("id", &obj.id, config)?;
    if obj.display_name.len() > config.max_display_name_bytes {
        return Err(ValidationError {
            field: "display_name".to_string(),
            constraint: format!(
                "length {} bytes exceeds maximum {} bytes",
                obj.display_name.len(),
                config.max_display_name_bytes
            ),
        });
    }
    Ok(())
}

/// Validates an object identifier.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_object_identifier(
    id: &ObjectIdentifier,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    validate_identifier("object_type", &id.object_type, config)?;
    validate_identifier("object_id", &id.object_id, config)
}

/// Validates every field of a relation tuple.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_relation(rel: &Relation, config: &ValidationConfig) -> Result<(), ValidationError> {
    validate_identifier("object_type", &rel.object_type, config)?;
    validate_identifier("object_id", &rel.object_id, config)?;
    validate_identifier("relation", &rel.relation, config)?;
    validate_identifier("subject_type", &rel.subject_type, config)?;
    validate_identifier("subject_id", &rel.subject_id, config)?;
    validate_optional_identifier("subject_relation", &rel.subject_relation, config)
}

/// Validates a full relation identifier.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_relation_identifier(
    id: &RelationIdentifier,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    validate_identifier("object_type", &id.object_type, config)?;
    validate_identifier("object_id", &id.object_id, config)?;
    validate_identifier("relation", &id.relation, config)?;
    validate_identifier("subject_type", &id.subject_type, config)?;
    validate_identifier("subject_id", &id.subject_id, config)?;
    validate_optional_identifier("subject_relation", &id.subject_relation, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn relation() -> Relation {
        Relation {
            object_type: "doc".to_string(),
            object_id: "readme".to_string(),
            relation: "viewer".to_string(),
            subject_type: "user".to_string(),
            subject_id: "alice".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_relation() {
        validate_relation(&relation(), &ValidationConfig::default()).expect("valid relation");
    }

    #[test]
    fn test_empty_subject_id_rejected() {
        let rel = Relation { subject_id: String::new(), ..relation() };
        let err = validate_relation(&rel, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.field, "subject_id");
    }

    #[test]
    fn test_separator_bytes_rejected() {
        let config = ValidationConfig::default();
        let err = validate_identifier("object_id", "a\u{1f}b", &config).unwrap_err();
        assert!(err.constraint.contains("offset 1"));
        assert!(validate_identifier("object_id", "a\0b", &config).is_err());
    }

    #[test]
    fn test_length_limit() {
        let config = ValidationConfig { max_identifier_bytes: 4, ..ValidationConfig::default() };
        assert!(validate_identifier("id", "abcd", &config).is_ok());
        assert!(validate_identifier("id", "abcde", &config).is_err());
    }

    #[test]
    fn test_subject_relation_may_be_empty() {
        validate_optional_identifier("subject_relation", "", &ValidationConfig::default())
            .expect("empty subject relation");
    }

    proptest! {
        #[test]
        fn prop_separator_free_identifiers_pass(value in "[a-zA-Z0-9:@._|-]{1,64}") {
            prop_assert!(validate_identifier("id", &value, &ValidationConfig::default()).is_ok());
        }
    }
}

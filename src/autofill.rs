//! Id generation and field normalization for new and edited records.

use crate::backend::{Collection, FieldMap};

/// Generate a random record id (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Restrict `fields` to the collection's text fields and fill the missing
/// ones with `None`.
///
/// Unknown field names are dropped so they never reach the backend
/// unencrypted.
pub fn normalize_fields(collection: Collection, fields: &FieldMap) -> FieldMap {
    collection
        .text_fields()
        .iter()
        .map(|name| {
            let value = fields.get(*name).cloned().flatten();
            (name.to_string(), value)
        })
        .collect()
}

/// Restrict a partial field update to the collection's text fields,
/// keeping only the fields that were provided.
pub fn restrict_fields(collection: Collection, fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(name, _)| collection.is_text_field(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_uuids() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn normalize_fills_missing_and_drops_unknown() {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), Some("t".into()));
        fields.insert("color".into(), Some("red".into()));

        let normalized = normalize_fields(Collection::Ideas, &fields);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized["title"], Some("t".to_string()));
        assert_eq!(normalized["description"], None);
        assert!(!normalized.contains_key("color"));
    }

    #[test]
    fn restrict_keeps_only_provided_text_fields() {
        let mut fields = FieldMap::new();
        fields.insert("content".into(), Some("c".into()));
        fields.insert("title".into(), Some("not a thought field".into()));

        let restricted = restrict_fields(Collection::Thoughts, &fields);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.contains_key("content"));
    }
}

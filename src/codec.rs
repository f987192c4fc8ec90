//! Field codec: decrypts stored text fields for display and encrypts edited
//! fields before they are written.
//!
//! Absent contract: a `None` or empty field is the empty string on read and
//! is written as the empty string, without a cipher call in either direction.
//! Empty strings are never wrapped in an envelope.

use jotter_crypto::{decrypt, encrypt, CryptoError, Envelope};
use tracing::warn;

use crate::backend::{Collection, FieldMap, RawRecord};
use crate::session::Session;

/// A text field that could not be decrypted.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: String,
    pub error: CryptoError,
}

/// A record with its text fields decrypted.
///
/// Fields listed in `failures` hold the empty string in `record`; the stored
/// envelope is never shown in their place.
#[derive(Debug)]
pub struct DecodedRecord {
    pub record: RawRecord,
    pub failures: Vec<FieldFailure>,
}

impl DecodedRecord {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-session field encryption.
pub struct FieldCodec<'a> {
    session: &'a Session,
}

impl<'a> FieldCodec<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Display value of a stored field.
    pub fn decrypt_field(&self, value: Option<&str>) -> Result<String, CryptoError> {
        match value {
            None | Some("") => Ok(String::new()),
            Some(v) => decrypt(self.session.key(), v),
        }
    }

    /// Stored value for an edited field.
    ///
    /// A value that is already a well-formed envelope is kept as is, whatever
    /// key sealed it. Text that merely starts with the marker is user content
    /// and is encrypted.
    pub fn encrypt_field(&self, value: Option<&str>) -> Result<String, CryptoError> {
        match value {
            None | Some("") => Ok(String::new()),
            Some(v) if Envelope::parse(v).is_ok() => Ok(v.to_string()),
            Some(v) => encrypt(self.session.key(), v),
        }
    }

    /// Decrypt every text field of `raw`.
    ///
    /// Non-text columns are carried over untouched; unknown field names are
    /// dropped.
    pub fn decode_record(&self, collection: Collection, raw: &RawRecord) -> DecodedRecord {
        let mut fields = FieldMap::new();
        let mut failures = Vec::new();

        for name in collection.text_fields() {
            let value = match self.decrypt_field(raw.field(name)) {
                Ok(plaintext) => plaintext,
                Err(error) => {
                    warn!(
                        collection = %collection,
                        id = %raw.id,
                        field = *name,
                        error = %error,
                        "field could not be decrypted"
                    );
                    failures.push(FieldFailure {
                        field: name.to_string(),
                        error,
                    });
                    String::new()
                }
            };
            fields.insert(name.to_string(), Some(value));
        }

        DecodedRecord {
            record: RawRecord {
                id: raw.id.clone(),
                owner_id: raw.owner_id.clone(),
                fields,
                completed: raw.completed,
                created_at: raw.created_at,
            },
            failures,
        }
    }

    /// Encrypt the text fields present in `fields`.
    ///
    /// Only fields of `collection` are returned; the first encryption
    /// failure aborts the whole map.
    pub fn encode_fields(
        &self,
        collection: Collection,
        fields: &FieldMap,
    ) -> Result<FieldMap, CryptoError> {
        fields
            .iter()
            .filter(|(name, _)| collection.is_text_field(name))
            .map(|(name, value)| {
                self.encrypt_field(value.as_deref())
                    .map(|stored| (name.clone(), Some(stored)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jotter_crypto::{is_encrypted, SymmetricKey};

    fn session() -> Session {
        Session::detached("user-1", SymmetricKey::generate(false).unwrap())
    }

    fn raw(fields: &[(&str, Option<&str>)]) -> RawRecord {
        RawRecord {
            id: "rec-1".into(),
            owner_id: "user-1".into(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            completed: Some(false),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_and_absent_fields_skip_the_cipher() {
        let session = session();
        let codec = FieldCodec::new(&session);
        assert_eq!(codec.encrypt_field(None).unwrap(), "");
        assert_eq!(codec.encrypt_field(Some("")).unwrap(), "");
        assert_eq!(codec.decrypt_field(None).unwrap(), "");
        assert_eq!(codec.decrypt_field(Some("")).unwrap(), "");
    }

    #[test]
    fn encrypt_then_decrypt_field() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let stored = codec.encrypt_field(Some("buy milk")).unwrap();
        assert!(is_encrypted(&stored));
        assert_eq!(codec.decrypt_field(Some(&stored)).unwrap(), "buy milk");
    }

    #[test]
    fn valid_envelope_is_not_wrapped_twice() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let stored = codec.encrypt_field(Some("once")).unwrap();
        assert_eq!(codec.encrypt_field(Some(&stored)).unwrap(), stored);
    }

    #[test]
    fn envelope_from_another_key_is_kept_and_fails_on_read() {
        let session = session();
        let other = Session::detached("user-2", SymmetricKey::generate(false).unwrap());
        let foreign = FieldCodec::new(&other).encrypt_field(Some("x")).unwrap();

        let codec = FieldCodec::new(&session);
        let stored = codec.encrypt_field(Some(&foreign)).unwrap();
        assert_eq!(stored, foreign);
        assert!(codec.decrypt_field(Some(&stored)).unwrap_err().is_decryption_error());
    }

    #[test]
    fn marker_prefixed_user_text_is_encrypted() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let stored = codec.encrypt_field(Some("enc: my note about encryption")).unwrap();
        assert_ne!(stored, "enc: my note about encryption");
        assert_eq!(
            codec.decrypt_field(Some(&stored)).unwrap(),
            "enc: my note about encryption"
        );
    }

    #[test]
    fn legacy_plaintext_decodes_as_is() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let decoded = codec.decode_record(
            Collection::Ideas,
            &raw(&[("title", Some("hello")), ("description", None)]),
        );
        assert!(decoded.is_complete());
        assert_eq!(decoded.record.field("title"), Some("hello"));
        assert_eq!(decoded.record.field("description"), Some(""));
    }

    #[test]
    fn corrupted_field_is_reported_and_blanked() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let good = codec.encrypt_field(Some("fine")).unwrap();
        let decoded = codec.decode_record(
            Collection::Ideas,
            &raw(&[("title", Some(good.as_str())), ("description", Some("enc:AAAA:BBBB"))]),
        );

        assert_eq!(decoded.record.field("title"), Some("fine"));
        assert_eq!(decoded.record.field("description"), Some(""));
        assert_eq!(decoded.failures.len(), 1);
        assert_eq!(decoded.failures[0].field, "description");
        assert!(decoded.failures[0].error.is_decryption_error());
    }

    #[test]
    fn wrong_key_is_reported() {
        let writer = session();
        let reader = session();
        let stored = FieldCodec::new(&writer).encrypt_field(Some("x")).unwrap();
        let decoded = FieldCodec::new(&reader)
            .decode_record(Collection::Thoughts, &raw(&[("content", Some(stored.as_str()))]));
        assert_eq!(decoded.failures.len(), 1);
        assert_eq!(decoded.record.field("content"), Some(""));
    }

    #[test]
    fn decode_keeps_only_text_fields_and_metadata() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let source = raw(&[("content", Some("c")), ("mood", Some("happy"))]);
        let decoded = codec.decode_record(Collection::Thoughts, &source);
        assert_eq!(decoded.record.fields.len(), 1);
        assert_eq!(decoded.record.id, source.id);
        assert_eq!(decoded.record.created_at, source.created_at);
        assert_eq!(decoded.record.completed, Some(false));
    }

    #[test]
    fn encode_fields_encrypts_text_fields_only() {
        let session = session();
        let codec = FieldCodec::new(&session);
        let mut fields = FieldMap::new();
        fields.insert("title".into(), Some("t".into()));
        fields.insert("description".into(), None);
        fields.insert("color".into(), Some("red".into()));

        let encoded = codec.encode_fields(Collection::Tasks, &fields).unwrap();
        assert_eq!(encoded.len(), 2);
        assert!(is_encrypted(encoded["title"].as_deref().unwrap()));
        assert_eq!(encoded["description"], Some(String::new()));
    }
}

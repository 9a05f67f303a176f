//! Field-level encryption of JSON records.
//!
//! Sensitive top-level fields are replaced in place by an envelope:
//!
//! ```json
//! { "_encrypted": true, "data": "<b64 ciphertext>", "iv": "<b64 nonce>", "keyVersion": 2 }
//! ```
//!
//! Strings are sealed as their raw UTF-8 bytes, every other value as its JSON
//! text. On the way out the plaintext is parsed as JSON first and falls back
//! to a plain string, so a string field holding `"123"` comes back as the
//! number `123`.

use crate::error::{VaultError, VaultResult};
use crate::key_manager::KeyManager;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use haven_audit::{AuditContext, AuditRecorder};
use haven_crypto::{DataKey, EncryptedData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

const ENVELOPE_MARKER: &str = "_encrypted";

/// Wire form of one encrypted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    #[serde(rename = "_encrypted")]
    pub encrypted: bool,
    pub data: String,
    pub iv: String,
    #[serde(rename = "keyVersion")]
    pub key_version: u32,
}

impl EncryptedField {
    pub fn seal(data: &EncryptedData, key_version: u32) -> Self {
        Self {
            encrypted: true,
            data: STANDARD.encode(&data.ciphertext),
            iv: STANDARD.encode(data.nonce),
            key_version,
        }
    }

    /// Whether a value claims to be an envelope (`"_encrypted": true`).
    pub fn is_envelope(value: &Value) -> bool {
        value.get(ENVELOPE_MARKER) == Some(&Value::Bool(true))
    }

    pub fn from_value(value: &Value) -> VaultResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| VaultError::MalformedEnvelope(e.to_string()))
    }

    pub fn to_value(&self) -> VaultResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes the base64 parts, validating the nonce length.
    pub fn encrypted_data(&self) -> VaultResult<EncryptedData> {
        let ciphertext = STANDARD
            .decode(&self.data)
            .map_err(|e| VaultError::MalformedEnvelope(format!("data: {e}")))?;
        let nonce = STANDARD
            .decode(&self.iv)
            .map_err(|e| VaultError::MalformedEnvelope(format!("iv: {e}")))?;
        EncryptedData::from_parts(ciphertext, &nonce)
            .map_err(|e| VaultError::MalformedEnvelope(e.to_string()))
    }
}

/// A field left encrypted because it could not be opened.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: String,
    /// Version named by the envelope, when it could be read.
    pub key_version: Option<u32>,
    pub error: VaultError,
}

/// Output of [`FieldEncryptor::decrypt_record`].
#[derive(Debug)]
pub struct DecryptedRecord {
    pub record: Value,
    pub failures: Vec<FieldFailure>,
}

impl DecryptedRecord {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct FieldEncryptor {
    keys: Arc<KeyManager>,
    audit: Arc<AuditRecorder>,
}

impl FieldEncryptor {
    pub fn new(keys: Arc<KeyManager>, audit: Arc<AuditRecorder>) -> Self {
        Self { keys, audit }
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Encrypts the named top-level fields under the user's current key.
    ///
    /// Absent fields and fields already holding an envelope are left alone,
    /// as is every field not named.
    pub async fn encrypt_record(
        &self,
        user_id: &str,
        record: &Value,
        sensitive_fields: &[&str],
    ) -> VaultResult<Value> {
        let obj = as_object(record)?;
        let targets: Vec<&str> = sensitive_fields
            .iter()
            .copied()
            .filter(|f| obj.get(*f).is_some_and(|v| !EncryptedField::is_envelope(v)))
            .collect();

        let mut out = obj.clone();
        if targets.is_empty() {
            return Ok(Value::Object(out));
        }

        let (key, version) = self.keys.get_or_create_user_key(user_id).await?;
        for field in targets {
            let Some(value) = obj.get(field) else {
                continue;
            };
            let plaintext = match value {
                Value::String(s) => s.as_bytes().to_vec(),
                other => serde_json::to_vec(other)?,
            };
            out.insert(field.to_string(), self.seal(&key, version, &plaintext)?);
        }
        debug!("encrypted fields for user {user_id} under key version {version}");

        Ok(Value::Object(out))
    }

    /// Decrypts every envelope in the record.
    ///
    /// A field that cannot be opened stays in its encrypted form, is listed
    /// in [`DecryptedRecord::failures`] and is recorded as a
    /// `field_decrypt_failed` audit event. Only a non-object record is an
    /// error.
    pub async fn decrypt_record(
        &self,
        ctx: &AuditContext,
        record: &Value,
    ) -> VaultResult<DecryptedRecord> {
        let obj = as_object(record)?;
        let mut out = Map::with_capacity(obj.len());
        let mut failures = Vec::new();

        for (field, value) in obj {
            if !EncryptedField::is_envelope(value) {
                out.insert(field.clone(), value.clone());
                continue;
            }

            let opened = self
                .open(&ctx.user_id, value)
                .await
                .and_then(|(_, plaintext)| parse_plaintext(plaintext));
            match opened {
                Ok(plain) => {
                    out.insert(field.clone(), plain);
                }
                Err(error) => {
                    let key_version = envelope_version(value);
                    self.report_failure(ctx, field, key_version, &error).await;
                    failures.push(FieldFailure {
                        field: field.clone(),
                        key_version,
                        error,
                    });
                    out.insert(field.clone(), value.clone());
                }
            }
        }

        Ok(DecryptedRecord {
            record: Value::Object(out),
            failures,
        })
    }

    /// Seals raw plaintext into an envelope value.
    pub(crate) fn seal(&self, key: &DataKey, version: u32, plaintext: &[u8]) -> VaultResult<Value> {
        let data = self.keys.cipher().encrypt(key, plaintext)?;
        EncryptedField::seal(&data, version).to_value()
    }

    /// Opens an envelope value with the key for its own version.
    pub(crate) async fn open(
        &self,
        user_id: &str,
        value: &Value,
    ) -> VaultResult<(EncryptedField, Vec<u8>)> {
        let envelope = EncryptedField::from_value(value)?;
        let data = envelope.encrypted_data()?;
        let key = self
            .keys
            .key_for_version(user_id, envelope.key_version)
            .await?;
        let plaintext = self.keys.cipher().decrypt(&key, &data)?;
        Ok((envelope, plaintext))
    }

    pub(crate) async fn report_failure(
        &self,
        ctx: &AuditContext,
        field: &str,
        key_version: Option<u32>,
        error: &VaultError,
    ) {
        warn!(
            "could not decrypt field {field} for user {} (key version {key_version:?}): {error}",
            ctx.user_id
        );
        let details = json!({
            "field": field,
            "keyVersion": key_version,
            "reason": error.to_string(),
        });
        self.audit
            .log_event(
                ctx,
                "field_decrypt_failed",
                "encrypted_field",
                details.as_object().cloned(),
                Some(field),
            )
            .await;
    }
}

pub(crate) fn as_object(record: &Value) -> VaultResult<&Map<String, Value>> {
    record
        .as_object()
        .ok_or_else(|| VaultError::InvalidRecord("expected a JSON object".to_string()))
}

pub(crate) fn envelope_version(value: &Value) -> Option<u32> {
    value
        .get("keyVersion")?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
}

fn parse_plaintext(plaintext: Vec<u8>) -> VaultResult<Value> {
    if let Ok(value) = serde_json::from_slice(&plaintext) {
        return Ok(value);
    }
    String::from_utf8(plaintext)
        .map(Value::String)
        .map_err(|_| VaultError::Decryption("plaintext is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_detection_requires_true_marker() {
        assert!(EncryptedField::is_envelope(&json!({"_encrypted": true})));
        assert!(!EncryptedField::is_envelope(&json!({"_encrypted": "true"})));
        assert!(!EncryptedField::is_envelope(&json!({"_encrypted": false})));
        assert!(!EncryptedField::is_envelope(&json!("_encrypted")));
    }

    #[test]
    fn short_iv_is_malformed() {
        let field = EncryptedField {
            encrypted: true,
            data: STANDARD.encode([0u8; 20]),
            iv: STANDARD.encode([0u8; 8]),
            key_version: 1,
        };
        assert!(matches!(
            field.encrypted_data(),
            Err(VaultError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn plaintext_prefers_json() {
        assert_eq!(parse_plaintext(b"123".to_vec()).unwrap(), json!(123));
        assert_eq!(parse_plaintext(b"{\"a\":1}".to_vec()).unwrap(), json!({"a": 1}));
        assert_eq!(parse_plaintext(b"hello".to_vec()).unwrap(), json!("hello"));
        assert!(matches!(
            parse_plaintext(vec![0xff, 0xfe]),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn wire_shape_field_names() {
        let data = EncryptedData {
            ciphertext: vec![1, 2, 3],
            nonce: [7u8; 12],
        };
        let value = EncryptedField::seal(&data, 4).to_value().unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["_encrypted", "data", "iv", "keyVersion"]);
        assert_eq!(value["keyVersion"], 4);
    }
}

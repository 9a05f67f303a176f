//! Re-encryption of stored records under the user's current key.
//!
//! Run after rotations to move old ciphertext forward, so older key
//! versions can eventually be pruned.

use crate::error::VaultResult;
use crate::field::{EncryptedField, FieldEncryptor, FieldFailure, as_object, envelope_version};
use haven_audit::AuditContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Result of migrating one record.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub record: Value,
    /// Fields re-sealed under the current key.
    pub migrated: Vec<String>,
    /// Fields left untouched because they could not be opened.
    pub failures: Vec<FieldFailure>,
}

impl MigrationOutcome {
    pub fn changed(&self) -> bool {
        !self.migrated.is_empty()
    }
}

pub struct KeyMigration {
    fields: Arc<FieldEncryptor>,
}

impl KeyMigration {
    pub fn new(fields: Arc<FieldEncryptor>) -> Self {
        Self { fields }
    }

    /// Re-seals every envelope whose version differs from the current one.
    ///
    /// The raw plaintext bytes are carried over unchanged, so the decrypted
    /// value is identical before and after.
    pub async fn migrate_record(
        &self,
        ctx: &AuditContext,
        record: &Value,
    ) -> VaultResult<MigrationOutcome> {
        let user_id = ctx.user_id.as_str();
        let obj = as_object(record)?;

        let mut out = obj.clone();
        let mut migrated = Vec::new();
        let mut failures = Vec::new();

        let has_envelopes = obj.values().any(EncryptedField::is_envelope);
        if !has_envelopes {
            return Ok(MigrationOutcome {
                record: Value::Object(out),
                migrated,
                failures,
            });
        }

        let (current_key, current_version) =
            self.fields.key_manager().get_or_create_user_key(user_id).await?;

        for (field, value) in obj {
            if !EncryptedField::is_envelope(value) {
                continue;
            }

            match self.fields.open(user_id, value).await {
                Ok((envelope, _)) if envelope.key_version == current_version => {}
                Ok((envelope, plaintext)) => {
                    let sealed = self.fields.seal(&current_key, current_version, &plaintext)?;
                    out.insert(field.clone(), sealed);
                    migrated.push(field.clone());
                    info!(
                        "migrated field {field} for user {user_id} from key version {} to {current_version}",
                        envelope.key_version
                    );
                }
                Err(error) => {
                    let key_version = envelope_version(value);
                    self.fields
                        .report_failure(ctx, field, key_version, &error)
                        .await;
                    failures.push(FieldFailure {
                        field: field.clone(),
                        key_version,
                        error,
                    });
                }
            }
        }

        Ok(MigrationOutcome {
            record: Value::Object(out),
            migrated,
            failures,
        })
    }
}

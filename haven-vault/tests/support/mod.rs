//! Shared fixtures for vault integration tests.

#![allow(dead_code)]

use haven_audit::{AuditConfig, AuditContext, AuditLog, AuditRecorder};
use haven_crypto::{Aes256GcmCipher, Cipher, CryptoError, CryptoResult, DataKey, EncryptedData};
use haven_storage::{KeyValueStore, MemoryStore};
use haven_vault::{FieldEncryptor, KeyManager, KeyPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic stand-in cipher: XOR keystream with a counter nonce and a
/// 4-byte key tag, so a wrong key still fails closed.
#[derive(Default)]
pub struct XorCipher {
    counter: AtomicU64,
}

const XOR_TAG: usize = 4;

impl XorCipher {
    fn apply(key: &DataKey, nonce: &[u8; 12], input: &[u8]) -> Vec<u8> {
        let key = key.as_bytes();
        input
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()] ^ nonce[i % nonce.len()])
            .collect()
    }
}

impl Cipher for XorCipher {
    fn encrypt(&self, key: &DataKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut nonce = [0u8; 12];
        nonce[..8].copy_from_slice(&n.to_le_bytes());

        let mut ciphertext = Self::apply(key, &nonce, plaintext);
        ciphertext.extend_from_slice(&key.as_bytes()[..XOR_TAG]);
        Ok(EncryptedData { ciphertext, nonce })
    }

    fn decrypt(&self, key: &DataKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
        let split = data
            .ciphertext
            .len()
            .checked_sub(XOR_TAG)
            .ok_or_else(|| CryptoError::Decryption("ciphertext too short".to_string()))?;
        let (body, tag) = data.ciphertext.split_at(split);
        if tag != &key.as_bytes()[..XOR_TAG] {
            return Err(CryptoError::Decryption("tag mismatch".to_string()));
        }
        Ok(Self::apply(key, &data.nonce, body))
    }

    fn algorithm(&self) -> &'static str {
        "XOR-TEST"
    }
}

pub struct Haven {
    pub store: Arc<dyn KeyValueStore>,
    pub keys: Arc<KeyManager>,
    pub recorder: Arc<AuditRecorder>,
    pub log: AuditLog,
    pub fields: Arc<FieldEncryptor>,
}

pub fn haven_on(store: Arc<dyn KeyValueStore>, cipher: Arc<dyn Cipher>, policy: KeyPolicy) -> Haven {
    let keys = Arc::new(KeyManager::new(store.clone(), cipher, policy));
    let log = AuditLog::new(store.clone());
    let recorder = Arc::new(AuditRecorder::new(log.clone(), AuditConfig::default()));
    let fields = Arc::new(FieldEncryptor::new(keys.clone(), recorder.clone()));
    Haven {
        store,
        keys,
        recorder,
        log,
        fields,
    }
}

pub fn haven_with(cipher: Arc<dyn Cipher>, policy: KeyPolicy) -> Haven {
    haven_on(Arc::new(MemoryStore::new()), cipher, policy)
}

/// Real AES-256-GCM over an in-memory store.
pub fn haven() -> Haven {
    haven_with(Arc::new(Aes256GcmCipher::new()), KeyPolicy::default())
}

/// Deterministic fake cipher over an in-memory store.
pub fn fake_haven() -> Haven {
    haven_with(Arc::new(XorCipher::default()), KeyPolicy::default())
}

pub fn ctx(user_id: &str) -> AuditContext {
    AuditContext::new(user_id, "session-1")
}

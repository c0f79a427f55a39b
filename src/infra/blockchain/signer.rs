//! Local ed25519 transaction signer.
//!
//! Keeps signing out of the RPC client so that raw key material lives only
//! behind the `TransactionSigner` seam.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::{BlockchainError, TransactionSigner};

/// Parse a base58 private key (32-byte seed or 64-byte Solana keypair).
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, BlockchainError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| BlockchainError::InvalidSignature(e.to_string()))?;

    let key_array: [u8; 32] = match key_bytes.len() {
        // Solana keypair format: first 32 bytes are the secret key
        64 => key_bytes[..32]
            .try_into()
            .map_err(|_| BlockchainError::InvalidSignature("Invalid keypair format".to_string()))?,
        32 => key_bytes.try_into().map_err(|v: Vec<u8>| {
            BlockchainError::InvalidSignature(format!("Key must be 32 bytes, got {}", v.len()))
        })?,
        other => {
            return Err(BlockchainError::InvalidSignature(format!(
                "Key must be 32 or 64 bytes, got {other}"
            )));
        }
    };

    Ok(SigningKey::from_bytes(&key_array))
}

/// Signer holding the secret in memory; the key is parsed only while signing.
pub struct LocalSigner {
    secret: SecretString,
    public_key_base58: String,
}

impl LocalSigner {
    /// Build a local signer from a Base58-encoded secret.
    pub fn new(secret: SecretString) -> Result<Self, BlockchainError> {
        let signing_key = signing_key_from_base58(&secret)?;
        let public_key_base58 = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        Ok(Self {
            secret,
            public_key_base58,
        })
    }

    /// Ephemeral keypair for development when no issuer key is configured.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            secret: SecretString::from(bs58::encode(signing_key.to_bytes()).into_string()),
            public_key_base58: bs58::encode(signing_key.verifying_key().as_bytes()).into_string(),
        }
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    async fn sign_message(&self, message: &[u8]) -> Result<String, BlockchainError> {
        let signing_key = signing_key_from_base58(&self.secret)?;
        let signature = signing_key.sign(message);
        Ok(bs58::encode(signature.to_bytes()).into_string())
    }

    fn public_key(&self) -> String {
        self.public_key_base58.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_from_base58_valid_32_bytes() {
        let original = SigningKey::generate(&mut OsRng);
        let secret = SecretString::from(bs58::encode(original.to_bytes()).into_string());
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.to_bytes(), original.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_valid_64_bytes() {
        let original = SigningKey::generate(&mut OsRng);
        let mut keypair = original.to_bytes().to_vec();
        keypair.extend_from_slice(original.verifying_key().as_bytes());
        let secret = SecretString::from(bs58::encode(&keypair).into_string());
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.verifying_key(), original.verifying_key());
    }

    #[test]
    fn test_signing_key_from_base58_invalid() {
        let secret = SecretString::from("invalid-base58!!!");
        assert!(signing_key_from_base58(&secret).is_err());
    }

    #[test]
    fn test_signing_key_from_base58_wrong_length() {
        for len in [16usize, 48] {
            let secret = SecretString::from(bs58::encode(vec![0u8; len]).into_string());
            assert!(signing_key_from_base58(&secret).is_err());
        }
    }

    #[tokio::test]
    async fn test_local_signer_signs_deterministically() {
        let signer = LocalSigner::generate();
        let sig1 = signer.sign_message(b"test message").await.unwrap();
        let sig2 = signer.sign_message(b"test message").await.unwrap();
        let sig3 = signer.sign_message(b"different message").await.unwrap();
        assert_eq!(sig1, sig2);
        assert_ne!(sig1, sig3);
        assert_eq!(bs58::decode(&sig1).into_vec().unwrap().len(), 64);
    }

    #[test]
    fn test_local_signer_public_key_matches_secret() {
        let original = SigningKey::generate(&mut OsRng);
        let secret = SecretString::from(bs58::encode(original.to_bytes()).into_string());
        let signer = LocalSigner::new(secret).unwrap();
        assert_eq!(
            signer.public_key(),
            bs58::encode(original.verifying_key().as_bytes()).into_string()
        );
    }
}

//! Symmetric encryption for file records.

use std::fmt;
use std::str::FromStr;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Draws from the OS source before falling back to a newline-free one.
const IV_ATTEMPTS: usize = 8;

// == Cipher Kind ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CipherKind {
    /// AES-128 in CBC mode with PKCS#7 padding
    #[default]
    Aes128Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

impl CipherKind {
    pub fn key_length(self) -> usize {
        match self {
            CipherKind::Aes128Cbc | CipherKind::Aes128Gcm => 16,
            CipherKind::Aes256Gcm => 32,
        }
    }

    /// One block for CBC, the 96-bit nonce for GCM.
    pub fn iv_length(self) -> usize {
        match self {
            CipherKind::Aes128Cbc => 16,
            CipherKind::Aes128Gcm | CipherKind::Aes256Gcm => 12,
        }
    }
}

impl FromStr for CipherKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "aes128cbc" => Ok(CipherKind::Aes128Cbc),
            "aes128gcm" => Ok(CipherKind::Aes128Gcm),
            "aes256gcm" => Ok(CipherKind::Aes256Gcm),
            other => Err(CacheError::Cipher(format!("unsupported cipher '{}'", other))),
        }
    }
}

// == Record Cipher ==
/// Cipher plus the key derived from the store secret.
#[derive(Clone)]
pub struct RecordCipher {
    kind: CipherKind,
    key: Vec<u8>,
}

impl RecordCipher {
    /// Derives the key as SHA-256 of `secret`, truncated to the key length.
    pub fn new(kind: CipherKind, secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        Self {
            kind,
            key: digest[..kind.key_length()].to_vec(),
        }
    }

    /// Uses `key` as is, whatever its length.
    #[cfg(test)]
    pub(crate) fn with_raw_key(kind: CipherKind, key: Vec<u8>) -> Self {
        Self { kind, key }
    }

    pub fn iv_length(&self) -> usize {
        self.kind.iv_length()
    }

    // == IV ==
    /// Fresh random IV without any `\n` byte.
    pub fn generate_iv(&self) -> Vec<u8> {
        let mut iv = vec![0u8; self.iv_length()];
        for _ in 0..IV_ATTEMPTS {
            OsRng.fill_bytes(&mut iv);
            if !iv.contains(&b'\n') {
                return iv;
            }
        }

        let mut rng = rand::rng();
        iv.iter_mut().for_each(|b| {
            let drawn: u8 = rng.random_range(0..=254);
            *b = if drawn >= b'\n' { drawn + 1 } else { drawn };
        });
        iv
    }

    // == Encrypt / Decrypt ==
    pub fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.check_iv(iv)?;
        match self.kind {
            CipherKind::Aes128Cbc => Ok(Aes128CbcEnc::new_from_slices(&self.key, iv)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            CipherKind::Aes128Gcm => Aes128Gcm::new_from_slice(&self.key)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .encrypt(Nonce::from_slice(iv), plaintext)
                .map_err(|e| CacheError::Cipher(format!("encryption failed: {}", e))),
            CipherKind::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .encrypt(Nonce::from_slice(iv), plaintext)
                .map_err(|e| CacheError::Cipher(format!("encryption failed: {}", e))),
        }
    }

    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.check_iv(iv)?;
        match self.kind {
            CipherKind::Aes128Cbc => Aes128CbcDec::new_from_slices(&self.key, iv)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|e| CacheError::Cipher(format!("decryption failed: {}", e))),
            CipherKind::Aes128Gcm => Aes128Gcm::new_from_slice(&self.key)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .decrypt(Nonce::from_slice(iv), ciphertext)
                .map_err(|e| CacheError::Cipher(format!("decryption failed: {}", e))),
            CipherKind::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| CacheError::Cipher(e.to_string()))?
                .decrypt(Nonce::from_slice(iv), ciphertext)
                .map_err(|e| CacheError::Cipher(format!("decryption failed: {}", e))),
        }
    }

    fn check_iv(&self, iv: &[u8]) -> Result<()> {
        if iv.len() != self.iv_length() {
            return Err(CacheError::Cipher(format!(
                "IV must be {} bytes, got {}",
                self.iv_length(),
                iv.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCipher")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [CipherKind; 3] = [
        CipherKind::Aes128Cbc,
        CipherKind::Aes128Gcm,
        CipherKind::Aes256Gcm,
    ];

    #[test]
    fn test_default_is_cbc() {
        assert_eq!(CipherKind::default(), CipherKind::Aes128Cbc);
        assert_eq!(CipherKind::Aes128Cbc.iv_length(), 16);
        assert_eq!(CipherKind::Aes128Gcm.iv_length(), 12);
        assert_eq!(CipherKind::Aes256Gcm.key_length(), 32);
    }

    #[test]
    fn test_roundtrip_every_kind() {
        for kind in ALL_KINDS {
            let cipher = RecordCipher::new(kind, b"secret");
            let iv = cipher.generate_iv();
            assert_eq!(iv.len(), kind.iv_length());

            let sealed = cipher.encrypt(&iv, b"hello").unwrap();
            assert_ne!(sealed, b"hello");
            assert_eq!(cipher.decrypt(&iv, &sealed).unwrap(), b"hello");
        }
    }

    #[test]
    fn test_cbc_pads_to_whole_blocks() {
        let cipher = RecordCipher::new(CipherKind::Aes128Cbc, b"secret");
        let iv = cipher.generate_iv();
        assert_eq!(cipher.encrypt(&iv, b"").unwrap().len(), 16);
        assert_eq!(cipher.encrypt(&iv, &[7u8; 16]).unwrap().len(), 32);
        assert_eq!(cipher.encrypt(&iv, &[7u8; 20]).unwrap().len(), 32);
    }

    #[test]
    fn test_wrong_secret_fails() {
        // CBC can unpad garbage by chance, so only GCM is checked for a hard failure.
        let writer = RecordCipher::new(CipherKind::Aes128Gcm, b"one");
        let reader = RecordCipher::new(CipherKind::Aes128Gcm, b"two");
        let iv = writer.generate_iv();
        let sealed = writer.encrypt(&iv, b"payload").unwrap();
        assert!(matches!(
            reader.decrypt(&iv, &sealed),
            Err(CacheError::Cipher(_))
        ));

        let writer = RecordCipher::new(CipherKind::Aes128Cbc, b"one");
        let reader = RecordCipher::new(CipherKind::Aes128Cbc, b"two");
        let iv = writer.generate_iv();
        let sealed = writer.encrypt(&iv, b"payload").unwrap();
        assert_ne!(reader.decrypt(&iv, &sealed).ok(), Some(b"payload".to_vec()));
    }

    #[test]
    fn test_truncated_cbc_ciphertext_fails() {
        let cipher = RecordCipher::new(CipherKind::Aes128Cbc, b"s");
        let iv = cipher.generate_iv();
        let sealed = cipher.encrypt(&iv, b"payload").unwrap();
        assert!(matches!(
            cipher.decrypt(&iv, &sealed[..sealed.len() - 3]),
            Err(CacheError::Cipher(_))
        ));
    }

    #[test]
    fn test_bad_iv_length() {
        for kind in ALL_KINDS {
            let cipher = RecordCipher::new(kind, b"s");
            assert!(cipher.encrypt(&[0u8; 4], b"x").is_err());
        }
    }

    #[test]
    fn test_bad_key_length_fails_encrypt() {
        for kind in ALL_KINDS {
            let cipher = RecordCipher::with_raw_key(kind, vec![1, 2, 3]);
            let iv = cipher.generate_iv();
            assert!(matches!(
                cipher.encrypt(&iv, b"x"),
                Err(CacheError::Cipher(_))
            ));
        }
    }

    #[test]
    fn test_iv_never_contains_newline() {
        for kind in ALL_KINDS {
            let cipher = RecordCipher::new(kind, b"s");
            for _ in 0..200 {
                let iv = cipher.generate_iv();
                assert_eq!(iv.len(), kind.iv_length());
                assert!(!iv.contains(&b'\n'));
            }
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("aes128cbc".parse::<CipherKind>().unwrap(), CipherKind::Aes128Cbc);
        assert_eq!("aes128gcm".parse::<CipherKind>().unwrap(), CipherKind::Aes128Gcm);
        assert_eq!("AES-256-GCM".parse::<CipherKind>().unwrap(), CipherKind::Aes256Gcm);
        assert!("rot13".parse::<CipherKind>().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = RecordCipher::new(CipherKind::Aes128Cbc, b"s");
        assert!(!format!("{:?}", cipher).contains("key"));
    }
}

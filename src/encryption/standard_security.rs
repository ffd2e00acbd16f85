//! Standard security handler
//!
//! Password authentication and file-key derivation for the `/Filter
//! /Standard` encryption dictionary, ISO 32000-1 Section 7.6.3.
//! Revisions 2-4 (RC4-based) derive a usable file key; revision 5
//! authenticates via SHA-256 salted hashes.

use sha2::{Digest, Sha256};

use crate::parser::objects::PdfDictionary;
use crate::parser::{ParseError, ParseResult};

use super::permissions::Permissions;
use super::rc4::{rc4_decrypt, Rc4Key};

/// Standard padding string from Algorithm 2 (ISO 32000-1)
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Standard security handler state
#[derive(Debug, Clone)]
pub struct StandardSecurityHandler {
    version: i32,
    revision: i32,
    key_length: usize,
    owner_hash: Vec<u8>,
    user_hash: Vec<u8>,
    permissions: Permissions,
    encrypt_metadata: bool,
    file_id: Vec<u8>,
    file_key: Vec<u8>,
}

impl StandardSecurityHandler {
    /// Build a handler from the /Encrypt dictionary and the first element
    /// of the trailer /ID array.
    pub fn from_dict(dict: &PdfDictionary, file_id: Vec<u8>) -> ParseResult<Self> {
        let revision = dict
            .get("R")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| ParseError::MissingKey("R".to_string()))? as i32;

        match revision {
            2 | 3 | 4 | 5 => {}
            _ => {
                return Err(ParseError::UnsupportedEncryption(format!(
                    "Standard security revision {revision}"
                )))
            }
        }

        let version = dict.get("V").and_then(|o| o.as_integer()).unwrap_or(0) as i32;

        let owner_hash = dict
            .get("O")
            .and_then(|o| o.as_string())
            .ok_or_else(|| ParseError::MissingKey("O".to_string()))?
            .as_bytes()
            .to_vec();

        let user_hash = dict
            .get("U")
            .and_then(|o| o.as_string())
            .ok_or_else(|| ParseError::MissingKey("U".to_string()))?
            .as_bytes()
            .to_vec();

        let p = dict
            .get("P")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| ParseError::MissingKey("P".to_string()))? as i32;

        let key_length = match revision {
            2 => 5,
            5 => 32,
            _ => {
                let bits = dict.get("Length").and_then(|o| o.as_integer()).unwrap_or(40);
                ((bits / 8).clamp(5, 16)) as usize
            }
        };

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(|o| o.as_bool())
            .unwrap_or(true);

        Ok(Self {
            version,
            revision,
            key_length,
            owner_hash,
            user_hash,
            permissions: Permissions::from_bits(p as u32),
            encrypt_metadata,
            file_id,
            file_key: Vec::new(),
        })
    }

    /// Try the password first as a user password, then as an owner
    /// password. On success the file key is available via [`Self::file_key`].
    pub fn authenticate(&mut self, password: &[u8]) -> bool {
        self.authenticate_user(password) || self.authenticate_owner(password)
    }

    fn authenticate_user(&mut self, password: &[u8]) -> bool {
        if self.revision == 5 {
            // Algorithm 11: validation salt sits at U[32..40]
            if self.user_hash.len() < 48 {
                return false;
            }
            let mut hasher = Sha256::new();
            hasher.update(password);
            hasher.update(&self.user_hash[32..40]);
            let digest = hasher.finalize();
            return digest.as_slice() == &self.user_hash[..32];
        }

        let key = self.compute_file_key(password);
        let expected = self.compute_user_hash(&key);
        let check_len = if self.revision == 2 { 32 } else { 16 };
        if self.user_hash.len() < check_len || expected.len() < check_len {
            return false;
        }
        if expected[..check_len] == self.user_hash[..check_len] {
            self.file_key = key;
            true
        } else {
            false
        }
    }

    fn authenticate_owner(&mut self, password: &[u8]) -> bool {
        if self.revision == 5 {
            // Algorithm 12: owner validation includes the full U entry
            if self.owner_hash.len() < 48 || self.user_hash.len() < 48 {
                return false;
            }
            let mut hasher = Sha256::new();
            hasher.update(password);
            hasher.update(&self.owner_hash[32..40]);
            hasher.update(&self.user_hash[..48]);
            let digest = hasher.finalize();
            return digest.as_slice() == &self.owner_hash[..32];
        }

        // Algorithm 7: recover the user password from /O, then authenticate
        // with it
        let mut digest = md5::compute(pad_password(password)).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest).to_vec();
            }
        }
        let rc4_key = &digest[..self.key_length.min(digest.len())];

        if self.owner_hash.len() < 32 {
            return false;
        }
        let user_password = if self.revision == 2 {
            rc4_decrypt(&Rc4Key::from_slice(rc4_key), &self.owner_hash[..32])
        } else {
            let mut data = self.owner_hash[..32].to_vec();
            for i in (0..=19u8).rev() {
                let step_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
                data = rc4_decrypt(&Rc4Key::new(step_key), &data);
            }
            data
        };

        self.authenticate_user(&user_password)
    }

    /// Algorithm 2: derive the file encryption key from a password.
    fn compute_file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(84);
        data.extend_from_slice(&pad_password(password));
        data.extend_from_slice(&self.owner_hash[..self.owner_hash.len().min(32)]);
        data.extend_from_slice(&self.permissions.bits().to_le_bytes());
        data.extend_from_slice(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        }

        let mut digest = md5::compute(&data).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..self.key_length]).to_vec();
            }
        }
        digest.truncate(self.key_length);
        digest
    }

    /// Algorithms 4/5: the expected /U value for a file key.
    fn compute_user_hash(&self, key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return rc4_decrypt(&Rc4Key::from_slice(key), &PASSWORD_PAD);
        }

        let mut data = PASSWORD_PAD.to_vec();
        data.extend_from_slice(&self.file_id);
        let digest = md5::compute(&data);

        let mut result = rc4_decrypt(&Rc4Key::from_slice(key), &digest.0);
        for i in 1..=19u8 {
            let step_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4_decrypt(&Rc4Key::new(step_key), &result);
        }
        result
    }

    /// The derived file key (empty before successful authentication, and
    /// for revision 5 where key unwrapping is not supported).
    pub fn file_key(&self) -> &[u8] {
        &self.file_key
    }

    /// Raw permissions as declared in /P
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Whether the document metadata stream is encrypted
    pub fn is_metadata_encrypted(&self) -> bool {
        self.encrypt_metadata
    }

    /// Encryption dictionary /V entry
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Encryption dictionary /R entry
    pub fn revision(&self) -> i32 {
        self.revision
    }
}

/// Pad or truncate a password to exactly 32 bytes (Algorithm 2, step a).
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let take = password.len().min(32);
    padded[..take].copy_from_slice(&password[..take]);
    padded[take..].copy_from_slice(&PASSWORD_PAD[..32 - take]);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfObject, PdfString};

    fn encrypt_dict(r: i32, o: Vec<u8>, u: Vec<u8>, p: i32) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.insert("R".to_string(), PdfObject::Integer(r as i64));
        dict.insert("V".to_string(), PdfObject::Integer(if r == 2 { 1 } else { 2 }));
        dict.insert("O".to_string(), PdfObject::String(PdfString(o)));
        dict.insert("U".to_string(), PdfObject::String(PdfString(u)));
        dict.insert("P".to_string(), PdfObject::Integer(p as i64));
        dict
    }

    /// Build a consistent R2 dictionary for a known user password by
    /// running the derivation forward.
    fn build_r2_dict(user_password: &[u8], file_id: &[u8]) -> PdfDictionary {
        // Owner entry derived from the same password (owner == user)
        let digest = md5::compute(pad_password(user_password));
        let rc4_key = &digest.0[..5];
        let o = rc4_decrypt(&Rc4Key::from_slice(rc4_key), &pad_password(user_password));

        let p = -44i32;
        let mut handler = StandardSecurityHandler {
            version: 1,
            revision: 2,
            key_length: 5,
            owner_hash: o.clone(),
            user_hash: Vec::new(),
            permissions: Permissions::from_bits(p as u32),
            encrypt_metadata: true,
            file_id: file_id.to_vec(),
            file_key: Vec::new(),
        };
        let key = handler.compute_file_key(user_password);
        let u = handler.compute_user_hash(&key);
        handler.user_hash = u.clone();

        encrypt_dict(2, o, u, p)
    }

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"");
        assert_eq!(padded, PASSWORD_PAD);

        let padded = pad_password(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PASSWORD_PAD[..29]);

        let long = vec![b'x'; 40];
        let padded = pad_password(&long);
        assert_eq!(padded, [b'x'; 32]);
    }

    #[test]
    fn test_r2_authentication_round_trip() {
        let dict = build_r2_dict(b"hunter2", b"fileid01");
        let mut handler = StandardSecurityHandler::from_dict(&dict, b"fileid01".to_vec()).unwrap();

        assert!(handler.authenticate(b"hunter2"));
        assert_eq!(handler.file_key().len(), 5);
    }

    #[test]
    fn test_r2_wrong_password() {
        let dict = build_r2_dict(b"hunter2", b"fileid01");
        let mut handler = StandardSecurityHandler::from_dict(&dict, b"fileid01".to_vec()).unwrap();

        assert!(!handler.authenticate(b"wrong"));
        assert!(handler.file_key().is_empty());
    }

    #[test]
    fn test_missing_required_keys() {
        let mut dict = PdfDictionary::new();
        dict.insert("R".to_string(), PdfObject::Integer(2));
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, Vec::new()),
            Err(ParseError::MissingKey(_))
        ));
    }

    #[test]
    fn test_unsupported_revision() {
        let dict = encrypt_dict(6, vec![0; 48], vec![0; 48], -4);
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, Vec::new()),
            Err(ParseError::UnsupportedEncryption(_))
        ));
    }

    #[test]
    fn test_r5_user_validation() {
        // Build U = sha256(password || validation salt) || salts
        let password = b"tops3cret";
        let vsalt = [1u8; 8];
        let ksalt = [2u8; 8];
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(vsalt);
        let digest = hasher.finalize();

        let mut u = digest.to_vec();
        u.extend_from_slice(&vsalt);
        u.extend_from_slice(&ksalt);

        let dict = encrypt_dict(5, vec![0; 48], u, -4);
        let mut handler = StandardSecurityHandler::from_dict(&dict, Vec::new()).unwrap();
        assert!(handler.authenticate(password));
        assert!(!handler.authenticate(b"not-it"));
    }

    #[test]
    fn test_metadata_flag_default() {
        let dict = build_r2_dict(b"", b"id");
        let handler = StandardSecurityHandler::from_dict(&dict, b"id".to_vec()).unwrap();
        assert!(handler.is_metadata_encrypted());
    }
}

//! Object decryption
//!
//! Per-object key derivation and string/stream decryption for RC4-based
//! encryption (ISO 32000-1 Algorithm 1). The handler is installed into the
//! syntax reader so every fetched object is decrypted transparently.

use crate::parser::objects::PdfDictionary;
use crate::parser::{ParseError, ParseResult};

use super::rc4::{rc4_decrypt, Rc4Key};
use super::standard_security::StandardSecurityHandler;

/// Decryption method selected from /V and the crypt filter map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    /// No transformation
    Identity,
    /// RC4 with a per-object key
    Rc4,
}

/// Installed decryption state
#[derive(Debug, Clone)]
pub struct CryptoHandler {
    file_key: Vec<u8>,
    method: CryptMethod,
}

impl CryptoHandler {
    /// Select the decryption method from the encryption dictionary.
    ///
    /// AES crypt filters (AESV2/AESV3) are rejected here; password
    /// authentication has already succeeded by the time this runs, so the
    /// caller can distinguish a bad password from an unsupported cipher.
    pub fn from_dict(
        dict: &PdfDictionary,
        handler: &StandardSecurityHandler,
    ) -> ParseResult<Self> {
        let version = dict.get("V").and_then(|o| o.as_integer()).unwrap_or(0);

        let method = match version {
            1 | 2 => CryptMethod::Rc4,
            4 => {
                let cfm = dict
                    .get("CF")
                    .and_then(|o| o.as_dict())
                    .and_then(|cf| cf.get("StdCF"))
                    .and_then(|o| o.as_dict())
                    .and_then(|std_cf| std_cf.get("CFM"))
                    .and_then(|o| o.as_name())
                    .map(|n| n.as_str().to_string())
                    .unwrap_or_else(|| "Identity".to_string());

                match cfm.as_str() {
                    "V2" => CryptMethod::Rc4,
                    "None" | "Identity" => CryptMethod::Identity,
                    other => {
                        return Err(ParseError::UnsupportedEncryption(format!(
                            "Crypt filter method {other}"
                        )))
                    }
                }
            }
            5 => {
                return Err(ParseError::UnsupportedEncryption(
                    "AESV3 content decryption".to_string(),
                ))
            }
            other => {
                return Err(ParseError::UnsupportedEncryption(format!(
                    "Encryption algorithm version {other}"
                )))
            }
        };

        if method == CryptMethod::Rc4 && handler.file_key().is_empty() {
            return Err(ParseError::UnsupportedEncryption(
                "No file key available".to_string(),
            ));
        }

        Ok(Self {
            file_key: handler.file_key().to_vec(),
            method,
        })
    }

    /// Decrypt string or stream bytes belonging to an indirect object.
    pub fn decrypt(&self, objnum: u32, gen: u16, data: &[u8]) -> Vec<u8> {
        match self.method {
            CryptMethod::Identity => data.to_vec(),
            CryptMethod::Rc4 => {
                let key = self.object_key(objnum, gen);
                rc4_decrypt(&Rc4Key::new(key), data)
            }
        }
    }

    /// Algorithm 1: extend the file key with the low bytes of the object
    /// and generation numbers, hash, and truncate.
    fn object_key(&self, objnum: u32, gen: u16) -> Vec<u8> {
        let mut data = self.file_key.clone();
        let obj_bytes = objnum.to_le_bytes();
        let gen_bytes = gen.to_le_bytes();
        data.extend_from_slice(&obj_bytes[..3]);
        data.extend_from_slice(&gen_bytes[..2]);

        let digest = md5::compute(&data);
        let key_len = (self.file_key.len() + 5).min(16);
        digest.0[..key_len].to_vec()
    }
}

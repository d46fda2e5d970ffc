use zeroize::Zeroize;

use crate::crypto::{self, DigestBuf};
use crate::error::{Error, Result};

/// RMCP+ authentication algorithm, negotiated during session establishment
/// and used for the RAKP key exchange. 6-bit identifier on the wire; 0x00
/// doubles as the "none"/wildcard sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthenticationAlgorithm {
    /// RAKP-none. Proposing this effectively lets the BMC choose.
    None = 0x00,
    /// RAKP-HMAC-SHA1.
    HmacSha1 = 0x01,
    /// RAKP-HMAC-MD5.
    HmacMd5 = 0x02,
    /// RAKP-HMAC-SHA256.
    HmacSha256 = 0x03,
}

impl AuthenticationAlgorithm {
    pub(crate) fn from_wire(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::HmacSha1),
            0x02 => Ok(Self::HmacMd5),
            0x03 => Ok(Self::HmacSha256),
            _ => Err(Error::Unsupported("unknown authentication algorithm")),
        }
    }

    pub(crate) fn wire_id(self) -> u8 {
        self as u8
    }

    /// Output size of the underlying hash; also the length of the SIK and
    /// of K1/K2.
    pub fn digest_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1 => 20,
            Self::HmacMd5 => 16,
            Self::HmacSha256 => 32,
        }
    }

    /// Length of the RAKP4 integrity check value for this family:
    /// HMAC-SHA1-96, HMAC-MD5-128 and HMAC-SHA256-128 respectively.
    pub fn icv_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1 => 12,
            Self::HmacMd5 => 16,
            Self::HmacSha256 => 16,
        }
    }

    pub(crate) fn mac(self, key: &[u8], data: &[u8]) -> Result<DigestBuf> {
        match self {
            Self::None => Err(Error::Unsupported(
                "authentication algorithm none has no keyed hash",
            )),
            Self::HmacSha1 => crypto::hmac_sha1(key, data),
            Self::HmacMd5 => crypto::hmac_md5(key, data),
            Self::HmacSha256 => crypto::hmac_sha256(key, data),
        }
    }
}

/// RMCP+ integrity algorithm; signs authenticated session packets with K1.
/// 6-bit identifier on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IntegrityAlgorithm {
    /// No per-packet authentication.
    None = 0x00,
    /// HMAC-SHA1 truncated to 96 bits.
    HmacSha1_96 = 0x01,
    /// HMAC-MD5, full 128-bit output.
    HmacMd5_128 = 0x02,
    /// Bare MD5 over key || data || key.
    Md5_128 = 0x03,
    /// HMAC-SHA256 truncated to 128 bits.
    HmacSha256_128 = 0x04,
}

impl IntegrityAlgorithm {
    pub(crate) fn from_wire(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::HmacSha1_96),
            0x02 => Ok(Self::HmacMd5_128),
            0x03 => Ok(Self::Md5_128),
            0x04 => Ok(Self::HmacSha256_128),
            _ => Err(Error::Unsupported("unknown integrity algorithm")),
        }
    }

    pub(crate) fn wire_id(self) -> u8 {
        self as u8
    }

    /// Length of the AuthCode trailer on authenticated packets.
    pub fn mac_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::HmacSha1_96 => 12,
            Self::HmacMd5_128 => 16,
            Self::Md5_128 => 16,
            Self::HmacSha256_128 => 16,
        }
    }

    /// Compute the truncated packet AuthCode with key K1.
    pub(crate) fn mac(self, k1: &[u8], data: &[u8]) -> Result<DigestBuf> {
        let full = match self {
            Self::None => {
                return Err(Error::Unsupported("integrity algorithm none has no MAC"));
            }
            Self::HmacSha1_96 => crypto::hmac_sha1(k1, data)?,
            Self::HmacMd5_128 => crypto::hmac_md5(k1, data)?,
            Self::Md5_128 => crypto::keyed_md5(k1, data),
            Self::HmacSha256_128 => crypto::hmac_sha256(k1, data)?,
        };
        Ok(full.truncated(self.mac_len()))
    }
}

/// RMCP+ confidentiality algorithm; encrypts session payloads with the
/// first 16 bytes of K2. 6-bit identifier on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfidentialityAlgorithm {
    /// Plaintext payloads.
    None = 0x00,
    /// AES-128 in CBC mode with the IPMI confidentiality pad.
    AesCbc128 = 0x01,
}

impl ConfidentialityAlgorithm {
    pub(crate) fn from_wire(id: u8) -> Result<Self> {
        match id & 0x3F {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::AesCbc128),
            _ => Err(Error::Unsupported("unknown confidentiality algorithm")),
        }
    }

    pub(crate) fn wire_id(self) -> u8 {
        self as u8
    }
}

/// Key material derived from the SIK: K1 keys the integrity algorithm, the
/// first 16 bytes of K2 key AES-CBC-128.
///
/// K_n = HMAC(SIK, 0x0n repeated to the hash output size).
#[derive(Debug, Clone)]
pub(crate) struct SessionKeys {
    pub k1: DigestBuf,
    pub k2: DigestBuf,
}

impl SessionKeys {
    pub(crate) fn derive(auth: AuthenticationAlgorithm, sik: &DigestBuf) -> Result<Self> {
        Ok(Self {
            k1: derive_k(auth, sik, 1)?,
            k2: derive_k(auth, sik, 2)?,
        })
    }

    pub(crate) fn aes_key(&self) -> Result<[u8; 16]> {
        let k2 = self.k2.as_slice();
        if k2.len() < 16 {
            return Err(Error::Crypto("K2 too short for AES-128"));
        }
        let mut out = [0u8; 16];
        out.copy_from_slice(&k2[..16]);
        Ok(out)
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
    }
}

fn derive_k(auth: AuthenticationAlgorithm, sik: &DigestBuf, n: u8) -> Result<DigestBuf> {
    let constant = [n; crate::crypto::MAX_DIGEST_LEN];
    auth.mac(sik.as_slice(), &constant[..auth.digest_len()])
}

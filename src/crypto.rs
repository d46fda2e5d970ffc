use core::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// IPMI user and BMC keys are fixed 20-byte values; shorter secrets are
/// truncated and NUL-padded.
pub(crate) const USER_KEY_LEN: usize = 20;

/// Largest digest produced by any supported hash family (SHA-256).
pub(crate) const MAX_DIGEST_LEN: usize = 32;

/// A minimal secret container that zeroizes its contents on drop.
///
/// This is intentionally small and avoids exposing secrets via `Debug`.
#[derive(Clone)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn to_user_key(&self) -> [u8; USER_KEY_LEN] {
        normalize_key(self.expose())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A fixed-capacity digest buffer. Supported families output 16, 20 or 32
/// bytes; holding the result inline avoids allocating per MAC.
#[derive(Clone, Copy)]
pub(crate) struct DigestBuf {
    buf: [u8; MAX_DIGEST_LEN],
    len: u8,
}

impl DigestBuf {
    pub(crate) fn from_slice(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= MAX_DIGEST_LEN);
        let mut buf = [0u8; MAX_DIGEST_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len() as u8,
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    /// A copy truncated to the first `n` bytes.
    pub(crate) fn truncated(&self, n: usize) -> Self {
        Self::from_slice(&self.as_slice()[..n.min(self.len())])
    }
}

impl fmt::Debug for DigestBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestBuf({} bytes)", self.len)
    }
}

impl Zeroize for DigestBuf {
    fn zeroize(&mut self) {
        self.buf.zeroize();
        self.len = 0;
    }
}

/// Normalize a secret (password or Kg) into the fixed 20-byte key used by
/// RAKP: truncated, remainder NUL-padded.
pub(crate) fn normalize_key(secret: &[u8]) -> [u8; USER_KEY_LEN] {
    let mut out = [0u8; USER_KEY_LEN];
    let n = secret.len().min(out.len());
    out[..n].copy_from_slice(&secret[..n]);
    out
}

/// Constant-time equality; length mismatch is an immediate fail.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<DigestBuf> {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    Ok(DigestBuf::from_slice(&mac.finalize().into_bytes()))
}

pub(crate) fn hmac_md5(key: &[u8], data: &[u8]) -> Result<DigestBuf> {
    let mut mac =
        <Hmac<Md5> as Mac>::new_from_slice(key).map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    Ok(DigestBuf::from_slice(&mac.finalize().into_bytes()))
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<DigestBuf> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    Ok(DigestBuf::from_slice(&mac.finalize().into_bytes()))
}

/// The bare-hash MD5-128 integrity algorithm: MD5(key || data || key).
pub(crate) fn keyed_md5(key: &[u8], data: &[u8]) -> DigestBuf {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(data);
    hasher.update(key);
    DigestBuf::from_slice(&hasher.finalize())
}

/// AES-128-CBC encryption without padding.
///
/// The caller must ensure `plaintext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if plaintext.len() % 16 != 0 {
        return Err(Error::Crypto(
            "AES-CBC plaintext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(plaintext.len());
    let mut prev = *iv;

    for block in plaintext.chunks(16) {
        let mut xored = [0u8; 16];
        for i in 0..16 {
            xored[i] = block[i] ^ prev[i];
        }

        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);

        let mut ct = [0u8; 16];
        ct.copy_from_slice(&ga);
        out.extend_from_slice(&ct);
        prev = ct;
    }

    Ok(out)
}

/// AES-128-CBC decryption without padding.
///
/// The caller must ensure `ciphertext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.len() % 16 != 0 {
        return Err(Error::Crypto(
            "AES-CBC ciphertext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev = *iv;

    for block in ciphertext.chunks(16) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);

        let mut pt = [0u8; 16];
        pt.copy_from_slice(&ga);
        for i in 0..16 {
            pt[i] ^= prev[i];
        }

        out.extend_from_slice(&pt);

        let mut next_prev = [0u8; 16];
        next_prev.copy_from_slice(block);
        prev = next_prev;
    }

    Ok(out)
}

/// Encrypt an IPMI payload with AES-CBC-128 and the confidentiality pad
/// (`0x01, 0x02, .. 0xN` followed by the pad count), returning `iv || ct`.
pub(crate) fn encrypt_payload_aes_cbc(
    plaintext: &[u8],
    key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>> {
    let base = plaintext.len() + 1; // trailing pad-length byte
    let pad_len = (16 - (base % 16)) % 16;

    let mut to_encrypt = Vec::with_capacity(base + pad_len);
    to_encrypt.extend_from_slice(plaintext);
    for i in 0..pad_len {
        to_encrypt.push((i + 1) as u8);
    }
    to_encrypt.push(pad_len as u8);

    let ciphertext = aes128_cbc_encrypt(key, iv, &to_encrypt)?;

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an `iv || ct` payload and strip the confidentiality pad. Each
/// pad byte must equal its 1-based index and the count must be <= 15.
pub(crate) fn decrypt_payload_aes_cbc(payload: &[u8], key: &[u8; 16]) -> Result<Vec<u8>> {
    if payload.len() < 32 {
        return Err(Error::Decode("encrypted payload too short"));
    }

    let iv: [u8; 16] = payload[..16]
        .try_into()
        .map_err(|_| Error::Decode("invalid IV"))?;
    let ciphertext = &payload[16..];
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(Error::Decode("invalid AES-CBC ciphertext length"));
    }

    let mut plaintext = aes128_cbc_decrypt(key, &iv, ciphertext)?;

    let pad_len = *plaintext
        .last()
        .ok_or(Error::Decode("missing confidentiality pad length"))? as usize;
    if pad_len > 15 || pad_len > plaintext.len() - 1 {
        return Err(Error::Decode("invalid confidentiality pad length"));
    }

    let trailer_start = plaintext.len() - 1 - pad_len;
    let pad_bytes = &plaintext[trailer_start..plaintext.len() - 1];
    for (i, &b) in pad_bytes.iter().enumerate() {
        if b != (i as u8 + 1) {
            return Err(Error::Decode("invalid confidentiality pad bytes"));
        }
    }

    plaintext.truncate(trailer_start);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha1_vectors() {
        let key = b"key";
        let msg = b"The quick brown fox jumps over the lazy dog";

        let mac = hmac_sha1(key, msg).expect("hmac");
        assert_eq!(
            mac.as_slice(),
            [
                0xDE, 0x7C, 0x9B, 0x85, 0xB8, 0xB7, 0x8A, 0xA6, 0xBC, 0x8A, 0x7A, 0x36, 0xF7, 0x0A,
                0x90, 0x70, 0x1C, 0x9D, 0xB4, 0xD9,
            ]
        );

        assert_eq!(
            mac.truncated(12).as_slice(),
            [0xDE, 0x7C, 0x9B, 0x85, 0xB8, 0xB7, 0x8A, 0xA6, 0xBC, 0x8A, 0x7A, 0x36]
        );
    }

    #[test]
    fn hmac_md5_vector() {
        // RFC 2202 test case 2.
        let mac = hmac_md5(b"Jefe", b"what do ya want for nothing?").expect("hmac");
        assert_eq!(
            mac.as_slice(),
            [
                0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e, 0x31, 0x0a, 0x5d,
                0xb7, 0x38,
            ]
        );
    }

    #[test]
    fn hmac_sha256_vector() {
        // RFC 4231 test case 2.
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").expect("hmac");
        assert_eq!(
            mac.as_slice(),
            [
                0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
                0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
                0x64, 0xec, 0x38, 0x43,
            ]
        );
    }

    #[test]
    fn normalize_key_pads_and_truncates() {
        let key = normalize_key(b"PASSWORD");
        assert_eq!(&key[..8], b"PASSWORD");
        assert_eq!(&key[8..], [0u8; 12]);

        let long = [0xAAu8; 25];
        let key = normalize_key(&long);
        assert_eq!(key, [0xAA; 20]);
    }

    #[test]
    fn aes128_cbc_vectors() {
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ];
        let iv: [u8; 16] = [
            0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D,
            0x1E, 0x1F,
        ];
        let plaintext = b"0123456789abcdef";

        let ciphertext = aes128_cbc_encrypt(&key, &iv, plaintext).expect("encrypt");
        assert_eq!(
            ciphertext,
            [
                0xEB, 0x9E, 0x5B, 0xA4, 0x1B, 0x90, 0x2D, 0xB8, 0x25, 0x29, 0x82, 0xAA, 0x1A, 0x23,
                0xF4, 0xBE,
            ]
        );

        let decrypted = aes128_cbc_decrypt(&key, &iv, &ciphertext).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_payload_seven_byte_plaintext() {
        let key: [u8; 16] = [
            0x0e, 0xd9, 0x8c, 0x34, 0xac, 0x8f, 0x34, 0xce, 0x4d, 0xd7, 0xd9, 0x05, 0x12, 0xb0,
            0xf9, 0x7a,
        ];
        let payload: [u8; 32] = [
            0x4d, 0x15, 0x80, 0x8c, 0x3e, 0xee, 0x67, 0xd6, 0x3b, 0x1c, 0xb0, 0xd1, 0xae, 0x76,
            0xdf, 0xcb, 0xf3, 0x13, 0xa7, 0xbe, 0x62, 0x58, 0x14, 0xa4, 0x7d, 0xa0, 0xf6, 0x6f,
            0xdf, 0x21, 0xcc, 0xba,
        ];

        let plaintext = decrypt_payload_aes_cbc(&payload, &key).expect("decrypt");
        assert_eq!(plaintext, [0x7b, 0xec, 0x46, 0xd5, 0xbb, 0x90, 0xba]);
    }

    #[test]
    fn decrypt_payload_fifteen_bytes_no_pad() {
        let key: [u8; 16] = [
            0x6f, 0x9c, 0xad, 0xa3, 0x92, 0xa3, 0xbb, 0x12, 0x8d, 0xdb, 0x49, 0x5f, 0xc8, 0x2a,
            0x17, 0x21,
        ];
        let payload: [u8; 32] = [
            0x94, 0x1e, 0xf9, 0x18, 0xb0, 0x06, 0xd0, 0x84, 0x26, 0xa1, 0xe2, 0x72, 0x22, 0x37,
            0x0b, 0x0f, 0x7b, 0x74, 0x2d, 0x86, 0x97, 0x42, 0xd8, 0x64, 0x25, 0x5f, 0x4d, 0xad,
            0x2e, 0x14, 0x6b, 0x23,
        ];

        let plaintext = decrypt_payload_aes_cbc(&payload, &key).expect("decrypt");
        assert_eq!(
            plaintext,
            [
                0xf1, 0xc7, 0xed, 0xfa, 0xc8, 0xf1, 0xa5, 0x40, 0xcd, 0xc4, 0x3a, 0x3c, 0x9b, 0x30,
                0x81,
            ]
        );
    }

    #[test]
    fn decrypt_payload_rejects_bad_pad() {
        let key: [u8; 16] = [
            0x12, 0xd4, 0x51, 0x8d, 0x94, 0x2e, 0x28, 0x78, 0x6a, 0x75, 0x8b, 0xf5, 0xbe, 0x25,
            0xaf, 0xf9,
        ];
        // Decrypts to a trailer whose first pad byte is 0x00, not 0x01.
        let payload: [u8; 32] = [
            0x4e, 0x86, 0xa3, 0x8e, 0xcb, 0x0f, 0x1b, 0xe9, 0xac, 0x46, 0x73, 0x76, 0xc8, 0x96,
            0x04, 0x32, 0x67, 0xaa, 0xa3, 0x84, 0x33, 0xe8, 0xcb, 0x63, 0x66, 0x46, 0xce, 0x1f,
            0x14, 0xf5, 0xaf, 0x16,
        ];

        let err = decrypt_payload_aes_cbc(&payload, &key).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = [0x42u8; 16];
        let iv = [0x24u8; 16];

        for len in [0usize, 1, 7, 15, 16, 17, 35] {
            let message: Vec<u8> = (0..len as u8).collect();
            let payload = encrypt_payload_aes_cbc(&message, &key, &iv).expect("encrypt");
            assert_eq!(payload.len() % 16, 0);
            let recovered = decrypt_payload_aes_cbc(&payload, &key).expect("decrypt");
            assert_eq!(recovered, message);
        }
    }

    #[test]
    fn aes128_cbc_rejects_non_block_multiple() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        let err = aes128_cbc_encrypt(&key, &iv, b"not16").unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }
}

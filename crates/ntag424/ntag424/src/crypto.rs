//! AES-128 primitives of the EV2 secure messaging scheme.

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use bytes::{BufMut, Bytes, BytesMut};
use cmac::{Cmac, Mac};
use sha2::Sha512;

use crate::error::{Error, Result};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// AES-128 key
pub type AesKey = [u8; 16];
/// One AES block, also used for IVs and full CMACs
pub type Block = [u8; BLOCK_SIZE];
/// Authentication nonce (RndA / RndB)
pub type Nonce = [u8; 16];
/// Truncated CMAC as carried on the wire
pub type TruncatedMac = [u8; 8];

/// All-zero IV
pub const ZERO_IV: Block = [0u8; BLOCK_SIZE];

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

const DIVERSIFICATION_ROUNDS: u32 = 5000;
const DIVERSIFICATION_LABEL: &[u8] = b"key";

const JAMCRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_JAMCRC);

const SV1_PREFIX: [u8; 6] = [0xA5, 0x5A, 0x00, 0x01, 0x00, 0x80];
const SV2_PREFIX: [u8; 6] = [0x5A, 0xA5, 0x00, 0x01, 0x00, 0x80];

/// Encrypt data with AES-128-CBC.
///
/// Unaligned input is padded with ISO/IEC 9797-1 method 2 (`80 00 .. 00`)
/// up to the next block boundary; block-aligned input is encrypted as is.
///
/// # Arguments
///
/// * `key` - The key to use for encryption.
/// * `plaintext` - The data to encrypt.
/// * `iv` - The IV to use for encryption.
///
/// # Returns
///
/// The ciphertext, always a multiple of the block size.
pub fn encrypt(key: &AesKey, plaintext: &[u8], iv: &Block) -> Result<Bytes> {
    if plaintext.is_empty() {
        return Ok(Bytes::new());
    }

    let mut buf = BytesMut::from(plaintext);
    pad_iso9797_m2(&mut buf);
    let msg_len = buf.len();

    let ciphertext =
        Encryptor::new(key.into(), iv.into()).encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)?;
    Ok(Bytes::copy_from_slice(ciphertext))
}

/// Decrypt data with AES-128-CBC and strip ISO/IEC 9797-1 method 2 padding.
///
/// The decrypted buffer is scanned from the end for the first non-zero byte.
/// When that byte is `0x80` the buffer is truncated there; any other value
/// means no padding was applied and the full buffer is returned.
///
/// # Arguments
///
/// * `key` - The key to use for decryption.
/// * `ciphertext` - The data to decrypt, a multiple of the block size.
/// * `iv` - The IV to use for decryption.
///
/// # Returns
///
/// The plaintext, or `MalformedInput` for unaligned input.
pub fn decrypt(key: &AesKey, ciphertext: &[u8], iv: &Block) -> Result<Bytes> {
    let plaintext = decrypt_raw(key, ciphertext, iv)?;
    Ok(strip_iso9797_m2(plaintext))
}

/// Decrypt block-aligned data with AES-128-CBC, keeping every byte.
///
/// Used for fixed-size frames such as the authentication nonces, where a
/// trailing `80 00 ..` pattern is data rather than padding.
pub fn decrypt_raw(key: &AesKey, ciphertext: &[u8], iv: &Block) -> Result<Bytes> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::MalformedInput("ciphertext is not block aligned"));
    }
    if ciphertext.is_empty() {
        return Ok(Bytes::new());
    }

    let mut buf = BytesMut::from(ciphertext);
    let plaintext = Decryptor::new(key.into(), iv.into()).decrypt_padded_mut::<NoPadding>(&mut buf)?;
    Ok(Bytes::copy_from_slice(plaintext))
}

/// Compute the AES-128 CMAC of `data`.
pub fn cmac(key: &AesKey, data: &[u8]) -> Block {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Truncate a CMAC to the odd-indexed bytes 1, 3, .., 15.
pub fn truncate_mac(mac: &Block) -> TruncatedMac {
    let mut truncated = [0u8; 8];
    for (dst, src) in truncated.iter_mut().zip(mac.iter().skip(1).step_by(2)) {
        *dst = *src;
    }
    truncated
}

/// Compute the truncated CMAC of `data`.
pub fn mac_truncated(key: &AesKey, data: &[u8]) -> TruncatedMac {
    truncate_mac(&cmac(key, data))
}

/// Rotate a buffer left by one byte.
pub fn rotate_left(buf: &[u8]) -> Vec<u8> {
    let mut rotated = buf.to_vec();
    if !rotated.is_empty() {
        rotated.rotate_left(1);
    }
    rotated
}

/// Rotate a buffer right by one byte.
pub fn rotate_right(buf: &[u8]) -> Vec<u8> {
    let mut rotated = buf.to_vec();
    if !rotated.is_empty() {
        rotated.rotate_right(1);
    }
    rotated
}

/// Derive the session keys of an EV2 authentication.
///
/// ```text
/// SV1 = A5 5A 00 01 00 80 || RndA[0..2] || (RndA[2..8] ^ RndB[0..6]) || RndB[6..16] || RndA[8..16]
/// SV2 = 5A A5 00 01 00 80 || (same tail)
/// ```
///
/// # Arguments
///
/// * `key` - The static key the authentication was performed with.
/// * `rnd_a` - The host nonce.
/// * `rnd_b` - The card nonce.
///
/// # Returns
///
/// A tuple containing the session encryption key and the session MAC key.
pub fn derive_session_keys(key: &AesKey, rnd_a: &Nonce, rnd_b: &Nonce) -> (AesKey, AesKey) {
    let mut tail = BytesMut::with_capacity(26);
    tail.put_slice(&rnd_a[0..2]);
    for i in 0..6 {
        tail.put_u8(rnd_a[2 + i] ^ rnd_b[i]);
    }
    tail.put_slice(&rnd_b[6..16]);
    tail.put_slice(&rnd_a[8..16]);

    let session_vector = |prefix: &[u8]| {
        let mut sv = BytesMut::with_capacity(prefix.len() + tail.len());
        sv.put_slice(prefix);
        sv.put_slice(&tail);
        sv
    };

    let enc_key = cmac(key, &session_vector(&SV1_PREFIX));
    let mac_key = cmac(key, &session_vector(&SV2_PREFIX));

    (enc_key, mac_key)
}

/// Derive the key stored in slot `key_no` of the tag with the given UID.
///
/// An all-zero (or empty) master key yields the all-zero factory key so
/// that test deployments keep working with blank tags. Otherwise the key is
/// `PBKDF2-HMAC-SHA512(master, "key" || uid || key_no, 5000)` cut to 16 bytes.
pub fn diversify_key(master: &[u8], uid: &[u8], key_no: u8) -> AesKey {
    let mut key = [0u8; 16];
    if master.iter().all(|&b| b == 0) {
        return key;
    }

    let mut salt = Vec::with_capacity(DIVERSIFICATION_LABEL.len() + uid.len() + 1);
    salt.extend_from_slice(DIVERSIFICATION_LABEL);
    salt.extend_from_slice(uid);
    salt.push(key_no);

    pbkdf2::pbkdf2_hmac::<Sha512>(master, &salt, DIVERSIFICATION_ROUNDS, &mut key);
    key
}

/// CRC-32/JAMCRC (the bitwise complement of the common CRC-32).
pub fn crc32_jam(data: &[u8]) -> u32 {
    JAMCRC.checksum(data)
}

// Appends `80 00 ..` up to the block boundary when the data is unaligned.
fn pad_iso9797_m2(data: &mut BytesMut) {
    let remainder = data.len() % BLOCK_SIZE;
    if remainder != 0 {
        data.put_u8(0x80);
        data.resize(data.len() + BLOCK_SIZE - remainder - 1, 0x00);
    }
}

fn strip_iso9797_m2(data: Bytes) -> Bytes {
    match data.iter().rposition(|&b| b != 0x00) {
        Some(pos) if data[pos] == 0x80 => data.slice(..pos),
        _ => data,
    }
}

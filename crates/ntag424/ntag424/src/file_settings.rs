//! File settings of the NDEF file, including the Secure Dynamic Messaging block.
//!
//! Wire layout returned by GetFileSettings:
//!
//! ```text
//! FileType(1) FileOption(1) AccessRights(2 LE) FileSize(3 LE)
//! [ SDMOptions(1) SDMAccessRights(2 LE) offsets(3 LE each) ]   if FileOption & 0x40
//! ```
//!
//! ChangeFileSettings takes the same layout without FileType and FileSize.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::FACTORY_FILE_SETTINGS;
use crate::error::{Error, Result};

/// Access condition nibble granting free access
pub const ACCESS_FREE: u8 = 0xE;
/// Access condition nibble denying access
pub const ACCESS_NEVER: u8 = 0xF;

/// File option bit enabling SDM
pub const FILE_OPTION_SDM: u8 = 0x40;

const MAX_OFFSET: u32 = 0x00FF_FFFF;
const SDM_RFU_NIBBLE: u8 = 0xF;

/// Read, write, read-write and change access conditions of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AccessRights {
    /// Read access key (bits 15..12)
    pub read: u8,
    /// Write access key (bits 11..8)
    pub write: u8,
    /// Read-write access key (bits 7..4)
    pub read_write: u8,
    /// Change access key (bits 3..0)
    pub change: u8,
}

impl AccessRights {
    /// Decode from the little-endian wire value
    pub const fn from_u16(value: u16) -> Self {
        Self {
            read: (value >> 12) as u8 & 0xF,
            write: (value >> 8) as u8 & 0xF,
            read_write: (value >> 4) as u8 & 0xF,
            change: value as u8 & 0xF,
        }
    }

    /// Encode to the wire value
    pub const fn to_u16(self) -> u16 {
        ((self.read as u16 & 0xF) << 12)
            | ((self.write as u16 & 0xF) << 8)
            | ((self.read_write as u16 & 0xF) << 4)
            | (self.change as u16 & 0xF)
    }
}

/// Access conditions of the SDM features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SdmAccessRights {
    /// Key for PICC data encryption, 0xE for plain mirroring (bits 15..12)
    pub meta_read: u8,
    /// Key for the SDM MAC and file data encryption (bits 11..8)
    pub file_read: u8,
    /// Key for retrieving the SDM read counter (bits 3..0)
    pub ctr_ret: u8,
}

impl SdmAccessRights {
    /// Decode from the little-endian wire value, ignoring the RFU nibble
    pub const fn from_u16(value: u16) -> Self {
        Self {
            meta_read: (value >> 12) as u8 & 0xF,
            file_read: (value >> 8) as u8 & 0xF,
            ctr_ret: value as u8 & 0xF,
        }
    }

    /// Encode to the wire value with the RFU nibble set
    pub const fn to_u16(self) -> u16 {
        ((self.meta_read as u16 & 0xF) << 12)
            | ((self.file_read as u16 & 0xF) << 8)
            | ((SDM_RFU_NIBBLE as u16) << 4)
            | (self.ctr_ret as u16 & 0xF)
    }

    const fn mirrors_plain(self) -> bool {
        self.meta_read == ACCESS_FREE
    }

    const fn encrypts_picc_data(self) -> bool {
        self.meta_read <= 0x4
    }

    const fn has_file_read(self) -> bool {
        self.file_read != ACCESS_NEVER
    }
}

/// Target file access rights: read free, everything else with key 0
pub const LOCKED_ACCESS_RIGHTS: AccessRights = AccessRights {
    read: ACCESS_FREE,
    write: 0x0,
    read_write: 0x0,
    change: 0x0,
};

/// Target SDM access rights: plain UID and counter mirror, MAC with key 0
pub const LOCKED_SDM_ACCESS_RIGHTS: SdmAccessRights = SdmAccessRights {
    meta_read: ACCESS_FREE,
    file_read: 0x0,
    ctr_ret: ACCESS_NEVER,
};

/// SDM option flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SdmOptions(pub u8);

impl SdmOptions {
    /// UID mirroring
    pub const UID_MIRROR: u8 = 0x80;
    /// SDM read counter mirroring
    pub const READ_CTR_MIRROR: u8 = 0x40;
    /// SDM read counter limit
    pub const READ_CTR_LIMIT: u8 = 0x20;
    /// Encrypted file data mirroring
    pub const ENC_FILE_DATA: u8 = 0x10;
    /// ASCII encoding of mirrored data
    pub const ASCII: u8 = 0x01;

    /// Whether every bit of `flag` is set
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    const fn with(self, flag: u8, enabled: bool) -> Self {
        if enabled { Self(self.0 | flag) } else { self }
    }
}

/// Encrypted file data window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncDataRange {
    /// Offset of the encrypted data
    pub offset: u32,
    /// Length of the encrypted data
    pub length: u32,
}

/// Mirror offsets within the NDEF file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SdmOffsets {
    /// Plain UID mirror
    pub uid: Option<u32>,
    /// Plain read counter mirror
    pub read_ctr: Option<u32>,
    /// Encrypted PICC data mirror
    pub picc_data: Option<u32>,
    /// Start of the data covered by the SDM MAC
    pub mac_input: Option<u32>,
    /// Encrypted file data window
    pub enc_data: Option<EncDataRange>,
    /// SDM MAC mirror
    pub mac: Option<u32>,
    /// Read counter limit
    pub read_ctr_limit: Option<u32>,
}

impl SdmOffsets {
    /// Whether no offset is set
    pub const fn is_empty(&self) -> bool {
        self.uid.is_none()
            && self.read_ctr.is_none()
            && self.picc_data.is_none()
            && self.mac_input.is_none()
            && self.enc_data.is_none()
            && self.mac.is_none()
            && self.read_ctr_limit.is_none()
    }
}

/// SDM block of the file settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SdmSettings {
    /// Option flags
    pub options: SdmOptions,
    /// SDM access conditions
    pub access_rights: SdmAccessRights,
    /// Mirror offsets
    pub offsets: SdmOffsets,
}

/// Decoded file settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FileSettings {
    /// File type, 0x00 for a standard data file
    pub file_type: u8,
    /// File option byte
    pub file_option: u8,
    /// File access conditions
    pub access_rights: AccessRights,
    /// File size in bytes
    pub file_size: u32,
    /// SDM block, present when SDM is enabled
    pub sdm: Option<SdmSettings>,
}

impl FileSettings {
    /// Decode a GetFileSettings response payload
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(raw);

        let file_type = reader.u8()?;
        let file_option = reader.u8()?;
        let access_rights = AccessRights::from_u16(reader.u16_le()?);
        let file_size = reader.u24_le()?;

        let sdm = if file_option & FILE_OPTION_SDM != 0 {
            let options = SdmOptions(reader.u8()?);
            let sdm_ar = SdmAccessRights::from_u16(reader.u16_le()?);
            let gates = Gates::new(options, sdm_ar);

            let offsets = SdmOffsets {
                uid: reader.u24_le_if(gates.uid)?,
                read_ctr: reader.u24_le_if(gates.read_ctr)?,
                picc_data: reader.u24_le_if(gates.picc_data)?,
                mac_input: reader.u24_le_if(gates.mac_input)?,
                enc_data: if gates.enc_data {
                    Some(EncDataRange {
                        offset: reader.u24_le()?,
                        length: reader.u24_le()?,
                    })
                } else {
                    None
                },
                mac: reader.u24_le_if(gates.mac)?,
                read_ctr_limit: reader.u24_le_if(gates.read_ctr_limit)?,
            };

            Some(SdmSettings {
                options,
                access_rights: sdm_ar,
                offsets,
            })
        } else {
            None
        };

        reader.finish()?;

        Ok(Self {
            file_type,
            file_option,
            access_rights,
            file_size,
            sdm,
        })
    }

    /// Mirror offsets, empty when SDM is disabled
    pub fn offsets(&self) -> SdmOffsets {
        self.sdm.map(|sdm| sdm.offsets).unwrap_or_default()
    }

    /// Whether SDM is enabled
    pub const fn sdm_enabled(&self) -> bool {
        self.file_option & FILE_OPTION_SDM != 0
    }
}

/// Build a ChangeFileSettings payload
///
/// SDM is enabled iff at least one offset is given. The option flags are
/// derived from the offsets present and the ASCII flag is always set. Every
/// offset must be present exactly when the access rights and flags make the
/// tag expect it, so the result decodes back to the same offsets.
pub fn generate(
    offsets: &SdmOffsets,
    access_rights: AccessRights,
    sdm_access_rights: SdmAccessRights,
) -> Result<Bytes> {
    let mut payload = BytesMut::with_capacity(32);

    if offsets.is_empty() {
        payload.put_u8(0x00);
        payload.put_u16_le(access_rights.to_u16());
        return Ok(payload.freeze());
    }

    let mirrors_picc = offsets.picc_data.is_some();
    let options = SdmOptions::default()
        .with(SdmOptions::UID_MIRROR, offsets.uid.is_some() || mirrors_picc)
        .with(SdmOptions::READ_CTR_MIRROR, offsets.read_ctr.is_some() || mirrors_picc)
        .with(SdmOptions::READ_CTR_LIMIT, offsets.read_ctr_limit.is_some())
        .with(SdmOptions::ENC_FILE_DATA, offsets.enc_data.is_some())
        .with(SdmOptions::ASCII, true);
    let gates = Gates::new(options, sdm_access_rights);

    check_gate(offsets.uid.is_some(), gates.uid, "UID offset needs MetaRead 0xE")?;
    check_gate(
        offsets.read_ctr.is_some(),
        gates.read_ctr,
        "read counter offset needs MetaRead 0xE",
    )?;
    check_gate(
        offsets.picc_data.is_some(),
        gates.picc_data,
        "PICC data offset must be given iff MetaRead is a key",
    )?;
    check_gate(
        offsets.mac_input.is_some(),
        gates.mac_input,
        "MAC input offset must be given iff FileRead is not 0xF",
    )?;
    check_gate(
        offsets.enc_data.is_some(),
        gates.enc_data,
        "encrypted data needs FileRead access",
    )?;
    check_gate(
        offsets.mac.is_some(),
        gates.mac,
        "MAC offset must be given iff FileRead is not 0xF",
    )?;
    if offsets.mac_input.zip(offsets.mac).is_some_and(|(input, mac)| input > mac) {
        return Err(Error::InvalidSettings(
            "MAC input offset must not exceed the MAC offset",
        ));
    }

    payload.put_u8(FILE_OPTION_SDM);
    payload.put_u16_le(access_rights.to_u16());
    payload.put_u8(options.0);
    payload.put_u16_le(sdm_access_rights.to_u16());

    let enc = offsets.enc_data;
    for value in [
        offsets.uid,
        offsets.read_ctr,
        offsets.picc_data,
        offsets.mac_input,
        enc.map(|e| e.offset),
        enc.map(|e| e.length),
        offsets.mac,
        offsets.read_ctr_limit,
    ]
    .into_iter()
    .flatten()
    {
        put_u24_le(&mut payload, value)?;
    }

    Ok(payload.freeze())
}

/// Compare current settings with a ChangeFileSettings payload
///
/// File type and file size are not part of the payload and are skipped.
pub fn matches_target(current: &[u8], target: &[u8]) -> bool {
    if current.len() < 7 {
        return false;
    }
    let comparable = current[1..4].iter().chain(&current[7..]);
    comparable.eq(target.iter())
}

/// Whether the settings are the ones a tag leaves the factory with
pub fn is_factory(raw: &[u8]) -> bool {
    raw == FACTORY_FILE_SETTINGS
}

// Which offsets the tag expects for a given flag and access combination.
#[derive(Debug, Clone, Copy)]
struct Gates {
    uid: bool,
    read_ctr: bool,
    picc_data: bool,
    mac_input: bool,
    enc_data: bool,
    mac: bool,
    read_ctr_limit: bool,
}

impl Gates {
    const fn new(options: SdmOptions, ar: SdmAccessRights) -> Self {
        Self {
            uid: options.contains(SdmOptions::UID_MIRROR) && ar.mirrors_plain(),
            read_ctr: options.contains(SdmOptions::READ_CTR_MIRROR) && ar.mirrors_plain(),
            picc_data: ar.encrypts_picc_data(),
            mac_input: ar.has_file_read(),
            enc_data: ar.has_file_read() && options.contains(SdmOptions::ENC_FILE_DATA),
            mac: ar.has_file_read(),
            read_ctr_limit: options.contains(SdmOptions::READ_CTR_LIMIT),
        }
    }
}

const fn check_gate(present: bool, expected: bool, reason: &'static str) -> Result<()> {
    if present == expected {
        Ok(())
    } else {
        Err(Error::InvalidSettings(reason))
    }
}

fn put_u24_le(buf: &mut BytesMut, value: u32) -> Result<()> {
    if value > MAX_OFFSET {
        return Err(Error::InvalidSettings("offset does not fit in 24 bits"));
    }
    buf.put_uint_le(value as u64, 3);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(Error::MalformedInput("file settings truncated"))?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u24_le(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    fn u24_le_if(&mut self, present: bool) -> Result<Option<u32>> {
        if present { self.u24_le().map(Some) } else { Ok(None) }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(Error::MalformedInput("trailing bytes after file settings"))
        }
    }
}

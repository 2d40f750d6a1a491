//! NDEF file layout for SDM URL templates.
//!
//! A template is a URL containing placeholders that the tag fills in on every
//! read:
//!
//! | placeholder   | mirrored data                  | width |
//! |---------------|--------------------------------|-------|
//! | `{uid}`       | UID, upper case hex            | 14    |
//! | `{counter}`   | SDM read counter, hex          | 6     |
//! | `{cmac}`      | SDM MAC, hex                   | 16    |
//! | `{cmacStart}` | start of the MAC input (marker)| 0     |
//!
//! The NDEF file holds `NLEN(2, BE) || URI record`; mirror offsets are byte
//! positions within that file.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::file_settings::SdmOffsets;

/// Width of the mirrored UID
pub const UID_ASCII_LEN: usize = 14;
/// Width of the mirrored read counter
pub const COUNTER_ASCII_LEN: usize = 6;
/// Width of the mirrored SDM MAC
pub const CMAC_ASCII_LEN: usize = 16;

const UID_TAG: &str = "{uid}";
const COUNTER_TAG: &str = "{counter}";
const CMAC_TAG: &str = "{cmac}";
const CMAC_START_TAG: &str = "{cmacStart}";

const FILLER: u8 = b'0';
const NLEN_SIZE: usize = 2;

/// Type name format of NFC Forum well-known types
pub const TNF_WELL_KNOWN: u8 = 0x01;
/// Record type of URI records
pub const RTD_URI: &[u8] = b"U";

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// URI identifier codes of the NFC Forum URI record type definition
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// NDEF file contents for a template together with its mirror offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefLayout {
    /// File contents with every placeholder filled with `'0'`
    pub file: Bytes,
    /// Mirror offsets within `file`
    pub offsets: SdmOffsets,
}

/// A decoded NDEF record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    /// Type name format
    pub tnf: u8,
    /// Record type
    pub record_type: Bytes,
    /// Record payload
    pub payload: Bytes,
}

impl NdefRecord {
    /// Expanded URI of a well-known URI record
    pub fn uri(&self) -> Option<String> {
        if self.tnf != TNF_WELL_KNOWN || self.record_type.as_ref() != RTD_URI {
            return None;
        }
        let (&code, rest) = self.payload.split_first()?;
        let prefix = URI_PREFIXES.get(code as usize).copied().unwrap_or_default();
        Some(format!("{prefix}{}", String::from_utf8_lossy(rest)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Uid,
    Counter,
    Cmac,
    CmacStart,
}

impl Placeholder {
    const ALL: [(Self, &'static str); 4] = [
        (Self::Uid, UID_TAG),
        (Self::Counter, COUNTER_TAG),
        (Self::Cmac, CMAC_TAG),
        (Self::CmacStart, CMAC_START_TAG),
    ];

    const fn width(self) -> usize {
        match self {
            Self::Uid => UID_ASCII_LEN,
            Self::Counter => COUNTER_ASCII_LEN,
            Self::Cmac => CMAC_ASCII_LEN,
            Self::CmacStart => 0,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Uid => UID_TAG,
            Self::Counter => COUNTER_TAG,
            Self::Cmac => CMAC_TAG,
            Self::CmacStart => CMAC_START_TAG,
        }
    }
}

/// Lay out the NDEF file for a URL template
pub fn layout(template: &str) -> Result<NdefLayout> {
    let (uri, positions) = expand(template)?;

    let (code, prefix) = longest_prefix(&uri);
    if positions.iter().any(|&(_, pos)| pos < prefix.len()) {
        return Err(Error::InvalidTemplate(
            "placeholder inside the URI scheme".to_string(),
        ));
    }

    let body = &uri.as_bytes()[prefix.len()..];
    let payload_len = 1 + body.len();
    let short = payload_len <= u8::MAX as usize;
    let short_flag = if short { FLAG_SR } else { 0 };

    let mut record = BytesMut::with_capacity(payload_len + 7);
    record.put_u8(FLAG_MB | FLAG_ME | short_flag | TNF_WELL_KNOWN);
    record.put_u8(RTD_URI.len() as u8);
    if short {
        record.put_u8(payload_len as u8);
    } else {
        record.put_u32(payload_len as u32);
    }
    record.put_slice(RTD_URI);
    let body_start = NLEN_SIZE + record.len() + 1;
    record.put_u8(code);
    record.put_slice(body);

    let nlen = u16::try_from(record.len())
        .map_err(|_| Error::InvalidTemplate("URL too long for an NDEF file".to_string()))?;
    let mut file = BytesMut::with_capacity(NLEN_SIZE + record.len());
    file.put_u16(nlen);
    file.put_slice(&record);

    let file_offset = |pos: usize| (body_start + pos - prefix.len()) as u32;
    let offset_of = |which: Placeholder| {
        positions
            .iter()
            .find(|(p, _)| *p == which)
            .map(|&(_, pos)| file_offset(pos))
    };

    let mac = offset_of(Placeholder::Cmac);
    let mac_input = offset_of(Placeholder::CmacStart);
    match (mac_input, mac) {
        (Some(_), None) => {
            return Err(Error::InvalidTemplate(format!("{CMAC_START_TAG} without {CMAC_TAG}")));
        }
        (Some(input), Some(mac)) if input > mac => {
            return Err(Error::InvalidTemplate(format!("{CMAC_START_TAG} after {CMAC_TAG}")));
        }
        _ => {}
    }

    let offsets = SdmOffsets {
        uid: offset_of(Placeholder::Uid),
        read_ctr: offset_of(Placeholder::Counter),
        mac_input: mac_input.or(mac),
        mac,
        ..Default::default()
    };
    check_overlap(&offsets)?;

    Ok(NdefLayout {
        file: file.freeze(),
        offsets,
    })
}

/// Blank the mirrored regions of a file read back from the tag
///
/// Regions are clamped to the buffer so stale or foreign offsets never panic.
pub fn normalize(current: &[u8], offsets: &SdmOffsets) -> Bytes {
    let mut normalized = BytesMut::from(current);
    for (offset, len) in mirrored_regions(offsets) {
        let start = (offset as usize).min(normalized.len());
        let end = start.saturating_add(len).min(normalized.len());
        normalized[start..end].fill(FILLER);
    }
    normalized.freeze()
}

/// Decode the first record of an NDEF file (`NLEN || message`)
pub fn decode_file(file: &[u8]) -> Result<NdefRecord> {
    let nlen = file
        .get(..NLEN_SIZE)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
        .ok_or(Error::MalformedInput("NDEF file shorter than NLEN"))?;
    let message = file
        .get(NLEN_SIZE..NLEN_SIZE + nlen)
        .ok_or(Error::MalformedInput("NDEF message shorter than NLEN"))?;
    decode_record(message)
}

fn decode_record(message: &[u8]) -> Result<NdefRecord> {
    let mut rest = message;

    let header = take(&mut rest, 1)?[0];
    if header & FLAG_CF != 0 {
        return Err(Error::MalformedInput("chunked NDEF records are not supported"));
    }

    let type_len = take(&mut rest, 1)?[0] as usize;
    let payload_len = if header & FLAG_SR != 0 {
        take(&mut rest, 1)?[0] as usize
    } else {
        let b = take(&mut rest, 4)?;
        u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
    };
    let id_len = if header & FLAG_IL != 0 {
        take(&mut rest, 1)?[0] as usize
    } else {
        0
    };
    let record_type = Bytes::copy_from_slice(take(&mut rest, type_len)?);
    take(&mut rest, id_len)?;
    let payload = Bytes::copy_from_slice(take(&mut rest, payload_len)?);

    Ok(NdefRecord {
        tnf: header & TNF_MASK,
        record_type,
        payload,
    })
}

fn take<'a>(rest: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    let current: &'a [u8] = rest;
    if current.len() < len {
        return Err(Error::MalformedInput("NDEF record truncated"));
    }
    let (head, tail) = current.split_at(len);
    *rest = tail;
    Ok(head)
}

// Replace placeholders by filler and remember where each one landed.
fn expand(template: &str) -> Result<(String, Vec<(Placeholder, usize)>)> {
    let mut uri = String::with_capacity(template.len() + CMAC_ASCII_LEN);
    let mut positions: Vec<(Placeholder, usize)> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        uri.push_str(&rest[..start]);
        rest = &rest[start..];

        let Some((placeholder, tag)) = Placeholder::ALL
            .into_iter()
            .find(|(_, tag)| rest.starts_with(tag))
        else {
            uri.push('{');
            rest = &rest[1..];
            continue;
        };

        if positions.iter().any(|(p, _)| *p == placeholder) {
            return Err(Error::InvalidTemplate(format!(
                "{} appears more than once",
                placeholder.tag()
            )));
        }
        positions.push((placeholder, uri.len()));
        uri.extend(std::iter::repeat_n(FILLER as char, placeholder.width()));
        rest = &rest[tag.len()..];
    }
    uri.push_str(rest);

    Ok((uri, positions))
}

fn longest_prefix(uri: &str) -> (u8, &'static str) {
    URI_PREFIXES
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, prefix)| uri.starts_with(*prefix))
        .max_by_key(|(_, prefix)| prefix.len())
        .map(|(code, prefix)| (code as u8, *prefix))
        .unwrap_or((0x00, ""))
}

fn mirrored_regions(offsets: &SdmOffsets) -> impl Iterator<Item = (u32, usize)> {
    [
        offsets.uid.map(|o| (o, UID_ASCII_LEN)),
        offsets.read_ctr.map(|o| (o, COUNTER_ASCII_LEN)),
        offsets.mac.map(|o| (o, CMAC_ASCII_LEN)),
    ]
    .into_iter()
    .flatten()
}

fn check_overlap(offsets: &SdmOffsets) -> Result<()> {
    let overlaps = |a: Option<u32>, a_len: usize, b: Option<u32>, b_len: usize| match (a, b) {
        (Some(a), Some(b)) => {
            let (a, b) = (a as usize, b as usize);
            a < b + b_len && b < a + a_len
        }
        _ => false,
    };

    if overlaps(offsets.uid, UID_ASCII_LEN, offsets.read_ctr, COUNTER_ASCII_LEN) {
        return Err(Error::PlaceholderOverlap("UID and counter"));
    }
    if overlaps(offsets.uid, UID_ASCII_LEN, offsets.mac, CMAC_ASCII_LEN) {
        return Err(Error::PlaceholderOverlap("UID and MAC"));
    }
    if overlaps(offsets.read_ctr, COUNTER_ASCII_LEN, offsets.mac, CMAC_ASCII_LEN) {
        return Err(Error::PlaceholderOverlap("counter and MAC"));
    }
    Ok(())
}

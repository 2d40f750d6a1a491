//! Common test utilities: a simulated NTAG 424 DNA tag

#![allow(dead_code, unreachable_pub)]

use bytes::Bytes;
use ntag424::constants::{FACTORY_FILE_SETTINGS, NDEF_APPLICATION_AID, NDEF_FILE_ID};
use ntag424::crypto::{
    AesKey, ZERO_IV, crc32_jam, decrypt, decrypt_raw, derive_session_keys, encrypt, mac_truncated,
    rotate_left,
};
use ntag424::file_settings::{ACCESS_FREE, FileSettings};
use ntag424::ndef::{CMAC_ASCII_LEN, COUNTER_ASCII_LEN, UID_ASCII_LEN};
use ntag424_apdu_core::{CardTransport, Command, PresentedCard, ReaderSession, TransportError};
use rand::RngCore;

/// UID of every simulated tag
pub const UID: [u8; 7] = [0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6];
/// Card nonce used by the simulated tag
pub const RND_B: [u8; 16] = [
    0x91, 0x51, 0x79, 0x75, 0x19, 0x0D, 0xCE, 0xA6, 0x10, 0x49, 0x48, 0xEF, 0xA3, 0x08, 0x5C, 0x1B,
];
/// Transaction identifier handed out by the simulated tag
pub const TI: [u8; 4] = [0x9D, 0x00, 0xC4, 0xDF];
/// Value the tag mirrors for the SDM MAC
pub const MIRRORED_MAC: &[u8; CMAC_ASCII_LEN] = b"0123456789ABCDEF";

const FILE_SIZE: usize = 256;
const SW_SUCCESS: [u8; 2] = [0x90, 0x00];
const SW_OK: [u8; 2] = [0x91, 0x00];
const SW_MORE: [u8; 2] = [0x91, 0xAF];
const SW_AUTH_ERROR: [u8; 2] = [0x91, 0xAE];
const SW_PERMISSION_DENIED: [u8; 2] = [0x91, 0x9D];
const SW_INTEGRITY_ERROR: [u8; 2] = [0x91, 0x1E];
const SW_NO_SUCH_KEY: [u8; 2] = [0x91, 0x40];
const SW_SECURITY_STATUS: [u8; 2] = [0x69, 0x82];
const SW_NOT_FOUND: [u8; 2] = [0x6A, 0x82];
const SW_INS_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];

/// Install a tracing subscriber once, honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// RNG that hands out a fixed byte sequence, repeating it when exhausted
#[derive(Debug, Clone)]
pub struct FixedRng {
    bytes: Vec<u8>,
    pos: usize,
}

impl FixedRng {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            pos: 0,
        }
    }
}

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for byte in dst {
            *byte = self.bytes[self.pos % self.bytes.len()];
            self.pos += 1;
        }
    }
}

#[derive(Debug, Clone)]
struct SimSession {
    key_no: u8,
    enc_key: AesKey,
    mac_key: AesKey,
    counter: u16,
}

/// Software model of the parts of an NTAG 424 DNA the personalization uses
#[derive(Debug, Clone)]
pub struct SimulatedTag {
    /// Application keys
    pub keys: [AesKey; 5],
    /// Raw GetFileSettings response
    pub settings: Vec<u8>,
    /// NDEF file contents
    pub file: Vec<u8>,
    /// Every command received
    pub received: Vec<Bytes>,
    /// Corrupt the MAC of the next secured response
    pub corrupt_next_mac: bool,
    /// SDM read counter mirrored on every read
    pub read_counter: u32,
    app_selected: bool,
    file_selected: bool,
    pending_auth: Option<u8>,
    session: Option<SimSession>,
}

impl Default for SimulatedTag {
    fn default() -> Self {
        Self::factory()
    }
}

impl SimulatedTag {
    /// A tag as shipped: zero keys, factory settings, empty NDEF
    pub fn factory() -> Self {
        Self {
            keys: [[0u8; 16]; 5],
            settings: FACTORY_FILE_SETTINGS.to_vec(),
            file: vec![0u8; FILE_SIZE],
            received: Vec::new(),
            corrupt_next_mac: false,
            read_counter: 0,
            app_selected: false,
            file_selected: false,
            pending_auth: None,
            session: None,
        }
    }

    /// Counter of the current session, if authenticated
    pub fn session_counter(&self) -> Option<u16> {
        self.session.as_ref().map(|s| s.counter)
    }

    /// Parsed current settings
    pub fn parsed_settings(&self) -> FileSettings {
        FileSettings::parse(&self.settings).unwrap()
    }

    /// Instructions received, in order
    pub fn instructions(&self) -> Vec<u8> {
        self.received.iter().map(|c| c[1]).collect()
    }

    fn handle(&mut self, raw: &[u8]) -> Vec<u8> {
        let Ok(command) = Command::from_bytes(raw) else {
            return SW_INS_NOT_SUPPORTED.to_vec();
        };
        let data = command.data().to_vec();

        match (command.cla, command.ins) {
            (0xFF, 0xCA) => with_sw(&UID, SW_SUCCESS),
            (0x00, 0xA4) => self.select(command.p1, &data),
            (0x00, 0xB0) => self.read_binary(command.p1, command.p2, command.le.unwrap_or(0)),
            (0x00, 0xD6) => self.update_binary(command.p1, command.p2, &data),
            (0x90, 0xF5) => with_sw(&self.settings, SW_OK),
            (0x90, 0x71) => self.authenticate_first(&data),
            (0x90, 0xAF) => self.authenticate_second(&data),
            // FULL frames are file number, whole blocks and an 8 byte MAC
            (0x90, 0x5F) if self.session.is_some() && data.len() % 16 == 9 => {
                self.secured(command.ins, &data)
            }
            (0x90, 0x5F) => self.change_settings_plain(&data),
            (0x90, 0xC4) => self.secured(command.ins, &data),
            _ => SW_INS_NOT_SUPPORTED.to_vec(),
        }
    }

    fn select(&mut self, p1: u8, data: &[u8]) -> Vec<u8> {
        match p1 {
            0x04 if data == NDEF_APPLICATION_AID => {
                self.app_selected = true;
                self.file_selected = false;
                SW_SUCCESS.to_vec()
            }
            0x00 if self.app_selected && data == NDEF_FILE_ID => {
                self.file_selected = true;
                SW_SUCCESS.to_vec()
            }
            _ => SW_NOT_FOUND.to_vec(),
        }
    }

    fn read_binary(&mut self, p1: u8, p2: u8, le: u8) -> Vec<u8> {
        let settings = self.parsed_settings();
        if !self.file_selected || settings.access_rights.read != ACCESS_FREE {
            return SW_SECURITY_STATUS.to_vec();
        }
        let offset = u16::from_be_bytes([p1, p2]) as usize;
        let len = if le == 0 { FILE_SIZE } else { le as usize };
        let view = self.mirrored_file(&settings, offset == 0);
        let end = (offset + len).min(FILE_SIZE);
        with_sw(&view[offset.min(end)..end], SW_SUCCESS)
    }

    // The file as a reader would see it, with SDM mirrors filled in
    fn mirrored_file(&mut self, settings: &FileSettings, new_read: bool) -> Vec<u8> {
        let mut view = self.file.clone();
        let offsets = settings.offsets();
        if settings.sdm_enabled() && new_read {
            self.read_counter += 1;
        }
        let uid_hex = hex::encode_upper(UID);
        let counter_hex = format!("{:06X}", self.read_counter);
        let mirrors = [
            (offsets.uid, uid_hex.as_bytes(), UID_ASCII_LEN),
            (offsets.read_ctr, counter_hex.as_bytes(), COUNTER_ASCII_LEN),
            (offsets.mac, MIRRORED_MAC.as_slice(), CMAC_ASCII_LEN),
        ];
        for (offset, value, len) in mirrors {
            if let Some(offset) = offset {
                let offset = offset as usize;
                if offset + len <= view.len() {
                    view[offset..offset + len].copy_from_slice(&value[..len]);
                }
            }
        }
        view
    }

    fn update_binary(&mut self, p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
        if !self.file_selected || self.parsed_settings().access_rights.write != ACCESS_FREE {
            return SW_SECURITY_STATUS.to_vec();
        }
        let offset = u16::from_be_bytes([p1, p2]) as usize;
        if offset + data.len() > FILE_SIZE {
            return SW_NOT_FOUND.to_vec();
        }
        self.file[offset..offset + data.len()].copy_from_slice(data);
        SW_SUCCESS.to_vec()
    }

    fn authenticate_first(&mut self, data: &[u8]) -> Vec<u8> {
        self.session = None;
        let key_no = data[0];
        if key_no as usize >= self.keys.len() {
            return SW_NO_SUCH_KEY.to_vec();
        }
        self.pending_auth = Some(key_no);
        let key = self.keys[key_no as usize];
        with_sw(&encrypt(&key, &RND_B, &ZERO_IV).unwrap(), SW_MORE)
    }

    fn authenticate_second(&mut self, data: &[u8]) -> Vec<u8> {
        let Some(key_no) = self.pending_auth.take() else {
            return SW_PERMISSION_DENIED.to_vec();
        };
        let key = self.keys[key_no as usize];
        let decrypted = decrypt_raw(&key, data, &ZERO_IV).unwrap();
        if decrypted[16..] != rotate_left(&RND_B)[..] {
            return SW_AUTH_ERROR.to_vec();
        }
        let rnd_a: [u8; 16] = decrypted[..16].try_into().unwrap();

        let mut plaintext = TI.to_vec();
        plaintext.extend_from_slice(&rotate_left(&rnd_a));
        plaintext.extend_from_slice(&[0u8; 12]);

        let (enc_key, mac_key) = derive_session_keys(&key, &rnd_a, &RND_B);
        self.session = Some(SimSession {
            key_no,
            enc_key,
            mac_key,
            counter: 0,
        });
        with_sw(&encrypt(&key, &plaintext, &ZERO_IV).unwrap(), SW_OK)
    }

    fn change_settings_plain(&mut self, data: &[u8]) -> Vec<u8> {
        if self.parsed_settings().access_rights.change != ACCESS_FREE {
            return SW_PERMISSION_DENIED.to_vec();
        }
        self.apply_settings(&data[1..])
    }

    fn apply_settings(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut raw = vec![0x00];
        raw.extend_from_slice(&payload[..3]);
        raw.extend_from_slice(&[0x00, 0x01, 0x00]);
        raw.extend_from_slice(&payload[3..]);
        if FileSettings::parse(&raw).is_err() {
            return SW_INTEGRITY_ERROR.to_vec();
        }
        self.settings = raw;
        SW_OK.to_vec()
    }

    fn secured(&mut self, ins: u8, data: &[u8]) -> Vec<u8> {
        let Some(mut session) = self.session.take() else {
            return SW_PERMISSION_DENIED.to_vec();
        };

        let (header, rest) = data.split_at(1);
        let (enc, mac) = rest.split_at(rest.len() - 8);

        let mut mac_input = vec![ins];
        mac_input.extend_from_slice(&session.counter.to_le_bytes());
        mac_input.extend_from_slice(&TI);
        mac_input.extend_from_slice(header);
        mac_input.extend_from_slice(enc);
        if mac_truncated(&session.mac_key, &mac_input) != mac {
            return SW_INTEGRITY_ERROR.to_vec();
        }

        let mut iv_input = [0u8; 16];
        iv_input[..2].copy_from_slice(&[0xA5, 0x5A]);
        iv_input[2..6].copy_from_slice(&TI);
        iv_input[6..8].copy_from_slice(&session.counter.to_le_bytes());
        let iv: [u8; 16] = encrypt(&session.enc_key, &iv_input, &ZERO_IV)
            .unwrap()
            .as_ref()
            .try_into()
            .unwrap();

        session.counter += 1;

        let (status, ends_session) = match ins {
            0xC4 => {
                let plain = decrypt_raw(&session.enc_key, enc, &iv).unwrap();
                self.change_key(&session, header[0], &plain)
            }
            _ => {
                let change = self.parsed_settings().access_rights.change;
                if change != session.key_no {
                    (SW_PERMISSION_DENIED, false)
                } else {
                    let payload = decrypt(&session.enc_key, enc, &iv).unwrap();
                    let sw = self.apply_settings(&payload);
                    ([sw[0], sw[1]], false)
                }
            }
        };

        if ends_session || status != SW_OK {
            return status.to_vec();
        }

        let mut response_input = vec![0x00];
        response_input.extend_from_slice(&session.counter.to_le_bytes());
        response_input.extend_from_slice(&TI);
        let mut rmac = mac_truncated(&session.mac_key, &response_input);
        if std::mem::take(&mut self.corrupt_next_mac) {
            rmac[0] ^= 0xFF;
        }
        self.session = Some(session);
        with_sw(&rmac, SW_OK)
    }

    // Returns the status word and whether the session ended
    fn change_key(&mut self, session: &SimSession, key_no: u8, plain: &[u8]) -> ([u8; 2], bool) {
        if session.key_no != 0 {
            return (SW_PERMISSION_DENIED, false);
        }
        if key_no as usize >= self.keys.len() {
            return (SW_NO_SUCH_KEY, false);
        }
        let mut new_key = [0u8; 16];
        if key_no == 0 {
            assert_eq!(plain[16], 0x01, "key version");
            assert_eq!(plain[17], 0x80, "padding");
            new_key.copy_from_slice(&plain[..16]);
        } else {
            let old = self.keys[key_no as usize];
            for (i, byte) in new_key.iter_mut().enumerate() {
                *byte = plain[i] ^ old[i];
            }
            let crc = u32::from_le_bytes(plain[17..21].try_into().unwrap());
            if plain[16] != 0x01 || crc != crc32_jam(&new_key) || plain[21] != 0x80 {
                return (SW_INTEGRITY_ERROR, false);
            }
        }
        self.keys[key_no as usize] = new_key;
        (SW_OK, key_no == session.key_no)
    }
}

impl CardTransport for SimulatedTag {
    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        self.received.push(Bytes::copy_from_slice(command));
        let response = self.handle(command);
        if response.len() > max_response_len {
            return Err(TransportError::BufferTooSmall);
        }
        Ok(Bytes::from(response))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.session = None;
        self.pending_auth = None;
        self.app_selected = false;
        self.file_selected = false;
        Ok(())
    }
}

/// Reader session with an optional simulated tag on it
#[derive(Debug, Default)]
pub struct SimulatedReader {
    pub tag: Option<SimulatedTag>,
}

impl ReaderSession for SimulatedReader {
    type Transport = SimulatedTag;

    fn current_reader(&self) -> Option<String> {
        Some("Simulated Reader 00".to_string())
    }

    fn current_card(&self) -> Result<Option<PresentedCard>, TransportError> {
        Ok(self.tag.as_ref().map(|_| PresentedCard {
            reader: "Simulated Reader 00".to_string(),
            atr: None,
        }))
    }

    fn connect(&self) -> Result<Self::Transport, TransportError> {
        self.tag.clone().ok_or(TransportError::NoCard)
    }
}

fn with_sw(data: &[u8], sw: [u8; 2]) -> Vec<u8> {
    let mut response = data.to_vec();
    response.extend_from_slice(&sw);
    response
}

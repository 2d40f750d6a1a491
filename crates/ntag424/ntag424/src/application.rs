//! NTAG 424 DNA application handle
//!
//! This module provides the per-connection interface to a tag: plain ISO
//! and native commands, plus the FULL mode commands that need an
//! authenticated session.

use bytes::{BufMut, Bytes, BytesMut};
use ntag424_apdu_core::prelude::*;
use rand::RngCore;
use tracing::{debug, info};

use crate::authenticate::Authenticator;
use crate::commands::{self, transceive};
use crate::constants::{KEY_VERSION, MAX_BINARY_CHUNK, NDEF_FILE_NO, ins, response_len, status};
use crate::crypto::{AesKey, crc32_jam};
use crate::keys::{KeyIndex, KeyReference, KeyTable, Uid};
use crate::secure_messaging::wrap_and_send;
use crate::session::SessionContext;
use crate::{Error, Result};

const UID_LEN: usize = 7;
const KEY_DATA_PADDING: u8 = 0x80;

/// Communication mode of a native command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMode {
    /// No protection
    Plain,
    /// Encrypted and MACed
    Full,
}

/// NTAG 424 DNA application over a card transport
///
/// Holds at most one authenticated session. Every exchange takes `&mut self`
/// so commands can never interleave.
#[derive(Debug)]
pub struct Ntag424<T: CardTransport> {
    /// Transport to the tag
    transport: T,
    /// Current session and the key slot it was opened with
    session: Option<(SessionContext, KeyIndex)>,
}

impl<T: CardTransport> Ntag424<T> {
    /// Wrap a connected transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            session: None,
        }
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Borrow the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Current session, if authenticated
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref().map(|(ctx, _)| ctx)
    }

    /// Forget the current session and fall back to plain mode
    pub fn clear_session(&mut self) {
        if self.session.take().is_some() {
            debug!("Session discarded");
        }
    }

    /// Read the UID with the reader's GET DATA pseudo-APDU
    pub fn get_uid(&mut self) -> Result<Uid> {
        let uid = self.send_plain(
            &commands::get_uid(),
            response_len::SETTINGS,
            status::SUCCESS,
        )?;
        if uid.len() != UID_LEN {
            return Err(Error::MalformedInput("UID is not 7 bytes"));
        }
        let uid = Uid::new(uid);
        debug!(%uid, "Read UID");
        Ok(uid)
    }

    /// Select the NDEF application by DF name
    pub fn select_ndef_application(&mut self) -> Result<()> {
        self.send_plain(
            &commands::select_ndef_application(),
            response_len::DEFAULT,
            status::SUCCESS,
        )?;
        Ok(())
    }

    /// Raw file settings of the NDEF file
    pub fn get_file_settings(&mut self) -> Result<Bytes> {
        let raw = self.send_plain(
            &commands::get_file_settings(),
            response_len::SETTINGS,
            status::OPERATION_OK,
        )?;
        debug!(settings = %hex::encode_upper(&raw), "Read file settings");
        Ok(raw)
    }

    /// Change the settings of the NDEF file
    ///
    /// `payload` is the ChangeFileSettings data without the file number.
    pub fn set_file_settings(&mut self, payload: &[u8], mode: CommMode) -> Result<()> {
        debug!(payload = %hex::encode_upper(payload), ?mode, "Changing file settings");
        let result = match mode {
            CommMode::Plain => self
                .send_plain(
                    &commands::set_file_settings_plain(payload),
                    response_len::DEFAULT,
                    status::OPERATION_OK,
                )
                .map(|_| ()),
            CommMode::Full => self.send_full(ins::CHANGE_FILE_SETTINGS, &[NDEF_FILE_NO], payload),
        };

        result.map_err(|e| match e {
            Error::CommandRejected { status } => Error::SettingsChangeRejected(format!(
                "card answered {status}: {}",
                status.description()
            )),
            other => other,
        })
    }

    /// Read the NDEF file, `NLEN` included and trailing space excluded
    pub fn read_ndef(&mut self) -> Result<Bytes> {
        self.select_ndef_file()?;

        let first = self.read_chunk(0, MAX_BINARY_CHUNK)?;
        if first.len() < 2 {
            return Err(Error::MalformedInput("NDEF file shorter than NLEN"));
        }
        let total = 2 + u16::from_be_bytes([first[0], first[1]]) as usize;

        let mut file = BytesMut::with_capacity(total.max(first.len()));
        file.put_slice(&first);
        while file.len() < total {
            let want = (total - file.len()).min(MAX_BINARY_CHUNK);
            let chunk = self.read_chunk(file.len(), want)?;
            if chunk.is_empty() {
                return Err(Error::MalformedInput("NDEF file ends before NLEN"));
            }
            file.put_slice(&chunk);
        }
        file.truncate(total);

        debug!(len = file.len(), "Read NDEF file");
        Ok(file.freeze())
    }

    /// Write the NDEF file from offset 0
    pub fn write_ndef(&mut self, file: &[u8]) -> Result<()> {
        self.select_ndef_file()?;

        for (index, chunk) in file.chunks(MAX_BINARY_CHUNK).enumerate() {
            let offset = index * MAX_BINARY_CHUNK;
            let command = commands::update_binary(offset, Bytes::copy_from_slice(chunk))?;
            self.send_plain(&command, response_len::DEFAULT, status::SUCCESS)?;
        }

        info!(len = file.len(), "Wrote NDEF file");
        Ok(())
    }

    /// Authenticate with a key of `keys`, replacing any previous session
    pub fn authenticate<R>(
        &mut self,
        reference: KeyReference,
        keys: &KeyTable,
        rng: &mut R,
    ) -> Result<()>
    where
        R: RngCore + ?Sized,
    {
        self.clear_session();

        let index = reference.index();
        let authenticator = Authenticator::new(index.value(), keys.for_reference(reference));
        let session = authenticator.run(&mut self.transport, rng)?;

        info!(key_no = index.value(), ?reference, "Authenticated");
        self.session = Some((session, index));
        Ok(())
    }

    /// Replace the key in slot `index`
    ///
    /// `old` is only used for non-master keys, which are sent XORed with it.
    /// Changing the key the session was opened with ends the session.
    pub fn change_key(&mut self, index: KeyIndex, new: &AesKey, old: &AesKey) -> Result<()> {
        let mut data = BytesMut::with_capacity(32);
        if index.is_master() {
            data.put_slice(new);
            data.put_u8(KEY_VERSION);
        } else {
            for (n, o) in new.iter().zip(old) {
                data.put_u8(n ^ o);
            }
            data.put_u8(KEY_VERSION);
            data.put_u32_le(crc32_jam(new));
        }
        data.put_u8(KEY_DATA_PADDING);
        data.resize(32, 0x00);

        let result = self.send_full(ins::CHANGE_KEY, &[index.value()], &data);
        data.fill(0);
        result?;

        info!(key_no = index.value(), "Changed key");
        if matches!(self.session, Some((_, active)) if active == index) {
            self.clear_session();
        }
        Ok(())
    }

    fn select_ndef_file(&mut self) -> Result<()> {
        self.send_plain(
            &commands::select_ndef_file(),
            response_len::DEFAULT,
            status::SUCCESS,
        )?;
        Ok(())
    }

    fn read_chunk(&mut self, offset: usize, len: usize) -> Result<Bytes> {
        let command = commands::read_binary(offset, len as u8)?;
        self.send_plain(&command, response_len::READ_BINARY, status::SUCCESS)
    }

    fn send_plain(
        &mut self,
        command: &Command,
        max_response_len: usize,
        expected: StatusWord,
    ) -> Result<Bytes> {
        let response = transceive(&mut self.transport, command, max_response_len)?;
        Ok(response.expect_status(expected)?)
    }

    fn send_full(&mut self, ins: u8, header: &[u8], data: &[u8]) -> Result<()> {
        let (ctx, _) = self.session.as_mut().ok_or(Error::NoSession)?;
        wrap_and_send(ctx, &mut self.transport, ins, header, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTransport;
    use hex_literal::hex;

    fn ndef_file(len: usize) -> Vec<u8> {
        let mut file = ((len - 2) as u16).to_be_bytes().to_vec();
        file.extend((0..len - 2).map(|i| i as u8));
        file
    }

    fn with_sw(data: &[u8], sw: [u8; 2]) -> Bytes {
        let mut raw = data.to_vec();
        raw.extend_from_slice(&sw);
        Bytes::from(raw)
    }

    #[test]
    fn test_get_uid() {
        let mut transport = ScriptedTransport::default();
        transport.push_ok(with_sw(&hex!("04A1B2C3D4E5F6"), [0x90, 0x00]));
        transport.push_ok(with_sw(&hex!("04A1B2C3"), [0x90, 0x00]));
        let mut tag = Ntag424::new(transport);

        assert_eq!(tag.get_uid().unwrap().to_hex(), "04A1B2C3D4E5F6");
        assert!(matches!(tag.get_uid(), Err(Error::MalformedInput(_))));
        assert_eq!(tag.transport().sent[0].as_ref(), hex!("FFCA000000"));
    }

    #[test]
    fn test_read_ndef_follows_nlen_across_chunks() {
        let file = ndef_file(200);
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from_static(&[0x90, 0x00]));
        transport.push_ok(with_sw(&file[..128], [0x90, 0x00]));
        transport.push_ok(with_sw(&file[128..], [0x90, 0x00]));
        let mut tag = Ntag424::new(transport);

        assert_eq!(tag.read_ndef().unwrap().as_ref(), file.as_slice());
        let sent = &tag.transport().sent;
        assert_eq!(sent[1].as_ref(), hex!("00B0000080"));
        assert_eq!(sent[2].as_ref(), hex!("00B0008048"));
    }

    #[test]
    fn test_read_ndef_trims_to_nlen() {
        let mut chunk = ndef_file(40);
        chunk.resize(128, 0x00);
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from_static(&[0x90, 0x00]));
        transport.push_ok(with_sw(&chunk, [0x90, 0x00]));
        let mut tag = Ntag424::new(transport);

        assert_eq!(tag.read_ndef().unwrap().len(), 40);
    }

    #[test]
    fn test_write_ndef_in_chunks() {
        let file = ndef_file(150);
        let mut transport = ScriptedTransport::default();
        for _ in 0..3 {
            transport.push_ok(Bytes::from_static(&[0x90, 0x00]));
        }
        let mut tag = Ntag424::new(transport);
        tag.write_ndef(&file).unwrap();

        let sent = &tag.transport().sent;
        assert_eq!(sent[0].as_ref(), hex!("00A4000C02E10400"));
        assert_eq!(sent[1][..5], hex!("00D6000080"));
        assert_eq!(sent[2][..5], hex!("00D6008016"));
        assert_eq!(&sent[2][5..], &file[128..]);
    }

    #[test]
    fn test_plain_settings_refusal() {
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from_static(&[0x91, 0x9D]));
        let mut tag = Ntag424::new(transport);

        assert!(matches!(
            tag.set_file_settings(&hex!("0000E0"), CommMode::Plain),
            Err(Error::SettingsChangeRejected(_))
        ));
        assert_eq!(tag.transport().sent[0].as_ref(), hex!("905F000004020000E000"));
    }

    #[test]
    fn test_full_mode_requires_session() {
        let mut tag = Ntag424::new(ScriptedTransport::default());
        assert!(matches!(
            tag.set_file_settings(&hex!("0000E0"), CommMode::Full),
            Err(Error::NoSession)
        ));
        assert!(matches!(
            tag.change_key(KeyIndex::MASTER, &[1; 16], &[0; 16]),
            Err(Error::NoSession)
        ));
        assert!(tag.transport().sent.is_empty());
    }
}

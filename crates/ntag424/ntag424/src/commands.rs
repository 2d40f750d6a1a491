//! Builders for the plain command frames sent to the tag.
//!
//! Secured commands are framed by the secure messenger; everything here goes
//! out unprotected.

use bytes::{BufMut, Bytes, BytesMut};
use ntag424_apdu_core::{CardTransport, Command, Response};

use crate::constants::{NDEF_APPLICATION_AID, NDEF_FILE_ID, NDEF_FILE_NO, cla, ins};
use crate::error::{Error, Result};

/// Largest offset addressable by READ/UPDATE BINARY with a 15-bit P1P2
pub const MAX_BINARY_OFFSET: usize = 0x7FFF;

/// `FF CA 00 00 00`: UID of the presented card
pub const fn get_uid() -> Command {
    Command::new_with_le(cla::READER, ins::GET_DATA, 0x00, 0x00, 0x00)
}

/// `00 A4 04 0C 07 D2760000850101 00`: select the NDEF application by DF name
pub fn select_ndef_application() -> Command {
    Command::new_with_data_and_le(
        cla::ISO,
        ins::SELECT,
        0x04,
        0x0C,
        Bytes::from_static(NDEF_APPLICATION_AID),
        0x00,
    )
}

/// `00 A4 00 0C 02 E104 00`: select the NDEF file by identifier
pub fn select_ndef_file() -> Command {
    Command::new_with_data_and_le(
        cla::ISO,
        ins::SELECT,
        0x00,
        0x0C,
        Bytes::from_static(NDEF_FILE_ID),
        0x00,
    )
}

/// `90 F5 00 00 01 02 00`: file settings of the NDEF file
pub fn get_file_settings() -> Command {
    Command::new_with_data_and_le(
        cla::NATIVE,
        ins::GET_FILE_SETTINGS,
        0x00,
        0x00,
        Bytes::from_static(&[NDEF_FILE_NO]),
        0x00,
    )
}

/// `90 5F 00 00 Lc 02 || payload 00`: change file settings in plain mode
pub fn set_file_settings_plain(payload: &[u8]) -> Command {
    let mut data = BytesMut::with_capacity(1 + payload.len());
    data.put_u8(NDEF_FILE_NO);
    data.put_slice(payload);
    Command::new_with_data_and_le(
        cla::NATIVE,
        ins::CHANGE_FILE_SETTINGS,
        0x00,
        0x00,
        data.freeze(),
        0x00,
    )
}

/// `90 71 00 00 02 keyNo 00 00`: first part of AuthenticateEV2First
pub fn authenticate_ev2_first(key_no: u8) -> Command {
    Command::new_with_data_and_le(
        cla::NATIVE,
        ins::AUTHENTICATE_EV2_FIRST,
        0x00,
        0x00,
        Bytes::copy_from_slice(&[key_no, 0x00]),
        0x00,
    )
}

/// `90 AF 00 00 Lc data 00`: continuation frame
pub fn additional_frame(data: impl Into<Bytes>) -> Command {
    Command::new_with_data_and_le(cla::NATIVE, ins::ADDITIONAL_FRAME, 0x00, 0x00, data, 0x00)
}

/// `00 B0 P1P2 Le`: read `len` bytes of the selected file at `offset`
pub fn read_binary(offset: usize, len: u8) -> Result<Command> {
    let [p1, p2] = binary_offset(offset)?;
    Ok(Command::new_with_le(cla::ISO, ins::READ_BINARY, p1, p2, len))
}

/// `00 D6 P1P2 Lc data`: write `data` to the selected file at `offset`
pub fn update_binary(offset: usize, data: impl Into<Bytes>) -> Result<Command> {
    let [p1, p2] = binary_offset(offset)?;
    Ok(Command::new_with_data(cla::ISO, ins::UPDATE_BINARY, p1, p2, data))
}

/// Send a command and parse the response frame
pub(crate) fn transceive<T>(
    transport: &mut T,
    command: &Command,
    max_response_len: usize,
) -> Result<Response>
where
    T: CardTransport + ?Sized,
{
    command.validate()?;
    let raw = transport.transmit_raw(&command.to_bytes(), max_response_len)?;
    Ok(Response::from_bytes(&raw)?)
}

fn binary_offset(offset: usize) -> Result<[u8; 2]> {
    if offset > MAX_BINARY_OFFSET {
        return Err(Error::MalformedInput("binary offset exceeds 15 bits"));
    }
    Ok((offset as u16).to_be_bytes())
}

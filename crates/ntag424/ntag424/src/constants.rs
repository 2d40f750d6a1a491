use ntag424_apdu_core::StatusWord;

/// ISO DF name of the NDEF application
pub const NDEF_APPLICATION_AID: &[u8] = b"\xD2\x76\x00\x00\x85\x01\x01";
/// ISO file identifier of the NDEF file
pub const NDEF_FILE_ID: &[u8] = b"\xE1\x04";
/// Native file number of the NDEF file
pub const NDEF_FILE_NO: u8 = 0x02;

/// File settings of a tag as shipped from the factory
pub const FACTORY_FILE_SETTINGS: &[u8] = b"\x00\x00\xE0\xEE\x00\x01\x00";

/// Intermediate SetFileSettings payload applied to factory tags before the
/// final settings (SDM with PICC data at 0x20, MAC input and MAC at 0x43)
pub const EXAMPLE_FILE_SETTINGS: &[u8] =
    b"\x40\xEE\xEE\xC1\xF1\x21\x20\x00\x00\x43\x00\x00\x43\x00\x00";

/// Number of application keys on the tag
pub const KEY_COUNT: usize = 5;
/// Version byte written with every changed key
pub const KEY_VERSION: u8 = 0x01;

/// Largest chunk read or written by a single READ/UPDATE BINARY
pub const MAX_BINARY_CHUNK: usize = 0x80;

/// Default verification endpoint
pub const DEFAULT_BASE_URL: &str = "https://sdm.nfcdeveloper.com";
/// Path and query appended to the base URL when no template is given
pub const DEFAULT_URL_PATH: &str = "/tagpt?uid={uid}&ctr={counter}&cmac={cmac}";

/// Class bytes
pub mod cla {
    /// ISO/IEC 7816-4 interindustry class
    pub const ISO: u8 = 0x00;
    /// Wrapped native command class
    pub const NATIVE: u8 = 0x90;
    /// PC/SC reader pseudo-APDU class
    pub const READER: u8 = 0xFF;
}

/// Instruction bytes
pub mod ins {
    /// PC/SC GET DATA (UID)
    pub const GET_DATA: u8 = 0xCA;
    /// ISO SELECT
    pub const SELECT: u8 = 0xA4;
    /// ISO READ BINARY
    pub const READ_BINARY: u8 = 0xB0;
    /// ISO UPDATE BINARY
    pub const UPDATE_BINARY: u8 = 0xD6;
    /// AuthenticateEV2First
    pub const AUTHENTICATE_EV2_FIRST: u8 = 0x71;
    /// Additional frame
    pub const ADDITIONAL_FRAME: u8 = 0xAF;
    /// ChangeKey
    pub const CHANGE_KEY: u8 = 0xC4;
    /// GetFileSettings
    pub const GET_FILE_SETTINGS: u8 = 0xF5;
    /// ChangeFileSettings
    pub const CHANGE_FILE_SETTINGS: u8 = 0x5F;
}

/// Status words
pub mod status {
    use super::StatusWord;

    /// ISO success
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
    /// Native operation ok
    pub const OPERATION_OK: StatusWord = StatusWord::new(0x91, 0x00);
    /// Native additional frame
    pub const ADDITIONAL_FRAME: StatusWord = StatusWord::new(0x91, 0xAF);
}

/// Response buffer sizes, status word included
pub mod response_len {
    /// Default for short native responses
    pub const DEFAULT: usize = 40;
    /// READ BINARY of one full chunk
    pub const READ_BINARY: usize = super::MAX_BINARY_CHUNK + 2;
    /// GET UID, GetFileSettings and other small plain responses
    pub const SETTINGS: usize = 64;
}

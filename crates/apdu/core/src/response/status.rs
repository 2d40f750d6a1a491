//! Status word definitions for APDU responses

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates ISO success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if this status word indicates native success (91 00)
    pub const fn is_operation_ok(&self) -> bool {
        self.sw1 == 0x91 && self.sw2 == 0x00
    }

    /// Check if the card expects an additional frame (91 AF)
    pub const fn is_additional_frame(&self) -> bool {
        self.sw1 == 0x91 && self.sw2 == 0xAF
    }

    /// Check if this is a wrapped native status (91 XX)
    pub const fn is_native(&self) -> bool {
        self.sw1 == 0x91
    }

    /// Check if this status word indicates a security condition not satisfied (69 82)
    pub const fn is_security_condition_not_satisfied(&self) -> bool {
        self.sw1 == 0x69 && self.sw2 == 0x82
    }

    /// Check if this status word indicates a file not found (6A 82)
    pub const fn is_file_not_found(&self) -> bool {
        self.sw1 == 0x6A && self.sw2 == 0x82
    }

    /// Check if this status word indicates wrong length (67 00)
    pub const fn is_wrong_length(&self) -> bool {
        self.sw1 == 0x67 && self.sw2 == 0x00
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.is_operation_ok() || self.is_additional_frame() {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 {
            // Warnings
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x91, 0x00) => "Operation ok",
            (0x91, 0x0C) => "No changes",
            (0x91, 0x0E) => "Out of EEPROM",
            (0x91, 0x1C) => "Illegal command code",
            (0x91, 0x1E) => "Integrity error",
            (0x91, 0x40) => "No such key",
            (0x91, 0x7E) => "Length error",
            (0x91, 0x9D) => "Permission denied",
            (0x91, 0x9E) => "Parameter error",
            (0x91, 0xAD) => "Authentication delay",
            (0x91, 0xAE) => "Authentication error",
            (0x91, 0xAF) => "Additional frame",
            (0x91, 0xBE) => "Boundary error",
            (0x91, 0xCA) => "Command aborted",
            (0x91, 0xEE) => "Memory error",
            (0x91, 0xF0) => "File not found",
            (0x62, 0x82) => "End of file reached before reading Le bytes",
            (0x63, 0x00) => "No information given",
            (0x65, 0x81) => "Memory failure",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x81) => "Command incompatible with file structure",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x6A, 0x80) => "Incorrect parameters in the data field",
            (0x6A, 0x82) => "File not found",
            (0x6A, 0x86) => "Incorrect parameters P1-P2",
            (0x6A, 0x87) => "Lc inconsistent with P1-P2",
            (0x6C, _) => "Wrong Le field",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Common status words
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Native operation ok (91 00)
    pub const OPERATION_OK: StatusWord = StatusWord::new(0x91, 0x00);

    /// Native additional frame expected (91 AF)
    pub const ADDITIONAL_FRAME: StatusWord = StatusWord::new(0x91, 0xAF);

    /// Native authentication error (91 AE)
    pub const AUTHENTICATION_ERROR: StatusWord = StatusWord::new(0x91, 0xAE);

    /// Native integrity error (91 1E)
    pub const INTEGRITY_ERROR: StatusWord = StatusWord::new(0x91, 0x1E);

    /// Native permission denied (91 9D)
    pub const PERMISSION_DENIED: StatusWord = StatusWord::new(0x91, 0x9D);

    /// Native length error (91 7E)
    pub const LENGTH_ERROR: StatusWord = StatusWord::new(0x91, 0x7E);

    /// Native parameter error (91 9E)
    pub const PARAMETER_ERROR: StatusWord = StatusWord::new(0x91, 0x9E);

    /// Native illegal command code (91 1C)
    pub const ILLEGAL_COMMAND: StatusWord = StatusWord::new(0x91, 0x1C);

    /// Wrong length (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// Security condition not satisfied (69 82)
    pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);

    /// File not found (6A 82)
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);

    /// Incorrect parameters P1-P2 (6A 86)
    pub const INCORRECT_P1P2: StatusWord = StatusWord::new(0x6A, 0x86);

    /// Invalid instruction (6D 00)
    pub const INVALID_INSTRUCTION: StatusWord = StatusWord::new(0x6D, 0x00);

    /// Class not supported (6E 00)
    pub const CLASS_NOT_SUPPORTED: StatusWord = StatusWord::new(0x6E, 0x00);
}

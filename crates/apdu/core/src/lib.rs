//! Core traits and types for APDU (Application Protocol Data Unit) exchanges
//!
//! This crate provides the foundational types and traits for talking to NFC tags
//! through ISO/IEC 7816-4 framed commands and responses.
//!
//! ## Overview
//!
//! - Creating and parsing APDU commands and responses
//! - Communicating with tags through different transport layers
//! - Discovering the reader and the currently presented card
//! - Error handling and status word interpretation
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod reader;
pub mod response;
pub mod transport;

pub use command::{Command, CommandError};
pub use reader::{PresentedCard, ReaderSession};
pub use response::error::{ResponseError, StatusError};
pub use response::status::StatusWord;
pub use response::{Response, utils};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Response, StatusWord,
        reader::{PresentedCard, ReaderSession},
        response::error::{ResponseError, StatusError},
        transport::{CardTransport, TransportError},
    };
}

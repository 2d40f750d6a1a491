//! PC/SC transport implementation for APDU exchanges
//!
//! This crate provides an implementation of the `CardTransport` and
//! `ReaderSession` traits from `ntag424-apdu-core` using the PC/SC API for
//! communication with contactless readers.
//!
//! # Examples
//!
//! ```no_run
//! use ntag424_apdu_core::prelude::*;
//! use ntag424_apdu_transport_pcsc::PcscDeviceManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PcscDeviceManager::new()?;
//!
//! let readers = manager.list_readers()?;
//! let Some(reader) = readers.iter().find(|r| r.has_card()) else {
//!     println!("No card presented");
//!     return Ok(());
//! };
//!
//! let mut transport = manager.open_reader(reader.name())?;
//! let uid = transport.transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00], 32)?;
//! println!("UID response: {:02X?}", uid);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod session;
mod transport;

pub use config::{ConnectStrategy, PcscConfig};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use session::PcscReaderSession;
pub use transport::PcscTransport;

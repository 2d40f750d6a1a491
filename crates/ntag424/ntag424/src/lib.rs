//! NTAG 424 DNA secure messaging and SDM personalization
//!
//! This crate talks to NTAG 424 DNA tags over any [`CardTransport`]:
//!
//! - EV2 first authentication and session key derivation
//! - FULL mode secure messaging with counter and MAC discipline
//! - Encoding and decoding of SDM file settings
//! - NDEF layout of URL templates with mirrored UID, counter and MAC
//! - A personalization pass that diversifies keys and locks the settings
//!
//! # Example
//!
//! ```no_run
//! use ntag424::{MasterKey, Ntag424, personalize};
//! # use ntag424_apdu_core::CardTransport;
//!
//! # fn run<T: CardTransport>(transport: T) -> ntag424::Result<()> {
//! let master = MasterKey::from_hex("00112233445566778899AABBCCDDEEFF")?;
//! let mut tag = Ntag424::new(transport);
//! let report = personalize(
//!     &mut tag,
//!     &master,
//!     "https://sdm.nfcdeveloper.com/tagpt?uid={uid}&ctr={counter}&cmac={cmac}",
//!     &mut rand::rng(),
//! )?;
//! println!("{}: {}", report.uid, report.message);
//! # Ok(())
//! # }
//! ```
//!
//! [`CardTransport`]: ntag424_apdu_core::CardTransport
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod application;
pub mod authenticate;
pub mod commands;
pub mod constants;
pub mod crypto;
mod error;
pub mod file_settings;
pub mod keys;
pub mod ndef;
pub mod personalize;
pub mod secure_messaging;
pub mod session;

#[cfg(test)]
mod test_utils;

pub use application::{CommMode, Ntag424};
pub use authenticate::{AuthState, Authenticator};
pub use error::{Error, Result};
pub use file_settings::{
    AccessRights, FileSettings, SdmAccessRights, SdmOffsets, SdmOptions, SdmSettings,
};
pub use keys::{KeyIndex, KeyReference, KeyTable, MasterKey, Uid};
pub use ndef::NdefLayout;
pub use personalize::{PersonalizationReport, personalize, personalize_presented};
pub use secure_messaging::{SecureEnvelope, wrap_and_send};
pub use session::SessionContext;

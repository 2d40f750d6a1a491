//! Authenticated session state shared by the secure messenger.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::AesKey;
use crate::error::{Error, Result};

/// Transaction identifier chosen by the tag during authentication
pub type TransactionId = [u8; 4];

/// Session state established by a successful EV2 authentication
///
/// Only the authenticator creates contexts. The command counter moves
/// exclusively through [`SessionContext::advance`] and an invalidated context
/// refuses any further use.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionContext {
    ti: TransactionId,
    enc_key: AesKey,
    mac_key: AesKey,
    counter: u16,
    invalidated: bool,
}

impl SessionContext {
    pub(crate) const fn new(ti: TransactionId, enc_key: AesKey, mac_key: AesKey) -> Self {
        Self {
            ti,
            enc_key,
            mac_key,
            counter: 0,
            invalidated: false,
        }
    }

    /// Transaction identifier
    pub const fn ti(&self) -> &TransactionId {
        &self.ti
    }

    /// Session encryption key
    pub const fn enc_key(&self) -> &AesKey {
        &self.enc_key
    }

    /// Session MAC key
    pub const fn mac_key(&self) -> &AesKey {
        &self.mac_key
    }

    /// Number of secured commands sent in this session
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    /// Whether the session can no longer be used
    pub const fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Fail when the session has been invalidated
    pub fn ensure_valid(&self) -> Result<()> {
        if self.invalidated {
            Err(Error::SessionInvalidated)
        } else {
            Ok(())
        }
    }

    /// Move the command counter forward by one
    ///
    /// Overflow invalidates the session instead of wrapping.
    pub(crate) fn advance(&mut self) -> Result<u16> {
        match self.counter.checked_add(1) {
            Some(next) => {
                self.counter = next;
                Ok(next)
            }
            None => {
                self.invalidate();
                Err(Error::CounterExhausted)
            }
        }
    }

    /// Mark the session unusable
    pub(crate) fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("ti", &hex::encode_upper(self.ti))
            .field("counter", &self.counter)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

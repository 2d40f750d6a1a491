//! AuthenticateEV2First, the three-pass mutual authentication.
//!
//! ```text
//! PCD -> PICC  90 71 00 00 02 keyNo 00 00
//! PICC -> PCD  E(K, RndB) 91 AF
//! PCD -> PICC  90 AF 00 00 20 E(K, RndA || RndB') 00
//! PICC -> PCD  E(K, TI || RndA' || PDcap2 || PCDcap2) 91 00
//! ```
//!
//! The [`Authenticator`] is a sans-IO state machine: it produces the command
//! frames and consumes the parsed responses. [`Authenticator::run`] drives it
//! over a transport.

use ntag424_apdu_core::{CardTransport, Command, Response};
use rand::RngCore;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::commands::{self, transceive};
use crate::constants::{response_len, status};
use crate::crypto::{
    AesKey, BLOCK_SIZE, Nonce, ZERO_IV, decrypt_raw, derive_session_keys, encrypt, rotate_left,
    rotate_right,
};
use crate::error::{Error, Result};
use crate::session::{SessionContext, TransactionId};

const CONFIRMATION_LEN: usize = 2 * BLOCK_SIZE;

/// Progress of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing sent yet
    Idle,
    /// The card nonce was received and the host answer prepared
    NonceExchanged,
    /// Both parties proved knowledge of the key
    KeysEstablished,
    /// The attempt failed and cannot continue
    Failed,
}

/// One EV2 first authentication attempt with a single key
pub struct Authenticator {
    key_no: u8,
    key: AesKey,
    rnd_a: Nonce,
    rnd_b: Nonce,
    state: AuthState,
}

impl Authenticator {
    /// Prepare an attempt for key slot `key_no` holding `key`
    pub const fn new(key_no: u8, key: AesKey) -> Self {
        Self {
            key_no,
            key,
            rnd_a: [0u8; 16],
            rnd_b: [0u8; 16],
            state: AuthState::Idle,
        }
    }

    /// Current state
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// First frame of the exchange
    pub fn start(&self) -> Command {
        commands::authenticate_ev2_first(self.key_no)
    }

    /// Consume the encrypted card nonce and produce the host answer
    ///
    /// A fresh RndA is drawn from `rng` for every attempt.
    pub fn process_challenge<R>(&mut self, response: &Response, rng: &mut R) -> Result<Command>
    where
        R: RngCore + ?Sized,
    {
        let result = self.challenge(response, rng);
        self.track(result, AuthState::NonceExchanged)
    }

    /// Consume the card confirmation and derive the session
    pub fn process_confirmation(&mut self, response: &Response) -> Result<SessionContext> {
        let result = self.confirmation(response);
        self.track(result, AuthState::KeysEstablished)
    }

    /// Run the whole exchange over `transport`
    pub fn run<T, R>(mut self, transport: &mut T, rng: &mut R) -> Result<SessionContext>
    where
        T: CardTransport + ?Sized,
        R: RngCore + ?Sized,
    {
        debug!(key_no = self.key_no, "Starting EV2 first authentication");

        let challenge = transceive(transport, &self.start(), response_len::DEFAULT)
            .inspect_err(|_| self.state = AuthState::Failed)?;
        let answer = self.process_challenge(&challenge, rng)?;

        let confirmation = transceive(transport, &answer, response_len::DEFAULT)
            .inspect_err(|_| self.state = AuthState::Failed)?;
        let session = self.process_confirmation(&confirmation)?;

        debug!(ti = %hex::encode_upper(session.ti()), "Authenticated");
        Ok(session)
    }

    fn challenge<R>(&mut self, response: &Response, rng: &mut R) -> Result<Command>
    where
        R: RngCore + ?Sized,
    {
        if self.state != AuthState::Idle {
            return Err(Error::AuthenticationRejected("challenge received out of order"));
        }
        if response.status() != status::ADDITIONAL_FRAME {
            warn!(status = %response.status(), "Card refused authentication");
            return Err(Error::AuthenticationRejected("card refused the key number"));
        }
        if response.payload().len() != BLOCK_SIZE {
            return Err(Error::AuthenticationRejected("challenge is not 16 bytes"));
        }

        let rnd_b = decrypt_raw(&self.key, response.payload(), &ZERO_IV)?;
        self.rnd_b.copy_from_slice(&rnd_b);
        rng.fill_bytes(&mut self.rnd_a);

        let mut plaintext = Vec::with_capacity(CONFIRMATION_LEN);
        plaintext.extend_from_slice(&self.rnd_a);
        plaintext.extend_from_slice(&rotate_left(&self.rnd_b));
        let encrypted = encrypt(&self.key, &plaintext, &ZERO_IV)?;
        plaintext.zeroize();

        Ok(commands::additional_frame(encrypted))
    }

    fn confirmation(&mut self, response: &Response) -> Result<SessionContext> {
        if self.state != AuthState::NonceExchanged {
            return Err(Error::AuthenticationRejected("confirmation received out of order"));
        }
        if response.status() != status::OPERATION_OK {
            warn!(status = %response.status(), "Card rejected the host answer");
            return Err(Error::AuthenticationRejected("card could not verify RndB"));
        }
        if response.payload().len() != CONFIRMATION_LEN {
            return Err(Error::AuthenticationRejected("confirmation is not 32 bytes"));
        }

        // TI(4) || RndA'(16) || PDcap2(6) || PCDcap2(6)
        let decrypted = decrypt_raw(&self.key, response.payload(), &ZERO_IV)?;
        let mut ti: TransactionId = [0u8; 4];
        ti.copy_from_slice(&decrypted[0..4]);

        if rotate_right(&decrypted[4..20]) != self.rnd_a {
            warn!("Card returned a wrong RndA");
            return Err(Error::AuthenticationRejected("card could not prove the key"));
        }

        let (enc_key, mac_key) = derive_session_keys(&self.key, &self.rnd_a, &self.rnd_b);
        Ok(SessionContext::new(ti, enc_key, mac_key))
    }

    fn track<V>(&mut self, result: Result<V>, next: AuthState) -> Result<V> {
        self.state = if result.is_ok() { next } else { AuthState::Failed };
        result
    }
}

impl Drop for Authenticator {
    fn drop(&mut self) {
        self.key.zeroize();
        self.rnd_a.zeroize();
        self.rnd_b.zeroize();
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("key_no", &self.key_no)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

//! Secure messaging in FULL communication mode.
//!
//! Command data is encrypted under the session ENC key with an IV derived
//! from the transaction identifier and the command counter, then MACed
//! together with the instruction and the command header:
//!
//! ```text
//! IVc  = E(SesENC, 0, A5 5A || TI || CmdCtr || 00 * 8)
//! MACc = MACt(SesMAC, INS || CmdCtr || TI || header || E(SesENC, IVc, data))
//! ```
//!
//! The response MAC is computed over `00 || CmdCtr + 1 || TI`.

use bytes::{BufMut, Bytes, BytesMut};
use ntag424_apdu_core::{CardTransport, Command, StatusWord};
use tracing::{trace, warn};

use crate::constants::{cla, response_len, status};
use crate::crypto::{Block, TruncatedMac, ZERO_IV, encrypt, mac_truncated};
use crate::error::{Error, Result};
use crate::session::SessionContext;

const IV_LABEL: [u8; 2] = [0xA5, 0x5A];
const RESPONSE_MAC_LEN: usize = 8;
const RESPONSE_CODE_OK: u8 = 0x00;

/// A command protected for FULL communication mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureEnvelope {
    /// Plain command header
    pub header: Bytes,
    /// Command data encrypted under the session ENC key
    pub encrypted_payload: Bytes,
    /// MAC over instruction, counter, TI, header and encrypted data
    pub truncated_mac: TruncatedMac,
}

impl SecureEnvelope {
    /// Protect `data` for the current counter of `ctx`
    ///
    /// The counter is not advanced; that only happens once the command has
    /// been transmitted.
    pub fn seal(ctx: &SessionContext, ins: u8, header: &[u8], data: &[u8]) -> Result<Self> {
        ctx.ensure_valid()?;
        let counter = ctx.counter().to_le_bytes();

        let iv = command_iv(ctx)?;
        let encrypted_payload = encrypt(ctx.enc_key(), data, &iv)?;

        let mut mac_input = BytesMut::with_capacity(7 + header.len() + encrypted_payload.len());
        mac_input.put_u8(ins);
        mac_input.put_slice(&counter);
        mac_input.put_slice(ctx.ti());
        mac_input.put_slice(header);
        mac_input.put_slice(&encrypted_payload);
        let truncated_mac = mac_truncated(ctx.mac_key(), &mac_input);

        Ok(Self {
            header: Bytes::copy_from_slice(header),
            encrypted_payload,
            truncated_mac,
        })
    }

    /// Frame as `90 INS 00 00 Lc header || data || mac 00`
    pub fn to_command(&self, ins: u8) -> Command {
        let mut data = BytesMut::with_capacity(
            self.header.len() + self.encrypted_payload.len() + self.truncated_mac.len(),
        );
        data.put_slice(&self.header);
        data.put_slice(&self.encrypted_payload);
        data.put_slice(&self.truncated_mac);
        Command::new_with_data_and_le(cla::NATIVE, ins, 0x00, 0x00, data.freeze(), 0x00)
    }
}

/// Send a command in FULL mode and verify the response
///
/// The command counter is advanced once the frame has been handed to the
/// transport, whether or not the exchange succeeds. A transport failure or a
/// response that cannot be MAC-checked invalidates the session.
pub fn wrap_and_send<T>(
    ctx: &mut SessionContext,
    transport: &mut T,
    ins: u8,
    header: &[u8],
    data: &[u8],
) -> Result<()>
where
    T: CardTransport + ?Sized,
{
    let command = SecureEnvelope::seal(ctx, ins, header, data)?.to_command(ins);
    command.validate()?;

    trace!(
        ins = format_args!("{ins:#04x}"),
        counter = ctx.counter(),
        "Sending secured command"
    );
    let sent = transport.transmit_raw(&command.to_bytes(), response_len::DEFAULT);
    ctx.advance()?;

    let raw = match sent {
        Ok(raw) => raw,
        Err(e) => {
            ctx.invalidate();
            return Err(e.into());
        }
    };

    verify_response(ctx, &raw)
}

/// Check a response to a secured command against the current counter
pub fn verify_response(ctx: &mut SessionContext, raw: &[u8]) -> Result<()> {
    match raw.len() {
        2 => expect_ok(StatusWord::new(raw[0], raw[1])),
        10 => {
            let (rmac, sw) = raw.split_at(RESPONSE_MAC_LEN);
            if rmac != response_mac(ctx) {
                warn!(counter = ctx.counter(), "Response MAC mismatch");
                ctx.invalidate();
                return Err(Error::ResponseIntegrityFailure);
            }
            expect_ok(StatusWord::new(sw[0], sw[1]))
        }
        len => {
            warn!(len, "Unsupported response shape");
            ctx.invalidate();
            Err(Error::UnsupportedResponseShape { len })
        }
    }
}

/// Expected MAC of a response without data for the current counter
pub fn response_mac(ctx: &SessionContext) -> TruncatedMac {
    let mut input = BytesMut::with_capacity(7);
    input.put_u8(RESPONSE_CODE_OK);
    input.put_slice(&ctx.counter().to_le_bytes());
    input.put_slice(ctx.ti());
    mac_truncated(ctx.mac_key(), &input)
}

fn command_iv(ctx: &SessionContext) -> Result<Block> {
    let mut input = [0u8; 16];
    input[0..2].copy_from_slice(&IV_LABEL);
    input[2..6].copy_from_slice(ctx.ti());
    input[6..8].copy_from_slice(&ctx.counter().to_le_bytes());

    let encrypted = encrypt(ctx.enc_key(), &input, &ZERO_IV)?;
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&encrypted);
    Ok(iv)
}

fn expect_ok(sw: StatusWord) -> Result<()> {
    if sw == status::OPERATION_OK {
        Ok(())
    } else {
        Err(Error::rejected(sw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{cmac, decrypt, truncate_mac};
    use crate::test_utils::ScriptedTransport;
    use hex_literal::hex;
    use ntag424_apdu_core::TransportError;

    fn context() -> SessionContext {
        SessionContext::new(
            hex!("9D00C4DF"),
            hex!("7A93D6571E4B180FCA6AC90C9A7488D4"),
            hex!("FC4AF159B62E549B5812394CAB1918CC"),
        )
    }

    fn mac_for(ctx: &SessionContext, counter: u16) -> Vec<u8> {
        let mut input = vec![0x00];
        input.extend_from_slice(&counter.to_le_bytes());
        input.extend_from_slice(ctx.ti());
        truncate_mac(&cmac(ctx.mac_key(), &input)).to_vec()
    }

    fn ok_with_mac(mac: &[u8]) -> Bytes {
        let mut raw = mac.to_vec();
        raw.extend_from_slice(&[0x91, 0x00]);
        Bytes::from(raw)
    }

    #[test]
    fn test_envelope_layout() {
        let ctx = context();
        let data = hex!("4000E0C1FFE0");
        let envelope = SecureEnvelope::seal(&ctx, 0x5F, &[0x02], &data).unwrap();
        assert_eq!(envelope.encrypted_payload.len(), 16);

        let iv = command_iv(&ctx).unwrap();
        assert_eq!(
            decrypt(ctx.enc_key(), &envelope.encrypted_payload, &iv).unwrap().as_ref(),
            data
        );

        let mut mac_input = vec![0x5F, 0x00, 0x00];
        mac_input.extend_from_slice(ctx.ti());
        mac_input.push(0x02);
        mac_input.extend_from_slice(&envelope.encrypted_payload);
        assert_eq!(envelope.truncated_mac, truncate_mac(&cmac(ctx.mac_key(), &mac_input)));

        let frame = envelope.to_command(0x5F).to_bytes();
        assert_eq!(&frame[..6], hex!("905F00001902"));
        assert_eq!(frame.len(), 5 + 1 + 16 + 8 + 1);
        assert_eq!(frame[frame.len() - 1], 0x00);
    }

    #[test]
    fn test_counter_advances_per_command() {
        let mut ctx = context();
        let mut transport = ScriptedTransport::default();
        transport.push_ok(ok_with_mac(&mac_for(&ctx, 1)));
        transport.push_ok(Bytes::from_static(&[0x91, 0x00]));

        wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x40, 0x00, 0xE0]).unwrap();
        assert_eq!(ctx.counter(), 1);
        wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x40, 0x00, 0xE0]).unwrap();
        assert_eq!(ctx.counter(), 2);

        // Same plaintext under a different counter gives a different frame
        assert_ne!(transport.sent[0], transport.sent[1]);
    }

    #[test]
    fn test_response_mac_off_by_one_is_rejected() {
        for counter in [0u16, 2] {
            let mut ctx = context();
            let mut transport = ScriptedTransport::default();
            transport.push_ok(ok_with_mac(&mac_for(&ctx, counter)));

            assert!(matches!(
                wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]),
                Err(Error::ResponseIntegrityFailure)
            ));
            assert!(ctx.is_invalidated());
            assert!(matches!(
                wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]),
                Err(Error::SessionInvalidated)
            ));
            assert_eq!(transport.sent.len(), 1);
        }
    }

    #[test]
    fn test_status_only_response() {
        let mut ctx = context();
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from_static(&[0x91, 0x9D]));

        let err = wrap_and_send(&mut ctx, &mut transport, 0xC4, &[0x01], &[0u8; 21]).unwrap_err();
        assert!(
            matches!(err, Error::CommandRejected { status } if status == StatusWord::new(0x91, 0x9D))
        );
        assert_eq!(ctx.counter(), 1);
    }

    #[test]
    fn test_unsupported_response_shape() {
        let mut ctx = context();
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from_static(&[0x00, 0x00, 0x91, 0x00]));

        assert!(matches!(
            wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]),
            Err(Error::UnsupportedResponseShape { len: 4 })
        ));
    }

    #[test]
    fn test_unsupported_response_shape_invalidates_session() {
        let mut ctx = context();
        let mut transport = ScriptedTransport::default();
        transport.push_ok(Bytes::from(vec![0u8; 20]));
        transport.push_ok(Bytes::from_static(&[0x91, 0x00]));

        assert!(matches!(
            wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]),
            Err(Error::UnsupportedResponseShape { len: 20 })
        ));
        assert!(ctx.is_invalidated());
        assert!(matches!(
            wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]),
            Err(Error::SessionInvalidated)
        ));
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_transport_error_invalidates_and_counts() {
        let mut ctx = context();
        let mut transport = ScriptedTransport::default();
        transport.push_err(TransportError::Transmission);

        let err = wrap_and_send(&mut ctx, &mut transport, 0x5F, &[0x02], &[0x00]).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(ctx.counter(), 1);
        assert!(ctx.is_invalidated());
    }
}

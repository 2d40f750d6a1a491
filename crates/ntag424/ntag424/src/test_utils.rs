//! Transport doubles for unit tests

use std::collections::VecDeque;

use bytes::Bytes;
use ntag424_apdu_core::{CardTransport, TransportError};

/// Transport answering with queued responses and recording every frame
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    pub(crate) responses: VecDeque<Result<Bytes, TransportError>>,
    pub(crate) sent: Vec<Bytes>,
}

impl ScriptedTransport {
    pub(crate) fn push_ok(&mut self, response: impl Into<Bytes>) {
        self.responses.push_back(Ok(response.into()));
    }

    pub(crate) fn push_err(&mut self, error: TransportError) {
        self.responses.push_back(Err(error));
    }
}

impl CardTransport for ScriptedTransport {
    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        _max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        self.sent.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Transmission))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

//! Reader session backed by a PC/SC device manager

use ntag424_apdu_core::prelude::*;
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::manager::PcscDeviceManager;
use crate::transport::PcscTransport;

/// Reader session resolving the active reader on every call
///
/// With a configured reader name only that reader is considered; otherwise
/// the first reader holding a card is used.
#[allow(missing_debug_implementations)]
pub struct PcscReaderSession {
    manager: PcscDeviceManager,
    strategy: ConnectStrategy,
    config: PcscConfig,
}

impl PcscReaderSession {
    /// Create a session for the given manager and optional reader name
    pub fn new(manager: PcscDeviceManager, reader_name: Option<&str>) -> Self {
        Self {
            manager,
            strategy: ConnectStrategy::from_reader_name(reader_name),
            config: PcscConfig::default(),
        }
    }

    /// Use a custom transport configuration
    pub fn with_config(mut self, config: PcscConfig) -> Self {
        self.config = config;
        self
    }

    /// How the active reader is chosen
    pub const fn strategy(&self) -> &ConnectStrategy {
        &self.strategy
    }

    /// Access the underlying device manager
    pub const fn manager(&self) -> &PcscDeviceManager {
        &self.manager
    }
}

impl ReaderSession for PcscReaderSession {
    type Transport = PcscTransport;

    fn current_reader(&self) -> Option<String> {
        match self.manager.resolve_reader(&self.strategy) {
            Ok(reader) => Some(reader.name().to_string()),
            Err(e) => {
                debug!(error = %e, "No active reader");
                None
            }
        }
    }

    fn current_card(&self) -> Result<Option<PresentedCard>, TransportError> {
        let reader = match self.manager.resolve_reader(&self.strategy) {
            Ok(reader) => reader,
            Err(crate::PcscError::NoCard(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(reader.presented_card())
    }

    fn connect(&self) -> Result<Self::Transport, TransportError> {
        let transport = self
            .manager
            .connect_strategy(&self.strategy, self.config)?;
        if !transport.is_connected() {
            return Err(TransportError::NoCard);
        }
        Ok(transport)
    }
}

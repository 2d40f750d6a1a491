//! Connection settings for PC/SC readers

use pcsc::{Protocols, ShareMode};

/// How the active reader is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Only the reader with this exact name
    Reader(String),
    /// The first reader holding a card
    AnyCard,
}

impl ConnectStrategy {
    /// Use the named reader when given, otherwise any reader holding a card
    pub fn from_reader_name(name: Option<&str>) -> Self {
        name.map_or(Self::AnyCard, |name| Self::Reader(name.to_string()))
    }
}

/// Settings applied when connecting to a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcscConfig {
    /// Hold the tag exclusively while connected
    pub exclusive: bool,
    /// Reconnect once and retry when the reader reports a reset
    pub auto_reconnect: bool,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            exclusive: false,
            auto_reconnect: true,
        }
    }
}

impl PcscConfig {
    /// Take exclusive access to the tag
    pub const fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Set whether to reconnect after a reset
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub(crate) const fn share_mode(&self) -> ShareMode {
        if self.exclusive {
            ShareMode::Exclusive
        } else {
            ShareMode::Shared
        }
    }

    // Contactless readers emulate T=1, but some drivers report T=0 for tags.
    pub(crate) const fn protocols(&self) -> Protocols {
        Protocols::ANY
    }
}

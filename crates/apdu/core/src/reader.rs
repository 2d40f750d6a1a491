//! Reader session abstraction
//!
//! A reader session knows which reader is active and whether a card is
//! currently presented to it, and can open a transport to that card.

use bytes::Bytes;

use crate::transport::{CardTransport, TransportError};

/// A card currently presented to a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCard {
    /// Name of the reader holding the card
    pub reader: String,
    /// Answer To Reset of the card, when the reader reports one
    pub atr: Option<Bytes>,
}

/// Source of the active reader and the card presented to it
pub trait ReaderSession {
    /// Transport produced when connecting to the presented card
    type Transport: CardTransport;

    /// Name of the active reader, if one is available
    fn current_reader(&self) -> Option<String>;

    /// The card currently presented to the active reader
    fn current_card(&self) -> Result<Option<PresentedCard>, TransportError>;

    /// Open a transport to the presented card
    fn connect(&self) -> Result<Self::Transport, TransportError>;

    /// Check whether a card is presented
    fn has_card(&self) -> bool {
        matches!(self.current_card(), Ok(Some(_)))
    }
}

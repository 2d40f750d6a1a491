//! Snapshot of a PC/SC reader

use bytes::Bytes;
use ntag424_apdu_core::PresentedCard;
use pcsc::{ReaderState, State};

/// A reader as seen when the reader list was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscReader {
    name: String,
    /// ATR of the presented card, `None` when the field is empty
    card: Option<Bytes>,
}

impl PcscReader {
    pub(crate) const fn empty(name: String) -> Self {
        Self { name, card: None }
    }

    pub(crate) fn from_reader_state(state: &ReaderState) -> Self {
        let flags = state.event_state();
        let present = flags.contains(State::PRESENT) && !flags.contains(State::EMPTY);
        Self {
            name: state.name().to_string_lossy().into_owned(),
            card: present.then(|| Bytes::copy_from_slice(state.atr())),
        }
    }

    /// Reader name as reported by PC/SC
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a card was in the field
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// ATR of the presented card
    pub fn atr(&self) -> Option<&[u8]> {
        self.card.as_deref()
    }

    /// The presented card, if any
    pub fn presented_card(&self) -> Option<PresentedCard> {
        self.card.as_ref().map(|atr| PresentedCard {
            reader: self.name.clone(),
            atr: (!atr.is_empty()).then(|| atr.clone()),
        })
    }
}

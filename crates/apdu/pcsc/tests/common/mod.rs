//! Hardware helpers: every accessor returns `None` when PC/SC or a card is missing

#![allow(dead_code, unreachable_pub)]

use ntag424_apdu_transport_pcsc::{PcscDeviceManager, PcscReader, PcscTransport};

/// Device manager, if the PC/SC service is reachable
pub fn get_manager() -> Option<PcscDeviceManager> {
    match PcscDeviceManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            println!("Skipping test, PC/SC not available: {e}");
            None
        }
    }
}

/// First reader holding a card
pub fn get_reader_with_card(manager: &PcscDeviceManager) -> Option<PcscReader> {
    let reader = manager
        .list_readers()
        .ok()?
        .into_iter()
        .find(PcscReader::has_card);
    if reader.is_none() {
        println!("Skipping test, no card presented");
    }
    reader
}

/// Transport to the first presented card
pub fn get_test_transport() -> Option<PcscTransport> {
    let manager = get_manager()?;
    let reader = get_reader_with_card(&manager)?;
    manager.open_reader(reader.name()).ok()
}

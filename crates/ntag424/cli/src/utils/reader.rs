use colored::Colorize;
use ntag424_apdu_transport_pcsc::{PcscDeviceManager, PcscError};

use super::display::Section;

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> eyre::Result<()> {
    let readers = match manager.list_readers() {
        Ok(readers) => readers,
        Err(PcscError::NoReadersAvailable) => {
            println!("{}", "No readers found".yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_card() {
            "card present".green()
        } else {
            "no card".dimmed()
        };
        let mut section =
            Section::new(format!("{}. {}", i + 1, reader.name())).field("Status", status);
        if let Some(atr) = reader.atr() {
            section = section.field("ATR", hex::encode_upper(atr));
        }
        println!("{section}");
    }

    Ok(())
}

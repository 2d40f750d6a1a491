//! Subcommand handlers

use std::process::ExitCode;

use colored::Colorize;
use ntag424::{FileSettings, Ntag424, ndef, personalize_presented};
use ntag424_apdu_core::prelude::*;
use ntag424_apdu_transport_pcsc::{PcscDeviceManager, PcscError, PcscReaderSession};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::utils::display::{Section, outcome};
use crate::utils::reader;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    is_reader_ready: bool,
    reader: Option<String>,
    last_error: Option<String>,
    master_key_configured: bool,
    reader_configured: bool,
}

#[derive(Serialize)]
struct UidReport {
    uid: String,
}

#[derive(Serialize)]
struct SettingsReport {
    raw: String,
    parsed: FileSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonalizeReport {
    success: bool,
    uid: Option<String>,
    is_factory: bool,
    message: String,
}

impl PersonalizeReport {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            uid: None,
            is_factory: false,
            message,
        }
    }
}

/// List available readers
pub fn list_command(manager: &PcscDeviceManager) -> eyre::Result<()> {
    reader::list_readers(manager)
}

/// Report whether a reader is usable and what is configured
pub fn status_command(
    manager: Result<PcscDeviceManager, PcscError>,
    config: &Config,
) -> eyre::Result<()> {
    let (reader, last_error) = match manager {
        Ok(manager) => {
            let session = PcscReaderSession::new(manager, config.reader.as_deref());
            match session.manager().resolve_reader(session.strategy()) {
                Ok(reader) => (Some(reader.name().to_string()), None),
                Err(e) => (None, Some(e.to_string())),
            }
        }
        Err(e) => (None, Some(e.to_string())),
    };

    print_json(&StatusReport {
        is_reader_ready: reader.is_some(),
        reader,
        last_error,
        master_key_configured: config.master_key_configured(),
        reader_configured: config.reader.is_some(),
    })
}

/// Print the UID of the presented tag
pub fn uid_command(session: &PcscReaderSession) -> eyre::Result<()> {
    let mut tag = connect(session)?;
    let uid = tag.get_uid()?;
    print_json(&UidReport { uid: uid.to_hex() })
}

/// Print the raw and decoded NDEF file settings
pub fn settings_command(session: &PcscReaderSession) -> eyre::Result<()> {
    let mut tag = connect(session)?;
    tag.select_ndef_application()?;
    let raw = tag.get_file_settings()?;
    let parsed = FileSettings::parse(&raw)?;
    print_json(&SettingsReport {
        raw: hex::encode_upper(&raw),
        parsed,
    })
}

/// Print the URI stored in the NDEF file
pub fn ndef_command(session: &PcscReaderSession) -> eyre::Result<()> {
    let mut tag = connect(session)?;
    let uid = tag.get_uid()?;
    tag.select_ndef_application()?;
    let file = tag.read_ndef()?;
    let record = ndef::decode_file(&file)?;

    let uri = record
        .uri()
        .unwrap_or_else(|| String::from_utf8_lossy(&record.payload).into_owned());
    let section = Section::new("NDEF message")
        .field("UID", uid)
        .field("Length", format!("{} bytes", file.len()))
        .field("URI", uri.cyan());
    println!("{section}");
    Ok(())
}

/// Personalize the presented tag and print the outcome
pub fn personalize_command(
    session: &PcscReaderSession,
    config: &Config,
    template: &str,
) -> eyre::Result<ExitCode> {
    // Refuse before touching the tag, the locked settings need real keys
    let master = match config.master_key() {
        Ok(master) => master,
        Err(e) => {
            warn!("Refusing to personalize: {e}");
            eprintln!("{}", outcome(false, &e.to_string()));
            print_json(&PersonalizeReport::failure(e.to_string()))?;
            return Ok(ExitCode::FAILURE);
        }
    };
    if master.is_zero() {
        warn!("Master key is all zero, the tag keeps the factory keys");
    }
    info!(template, "Personalizing tag");

    let (report, code) = match personalize_presented(session, &master, template, &mut rand::rng())
    {
        Ok(report) => {
            eprintln!("{}", outcome(true, &report.message));
            (
                PersonalizeReport {
                    success: true,
                    uid: Some(report.uid.to_hex()),
                    is_factory: report.is_factory,
                    message: report.message,
                },
                ExitCode::SUCCESS,
            )
        }
        Err(e) => {
            eprintln!("{}", outcome(false, &e.to_string()));
            (PersonalizeReport::failure(e.to_string()), ExitCode::FAILURE)
        }
    };

    print_json(&report)?;
    Ok(code)
}

fn connect(session: &PcscReaderSession) -> eyre::Result<Ntag424<impl CardTransport>> {
    if !session.has_card() {
        return Err(TransportError::NoCard.into());
    }
    if let Some(reader) = session.current_reader() {
        info!("Using reader: {}", reader);
    }
    Ok(Ntag424::new(session.connect()?))
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Personalization of a presented tag.
//!
//! A single pass that writes the NDEF URL template, replaces the factory keys
//! with keys diversified from the master key and locks the file settings so
//! the tag mirrors its UID, read counter and SDM MAC into the URL. The first
//! error aborts the run. A tag whose keys were rotated while its settings are
//! still factory cannot be finished by running again and needs manual
//! recovery.

use ntag424_apdu_core::{CardTransport, ReaderSession, TransportError};
use rand::RngCore;
use tracing::{error, info, warn};

use crate::application::{CommMode, Ntag424};
use crate::constants::EXAMPLE_FILE_SETTINGS;
use crate::file_settings::{
    self, ACCESS_FREE, ACCESS_NEVER, FileSettings, LOCKED_ACCESS_RIGHTS, LOCKED_SDM_ACCESS_RIGHTS,
};
use crate::keys::{KeyIndex, KeyReference, KeyTable, MasterKey, Uid};
use crate::ndef;
use crate::{Error, Result};

const FACTORY_KEY: [u8; 16] = [0u8; 16];

/// Outcome of a personalization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalizationReport {
    /// UID of the tag
    pub uid: Uid,
    /// Whether the tag still had its factory settings
    pub is_factory: bool,
    /// Whether the NDEF file was written
    pub ndef_written: bool,
    /// Whether the file settings were changed
    pub settings_changed: bool,
    /// Human readable summary
    pub message: String,
}

/// Personalize the tag behind `tag` for the URL `template`
pub fn personalize<T, R>(
    tag: &mut Ntag424<T>,
    master: &MasterKey,
    template: &str,
    rng: &mut R,
) -> Result<PersonalizationReport>
where
    T: CardTransport,
    R: RngCore + ?Sized,
{
    let uid = tag
        .get_uid()
        .inspect_err(|e| error!(step = "get uid", %e, "Error personalizing tag"))?;
    info!(%uid, "Personalizing tag");

    let mut step = "read file settings";
    run(tag, master, &uid, template, rng, &mut step)
        .inspect_err(|e| error!(%uid, step, %e, "Error personalizing tag"))
}

fn run<T, R>(
    tag: &mut Ntag424<T>,
    master: &MasterKey,
    uid: &Uid,
    template: &str,
    rng: &mut R,
    step: &mut &'static str,
) -> Result<PersonalizationReport>
where
    T: CardTransport,
    R: RngCore + ?Sized,
{
    let keys = KeyTable::derive(master, uid);

    tag.select_ndef_application()?;
    let raw_settings = tag.get_file_settings()?;
    let settings = FileSettings::parse(&raw_settings)?;

    *step = "layout template";
    let layout = ndef::layout(template)?;
    if layout.file.len() > settings.file_size as usize {
        return Err(Error::InvalidTemplate(format!(
            "NDEF message of {} bytes exceeds the {} byte file",
            layout.file.len(),
            settings.file_size
        )));
    }

    *step = "write ndef";
    let write_free = settings.access_rights.write == ACCESS_FREE;
    let mut ndef_written = false;
    if write_free {
        tag.write_ndef(&layout.file)?;
        ndef_written = true;
    }

    let current = tag.read_ndef()?;
    if ndef::normalize(&current, &settings.offsets()) != layout.file {
        if write_free {
            tag.write_ndef(&layout.file)?;
            ndef_written = true;
        } else {
            warn!(
                write_key = settings.access_rights.write,
                "NDEF differs but the file is not freely writable, leaving it as is"
            );
        }
    }

    *step = "change file settings";
    let target = file_settings::generate(
        &layout.offsets,
        LOCKED_ACCESS_RIGHTS,
        LOCKED_SDM_ACCESS_RIGHTS,
    )?;

    let is_factory = file_settings::is_factory(&raw_settings);
    let settings_changed = if is_factory {
        provision_factory_tag(tag, &keys, &target, rng)?;
        true
    } else if !file_settings::matches_target(&raw_settings, &target) {
        apply_target(tag, &keys, &settings, &target, rng)?;
        true
    } else {
        false
    };

    let message = match (is_factory, settings_changed, ndef_written) {
        (true, _, _) => "Factory tag personalized",
        (false, true, _) => "File settings updated",
        (false, false, true) => "NDEF message updated",
        (false, false, false) => "Tag already personalized",
    }
    .to_string();
    info!(%uid, is_factory, ndef_written, settings_changed, "{message}");

    Ok(PersonalizationReport {
        uid: uid.clone(),
        is_factory,
        ndef_written,
        settings_changed,
        message,
    })
}

/// Personalize the card currently presented to `reader`
pub fn personalize_presented<S, R>(
    reader: &S,
    master: &MasterKey,
    template: &str,
    rng: &mut R,
) -> Result<PersonalizationReport>
where
    S: ReaderSession,
    R: RngCore + ?Sized,
{
    if !reader.has_card() {
        return Err(TransportError::NoCard.into());
    }
    let mut tag = Ntag424::new(reader.connect()?);
    personalize(&mut tag, master, template, rng)
}

// Replace the factory keys, then move the settings from factory to target.
fn provision_factory_tag<T, R>(
    tag: &mut Ntag424<T>,
    keys: &KeyTable,
    target: &[u8],
    rng: &mut R,
) -> Result<()>
where
    T: CardTransport,
    R: RngCore + ?Sized,
{
    tag.authenticate(KeyReference::Factory, keys, rng)?;
    tag.change_key(KeyIndex::MASTER, keys.get(KeyIndex::MASTER), &FACTORY_KEY)?;

    tag.authenticate(KeyReference::Indexed(KeyIndex::MASTER), keys, rng)?;
    for index in KeyIndex::all().filter(|index| !index.is_master()) {
        tag.change_key(index, keys.get(index), &FACTORY_KEY)?;
    }

    tag.set_file_settings(EXAMPLE_FILE_SETTINGS, CommMode::Full)?;
    tag.clear_session();
    tag.set_file_settings(target, CommMode::Plain)?;
    Ok(())
}

fn apply_target<T, R>(
    tag: &mut Ntag424<T>,
    keys: &KeyTable,
    settings: &FileSettings,
    target: &[u8],
    rng: &mut R,
) -> Result<()>
where
    T: CardTransport,
    R: RngCore + ?Sized,
{
    match settings.access_rights.change {
        ACCESS_FREE => tag.set_file_settings(target, CommMode::Plain),
        ACCESS_NEVER => Err(Error::SettingsChangeRejected(
            "file settings can never be changed".to_string(),
        )),
        key => {
            let index = KeyIndex::new(key)?;
            tag.authenticate(KeyReference::Indexed(index), keys, rng)?;
            tag.set_file_settings(target, CommMode::Full)
        }
    }
}

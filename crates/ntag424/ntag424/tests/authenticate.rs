//! Authentication and secure messaging against a simulated tag

mod common;

use common::{FixedRng, SimulatedTag, TI};
use hex_literal::hex;
use ntag424::constants::EXAMPLE_FILE_SETTINGS;
use ntag424::crypto::AesKey;
use ntag424::{CommMode, Error, KeyIndex, KeyReference, KeyTable, Ntag424};

const RND_A: [u8; 16] = hex!("B98F4C50CF1C2E084FD150E33992B048");

fn factory_keys() -> KeyTable {
    KeyTable::from_keys([[0u8; 16]; 5])
}

#[test]
fn test_session_keys_match_known_answer() {
    common::init_tracing();

    let mut tag = Ntag424::new(SimulatedTag::factory());
    tag.authenticate(KeyReference::Factory, &factory_keys(), &mut FixedRng::new(&RND_A))
        .unwrap();

    let session = tag.session().unwrap();
    assert_eq!(session.ti(), &TI);
    assert_eq!(session.enc_key(), &hex!("7A93D6571E4B180FCA6AC90C9A7488D4"));
    assert_eq!(session.mac_key(), &hex!("FC4AF159B62E549B5812394CAB1918CC"));
    assert_eq!(session.counter(), 0);
}

#[test]
fn test_authenticate_exchange_frames() {
    let mut tag = Ntag424::new(SimulatedTag::factory());
    tag.authenticate(KeyReference::Factory, &factory_keys(), &mut FixedRng::new(&RND_A))
        .unwrap();

    let sent = &tag.transport().received;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].as_ref(), &hex!("9071000002000000"));
    assert_eq!(&sent[1][..5], &hex!("90AF000020"));
    assert_eq!(sent[1].len(), 5 + 32 + 1);
}

#[test]
fn test_wrong_key_is_rejected() {
    let mut sim = SimulatedTag::factory();
    sim.keys[0] = [0x42; 16];
    let mut tag = Ntag424::new(sim);

    let result = tag.authenticate(KeyReference::Factory, &factory_keys(), &mut rand::rng());
    assert!(matches!(result, Err(Error::AuthenticationRejected(_))));
    assert!(tag.session().is_none());
}

#[test]
fn test_counter_tracks_tag() {
    let mut tag = Ntag424::new(SimulatedTag::factory());
    let keys = factory_keys();
    tag.authenticate(KeyReference::Factory, &keys, &mut rand::rng()).unwrap();

    let new_key: AesKey = [0x11; 16];
    tag.change_key(KeyIndex::new(1).unwrap(), &new_key, &[0u8; 16]).unwrap();
    tag.change_key(KeyIndex::new(2).unwrap(), &new_key, &[0u8; 16]).unwrap();

    assert_eq!(tag.session().unwrap().counter(), 2);
    assert_eq!(tag.transport().session_counter(), Some(2));
    assert_eq!(tag.transport().keys[1], new_key);
    assert_eq!(tag.transport().keys[2], new_key);
}

#[test]
fn test_changing_master_key_ends_session() {
    let mut tag = Ntag424::new(SimulatedTag::factory());
    tag.authenticate(KeyReference::Factory, &factory_keys(), &mut rand::rng()).unwrap();

    let new_master: AesKey = [0x5A; 16];
    tag.change_key(KeyIndex::MASTER, &new_master, &[0u8; 16]).unwrap();

    assert!(tag.session().is_none());
    assert_eq!(tag.transport().keys[0], new_master);
    assert!(matches!(
        tag.set_file_settings(EXAMPLE_FILE_SETTINGS, CommMode::Full),
        Err(Error::NoSession)
    ));

    let keys = KeyTable::from_keys([new_master, [0; 16], [0; 16], [0; 16], [0; 16]]);
    tag.authenticate(KeyReference::Indexed(KeyIndex::MASTER), &keys, &mut rand::rng())
        .unwrap();
    assert!(tag.session().is_some());
}

#[test]
fn test_tampered_response_mac_invalidates_session() {
    let mut tag = Ntag424::new(SimulatedTag::factory());
    tag.authenticate(KeyReference::Factory, &factory_keys(), &mut rand::rng()).unwrap();
    tag.select_ndef_application().unwrap();

    tag.transport_mut().corrupt_next_mac = true;

    let result = tag.set_file_settings(EXAMPLE_FILE_SETTINGS, CommMode::Full);
    assert!(matches!(result, Err(Error::ResponseIntegrityFailure)));

    let session = tag.session().unwrap();
    assert!(session.is_invalidated());
    assert_eq!(session.counter(), 1);

    let result = tag.set_file_settings(EXAMPLE_FILE_SETTINGS, CommMode::Full);
    assert!(matches!(result, Err(Error::SessionInvalidated)));
}

#[test]
fn test_full_settings_change_applies() {
    let mut tag = Ntag424::new(SimulatedTag::factory());
    tag.authenticate(KeyReference::Factory, &factory_keys(), &mut rand::rng()).unwrap();
    tag.select_ndef_application().unwrap();

    tag.set_file_settings(EXAMPLE_FILE_SETTINGS, CommMode::Full).unwrap();

    let settings = tag.transport().parsed_settings();
    assert!(settings.sdm_enabled());
    assert_eq!(settings.offsets().mac, Some(0x43));
    assert_eq!(tag.session().unwrap().counter(), 1);
}

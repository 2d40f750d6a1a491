//! PC/SC transport against whatever reader is attached
//!
//! Tests skip themselves when no reader or card is available.

mod common;

use ntag424_apdu_core::prelude::*;
use ntag424_apdu_transport_pcsc::{ConnectStrategy, PcscReaderSession};

#[test]
fn test_get_uid() {
    let Some(mut transport) = common::get_test_transport() else {
        return;
    };
    assert!(transport.is_connected());

    let response = transport
        .transmit_raw(&[0xFF, 0xCA, 0x00, 0x00, 0x00], 64)
        .unwrap();
    let response = Response::from_bytes(&response).unwrap();
    assert!(response.is_success(), "GET UID failed: {}", response.status());
    assert!(matches!(response.payload().len(), 4 | 7 | 10));
}

#[test]
fn test_reset_keeps_connection() {
    let Some(mut transport) = common::get_test_transport() else {
        return;
    };
    transport.reset().unwrap();
    assert!(transport.is_connected());
}

#[test]
fn test_session_reports_presented_card() {
    let Some(manager) = common::get_manager() else {
        return;
    };
    let Some(reader) = common::get_reader_with_card(&manager) else {
        return;
    };

    let session = PcscReaderSession::new(manager, Some(reader.name()));
    assert_eq!(
        session.strategy(),
        &ConnectStrategy::Reader(reader.name().to_string())
    );
    assert_eq!(session.current_reader().as_deref(), Some(reader.name()));

    let card = session.current_card().unwrap().unwrap();
    assert_eq!(card.reader, reader.name());
    assert!(session.has_card());
    assert!(session.connect().is_ok());
}

#[test]
fn test_unknown_reader_has_no_card() {
    let Some(manager) = common::get_manager() else {
        return;
    };
    let session = PcscReaderSession::new(manager, Some("No Such Reader 00 00"));
    assert!(session.current_reader().is_none());
    assert!(!session.has_card());
    assert!(session.connect().is_err());
}

#[test]
fn test_strategy_from_reader_name() {
    assert_eq!(ConnectStrategy::from_reader_name(None), ConnectStrategy::AnyCard);
    assert_eq!(
        ConnectStrategy::from_reader_name(Some("ACS ACR122U")),
        ConnectStrategy::Reader("ACS ACR122U".to_string())
    );
}

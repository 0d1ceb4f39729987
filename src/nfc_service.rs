// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use pcsc::{Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use nfc_tag_service::classifier::{self, Discovery, ExternalHandler};
use nfc_tag_service::error::{DispatchError, ReadError};
use nfc_tag_service::types::{NfcCommand, OutgoingMessage};

use crate::cards;

/// Hands resolved URIs to the connected clients, which open them.
pub struct ClientUriHandler {
    tx: Sender<OutgoingMessage>,
}

impl ClientUriHandler {
    pub fn new(tx: Sender<OutgoingMessage>) -> Self {
        Self { tx }
    }
}

impl ExternalHandler for ClientUriHandler {
    fn dispatch(&self, uri: &str) -> Result<(), DispatchError> {
        self.tx
            .send(OutgoingMessage::OPEN_URI {
                uri: uri.to_string(),
            })
            .map_err(|e| DispatchError {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
    }
}

pub fn run(tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>, poll_interval: Duration) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let handler = ClientUriHandler::new(tx.clone());
    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(poll_interval, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::CheckReaderStatus => {
                    // Status only; tracked reader states stay untouched
                    let success = ctx
                        .list_readers(&mut readers_buf)
                        .map(|mut iter| iter.next().is_some())
                        .unwrap_or(false);
                    let _ = tx.send(OutgoingMessage::READER_STATUS { success });
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let rs = &reader_states[i];
            if !rs.event_state().intersects(State::CHANGED) {
                continue;
            }
            let name = reader_names[i - 1].clone();
            let current = rs.event_state();

            // Card Inserted
            if current.intersects(State::PRESENT) && !rs.current_state().intersects(State::PRESENT)
            {
                info!("Card Inserted on {:?}", name);
                handle_card_insertion(&ctx, &name, &tx, &handler);
            }

            // Card Removed
            if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT) {
                info!("Card Removed from {:?}", name);
                let _ = tx.send(OutgoingMessage::CARD_STATUS {
                    success: false,
                    message: "Card removed!".into(),
                });
            }

            reader_states[i].sync_current_state();
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &mut reader_states);
            let _ = tx.send(OutgoingMessage::READER_STATUS {
                success: !reader_names.is_empty(),
            });
        }
    }
}

fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    reader_states: &mut Vec<ReaderState>,
) {
    match ctx.list_readers(readers_buf) {
        Ok(iter) => *reader_names = iter.map(CString::from).collect(),
        Err(err) => {
            warn!("Listing readers failed: {}", err);
            reader_names.clear();
        }
    }
    rebuild_reader_states(reader_states, reader_names);
}

// Keeps the PnP entry (index 0) and one state per listed reader. Readers still
// listed keep their state, so a card resting on them is not seen as a new tap.
fn rebuild_reader_states(reader_states: &mut Vec<ReaderState>, reader_names: &[CString]) {
    let mut previous: Vec<ReaderState> = reader_states.drain(1..).collect();
    for name in reader_names {
        let state = match previous.iter().position(|rs| rs.name() == name.as_c_str()) {
            Some(i) => previous.swap_remove(i),
            None => ReaderState::new(name.clone(), State::UNAWARE),
        };
        reader_states.push(state);
    }
}

fn handle_card_insertion(
    ctx: &Context,
    reader_name: &CStr,
    tx: &Sender<OutgoingMessage>,
    handler: &dyn ExternalHandler,
) {
    let _ = tx.send(OutgoingMessage::CARD_STATUS {
        success: true,
        message: "Card detected!".into(),
    });

    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            return;
        }
    };

    let discovery = match cards::read_ndef(&card) {
        Ok(raw) => Discovery::from_ndef_message(raw),
        Err(ReadError::NoNdef) => Discovery::Tag,
        Err(e) => {
            warn!("Reading tag failed: {}", e);
            let _ = tx.send(OutgoingMessage::DATA_READ_ERROR {
                error: e.to_string(),
            });
            Discovery::Tag
        }
    };

    let classification = classifier::classify(&discovery);
    info!("Received {:?}", classification.kind);
    let _ = tx.send(classification.to_message());

    if let Some(uri) = classification.dispatch_uri() {
        if let Err(e) = handler.dispatch(uri) {
            warn!("{}", e);
        }
    }
}

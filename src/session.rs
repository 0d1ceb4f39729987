// src/session.rs
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use crate::error::NdefError;
use crate::ndef;
use crate::types::{NdefRecord, TransmitMode};

pub const CONTACT_MIME_TYPE: &str = "text/vcard";
pub const DEFAULT_LANGUAGE: &str = "en";

// Data starting with one of these is published as a URI even in text mode
const URI_SCHEME_PREFIXES: [&str; 4] = ["http", "upi://", "mailto:", "tel:"];

/// Slot holding the serialized NDEF message offered to readers.
///
/// Writers swap in a whole new buffer under the lock and readers take a
/// reference-counted snapshot, so a read never sees a half-written message.
#[derive(Debug, Default)]
pub struct TagSession {
    message: Mutex<Option<Arc<[u8]>>>,
}

impl TagSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `data` for `mode` and replaces the staged message.
    /// On error the previous message stays staged.
    pub fn start(&self, mode: TransmitMode, data: &str) -> Result<(), NdefError> {
        let record = build_record(mode, data)?;
        let bytes = ndef::encode_message(&record)?;
        info!("Staged {:?} message ({} bytes)", mode, bytes.len());
        *self.message.lock() = Some(bytes.into());
        Ok(())
    }

    pub fn stop(&self) {
        if self.message.lock().take().is_some() {
            info!("Cleared staged message");
        }
    }

    /// Snapshot of the staged message, if any.
    pub fn message(&self) -> Option<Arc<[u8]>> {
        self.message.lock().clone()
    }
}

pub fn build_record(mode: TransmitMode, data: &str) -> Result<NdefRecord, NdefError> {
    match mode {
        TransmitMode::Contact => Ok(ndef::encode_mime(CONTACT_MIME_TYPE, data.as_bytes())),
        TransmitMode::Url => ndef::encode_uri(data),
        TransmitMode::Text if looks_like_uri(data) => ndef::encode_uri(data),
        TransmitMode::Text => ndef::encode_text(data, DEFAULT_LANGUAGE),
    }
}

fn looks_like_uri(data: &str) -> bool {
    URI_SCHEME_PREFIXES
        .iter()
        .any(|prefix| data.starts_with(prefix))
}

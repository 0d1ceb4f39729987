// src/types.rs
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

// Messages sent TO the WebSocket client (application layer)
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    CARD_STATUS { success: bool, message: String },
    HCE_READY,
    NFC_STOPPED,
    START_ERROR { error: String },
    APDU_RESPONSE { hex: String },
    NFC_RECEIVED { kind: ReceivedKind, data: String },
    OPEN_URI { uri: String },
    DATA_READ_ERROR { error: String },
    READER_ERROR { error: String },
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    START_NFC {
        #[serde(default)]
        mode: Option<String>,
        data: String,
    },
    STOP_NFC,
    APDU { hex: String },
    DEACTIVATED,
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    CheckReaderStatus,
}

/// Type Name Format, the 3 low bits of an NDEF record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tnf {
    Empty = 0x00,
    WellKnown = 0x01,
    MimeMedia = 0x02,
    AbsoluteUri = 0x03,
    External = 0x04,
    Unknown = 0x05,
    Unchanged = 0x06,
}

impl Tnf {
    /// Maps the header bits to a TNF; 0x07 is reserved and rejected.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0x00 => Some(Self::Empty),
            0x01 => Some(Self::WellKnown),
            0x02 => Some(Self::MimeMedia),
            0x03 => Some(Self::AbsoluteUri),
            0x04 => Some(Self::External),
            0x05 => Some(Self::Unknown),
            0x06 => Some(Self::Unchanged),
            _ => None,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub id: Option<Vec<u8>>,
}

/// What the application asked to publish; resolved once from the bridge's mode label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitMode {
    Url,
    Contact,
    Text,
}

impl TransmitMode {
    /// Unknown or missing labels fall back to text.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("URL") => Self::Url,
            Some("CONTACT") => Self::Contact,
            _ => Self::Text,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceivedKind {
    URL,
    TEXT,
    TAG,
}

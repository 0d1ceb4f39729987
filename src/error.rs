// src/error.rs
use thiserror::Error;

use crate::apdu::StatusWord;

/// Failures while building or parsing NDEF records and messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NdefError {
    #[error("URI must not be empty")]
    EmptyUri,

    #[error("language code must be ASCII")]
    InvalidLanguage,

    #[error("language code is {0} bytes, at most 63 allowed")]
    LanguageTooLong(usize),

    #[error("record type is {0} bytes, at most 255 allowed")]
    TypeTooLong(usize),

    #[error("payload is {0} bytes, short records carry at most 255")]
    PayloadTooLong(usize),

    #[error("truncated record: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown TNF value: {0:#x}")]
    UnknownTnf(u8),

    #[error("NDEF message contains no records")]
    EmptyMessage,

    #[error("chunked records are not supported")]
    Chunked,

    #[error("text payload is not valid UTF-8/UTF-16")]
    InvalidText,
}

/// Failures while parsing a raw command APDU.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApduError {
    #[error("command is {0} bytes, shorter than the 4-byte header")]
    TooShort(usize),

    #[error("Lc declares {declared} data bytes but {available} follow the header")]
    LengthMismatch { declared: usize, available: usize },
}

/// Failures on the reading path (this device acting as reader).
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("transmit error: {0}")]
    Transmit(String),

    #[error("card answered {0}")]
    Status(StatusWord),

    #[error("capability container is malformed")]
    MalformedCapabilityContainer,

    #[error("no NDEF message on the tag")]
    NoNdef,

    #[error(transparent)]
    Ndef(#[from] NdefError),
}

/// Failure handing a resolved URI to an external handler.
#[derive(Debug, Error)]
#[error("could not dispatch {uri}: {reason}")]
pub struct DispatchError {
    pub uri: String,
    pub reason: String,
}

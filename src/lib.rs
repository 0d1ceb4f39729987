// src/lib.rs
//! NFC Forum Type 4 Tag emulation over host card emulation, plus the NDEF
//! codec and the classifier for messages read from other tags.
//!
//! The application stages a message in a [`TagSession`]; each tap gets its own
//! [`ApduEngine`] that answers the reader's SELECT / READ BINARY sequence from it.
//! On the reading side, [`reader`] pulls a message off a tag and
//! [`classifier::classify`] turns it into a URL, TEXT or TAG event.

pub mod apdu;
pub mod capability;
pub mod classifier;
pub mod error;
pub mod hce;
pub mod ndef;
pub mod reader;
pub mod session;
pub mod types;

pub use apdu::{ApduCommand, ApduResponse, StatusWord};
pub use classifier::{Classification, Discovery, ExternalHandler, classify};
pub use error::{ApduError, DispatchError, NdefError, ReadError};
pub use hce::{ApduEngine, Selection};
pub use session::TagSession;
pub use types::{NdefRecord, ReceivedKind, Tnf, TransmitMode};

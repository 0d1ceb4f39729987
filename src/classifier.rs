// src/classifier.rs
use log::debug;

use crate::error::DispatchError;
use crate::ndef;
use crate::types::{OutgoingMessage, ReceivedKind};

pub const GENERIC_TAG_PAYLOAD: &str = "NFC Tag Detected";

/// What the reading path hands over after a tag or peer was scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The first record already resolved to a URI.
    Uri(String),
    /// A raw NDEF message.
    Ndef(Vec<u8>),
    /// A tag was seen but carried nothing readable.
    Tag,
}

impl Discovery {
    /// Resolves a freshly read message the way the mobile platform does:
    /// a URI first record becomes [`Discovery::Uri`], anything else stays raw.
    pub fn from_ndef_message(raw: Vec<u8>) -> Self {
        if raw.is_empty() {
            return Self::Tag;
        }

        let uri = ndef::decode_message(&raw)
            .ok()
            .and_then(|records| records.first().and_then(|r| r.uri()));

        match uri {
            Some(uri) => Self::Uri(uri),
            None => Self::Ndef(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ReceivedKind,
    pub payload: String,
    /// The application should try to open the URI with an external handler.
    pub dispatch: bool,
}

impl Classification {
    fn generic_tag() -> Self {
        Self {
            kind: ReceivedKind::TAG,
            payload: GENERIC_TAG_PAYLOAD.to_string(),
            dispatch: false,
        }
    }

    pub fn dispatch_uri(&self) -> Option<&str> {
        self.dispatch.then_some(self.payload.as_str())
    }

    pub fn to_message(&self) -> OutgoingMessage {
        OutgoingMessage::NFC_RECEIVED {
            kind: self.kind,
            data: self.payload.clone(),
        }
    }
}

/// Opens a resolved URI outside this process. Failures are reported, never fatal.
pub trait ExternalHandler {
    fn dispatch(&self, uri: &str) -> Result<(), DispatchError>;
}

pub fn classify(discovery: &Discovery) -> Classification {
    match discovery {
        Discovery::Uri(uri) => Classification {
            kind: ReceivedKind::URL,
            payload: uri.clone(),
            dispatch: true,
        },
        Discovery::Ndef(raw) => classify_message(raw),
        Discovery::Tag => Classification::generic_tag(),
    }
}

// Only the first record counts
fn classify_message(raw: &[u8]) -> Classification {
    let records = match ndef::decode_message(raw) {
        Ok(records) => records,
        Err(e) => {
            debug!("Undecodable NDEF message: {}", e);
            return Classification::generic_tag();
        }
    };

    match records.first().map(|r| r.text()) {
        Some(Ok(text)) => Classification {
            kind: ReceivedKind::TEXT,
            payload: text,
            dispatch: false,
        },
        _ => Classification::generic_tag(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndef::{encode_message, encode_mime, encode_text, encode_uri};

    #[test]
    fn uri_discovery_is_url_with_dispatch() {
        let c = classify(&Discovery::Uri("https://example.com".into()));
        assert_eq!(c.kind, ReceivedKind::URL);
        assert_eq!(c.payload, "https://example.com");
        assert_eq!(c.dispatch_uri(), Some("https://example.com"));
    }

    #[test]
    fn text_message_strips_language() {
        let raw = encode_message(&encode_text("hello", "en").unwrap()).unwrap();
        let c = classify(&Discovery::Ndef(raw));
        assert_eq!(c.kind, ReceivedKind::TEXT);
        assert_eq!(c.payload, "hello");
        assert_eq!(c.dispatch_uri(), None);
    }

    #[test]
    fn other_records_are_generic_tags() {
        let raw = encode_message(&encode_mime("text/vcard", b"BEGIN:VCARD")).unwrap();
        let c = classify(&Discovery::Ndef(raw));
        assert_eq!(c.kind, ReceivedKind::TAG);
        assert_eq!(c.payload, GENERIC_TAG_PAYLOAD);
    }

    #[test]
    fn framing_error_falls_back_to_tag() {
        let c = classify(&Discovery::Ndef(vec![0xD1, 0x01, 0x40, b'T']));
        assert_eq!(c, classify(&Discovery::Tag));
        assert_eq!(c.kind, ReceivedKind::TAG);
        assert!(!c.dispatch);
    }

    #[test]
    fn resolves_uri_first_record() {
        let raw = encode_message(&encode_uri("https://example.com").unwrap()).unwrap();
        assert_eq!(
            Discovery::from_ndef_message(raw),
            Discovery::Uri("https://example.com".into())
        );

        let text = encode_message(&encode_text("hi", "en").unwrap()).unwrap();
        assert_eq!(
            Discovery::from_ndef_message(text.clone()),
            Discovery::Ndef(text)
        );
        assert_eq!(Discovery::from_ndef_message(Vec::new()), Discovery::Tag);
    }

    #[test]
    fn event_message_shape() {
        let c = classify(&Discovery::Tag);
        assert_eq!(
            c.to_message(),
            OutgoingMessage::NFC_RECEIVED {
                kind: ReceivedKind::TAG,
                data: GENERIC_TAG_PAYLOAD.into()
            }
        );
    }
}

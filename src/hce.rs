// src/hce.rs
use std::sync::Arc;

use log::debug;

use crate::apdu::{
    ApduCommand, ApduResponse, INS_READ_BINARY, INS_SELECT, SELECT_BY_NAME, StatusWord,
};
use crate::capability::{CC_FILE_ID, NDEF_AID, NDEF_FILE_ID, capability_container};
use crate::session::TagSession;

/// Which elementary file READ BINARY serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    CapabilityContainer,
    NdefFile,
}

/// Per-tap command processor. Create one per emulation session; the staged
/// message itself lives in the shared [`TagSession`].
#[derive(Debug)]
pub struct ApduEngine {
    session: Arc<TagSession>,
    selection: Selection,
}

impl ApduEngine {
    pub fn new(session: Arc<TagSession>) -> Self {
        Self {
            session,
            selection: Selection::None,
        }
    }

    pub const fn selection(&self) -> Selection {
        self.selection
    }

    /// Platform entry point: raw command bytes in, raw response bytes out.
    pub fn process_raw(&mut self, raw: &[u8]) -> Vec<u8> {
        let response = match ApduCommand::parse(raw) {
            Ok(command) => self.process(&command),
            Err(e) => {
                debug!("Rejecting {}: {}", hex::encode_upper(raw), e);
                ApduResponse::status(StatusWord::UNKNOWN)
            }
        };
        response.to_bytes()
    }

    pub fn process(&mut self, command: &ApduCommand) -> ApduResponse {
        let response = match command.ins {
            INS_SELECT if command.p1 == SELECT_BY_NAME => self.select_aid(command),
            INS_SELECT => self.select_file(command),
            INS_READ_BINARY => self.read_binary(command),
            _ => ApduResponse::status(StatusWord::UNKNOWN),
        };

        debug!(
            "INS {:02X} P1 {:02X} P2 {:02X} -> {} data bytes, SW {}",
            command.ins,
            command.p1,
            command.p2,
            response.data.len(),
            response.status
        );
        response
    }

    /// The reader left the field; the next tap starts from scratch.
    pub fn deactivate(&mut self) {
        self.selection = Selection::None;
    }

    fn select_aid(&mut self, command: &ApduCommand) -> ApduResponse {
        if command.p2 != 0x00 || command.data != NDEF_AID {
            return ApduResponse::status(StatusWord::UNKNOWN);
        }
        self.selection = Selection::None;
        ApduResponse::status(StatusWord::SUCCESS)
    }

    // Unrecognized identifiers are acknowledged; some readers try several file IDs.
    fn select_file(&mut self, command: &ApduCommand) -> ApduResponse {
        let &[hi, lo] = command.data.as_slice() else {
            return ApduResponse::status(StatusWord::UNKNOWN);
        };

        self.selection = match u16::from_be_bytes([hi, lo]) {
            CC_FILE_ID => Selection::CapabilityContainer,
            NDEF_FILE_ID => Selection::NdefFile,
            other => {
                debug!("SELECT of unknown file {:04X}", other);
                Selection::None
            }
        };
        ApduResponse::status(StatusWord::SUCCESS)
    }

    fn read_binary(&self, command: &ApduCommand) -> ApduResponse {
        let Some(length) = command.expected_length() else {
            return ApduResponse::status(StatusWord::UNKNOWN);
        };
        let offset = ((command.p1 as usize) << 8) | command.p2 as usize;

        let contents = match self.selection {
            Selection::CapabilityContainer => capability_container().to_vec(),
            Selection::NdefFile => match self.session.message() {
                Some(message) => ndef_file(&message),
                None => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
            },
            Selection::None => return ApduResponse::status(StatusWord::FILE_NOT_FOUND),
        };

        if offset >= contents.len() {
            return ApduResponse::status(StatusWord::FILE_NOT_FOUND);
        }

        let end = offset + length.min(contents.len() - offset);
        ApduResponse::success(contents[offset..end].to_vec())
    }
}

/// NDEF file contents: [NLEN Hi] [NLEN Lo] [Message]
pub fn ndef_file(message: &[u8]) -> Vec<u8> {
    let mut file = Vec::with_capacity(2 + message.len());
    file.extend_from_slice(&(message.len() as u16).to_be_bytes());
    file.extend_from_slice(message);
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CC_LEN;
    use crate::types::TransmitMode;

    const SELECT_AID: &str = "00A4040007D276000085010100";
    const SELECT_CC: &str = "00A4000C02E103";
    const SELECT_NDEF: &str = "00A4000C02E104";

    fn engine() -> (Arc<TagSession>, ApduEngine) {
        let session = Arc::new(TagSession::new());
        let engine = ApduEngine::new(session.clone());
        (session, engine)
    }

    fn send(engine: &mut ApduEngine, apdu: &str) -> Vec<u8> {
        engine.process_raw(&hex::decode(apdu).unwrap())
    }

    #[test]
    fn select_aid_answers_success() {
        let (_, mut engine) = engine();
        assert_eq!(send(&mut engine, SELECT_AID), vec![0x90, 0x00]);
        assert_eq!(engine.selection(), Selection::None);
    }

    #[test]
    fn foreign_aid_is_unknown() {
        let (_, mut engine) = engine();
        assert_eq!(send(&mut engine, "00A4040007A000000003101000"), vec![0x6F, 0x00]);
        assert_eq!(engine.selection(), Selection::None);
    }

    #[test]
    fn capability_container_read() {
        let (_, mut engine) = engine();
        send(&mut engine, SELECT_AID);
        assert_eq!(send(&mut engine, SELECT_CC), vec![0x90, 0x00]);
        assert_eq!(engine.selection(), Selection::CapabilityContainer);

        let response = send(&mut engine, "00B00000FF");
        assert_eq!(response.len(), CC_LEN + 2);
        assert_eq!(&response[..CC_LEN], &capability_container());
        assert_eq!(&response[CC_LEN..], &[0x90, 0x00]);
    }

    #[test]
    fn ndef_read_without_message_is_not_found() {
        let (_, mut engine) = engine();
        send(&mut engine, SELECT_AID);
        send(&mut engine, SELECT_NDEF);
        assert_eq!(send(&mut engine, "00B0000002"), vec![0x6A, 0x82]);
    }

    #[test]
    fn ndef_file_carries_length_prefix() {
        let (session, mut engine) = engine();
        session.start(TransmitMode::Text, "hi").unwrap();
        send(&mut engine, SELECT_AID);
        send(&mut engine, SELECT_NDEF);

        let nlen = send(&mut engine, "00B0000002");
        assert_eq!(nlen, vec![0x00, 0x09, 0x90, 0x00]);

        let body = send(&mut engine, "00B0000209");
        assert_eq!(&body[..9], &[0xD1, 0x01, 0x05, b'T', 0x02, b'e', b'n', b'h', b'i']);
        assert_eq!(&body[9..], &[0x90, 0x00]);
    }

    #[test]
    fn offset_past_end_is_not_found() {
        let (session, mut engine) = engine();
        session.start(TransmitMode::Text, "hi").unwrap();
        send(&mut engine, SELECT_NDEF);
        // File is 2 + 9 bytes long
        assert_eq!(send(&mut engine, "00B0000B01"), vec![0x6A, 0x82]);
        assert_eq!(send(&mut engine, "00B0000A01"), vec![b'i', 0x90, 0x00]);

        send(&mut engine, SELECT_CC);
        assert_eq!(send(&mut engine, "00B0000F0F"), vec![0x6A, 0x82]);
    }

    #[test]
    fn partial_reads_reconstruct_file() {
        let (session, mut engine) = engine();
        session.start(TransmitMode::Url, "https://example.com/some/longer/path").unwrap();
        send(&mut engine, SELECT_AID);
        send(&mut engine, SELECT_NDEF);

        let expected = ndef_file(&session.message().unwrap());
        let mut file = Vec::new();
        let mut offset = 0u16;
        loop {
            let command = ApduCommand::read_binary(offset, 7);
            let response = engine.process(&command);
            if response.status != StatusWord::SUCCESS {
                break;
            }
            assert!(response.data.len() <= 7);
            offset += response.data.len() as u16;
            file.extend(response.data);
        }
        assert_eq!(file, expected);
    }

    #[test]
    fn le_zero_reads_up_to_256_bytes() {
        let (_, mut engine) = engine();
        send(&mut engine, SELECT_CC);
        let response = send(&mut engine, "00B0000000");
        assert_eq!(response.len(), CC_LEN + 2);
    }

    #[test]
    fn unknown_file_is_acknowledged_but_unreadable() {
        let (session, mut engine) = engine();
        session.start(TransmitMode::Text, "hi").unwrap();
        assert_eq!(send(&mut engine, "00A4000C02E105"), vec![0x90, 0x00]);
        assert_eq!(engine.selection(), Selection::None);
        assert_eq!(send(&mut engine, "00B0000002"), vec![0x6A, 0x82]);
    }

    #[test]
    fn short_or_unknown_commands_are_rejected() {
        let (_, mut engine) = engine();
        assert_eq!(engine.process_raw(&[0x00, 0xB0]), vec![0x6F, 0x00]);
        // READ BINARY without Le
        assert_eq!(send(&mut engine, "00B00000"), vec![0x6F, 0x00]);
        // SELECT FILE without identifier
        assert_eq!(send(&mut engine, "00A4000C"), vec![0x6F, 0x00]);
        // UPDATE BINARY is not supported on this read-only tag
        assert_eq!(send(&mut engine, "00D6000001FF"), vec![0x6F, 0x00]);
        // Lc overruns the buffer
        assert_eq!(send(&mut engine, "00A4000C05E1"), vec![0x6F, 0x00]);

        // Still serving afterwards
        assert_eq!(send(&mut engine, SELECT_AID), vec![0x90, 0x00]);
    }

    #[test]
    fn stop_mid_session_hides_message() {
        let (session, mut engine) = engine();
        session.start(TransmitMode::Text, "hi").unwrap();
        send(&mut engine, SELECT_NDEF);
        assert_eq!(send(&mut engine, "00B0000002"), vec![0x00, 0x09, 0x90, 0x00]);

        session.stop();
        assert_eq!(send(&mut engine, "00B0000002"), vec![0x6A, 0x82]);
    }

    #[test]
    fn deactivate_resets_selection() {
        let (_, mut engine) = engine();
        send(&mut engine, SELECT_AID);
        send(&mut engine, SELECT_CC);
        engine.deactivate();
        assert_eq!(engine.selection(), Selection::None);
        assert_eq!(send(&mut engine, "00B00000FF"), vec![0x6A, 0x82]);
    }
}

// src/cards.rs
use log::{debug, warn};
use nfc_tag_service::error::ReadError;
use nfc_tag_service::reader::{self, Transceive};
use pcsc::{Card, MAX_BUFFER_SIZE};

// Last ATR byte as reported by ACR122U-style readers
pub const CARD_TYPE_NTAG: u8 = 0x68; // NTAG215/Ultralight

/// PC/SC card handle as an APDU channel.
pub struct PcscChannel<'a>(pub &'a Card);

impl Transceive for PcscChannel<'_> {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, ReadError> {
        let mut recv_buffer = [0u8; MAX_BUFFER_SIZE];
        debug!(">> {}", hex::encode_upper(command));
        match self.0.transmit(command, &mut recv_buffer) {
            Ok(resp) => {
                debug!("<< {}", hex::encode_upper(resp));
                Ok(resp.to_vec())
            }
            Err(e) => Err(ReadError::Transmit(e.to_string())),
        }
    }
}

pub fn atr_card_type(card: &Card) -> Option<u8> {
    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    let status = card.status2(&mut names_buf, &mut atr_buf).ok()?;
    status.atr().last().copied()
}

/// Reads the NDEF message: Type 2 pages for NTAG, otherwise the Type 4
/// application with a Type 2 fallback.
pub fn read_ndef(card: &Card) -> Result<Vec<u8>, ReadError> {
    let mut channel = PcscChannel(card);

    if atr_card_type(card) == Some(CARD_TYPE_NTAG) {
        return reader::read_type2(&mut channel);
    }

    match reader::read_type4(&mut channel) {
        Ok(message) => Ok(message),
        Err(e) => {
            warn!("Type 4 read failed ({}), trying Type 2 pages", e);
            reader::read_type2(&mut channel)
        }
    }
}

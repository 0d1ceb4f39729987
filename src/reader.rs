// src/reader.rs
use log::debug;

use crate::apdu::{ApduCommand, ApduResponse, INS_READ_BINARY};
use crate::capability::{CC_FILE_ID, CC_LEN, CapabilityContainer, NDEF_AID};
use crate::error::{NdefError, ReadError};
use crate::hce::ApduEngine;
use crate::ndef;

// Type 2 user memory starts at page 4; one PC/SC read returns 4 pages
const TYPE2_FIRST_PAGE: u8 = 4;
const TYPE2_PAGES_PER_READ: u8 = 4;
const TYPE2_READ_LEN: u8 = 16;

/// A channel that exchanges one raw command APDU for one raw response APDU.
pub trait Transceive {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, ReadError>;
}

// Lets the reader talk straight to the emulated tag.
impl Transceive for ApduEngine {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, ReadError> {
        Ok(self.process_raw(command))
    }
}

fn exchange<T: Transceive + ?Sized>(
    card: &mut T,
    command: &ApduCommand,
) -> Result<Vec<u8>, ReadError> {
    let raw = card.transceive(&command.to_bytes())?;
    let response = ApduResponse::parse(&raw)
        .ok_or_else(|| ReadError::Transmit(format!("response too short: {raw:02X?}")))?;

    if !response.status.is_success() {
        return Err(ReadError::Status(response.status));
    }
    Ok(response.data)
}

/// Reads the NDEF message from a Type 4 Tag (or a phone emulating one).
pub fn read_type4<T: Transceive + ?Sized>(card: &mut T) -> Result<Vec<u8>, ReadError> {
    exchange(card, &ApduCommand::select_aid(&NDEF_AID))?;

    exchange(card, &ApduCommand::select_file(CC_FILE_ID))?;
    let cc_bytes = exchange(card, &ApduCommand::read_binary(0, CC_LEN as u8))?;
    let cc = CapabilityContainer::parse(&cc_bytes)?;
    debug!("CC: {:?}", cc);

    exchange(card, &ApduCommand::select_file(cc.ndef_file_id))?;
    let nlen = exchange(card, &ApduCommand::read_binary(0, 2))?;
    let &[hi, lo, ..] = nlen.as_slice() else {
        return Err(ReadError::NoNdef);
    };
    let nlen = u16::from_be_bytes([hi, lo]) as usize;
    if nlen == 0 {
        return Err(ReadError::NoNdef);
    }

    // Stay within MLe so the tag never has to split a response
    let chunk = cc.max_le.clamp(1, 0xFF) as usize;
    let mut message = Vec::with_capacity(nlen);

    while message.len() < nlen {
        let offset = u16::try_from(2 + message.len())
            .map_err(|_| ReadError::Transmit(format!("NLEN {nlen} exceeds the file range")))?;
        let want = (nlen - message.len()).min(chunk);

        let data = exchange(card, &ApduCommand::read_binary(offset, want as u8))?;
        if data.is_empty() {
            return Err(ReadError::Transmit(format!("empty read at offset {offset}")));
        }
        message.extend_from_slice(&data[..data.len().min(want)]);
    }

    Ok(message)
}

/// Reads the NDEF Message TLV from a Type 2 tag (NTAG/Ultralight) through
/// the PC/SC pseudo-APDU `FF B0 00 [Page] 10`.
pub fn read_type2<T: Transceive + ?Sized>(card: &mut T) -> Result<Vec<u8>, ReadError> {
    let mut memory = Vec::new();
    let mut page = TYPE2_FIRST_PAGE;

    loop {
        let command = ApduCommand {
            le: Some(TYPE2_READ_LEN),
            ..ApduCommand::new(0xFF, INS_READ_BINARY, 0x00, page)
        };
        let data = match exchange(card, &command) {
            Ok(data) => data,
            // Ran off the end of user memory
            Err(ReadError::Status(_)) if !memory.is_empty() => return Err(ReadError::NoNdef),
            Err(e) => return Err(e),
        };
        memory.extend_from_slice(&data);

        match ndef::unwrap_tlv(&memory) {
            Ok(message) => return Ok(message.to_vec()),
            Err(NdefError::Truncated { .. }) => {}
            Err(NdefError::EmptyMessage) => return Err(ReadError::NoNdef),
            Err(e) => return Err(e.into()),
        }

        page = match page.checked_add(TYPE2_PAGES_PER_READ) {
            Some(next) => next,
            None => return Err(ReadError::NoNdef),
        };
    }
}

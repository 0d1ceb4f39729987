// src/capability.rs
use crate::error::ReadError;
use crate::ndef::SHORT_RECORD_MAX;

/// NDEF Tag Application AID
pub const NDEF_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

pub const CC_FILE_ID: u16 = 0xE103;
pub const NDEF_FILE_ID: u16 = 0xE104;

pub const CC_LEN: usize = 15;
pub const MAPPING_VERSION: u8 = 0x20;
/// MLe: max R-APDU data size
pub const MAX_RESPONSE_DATA: u16 = 0x003B;
/// MLc: max C-APDU data size
pub const MAX_COMMAND_DATA: u16 = 0x0034;
/// Max NDEF file size, NLEN prefix included
pub const MAX_NDEF_FILE_SIZE: u16 = 0x0400;

const NDEF_FILE_CONTROL_TLV: u8 = 0x04;
const NDEF_FILE_CONTROL_LEN: u8 = 0x06;
const ACCESS_FREE: u8 = 0x00;

// Every single-record short message plus its 2-byte NLEN fits the advertised file.
const _: () = assert!(MAX_NDEF_FILE_SIZE as usize >= 2 + 3 + 2 * SHORT_RECORD_MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContainer {
    pub mapping_version: u8,
    pub max_le: u16,
    pub max_lc: u16,
    pub ndef_file_id: u16,
    pub max_ndef_size: u16,
    pub read_access: u8,
    pub write_access: u8,
}

impl CapabilityContainer {
    /// What the emulated tag publishes. Write access reads "free" although
    /// UPDATE BINARY is never honoured.
    pub const EMULATED: Self = Self {
        mapping_version: MAPPING_VERSION,
        max_le: MAX_RESPONSE_DATA,
        max_lc: MAX_COMMAND_DATA,
        ndef_file_id: NDEF_FILE_ID,
        max_ndef_size: MAX_NDEF_FILE_SIZE,
        read_access: ACCESS_FREE,
        write_access: ACCESS_FREE,
    };

    pub const fn to_bytes(&self) -> [u8; CC_LEN] {
        let [le_hi, le_lo] = self.max_le.to_be_bytes();
        let [lc_hi, lc_lo] = self.max_lc.to_be_bytes();
        let [id_hi, id_lo] = self.ndef_file_id.to_be_bytes();
        let [max_hi, max_lo] = self.max_ndef_size.to_be_bytes();
        [
            0x00,
            CC_LEN as u8, // CCLEN
            self.mapping_version,
            le_hi,
            le_lo,
            lc_hi,
            lc_lo,
            NDEF_FILE_CONTROL_TLV,
            NDEF_FILE_CONTROL_LEN,
            id_hi,
            id_lo,
            max_hi,
            max_lo,
            self.read_access,
            self.write_access,
        ]
    }

    /// Parses a CC read from a tag. Extra TLVs after the NDEF File Control TLV are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self, ReadError> {
        if raw.len() < CC_LEN {
            return Err(ReadError::MalformedCapabilityContainer);
        }
        let be = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);

        if (be(0) as usize) < CC_LEN
            || raw[7] != NDEF_FILE_CONTROL_TLV
            || raw[8] != NDEF_FILE_CONTROL_LEN
        {
            return Err(ReadError::MalformedCapabilityContainer);
        }

        Ok(Self {
            mapping_version: raw[2],
            max_le: be(3),
            max_lc: be(5),
            ndef_file_id: be(9),
            max_ndef_size: be(11),
            read_access: raw[13],
            write_access: raw[14],
        })
    }
}

/// The 15-byte CC file served by the emulated tag.
pub const fn capability_container() -> [u8; CC_LEN] {
    CapabilityContainer::EMULATED.to_bytes()
}

// src/apdu.rs
use std::fmt;

use crate::error::ApduError;

pub const INS_SELECT: u8 = 0xA4;
pub const INS_READ_BINARY: u8 = 0xB0;

/// SELECT P1: select by DF name (AID)
pub const SELECT_BY_NAME: u8 = 0x04;
/// SELECT P1: select EF by file identifier
pub const SELECT_BY_ID: u8 = 0x00;
/// SELECT P2: first or only occurrence, no FCI returned
pub const SELECT_NO_FCI: u8 = 0x0C;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const SUCCESS: Self = Self(0x9000);
    pub const FILE_NOT_FOUND: Self = Self(0x6A82);
    pub const UNKNOWN: Self = Self(0x6F00);

    pub const fn from_bytes(sw1: u8, sw2: u8) -> Self {
        Self(((sw1 as u16) << 8) | sw2 as u16)
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Parsed command: CLA INS P1 P2 [Lc Data] [Le]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
    pub le: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Parses a short-form command. Extended lengths are not accepted.
    pub fn parse(raw: &[u8]) -> Result<Self, ApduError> {
        let [cla, ins, p1, p2, body @ ..] = raw else {
            return Err(ApduError::TooShort(raw.len()));
        };
        let mut command = Self::new(*cla, *ins, *p1, *p2);

        match body {
            [] => {}
            [le] => command.le = Some(*le),
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if lc == 0 || lc > rest.len() || rest.len() - lc > 1 {
                    return Err(ApduError::LengthMismatch {
                        declared: lc,
                        available: rest.len(),
                    });
                }
                command.data = rest[..lc].to_vec();
                command.le = rest.get(lc).copied();
            }
        }

        Ok(command)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];
        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            apdu.push(le);
        }
        apdu
    }

    /// Le as a byte count; 0x00 stands for 256.
    pub fn expected_length(&self) -> Option<usize> {
        self.le.map(|le| if le == 0 { 256 } else { le as usize })
    }

    // SELECT: 00 A4 04 00 Lc [AID] 00
    pub fn select_aid(aid: &[u8]) -> Self {
        Self {
            data: aid.to_vec(),
            le: Some(0x00),
            ..Self::new(0x00, INS_SELECT, SELECT_BY_NAME, 0x00)
        }
    }

    // SELECT: 00 A4 00 0C 02 [File ID]
    pub fn select_file(file_id: u16) -> Self {
        Self {
            data: file_id.to_be_bytes().to_vec(),
            ..Self::new(0x00, INS_SELECT, SELECT_BY_ID, SELECT_NO_FCI)
        }
    }

    // READ BINARY: 00 B0 [Offset Hi] [Offset Lo] Le
    pub fn read_binary(offset: u16, le: u8) -> Self {
        let [hi, lo] = offset.to_be_bytes();
        Self {
            le: Some(le),
            ..Self::new(0x00, INS_READ_BINARY, hi, lo)
        }
    }
}

/// Response: [Data] SW1 SW2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub status: StatusWord,
}

impl ApduResponse {
    pub const fn status(status: StatusWord) -> Self {
        Self {
            data: Vec::new(),
            status,
        }
    }

    pub const fn success(data: Vec<u8>) -> Self {
        Self {
            data,
            status: StatusWord::SUCCESS,
        }
    }

    pub fn parse(raw: &[u8]) -> Option<Self> {
        let split = raw.len().checked_sub(2)?;
        let (data, sw) = raw.split_at(split);
        Some(Self {
            data: data.to_vec(),
            status: StatusWord::from_bytes(sw[0], sw[1]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 2);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.status.to_bytes());
        out
    }
}

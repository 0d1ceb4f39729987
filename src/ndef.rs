// src/ndef.rs
use crate::error::NdefError;
use crate::types::{NdefRecord, Tnf};

// Record header flags
// Bit 7: MB, Bit 6: ME, Bit 5: CF, Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
pub const FLAG_MB: u8 = 0x80;
pub const FLAG_ME: u8 = 0x40;
pub const FLAG_CF: u8 = 0x20;
pub const FLAG_SR: u8 = 0x10;
pub const FLAG_IL: u8 = 0x08;

pub const RTD_TEXT: &[u8] = b"T";
pub const RTD_URI: &[u8] = b"U";

/// Largest type or payload a short record can carry.
pub const SHORT_RECORD_MAX: usize = 0xFF;

// Text status byte: bit 7 = UTF-16, bits 5-0 = language code length
const TEXT_UTF16: u8 = 0x80;
const TEXT_LANG_MASK: u8 = 0x3F;

// Type 2 tag TLV blocks
const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

/// NFC Forum URI RTD abbreviations, indexed by identifier code.
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// URI record: [Prefix Code 0x00] + [full URI]
pub fn encode_uri(uri: &str) -> Result<NdefRecord, NdefError> {
    if uri.is_empty() {
        return Err(NdefError::EmptyUri);
    }

    let mut payload = Vec::with_capacity(1 + uri.len());
    payload.push(0x00); // No abbreviation
    payload.extend_from_slice(uri.as_bytes());

    Ok(NdefRecord {
        tnf: Tnf::WellKnown,
        record_type: RTD_URI.to_vec(),
        payload,
        id: None,
    })
}

/// Text record: [Status Byte] + [Lang Code] + [UTF-8 Text]
pub fn encode_text(text: &str, lang: &str) -> Result<NdefRecord, NdefError> {
    if !lang.is_ascii() {
        return Err(NdefError::InvalidLanguage);
    }
    let lang_code = lang.as_bytes();
    if lang_code.len() > TEXT_LANG_MASK as usize {
        return Err(NdefError::LanguageTooLong(lang_code.len()));
    }

    let mut payload = Vec::with_capacity(1 + lang_code.len() + text.len());
    payload.push(lang_code.len() as u8); // Bit 7=0 (UTF-8)
    payload.extend_from_slice(lang_code);
    payload.extend_from_slice(text.as_bytes());

    Ok(NdefRecord {
        tnf: Tnf::WellKnown,
        record_type: RTD_TEXT.to_vec(),
        payload,
        id: None,
    })
}

pub fn encode_mime(mime_type: &str, payload: &[u8]) -> NdefRecord {
    NdefRecord {
        tnf: Tnf::MimeMedia,
        record_type: mime_type.as_bytes().to_vec(),
        payload: payload.to_vec(),
        id: None,
    }
}

/// Serializes a single-record message: MB=1, ME=1, CF=0, SR=1, IL=0.
pub fn encode_message(record: &NdefRecord) -> Result<Vec<u8>, NdefError> {
    if record.record_type.len() > SHORT_RECORD_MAX {
        return Err(NdefError::TypeTooLong(record.record_type.len()));
    }
    if record.payload.len() > SHORT_RECORD_MAX {
        return Err(NdefError::PayloadTooLong(record.payload.len()));
    }

    let header = FLAG_MB | FLAG_ME | FLAG_SR | record.tnf.bits();

    let mut message = Vec::with_capacity(3 + record.record_type.len() + record.payload.len());
    message.push(header);
    message.push(record.record_type.len() as u8); // Type Length
    message.push(record.payload.len() as u8); // Payload Length (SR=1)
    message.extend_from_slice(&record.record_type);
    message.extend_from_slice(&record.payload);

    Ok(message)
}

/// Parses records until one carries the Message End flag.
pub fn decode_message(data: &[u8]) -> Result<Vec<NdefRecord>, NdefError> {
    if data.is_empty() {
        return Err(NdefError::EmptyMessage);
    }

    let mut records = Vec::new();
    let mut cursor = Cursor::new(data);

    loop {
        let (record, is_me) = read_record(&mut cursor)?;
        records.push(record);

        if is_me {
            break;
        }
    }

    Ok(records)
}

/// Decodes exactly one record; trailing bytes are ignored.
pub fn decode_record(data: &[u8]) -> Result<NdefRecord, NdefError> {
    read_record(&mut Cursor::new(data)).map(|(record, _)| record)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NdefError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(NdefError::Truncated {
                needed: n,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, NdefError> {
        self.take(1).map(|b| b[0])
    }
}

fn read_record(cursor: &mut Cursor<'_>) -> Result<(NdefRecord, bool), NdefError> {
    let header = cursor.byte()?;
    let tnf = Tnf::from_bits(header).ok_or(NdefError::UnknownTnf(header & 0x07))?;
    let is_me = header & FLAG_ME != 0;
    let is_short_record = header & FLAG_SR != 0;
    let has_id = header & FLAG_IL != 0;

    if header & FLAG_CF != 0 {
        return Err(NdefError::Chunked);
    }

    // 1. Type Length
    let type_len = cursor.byte()? as usize;

    // 2. Payload Length (1 byte for Short Record, 4 bytes big-endian otherwise)
    let payload_len = if is_short_record {
        cursor.byte()? as usize
    } else {
        let b = cursor.take(4)?;
        u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize
    };

    // 3. ID Length (if present)
    let id_len = if has_id { cursor.byte()? as usize } else { 0 };

    // 4. Type, ID, Payload
    let record_type = cursor.take(type_len)?.to_vec();
    let id = if has_id {
        Some(cursor.take(id_len)?.to_vec())
    } else {
        None
    };
    let payload = cursor.take(payload_len)?.to_vec();

    Ok((
        NdefRecord {
            tnf,
            record_type,
            payload,
            id,
        },
        is_me,
    ))
}

impl NdefRecord {
    pub fn is_text(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == RTD_TEXT
    }

    pub fn is_uri(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == RTD_URI
    }

    /// Language code of a Text record.
    pub fn language(&self) -> Option<String> {
        if !self.is_text() {
            return None;
        }
        let status = *self.payload.first()?;
        let lang_len = (status & TEXT_LANG_MASK) as usize;
        let lang = self.payload.get(1..1 + lang_len)?;
        Some(String::from_utf8_lossy(lang).into_owned())
    }

    /// Text of a Text record with the status byte and language code stripped.
    pub fn text(&self) -> Result<String, NdefError> {
        if !self.is_text() {
            return Err(NdefError::InvalidText);
        }

        let status = *self.payload.first().ok_or(NdefError::InvalidText)?;
        let text_start = 1 + (status & TEXT_LANG_MASK) as usize;
        let text_bytes = self.payload.get(text_start..).ok_or(NdefError::Truncated {
            needed: text_start,
            remaining: self.payload.len(),
        })?;

        if status & TEXT_UTF16 != 0 {
            decode_utf16(text_bytes)
        } else {
            String::from_utf8(text_bytes.to_vec()).map_err(|_| NdefError::InvalidText)
        }
    }

    /// Full URI of a well-known URI record (prefix code expanded) or an absolute-URI record.
    pub fn uri(&self) -> Option<String> {
        if self.tnf == Tnf::AbsoluteUri {
            return String::from_utf8(self.record_type.clone()).ok();
        }
        if !self.is_uri() {
            return None;
        }

        let (&code, rest) = self.payload.split_first()?;
        let prefix = URI_PREFIXES.get(code as usize).copied().unwrap_or("");
        let rest = std::str::from_utf8(rest).ok()?;
        Some(format!("{prefix}{rest}"))
    }
}

fn decode_utf16(bytes: &[u8]) -> Result<String, NdefError> {
    if bytes.len() % 2 != 0 {
        return Err(NdefError::InvalidText);
    }

    // BOM decides byte order, big-endian otherwise
    let (little_endian, body) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).map_err(|_| NdefError::InvalidText)
}

/// Wraps an NDEF message in a Type 2 NDEF Message TLV with terminator.
pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Vec<u8> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + 5);
    // T = 0x03 (NDEF Message)
    tlv.push(TLV_NDEF);

    // L: 1 byte below 0xFF, else 0xFF + 2 bytes big-endian
    if ndef_bytes.len() < 0xFF {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        tlv.push(0xFF);
        tlv.extend_from_slice(&(ndef_bytes.len() as u16).to_be_bytes());
    }

    // V (Value)
    tlv.extend_from_slice(ndef_bytes);

    // Terminator
    tlv.push(TLV_TERMINATOR);

    tlv
}

/// Finds the first NDEF Message TLV in a Type 2 tag data area.
pub fn unwrap_tlv(buffer: &[u8]) -> Result<&[u8], NdefError> {
    let mut cursor = Cursor::new(buffer);

    while cursor.pos < buffer.len() {
        let tag = cursor.byte()?;
        match tag {
            TLV_NULL => continue,
            TLV_TERMINATOR => break,
            _ => {
                let mut len = cursor.byte()? as usize;
                if len == 0xFF {
                    let b = cursor.take(2)?;
                    len = u16::from_be_bytes([b[0], b[1]]) as usize;
                }
                let value = cursor.take(len)?;
                if tag == TLV_NDEF {
                    return Ok(value);
                }
                // Lock/Memory control and proprietary TLVs are skipped
            }
        }
    }

    Err(NdefError::EmptyMessage)
}

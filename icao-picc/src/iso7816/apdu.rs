//! Command and response application protocol data units (APDUs) as seen by the card.


use std::fmt;
use std::io::{self, Write};

use crate::iso7816::status::StatusWord;


#[derive(Debug)]
pub enum WriteError {
    Io(io::Error),
    EmptyData,
    DataTooLong { maximum: usize, obtained: usize },
}
impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::EmptyData => write!(f, "data is, but must not be, empty"),
            Self::DataTooLong { maximum, obtained } => write!(f, "too much data: obtained {} bytes, expected maximum {} bytes", obtained, maximum),
        }
    }
}
impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::EmptyData => None,
            Self::DataTooLong { .. } => None,
        }
    }
}
impl From<io::Error> for WriteError {
    fn from(value: io::Error) -> Self { Self::Io(value) }
}


/// A problem with the structure of a received command APDU.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ParseError {
    /// The command is shorter than its four-byte header.
    MissingHeader { length: usize },

    /// The body does not match any of the cases of ISO/IEC 7816-3.
    InvalidBody { body_length: usize },
}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader { length } => write!(f, "command of {} bytes is missing its header", length),
            Self::InvalidBody { body_length } => write!(f, "command body of {} bytes has an invalid structure", body_length),
        }
    }
}
impl std::error::Error for ParseError {
}


#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CommandHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}
impl CommandHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self { cla, ins, p1, p2 }
    }

    pub const fn to_bytes(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// P1 and P2 as one big-endian word.
    pub const fn p1p2(&self) -> u16 {
        u16::from_be_bytes([self.p1, self.p2])
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        Ok(())
    }
}
impl fmt::Debug for CommandHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandHeader {} cla: 0x{:02X}, ins: 0x{:02X}, p1: 0x{:02X}, p2: 0x{:02X} {}",
            '{', self.cla, self.ins, self.p1, self.p2, '}',
        )
    }
}


/// The body of a command APDU, by ISO/IEC 7816-3:2006 § 12.1.3 case.
///
/// An expected response length of 0 in the short (extended) form stands for 256 (65536) bytes and
/// is stored as such.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Data {
    NoData,
    RequestDataShort {
        request_data: Vec<u8>,
    },
    RequestDataExtended {
        request_data: Vec<u8>,
    },
    ResponseDataShort {
        response_data_length: u8,
    },
    ResponseDataExtended {
        response_data_length: u16,
    },
    BothDataShort {
        request_data: Vec<u8>,
        response_data_length: u8,
    },
    BothDataExtended {
        request_data: Vec<u8>,
        response_data_length: u16,
    },
}
impl Data {
    /// The maximum number of response bytes expected by the terminal.
    pub fn response_data_length(&self) -> Option<usize> {
        fn short(length: u8) -> usize {
            if length == 0 { 256 } else { length.into() }
        }
        fn extended(length: u16) -> usize {
            if length == 0 { 65536 } else { length.into() }
        }

        match self {
            Self::NoData => None,
            Self::RequestDataShort { .. } => None,
            Self::RequestDataExtended { .. } => None,
            Self::ResponseDataShort { response_data_length } => Some(short(*response_data_length)),
            Self::ResponseDataExtended { response_data_length } => Some(extended(*response_data_length)),
            Self::BothDataShort { response_data_length, .. } => Some(short(*response_data_length)),
            Self::BothDataExtended { response_data_length, .. } => Some(extended(*response_data_length)),
        }
    }

    /// Chooses the body for the given request data and expected response length, preferring the
    /// short form.
    ///
    /// Empty request data is treated as absent. Returns `None` if the lengths cannot be encoded.
    pub fn new(request_data: Vec<u8>, response_data_length: Option<usize>) -> Option<Self> {
        fn short_le(length: usize) -> Option<u8> {
            match length {
                1..=255 => u8::try_from(length).ok(),
                256 => Some(0),
                _ => None,
            }
        }
        fn extended_le(length: usize) -> Option<u16> {
            match length {
                1..=65535 => u16::try_from(length).ok(),
                65536 => Some(0),
                _ => None,
            }
        }

        if request_data.len() > 65535 {
            return None;
        }
        let short_request = request_data.len() <= 255;
        let body = match (request_data.is_empty(), response_data_length) {
            (true, None) => Self::NoData,
            (true, Some(le)) => match short_le(le) {
                Some(response_data_length) => Self::ResponseDataShort { response_data_length },
                None => Self::ResponseDataExtended { response_data_length: extended_le(le)? },
            },
            (false, None) => if short_request {
                Self::RequestDataShort { request_data }
            } else {
                Self::RequestDataExtended { request_data }
            },
            (false, Some(le)) => match (short_request, short_le(le)) {
                (true, Some(response_data_length)) => Self::BothDataShort { request_data, response_data_length },
                _ => Self::BothDataExtended { request_data, response_data_length: extended_le(le)? },
            },
        };
        Some(body)
    }

    pub fn request_data(&self) -> Option<&[u8]> {
        match self {
            Self::NoData => None,
            Self::RequestDataShort { request_data } => Some(request_data.as_slice()),
            Self::RequestDataExtended { request_data } => Some(request_data.as_slice()),
            Self::ResponseDataShort { .. } => None,
            Self::ResponseDataExtended { .. } => None,
            Self::BothDataShort { request_data, .. } => Some(request_data.as_slice()),
            Self::BothDataExtended { request_data, .. } => Some(request_data.as_slice()),
        }
    }

    /// Decodes the body following a command header.
    pub fn from_body(body: &[u8]) -> Result<Self, ParseError> {
        let invalid = ParseError::InvalidBody { body_length: body.len() };

        match body {
            [] => Ok(Self::NoData),
            [le] => Ok(Self::ResponseDataShort { response_data_length: *le }),
            [0x00, le_msb, le_lsb] => Ok(Self::ResponseDataExtended {
                response_data_length: u16::from_be_bytes([*le_msb, *le_lsb]),
            }),
            [0x00, lc_msb, lc_lsb, rest @ ..] if !rest.is_empty() => {
                let lc = usize::from(u16::from_be_bytes([*lc_msb, *lc_lsb]));
                if lc == 0 {
                    return Err(invalid);
                }
                if rest.len() == lc {
                    // case 3E
                    Ok(Self::RequestDataExtended { request_data: rest.to_vec() })
                } else if rest.len() == lc + 2 {
                    // case 4E
                    Ok(Self::BothDataExtended {
                        request_data: rest[..lc].to_vec(),
                        response_data_length: u16::from_be_bytes([rest[lc], rest[lc + 1]]),
                    })
                } else {
                    Err(invalid)
                }
            },
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                if lc == 0 {
                    return Err(invalid);
                }
                if rest.len() == lc {
                    // case 3S
                    Ok(Self::RequestDataShort { request_data: rest.to_vec() })
                } else if rest.len() == lc + 1 {
                    // case 4S
                    Ok(Self::BothDataShort {
                        request_data: rest[..lc].to_vec(),
                        response_data_length: rest[lc],
                    })
                } else {
                    Err(invalid)
                }
            },
        }
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        fn short_length(request_data: &[u8]) -> Result<u8, WriteError> {
            if request_data.is_empty() {
                return Err(WriteError::EmptyData);
            }
            if request_data.len() > 255 {
                return Err(WriteError::DataTooLong { maximum: 255, obtained: request_data.len() });
            }
            Ok(request_data.len() as u8)
        }
        fn extended_length(request_data: &[u8]) -> Result<[u8; 2], WriteError> {
            if request_data.is_empty() {
                return Err(WriteError::EmptyData);
            }
            if request_data.len() > 65535 {
                return Err(WriteError::DataTooLong { maximum: 65535, obtained: request_data.len() });
            }
            Ok((request_data.len() as u16).to_be_bytes())
        }

        match self {
            Data::NoData => {
                // case 1
                Ok(())
            },
            Data::RequestDataShort { request_data } => {
                // case 3S: [Lc] [Data]
                let length_byte = short_length(request_data)?;
                writer.write_all(&[length_byte])?;
                writer.write_all(request_data)?;
                Ok(())
            },
            Data::RequestDataExtended { request_data } => {
                // case 3E: [0x00] [LcMSB] [LcLSB] [Data]
                let length_bytes = extended_length(request_data)?;
                writer.write_all(&[0x00, length_bytes[0], length_bytes[1]])?;
                writer.write_all(request_data)?;
                Ok(())
            },
            Data::ResponseDataShort { response_data_length } => {
                // case 2S: [Le]
                writer.write_all(&[*response_data_length])?;
                Ok(())
            },
            Data::ResponseDataExtended { response_data_length } => {
                // case 2E: [0x00] [LeMSB] [LeLSB]
                let length_bytes = response_data_length.to_be_bytes();
                writer.write_all(&[0x00, length_bytes[0], length_bytes[1]])?;
                Ok(())
            },
            Data::BothDataShort { request_data, response_data_length } => {
                // case 4S: [Lc] [Data] [Le]
                let length_byte = short_length(request_data)?;
                writer.write_all(&[length_byte])?;
                writer.write_all(request_data)?;
                writer.write_all(&[*response_data_length])?;
                Ok(())
            },
            Data::BothDataExtended { request_data, response_data_length } => {
                // case 4E: [0x00] [LcMSB] [LcLSB] [Data] [LeMSB] [LeLSB]
                let request_length_bytes = extended_length(request_data)?;
                writer.write_all(&[0x00, request_length_bytes[0], request_length_bytes[1]])?;
                writer.write_all(request_data)?;
                writer.write_all(&response_data_length.to_be_bytes())?;
                Ok(())
            },
        }
    }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CommandApdu {
    pub header: CommandHeader,
    pub data: Data,
}
impl CommandApdu {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::MissingHeader { length: bytes.len() });
        }
        let header = CommandHeader::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let data = Data::from_body(&bytes[4..])?;
        Ok(Self {
            header,
            data,
        })
    }

    /// The command data field; empty if the command carries none.
    pub fn request_data(&self) -> &[u8] {
        self.data.request_data().unwrap_or(&[])
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        self.header.write_bytes(writer)?;
        self.data.write_bytes(writer)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WriteError> {
        let mut ret = Vec::new();
        self.write_bytes(&mut ret)?;
        Ok(ret)
    }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResponseApdu {
    pub data: Vec<u8>,
    pub status: StatusWord,
}
impl ResponseApdu {
    pub fn new(data: Vec<u8>, status: StatusWord) -> Self {
        Self {
            data,
            status,
        }
    }

    /// A response consisting only of a status word.
    pub fn status_only(status: StatusWord) -> Self {
        Self::new(Vec::new(), status)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 2 {
            return None;
        }

        let data = bytes[..bytes.len() - 2].to_vec();
        let status = StatusWord::new(bytes[bytes.len() - 2], bytes[bytes.len() - 1]);
        Some(Self {
            data,
            status,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(self.data.len() + 2);
        ret.extend(&self.data);
        ret.extend(self.status.to_bytes());
        ret
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_parse_cases() {
        let case1 = CommandApdu::from_slice(&hex!("00 22 41 A4")).unwrap();
        assert_eq!(case1.data, Data::NoData);

        let case2s = CommandApdu::from_slice(&hex!("00 B0 00 00 00")).unwrap();
        assert_eq!(case2s.data.response_data_length(), Some(256));

        let case3s = CommandApdu::from_slice(&hex!("00 22 41 A4 03 84 01 01")).unwrap();
        assert_eq!(case3s.header.p1p2(), 0x41A4);
        assert_eq!(case3s.request_data(), &hex!("84 01 01"));

        let case4s = CommandApdu::from_slice(&hex!("00 86 00 00 02 7C 00 00")).unwrap();
        assert_eq!(case4s.request_data(), &hex!("7C 00"));
        assert_eq!(case4s.data.response_data_length(), Some(256));

        let case2e = CommandApdu::from_slice(&hex!("00 B0 00 00 00 01 00")).unwrap();
        assert_eq!(case2e.data.response_data_length(), Some(256));

        let case3e = CommandApdu::from_slice(&hex!("00 86 00 00 00 00 02 7C 00")).unwrap();
        assert_eq!(case3e.request_data(), &hex!("7C 00"));
        assert_eq!(case3e.data.response_data_length(), None);

        let case4e = CommandApdu::from_slice(&hex!("00 86 00 00 00 00 02 7C 00 00 00")).unwrap();
        assert_eq!(case4e.request_data(), &hex!("7C 00"));
        assert_eq!(case4e.data.response_data_length(), Some(65536));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(CommandApdu::from_slice(&hex!("00 22 41")), Err(ParseError::MissingHeader { length: 3 }));
        assert!(CommandApdu::from_slice(&hex!("00 22 41 A4 05 01 02")).is_err());
        assert!(CommandApdu::from_slice(&hex!("00 22 41 A4 02 01 02 03 04")).is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let command = CommandApdu {
            header: CommandHeader::new(0x00, 0x22, 0x41, 0xA4),
            data: Data::RequestDataShort { request_data: hex!("80 0A 04 00 7F 00 07 02 02 03 02 02").to_vec() },
        };
        let bytes = command.to_bytes().unwrap();
        assert_eq!(bytes, hex!("00 22 41 A4 0C 80 0A 04 00 7F 00 07 02 02 03 02 02"));
        assert_eq!(CommandApdu::from_slice(&bytes).unwrap(), command);
    }

    #[test]
    fn test_response_bytes() {
        let response = ResponseApdu::new(hex!("7C 00").to_vec(), StatusWord::SUCCESS);
        assert_eq!(response.to_bytes(), hex!("7C 00 90 00"));
        assert_eq!(ResponseApdu::from_slice(&response.to_bytes()), Some(response));
        assert_eq!(ResponseApdu::status_only(StatusWord::WRONG_DATA).to_bytes(), hex!("6A 80"));
    }

    #[test]
    fn test_body_selection() {
        assert_eq!(Data::new(Vec::new(), None), Some(Data::NoData));
        assert_eq!(Data::new(Vec::new(), Some(256)), Some(Data::ResponseDataShort { response_data_length: 0 }));
        assert_eq!(Data::new(Vec::new(), Some(257)), Some(Data::ResponseDataExtended { response_data_length: 257 }));
        assert_eq!(
            Data::new(vec![0x01], Some(65536)),
            Some(Data::BothDataExtended { request_data: vec![0x01], response_data_length: 0 }),
        );
        assert_eq!(
            Data::new(vec![0xAA; 300], None),
            Some(Data::RequestDataExtended { request_data: vec![0xAA; 300] }),
        );
        assert_eq!(Data::new(Vec::new(), Some(65537)), None);
    }
}

//! Status words (the `SW1 SW2` trailer of a response APDU).


use std::fmt;


#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}
impl StatusWord {
    /// Normal processing.
    pub const SUCCESS: Self = Self::new(0x90, 0x00);

    /// Security status not satisfied.
    pub const SECURITY_STATUS_NOT_SATISFIED: Self = Self::new(0x69, 0x82);

    /// Reference data not usable.
    pub const REFERENCE_DATA_NOT_USABLE: Self = Self::new(0x69, 0x84);

    /// Conditions of use not satisfied.
    pub const CONDITIONS_OF_USE_NOT_SATISFIED: Self = Self::new(0x69, 0x85);

    /// Incorrect parameters in the command data field.
    pub const WRONG_DATA: Self = Self::new(0x6A, 0x80);

    /// Referenced data or reference data not found.
    pub const REFERENCE_NOT_FOUND: Self = Self::new(0x6A, 0x88);

    pub const INSTRUCTION_NOT_SUPPORTED: Self = Self::new(0x6D, 0x00);

    /// No precise diagnosis.
    pub const NO_PRECISE_DIAGNOSIS: Self = Self::new(0x6F, 0xFF);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self {
            sw1,
            sw2,
        }
    }

    pub const fn from_word(word: u16) -> Self {
        let bytes = word.to_be_bytes();
        Self::new(bytes[0], bytes[1])
    }

    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    pub const fn to_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Whether this status word reports normal processing.
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }
}
impl fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusWord {} sw1: 0x{:02X}, sw2: 0x{:02X} {}", '{', self.sw1, self.sw2, '}')
    }
}
impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.to_word())
    }
}

//! Image settings selected by dedicated command opcodes

use std::fmt;

/// Gamma correction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Gamma {
    #[default]
    One,
    Point7,
    Point45,
}

impl Gamma {
    /// Opcode that selects this gamma
    pub fn command_code(self) -> u8 {
        match self {
            Self::One => 0x8E,
            Self::Point7 => 0x8A,
            Self::Point45 => 0x8C,
        }
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::One => "1.0",
            Self::Point7 => "0.7",
            Self::Point45 => "0.45",
        };
        f.write_str(value)
    }
}

/// Sensor shutter mode
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Shutter {
    Rolling,
    #[default]
    Global,
}

impl Shutter {
    /// Opcode that selects this shutter mode
    pub fn command_code(self) -> u8 {
        match self {
            Self::Global => 0x36,
            Self::Rolling => 0x38,
        }
    }
}

impl fmt::Display for Shutter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rolling => f.write_str("rolling"),
            Self::Global => f.write_str("global"),
        }
    }
}

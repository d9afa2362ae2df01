//! Build identifiers

use std::fmt;

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_BUGFIX: u32 = 0;

/// Library version triple
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
}

/// Version of the capture core
pub fn version() -> Version {
    Version {
        major: VERSION_MAJOR,
        minor: VERSION_MINOR,
        bugfix: VERSION_BUGFIX,
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
    }
}

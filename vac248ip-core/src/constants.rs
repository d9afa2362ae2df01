//! Protocol constants

/// Size of an image-data datagram
pub const DATA_PACKET_SIZE: usize = 1472;

/// Size of a camera config datagram
pub const CONFIG_PACKET_SIZE: usize = 48;

/// Size of an outbound command datagram
pub const COMMAND_PACKET_SIZE: usize = 8;

/// Image-data header: frame number (1 byte) + pixel offset (3 bytes)
pub const DATA_HEADER_SIZE: usize = 4;

/// Pixel bytes carried by one image-data datagram
pub const PIXELS_PER_PACKET: usize = DATA_PACKET_SIZE - DATA_HEADER_SIZE;

/// One slot: kind marker followed by a full datagram payload
pub const SLOT_SIZE: usize = DATA_PACKET_SIZE + 1;

/// Frame number reserved for the (possibly overexposed) first frame
pub const SENTINEL_FRAME_NUMBER: u8 = 0;

/// Bit set on the data byte of a START command
pub const START_STREAM_FLAG: u8 = 0x80;

/// Default camera UDP port
pub const DEFAULT_PORT: u16 = 1024;

/// Lowest camera port accepted by the client
pub const MIN_PORT: u16 = 1023;

/// Consecutive unrecognized-length datagrams tolerated before aborting
pub const DEFAULT_MALFORMED_TOLERANCE: u32 = 100;

/// Default pacing (milliseconds)
pub mod timing {
    /// Pause after every command datagram
    pub const COMMAND_DELAY_MS: u64 = 20;

    /// Pause after the final STOP before draining
    pub const SETTLE_DELAY_MS: u64 = 20;

    /// Pause before draining stale datagrams
    pub const DRAIN_DELAY_MS: u64 = 100;

    /// Readability poll timeout inside the receive loop
    pub const POLL_TIMEOUT_MS: u64 = 1000;

    /// Pause after the STOP sent while opening a camera
    pub const OPEN_DELAY_MS: u64 = 200;
}

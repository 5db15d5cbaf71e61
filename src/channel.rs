//! Module for logical communication channels with an ECU
//!
//! Currently, the following channel types are defined:
//! * [PayloadChannel] - Basic payload channel, all channels inherit this trait
//! * [IsoTPChannel] - IsoTP (ISO15765) channel
//!
//! The pair of CAN IDs a channel talks on is described by [EcuBinding]

use serde::{Deserialize, Serialize};

/// Communication channel result
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Highest 11bit CAN ID
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Highest 29bit CAN ID
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

#[derive(Debug, thiserror::Error)]
/// Error produced by a communication channel
pub enum ChannelError {
    /// Underlying IO Error with channel
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// Timeout when writing data to the channel
    #[error("timeout writing to channel")]
    WriteTimeout,
    /// Timeout when reading from the channel
    #[error("timeout reading from channel")]
    ReadTimeout,
    /// The channel's Rx buffer is empty. Only applies when read timeout is 0
    #[error("channel's Receive buffer is empty")]
    BufferEmpty,
    /// The channels Tx buffer is full
    #[error("channel's Transmit buffer is full")]
    BufferFull,
    /// Unsupported channel request
    #[error("unsupported channel request")]
    UnsupportedRequest,
    /// The interface is not open
    #[error("channel's interface is not open")]
    InterfaceNotOpen,
    /// Underlying API error with hardware
    #[error("underlying {api_name} API error ({code}): {desc}")]
    APIError {
        /// Name of the API EG: 'socketCAN'
        api_name: String,
        /// Internal API error code
        code: u8,
        /// API error description
        desc: String,
    },
}

impl ChannelError {
    /// Returns true if the error only means nothing has arrived yet
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::BufferEmpty)
    }
}

/// Base trait for interfacing with an ECU.
/// This trait allows you to write or read whole payloads from an ECUs interface
pub trait PayloadChannel: Send + Sync {
    /// This function opens the interface.
    /// It is ONLY called after set_ids and any other configuration function
    fn open(&mut self) -> ChannelResult<()>;

    /// Closes and destroys the channel
    fn close(&mut self) -> ChannelResult<()>;

    /// Configures the diagnostic channel with specific IDs for configuring the diagnostic server
    ///
    /// ## Parameters
    /// * send - Send ID (ECU will listen for data with this ID)
    /// * recv - Receiving ID (ECU will send data with this ID)
    fn set_ids(&mut self, send: u32, recv: u32) -> ChannelResult<()>;

    /// Attempts to read a payload from the channel.
    ///
    /// ## Parameters
    /// * timeout_ms - Timeout for reading bytes. If a value of 0 is used, it instructs the channel to immediately
    ///   return with whatever was in its receiving buffer
    fn read_bytes(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>>;

    /// Attempts to write a payload to the channel
    ///
    /// ## Parameters
    /// * buffer - The buffer of bytes to write to the channel
    /// * timeout_ms - Timeout for writing bytes. If a value of 0 is used, it tells the channel to write without checking if
    ///   data was actually written.
    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()>;

    /// Tells the channel to clear its Rx buffer
    fn clear_rx_buffer(&mut self) -> ChannelResult<()>;

    /// Tells the channel to clear its Tx buffer
    fn clear_tx_buffer(&mut self) -> ChannelResult<()>;
}

/// Extended trait for [PayloadChannel] when utilizing ISO-TP to send data to the ECU
pub trait IsoTPChannel: PayloadChannel {
    /// Sets the ISO-TP specific configuration for the Channel
    ///
    /// ## Parameters
    /// * The configuration of the ISO-TP Channel
    fn set_iso_tp_cfg(&mut self, cfg: IsoTPSettings) -> ChannelResult<()>;
}

/// ISO-TP configuration options
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoTPSettings {
    /// Block size
    pub block_size: u8,
    /// Minimum separation time between CAN Frames (In milliseconds)
    pub st_min: u8,
    /// Extended ISO-TP addressing (Tx, Rx)
    pub extended_addresses: Option<(u8, u8)>,
    /// Byte to pad transmitted frames with. None disables Tx padding
    pub tx_padding: Option<u8>,
    /// Byte the ECU pads its frames with. None disables Rx padding checks
    pub rx_padding: Option<u8>,
    /// Does the CAN Network support extended addressing (29bit) or standard addressing (11bit)
    pub can_use_ext_addr: bool,
}

impl Default for IsoTPSettings {
    fn default() -> Self {
        Self {
            block_size: 8,
            st_min: 0,
            extended_addresses: None,
            tx_padding: Some(0x55),
            rx_padding: Some(0xAA),
            can_use_ext_addr: false,
        }
    }
}

/// The CAN ID pair a diagnostic session talks to an ECU on
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EcuBinding {
    /// ECU Send ID
    pub send_id: u32,
    /// ECU Receive ID
    pub recv_id: u32,
}

impl EcuBinding {
    /// Creates a new binding
    pub const fn new(send_id: u32, recv_id: u32) -> Self {
        Self { send_id, recv_id }
    }

    /// Returns true if both IDs fit the addressing mode
    pub fn is_valid(&self, extended: bool) -> bool {
        let max = if extended {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        self.send_id <= max && self.recv_id <= max
    }
}

impl Default for EcuBinding {
    /// Functional OBD request ID and the first ECU's response ID
    fn default() -> Self {
        Self::new(0x7DF, 0x7E8)
    }
}

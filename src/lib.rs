#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    clippy::uninlined_format_args
)]

//! A crate for talking Unified diagnostic services (UDS - ISO14229) to ECUs over ISO-TP (ISO15765-2),
//! where every request and response is described by a named catalog rather than raw bytes.
//!
//! ## Catalog
//!
//! The [catalog::Catalog] is a typed tree of services, each holding the sub-identifiers
//! (data identifiers, session levels, routine IDs, negative response codes...) known for that service.
//! Entries can carry an interpretation [catalog::Formula] which turns the raw data tail of a response
//! into a human readable value, and request entries can declare packed parameters which are
//! bit-shifted into the sub-identifier when the request is built.
//!
//! A built in catalog is available through [catalog::standard_catalog], and further catalogs can be loaded
//! from JSON with [catalog::Catalog::from_json].
//!
//! ## Transactions
//!
//! A request is encoded by [uds::encode], sent over an [channel::IsoTPChannel], and the response is awaited
//! by [uds::Transaction]. ECUs which reply with 'Request correctly received - response pending' (NRC 0x78)
//! extend the deadline, and each of those replies is surfaced to the caller as an `info` [uds::Response].
//! The final frame is decoded by [uds::decode], which searches the catalog for the longest matching
//! sub-identifier.
//!
//! [session::UdsSession] ties all of this together for a single ECU binding.
//!
//! ## Hardware support
//!
//! ### SocketCAN (Linux only)
//! With the `socketcan` feature enabled, [hardware::socketcan::SocketCanIsoTPChannel] uses the kernel's
//! ISO-TP sockets for communication.
//!
//! ### Simulation
//! [hardware::simulation::SimulationIsoTpChannel] replays scripted ECU responses, and is used for testing.

use catalog::CatalogError;
use channel::ChannelError;

pub mod catalog;
pub mod channel;
pub mod config;
pub mod ecu;
pub mod hardware;
pub mod helpers;
pub mod invocation;
pub mod session;
pub mod uds;

/// Diagnostic server result
pub type DiagServerResult<T> = Result<T, DiagError>;

#[derive(Debug, thiserror::Error)]
/// Diagnostic client error
pub enum DiagError {
    /// Service name is not present in the catalog
    #[error("Could not find service '{0}' in the catalog")]
    ServiceNotFound(String),
    /// Parameter name is not present under the service
    #[error("Could not find parameter '{parameter}' of service '{service}' in the catalog")]
    ParameterNotFound {
        /// Service which was searched
        service: String,
        /// Parameter that was requested
        parameter: String,
    },
    /// A packed parameter required by the request was not supplied
    #[error("Parameter '{parameter}' requires field '{field}', but it was not supplied")]
    MissingField {
        /// Parameter being encoded
        parameter: String,
        /// Name of the missing field
        field: String,
    },
    /// A supplied field could not be encoded
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        /// Name of the field
        field: String,
        /// Why the field was rejected
        reason: String,
    },
    /// Encoded request is not a whole number of bytes, or otherwise not valid hex
    #[error("Request payload '{0}' is not a valid byte string")]
    InvalidPayload(String),
    /// CAN ID pair cannot be used with the channel's addressing mode
    #[error("Invalid ECU binding. Send ID 0x{send_id:04X}, Receive ID 0x{recv_id:04X}")]
    InvalidBinding {
        /// Send ID
        send_id: u32,
        /// Receive ID
        recv_id: u32,
    },
    /// Session has not been bound to an ECU yet
    #[error("Session is not bound to an ECU")]
    NotBound,
    /// ECU did not respond before the deadline
    #[error("No response received for SID {sid} and PID {pid}")]
    NoResponse {
        /// Request service ID (hex)
        sid: String,
        /// Request sub-identifier (hex)
        pid: String,
    },
    /// ECU responded, but the response is not described by the catalog
    #[error("Response to SID {sid} could not be resolved against the catalog: {payload}")]
    UnresolvedResponse {
        /// Request service ID (hex)
        sid: String,
        /// Raw response payload (hex)
        payload: String,
    },
    /// Invocation message could not be understood
    #[error("Malformed invocation: {0}")]
    MalformedInvocation(String),
    /// Catalog could not be built
    #[error("Catalog error")]
    Catalog(
        #[from]
        #[source]
        CatalogError,
    ),
    /// Error with underlying communication channel
    #[error("Diagnostic server hardware channel error")]
    ChannelError(
        #[from]
        #[source]
        ChannelError,
    ),
}

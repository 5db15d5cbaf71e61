//! Matches ECU responses against the catalog

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    DiagError,
    catalog::{Catalog, MAX_RESPONSE_PID_LEN},
    helpers,
};

use super::{NEGATIVE_RESPONSE_SID, ResponseClass, classify};

/// Service name reported when the response SID is not in the catalog
pub const UNKNOWN_SERVICE: &str = "unknown UDS service";
/// Parameter name reported when no sub-identifier matched
pub const UNKNOWN_PARAMETER: &str = "unknown UDS parameter/level";
/// Parameter name of a response pending notification
pub const RESPONSE_PENDING: &str = "Request correctly received - response pending";

/// Kind of result record
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResponseKind {
    /// A decoded ECU response
    Uds,
    /// An intermediate notification (EG: response pending)
    Info,
    /// The request failed
    Error,
}

/// A decoded response, shaped the way it is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Record kind
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    /// Response service ID (hex)
    #[serde(rename = "SID")]
    pub sid: Option<String>,
    /// Service name, or [UNKNOWN_SERVICE]
    pub service: String,
    /// Matched sub-identifier (hex)
    #[serde(rename = "PID")]
    pub pid: Option<String>,
    /// Parameter name, or [UNKNOWN_PARAMETER]
    pub parameter: String,
    /// Data following the sub-identifier (hex)
    pub data: Option<String>,
    /// Description of the matched entry
    pub description: Option<String>,
    /// Data run through the entry's interpretation rule
    pub interpretation: Option<String>,
    /// Unit of the interpretation
    pub unit: Option<String>,
    /// Error message, only set on [ResponseKind::Error] records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn unresolved(kind: ResponseKind) -> Self {
        Self {
            kind,
            sid: None,
            service: UNKNOWN_SERVICE.to_string(),
            pid: None,
            parameter: UNKNOWN_PARAMETER.to_string(),
            data: None,
            description: None,
            interpretation: None,
            unit: None,
            error: None,
        }
    }

    /// Notification that the ECU asked for more time
    pub fn info_pending(frame: &[u8]) -> Self {
        Self {
            sid: Some(helpers::byte_hex(NEGATIVE_RESPONSE_SID)),
            service: "Negative Response".to_string(),
            pid: frame.get(1..).map(helpers::to_hex),
            parameter: RESPONSE_PENDING.to_string(),
            ..Self::unresolved(ResponseKind::Info)
        }
    }

    /// Error record for a failed request
    pub fn from_error(err: &DiagError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::unresolved(ResponseKind::Error)
        }
    }

    /// Returns true if both the service and the sub-identifier were found in the catalog
    pub fn is_resolved(&self) -> bool {
        self.service != UNKNOWN_SERVICE && self.pid.is_some()
    }

    /// Returns true if the ECU rejected the request
    pub fn is_negative(&self) -> bool {
        self.sid.as_deref() == Some("7f")
    }

    /// Serializes the record to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Decodes a response payload.
///
/// The first byte is resolved to a response service. The sub-identifier is then found by trying
/// candidate lengths of 1, 2, 3... bytes (up to [MAX_RESPONSE_PID_LEN] hex characters), and the
/// first exact match wins. Whatever follows the sub-identifier is the data. If the service or
/// sub-identifier cannot be found, the unmatched remainder of the payload is kept as data
pub fn decode(catalog: &Catalog, request_sid: u8, payload: &[u8]) -> Response {
    let mut response = Response::unresolved(ResponseKind::Uds);
    let Some((&response_sid, _)) = payload.split_first() else {
        return response;
    };
    let text = helpers::to_hex(payload);
    let sid_hex = helpers::byte_hex(response_sid);
    response.sid = Some(sid_hex.clone());
    let rest = &text[2..];

    let service = match classify(request_sid, response_sid) {
        ResponseClass::Unexpected => {
            log::warn!(
                "Response SID 0x{response_sid:02X} does not belong to request SID 0x{request_sid:02X}"
            );
            None
        }
        _ => catalog.resolve_service_by_id(&sid_hex),
    };
    let Some(service) = service else {
        response.data = Some(text);
        return response;
    };
    response.service = service.name.clone();

    let matched = (2..=MAX_RESPONSE_PID_LEN.min(rest.len()))
        .step_by(2)
        .find_map(|len| {
            service
                .resolve_parameter_by_id(&rest[..len])
                .map(|entry| (len, entry))
        });
    let Some((len, entry)) = matched else {
        log::debug!("No sub-identifier of '{}' matches {}", service.name, rest);
        response.data = Some(rest.to_string());
        return response;
    };

    let data = &rest[len..];
    response.pid = Some(entry.id.clone());
    response.parameter = entry.name.clone();
    response.data = Some(data.to_string());
    response.description = entry.description.clone();
    response.unit = entry.unit.clone();
    if let Some(formula) = &entry.interpretation {
        match formula.apply(data) {
            Ok(value) => response.interpretation = Some(value),
            Err(e) => log::warn!("Could not interpret '{}' for {}: {e}", data, entry.name),
        }
    }
    response
}

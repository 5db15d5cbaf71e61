//! Builds request payloads from catalog names

use std::collections::HashMap;

use crate::{
    DiagError, DiagServerResult,
    catalog::{Catalog, ParameterSpec, ParameterType},
    helpers,
};

/// Values for the packed parameters of a request, by field name
pub type Fields = HashMap<String, String>;

/// A symbolic request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UdsRequest {
    /// Service name, EG: `ReadDataByIdentifier`
    pub service: String,
    /// Parameter name, EG: `ReadOdometerValueFromBus`
    pub parameter: String,
    /// Packed parameter values
    pub fields: Fields,
}

impl UdsRequest {
    /// Creates a request with no fields
    pub fn new(service: &str, parameter: &str) -> Self {
        Self {
            service: service.to_string(),
            parameter: parameter.to_string(),
            fields: Fields::new(),
        }
    }

    /// Adds a field value
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

/// A request resolved against the catalog, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    /// Service name
    pub service: String,
    /// Parameter name
    pub parameter: String,
    /// Service ID
    pub sid: u8,
    /// Service ID (hex)
    pub sid_hex: String,
    /// Sub-identifier including packed parameters (hex)
    pub pid_hex: String,
}

impl EncodedRequest {
    /// The bytes to put on the wire (service ID followed by the sub-identifier)
    pub fn payload(&self) -> DiagServerResult<Vec<u8>> {
        let text = format!("{}{}", self.sid_hex, self.pid_hex);
        hex::decode(&text).map_err(|_| DiagError::InvalidPayload(text))
    }
}

/// Packs an already encoded field into a sub-identifier.
///
/// The field occupies the bits between the end of `pid` and `bit_offset`, which is the same as
/// `(pid << (bit_offset - 4 * len(pid))) + field`. Returns `None` if the field does not fit
pub fn pack_field(pid: &str, bit_offset: u32, encoded: &str) -> Option<String> {
    let width = (bit_offset as usize / 4).checked_sub(pid.len())?;
    if !helpers::is_hex(encoded) {
        return None;
    }
    let field = helpers::pad_hex(&helpers::normalize_hex(encoded), width)?;
    Some(format!("{}{field}", helpers::normalize_hex(pid)))
}

fn encode_field(param: &ParameterSpec, value: &str) -> DiagServerResult<String> {
    if param.kind == ParameterType::Integer && value.trim().parse::<i128>().is_err() {
        return Err(DiagError::InvalidField {
            field: param.name.clone(),
            reason: format!("'{value}' is not an integer"),
        });
    }
    param
        .formula
        .apply(value)
        .map_err(|e| DiagError::InvalidField {
            field: param.name.clone(),
            reason: e.to_string(),
        })
}

/// Resolves a request against the catalog.
///
/// Packed parameters are applied in declaration order. Nothing is sent, so
/// all lookup and field errors happen before any transmission
pub fn encode(catalog: &Catalog, request: &UdsRequest) -> DiagServerResult<EncodedRequest> {
    let service = catalog.lookup_service(&request.service)?;
    let entry = catalog.lookup_parameter(&request.service, &request.parameter)?;
    let sid = service
        .sid()
        .ok_or_else(|| DiagError::InvalidPayload(service.id.clone()))?;

    let mut pid = entry.id.clone();
    for param in &entry.packed_parameters {
        let value = request
            .fields
            .get(&param.name)
            .ok_or_else(|| DiagError::MissingField {
                parameter: entry.name.clone(),
                field: param.name.clone(),
            })?;
        let encoded = encode_field(param, value)?;
        log::debug!(
            "Packing {}={} ({}) into {} at bit {}",
            param.name,
            value,
            encoded,
            pid,
            param.bit_offset
        );
        pid = pack_field(&pid, param.bit_offset, &encoded).ok_or_else(|| {
            DiagError::InvalidField {
                field: param.name.clone(),
                reason: format!(
                    "value '{value}' does not fit before bit {}",
                    param.bit_offset
                ),
            }
        })?;
    }

    Ok(EncodedRequest {
        service: service.name.clone(),
        parameter: entry.name.clone(),
        sid,
        sid_hex: service.id.clone(),
        pid_hex: pid,
    })
}

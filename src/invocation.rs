//! Message surface of a diagnostic client
//!
//! Operations are advertised as [ServiceAdvertisement] records, callers invoke them with a JSON
//! message on `<prefix>/<service>/<parameter>`, and results are published as [Response] records
//! to the address named in the invocation's `response` field. The transport carrying these
//! messages is provided through [ResultSink].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    DiagError, DiagServerResult,
    catalog::{Catalog, ParameterType},
    channel::IsoTPChannel,
    session::UdsSession,
    uds::{Fields, Response, UdsRequest},
};

/// Field of every invocation naming where results are published
pub const RESPONSE_FIELD: &str = "response";
/// Description advertised for entries without one
pub const NO_DESCRIPTION: &str = "No description available.";

/// A parameter a caller may supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisedParameter {
    /// Default value
    pub default: String,
    /// Human readable description
    pub description: String,
    /// Value type
    #[serde(rename = "type")]
    pub kind: ParameterType,
}

/// Announcement of a single invocable operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAdvertisement {
    /// Address to invoke the operation on
    pub request: String,
    /// Human readable description
    pub description: String,
    /// Accepted parameters, always including [RESPONSE_FIELD]
    pub parameters: BTreeMap<String, AdvertisedParameter>,
}

impl ServiceAdvertisement {
    /// Builds the advertisement of a catalog entry
    pub fn new(
        catalog: &Catalog,
        prefix: &str,
        default_response: &str,
        service: &str,
        parameter: &str,
    ) -> DiagServerResult<Self> {
        let entry = catalog.lookup_parameter(service, parameter)?;
        let mut parameters = BTreeMap::new();
        parameters.insert(
            RESPONSE_FIELD.to_string(),
            AdvertisedParameter {
                default: default_response.to_string(),
                description: "Topic to publish response to.".to_string(),
                kind: ParameterType::String,
            },
        );
        for p in &entry.packed_parameters {
            parameters.insert(
                p.name.clone(),
                AdvertisedParameter {
                    default: p.default.clone(),
                    description: p
                        .description
                        .clone()
                        .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                    kind: p.kind,
                },
            );
        }
        Ok(Self {
            request: format!("{prefix}/{service}/{parameter}"),
            description: entry
                .description
                .clone()
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            parameters,
        })
    }
}

/// A parsed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Service name
    pub service: String,
    /// Parameter name
    pub parameter: String,
    /// Where results are published
    pub response: String,
    /// Remaining fields
    pub fields: Fields,
}

impl Invocation {
    /// Parses an invocation. The last two segments of `topic` name the service and
    /// parameter, and `payload` is a JSON object holding [RESPONSE_FIELD] and the field values.
    /// Numbers and booleans are accepted as field values and used in their text form
    pub fn parse(topic: &str, payload: &[u8]) -> DiagServerResult<Self> {
        let mut segments = topic.rsplit('/');
        let (Some(parameter), Some(service)) = (segments.next(), segments.next()) else {
            return Err(DiagError::MalformedInvocation(format!(
                "topic '{topic}' does not name a service and parameter"
            )));
        };
        if service.is_empty() || parameter.is_empty() {
            return Err(DiagError::MalformedInvocation(format!(
                "topic '{topic}' does not name a service and parameter"
            )));
        }

        let message: serde_json::Map<String, Value> =
            serde_json::from_slice(payload).map_err(|e| {
                DiagError::MalformedInvocation(format!("payload is not a JSON object: {e}"))
            })?;

        let mut response = None;
        let mut fields = Fields::new();
        for (key, value) in message {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(DiagError::MalformedInvocation(format!(
                        "field '{key}' has unsupported value {other}"
                    )));
                }
            };
            if key == RESPONSE_FIELD {
                response = Some(text);
            } else {
                fields.insert(key, text);
            }
        }
        let response = response.ok_or_else(|| {
            DiagError::MalformedInvocation(format!("missing '{RESPONSE_FIELD}' field"))
        })?;

        Ok(Self {
            service: service.to_string(),
            parameter: parameter.to_string(),
            response,
            fields,
        })
    }

    /// The request this invocation asks for
    pub fn to_request(&self) -> UdsRequest {
        UdsRequest {
            service: self.service.clone(),
            parameter: self.parameter.clone(),
            fields: self.fields.clone(),
        }
    }
}

/// Destination of result records
pub trait ResultSink {
    /// Publishes a record to an address
    fn publish(&mut self, address: &str, record: &Response) -> DiagServerResult<()>;
}

/// Collects records in memory
impl ResultSink for Vec<(String, Response)> {
    fn publish(&mut self, address: &str, record: &Response) -> DiagServerResult<()> {
        self.push((address.to_string(), record.clone()));
        Ok(())
    }
}

/// Runs an invocation on a session.
///
/// Every pending notification is published as it arrives, followed by the final record.
/// A failed request is published as an [crate::uds::ResponseKind::Error] record rather than
/// returned, so only publishing failures are reported as errors. The final record is returned
pub fn handle_invocation<C: IsoTPChannel>(
    session: &mut UdsSession<'_, C>,
    invocation: &Invocation,
    sink: &mut dyn ResultSink,
) -> DiagServerResult<Response> {
    let address = invocation.response.as_str();
    let result = session.execute_with(&invocation.to_request(), &mut |info: &Response| {
        if let Err(e) = sink.publish(address, info) {
            log::warn!("Could not publish pending notification to {address}: {e}");
        }
    });
    let record = match result {
        Ok(response) => {
            log::info!("response: {} / {}", response.service, response.parameter);
            response
        }
        Err(e) => {
            log::warn!(
                "{}/{} failed: {e}",
                invocation.service,
                invocation.parameter
            );
            Response::from_error(&e)
        }
    };
    sink.publish(address, &record)?;
    Ok(record)
}

//! The diagnostic catalog
//!
//! A [Catalog] holds every [ServiceNode] the client knows about. Request services
//! (EG: `ReadDataByIdentifier`) are looked up by name when building a request, and
//! response services (EG: `Read Data By Identifier Positive Response`) are looked up by
//! their response ID when decoding what the ECU sent back.
//!
//! Catalogs are validated once when they are built, and are read-only afterwards.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{DiagError, DiagServerResult, helpers};

mod formula;
mod standard;

pub use formula::*;

/// Longest sub-identifier (in hex characters) the response search will try
pub const MAX_RESPONSE_PID_LEN: usize = 14;

#[derive(Debug, thiserror::Error)]
/// Error produced when a catalog fails validation
pub enum CatalogError {
    /// Service ID is not a single hex byte
    #[error("Service '{service}' has an invalid ID '{id}'")]
    InvalidServiceId {
        /// Service name
        service: String,
        /// Offending ID
        id: String,
    },
    /// Two services share a name or ID
    #[error("Service '{0}' is defined more than once")]
    DuplicateService(String),
    /// Entry ID is not a whole number of hex bytes, or too long to be matched
    #[error("Entry '{entry}' of service '{service}' has an invalid ID '{id}'")]
    InvalidEntryId {
        /// Service name
        service: String,
        /// Entry name
        entry: String,
        /// Offending ID
        id: String,
    },
    /// Two entries of a service share a name or ID
    #[error("Entry '{entry}' is defined more than once in service '{service}'")]
    DuplicateEntry {
        /// Service name
        service: String,
        /// Entry name
        entry: String,
    },
    /// A response entry would never be matched because a shorter sibling ID matches first
    #[error("Entry '{longer}' of service '{service}' is shadowed by '{shorter}'")]
    ShadowedEntry {
        /// Service name
        service: String,
        /// Entry with the shorter ID
        shorter: String,
        /// Entry that can never be matched
        longer: String,
    },
    /// Packed parameters on a service that is never sent
    #[error("Entry '{entry}' of response service '{service}' cannot have packed parameters")]
    PackedOnResponse {
        /// Service name
        service: String,
        /// Entry name
        entry: String,
    },
    /// Packed parameter position is not on a nibble boundary past the sub-identifier
    #[error("Parameter '{parameter}' of entry '{entry}' has an invalid bit offset {bit_offset}")]
    InvalidBitOffset {
        /// Entry name
        entry: String,
        /// Parameter name
        parameter: String,
        /// Offending offset
        bit_offset: u32,
    },
    /// Catalog file could not be parsed
    #[error("Catalog file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// What role a service plays on the wire
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceKind {
    /// Sent by the tester
    Request,
    /// Sent by the ECU on success. Its ID is the request ID + 0x40
    PositiveResponse,
    /// Sent by the ECU on failure (0x7F). Entry IDs are the rejected SID followed by the NRC
    NegativeResponse,
}

/// Type of a packed request parameter
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParameterType {
    /// Decimal integer
    Integer,
    /// Free text
    String,
}

/// A field bit-packed into the sub-identifier of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Field name, as supplied by the caller
    pub name: String,
    /// Advertised default value
    pub default: String,
    /// Human readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Field type
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Bit position of the end of the field, counted from the start of the sub-identifier
    pub bit_offset: u32,
    /// Converts the supplied value into hex digits
    #[serde(default)]
    pub formula: Formula,
}

/// A sub-identifier of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Name of the entry
    pub name: String,
    /// Hex ID of the entry
    pub id: String,
    /// Human readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Unit of the interpreted value
    #[serde(default)]
    pub unit: Option<String>,
    /// Rule for rendering response data
    #[serde(default)]
    pub interpretation: Option<Formula>,
    /// Fields packed into the sub-identifier, in the order they are applied
    #[serde(default)]
    pub packed_parameters: Vec<ParameterSpec>,
}

impl CatalogEntry {
    /// Creates an entry with no description, unit or interpretation
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            description: None,
            unit: None,
            interpretation: None,
            packed_parameters: Vec::new(),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Sets the unit
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    /// Sets the interpretation rule
    pub fn with_interpretation(mut self, formula: Formula) -> Self {
        self.interpretation = Some(formula);
        self
    }

    /// Adds a packed parameter
    pub fn with_packed(mut self, param: ParameterSpec) -> Self {
        self.packed_parameters.push(param);
        self
    }
}

/// A service and its entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    /// Service name
    pub name: String,
    /// Hex ID of the service (1 byte)
    pub id: String,
    /// Role of the service
    pub kind: ServiceKind,
    /// Known sub-identifiers
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

impl ServiceNode {
    /// Creates a service
    pub fn new(name: &str, id: &str, kind: ServiceKind, entries: Vec<CatalogEntry>) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            kind,
            entries,
        }
    }

    /// Returns true if this service is sent by the tester
    pub fn is_request(&self) -> bool {
        self.kind == ServiceKind::Request
    }

    /// The service ID as a byte
    pub fn sid(&self) -> Option<u8> {
        helpers::parse_byte(&self.id)
    }

    /// Finds an entry by its name
    pub fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Finds an entry by its exact ID (case insensitive)
    pub fn resolve_parameter_by_id(&self, pid: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id.eq_ignore_ascii_case(pid))
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    services: Vec<ServiceNode>,
}

/// The validated service tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    services: Vec<ServiceNode>,
}

impl Catalog {
    /// Validates and builds a catalog. IDs are stored in lowercase
    pub fn new(mut services: Vec<ServiceNode>) -> Result<Self, CatalogError> {
        for service in services.iter_mut() {
            service.id = helpers::normalize_hex(&service.id);
            for entry in service.entries.iter_mut() {
                entry.id = helpers::normalize_hex(&entry.id);
            }
        }
        for (idx, service) in services.iter().enumerate() {
            if service.sid().is_none() {
                return Err(CatalogError::InvalidServiceId {
                    service: service.name.clone(),
                    id: service.id.clone(),
                });
            }
            if services[..idx]
                .iter()
                .any(|s| s.name == service.name || s.id == service.id)
            {
                return Err(CatalogError::DuplicateService(service.name.clone()));
            }
            validate_entries(service)?;
        }
        Ok(Self { services })
    }

    /// Parses and validates a catalog from JSON.
    ///
    /// The document is an object with a `services` array, each service having
    /// `name`, `id`, `kind` and `entries`
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        Self::new(file.services)
    }

    /// Serializes the catalog in the format read by [Catalog::from_json]
    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All services, in declaration order
    pub fn services(&self) -> impl Iterator<Item = &ServiceNode> {
        self.services.iter()
    }

    /// Finds a service by name
    pub fn lookup_service(&self, name: &str) -> DiagServerResult<&ServiceNode> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DiagError::ServiceNotFound(name.to_string()))
    }

    /// Finds an entry by service and entry name
    pub fn lookup_parameter(
        &self,
        service_name: &str,
        parameter_name: &str,
    ) -> DiagServerResult<&CatalogEntry> {
        self.lookup_service(service_name)?
            .entry(parameter_name)
            .ok_or_else(|| DiagError::ParameterNotFound {
                service: service_name.to_string(),
                parameter: parameter_name.to_string(),
            })
    }

    /// Finds a service by its hex ID (case insensitive)
    pub fn resolve_service_by_id(&self, sid: &str) -> Option<&ServiceNode> {
        self.services.iter().find(|s| s.id.eq_ignore_ascii_case(sid))
    }

    /// Finds an entry by service ID and entry ID. Both must match exactly (case insensitive)
    pub fn find_by_ids(&self, sid: &str, pid: &str) -> Option<&CatalogEntry> {
        self.resolve_service_by_id(sid)?.resolve_parameter_by_id(pid)
    }
}

fn validate_entries(service: &ServiceNode) -> Result<(), CatalogError> {
    for (idx, entry) in service.entries.iter().enumerate() {
        let id_ok = helpers::is_hex(&entry.id)
            && entry.id.len() % 2 == 0
            && (service.is_request() || entry.id.len() <= MAX_RESPONSE_PID_LEN);
        if !id_ok {
            return Err(CatalogError::InvalidEntryId {
                service: service.name.clone(),
                entry: entry.name.clone(),
                id: entry.id.clone(),
            });
        }
        for other in &service.entries[..idx] {
            if other.name == entry.name || other.id == entry.id {
                return Err(CatalogError::DuplicateEntry {
                    service: service.name.clone(),
                    entry: entry.name.clone(),
                });
            }
            if !service.is_request() {
                let (shorter, longer) = if other.id.len() < entry.id.len() {
                    (other, entry)
                } else {
                    (entry, other)
                };
                if longer.id.starts_with(&shorter.id) {
                    return Err(CatalogError::ShadowedEntry {
                        service: service.name.clone(),
                        shorter: shorter.name.clone(),
                        longer: longer.name.clone(),
                    });
                }
            }
        }
        if !entry.packed_parameters.is_empty() && !service.is_request() {
            return Err(CatalogError::PackedOnResponse {
                service: service.name.clone(),
                entry: entry.name.clone(),
            });
        }
        for param in &entry.packed_parameters {
            if param.bit_offset % 4 != 0 || param.bit_offset as usize <= entry.id.len() * 4 {
                return Err(CatalogError::InvalidBitOffset {
                    entry: entry.name.clone(),
                    parameter: param.name.clone(),
                    bit_offset: param.bit_offset,
                });
            }
        }
    }
    Ok(())
}

static STANDARD_CATALOG: OnceLock<Catalog> = OnceLock::new();

/// The built in catalog, built and validated on first use
pub fn standard_catalog() -> Result<&'static Catalog, CatalogError> {
    if let Some(catalog) = STANDARD_CATALOG.get() {
        return Ok(catalog);
    }
    let built = standard::build()?;
    Ok(STANDARD_CATALOG.get_or_init(|| built))
}

#[cfg(test)]
mod test {
    use super::*;

    fn tiny() -> Vec<ServiceNode> {
        vec![
            ServiceNode::new(
                "ReadDataByIdentifier",
                "22",
                ServiceKind::Request,
                vec![CatalogEntry::new("Odometer", "010C")],
            ),
            ServiceNode::new(
                "Read Data By Identifier Positive Response",
                "62",
                ServiceKind::PositiveResponse,
                vec![CatalogEntry::new("Odometer Response", "010C")],
            ),
        ]
    }

    #[test]
    fn lookups() {
        let catalog = Catalog::new(tiny()).unwrap();
        assert_eq!(catalog.lookup_service("ReadDataByIdentifier").unwrap().id, "22");
        assert!(matches!(
            catalog.lookup_service("Nope"),
            Err(DiagError::ServiceNotFound(_))
        ));
        assert!(matches!(
            catalog.lookup_parameter("ReadDataByIdentifier", "Nope"),
            Err(DiagError::ParameterNotFound { .. })
        ));
        assert_eq!(catalog.find_by_ids("62", "010C").unwrap().name, "Odometer Response");
        assert_eq!(catalog.find_by_ids("62", "010c").unwrap().id, "010c");
        assert!(catalog.find_by_ids("62", "01").is_none());
        assert!(catalog.resolve_service_by_id("63").is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut services = tiny();
        services[1].entries.push(CatalogEntry::new("Again", "010c"));
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::DuplicateEntry { .. })
        ));

        let mut services = tiny();
        services.push(ServiceNode::new("Other", "22", ServiceKind::Request, vec![]));
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::DuplicateService(_))
        ));
    }

    #[test]
    fn rejects_shadowed_response_ids() {
        let mut services = tiny();
        services[1].entries.push(CatalogEntry::new("Short", "01"));
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::ShadowedEntry { .. })
        ));
    }

    #[test]
    fn rejects_bad_ids() {
        let mut services = tiny();
        services[0].id = "222".into();
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::InvalidServiceId { .. })
        ));

        let mut services = tiny();
        services[1].entries.push(CatalogEntry::new("Odd", "F1A"));
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::InvalidEntryId { .. })
        ));

        let mut services = tiny();
        services[1]
            .entries
            .push(CatalogEntry::new("Long", "0102030405060708"));
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::InvalidEntryId { .. })
        ));
    }

    #[test]
    fn rejects_bad_packing() {
        let param = ParameterSpec {
            name: "value".into(),
            default: "0".into(),
            description: None,
            kind: ParameterType::Integer,
            bit_offset: 14,
            formula: Formula::IntToHexString,
        };
        let mut services = tiny();
        services[0].entries[0] = CatalogEntry::new("Odometer", "010C").with_packed(param.clone());
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::InvalidBitOffset { .. })
        ));

        let mut services = tiny();
        services[1].entries[0] = CatalogEntry::new("Odometer Response", "010C")
            .with_packed(ParameterSpec {
                bit_offset: 24,
                ..param
            });
        assert!(matches!(
            Catalog::new(services),
            Err(CatalogError::PackedOnResponse { .. })
        ));
    }

    #[test]
    fn json_round_trip() {
        let catalog = Catalog::new(tiny()).unwrap();
        let text = catalog.to_json().unwrap();
        assert_eq!(Catalog::from_json(&text).unwrap(), catalog);
    }

    #[test]
    fn json_catalog() {
        let text = r#"{
            "services": [
                {"name": "TesterPresent", "id": "3E", "kind": "request",
                 "entries": [{"name": "Request", "id": "00"}]},
                {"name": "Tester Present Response", "id": "7E", "kind": "positive_response",
                 "entries": [{"name": "Positive Response", "id": "00"}]}
            ]
        }"#;
        let catalog = Catalog::from_json(text).unwrap();
        assert_eq!(catalog.find_by_ids("7e", "00").unwrap().name, "Positive Response");
        assert!(matches!(
            Catalog::from_json("{\"services\": 1}"),
            Err(CatalogError::Json(_))
        ));
    }

    #[test]
    fn standard_catalog_is_valid() {
        let catalog = standard_catalog().unwrap();
        assert!(catalog.services().count() >= 11);
        // Returns the same instance on repeated calls
        assert!(std::ptr::eq(catalog, standard_catalog().unwrap()));
    }
}

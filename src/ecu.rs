//! Profiles of the ECUs this client is set up to talk to
//!
//! A profile names the ECU's message prefix, the CAN IDs it listens and responds on,
//! and which catalog operations are advertised for it.

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    DiagError, DiagServerResult,
    catalog::Catalog,
    channel::EcuBinding,
    invocation::{Invocation, ServiceAdvertisement},
};

const DISPLAY_OPERATIONS: &[(&str, &str)] = &[
    ("DiagnosticSessionControl", "Default"),
    ("DiagnosticSessionControl", "Programming"),
    ("DiagnosticSessionControl", "Extended"),
    ("TesterPresent", "Request"),
    ("ReadDataByIdentifier", "ReadOdometerValueFromBus"),
    ("ReadDataByIdentifier", "ActiveDiagnosticInformation"),
    ("ReadDataByIdentifier", "ElectronicControlUnitSerialNumber"),
    ("AsynchronousRoutine", "StartDisplayPatternBlack"),
    ("AsynchronousRoutine", "StartDisplayPatternWhite"),
    ("AsynchronousRoutine", "StartDisplayPatternRed"),
    ("AsynchronousRoutine", "StartDisplayPatternGreen"),
    ("AsynchronousRoutine", "StartDisplayPatternBlue"),
    ("AsynchronousRoutine", "StopDisplayPattern"),
    ("AsynchronousRoutine", "RequestResults"),
    ("InputOutputControlByIdentifier", "SetDisplayIntensity"),
    ("InputOutputControlByIdentifier", "ResetDisplayIntensity"),
];

const TAILGATE_OPERATIONS: &[(&str, &str)] = &[
    ("TesterPresent", "Request"),
    ("ReadDataByIdentifier", "ReadOdometerValueFromBus"),
    ("ReadDataByIdentifier", "ReadAnalogDigitalConverterRawValues"),
    ("ReadDataByIdentifier", "InputOutputStates"),
    ("ReadDataByIdentifier", "ActiveDiagnosticInformation"),
    ("ReadDataByIdentifier", "ElectronicControlUnitSerialNumber"),
    ("ReadDataByIdentifier", "VehicleIdentificationNumberOriginal"),
    ("ReadDataByIdentifier", "VehicleIdentificationNumberCurrent"),
    ("InputOutputControlByIdentifier", "OpenTrunk"),
    ("InputOutputControlByIdentifier", "BrakeTrunk"),
];

/// ECUs with a built in profile
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum KnownEcu {
    /// Instrument display
    #[strum(serialize = "disp")]
    InstrumentDisplay,
    /// Power tailgate control module
    #[strum(serialize = "ptcm")]
    TailgateControl,
}

impl KnownEcu {
    /// The ECU's profile
    pub fn profile(self) -> EcuProfile {
        match self {
            KnownEcu::InstrumentDisplay => EcuProfile {
                ecu: self,
                binding: EcuBinding::new(0x063B, 0x05BB),
                operations: DISPLAY_OPERATIONS,
            },
            KnownEcu::TailgateControl => EcuProfile {
                ecu: self,
                binding: EcuBinding::new(0x0615, 0x0595),
                operations: TAILGATE_OPERATIONS,
            },
        }
    }

    /// Profiles of every known ECU
    pub fn all_profiles() -> Vec<EcuProfile> {
        Self::iter().map(Self::profile).collect()
    }
}

/// How to reach an ECU and what it offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcuProfile {
    /// Which ECU this is
    pub ecu: KnownEcu,
    /// CAN IDs of the ECU
    pub binding: EcuBinding,
    /// Advertised (service, parameter) pairs
    pub operations: &'static [(&'static str, &'static str)],
}

impl EcuProfile {
    /// Message prefix of the ECU, EG: `uds/disp`
    pub fn prefix(&self) -> String {
        format!("uds/{}", self.ecu)
    }

    /// Where results go if the caller does not say otherwise
    pub fn default_response_address(&self) -> String {
        format!("tester1/{}", self.ecu)
    }

    /// Advertisements of every operation of this ECU
    pub fn advertisements(&self, catalog: &Catalog) -> DiagServerResult<Vec<ServiceAdvertisement>> {
        let prefix = self.prefix();
        let response = self.default_response_address();
        self.operations
            .iter()
            .map(|(service, parameter)| {
                ServiceAdvertisement::new(catalog, &prefix, &response, service, parameter)
            })
            .collect()
    }

    /// Returns true if the topic is addressed to this ECU
    pub fn accepts(&self, topic: &str) -> bool {
        topic
            .strip_prefix(&self.prefix())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Parses an invocation addressed to this ECU
    pub fn parse_invocation(&self, topic: &str, payload: &[u8]) -> DiagServerResult<Invocation> {
        if !self.accepts(topic) {
            return Err(DiagError::MalformedInvocation(format!(
                "topic '{topic}' is not addressed to {}",
                self.prefix()
            )));
        }
        Invocation::parse(topic, payload)
    }
}

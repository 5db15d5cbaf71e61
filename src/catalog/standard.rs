//! Built in catalog data

use super::{
    Catalog, CatalogEntry, CatalogError, Formula, ParameterSpec, ParameterType, ServiceKind,
    ServiceNode,
};

const TIMING_DESCRIPTION: &str =
    "with Timing Parameters \"P2_CAN_ECU_max\" and \"P2s_CAN_ECU_max\"";

fn session_response(name: &str, id: &str, session: &str) -> CatalogEntry {
    CatalogEntry::new(name, id)
        .with_description(&format!("Changed to {session} Session {TIMING_DESCRIPTION}"))
        .with_interpretation(Formula::SplitTimingPair)
}

fn nrc(name: &str, id: &str) -> CatalogEntry {
    CatalogEntry::new(name, id)
}

fn requests() -> Vec<ServiceNode> {
    vec![
        ServiceNode::new(
            "DiagnosticSessionControl",
            "10",
            ServiceKind::Request,
            vec![
                CatalogEntry::new("Default", "01").with_description(
                    "Change to Default Session, standard session if no other session is running.",
                ),
                CatalogEntry::new("Programming", "02").with_description(
                    "Change to Programming Session specific functionality required for ECU flashing.",
                ),
                CatalogEntry::new("Extended", "03").with_description(
                    "Change to Extended Session to get access to all supported diagnostic services.",
                ),
            ],
        ),
        ServiceNode::new(
            "ReadDataByIdentifier",
            "22",
            ServiceKind::Request,
            vec![
                CatalogEntry::new("ReadOdometerValueFromBus", "010C")
                    .with_description("Represents the current ODO-Information of the vehicle bus."),
                CatalogEntry::new("ReadAnalogDigitalConverterRawValues", "0301")
                    .with_description("Read the current raw values of the CT ADC."),
                CatalogEntry::new("InputOutputStates", "0310").with_description(
                    "With this service, the current values of the signals present at the ECU inputs and outputs as well as internal states can be queried.",
                ),
                CatalogEntry::new("ActiveDiagnosticInformation", "F100").with_description(
                    "This Data Identifier provides the diagnostic information used by the tester to uniquely identify the respective diagnostic data set assigned to a specific ECU version.",
                ),
                CatalogEntry::new("ElectronicControlUnitSerialNumber", "F18C").with_description(
                    "This record shall be used to uniquely identify a specific ECU hardware to be able to identify ECUs of a specific batch.",
                ),
                CatalogEntry::new("VehicleIdentificationNumberOriginal", "F190").with_description(
                    "This data record reflects the Vehicle Identification Number of the vehicle an ECU was originally installed.",
                ),
                CatalogEntry::new("VehicleIdentificationNumberCurrent", "F1A0").with_description(
                    "This data record reflects the Vehicle Identification Number of the vehicle an ECU is currently installed.",
                ),
            ],
        ),
        ServiceNode::new(
            "InputOutputControlByIdentifier",
            "2F",
            ServiceKind::Request,
            vec![
                CatalogEntry::new("OpenTrunk", "D0010302")
                    .with_description("Starts the trunk motor to open the trunk lid."),
                CatalogEntry::new("BrakeTrunk", "D0010304")
                    .with_description("Brakes the trunk motor."),
                CatalogEntry::new("SetDisplayIntensity", "D01303")
                    .with_description("Sets the display intensity.")
                    .with_packed(ParameterSpec {
                        name: "intensity".into(),
                        default: "50".into(),
                        description: Some("Percentage of maximum intensity possible.".into()),
                        kind: ParameterType::Integer,
                        bit_offset: 32,
                        formula: Formula::IntToHexString,
                    }),
                CatalogEntry::new("ResetDisplayIntensity", "D01301")
                    .with_description("Resets the display intensity to the default value."),
            ],
        ),
        ServiceNode::new(
            "AsynchronousRoutine",
            "31",
            ServiceKind::Request,
            vec![
                CatalogEntry::new("StartDisplayPatternBlack", "0103B104"),
                CatalogEntry::new("StartDisplayPatternWhite", "0103B105"),
                CatalogEntry::new("StartDisplayPatternRed", "0103B106"),
                CatalogEntry::new("StartDisplayPatternGreen", "0103B107"),
                CatalogEntry::new("StartDisplayPatternBlue", "0103B108"),
                CatalogEntry::new("StopDisplayPattern", "0203B1"),
                CatalogEntry::new("RequestResults", "0303B1"),
            ],
        ),
        ServiceNode::new(
            "TesterPresent",
            "3E",
            ServiceKind::Request,
            vec![CatalogEntry::new("Request", "00").with_description(
                "Check if ECU is reachable (keep ECU awake/connection alive).",
            )],
        ),
    ]
}

fn responses() -> Vec<ServiceNode> {
    vec![
        ServiceNode::new(
            "Diagnostic Session Control Positive Response",
            "50",
            ServiceKind::PositiveResponse,
            vec![
                session_response("Default Session Response", "01", "Default"),
                session_response("Programming Session Response", "02", "Programming"),
                session_response("Extended Session Response", "03", "Extended"),
            ],
        ),
        ServiceNode::new(
            "Read Data By Identifier Positive Response",
            "62",
            ServiceKind::PositiveResponse,
            vec![
                CatalogEntry::new("Read Odometer Response", "010C")
                    .with_interpretation(Formula::ScaleDecimal {
                        factor: 1,
                        decimals: 1,
                    })
                    .with_unit("km"),
                CatalogEntry::new("Read Analog Digital Converter Raw Values Response", "0301")
                    .with_interpretation(Formula::Identity),
                CatalogEntry::new("Input Output States Response", "0310")
                    .with_interpretation(Formula::Identity),
                CatalogEntry::new("Active Diagnostic Information Response", "F100")
                    .with_interpretation(Formula::lookup([
                        ("00080201", "Default Session"),
                        ("00080202", "Programming Session"),
                        ("00080203", "Extended Session"),
                    ])),
                CatalogEntry::new("Electronic Control Unit Serial Number Response", "F18C")
                    .with_interpretation(Formula::Identity),
                CatalogEntry::new("Vehicle Identification Number Original Response", "F190")
                    .with_interpretation(Formula::HexBytesToUtf8),
                CatalogEntry::new("Vehicle Identification Number Current Response", "F1A0")
                    .with_interpretation(Formula::HexBytesToUtf8),
            ],
        ),
        ServiceNode::new(
            "Input Output Control By Identifier Positive Response",
            "6F",
            ServiceKind::PositiveResponse,
            vec![
                CatalogEntry::new("Open Trunk Response", "D0010302"),
                CatalogEntry::new("Brake Trunk Response", "D0010304"),
                CatalogEntry::new("Display Control Reset Intensity Response", "D01301")
                    .with_description(
                        "Display intensity reset to default (returns last set intensity, not the default value).",
                    )
                    .with_interpretation(Formula::ScaleDecimal {
                        factor: 1,
                        decimals: 0,
                    })
                    .with_unit("%"),
                CatalogEntry::new("Display Control Set Intensity Response", "D01303")
                    .with_description("New intensity set.")
                    .with_interpretation(Formula::ScaleDecimal {
                        factor: 1,
                        decimals: 0,
                    })
                    .with_unit("%"),
            ],
        ),
        ServiceNode::new(
            "Asynchronous Routine Positive Response",
            "71",
            ServiceKind::PositiveResponse,
            vec![
                CatalogEntry::new("Start Display Pattern Response", "0103B101"),
                CatalogEntry::new("Stop Display Pattern Response", "0203B100"),
                CatalogEntry::new("Routine successfully completed", "0303B100"),
                CatalogEntry::new("Routine in progress", "0303B101"),
            ],
        ),
        ServiceNode::new(
            "Tester Present Response",
            "7E",
            ServiceKind::PositiveResponse,
            vec![CatalogEntry::new("Positive Response", "00")],
        ),
        ServiceNode::new(
            "Negative Response",
            "7F",
            ServiceKind::NegativeResponse,
            vec![
                nrc(
                    "Incorrect message length or invalid format (by ReadDataByIdentifier)",
                    "2213",
                ),
                nrc("Conditions not correct (by ReadDataByIdentifier)", "2222"),
                nrc("Request out of range (by ReadDataByIdentifier)", "2231"),
                nrc(
                    "Incorrect message length or invalid format (by InputOutputControlByIdentifier)",
                    "2F13",
                ),
                nrc(
                    "Service not supported in (currently) active session (by AsynchronousRoutine)",
                    "317F",
                ),
            ],
        ),
    ]
}

pub(super) fn build() -> Result<Catalog, CatalogError> {
    let mut services = requests();
    services.extend(responses());
    Catalog::new(services)
}

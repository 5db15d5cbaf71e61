use std::collections::VecDeque;

use uds_client::{
    DiagError,
    catalog::standard_catalog,
    channel::{
        ChannelError, ChannelResult, EcuBinding, IsoTPChannel, IsoTPSettings, PayloadChannel,
    },
    ecu::KnownEcu,
    invocation::handle_invocation,
    session::UdsSession,
    uds::{Fields, Response, ResponseKind, TransactionSettings},
};

/// ECU simulation. The callback returns every frame the ECU sends back for a request
pub struct UdsSimEcu {
    on_data_callback: fn(&[u8]) -> Vec<Vec<u8>>,
    out_buffer: VecDeque<Vec<u8>>,
}

impl UdsSimEcu {
    pub fn new(on_data_callback: fn(&[u8]) -> Vec<Vec<u8>>) -> Self {
        Self {
            on_data_callback,
            out_buffer: VecDeque::new(),
        }
    }
}

impl IsoTPChannel for UdsSimEcu {
    fn set_iso_tp_cfg(&mut self, cfg: IsoTPSettings) -> ChannelResult<()> {
        println!(
            "IsoTPChannel: set_iso_tp_cfg Called. BS: {}, ST-MIN: {}",
            cfg.block_size, cfg.st_min
        );
        Ok(())
    }
}

impl PayloadChannel for UdsSimEcu {
    fn open(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn set_ids(&mut self, send: u32, recv: u32) -> ChannelResult<()> {
        println!("PayloadChannel: set_ids Called. send: {send:04X}, recv: {recv:04X}");
        Ok(())
    }

    fn read_bytes(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        match self.out_buffer.pop_front() {
            Some(send) => {
                println!("-- Sending {send:02X?} back to diag client");
                Ok(send)
            }
            None => {
                std::thread::sleep(std::time::Duration::from_millis(timeout_ms as u64));
                Err(ChannelError::ReadTimeout)
            }
        }
    }

    fn write_bytes(&mut self, buffer: &[u8], timeout_ms: u32) -> ChannelResult<()> {
        println!("PayloadChannel: write_bytes Called. Tx: {buffer:02X?}, timeout_ms: {timeout_ms}");
        self.out_buffer.extend((self.on_data_callback)(buffer));
        Ok(())
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        self.out_buffer.clear();
        Ok(())
    }

    fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

fn display_ecu(buf: &[u8]) -> Vec<Vec<u8>> {
    match buf {
        [0x22, 0x01, 0x0C] => vec![vec![0x62, 0x01, 0x0C, 0x00, 0x00, 0x27, 0x10]],
        [0x22, 0xF1, 0x90] => vec![vec![0x7F, 0x22, 0x31]],
        [0x22, 0xF1, 0x8C] => vec![vec![0x7F, 0x22, 0x10]],
        [0x2F, 0xD0, 0x13, 0x03, value] => vec![
            vec![0x7F, 0x2F, 0x78],
            vec![0x7F, 0x2F, 0x78],
            vec![0x6F, 0xD0, 0x13, 0x03, *value],
        ],
        [0x3E, 0x00] => Vec::new(),
        _ => vec![vec![0x7F, buf[0], 0x11]],
    }
}

fn test_settings() -> TransactionSettings {
    TransactionSettings {
        response_timeout_ms: 300,
        poll_interval_ms: 20,
        write_timeout_ms: 100,
    }
}

fn display_session() -> UdsSession<'static, UdsSimEcu> {
    let mut session = UdsSession::new(
        standard_catalog().unwrap(),
        UdsSimEcu::new(display_ecu),
        IsoTPSettings::default(),
        test_settings(),
    );
    session
        .bind(KnownEcu::InstrumentDisplay.profile().binding)
        .unwrap();
    session
}

#[test]
pub fn test_read_odometer() {
    env_logger::try_init().ok();
    let mut session = display_session();
    let resp = session
        .read_data_by_identifier("ReadOdometerValueFromBus")
        .unwrap();
    assert_eq!(resp.kind, ResponseKind::Uds);
    assert_eq!(resp.service, "Read Data By Identifier Positive Response");
    assert_eq!(resp.parameter, "Read Odometer Response");
    assert_eq!(resp.data.as_deref(), Some("00002710"));
    assert_eq!(resp.interpretation.as_deref(), Some("1000.0"));
    assert_eq!(resp.unit.as_deref(), Some("km"));
    assert_eq!(session.binding(), Some(EcuBinding::new(0x63B, 0x5BB)));
}

#[test]
pub fn test_response_pending_invocation() {
    env_logger::try_init().ok();
    let mut session = display_session();
    let profile = KnownEcu::InstrumentDisplay.profile();
    let invocation = profile
        .parse_invocation(
            "uds/disp/InputOutputControlByIdentifier/SetDisplayIntensity",
            br#"{"response": "tester1/disp", "intensity": "50"}"#,
        )
        .unwrap();

    let mut published: Vec<(String, Response)> = Vec::new();
    let last = handle_invocation(&mut session, &invocation, &mut published).unwrap();

    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|(addr, _)| addr == "tester1/disp"));
    for (_, info) in &published[..2] {
        assert_eq!(info.kind, ResponseKind::Info);
        assert_eq!(info.pid.as_deref(), Some("2f78"));
    }
    let record: serde_json::Value =
        serde_json::from_str(&published[0].1.to_json().unwrap()).unwrap();
    assert_eq!(record["type"], "info");
    assert_eq!(record["SID"], "7f");
    assert_eq!(record["PID"], "2f78");
    assert_eq!(record["data"], serde_json::Value::Null);
    assert!(record.get("error").is_none());
    assert_eq!(published[2].1, last);
    assert_eq!(last.kind, ResponseKind::Uds);
    assert_eq!(last.parameter, "Display Control Set Intensity Response");
    assert_eq!(last.interpretation.as_deref(), Some("50"));
    assert_eq!(last.unit.as_deref(), Some("%"));
}

#[test]
pub fn test_no_response() {
    env_logger::try_init().ok();
    let mut session = display_session();
    let started = std::time::Instant::now();
    let res = session.tester_present();
    assert!(matches!(res, Err(DiagError::NoResponse { .. })));
    assert!(started.elapsed().as_millis() >= 300);

    // Through the invocation surface, the failure becomes an error record
    let invocation = KnownEcu::InstrumentDisplay
        .profile()
        .parse_invocation("uds/disp/TesterPresent/Request", br#"{"response": "t"}"#)
        .unwrap();
    let mut published: Vec<(String, Response)> = Vec::new();
    let record = handle_invocation(&mut session, &invocation, &mut published).unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(record.kind, ResponseKind::Error);
    assert!(record.error.is_some());
    assert_eq!(record.data, None);
}

#[test]
pub fn test_negative_response() {
    env_logger::try_init().ok();
    let mut session = display_session();
    let resp = session
        .read_data_by_identifier("VehicleIdentificationNumberOriginal")
        .unwrap();
    assert!(resp.is_negative());
    assert_eq!(resp.service, "Negative Response");
    assert_eq!(resp.pid.as_deref(), Some("2231"));
    assert_eq!(resp.parameter, "Request out of range (by ReadDataByIdentifier)");

    // 0x10 (general reject) is not in the catalog
    match session.read_data_by_identifier("ElectronicControlUnitSerialNumber") {
        Err(DiagError::UnresolvedResponse { payload, .. }) => assert_eq!(payload, "7f2210"),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
pub fn test_lookup_errors() {
    env_logger::try_init().ok();
    let mut session = display_session();
    assert!(matches!(
        session.execute("ReadDataByIdentifier", "NotAnIdentifier", &Fields::new()),
        Err(DiagError::ParameterNotFound { .. })
    ));
    assert!(matches!(
        session.control_output("SetDisplayIntensity", &Fields::new()),
        Err(DiagError::MissingField { .. })
    ));
}

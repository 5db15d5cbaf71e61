//! Send / receive cycle of a single UDS request

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{
    DiagError, DiagServerResult,
    catalog::Catalog,
    channel::PayloadChannel,
};

use super::{EncodedRequest, Response, decode, is_response_pending};

/// Timing of a transaction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
    /// How long to wait for a response. Restarted every time the ECU reports 'response pending'
    pub response_timeout_ms: u32,
    /// Longest single read from the channel
    pub poll_interval_ms: u32,
    /// Timeout for writing the request
    pub write_timeout_ms: u32,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            response_timeout_ms: 7000,
            poll_interval_ms: 50,
            write_timeout_ms: 1000,
        }
    }
}

/// Where a transaction is in its cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionState {
    /// Nothing sent yet
    Idle,
    /// Request written to the channel
    Sent,
    /// Waiting for the ECU's response
    Waiting,
    /// Deadline passed without a final response
    TimedOut,
    /// Final response received
    Done,
}

/// A single request and the wait for its response
#[derive(Debug)]
pub struct Transaction<'a> {
    request: &'a EncodedRequest,
    settings: TransactionSettings,
    state: TransactionState,
    deadline: Instant,
    pending_notifications: u32,
}

impl<'a> Transaction<'a> {
    /// Creates an idle transaction
    pub fn new(request: &'a EncodedRequest, settings: TransactionSettings) -> Self {
        Self {
            request,
            settings,
            state: TransactionState::Idle,
            deadline: Instant::now(),
            pending_notifications: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of 'response pending' replies received so far
    pub fn pending_notifications(&self) -> u32 {
        self.pending_notifications
    }

    fn reset_deadline(&mut self) {
        self.deadline =
            Instant::now() + Duration::from_millis(self.settings.response_timeout_ms as u64);
    }

    fn no_response(&self) -> DiagError {
        DiagError::NoResponse {
            sid: self.request.sid_hex.clone(),
            pid: self.request.pid_hex.clone(),
        }
    }

    /// Sends the request and waits for the final response.
    ///
    /// Every 'response pending' reply is decoded into an [super::ResponseKind::Info] record,
    /// passed to `on_pending`, and restarts the deadline. The first other frame ends the
    /// transaction. It is returned if the catalog can resolve it, otherwise
    /// [DiagError::UnresolvedResponse] is returned
    pub fn run<C: PayloadChannel + ?Sized>(
        &mut self,
        catalog: &Catalog,
        channel: &mut C,
        on_pending: &mut dyn FnMut(&Response),
    ) -> DiagServerResult<Response> {
        let payload = self.request.payload()?;
        log::debug!("Sending req to ECU: {payload:02X?}");
        channel.clear_tx_buffer()?;
        channel.clear_rx_buffer()?;
        if let Err(e) = channel.write_bytes(&payload, self.settings.write_timeout_ms) {
            log::error!("Channel send error: {e}");
            return Err(e.into());
        }
        self.state = TransactionState::Sent;
        log::debug!("Sending OK, awaiting response from ECU");

        self.reset_deadline();
        self.state = TransactionState::Waiting;
        let sid = self.request.sid;
        loop {
            let now = Instant::now();
            if now >= self.deadline {
                self.state = TransactionState::TimedOut;
                log::warn!(
                    "No response received for SID {} and PID {}",
                    self.request.sid_hex,
                    self.request.pid_hex
                );
                return Err(self.no_response());
            }
            let remaining = (self.deadline - now).as_millis() as u32;
            let wait = self.settings.poll_interval_ms.min(remaining).max(1);
            let frame = match channel.read_bytes(wait) {
                Ok(frame) => frame,
                Err(e) if e.is_no_data() => continue,
                Err(e) => {
                    log::error!("Error reading from channel: {e}");
                    return Err(e.into());
                }
            };
            if frame.is_empty() {
                continue;
            }
            log::debug!("ECU Response: {frame:02X?}");
            if is_response_pending(&frame, sid) {
                log::debug!("ECU is busy, awaiting response");
                self.pending_notifications += 1;
                on_pending(&Response::info_pending(&frame));
                self.reset_deadline();
                continue;
            }
            self.state = TransactionState::Done;
            let response = decode(catalog, sid, &frame);
            if !response.is_resolved() {
                log::warn!("Could not resolve ECU response {frame:02X?}");
                return Err(DiagError::UnresolvedResponse {
                    sid: self.request.sid_hex.clone(),
                    payload: crate::helpers::to_hex(&frame),
                });
            }
            return Ok(response);
        }
    }
}

/// Shorthand for running a single [Transaction]
pub fn execute_transaction<C: PayloadChannel + ?Sized>(
    catalog: &Catalog,
    channel: &mut C,
    request: &EncodedRequest,
    settings: TransactionSettings,
    on_pending: &mut dyn FnMut(&Response),
) -> DiagServerResult<Response> {
    Transaction::new(request, settings).run(catalog, channel, on_pending)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        catalog::standard_catalog,
        channel::{ChannelError, ChannelResult},
        hardware::simulation::SimulationIsoTpChannel,
        uds::{ResponseKind, UdsRequest, encode},
    };
    use std::collections::VecDeque;

    /// ECU that answers on a fixed schedule, counted from when the request is written
    struct SlowEcu {
        schedule: VecDeque<(u64, Vec<u8>)>,
        sent_at: Option<Instant>,
    }

    impl SlowEcu {
        fn new(schedule: &[(u64, &[u8])]) -> Self {
            Self {
                schedule: schedule.iter().map(|(t, f)| (*t, f.to_vec())).collect(),
                sent_at: None,
            }
        }
    }

    impl PayloadChannel for SlowEcu {
        fn open(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn close(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn set_ids(&mut self, _send: u32, _recv: u32) -> ChannelResult<()> {
            Ok(())
        }

        fn read_bytes(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
            let (Some(sent_at), Some((due_ms, _))) = (self.sent_at, self.schedule.front()) else {
                std::thread::sleep(Duration::from_millis(timeout_ms as u64));
                return Err(ChannelError::ReadTimeout);
            };
            let due = sent_at + Duration::from_millis(*due_ms);
            let now = Instant::now();
            if due > now {
                let wait = (due - now).min(Duration::from_millis(timeout_ms as u64));
                std::thread::sleep(wait);
                if Instant::now() < due {
                    return Err(ChannelError::ReadTimeout);
                }
            }
            self.schedule
                .pop_front()
                .map(|(_, frame)| frame)
                .ok_or(ChannelError::BufferEmpty)
        }

        fn write_bytes(&mut self, _buffer: &[u8], _timeout_ms: u32) -> ChannelResult<()> {
            self.sent_at = Some(Instant::now());
            Ok(())
        }

        fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
            Ok(())
        }

        fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
            Ok(())
        }
    }

    fn short() -> TransactionSettings {
        TransactionSettings {
            response_timeout_ms: 200,
            poll_interval_ms: 20,
            write_timeout_ms: 100,
        }
    }

    #[test]
    fn tester_present() {
        env_logger::try_init().ok();
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        sim.add_response(&[0x3E, 0x00], &[0x7E, 0x00]);
        sim.open().unwrap();
        let req = encode(catalog, &UdsRequest::new("TesterPresent", "Request")).unwrap();
        let mut tx = Transaction::new(&req, short());
        assert_eq!(tx.state(), TransactionState::Idle);
        let resp = tx.run(catalog, &mut sim, &mut |_| {}).unwrap();
        assert_eq!(tx.state(), TransactionState::Done);
        assert_eq!(resp.service, "Tester Present Response");
        assert_eq!(resp.parameter, "Positive Response");
    }

    #[test]
    fn pending_restarts_deadline() {
        env_logger::try_init().ok();
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        sim.add_response_sequence(
            &[0x31, 0x03, 0x03, 0xB1],
            &[&[0x7F, 0x31, 0x78], &[0x71, 0x03, 0x03, 0xB1, 0x00]],
        );
        sim.open().unwrap();
        let req = encode(
            catalog,
            &UdsRequest::new("AsynchronousRoutine", "RequestResults"),
        )
        .unwrap();
        let mut infos = Vec::new();
        let mut tx = Transaction::new(&req, short());
        let resp = tx
            .run(catalog, &mut sim, &mut |r: &Response| infos.push(r.clone()))
            .unwrap();
        assert_eq!(tx.pending_notifications(), 1);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].pid.as_deref(), Some("3178"));
        assert_eq!(resp.parameter, "Routine successfully completed");
    }

    #[test]
    fn timeout() {
        env_logger::try_init().ok();
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        sim.open().unwrap();
        let req = encode(catalog, &UdsRequest::new("TesterPresent", "Request")).unwrap();
        let mut tx = Transaction::new(&req, short());
        let started = Instant::now();
        let res = tx.run(catalog, &mut sim, &mut |_| {});
        assert!(matches!(res, Err(DiagError::NoResponse { .. })));
        assert_eq!(tx.state(), TransactionState::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn unresolved() {
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        sim.add_response(&[0x22, 0x01, 0x0C], &[0x62, 0xAB, 0xCD, 0xEF]);
        sim.open().unwrap();
        let req = encode(
            catalog,
            &UdsRequest::new("ReadDataByIdentifier", "ReadOdometerValueFromBus"),
        )
        .unwrap();
        match execute_transaction(catalog, &mut sim, &req, short(), &mut |_| {}) {
            Err(DiagError::UnresolvedResponse { sid, payload }) => {
                assert_eq!(sid, "22");
                assert_eq!(payload, "62abcdef");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn closed_channel() {
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        let req = encode(catalog, &UdsRequest::new("TesterPresent", "Request")).unwrap();
        let res = execute_transaction(catalog, &mut sim, &req, short(), &mut |_| {});
        assert!(matches!(
            res,
            Err(DiagError::ChannelError(ChannelError::InterfaceNotOpen))
        ));
    }

    #[test]
    fn pending_extends_past_first_deadline() {
        env_logger::try_init().ok();
        let catalog = standard_catalog().unwrap();
        let mut ecu = SlowEcu::new(&[
            (150, &[0x7F, 0x31, 0x78]),
            (300, &[0x7F, 0x31, 0x78]),
            (450, &[0x7F, 0x31, 0x78]),
            (600, &[0x71, 0x03, 0x03, 0xB1, 0x00]),
        ]);
        let req = encode(
            catalog,
            &UdsRequest::new("AsynchronousRoutine", "RequestResults"),
        )
        .unwrap();
        let mut infos = 0;
        let mut tx = Transaction::new(&req, short());
        let started = Instant::now();
        let resp = tx
            .run(catalog, &mut ecu, &mut |r: &Response| {
                assert_eq!(r.kind, ResponseKind::Info);
                infos += 1;
            })
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert_eq!(infos, 3);
        assert_eq!(tx.pending_notifications(), 3);
        assert_eq!(tx.state(), TransactionState::Done);
        assert_eq!(resp.parameter, "Routine successfully completed");
    }

    #[test]
    fn pending_silence_times_out() {
        let catalog = standard_catalog().unwrap();
        let mut ecu = SlowEcu::new(&[
            (150, &[0x7F, 0x31, 0x78]),
            (500, &[0x71, 0x03, 0x03, 0xB1, 0x00]),
        ]);
        let req = encode(
            catalog,
            &UdsRequest::new("AsynchronousRoutine", "RequestResults"),
        )
        .unwrap();
        let mut tx = Transaction::new(&req, short());
        let res = tx.run(catalog, &mut ecu, &mut |_| {});
        assert!(matches!(res, Err(DiagError::NoResponse { .. })));
        assert_eq!(tx.pending_notifications(), 1);
    }

    #[test]
    fn stale_frames_are_dropped_before_sending() {
        let catalog = standard_catalog().unwrap();
        let mut sim = SimulationIsoTpChannel::new();
        sim.add_response(&[0x3E, 0x00], &[0x7E, 0x00]);
        sim.open().unwrap();
        sim.push_rx_frame(&[0x62, 0x01, 0x0C, 0x00, 0x00, 0x27, 0x10]);
        let req = encode(catalog, &UdsRequest::new("TesterPresent", "Request")).unwrap();
        let resp = execute_transaction(catalog, &mut sim, &req, short(), &mut |_| {}).unwrap();
        assert_eq!(resp.service, "Tester Present Response");
        assert_eq!(sim.written_payloads(), vec![vec![0x3E, 0x00]]);
    }
}

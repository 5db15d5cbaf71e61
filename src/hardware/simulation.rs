//! Simulation hardware for testing diagnostic sessions without a CAN bus
//!
//! Each request payload can be scripted with a sequence of response payloads, which are
//! queued for reading as soon as the request is written.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::channel::{
    ChannelError, ChannelResult, EcuBinding, IsoTPChannel, IsoTPSettings, PayloadChannel,
};

#[derive(Debug, Default)]
struct SimState {
    script: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    rx_queue: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    binding: Option<EcuBinding>,
    cfg: Option<IsoTPSettings>,
    open: bool,
}

/// Simulated ISO-TP channel.
///
/// Clones share the same state, so a test can keep a handle to inspect
/// what a session wrote after handing the channel over.
#[derive(Debug, Clone, Default)]
pub struct SimulationIsoTpChannel {
    state: Arc<RwLock<SimState>>,
}

impl SimulationIsoTpChannel {
    /// Creates a simulated channel with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SimState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SimState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Scripts a single response frame for a request
    pub fn add_response(&mut self, req: &[u8], resp: &[u8]) {
        self.add_response_sequence(req, &[resp]);
    }

    /// Scripts a sequence of response frames for a request. All of them are
    /// queued when the request is written
    pub fn add_response_sequence(&mut self, req: &[u8], frames: &[&[u8]]) {
        self.write_state()
            .script
            .insert(req.to_vec(), frames.iter().map(|f| f.to_vec()).collect());
    }

    /// Queues a frame as if the ECU sent it without being asked
    pub fn push_rx_frame(&mut self, frame: &[u8]) {
        self.write_state().rx_queue.push_back(frame.to_vec());
    }

    /// Every payload written to the channel, oldest first
    pub fn written_payloads(&self) -> Vec<Vec<u8>> {
        self.read_state().written.clone()
    }

    /// The binding last set by [PayloadChannel::set_ids]
    pub fn binding(&self) -> Option<EcuBinding> {
        self.read_state().binding
    }

    /// The ISO-TP configuration last applied
    pub fn iso_tp_cfg(&self) -> Option<IsoTPSettings> {
        self.read_state().cfg
    }

    /// Returns true while the channel is open
    pub fn is_open(&self) -> bool {
        self.read_state().open
    }
}

impl PayloadChannel for SimulationIsoTpChannel {
    fn open(&mut self) -> ChannelResult<()> {
        self.write_state().open = true;
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.write_state().open = false;
        Ok(())
    }

    fn set_ids(&mut self, send: u32, recv: u32) -> ChannelResult<()> {
        self.write_state().binding = Some(EcuBinding::new(send, recv));
        Ok(())
    }

    fn read_bytes(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        let mut state = self.write_state();
        if !state.open {
            return Err(ChannelError::InterfaceNotOpen);
        }
        if let Some(frame) = state.rx_queue.pop_front() {
            return Ok(frame);
        }
        drop(state);
        if timeout_ms == 0 {
            Err(ChannelError::BufferEmpty)
        } else {
            std::thread::sleep(Duration::from_millis(timeout_ms as u64));
            Err(ChannelError::ReadTimeout)
        }
    }

    fn write_bytes(&mut self, buffer: &[u8], _timeout_ms: u32) -> ChannelResult<()> {
        let mut state = self.write_state();
        if !state.open {
            return Err(ChannelError::InterfaceNotOpen);
        }
        state.written.push(buffer.to_vec());
        if let Some(frames) = state.script.get(buffer).cloned() {
            state.rx_queue.extend(frames);
        }
        Ok(())
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        self.write_state().rx_queue.clear();
        Ok(())
    }

    fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

impl IsoTPChannel for SimulationIsoTpChannel {
    fn set_iso_tp_cfg(&mut self, cfg: IsoTPSettings) -> ChannelResult<()> {
        self.write_state().cfg = Some(cfg);
        Ok(())
    }
}

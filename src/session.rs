//! Diagnostic session with a single ECU
//!
//! A [UdsSession] owns its channel. Only one request is in flight at a time, and
//! every call blocks until the ECU has answered or the deadline has passed.

use automotive_diag::uds::UdsCommand;

use crate::{
    DiagError, DiagServerResult,
    catalog::Catalog,
    channel::{EcuBinding, IsoTPChannel, IsoTPSettings},
    config::ClientConfig,
    uds::{Fields, Response, TransactionSettings, UdsRequest, encode, execute_transaction},
};

/// UDS diagnostic session
pub struct UdsSession<'a, C: IsoTPChannel> {
    catalog: &'a Catalog,
    channel: C,
    iso_tp: IsoTPSettings,
    settings: TransactionSettings,
    binding: Option<EcuBinding>,
    waiting_hook: Box<dyn FnMut(&Response)>,
}

impl<C: IsoTPChannel> std::fmt::Debug for UdsSession<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdsSession")
            .field("iso_tp", &self.iso_tp)
            .field("settings", &self.settings)
            .field("binding", &self.binding)
            .finish()
    }
}

impl<'a, C: IsoTPChannel> UdsSession<'a, C> {
    /// Creates an unbound session. Call [UdsSession::bind] before sending anything
    pub fn new(
        catalog: &'a Catalog,
        channel: C,
        iso_tp: IsoTPSettings,
        settings: TransactionSettings,
    ) -> Self {
        Self {
            catalog,
            channel,
            iso_tp,
            settings,
            binding: None,
            waiting_hook: Box::new(|_: &Response| {}),
        }
    }

    /// Creates a session from a client configuration and binds it to the configured ECU
    pub fn from_config(
        catalog: &'a Catalog,
        channel: C,
        config: &ClientConfig,
    ) -> DiagServerResult<Self> {
        let mut session = Self::new(catalog, channel, config.iso_tp, config.transaction);
        session.bind(config.binding)?;
        Ok(session)
    }

    /// Points the session at an ECU, reopening the channel with the new IDs
    pub fn bind(&mut self, binding: EcuBinding) -> DiagServerResult<()> {
        if !binding.is_valid(self.iso_tp.can_use_ext_addr) {
            return Err(DiagError::InvalidBinding {
                send_id: binding.send_id,
                recv_id: binding.recv_id,
            });
        }
        if self.binding.take().is_some() {
            self.channel.close()?;
        }
        log::info!(
            "Binding session to ECU. Send ID 0x{:04X}, Receive ID 0x{:04X}",
            binding.send_id,
            binding.recv_id
        );
        self.channel.set_iso_tp_cfg(self.iso_tp)?;
        self.channel.set_ids(binding.send_id, binding.recv_id)?;
        self.channel.open()?;
        self.binding = Some(binding);
        Ok(())
    }

    /// The current binding, if any
    pub fn binding(&self) -> Option<EcuBinding> {
        self.binding
    }

    /// The catalog requests are resolved against
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Transaction timing in use
    pub fn settings(&self) -> TransactionSettings {
        self.settings
    }

    /// Registers a hook that is called for every 'response pending' notification
    pub fn register_waiting_hook<F: FnMut(&Response) + 'static>(&mut self, hook: F) {
        self.waiting_hook = Box::new(hook)
    }

    /// Sends a request by name and waits for its response
    pub fn execute(
        &mut self,
        service: &str,
        parameter: &str,
        fields: &Fields,
    ) -> DiagServerResult<Response> {
        let request = UdsRequest {
            service: service.to_string(),
            parameter: parameter.to_string(),
            fields: fields.clone(),
        };
        let mut hook = std::mem::replace(&mut self.waiting_hook, Box::new(|_: &Response| {}));
        let res = self.execute_with(&request, &mut *hook);
        self.waiting_hook = hook;
        res
    }

    /// Sends a request, passing pending notifications to `on_pending` instead of the waiting hook
    pub fn execute_with(
        &mut self,
        request: &UdsRequest,
        on_pending: &mut dyn FnMut(&Response),
    ) -> DiagServerResult<Response> {
        if self.binding.is_none() {
            return Err(DiagError::NotBound);
        }
        let encoded = encode(self.catalog, request)?;
        log::info!(
            "Executing {}/{} (SID {}, PID {})",
            encoded.service,
            encoded.parameter,
            encoded.sid_hex,
            encoded.pid_hex
        );
        execute_transaction(
            self.catalog,
            &mut self.channel,
            &encoded,
            self.settings,
            on_pending,
        )
    }

    /// Sends a request to whichever catalog service has the command's SID
    pub fn execute_command(
        &mut self,
        cmd: UdsCommand,
        parameter: &str,
        fields: &Fields,
    ) -> DiagServerResult<Response> {
        let sid: u8 = cmd.into();
        let service = self
            .catalog
            .services()
            .find(|s| s.is_request() && s.sid() == Some(sid))
            .ok_or_else(|| DiagError::ServiceNotFound(format!("{cmd:?}")))?
            .name
            .clone();
        self.execute(&service, parameter, fields)
    }

    /// Requests the ECU to go into a diagnostic session (EG: `Extended`)
    pub fn set_session_mode(&mut self, level: &str) -> DiagServerResult<Response> {
        self.execute_command(UdsCommand::DiagnosticSessionControl, level, &Fields::new())
    }

    /// Reads a data identifier (EG: `ReadOdometerValueFromBus`)
    pub fn read_data_by_identifier(&mut self, identifier: &str) -> DiagServerResult<Response> {
        self.execute_command(UdsCommand::ReadDataByIdentifier, identifier, &Fields::new())
    }

    /// Takes control of an ECU output (EG: `SetDisplayIntensity`)
    pub fn control_output(&mut self, output: &str, fields: &Fields) -> DiagServerResult<Response> {
        self.execute_command(UdsCommand::InputOutputControlByIdentifier, output, fields)
    }

    /// Starts, stops or polls a routine (EG: `StartDisplayPatternRed`)
    pub fn run_routine(&mut self, routine: &str) -> DiagServerResult<Response> {
        self.execute_command(UdsCommand::RoutineControl, routine, &Fields::new())
    }

    /// Keeps the ECU's diagnostic session alive
    pub fn tester_present(&mut self) -> DiagServerResult<Response> {
        self.execute_command(UdsCommand::TesterPresent, "Request", &Fields::new())
    }

    /// Closes the channel and hands it back
    pub fn into_channel(mut self) -> C {
        if self.binding.take().is_some() {
            if let Err(e) = self.channel.close() {
                log::warn!("Failed to close channel: {e}");
            }
        }
        self.channel
    }
}

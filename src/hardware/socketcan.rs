//! SocketCAN module

use std::time::{Duration, Instant};

use socketcan_isotp::{
    ExtendedId, FlowControlOptions, Id, IsoTpBehaviour, IsoTpOptions, IsoTpSocket,
    LinkLayerOptions, StandardId,
};

use crate::channel::{
    ChannelError, ChannelResult, EcuBinding, IsoTPChannel, IsoTPSettings, PayloadChannel,
};

/// SocketCAN ISO-TP channel
pub struct SocketCanIsoTPChannel {
    if_name: String,
    channel: Option<IsoTpSocket>,
    binding: EcuBinding,
    cfg: IsoTPSettings,
}

impl SocketCanIsoTPChannel {
    /// Creates a closed channel on the named CAN interface (EG: `can0`)
    pub fn new(if_name: &str) -> Self {
        Self {
            if_name: if_name.to_string(),
            channel: None,
            binding: EcuBinding::default(),
            cfg: IsoTPSettings::default(),
        }
    }

    /// Returns true if the CAN interface currently exists
    pub fn is_connected(&self) -> bool {
        super::is_interface_present(&self.if_name)
    }

    fn safe_with_iface<X, T: FnOnce(&mut IsoTpSocket) -> ChannelResult<X>>(
        &mut self,
        function: T,
    ) -> ChannelResult<X> {
        match self.channel.as_mut() {
            Some(channel) => function(channel),
            None => Err(ChannelError::InterfaceNotOpen),
        }
    }

    fn can_id(&self, raw: u32) -> ChannelResult<Id> {
        let id = if self.cfg.can_use_ext_addr {
            ExtendedId::new(raw).map(Id::Extended)
        } else {
            u16::try_from(raw)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard)
        };
        id.ok_or_else(|| ChannelError::APIError {
            api_name: "socketCAN".into(),
            code: 98,
            desc: format!("CAN ID 0x{raw:X} does not fit the addressing mode"),
        })
    }
}

impl std::fmt::Debug for SocketCanIsoTPChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketCanIsoTPChannel")
            .field("if_name", &self.if_name)
            .field("binding", &self.binding)
            .field("open", &self.channel.is_some())
            .finish()
    }
}

impl PayloadChannel for SocketCanIsoTPChannel {
    fn open(&mut self) -> ChannelResult<()> {
        if self.channel.is_some() {
            // Already open
            return Ok(());
        }
        let mut flags: IsoTpBehaviour = IsoTpBehaviour::empty();

        if self.cfg.extended_addresses.is_some() {
            flags |= IsoTpBehaviour::CAN_ISOTP_EXTEND_ADDR
        }
        if self.cfg.tx_padding.is_some() {
            flags |= IsoTpBehaviour::CAN_ISOTP_TX_PADDING
        }
        if self.cfg.rx_padding.is_some() {
            flags |= IsoTpBehaviour::CAN_ISOTP_RX_PADDING
        }

        let (ext_address, rx_ext_address) = self.cfg.extended_addresses.unwrap_or((0, 0));

        let opts = IsoTpOptions::new(
            flags,
            Duration::from_millis(0),
            ext_address,
            self.cfg.tx_padding.unwrap_or(0xCC),
            self.cfg.rx_padding.unwrap_or(0xCC),
            rx_ext_address,
        )?;

        let tx_id = self.can_id(self.binding.send_id)?;
        let rx_id = self.can_id(self.binding.recv_id)?;

        let fc_opts = FlowControlOptions::new(self.cfg.block_size, self.cfg.st_min, 0);

        log::debug!(
            "Opening ISO-TP socket on {}. Tx 0x{:04X}, Rx 0x{:04X}",
            self.if_name,
            self.binding.send_id,
            self.binding.recv_id
        );
        let socket = IsoTpSocket::open_with_opts(
            &self.if_name,
            rx_id,
            tx_id,
            Some(opts),
            Some(fc_opts),
            Some(LinkLayerOptions::default()),
        )?;
        socket.set_nonblocking(true)?;
        self.channel = Some(socket);
        Ok(())
    }

    fn close(&mut self) -> ChannelResult<()> {
        // Dropping the socket closes it
        self.channel = None;
        Ok(())
    }

    fn set_ids(&mut self, send: u32, recv: u32) -> ChannelResult<()> {
        self.binding = EcuBinding::new(send, recv);
        Ok(())
    }

    fn read_bytes(&mut self, timeout_ms: u32) -> ChannelResult<Vec<u8>> {
        let start = Instant::now();
        let timeout = std::cmp::max(1, timeout_ms) as u128;
        self.safe_with_iface(|socket| {
            while start.elapsed().as_millis() <= timeout {
                if let Ok(data) = socket.read() {
                    return Ok(data.to_vec());
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            if timeout_ms == 0 {
                Err(ChannelError::BufferEmpty)
            } else {
                Err(ChannelError::ReadTimeout)
            }
        })
    }

    fn write_bytes(&mut self, buffer: &[u8], _timeout_ms: u32) -> ChannelResult<()> {
        self.safe_with_iface(|socket| {
            socket.write(buffer)?;
            Ok(())
        })
    }

    fn clear_rx_buffer(&mut self) -> ChannelResult<()> {
        self.safe_with_iface(|socket| {
            while socket.read().is_ok() {}
            Ok(())
        })
    }

    fn clear_tx_buffer(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

impl IsoTPChannel for SocketCanIsoTPChannel {
    fn set_iso_tp_cfg(&mut self, cfg: IsoTPSettings) -> ChannelResult<()> {
        self.cfg = cfg;
        Ok(())
    }
}

impl Drop for SocketCanIsoTPChannel {
    #[allow(unused_must_use)]
    fn drop(&mut self) {
        self.close();
    }
}

/// Lists the CAN interfaces present on this machine
pub fn list_can_interfaces() -> Vec<String> {
    match std::fs::read_dir("/sys/class/net/") {
        Ok(paths) => paths
            .filter_map(|x| x.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.contains("can"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

impl From<socketcan_isotp::Error> for ChannelError {
    fn from(e: socketcan_isotp::Error) -> Self {
        Self::APIError {
            api_name: "socketCAN".into(),
            code: 99,
            desc: e.to_string(),
        }
    }
}

impl From<std::num::TryFromIntError> for ChannelError {
    fn from(e: std::num::TryFromIntError) -> Self {
        Self::APIError {
            api_name: "socketCAN".into(),
            code: 97,
            desc: format!("Invalid ISO-TP option: {e}"),
        }
    }
}

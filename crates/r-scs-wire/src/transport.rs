//! ---
//! scs_section: "02-messaging-wire-protocols"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Frame codec, protocol packets, and radio transports."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::debug;

use crate::frame::ScadaFrame;
use crate::logging::{log_frame, FrameDirection};
use crate::{Result, WireError};

/// A datagram as delivered by the radio hardware, before frame decoding.
///
/// The transport supplies the port pair and radial distance metadata; the
/// payload bytes are opaque until [`ScadaFrame::receive`] validates them.
#[derive(Debug, Clone)]
pub struct RadioMessage {
    /// Port the datagram arrived on.
    pub local_port: u16,
    /// Port to reply to.
    pub remote_port: u16,
    /// Radial distance to the sender, in meters (0 when unknown).
    pub distance: f64,
    /// Raw frame bytes.
    pub bytes: Vec<u8>,
}

/// Abstraction over the unreliable datagram channel between nodes.
///
/// Implementations never retry or acknowledge; reliability concerns live in
/// the session layer above.
#[async_trait]
pub trait RadioTransport: Send + Sync {
    /// Encode and transmit one frame to the given remote port.
    async fn send(&self, remote_port: u16, frame: &ScadaFrame) -> Result<()>;
    /// Wait for the next inbound datagram.
    async fn recv(&mut self) -> Result<RadioMessage>;
    /// Port this radio answers on.
    fn local_port(&self) -> u16;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// UDP-backed radio for deployed nodes. Radio ports map onto UDP ports on
/// the loopback interface of the simulation host.
pub struct UdpRadio {
    socket: UdpSocket,
    local_port: u16,
}

impl UdpRadio {
    /// Bind a radio to its listen port.
    pub async fn bind(local_port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", local_port)).await?;
        debug!(local_port, "udp radio bound");
        Ok(Self { socket, local_port })
    }
}

#[async_trait]
impl RadioTransport for UdpRadio {
    async fn send(&self, remote_port: u16, frame: &ScadaFrame) -> Result<()> {
        let bytes = frame.encode()?;
        self.socket.send_to(&bytes, ("127.0.0.1", remote_port)).await?;
        log_frame(FrameDirection::Outbound, frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<RadioMessage> {
        let mut buf = vec![0u8; 64 * 1024];
        let (len, addr) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok(RadioMessage {
            local_port: self.local_port,
            remote_port: addr.port(),
            distance: 0.0,
            bytes: buf,
        })
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// In-memory radio used by tests and single-process simulation.
///
/// A pair shares two unbounded channels; datagrams are delivered in order
/// but, like the real channel, nothing above the transport may assume they
/// arrive at all once a side is dropped.
pub struct LoopbackRadio {
    local_port: u16,
    peer_port: u16,
    distance: f64,
    tx: mpsc::UnboundedSender<RadioMessage>,
    rx: mpsc::UnboundedReceiver<RadioMessage>,
}

impl LoopbackRadio {
    /// Simulated radial distance applied to delivered datagrams.
    pub fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }
}

/// Create a connected pair of in-memory radios.
pub fn loopback_pair(port_a: u16, port_b: u16) -> (LoopbackRadio, LoopbackRadio) {
    let (tx_ab, rx_ab) = mpsc::unbounded_channel();
    let (tx_ba, rx_ba) = mpsc::unbounded_channel();
    (
        LoopbackRadio {
            local_port: port_a,
            peer_port: port_b,
            distance: 0.0,
            tx: tx_ab,
            rx: rx_ba,
        },
        LoopbackRadio {
            local_port: port_b,
            peer_port: port_a,
            distance: 0.0,
            tx: tx_ba,
            rx: rx_ab,
        },
    )
}

#[async_trait]
impl RadioTransport for LoopbackRadio {
    async fn send(&self, remote_port: u16, frame: &ScadaFrame) -> Result<()> {
        let bytes = frame.encode()?;
        let message = RadioMessage {
            local_port: remote_port,
            remote_port: self.local_port,
            distance: self.distance,
            bytes,
        };
        self.tx.send(message).map_err(|_| WireError::ChannelClosed)?;
        log_frame(FrameDirection::Outbound, frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<RadioMessage> {
        self.rx.recv().await.ok_or(WireError::ChannelClosed)
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

impl std::fmt::Debug for LoopbackRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackRadio")
            .field("local_port", &self.local_port)
            .field("peer_port", &self.peer_port)
            .field("distance", &self.distance)
            .finish()
    }
}

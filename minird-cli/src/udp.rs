//! UDP link to the simulator

use anyhow::{Context, Result};
use minird_bridge::{Frame, FrameSink};
use std::net::{SocketAddr, UdpSocket};

/// Fire-and-forget datagram sink
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    /// Bind an ephemeral local port for sending to `target`
    pub fn connect(target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).context("Failed to bind UDP socket")?;
        log::info!("UDP stream to {}", target);
        Ok(Self { socket, target })
    }
}

impl FrameSink for UdpSink {
    fn send(&mut self, frame: &Frame) -> minird_bridge::Result<()> {
        self.socket.send_to(&frame.encode(), self.target)?;
        Ok(())
    }
}

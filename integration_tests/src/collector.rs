//! UDP collector endpoint.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::protocol::{build_push_ack, MAX_FRAME_SIZE};

/// Receive side of the collector, standing in for a network server.
pub struct CollectorSocket {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl CollectorSocket {
    /// Bind the collector port.
    pub fn bind(addr: &str, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr).with_context(|| format!("Binding {}", addr))?;
        socket.set_read_timeout(Some(timeout))?;
        Ok(Self {
            socket,
            // One spare byte so oversized datagrams are detectable
            buf: vec![0u8; MAX_FRAME_SIZE + 1],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram. Returns `None` on timeout.
    pub fn receive(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, from)) => Ok(Some((self.buf[..len].to_vec(), from))),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Acknowledge a PUSH_DATA the way a network server would.
    pub fn acknowledge(&self, token: u16, to: SocketAddr) -> Result<()> {
        self.socket.send_to(&build_push_ack(token), to)?;
        Ok(())
    }
}

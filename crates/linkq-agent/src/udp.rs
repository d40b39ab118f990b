//! Best-effort UDP telemetry sender.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use linkq_core::{SendStats, TelemetrySink};

/// Owns a non-blocking UDP socket aimed at one collector. Send errors
/// (full buffer, no route) are counted and otherwise ignored.
pub struct UdpSender {
    socket: UdpSocket,
    dest: SocketAddr,
    stats: SendStats,
}

impl UdpSender {
    pub fn new(dest: SocketAddr) -> std::io::Result<Self> {
        let bind = if dest.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(UdpSender {
            socket,
            dest,
            stats: SendStats::default(),
        })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }
}

impl TelemetrySink for UdpSender {
    fn send(&mut self, wire: &str) {
        match self.socket.send_to(wire.as_bytes(), self.dest) {
            Ok(_) => self.stats.sent += 1,
            Err(e) => {
                self.stats.failed += 1;
                tracing::debug!(dest = %self.dest, error = %e, "telemetry send dropped");
            }
        }
    }

    fn stats(&self) -> SendStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use linkq_core::{Payload, PayloadFormat};

    #[test]
    fn delivers_ascii_datagram() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut tx = UdpSender::new(rx.local_addr().unwrap()).unwrap();

        tx.send(&Payload::new(72, Some(57)).encode(PayloadFormat::Pair));

        let mut buf = [0u8; 64];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"57,72");
        assert_eq!(tx.stats(), SendStats { sent: 1, failed: 0 });
    }

    #[test]
    fn sends_wire_string_verbatim() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut tx = UdpSender::new(rx.local_addr().unwrap()).unwrap();

        tx.send("79");

        let mut buf = [0u8; 64];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"79");
    }
}

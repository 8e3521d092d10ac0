//! A minimal host binary wiring `lodp::Endpoint` to a real UDP socket.
//!
//! Not part of the published crate — this mirrors the teacher's own
//! `examples/tun.rs` demo in spirit (KDL config, base64 key printing) but
//! drives a blocking `std::net::UdpSocket` loop instead of a TUN device,
//! since that device model belongs to WireGuard's problem, not this one's.

use std::io::BufRead;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use base64ct::{Base64, Encoding};
use lodp::{Callbacks, Endpoint, LodpError, PublicKey, StaticSecret};
use log::{error, info};
use rand::rngs::OsRng;

#[derive(knuffel::Decode)]
struct EchoConfig {
    #[knuffel(child, unwrap(argument, bytes))]
    key: Option<Vec<u8>>,

    #[knuffel(child, unwrap(argument))]
    listen: String,

    #[knuffel(child)]
    peer: Option<PeerConfig>,
}

#[derive(knuffel::Decode)]
struct PeerConfig {
    #[knuffel(argument, bytes)]
    key: Vec<u8>,

    #[knuffel(argument)]
    addr: String,
}

impl EchoConfig {
    fn load(path: &str) -> Self {
        let text = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("could not read {path}: {e}"));
        knuffel::parse(path, &text).unwrap_or_else(|e| panic!("invalid config {path}: {e}"))
    }

    fn identity(&self) -> StaticSecret {
        match &self.key {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .expect("interface key must be exactly 32 bytes");
                StaticSecret::from(arr)
            }
            None => {
                let secret = StaticSecret::random_from_rng(OsRng);
                println!(
                    "generated identity, public key: {}",
                    Base64::encode_string(PublicKey::from(&secret).as_bytes())
                );
                secret
            }
        }
    }
}

struct UdpCallbacks {
    socket: UdpSocket,
}

impl Callbacks for UdpCallbacks {
    fn sendto(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<(), LodpError> {
        self.socket.send_to(bytes, peer).map_err(|e| {
            error!(target: "lodp-demo", "sendto {peer} failed: {e}");
            LodpError::BadPacket
        })?;
        Ok(())
    }

    fn on_accept(&mut self, peer: SocketAddr) {
        info!(target: "lodp-demo", "accepted session from {peer}");
    }

    fn on_connect(&mut self, peer: SocketAddr, result: Result<(), LodpError>) {
        match result {
            Ok(()) => info!(target: "lodp-demo", "handshake with {peer} complete"),
            Err(e) => error!(target: "lodp-demo", "handshake with {peer} failed: {e}"),
        }
    }

    fn on_recv(&mut self, peer: SocketAddr, payload: &[u8]) {
        info!(target: "lodp-demo", "{peer} says: {}", String::from_utf8_lossy(payload));
    }
}

fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "lodp-echo.kdl".into());
    let config = EchoConfig::load(&config_path);
    let identity = config.identity();

    let socket = UdpSocket::bind(&config.listen).expect("bind listen address");
    socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("set read timeout");

    let mut endpoint = Endpoint::new(identity, UdpCallbacks { socket: socket.try_clone().unwrap() });

    if let Some(peer) = &config.peer {
        let peer_key: [u8; 32] = peer.key.as_slice().try_into().expect("peer key must be 32 bytes");
        let remote_public_key = PublicKey::from(peer_key);
        let remote_addr: SocketAddr = peer.addr.parse().expect("invalid peer address");
        endpoint
            .connect(remote_addr, remote_public_key)
            .expect("failed to start handshake");
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let mut buf = vec![0u8; lodp::MSS];
    loop {
        endpoint.maybe_rotate_cookie_key();

        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => {
                if let Err(e) = endpoint.on_incoming(&buf[..n], peer) {
                    error!(target: "lodp-demo", "on_incoming from {peer}: {e}");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                error!(target: "lodp-demo", "recv_from failed: {e}");
                break;
            }
        }

        if let Some(peer) = &config.peer {
            if let Some(Ok(line)) = lines.next() {
                let remote_addr: SocketAddr = peer.addr.parse().expect("invalid peer address");
                if let Err(e) = endpoint.send_data(remote_addr, line.as_bytes()) {
                    error!(target: "lodp-demo", "send_data to {remote_addr}: {e}");
                }
            }
        }
    }
}

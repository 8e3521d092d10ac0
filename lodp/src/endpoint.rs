//! Per-listener state (§3 "Endpoint"), the ingress dispatcher (§4.4-§4.10),
//! and the egress builders (§4.11).

use std::net::SocketAddr;

use log::{debug, trace, warn};

use lodp_crypto::{
    derive_intro_keys, initiator_handshake, rand_bytes, responder_handshake, memcmp_ct, PublicKey,
    StaticSecret, SymmetricKey, ECDH_PUBLIC_KEY_LEN,
};
use lodp_utils::{new_session_map, SessionMap};
use rand::rngs::StdRng;

use crate::aead::{clamp_padding, encrypt_then_mac, mac_then_decrypt, seed_rng};
use crate::buffer::Buffer;
use crate::clock::Clock;
use crate::cookie::CookieState;
use crate::error::LodpError;
use crate::session::{EphemeralKeypair, Role, Session, SessionState};
use crate::wire::{
    self, parse_handshake, parse_handshake_ack, parse_header, parse_init, PktType, COOKIE_LEN,
    MSS, PKT_HANDSHAKE_ACK_LEN, PKT_HANDSHAKE_LEN, PKT_HDR_HANDSHAKE_ACK_LEN,
    PKT_HDR_HANDSHAKE_LEN, PKT_HDR_INIT_LEN, PKT_HEARTBEAT_ACK_LEN, PKT_HEARTBEAT_LEN,
    PKT_INIT_ACK_LEN, PKT_INIT_LEN,
};

/// The callback table a host implements (§6). Every entry point here is
/// synchronous and non-blocking, matching §5's single-threaded cooperative
/// model.
pub trait Callbacks {
    /// Transmit a fully framed datagram to `peer`.
    fn sendto(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<(), LodpError>;

    /// Optional padding randomizer: how many random bytes (before clamping
    /// to the MSS budget) to append before encrypting. Default: none.
    fn pre_encrypt(&mut self, _cur_len: usize, _mss: usize) -> usize {
        0
    }

    /// An inbound session was created (responder side).
    fn on_accept(&mut self, peer: SocketAddr);

    /// An outbound session reached a final outcome (initiator side).
    fn on_connect(&mut self, peer: SocketAddr, result: Result<(), LodpError>);

    /// Application data arrived on an established session.
    fn on_recv(&mut self, peer: SocketAddr, payload: &[u8]);

    /// A HEARTBEAT_ACK arrived. Optional; default ignores it.
    fn on_heartbeat_ack(&mut self, _peer: SocketAddr, _payload: &[u8]) {}
}

pub struct Endpoint<C: Callbacks, K: Clock = crate::clock::SystemClock> {
    intro_keypair: StaticSecret,
    intro_public_key: PublicKey,
    intro_sym_keys: SymmetricKey,
    has_intro_keys: bool,

    cookie_state: CookieState,
    clock: K,
    rng: StdRng,

    sessions: SessionMap<SocketAddr, Session>,
    pub callbacks: C,
}

impl<C: Callbacks> Endpoint<C, crate::clock::SystemClock> {
    /// Start a listener with a long-term identity. `has_intro_keys` is
    /// always true for an endpoint created this way — a real deployment
    /// always knows its own identity; an endpoint that will only ever
    /// originate connections can simply never call [`Endpoint::accept_from`]
    /// style entry points.
    pub fn new(identity: StaticSecret, callbacks: C) -> Self {
        Self::with_clock(identity, callbacks, crate::clock::SystemClock)
    }
}

impl<C: Callbacks, K: Clock> Endpoint<C, K> {
    pub fn with_clock(identity: StaticSecret, callbacks: C, clock: K) -> Self {
        let mut rng = seed_rng();
        let intro_public_key = PublicKey::from(&identity);
        let intro_sym_keys = derive_intro_keys(&intro_public_key);
        let now = clock.now();
        let cookie_state = CookieState::new(&mut rng, now);
        Self {
            intro_keypair: identity,
            intro_public_key,
            intro_sym_keys,
            has_intro_keys: true,
            cookie_state,
            clock,
            rng,
            sessions: new_session_map(&mut rand::rngs::OsRng),
            callbacks,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.intro_public_key
    }

    /// The host-driven periodic cookie rotation tick (§5: "the host must
    /// periodically call the cookie rotation entry point").
    pub fn maybe_rotate_cookie_key(&mut self) {
        let now = self.clock.now();
        self.cookie_state.maybe_rotate(&mut self.rng, now);
    }

    pub fn session(&self, peer: SocketAddr) -> Option<&Session> {
        self.sessions.get(&peer)
    }

    /// Explicitly drop a session, scrubbing its secret material.
    pub fn destroy_session(&mut self, peer: SocketAddr) {
        self.sessions.remove(&peer);
    }

    // ---- connect (initiator) ----------------------------------------

    /// Begin an outbound connection to a peer whose long-term identity
    /// `remote_public_key` is already known.
    pub fn connect(&mut self, peer: SocketAddr, remote_public_key: PublicKey) -> Result<(), LodpError> {
        let mut mac_key = [0u8; lodp_crypto::MAC_KEY_LEN];
        let mut bulk_key = [0u8; lodp_crypto::BULK_KEY_LEN];
        rand_bytes(&mut self.rng, &mut mac_key);
        rand_bytes(&mut self.rng, &mut bulk_key);
        let own_intro_keys = SymmetricKey {
            mac_key: lodp_crypto::MacKey(mac_key),
            bulk_key: lodp_crypto::BulkKey(bulk_key),
        };

        let session = Session::new_initiator(peer, remote_public_key, own_intro_keys);
        self.sessions.insert(peer, session);
        debug!(target: "lodp::endpoint", "connect: sending INIT to {peer}");
        self.send_init(peer)
    }

    // ---- ingress ------------------------------------------------------

    /// `on_incoming(endpoint, session_or_none, buf, addr)` (§4.4).
    pub fn on_incoming(&mut self, wire_bytes: &[u8], peer: SocketAddr) -> Result<(), LodpError> {
        trace!(target: "lodp::endpoint", "on_incoming: {} bytes from {peer}", wire_bytes.len());
        let mut buf = Buffer::from_wire(wire_bytes)?;

        let mut session = self.sessions.remove(&peer);
        let mut used_session_keys = false;

        if let Some(s) = &session {
            match mac_then_decrypt(&mut buf, &s.rx_key) {
                Ok(()) => used_session_keys = true,
                Err(LodpError::InvalidMac) => {}
                Err(e) => {
                    if let Some(s) = session.take() {
                        self.sessions.insert(peer, s);
                    }
                    return Err(e);
                }
            }
        }

        if !used_session_keys {
            if !self.has_intro_keys {
                if let Some(s) = session {
                    self.sessions.insert(peer, s);
                }
                return Err(LodpError::NotResponder);
            }
            if let Err(e) = mac_then_decrypt(&mut buf, &self.intro_sym_keys) {
                if let Some(s) = session {
                    self.sessions.insert(peer, s);
                }
                return Err(e);
            }
        }

        let hdr = match parse_header(buf.plaintext_body()) {
            Ok(h) => h,
            Err(e) => {
                if let Some(s) = session {
                    self.sessions.insert(peer, s);
                }
                return Err(e);
            }
        };

        let body_len = buf.len - wire::PKT_TAG_LEN;
        if (hdr.length as usize) < 4 || (hdr.length as usize) > body_len || hdr.flags != 0 {
            if let Some(s) = session {
                self.sessions.insert(peer, s);
            }
            return Err(LodpError::BadPacket);
        }

        let result = match (session.take(), used_session_keys) {
            (Some(mut s), true) => {
                let r = self.dispatch_session(&mut s, &hdr, &buf, peer);
                self.sessions.insert(peer, s);
                r
            }
            (Some(mut s), false) => {
                // Only a retransmitted HANDSHAKE, arriving because our
                // prior HANDSHAKE_ACK was lost, is legal here.
                if hdr.typ != PktType::Handshake {
                    self.sessions.insert(peer, s);
                    Err(LodpError::BadPacket)
                } else if s.role == Role::Initiator {
                    self.sessions.insert(peer, s);
                    Err(LodpError::NotResponder)
                } else {
                    let r = self.on_handshake(Some(&mut s), &hdr, &buf, peer);
                    self.sessions.insert(peer, s);
                    r
                }
            }
            (None, _) => match hdr.typ {
                PktType::Init => self.on_init(&hdr, &buf, peer),
                PktType::Handshake => self.on_handshake(None, &hdr, &buf, peer),
                _ => Err(LodpError::BadPacket),
            },
        };

        result
    }

    fn dispatch_session(
        &mut self,
        session: &mut Session,
        hdr: &wire::Header,
        buf: &Buffer,
        peer: SocketAddr,
    ) -> Result<(), LodpError> {
        match hdr.typ {
            PktType::Data => self.on_data(session, hdr, buf, peer),
            PktType::InitAck => self.on_init_ack(session, hdr, buf, peer),
            PktType::HandshakeAck => self.on_handshake_ack(session, hdr, buf, peer),
            PktType::Heartbeat => self.on_heartbeat(session, hdr, buf, peer),
            PktType::HeartbeatAck => self.on_heartbeat_ack(session, hdr, buf, peer),
            _ => Err(LodpError::BadPacket),
        }
    }

    // ---- §4.5 INIT handler (responder) --------------------------------

    fn on_init(&mut self, hdr: &wire::Header, buf: &Buffer, peer: SocketAddr) -> Result<(), LodpError> {
        if hdr.length as usize != PKT_HDR_INIT_LEN {
            return Err(LodpError::BadPacket);
        }
        // TODO: rate-limit INIT handling before replying with a cookie.
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let init = parse_init(&buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize])?;

        let key = SymmetricKey {
            mac_key: lodp_crypto::MacKey(init.intro_mac_key),
            bulk_key: lodp_crypto::BulkKey(init.intro_bulk_key),
        };

        let now = self.clock.now();
        let cookie = crate::cookie::generate_cookie(
            &mut self.cookie_state,
            &mut self.rng,
            now,
            false,
            peer,
            &init.intro_mac_key,
            &init.intro_bulk_key,
        )?;

        let mut out = Buffer::new();
        out.len = PKT_INIT_ACK_LEN + COOKIE_LEN;
        wire::write_init_ack(&mut out.plaintext[wire::PKT_TAG_LEN..out.len], &cookie);
        self.encrypt_and_send(&mut out, &key, peer)
    }

    // ---- §4.6 HANDSHAKE handler (responder) ----------------------------

    fn on_handshake(
        &mut self,
        session: Option<&mut Session>,
        hdr: &wire::Header,
        buf: &Buffer,
        peer: SocketAddr,
    ) -> Result<(), LodpError> {
        if hdr.length as usize != PKT_HDR_HANDSHAKE_LEN + COOKIE_LEN {
            return Err(LodpError::BadPacket);
        }
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let hs = parse_handshake(&buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize])?;

        let now = self.clock.now();
        if let Err(e) = crate::cookie::validate_cookie(
            &mut self.cookie_state,
            &mut self.rng,
            now,
            hs.cookie,
            peer,
            &hs.intro_mac_key,
            &hs.intro_bulk_key,
        ) {
            warn!(target: "lodp::endpoint", "rejected HANDSHAKE from {peer}: {e}");
            return Err(e);
        }

        let peer_key = SymmetricKey {
            mac_key: lodp_crypto::MacKey(hs.intro_mac_key),
            bulk_key: lodp_crypto::BulkKey(hs.intro_bulk_key),
        };
        let x_pub = bytes_to_pubkey(&hs.public_key)?;

        match session {
            Some(s) => {
                debug_assert_eq!(s.role, Role::Responder);
                if s.seen_peer_data {
                    return Err(LodpError::BadPacket);
                }
                // Lost-ACK retransmit: rebuild from cached material, no
                // second on_accept. `seen_peer_data` being false guarantees
                // the responder hasn't scrubbed its ephemeral keypair yet.
                let y_pub = s
                    .session_ecdh_keypair
                    .as_ref()
                    .map(|k| k.public)
                    .ok_or(LodpError::BadHandshake)?;
                let mut out = Buffer::new();
                out.len = PKT_HANDSHAKE_ACK_LEN;
                wire::write_handshake_ack(
                    &mut out.plaintext[wire::PKT_TAG_LEN..out.len],
                    y_pub.as_bytes(),
                    &s.session_secret_verifier,
                );
                self.encrypt_and_send(&mut out, &peer_key, peer)
            }
            None => {
                let private = StaticSecret::random_from_rng(&mut self.rng);
                let public = PublicKey::from(&private);
                let ephemeral = EphemeralKeypair { private, public };

                let out = match responder_handshake(
                    &ephemeral.private,
                    &ephemeral.public,
                    &self.intro_keypair,
                    &self.intro_public_key,
                    &x_pub,
                ) {
                    Ok(out) => out,
                    Err(_) => return Err(LodpError::BadHandshake),
                };

                let responder_pub = ephemeral.public;
                let mut new_session = Session::new_responder(peer, ephemeral);
                new_session.tx_key = out.tx_key.clone();
                new_session.rx_key = out.rx_key.clone();
                new_session.session_secret = out.session_secret;
                new_session.session_secret_verifier = out.verifier;

                let mut reply = Buffer::new();
                reply.len = PKT_HANDSHAKE_ACK_LEN;
                wire::write_handshake_ack(
                    &mut reply.plaintext[wire::PKT_TAG_LEN..reply.len],
                    responder_pub.as_bytes(),
                    &new_session.session_secret_verifier,
                );
                self.encrypt_and_send(&mut reply, &peer_key, peer)?;

                self.sessions.insert(peer, new_session);
                debug!(target: "lodp::endpoint", "accepted session from {peer}");
                self.callbacks.on_accept(peer);
                Ok(())
            }
        }
    }

    // ---- §4.8 INIT_ACK handler (initiator) -----------------------------

    fn on_init_ack(
        &mut self,
        session: &mut Session,
        hdr: &wire::Header,
        buf: &Buffer,
        peer: SocketAddr,
    ) -> Result<(), LodpError> {
        if session.role != Role::Initiator || session.state != SessionState::Init {
            return Err(LodpError::BadPacket);
        }
        let cookie_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let cookie = &buf.plaintext[cookie_off..wire::PKT_TAG_LEN + hdr.length as usize];
        if cookie.is_empty() {
            return Err(LodpError::BadPacket);
        }

        session.cookie = cookie.to_vec();
        session.state = SessionState::Handshake;
        // Buffer allocation for the cookie copy cannot fail in safe Rust
        // the way the original's `calloc` could; NOBUFS on this path is
        // unreachable here.

        // §4.8: transition to HANDSHAKE and trigger the outbound HANDSHAKE.
        match self.build_and_send_handshake(session, peer) {
            Ok(()) => Ok(()),
            Err(e) => {
                session.state = SessionState::Error;
                self.callbacks.on_connect(peer, Err(e));
                Err(e)
            }
        }
    }

    // ---- §4.9 HANDSHAKE_ACK handler (initiator) ------------------------

    fn on_handshake_ack(
        &mut self,
        session: &mut Session,
        hdr: &wire::Header,
        buf: &Buffer,
        peer: SocketAddr,
    ) -> Result<(), LodpError> {
        if session.role != Role::Initiator || session.state != SessionState::Handshake {
            return Err(LodpError::BadPacket);
        }
        if hdr.length as usize != PKT_HDR_HANDSHAKE_ACK_LEN {
            return Err(LodpError::BadPacket);
        }
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let ack = parse_handshake_ack(&buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize])?;
        let y_pub = bytes_to_pubkey(&ack.public_key)?;

        let ephemeral = session.session_ecdh_keypair.as_ref().ok_or(LodpError::BadHandshake)?;
        let remote_public_key = session.remote_public_key.ok_or(LodpError::BadHandshake)?;

        let result = initiator_handshake(&ephemeral.private, &ephemeral.public, &remote_public_key, &y_pub);

        let outcome = match result {
            Err(_) => {
                session.state = SessionState::Error;
                Err(LodpError::BadHandshake)
            }
            Ok(out) => {
                if !memcmp_ct(&ack.verifier, &out.verifier) {
                    session.state = SessionState::Error;
                    Err(LodpError::BadHandshake)
                } else {
                    session.tx_key = out.tx_key.clone();
                    session.rx_key = out.rx_key.clone();
                    session.session_secret = out.session_secret;
                    session.session_secret_verifier = out.verifier;
                    session.state = SessionState::Established;
                    Ok(())
                }
            }
        };

        session.scrub_handshake_material();
        match &outcome {
            Ok(()) => debug!(target: "lodp::endpoint", "handshake with {peer} established"),
            Err(e) => warn!(target: "lodp::endpoint", "handshake with {peer} failed: {e}"),
        }
        self.callbacks.on_connect(peer, outcome);
        outcome
    }

    // ---- §4.10 DATA / HEARTBEAT handlers --------------------------------

    fn on_data(&mut self, session: &mut Session, hdr: &wire::Header, buf: &Buffer, peer: SocketAddr) -> Result<(), LodpError> {
        if session.state != SessionState::Established {
            return Err(LodpError::BadPacket);
        }
        if !session.seen_peer_data {
            session.seen_peer_data = true;
            if session.role == Role::Responder {
                session.scrub_handshake_material();
            }
        }
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let payload = &buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize];
        self.callbacks.on_recv(peer, payload);
        Ok(())
    }

    fn on_heartbeat(&mut self, session: &mut Session, hdr: &wire::Header, buf: &Buffer, peer: SocketAddr) -> Result<(), LodpError> {
        if session.state != SessionState::Established {
            return Err(LodpError::BadPacket);
        }
        // TODO: rate-limit HEARTBEAT handling before echoing it back.
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let payload = buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize].to_vec();

        let mut out = Buffer::new();
        out.len = PKT_HEARTBEAT_ACK_LEN + payload.len();
        wire::write_heartbeat_ack(&mut out.plaintext[wire::PKT_TAG_LEN..out.len], &payload);
        let tx_key = session.tx_key.clone();
        self.encrypt_and_send(&mut out, &tx_key, peer)
    }

    fn on_heartbeat_ack(&mut self, session: &mut Session, hdr: &wire::Header, buf: &Buffer, peer: SocketAddr) -> Result<(), LodpError> {
        if session.state != SessionState::Established {
            return Err(LodpError::BadPacket);
        }
        let payload_off = wire::PKT_TAG_LEN + wire::TLV_LEN;
        let payload = &buf.plaintext[payload_off..wire::PKT_TAG_LEN + hdr.length as usize];
        self.callbacks.on_heartbeat_ack(peer, payload);
        Ok(())
    }

    // ---- §4.11 Egress builders -----------------------------------------

    pub fn send_data(&mut self, peer: SocketAddr, payload: &[u8]) -> Result<(), LodpError> {
        if wire::PKT_DATA_LEN + payload.len() > MSS {
            return Err(LodpError::MsgSize);
        }
        let mut session = self.sessions.remove(&peer).ok_or(LodpError::BadPacket)?;
        if session.state != SessionState::Established {
            self.sessions.insert(peer, session);
            return Err(LodpError::BadPacket);
        }
        let mut out = Buffer::new();
        out.len = wire::PKT_TAG_LEN + wire::PKT_HDR_DATA_LEN + payload.len();
        wire::write_data(&mut out.plaintext[wire::PKT_TAG_LEN..out.len], payload);
        let tx_key = session.tx_key.clone();
        let result = self.encrypt_and_send(&mut out, &tx_key, peer);
        self.sessions.insert(peer, session);
        result
    }

    fn send_init(&mut self, peer: SocketAddr) -> Result<(), LodpError> {
        let mut session = self.sessions.remove(&peer).ok_or(LodpError::BadPacket)?;
        debug_assert_eq!(session.role, Role::Initiator);
        debug_assert_eq!(session.state, SessionState::Init);

        let mut out = Buffer::new();
        out.len = PKT_INIT_LEN;
        wire::write_init(
            &mut out.plaintext[wire::PKT_TAG_LEN..out.len],
            &session.rx_key.mac_key.0,
            &session.rx_key.bulk_key.0,
        );

        let ephemeral = {
            let private = StaticSecret::random_from_rng(&mut self.rng);
            let public = PublicKey::from(&private);
            EphemeralKeypair { private, public }
        };
        session.session_ecdh_keypair = Some(ephemeral);

        let tx_key = session.tx_key.clone();
        let result = self.encrypt_and_send(&mut out, &tx_key, peer);
        self.sessions.insert(peer, session);
        result
    }

    pub fn send_handshake(&mut self, peer: SocketAddr) -> Result<(), LodpError> {
        let mut session = self.sessions.remove(&peer).ok_or(LodpError::BadPacket)?;
        let result = self.build_and_send_handshake(&mut session, peer);
        self.sessions.insert(peer, session);
        result
    }

    /// Shared by [`Endpoint::send_handshake`] and the INIT_ACK handler,
    /// which must trigger this same outbound HANDSHAKE itself (§4.8)
    /// rather than wait for the host to call `send_handshake` explicitly.
    fn build_and_send_handshake(&mut self, session: &mut Session, peer: SocketAddr) -> Result<(), LodpError> {
        if session.role != Role::Initiator || session.state != SessionState::Handshake {
            return Err(LodpError::BadPacket);
        }

        let public_key = *session
            .session_ecdh_keypair
            .as_ref()
            .ok_or(LodpError::BadHandshake)?
            .public
            .as_bytes();

        let mut out = Buffer::new();
        out.len = PKT_HANDSHAKE_LEN + session.cookie.len();
        wire::write_handshake(
            &mut out.plaintext[wire::PKT_TAG_LEN..out.len],
            &session.rx_key.mac_key.0,
            &session.rx_key.bulk_key.0,
            &public_key,
            &session.cookie,
        );
        let tx_key = session.tx_key.clone();
        self.encrypt_and_send(&mut out, &tx_key, peer)
    }

    pub fn send_heartbeat(&mut self, peer: SocketAddr, payload: &[u8]) -> Result<(), LodpError> {
        if wire::PKT_HDR_HEARTBEAT_LEN + payload.len() + wire::PKT_TAG_LEN > MSS {
            return Err(LodpError::MsgSize);
        }
        let mut session = self.sessions.remove(&peer).ok_or(LodpError::BadPacket)?;
        if session.state != SessionState::Established {
            self.sessions.insert(peer, session);
            return Err(LodpError::BadPacket);
        }
        let mut out = Buffer::new();
        out.len = PKT_HEARTBEAT_LEN + payload.len();
        wire::write_heartbeat(&mut out.plaintext[wire::PKT_TAG_LEN..out.len], payload);
        let tx_key = session.tx_key.clone();
        let result = self.encrypt_and_send(&mut out, &tx_key, peer);
        self.sessions.insert(peer, session);
        result
    }

    fn encrypt_and_send(&mut self, buf: &mut Buffer, keys: &SymmetricKey, peer: SocketAddr) -> Result<(), LodpError> {
        let padding = clamp_padding(self.callbacks.pre_encrypt(buf.len, MSS), buf.len);
        encrypt_then_mac(buf, keys, &mut self.rng, padding)?;
        self.callbacks.sendto(peer, buf.wire_bytes())
    }
}

fn bytes_to_pubkey(bytes: &[u8; ECDH_PUBLIC_KEY_LEN]) -> Result<PublicKey, LodpError> {
    let candidate = PublicKey::from(*bytes);
    // This is a structural decode, not the ntor validation step itself
    // (which happens inside `initiator_handshake`/`responder_handshake`
    // against the ECDH output); an all-zero wire encoding is rejected here
    // too since it can never produce a valid ECDH output anyway.
    if bytes == &[0u8; ECDH_PUBLIC_KEY_LEN] {
        return Err(LodpError::BadHandshake);
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::encrypt_then_mac;

    #[derive(Default)]
    struct Noop;

    impl Callbacks for Noop {
        fn sendto(&mut self, _peer: SocketAddr, _bytes: &[u8]) -> Result<(), LodpError> {
            Ok(())
        }
        fn on_accept(&mut self, _peer: SocketAddr) {}
        fn on_connect(&mut self, _peer: SocketAddr, _result: Result<(), LodpError>) {}
        fn on_recv(&mut self, _peer: SocketAddr, _payload: &[u8]) {}
    }

    fn responder() -> (Endpoint<Noop>, SocketAddr) {
        let identity = StaticSecret::random_from_rng(&mut rand::rngs::OsRng);
        let endpoint = Endpoint::new(identity, Noop);
        let sender: SocketAddr = "127.0.0.1:50001".parse().unwrap();
        (endpoint, sender)
    }

    /// Property 7: a packet with any reserved flag bit set is `BAD_PACKET`
    /// regardless of type, checked generically in the dispatcher rather
    /// than per packet-type handler.
    #[test]
    fn reserved_flags_are_rejected() {
        let (mut b, sender) = responder();

        let mut buf = Buffer::new();
        buf.len = PKT_INIT_LEN;
        wire::write_init(
            &mut buf.plaintext[wire::PKT_TAG_LEN..buf.len],
            &[0u8; lodp_crypto::MAC_KEY_LEN],
            &[0u8; lodp_crypto::BULK_KEY_LEN],
        );
        // Flip the reserved flags byte directly (offset 1 of the TLV
        // preamble, right after the tag+iv prefix).
        buf.plaintext[wire::PKT_TAG_LEN + 1] = 1;

        let mut rng = crate::aead::seed_rng();
        encrypt_then_mac(&mut buf, &b.intro_sym_keys, &mut rng, 0).unwrap();

        assert_eq!(
            b.on_incoming(buf.wire_bytes(), sender).unwrap_err(),
            LodpError::BadPacket
        );
    }

    /// Property 8: REKEY/REKEY_ACK are parsed (the type byte decodes) but
    /// never dispatched — every path that reaches them falls through to
    /// `BAD_PACKET`.
    #[test]
    fn rekey_packet_types_are_rejected() {
        let (mut b, sender) = responder();

        let mut buf = Buffer::new();
        buf.len = wire::PKT_TAG_LEN + wire::TLV_LEN;
        wire::write_header(&mut buf.plaintext[wire::PKT_TAG_LEN..buf.len], PktType::Rekey, wire::TLV_LEN as u16);

        let mut rng = crate::aead::seed_rng();
        encrypt_then_mac(&mut buf, &b.intro_sym_keys, &mut rng, 0).unwrap();

        assert_eq!(
            b.on_incoming(buf.wire_bytes(), sender).unwrap_err(),
            LodpError::BadPacket
        );
    }
}

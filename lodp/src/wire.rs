//! Wire framing and the per-type payload codec (§4.1, §9: explicit
//! parse/serialize over byte slices rather than raw pointer-cast struct
//! overlays).
//!
//! Every packet on the wire is `[MAC tag | IV | type | flags | length BE |
//! type-specific payload]`. `length` covers the 4-byte TLV preamble plus the
//! payload; it does not count the MAC+IV prefix (`PKT_TAG_LEN`).

use crate::error::LodpError;

pub use lodp_crypto::{BULK_IV_LEN, BULK_KEY_LEN, ECDH_PUBLIC_KEY_LEN, MAC_DIGEST_LEN, MAC_KEY_LEN};

/// MAC tag + IV: the unencrypted wire prefix before the TLV preamble.
pub const PKT_TAG_LEN: usize = MAC_DIGEST_LEN + BULK_IV_LEN;
/// `type` (1) + `flags` (1) + `length` (2).
pub const TLV_LEN: usize = 4;
/// A cookie is the same size as a MAC digest (spec S1: "a 32-byte cookie").
pub const COOKIE_LEN: usize = MAC_DIGEST_LEN;

/// Maximum segment size: the upper bound, including AEAD overhead, of any
/// emitted datagram. Not specified by the distilled spec or by the
/// retrieved slice of the original header; chosen as a conservative bound
/// that fits under a 1500-byte Ethernet MTU after IPv6/UDP overhead.
pub const MSS: usize = 1452;

/// `hdr.length` value for a given packet type's *fixed* fields (TLV plus
/// whatever is not variable-length). Variable-length payloads (DATA,
/// INIT_ACK's cookie, HANDSHAKE's cookie, HEARTBEAT/HEARTBEAT_ACK) add their
/// payload length on top of these.
pub const PKT_HDR_DATA_LEN: usize = TLV_LEN;
pub const PKT_HDR_INIT_LEN: usize = TLV_LEN + MAC_KEY_LEN + BULK_KEY_LEN;
pub const PKT_HDR_INIT_ACK_LEN: usize = TLV_LEN;
pub const PKT_HDR_HANDSHAKE_LEN: usize = TLV_LEN + MAC_KEY_LEN + BULK_KEY_LEN + ECDH_PUBLIC_KEY_LEN;
pub const PKT_HDR_HANDSHAKE_ACK_LEN: usize = TLV_LEN + ECDH_PUBLIC_KEY_LEN + MAC_DIGEST_LEN;
pub const PKT_HDR_HEARTBEAT_LEN: usize = TLV_LEN;
pub const PKT_HDR_HEARTBEAT_ACK_LEN: usize = TLV_LEN;

/// Full on-wire packet size (tag + header) for a given type's fixed part,
/// used by the egress builders to size a buffer before appending any
/// variable-length payload.
pub const PKT_DATA_LEN: usize = PKT_TAG_LEN + PKT_HDR_DATA_LEN;
pub const PKT_INIT_LEN: usize = PKT_TAG_LEN + PKT_HDR_INIT_LEN;
pub const PKT_INIT_ACK_LEN: usize = PKT_TAG_LEN + PKT_HDR_INIT_ACK_LEN;
pub const PKT_HANDSHAKE_LEN: usize = PKT_TAG_LEN + PKT_HDR_HANDSHAKE_LEN;
pub const PKT_HANDSHAKE_ACK_LEN: usize = PKT_TAG_LEN + PKT_HDR_HANDSHAKE_ACK_LEN;
pub const PKT_HEARTBEAT_LEN: usize = PKT_TAG_LEN + PKT_HDR_HEARTBEAT_LEN;
pub const PKT_HEARTBEAT_ACK_LEN: usize = PKT_TAG_LEN + PKT_HDR_HEARTBEAT_ACK_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PktType {
    Data = 0,
    Init = 1,
    InitAck = 2,
    Handshake = 3,
    HandshakeAck = 4,
    Heartbeat = 5,
    HeartbeatAck = 6,
    Rekey = 7,
    RekeyAck = 8,
}

impl PktType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => PktType::Data,
            1 => PktType::Init,
            2 => PktType::InitAck,
            3 => PktType::Handshake,
            4 => PktType::HandshakeAck,
            5 => PktType::Heartbeat,
            6 => PktType::HeartbeatAck,
            7 => PktType::Rekey,
            8 => PktType::RekeyAck,
            _ => return None,
        })
    }
}

/// The type-agnostic TLV preamble, parsed out of a decrypted packet body.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub typ: PktType,
    pub flags: u8,
    /// Host byte order; covers the TLV preamble and the type-specific
    /// payload.
    pub length: u16,
}

/// Parse the 4-byte TLV preamble from the start of a decrypted packet body.
/// Does not validate `length` against the buffer bounds or `flags` against
/// zero — callers (the dispatcher) apply those checks generically across
/// all types.
pub fn parse_header(body: &[u8]) -> Result<Header, LodpError> {
    if body.len() < TLV_LEN {
        return Err(LodpError::BadPacket);
    }
    let typ = PktType::from_u8(body[0]).ok_or(LodpError::BadPacket)?;
    let flags = body[1];
    let length = u16::from_be_bytes([body[2], body[3]]);
    Ok(Header { typ, flags, length })
}

/// Write the 4-byte TLV preamble at the start of `body`.
pub fn write_header(body: &mut [u8], typ: PktType, length: u16) {
    body[0] = typ as u8;
    body[1] = 0;
    body[2..4].copy_from_slice(&length.to_be_bytes());
}

pub struct InitPayload {
    pub intro_mac_key: [u8; MAC_KEY_LEN],
    pub intro_bulk_key: [u8; BULK_KEY_LEN],
}

pub fn parse_init(payload: &[u8]) -> Result<InitPayload, LodpError> {
    if payload.len() != MAC_KEY_LEN + BULK_KEY_LEN {
        return Err(LodpError::BadPacket);
    }
    let mut intro_mac_key = [0u8; MAC_KEY_LEN];
    let mut intro_bulk_key = [0u8; BULK_KEY_LEN];
    intro_mac_key.copy_from_slice(&payload[..MAC_KEY_LEN]);
    intro_bulk_key.copy_from_slice(&payload[MAC_KEY_LEN..]);
    Ok(InitPayload {
        intro_mac_key,
        intro_bulk_key,
    })
}

pub fn write_init(body: &mut [u8], intro_mac_key: &[u8; MAC_KEY_LEN], intro_bulk_key: &[u8; BULK_KEY_LEN]) {
    write_header(body, PktType::Init, PKT_HDR_INIT_LEN as u16);
    body[TLV_LEN..TLV_LEN + MAC_KEY_LEN].copy_from_slice(intro_mac_key);
    body[TLV_LEN + MAC_KEY_LEN..TLV_LEN + MAC_KEY_LEN + BULK_KEY_LEN].copy_from_slice(intro_bulk_key);
}

pub fn write_init_ack(body: &mut [u8], cookie: &[u8]) {
    write_header(body, PktType::InitAck, (PKT_HDR_INIT_ACK_LEN + cookie.len()) as u16);
    body[TLV_LEN..TLV_LEN + cookie.len()].copy_from_slice(cookie);
}

pub struct HandshakePayload<'a> {
    pub intro_mac_key: [u8; MAC_KEY_LEN],
    pub intro_bulk_key: [u8; BULK_KEY_LEN],
    pub public_key: [u8; ECDH_PUBLIC_KEY_LEN],
    pub cookie: &'a [u8],
}

pub fn parse_handshake(payload: &[u8]) -> Result<HandshakePayload<'_>, LodpError> {
    let fixed = MAC_KEY_LEN + BULK_KEY_LEN + ECDH_PUBLIC_KEY_LEN;
    if payload.len() < fixed {
        return Err(LodpError::BadPacket);
    }
    let mut intro_mac_key = [0u8; MAC_KEY_LEN];
    let mut intro_bulk_key = [0u8; BULK_KEY_LEN];
    let mut public_key = [0u8; ECDH_PUBLIC_KEY_LEN];
    intro_mac_key.copy_from_slice(&payload[..MAC_KEY_LEN]);
    intro_bulk_key.copy_from_slice(&payload[MAC_KEY_LEN..MAC_KEY_LEN + BULK_KEY_LEN]);
    public_key.copy_from_slice(&payload[MAC_KEY_LEN + BULK_KEY_LEN..fixed]);
    let cookie = &payload[fixed..];
    Ok(HandshakePayload {
        intro_mac_key,
        intro_bulk_key,
        public_key,
        cookie,
    })
}

pub fn write_handshake(
    body: &mut [u8],
    intro_mac_key: &[u8; MAC_KEY_LEN],
    intro_bulk_key: &[u8; BULK_KEY_LEN],
    public_key: &[u8; ECDH_PUBLIC_KEY_LEN],
    cookie: &[u8],
) {
    write_header(body, PktType::Handshake, (PKT_HDR_HANDSHAKE_LEN + cookie.len()) as u16);
    let mut off = TLV_LEN;
    body[off..off + MAC_KEY_LEN].copy_from_slice(intro_mac_key);
    off += MAC_KEY_LEN;
    body[off..off + BULK_KEY_LEN].copy_from_slice(intro_bulk_key);
    off += BULK_KEY_LEN;
    body[off..off + ECDH_PUBLIC_KEY_LEN].copy_from_slice(public_key);
    off += ECDH_PUBLIC_KEY_LEN;
    body[off..off + cookie.len()].copy_from_slice(cookie);
}

pub struct HandshakeAckPayload {
    pub public_key: [u8; ECDH_PUBLIC_KEY_LEN],
    pub verifier: [u8; MAC_DIGEST_LEN],
}

pub fn parse_handshake_ack(payload: &[u8]) -> Result<HandshakeAckPayload, LodpError> {
    if payload.len() != ECDH_PUBLIC_KEY_LEN + MAC_DIGEST_LEN {
        return Err(LodpError::BadPacket);
    }
    let mut public_key = [0u8; ECDH_PUBLIC_KEY_LEN];
    let mut verifier = [0u8; MAC_DIGEST_LEN];
    public_key.copy_from_slice(&payload[..ECDH_PUBLIC_KEY_LEN]);
    verifier.copy_from_slice(&payload[ECDH_PUBLIC_KEY_LEN..]);
    Ok(HandshakeAckPayload {
        public_key,
        verifier,
    })
}

pub fn write_handshake_ack(
    body: &mut [u8],
    public_key: &[u8; ECDH_PUBLIC_KEY_LEN],
    verifier: &[u8; MAC_DIGEST_LEN],
) {
    write_header(body, PktType::HandshakeAck, PKT_HDR_HANDSHAKE_ACK_LEN as u16);
    body[TLV_LEN..TLV_LEN + ECDH_PUBLIC_KEY_LEN].copy_from_slice(public_key);
    body[TLV_LEN + ECDH_PUBLIC_KEY_LEN..TLV_LEN + ECDH_PUBLIC_KEY_LEN + MAC_DIGEST_LEN]
        .copy_from_slice(verifier);
}

pub fn write_data(body: &mut [u8], payload: &[u8]) {
    write_header(body, PktType::Data, (PKT_HDR_DATA_LEN + payload.len()) as u16);
    body[TLV_LEN..TLV_LEN + payload.len()].copy_from_slice(payload);
}

pub fn write_heartbeat(body: &mut [u8], payload: &[u8]) {
    write_header(body, PktType::Heartbeat, (PKT_HDR_HEARTBEAT_LEN + payload.len()) as u16);
    body[TLV_LEN..TLV_LEN + payload.len()].copy_from_slice(payload);
}

pub fn write_heartbeat_ack(body: &mut [u8], payload: &[u8]) {
    write_header(body, PktType::HeartbeatAck, (PKT_HDR_HEARTBEAT_ACK_LEN + payload.len()) as u16);
    body[TLV_LEN..TLV_LEN + payload.len()].copy_from_slice(payload);
}

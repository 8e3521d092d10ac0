//! End-to-end scenarios driving two in-process `Endpoint`s through a fake
//! wire (a pair of shared outboxes), exercising the cookie round trip, the
//! modified-ntor handshake, and the established-session packet types.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;

use lodp::{Callbacks, Endpoint, LodpError, PublicKey, StaticSecret, TestClock};
use rand::rngs::OsRng;

type Outbox = Rc<RefCell<VecDeque<(SocketAddr, Vec<u8>)>>>;

#[derive(Default)]
struct Recorder {
    accepted: Vec<SocketAddr>,
    connected: Vec<(SocketAddr, Result<(), LodpError>)>,
    received: Vec<(SocketAddr, Vec<u8>)>,
    heartbeat_acks: Vec<(SocketAddr, Vec<u8>)>,
}

struct Harness {
    outbox: Outbox,
    recorder: Rc<RefCell<Recorder>>,
}

impl Callbacks for Harness {
    fn sendto(&mut self, peer: SocketAddr, bytes: &[u8]) -> Result<(), LodpError> {
        self.outbox.borrow_mut().push_back((peer, bytes.to_vec()));
        Ok(())
    }

    fn on_accept(&mut self, peer: SocketAddr) {
        self.recorder.borrow_mut().accepted.push(peer);
    }

    fn on_connect(&mut self, peer: SocketAddr, result: Result<(), LodpError>) {
        self.recorder.borrow_mut().connected.push((peer, result));
    }

    fn on_recv(&mut self, peer: SocketAddr, payload: &[u8]) {
        self.recorder.borrow_mut().received.push((peer, payload.to_vec()));
    }

    fn on_heartbeat_ack(&mut self, peer: SocketAddr, payload: &[u8]) {
        self.recorder.borrow_mut().heartbeat_acks.push((peer, payload.to_vec()));
    }
}

const ADDR_A: &str = "127.0.0.1:40001";
const ADDR_B: &str = "127.0.0.1:40002";

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// Pop exactly one queued datagram addressed to `expected_dest` and return
/// its bytes. Panics (failing the test) if the outbox is empty or the
/// destination doesn't match, since every step in these scenarios expects a
/// specific single reply.
fn pop_one(outbox: &Outbox, expected_dest: SocketAddr) -> Vec<u8> {
    let (dest, bytes) = outbox.borrow_mut().pop_front().expect("expected a queued packet");
    assert_eq!(dest, expected_dest);
    bytes
}

fn new_pair() -> (
    Endpoint<Harness>,
    Endpoint<Harness>,
    Outbox,
    Outbox,
    Rc<RefCell<Recorder>>,
    Rc<RefCell<Recorder>>,
) {
    let identity_a = StaticSecret::random_from_rng(OsRng);
    let identity_b = StaticSecret::random_from_rng(OsRng);

    let outbox_a: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let outbox_b: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let recorder_a = Rc::new(RefCell::new(Recorder::default()));
    let recorder_b = Rc::new(RefCell::new(Recorder::default()));

    let endpoint_a = Endpoint::new(
        identity_a,
        Harness { outbox: outbox_a.clone(), recorder: recorder_a.clone() },
    );
    let endpoint_b = Endpoint::new(
        identity_b,
        Harness { outbox: outbox_b.clone(), recorder: recorder_b.clone() },
    );

    (endpoint_a, endpoint_b, outbox_a, outbox_b, recorder_a, recorder_b)
}

/// Drive A through a full handshake against B, ending with both sessions
/// `Established`. Returns the addresses so callers can send DATA/HEARTBEAT.
fn run_handshake(
    a: &mut Endpoint<Harness>,
    b: &mut Endpoint<Harness>,
    outbox_a: &Outbox,
    outbox_b: &Outbox,
) {
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, b.public_key()).unwrap();
    let init = pop_one(outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();

    let init_ack = pop_one(outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();

    let handshake = pop_one(outbox_a, addr_b);
    b.on_incoming(&handshake, addr_a).unwrap();

    let handshake_ack = pop_one(outbox_b, addr_a);
    a.on_incoming(&handshake_ack, addr_b).unwrap();
}

#[test]
fn full_handshake_then_data_round_trip() {
    let (mut a, mut b, outbox_a, outbox_b, recorder_a, recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    run_handshake(&mut a, &mut b, &outbox_a, &outbox_b);

    assert_eq!(recorder_b.borrow().accepted, vec![addr_a]);
    assert_eq!(recorder_a.borrow().connected, vec![(addr_b, Ok(()))]);

    a.send_data(addr_b, b"hello from a").unwrap();
    let data = pop_one(&outbox_a, addr_b);
    b.on_incoming(&data, addr_a).unwrap();
    assert_eq!(recorder_b.borrow().received, vec![(addr_a, b"hello from a".to_vec())]);

    b.send_data(addr_a, b"hello from b").unwrap();
    let reply = pop_one(&outbox_b, addr_a);
    a.on_incoming(&reply, addr_b).unwrap();
    assert_eq!(recorder_a.borrow().received, vec![(addr_b, b"hello from b".to_vec())]);
}

#[test]
fn heartbeat_is_echoed_back() {
    let (mut a, mut b, outbox_a, outbox_b, recorder_a, _recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    run_handshake(&mut a, &mut b, &outbox_a, &outbox_b);

    a.send_heartbeat(addr_b, b"ping").unwrap();
    let hb = pop_one(&outbox_a, addr_b);
    b.on_incoming(&hb, addr_a).unwrap();

    let hb_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&hb_ack, addr_b).unwrap();

    assert_eq!(recorder_a.borrow().heartbeat_acks, vec![(addr_b, b"ping".to_vec())]);
}

/// A HANDSHAKE_ACK lost in transit must cause the initiator to retransmit
/// HANDSHAKE; the responder, already holding a session for that peer, must
/// reply from cached state rather than minting a second session or firing
/// `on_accept` twice.
#[test]
fn retransmitted_handshake_does_not_double_accept() {
    let (mut a, mut b, outbox_a, outbox_b, _recorder_a, recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, b.public_key()).unwrap();
    let init = pop_one(&outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();

    let init_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();

    let handshake = pop_one(&outbox_a, addr_b);

    // First delivery: B accepts and replies.
    b.on_incoming(&handshake, addr_a).unwrap();
    let first_ack = pop_one(&outbox_b, addr_a);

    // Simulate the HANDSHAKE_ACK getting lost: redeliver the same HANDSHAKE.
    b.on_incoming(&handshake, addr_a).unwrap();
    let second_ack = pop_one(&outbox_b, addr_a);

    assert_eq!(first_ack, second_ack);
    assert_eq!(recorder_b.borrow().accepted, vec![addr_a]);

    // The retransmitted ACK still completes A's handshake.
    a.on_incoming(&second_ack, addr_b).unwrap();
}

/// S6's second half: once the responder has seen DATA from a peer, a
/// redelivered HANDSHAKE for that same peer is no longer a legal retransmit
/// and is dropped as `BAD_PACKET`, not silently re-accepted.
#[test]
fn handshake_after_data_is_rejected_as_bad_packet() {
    let (mut a, mut b, outbox_a, outbox_b, _recorder_a, _recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, b.public_key()).unwrap();
    let init = pop_one(&outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();

    let init_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();

    let handshake = pop_one(&outbox_a, addr_b);
    b.on_incoming(&handshake, addr_a).unwrap();
    let handshake_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&handshake_ack, addr_b).unwrap();

    a.send_data(addr_b, b"hi").unwrap();
    let data = pop_one(&outbox_a, addr_b);
    b.on_incoming(&data, addr_a).unwrap();

    // Redelivering the original HANDSHAKE now must fail, not re-accept.
    assert_eq!(
        b.on_incoming(&handshake, addr_a).unwrap_err(),
        LodpError::BadPacket
    );
}

#[test]
fn tampered_mac_is_rejected() {
    let (mut a, mut b, outbox_a, _outbox_b, _recorder_a, _recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, b.public_key()).unwrap();
    let mut init = pop_one(&outbox_a, addr_b);
    init[0] ^= 0xff;

    assert_eq!(b.on_incoming(&init, addr_a).unwrap_err(), LodpError::InvalidMac);
}

/// A cookie is bound to the claimed source address (§4.3): replaying a
/// legitimately issued HANDSHAKE from a different address than the one the
/// cookie was minted for must fail cookie validation, even though the
/// packet still decrypts fine under B's public intro keys (those aren't
/// bound to the sender's address at all, only the cookie is).
#[test]
fn handshake_replayed_from_a_different_address_fails_cookie_check() {
    let (mut a, mut b, outbox_a, outbox_b, _recorder_a, _recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);
    let spoofed: SocketAddr = "127.0.0.1:40099".parse().unwrap();

    a.connect(addr_b, b.public_key()).unwrap();
    let init = pop_one(&outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();

    let init_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();

    let handshake = pop_one(&outbox_a, addr_b);

    assert_eq!(
        b.on_incoming(&handshake, spoofed).unwrap_err(),
        LodpError::InvalidCookie
    );
}

/// S5: a DATA payload one byte past what fits under the MSS once framed is
/// rejected synchronously, with nothing queued for transmission.
#[test]
fn oversized_payload_is_rejected_before_sending() {
    let (mut a, mut b, outbox_a, outbox_b, _recorder_a, _recorder_b) = new_pair();
    run_handshake(&mut a, &mut b, &outbox_a, &outbox_b);

    let addr_b = addr(ADDR_B);

    // PKT_DATA_LEN isn't part of the public surface, so derive the S5
    // boundary (MSS - PKT_DATA_LEN + 1) from first principles: a DATA
    // packet's only fixed overhead is the tag+iv prefix and the 4-byte TLV
    // preamble.
    let fixed_overhead = lodp::PKT_TAG_LEN + 4;
    let too_big = vec![0u8; lodp::MSS - fixed_overhead + 1];
    assert_eq!(a.send_data(addr_b, &too_big).unwrap_err(), LodpError::MsgSize);

    let fits_exactly = vec![0u8; lodp::MSS - fixed_overhead];
    a.send_data(addr_b, &fits_exactly).unwrap();
    let data = pop_one(&outbox_a, addr_b);
    b.on_incoming(&data, addr(ADDR_A)).unwrap();
}

#[test]
fn unknown_peer_without_session_is_rejected() {
    let (_a, mut b, _outbox_a, _outbox_b, _recorder_a, _recorder_b) = new_pair();
    let addr_a = addr(ADDR_A);
    let garbage = vec![0u8; lodp::PKT_TAG_LEN + 8];
    assert_eq!(b.on_incoming(&garbage, addr_a).unwrap_err(), LodpError::InvalidMac);
}

/// Scenario S2: a cookie issued just before rotation still validates inside
/// the grace window, but not after it, driven end-to-end through the
/// responder's own `Endpoint` rather than the cookie module directly.
#[test]
fn cookie_rotation_boundary_at_the_endpoint_level() {
    let identity_b = StaticSecret::random_from_rng(OsRng);
    let identity_a = StaticSecret::random_from_rng(OsRng);
    let pub_b = PublicKey::from(&identity_b);

    let outbox_a: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let outbox_b: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let recorder_a = Rc::new(RefCell::new(Recorder::default()));
    let recorder_b = Rc::new(RefCell::new(Recorder::default()));

    let clock_b = Rc::new(TestClock::new(0));
    let mut a = Endpoint::new(identity_a, Harness { outbox: outbox_a.clone(), recorder: recorder_a.clone() });
    let mut b = Endpoint::with_clock(
        identity_b,
        Harness { outbox: outbox_b.clone(), recorder: recorder_b.clone() },
        clock_b.clone(),
    );

    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, pub_b).unwrap();
    let init = pop_one(&outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();
    let init_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();
    let handshake = pop_one(&outbox_a, addr_b);

    // Rotate exactly at T=30, as S2 specifies, so the grace window (45)
    // is anchored to the mint schedule rather than to whenever the lazy
    // rotation inside cookie generation happens to run.
    clock_b.set(30);
    b.maybe_rotate_cookie_key();

    // Past rotation (30s) plus grace (15s): the cookie embedded in this
    // HANDSHAKE, minted at t=0, must now be rejected.
    clock_b.set(46);

    assert_eq!(b.on_incoming(&handshake, addr_a).unwrap_err(), LodpError::InvalidCookie);
}

/// Within the grace window (rotation already happened, but <=15s ago) the
/// same cookie is still accepted under the previous key.
#[test]
fn cookie_still_valid_inside_grace_window() {
    let identity_b = StaticSecret::random_from_rng(OsRng);
    let identity_a = StaticSecret::random_from_rng(OsRng);
    let pub_b = PublicKey::from(&identity_b);

    let outbox_a: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let outbox_b: Outbox = Rc::new(RefCell::new(VecDeque::new()));
    let recorder_a = Rc::new(RefCell::new(Recorder::default()));
    let recorder_b = Rc::new(RefCell::new(Recorder::default()));

    let clock_b = Rc::new(TestClock::new(0));
    let mut a = Endpoint::new(identity_a, Harness { outbox: outbox_a.clone(), recorder: recorder_a.clone() });
    let mut b = Endpoint::with_clock(
        identity_b,
        Harness { outbox: outbox_b.clone(), recorder: recorder_b.clone() },
        clock_b.clone(),
    );

    let addr_a = addr(ADDR_A);
    let addr_b = addr(ADDR_B);

    a.connect(addr_b, pub_b).unwrap();
    let init = pop_one(&outbox_a, addr_b);
    b.on_incoming(&init, addr_a).unwrap();
    let init_ack = pop_one(&outbox_b, addr_a);
    a.on_incoming(&init_ack, addr_b).unwrap();
    let handshake = pop_one(&outbox_a, addr_b);

    // Rotate exactly at T=30, as S2 specifies.
    clock_b.set(30);
    b.maybe_rotate_cookie_key();

    // Rotated, but still inside the 15s grace window (30+15=45).
    clock_b.set(40);

    b.on_incoming(&handshake, addr_a).unwrap();
}

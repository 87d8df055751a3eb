//! ICMP echo wire format.
//!
//! One fixed-size message layout serves both families:
//!
//! ```text
//! type(1) code(1) checksum(2) ident(2) seq(2) send_secs(4) send_micros(4)
//! ```
//!
//! The send timestamp travels inside the packet, so the RTT of a reply is
//! computed from what the peer echoed back — the send loop's own scheduling
//! jitter never enters the measurement.

/// IPv4 echo request / reply message types.
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_ECHO_REPLY: u8 = 0;
/// IPv6 echo request / reply message types.
pub const ICMP6_ECHO_REQUEST: u8 = 128;
pub const ICMP6_ECHO_REPLY: u8 = 129;

/// Length of an encoded echo message, header and timestamp included.
pub const ECHO_PACKET_LEN: usize = 16;

/// Sequence numbers wrap at 2^15.
pub const SEQ_MODULUS: u16 = 1 << 15;

/// RFC 1071 internet checksum: ones'-complement sum of big-endian 16-bit
/// words (the last odd byte padded with zero), folded and complemented.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// The variable part of an echo message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPayload {
    /// Per-host ping identifier.
    pub ident: u16,
    /// Shared per-batch sequence number, < [`SEQ_MODULUS`].
    pub seq: u16,
    /// Whole seconds of the send time (unix).
    pub send_secs: u32,
    /// Microsecond part of the send time.
    pub send_micros: u32,
}

/// Encodes an echo request for the given address family.
pub fn encode_request(v6: bool, payload: &EchoPayload) -> [u8; ECHO_PACKET_LEN] {
    let mut pkt = [0u8; ECHO_PACKET_LEN];
    pkt[0] = if v6 { ICMP6_ECHO_REQUEST } else { ICMP_ECHO_REQUEST };
    pkt[1] = 0;
    pkt[4..6].copy_from_slice(&payload.ident.to_be_bytes());
    pkt[6..8].copy_from_slice(&payload.seq.to_be_bytes());
    pkt[8..12].copy_from_slice(&payload.send_secs.to_be_bytes());
    pkt[12..16].copy_from_slice(&payload.send_micros.to_be_bytes());
    // For IPv6 the kernel recomputes the pseudo-header checksum on send;
    // filling the RFC 1071 sum here is still correct for IPv4 and harmless
    // for IPv6.
    let ck = checksum(&pkt);
    pkt[2..4].copy_from_slice(&ck.to_be_bytes());
    pkt
}

/// Parses an echo reply message. Returns `None` for anything that is not a
/// well-formed echo reply of the expected family: wrong type or code, or a
/// truncated message.
pub fn parse_reply(v6: bool, msg: &[u8]) -> Option<EchoPayload> {
    if msg.len() < ECHO_PACKET_LEN {
        return None;
    }
    let expected = if v6 { ICMP6_ECHO_REPLY } else { ICMP_ECHO_REPLY };
    if msg[0] != expected || msg[1] != 0 {
        return None;
    }
    Some(EchoPayload {
        ident: u16::from_be_bytes([msg[4], msg[5]]),
        seq: u16::from_be_bytes([msg[6], msg[7]]),
        send_secs: u32::from_be_bytes([msg[8], msg[9], msg[10], msg[11]]),
        send_micros: u32::from_be_bytes([msg[12], msg[13], msg[14], msg[15]]),
    })
}

/// Extracts the ICMP message from a raw-socket datagram.
///
/// Raw IPv4 sockets deliver the IP header in front of the ICMP message; raw
/// IPv6 sockets do not. Returns `None` if the advertised IPv4 header does
/// not fit in the datagram.
pub fn icmp_message(v6: bool, datagram: &[u8]) -> Option<&[u8]> {
    if v6 {
        return Some(datagram);
    }
    let ihl = usize::from(datagram.first()? & 0x0f) * 4;
    if ihl < 20 || datagram.len() < ihl {
        return None;
    }
    Some(&datagram[ihl..])
}

/// Generator of the shared per-batch sequence number: increments across the
/// whole host set and wraps modulo 2^15.
#[derive(Default)]
pub struct SeqGen(u16);

impl SeqGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&mut self) -> u16 {
        let seq = self.0;
        self.0 = (self.0 + 1) % SEQ_MODULUS;
        seq
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PAYLOAD: EchoPayload = EchoPayload {
        ident: 0x1234,
        seq: 77,
        send_secs: 1_700_000_000,
        send_micros: 250_000,
    };

    #[test]
    fn checksum_self_check() {
        // Recomputing the sum over a packet whose checksum field is zeroed
        // reproduces the packet's original checksum, for any payload.
        for payload in [
            PAYLOAD,
            EchoPayload {
                ident: 0,
                seq: 0,
                send_secs: 0,
                send_micros: 0,
            },
            EchoPayload {
                ident: 0xffff,
                seq: super::SEQ_MODULUS - 1,
                send_secs: u32::MAX,
                send_micros: 999_999,
            },
        ] {
            for v6 in [false, true] {
                let pkt = encode_request(v6, &payload);
                let original = u16::from_be_bytes([pkt[2], pkt[3]]);
                let mut zeroed = pkt;
                zeroed[2] = 0;
                zeroed[3] = 0;
                assert_eq!(checksum(&zeroed), original);
            }
        }
    }

    #[test]
    fn checksum_handles_odd_lengths() {
        // The padding byte must not change an even-length prefix sum.
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), checksum(&[0x12, 0x34, 0x56, 0x00]));
    }

    #[test]
    fn request_types_per_family() {
        assert_eq!(encode_request(false, &PAYLOAD)[0], ICMP_ECHO_REQUEST);
        assert_eq!(encode_request(true, &PAYLOAD)[0], ICMP6_ECHO_REQUEST);
    }

    #[test]
    fn reply_round_trip() {
        // An echo reply carries the request's payload back verbatim; only
        // the type differs.
        for v6 in [false, true] {
            let mut msg = encode_request(v6, &PAYLOAD);
            msg[0] = if v6 { ICMP6_ECHO_REPLY } else { ICMP_ECHO_REPLY };
            assert_eq!(parse_reply(v6, &msg), Some(PAYLOAD));
        }
    }

    #[test]
    fn foreign_messages_are_discarded() {
        let mut msg = encode_request(false, &PAYLOAD);
        msg[0] = ICMP_ECHO_REPLY;
        // Truncated.
        assert_eq!(parse_reply(false, &msg[..10]), None);
        // Wrong code.
        let mut bad_code = msg;
        bad_code[1] = 3;
        assert_eq!(parse_reply(false, &bad_code), None);
        // A request is not a reply.
        assert_eq!(parse_reply(false, &encode_request(false, &PAYLOAD)), None);
        // Family mix-up.
        assert_eq!(parse_reply(true, &msg), None);
    }

    #[test]
    fn ipv4_header_is_stripped_by_advertised_length() {
        let mut datagram = vec![0x45u8; 20]; // version 4, ihl 5
        datagram.extend_from_slice(&[0xabu8; 8]);
        assert_eq!(icmp_message(false, &datagram), Some(&[0xabu8; 8][..]));

        let mut with_options = vec![0x46u8; 24]; // ihl 6
        with_options.extend_from_slice(&[0xcdu8; 4]);
        assert_eq!(icmp_message(false, &with_options), Some(&[0xcdu8; 4][..]));

        // Advertised header longer than the datagram.
        assert_eq!(icmp_message(false, &[0x4f, 0, 0]), None);
        // IPv6 datagrams arrive without an IP header.
        assert_eq!(icmp_message(true, &[1, 2, 3]), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn sequence_wraps_at_2_pow_15_without_repeats() {
        let mut seqs = SeqGen::new();
        let mut seen = vec![false; usize::from(SEQ_MODULUS)];
        for i in 0..u32::from(SEQ_MODULUS) {
            let s = seqs.next_seq();
            assert_eq!(u32::from(s), i, "sequence must increase strictly");
            assert!(!seen[usize::from(s)], "sequence repeated within one window");
            seen[usize::from(s)] = true;
        }
        // One full window later, the generator wraps back to zero.
        assert_eq!(seqs.next_seq(), 0);
        assert_eq!(seqs.next_seq(), 1);
    }
}

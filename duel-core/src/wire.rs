//! Packet layout: version (1 byte) + type tag (1 byte) + subtype tag (1 byte), then for
//! Move/Result packets a bincode body of (sequence: u16, payload). Fixed-int little-endian.

use crate::protocol::{
    Move, MoveKind, Outcome, OutcomeKind, Packet, PacketType, Payload, SubType, PROTOCOL_VERSION,
};

/// Bytes before the body.
pub const HEADER_SIZE: usize = 3;

/// Encode a packet. Fails if the result would exceed `max_len` (the link's datagram limit).
pub fn encode_packet<M: Payload, R: Payload>(
    packet: &Packet<M, R>,
    max_len: usize,
) -> Result<Vec<u8>, PacketEncodeError> {
    let mut out = Vec::with_capacity(HEADER_SIZE + 16);
    out.push(PROTOCOL_VERSION);
    out.push(packet.packet_type() as u8);
    out.push(packet.subtype() as u8);
    match packet {
        Packet::Control { kind, .. } if !kind.is_control() => {
            return Err(PacketEncodeError::MissingBody(*kind));
        }
        Packet::Control { .. } => {}
        Packet::Move(m) => bincode::serialize_into(&mut out, &(m.sequence, &m.payload))?,
        Packet::Outcome(o) => bincode::serialize_into(&mut out, &(o.sequence, &o.payload))?,
    }
    if out.len() > max_len {
        return Err(PacketEncodeError::TooLarge {
            size: out.len(),
            max: max_len,
        });
    }
    Ok(out)
}

/// Encoded size without allocating the packet bytes.
pub fn encoded_size<M: Payload, R: Payload>(
    packet: &Packet<M, R>,
) -> Result<usize, PacketEncodeError> {
    let body = match packet {
        Packet::Control { kind, .. } if !kind.is_control() => {
            return Err(PacketEncodeError::MissingBody(*kind));
        }
        Packet::Control { .. } => 0,
        Packet::Move(m) => bincode::serialized_size(&(m.sequence, &m.payload))?,
        Packet::Outcome(o) => bincode::serialized_size(&(o.sequence, &o.payload))?,
    };
    Ok(HEADER_SIZE + body as usize)
}

/// Error encoding a packet (bincode, missing body, or size limit).
#[derive(Debug, thiserror::Error)]
pub enum PacketEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("{0} needs a body")]
    MissingBody(PacketType),
    #[error("packet of {size} bytes exceeds link maximum of {max}")]
    TooLarge { size: usize, max: usize },
}

/// Decode one packet from a received datagram.
pub fn decode_packet<M: Payload, R: Payload>(
    bytes: &[u8],
) -> Result<Packet<M, R>, PacketDecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PacketDecodeError::Truncated(bytes.len()));
    }
    if bytes[0] != PROTOCOL_VERSION {
        return Err(PacketDecodeError::Version(bytes[0]));
    }
    let kind = PacketType::from_wire(bytes[1]).ok_or(PacketDecodeError::UnknownType(bytes[1]))?;
    let subtype =
        SubType::from_wire(bytes[2]).ok_or(PacketDecodeError::UnknownSubType(bytes[2]))?;
    let body = &bytes[HEADER_SIZE..];
    match kind {
        PacketType::Move => {
            let kind = MoveKind::try_from(subtype)
                .map_err(|s| PacketDecodeError::SubTypeMismatch(PacketType::Move, s))?;
            let (sequence, payload): (u16, M) = bincode::deserialize(body)?;
            Ok(Packet::Move(Move {
                sequence,
                kind,
                payload,
            }))
        }
        PacketType::Result => {
            let kind = OutcomeKind::try_from(subtype)
                .map_err(|s| PacketDecodeError::SubTypeMismatch(PacketType::Result, s))?;
            let (sequence, payload): (u16, R) = bincode::deserialize(body)?;
            Ok(Packet::Outcome(Outcome {
                sequence,
                kind,
                payload,
            }))
        }
        _ => Ok(Packet::Control { kind, subtype }),
    }
}

/// Error decoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum PacketDecodeError {
    #[error("datagram of {0} bytes is shorter than the header")]
    Truncated(usize),
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("unknown packet type {0}")]
    UnknownType(u8),
    #[error("unknown subtype {0}")]
    UnknownSubType(u8),
    #[error("{1} is not a valid subtype for {0}")]
    SubTypeMismatch(PacketType, SubType),
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Shot {
        x: u8,
        y: u8,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Report {
        sunk: bool,
        ship: [u8; 4],
    }

    type P = Packet<Shot, Report>;

    #[test]
    fn move_layout_is_explicit() {
        let p: P = Packet::Move(Move::new(0x0102, MoveKind::Normal, Shot { x: 4, y: 9 }));
        let bytes = encode_packet(&p, 64).unwrap();
        assert_eq!(bytes, vec![PROTOCOL_VERSION, 3, 1, 0x02, 0x01, 4, 9]);
        assert_eq!(decode_packet::<Shot, Report>(&bytes).unwrap(), p);
    }

    #[test]
    fn control_packet_is_header_only() {
        let p: P = Packet::coin_flip(false);
        let bytes = encode_packet(&p, 64).unwrap();
        assert_eq!(bytes, vec![PROTOCOL_VERSION, 6, 11]);
        let back = decode_packet::<Shot, Report>(&bytes).unwrap();
        assert_eq!(back.flip_value(), Some(false));
    }

    #[test]
    fn size_is_fixed_per_shape() {
        let a: P = Packet::Outcome(Outcome::new(OutcomeKind::Hit, Report::default()));
        let b: P = Packet::Outcome(Outcome {
            sequence: 900,
            kind: OutcomeKind::Win,
            payload: Report {
                sunk: true,
                ship: [1, 2, 3, 4],
            },
        });
        assert_eq!(a.encoded_size().unwrap(), b.encoded_size().unwrap());
        assert_eq!(
            a.encoded_size().unwrap(),
            encode_packet(&a, 64).unwrap().len()
        );
    }

    #[test]
    fn too_large_rejected() {
        let p: P = Packet::Outcome(Outcome::new(OutcomeKind::Hit, Report::default()));
        assert!(matches!(
            encode_packet(&p, 5),
            Err(PacketEncodeError::TooLarge { size: 10, max: 5 })
        ));
    }

    #[test]
    fn control_tagged_move_rejected() {
        let p: P = Packet::control(PacketType::Move);
        assert!(matches!(
            encode_packet(&p, 64),
            Err(PacketEncodeError::MissingBody(PacketType::Move))
        ));
    }

    #[test]
    fn malformed_datagrams_rejected() {
        assert!(matches!(
            decode_packet::<Shot, Report>(&[PROTOCOL_VERSION, 1]),
            Err(PacketDecodeError::Truncated(2))
        ));
        assert!(matches!(
            decode_packet::<Shot, Report>(&[9, 1, 0]),
            Err(PacketDecodeError::Version(9))
        ));
        assert!(matches!(
            decode_packet::<Shot, Report>(&[PROTOCOL_VERSION, 42, 0]),
            Err(PacketDecodeError::UnknownType(42))
        ));
        assert!(matches!(
            decode_packet::<Shot, Report>(&[PROTOCOL_VERSION, 3, 7, 1, 0, 0, 0]),
            Err(PacketDecodeError::SubTypeMismatch(PacketType::Move, SubType::Win))
        ));
        assert!(matches!(
            decode_packet::<Shot, Report>(&[PROTOCOL_VERSION, 3, 1, 1]),
            Err(PacketDecodeError::Decode(_))
        ));
    }
}

//! Base-128 varints, zigzag and bounded reads

use bytes::{Buf, BufMut};

use super::WireKind;
use crate::error::WireError;

/// Longest valid varint for a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn put_tag(buf: &mut impl BufMut, number: u32, kind: WireKind) {
    put_varint(buf, (u64::from(number) << 3) | u64::from(kind as u8));
}

/// Write a varint length prefix followed by the payload
pub fn put_length_delimited(buf: &mut impl BufMut, payload: &[u8]) {
    put_varint(buf, payload.len() as u64);
    buf.put_slice(payload);
}

pub fn get_varint(buf: &mut &[u8]) -> Result<u64, WireError> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(WireError::TruncatedMessage {
                needed: 1,
                remaining: 0,
            });
        }
        let byte = buf.get_u8();
        // The tenth byte may only carry the top bit of a u64
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(WireError::MalformedVarint);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(WireError::MalformedVarint)
}

/// Fail unless `needed` bytes remain
pub fn ensure(buf: &[u8], needed: usize) -> Result<(), WireError> {
    if buf.len() < needed {
        return Err(WireError::TruncatedMessage {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Split off a length-prefixed payload
pub fn get_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = get_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| WireError::TruncatedMessage {
        needed: usize::MAX,
        remaining: buf.len(),
    })?;
    let slice: &'a [u8] = *buf;
    ensure(slice, len)?;
    let (payload, rest) = slice.split_at(len);
    *buf = rest;
    Ok(payload)
}

/// Skip one value of the given kind
pub fn skip(buf: &mut &[u8], kind: WireKind) -> Result<(), WireError> {
    match kind {
        WireKind::Varint => get_varint(buf).map(|_| ()),
        WireKind::Fixed64 => {
            ensure(buf, 8)?;
            buf.advance(8);
            Ok(())
        }
        WireKind::Fixed32 => {
            ensure(buf, 4)?;
            buf.advance(4);
            Ok(())
        }
        WireKind::LengthDelimited => get_length_delimited(buf).map(|_| ()),
    }
}

pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        put_varint(&mut buf, value);
        buf
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(300), vec![0xac, 0x02]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
        // int32 -1 is sign-extended to ten bytes
        assert_eq!(encode(-1i64 as u64).len(), MAX_VARINT_LEN);

        let bytes = encode(u64::MAX);
        assert_eq!(get_varint(&mut bytes.as_slice()).unwrap(), u64::MAX);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
        for n in [0, -1, 1, i64::MAX, i64::MIN, -64, 63] {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn test_malformed_and_truncated() {
        let too_long = [0xffu8; 11];
        assert_eq!(get_varint(&mut &too_long[..]), Err(WireError::MalformedVarint));

        let overflow = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        assert_eq!(get_varint(&mut &overflow[..]), Err(WireError::MalformedVarint));

        let cut = [0x80u8];
        assert!(matches!(
            get_varint(&mut &cut[..]),
            Err(WireError::TruncatedMessage { .. })
        ));

        let short_payload = [0x05u8, b'a', b'b'];
        assert_eq!(
            get_length_delimited(&mut &short_payload[..]),
            Err(WireError::TruncatedMessage { needed: 5, remaining: 2 })
        );
    }

    #[test]
    fn test_tag() {
        let mut buf = Vec::new();
        put_tag(&mut buf, 1, WireKind::LengthDelimited);
        assert_eq!(buf, vec![0x0a]);
    }
}

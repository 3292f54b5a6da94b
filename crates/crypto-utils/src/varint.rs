//! Bitcoin's "CompactSize" variable-length integer encoding.

use crate::error::CodecError;

/// Encodes `n` as a Bitcoin varint.
///
/// `n < 0xfd` is a single byte; larger values are prefixed with `0xfd`/`0xfe`/
/// `0xff` followed by a little-endian 2/4/8-byte integer.
pub fn encode(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(n as u16).to_le_bytes());
        out
    } else if n <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xff];
        out.extend_from_slice(&n.to_le_bytes());
        out
    }
}

/// Decodes a varint starting at `buf[offset]`, returning `(value, next_offset)`.
pub fn read(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let prefix = *buf
        .get(offset)
        .ok_or(CodecError::VarintTruncated { needed: 1, have: buf.len().saturating_sub(offset) })?;

    match prefix {
        0xfd => {
            let bytes = read_n(buf, offset + 1, 2)?;
            Ok((u16::from_le_bytes([bytes[0], bytes[1]]) as u64, offset + 3))
        }
        0xfe => {
            let bytes = read_n(buf, offset + 1, 4)?;
            Ok((
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
                offset + 5,
            ))
        }
        0xff => {
            let bytes = read_n(buf, offset + 1, 8)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(bytes);
            Ok((u64::from_le_bytes(arr), offset + 9))
        }
        small => Ok((small as u64, offset + 1)),
    }
}

fn read_n(buf: &[u8], start: usize, n: usize) -> Result<&[u8], CodecError> {
    buf.get(start..start + n).ok_or(CodecError::VarintTruncated {
        needed: n,
        have: buf.len().saturating_sub(start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_single_byte_boundary() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(0xfc), vec![0xfc]);
    }

    #[test]
    fn encode_u16_boundary() {
        assert_eq!(encode(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode(0xffff), vec![0xfd, 0xff, 0xff]);
    }

    #[test]
    fn encode_u32_boundary() {
        let enc = encode(0x1_0000);
        assert_eq!(enc, vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn encode_u64_boundary() {
        let enc = encode(0x1_0000_0000);
        assert_eq!(enc[0], 0xff);
        assert_eq!(enc.len(), 9);
    }

    #[test]
    fn roundtrip_all_boundaries() {
        for n in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000, u64::MAX] {
            let enc = encode(n);
            let (decoded, consumed) = read(&enc, 0).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(consumed, enc.len());
        }
    }

    #[test]
    fn read_honors_offset() {
        let mut buf = vec![0xaa, 0xbb];
        buf.extend(encode(300));
        let (value, next) = read(&buf, 2).unwrap();
        assert_eq!(value, 300);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn read_truncated_fails() {
        let buf = [0xfd, 0x01];
        assert!(read(&buf, 0).is_err());
    }

    #[test]
    fn read_empty_fails() {
        assert!(read(&[], 0).is_err());
    }
}

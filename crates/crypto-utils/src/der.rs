//! BIP-62 low-s normalization and DER framing for ECDSA signatures.

use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};

/// The secp256k1 group order, `n`.
const ORDER_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Normalizes `s` to its low-s form (`s <- n - s` whenever `s > n/2`), per BIP-62.
pub fn normalize_low_s(s: &Scalar) -> Scalar {
    // n/2, precomputed as the floor division of the order by two.
    let half_order_bytes: [u8; 32] = {
        let mut half = ORDER_BYTES;
        let mut carry = 0u8;
        for byte in half.iter_mut() {
            let shifted = (carry << 7) | (*byte >> 1);
            carry = *byte & 1;
            *byte = shifted;
        }
        half
    };
    let half_order = Scalar::from_repr(FieldBytes::clone_from_slice(&half_order_bytes))
        .expect("n/2 is a valid canonical scalar");

    if is_greater(s, &half_order) {
        s.negate()
    } else {
        *s
    }
}

fn is_greater(a: &Scalar, b: &Scalar) -> bool {
    a.to_repr().as_slice() > b.to_repr().as_slice()
}

/// Big-endian integer bytes for a DER `INTEGER`, with a leading `0x00` added
/// if the high bit is set (so it is never mistaken for a negative number).
fn der_integer(value: &[u8]) -> Vec<u8> {
    // Strip leading zero bytes, keeping at least one.
    let mut trimmed = value;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// DER-encodes `(r, s)` as `30 len 02 lr r 02 ls s`. `s` is assumed already
/// low-s normalized by the caller.
pub fn encode_der(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    let r_int = der_integer(r);
    let s_int = der_integer(s);

    let mut body = Vec::with_capacity(4 + r_int.len() + s_int.len());
    body.push(0x02);
    body.push(r_int.len() as u8);
    body.extend_from_slice(&r_int);
    body.push(0x02);
    body.push(s_int.len() as u8);
    body.extend_from_slice(&s_int);

    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(0x30);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_integer_adds_leading_zero_for_high_bit() {
        let value = [0x80u8; 32];
        let encoded = der_integer(&value);
        assert_eq!(encoded[0], 0x00);
        assert_eq!(encoded.len(), 33);
    }

    #[test]
    fn der_integer_strips_leading_zeros() {
        let mut value = [0u8; 32];
        value[31] = 0x01;
        let encoded = der_integer(&value);
        assert_eq!(encoded, vec![0x01]);
    }

    #[test]
    fn der_integer_keeps_single_zero_for_zero_value() {
        let value = [0u8; 32];
        let encoded = der_integer(&value);
        assert_eq!(encoded, vec![0x00]);
    }

    #[test]
    fn encode_der_has_expected_framing() {
        let r = [0x01u8; 32];
        let s = [0x02u8; 32];
        let der = encode_der(&r, &s);
        assert_eq!(der[0], 0x30);
        assert_eq!(der[1] as usize, der.len() - 2);
        assert_eq!(der[2], 0x02);
    }

    #[test]
    fn normalize_low_s_leaves_small_s_untouched() {
        let s = Scalar::from(5u64);
        let normalized = normalize_low_s(&s);
        assert_eq!(normalized, s);
    }

    #[test]
    fn normalize_low_s_flips_high_s() {
        // 0 - 1 wraps to n - 1 mod n, certainly greater than n/2.
        let n_minus_one = Scalar::ZERO - Scalar::ONE;
        let normalized = normalize_low_s(&n_minus_one);
        assert_ne!(normalized, n_minus_one);
        // Normalizing twice is idempotent once already low.
        assert_eq!(normalize_low_s(&normalized), normalized);
    }

    #[test]
    fn normalized_s_repr_is_32_bytes() {
        let s = Scalar::from(123456789u64);
        let normalized = normalize_low_s(&s);
        assert_eq!(normalized.to_repr().as_slice().len(), 32);
    }
}

//! Signing: RFC-6979 deterministic ECDSA with low-s normalization, and
//! BIP-340 Schnorr with the BIP-341 Taproot key tweak.
//!
//! The curve arithmetic (scalar field ops, point multiplication, SEC1
//! encode/decode) comes from `k256`; the algorithms that compose it —
//! nonce derivation, challenge hashing, key tweaking — are built directly
//! against their respective BIPs.

use hmac::{Hmac, Mac};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, FieldBytes, ProjectivePoint, Scalar, U256};
use sha2::Sha256;

use crypto_utils::der;
use crypto_utils::hash::tagged_hash;

use crate::error::BtcError;

type HmacSha256 = Hmac<Sha256>;

fn reduce_to_scalar(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(bytes.into())
}

/// Parses a 32-byte big-endian scalar, rejecting zero and out-of-range values.
pub fn scalar_from_private_key(bytes: &[u8; 32]) -> Result<Scalar, BtcError> {
    let scalar = Scalar::from_repr(FieldBytes::clone_from_slice(bytes));
    let scalar = Option::<Scalar>::from(scalar)
        .ok_or_else(|| BtcError::InvalidKeyMaterial("private key scalar out of range".into()))?;
    if scalar == Scalar::ZERO {
        return Err(BtcError::InvalidKeyMaterial("private key must not be zero".into()));
    }
    Ok(scalar)
}

/// Derives the compressed SEC1 public key for a private scalar.
pub fn public_key_compressed(privkey: &Scalar) -> [u8; 33] {
    let point = (ProjectivePoint::GENERATOR * privkey).to_affine();
    let encoded = point.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(encoded.as_bytes());
    out
}

fn point_is_even_y(point: &AffinePoint) -> bool {
    point.to_encoded_point(true).as_bytes()[0] == 0x02
}

fn point_x_bytes(point: &AffinePoint) -> [u8; 32] {
    let encoded = point.to_encoded_point(false);
    let mut out = [0u8; 32];
    out.copy_from_slice(encoded.x().expect("uncompressed point has an x-coordinate"));
    out
}

/// The RFC-6979 HMAC-DRBG nonce stream for a given private key and message
/// digest. Each call to [`next`](Self::next) yields the next candidate
/// nonce; callers retry only in the (practically unreachable) case where a
/// candidate produces `r == 0` or `s == 0`.
struct Rfc6979Stream {
    k: [u8; 32],
    v: [u8; 32],
}

impl Rfc6979Stream {
    fn new(privkey: &Scalar, msg_hash: &[u8; 32]) -> Self {
        let x_bytes = privkey.to_repr();
        let h1_bytes = reduce_to_scalar(msg_hash).to_repr();

        let mut v = [0x01u8; 32];
        let mut k = [0x00u8; 32];

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        mac.update(&[0x00]);
        mac.update(&x_bytes);
        mac.update(&h1_bytes);
        k.copy_from_slice(&mac.finalize().into_bytes());

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        v.copy_from_slice(&mac.finalize().into_bytes());

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        mac.update(&[0x01]);
        mac.update(&x_bytes);
        mac.update(&h1_bytes);
        k.copy_from_slice(&mac.finalize().into_bytes());

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        v.copy_from_slice(&mac.finalize().into_bytes());

        Rfc6979Stream { k, v }
    }

    fn next(&mut self) -> Scalar {
        loop {
            let mut mac = HmacSha256::new_from_slice(&self.k).expect("hmac accepts any key length");
            mac.update(&self.v);
            self.v.copy_from_slice(&mac.finalize().into_bytes());

            let candidate = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(&self.v)));
            if let Some(candidate) = candidate {
                if candidate != Scalar::ZERO {
                    return candidate;
                }
            }

            let mut mac = HmacSha256::new_from_slice(&self.k).expect("hmac accepts any key length");
            mac.update(&self.v);
            mac.update(&[0x00]);
            self.k.copy_from_slice(&mac.finalize().into_bytes());

            let mut mac = HmacSha256::new_from_slice(&self.k).expect("hmac accepts any key length");
            mac.update(&self.v);
            self.v.copy_from_slice(&mac.finalize().into_bytes());
        }
    }
}

/// Produces a low-s DER signature with the sighash type byte appended, ready
/// to be placed directly in a scriptSig push or witness stack item.
pub fn ecdsa_sign_with_sighash_type(
    privkey: &Scalar,
    msg_hash: &[u8; 32],
    sighash_type: u8,
) -> Vec<u8> {
    let z = reduce_to_scalar(msg_hash);
    let mut nonces = Rfc6979Stream::new(privkey, msg_hash);

    loop {
        let k = nonces.next();
        let r_point = (ProjectivePoint::GENERATOR * k).to_affine();
        let r = reduce_to_scalar(&point_x_bytes(&r_point));
        if r == Scalar::ZERO {
            continue;
        }

        let k_inv = Option::<Scalar>::from(k.invert());
        let k_inv = match k_inv {
            Some(v) => v,
            None => continue,
        };
        let mut s = k_inv * (z + r * privkey);
        if s == Scalar::ZERO {
            continue;
        }
        s = der::normalize_low_s(&s);

        let r_bytes: [u8; 32] = r.to_repr().into();
        let s_bytes: [u8; 32] = s.to_repr().into();
        let mut sig = der::encode_der(&r_bytes, &s_bytes);
        sig.push(sighash_type);
        return sig;
    }
}

fn bip340_aux_tweak(privkey_bytes: &[u8; 32], aux_rand: &[u8; 32]) -> [u8; 32] {
    let aux_hash = tagged_hash("BIP0340/aux", aux_rand);
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = privkey_bytes[i] ^ aux_hash[i];
    }
    out
}

/// Produces a 64-byte BIP-340 Schnorr signature over `msg` (already the
/// appropriate 32-byte sighash) for `privkey`, which is internally adjusted
/// so the signed key's public point has even y, per the x-only convention.
pub fn schnorr_sign(privkey: &Scalar, msg: &[u8; 32], aux_rand: &[u8; 32]) -> [u8; 64] {
    let p = (ProjectivePoint::GENERATOR * privkey).to_affine();
    let d = if point_is_even_y(&p) { *privkey } else { -privkey };
    let pubkey_x = point_x_bytes(&p);

    let d_bytes: [u8; 32] = d.to_repr().into();
    let t = bip340_aux_tweak(&d_bytes, aux_rand);

    let mut nonce_input = Vec::with_capacity(96);
    nonce_input.extend_from_slice(&t);
    nonce_input.extend_from_slice(&pubkey_x);
    nonce_input.extend_from_slice(msg);
    let rand = tagged_hash("BIP0340/nonce", &nonce_input);

    let k_prime = reduce_to_scalar(&rand);
    debug_assert!(k_prime != Scalar::ZERO, "negligible-probability nonce collision");

    let r_point = (ProjectivePoint::GENERATOR * k_prime).to_affine();
    let k = if point_is_even_y(&r_point) { k_prime } else { -k_prime };
    let r_bytes = point_x_bytes(&r_point);

    let mut challenge_input = Vec::with_capacity(96);
    challenge_input.extend_from_slice(&r_bytes);
    challenge_input.extend_from_slice(&pubkey_x);
    challenge_input.extend_from_slice(msg);
    let e = reduce_to_scalar(&tagged_hash("BIP0340/challenge", &challenge_input));

    let s = k + e * d;
    let s_bytes: [u8; 32] = s.to_repr().into();

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&r_bytes);
    sig[32..].copy_from_slice(&s_bytes);
    sig
}

/// Applies the BIP-341 key-path tweak to a private key, returning a scalar
/// ready to feed directly into [`schnorr_sign`]. Key-path spends only: the
/// Merkle root is empty (bare Taproot output, no script-path alternative).
pub fn taproot_tweak_seckey(privkey: &Scalar) -> Scalar {
    let p = (ProjectivePoint::GENERATOR * privkey).to_affine();
    let d = if point_is_even_y(&p) { *privkey } else { -privkey };
    let internal_x = point_x_bytes(&p);
    let tweak = reduce_to_scalar(&tagged_hash("TapTweak", &internal_x));
    d + tweak
}

/// Computes the tweaked (output) x-only key for a given internal x-only
/// public key, as used to build the P2TR scriptPubKey / address.
pub fn taproot_output_key(internal_pubkey_x: &[u8; 32]) -> Result<[u8; 32], BtcError> {
    let x_field = FieldBytes::clone_from_slice(internal_pubkey_x);
    let point = Option::<AffinePoint>::from(AffinePoint::decompress(&x_field, 0u8.into()))
        .ok_or_else(|| BtcError::InvalidKeyMaterial("internal key is not a valid x-coordinate".into()))?;

    let tweak = reduce_to_scalar(&tagged_hash("TapTweak", internal_pubkey_x));
    let q = (ProjectivePoint::from(point) + ProjectivePoint::GENERATOR * tweak).to_affine();
    Ok(point_x_bytes(&q))
}

/// Sorts compressed pubkeys lexicographically by their serialized bytes, per
/// BIP-67, so a multisig redeem script has one canonical byte representation
/// regardless of the order participants were listed in.
pub fn bip67_sort(pubkeys: &mut [Vec<u8>]) {
    pubkeys.sort();
}

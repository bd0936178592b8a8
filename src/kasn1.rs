// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Helpers to (de)serialize the small ASN.1/DER structures this provider
//! needs: PKCS#1 DigestInfo wrappers and the named-curve encodings backing
//! CKA_EC_PARAMS / CKA_EC_POINT.

use crate::error::Result;
use crate::kms::DigestKind;
use crate::pkcs11::*;

use asn1;

pub const SHA256_OID: asn1::ObjectIdentifier =
    asn1::oid!(2, 16, 840, 1, 101, 3, 4, 2, 1);
pub const SHA384_OID: asn1::ObjectIdentifier =
    asn1::oid!(2, 16, 840, 1, 101, 3, 4, 2, 2);
pub const SHA512_OID: asn1::ObjectIdentifier =
    asn1::oid!(2, 16, 840, 1, 101, 3, 4, 2, 3);

pub const EC_SECP256R1_OID: asn1::ObjectIdentifier =
    asn1::oid!(1, 2, 840, 10045, 3, 1, 7);
pub const EC_SECP384R1_OID: asn1::ObjectIdentifier =
    asn1::oid!(1, 3, 132, 0, 34);

/// AlgorithmIdentifier restricted to the digest algorithms used in
/// PKCS#1 v1.5 DigestInfo structures; the parameters are always an
/// explicit NULL for the SHA-2 family
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
struct DigestAlgorithmIdentifier {
    oid: asn1::ObjectIdentifier,
    params: (),
}

/// Defined in RFC 8017 A.2.4
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
struct DigestInfo<'a> {
    algorithm: DigestAlgorithmIdentifier,
    digest: &'a [u8],
}

fn digest_oid(kind: DigestKind) -> asn1::ObjectIdentifier {
    match kind {
        DigestKind::Sha256 => SHA256_OID,
        DigestKind::Sha384 => SHA384_OID,
        DigestKind::Sha512 => SHA512_OID,
    }
}

fn digest_kind(oid: &asn1::ObjectIdentifier) -> Option<DigestKind> {
    if *oid == SHA256_OID {
        Some(DigestKind::Sha256)
    } else if *oid == SHA384_OID {
        Some(DigestKind::Sha384)
    } else if *oid == SHA512_OID {
        Some(DigestKind::Sha512)
    } else {
        None
    }
}

/// Wraps a raw digest in a DER DigestInfo for PKCS#1 v1.5 signing
pub fn build_digest_info(
    kind: DigestKind,
    digest: &[u8],
) -> Result<Vec<u8>> {
    Ok(asn1::write_single(&DigestInfo {
        algorithm: DigestAlgorithmIdentifier {
            oid: digest_oid(kind),
            params: (),
        },
        digest: digest,
    })?)
}

/// Parses a DER DigestInfo, returning the digest algorithm and the raw
/// digest bytes. Rejects structures with unknown digest OIDs or a digest
/// length that does not match the algorithm.
pub fn parse_digest_info(data: &[u8]) -> Result<(DigestKind, Vec<u8>)> {
    let info = asn1::parse_single::<DigestInfo>(data)
        .map_err(|_| CKR_DATA_INVALID)?;
    let kind = match digest_kind(&info.algorithm.oid) {
        Some(k) => k,
        None => return Err(CKR_DATA_INVALID)?,
    };
    let expected_len = match kind {
        DigestKind::Sha256 => 32,
        DigestKind::Sha384 => 48,
        DigestKind::Sha512 => 64,
    };
    if info.digest.len() != expected_len {
        return Err(CKR_DATA_LEN_RANGE)?;
    }
    Ok((kind, info.digest.to_vec()))
}

/// DER encoding of the namedCurve CHOICE for CKA_EC_PARAMS
pub fn ec_params_der(key_bit_length: usize) -> Result<Vec<u8>> {
    let oid = match key_bit_length {
        256 => EC_SECP256R1_OID,
        384 => EC_SECP384R1_OID,
        _ => return Err(CKR_GENERAL_ERROR)?,
    };
    Ok(asn1::write_single(&oid)?)
}

/// CKA_EC_POINT carries the uncompressed SEC1 point wrapped in a DER
/// OCTET STRING
pub fn ec_point_der(point: &[u8]) -> Result<Vec<u8>> {
    Ok(asn1::write_single(&point)?)
}

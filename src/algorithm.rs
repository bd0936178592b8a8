// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Per-algorithm descriptors tying a KMS CryptoKeyVersion algorithm to the
//! Cryptoki vocabulary: key type, key size, digest and the mechanisms the
//! key may be used with.

use crate::kms::{DigestKind, KmsAlgorithm};
use crate::pkcs11::*;

/// What a key is for, mirrors the KMS CryptoKey purpose
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyPurpose {
    AsymmetricDecrypt,
    AsymmetricSign,
    Mac,
    RawEncryptDecrypt,
}

#[derive(Clone, Copy, Debug)]
pub struct AlgorithmDetails {
    pub algorithm: KmsAlgorithm,
    pub purpose: KeyPurpose,
    pub key_type: CK_KEY_TYPE,
    pub key_bit_length: usize,
    /// The digest baked into the KMS algorithm; None for raw-data signers
    pub digest: Option<DigestKind>,
    /// The Cryptoki digest mechanism matching `digest`
    pub digest_mechanism: Option<CK_MECHANISM_TYPE>,
    /// Mechanisms a key of this algorithm may be used with
    pub allowed_mechanisms: &'static [CK_MECHANISM_TYPE],
}

impl AlgorithmDetails {
    /// Modulus / coordinate / key size in bytes
    pub fn key_byte_length(&self) -> usize {
        self.key_bit_length / 8
    }

    /// Length in bytes of the digest baked into the algorithm
    pub fn digest_length(&self) -> usize {
        match self.digest {
            Some(DigestKind::Sha256) => 32,
            Some(DigestKind::Sha384) => 48,
            Some(DigestKind::Sha512) => 64,
            None => 0,
        }
    }

    /// Length in bytes of signatures produced with this key
    pub fn signature_length(&self) -> usize {
        match self.key_type {
            /* P1363: r || s, each a coordinate wide */
            CKK_EC => self.key_byte_length() * 2,
            CKK_RSA => self.key_byte_length(),
            /* HMAC tag is as wide as the digest */
            _ => self.digest_length(),
        }
    }

    pub fn permits(&self, mechanism: CK_MECHANISM_TYPE) -> bool {
        self.allowed_mechanisms.contains(&mechanism)
    }
}

macro_rules! details {
    ($alg:ident, $purpose:ident, $ktype:expr, $bits:expr,
     $digest:expr, $dmech:expr, $mechs:expr) => {
        AlgorithmDetails {
            algorithm: KmsAlgorithm::$alg,
            purpose: KeyPurpose::$purpose,
            key_type: $ktype,
            key_bit_length: $bits,
            digest: $digest,
            digest_mechanism: $dmech,
            allowed_mechanisms: $mechs,
        }
    };
}

static ALGORITHMS: [AlgorithmDetails; 22] = [
    details!(
        EcSignP256Sha256,
        AsymmetricSign,
        CKK_EC,
        256,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_ECDSA, CKM_ECDSA_SHA256]
    ),
    details!(
        EcSignP384Sha384,
        AsymmetricSign,
        CKK_EC,
        384,
        Some(DigestKind::Sha384),
        Some(CKM_SHA384),
        &[CKM_ECDSA, CKM_ECDSA_SHA384]
    ),
    details!(
        RsaSignPkcs2048Sha256,
        AsymmetricSign,
        CKK_RSA,
        2048,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS, CKM_SHA256_RSA_PKCS]
    ),
    details!(
        RsaSignPkcs3072Sha256,
        AsymmetricSign,
        CKK_RSA,
        3072,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS, CKM_SHA256_RSA_PKCS]
    ),
    details!(
        RsaSignPkcs4096Sha256,
        AsymmetricSign,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS, CKM_SHA256_RSA_PKCS]
    ),
    details!(
        RsaSignPkcs4096Sha512,
        AsymmetricSign,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha512),
        Some(CKM_SHA512),
        &[CKM_RSA_PKCS, CKM_SHA512_RSA_PKCS]
    ),
    details!(
        RsaSignPss2048Sha256,
        AsymmetricSign,
        CKK_RSA,
        2048,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_PSS, CKM_SHA256_RSA_PKCS_PSS]
    ),
    details!(
        RsaSignPss3072Sha256,
        AsymmetricSign,
        CKK_RSA,
        3072,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_PSS, CKM_SHA256_RSA_PKCS_PSS]
    ),
    details!(
        RsaSignPss4096Sha256,
        AsymmetricSign,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_PSS, CKM_SHA256_RSA_PKCS_PSS]
    ),
    details!(
        RsaSignPss4096Sha512,
        AsymmetricSign,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha512),
        Some(CKM_SHA512),
        &[CKM_RSA_PKCS_PSS, CKM_SHA512_RSA_PKCS_PSS]
    ),
    details!(
        RsaSignRawPkcs2048,
        AsymmetricSign,
        CKK_RSA,
        2048,
        None,
        None,
        &[CKM_RSA_PKCS]
    ),
    details!(
        RsaSignRawPkcs3072,
        AsymmetricSign,
        CKK_RSA,
        3072,
        None,
        None,
        &[CKM_RSA_PKCS]
    ),
    details!(
        RsaSignRawPkcs4096,
        AsymmetricSign,
        CKK_RSA,
        4096,
        None,
        None,
        &[CKM_RSA_PKCS]
    ),
    details!(
        RsaDecryptOaep2048Sha256,
        AsymmetricDecrypt,
        CKK_RSA,
        2048,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_OAEP]
    ),
    details!(
        RsaDecryptOaep3072Sha256,
        AsymmetricDecrypt,
        CKK_RSA,
        3072,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_OAEP]
    ),
    details!(
        RsaDecryptOaep4096Sha256,
        AsymmetricDecrypt,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_RSA_PKCS_OAEP]
    ),
    details!(
        RsaDecryptOaep4096Sha512,
        AsymmetricDecrypt,
        CKK_RSA,
        4096,
        Some(DigestKind::Sha512),
        Some(CKM_SHA512),
        &[CKM_RSA_PKCS_OAEP]
    ),
    details!(
        HmacSha256,
        Mac,
        CKK_SHA256_HMAC,
        256,
        Some(DigestKind::Sha256),
        Some(CKM_SHA256),
        &[CKM_SHA256_HMAC]
    ),
    details!(
        HmacSha384,
        Mac,
        CKK_SHA384_HMAC,
        384,
        Some(DigestKind::Sha384),
        Some(CKM_SHA384),
        &[CKM_SHA384_HMAC]
    ),
    details!(
        HmacSha512,
        Mac,
        CKK_SHA512_HMAC,
        512,
        Some(DigestKind::Sha512),
        Some(CKM_SHA512),
        &[CKM_SHA512_HMAC]
    ),
    details!(
        Aes128Gcm,
        RawEncryptDecrypt,
        CKK_AES,
        128,
        None,
        None,
        &[CKM_CLOUDKMS_AES_GCM]
    ),
    details!(
        Aes256Gcm,
        RawEncryptDecrypt,
        CKK_AES,
        256,
        None,
        None,
        &[CKM_CLOUDKMS_AES_GCM]
    ),
];

/// Looks up the descriptor for a KMS algorithm; None means the algorithm
/// is not supported by this library and the key version is skipped.
pub fn details(algorithm: KmsAlgorithm) -> Option<&'static AlgorithmDetails> {
    ALGORITHMS.iter().find(|d| d.algorithm == algorithm)
}

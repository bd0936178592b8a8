// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! The per-session active operation and the mechanism dispatch that
//! creates it.
//!
//! Each operation variant owns its key reference and mechanism-validated
//! state; the session stores at most one operation at a time.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::kms::{KmsClient, KmsError, KmsStatus};
use crate::mechanism::ExperimentFlags;
use crate::object::Object;
use crate::pkcs11::*;

pub mod aes;
pub mod digesting;
pub mod hmac;
pub mod rsa;
pub mod ecdsa;

/// A single-shot or probed encryption
pub trait EncryptOp: Debug + Send {
    fn encrypt(
        &mut self,
        client: &dyn KmsClient,
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;
    /// Output size for the probe protocol, given the input size
    fn ciphertext_length(&self, plaintext_len: usize) -> usize;
}

/// A single-shot or probed decryption
pub trait DecryptOp: Debug + Send {
    fn decrypt(
        &mut self,
        client: &dyn KmsClient,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Signature creation; multipart entry points fail unless the mechanism
/// supports streaming input
pub trait SignOp: Debug + Send {
    fn sign(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
    ) -> Result<Vec<u8>>;
    fn sign_update(&mut self, _data: &[u8]) -> Result<()> {
        Err(CKR_FUNCTION_FAILED)?
    }
    fn sign_final(&mut self, _client: &dyn KmsClient) -> Result<Vec<u8>> {
        Err(CKR_FUNCTION_FAILED)?
    }
    /// Deterministic signature size for this key
    fn signature_length(&self) -> usize;
}

/// Signature verification; asymmetric checks run locally over the cached
/// public key, MACs round-trip through the service
pub trait VerifyOp: Debug + Send {
    fn verify(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()>;
    fn verify_update(&mut self, _data: &[u8]) -> Result<()> {
        Err(CKR_FUNCTION_FAILED)?
    }
    fn verify_final(
        &mut self,
        _client: &dyn KmsClient,
        _signature: &[u8],
    ) -> Result<()> {
        Err(CKR_FUNCTION_FAILED)?
    }
}

/// Object-browsing state: the filtered handles and a cursor
#[derive(Debug)]
pub struct FindOperation {
    handles: Vec<CK_OBJECT_HANDLE>,
    cursor: usize,
}

impl FindOperation {
    pub fn new(handles: Vec<CK_OBJECT_HANDLE>) -> FindOperation {
        FindOperation {
            handles: handles,
            cursor: 0,
        }
    }

    pub fn next_handles(&mut self, max: usize) -> &[CK_OBJECT_HANDLE] {
        let start = self.cursor;
        let end = std::cmp::min(start + max, self.handles.len());
        self.cursor = end;
        &self.handles[start..end]
    }
}

/// The tagged active operation of a session
#[derive(Debug)]
pub enum Operation {
    Find(FindOperation),
    Encrypt(Box<dyn EncryptOp>),
    Decrypt(Box<dyn DecryptOp>),
    Sign(Box<dyn SignOp>),
    Verify(Box<dyn VerifyOp>),
}

/// Shared entry checks for every cryptographic init, in the order the
/// Cryptoki error vocabulary requires: key type, then object class, then
/// whether the key's algorithm permits the mechanism at all.
pub(crate) fn check_key_preconditions(
    key_type: CK_KEY_TYPE,
    object_class: CK_OBJECT_CLASS,
    mechanism: CK_MECHANISM_TYPE,
    key: &Object,
) -> Result<()> {
    if key.algorithm().key_type != key_type {
        return Err(Error::invalid_argument(
            CKR_KEY_TYPE_INCONSISTENT,
            format!(
                "mechanism {:#x} requires key type {:#x}, but {} has \
                 key type {:#x}",
                mechanism,
                key_type,
                key.kms_key_name(),
                key.algorithm().key_type
            ),
        ));
    }
    if key.object_class() != object_class {
        return Err(Error::new(
            ErrorKind::PermissionDenied,
            CKR_KEY_FUNCTION_NOT_PERMITTED,
        )
        .with_errmsg(format!(
            "object class {:#x} of {} does not permit this operation",
            key.object_class(),
            key.kms_key_name()
        )));
    }
    if !key.algorithm().permits(mechanism) {
        return Err(Error::invalid_argument(
            CKR_MECHANISM_INVALID,
            format!(
                "mechanism {:#x} is not permitted for {}",
                mechanism,
                key.kms_key_name()
            ),
        ));
    }
    Ok(())
}

/// Reads mechanism parameters as a value of type T, enforcing the exact
/// structure size. An unaligned caller pointer is tolerated.
pub(crate) fn read_params<T: Copy>(mech: &CK_MECHANISM) -> Result<T> {
    if mech.ulParameterLen as usize != std::mem::size_of::<T>()
        || mech.pParameter.is_null()
    {
        return Err(Error::invalid_argument(
            CKR_MECHANISM_PARAM_INVALID,
            format!(
                "mechanism {:#x} parameters must be {} bytes, got {}",
                mech.mechanism,
                std::mem::size_of::<T>(),
                mech.ulParameterLen
            ),
        ));
    }
    Ok(unsafe { std::ptr::read_unaligned(mech.pParameter as *const T) })
}

/// Mechanisms without parameters must be invoked without any
pub(crate) fn require_no_params(mech: &CK_MECHANISM) -> Result<()> {
    if mech.ulParameterLen != 0 {
        return Err(Error::invalid_argument(
            CKR_MECHANISM_PARAM_INVALID,
            format!(
                "mechanism {:#x} does not take parameters",
                mech.mechanism
            ),
        ));
    }
    Ok(())
}

/// The EVP digest matching a KMS digest flavor, for the hashing APIs
pub(crate) fn message_digest(
    kind: crate::kms::DigestKind,
) -> openssl::hash::MessageDigest {
    match kind {
        crate::kms::DigestKind::Sha256 => {
            openssl::hash::MessageDigest::sha256()
        }
        crate::kms::DigestKind::Sha384 => {
            openssl::hash::MessageDigest::sha384()
        }
        crate::kms::DigestKind::Sha512 => {
            openssl::hash::MessageDigest::sha512()
        }
    }
}

/// Same digest as a Md reference, for the PkeyCtx APIs
pub(crate) fn md(kind: crate::kms::DigestKind) -> &'static openssl::md::MdRef {
    match kind {
        crate::kms::DigestKind::Sha256 => openssl::md::Md::sha256(),
        crate::kms::DigestKind::Sha384 => openssl::md::Md::sha384(),
        crate::kms::DigestKind::Sha512 => openssl::md::Md::sha512(),
    }
}

/// Maps a transport failure to the Cryptoki vocabulary: everything is a
/// device error unless the caller special-cases the status first.
pub(crate) fn kms_error(err: KmsError) -> Error {
    let kind = match err.status {
        KmsStatus::InvalidArgument => ErrorKind::InvalidArgument,
        KmsStatus::FailedPrecondition => ErrorKind::FailedPrecondition,
        KmsStatus::NotFound => ErrorKind::NotFound,
        KmsStatus::PermissionDenied => ErrorKind::PermissionDenied,
        KmsStatus::Unavailable | KmsStatus::DeadlineExceeded => {
            ErrorKind::Unavailable
        }
        _ => ErrorKind::Internal,
    };
    Error::new(kind, CKR_DEVICE_ERROR).with_origin(err)
}

pub fn new_encrypt_op(
    key: Arc<Object>,
    mech: &CK_MECHANISM,
    experiments: ExperimentFlags,
) -> Result<Box<dyn EncryptOp>> {
    match mech.mechanism {
        CKM_RSA_PKCS_OAEP => rsa::RsaOaepEncrypter::new(key, mech),
        CKM_CLOUDKMS_AES_GCM if experiments.raw_encryption_keys => {
            aes::CloudKmsAesGcmEncrypter::new(key, mech)
        }
        _ => Err(CKR_MECHANISM_INVALID)?,
    }
}

pub fn new_decrypt_op(
    key: Arc<Object>,
    mech: &CK_MECHANISM,
    experiments: ExperimentFlags,
) -> Result<Box<dyn DecryptOp>> {
    match mech.mechanism {
        CKM_RSA_PKCS_OAEP => rsa::RsaOaepDecrypter::new(key, mech),
        CKM_CLOUDKMS_AES_GCM if experiments.raw_encryption_keys => {
            aes::CloudKmsAesGcmDecrypter::new(key, mech)
        }
        _ => Err(CKR_MECHANISM_INVALID)?,
    }
}

pub fn new_sign_op(
    key: Arc<Object>,
    mech: &CK_MECHANISM,
    experiments: ExperimentFlags,
) -> Result<Box<dyn SignOp>> {
    match mech.mechanism {
        CKM_RSA_PKCS => rsa::RsaPkcs1Signer::new(key, mech),
        CKM_RSA_PKCS_PSS => rsa::RsaPssSigner::new(key, mech),
        CKM_ECDSA => ecdsa::EcdsaSigner::new(key, mech),
        CKM_SHA256_RSA_PKCS
        | CKM_SHA384_RSA_PKCS
        | CKM_SHA512_RSA_PKCS
        | CKM_SHA256_RSA_PKCS_PSS
        | CKM_SHA384_RSA_PKCS_PSS
        | CKM_SHA512_RSA_PKCS_PSS
        | CKM_ECDSA_SHA256
        | CKM_ECDSA_SHA384 => digesting::KmsDigestingSigner::new(key, mech),
        CKM_SHA256_HMAC | CKM_SHA384_HMAC | CKM_SHA512_HMAC
            if experiments.mac_keys =>
        {
            hmac::HmacSigner::new(key, mech)
        }
        _ => Err(CKR_MECHANISM_INVALID)?,
    }
}

pub fn new_verify_op(
    key: Arc<Object>,
    mech: &CK_MECHANISM,
    experiments: ExperimentFlags,
) -> Result<Box<dyn VerifyOp>> {
    match mech.mechanism {
        CKM_RSA_PKCS => rsa::RsaPkcs1Verifier::new(key, mech),
        CKM_RSA_PKCS_PSS => rsa::RsaPssVerifier::new(key, mech),
        CKM_ECDSA => ecdsa::EcdsaVerifier::new(key, mech),
        CKM_SHA256_RSA_PKCS
        | CKM_SHA384_RSA_PKCS
        | CKM_SHA512_RSA_PKCS
        | CKM_SHA256_RSA_PKCS_PSS
        | CKM_SHA384_RSA_PKCS_PSS
        | CKM_SHA512_RSA_PKCS_PSS
        | CKM_ECDSA_SHA256
        | CKM_ECDSA_SHA384 => digesting::KmsDigestingVerifier::new(key, mech),
        CKM_SHA256_HMAC | CKM_SHA384_HMAC | CKM_SHA512_HMAC
            if experiments.mac_keys =>
        {
            hmac::HmacVerifier::new(key, mech)
        }
        _ => Err(CKR_MECHANISM_INVALID)?,
    }
}

// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Abstract interface to the Key Management Service.
//!
//! The transport (RPC stubs, credentials, retries) lives outside this
//! crate; everything here is expressed against the [KmsClient] trait so
//! the provider can be driven by any client implementation, including the
//! in-memory fake used by the test suite.

use std::fmt::Debug;
use std::time::Duration;

/// Status codes of the KMS transport, mirroring the usual RPC vocabulary
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum KmsStatus {
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    PermissionDenied,
    Unavailable,
    DeadlineExceeded,
    Internal,
}

/// A failure reported by the KMS transport
#[derive(Debug)]
pub struct KmsError {
    pub status: KmsStatus,
    pub message: String,
}

impl KmsError {
    pub fn new(status: KmsStatus, message: impl Into<String>) -> KmsError {
        KmsError {
            status: status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> KmsError {
        KmsError::new(KmsStatus::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> KmsError {
        KmsError::new(KmsStatus::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> KmsError {
        KmsError::new(KmsStatus::Internal, message)
    }
}

impl std::fmt::Display for KmsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.status, self.message)
    }
}

impl std::error::Error for KmsError {}

pub type KmsResult<T> = std::result::Result<T, KmsError>;

/// The KMS algorithm of a CryptoKeyVersion
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum KmsAlgorithm {
    EcSignP256Sha256,
    EcSignP384Sha384,
    RsaSignPkcs2048Sha256,
    RsaSignPkcs3072Sha256,
    RsaSignPkcs4096Sha256,
    RsaSignPkcs4096Sha512,
    RsaSignPss2048Sha256,
    RsaSignPss3072Sha256,
    RsaSignPss4096Sha256,
    RsaSignPss4096Sha512,
    RsaSignRawPkcs2048,
    RsaSignRawPkcs3072,
    RsaSignRawPkcs4096,
    RsaDecryptOaep2048Sha256,
    RsaDecryptOaep3072Sha256,
    RsaDecryptOaep4096Sha256,
    RsaDecryptOaep4096Sha512,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    Aes128Gcm,
    Aes256Gcm,
}

/// Lifecycle state of a CryptoKeyVersion; only enabled versions become
/// token objects
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyVersionState {
    Enabled,
    Disabled,
    Other,
}

/// One versioned key in the backing KMS
#[derive(Clone, Debug)]
pub struct CryptoKeyVersion {
    /// Full resource name,
    /// .../cryptoKeys/{key}/cryptoKeyVersions/{version}
    pub name: String,
    pub algorithm: KmsAlgorithm,
    pub state: KeyVersionState,
}

impl CryptoKeyVersion {
    /// The CryptoKey ID component of the version name, used as CKA_LABEL
    pub fn crypto_key_id(&self) -> &str {
        let mut parts = self.name.rsplit('/');
        let _version = parts.next();
        let _versions_literal = parts.next();
        parts.next().unwrap_or(&self.name)
    }
}

/// Public key material returned by GetPublicKey
#[derive(Clone, Debug)]
pub struct PublicKey {
    /// X.509 SubjectPublicKeyInfo, PEM encoded
    pub pem: String,
}

/// Response of a RawEncrypt call
#[derive(Clone, Debug)]
pub struct RawEncryptResponse {
    pub ciphertext: Vec<u8>,
    /// IV actually used by the service (the caller-supplied one, echoed)
    pub iv: Vec<u8>,
}

/// The digest flavor accompanying an asymmetric sign request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestKind {
    Sha256,
    Sha384,
    Sha512,
}

/// Typed access to the subset of the KeyManagementService surface this
/// provider consumes. All calls are synchronous; the transport applies the
/// deadline configured at construction time.
pub trait KmsClient: Debug + Send + Sync {
    /// Decrypts ciphertext with an asymmetric decryption key version
    fn asymmetric_decrypt(
        &self,
        key_name: &str,
        ciphertext: &[u8],
    ) -> KmsResult<Vec<u8>>;

    /// Signs a precomputed digest with an asymmetric signing key version
    fn asymmetric_sign_digest(
        &self,
        key_name: &str,
        digest: DigestKind,
        digest_bytes: &[u8],
    ) -> KmsResult<Vec<u8>>;

    /// Signs raw data with an asymmetric signing key version that accepts
    /// full data (RSA_SIGN_RAW_PKCS1 algorithms)
    fn asymmetric_sign_data(
        &self,
        key_name: &str,
        data: &[u8],
    ) -> KmsResult<Vec<u8>>;

    /// Computes a MAC over data with a MAC key version
    fn mac_sign(&self, key_name: &str, data: &[u8]) -> KmsResult<Vec<u8>>;

    /// Verifies a MAC; Ok(false) means the tag did not match
    fn mac_verify(
        &self,
        key_name: &str,
        data: &[u8],
        mac: &[u8],
    ) -> KmsResult<bool>;

    /// Encrypts with a raw AES key version using the caller-supplied IV;
    /// the response ciphertext carries the tag appended (ciphertext||tag)
    fn raw_encrypt(
        &self,
        key_name: &str,
        plaintext: &[u8],
        iv: &[u8],
        aad: &[u8],
    ) -> KmsResult<RawEncryptResponse>;

    /// Decrypts with a raw AES key version
    fn raw_decrypt(
        &self,
        key_name: &str,
        ciphertext: &[u8],
        iv: &[u8],
        aad: &[u8],
    ) -> KmsResult<Vec<u8>>;

    /// Fetches the public half of an asymmetric key version
    fn get_public_key(&self, key_name: &str) -> KmsResult<PublicKey>;

    /// Lists all CryptoKeyVersions under a key ring. Pagination is the
    /// transport's concern; implementations return the flattened list.
    fn list_crypto_key_versions(
        &self,
        key_ring: &str,
    ) -> KmsResult<Vec<CryptoKeyVersion>>;

    /// Applies the configured per-RPC deadline. Called once at provider
    /// construction.
    fn set_rpc_timeout(&self, _timeout: Duration) {}

    /* Fork support hooks. The provider registers pthread_atfork handlers
     * that drive these; see the fork module for the ordering constraint
     * on the child side. */

    fn prepare_fork(&self) {}
    fn parent_after_fork(&self) {}
    fn child_after_fork(&self) {}
}

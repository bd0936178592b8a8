// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::error;
use std::fmt;

use crate::pkcs11;

/// The Result type used within the crate, wraps errors via the custom
/// Error object
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a failure independently of the PKCS#11 return value so that
/// tracing output stays meaningful after the CK_RV has been squeezed
/// through the Cryptoki error vocabulary.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidArgument,
    FailedPrecondition,
    PermissionDenied,
    NotFound,
    Internal,
    Unavailable,
    /// A buffer-probe failure; the required size travels in `reqsize`
    BufferTooSmall,
}

/// The crate's error object.
///
/// Every failure carries two channels: the abstract `ErrorKind` used for
/// logging, and the `CK_RV` handed back over the C ABI.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    /// The originating error, if a mapping occurred
    origin: Option<Box<dyn error::Error + Send + Sync>>,
    errmsg: Option<String>,
    /// Used only by ErrorKind::BufferTooSmall, indicates the required
    /// buffer size if the call is repeated
    reqsize: usize,
    /// The PKCS#11 CK_RV error code to be returned to the application
    ckrv: pkcs11::CK_RV,
}

impl Error {
    pub fn new(kind: ErrorKind, ckrv: pkcs11::CK_RV) -> Error {
        Error {
            kind: kind,
            origin: None,
            errmsg: None,
            reqsize: 0,
            ckrv: ckrv,
        }
    }

    /// Creates an error from a naked PKCS#11 error code; the kind is
    /// derived from the code
    pub fn ck_rv(ckrv: pkcs11::CK_RV) -> Error {
        Error::new(kind_for_rv(ckrv), ckrv)
    }

    pub fn with_errmsg(mut self, errmsg: String) -> Error {
        self.errmsg = Some(errmsg);
        self
    }

    pub fn with_origin<E>(mut self, error: E) -> Error
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        self.origin = Some(error.into());
        self
    }

    pub fn invalid_argument(ckrv: pkcs11::CK_RV, errmsg: String) -> Error {
        Error::new(ErrorKind::InvalidArgument, ckrv).with_errmsg(errmsg)
    }

    pub fn failed_precondition(ckrv: pkcs11::CK_RV, errmsg: String) -> Error {
        Error::new(ErrorKind::FailedPrecondition, ckrv).with_errmsg(errmsg)
    }

    pub fn not_found(ckrv: pkcs11::CK_RV, errmsg: String) -> Error {
        Error::new(ErrorKind::NotFound, ckrv).with_errmsg(errmsg)
    }

    pub fn internal(errmsg: String) -> Error {
        Error::new(ErrorKind::Internal, pkcs11::CKR_GENERAL_ERROR)
            .with_errmsg(errmsg)
    }

    /// Creates a BufferTooSmall error recording the required buffer size
    pub fn buf_too_small(reqsize: usize) -> Error {
        Error {
            kind: ErrorKind::BufferTooSmall,
            origin: None,
            errmsg: None,
            reqsize: reqsize,
            ckrv: pkcs11::CKR_BUFFER_TOO_SMALL,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the associated PKCS#11 error code
    pub fn rv(&self) -> pkcs11::CK_RV {
        self.ckrv
    }

    /// Replaces the PKCS#11 error code, keeping kind and origin.
    /// Used by entry points that must remap a generic code, e.g.
    /// CKR_OBJECT_HANDLE_INVALID to CKR_KEY_HANDLE_INVALID.
    pub fn set_rv(mut self, ckrv: pkcs11::CK_RV) -> Error {
        self.ckrv = ckrv;
        self
    }

    /// Returns the associated required buffer size
    pub fn reqsize(&self) -> usize {
        self.reqsize
    }
}

/// Default kind for errors constructed from a bare CK_RV
fn kind_for_rv(ckrv: pkcs11::CK_RV) -> ErrorKind {
    match ckrv {
        pkcs11::CKR_ARGUMENTS_BAD
        | pkcs11::CKR_ATTRIBUTE_TYPE_INVALID
        | pkcs11::CKR_ATTRIBUTE_VALUE_INVALID
        | pkcs11::CKR_DATA_INVALID
        | pkcs11::CKR_DATA_LEN_RANGE
        | pkcs11::CKR_ENCRYPTED_DATA_INVALID
        | pkcs11::CKR_ENCRYPTED_DATA_LEN_RANGE
        | pkcs11::CKR_MECHANISM_INVALID
        | pkcs11::CKR_MECHANISM_PARAM_INVALID
        | pkcs11::CKR_SIGNATURE_INVALID
        | pkcs11::CKR_SIGNATURE_LEN_RANGE
        | pkcs11::CKR_USER_TYPE_INVALID
        | pkcs11::CKR_SESSION_PARALLEL_NOT_SUPPORTED
        | pkcs11::CKR_KEY_TYPE_INCONSISTENT => ErrorKind::InvalidArgument,
        pkcs11::CKR_CRYPTOKI_NOT_INITIALIZED
        | pkcs11::CKR_CRYPTOKI_ALREADY_INITIALIZED
        | pkcs11::CKR_OPERATION_ACTIVE
        | pkcs11::CKR_OPERATION_NOT_INITIALIZED
        | pkcs11::CKR_USER_ALREADY_LOGGED_IN
        | pkcs11::CKR_USER_NOT_LOGGED_IN
        | pkcs11::CKR_FUNCTION_FAILED => ErrorKind::FailedPrecondition,
        pkcs11::CKR_KEY_FUNCTION_NOT_PERMITTED
        | pkcs11::CKR_TOKEN_WRITE_PROTECTED => ErrorKind::PermissionDenied,
        pkcs11::CKR_SLOT_ID_INVALID
        | pkcs11::CKR_SESSION_HANDLE_INVALID
        | pkcs11::CKR_OBJECT_HANDLE_INVALID
        | pkcs11::CKR_KEY_HANDLE_INVALID => ErrorKind::NotFound,
        pkcs11::CKR_DEVICE_ERROR => ErrorKind::Unavailable,
        pkcs11::CKR_BUFFER_TOO_SMALL => ErrorKind::BufferTooSmall,
        _ => ErrorKind::Internal,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref e) = self.errmsg {
            write!(f, "{:?}: {}", self.kind, e)
        } else if let Some(ref o) = self.origin {
            write!(f, "{:?}: {}", self.kind, o)
        } else if self.kind == ErrorKind::BufferTooSmall {
            write!(f, "buffer too small, required size: {}", self.reqsize)
        } else {
            write!(f, "{:?}: CK_RV {:#x}", self.kind, self.ckrv)
        }
    }
}

impl error::Error for Error {}

impl From<pkcs11::CK_RV> for Error {
    /// Maps a naked PKCS#11 error code to an Error
    fn from(ckrv: pkcs11::CK_RV) -> Error {
        Error::ck_rv(ckrv)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::new(ErrorKind::Internal, pkcs11::CKR_GENERAL_ERROR)
            .with_origin(error)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(error: std::num::TryFromIntError) -> Error {
        Error::new(ErrorKind::Internal, pkcs11::CKR_GENERAL_ERROR)
            .with_origin(error)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    /// Maps an OpenSSL error stack to a general error
    fn from(error: openssl::error::ErrorStack) -> Error {
        Error::new(ErrorKind::Internal, pkcs11::CKR_GENERAL_ERROR)
            .with_origin(error)
    }
}

impl From<asn1::ParseError> for Error {
    fn from(error: asn1::ParseError) -> Error {
        Error::new(ErrorKind::InvalidArgument, pkcs11::CKR_GENERAL_ERROR)
            .with_origin(error)
    }
}

impl From<asn1::WriteError> for Error {
    fn from(error: asn1::WriteError) -> Error {
        Error::new(ErrorKind::Internal, pkcs11::CKR_GENERAL_ERROR)
            .with_origin(error)
    }
}

/// Helper to map an error into a PKCS#11 error code error
macro_rules! map_err {
    ($map:expr, $err:expr) => {{
        use crate::error::Error;
        $map.map_err(|e| Error::ck_rv($err).with_origin(e))
    }};
}
pub(crate) use map_err;

// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::env;
use std::fs;

use crate::error::{Error, ErrorKind, Result};
use crate::pkcs11::{CKR_ARGUMENTS_BAD, CKR_GENERAL_ERROR};

use serde::Deserialize;
use toml;

/// Environment variable naming the configuration file used when
/// C_Initialize receives no explicit path in pReserved
pub const CONFIG_ENV: &str = "KMS_PKCS11_CONFIG";

const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

/// One configured token; each entry exposes the enabled key versions of a
/// single KMS key ring through one slot
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Full KMS key ring name,
    /// e.g. projects/p/locations/l/keyRings/kr
    pub key_ring: String,
    /// Token label reported in CK_TOKEN_INFO, defaults to the key ring ID
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    /// Gates HMAC sign/verify mechanisms
    #[serde(default)]
    pub experimental_mac_keys: bool,
    /// Gates the CKM_CLOUDKMS_AES_GCM vendor mechanism
    #[serde(default)]
    pub experimental_raw_encryption_keys: bool,
}

impl LibraryConfig {
    pub fn from_file(filename: &str) -> Result<LibraryConfig> {
        let config_str = fs::read_to_string(filename).map_err(|e| {
            Error::new(ErrorKind::NotFound, CKR_ARGUMENTS_BAD)
                .with_errmsg(format!("cannot read config file {}", filename))
                .with_origin(e)
        })?;
        let conf: LibraryConfig =
            toml::from_str(&config_str).map_err(|e| {
                Error::new(ErrorKind::InvalidArgument, CKR_GENERAL_ERROR)
                    .with_errmsg(format!("malformed config file {}", filename))
                    .with_origin(e)
            })?;
        Ok(conf)
    }

    pub fn from_environment() -> Result<LibraryConfig> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path),
            Err(_) => Err(Error::new(
                ErrorKind::FailedPrecondition,
                CKR_ARGUMENTS_BAD,
            )
            .with_errmsg(format!("{} is not set", CONFIG_ENV))),
        }
    }
}

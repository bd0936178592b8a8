// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::error::Result;
use crate::pkcs11::*;

/// Experiment gates for the non-standard mechanism families. Copied out
/// of the library configuration at provider construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExperimentFlags {
    pub mac_keys: bool,
    pub raw_encryption_keys: bool,
}

fn is_mac_mechanism(typ: CK_MECHANISM_TYPE) -> bool {
    matches!(typ, CKM_SHA256_HMAC | CKM_SHA384_HMAC | CKM_SHA512_HMAC)
}

fn is_raw_encryption_mechanism(typ: CK_MECHANISM_TYPE) -> bool {
    typ == CKM_CLOUDKMS_AES_GCM
}

impl ExperimentFlags {
    /// Whether a mechanism is visible under these gates
    pub fn permits(&self, typ: CK_MECHANISM_TYPE) -> bool {
        if is_mac_mechanism(typ) {
            return self.mac_keys;
        }
        if is_raw_encryption_mechanism(typ) {
            return self.raw_encryption_keys;
        }
        true
    }
}

macro_rules! mech_info {
    ($min:expr, $max:expr, $flags:expr) => {
        CK_MECHANISM_INFO {
            ulMinKeySize: $min,
            ulMaxKeySize: $max,
            flags: $flags,
        }
    };
}

static MECHANISMS: Lazy<BTreeMap<CK_MECHANISM_TYPE, CK_MECHANISM_INFO>> =
    Lazy::new(|| {
        let mut tree = BTreeMap::new();
        tree.insert(
            CKM_RSA_PKCS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_RSA_PKCS_OAEP,
            mech_info!(2048, 4096, CKF_HW | CKF_ENCRYPT | CKF_DECRYPT),
        );
        tree.insert(
            CKM_RSA_PKCS_PSS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA256_RSA_PKCS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA384_RSA_PKCS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA512_RSA_PKCS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA256_RSA_PKCS_PSS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA384_RSA_PKCS_PSS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA512_RSA_PKCS_PSS,
            mech_info!(2048, 4096, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_ECDSA,
            mech_info!(256, 384, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_ECDSA_SHA256,
            mech_info!(256, 256, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_ECDSA_SHA384,
            mech_info!(384, 384, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA256_HMAC,
            mech_info!(256, 256, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA384_HMAC,
            mech_info!(384, 384, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_SHA512_HMAC,
            mech_info!(512, 512, CKF_HW | CKF_SIGN | CKF_VERIFY),
        );
        tree.insert(
            CKM_CLOUDKMS_AES_GCM,
            mech_info!(128, 256, CKF_HW | CKF_ENCRYPT | CKF_DECRYPT),
        );
        tree
    });

/// The mechanism types this library supports under the given experiment
/// gates, in numeric order
pub fn mechanism_list(experiments: ExperimentFlags) -> Vec<CK_MECHANISM_TYPE> {
    MECHANISMS
        .keys()
        .cloned()
        .filter(|t| experiments.permits(*t))
        .collect()
}

pub fn mechanism_info(
    typ: CK_MECHANISM_TYPE,
    experiments: ExperimentFlags,
) -> Result<CK_MECHANISM_INFO> {
    if !experiments.permits(typ) {
        return Err(CKR_MECHANISM_INVALID)?;
    }
    match MECHANISMS.get(&typ) {
        Some(info) => Ok(*info),
        None => Err(CKR_MECHANISM_INVALID)?,
    }
}

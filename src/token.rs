// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::sync::{Arc, RwLock};

use log;

use crate::algorithm::{self, KeyPurpose};
use crate::config::TokenConfig;
use crate::error::{Error, Result};
use crate::kms::{KeyVersionState, KmsClient};
use crate::mechanism::ExperimentFlags;
use crate::object::Object;
use crate::operation::kms_error;
use crate::pkcs11::*;

static MANUFACTURER_ID: [CK_UTF8CHAR; 32] =
    *b"Google                          ";
static TOKEN_MODEL: [CK_UTF8CHAR; 16] = *b"Cloud KMS Token ";

/// Sentinel for the public (not logged in) state
const LOGGED_OUT: CK_USER_TYPE = CK_UNAVAILABLE_INFORMATION;

/// Space-pads `src` into the fixed-width info string `dst`, truncating
/// overlong input
fn copy_sized_string(src: &[u8], dst: &mut [u8]) {
    let len = std::cmp::min(src.len(), dst.len());
    dst[..len].copy_from_slice(&src[..len]);
    for b in dst[len..].iter_mut() {
        *b = b' ';
    }
}

/// A read-only view of one KMS key ring. The object table is filled once
/// at construction and never changes afterwards; only the login state is
/// mutable.
#[derive(Debug)]
pub struct Token {
    slot_info: CK_SLOT_INFO,
    token_info: CK_TOKEN_INFO,
    objects: Vec<Arc<Object>>,
    logged: RwLock<CK_USER_TYPE>,
}

impl Token {
    pub fn new(
        config: &TokenConfig,
        client: &dyn KmsClient,
        experiments: ExperimentFlags,
    ) -> Result<Token> {
        let mut slot_description = [b' '; 64];
        copy_sized_string(config.key_ring.as_bytes(), &mut slot_description);

        let label_str = match &config.label {
            Some(l) => l.clone(),
            None => config
                .key_ring
                .rsplit('/')
                .next()
                .unwrap_or(&config.key_ring)
                .to_string(),
        };
        let mut label = [b' '; 32];
        copy_sized_string(label_str.as_bytes(), &mut label);

        let mut token = Token {
            slot_info: CK_SLOT_INFO {
                slotDescription: slot_description,
                manufacturerID: MANUFACTURER_ID,
                flags: CKF_TOKEN_PRESENT,
                hardwareVersion: CK_VERSION { major: 0, minor: 0 },
                firmwareVersion: CK_VERSION { major: 0, minor: 0 },
            },
            token_info: CK_TOKEN_INFO {
                label: label,
                manufacturerID: MANUFACTURER_ID,
                model: TOKEN_MODEL,
                serialNumber: [b' '; 16],
                flags: CKF_WRITE_PROTECTED | CKF_TOKEN_INITIALIZED,
                ulMaxSessionCount: CK_EFFECTIVELY_INFINITE,
                ulSessionCount: CK_UNAVAILABLE_INFORMATION,
                ulMaxRwSessionCount: 0,
                ulRwSessionCount: CK_UNAVAILABLE_INFORMATION,
                ulMaxPinLen: 0,
                ulMinPinLen: 0,
                ulTotalPublicMemory: CK_UNAVAILABLE_INFORMATION,
                ulFreePublicMemory: CK_UNAVAILABLE_INFORMATION,
                ulTotalPrivateMemory: CK_UNAVAILABLE_INFORMATION,
                ulFreePrivateMemory: CK_UNAVAILABLE_INFORMATION,
                hardwareVersion: CK_VERSION { major: 0, minor: 0 },
                firmwareVersion: CK_VERSION { major: 0, minor: 0 },
                utcTime: *b"                ",
            },
            objects: Vec::new(),
            logged: RwLock::new(LOGGED_OUT),
        };

        token.load_objects(config, client, experiments)?;
        Ok(token)
    }

    /// Enumerates the key ring's enabled CryptoKeyVersions into the
    /// object table. Versions with algorithms this library does not
    /// handle, or whose family is experiment-gated off, are skipped.
    fn load_objects(
        &mut self,
        config: &TokenConfig,
        client: &dyn KmsClient,
        experiments: ExperimentFlags,
    ) -> Result<()> {
        let versions = client
            .list_crypto_key_versions(&config.key_ring)
            .map_err(kms_error)?;

        for ckv in versions {
            if ckv.state != KeyVersionState::Enabled {
                continue;
            }
            let details = match algorithm::details(ckv.algorithm) {
                Some(d) => d,
                None => {
                    log::warn!(
                        "skipping {}: unsupported algorithm {:?}",
                        ckv.name,
                        ckv.algorithm
                    );
                    continue;
                }
            };
            match details.purpose {
                KeyPurpose::AsymmetricSign
                | KeyPurpose::AsymmetricDecrypt => {
                    let public_key = client
                        .get_public_key(&ckv.name)
                        .map_err(kms_error)?;
                    let pair = Object::new_key_pair(&ckv, &public_key.pem)?;
                    self.objects.push(Arc::new(pair.public_key));
                    self.objects.push(Arc::new(pair.private_key));
                }
                KeyPurpose::Mac => {
                    if !experiments.mac_keys {
                        log::warn!(
                            "skipping {}: MAC keys are not enabled",
                            ckv.name
                        );
                        continue;
                    }
                    self.objects
                        .push(Arc::new(Object::new_secret_key(&ckv)?));
                }
                KeyPurpose::RawEncryptDecrypt => {
                    if !experiments.raw_encryption_keys {
                        log::warn!(
                            "skipping {}: raw encryption keys are not \
                             enabled",
                            ckv.name
                        );
                        continue;
                    }
                    self.objects
                        .push(Arc::new(Object::new_secret_key(&ckv)?));
                }
            }
        }
        log::info!(
            "token for {} loaded {} objects",
            config.key_ring,
            self.objects.len()
        );
        Ok(())
    }

    pub fn slot_info(&self) -> &CK_SLOT_INFO {
        &self.slot_info
    }

    pub fn token_info(&self) -> &CK_TOKEN_INFO {
        &self.token_info
    }

    pub fn session_info(&self, slot_id: CK_SLOT_ID) -> CK_SESSION_INFO {
        let state = match *self.logged.read().unwrap() {
            CKU_USER => CKS_RO_USER_FUNCTIONS,
            CKU_SO => CKS_RW_SO_FUNCTIONS,
            _ => CKS_RO_PUBLIC_SESSION,
        };
        CK_SESSION_INFO {
            slotID: slot_id,
            state: state,
            flags: CKF_SERIAL_SESSION,
            ulDeviceError: 0,
        }
    }

    /// PINs are ignored; the login state only influences session_info()
    pub fn login(&self, user_type: CK_USER_TYPE) -> Result<()> {
        match user_type {
            CKU_USER | CKU_SO => (),
            _ => return Err(CKR_USER_TYPE_INVALID)?,
        }
        let mut logged = self.logged.write().unwrap();
        if *logged == user_type {
            return Err(CKR_USER_ALREADY_LOGGED_IN)?;
        }
        if *logged != LOGGED_OUT {
            return Err(CKR_USER_ANOTHER_ALREADY_LOGGED_IN)?;
        }
        *logged = user_type;
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        let mut logged = self.logged.write().unwrap();
        if *logged == LOGGED_OUT {
            return Err(CKR_USER_NOT_LOGGED_IN)?;
        }
        *logged = LOGGED_OUT;
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Object handles are 1-based positions in enumeration order
    pub fn get_object(
        &self,
        handle: CK_OBJECT_HANDLE,
    ) -> Result<Arc<Object>> {
        if handle == CK_INVALID_HANDLE
            || handle as usize > self.objects.len()
        {
            return Err(Error::not_found(
                CKR_OBJECT_HANDLE_INVALID,
                format!("object handle {} is not valid", handle),
            ));
        }
        Ok(self.objects[handle as usize - 1].clone())
    }

    /// Handles of all objects whose attributes match the template
    /// byte-for-byte
    pub fn find_objects(
        &self,
        template: &[CK_ATTRIBUTE],
    ) -> Vec<CK_OBJECT_HANDLE> {
        let mut handles = Vec::new();
        for (idx, obj) in self.objects.iter().enumerate() {
            if obj.attributes().match_template(template) {
                handles.push((idx + 1) as CK_OBJECT_HANDLE);
            }
        }
        handles
    }
}

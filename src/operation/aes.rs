// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Raw AES-GCM through the vendor CKM_CLOUDKMS_AES_GCM mechanism. Both
//! directions shape a RawEncrypt/RawDecrypt request; no cipher state is
//! kept locally and multipart entry points are not offered.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kms::KmsClient;
use crate::object::Object;
use crate::operation::{
    check_key_preconditions, kms_error, read_params, DecryptOp, EncryptOp,
};
use crate::pkcs11::*;

const GCM_IV_LEN: CK_ULONG = 12;
const GCM_IV_BITS: CK_ULONG = 96;
const GCM_TAG_BITS: CK_ULONG = 128;
const GCM_TAG_LEN: usize = 16;

/// Validated copy of the caller's CK_GCM_PARAMS
#[derive(Debug)]
struct GcmParams {
    iv: Vec<u8>,
    aad: Vec<u8>,
}

fn validate_gcm_params(mech: &CK_MECHANISM) -> Result<GcmParams> {
    let params: CK_GCM_PARAMS = read_params(mech)?;

    if params.ulIvLen != GCM_IV_LEN
        || params.ulIvBits != GCM_IV_BITS
        || params.pIv.is_null()
    {
        return Err(Error::invalid_argument(
            CKR_MECHANISM_PARAM_INVALID,
            format!(
                "a {}-byte IV is required (got ulIvLen={}, ulIvBits={})",
                GCM_IV_LEN, params.ulIvLen, params.ulIvBits
            ),
        ));
    }
    if params.ulTagBits != GCM_TAG_BITS {
        return Err(Error::invalid_argument(
            CKR_MECHANISM_PARAM_INVALID,
            format!(
                "a {}-bit tag is required (got ulTagBits={})",
                GCM_TAG_BITS, params.ulTagBits
            ),
        ));
    }

    let iv = unsafe {
        std::slice::from_raw_parts(params.pIv, params.ulIvLen as usize)
    }
    .to_vec();
    let aad = if params.pAAD.is_null() || params.ulAADLen == 0 {
        Vec::new()
    } else {
        unsafe {
            std::slice::from_raw_parts(params.pAAD, params.ulAADLen as usize)
        }
        .to_vec()
    };
    Ok(GcmParams { iv: iv, aad: aad })
}

#[derive(Debug)]
pub struct CloudKmsAesGcmEncrypter {
    key: Arc<Object>,
    params: GcmParams,
}

impl CloudKmsAesGcmEncrypter {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn EncryptOp>> {
        check_key_preconditions(
            CKK_AES,
            CKO_SECRET_KEY,
            CKM_CLOUDKMS_AES_GCM,
            &key,
        )?;
        let params = validate_gcm_params(mech)?;
        Ok(Box::new(CloudKmsAesGcmEncrypter {
            key: key,
            params: params,
        }))
    }
}

impl EncryptOp for CloudKmsAesGcmEncrypter {
    fn encrypt(
        &mut self,
        client: &dyn KmsClient,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let resp = client
            .raw_encrypt(
                self.key.kms_key_name(),
                plaintext,
                &self.params.iv,
                &self.params.aad,
            )
            .map_err(kms_error)?;
        Ok(resp.ciphertext)
    }

    fn ciphertext_length(&self, plaintext_len: usize) -> usize {
        /* ciphertext || tag */
        plaintext_len + GCM_TAG_LEN
    }
}

#[derive(Debug)]
pub struct CloudKmsAesGcmDecrypter {
    key: Arc<Object>,
    params: GcmParams,
}

impl CloudKmsAesGcmDecrypter {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn DecryptOp>> {
        check_key_preconditions(
            CKK_AES,
            CKO_SECRET_KEY,
            CKM_CLOUDKMS_AES_GCM,
            &key,
        )?;
        let params = validate_gcm_params(mech)?;
        Ok(Box::new(CloudKmsAesGcmDecrypter {
            key: key,
            params: params,
        }))
    }
}

impl DecryptOp for CloudKmsAesGcmDecrypter {
    fn decrypt(
        &mut self,
        client: &dyn KmsClient,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        if ciphertext.len() < GCM_TAG_LEN {
            return Err(Error::invalid_argument(
                CKR_ENCRYPTED_DATA_LEN_RANGE,
                format!(
                    "ciphertext of length {} cannot carry a {}-byte tag",
                    ciphertext.len(),
                    GCM_TAG_LEN
                ),
            ));
        }
        client
            .raw_decrypt(
                self.key.kms_key_name(),
                ciphertext,
                &self.params.iv,
                &self.params.aad,
            )
            .map_err(kms_error)
    }
}

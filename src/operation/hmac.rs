// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! HMAC sign and verify. The key never leaves the KMS, so the input is
//! accumulated locally (single-shot or multipart) and shipped in one
//! MacSign/MacVerify request at the end.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kms::KmsClient;
use crate::object::Object;
use crate::operation::{
    check_key_preconditions, kms_error, require_no_params, SignOp, VerifyOp,
};
use crate::pkcs11::*;

fn hmac_key_type(mech_type: CK_MECHANISM_TYPE) -> Result<CK_KEY_TYPE> {
    match mech_type {
        CKM_SHA256_HMAC => Ok(CKK_SHA256_HMAC),
        CKM_SHA384_HMAC => Ok(CKK_SHA384_HMAC),
        CKM_SHA512_HMAC => Ok(CKK_SHA512_HMAC),
        _ => Err(Error::internal(format!(
            "mechanism {:#x} is not an HMAC mechanism",
            mech_type
        ))),
    }
}

/// Accumulated input shared by the signer and the verifier
#[derive(Debug)]
struct MacInput {
    data: Vec<u8>,
    single_shot: bool,
    multipart: bool,
}

impl MacInput {
    fn new() -> MacInput {
        MacInput {
            data: Vec::new(),
            single_shot: false,
            multipart: false,
        }
    }

    fn single_shot(&mut self, data: &[u8]) -> Result<&[u8]> {
        if self.multipart {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted multipart input".to_string(),
            ));
        }
        self.single_shot = true;
        self.data.extend_from_slice(data);
        Ok(&self.data)
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        if self.single_shot {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted single-shot input".to_string(),
            ));
        }
        self.multipart = true;
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<&[u8]> {
        if self.single_shot {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted single-shot input".to_string(),
            ));
        }
        Ok(&self.data)
    }
}

#[derive(Debug)]
pub struct HmacSigner {
    key: Arc<Object>,
    input: MacInput,
}

impl HmacSigner {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn SignOp>> {
        check_key_preconditions(
            hmac_key_type(mech.mechanism)?,
            CKO_SECRET_KEY,
            mech.mechanism,
            &key,
        )?;
        require_no_params(mech)?;
        Ok(Box::new(HmacSigner {
            key: key,
            input: MacInput::new(),
        }))
    }

    fn mac(&self, client: &dyn KmsClient, data: &[u8]) -> Result<Vec<u8>> {
        let tag = client
            .mac_sign(self.key.kms_key_name(), data)
            .map_err(kms_error)?;
        if tag.len() != self.key.algorithm().signature_length() {
            return Err(Error::internal(format!(
                "unexpected MAC length {} for {}",
                tag.len(),
                self.key.kms_key_name()
            )));
        }
        Ok(tag)
    }
}

impl SignOp for HmacSigner {
    fn sign(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        self.input.single_shot(data)?;
        self.mac(client, &self.input.data)
    }

    fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.input.update(data)
    }

    fn sign_final(&mut self, client: &dyn KmsClient) -> Result<Vec<u8>> {
        self.input.finalize()?;
        self.mac(client, &self.input.data)
    }

    fn signature_length(&self) -> usize {
        self.key.algorithm().signature_length()
    }
}

#[derive(Debug)]
pub struct HmacVerifier {
    key: Arc<Object>,
    input: MacInput,
}

impl HmacVerifier {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn VerifyOp>> {
        check_key_preconditions(
            hmac_key_type(mech.mechanism)?,
            CKO_SECRET_KEY,
            mech.mechanism,
            &key,
        )?;
        require_no_params(mech)?;
        Ok(Box::new(HmacVerifier {
            key: key,
            input: MacInput::new(),
        }))
    }

    fn check(
        &self,
        client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        if signature.len() != self.key.algorithm().signature_length() {
            return Err(Error::invalid_argument(
                CKR_SIGNATURE_LEN_RANGE,
                format!(
                    "MAC for this key must be {} bytes, got {}",
                    self.key.algorithm().signature_length(),
                    signature.len()
                ),
            ));
        }
        let success = client
            .mac_verify(self.key.kms_key_name(), data, signature)
            .map_err(kms_error)?;
        if !success {
            return Err(CKR_SIGNATURE_INVALID)?;
        }
        Ok(())
    }
}

impl VerifyOp for HmacVerifier {
    fn verify(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        self.input.single_shot(data)?;
        self.check(client, &self.input.data, signature)
    }

    fn verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.input.update(data)
    }

    fn verify_final(
        &mut self,
        client: &dyn KmsClient,
        signature: &[u8],
    ) -> Result<()> {
        self.input.finalize()?;
        self.check(client, &self.input.data, signature)
    }
}

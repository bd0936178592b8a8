// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Digesting signers and verifiers: a streaming hash wrapped around the
//! corresponding raw signer/verifier. For PKCS#1 v1.5 the finished digest
//! is wrapped in a DER DigestInfo before it reaches the inner operation;
//! PSS and ECDSA take the raw digest.
//!
//! A single operation accepts either one single-shot call or a sequence
//! of updates closed by a final call, never a mix.

use std::sync::Arc;

use openssl::hash::Hasher;

use crate::error::{Error, Result};
use crate::kasn1;
use crate::kms::{DigestKind, KmsClient};
use crate::object::Object;
use crate::operation::{
    check_key_preconditions, ecdsa, message_digest, rsa, SignOp, VerifyOp,
};
use crate::pkcs11::*;

/// How the finished digest is presented to the inner operation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DigestForm {
    DigestInfo,
    Raw,
}

/// Tracks which of the mutually exclusive input styles the caller chose
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InputStyle {
    Fresh,
    SingleShot,
    Multipart,
}

struct DigestingState {
    kind: DigestKind,
    form: DigestForm,
    hasher: Hasher,
    style: InputStyle,
}

impl std::fmt::Debug for DigestingState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DigestingState")
            .field("kind", &self.kind)
            .field("form", &self.form)
            .field("style", &self.style)
            .finish()
    }
}

impl DigestingState {
    fn new(kind: DigestKind, form: DigestForm) -> Result<DigestingState> {
        Ok(DigestingState {
            kind: kind,
            form: form,
            hasher: Hasher::new(message_digest(kind))?,
            style: InputStyle::Fresh,
        })
    }

    fn single_shot(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if self.style == InputStyle::Multipart {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted multipart input".to_string(),
            ));
        }
        self.style = InputStyle::SingleShot;
        self.hasher.update(data)?;
        self.finish()
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        if self.style == InputStyle::SingleShot {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted single-shot input".to_string(),
            ));
        }
        self.style = InputStyle::Multipart;
        self.hasher.update(data)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.style == InputStyle::SingleShot {
            return Err(Error::failed_precondition(
                CKR_FUNCTION_FAILED,
                "operation already accepted single-shot input".to_string(),
            ));
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let digest = self.hasher.finish()?;
        match self.form {
            DigestForm::DigestInfo => {
                kasn1::build_digest_info(self.kind, &digest)
            }
            DigestForm::Raw => Ok(digest.to_vec()),
        }
    }
}

/// Resolves a digesting mechanism to its key type, inner raw mechanism
/// and digest presentation
fn resolve(
    mech_type: CK_MECHANISM_TYPE,
) -> Result<(CK_KEY_TYPE, CK_MECHANISM_TYPE, DigestForm)> {
    match mech_type {
        CKM_SHA256_RSA_PKCS | CKM_SHA384_RSA_PKCS | CKM_SHA512_RSA_PKCS => {
            Ok((CKK_RSA, CKM_RSA_PKCS, DigestForm::DigestInfo))
        }
        CKM_SHA256_RSA_PKCS_PSS
        | CKM_SHA384_RSA_PKCS_PSS
        | CKM_SHA512_RSA_PKCS_PSS => {
            Ok((CKK_RSA, CKM_RSA_PKCS_PSS, DigestForm::Raw))
        }
        CKM_ECDSA_SHA256 | CKM_ECDSA_SHA384 => {
            Ok((CKK_EC, CKM_ECDSA, DigestForm::Raw))
        }
        _ => Err(Error::internal(format!(
            "mechanism {:#x} is not a digesting mechanism",
            mech_type
        ))),
    }
}

fn inner_mechanism(
    mech: &CK_MECHANISM,
    inner_type: CK_MECHANISM_TYPE,
) -> CK_MECHANISM {
    /* parameters are forwarded untouched; the inner operation validates
     * them against its own mechanism */
    CK_MECHANISM {
        mechanism: inner_type,
        pParameter: mech.pParameter,
        ulParameterLen: mech.ulParameterLen,
    }
}

#[derive(Debug)]
pub struct KmsDigestingSigner {
    inner: Box<dyn SignOp>,
    state: DigestingState,
}

impl KmsDigestingSigner {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn SignOp>> {
        let (key_type, inner_type, form) = resolve(mech.mechanism)?;
        check_key_preconditions(
            key_type,
            CKO_PRIVATE_KEY,
            mech.mechanism,
            &key,
        )?;
        let kind = match key.algorithm().digest {
            Some(k) => k,
            None => {
                return Err(Error::internal(format!(
                    "digesting mechanism on key {} without digest",
                    key.kms_key_name()
                )))
            }
        };
        let imech = inner_mechanism(mech, inner_type);
        let inner = match inner_type {
            CKM_RSA_PKCS => rsa::RsaPkcs1Signer::new(key, &imech)?,
            CKM_RSA_PKCS_PSS => rsa::RsaPssSigner::new(key, &imech)?,
            CKM_ECDSA => ecdsa::EcdsaSigner::new(key, &imech)?,
            _ => return Err(CKR_GENERAL_ERROR)?,
        };
        Ok(Box::new(KmsDigestingSigner {
            inner: inner,
            state: DigestingState::new(kind, form)?,
        }))
    }
}

impl SignOp for KmsDigestingSigner {
    fn sign(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let digest = self.state.single_shot(data)?;
        self.inner.sign(client, &digest)
    }

    fn sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.state.update(data)
    }

    fn sign_final(&mut self, client: &dyn KmsClient) -> Result<Vec<u8>> {
        let digest = self.state.finalize()?;
        self.inner.sign(client, &digest)
    }

    fn signature_length(&self) -> usize {
        self.inner.signature_length()
    }
}

#[derive(Debug)]
pub struct KmsDigestingVerifier {
    inner: Box<dyn VerifyOp>,
    state: DigestingState,
}

impl KmsDigestingVerifier {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn VerifyOp>> {
        let (key_type, inner_type, form) = resolve(mech.mechanism)?;
        check_key_preconditions(
            key_type,
            CKO_PUBLIC_KEY,
            mech.mechanism,
            &key,
        )?;
        let kind = match key.algorithm().digest {
            Some(k) => k,
            None => {
                return Err(Error::internal(format!(
                    "digesting mechanism on key {} without digest",
                    key.kms_key_name()
                )))
            }
        };
        let imech = inner_mechanism(mech, inner_type);
        let inner = match inner_type {
            CKM_RSA_PKCS => rsa::RsaPkcs1Verifier::new(key, &imech)?,
            CKM_RSA_PKCS_PSS => rsa::RsaPssVerifier::new(key, &imech)?,
            CKM_ECDSA => ecdsa::EcdsaVerifier::new(key, &imech)?,
            _ => return Err(CKR_GENERAL_ERROR)?,
        };
        Ok(Box::new(KmsDigestingVerifier {
            inner: inner,
            state: DigestingState::new(kind, form)?,
        }))
    }
}

impl VerifyOp for KmsDigestingVerifier {
    fn verify(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let digest = self.state.single_shot(data)?;
        self.inner.verify(client, &digest, signature)
    }

    fn verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.state.update(data)
    }

    fn verify_final(
        &mut self,
        client: &dyn KmsClient,
        signature: &[u8],
    ) -> Result<()> {
        let digest = self.state.finalize()?;
        self.inner.verify(client, &digest, signature)
    }
}

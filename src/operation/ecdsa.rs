// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! ECDSA operations. The KMS produces ASN.1 DER signatures while the
//! Cryptoki surface expects the fixed-width P1363 r||s form, so both
//! directions convert at this boundary.

use std::sync::Arc;

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;

use crate::error::{Error, Result};
use crate::kms::KmsClient;
use crate::object::Object;
use crate::operation::{
    check_key_preconditions, kms_error, require_no_params, SignOp, VerifyOp,
};
use crate::pkcs11::*;

/// DER signature to P1363, left-padding each integer to the coordinate
/// width
fn sig_der_to_p1363(der: &[u8], coord_len: usize) -> Result<Vec<u8>> {
    let sig = EcdsaSig::from_der(der)?;
    let mut out = sig.r().to_vec_padded(coord_len as i32)?;
    out.append(&mut sig.s().to_vec_padded(coord_len as i32)?);
    Ok(out)
}

/// P1363 signature to DER; the input length must be exactly twice the
/// coordinate width
fn sig_p1363_to_der(p1363: &[u8], coord_len: usize) -> Result<Vec<u8>> {
    let r = BigNum::from_slice(&p1363[..coord_len])?;
    let s = BigNum::from_slice(&p1363[coord_len..])?;
    Ok(EcdsaSig::from_private_components(r, s)?.to_der()?)
}

#[derive(Debug)]
pub struct EcdsaSigner {
    key: Arc<Object>,
}

impl EcdsaSigner {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn SignOp>> {
        check_key_preconditions(CKK_EC, CKO_PRIVATE_KEY, CKM_ECDSA, &key)?;
        require_no_params(mech)?;
        Ok(Box::new(EcdsaSigner { key: key }))
    }
}

impl SignOp for EcdsaSigner {
    fn sign(
        &mut self,
        client: &dyn KmsClient,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let kind = match self.key.algorithm().digest {
            Some(k) => k,
            None => {
                return Err(Error::internal(
                    "ECDSA key without digest".to_string(),
                ))
            }
        };
        if data.len() != self.key.algorithm().digest_length() {
            return Err(Error::invalid_argument(
                CKR_DATA_LEN_RANGE,
                format!(
                    "input for ECDSA signing must be a digest of length \
                     {}, got {}",
                    self.key.algorithm().digest_length(),
                    data.len()
                ),
            ));
        }

        let der = client
            .asymmetric_sign_digest(self.key.kms_key_name(), kind, data)
            .map_err(kms_error)?;
        let signature = sig_der_to_p1363(
            &der,
            self.key.algorithm().key_byte_length(),
        )?;
        if signature.len() != self.signature_length() {
            return Err(Error::internal(format!(
                "unexpected signature length {} for {}",
                signature.len(),
                self.key.kms_key_name()
            )));
        }
        Ok(signature)
    }

    fn signature_length(&self) -> usize {
        self.key.algorithm().signature_length()
    }
}

#[derive(Debug)]
pub struct EcdsaVerifier {
    key: Arc<Object>,
}

impl EcdsaVerifier {
    pub fn new(
        key: Arc<Object>,
        mech: &CK_MECHANISM,
    ) -> Result<Box<dyn VerifyOp>> {
        check_key_preconditions(CKK_EC, CKO_PUBLIC_KEY, CKM_ECDSA, &key)?;
        require_no_params(mech)?;
        Ok(Box::new(EcdsaVerifier { key: key }))
    }
}

impl VerifyOp for EcdsaVerifier {
    fn verify(
        &mut self,
        _client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        if data.len() != self.key.algorithm().digest_length() {
            return Err(Error::invalid_argument(
                CKR_DATA_LEN_RANGE,
                format!(
                    "input for ECDSA verification must be a digest of \
                     length {}, got {}",
                    self.key.algorithm().digest_length(),
                    data.len()
                ),
            ));
        }
        let coord_len = self.key.algorithm().key_byte_length();
        if signature.len() != coord_len * 2 {
            return Err(Error::invalid_argument(
                CKR_SIGNATURE_LEN_RANGE,
                format!(
                    "P1363 signature for this key must be {} bytes, \
                     got {}",
                    coord_len * 2,
                    signature.len()
                ),
            ));
        }

        let der = sig_p1363_to_der(signature, coord_len)?;
        let sig = EcdsaSig::from_der(&der)?;
        let ec_key = self.key.public_key()?.ec_key()?;
        match sig.verify(data, &ec_key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CKR_SIGNATURE_INVALID)?,
            Err(e) => {
                Err(Error::ck_rv(CKR_SIGNATURE_INVALID).with_origin(e))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn p1363_der_roundtrip() {
        let mut p1363 = vec![0u8; 64];
        p1363[0] = 0x80; /* forces DER INTEGER zero-prefix handling */
        p1363[31] = 0x01;
        p1363[63] = 0x02;
        let der = sig_p1363_to_der(&p1363, 32).unwrap();
        let back = sig_der_to_p1363(&der, 32).unwrap();
        assert_eq!(back, p1363);
    }
}

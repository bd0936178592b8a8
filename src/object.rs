// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use openssl::bn::BigNumContext;
use openssl::ec::PointConversionForm;
use openssl::pkey::{PKey, Public};

use crate::algorithm::{self, AlgorithmDetails, KeyPurpose};
use crate::attribute::{from_mech_array, AttributeMap};
use crate::error::{Error, Result};
use crate::kasn1;
use crate::kms::CryptoKeyVersion;
use crate::pkcs11::*;

/// A view of one KMS CryptoKeyVersion as a PKCS#11 object.
///
/// Objects are immutable once constructed and are shared between sessions;
/// the token that created them keeps them alive until Finalize.
pub struct Object {
    kms_key_name: String,
    algorithm: &'static AlgorithmDetails,
    object_class: CK_OBJECT_CLASS,
    attributes: AttributeMap,
    /// Parsed public half, present on public and private key objects of
    /// asymmetric versions; used for local verification and encryption
    public_key: Option<PKey<Public>>,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("kms_key_name", &self.kms_key_name)
            .field("algorithm", &self.algorithm.algorithm)
            .field("object_class", &self.object_class)
            .finish()
    }
}

/// The two objects derived from one asymmetric CryptoKeyVersion
#[derive(Debug)]
pub struct KeyPair {
    pub public_key: Object,
    pub private_key: Object,
}

impl Object {
    pub fn kms_key_name(&self) -> &str {
        &self.kms_key_name
    }

    pub fn algorithm(&self) -> &'static AlgorithmDetails {
        self.algorithm
    }

    pub fn object_class(&self) -> CK_OBJECT_CLASS {
        self.object_class
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn public_key(&self) -> Result<&PKey<Public>> {
        match &self.public_key {
            Some(k) => Ok(k),
            None => Err(Error::internal(format!(
                "no public key material for {}",
                self.kms_key_name
            ))),
        }
    }

    /// Builds the (public, private) object pair for an asymmetric
    /// CryptoKeyVersion from its X.509 SubjectPublicKeyInfo PEM.
    pub fn new_key_pair(
        ckv: &CryptoKeyVersion,
        public_key_pem: &str,
    ) -> Result<KeyPair> {
        let details = match algorithm::details(ckv.algorithm) {
            Some(d) => d,
            None => {
                return Err(Error::internal(format!(
                    "unsupported algorithm {:?} for {}",
                    ckv.algorithm, ckv.name
                )))
            }
        };
        let pkey = PKey::public_key_from_pem(public_key_pem.as_bytes())?;
        let spki_der = pkey.public_key_to_der()?;

        let mut public_attrs = common_attrs(ckv, details, CKO_PUBLIC_KEY);
        public_attrs
            .set_bool(CKA_ENCRYPT, details.purpose == KeyPurpose::AsymmetricDecrypt);
        public_attrs
            .set_bool(CKA_VERIFY, details.purpose == KeyPurpose::AsymmetricSign);
        public_attrs.set_bool(CKA_WRAP, false);
        public_attrs.set_bytes(CKA_PUBLIC_KEY_INFO, spki_der.clone());
        add_key_material_attrs(&mut public_attrs, details, &pkey)?;

        let mut private_attrs = common_attrs(ckv, details, CKO_PRIVATE_KEY);
        private_attrs
            .set_bool(CKA_DECRYPT, details.purpose == KeyPurpose::AsymmetricDecrypt);
        private_attrs
            .set_bool(CKA_SIGN, details.purpose == KeyPurpose::AsymmetricSign);
        private_attrs.set_bool(CKA_UNWRAP, false);
        private_attrs.set_bool(CKA_SENSITIVE, true);
        private_attrs.set_bool(CKA_ALWAYS_SENSITIVE, true);
        private_attrs.set_bool(CKA_EXTRACTABLE, false);
        private_attrs.set_bool(CKA_NEVER_EXTRACTABLE, true);
        private_attrs.set_bool(CKA_ALWAYS_AUTHENTICATE, false);
        private_attrs.set_bool(CKA_WRAP_WITH_TRUSTED, false);
        private_attrs.set_bytes(CKA_PUBLIC_KEY_INFO, spki_der);
        /* the public parameters are exposed on the private half too, so
         * that applications can correlate the pair without fetching the
         * public object */
        add_key_material_attrs(&mut private_attrs, details, &pkey)?;

        Ok(KeyPair {
            public_key: Object {
                kms_key_name: ckv.name.clone(),
                algorithm: details,
                object_class: CKO_PUBLIC_KEY,
                attributes: public_attrs,
                public_key: Some(pkey.clone()),
            },
            private_key: Object {
                kms_key_name: ckv.name.clone(),
                algorithm: details,
                object_class: CKO_PRIVATE_KEY,
                attributes: private_attrs,
                public_key: Some(pkey),
            },
        })
    }

    /// Builds the secret-key object for a MAC or raw encryption
    /// CryptoKeyVersion. The key material never leaves the KMS, so there
    /// is no CKA_VALUE; only the length is reported.
    pub fn new_secret_key(ckv: &CryptoKeyVersion) -> Result<Object> {
        let details = match algorithm::details(ckv.algorithm) {
            Some(d) => d,
            None => {
                return Err(Error::internal(format!(
                    "unsupported algorithm {:?} for {}",
                    ckv.algorithm, ckv.name
                )))
            }
        };
        let mut attrs = common_attrs(ckv, details, CKO_SECRET_KEY);
        attrs.set_ulong(
            CKA_VALUE_LEN,
            details.key_byte_length() as CK_ULONG,
        );
        attrs.set_bool(CKA_SENSITIVE, true);
        attrs.set_bool(CKA_ALWAYS_SENSITIVE, true);
        attrs.set_bool(CKA_EXTRACTABLE, false);
        attrs.set_bool(CKA_NEVER_EXTRACTABLE, true);
        let is_mac = details.purpose == KeyPurpose::Mac;
        let is_raw = details.purpose == KeyPurpose::RawEncryptDecrypt;
        attrs.set_bool(CKA_SIGN, is_mac);
        attrs.set_bool(CKA_VERIFY, is_mac);
        attrs.set_bool(CKA_ENCRYPT, is_raw);
        attrs.set_bool(CKA_DECRYPT, is_raw);

        Ok(Object {
            kms_key_name: ckv.name.clone(),
            algorithm: details,
            object_class: CKO_SECRET_KEY,
            attributes: attrs,
            public_key: None,
        })
    }
}

fn common_attrs(
    ckv: &CryptoKeyVersion,
    details: &'static AlgorithmDetails,
    class: CK_OBJECT_CLASS,
) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.set_ulong(CKA_CLASS, class);
    attrs.set_bool(CKA_TOKEN, true);
    attrs.set_bool(CKA_PRIVATE, false);
    attrs.set_bool(CKA_MODIFIABLE, false);
    attrs.set_bool(CKA_COPYABLE, false);
    attrs.set_bool(CKA_DESTROYABLE, false);
    attrs.set_string(CKA_LABEL, ckv.crypto_key_id().to_string());
    attrs.set_string(CKA_ID, ckv.name.clone());
    attrs.set_string(CKA_UNIQUE_ID, ckv.name.clone());
    attrs.set_ulong(CKA_KEY_TYPE, details.key_type);
    attrs.set_bool(CKA_LOCAL, true);
    attrs.set_ulong(CKA_KEY_GEN_MECHANISM, CK_UNAVAILABLE_INFORMATION);
    attrs.set(from_mech_array(
        CKA_ALLOWED_MECHANISMS,
        details.allowed_mechanisms,
    ));
    attrs
}

/// RSA modulus/exponent or EC params/point, shared by both halves of a
/// key pair
fn add_key_material_attrs(
    attrs: &mut AttributeMap,
    details: &'static AlgorithmDetails,
    pkey: &PKey<Public>,
) -> Result<()> {
    match details.key_type {
        CKK_RSA => {
            let rsa = pkey.rsa()?;
            attrs.set_bytes(CKA_MODULUS, rsa.n().to_vec());
            attrs.set_ulong(
                CKA_MODULUS_BITS,
                details.key_bit_length as CK_ULONG,
            );
            attrs.set_bytes(CKA_PUBLIC_EXPONENT, rsa.e().to_vec());
        }
        CKK_EC => {
            let ec = pkey.ec_key()?;
            let mut ctx = BigNumContext::new()?;
            let point = ec.public_key().to_bytes(
                ec.group(),
                PointConversionForm::UNCOMPRESSED,
                &mut ctx,
            )?;
            attrs.set_bytes(
                CKA_EC_PARAMS,
                kasn1::ec_params_der(details.key_bit_length)?,
            );
            attrs.set_bytes(CKA_EC_POINT, kasn1::ec_point_der(&point)?);
        }
        _ => {
            return Err(Error::internal(format!(
                "unexpected key type {:#x}",
                details.key_type
            )))
        }
    }
    Ok(())
}

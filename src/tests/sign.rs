// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use serial_test::serial;

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::PKey;
use openssl::rsa::Padding;
use openssl::sha::{sha256, sha384};

use super::*;
use crate::kasn1;
use crate::kms::{DigestKind, KmsAlgorithm};

fn raw_mechanism(mechanism: CK_MECHANISM_TYPE) -> CK_MECHANISM {
    CK_MECHANISM {
        mechanism: mechanism,
        pParameter: std::ptr::null_mut(),
        ulParameterLen: 0,
    }
}

fn pss_params(hash: CK_MECHANISM_TYPE, salt: CK_ULONG) -> CK_RSA_PKCS_PSS_PARAMS {
    let mgf = match hash {
        CKM_SHA512 => CKG_MGF1_SHA512,
        _ => CKG_MGF1_SHA256,
    };
    CK_RSA_PKCS_PSS_PARAMS {
        hashAlg: hash,
        mgf: mgf,
        sLen: salt,
    }
}

#[test]
fn ecdsa_multipart_signature_verifies_externally() {
    let fake = FakeKms::new();
    let key_name = fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();
    let private_key = token.get_object(2).unwrap();

    let mech = raw_mechanism(CKM_ECDSA_SHA256);
    session
        .sign_init(private_key, &mech, provider.experiments())
        .unwrap();
    session.sign_update(&[0xDE, 0xAD]).unwrap();
    session.sign_update(&[0xBE, 0xEF]).unwrap();
    assert_eq!(session.signature_length().unwrap(), 64);
    let signature = session.sign_final(provider.client()).unwrap();
    assert_eq!(signature.len(), 64);

    /* check against OpenSSL directly, over SHA256(DEADBEEF) */
    let digest = sha256(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let pkey =
        PKey::public_key_from_pem(fake.public_key_pem(&key_name).as_bytes())
            .unwrap();
    let r = BigNum::from_slice(&signature[..32]).unwrap();
    let s = BigNum::from_slice(&signature[32..]).unwrap();
    let sig = EcdsaSig::from_private_components(r, s).unwrap();
    assert!(sig.verify(&digest, &pkey.ec_key().unwrap()).unwrap());
}

#[test]
fn ecdsa_sign_verify_roundtrip() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"message to authenticate";
    let mech = raw_mechanism(CKM_ECDSA_SHA256);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature = session.sign(provider.client(), message).unwrap();
    session.release_operation();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session
        .verify(provider.client(), message, &signature)
        .unwrap();
    session.release_operation();

    /* a flipped bit must not verify */
    let mut bad = signature.clone();
    bad[10] ^= 0x40;
    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    let err = session
        .verify(provider.client(), message, &bad)
        .unwrap_err();
    assert_eq!(err.rv(), CKR_SIGNATURE_INVALID);
}

#[test]
fn ecdsa_p384_uses_sha384() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP384Sha384);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"p384 message";
    let mech = raw_mechanism(CKM_ECDSA_SHA384);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature = session.sign(provider.client(), message).unwrap();
    assert_eq!(signature.len(), 96);
    session.release_operation();

    /* raw CKM_ECDSA takes the precomputed digest */
    session
        .verify_init(
            token.get_object(1).unwrap(),
            &raw_mechanism(CKM_ECDSA),
            provider.experiments(),
        )
        .unwrap();
    session
        .verify(provider.client(), &sha384(message), &signature)
        .unwrap();
}

#[test]
fn mixing_multipart_and_single_shot_fails() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let mech = raw_mechanism(CKM_ECDSA_SHA256);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    session.sign_update(&[0x01]).unwrap();
    let err = session
        .sign(provider.client(), &[0x01])
        .unwrap_err();
    assert_eq!(err.rv(), CKR_FUNCTION_FAILED);
}

#[test]
fn single_shot_then_update_fails() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let token = provider.token_at(0).unwrap();

    let mech = raw_mechanism(CKM_ECDSA_SHA256);
    let mut op = crate::operation::new_sign_op(
        token.get_object(2).unwrap(),
        &mech,
        provider.experiments(),
    )
    .unwrap();
    op.sign(provider.client(), &[0x01]).unwrap();
    let err = op.sign_update(&[0x02]).unwrap_err();
    assert_eq!(err.rv(), CKR_FUNCTION_FAILED);
}

#[test]
fn multipart_not_offered_by_raw_mechanisms() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    session
        .sign_init(
            token.get_object(2).unwrap(),
            &raw_mechanism(CKM_ECDSA),
            provider.experiments(),
        )
        .unwrap();
    let err = session.sign_update(&[0x01]).unwrap_err();
    assert_eq!(err.rv(), CKR_FUNCTION_FAILED);
}

#[test]
fn sign_init_key_checks() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    fake.add_key(KR1, "rsa", KmsAlgorithm::RsaSignPkcs2048Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let mech = raw_mechanism(CKM_ECDSA_SHA256);

    /* public key: the class is wrong for signing */
    let err = session
        .sign_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_KEY_FUNCTION_NOT_PERMITTED);

    /* RSA private key: the key type is wrong for ECDSA */
    let err = session
        .sign_init(
            token.get_object(4).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_KEY_TYPE_INCONSISTENT);

    /* EC key of the right type but a mechanism its algorithm excludes */
    let err = session
        .sign_init(
            token.get_object(2).unwrap(),
            &raw_mechanism(CKM_ECDSA_SHA384),
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_INVALID);
}

#[test]
fn digesting_mechanism_rejects_parameters() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let mut bogus = [0u8; 1];
    let mech = CK_MECHANISM {
        mechanism: CKM_ECDSA_SHA256,
        pParameter: bogus.as_mut_ptr() as CK_VOID_PTR,
        ulParameterLen: bogus.len() as CK_ULONG,
    };
    let err = session
        .sign_init(
            token.get_object(2).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_PARAM_INVALID);
}

#[test]
fn ecdsa_raw_requires_digest_sized_input() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    session
        .sign_init(
            token.get_object(2).unwrap(),
            &raw_mechanism(CKM_ECDSA),
            provider.experiments(),
        )
        .unwrap();
    let err = session
        .sign(provider.client(), &[0u8; 20])
        .unwrap_err();
    assert_eq!(err.rv(), CKR_DATA_LEN_RANGE);
}

#[test]
fn rsa_pkcs1_digesting_roundtrip() {
    let fake = FakeKms::new();
    let key_name = fake.add_key(KR1, "rsa", KmsAlgorithm::RsaSignPkcs2048Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"sign me with rsa pkcs1";
    let mech = raw_mechanism(CKM_SHA256_RSA_PKCS);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature = session.sign(provider.client(), message).unwrap();
    assert_eq!(signature.len(), 256);
    session.release_operation();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session
        .verify(provider.client(), message, &signature)
        .unwrap();
    session.release_operation();

    /* the recovered padding payload is a SHA-256 DigestInfo */
    let pkey =
        PKey::public_key_from_pem(fake.public_key_pem(&key_name).as_bytes())
            .unwrap();
    let rsa = pkey.rsa().unwrap();
    let mut recovered = vec![0u8; rsa.size() as usize];
    let len = rsa
        .public_decrypt(&signature, &mut recovered, Padding::PKCS1)
        .unwrap();
    let expected =
        kasn1::build_digest_info(DigestKind::Sha256, &sha256(message))
            .unwrap();
    assert_eq!(&recovered[..len], expected.as_slice());
}

#[test]
fn rsa_pkcs1_raw_mechanism_takes_digest_info() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "rsa", KmsAlgorithm::RsaSignPkcs2048Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"pre-hashed by the caller";
    let digest_info =
        kasn1::build_digest_info(DigestKind::Sha256, &sha256(message))
            .unwrap();

    let mech = raw_mechanism(CKM_RSA_PKCS);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature =
        session.sign(provider.client(), &digest_info).unwrap();
    session.release_operation();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session
        .verify(provider.client(), &digest_info, &signature)
        .unwrap();
    session.release_operation();

    /* input that is not a matching DigestInfo is rejected */
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let err = session
        .sign(provider.client(), message)
        .unwrap_err();
    assert_eq!(err.rv(), CKR_DATA_INVALID);
}

#[test]
fn rsa_raw_pkcs1_signs_arbitrary_data() {
    let fake = FakeKms::new();
    let key_name = fake.add_key(KR1, "raw", KmsAlgorithm::RsaSignRawPkcs2048);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let data = b"no digest structure at all";
    let mech = raw_mechanism(CKM_RSA_PKCS);
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature = session.sign(provider.client(), data).unwrap();
    session.release_operation();

    let pkey =
        PKey::public_key_from_pem(fake.public_key_pem(&key_name).as_bytes())
            .unwrap();
    let rsa = pkey.rsa().unwrap();
    let mut recovered = vec![0u8; rsa.size() as usize];
    let len = rsa
        .public_decrypt(&signature, &mut recovered, Padding::PKCS1)
        .unwrap();
    assert_eq!(&recovered[..len], data);

    /* and verifies through the module as well */
    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session.verify(provider.client(), data, &signature).unwrap();
}

#[test]
fn rsa_pss_roundtrip_and_parameter_checks() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "pss", KmsAlgorithm::RsaSignPss2048Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"probabilistic padding";
    let mut params = pss_params(CKM_SHA256, 32);
    let mech = CK_MECHANISM {
        mechanism: CKM_SHA256_RSA_PKCS_PSS,
        pParameter: &mut params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_RSA_PKCS_PSS_PARAMS>()
            as CK_ULONG,
    };
    session
        .sign_init(token.get_object(2).unwrap(), &mech, provider.experiments())
        .unwrap();
    let signature = session.sign(provider.client(), message).unwrap();
    assert_eq!(signature.len(), 256);
    session.release_operation();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session
        .verify(provider.client(), message, &signature)
        .unwrap();
    session.release_operation();

    /* wrong salt length in the parameters */
    let mut bad = pss_params(CKM_SHA256, 20);
    let mech = CK_MECHANISM {
        mechanism: CKM_SHA256_RSA_PKCS_PSS,
        pParameter: &mut bad as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_RSA_PKCS_PSS_PARAMS>()
            as CK_ULONG,
    };
    let err = session
        .sign_init(
            token.get_object(2).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_PARAM_INVALID);

    /* wrong hash in the parameters */
    let mut bad = pss_params(CKM_SHA512, 32);
    let mech = CK_MECHANISM {
        mechanism: CKM_SHA256_RSA_PKCS_PSS,
        pParameter: &mut bad as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_RSA_PKCS_PSS_PARAMS>()
            as CK_ULONG,
    };
    let err = session
        .sign_init(
            token.get_object(2).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_PARAM_INVALID);
}

#[test]
fn hmac_sign_verify_roundtrip() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "mac", KmsAlgorithm::HmacSha256);
    let provider = test_provider(&fake, &[KR1], true, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let message = b"tag this message";
    let mech = raw_mechanism(CKM_SHA256_HMAC);
    session
        .sign_init(token.get_object(1).unwrap(), &mech, provider.experiments())
        .unwrap();
    assert_eq!(session.signature_length().unwrap(), 32);
    let tag = session.sign(provider.client(), message).unwrap();
    assert_eq!(tag.len(), 32);
    session.release_operation();

    /* multipart accumulation produces the same tag */
    session
        .sign_init(token.get_object(1).unwrap(), &mech, provider.experiments())
        .unwrap();
    session.sign_update(&message[..8]).unwrap();
    session.sign_update(&message[8..]).unwrap();
    let tag2 = session.sign_final(provider.client()).unwrap();
    assert_eq!(tag, tag2);
    session.release_operation();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    session.verify(provider.client(), message, &tag).unwrap();
    session.release_operation();

    /* a tampered tag is a signature failure, reported by the service */
    let mut bad = tag.clone();
    bad[0] ^= 1;
    session
        .verify_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap();
    let err = session
        .verify(provider.client(), message, &bad)
        .unwrap_err();
    assert_eq!(err.rv(), CKR_SIGNATURE_INVALID);
}

#[test]
fn hmac_requires_experiment() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let err = session
        .sign_init(
            token.get_object(2).unwrap(),
            &raw_mechanism(CKM_SHA256_HMAC),
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_INVALID);
}

#[test]
fn hmac_parameters_must_be_empty() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "mac", KmsAlgorithm::HmacSha256);
    let provider = test_provider(&fake, &[KR1], true, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    let mut bogus = [0u8; 2];
    let mech = CK_MECHANISM {
        mechanism: CKM_SHA256_HMAC,
        pParameter: bogus.as_mut_ptr() as CK_VOID_PTR,
        ulParameterLen: bogus.len() as CK_ULONG,
    };
    let err = session
        .sign_init(
            token.get_object(1).unwrap(),
            &mech,
            provider.experiments(),
        )
        .unwrap_err();
    assert_eq!(err.rv(), CKR_MECHANISM_PARAM_INVALID);
}

#[test]
fn verify_rejects_wrong_length_signature() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let provider = test_provider(&fake, &[KR1], false, false);
    let handle = provider.open_session(0).unwrap();
    let session = provider.get_session(handle).unwrap();
    let token = provider.token_at(0).unwrap();

    session
        .verify_init(
            token.get_object(1).unwrap(),
            &raw_mechanism(CKM_ECDSA),
            provider.experiments(),
        )
        .unwrap();
    let err = session
        .verify(provider.client(), &[0u8; 32], &[0u8; 63])
        .unwrap_err();
    assert_eq!(err.rv(), CKR_SIGNATURE_LEN_RANGE);
}

#[test]
#[serial]
fn sign_buffer_length_protocol() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut mech = raw_mechanism(CKM_ECDSA_SHA256);
    assert_eq!(fn_sign_init(session, &mut mech, 2), CKR_OK);

    let mut data = [0xDEu8, 0xAD, 0xBE, 0xEF];

    /* null signature buffer: exact size reported, nothing signed */
    let mut sig_len: CK_ULONG = 0;
    assert_eq!(
        fn_sign(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            std::ptr::null_mut(),
            &mut sig_len
        ),
        CKR_OK
    );
    assert_eq!(sig_len, 64);

    /* undersized: size reported, no partial signature */
    let mut short = [0u8; 32];
    sig_len = short.len() as CK_ULONG;
    assert_eq!(
        fn_sign(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            short.as_mut_ptr(),
            &mut sig_len
        ),
        CKR_BUFFER_TOO_SMALL
    );
    assert_eq!(sig_len, 64);
    assert_eq!(short, [0u8; 32]);

    /* adequate: signed, written, operation released */
    let mut sig = [0u8; 64];
    sig_len = sig.len() as CK_ULONG;
    assert_eq!(
        fn_sign(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            sig.as_mut_ptr(),
            &mut sig_len
        ),
        CKR_OK
    );
    assert_eq!(sig_len, 64);

    assert_eq!(
        fn_sign(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            std::ptr::null_mut(),
            &mut sig_len
        ),
        CKR_OPERATION_NOT_INITIALIZED
    );
}

#[test]
#[serial]
fn verify_through_entry_points() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut mech = raw_mechanism(CKM_ECDSA_SHA256);
    assert_eq!(fn_sign_init(session, &mut mech, 2), CKR_OK);

    let mut data = [0xDEu8, 0xAD, 0xBE, 0xEF];
    let mut sig = [0u8; 64];
    let mut sig_len = sig.len() as CK_ULONG;
    assert_eq!(
        fn_sign(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            sig.as_mut_ptr(),
            &mut sig_len
        ),
        CKR_OK
    );

    assert_eq!(fn_verify_init(session, &mut mech, 1), CKR_OK);
    assert_eq!(
        fn_verify(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            sig.as_mut_ptr(),
            sig_len
        ),
        CKR_OK
    );

    /* the verify released the operation */
    assert_eq!(
        fn_verify(
            session,
            data.as_mut_ptr(),
            data.len() as CK_ULONG,
            sig.as_mut_ptr(),
            sig_len
        ),
        CKR_OPERATION_NOT_INITIALIZED
    );

    /* multipart verification through the entry points */
    assert_eq!(fn_verify_init(session, &mut mech, 1), CKR_OK);
    assert_eq!(
        fn_verify_update(session, data.as_mut_ptr(), 2),
        CKR_OK
    );
    assert_eq!(
        fn_verify_update(session, unsafe { data.as_mut_ptr().add(2) }, 2),
        CKR_OK
    );
    assert_eq!(
        fn_verify_final(session, sig.as_mut_ptr(), sig_len),
        CKR_OK
    );
}

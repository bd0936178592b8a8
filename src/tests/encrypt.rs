// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use serial_test::serial;

use super::*;
use crate::kms::KmsAlgorithm;

fn oaep_mechanism(
    params: &mut CK_RSA_PKCS_OAEP_PARAMS,
) -> CK_MECHANISM {
    CK_MECHANISM {
        mechanism: CKM_RSA_PKCS_OAEP,
        pParameter: params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_RSA_PKCS_OAEP_PARAMS>()
            as CK_ULONG,
    }
}

fn oaep_params() -> CK_RSA_PKCS_OAEP_PARAMS {
    CK_RSA_PKCS_OAEP_PARAMS {
        hashAlg: CKM_SHA256,
        mgf: CKG_MGF1_SHA256,
        source: CKZ_DATA_SPECIFIED,
        pSourceData: std::ptr::null_mut(),
        ulSourceDataLen: 0,
    }
}

#[test]
#[serial]
fn oaep_encrypt_then_decrypt_roundtrip() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut plaintext = b"roundtrip through the public half".to_vec();

    /* encryption is local against the public key, handle 1 */
    let mut params = oaep_params();
    let mut mech = oaep_mechanism(&mut params);
    assert_eq!(fn_encrypt_init(session, &mut mech, 1), CKR_OK);

    let mut ct_len: CK_ULONG = 0;
    assert_eq!(
        fn_encrypt(
            session,
            plaintext.as_mut_ptr(),
            plaintext.len() as CK_ULONG,
            std::ptr::null_mut(),
            &mut ct_len
        ),
        CKR_OK
    );
    assert_eq!(ct_len, 256);

    let mut ciphertext = vec![0u8; ct_len as usize];
    assert_eq!(
        fn_encrypt(
            session,
            plaintext.as_mut_ptr(),
            plaintext.len() as CK_ULONG,
            ciphertext.as_mut_ptr(),
            &mut ct_len
        ),
        CKR_OK
    );
    assert_eq!(ct_len, 256);

    /* decrypt through the private half, handle 2 */
    let mut params = oaep_params();
    let mut mech = oaep_mechanism(&mut params);
    assert_eq!(fn_decrypt_init(session, &mut mech, 2), CKR_OK);

    let mut out_len: CK_ULONG = 0;
    assert_eq!(
        fn_decrypt(
            session,
            ciphertext.as_mut_ptr(),
            ct_len,
            std::ptr::null_mut(),
            &mut out_len
        ),
        CKR_OK
    );
    let mut recovered = vec![0u8; out_len as usize];
    assert_eq!(
        fn_decrypt(
            session,
            ciphertext.as_mut_ptr(),
            ct_len,
            recovered.as_mut_ptr(),
            &mut out_len
        ),
        CKR_OK
    );
    assert_eq!(recovered, plaintext);
}

#[test]
#[serial]
fn oaep_encrypt_rejects_oversized_plaintext() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut params = oaep_params();
    let mut mech = oaep_mechanism(&mut params);
    assert_eq!(fn_encrypt_init(session, &mut mech, 1), CKR_OK);

    /* 2048-bit modulus, SHA-256: at most 190 bytes fit */
    let mut big = vec![0u8; 191];
    let mut ct_len: CK_ULONG = 0;
    assert_eq!(
        fn_encrypt(
            session,
            big.as_mut_ptr(),
            big.len() as CK_ULONG,
            std::ptr::null_mut(),
            &mut ct_len
        ),
        CKR_DATA_LEN_RANGE
    );
}

#[test]
#[serial]
fn encrypt_init_requires_public_key() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut params = oaep_params();
    let mut mech = oaep_mechanism(&mut params);
    assert_eq!(
        fn_encrypt_init(session, &mut mech, 2),
        CKR_KEY_FUNCTION_NOT_PERMITTED
    );
}

#[test]
#[serial]
fn aes_gcm_roundtrip() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "raw", KmsAlgorithm::Aes256Gcm);
    let module = TestModule::initialize(&fake, &[KR1], false, true);
    let session = module.open_session(0);

    let mut iv = [7u8; 12];
    let mut aad = *b"additional data";
    let mut params = CK_GCM_PARAMS {
        pIv: iv.as_mut_ptr(),
        ulIvLen: 12,
        ulIvBits: 96,
        pAAD: aad.as_mut_ptr(),
        ulAADLen: aad.len() as CK_ULONG,
        ulTagBits: 128,
    };
    let mut mech = CK_MECHANISM {
        mechanism: CKM_CLOUDKMS_AES_GCM,
        pParameter: &mut params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_GCM_PARAMS>() as CK_ULONG,
    };

    let mut plaintext = b"raw encryption payload".to_vec();
    assert_eq!(fn_encrypt_init(session, &mut mech, 1), CKR_OK);
    let mut ct_len: CK_ULONG = 0;
    assert_eq!(
        fn_encrypt(
            session,
            plaintext.as_mut_ptr(),
            plaintext.len() as CK_ULONG,
            std::ptr::null_mut(),
            &mut ct_len
        ),
        CKR_OK
    );
    /* ciphertext plus the 16-byte tag */
    assert_eq!(ct_len as usize, plaintext.len() + 16);
    let mut ciphertext = vec![0u8; ct_len as usize];
    assert_eq!(
        fn_encrypt(
            session,
            plaintext.as_mut_ptr(),
            plaintext.len() as CK_ULONG,
            ciphertext.as_mut_ptr(),
            &mut ct_len
        ),
        CKR_OK
    );

    assert_eq!(fn_decrypt_init(session, &mut mech, 1), CKR_OK);
    let mut out_len: CK_ULONG = 0;
    assert_eq!(
        fn_decrypt(
            session,
            ciphertext.as_mut_ptr(),
            ct_len,
            std::ptr::null_mut(),
            &mut out_len
        ),
        CKR_OK
    );
    let mut recovered = vec![0u8; out_len as usize];
    assert_eq!(
        fn_decrypt(
            session,
            ciphertext.as_mut_ptr(),
            ct_len,
            recovered.as_mut_ptr(),
            &mut out_len
        ),
        CKR_OK
    );
    assert_eq!(recovered, plaintext);
}

#[test]
#[serial]
fn aes_gcm_parameter_validation() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "raw", KmsAlgorithm::Aes256Gcm);
    let module = TestModule::initialize(&fake, &[KR1], false, true);
    let session = module.open_session(0);

    let mut iv = [7u8; 16];
    let mut params = CK_GCM_PARAMS {
        pIv: iv.as_mut_ptr(),
        ulIvLen: 16,
        ulIvBits: 128,
        pAAD: std::ptr::null_mut(),
        ulAADLen: 0,
        ulTagBits: 128,
    };
    let mut mech = CK_MECHANISM {
        mechanism: CKM_CLOUDKMS_AES_GCM,
        pParameter: &mut params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_GCM_PARAMS>() as CK_ULONG,
    };
    assert_eq!(
        fn_encrypt_init(session, &mut mech, 1),
        CKR_MECHANISM_PARAM_INVALID
    );

    params.ulIvLen = 12;
    params.ulIvBits = 96;
    params.ulTagBits = 96;
    let mut mech = CK_MECHANISM {
        mechanism: CKM_CLOUDKMS_AES_GCM,
        pParameter: &mut params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_GCM_PARAMS>() as CK_ULONG,
    };
    assert_eq!(
        fn_encrypt_init(session, &mut mech, 1),
        CKR_MECHANISM_PARAM_INVALID
    );
}

#[test]
#[serial]
fn aes_gcm_requires_experiment() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    /* raw encryption keys disabled: the mechanism does not exist */
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut iv = [7u8; 12];
    let mut params = CK_GCM_PARAMS {
        pIv: iv.as_mut_ptr(),
        ulIvLen: 12,
        ulIvBits: 96,
        pAAD: std::ptr::null_mut(),
        ulAADLen: 0,
        ulTagBits: 128,
    };
    let mut mech = CK_MECHANISM {
        mechanism: CKM_CLOUDKMS_AES_GCM,
        pParameter: &mut params as *mut _ as CK_VOID_PTR,
        ulParameterLen: std::mem::size_of::<CK_GCM_PARAMS>() as CK_ULONG,
    };
    assert_eq!(
        fn_encrypt_init(session, &mut mech, 1),
        CKR_MECHANISM_INVALID
    );
}

// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use serial_test::serial;

use super::*;
use crate::kms::KmsAlgorithm;

#[test]
#[serial]
fn generate_random_fills_buffer() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    assert_eq!(
        fn_generate_random(session, first.as_mut_ptr(), 32),
        CKR_OK
    );
    assert_eq!(
        fn_generate_random(session, second.as_mut_ptr(), 32),
        CKR_OK
    );
    assert_ne!(first, [0u8; 32]);
    assert_ne!(first, second);

    /* zero-length requests are fine */
    assert_eq!(
        fn_generate_random(session, std::ptr::null_mut(), 0),
        CKR_OK
    );

    assert_eq!(
        fn_generate_random(99, first.as_mut_ptr(), 32),
        CKR_SESSION_HANDLE_INVALID
    );
}

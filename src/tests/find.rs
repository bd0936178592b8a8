// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use serial_test::serial;

use super::*;
use crate::kms::KmsAlgorithm;

#[test]
#[serial]
fn find_all_objects() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    /* a zero-count template is valid and matches everything */
    assert_eq!(
        fn_find_objects_init(session, std::ptr::null_mut(), 0),
        CKR_OK
    );
    let mut handles = [CK_INVALID_HANDLE; 8];
    let mut count: CK_ULONG = 0;
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 8, &mut count),
        CKR_OK
    );
    /* two key pairs, four objects */
    assert_eq!(count, 4);
    assert_eq!(fn_find_objects_final(session), CKR_OK);
}

#[test]
#[serial]
fn find_filters_by_class() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let class = CKO_PRIVATE_KEY;
    let mut template = [make_attribute!(
        CKA_CLASS,
        &class as *const _,
        std::mem::size_of::<CK_OBJECT_CLASS>()
    )];
    assert_eq!(
        fn_find_objects_init(session, template.as_mut_ptr(), 1),
        CKR_OK
    );
    let mut handles = [CK_INVALID_HANDLE; 8];
    let mut count: CK_ULONG = 0;
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 8, &mut count),
        CKR_OK
    );
    assert_eq!(count, 1);
    let private_handle = handles[0];

    /* cursor exhausted */
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 8, &mut count),
        CKR_OK
    );
    assert_eq!(count, 0);
    assert_eq!(fn_find_objects_final(session), CKR_OK);

    /* the found object is the private half */
    let mut class_out: CK_OBJECT_CLASS = 0;
    let mut read = [make_attribute!(
        CKA_CLASS,
        &mut class_out as *mut _,
        std::mem::size_of::<CK_OBJECT_CLASS>()
    )];
    assert_eq!(
        fn_get_attribute_value(
            session,
            private_handle,
            read.as_mut_ptr(),
            1
        ),
        CKR_OK
    );
    assert_eq!(class_out, CKO_PRIVATE_KEY);
}

#[test]
#[serial]
fn find_cursor_chunks() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    assert_eq!(
        fn_find_objects_init(session, std::ptr::null_mut(), 0),
        CKR_OK
    );
    let mut seen = Vec::new();
    loop {
        let mut handle = CK_INVALID_HANDLE;
        let mut count: CK_ULONG = 0;
        assert_eq!(
            fn_find_objects(session, &mut handle, 1, &mut count),
            CKR_OK
        );
        if count == 0 {
            break;
        }
        seen.push(handle);
    }
    assert_eq!(seen.len(), 4);
    /* handles are distinct */
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 4);
    assert_eq!(fn_find_objects_final(session), CKR_OK);
}

#[test]
#[serial]
fn find_respects_operation_lifecycle() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let mut handles = [CK_INVALID_HANDLE; 4];
    let mut count: CK_ULONG = 0;

    /* continue/finalize without an init */
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 4, &mut count),
        CKR_OPERATION_NOT_INITIALIZED
    );
    assert_eq!(
        fn_find_objects_final(session),
        CKR_OPERATION_NOT_INITIALIZED
    );

    /* a second init on the same session must be refused */
    assert_eq!(
        fn_find_objects_init(session, std::ptr::null_mut(), 0),
        CKR_OK
    );
    assert_eq!(
        fn_find_objects_init(session, std::ptr::null_mut(), 0),
        CKR_OPERATION_ACTIVE
    );
    assert_eq!(fn_find_objects_final(session), CKR_OK);

    /* after final, the session accepts a fresh operation */
    assert_eq!(
        fn_find_objects_init(session, std::ptr::null_mut(), 0),
        CKR_OK
    );
    assert_eq!(fn_find_objects_final(session), CKR_OK);
}

#[test]
#[serial]
fn find_with_unmatched_template() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let label = b"no-such-key";
    let mut template = [make_attribute!(
        CKA_LABEL,
        label.as_ptr(),
        label.len()
    )];
    assert_eq!(
        fn_find_objects_init(session, template.as_mut_ptr(), 1),
        CKR_OK
    );
    let mut handles = [CK_INVALID_HANDLE; 4];
    let mut count: CK_ULONG = 0;
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 4, &mut count),
        CKR_OK
    );
    assert_eq!(count, 0);
    assert_eq!(fn_find_objects_final(session), CKR_OK);
}

#[test]
#[serial]
fn find_by_label() {
    let fake = FakeKms::new();
    fake.add_key(KR1, "signer", KmsAlgorithm::EcSignP256Sha256);
    fake.add_key(KR1, "decrypter", KmsAlgorithm::RsaDecryptOaep2048Sha256);
    let module = TestModule::initialize(&fake, &[KR1], false, false);
    let session = module.open_session(0);

    let label = b"decrypter";
    let class = CKO_PRIVATE_KEY;
    let mut template = [
        make_attribute!(CKA_LABEL, label.as_ptr(), label.len()),
        make_attribute!(
            CKA_CLASS,
            &class as *const _,
            std::mem::size_of::<CK_OBJECT_CLASS>()
        ),
    ];
    assert_eq!(
        fn_find_objects_init(session, template.as_mut_ptr(), 2),
        CKR_OK
    );
    let mut handles = [CK_INVALID_HANDLE; 4];
    let mut count: CK_ULONG = 0;
    assert_eq!(
        fn_find_objects(session, handles.as_mut_ptr(), 4, &mut count),
        CKR_OK
    );
    assert_eq!(count, 1);
    assert_eq!(fn_find_objects_final(session), CKR_OK);
}

// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! A PKCS#11 (Cryptoki v2.40) provider that exposes keys held in a
//! remote Key Management Service as opaque token objects. Private key
//! material never enters the process; every private-key operation is
//! translated into an authenticated call against the KMS.

use std::ffi::CStr;
use std::sync::{Arc, RwLock};

pub mod pkcs11;

pub mod algorithm;
pub mod attribute;
pub mod config;
pub mod error;
pub mod kasn1;
pub mod kms;
pub mod log;
pub mod mechanism;
pub mod object;
pub mod operation;
pub mod provider;
pub mod session;
pub mod token;

mod fork;

use crate::config::LibraryConfig;
use crate::error::ErrorKind;
use crate::pkcs11::*;
use crate::provider::Provider;

use ::log::error;

/// The at-most-one provider instance of this process
static PROVIDER: RwLock<Option<Arc<Provider>>> = RwLock::new(None);

/// Constructs the KMS client used by the next C_Initialize. The
/// transport lives outside this crate; whoever links the final module
/// registers its client here before the host application initializes
/// the library.
pub type ClientFactory = Box<
    dyn Fn(&LibraryConfig) -> kms::KmsResult<Arc<dyn kms::KmsClient>>
        + Send
        + Sync,
>;

static CLIENT_FACTORY: RwLock<Option<ClientFactory>> = RwLock::new(None);

pub fn register_client_factory(factory: ClientFactory) {
    *CLIENT_FACTORY.write().unwrap() = Some(factory);
}

/// Clears the provider slot; used by C_Finalize and by the child side of
/// a fork
pub(crate) fn release_provider() {
    if let Ok(mut guard) = PROVIDER.write() {
        *guard = None;
    }
}

/// Runs f against the installed provider, if any
pub(crate) fn with_provider<F: FnOnce(&Provider)>(f: F) {
    if let Ok(guard) = PROVIDER.read() {
        if let Some(provider) = guard.as_ref() {
            f(provider);
        }
    }
}

fn err_to_rv(e: error::Error) -> CK_RV {
    match e.kind() {
        ErrorKind::Internal => error!("{}", e),
        _ => ::log::debug!("{}", e),
    }
    e.rv()
}

macro_rules! ret_to_rv {
    ($ret:expr) => {
        match $ret {
            Ok(()) => CKR_OK,
            Err(e) => err_to_rv(e),
        }
    };
}

/// Binds $prov to the installed provider for the duration of the entry
/// point; initialization and teardown order with the other entry points
/// comes from the provider slot lock
macro_rules! lock_provider {
    ($prov:ident) => {
        let guard = match PROVIDER.read() {
            Ok(g) => g,
            Err(_) => return CKR_GENERAL_ERROR,
        };
        let $prov = match guard.as_ref() {
            Some(p) => p,
            None => return CKR_CRYPTOKI_NOT_INITIALIZED,
        };
    };
}

macro_rules! res_or_ret {
    ($res:expr) => {
        match $res {
            Ok(x) => x,
            Err(e) => return err_to_rv(e),
        }
    };
}

macro_rules! bytes_to_slice {
    ($ptr:expr, $len:expr) => {
        if $len > 0 {
            unsafe {
                std::slice::from_raw_parts($ptr as *const u8, $len as usize)
            }
        } else {
            &[]
        }
    };
}

/// The length-probe protocol shared by every "give me a list of words"
/// call (slot list, mechanism list)
fn write_ulong_list(
    items: &[CK_ULONG],
    out: CK_ULONG_PTR,
    count: CK_ULONG_PTR,
) -> CK_RV {
    if count.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    if out.is_null() {
        unsafe { *count = items.len() as CK_ULONG };
        return CKR_OK;
    }
    if unsafe { *count } < items.len() as CK_ULONG {
        unsafe { *count = items.len() as CK_ULONG };
        return CKR_BUFFER_TOO_SMALL;
    }
    for (idx, item) in items.iter().enumerate() {
        unsafe { core::ptr::write(out.add(idx), *item) };
    }
    unsafe { *count = items.len() as CK_ULONG };
    CKR_OK
}

/// The length-probe protocol for byte output buffers: a null buffer asks
/// for the size, an undersized buffer gets the size and
/// CKR_BUFFER_TOO_SMALL with no partial bytes written
fn write_output(
    data: &[u8],
    out: CK_BYTE_PTR,
    out_len: CK_ULONG_PTR,
) -> CK_RV {
    if out.is_null() {
        unsafe { *out_len = data.len() as CK_ULONG };
        return CKR_OK;
    }
    if (unsafe { *out_len } as usize) < data.len() {
        unsafe { *out_len = data.len() as CK_ULONG };
        return CKR_BUFFER_TOO_SMALL;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), out, data.len());
        *out_len = data.len() as CK_ULONG;
    }
    CKR_OK
}

extern "C" fn fn_initialize(p_init_args: CK_VOID_PTR) -> CK_RV {
    let mut guard = match PROVIDER.write() {
        Ok(g) => g,
        Err(_) => return CKR_GENERAL_ERROR,
    };
    if guard.is_some() {
        return CKR_CRYPTOKI_ALREADY_INITIALIZED;
    }

    /* Not part of the standard, but libraries in the wild accept a
     * config file path in pInitArgs->pReserved, and the OpenSSL engine
     * passes one this way */
    let mut config_path: Option<String> = None;
    if !p_init_args.is_null() {
        let args =
            unsafe { *(p_init_args as *const CK_C_INITIALIZE_ARGS) };
        if !args.pReserved.is_null() {
            let path = match unsafe {
                CStr::from_ptr(args.pReserved as *const _)
            }
            .to_str()
            {
                Ok(p) => p,
                Err(_) => return CKR_ARGUMENTS_BAD,
            };
            config_path = Some(path.to_string());
        }
    }

    let conf = match config_path {
        Some(path) => LibraryConfig::from_file(&path),
        None => LibraryConfig::from_environment(),
    };
    let conf = res_or_ret!(conf);

    let client = {
        let factory = match CLIENT_FACTORY.read() {
            Ok(f) => f,
            Err(_) => return CKR_GENERAL_ERROR,
        };
        match factory.as_ref() {
            Some(f) => match f(&conf) {
                Ok(c) => c,
                Err(e) => {
                    error!("cannot construct KMS client: {}", e);
                    return CKR_GENERAL_ERROR;
                }
            },
            None => {
                error!("no KMS client factory registered");
                return CKR_GENERAL_ERROR;
            }
        }
    };

    let provider = res_or_ret!(Provider::new(&conf, client));
    if let Err(e) = fork::register_fork_handlers() {
        return err_to_rv(e);
    }
    *guard = Some(Arc::new(provider));
    CKR_OK
}

extern "C" fn fn_finalize(_reserved: CK_VOID_PTR) -> CK_RV {
    /* pReserved is defined as reserved; it is deliberately ignored */
    let mut guard = match PROVIDER.write() {
        Ok(g) => g,
        Err(_) => return CKR_GENERAL_ERROR,
    };
    if guard.is_none() {
        return CKR_CRYPTOKI_NOT_INITIALIZED;
    }
    *guard = None;
    CKR_OK
}

extern "C" fn fn_get_info(info: CK_INFO_PTR) -> CK_RV {
    lock_provider!(provider);
    if info.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    unsafe { core::ptr::write(info, *provider.info()) };
    CKR_OK
}

extern "C" fn fn_get_slot_list(
    _token_present: CK_BBOOL,
    slot_list: CK_SLOT_ID_PTR,
    count: CK_ULONG_PTR,
) -> CK_RV {
    /* token_present is ignored; these tokens are not removable */
    lock_provider!(provider);
    let slots: Vec<CK_SLOT_ID> =
        (0..provider.token_count() as CK_SLOT_ID).collect();
    write_ulong_list(&slots, slot_list, count)
}

extern "C" fn fn_get_slot_info(
    slot_id: CK_SLOT_ID,
    info: CK_SLOT_INFO_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let token = res_or_ret!(provider.token_at(slot_id));
    if info.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    unsafe { core::ptr::write(info, *token.slot_info()) };
    CKR_OK
}

extern "C" fn fn_get_token_info(
    slot_id: CK_SLOT_ID,
    info: CK_TOKEN_INFO_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let token = res_or_ret!(provider.token_at(slot_id));
    if info.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    unsafe { core::ptr::write(info, *token.token_info()) };
    CKR_OK
}

extern "C" fn fn_get_mechanism_list(
    slot_id: CK_SLOT_ID,
    mechanism_list: CK_MECHANISM_TYPE_PTR,
    count: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    res_or_ret!(provider.token_at(slot_id));
    let mechs = mechanism::mechanism_list(provider.experiments());
    write_ulong_list(&mechs, mechanism_list, count)
}

extern "C" fn fn_get_mechanism_info(
    slot_id: CK_SLOT_ID,
    mechanism_type: CK_MECHANISM_TYPE,
    info: CK_MECHANISM_INFO_PTR,
) -> CK_RV {
    lock_provider!(provider);
    res_or_ret!(provider.token_at(slot_id));
    if info.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let mech_info = res_or_ret!(mechanism::mechanism_info(
        mechanism_type,
        provider.experiments()
    ));
    unsafe { core::ptr::write(info, mech_info) };
    CKR_OK
}

extern "C" fn fn_open_session(
    slot_id: CK_SLOT_ID,
    flags: CK_FLAGS,
    _application: CK_VOID_PTR,
    _notify: CK_NOTIFY,
    ph_session: CK_SESSION_HANDLE_PTR,
) -> CK_RV {
    /* pApplication and Notify are ignored; notifications are not
     * supported */
    lock_provider!(provider);
    if flags & CKF_SERIAL_SESSION != CKF_SERIAL_SESSION {
        return CKR_SESSION_PARALLEL_NOT_SUPPORTED;
    }
    if flags & CKF_RW_SESSION == CKF_RW_SESSION {
        return CKR_TOKEN_WRITE_PROTECTED;
    }
    if ph_session.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let handle = res_or_ret!(provider.open_session(slot_id));
    unsafe { core::ptr::write(ph_session, handle) };
    CKR_OK
}

extern "C" fn fn_close_session(s_handle: CK_SESSION_HANDLE) -> CK_RV {
    lock_provider!(provider);
    ret_to_rv!(provider.close_session(s_handle))
}

extern "C" fn fn_close_all_sessions(slot_id: CK_SLOT_ID) -> CK_RV {
    lock_provider!(provider);
    ret_to_rv!(provider.close_all_sessions(slot_id))
}

extern "C" fn fn_get_session_info(
    s_handle: CK_SESSION_HANDLE,
    info: CK_SESSION_INFO_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if info.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let token = res_or_ret!(provider.token_at(session.slot_id()));
    unsafe {
        core::ptr::write(info, token.session_info(session.slot_id()))
    };
    CKR_OK
}

extern "C" fn fn_login(
    s_handle: CK_SESSION_HANDLE,
    user_type: CK_USER_TYPE,
    _pin: CK_UTF8CHAR_PTR,
    _pin_len: CK_ULONG,
) -> CK_RV {
    /* the PIN is ignored; authentication happens on the KMS channel */
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    let token = res_or_ret!(provider.token_at(session.slot_id()));
    ret_to_rv!(token.login(user_type))
}

extern "C" fn fn_logout(s_handle: CK_SESSION_HANDLE) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    let token = res_or_ret!(provider.token_at(session.slot_id()));
    ret_to_rv!(token.logout())
}

extern "C" fn fn_get_attribute_value(
    s_handle: CK_SESSION_HANDLE,
    o_handle: CK_OBJECT_HANDLE,
    template: CK_ATTRIBUTE_PTR,
    count: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    let token = res_or_ret!(provider.token_at(session.slot_id()));
    let object = res_or_ret!(token.get_object(o_handle));
    if template.is_null() {
        return CKR_ARGUMENTS_BAD;
    }

    let attrs: &mut [CK_ATTRIBUTE] = unsafe {
        std::slice::from_raw_parts_mut(template, count as usize)
    };

    /* every attribute is processed; the returned status is the last
     * non-OK outcome */
    let mut result = CKR_OK;
    for attr in attrs.iter_mut() {
        let value = match object.attributes().value(attr.type_) {
            Some(v) => v,
            None => {
                attr.ulValueLen = CK_UNAVAILABLE_INFORMATION;
                result = CKR_ATTRIBUTE_TYPE_INVALID;
                continue;
            }
        };
        if attr.pValue.is_null() {
            attr.ulValueLen = value.len() as CK_ULONG;
            continue;
        }
        if (attr.ulValueLen as usize) >= value.len() {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    value.as_ptr(),
                    attr.pValue as *mut u8,
                    value.len(),
                );
            }
            attr.ulValueLen = value.len() as CK_ULONG;
            continue;
        }
        attr.ulValueLen = CK_UNAVAILABLE_INFORMATION;
        result = CKR_BUFFER_TOO_SMALL;
    }
    result
}

extern "C" fn fn_find_objects_init(
    s_handle: CK_SESSION_HANDLE,
    template: CK_ATTRIBUTE_PTR,
    count: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    let token = res_or_ret!(provider.token_at(session.slot_id()));
    if count > 0 && template.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let tmpl: &[CK_ATTRIBUTE] = if count > 0 {
        unsafe { std::slice::from_raw_parts(template, count as usize) }
    } else {
        &[]
    };
    let handles = token.find_objects(tmpl);
    ret_to_rv!(session.find_objects_init(handles))
}

extern "C" fn fn_find_objects(
    s_handle: CK_SESSION_HANDLE,
    ph_object: CK_OBJECT_HANDLE_PTR,
    max_object_count: CK_ULONG,
    pul_object_count: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if ph_object.is_null() || pul_object_count.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let handles =
        res_or_ret!(session.find_objects(max_object_count as usize));
    for (idx, handle) in handles.iter().enumerate() {
        unsafe { core::ptr::write(ph_object.add(idx), *handle) };
    }
    unsafe { *pul_object_count = handles.len() as CK_ULONG };
    CKR_OK
}

extern "C" fn fn_find_objects_final(s_handle: CK_SESSION_HANDLE) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    ret_to_rv!(session.find_objects_final())
}

/// Object lookups on behalf of a cryptographic init report key errors,
/// not object errors
fn key_for_operation(
    provider: &Provider,
    s_handle: CK_SESSION_HANDLE,
    key_handle: CK_OBJECT_HANDLE,
) -> error::Result<(Arc<session::Session>, Arc<object::Object>)> {
    let session = provider.get_session(s_handle)?;
    let token = provider.token_at(session.slot_id())?;
    let key = match token.get_object(key_handle) {
        Ok(k) => k,
        Err(e) => {
            if e.rv() == CKR_OBJECT_HANDLE_INVALID {
                return Err(e.set_rv(CKR_KEY_HANDLE_INVALID));
            }
            return Err(e);
        }
    };
    Ok((session, key))
}

extern "C" fn fn_encrypt_init(
    s_handle: CK_SESSION_HANDLE,
    mechanism: CK_MECHANISM_PTR,
    key: CK_OBJECT_HANDLE,
) -> CK_RV {
    lock_provider!(provider);
    let (session, key) =
        res_or_ret!(key_for_operation(provider, s_handle, key));
    if mechanism.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let mech = unsafe { *mechanism };
    ret_to_rv!(session.encrypt_init(key, &mech, provider.experiments()))
}

extern "C" fn fn_encrypt(
    s_handle: CK_SESSION_HANDLE,
    data: CK_BYTE_PTR,
    data_len: CK_ULONG,
    encrypted_data: CK_BYTE_PTR,
    pul_encrypted_data_len: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if data.is_null() || pul_encrypted_data_len.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let plaintext = bytes_to_slice!(data, data_len);
    let ciphertext =
        res_or_ret!(session.encrypt(provider.client(), plaintext));
    let rv = write_output(
        &ciphertext,
        encrypted_data,
        pul_encrypted_data_len,
    );
    if rv == CKR_OK && !encrypted_data.is_null() {
        session.release_operation();
    }
    rv
}

extern "C" fn fn_decrypt_init(
    s_handle: CK_SESSION_HANDLE,
    mechanism: CK_MECHANISM_PTR,
    key: CK_OBJECT_HANDLE,
) -> CK_RV {
    lock_provider!(provider);
    let (session, key) =
        res_or_ret!(key_for_operation(provider, s_handle, key));
    if mechanism.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let mech = unsafe { *mechanism };
    ret_to_rv!(session.decrypt_init(key, &mech, provider.experiments()))
}

extern "C" fn fn_decrypt(
    s_handle: CK_SESSION_HANDLE,
    encrypted_data: CK_BYTE_PTR,
    encrypted_data_len: CK_ULONG,
    data: CK_BYTE_PTR,
    pul_data_len: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if encrypted_data.is_null() || pul_data_len.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let ciphertext = bytes_to_slice!(encrypted_data, encrypted_data_len);
    let plaintext =
        res_or_ret!(session.decrypt(provider.client(), ciphertext));
    let rv = write_output(&plaintext, data, pul_data_len);
    if rv == CKR_OK && !data.is_null() {
        session.release_operation();
    }
    rv
}

extern "C" fn fn_sign_init(
    s_handle: CK_SESSION_HANDLE,
    mechanism: CK_MECHANISM_PTR,
    key: CK_OBJECT_HANDLE,
) -> CK_RV {
    lock_provider!(provider);
    let (session, key) =
        res_or_ret!(key_for_operation(provider, s_handle, key));
    if mechanism.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let mech = unsafe { *mechanism };
    ret_to_rv!(session.sign_init(key, &mech, provider.experiments()))
}

extern "C" fn fn_sign(
    s_handle: CK_SESSION_HANDLE,
    data: CK_BYTE_PTR,
    data_len: CK_ULONG,
    signature: CK_BYTE_PTR,
    pul_signature_len: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if data.is_null() || pul_signature_len.is_null() {
        return CKR_ARGUMENTS_BAD;
    }

    /* probe calls are answered from the deterministic signature size,
     * without performing the signature */
    let sig_len = res_or_ret!(session.signature_length());
    if signature.is_null() {
        unsafe { *pul_signature_len = sig_len as CK_ULONG };
        return CKR_OK;
    }
    if (unsafe { *pul_signature_len } as usize) < sig_len {
        unsafe { *pul_signature_len = sig_len as CK_ULONG };
        return CKR_BUFFER_TOO_SMALL;
    }

    let input = bytes_to_slice!(data, data_len);
    let sig = res_or_ret!(session.sign(provider.client(), input));
    unsafe {
        std::ptr::copy_nonoverlapping(sig.as_ptr(), signature, sig.len());
        *pul_signature_len = sig.len() as CK_ULONG;
    }
    session.release_operation();
    CKR_OK
}

extern "C" fn fn_sign_update(
    s_handle: CK_SESSION_HANDLE,
    part: CK_BYTE_PTR,
    part_len: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if part.is_null() && part_len != 0 {
        return CKR_ARGUMENTS_BAD;
    }
    let data = bytes_to_slice!(part, part_len);
    ret_to_rv!(session.sign_update(data))
}

extern "C" fn fn_sign_final(
    s_handle: CK_SESSION_HANDLE,
    signature: CK_BYTE_PTR,
    pul_signature_len: CK_ULONG_PTR,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if pul_signature_len.is_null() {
        return CKR_ARGUMENTS_BAD;
    }

    let sig_len = res_or_ret!(session.signature_length());
    if signature.is_null() {
        unsafe { *pul_signature_len = sig_len as CK_ULONG };
        return CKR_OK;
    }
    if (unsafe { *pul_signature_len } as usize) < sig_len {
        unsafe { *pul_signature_len = sig_len as CK_ULONG };
        return CKR_BUFFER_TOO_SMALL;
    }

    let sig = res_or_ret!(session.sign_final(provider.client()));
    unsafe {
        std::ptr::copy_nonoverlapping(sig.as_ptr(), signature, sig.len());
        *pul_signature_len = sig.len() as CK_ULONG;
    }
    session.release_operation();
    CKR_OK
}

extern "C" fn fn_verify_init(
    s_handle: CK_SESSION_HANDLE,
    mechanism: CK_MECHANISM_PTR,
    key: CK_OBJECT_HANDLE,
) -> CK_RV {
    lock_provider!(provider);
    let (session, key) =
        res_or_ret!(key_for_operation(provider, s_handle, key));
    if mechanism.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let mech = unsafe { *mechanism };
    ret_to_rv!(session.verify_init(key, &mech, provider.experiments()))
}

extern "C" fn fn_verify(
    s_handle: CK_SESSION_HANDLE,
    data: CK_BYTE_PTR,
    data_len: CK_ULONG,
    signature: CK_BYTE_PTR,
    signature_len: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if data.is_null() || signature.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let input = bytes_to_slice!(data, data_len);
    let sig = bytes_to_slice!(signature, signature_len);
    res_or_ret!(session.verify(provider.client(), input, sig));
    session.release_operation();
    CKR_OK
}

extern "C" fn fn_verify_update(
    s_handle: CK_SESSION_HANDLE,
    part: CK_BYTE_PTR,
    part_len: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if part.is_null() && part_len != 0 {
        return CKR_ARGUMENTS_BAD;
    }
    let data = bytes_to_slice!(part, part_len);
    ret_to_rv!(session.verify_update(data))
}

extern "C" fn fn_verify_final(
    s_handle: CK_SESSION_HANDLE,
    signature: CK_BYTE_PTR,
    signature_len: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    let session = res_or_ret!(provider.get_session(s_handle));
    if signature.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    let sig = bytes_to_slice!(signature, signature_len);
    res_or_ret!(session.verify_final(provider.client(), sig));
    session.release_operation();
    CKR_OK
}

extern "C" fn fn_generate_random(
    s_handle: CK_SESSION_HANDLE,
    random_data: CK_BYTE_PTR,
    random_len: CK_ULONG,
) -> CK_RV {
    lock_provider!(provider);
    res_or_ret!(provider.get_session(s_handle));
    if random_data.is_null() && random_len != 0 {
        return CKR_ARGUMENTS_BAD;
    }
    if random_len == 0 {
        return CKR_OK;
    }
    let buf: &mut [u8] = unsafe {
        std::slice::from_raw_parts_mut(random_data, random_len as usize)
    };
    match openssl::rand::rand_bytes(buf) {
        Ok(()) => CKR_OK,
        Err(e) => {
            error!("rng failure: {}", e);
            CKR_RANDOM_NO_RNG
        }
    }
}

/* Entry points outside this library's read-only, KMS-backed feature set */

extern "C" fn fn_init_token(
    _slot_id: CK_SLOT_ID,
    _pin: CK_UTF8CHAR_PTR,
    _pin_len: CK_ULONG,
    _label: CK_UTF8CHAR_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_init_pin(
    _session: CK_SESSION_HANDLE,
    _pin: CK_UTF8CHAR_PTR,
    _pin_len: CK_ULONG,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_set_pin(
    _session: CK_SESSION_HANDLE,
    _old_pin: CK_UTF8CHAR_PTR,
    _old_len: CK_ULONG,
    _new_pin: CK_UTF8CHAR_PTR,
    _new_len: CK_ULONG,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_get_operation_state(
    _session: CK_SESSION_HANDLE,
    _operation_state: CK_BYTE_PTR,
    _pul_operation_state_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_set_operation_state(
    _session: CK_SESSION_HANDLE,
    _operation_state: CK_BYTE_PTR,
    _operation_state_len: CK_ULONG,
    _encryption_key: CK_OBJECT_HANDLE,
    _authentication_key: CK_OBJECT_HANDLE,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_create_object(
    _session: CK_SESSION_HANDLE,
    _template: CK_ATTRIBUTE_PTR,
    _count: CK_ULONG,
    _object_handle: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_copy_object(
    _session: CK_SESSION_HANDLE,
    _object: CK_OBJECT_HANDLE,
    _template: CK_ATTRIBUTE_PTR,
    _count: CK_ULONG,
    _ph_new_object: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_destroy_object(
    _session: CK_SESSION_HANDLE,
    _object: CK_OBJECT_HANDLE,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_get_object_size(
    _session: CK_SESSION_HANDLE,
    _object: CK_OBJECT_HANDLE,
    _pul_size: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_set_attribute_value(
    _session: CK_SESSION_HANDLE,
    _object: CK_OBJECT_HANDLE,
    _template: CK_ATTRIBUTE_PTR,
    _count: CK_ULONG,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_encrypt_update(
    _session: CK_SESSION_HANDLE,
    _part: CK_BYTE_PTR,
    _part_len: CK_ULONG,
    _encrypted_part: CK_BYTE_PTR,
    _pul_encrypted_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_encrypt_final(
    _session: CK_SESSION_HANDLE,
    _last_encrypted_part: CK_BYTE_PTR,
    _pul_last_encrypted_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_decrypt_update(
    _session: CK_SESSION_HANDLE,
    _encrypted_part: CK_BYTE_PTR,
    _encrypted_part_len: CK_ULONG,
    _part: CK_BYTE_PTR,
    _pul_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_decrypt_final(
    _session: CK_SESSION_HANDLE,
    _last_part: CK_BYTE_PTR,
    _pul_last_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest_init(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest(
    _session: CK_SESSION_HANDLE,
    _data: CK_BYTE_PTR,
    _data_len: CK_ULONG,
    _digest: CK_BYTE_PTR,
    _pul_digest_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest_update(
    _session: CK_SESSION_HANDLE,
    _part: CK_BYTE_PTR,
    _part_len: CK_ULONG,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest_key(
    _session: CK_SESSION_HANDLE,
    _key: CK_OBJECT_HANDLE,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest_final(
    _session: CK_SESSION_HANDLE,
    _digest: CK_BYTE_PTR,
    _pul_digest_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_sign_recover_init(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _key: CK_OBJECT_HANDLE,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_sign_recover(
    _session: CK_SESSION_HANDLE,
    _data: CK_BYTE_PTR,
    _data_len: CK_ULONG,
    _signature: CK_BYTE_PTR,
    _pul_signature_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_verify_recover_init(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _key: CK_OBJECT_HANDLE,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_verify_recover(
    _session: CK_SESSION_HANDLE,
    _signature: CK_BYTE_PTR,
    _signature_len: CK_ULONG,
    _data: CK_BYTE_PTR,
    _pul_data_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_digest_encrypt_update(
    _session: CK_SESSION_HANDLE,
    _part: CK_BYTE_PTR,
    _part_len: CK_ULONG,
    _encrypted_part: CK_BYTE_PTR,
    _pul_encrypted_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_decrypt_digest_update(
    _session: CK_SESSION_HANDLE,
    _encrypted_part: CK_BYTE_PTR,
    _encrypted_part_len: CK_ULONG,
    _part: CK_BYTE_PTR,
    _pul_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_sign_encrypt_update(
    _session: CK_SESSION_HANDLE,
    _part: CK_BYTE_PTR,
    _part_len: CK_ULONG,
    _encrypted_part: CK_BYTE_PTR,
    _pul_encrypted_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_decrypt_verify_update(
    _session: CK_SESSION_HANDLE,
    _encrypted_part: CK_BYTE_PTR,
    _encrypted_part_len: CK_ULONG,
    _part: CK_BYTE_PTR,
    _pul_part_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_generate_key(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _template: CK_ATTRIBUTE_PTR,
    _count: CK_ULONG,
    _ph_key: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_generate_key_pair(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _public_key_template: CK_ATTRIBUTE_PTR,
    _public_key_attribute_count: CK_ULONG,
    _private_key_template: CK_ATTRIBUTE_PTR,
    _private_key_attribute_count: CK_ULONG,
    _ph_public_key: CK_OBJECT_HANDLE_PTR,
    _ph_private_key: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_wrap_key(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _wrapping_key: CK_OBJECT_HANDLE,
    _key: CK_OBJECT_HANDLE,
    _wrapped_key: CK_BYTE_PTR,
    _pul_wrapped_key_len: CK_ULONG_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_unwrap_key(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _unwrapping_key: CK_OBJECT_HANDLE,
    _wrapped_key: CK_BYTE_PTR,
    _wrapped_key_len: CK_ULONG,
    _template: CK_ATTRIBUTE_PTR,
    _attribute_count: CK_ULONG,
    _ph_key: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_derive_key(
    _session: CK_SESSION_HANDLE,
    _mechanism: CK_MECHANISM_PTR,
    _base_key: CK_OBJECT_HANDLE,
    _template: CK_ATTRIBUTE_PTR,
    _attribute_count: CK_ULONG,
    _ph_key: CK_OBJECT_HANDLE_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_seed_random(
    _session: CK_SESSION_HANDLE,
    _seed: CK_BYTE_PTR,
    _seed_len: CK_ULONG,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_get_function_status(_session: CK_SESSION_HANDLE) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_cancel_function(_session: CK_SESSION_HANDLE) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}
extern "C" fn fn_wait_for_slot_event(
    _flags: CK_FLAGS,
    _slot: CK_SLOT_ID_PTR,
    _reserved: CK_VOID_PTR,
) -> CK_RV {
    CKR_FUNCTION_NOT_SUPPORTED
}

pub static FNLIST_240: CK_FUNCTION_LIST = CK_FUNCTION_LIST {
    version: CK_VERSION {
        major: 2,
        minor: 40,
    },
    C_Initialize: Some(fn_initialize),
    C_Finalize: Some(fn_finalize),
    C_GetInfo: Some(fn_get_info),
    C_GetFunctionList: Some(C_GetFunctionList),
    C_GetSlotList: Some(fn_get_slot_list),
    C_GetSlotInfo: Some(fn_get_slot_info),
    C_GetTokenInfo: Some(fn_get_token_info),
    C_GetMechanismList: Some(fn_get_mechanism_list),
    C_GetMechanismInfo: Some(fn_get_mechanism_info),
    C_InitToken: Some(fn_init_token),
    C_InitPIN: Some(fn_init_pin),
    C_SetPIN: Some(fn_set_pin),
    C_OpenSession: Some(fn_open_session),
    C_CloseSession: Some(fn_close_session),
    C_CloseAllSessions: Some(fn_close_all_sessions),
    C_GetSessionInfo: Some(fn_get_session_info),
    C_GetOperationState: Some(fn_get_operation_state),
    C_SetOperationState: Some(fn_set_operation_state),
    C_Login: Some(fn_login),
    C_Logout: Some(fn_logout),
    C_CreateObject: Some(fn_create_object),
    C_CopyObject: Some(fn_copy_object),
    C_DestroyObject: Some(fn_destroy_object),
    C_GetObjectSize: Some(fn_get_object_size),
    C_GetAttributeValue: Some(fn_get_attribute_value),
    C_SetAttributeValue: Some(fn_set_attribute_value),
    C_FindObjectsInit: Some(fn_find_objects_init),
    C_FindObjects: Some(fn_find_objects),
    C_FindObjectsFinal: Some(fn_find_objects_final),
    C_EncryptInit: Some(fn_encrypt_init),
    C_Encrypt: Some(fn_encrypt),
    C_EncryptUpdate: Some(fn_encrypt_update),
    C_EncryptFinal: Some(fn_encrypt_final),
    C_DecryptInit: Some(fn_decrypt_init),
    C_Decrypt: Some(fn_decrypt),
    C_DecryptUpdate: Some(fn_decrypt_update),
    C_DecryptFinal: Some(fn_decrypt_final),
    C_DigestInit: Some(fn_digest_init),
    C_Digest: Some(fn_digest),
    C_DigestUpdate: Some(fn_digest_update),
    C_DigestKey: Some(fn_digest_key),
    C_DigestFinal: Some(fn_digest_final),
    C_SignInit: Some(fn_sign_init),
    C_Sign: Some(fn_sign),
    C_SignUpdate: Some(fn_sign_update),
    C_SignFinal: Some(fn_sign_final),
    C_SignRecoverInit: Some(fn_sign_recover_init),
    C_SignRecover: Some(fn_sign_recover),
    C_VerifyInit: Some(fn_verify_init),
    C_Verify: Some(fn_verify),
    C_VerifyUpdate: Some(fn_verify_update),
    C_VerifyFinal: Some(fn_verify_final),
    C_VerifyRecoverInit: Some(fn_verify_recover_init),
    C_VerifyRecover: Some(fn_verify_recover),
    C_DigestEncryptUpdate: Some(fn_digest_encrypt_update),
    C_DecryptDigestUpdate: Some(fn_decrypt_digest_update),
    C_SignEncryptUpdate: Some(fn_sign_encrypt_update),
    C_DecryptVerifyUpdate: Some(fn_decrypt_verify_update),
    C_GenerateKey: Some(fn_generate_key),
    C_GenerateKeyPair: Some(fn_generate_key_pair),
    C_WrapKey: Some(fn_wrap_key),
    C_UnwrapKey: Some(fn_unwrap_key),
    C_DeriveKey: Some(fn_derive_key),
    C_SeedRandom: Some(fn_seed_random),
    C_GenerateRandom: Some(fn_generate_random),
    C_GetFunctionStatus: Some(fn_get_function_status),
    C_CancelFunction: Some(fn_cancel_function),
    C_WaitForSlotEvent: Some(fn_wait_for_slot_event),
};

/// The only entry point that may be called before C_Initialize
#[no_mangle]
pub extern "C" fn C_GetFunctionList(
    fnlist: CK_FUNCTION_LIST_PTR_PTR,
) -> CK_RV {
    if fnlist.is_null() {
        return CKR_ARGUMENTS_BAD;
    }
    unsafe { *fnlist = &FNLIST_240 };
    CKR_OK
}

#[cfg(test)]
mod tests;

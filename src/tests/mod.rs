// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::ffi::CString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::config::{LibraryConfig, TokenConfig};
use crate::kms::KmsClient;
use crate::provider::Provider;

use fakekms::FakeKms;

mod encrypt;
mod find;
mod random;
mod sign;

macro_rules! make_attribute {
    ($type:expr, $value:expr, $length:expr) => {
        CK_ATTRIBUTE {
            type_: $type,
            pValue: $value as CK_VOID_PTR,
            ulValueLen: $length as CK_ULONG,
        }
    };
}
pub(crate) use make_attribute;

static TEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) const KR1: &str = "projects/test/locations/global/keyRings/kr1";
pub(crate) const KR2: &str = "projects/test/locations/global/keyRings/kr2";
pub(crate) const KR3: &str = "projects/test/locations/global/keyRings/kr3";

/// A library configuration naming the given key rings, built in code for
/// tests that drive the typed API directly
pub(crate) fn test_config(
    rings: &[&str],
    mac_keys: bool,
    raw_encryption_keys: bool,
) -> LibraryConfig {
    LibraryConfig {
        tokens: rings
            .iter()
            .map(|r| TokenConfig {
                key_ring: r.to_string(),
                label: None,
            })
            .collect(),
        rpc_timeout_secs: 5,
        experimental_mac_keys: mac_keys,
        experimental_raw_encryption_keys: raw_encryption_keys,
    }
}

pub(crate) fn test_provider(
    fake: &Arc<FakeKms>,
    rings: &[&str],
    mac_keys: bool,
    raw_encryption_keys: bool,
) -> Provider {
    Provider::new(
        &test_config(rings, mac_keys, raw_encryption_keys),
        fake.clone(),
    )
    .unwrap()
}

fn config_toml(rings: &[&str], mac_keys: bool, raw: bool) -> String {
    let mut out = format!(
        "rpc_timeout_secs = 5\n\
         experimental_mac_keys = {}\n\
         experimental_raw_encryption_keys = {}\n",
        mac_keys, raw
    );
    for ring in rings {
        out.push_str(&format!("\n[[tokens]]\nkey_ring = \"{}\"\n", ring));
    }
    out
}

/// Drives the module through its C entry points against a fake KMS.
/// Installs the client factory, writes a config file and initializes;
/// finalizes and cleans up on drop. Tests using this must be #[serial],
/// the provider slot is process-wide.
pub(crate) struct TestModule {
    config_file: PathBuf,
}

impl TestModule {
    pub fn initialize(
        fake: &Arc<FakeKms>,
        rings: &[&str],
        mac_keys: bool,
        raw: bool,
    ) -> TestModule {
        let client = fake.clone();
        register_client_factory(Box::new(
            move |_conf| -> kms::KmsResult<Arc<dyn KmsClient>> {
                Ok(client.clone())
            },
        ));

        let config_file = std::env::temp_dir().join(format!(
            "kms_pkcs11_test_{}_{}.toml",
            std::process::id(),
            TEST_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::write(&config_file, config_toml(rings, mac_keys, raw))
            .unwrap();

        let reserved =
            CString::new(config_file.to_str().unwrap()).unwrap();
        let mut args = CK_C_INITIALIZE_ARGS {
            CreateMutex: None,
            DestroyMutex: None,
            LockMutex: None,
            UnlockMutex: None,
            flags: 0,
            pReserved: reserved.as_ptr() as CK_VOID_PTR,
        };
        let rv = fn_initialize(&mut args as *mut _ as CK_VOID_PTR);
        assert_eq!(rv, CKR_OK);

        TestModule {
            config_file: config_file,
        }
    }

    pub fn open_session(&self, slot_id: CK_SLOT_ID) -> CK_SESSION_HANDLE {
        let mut handle: CK_SESSION_HANDLE = CK_INVALID_HANDLE;
        let rv = fn_open_session(
            slot_id,
            CKF_SERIAL_SESSION,
            std::ptr::null_mut(),
            None,
            &mut handle,
        );
        assert_eq!(rv, CKR_OK);
        assert_ne!(handle, CK_INVALID_HANDLE);
        handle
    }
}

impl Drop for TestModule {
    fn drop(&mut self) {
        let _ = fn_finalize(std::ptr::null_mut());
        let _ = std::fs::remove_file(&self.config_file);
    }
}

// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

//! Fork support. Cryptoki libraries get forked under their hosts'
//! feet (nginx, Apache, OpenSSH); the transport must be quiesced around
//! the fork and the child must come up uninitialized.

use std::sync::Once;

use crate::error::{Error, Result};

static REGISTER: Once = Once::new();

extern "C" fn prepare() {
    crate::with_provider(|p| p.client().prepare_fork());
}

extern "C" fn parent() {
    crate::with_provider(|p| p.client().parent_after_fork());
}

extern "C" fn child() {
    /* The transport's post-fork routine must run before the provider is
     * released; releasing first deadlocks on transport-internal locks. */
    crate::with_provider(|p| p.client().child_after_fork());
    crate::release_provider();
}

/// Registers the atfork handlers once per process. Later registrations
/// are no-ops; the handlers survive Finalize and act on whatever
/// provider is installed at fork time.
pub fn register_fork_handlers() -> Result<()> {
    let mut result = 0;
    REGISTER.call_once(|| {
        result = unsafe {
            libc::pthread_atfork(Some(prepare), Some(parent), Some(child))
        };
    });
    if result != 0 {
        return Err(Error::internal(format!(
            "pthread_atfork failed with error {}",
            result
        )));
    }
    Ok(())
}

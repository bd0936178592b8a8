// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::kms::KmsClient;
use crate::mechanism::ExperimentFlags;
use crate::pkcs11::*;
use crate::session::Session;
use crate::token::Token;

static MANUFACTURER_ID: [CK_UTF8CHAR; 32] =
    *b"Google                          ";
static LIBRARY_DESCRIPTION: [CK_UTF8CHAR; 32] =
    *b"Cryptoki Library for Cloud KMS  ";

const CRYPTOKI_VERSION: CK_VERSION = CK_VERSION {
    major: 2,
    minor: 40,
};
const LIBRARY_VERSION: CK_VERSION = CK_VERSION { major: 0, minor: 9 };

#[derive(Debug)]
struct SessionTable {
    map: HashMap<CK_SESSION_HANDLE, Arc<Session>>,
    /* monotonic; handles are never reused within a provider lifetime */
    next_handle: CK_SESSION_HANDLE,
}

/// The process-wide root object: one token per configured key ring, the
/// session table, and the shared KMS client. Created by C_Initialize and
/// dropped by C_Finalize.
#[derive(Debug)]
pub struct Provider {
    info: CK_INFO,
    tokens: Vec<Token>,
    sessions: Mutex<SessionTable>,
    client: Arc<dyn KmsClient>,
    experiments: ExperimentFlags,
}

impl Provider {
    /// Builds one token per configured key ring, in declaration order.
    /// Any token construction failure is fatal to initialization.
    pub fn new(
        config: &LibraryConfig,
        client: Arc<dyn KmsClient>,
    ) -> Result<Provider> {
        client.set_rpc_timeout(Duration::from_secs(config.rpc_timeout_secs));

        let experiments = ExperimentFlags {
            mac_keys: config.experimental_mac_keys,
            raw_encryption_keys: config.experimental_raw_encryption_keys,
        };

        let mut tokens = Vec::with_capacity(config.tokens.len());
        for token_config in &config.tokens {
            tokens.push(Token::new(
                token_config,
                client.as_ref(),
                experiments,
            )?);
        }

        Ok(Provider {
            info: CK_INFO {
                cryptokiVersion: CRYPTOKI_VERSION,
                manufacturerID: MANUFACTURER_ID,
                flags: 0,
                libraryDescription: LIBRARY_DESCRIPTION,
                libraryVersion: LIBRARY_VERSION,
            },
            tokens: tokens,
            sessions: Mutex::new(SessionTable {
                map: HashMap::new(),
                next_handle: 1,
            }),
            client: client,
            experiments: experiments,
        })
    }

    pub fn info(&self) -> &CK_INFO {
        &self.info
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token_at(&self, slot_id: CK_SLOT_ID) -> Result<&Token> {
        match self.tokens.get(slot_id as usize) {
            Some(t) => Ok(t),
            None => Err(Error::not_found(
                CKR_SLOT_ID_INVALID,
                format!("slot {} does not exist", slot_id),
            )),
        }
    }

    pub fn experiments(&self) -> ExperimentFlags {
        self.experiments
    }

    pub fn client(&self) -> &dyn KmsClient {
        self.client.as_ref()
    }

    pub fn open_session(
        &self,
        slot_id: CK_SLOT_ID,
    ) -> Result<CK_SESSION_HANDLE> {
        self.token_at(slot_id)?;
        let mut table = self.sessions.lock().unwrap();
        let handle = table.next_handle;
        table.next_handle += 1;
        table
            .map
            .insert(handle, Arc::new(Session::new(handle, slot_id)));
        Ok(handle)
    }

    pub fn get_session(
        &self,
        handle: CK_SESSION_HANDLE,
    ) -> Result<Arc<Session>> {
        match self.sessions.lock().unwrap().map.get(&handle) {
            Some(s) => Ok(s.clone()),
            None => Err(Error::not_found(
                CKR_SESSION_HANDLE_INVALID,
                format!("session handle {} is not valid", handle),
            )),
        }
    }

    /// Removes the session; its pending operation, if any, dies with it
    pub fn close_session(&self, handle: CK_SESSION_HANDLE) -> Result<()> {
        match self.sessions.lock().unwrap().map.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(
                CKR_SESSION_HANDLE_INVALID,
                format!("session handle {} is not valid", handle),
            )),
        }
    }

    pub fn close_all_sessions(&self, slot_id: CK_SLOT_ID) -> Result<()> {
        self.token_at(slot_id)?;
        self.sessions
            .lock()
            .unwrap()
            .map
            .retain(|_, s| s.slot_id() != slot_id);
        Ok(())
    }
}

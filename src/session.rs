// Copyright 2025 Google LLC
// See LICENSE.txt file for terms

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::kms::KmsClient;
use crate::mechanism::ExperimentFlags;
use crate::object::Object;
use crate::operation::{
    new_decrypt_op, new_encrypt_op, new_sign_op, new_verify_op,
    FindOperation, Operation,
};
use crate::pkcs11::*;

/// One open session. The session is bound to its slot for life; the only
/// mutable state is the at-most-one active operation, serialized by its
/// own mutex so that concurrent calls on the same handle line up while
/// other sessions proceed independently.
#[derive(Debug)]
pub struct Session {
    handle: CK_SESSION_HANDLE,
    slot_id: CK_SLOT_ID,
    operation: Mutex<Option<Operation>>,
}

impl Session {
    pub fn new(handle: CK_SESSION_HANDLE, slot_id: CK_SLOT_ID) -> Session {
        Session {
            handle: handle,
            slot_id: slot_id,
            operation: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> CK_SESSION_HANDLE {
        self.handle
    }

    pub fn slot_id(&self) -> CK_SLOT_ID {
        self.slot_id
    }

    fn begin_operation(&self, op: Operation) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        if slot.is_some() {
            return Err(Error::failed_precondition(
                CKR_OPERATION_ACTIVE,
                format!("session {} already has an active operation", self.handle),
            ));
        }
        *slot = Some(op);
        Ok(())
    }

    /// Drops whatever operation is pending, if any
    pub fn release_operation(&self) {
        *self.operation.lock().unwrap() = None;
    }

    /* Find */

    pub fn find_objects_init(
        &self,
        handles: Vec<CK_OBJECT_HANDLE>,
    ) -> Result<()> {
        self.begin_operation(Operation::Find(FindOperation::new(handles)))
    }

    pub fn find_objects(&self, max: usize) -> Result<Vec<CK_OBJECT_HANDLE>> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Find(find)) => {
                Ok(find.next_handles(max).to_vec())
            }
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn find_objects_final(&self) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        if !matches!(slot.as_ref(), Some(Operation::Find(_))) {
            return Err(CKR_OPERATION_NOT_INITIALIZED)?;
        }
        *slot = None;
        Ok(())
    }

    /* Encrypt */

    pub fn encrypt_init(
        &self,
        key: Arc<Object>,
        mech: &CK_MECHANISM,
        experiments: ExperimentFlags,
    ) -> Result<()> {
        let op = new_encrypt_op(key, mech, experiments)?;
        self.begin_operation(Operation::Encrypt(op))
    }

    pub fn encrypt(
        &self,
        client: &dyn KmsClient,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Encrypt(op)) => op.encrypt(client, plaintext),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    /* Decrypt */

    pub fn decrypt_init(
        &self,
        key: Arc<Object>,
        mech: &CK_MECHANISM,
        experiments: ExperimentFlags,
    ) -> Result<()> {
        let op = new_decrypt_op(key, mech, experiments)?;
        self.begin_operation(Operation::Decrypt(op))
    }

    pub fn decrypt(
        &self,
        client: &dyn KmsClient,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Decrypt(op)) => op.decrypt(client, ciphertext),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    /* Sign */

    pub fn sign_init(
        &self,
        key: Arc<Object>,
        mech: &CK_MECHANISM,
        experiments: ExperimentFlags,
    ) -> Result<()> {
        let op = new_sign_op(key, mech, experiments)?;
        self.begin_operation(Operation::Sign(op))
    }

    /// The deterministic signature size, used to answer probe calls
    /// without performing the signature
    pub fn signature_length(&self) -> Result<usize> {
        let slot = self.operation.lock().unwrap();
        match slot.as_ref() {
            Some(Operation::Sign(op)) => Ok(op.signature_length()),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn sign(
        &self,
        client: &dyn KmsClient,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Sign(op)) => op.sign(client, data),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn sign_update(&self, data: &[u8]) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Sign(op)) => op.sign_update(data),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn sign_final(&self, client: &dyn KmsClient) -> Result<Vec<u8>> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Sign(op)) => op.sign_final(client),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    /* Verify */

    pub fn verify_init(
        &self,
        key: Arc<Object>,
        mech: &CK_MECHANISM,
        experiments: ExperimentFlags,
    ) -> Result<()> {
        let op = new_verify_op(key, mech, experiments)?;
        self.begin_operation(Operation::Verify(op))
    }

    pub fn verify(
        &self,
        client: &dyn KmsClient,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Verify(op)) => op.verify(client, data, signature),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn verify_update(&self, data: &[u8]) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Verify(op)) => op.verify_update(data),
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }

    pub fn verify_final(
        &self,
        client: &dyn KmsClient,
        signature: &[u8],
    ) -> Result<()> {
        let mut slot = self.operation.lock().unwrap();
        match slot.as_mut() {
            Some(Operation::Verify(op)) => {
                op.verify_final(client, signature)
            }
            _ => Err(CKR_OPERATION_NOT_INITIALIZED)?,
        }
    }
}

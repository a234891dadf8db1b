//! Cross-iteration state holders
//!
//! A `Carrier` accepts bytes at the end of one iteration and gives them
//! back at the start of the next. Writers see carriers only through a
//! `Weak<dyn Carrier>`, so a destroyed reader is detected instead of
//! dereferenced.

use parking_lot::Mutex;
use std::fmt;

use crate::error::{MemNodeError, Result};

pub trait Carrier: Send + Sync {
    /// Logical name the state is carried under
    fn memory_id(&self) -> &str;

    /// Replace the stored state with a copy of `bytes`.
    ///
    /// The length may differ from the previous call.
    fn store_bytes(&self, bytes: &[u8]);

    /// Copy the stored state into `dst`.
    ///
    /// # Errors
    ///
    /// `SizeMismatch` if `dst` is not exactly as long as the stored state.
    fn load_into(&self, dst: &mut [u8]) -> Result<()>;

    /// Length of the stored state in bytes
    fn stored_len(&self) -> usize;
}

/// Byte storage owned by a MemoryInput node
///
/// Every store swaps the whole buffer under the lock; there is no partial
/// update and no history.
pub struct StateCell {
    memory_id: String,
    bytes: Mutex<Vec<u8>>,
}

impl StateCell {
    /// Create a cell holding `initial_size` zero bytes
    #[must_use]
    pub fn new(memory_id: &str, initial_size: usize) -> Self {
        Self {
            memory_id: memory_id.to_string(),
            bytes: Mutex::new(vec![0; initial_size]),
        }
    }

    /// Copy of the stored bytes
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }
}

impl Carrier for StateCell {
    fn memory_id(&self) -> &str {
        &self.memory_id
    }

    fn store_bytes(&self, bytes: &[u8]) {
        let mut stored = self.bytes.lock();
        stored.clear();
        stored.extend_from_slice(bytes);
        log::debug!("state '{}': stored {} bytes", self.memory_id, bytes.len());
    }

    fn load_into(&self, dst: &mut [u8]) -> Result<()> {
        let stored = self.bytes.lock();
        if stored.len() != dst.len() {
            return Err(MemNodeError::SizeMismatch {
                memory_id: self.memory_id.clone(),
                stored: stored.len(),
                expected: dst.len(),
            });
        }
        dst.copy_from_slice(&stored);
        Ok(())
    }

    fn stored_len(&self) -> usize {
        self.bytes.lock().len()
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StateCell(memory_id={}, len={})",
            self.memory_id,
            self.stored_len()
        )
    }
}

//! Virtual edge registry - pairs MemoryOutput and MemoryInput nodes by name
//!
//! Writers and readers register at construction in any order. The first
//! one to arrive under a memory id leaves a pending entry; the second one
//! consumes it and the pair is resolved. A resolved pair needs no further
//! registry involvement: the writer holds a weak reference to the reader's
//! carrier.
//!
//! The registry is owned by one compilation context and shared through
//! `Arc<VirtualEdgeRegistry>`. All operations take a single lock for the
//! duration of one lookup plus one insert or erase.
//!
//! ```text
//!   register_writer("s0")        register_reader("s0")
//!          │                              │
//!          ▼                              ▼
//!   ┌──────────────┐  second arrival  ┌──────────────┐
//!   │PendingWriter │ ───────────────▶ │  Resolved    │
//!   └──────────────┘                  │ writer,reader│
//!   ┌──────────────┐  second arrival  │              │
//!   │PendingReader │ ───────────────▶ │              │
//!   └──────────────┘                  └──────────────┘
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::carrier::Carrier;
use crate::config::EngineConfig;
use crate::error::{MemNodeError, Result};
use crate::idgen::Handle;
use crate::node::NodeKind;

/// The writer's view of a resolved virtual edge
#[derive(Clone)]
pub struct Pairing {
    reader: Handle,
    carrier: Weak<dyn Carrier>,
}

impl Pairing {
    /// Handle of the paired MemoryInput node
    #[must_use]
    pub fn reader(&self) -> Handle {
        self.reader
    }

    /// The reader's carrier, if the reader still exists
    #[must_use]
    pub fn carrier(&self) -> Option<Arc<dyn Carrier>> {
        self.carrier.upgrade()
    }
}

impl fmt::Debug for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pairing(reader={}, alive={})",
            self.reader,
            self.carrier.strong_count() > 0
        )
    }
}

/// Write-once cell through which a pending writer learns about its reader
#[derive(Debug, Default)]
pub struct PairingSlot {
    pairing: OnceLock<Pairing>,
}

impl PairingSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<&Pairing> {
        self.pairing.get()
    }

    fn resolve(&self, pairing: Pairing) {
        if self.pairing.set(pairing).is_err() {
            log::warn!("pairing slot resolved twice, keeping the first pairing");
        }
    }
}

enum EdgeState {
    PendingWriter {
        writer: Handle,
        slot: Weak<PairingSlot>,
    },
    PendingReader {
        reader: Handle,
        carrier: Weak<dyn Carrier>,
    },
    Resolved {
        writer: Handle,
        reader: Handle,
    },
}

impl EdgeState {
    fn pending_node(&self) -> Option<Handle> {
        match self {
            Self::PendingWriter { writer, .. } => Some(*writer),
            Self::PendingReader { reader, .. } => Some(*reader),
            Self::Resolved { .. } => None,
        }
    }
}

pub struct VirtualEdgeRegistry {
    edges: Mutex<HashMap<String, EdgeState>>,
    memory_input_supported: bool,
}

impl VirtualEdgeRegistry {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            edges: Mutex::new(HashMap::new()),
            memory_input_supported: config.memory_input_supported,
        }
    }

    /// Register a MemoryOutput under `memory_id`.
    ///
    /// Returns the pairing if a live reader was already waiting; the same
    /// pairing is also written into `slot`. Otherwise the writer stays
    /// pending and `slot` is filled when the reader arrives.
    ///
    /// # Errors
    ///
    /// - `EmptyMemoryId` for an empty name
    /// - `MemoryInputUnsupported` if a reader is waiting but readers are
    ///   compiled out
    /// - `DuplicateRole` if another writer is pending under the name
    /// - `MemoryIdOverclaimed` if the name is already paired
    pub fn register_writer(
        &self,
        memory_id: &str,
        writer: Handle,
        slot: &Arc<PairingSlot>,
    ) -> Result<Option<Pairing>> {
        check_memory_id(memory_id, writer)?;
        let mut edges = self.edges.lock();

        let pending_reader = match edges.get(memory_id) {
            None => None,
            Some(EdgeState::PendingWriter { .. }) => {
                return Err(MemNodeError::DuplicateRole {
                    memory_id: memory_id.to_string(),
                    role: NodeKind::MemoryOutput,
                })
            }
            Some(EdgeState::Resolved { .. }) => {
                return Err(MemNodeError::MemoryIdOverclaimed {
                    memory_id: memory_id.to_string(),
                })
            }
            Some(EdgeState::PendingReader { reader, carrier }) => {
                if !self.memory_input_supported {
                    return Err(MemNodeError::MemoryInputUnsupported {
                        memory_id: memory_id.to_string(),
                    });
                }
                if carrier.strong_count() == 0 {
                    log::warn!(
                        "registry: stale reader {reader} on '{memory_id}' replaced by writer {writer}"
                    );
                    None
                } else {
                    Some(Pairing {
                        reader: *reader,
                        carrier: carrier.clone(),
                    })
                }
            }
        };

        if let Some(pairing) = pending_reader {
            slot.resolve(pairing.clone());
            edges.insert(
                memory_id.to_string(),
                EdgeState::Resolved {
                    writer,
                    reader: pairing.reader,
                },
            );
            log::debug!(
                "registry: writer {writer} paired with reader {} on '{memory_id}'",
                pairing.reader
            );
            Ok(Some(pairing))
        } else {
            edges.insert(
                memory_id.to_string(),
                EdgeState::PendingWriter {
                    writer,
                    slot: Arc::downgrade(slot),
                },
            );
            log::debug!("registry: writer {writer} pending on '{memory_id}'");
            Ok(None)
        }
    }

    /// Register a MemoryInput under `memory_id`.
    ///
    /// Returns the writer's handle if a writer was already waiting; that
    /// writer's slot is resolved before this call returns.
    ///
    /// # Errors
    ///
    /// - `EmptyMemoryId` for an empty name
    /// - `MemoryInputUnsupported` if readers are compiled out
    /// - `DuplicateRole` if another reader is pending under the name
    /// - `MemoryIdOverclaimed` if the name is already paired
    pub fn register_reader(
        &self,
        memory_id: &str,
        reader: Handle,
        carrier: Weak<dyn Carrier>,
    ) -> Result<Option<Handle>> {
        check_memory_id(memory_id, reader)?;
        if !self.memory_input_supported {
            return Err(MemNodeError::MemoryInputUnsupported {
                memory_id: memory_id.to_string(),
            });
        }
        let mut edges = self.edges.lock();

        let pending_writer = match edges.get(memory_id) {
            None => None,
            Some(EdgeState::PendingReader { .. }) => {
                return Err(MemNodeError::DuplicateRole {
                    memory_id: memory_id.to_string(),
                    role: NodeKind::MemoryInput,
                })
            }
            Some(EdgeState::Resolved { .. }) => {
                return Err(MemNodeError::MemoryIdOverclaimed {
                    memory_id: memory_id.to_string(),
                })
            }
            Some(EdgeState::PendingWriter { writer, slot }) => match slot.upgrade() {
                Some(slot) => Some((*writer, slot)),
                None => {
                    log::warn!(
                        "registry: stale writer {writer} on '{memory_id}' replaced by reader {reader}"
                    );
                    None
                }
            },
        };

        if let Some((writer, slot)) = pending_writer {
            slot.resolve(Pairing { reader, carrier });
            edges.insert(memory_id.to_string(), EdgeState::Resolved { writer, reader });
            log::debug!("registry: reader {reader} paired with writer {writer} on '{memory_id}'");
            Ok(Some(writer))
        } else {
            edges.insert(
                memory_id.to_string(),
                EdgeState::PendingReader { reader, carrier },
            );
            log::debug!("registry: reader {reader} pending on '{memory_id}'");
            Ok(None)
        }
    }

    /// Erase any pending entry owned by `node`.
    ///
    /// Safe to call unconditionally: a node that already paired, or was
    /// never registered, leaves the registry untouched. Returns whether an
    /// entry was erased.
    pub fn unregister(&self, node: Handle) -> bool {
        let mut edges = self.edges.lock();
        let before = edges.len();
        edges.retain(|_, state| state.pending_node() != Some(node));
        let erased = edges.len() != before;
        if erased {
            log::debug!("registry: erased pending entry of {node}");
        }
        erased
    }

    /// Whether one side of `memory_id` is waiting for its sibling
    #[must_use]
    pub fn is_pending(&self, memory_id: &str) -> bool {
        self.edges
            .lock()
            .get(memory_id)
            .is_some_and(|state| state.pending_node().is_some())
    }

    /// Number of names with exactly one side registered
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.edges
            .lock()
            .values()
            .filter(|state| state.pending_node().is_some())
            .count()
    }

    /// `(writer, reader)` of a resolved name
    #[must_use]
    pub fn resolved_pair(&self, memory_id: &str) -> Option<(Handle, Handle)> {
        match self.edges.lock().get(memory_id) {
            Some(EdgeState::Resolved { writer, reader }) => Some((*writer, *reader)),
            _ => None,
        }
    }
}

impl fmt::Debug for VirtualEdgeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edges = self.edges.lock();
        let resolved = edges.len() - edges.values().filter(|s| s.pending_node().is_some()).count();
        write!(
            f,
            "VirtualEdgeRegistry(names={}, resolved={}, memory_input_supported={})",
            edges.len(),
            resolved,
            self.memory_input_supported
        )
    }
}

fn check_memory_id(memory_id: &str, node: Handle) -> Result<()> {
    if memory_id.is_empty() {
        return Err(MemNodeError::EmptyMemoryId {
            node: node.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::StateCell;

    fn carrier_of(cell: &Arc<StateCell>) -> Weak<dyn Carrier> {
        let weak: Weak<StateCell> = Arc::downgrade(cell);
        weak
    }

    fn registry() -> VirtualEdgeRegistry {
        VirtualEdgeRegistry::new(&EngineConfig {
            memory_input_supported: true,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_writer_then_reader() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let cell = Arc::new(StateCell::new("s0", 4));

        let paired = registry
            .register_writer("s0", Handle::new(1), &slot)
            .unwrap();
        assert!(paired.is_none());
        assert!(slot.get().is_none());
        assert!(registry.is_pending("s0"));

        let writer = registry
            .register_reader("s0", Handle::new(2), carrier_of(&cell))
            .unwrap();
        assert_eq!(writer, Some(Handle::new(1)));
        assert_eq!(slot.get().unwrap().reader(), Handle::new(2));
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(
            registry.resolved_pair("s0"),
            Some((Handle::new(1), Handle::new(2)))
        );
    }

    #[test]
    fn test_reader_then_writer() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let cell = Arc::new(StateCell::new("s0", 4));

        let writer = registry
            .register_reader("s0", Handle::new(2), carrier_of(&cell))
            .unwrap();
        assert!(writer.is_none());

        let pairing = registry
            .register_writer("s0", Handle::new(1), &slot)
            .unwrap()
            .unwrap();
        assert_eq!(pairing.reader(), Handle::new(2));
        assert_eq!(slot.get().unwrap().reader(), Handle::new(2));
        assert_eq!(
            registry.resolved_pair("s0"),
            Some((Handle::new(1), Handle::new(2)))
        );
    }

    #[test]
    fn test_unregister_only_touches_pending() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let cell = Arc::new(StateCell::new("s0", 4));

        registry
            .register_writer("s0", Handle::new(1), &slot)
            .unwrap();
        registry
            .register_reader("s0", Handle::new(2), carrier_of(&cell))
            .unwrap();

        assert!(!registry.unregister(Handle::new(1)));
        assert!(!registry.unregister(Handle::new(2)));
        assert!(!registry.unregister(Handle::new(77)));
        assert!(registry.resolved_pair("s0").is_some());
    }

    #[test]
    fn test_stale_writer_is_replaced() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let cell = Arc::new(StateCell::new("s0", 4));

        registry
            .register_writer("s0", Handle::new(1), &slot)
            .unwrap();
        drop(slot);

        let writer = registry
            .register_reader("s0", Handle::new(2), carrier_of(&cell))
            .unwrap();
        assert!(writer.is_none());
        assert!(registry.is_pending("s0"));
    }

    #[test]
    fn test_empty_memory_id() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let err = registry
            .register_writer("", Handle::new(1), &slot)
            .unwrap_err();
        assert!(matches!(err, MemNodeError::EmptyMemoryId { .. }));
    }

    #[test]
    fn test_stale_reader_is_replaced() {
        let registry = registry();
        let slot = Arc::new(PairingSlot::new());
        let cell = Arc::new(StateCell::new("s0", 4));

        registry
            .register_reader("s0", Handle::new(2), carrier_of(&cell))
            .unwrap();
        drop(cell);

        let paired = registry
            .register_writer("s0", Handle::new(1), &slot)
            .unwrap();
        assert!(paired.is_none());
        assert!(slot.get().is_none());
        assert!(registry.is_pending("s0"));
        assert_eq!(registry.resolved_pair("s0"), None);
    }

    #[test]
    fn test_duplicate_writer_without_reader_support() {
        let registry = VirtualEdgeRegistry::new(&EngineConfig {
            memory_input_supported: false,
            ..EngineConfig::default()
        });
        let slot1 = Arc::new(PairingSlot::new());
        let slot2 = Arc::new(PairingSlot::new());

        registry
            .register_writer("s0", Handle::new(1), &slot1)
            .unwrap();
        let err = registry
            .register_writer("s0", Handle::new(2), &slot2)
            .unwrap_err();
        assert_eq!(
            err,
            MemNodeError::DuplicateRole {
                memory_id: "s0".into(),
                role: NodeKind::MemoryOutput
            }
        );
    }
}

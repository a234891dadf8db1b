//! Tensor memory attached to graph edges
//!
//! A `Memory` is a shared, lockable allocation plus the descriptor that
//! says which part of it is logically valid. Layouts may place the data
//! after a leading padding offset; readers and writers only ever see the
//! valid region.

use parking_lot::{Mutex, MutexGuard};
use serde::Deserialize;
use std::fmt;
use std::ops::{Deref, DerefMut, Range};
use std::sync::Arc;

/// Numeric precision of tensor elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    F16,
    BF16,
    I32,
    I8,
    U8,
}

impl Precision {
    /// Number of bytes per element
    #[must_use]
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }
}

/// Shape, precision and padding of a tensor allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDesc {
    dims: Vec<usize>,
    precision: Precision,
    /// Leading padding, in elements
    offset_padding: usize,
}

impl MemoryDesc {
    #[must_use]
    pub fn new(dims: Vec<usize>, precision: Precision) -> Self {
        Self {
            dims,
            precision,
            offset_padding: 0,
        }
    }

    #[must_use]
    pub fn with_offset_padding(mut self, offset_padding: usize) -> Self {
        self.offset_padding = offset_padding;
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    #[must_use]
    pub fn offset_padding(&self) -> usize {
        self.offset_padding
    }

    /// Number of logical elements; a rank-0 tensor holds one
    #[must_use]
    pub fn elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Size of the logically valid region in bytes
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.elements() * self.precision.size_in_bytes()
    }

    /// Size of the whole allocation, padding included
    #[must_use]
    pub fn allocated_size(&self) -> usize {
        (self.offset_padding + self.elements()) * self.precision.size_in_bytes()
    }

    fn valid_range(&self) -> Range<usize> {
        let start = self.offset_padding * self.precision.size_in_bytes();
        start..start + self.byte_size()
    }
}

/// Read-only view of the valid region; holds the lock until dropped
pub struct MemoryReadGuard<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
    range: Range<usize>,
}

impl Deref for MemoryReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard[self.range.clone()]
    }
}

impl AsRef<[u8]> for MemoryReadGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Mutable view of the valid region; holds the lock until dropped
pub struct MemoryWriteGuard<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
    range: Range<usize>,
}

impl Deref for MemoryWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard[self.range.clone()]
    }
}

impl DerefMut for MemoryWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let range = self.range.clone();
        &mut self.guard[range]
    }
}

/// Shared tensor allocation
///
/// Clones share the same bytes. A fresh `Memory` is zero-filled, padding
/// included.
///
/// # Example
///
/// ```
/// use memnode::io::{Memory, MemoryDesc, Precision};
///
/// let desc = MemoryDesc::new(vec![2], Precision::U8).with_offset_padding(3);
/// let memory = Memory::new(desc);
/// memory.lock_mut().copy_from_slice(&[7, 9]);
///
/// assert_eq!(&*memory.lock(), &[7, 9]);
/// assert_eq!(memory.raw().len(), 5);
/// ```
#[derive(Clone)]
pub struct Memory {
    desc: MemoryDesc,
    data: Arc<Mutex<Vec<u8>>>,
}

impl Memory {
    #[must_use]
    pub fn new(desc: MemoryDesc) -> Self {
        let data = vec![0u8; desc.allocated_size()];
        Self {
            desc,
            data: Arc::new(Mutex::new(data)),
        }
    }

    #[must_use]
    pub fn desc(&self) -> &MemoryDesc {
        &self.desc
    }

    /// Size of the valid region in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.desc.byte_size()
    }

    /// Lock the valid region for reading
    #[must_use]
    pub fn lock(&self) -> MemoryReadGuard<'_> {
        MemoryReadGuard {
            guard: self.data.lock(),
            range: self.desc.valid_range(),
        }
    }

    /// Lock the valid region for writing
    #[must_use]
    pub fn lock_mut(&self) -> MemoryWriteGuard<'_> {
        MemoryWriteGuard {
            guard: self.data.lock(),
            range: self.desc.valid_range(),
        }
    }

    /// Copy of the whole allocation, padding included
    #[must_use]
    pub fn raw(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// True if both handles point at the same allocation
    #[must_use]
    pub fn same_allocation(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory(dims={:?}, precision={:?}, offset={}, bytes={})",
            self.desc.dims,
            self.desc.precision,
            self.desc.offset_padding,
            self.size()
        )
    }
}

/// Native-endian byte image of an `f32` slice
#[must_use]
pub fn f32_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Inverse of [`f32_to_bytes`]; a trailing partial element is ignored
#[must_use]
pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

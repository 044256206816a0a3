//! Size-bounded payload accumulator.

use crate::error::FilterError;

/// Reassembles chunked input into one contiguous payload.
///
/// The buffer never grows past `capacity`: an append that would overflow is
/// rejected as a whole before any of its bytes are copied.
#[derive(Debug)]
pub struct IngestBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl IngestBuffer {
    /// Create an accumulator for at most `capacity` bytes.
    ///
    /// The full capacity is reserved up front; allocation failure is
    /// reported instead of aborting the process.
    pub fn with_capacity(capacity: usize) -> Result<Self, FilterError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| FilterError::Allocation {
                requested: capacity,
            })?;
        Ok(Self { data, capacity })
    }

    /// Append one chunk's bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), FilterError> {
        let attempted = self.data.len().saturating_add(bytes.len());
        if attempted > self.capacity {
            return Err(FilterError::CapacityExceeded {
                attempted,
                capacity: self.capacity,
            });
        }
        self.data
            .try_reserve(bytes.len())
            .map_err(|_| FilterError::Allocation {
                requested: bytes.len(),
            })?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes accepted so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand over the accumulated payload.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

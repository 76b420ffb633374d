//! Fixed-capacity bump zones backing per-scene and long-lived allocations.

use thiserror::Error;
use tracing::error;

/// Every allocation is rounded up to this boundary.
pub const ZONE_ALIGN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error(
        "zone out of memory: requested {requested} bytes ({rounded} after rounding), {remaining} remaining"
    )]
    OutOfMemory {
        requested: usize,
        rounded: usize,
        remaining: usize,
    },
}

/// What a zone does when an allocation does not fit.
///
/// The bump algorithm is identical under both policies; only the failure
/// signaling differs. `try_alloc` ignores the policy and always reports
/// exhaustion to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OomPolicy {
    /// Surface `ZoneError::OutOfMemory` to the caller.
    #[default]
    Recover,
    /// Treat exhaustion as fatal: log and panic.
    Abort,
}

/// An allocation minted by a [`MemZone`].
///
/// Handles carry the epoch they were minted in. `free_all` starts a new
/// epoch, so every handle from before it is stale; resolving a stale handle
/// is a contract violation caught by debug assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneHandle {
    offset: usize,
    len: usize,
    epoch: u64,
}

impl ZoneHandle {
    /// Byte offset from the start of the zone's buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Requested length in bytes. Rounding padding is not addressable.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A linear allocator over a host-supplied buffer.
///
/// Allocation advances a cursor; there is no per-allocation release. The only
/// reclamation is [`MemZone::free_all`], which resets the cursor in O(1) and
/// invalidates every outstanding handle at once. The zone never grows, frees,
/// or reallocates the buffer; [`MemZone::into_buffer`] hands it back.
pub struct MemZone {
    buf: Box<[u8]>,
    cursor: usize,
    epoch: u64,
    policy: OomPolicy,
}

impl MemZone {
    pub fn new(buf: Box<[u8]>) -> Self {
        Self::with_policy(buf, OomPolicy::default())
    }

    pub fn with_policy(buf: Box<[u8]>, policy: OomPolicy) -> Self {
        Self {
            buf,
            cursor: 0,
            epoch: 0,
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes consumed in the current epoch, rounding included.
    pub fn used(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Allocate `size` bytes, applying the zone's [`OomPolicy`] on exhaustion.
    ///
    /// A zero-size request yields an empty handle without advancing the
    /// cursor. Memory is not zeroed; callers must not assume any particular
    /// contents.
    pub fn alloc(&mut self, size: usize) -> Result<ZoneHandle, ZoneError> {
        match self.try_alloc(size) {
            Ok(handle) => Ok(handle),
            Err(err) => match self.policy {
                OomPolicy::Recover => Err(err),
                OomPolicy::Abort => {
                    error!(
                        error = %err,
                        capacity = self.capacity(),
                        used = self.used(),
                        "zone exhausted"
                    );
                    panic!("{err}");
                }
            },
        }
    }

    /// Allocate `size` bytes, reporting exhaustion to the caller regardless
    /// of the zone's policy.
    pub fn try_alloc(&mut self, size: usize) -> Result<ZoneHandle, ZoneError> {
        if size == 0 {
            return Ok(ZoneHandle {
                offset: self.cursor,
                len: 0,
                epoch: self.epoch,
            });
        }

        let rounded = match size.checked_add(ZONE_ALIGN - 1) {
            Some(padded) => padded & !(ZONE_ALIGN - 1),
            None => {
                return Err(ZoneError::OutOfMemory {
                    requested: size,
                    rounded: size,
                    remaining: self.remaining(),
                })
            }
        };
        if rounded > self.remaining() {
            return Err(ZoneError::OutOfMemory {
                requested: size,
                rounded,
                remaining: self.remaining(),
            });
        }

        let handle = ZoneHandle {
            offset: self.cursor,
            len: size,
            epoch: self.epoch,
        };
        self.cursor += rounded;
        Ok(handle)
    }

    /// Release every allocation at once and start a new epoch.
    ///
    /// All previously minted handles become stale. Contents are not cleared
    /// in release builds; debug builds poison the buffer to surface
    /// use-after-reset early.
    pub fn free_all(&mut self) {
        self.cursor = 0;
        self.epoch = self.epoch.wrapping_add(1);
        #[cfg(debug_assertions)]
        self.buf.fill(0xCD);
    }

    pub fn bytes(&self, handle: ZoneHandle) -> &[u8] {
        self.assert_current(handle);
        &self.buf[handle.offset..handle.offset + handle.len]
    }

    pub fn bytes_mut(&mut self, handle: ZoneHandle) -> &mut [u8] {
        self.assert_current(handle);
        &mut self.buf[handle.offset..handle.offset + handle.len]
    }

    /// Hand the backing buffer back to the host.
    pub fn into_buffer(self) -> Box<[u8]> {
        self.buf
    }

    fn assert_current(&self, handle: ZoneHandle) {
        debug_assert_eq!(
            handle.epoch, self.epoch,
            "stale zone handle: allocation predates the last free_all"
        );
    }
}

impl std::fmt::Debug for MemZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemZone")
            .field("capacity", &self.capacity())
            .field("used", &self.cursor)
            .field("epoch", &self.epoch)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(capacity: usize) -> MemZone {
        MemZone::new(vec![0u8; capacity].into_boxed_slice())
    }

    #[test]
    fn allocations_are_disjoint_and_in_bounds() {
        let mut zone = zone(256);
        let sizes = [1usize, 16, 17, 32, 5];
        let handles: Vec<_> = sizes
            .iter()
            .map(|size| zone.alloc(*size).expect("fits"))
            .collect();

        for (i, a) in handles.iter().enumerate() {
            assert!(a.offset() + a.len() <= zone.capacity());
            for b in handles.iter().skip(i + 1) {
                let disjoint =
                    a.offset() + a.len() <= b.offset() || b.offset() + b.len() <= a.offset();
                assert!(disjoint, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn alloc_consumes_rounded_size() {
        let mut zone = zone(256);

        zone.alloc(1).expect("fits");
        assert_eq!(zone.used(), 16);

        zone.alloc(16).expect("fits");
        assert_eq!(zone.used(), 32);

        zone.alloc(17).expect("fits");
        assert_eq!(zone.used(), 64);
    }

    #[test]
    fn zero_size_alloc_never_fails_or_advances() {
        let mut zone = zone(16);
        zone.alloc(16).expect("fits");

        let handle = zone.alloc(0).expect("zero-size alloc");
        assert!(handle.is_empty());
        assert_eq!(zone.used(), 16);
        assert_eq!(zone.remaining(), 0);
    }

    #[test]
    fn over_limit_alloc_fails_and_leaves_prior_allocations_intact() {
        let mut zone = zone(32);
        let first = zone.alloc(8).expect("fits");
        zone.bytes_mut(first).fill(7);

        let err = zone.alloc(32).expect_err("does not fit");
        assert_eq!(
            err,
            ZoneError::OutOfMemory {
                requested: 32,
                rounded: 32,
                remaining: 16,
            }
        );
        assert_eq!(zone.used(), 16);
        assert!(zone.bytes(first).iter().all(|byte| *byte == 7));

        zone.alloc(16).expect("remaining capacity still usable");
    }

    #[test]
    fn free_all_resets_next_allocation_to_start() {
        let mut zone = zone(128);
        zone.alloc(40).expect("fits");
        zone.alloc(16).expect("fits");
        let epoch_before = zone.epoch();

        zone.free_all();

        assert_eq!(zone.used(), 0);
        assert_eq!(zone.epoch(), epoch_before + 1);
        let handle = zone.alloc(8).expect("fits after reset");
        assert_eq!(handle.offset(), 0);
    }

    #[test]
    fn oversized_request_reports_out_of_memory() {
        let mut zone = zone(64);
        assert!(matches!(
            zone.try_alloc(usize::MAX),
            Err(ZoneError::OutOfMemory { .. })
        ));
        assert_eq!(zone.used(), 0);
    }

    #[test]
    fn try_alloc_is_recoverable_under_abort_policy() {
        let mut zone = MemZone::with_policy(vec![0u8; 16].into_boxed_slice(), OomPolicy::Abort);
        assert!(zone.try_alloc(32).is_err());
    }

    #[test]
    #[should_panic(expected = "zone out of memory")]
    fn abort_policy_panics_on_exhaustion() {
        let mut zone = MemZone::with_policy(vec![0u8; 16].into_boxed_slice(), OomPolicy::Abort);
        let _ = zone.alloc(32);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "stale zone handle")]
    fn stale_handle_is_rejected_in_debug_builds() {
        let mut zone = zone(64);
        let handle = zone.alloc(8).expect("fits");
        zone.free_all();
        let _ = zone.bytes(handle);
    }

    #[test]
    fn writes_round_trip_through_handles() {
        let mut zone = zone(64);
        let a = zone.alloc(4).expect("fits");
        let b = zone.alloc(4).expect("fits");

        zone.bytes_mut(a).copy_from_slice(&[1, 2, 3, 4]);
        zone.bytes_mut(b).copy_from_slice(&[9, 9, 9, 9]);

        assert_eq!(zone.bytes(a), &[1, 2, 3, 4]);
        assert_eq!(zone.bytes(b), &[9, 9, 9, 9]);
    }
}

use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng;

use crate::error::PortError;

/// Number of randomized samples tried before falling back to a deterministic
/// scan.
const RANDOM_SAMPLES: usize = 10;

/// Vends unique TCP ports from a bounded, closed range `[lo, hi]`.
///
/// All operations are strictly serialized behind a single mutex; none of
/// them ever perform I/O, so the lock is never held across a suspension
/// point.
pub struct PortAllocator {
    lo: u16,
    hi: u16,
    allocated: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(lo: u16, hi: u16) -> Self {
        assert!(lo <= hi, "port range must be non-empty");
        Self {
            lo,
            hi,
            allocated: Mutex::new(HashSet::new()),
        }
    }

    pub fn range(&self) -> (u16, u16) {
        (self.lo, self.hi)
    }

    fn in_range(&self, port: u16) -> bool {
        port >= self.lo && port <= self.hi
    }

    /// Try `RANDOM_SAMPLES` random candidates first (cache-friendly, avoids
    /// clustering after sequential restarts), then fall back to a linear
    /// scan from `lo` which guarantees forward progress when the range is
    /// nearly full.
    pub fn allocate(&self) -> Result<u16, PortError> {
        let mut allocated = self.allocated.lock().unwrap();

        if self.hi - self.lo + 1 <= allocated.len() as u16 {
            return Err(PortError::Exhausted);
        }

        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_SAMPLES {
            let candidate = rng.gen_range(self.lo..=self.hi);
            if !allocated.contains(&candidate) {
                allocated.insert(candidate);
                return Ok(candidate);
            }
        }

        for candidate in self.lo..=self.hi {
            if !allocated.contains(&candidate) {
                allocated.insert(candidate);
                return Ok(candidate);
            }
        }

        Err(PortError::Exhausted)
    }

    /// Idempotent: releasing an unallocated or out-of-range port succeeds
    /// silently.
    pub fn release(&self, port: u16) {
        self.allocated.lock().unwrap().remove(&port);
    }

    /// Force a port into the allocated set. Used during startup
    /// reconciliation when the runtime reports containers bound to ports
    /// the allocator has no record of.
    pub fn mark_in_use(&self, port: u16) -> Result<(), PortError> {
        if !self.in_range(port) {
            return Err(PortError::OutOfRange(port));
        }
        self.allocated.lock().unwrap().insert(port);
        Ok(())
    }

    pub fn in_use(&self, port: u16) -> bool {
        self.allocated.lock().unwrap().contains(&port)
    }

    pub fn list_allocated(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.allocated.lock().unwrap().iter().copied().collect();
        ports.sort_unstable();
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_stays_in_range() {
        let allocator = PortAllocator::new(10000, 10010);
        for _ in 0..=10 {
            let port = allocator.allocate().unwrap();
            assert!((10000..=10010).contains(&port));
        }
        assert_eq!(allocator.allocate(), Err(PortError::Exhausted));
    }

    #[test]
    fn release_is_idempotent_and_silent_out_of_range() {
        let allocator = PortAllocator::new(10000, 10010);
        allocator.release(10005); // never allocated
        allocator.release(99); // out of range
        let port = allocator.allocate().unwrap();
        allocator.release(port);
        allocator.release(port); // double release
        assert!(!allocator.in_use(port));
    }

    #[test]
    fn mark_in_use_rejects_out_of_range() {
        let allocator = PortAllocator::new(10000, 10010);
        assert_eq!(
            allocator.mark_in_use(1),
            Err(PortError::OutOfRange(1))
        );
        assert!(allocator.mark_in_use(10005).is_ok());
        assert!(allocator.in_use(10005));
    }

    #[test]
    fn no_two_allocations_collide() {
        let allocator = PortAllocator::new(5000, 5100);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let port = allocator.allocate().unwrap();
            assert!(seen.insert(port), "port {port} allocated twice");
        }
    }

    #[test]
    fn list_allocated_is_sorted_and_matches_count() {
        let allocator = PortAllocator::new(6000, 6010);
        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(allocator.list_allocated(), expected);
    }
}

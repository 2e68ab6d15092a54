//! Bump arena with a fixed reserve, redline, and checkpoint
//!
//! Wraps a `bumpalo::Bump` with byte accounting so callers get the
//! contract the rest of the toolchain builds on:
//!
//! - allocation fails loudly once the redline is crossed,
//! - `checkpoint` / `before_checkpoint` partition allocations by position,
//! - `clear` returns the arena to empty in one step.
//!
//! Positions are byte offsets from the start of the reserve. The arena
//! never frees individual allocations; after `clear` every prior
//! position is dead.

use bumpalo::Bump;

/// Sizing for one arena: total reserve plus a reserved tail.
///
/// An allocation that would land past `reserve_z - redline_z` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total bytes the arena may hand out
    pub reserve_z: usize,
    /// Reserved tail; allocation fails once remaining bytes drop below this
    pub redline_z: usize,
}

impl ArenaConfig {
    pub fn with_reserve(reserve_z: usize) -> Self {
        ArenaConfig {
            reserve_z,
            redline_z: 0,
        }
    }

    /// Usable bytes before the redline
    pub fn limit_z(&self) -> usize {
        self.reserve_z.saturating_sub(self.redline_z)
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            reserve_z: 1024 * 1024,
            redline_z: 0,
        }
    }
}

/// Allocation failure: the arena cannot satisfy the request.
///
/// The arena's state is unchanged by a failed allocation, so callers
/// may recover by collecting or clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    pub requested_z: usize,
    pub available_z: usize,
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arena exhausted: requested {} bytes, {} available",
            self.requested_z, self.available_z
        )
    }
}

impl std::error::Error for AllocError {}

/// A position inside an arena, in bytes from the start of the reserve.
pub type ArenaPos = usize;

/// Bump arena with byte accounting.
///
/// Storage for variable-size payloads (interned text) goes through the
/// underlying `Bump`; fixed-size bookkeeping (GC cells) charges the
/// arena without routing its bytes through `Bump`. Both paths share the
/// same position counter, so checkpoints and the redline see every
/// allocation.
pub struct Arena {
    bump: Bump,
    config: ArenaConfig,
    /// Bytes handed out since the last clear
    pos: usize,
    /// Position recorded by the last `checkpoint` call
    checkpoint: usize,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Self {
        Arena {
            bump: Bump::new(),
            config,
            pos: 0,
            checkpoint: 0,
        }
    }

    pub fn with_reserve(reserve_z: usize) -> Self {
        Arena::new(ArenaConfig::with_reserve(reserve_z))
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Current allocation position in bytes
    pub fn position(&self) -> ArenaPos {
        self.pos
    }

    /// Bytes still available before the redline
    pub fn available_z(&self) -> usize {
        self.config.limit_z().saturating_sub(self.pos)
    }

    fn take(&mut self, nbytes: usize, align: usize) -> Result<ArenaPos, AllocError> {
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
        let aligned = self.pos.checked_next_multiple_of(align).unwrap_or(usize::MAX);
        let end = aligned.saturating_add(nbytes);
        if end > self.config.limit_z() {
            return Err(AllocError {
                requested_z: nbytes,
                available_z: self.available_z(),
            });
        }
        self.pos = end;
        Ok(aligned)
    }

    /// Charge `nbytes` (aligned) against the reserve without storing
    /// anything. Used by the GC spaces, which keep the payload in their
    /// own cells but budget it here.
    pub fn charge(&mut self, nbytes: usize, align: usize) -> Result<ArenaPos, AllocError> {
        self.take(nbytes, align)
    }

    /// Copy `s` into the arena. The returned reference is stable until
    /// `clear`.
    pub fn alloc_str(&mut self, s: &str) -> Result<&str, AllocError> {
        self.take(s.len(), 1)?;
        Ok(self.bump.alloc_str(s))
    }

    /// Record the current position. Used by the collector to partition
    /// a space into objects allocated before vs. after the mark.
    pub fn checkpoint(&mut self) -> ArenaPos {
        self.checkpoint = self.pos;
        self.checkpoint
    }

    pub fn last_checkpoint(&self) -> ArenaPos {
        self.checkpoint
    }

    /// Whether `pos` was allocated before the last checkpoint
    pub fn before_checkpoint(&self, pos: ArenaPos) -> bool {
        pos < self.checkpoint
    }

    /// Return the arena to empty. Invalidates every prior allocation
    /// and position.
    pub fn clear(&mut self) {
        self.bump.reset();
        self.pos = 0;
        self.checkpoint = 0;
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("reserve_z", &self.config.reserve_z)
            .field("redline_z", &self.config.redline_z)
            .field("pos", &self.pos)
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_within_reserve() {
        let mut arena = Arena::with_reserve(1024);
        let p0 = arena.charge(100, 8).unwrap();
        let p1 = arena.charge(100, 8).unwrap();
        assert_eq!(p0, 0);
        assert!(p1 >= 100);
        assert_eq!(arena.position(), p1 + 100);
    }

    #[test]
    fn test_alignment_honored() {
        let mut arena = Arena::with_reserve(1024);
        arena.charge(3, 1).unwrap();
        let p = arena.charge(8, 8).unwrap();
        assert_eq!(p % 8, 0);
    }

    #[test]
    fn test_exhaustion_reported() {
        let mut arena = Arena::with_reserve(64);
        arena.charge(60, 1).unwrap();
        let err = arena.charge(16, 1).unwrap_err();
        assert_eq!(err.requested_z, 16);
        assert_eq!(err.available_z, 4);
        // failed allocation leaves the position unchanged
        assert_eq!(arena.position(), 60);
    }

    #[test]
    fn test_redline_respected() {
        let mut arena = Arena::new(ArenaConfig {
            reserve_z: 128,
            redline_z: 32,
        });
        arena.charge(90, 1).unwrap();
        assert!(arena.charge(10, 1).is_err());
    }

    #[test]
    fn test_checkpoint_partition() {
        let mut arena = Arena::with_reserve(1024);
        let early = arena.charge(16, 1).unwrap();
        arena.checkpoint();
        let late = arena.charge(16, 1).unwrap();
        assert!(arena.before_checkpoint(early));
        assert!(!arena.before_checkpoint(late));
    }

    #[test]
    fn test_clear_resets() {
        let mut arena = Arena::with_reserve(256);
        arena.alloc_str("hello").unwrap();
        arena.checkpoint();
        arena.clear();
        assert_eq!(arena.position(), 0);
        assert_eq!(arena.last_checkpoint(), 0);
        assert_eq!(arena.available_z(), 256);
    }

    #[test]
    fn test_alloc_str_contents() {
        let mut arena = Arena::with_reserve(256);
        let s = arena.alloc_str("schematika").unwrap();
        assert_eq!(s, "schematika");
    }
}

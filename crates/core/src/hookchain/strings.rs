//! Temp string arena
//!
//! Scripts that replace a string argument or return value need the new
//! string to live until the hooked call returns. Buffers are handed out in
//! LIFO order: a nested hooked call acquires above its caller and releases
//! before the caller continues, so every call releases exactly what it took.

use std::ffi::CStr;

use parking_lot::Mutex;

use reapi_sdk::ScriptId;

use super::wire::NativeStr;

/// Returned instead of a buffer when the arena is exhausted
pub const EXHAUSTED_SENTINEL: &CStr = c"<reapi error>";

/// Default number of scratch buffers
pub const DEFAULT_TEMP_STRINGS: usize = 16;

/// Default size of one scratch buffer, NUL terminator included
pub const DEFAULT_TEMP_STRING_SIZE: usize = 1024;

/// Arena usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Calls to `acquire`
    pub acquire_calls: usize,
    /// Calls to `release`
    pub release_calls: usize,
    /// Buffers handed out successfully
    pub acquired: usize,
    /// Buffers given back
    pub released: usize,
    /// Acquisitions refused because every buffer was in use
    pub exhausted: usize,
}

struct ArenaInner {
    buffers: Vec<Box<[u8]>>,
    top: usize,
    stats: ArenaStats,
}

/// Stack of reusable string buffers
pub struct TempStringArena {
    inner: Mutex<ArenaInner>,
    buffer_size: usize,
}

impl TempStringArena {
    /// Create an arena of `count` buffers of `size` bytes each
    pub fn new(count: usize, size: usize) -> Self {
        let size = size.max(1);
        let buffers = (0..count)
            .map(|_| vec![0u8; size].into_boxed_slice())
            .collect();

        Self {
            inner: Mutex::new(ArenaInner {
                buffers,
                top: 0,
                stats: ArenaStats::default(),
            }),
            buffer_size: size,
        }
    }

    /// Copy `contents` into the next free buffer
    ///
    /// The copy is truncated to fit and always NUL-terminated. Returns `None`
    /// when every buffer is in use.
    pub fn acquire(&self, owner: ScriptId, contents: &str) -> Option<NativeStr> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.stats.acquire_calls += 1;

        let top = inner.top;
        let Some(buffer) = inner.buffers.get_mut(top) else {
            inner.stats.exhausted += 1;
            tracing::warn!(
                "Temp string arena exhausted ({} buffers in use), requested by {}",
                top,
                owner
            );
            return None;
        };

        let bytes = contents.as_bytes();
        let len = bytes.len().min(self.buffer_size - 1);
        buffer[..len].copy_from_slice(&bytes[..len]);
        buffer[len] = 0;
        let ptr = buffer.as_ptr();

        inner.top += 1;
        inner.stats.acquired += 1;
        Some(NativeStr::from_ptr(ptr.cast()))
    }

    /// Give back the `count` most recently acquired buffers
    pub fn release(&self, count: usize) {
        let mut inner = self.inner.lock();
        inner.stats.release_calls += 1;

        if count > inner.top {
            tracing::error!(
                "Temp string arena underflow: releasing {} of {} buffers",
                count,
                inner.top
            );
        }

        let released = count.min(inner.top);
        inner.top -= released;
        inner.stats.released += released;
    }

    /// Buffers currently handed out
    pub fn in_use(&self) -> usize {
        self.inner.lock().top
    }

    /// Total number of buffers
    pub fn capacity(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    /// Size of one buffer in bytes
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Snapshot of usage counters
    pub fn stats(&self) -> ArenaStats {
        self.inner.lock().stats
    }
}

impl Default for TempStringArena {
    fn default() -> Self {
        Self::new(DEFAULT_TEMP_STRINGS, DEFAULT_TEMP_STRING_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: ScriptId = ScriptId(1);

    #[test]
    fn test_arena_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TempStringArena>();
    }

    #[test]
    fn test_acquire_copies_contents() {
        let arena = TempStringArena::new(2, 32);
        let s = arena.acquire(OWNER, "models/player.mdl").unwrap();
        assert_eq!(unsafe { s.to_string_lossy() }, "models/player.mdl");
        assert_eq!(arena.in_use(), 1);
    }

    #[test]
    fn test_acquire_truncates() {
        let arena = TempStringArena::new(1, 4);
        let s = arena.acquire(OWNER, "abcdef").unwrap();
        assert_eq!(unsafe { s.to_string_lossy() }, "abc");
    }

    #[test]
    fn test_lifo_release() {
        let arena = TempStringArena::new(3, 16);
        let outer = arena.acquire(OWNER, "outer").unwrap();
        let _inner = arena.acquire(OWNER, "inner").unwrap();
        arena.release(1);

        // The outer string is untouched by the nested acquire/release
        let again = arena.acquire(OWNER, "next").unwrap();
        assert_eq!(unsafe { outer.to_string_lossy() }, "outer");
        assert_eq!(unsafe { again.to_string_lossy() }, "next");

        arena.release(2);
        assert_eq!(arena.in_use(), 0);

        let stats = arena.stats();
        assert_eq!(stats.acquired, 3);
        assert_eq!(stats.released, 3);
    }

    #[test]
    fn test_exhaustion() {
        let arena = TempStringArena::new(1, 16);
        assert!(arena.acquire(OWNER, "a").is_some());
        assert!(arena.acquire(OWNER, "b").is_none());
        assert_eq!(arena.stats().exhausted, 1);
        assert_eq!(arena.in_use(), 1);
    }

    #[test]
    fn test_release_underflow_clamps() {
        let arena = TempStringArena::new(2, 16);
        arena.acquire(OWNER, "a");
        arena.release(5);
        assert_eq!(arena.in_use(), 0);
        assert_eq!(arena.stats().released, 1);
    }
}

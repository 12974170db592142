//! Stack of active dispatch frames
//!
//! Each dispatch pushes a frame and pops it when done, so after a nested
//! dispatch returns, the enclosing call's frame is the active one again.

use parking_lot::Mutex;

use super::registry::FunctionId;

/// Step of the chain a frame is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    /// The original function is running; the frame is not active
    Original,
    Post,
}

/// One in-flight dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub function: FunctionId,
    pub phase: Phase,
}

#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Mutex<Vec<Frame>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame; it is popped when the guard drops
    pub fn enter(&self, function: FunctionId) -> FrameGuard<'_> {
        let mut frames = self.frames.lock();
        frames.push(Frame {
            function,
            phase: Phase::Pre,
        });
        FrameGuard {
            stack: self,
            depth: frames.len(),
        }
    }

    /// Number of in-flight dispatches
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }

    /// Innermost frame whose callbacks may touch their context
    ///
    /// `None` when idle or while the innermost frame's original runs.
    pub fn active(&self) -> Option<Frame> {
        self.frames
            .lock()
            .last()
            .copied()
            .filter(|frame| frame.phase != Phase::Original)
    }

    fn set_phase(&self, depth: usize, phase: Phase) {
        if let Some(frame) = self.frames.lock().get_mut(depth - 1) {
            frame.phase = phase;
        }
    }

    fn pop(&self, depth: usize) {
        let mut frames = self.frames.lock();
        if frames.len() != depth {
            tracing::error!("Context stack out of order: popping depth {} of {}", depth, frames.len());
        }
        frames.truncate(depth - 1);
    }
}

/// RAII handle for a pushed frame
#[must_use]
pub struct FrameGuard<'a> {
    stack: &'a ContextStack,
    depth: usize,
}

impl FrameGuard<'_> {
    pub fn set_phase(&self, phase: Phase) {
        self.stack.set_phase(self.depth, phase);
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTER: FunctionId = FunctionId(1);
    const INNER: FunctionId = FunctionId(2);

    #[test]
    fn test_nested_frames_restore() {
        let stack = ContextStack::new();
        assert_eq!(stack.active(), None);

        let outer = stack.enter(OUTER);
        outer.set_phase(Phase::Original);
        assert_eq!(stack.active(), None);

        {
            let _inner = stack.enter(INNER);
            assert_eq!(stack.depth(), 2);
            assert_eq!(stack.active().map(|f| f.function), Some(INNER));
        }

        assert_eq!(stack.depth(), 1);
        outer.set_phase(Phase::Post);
        assert_eq!(
            stack.active(),
            Some(Frame {
                function: OUTER,
                phase: Phase::Post,
            })
        );

        drop(outer);
        assert_eq!(stack.depth(), 0);
    }
}

//! Fixed-depth loop and call stacks.

use super::DecodeError;

/// One active loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopFrame {
    /// Offset of the first opcode inside the loop.
    pub start: u32,
    /// Completed iterations.
    pub iteration: u16,
}

/// Loop nesting stack with a hard depth limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
    depth: usize,
}

impl LoopStack {
    /// Create a stack holding at most `depth` frames.
    pub fn new(depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(depth),
            depth,
        }
    }

    /// Push a new loop starting at `start`.
    pub fn push(&mut self, start: u32, at: u32) -> Result<usize, DecodeError> {
        if self.frames.len() >= self.depth {
            return Err(DecodeError::StackOverflow {
                stack: "loop",
                offset: at,
                depth: self.depth,
            });
        }
        self.frames.push(LoopFrame {
            start,
            iteration: 0,
        });
        Ok(self.frames.len())
    }

    /// Innermost frame.
    pub fn top_mut(&mut self, at: u32) -> Result<&mut LoopFrame, DecodeError> {
        self.frames
            .last_mut()
            .ok_or(DecodeError::LoopUnderflow { offset: at })
    }

    /// Drop the innermost frame.
    pub fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    /// Current nesting depth.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` outside any loop.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[LoopFrame] {
        &self.frames
    }

    /// Drop all frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// One active subroutine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallFrame {
    /// Offset to resume at after the final return.
    pub return_to: u32,
    /// Subroutine entry point.
    pub target: u32,
    /// Remaining repetitions including the current one.
    pub remaining: u8,
    /// Completed repetitions.
    pub iteration: u8,
}

/// Subroutine call stack with a hard depth limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    depth: usize,
}

impl CallStack {
    /// Create a stack holding at most `depth` frames.
    pub fn new(depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(depth),
            depth,
        }
    }

    /// Enter a subroutine that runs `count` times.
    pub fn push(&mut self, return_to: u32, target: u32, count: u8, at: u32) -> Result<(), DecodeError> {
        if self.frames.len() >= self.depth {
            return Err(DecodeError::StackOverflow {
                stack: "call",
                offset: at,
                depth: self.depth,
            });
        }
        self.frames.push(CallFrame {
            return_to,
            target,
            remaining: count.max(1),
            iteration: 0,
        });
        Ok(())
    }

    /// Finish one pass through the innermost subroutine.
    ///
    /// Returns the offset to continue at: the entry point again while
    /// repetitions remain, otherwise the return address. `None` if no call is
    /// active.
    pub fn finish_pass(&mut self) -> Option<u32> {
        let frame = self.frames.last_mut()?;
        frame.remaining -= 1;
        frame.iteration = frame.iteration.wrapping_add(1);
        if frame.remaining > 0 {
            return Some(frame.target);
        }
        self.frames.pop().map(|f| f.return_to)
    }

    /// Current nesting depth.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` outside any call.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Drop all frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

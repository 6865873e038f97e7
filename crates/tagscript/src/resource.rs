//! Resource limits the evaluator can be asked to enforce.
//!
//! Grounded on the teacher's `resource.rs` `ResourceTracker` trait: the core
//! interpreter has no opinion on limits (no Non-goal excludes embedding it
//! in a sandbox), so recursion depth and step counting are threaded through
//! a trait the embedder implements, with a no-op default for callers that
//! don't need one.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum ResourceError {
    Recursion { limit: usize, depth: usize },
    Operation { limit: u64, count: u64 },
    Time { limit: Duration, elapsed: Duration },
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceError::Recursion { limit, depth } => {
                write!(f, "maximum recursion depth exceeded: {depth} > {limit}")
            }
            ResourceError::Operation { limit, count } => {
                write!(f, "operation limit exceeded: {count} > {limit}")
            }
            ResourceError::Time { limit, elapsed } => {
                write!(f, "time limit exceeded: {elapsed:?} > {limit:?}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Called by the evaluator at call entry/exit and at each statement, so an
/// embedder can cap a sandboxed run without the core depending on any
/// specific policy.
pub trait ResourceTracker {
    fn enter_call(&mut self) -> Result<(), ResourceError>;
    fn exit_call(&mut self);
    fn tick(&mut self) -> Result<(), ResourceError>;
}

/// The default: no limits at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn enter_call(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
    fn exit_call(&mut self) {}
    fn tick(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// A tracker that caps call-stack depth, step count, and wall-clock time —
/// the knobs a sandboxing embedder is most likely to want.
pub struct LimitTracker {
    max_depth: usize,
    depth: usize,
    max_ops: u64,
    ops: u64,
    deadline: Option<Instant>,
}

impl LimitTracker {
    pub fn new(max_depth: usize, max_ops: u64, time_limit: Option<Duration>) -> Self {
        Self { max_depth, depth: 0, max_ops, ops: 0, deadline: time_limit.map(|d| Instant::now() + d) }
    }
}

impl ResourceTracker for LimitTracker {
    fn enter_call(&mut self) -> Result<(), ResourceError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ResourceError::Recursion { limit: self.max_depth, depth: self.depth });
        }
        Ok(())
    }

    fn exit_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn tick(&mut self) -> Result<(), ResourceError> {
        self.ops += 1;
        if self.ops > self.max_ops {
            return Err(ResourceError::Operation { limit: self.max_ops, count: self.ops });
        }
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now > deadline {
                return Err(ResourceError::Time { limit: deadline.duration_since(now), elapsed: now.duration_since(deadline) });
            }
        }
        Ok(())
    }
}

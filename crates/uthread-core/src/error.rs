//! Error types for the uthread runtime

use core::fmt;
use crate::id::Tid;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors reported by [`Queue`](crate::queue::Queue)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A node could not be allocated
    AllocationFailed,

    /// The queue holds no items
    Empty,

    /// No item matched a delete request
    NotFound,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::AllocationFailed => write!(f, "queue node allocation failed"),
            QueueError::Empty => write!(f, "queue is empty"),
            QueueError::NotFound => write!(f, "item not found in queue"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Stack memory errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    AllocationFailed,

    /// mprotect failed
    ProtectionFailed,

    /// Requested stack size is zero, too small or overflows
    InvalidSize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "stack allocation failed"),
            MemoryError::ProtectionFailed => write!(f, "stack guard protection failed"),
            MemoryError::InvalidSize => write!(f, "invalid stack size"),
        }
    }
}

impl std::error::Error for MemoryError {}

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Rejected argument (self-join, join on the initial thread)
    InvalidArgument(&'static str),

    /// Join target is neither ready nor a zombie
    NotFound(Tid),

    /// Another thread is already joining this target
    AlreadyJoining(Tid),

    /// Runtime already initialized on this OS thread
    AlreadyInitialized,

    /// The largest live TID is `u32::MAX`
    TidExhausted,

    /// Bookkeeping queue failure
    Queue(QueueError),

    /// Stack allocation failure
    Memory(MemoryError),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidArgument(why) => write!(f, "invalid argument: {}", why),
            SchedError::NotFound(tid) => write!(f, "thread {} not found", tid),
            SchedError::AlreadyJoining(tid) => write!(f, "thread {} already has a joiner", tid),
            SchedError::AlreadyInitialized => write!(f, "runtime already initialized"),
            SchedError::TidExhausted => write!(f, "no thread id left above the largest live one"),
            SchedError::Queue(e) => write!(f, "queue error: {}", e),
            SchedError::Memory(e) => write!(f, "memory error: {}", e),
        }
    }
}

impl std::error::Error for SchedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedError::Queue(e) => Some(e),
            SchedError::Memory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<QueueError> for SchedError {
    fn from(e: QueueError) -> Self {
        SchedError::Queue(e)
    }
}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::Memory(e)
    }
}

//! Diagnostic events and the sinks that receive them.
//!
//! Bitmap operations never log through a global channel. Every fallible
//! operation takes a [`DiagnosticSink`] and reports bounds or schema problems
//! as structured [`Diagnostic`] events.
//!
//! # Conformance rules
//!
//! 1. A rejected bit access emits exactly one event.
//! 2. Sinks MUST NOT panic, block, or perform I/O beyond logging.
//! 3. All events implement `serde::Serialize` for JSON export.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::address::AddressError;

// ---------------------------------------------------------------------------
// Event schema
// ---------------------------------------------------------------------------

/// Event severity as seen by the logging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
}

/// Kind of bit access that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitAccess {
    Get,
    Set,
    Clear,
}

impl BitAccess {
    /// Access kind for a `set_item` call with the given state.
    #[must_use]
    pub const fn for_state(state: bool) -> Self {
        if state { Self::Set } else { Self::Clear }
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Clear => "clear",
        }
    }
}

/// Structured diagnostic emitted by bitmap operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// A `(page, item)` access failed validation and was not applied.
    AddressRejected {
        access: BitAccess,
        reason: AddressError,
    },
    /// An index tuple carried an item pointer with offset 0.
    InvalidIndexReference {
        /// Index page holding the tuple.
        index_page: u32,
        /// Slot of the tuple on the index page.
        slot: u32,
        /// Heap block the tuple points at.
        block: u32,
    },
    /// Compared bitmaps track a different number of pages.
    PageCountMismatch { left: u32, right: u32 },
    /// Compared bitmaps track a different number of items.
    ItemTotalMismatch { left: u32, right: u32 },
    /// Rendered bitmap summary.
    BitmapDump { text: String },
}

impl Diagnostic {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::BitmapDump { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Stable label for the variant.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::AddressRejected { .. } => "address_rejected",
            Self::InvalidIndexReference { .. } => "invalid_index_reference",
            Self::PageCountMismatch { .. } => "page_count_mismatch",
            Self::ItemTotalMismatch { .. } => "item_total_mismatch",
            Self::BitmapDump { .. } => "bitmap_dump",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressRejected { access, reason } => {
                write!(f, "{} rejected: {reason}", access.as_str())
            }
            Self::InvalidIndexReference {
                index_page,
                slot,
                block,
            } => write!(
                f,
                "index page {index_page} slot {slot} points at block {block} with offset 0"
            ),
            Self::PageCountMismatch { left, right } => write!(
                f,
                "bitmaps do not track the same number of pages ({left} != {right})"
            ),
            Self::ItemTotalMismatch { left, right } => write!(
                f,
                "bitmaps do not track the same number of items ({left} != {right})"
            ),
            Self::BitmapDump { text } => f.write_str(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Receiver for diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    /// Called once per event.
    fn emit(&self, event: &Diagnostic);
}

/// Sink that drops every event.
pub struct NoOpSink;

impl DiagnosticSink for NoOpSink {
    #[inline]
    fn emit(&self, _event: &Diagnostic) {}
}

/// Sink that forwards events to `tracing`.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &Diagnostic) {
        match event.severity() {
            Severity::Warning => warn!(kind = event.kind_str(), "{event}"),
            Severity::Info => info!(kind = event.kind_str(), "{event}"),
        }
    }
}

/// Sink that keeps the last N events for later inspection.
pub struct RingBufferSink {
    events: parking_lot::Mutex<RingBufferInner>,
}

struct RingBufferInner {
    buf: Vec<Diagnostic>,
    capacity: usize,
    write_pos: usize,
    count: usize,
    warnings: u64,
}

impl RingBufferSink {
    /// Create a ring buffer holding at most `capacity` events (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: parking_lot::Mutex::new(RingBufferInner {
                buf: Vec::with_capacity(capacity),
                capacity,
                write_pos: 0,
                count: 0,
                warnings: 0,
            }),
        }
    }

    /// Copy out the retained events in chronological order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        let inner = self.events.lock();
        Self::ordered(&inner)
    }

    /// Take the retained events in chronological order, leaving the buffer
    /// empty. The warning count is kept.
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut inner = self.events.lock();
        let events = Self::ordered(&inner);
        inner.buf.clear();
        inner.write_pos = 0;
        inner.count = 0;
        events
    }

    fn ordered(inner: &RingBufferInner) -> Vec<Diagnostic> {
        let n = inner.count.min(inner.capacity);
        let mut result = Vec::with_capacity(n);
        if n == 0 {
            return result;
        }
        let start = if inner.count >= inner.capacity {
            inner.write_pos
        } else {
            0
        };
        for i in 0..n {
            let idx = (start + i) % inner.capacity;
            result.push(inner.buf[idx].clone());
        }
        result
    }

    /// Number of events currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.events.lock();
        inner.count.min(inner.capacity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Warning-level events seen since creation, including evicted ones.
    #[must_use]
    pub fn warnings(&self) -> u64 {
        self.events.lock().warnings
    }
}

impl DiagnosticSink for RingBufferSink {
    fn emit(&self, event: &Diagnostic) {
        let mut inner = self.events.lock();
        if event.severity() == Severity::Warning {
            inner.warnings += 1;
        }
        let pos = inner.write_pos;
        if inner.buf.len() < inner.capacity {
            inner.buf.push(event.clone());
        } else {
            inner.buf[pos] = event.clone();
        }
        inner.write_pos = (pos + 1) % inner.capacity;
        inner.count += 1;
    }
}

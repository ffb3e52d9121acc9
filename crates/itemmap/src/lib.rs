//! Per-page item occupancy bitmaps for heap/index consistency checking.
//!
//! A heap scan marks the head of every version chain; each index scan marks
//! the heap items its entries point at. Both bitmaps share one page layout,
//! so a bitwise comparison counts index entries that are missing or stale.

pub mod address;
pub mod check;
pub mod config;
pub mod diagnostics;
pub mod encode;
pub mod growth;
pub mod integrate;
pub mod persist;
pub mod sink;
pub mod slots;
pub mod store;

pub use address::{AddressError, BitAddress, bit_address};
pub use check::{
    CheckOutcome, CheckReport, IndexFixture, IndexInput, IndexReport, ItemRef, RelationFixture,
    build_heap_bitmap, build_index_bitmap, check_relation,
};
pub use config::{BitmapConfig, CheckConfig};
pub use diagnostics::{
    BitmapFormat, DiffSide, ItemDiff, compare, count_set_bits, diff_items, print_bitmap, render,
};
pub use integrate::{integrate_heap_page, integrate_index_page};
pub use itemmap_error::{ItemMapError, Result};
pub use persist::UNREGISTERED_PAGE;
pub use sink::{
    BitAccess, Diagnostic, DiagnosticSink, NoOpSink, RingBufferSink, Severity, TracingSink,
};
pub use slots::{
    HeapPageSlots, HeapPageView, HeapSlot, HeapTid, IndexPageSlots, IndexPageView,
    LinePointerState, TupleFlags,
};
pub use store::ItemBitmap;

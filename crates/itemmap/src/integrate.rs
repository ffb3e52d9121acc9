//! Feeding bitmaps from decoded heap and index pages.
//!
//! Indexes reference only the head of a version chain, so the heap side marks
//! every used slot and then clears heap-only continuations. The index side
//! marks the heap location each index tuple points at, which makes a heap
//! bitmap and an index bitmap built on the same page layout directly
//! comparable.

use tracing::debug;

use crate::sink::{Diagnostic, DiagnosticSink};
use crate::slots::{HeapPageView, IndexPageView};
use crate::store::ItemBitmap;

/// Register heap page `page_index` and mark its chain heads.
///
/// Pass 1 sets the bit of every used slot. Pass 2 clears the bit of every
/// heap-only slot that is currently set. Each slot is judged on its own
/// flags; chains are not walked from head to tail.
///
/// Returns the number of rejected bit accesses across both passes.
pub fn integrate_heap_page<P>(
    bitmap: &mut ItemBitmap,
    page: &P,
    page_index: u32,
    sink: &dyn DiagnosticSink,
) -> u32
where
    P: HeapPageView + ?Sized,
{
    let slots = page.slot_count();
    bitmap.add_page(page_index, slots);

    let mut errors = 0_u32;
    let mut marked = 0_u32;
    for slot in 0..slots {
        if page.is_used(slot) {
            if bitmap.set_item(page_index, slot, true, sink) {
                marked += 1;
            } else {
                errors += 1;
            }
        }
    }

    let mut collapsed = 0_u32;
    for slot in 0..slots {
        if page.is_heap_only(slot) && bitmap.get_item(page_index, slot, sink) {
            if bitmap.set_item(page_index, slot, false, sink) {
                collapsed += 1;
            } else {
                errors += 1;
            }
        }
    }

    debug!(
        page = page_index,
        slots, marked, collapsed, errors, "heap page integrated"
    );
    errors
}

/// Mark every heap location referenced by index page `page_index`.
///
/// The bitmap must already carry the heap's page layout (typically a
/// [`ItemBitmap::duplicate`] of the heap bitmap); no pages are registered
/// here. Returns the number of references that could not be marked.
pub fn integrate_index_page<P>(
    bitmap: &mut ItemBitmap,
    page: &P,
    page_index: u32,
    sink: &dyn DiagnosticSink,
) -> u32
where
    P: IndexPageView + ?Sized,
{
    let slots = page.slot_count();
    let mut errors = 0_u32;

    for slot in 0..slots {
        let tid = page.heap_tid(slot);
        let Some(item) = tid.item_index() else {
            sink.emit(&Diagnostic::InvalidIndexReference {
                index_page: page_index,
                slot,
                block: tid.block,
            });
            errors += 1;
            continue;
        };
        if !bitmap.set_item(tid.block, item, true, sink) {
            errors += 1;
        }
    }

    debug!(page = page_index, slots, errors, "index page integrated");
    errors
}

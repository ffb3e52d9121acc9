//! Decoded page views consumed by the scan integrators.
//!
//! Raw page decoding lives outside this crate. A decoder exposes heap pages
//! through [`HeapPageView`] and index pages through [`IndexPageView`]; the
//! in-memory [`HeapPageSlots`] / [`IndexPageSlots`] tables implement both and
//! double as the JSON fixture format.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// State of a line pointer in a heap page's slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePointerState {
    /// Free slot.
    #[default]
    Unused,
    /// Points at a tuple.
    Normal,
    /// Forwards to another slot on the same page (pruned chain head).
    Redirect,
    /// Tuple removed, storage not yet reclaimed.
    Dead,
}

impl LinePointerState {
    /// Any state other than `Unused`.
    #[must_use]
    pub const fn is_used(self) -> bool {
        !matches!(self, Self::Unused)
    }

    /// Whether the slot carries tuple storage whose header can be inspected.
    #[must_use]
    pub const fn has_storage(self) -> bool {
        matches!(self, Self::Normal)
    }
}

bitflags! {
    /// Tuple header bits relevant to version chains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TupleFlags: u16 {
        /// Tuple was updated and the new version lives on the same page.
        const HOT_UPDATED = 0x4000;
        /// Tuple is a chain continuation and is not referenced by indexes.
        const HEAP_ONLY = 0x8000;
    }
}

/// Heap tuple identifier as stored in index tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapTid {
    /// Heap page number.
    pub block: u32,
    /// 1-based slot number; 0 is never a valid reference.
    pub offset: u16,
}

impl HeapTid {
    #[must_use]
    pub const fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }

    /// 0-based item index, or `None` for the invalid offset 0.
    #[must_use]
    pub const fn item_index(self) -> Option<u32> {
        match self.offset {
            0 => None,
            n => Some(n as u32 - 1),
        }
    }
}

/// Decoded heap page.
pub trait HeapPageView {
    /// Number of line pointers on the page.
    fn slot_count(&self) -> u32;
    /// Whether slot `slot` holds anything (normal, redirect or dead).
    fn is_used(&self, slot: u32) -> bool;
    /// Whether the tuple at `slot` is a heap-only chain continuation.
    fn is_heap_only(&self, slot: u32) -> bool;
}

/// Decoded index page.
pub trait IndexPageView {
    /// Number of index tuples on the page.
    fn slot_count(&self) -> u32;
    /// Heap TID referenced by the tuple at `slot`.
    fn heap_tid(&self, slot: u32) -> HeapTid;
}

/// One heap line pointer with the tuple flags of the tuple it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeapSlot {
    pub state: LinePointerState,
    #[serde(default)]
    pub flags: TupleFlags,
}

impl HeapSlot {
    #[must_use]
    pub const fn unused() -> Self {
        Self {
            state: LinePointerState::Unused,
            flags: TupleFlags::empty(),
        }
    }

    /// A live tuple that heads its chain (or has no chain).
    #[must_use]
    pub const fn normal() -> Self {
        Self {
            state: LinePointerState::Normal,
            flags: TupleFlags::empty(),
        }
    }

    /// A live tuple that continues a chain.
    #[must_use]
    pub const fn heap_only() -> Self {
        Self {
            state: LinePointerState::Normal,
            flags: TupleFlags::HEAP_ONLY,
        }
    }

    #[must_use]
    pub const fn redirect() -> Self {
        Self {
            state: LinePointerState::Redirect,
            flags: TupleFlags::empty(),
        }
    }

    #[must_use]
    pub const fn dead() -> Self {
        Self {
            state: LinePointerState::Dead,
            flags: TupleFlags::empty(),
        }
    }
}

/// In-memory heap page slot table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeapPageSlots {
    pub slots: Vec<HeapSlot>,
}

impl HeapPageSlots {
    #[must_use]
    pub fn new(slots: Vec<HeapSlot>) -> Self {
        Self { slots }
    }
}

impl HeapPageView for HeapPageSlots {
    fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    fn is_used(&self, slot: u32) -> bool {
        self.slots
            .get(slot as usize)
            .is_some_and(|s| s.state.is_used())
    }

    fn is_heap_only(&self, slot: u32) -> bool {
        self.slots
            .get(slot as usize)
            .is_some_and(|s| s.state.has_storage() && s.flags.contains(TupleFlags::HEAP_ONLY))
    }
}

/// In-memory index page: the heap TIDs of its tuples in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexPageSlots {
    pub refs: Vec<HeapTid>,
}

impl IndexPageSlots {
    #[must_use]
    pub fn new(refs: Vec<HeapTid>) -> Self {
        Self { refs }
    }
}

impl IndexPageView for IndexPageSlots {
    fn slot_count(&self) -> u32 {
        self.refs.len() as u32
    }

    fn heap_tid(&self, slot: u32) -> HeapTid {
        self.refs
            .get(slot as usize)
            .copied()
            .unwrap_or(HeapTid::new(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_pointer_usage() {
        assert!(!LinePointerState::Unused.is_used());
        assert!(LinePointerState::Normal.is_used());
        assert!(LinePointerState::Redirect.is_used());
        assert!(LinePointerState::Dead.is_used());
        assert!(!LinePointerState::Redirect.has_storage());
    }

    #[test]
    fn heap_only_requires_tuple_storage() {
        let page = HeapPageSlots::new(vec![
            HeapSlot::heap_only(),
            HeapSlot {
                state: LinePointerState::Redirect,
                flags: TupleFlags::HEAP_ONLY,
            },
            HeapSlot::normal(),
        ]);
        assert!(page.is_heap_only(0));
        assert!(!page.is_heap_only(1));
        assert!(!page.is_heap_only(2));
        assert!(!page.is_heap_only(3));
        assert!(!page.is_used(3));
    }

    #[test]
    fn tid_offsets_are_one_based() {
        assert_eq!(HeapTid::new(4, 1).item_index(), Some(0));
        assert_eq!(HeapTid::new(4, 291).item_index(), Some(290));
        assert_eq!(HeapTid::new(4, 0).item_index(), None);
    }

    #[test]
    fn fixture_json_shape() {
        let json = r#"{"slots":[{"state":"normal"},{"state":"normal","flags":"HEAP_ONLY"},{"state":"unused"}]}"#;
        let page: HeapPageSlots = serde_json::from_str(json).expect("fixture parses");
        assert_eq!(page.slot_count(), 3);
        assert!(page.is_heap_only(1));
        assert!(!page.is_used(2));

        let index: IndexPageSlots =
            serde_json::from_str(r#"{"refs":[{"block":0,"offset":1}]}"#).expect("fixture parses");
        assert_eq!(index.heap_tid(0), HeapTid::new(0, 1));
    }
}

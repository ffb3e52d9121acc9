//! Growable per-page item occupancy bitmap.
//!
//! Pages are registered in order with their item counts. Each registered item
//! owns one bit; the bit for `(page, item)` sits at
//! `cumulative[page - 1] + item`. The byte buffer grows in whole chunks as
//! pages are added and never shrinks.

use itemmap_error::{ItemMapError, Result};
use tracing::{debug, trace};

use crate::address::{AddressError, BitAddress, bit_address};
use crate::config::BitmapConfig;
use crate::growth::{bytes_for_bits, grown_capacity, initial_capacity};
use crate::sink::{BitAccess, Diagnostic, DiagnosticSink};

/// Occupancy bitmap over `(page, item)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBitmap {
    page_count: u32,
    max_items_per_page: u32,
    growth_chunk: usize,
    /// One entry per registered page: items on pages `0..=i`.
    cumulative: Vec<u32>,
    /// Bytes covering all registered items.
    used_bytes: usize,
    /// Zero-initialized; `bits.len()` is the byte capacity.
    bits: Vec<u8>,
}

impl ItemBitmap {
    /// Create an empty bitmap that will track `page_count` pages.
    #[must_use]
    pub fn new(page_count: u32) -> Self {
        Self::with_config(page_count, &BitmapConfig::default())
    }

    /// Create an empty bitmap with explicit bounds.
    #[must_use]
    pub fn with_config(page_count: u32, config: &BitmapConfig) -> Self {
        let chunk = config.growth_chunk_bytes.max(1);
        let capacity = initial_capacity(page_count, chunk);
        debug!(page_count, capacity, chunk, "item bitmap created");
        Self {
            page_count,
            max_items_per_page: config.max_items_per_page,
            growth_chunk: chunk,
            cumulative: Vec::with_capacity(page_count as usize),
            used_bytes: 0,
            bits: vec![0; capacity],
        }
    }

    /// Same page layout and capacity, all bits cleared.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            page_count: self.page_count,
            max_items_per_page: self.max_items_per_page,
            growth_chunk: self.growth_chunk,
            cumulative: self.cumulative.clone(),
            used_bytes: self.used_bytes,
            bits: vec![0; self.bits.len()],
        }
    }

    /// Clear every bit; page registrations are kept.
    pub fn reset(&mut self) {
        self.bits.fill(0);
    }

    /// Release the bitmap.
    pub fn destroy(self) {
        trace!(
            page_count = self.page_count,
            capacity = self.bits.len(),
            "item bitmap released"
        );
    }

    /// Register the next page and its item count.
    ///
    /// # Panics
    ///
    /// Pages must be added as `0, 1, 2, ...` up to `page_count - 1`, each with
    /// at most `max_items_per_page` items, and the running item total must fit
    /// in a `u32`. Anything else is a caller bug.
    pub fn add_page(&mut self, page: u32, items: u32) {
        assert!(
            page < self.page_count,
            "page {page} out of range (page count {})",
            self.page_count
        );
        assert!(
            items <= self.max_items_per_page,
            "page {page} has {items} items (max {})",
            self.max_items_per_page
        );
        assert_eq!(
            page as usize,
            self.cumulative.len(),
            "pages must be added in order without gaps"
        );

        let Some(total) = self.total_items().checked_add(items) else {
            panic!(
                "page {page} overflows the item total ({} + {items})",
                self.total_items()
            );
        };
        self.cumulative.push(total);
        self.used_bytes = bytes_for_bits(u64::from(total));

        if self.used_bytes > self.bits.len() {
            let old = self.bits.len();
            let new = grown_capacity(old, self.used_bytes, self.growth_chunk);
            self.bits.resize(new, 0);
            debug!(page, old_capacity = old, new_capacity = new, "item bitmap grown");
        }
    }

    /// Set or clear the bit of `(page, item)`.
    ///
    /// Returns `false` and emits one warning if the pair is out of bounds.
    /// Setting an already set bit succeeds.
    pub fn set_item(
        &mut self,
        page: u32,
        item: u32,
        state: bool,
        sink: &dyn DiagnosticSink,
    ) -> bool {
        let Some(addr) = self.checked_address(page, item, BitAccess::for_state(state), sink)
        else {
            return false;
        };
        if state {
            self.bits[addr.byte_index] |= addr.mask();
        } else {
            self.bits[addr.byte_index] &= !addr.mask();
        }
        true
    }

    /// Read the bit of `(page, item)`.
    ///
    /// Returns `false` and emits one warning if the pair is out of bounds.
    pub fn get_item(&self, page: u32, item: u32, sink: &dyn DiagnosticSink) -> bool {
        self.checked_address(page, item, BitAccess::Get, sink)
            .is_some_and(|addr| self.bits[addr.byte_index] & addr.mask() != 0)
    }

    /// Resolve `(page, item)` without reporting.
    pub fn address(&self, page: u32, item: u32) -> std::result::Result<BitAddress, AddressError> {
        bit_address(&self.cumulative, self.page_count, self.used_bytes, page, item)
    }

    fn checked_address(
        &self,
        page: u32,
        item: u32,
        access: BitAccess,
        sink: &dyn DiagnosticSink,
    ) -> Option<BitAddress> {
        match self.address(page, item) {
            Ok(addr) => Some(addr),
            Err(reason) => {
                sink.emit(&Diagnostic::AddressRejected { access, reason });
                None
            }
        }
    }

    /// Number of pages this bitmap tracks.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of pages registered so far.
    #[must_use]
    pub fn registered_pages(&self) -> u32 {
        self.cumulative.len() as u32
    }

    /// Cumulative item counts of the registered pages.
    #[must_use]
    pub fn cumulative_item_counts(&self) -> &[u32] {
        &self.cumulative
    }

    /// Items across all registered pages.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Items registered for `page`, if the page is registered.
    #[must_use]
    pub fn local_item_count(&self, page: u32) -> Option<u32> {
        let idx = page as usize;
        let end = *self.cumulative.get(idx)?;
        let start = if idx == 0 { 0 } else { self.cumulative[idx - 1] };
        Some(end - start)
    }

    /// Bits in use, rounded up to a byte boundary.
    #[must_use]
    pub const fn bit_length_used(&self) -> u64 {
        self.used_bytes as u64 * 8
    }

    /// Allocated bytes.
    #[must_use]
    pub fn byte_capacity(&self) -> usize {
        self.bits.len()
    }

    /// The bytes covering registered items.
    #[must_use]
    pub fn used_bytes(&self) -> &[u8] {
        &self.bits[..self.used_bytes]
    }

    /// Whole buffer, including the zeroed tail beyond the used span.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.bits
    }

    #[must_use]
    pub const fn max_items_per_page(&self) -> u32 {
        self.max_items_per_page
    }

    #[must_use]
    pub const fn growth_chunk(&self) -> usize {
        self.growth_chunk
    }

    /// Reassemble a bitmap from already validated parts.
    pub(crate) fn from_parts(
        page_count: u32,
        config: &BitmapConfig,
        cumulative: Vec<u32>,
        bits: Vec<u8>,
    ) -> Result<Self> {
        let total = cumulative.last().copied().unwrap_or(0);
        let used_bytes = bytes_for_bits(u64::from(total));
        if used_bytes > bits.len() {
            return Err(ItemMapError::corrupt(format!(
                "{used_bytes} used bytes exceed capacity {}",
                bits.len()
            )));
        }
        Ok(Self {
            page_count,
            max_items_per_page: config.max_items_per_page,
            growth_chunk: config.growth_chunk_bytes.max(1),
            cumulative,
            used_bytes,
            bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{NoOpSink, RingBufferSink};

    fn small_config() -> BitmapConfig {
        BitmapConfig {
            max_items_per_page: 64,
            growth_chunk_bytes: 4,
        }
    }

    #[test]
    fn new_bitmap_is_empty_but_preallocated() {
        let bm = ItemBitmap::new(10);
        assert_eq!(bm.page_count(), 10);
        assert_eq!(bm.registered_pages(), 0);
        assert_eq!(bm.total_items(), 0);
        assert_eq!(bm.bit_length_used(), 0);
        assert_eq!(bm.byte_capacity(), 1024);
        assert!(bm.raw_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn add_page_accumulates_counts() {
        let mut bm = ItemBitmap::new(4);
        bm.add_page(0, 3);
        bm.add_page(1, 0);
        bm.add_page(2, 10);
        bm.add_page(3, 5);
        assert_eq!(bm.cumulative_item_counts(), &[3, 3, 13, 18]);
        assert_eq!(bm.local_item_count(2), Some(10));
        assert_eq!(bm.local_item_count(1), Some(0));
        assert_eq!(bm.local_item_count(4), None);
        assert_eq!(bm.bit_length_used(), 24);
        assert_eq!(bm.used_bytes().len(), 3);
    }

    #[test]
    #[should_panic(expected = "in order")]
    fn add_page_out_of_order_panics() {
        let mut bm = ItemBitmap::new(4);
        bm.add_page(0, 3);
        bm.add_page(2, 3);
    }

    #[test]
    #[should_panic(expected = "in order")]
    fn add_page_twice_panics() {
        let mut bm = ItemBitmap::new(4);
        bm.add_page(0, 3);
        bm.add_page(0, 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn add_page_beyond_count_panics() {
        let mut bm = ItemBitmap::new(1);
        bm.add_page(0, 3);
        bm.add_page(1, 3);
    }

    #[test]
    #[should_panic(expected = "max 291")]
    fn add_page_with_too_many_items_panics() {
        let mut bm = ItemBitmap::new(1);
        bm.add_page(0, 292);
    }

    #[test]
    fn set_then_get_toggles() {
        let mut bm = ItemBitmap::new(2);
        bm.add_page(0, 5);
        bm.add_page(1, 7);
        let sink = RingBufferSink::new(8);

        assert!(!bm.get_item(1, 6, &sink));
        assert!(bm.set_item(1, 6, true, &sink));
        assert!(bm.get_item(1, 6, &sink));
        assert!(bm.set_item(1, 6, false, &sink));
        assert!(!bm.get_item(1, 6, &sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn double_set_is_accepted_silently() {
        let mut bm = ItemBitmap::new(1);
        bm.add_page(0, 4);
        let sink = RingBufferSink::new(8);
        assert!(bm.set_item(0, 2, true, &sink));
        assert!(bm.set_item(0, 2, true, &sink));
        assert!(bm.get_item(0, 2, &sink));
        assert_eq!(sink.warnings(), 0);
    }

    #[test]
    fn bits_are_lsb_first_across_pages() {
        let mut bm = ItemBitmap::new(2);
        bm.add_page(0, 3);
        bm.add_page(1, 6);
        assert!(bm.set_item(0, 0, true, &NoOpSink));
        assert!(bm.set_item(1, 0, true, &NoOpSink));
        assert!(bm.set_item(1, 5, true, &NoOpSink));
        // Offsets 0, 3 and 8.
        assert_eq!(bm.used_bytes(), &[0b0000_1001, 0b0000_0001]);
    }

    #[test]
    fn out_of_range_get_warns_once_and_does_not_mutate() {
        let mut bm = ItemBitmap::new(2);
        bm.add_page(0, 5);
        bm.add_page(1, 5);
        assert!(bm.set_item(1, 1, true, &NoOpSink));
        let before = bm.clone();
        let sink = RingBufferSink::new(8);

        assert!(!bm.get_item(bm.page_count(), 0, &sink));
        assert_eq!(sink.warnings(), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(bm, before);
    }

    #[test]
    fn rejected_set_leaves_bits_untouched() {
        let mut bm = ItemBitmap::new(3);
        bm.add_page(0, 4);
        let sink = RingBufferSink::new(8);

        assert!(!bm.set_item(0, 4, true, &sink));
        assert!(!bm.set_item(1, 0, true, &sink));
        assert!(!bm.set_item(3, 0, true, &sink));
        assert!(bm.raw_bytes().iter().all(|b| *b == 0));
        let events = sink.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1],
            Diagnostic::AddressRejected {
                access: BitAccess::Set,
                reason: AddressError::PageNotRegistered { page: 1, .. }
            }
        ));
    }

    #[test]
    fn growth_preserves_bits_and_zero_fills_new_chunk() {
        let mut bm = ItemBitmap::with_config(8, &small_config());
        assert_eq!(bm.byte_capacity(), 4);
        bm.add_page(0, 30);
        assert!(bm.set_item(0, 0, true, &NoOpSink));
        assert!(bm.set_item(0, 29, true, &NoOpSink));
        let snapshot = bm.used_bytes().to_vec();

        // 30 + 40 = 70 bits -> 9 bytes -> capacity 12.
        bm.add_page(1, 40);
        assert_eq!(bm.byte_capacity(), 12);
        assert_eq!(&bm.raw_bytes()[..snapshot.len()], snapshot.as_slice());
        assert!(bm.raw_bytes()[snapshot.len()..].iter().all(|b| *b == 0));
        assert!(bm.get_item(0, 29, &NoOpSink));
        assert!(!bm.get_item(1, 0, &NoOpSink));
    }

    #[test]
    fn growth_spans_several_chunks_at_once() {
        let mut bm = ItemBitmap::with_config(2, &small_config());
        bm.add_page(0, 64);
        bm.add_page(1, 64);
        // 128 bits -> 16 bytes, grown from 4 in steps of 4.
        assert_eq!(bm.byte_capacity(), 16);
        assert_eq!(bm.byte_capacity() % bm.growth_chunk(), 0);
    }

    #[test]
    fn duplicate_copies_shape_not_bits() {
        let mut bm = ItemBitmap::new(2);
        bm.add_page(0, 8);
        bm.add_page(1, 8);
        assert!(bm.set_item(0, 1, true, &NoOpSink));

        let dup = bm.duplicate();
        assert_eq!(dup.page_count(), bm.page_count());
        assert_eq!(dup.cumulative_item_counts(), bm.cumulative_item_counts());
        assert_eq!(dup.byte_capacity(), bm.byte_capacity());
        assert_eq!(dup.bit_length_used(), bm.bit_length_used());
        assert!(dup.raw_bytes().iter().all(|b| *b == 0));
        assert!(bm.get_item(0, 1, &NoOpSink));
    }

    #[test]
    fn reset_clears_bits_and_keeps_pages() {
        let mut bm = ItemBitmap::new(1);
        bm.add_page(0, 8);
        assert!(bm.set_item(0, 7, true, &NoOpSink));
        bm.reset();
        assert!(!bm.get_item(0, 7, &NoOpSink));
        assert_eq!(bm.total_items(), 8);
        bm.destroy();
    }

    #[test]
    #[should_panic(expected = "overflows the item total")]
    fn add_page_item_total_overflow_panics() {
        // Shape of a bitmap whose earlier pages already hold nearly u32::MAX
        // items, without allocating their bits.
        let mut bm = ItemBitmap {
            page_count: 3,
            max_items_per_page: u32::MAX,
            growth_chunk: 1,
            cumulative: vec![u32::MAX - 1],
            used_bytes: 0,
            bits: Vec::new(),
        };
        bm.add_page(1, 5);
    }
}

//! Capacity policy for the bitmap byte buffer.
//!
//! Capacity is always a whole number of chunks and never shrinks. The default
//! chunk of 1 KiB (8192 bits) covers the item bound of a 32 KiB page
//! (~1200 items), so registering one page grows the buffer by at most one
//! chunk.

/// Default growth step in bytes.
pub const DEFAULT_GROWTH_CHUNK_BYTES: usize = 1024;

/// Default page size of the checked storage.
pub const DEFAULT_PAGE_SIZE: u32 = 8192;

/// Bytes of page header preceding the line pointer array.
pub const PAGE_HEADER_BYTES: u32 = 24;

/// Bytes per line pointer.
pub const LINE_POINTER_BYTES: u32 = 4;

/// Minimum aligned tuple header size.
pub const TUPLE_HEADER_BYTES: u32 = 24;

/// Upper bound of tuples a heap page of `page_size` bytes can hold.
#[must_use]
pub const fn max_heap_tuples_per_page(page_size: u32) -> u32 {
    (page_size - PAGE_HEADER_BYTES) / (TUPLE_HEADER_BYTES + LINE_POINTER_BYTES)
}

/// Item bound for the default 8 KiB page (291).
pub const DEFAULT_MAX_ITEMS_PER_PAGE: u32 = max_heap_tuples_per_page(DEFAULT_PAGE_SIZE);

/// Bytes needed to hold `bits` bits.
#[must_use]
pub const fn bytes_for_bits(bits: u64) -> usize {
    bits.div_ceil(8) as usize
}

/// Initial capacity for a bitmap expected to track `page_count` pages.
///
/// One chunk per `8 * chunk` pages, plus one.
#[must_use]
pub const fn initial_capacity(page_count: u32, chunk: usize) -> usize {
    chunk * (page_count as usize / chunk / 8 + 1)
}

/// Smallest capacity reachable from `current` in whole `chunk` steps that is
/// at least `required`.
#[must_use]
pub const fn grown_capacity(current: usize, required: usize, chunk: usize) -> usize {
    if required <= current {
        return current;
    }
    let missing = required - current;
    current + missing.div_ceil(chunk) * chunk
}

//! Page-relative bit addressing.
//!
//! A `(page, item)` pair maps to the flat offset
//! `cumulative[page - 1] + item` (base 0 for page 0). Bit `k` lives in byte
//! `k / 8` at position `k % 8`.

use serde::Serialize;
use thiserror::Error;

/// Resolved location of one occupancy bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitAddress {
    /// Flat bit offset across all registered pages.
    pub offset: u64,
    /// Byte holding the bit.
    pub byte_index: usize,
    /// Bit position inside the byte (0 = least significant).
    pub bit_index: u8,
}

impl BitAddress {
    /// Build an address from a flat offset.
    #[must_use]
    pub const fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            byte_index: (offset / 8) as usize,
            bit_index: (offset % 8) as u8,
        }
    }

    /// Mask selecting this bit inside its byte.
    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << self.bit_index
    }
}

/// Why a `(page, item)` pair could not be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum AddressError {
    /// Page number beyond the tracked page count.
    #[error("invalid page {page} (page count {page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    /// Page is in range but has not been registered with `add_page` yet.
    #[error("page {page} not registered ({registered} pages registered)")]
    PageNotRegistered { page: u32, registered: u32 },
    /// Item beyond the page's registered item count.
    #[error("item {item} out of range, page {page} has only {items} items")]
    ItemOutOfRange { page: u32, item: u32, items: u32 },
    /// Byte index outside the used byte span.
    #[error("invalid byte {byte_index} (used bytes {used_bytes})")]
    ByteOutOfRange { byte_index: usize, used_bytes: usize },
}

/// Resolve `(page, item)` against a cumulative item-count table.
///
/// `cumulative` holds one entry per registered page. `used_bytes` is the
/// byte span currently in use; the resolved byte index must fall inside it.
pub fn bit_address(
    cumulative: &[u32],
    page_count: u32,
    used_bytes: usize,
    page: u32,
    item: u32,
) -> Result<BitAddress, AddressError> {
    if page >= page_count {
        return Err(AddressError::PageOutOfRange { page, page_count });
    }

    let page_idx = page as usize;
    let Some(&page_end) = cumulative.get(page_idx) else {
        return Err(AddressError::PageNotRegistered {
            page,
            registered: cumulative.len() as u32,
        });
    };
    let page_start = if page_idx == 0 {
        0
    } else {
        cumulative[page_idx - 1]
    };

    let items = page_end.saturating_sub(page_start);
    if item >= items {
        return Err(AddressError::ItemOutOfRange { page, item, items });
    }

    let address = BitAddress::from_offset(u64::from(page_start) + u64::from(item));
    if address.byte_index >= used_bytes {
        return Err(AddressError::ByteOutOfRange {
            byte_index: address.byte_index,
            used_bytes,
        });
    }
    Ok(address)
}

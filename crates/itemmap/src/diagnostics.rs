//! Counting, comparing and dumping bitmaps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encode::{to_base64, to_binary_digits, to_decimal_list, to_hex};
use crate::sink::{Diagnostic, DiagnosticSink, NoOpSink};
use crate::store::ItemBitmap;

/// Encoding of the bit buffer in a bitmap dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitmapFormat {
    /// Only sizes and page counts, no data.
    #[default]
    CountsOnly,
    Binary,
    Hex,
    Base64,
}

impl BitmapFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CountsOnly => "counts_only",
            Self::Binary => "binary",
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }
}

impl fmt::Display for BitmapFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BitmapFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counts_only" | "none" => Ok(Self::CountsOnly),
            "binary" => Ok(Self::Binary),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            other => Err(format!("unknown bitmap format: {other}")),
        }
    }
}

/// Which side of a comparison holds an item the other side lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffSide {
    OnlyInLeft,
    OnlyInRight,
}

/// One `(page, item)` whose occupancy differs between two bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemDiff {
    pub page: u32,
    pub item: u32,
    pub side: DiffSide,
}

/// Number of set bits over the used byte span.
#[must_use]
pub fn count_set_bits(bitmap: &ItemBitmap) -> u64 {
    bitmap
        .used_bytes()
        .iter()
        .map(|byte| u64::from(byte.count_ones()))
        .sum()
}

/// Number of `(page, item)` pairs whose bits differ.
///
/// A page-count mismatch is reported and short-circuits to the larger item
/// total as an upper bound. An item-total mismatch is reported and the
/// common byte span is still compared.
pub fn compare(left: &ItemBitmap, right: &ItemBitmap, sink: &dyn DiagnosticSink) -> u64 {
    if left.page_count() != right.page_count() {
        sink.emit(&Diagnostic::PageCountMismatch {
            left: left.page_count(),
            right: right.page_count(),
        });
        return u64::from(left.total_items().max(right.total_items()));
    }
    if left.total_items() != right.total_items() {
        sink.emit(&Diagnostic::ItemTotalMismatch {
            left: left.total_items(),
            right: right.total_items(),
        });
    }

    left.used_bytes()
        .iter()
        .zip(right.used_bytes())
        .map(|(a, b)| u64::from((a ^ b).count_ones()))
        .sum()
}

/// Every differing `(page, item)` over the pages both bitmaps registered
/// with identical item ranges, in page/item order.
#[must_use]
pub fn diff_items(left: &ItemBitmap, right: &ItemBitmap) -> Vec<ItemDiff> {
    let mut diffs = Vec::new();
    let pages = left.registered_pages().min(right.registered_pages());
    for page in 0..pages {
        let range = page_range(left, page);
        if range.is_none() || range != page_range(right, page) {
            continue;
        }
        let items = left.local_item_count(page).unwrap_or(0);
        for item in 0..items {
            let side = match (
                left.get_item(page, item, &NoOpSink),
                right.get_item(page, item, &NoOpSink),
            ) {
                (true, false) => DiffSide::OnlyInLeft,
                (false, true) => DiffSide::OnlyInRight,
                _ => continue,
            };
            diffs.push(ItemDiff { page, item, side });
        }
    }
    diffs
}

/// Flat `[start, end)` bit range of a registered page.
fn page_range(bitmap: &ItemBitmap, page: u32) -> Option<(u32, u32)> {
    let counts = bitmap.cumulative_item_counts();
    let idx = page as usize;
    let end = *counts.get(idx)?;
    let start = if idx == 0 { 0 } else { counts[idx - 1] };
    Some((start, end))
}

/// One-line summary: byte count, set bits, page layout and (unless
/// `CountsOnly`) the encoded bits.
#[must_use]
pub fn render(bitmap: &ItemBitmap, format: BitmapFormat) -> String {
    let header = format!(
        "bitmap nbytes={} nbits={} npages={} pages=[{}]",
        bitmap.used_bytes().len(),
        count_set_bits(bitmap),
        bitmap.page_count(),
        to_decimal_list(bitmap.cumulative_item_counts()),
    );
    let data = match format {
        BitmapFormat::CountsOnly => return header,
        BitmapFormat::Binary => to_binary_digits(bitmap.used_bytes()),
        BitmapFormat::Hex => to_hex(bitmap.used_bytes()),
        BitmapFormat::Base64 => to_base64(bitmap.used_bytes()),
    };
    format!("{header} data=[{data}]")
}

/// Emit [`render`] output through `sink`.
pub fn print_bitmap(bitmap: &ItemBitmap, format: BitmapFormat, sink: &dyn DiagnosticSink) {
    sink.emit(&Diagnostic::BitmapDump {
        text: render(bitmap, format),
    });
}

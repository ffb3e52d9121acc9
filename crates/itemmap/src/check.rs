//! Heap/index consistency check.
//!
//! The heap bitmap is built first. Each index then gets a duplicate of it
//! (same page layout, zeroed bits) that is fed from the index pages, and the
//! two are compared item by item.

use std::path::Path;

use itemmap_error::{ItemMapError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BitmapConfig, CheckConfig};
use crate::diagnostics::{BitmapFormat, DiffSide, compare, count_set_bits, diff_items, print_bitmap};
use crate::integrate::{integrate_heap_page, integrate_index_page};
use crate::sink::DiagnosticSink;
use crate::slots::{HeapPageSlots, HeapPageView, IndexPageSlots, IndexPageView};
use crate::store::ItemBitmap;

/// Pages of one index to check against the heap.
#[derive(Debug, Clone, Copy)]
pub struct IndexInput<'a, I> {
    pub name: &'a str,
    pub pages: &'a [I],
}

/// A `(page, item)` location in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub page: u32,
    pub item: u32,
}

/// Outcome for one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub name: String,
    pub index_pages: u32,
    /// Distinct heap items referenced by the index.
    pub entries: u64,
    /// References that could not be marked.
    pub errors: u32,
    /// Items whose heap and index occupancy differ.
    pub differing_items: u64,
    /// Chain heads present in the heap but not referenced by the index.
    pub missing_from_index: Vec<ItemRef>,
    /// Index references to items that are not chain heads in the heap.
    pub missing_from_heap: Vec<ItemRef>,
}

impl IndexReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.errors == 0 && self.differing_items == 0
    }
}

/// Outcome of a full check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub heap_pages: u32,
    /// Line pointers registered across all heap pages.
    pub heap_slots: u32,
    /// Chain heads marked in the heap bitmap.
    pub heap_rows: u64,
    pub heap_errors: u32,
    pub indexes: Vec<IndexReport>,
}

impl CheckReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.heap_errors == 0 && self.indexes.iter().all(IndexReport::is_consistent)
    }
}

/// Report plus the bitmaps it was computed from.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub report: CheckReport,
    pub heap: ItemBitmap,
    /// One bitmap per index, in input order.
    pub indexes: Vec<ItemBitmap>,
}

/// Build the heap bitmap from all heap pages, returning it with the number
/// of rejected accesses.
pub fn build_heap_bitmap<H>(
    heap: &[H],
    config: &CheckConfig,
    sink: &dyn DiagnosticSink,
) -> (ItemBitmap, u32)
where
    H: HeapPageView,
{
    let mut bitmap = ItemBitmap::with_config(heap.len() as u32, &config.bitmap);
    let mut errors = 0_u32;
    for (page_index, page) in heap.iter().enumerate() {
        errors += integrate_heap_page(&mut bitmap, page, page_index as u32, sink);
    }
    (bitmap, errors)
}

/// Build an index bitmap shaped like `heap_bitmap`.
pub fn build_index_bitmap<I>(
    heap_bitmap: &ItemBitmap,
    pages: &[I],
    sink: &dyn DiagnosticSink,
) -> (ItemBitmap, u32)
where
    I: IndexPageView,
{
    let mut bitmap = heap_bitmap.duplicate();
    let mut errors = 0_u32;
    for (page_index, page) in pages.iter().enumerate() {
        errors += integrate_index_page(&mut bitmap, page, page_index as u32, sink);
    }
    (bitmap, errors)
}

/// Check every index against the heap.
pub fn check_relation<H, I>(
    heap: &[H],
    indexes: &[IndexInput<'_, I>],
    config: &CheckConfig,
    sink: &dyn DiagnosticSink,
) -> CheckOutcome
where
    H: HeapPageView,
    I: IndexPageView,
{
    let (heap_bitmap, heap_errors) = build_heap_bitmap(heap, config, sink);
    if config.format != BitmapFormat::CountsOnly {
        print_bitmap(&heap_bitmap, config.format, sink);
    }
    let heap_rows = count_set_bits(&heap_bitmap);

    let mut reports = Vec::with_capacity(indexes.len());
    let mut index_bitmaps = Vec::with_capacity(indexes.len());
    for index in indexes {
        let (index_bitmap, errors) = build_index_bitmap(&heap_bitmap, index.pages, sink);
        if config.format != BitmapFormat::CountsOnly {
            print_bitmap(&index_bitmap, config.format, sink);
        }

        let differing_items = compare(&heap_bitmap, &index_bitmap, sink);
        let mut missing_from_index = Vec::new();
        let mut missing_from_heap = Vec::new();
        for diff in diff_items(&heap_bitmap, &index_bitmap) {
            let at = ItemRef {
                page: diff.page,
                item: diff.item,
            };
            match diff.side {
                DiffSide::OnlyInLeft => missing_from_index.push(at),
                DiffSide::OnlyInRight => missing_from_heap.push(at),
            }
        }

        let report = IndexReport {
            name: index.name.to_owned(),
            index_pages: index.pages.len() as u32,
            entries: count_set_bits(&index_bitmap),
            errors,
            differing_items,
            missing_from_index,
            missing_from_heap,
        };
        if report.is_consistent() {
            info!(index = index.name, entries = report.entries, "index matches heap");
        } else {
            warn!(
                index = index.name,
                differing_items,
                errors,
                missing_from_index = report.missing_from_index.len(),
                missing_from_heap = report.missing_from_heap.len(),
                "index diverges from heap"
            );
        }
        reports.push(report);
        index_bitmaps.push(index_bitmap);
    }

    let report = CheckReport {
        heap_pages: heap_bitmap.page_count(),
        heap_slots: heap_bitmap.total_items(),
        heap_rows,
        heap_errors,
        indexes: reports,
    };
    info!(
        heap_pages = report.heap_pages,
        heap_rows,
        indexes = report.indexes.len(),
        consistent = report.is_consistent(),
        "heap/index check finished"
    );
    CheckOutcome {
        report,
        heap: heap_bitmap,
        indexes: index_bitmaps,
    }
}

/// Decoded pages of one index, as stored in a relation fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFixture {
    pub name: String,
    #[serde(default)]
    pub pages: Vec<IndexPageSlots>,
}

/// Decoded heap pages plus the indexes built on them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationFixture {
    #[serde(default)]
    pub heap: Vec<HeapPageSlots>,
    #[serde(default)]
    pub indexes: Vec<IndexFixture>,
}

impl RelationFixture {
    /// Load a JSON fixture file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => ItemMapError::CannotOpen {
                path: path.to_path_buf(),
            },
            _ => ItemMapError::Io(error),
        })?;
        serde_json::from_str(&text).map_err(|error| ItemMapError::InvalidJson {
            path: path.to_path_buf(),
            detail: error.to_string(),
        })
    }

    /// Reject fixtures the bitmap cannot register: too many heap pages, or a
    /// heap page with more slots than `config.max_items_per_page`.
    pub fn validate(&self, config: &BitmapConfig) -> Result<()> {
        if u32::try_from(self.heap.len()).is_err() {
            return Err(ItemMapError::fixture(format!(
                "{} heap pages exceed the addressable page count",
                self.heap.len()
            )));
        }
        for (page, slots) in self.heap.iter().enumerate() {
            if slots.slots.len() > config.max_items_per_page as usize {
                return Err(ItemMapError::fixture(format!(
                    "heap page {page} has {} slots (max {})",
                    slots.slots.len(),
                    config.max_items_per_page
                )));
            }
        }
        Ok(())
    }

    /// Validate the fixture, then run [`check_relation`] over every index.
    pub fn check(&self, config: &CheckConfig, sink: &dyn DiagnosticSink) -> Result<CheckOutcome> {
        self.validate(&config.bitmap)?;
        let indexes: Vec<IndexInput<'_, IndexPageSlots>> = self
            .indexes
            .iter()
            .map(|index| IndexInput {
                name: &index.name,
                pages: &index.pages,
            })
            .collect();
        Ok(check_relation(&self.heap, &indexes, config, sink))
    }
}

//! On-disk form of an [`ItemBitmap`].
//!
//! Layout, all integers little-endian `u32`:
//!
//! ```text
//! page_count
//! cumulative[0 .. page_count]   (u32::MAX for unregistered pages)
//! bit_length_used
//! byte_capacity
//! bits[0 .. byte_capacity]
//! ```

use std::path::Path;

use itemmap_error::{ItemMapError, Result};

use crate::config::BitmapConfig;
use crate::store::ItemBitmap;

/// Marker for a page slot that has not been registered.
pub const UNREGISTERED_PAGE: u32 = u32::MAX;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(ItemMapError::ShortRead {
                expected: self.pos.saturating_add(len),
                actual: self.buf.len(),
            });
        };
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl ItemBitmap {
    /// Serialize to the on-disk form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let page_count = self.page_count() as usize;
        let mut buf = Vec::with_capacity(12 + page_count * 4 + self.byte_capacity());

        buf.extend_from_slice(&self.page_count().to_le_bytes());
        let counts = self.cumulative_item_counts();
        for page in 0..page_count {
            let value = counts.get(page).copied().unwrap_or(UNREGISTERED_PAGE);
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&(self.bit_length_used() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.byte_capacity() as u32).to_le_bytes());
        buf.extend_from_slice(self.raw_bytes());
        buf
    }

    /// Decode with default bounds.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(buf, &BitmapConfig::default())
    }

    /// Decode and check every layout invariant against `config`.
    pub fn from_bytes_with_config(buf: &[u8], config: &BitmapConfig) -> Result<Self> {
        let mut reader = Reader { buf, pos: 0 };
        let page_count = reader.u32()?;

        let mut cumulative = Vec::with_capacity(page_count.min(1 << 20) as usize);
        let mut registered = true;
        let mut previous = 0_u32;
        for page in 0..page_count {
            let value = reader.u32()?;
            if value == UNREGISTERED_PAGE {
                registered = false;
                continue;
            }
            if !registered {
                return Err(ItemMapError::corrupt(format!(
                    "page {page} registered after an unregistered page"
                )));
            }
            if value < previous {
                return Err(ItemMapError::corrupt(format!(
                    "cumulative item count decreases at page {page}"
                )));
            }
            if value - previous > config.max_items_per_page {
                return Err(ItemMapError::corrupt(format!(
                    "page {page} has {} items (max {})",
                    value - previous,
                    config.max_items_per_page
                )));
            }
            cumulative.push(value);
            previous = value;
        }

        let bit_length_used = reader.u32()?;
        let byte_capacity = reader.u32()? as usize;
        let expected_bits = u64::from(previous).div_ceil(8) * 8;
        if u64::from(bit_length_used) != expected_bits {
            return Err(ItemMapError::corrupt(format!(
                "bit length {bit_length_used} does not match {previous} items"
            )));
        }

        let bits = reader.take(byte_capacity)?.to_vec();
        if reader.pos != buf.len() {
            return Err(ItemMapError::corrupt(format!(
                "{} trailing bytes",
                buf.len() - reader.pos
            )));
        }
        Self::from_parts(page_count, config, cumulative, bits)
    }

    /// Write the on-disk form to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Read a bitmap written by [`ItemBitmap::save`] under default bounds.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_config(path, &BitmapConfig::default())
    }

    /// Read a bitmap that was built with `config`.
    pub fn load_with_config(path: &Path, config: &BitmapConfig) -> Result<Self> {
        let buf = std::fs::read(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => ItemMapError::CannotOpen {
                path: path.to_path_buf(),
            },
            _ => ItemMapError::Io(error),
        })?;
        Self::from_bytes_with_config(&buf, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NoOpSink;

    fn sample() -> ItemBitmap {
        let mut bm = ItemBitmap::new(3);
        bm.add_page(0, 5);
        bm.add_page(1, 12);
        assert!(bm.set_item(0, 4, true, &NoOpSink));
        assert!(bm.set_item(1, 11, true, &NoOpSink));
        bm
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], &3_u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &5_u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &17_u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &UNREGISTERED_PAGE.to_le_bytes());
        assert_eq!(&bytes[16..20], &24_u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1024_u32.to_le_bytes());
        assert_eq!(bytes.len(), 24 + 1024);
    }

    #[test]
    fn decoded_bitmap_keeps_shape_and_bits() {
        let original = sample();
        let decoded = ItemBitmap::from_bytes(&original.to_bytes()).expect("decodes");
        assert_eq!(decoded, original);

        // Registration continues where the persisted bitmap stopped.
        let mut decoded = decoded;
        decoded.add_page(2, 3);
        assert_eq!(decoded.total_items(), 20);
    }

    #[test]
    fn truncated_input_is_a_short_read() {
        let bytes = sample().to_bytes();
        let err = ItemBitmap::from_bytes(&bytes[..bytes.len() - 1]).expect_err("truncated");
        assert!(matches!(err, ItemMapError::ShortRead { .. }));
        let err = ItemBitmap::from_bytes(&bytes[..2]).expect_err("truncated header");
        assert!(matches!(err, ItemMapError::ShortRead { .. }));
    }

    #[test]
    fn decreasing_counts_are_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[8..12].copy_from_slice(&4_u32.to_le_bytes());
        let err = ItemBitmap::from_bytes(&bytes).expect_err("decreasing");
        assert!(err.to_string().contains("decreases at page 1"));
    }

    #[test]
    fn wrong_bit_length_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[16..20].copy_from_slice(&32_u32.to_le_bytes());
        assert!(matches!(
            ItemBitmap::from_bytes(&bytes),
            Err(ItemMapError::CorruptBitmap { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().to_bytes();
        bytes.push(0);
        assert!(matches!(
            ItemBitmap::from_bytes(&bytes),
            Err(ItemMapError::CorruptBitmap { .. })
        ));
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("heap.bitmap");
        let original = sample();
        original.save(&path).expect("save");
        assert_eq!(ItemBitmap::load(&path).expect("load"), original);
        assert!(matches!(
            ItemBitmap::load(&dir.path().join("absent.bitmap")),
            Err(ItemMapError::CannotOpen { .. })
        ));
    }

    #[test]
    fn large_page_bitmap_loads_with_its_config() {
        let config = BitmapConfig {
            max_items_per_page: 1169,
            growth_chunk_bytes: 1024,
        };
        let mut bm = ItemBitmap::with_config(1, &config);
        bm.add_page(0, 500);
        assert!(bm.set_item(0, 499, true, &NoOpSink));

        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("wide.bitmap");
        bm.save(&path).expect("save");

        let loaded = ItemBitmap::load_with_config(&path, &config).expect("load");
        assert_eq!(loaded, bm);
        assert_eq!(loaded.max_items_per_page(), 1169);
        assert!(matches!(
            ItemBitmap::load(&path),
            Err(ItemMapError::CorruptBitmap { .. })
        ));
    }
}

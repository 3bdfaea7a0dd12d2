// Copyright 2016 Matthew Collins
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Decoding of inflated `map_chunk_bulk` data into the chunk store.
//!
//! See http://wiki.vg/SMP_Map_Format#Data. A column stores every present
//! section's block array first, followed by all the metadata arrays, the
//! block light arrays, the sky light arrays (if sent), the add arrays and
//! finally the biomes.

use super::block::TranslationTable;
use super::World;
use log::{debug, warn};
use protocol::protocol::packet::ChunkMeta;

pub const SECTION_HEIGHT: i32 = 16;
pub const SECTIONS_PER_COLUMN: usize = 16;

/// Bytes of one block array: one byte per block.
pub const BLOCK_BYTES: usize = 4096;
/// Bytes of one nibble array (metadata, light, add).
pub const NIBBLE_BYTES: usize = 2048;
/// Blocks, metadata and block light of a single section.
pub const SECTION_VOLUME: usize = BLOCK_BYTES + NIBBLE_BYTES * 2;
pub const SKY_LIGHT_VOLUME: usize = NIBBLE_BYTES;
pub const ADD_VOLUME: usize = NIBBLE_BYTES;
pub const BIOME_BYTES: usize = 256;

/// Number of bytes a column with the given masks takes in the inflated data.
pub fn column_size(bitmap: u16, add_bitmap: u16, sky_light: bool) -> usize {
    let section = SECTION_VOLUME + if sky_light { SKY_LIGHT_VOLUME } else { 0 };
    bitmap.count_ones() as usize * section + add_bitmap.count_ones() as usize * ADD_VOLUME + BIOME_BYTES
}

/// One column's span of inflated data split into its channels.
pub struct ColumnView<'a> {
    pub bitmap: u16,
    pub blocks: &'a [u8],
    pub metadata: &'a [u8],
    pub block_light: &'a [u8],
    pub sky_light: Option<&'a [u8]>,
    pub add: &'a [u8],
    pub biomes: &'a [u8],
}

impl<'a> ColumnView<'a> {
    /// `data` must be exactly `column_size` bytes long.
    pub fn split(data: &'a [u8], bitmap: u16, add_bitmap: u16, sky_light: bool) -> Option<ColumnView<'a>> {
        if data.len() != column_size(bitmap, add_bitmap, sky_light) {
            return None;
        }
        let sections = bitmap.count_ones() as usize;
        let (blocks, rest) = data.split_at(sections * BLOCK_BYTES);
        let (metadata, rest) = rest.split_at(sections * NIBBLE_BYTES);
        let (block_light, rest) = rest.split_at(sections * NIBBLE_BYTES);
        let (sky_light, rest) = if sky_light {
            let (sky, rest) = rest.split_at(sections * NIBBLE_BYTES);
            (Some(sky), rest)
        } else {
            (None, rest)
        };
        let (add, biomes) = rest.split_at(add_bitmap.count_ones() as usize * ADD_VOLUME);
        Some(ColumnView {
            bitmap,
            blocks,
            metadata,
            block_light,
            sky_light,
            add,
            biomes,
        })
    }

    /// Block array of section `y`, if the section is present.
    pub fn section_blocks(&self, y: usize) -> Option<&'a [u8]> {
        if self.bitmap & (1 << y) == 0 {
            return None;
        }
        // Present sections are packed, so skip the ones below this.
        let below = (self.bitmap & ((1 << y) - 1)).count_ones() as usize;
        let offset = below * BLOCK_BYTES;
        Some(&self.blocks[offset..offset + BLOCK_BYTES])
    }
}

/// Transcodes every column of an inflated bulk into `world`, returning the
/// number of bytes consumed.
pub fn load_bulk(
    world: &mut World,
    table: &TranslationTable,
    data: &[u8],
    meta: &[ChunkMeta],
    sky_light: bool,
) -> usize {
    let mut offset = 0;
    for m in meta {
        let size = column_size(m.bitmap, m.add_bitmap, sky_light);
        let end = offset + size;
        if end > data.len() {
            warn!(
                "column {},{} runs past the chunk data ({} > {})",
                m.x,
                m.z,
                end,
                data.len()
            );
            offset = end;
            continue;
        }
        if let Some(view) = ColumnView::split(&data[offset..end], m.bitmap, m.add_bitmap, sky_light) {
            if !load_column(world, table, m.x, m.z, &view) {
                warn!("column {},{} lies outside the addressable world, skipping it", m.x, m.z);
            }
        }
        offset = end;
    }

    if offset != data.len() {
        warn!("incomplete chunk decode: {} != {}", offset, data.len());
    }
    offset
}

/// Converts the column's block arrays from XZY sections into the grid.
///
/// Metadata, light, add and biome channels are not applied. Returns false,
/// leaving `world` untouched, when the column's block coordinates do not
/// fit in an `i32`.
pub fn load_column(world: &mut World, table: &TranslationTable, x: i32, z: i32, view: &ColumnView) -> bool {
    let (base_x, base_z) = match (x.checked_mul(16), z.checked_mul(16)) {
        (Some(bx), Some(bz)) => (bx, bz),
        _ => return false,
    };
    debug!("loading column {},{} (mask {:016b})", x, z, view.bitmap);
    for i in 0..SECTIONS_PER_COLUMN {
        let blocks = match view.section_blocks(i) {
            Some(val) => val,
            None => continue,
        };
        let base_y = i as i32 * SECTION_HEIGHT;
        for dy in 0..SECTION_HEIGHT {
            for dz in 0..16 {
                for dx in 0..16 {
                    let id = blocks[(dx + dz * 16 + dy * 256) as usize];
                    world.set_block(base_x + dx, base_y + dy, base_z + dz, table.lookup(id));
                }
            }
        }
    }
    true
}

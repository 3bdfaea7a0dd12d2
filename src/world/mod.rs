// Copyright 2015 Matthew Collins
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

pub mod block;
pub mod column;

use self::block::BlockId;
use crate::types::hash::FNVMap;
use std::fmt;

/// Largest grid-chunk edge accepted; keeps a chunk under 2 GiB of `u16`s.
pub const MAX_GRID_BITS: u32 = 10;

/// Geometry of the target storage grid: cubes of `size` blocks per edge,
/// `size` being a power of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    bits: u32,
    mask: i32,
}

impl Grid {
    pub fn new(size: u32) -> Option<Grid> {
        if !size.is_power_of_two() {
            return None;
        }
        let bits = size.trailing_zeros();
        if bits > MAX_GRID_BITS {
            return None;
        }
        Some(Grid {
            bits,
            mask: (1 << bits) - 1,
        })
    }

    pub fn size(&self) -> usize {
        1 << self.bits
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn mask(&self) -> i32 {
        self.mask
    }

    /// Number of blocks in one grid-chunk.
    pub fn volume(&self) -> usize {
        1 << (self.bits * 3)
    }

    pub fn key_of(&self, x: i32, y: i32, z: i32) -> GridKey {
        GridKey(x >> self.bits, y >> self.bits, z >> self.bits)
    }

    /// Offset of the block inside its grid-chunk, x fastest then y then z.
    pub fn index_of(&self, x: i32, y: i32, z: i32) -> usize {
        ((x & self.mask)
            + ((y & self.mask) << self.bits)
            + ((z & self.mask) << (self.bits * 2))) as usize
    }

    /// Inverse of `key_of` + `index_of`.
    pub fn position_of(&self, key: GridKey, index: usize) -> (i32, i32, i32) {
        let index = index as i32;
        let lx = index & self.mask;
        let ly = (index >> self.bits) & self.mask;
        let lz = (index >> (self.bits * 2)) & self.mask;
        (
            (key.0 << self.bits) + lx,
            (key.1 << self.bits) + ly,
            (key.2 << self.bits) + lz,
        )
    }
}

/// Integer coordinates of a grid-chunk.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct GridKey(pub i32, pub i32, pub i32);

impl fmt::Debug for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|{}|{}", self.0, self.1, self.2)
    }
}

/// A dense cube of target block ids, laid out as described by `Grid::index_of`.
#[derive(Clone, PartialEq)]
pub struct VoxelChunk {
    pub position: GridKey,
    size: usize,
    voxels: Vec<BlockId>,
}

impl VoxelChunk {
    fn new(position: GridKey, grid: Grid, fill: BlockId) -> VoxelChunk {
        VoxelChunk {
            position,
            size: grid.size(),
            voxels: vec![fill; grid.volume()],
        }
    }

    /// Shape of the array, `[size, size, size]`.
    pub fn dims(&self) -> [usize; 3] {
        [self.size, self.size, self.size]
    }

    pub fn voxels(&self) -> &[BlockId] {
        &self.voxels
    }

    pub fn into_voxels(self) -> Vec<BlockId> {
        self.voxels
    }

    pub fn get(&self, idx: usize) -> BlockId {
        self.voxels[idx]
    }

    fn set(&mut self, idx: usize, b: BlockId) {
        self.voxels[idx] = b;
    }
}

impl fmt::Debug for VoxelChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VoxelChunk({:?}, {}^3)", self.position, self.size)
    }
}

/// The chunk store. Grid-chunks are created the first time a block is
/// written into them and are never evicted.
pub struct World {
    grid: Grid,
    empty: BlockId,
    chunks: FNVMap<GridKey, VoxelChunk>,
}

impl World {
    /// `empty` is the id new grid-chunks are filled with.
    pub fn new(grid: Grid, empty: BlockId) -> World {
        World {
            grid,
            empty,
            chunks: FNVMap::default(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, b: BlockId) {
        let grid = self.grid;
        let empty = self.empty;
        let key = grid.key_of(x, y, z);
        let chunk = self
            .chunks
            .entry(key)
            .or_insert_with(|| VoxelChunk::new(key, grid, empty));
        chunk.set(grid.index_of(x, y, z), b);
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Option<BlockId> {
        self.chunks
            .get(&self.grid.key_of(x, y, z))
            .map(|chunk| chunk.get(self.grid.index_of(x, y, z)))
    }

    pub fn chunk(&self, key: GridKey) -> Option<&VoxelChunk> {
        self.chunks.get(&key)
    }

    pub fn contains(&self, key: GridKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = GridKey> + '_ {
        self.chunks.keys().copied()
    }

    /// Number of grid-chunks allocated so far.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

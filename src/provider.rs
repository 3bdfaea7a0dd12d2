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

//! Hands grid-chunks to the renderer when it asks for them.

use crate::world::block::BlockId;
use crate::world::{GridKey, VoxelChunk, World};
use log::{debug, trace};
use std::sync::mpsc;

/// The renderer side of the bridge.
pub trait ChunkConsumer {
    /// Takes a finished grid-chunk. It is not touched by the bridge again.
    fn show_chunk(&mut self, chunk: VoxelChunk);

    fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId);
}

/// Where the renderer's "this chunk is missing" requests come from.
pub trait ChunkRequestSource {
    fn next_request(&mut self) -> Option<GridKey>;
}

impl ChunkRequestSource for mpsc::Receiver<GridKey> {
    fn next_request(&mut self) -> Option<GridKey> {
        self.try_recv().ok()
    }
}

pub struct ChunkProvider {
    requests: Box<dyn ChunkRequestSource>,
    consumer: Box<dyn ChunkConsumer>,
    delivered: usize,
}

impl ChunkProvider {
    pub fn new(requests: Box<dyn ChunkRequestSource>, consumer: Box<dyn ChunkConsumer>) -> ChunkProvider {
        ChunkProvider {
            requests,
            consumer,
            delivered: 0,
        }
    }

    /// Answers a single request. Chunks that haven't been loaded yet are
    /// declined, the renderer has to ask again later.
    pub fn missing_chunk(&mut self, world: &World, key: GridKey) -> bool {
        match world.chunk(key) {
            Some(chunk) => {
                trace!("Delivering chunk {:?}", key);
                self.consumer.show_chunk(chunk.clone());
                self.delivered += 1;
                true
            }
            None => {
                debug!("Chunk {:?} not loaded yet", key);
                false
            }
        }
    }

    /// Answers every queued request, returning how many were delivered.
    pub fn poll(&mut self, world: &World) -> usize {
        let mut count = 0;
        while let Some(key) = self.requests.next_request() {
            if self.missing_chunk(world, key) {
                count += 1;
            }
        }
        count
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        self.consumer.set_block(x, y, z, id);
    }

    /// Total chunks handed over so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::world::Grid;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Shown {
        chunks: Vec<VoxelChunk>,
        blocks: Vec<(i32, i32, i32, BlockId)>,
    }

    struct Recorder(Arc<Mutex<Shown>>);

    impl ChunkConsumer for Recorder {
        fn show_chunk(&mut self, chunk: VoxelChunk) {
            self.0.lock().unwrap().chunks.push(chunk);
        }

        fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
            self.0.lock().unwrap().blocks.push((x, y, z, id));
        }
    }

    #[test]
    fn delivers_only_loaded_chunks() {
        let mut world = World::new(Grid::new(16).unwrap(), 0);
        world.set_block(-3, 20, 5, 9);

        let shown = Arc::new(Mutex::new(Shown::default()));
        let (send, recv) = mpsc::channel::<GridKey>();
        let mut provider = ChunkProvider::new(Box::new(recv), Box::new(Recorder(shown.clone())));

        send.send(GridKey(-1, 1, 0)).unwrap();
        send.send(GridKey(4, 4, 4)).unwrap();
        assert_eq!(provider.poll(&world), 1);
        assert_eq!(provider.poll(&world), 0);
        assert_eq!(provider.delivered(), 1);

        let shown = shown.lock().unwrap();
        let chunk = &shown.chunks[0];
        assert_eq!(chunk.position, GridKey(-1, 1, 0));
        assert_eq!(chunk.dims(), [16, 16, 16]);
        assert_eq!(chunk.get(world.grid().index_of(-3, 20, 5)), 9);
    }

    #[test]
    fn store_stays_authoritative() {
        let mut world = World::new(Grid::new(4).unwrap(), 0);
        world.set_block(0, 0, 0, 1);

        let shown = Arc::new(Mutex::new(Shown::default()));
        let (_send, recv) = mpsc::channel::<GridKey>();
        let mut provider = ChunkProvider::new(Box::new(recv), Box::new(Recorder(shown.clone())));
        assert!(provider.missing_chunk(&world, GridKey(0, 0, 0)));

        world.set_block(1, 0, 0, 2);
        assert!(provider.missing_chunk(&world, GridKey(0, 0, 0)));

        let shown = shown.lock().unwrap();
        assert_eq!(shown.chunks[0].voxels()[..2], [1, 0]);
        assert_eq!(shown.chunks[1].voxels()[..2], [1, 2]);
    }

    #[test]
    fn set_block_is_forwarded() {
        let shown = Arc::new(Mutex::new(Shown::default()));
        let (_send, recv) = mpsc::channel::<GridKey>();
        let mut provider = ChunkProvider::new(Box::new(recv), Box::new(Recorder(shown.clone())));
        provider.set_block(1, 2, 3, 4);
        assert_eq!(shown.lock().unwrap().blocks, vec![(1, 2, 3, 4)]);
    }
}

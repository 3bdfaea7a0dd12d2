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

//! Inflates chunk bulks off the main thread.
//!
//! The compressed buffer is moved to the worker, the column metadata stays
//! behind in the pending table until the worker replies with the same id.
//! Replies may come back in any order.

use crate::types::hash::FNVMap;
use flate2::read::ZlibDecoder;
use log::{debug, error, warn};
use protocol::protocol::packet::{ChunkBulk, ChunkMeta};
use std::io::{self, Read};
use std::mem;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub type RequestId = u32;

/// Source of correlation ids for inflate requests.
pub trait IdAllocator: Send {
    fn next_id(&mut self) -> RequestId;
}

/// Hands out 0, 1, 2, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: RequestId,
}

impl SequentialIds {
    pub fn new() -> SequentialIds {
        SequentialIds { next: 0 }
    }
}

impl IdAllocator for SequentialIds {
    fn next_id(&mut self) -> RequestId {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// What is kept of a bulk while its data is being inflated.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBatch {
    pub sky_light_sent: bool,
    pub meta: Vec<ChunkMeta>,
}

/// A completed request, ready to be transcoded.
#[derive(Debug)]
pub struct Inflated {
    pub id: RequestId,
    pub batch: PendingBatch,
    pub data: Vec<u8>,
}

struct InflateReq {
    id: RequestId,
    compressed: Vec<u8>,
    offset: usize,
    length: usize,
}

struct InflateReply {
    id: RequestId,
    result: io::Result<Vec<u8>>,
}

pub struct ChunkLoader {
    work_send: Option<mpsc::Sender<InflateReq>>,
    done_recv: mpsc::Receiver<InflateReply>,
    worker: Option<thread::JoinHandle<()>>,

    pending: FNVMap<RequestId, PendingBatch>,
    ids: Box<dyn IdAllocator>,
}

impl ChunkLoader {
    pub fn new() -> ChunkLoader {
        ChunkLoader::with_ids(Box::new(SequentialIds::new()))
    }

    pub fn with_ids(ids: Box<dyn IdAllocator>) -> ChunkLoader {
        let (work_send, work_recv) = mpsc::channel();
        let (done_send, done_recv) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("chunk-inflate".to_owned())
            .spawn(move || inflate_func(work_recv, done_send))
            .map_err(|err| error!("Failed to start inflate worker: {}", err))
            .ok();
        ChunkLoader {
            work_send: worker.as_ref().map(|_| work_send),
            done_recv,
            worker,
            pending: FNVMap::default(),
            ids,
        }
    }

    /// Queues `bulk` for inflation. Its compressed data is moved to the
    /// worker; the rest is held until the matching reply arrives.
    ///
    /// Returns `None` when the batch was dropped, either because the
    /// allocator found no free id or because the worker is gone.
    pub fn submit(&mut self, mut bulk: ChunkBulk) -> Option<RequestId> {
        // With n ids pending, n + 1 distinct ids always include a free one.
        let attempts = self.pending.len() + 1;
        let id = match (0..attempts)
            .map(|_| self.ids.next_id())
            .find(|id| !self.pending.contains_key(id))
        {
            Some(val) => val,
            None => {
                error!(
                    "No free request id after {} attempts, dropping {} columns",
                    attempts,
                    bulk.meta.len()
                );
                return None;
            }
        };

        let compressed = mem::take(&mut bulk.compressed_data);
        let length = compressed.len();
        debug!("Inflating {} bytes for {} columns (request {})", length, bulk.meta.len(), id);
        self.pending.insert(
            id,
            PendingBatch {
                sky_light_sent: bulk.sky_light_sent,
                meta: bulk.meta,
            },
        );

        let req = InflateReq {
            id,
            compressed,
            offset: 0,
            length,
        };
        let sent = match self.work_send {
            Some(ref send) => send.send(req).is_ok(),
            None => false,
        };
        if !sent {
            error!("Inflate worker is gone, dropping request {}", id);
            self.pending.remove(&id);
            return None;
        }
        Some(id)
    }

    /// Matches a worker reply to its pending batch. Failed requests are
    /// logged and their columns dropped.
    pub fn on_result(&mut self, id: RequestId, result: io::Result<Vec<u8>>) -> Option<Inflated> {
        let batch = match self.pending.remove(&id) {
            Some(val) => val,
            None => {
                warn!("Inflate result for unknown request {}", id);
                return None;
            }
        };
        match result {
            Ok(data) => {
                debug!("Request {} inflated to {} bytes", id, data.len());
                Some(Inflated { id, batch, data })
            }
            Err(err) => {
                error!("Failed to inflate chunk data for request {}: {}", id, err);
                None
            }
        }
    }

    /// Collects every reply that has arrived without blocking.
    pub fn poll(&mut self) -> Vec<Inflated> {
        let mut done = vec![];
        while let Ok(reply) = self.done_recv.try_recv() {
            done.extend(self.on_result(reply.id, reply.result));
        }
        done
    }

    /// Blocks up to `timeout` for the first reply, then collects the rest
    /// that are ready.
    pub fn wait(&mut self, timeout: Duration) -> Vec<Inflated> {
        let mut done = vec![];
        if let Ok(reply) = self.done_recv.recv_timeout(timeout) {
            done.extend(self.on_result(reply.id, reply.result));
            done.extend(self.poll());
        }
        done
    }

    /// Number of requests still waiting on the worker.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }
}

impl Default for ChunkLoader {
    fn default() -> Self {
        ChunkLoader::new()
    }
}

impl Drop for ChunkLoader {
    fn drop(&mut self) {
        // Closing the work channel stops the worker.
        self.work_send = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Inflate worker panicked");
            }
        }
    }
}

fn inflate_func(work_recv: mpsc::Receiver<InflateReq>, done_send: mpsc::Sender<InflateReply>) {
    loop {
        let InflateReq {
            id,
            compressed,
            offset,
            length,
        } = match work_recv.recv() {
            Ok(val) => val,
            Err(_) => return,
        };

        let result = match compressed.get(offset..offset + length) {
            Some(data) => inflate(data),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {}+{} outside of {} bytes", offset, length, compressed.len()),
            )),
        };

        if done_send.send(InflateReply { id, result }).is_err() {
            return;
        }
    }
}

fn inflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn bulk(x: i32, data: Vec<u8>) -> ChunkBulk {
        ChunkBulk {
            sky_light_sent: x % 2 == 0,
            meta: vec![ChunkMeta {
                x,
                z: 0,
                bitmap: 1,
                add_bitmap: 0,
            }],
            compressed_data: data,
        }
    }

    fn drain(loader: &mut ChunkLoader) -> Vec<Inflated> {
        let mut done = vec![];
        while loader.pending() > 0 {
            let before = loader.pending();
            done.extend(loader.wait(Duration::from_secs(5)));
            assert!(loader.pending() < before, "worker timed out");
        }
        done
    }

    #[test]
    fn sequential_ids() {
        let mut ids = SequentialIds::new();
        assert_eq!((ids.next_id(), ids.next_id(), ids.next_id()), (0, 1, 2));
    }

    #[test]
    fn results_correlate_by_id() {
        struct Fixed(Vec<RequestId>);
        impl IdAllocator for Fixed {
            fn next_id(&mut self) -> RequestId {
                self.0.remove(0)
            }
        }

        let mut loader = ChunkLoader::with_ids(Box::new(Fixed(vec![1, 2])));
        // garbage data; the worker's replies are never collected here
        let first = loader.submit(bulk(10, vec![1]));
        let second = loader.submit(bulk(21, vec![2]));
        assert_eq!((first, second), (Some(1), Some(2)));
        assert_eq!(loader.pending(), 2);

        let done = loader.on_result(2, Ok(vec![0xbb])).unwrap();
        assert_eq!(done.batch.meta[0].x, 21);
        assert!(!done.batch.sky_light_sent);
        assert_eq!(done.data, vec![0xbb]);

        let done = loader.on_result(1, Ok(vec![0xaa])).unwrap();
        assert_eq!(done.batch.meta[0].x, 10);
        assert!(done.batch.sky_light_sent);
        assert_eq!(loader.pending(), 0);

        // delivered exactly once
        assert!(loader.on_result(1, Ok(vec![])).is_none());
    }

    #[test]
    fn stuck_allocator_drops_batch() {
        struct Always(RequestId);
        impl IdAllocator for Always {
            fn next_id(&mut self) -> RequestId {
                self.0
            }
        }

        let mut loader = ChunkLoader::with_ids(Box::new(Always(7)));
        assert_eq!(loader.submit(bulk(1, vec![1])), Some(7));
        assert_eq!(loader.submit(bulk(2, vec![2])), None);
        assert_eq!(loader.pending(), 1);

        let done = loader.on_result(7, Ok(vec![])).unwrap();
        assert_eq!(done.batch.meta[0].x, 1);
    }

    #[test]
    fn failed_request_is_dropped() {
        let mut loader = ChunkLoader::new();
        let id = loader.submit(bulk(0, vec![])).unwrap();
        assert!(loader.is_pending(id));
        let err = io::Error::new(io::ErrorKind::InvalidData, "corrupt");
        assert!(loader.on_result(id, Err(err)).is_none());
        assert!(!loader.is_pending(id));
    }

    #[test]
    fn worker_inflates() {
        let mut loader = ChunkLoader::new();
        let a = loader.submit(bulk(3, compress(&[3; 100]))).unwrap();
        let b = loader.submit(bulk(4, compress(&[4; 7000]))).unwrap();
        let c = loader.submit(bulk(5, vec![0xde, 0xad, 0xbe, 0xef])).unwrap();

        let mut done = drain(&mut loader);
        done.sort_by_key(|v| v.id);
        assert_eq!(done.len(), 2);
        assert_eq!((done[0].id, done[1].id), (a, b));
        assert_eq!(done[0].data, vec![3; 100]);
        assert_eq!(done[1].data.len(), 7000);
        assert_eq!(done[1].batch.meta[0].x, 4);
        assert!(!loader.is_pending(c));
    }
}

#![allow(dead_code)]

use clientmc::console::History;
use clientmc::provider::ChunkConsumer;
use clientmc::server::{Connection, Player};
use clientmc::settings::Config;
use clientmc::world::block::{BlockId, NameRegistry};
use clientmc::world::{GridKey, VoxelChunk};
use clientmc::{Frame, Host, Server};
use clientmc_protocol::protocol::packet::{play, ChunkBulk, ChunkMeta};
use clientmc_protocol::protocol::encode_packet;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub const BLOCK_NAMES: &[&str] = &[
    "stone",
    "grass",
    "dirt",
    "cobblestone",
    "plankOak",
    "obsidian",
    "oreCoal",
    "logOak",
    "leavesOak",
    "brick",
];

pub struct Quiet;

impl Connection for Quiet {
    fn write_frame(&mut self, _frame: Vec<u8>) -> io::Result<()> {
        Ok(())
    }
}

pub struct Nobody;

impl Player for Nobody {
    fn move_to(&mut self, _x: f64, _y: f64, _z: f64) {}

    fn position(&self) -> Option<(f64, f64, f64)> {
        None
    }
}

#[derive(Clone, Default)]
pub struct Shown(pub Arc<Mutex<Vec<VoxelChunk>>>);

impl ChunkConsumer for Shown {
    fn show_chunk(&mut self, chunk: VoxelChunk) {
        self.0.lock().unwrap().push(chunk);
    }

    fn set_block(&mut self, _x: i32, _y: i32, _z: i32, _id: BlockId) {}
}

pub struct Bridge {
    pub server: Server,
    pub registry: NameRegistry,
    pub requests: mpsc::Sender<GridKey>,
    pub shown: Shown,
}

pub fn registry() -> NameRegistry {
    let mut registry = NameRegistry::new();
    for name in BLOCK_NAMES {
        registry.register(name);
    }
    registry
}

pub fn bridge(config: &Config) -> Bridge {
    let registry = registry();
    let shown = Shown::default();
    let (requests, recv) = mpsc::channel::<GridKey>();
    let host = Host {
        connection: Box::new(Quiet),
        player: Box::new(Nobody),
        console: Arc::new(Mutex::new(History::new())),
        requests: Box::new(recv),
        consumer: Box::new(shown.clone()),
    };
    let server = Server::new(config, &registry, host).unwrap();
    Bridge {
        server,
        registry,
        requests,
        shown,
    }
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn bulk_frame(sky_light_sent: bool, meta: Vec<ChunkMeta>, inflated: &[u8]) -> Frame {
    let packet = play::clientbound::ChunkDataBulk {
        bulk: ChunkBulk {
            sky_light_sent,
            meta,
            compressed_data: compress(inflated),
        },
    };
    Frame::Binary(encode_packet(packet).unwrap())
}

/// Waits for every submitted bulk to be inflated and transcoded.
pub fn settle(server: &mut Server) {
    while server.pending_chunks() > 0 {
        let before = server.pending_chunks();
        server.wait_chunks(Duration::from_secs(5));
        assert!(server.pending_chunks() < before, "inflate worker timed out");
    }
}

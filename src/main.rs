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

//! Replays a captured packet stream through the bridge without a renderer.

use clientmc::console::{self, History};
use clientmc::provider::ChunkConsumer;
use clientmc::server::{Connection, Player};
use clientmc::settings::Config;
use clientmc::world::block::{BlockId, NameRegistry};
use clientmc::world::{GridKey, VoxelChunk};
use clientmc::{Frame, Host, Server};
use clientmc_protocol::protocol::{Error, Serializable, VarInt};
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "clientmc")]
struct Opt {
    /// JSON configuration file, the stock block mapping is used without one
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// File of concatenated length prefixed clientbound packets
    #[structopt(long = "capture", parse(from_os_str))]
    capture: PathBuf,

    /// Log every packet and chunk
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

/// Drops everything the session sends.
struct Discard {
    sent: usize,
}

impl Connection for Discard {
    fn write_frame(&mut self, _frame: Vec<u8>) -> io::Result<()> {
        self.sent += 1;
        Ok(())
    }

    fn close(&mut self) {
        info!("{} packets would have been sent", self.sent);
    }
}

#[derive(Default)]
struct Standing {
    position: Option<(f64, f64, f64)>,
}

impl Player for Standing {
    fn move_to(&mut self, x: f64, y: f64, z: f64) {
        self.position = Some((x, y, z));
    }

    fn position(&self) -> Option<(f64, f64, f64)> {
        self.position
    }
}

struct NoRenderer;

impl ChunkConsumer for NoRenderer {
    fn show_chunk(&mut self, _chunk: VoxelChunk) {}

    fn set_block(&mut self, _x: i32, _y: i32, _z: i32, _id: BlockId) {}
}

/// Splits a capture into single packet frames, length prefix included.
fn split_frames(data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut frames = vec![];
    let mut buf = io::Cursor::new(data);
    while (buf.position() as usize) < data.len() {
        let start = buf.position() as usize;
        let len = VarInt::read_from(&mut buf)?.0;
        let end = buf.position() as usize + len.max(0) as usize;
        if len < 0 || end > data.len() {
            return Err(Error::Err(format!("truncated packet at byte {}", start)));
        }
        frames.push(data[start..end].to_vec());
        buf.set_position(end as u64);
    }
    Ok(frames)
}

fn main() {
    let opt = Opt::from_args();

    let history = Arc::new(Mutex::new(History::new()));
    let level = if opt.verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };
    if let Err(err) = console::init(history.clone(), level) {
        eprintln!("Failed to set up logging: {}", err);
    }

    let config = match opt.config {
        Some(ref path) => Config::load(path),
        None => Ok(Config::default()),
    };
    let config = match config {
        Ok(val) => val,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            process::exit(1);
        }
    };

    // Without a renderer every configured name is a valid block.
    let mut registry = NameRegistry::new();
    registry.register(&config.blocks.default);
    for name in config.blocks.overrides.values() {
        registry.register(name);
    }

    let (request_send, request_recv) = mpsc::channel::<GridKey>();
    let host = Host {
        connection: Box::new(Discard { sent: 0 }),
        player: Box::new(Standing::default()),
        console: history,
        requests: Box::new(request_recv),
        consumer: Box::new(NoRenderer),
    };
    let mut server = match Server::new(&config, &registry, host) {
        Ok(val) => val,
        Err(err) => {
            error!("Failed to start: {}", err);
            process::exit(1);
        }
    };

    let frames = match fs::read(&opt.capture).map_err(Error::from).and_then(|data| split_frames(&data)) {
        Ok(val) => val,
        Err(err) => {
            error!("Failed to read capture {}: {}", opt.capture.display(), err);
            process::exit(1);
        }
    };
    info!("Replaying {} packets", frames.len());

    let tick = config.position_interval();
    for frame in frames {
        server.on_frame(Frame::Binary(frame));
        server.tick(tick);
    }

    while server.pending_chunks() > 0 {
        let before = server.pending_chunks();
        server.wait_chunks(Duration::from_secs(5));
        if server.pending_chunks() == before {
            warn!("{} chunk bulks never finished inflating", before);
            break;
        }
    }

    let keys: Vec<GridKey> = server.world().keys().collect();
    for key in keys {
        if request_send.send(key).is_err() {
            break;
        }
    }
    server.tick(Duration::from_secs(0));

    info!(
        "{} grid-chunks materialised, {} delivered",
        server.world().len(),
        server.delivered_chunks()
    );
    server.on_transport_end();
}

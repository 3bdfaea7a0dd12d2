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

use crate::chunk_loader::{ChunkLoader, Inflated};
use crate::console::SharedConsole;
use crate::provider::{ChunkConsumer, ChunkProvider, ChunkRequestSource};
use crate::settings::{Config, ConfigError};
use crate::world::block::{BlockRegistry, TranslationTable};
use crate::world::{column, GridKey, World};
use log::{debug, error, info, trace, warn};
use protocol::protocol::{decode_packet, encode_packet, packet, DecodedPacket, Direction, PacketType, Payload, State};
use std::fmt;
use std::io;
use std::time::Duration;

/// Most position updates a single `tick` sends after a stall.
pub const MAX_POSITION_CATCH_UP: usize = 5;

/// A message as received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Binary(Vec<u8>),
    Text(String),
}

/// The outgoing half of the transport.
pub trait Connection {
    fn write_frame(&mut self, frame: Vec<u8>) -> io::Result<()>;

    fn close(&mut self) {}
}

/// The locally controlled player.
pub trait Player {
    fn move_to(&mut self, x: f64, y: f64, z: f64);

    /// Feet position, if the player has been placed yet.
    fn position(&self) -> Option<(f64, f64, f64)>;
}

/// Everything the session needs from the game hosting it.
pub struct Host {
    pub connection: Box<dyn Connection>,
    pub player: Box<dyn Player>,
    pub console: SharedConsole,
    pub requests: Box<dyn ChunkRequestSource>,
    pub consumer: Box<dyn ChunkConsumer>,
}

pub struct Server {
    conn: Option<Box<dyn Connection>>,
    player: Box<dyn Player>,
    console: SharedConsole,

    pub world: World,
    table: TranslationTable,
    loader: ChunkLoader,
    provider: ChunkProvider,

    eye_height: f64,
    player_height: f64,
    position_interval: Duration,
    // Started by the first spawn_position
    position_timer: Option<Duration>,
}

macro_rules! handle_packet {
    ($s:ident $pck:ident {
        $($packet:ident => $func:ident,)*
    }) => (
        match $pck {
        $(
            packet::Packet::$packet(val) => $s.$func(val),
        )*
            _ => {},
        }
    )
}

impl Server {
    pub fn new<R: BlockRegistry + ?Sized>(config: &Config, registry: &R, host: Host) -> Result<Server, ConfigError> {
        Server::with_loader(config, registry, host, ChunkLoader::new())
    }

    pub fn with_loader<R: BlockRegistry + ?Sized>(
        config: &Config,
        registry: &R,
        host: Host,
        loader: ChunkLoader,
    ) -> Result<Server, ConfigError> {
        info!("clientmc initializing...");
        let grid = config.grid()?;
        let table = TranslationTable::build(&config.blocks, registry)?;
        let world = World::new(grid, table.lookup(0));

        Ok(Server {
            conn: Some(host.connection),
            player: host.player,
            console: host.console,

            world,
            table,
            loader,
            provider: ChunkProvider::new(host.requests, host.consumer),

            eye_height: config.eye_height,
            player_height: config.player_height,
            position_interval: config.position_interval(),
            position_timer: None,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    pub fn on_frame(&mut self, frame: Frame) {
        if !self.is_enabled() {
            return;
        }
        match frame {
            Frame::Binary(data) => {
                if let Some(packet) = self.decode_frame(&data) {
                    self.handle_packet(packet);
                }
            }
            Frame::Text(_) => trace!("Skipping text frame"),
        }
    }

    /// Parses a frame as a clientbound play packet. Frames that fail to
    /// parse are logged and dropped.
    pub fn decode_frame(&self, data: &[u8]) -> Option<DecodedPacket> {
        match decode_packet(data, State::Play, Direction::Clientbound) {
            Ok(val) => Some(val),
            Err(err) => {
                warn!("protocol parse error: {}", err);
                None
            }
        }
    }

    pub fn handle_packet(&mut self, decoded: DecodedPacket) {
        match decoded.payload {
            Payload::Typed(pck) => handle_packet! {
                self pck {
                    ChunkDataBulk => on_chunk_bulk,
                    SpawnPosition => on_spawn_position,
                    BlockChange => on_block_change,
                    TeleportPlayer => on_teleport,
                    Disconnect => on_disconnect,
                    ServerMessage => on_server_message,
                }
            },
            Payload::Opaque(_) => trace!("Ignoring {} (0x{:02X})", decoded.name, decoded.id),
        }
    }

    /// Runs the session forward by `delta`: transcodes inflated chunk data,
    /// answers chunk requests and sends due position updates.
    pub fn tick(&mut self, delta: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.poll_chunks();
        self.provider.poll(&self.world);

        let interval = self.position_interval.max(Duration::from_millis(1));
        let mut due = 0;
        if let Some(ref mut timer) = self.position_timer {
            *timer += delta;
            while *timer >= interval && due < MAX_POSITION_CATCH_UP {
                *timer -= interval;
                due += 1;
            }
            if *timer >= interval {
                debug!("Skipping {} late position updates", timer.as_millis() / interval.as_millis());
                *timer = Duration::from_secs(0);
            }
        }
        for _ in 0..due {
            self.send_position_update();
        }
    }

    /// Transcodes every bulk the worker has finished, returning how many
    /// there were.
    pub fn poll_chunks(&mut self) -> usize {
        let done = self.loader.poll();
        self.load_inflated(done)
    }

    /// Like `poll_chunks` but waits up to `timeout` for the worker.
    pub fn wait_chunks(&mut self, timeout: Duration) -> usize {
        let done = self.loader.wait(timeout);
        self.load_inflated(done)
    }

    /// Bulks handed to the worker that haven't come back yet.
    pub fn pending_chunks(&self) -> usize {
        self.loader.pending()
    }

    fn load_inflated(&mut self, done: Vec<Inflated>) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let count = done.len();
        for inflated in done {
            debug!("Transcoding request {} ({} bytes)", inflated.id, inflated.data.len());
            column::load_bulk(
                &mut self.world,
                &self.table,
                &inflated.data,
                &inflated.batch.meta,
                inflated.batch.sky_light_sent,
            );
        }
        count
    }

    /// The renderer asking for a chunk.
    pub fn missing_chunk(&mut self, key: GridKey) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.provider.missing_chunk(&self.world, key)
    }

    pub fn delivered_chunks(&self) -> usize {
        self.provider.delivered()
    }

    pub fn send_chat(&mut self, text: &str) {
        self.write_packet(packet::play::serverbound::ChatMessage {
            message: text.to_owned(),
        });
    }

    pub fn send_position_update(&mut self) {
        let (x, y, z) = match self.player.position() {
            Some(val) => val,
            None => return,
        };
        let y = y + 1.0;
        self.write_packet(packet::play::serverbound::PlayerPosition {
            x,
            feet_y: y,
            head_y: y + self.player_height,
            z,
            on_ground: true,
        });
    }

    pub fn write_packet<T: PacketType>(&mut self, p: T) {
        let conn = match self.conn.as_mut() {
            Some(val) => val,
            None => return,
        };
        match encode_packet(p) {
            Ok(frame) => {
                if let Err(err) = conn.write_frame(frame) {
                    error!("Failed to send packet: {}", err);
                }
            }
            Err(err) => error!("Failed to encode packet: {}", err),
        }
    }

    /// Stops the session. Later frames, chunk requests and worker results
    /// are ignored.
    pub fn disable(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            info!("clientmc disabling");
            conn.close();
        }
        self.position_timer = None;
    }

    pub fn on_transport_error(&mut self, err: &dyn fmt::Display) {
        warn!("Connection error: {}", err);
        self.disable();
    }

    pub fn on_transport_end(&mut self) {
        info!("Connection closed");
        self.disable();
    }

    fn on_chunk_bulk(&mut self, bulk: packet::play::clientbound::ChunkDataBulk) {
        debug!(
            "map_chunk_bulk: {} columns, {} bytes",
            bulk.bulk.meta.len(),
            bulk.bulk.compressed_data.len()
        );
        self.loader.submit(bulk.bulk);
    }

    fn on_spawn_position(&mut self, spawn: packet::play::clientbound::SpawnPosition) {
        info!("Spawn at {},{},{}", spawn.x, spawn.y, spawn.z);
        self.player.move_to(spawn.x as f64, spawn.y as f64, spawn.z as f64);
        if self.position_timer.is_none() {
            self.position_timer = Some(Duration::from_secs(0));
        }
    }

    fn on_block_change(&mut self, block_change: packet::play::clientbound::BlockChange) {
        // TODO: apply block_metadata once the table is keyed by id and metadata
        let id = self.table.lookup((block_change.block_id.0 & 0xFF) as u8);
        let (x, y, z) = (block_change.x, block_change.y as i32, block_change.z);
        debug!("block_change {},{},{} -> {}", x, y, z, id);
        self.world.set_block(x, y, z, id);
        self.provider.set_block(x, y, z, id);
    }

    fn on_teleport(&mut self, teleport: packet::play::clientbound::TeleportPlayer) {
        debug!("Teleport to {},{},{}", teleport.x, teleport.y, teleport.z);
        let feet_y = teleport.y - self.eye_height;
        self.player.move_to(teleport.x, feet_y, teleport.z);

        // The server rejects further movement until we confirm the position.
        self.write_packet(packet::play::serverbound::PlayerPosition {
            x: teleport.x,
            feet_y,
            head_y: teleport.y,
            z: teleport.z,
            on_ground: teleport.on_ground,
        });
    }

    fn on_disconnect(&mut self, disconnect: packet::play::clientbound::Disconnect) {
        let reason = disconnect.reason.to_string();
        info!("Disconnected from server: {}", reason);
        if let Ok(mut console) = self.console.lock() {
            console.alert(&format!("Disconnected from server: {}", reason));
        }
    }

    fn on_server_message(&mut self, message: packet::play::clientbound::ServerMessage) {
        if let Ok(mut console) = self.console.lock() {
            console.log_component(&message.message);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::console::History;
    use crate::world::block::{BlockId, NameRegistry};
    use crate::world::VoxelChunk;
    use protocol::format::{Component, TextComponent};
    use protocol::protocol::VarInt;
    use std::sync::{mpsc, Arc, Mutex};

    type Sent = Arc<Mutex<Vec<Vec<u8>>>>;
    type Position = Arc<Mutex<Option<(f64, f64, f64)>>>;

    struct Recorder(Sent);

    impl Connection for Recorder {
        fn write_frame(&mut self, frame: Vec<u8>) -> io::Result<()> {
            self.0.lock().unwrap().push(frame);
            Ok(())
        }
    }

    struct TestPlayer(Position);

    impl Player for TestPlayer {
        fn move_to(&mut self, x: f64, y: f64, z: f64) {
            *self.0.lock().unwrap() = Some((x, y, z));
        }

        fn position(&self) -> Option<(f64, f64, f64)> {
            *self.0.lock().unwrap()
        }
    }

    struct Blocks(Arc<Mutex<Vec<(i32, i32, i32, BlockId)>>>);

    impl ChunkConsumer for Blocks {
        fn show_chunk(&mut self, _chunk: VoxelChunk) {}

        fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
            self.0.lock().unwrap().push((x, y, z, id));
        }
    }

    struct Session {
        server: Server,
        registry: NameRegistry,
        sent: Sent,
        position: Position,
        console: Arc<Mutex<History>>,
        blocks: Arc<Mutex<Vec<(i32, i32, i32, BlockId)>>>,
        _requests: mpsc::Sender<GridKey>,
    }

    fn session() -> Session {
        let mut registry = NameRegistry::new();
        for name in &["stone", "grass", "dirt", "cobblestone", "plankOak", "obsidian", "oreCoal", "logOak", "leavesOak", "brick"] {
            registry.register(name);
        }
        let sent = Sent::default();
        let position = Position::default();
        let console = Arc::new(Mutex::new(History::new()));
        let blocks = Arc::new(Mutex::new(Vec::new()));
        let (send, recv) = mpsc::channel::<GridKey>();
        let host = Host {
            connection: Box::new(Recorder(sent.clone())),
            player: Box::new(TestPlayer(position.clone())),
            console: console.clone(),
            requests: Box::new(recv),
            consumer: Box::new(Blocks(blocks.clone())),
        };
        let server = Server::new(&Config::default(), &registry, host).unwrap();
        Session {
            server,
            registry,
            sent,
            position,
            console,
            blocks,
            _requests: send,
        }
    }

    fn frame<T: PacketType>(p: T) -> Frame {
        Frame::Binary(encode_packet(p).unwrap())
    }

    fn sent_positions(sent: &Sent) -> Vec<packet::play::serverbound::PlayerPosition> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|data| {
                match decode_packet(data, State::Play, Direction::Serverbound).unwrap().payload {
                    Payload::Typed(packet::Packet::PlayerPosition(pos)) => pos,
                    other => panic!("unexpected packet {:?}", other),
                }
            })
            .collect()
    }

    #[test]
    fn block_change_sets_one_cell() {
        let mut s = session();
        s.server.on_frame(frame(packet::play::clientbound::BlockChange {
            x: 5,
            y: 64,
            z: -2,
            block_id: VarInt(1),
            block_metadata: 0,
        }));

        let stone = s.registry.resolve("stone").unwrap();
        let air = s.registry.resolve("air").unwrap();
        let world = s.server.world();
        assert_eq!(world.get_block(5, 64, -2), Some(stone));
        for &(x, y, z) in &[(4, 64, -2), (6, 64, -2), (5, 65, -2), (5, 64, -1), (5, 64, -3)] {
            assert_eq!(world.get_block(x, y, z), Some(air), "{},{},{}", x, y, z);
        }
        // y 64 starts grid-chunk 2, the one below was never allocated
        assert_eq!(world.get_block(5, 63, -2), None);
        assert_eq!(world.len(), 1);
        assert_eq!(*s.blocks.lock().unwrap(), vec![(5, 64, -2, stone)]);
    }

    #[test]
    fn teleport_is_echoed() {
        let mut s = session();
        s.server.on_frame(frame(packet::play::clientbound::TeleportPlayer {
            x: 1.5,
            y: 65.62,
            z: -3.0,
            yaw: 0.0,
            pitch: 0.0,
            on_ground: false,
        }));

        let (x, y, z) = s.position.lock().unwrap().unwrap();
        assert_eq!((x, z), (1.5, -3.0));
        assert!((y - 64.0).abs() < 1e-9);

        let echo = sent_positions(&s.sent);
        assert_eq!(echo.len(), 1);
        assert!((echo[0].feet_y - 64.0).abs() < 1e-9);
        assert_eq!(echo[0].head_y, 65.62);
        assert!(!echo[0].on_ground);
    }

    #[test]
    fn long_stall_sends_few_updates() {
        let mut s = session();
        s.server.on_frame(frame(packet::play::clientbound::SpawnPosition { x: 0, y: 64, z: 0 }));
        s.server.tick(Duration::from_secs(3600));
        assert_eq!(sent_positions(&s.sent).len(), MAX_POSITION_CATCH_UP);

        s.server.tick(Duration::from_millis(49));
        assert_eq!(sent_positions(&s.sent).len(), MAX_POSITION_CATCH_UP);
        s.server.tick(Duration::from_millis(1));
        assert_eq!(sent_positions(&s.sent).len(), MAX_POSITION_CATCH_UP + 1);
    }

    #[test]
    fn position_updates_start_at_spawn() {
        let mut s = session();
        s.server.tick(Duration::from_millis(200));
        assert!(s.sent.lock().unwrap().is_empty());

        s.server.on_frame(frame(packet::play::clientbound::SpawnPosition { x: 10, y: 70, z: 20 }));
        assert_eq!(*s.position.lock().unwrap(), Some((10.0, 70.0, 20.0)));

        s.server.tick(Duration::from_millis(30));
        assert!(s.sent.lock().unwrap().is_empty());
        s.server.tick(Duration::from_millis(90));

        let updates = sent_positions(&s.sent);
        assert_eq!(updates.len(), 2);
        for pos in updates {
            assert_eq!((pos.x, pos.feet_y, pos.z), (10.0, 71.0, 20.0));
            assert!((pos.head_y - 72.74).abs() < 1e-9);
            assert!(pos.on_ground);
        }
    }

    #[test]
    fn bad_frames_are_dropped() {
        let mut s = session();
        s.server.on_frame(Frame::Text("hello".to_owned()));
        s.server.on_frame(Frame::Binary(vec![0x02, 0x7f, 0x00]));
        s.server.on_frame(Frame::Binary(vec![]));
        assert!(s.server.is_enabled());
        assert!(s.server.world().is_empty());
        assert!(s.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn chat_and_kick_reach_console() {
        let mut s = session();
        s.server.on_frame(frame(packet::play::clientbound::ServerMessage {
            message: Component::from_string(r#"{"text":"<steve> hi"}"#),
        }));
        s.server.on_frame(frame(packet::play::clientbound::Disconnect {
            reason: Component::Text(TextComponent::new("Server closed")),
        }));

        let console = s.console.lock().unwrap();
        assert!(console.lines().iter().any(|l| l.to_string() == "<steve> hi"));
        assert_eq!(console.alerts(), &["Disconnected from server: Server closed".to_owned()]);
    }

    #[test]
    fn chat_is_sent() {
        let mut s = session();
        s.server.send_chat("/help");
        let sent = s.sent.lock().unwrap();
        assert_eq!(sent[0], vec![0x07, 0x01, 0x05, b'/', b'h', b'e', b'l', b'p']);
    }

    #[test]
    fn disabled_session_ignores_everything() {
        let mut s = session();
        s.server.on_frame(frame(packet::play::clientbound::SpawnPosition { x: 0, y: 64, z: 0 }));
        s.server.on_transport_error(&"reset by peer");
        assert!(!s.server.is_enabled());

        s.server.on_frame(frame(packet::play::clientbound::BlockChange {
            x: 0,
            y: 0,
            z: 0,
            block_id: VarInt(1),
            block_metadata: 0,
        }));
        s.server.send_chat("anyone?");
        s.server.tick(Duration::from_secs(1));

        assert!(s.server.world().is_empty());
        assert!(s.sent.lock().unwrap().is_empty());
        assert!(!s.server.missing_chunk(GridKey(0, 0, 0)));
    }
}

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

use byteorder::ReadBytesExt;
use std::io::Read;

state_packets!(
    play Play {
        serverbound Serverbound {
            /// ChatMessage is sent by the client when it sends a chat message or
            /// executes a command (prefixed by '/').
            packet ChatMessage => 0x01 {
                field message: String =,
            }
            /// PlayerPosition is used to update the player's position.
            ///
            /// `head_y` is the stance: the feet position plus the player height.
            packet PlayerPosition => 0x04 {
                field x: f64 =,
                field feet_y: f64 =,
                field head_y: f64 =,
                field z: f64 =,
                field on_ground: bool =,
            }
        }
        clientbound Clientbound {
            /// ServerMessage is a message sent by the server. It could be from a player
            /// or just a system message.
            packet ServerMessage => 0x02 {
                field message: format::Component =,
            }
            /// SpawnPosition is sent to change the player's current spawn point.
            packet SpawnPosition => 0x05 {
                field x: i32 =,
                field y: i32 =,
                field z: i32 =,
            }
            /// TeleportPlayer is sent to change the player's position. The client is expected
            /// to reply to the server with the same positions as contained in this packet
            /// otherwise will reject future packets.
            ///
            /// `y` is the eye position, not the feet.
            packet TeleportPlayer => 0x08 {
                field x: f64 =,
                field y: f64 =,
                field z: f64 =,
                field yaw: f32 =,
                field pitch: f32 =,
                field on_ground: bool =,
            }
            /// BlockChange is used to update a single block on the client.
            packet BlockChange => 0x23 {
                field x: i32 =,
                field y: u8 =,
                field z: i32 =,
                field block_id: VarInt =,
                field block_metadata: u8 =,
            }
            /// ChunkDataBulk sends several chunk columns at once. The block data of
            /// every column is zlib compressed into a single buffer.
            packet ChunkDataBulk => 0x26 {
                field bulk: crate::protocol::packet::ChunkBulk =,
            }
            /// Disconnect causes the client to disconnect displaying the passed reason.
            packet Disconnect => 0x40 {
                field reason: format::Component =,
            }
        }
    }
);

/// Location and section layout of one column inside a `ChunkBulk`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMeta {
    pub x: i32,
    pub z: i32,
    pub bitmap: u16,
    pub add_bitmap: u16,
}

impl Serializable for ChunkMeta {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<Self, Error> {
        Ok(ChunkMeta {
            x: Serializable::read_from(buf)?,
            z: Serializable::read_from(buf)?,
            bitmap: Serializable::read_from(buf)?,
            add_bitmap: Serializable::read_from(buf)?,
        })
    }

    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        self.x.write_to(buf)?;
        self.z.write_to(buf)?;
        self.bitmap.write_to(buf)?;
        self.add_bitmap.write_to(buf)
    }
}

/// The body of a `map_chunk_bulk` packet.
///
/// On the wire the column count and data length come first, then the sky light
/// flag and the compressed data, and only then the per column metadata.
#[derive(Default)]
pub struct ChunkBulk {
    pub sky_light_sent: bool,
    pub meta: Vec<ChunkMeta>,
    pub compressed_data: Vec<u8>,
}

impl Serializable for ChunkBulk {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<Self, Error> {
        let count = i16::read_from(buf)?;
        let length = i32::read_from(buf)?;
        if count < 0 || length < 0 {
            return Err(Error::Err(format!(
                "invalid chunk bulk header ({} columns, {} bytes)",
                count, length
            )));
        }
        let sky_light_sent = buf.read_u8()? != 0;

        let mut compressed_data = vec![];
        buf.by_ref().take(length as u64).read_to_end(&mut compressed_data)?;
        if compressed_data.len() != length as usize {
            return Err(Error::Err(format!(
                "chunk bulk data ended early ({} of {} bytes)",
                compressed_data.len(),
                length
            )));
        }

        let mut meta = Vec::with_capacity(count as usize);
        for _ in 0..count {
            meta.push(ChunkMeta::read_from(buf)?);
        }
        Ok(ChunkBulk {
            sky_light_sent,
            meta,
            compressed_data,
        })
    }

    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        (self.meta.len() as i16).write_to(buf)?;
        (self.compressed_data.len() as i32).write_to(buf)?;
        self.sky_light_sent.write_to(buf)?;
        buf.write_all(&self.compressed_data)?;
        for m in &self.meta {
            m.write_to(buf)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChunkBulk {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ChunkBulk")
            .field("sky_light_sent", &self.sky_light_sent)
            .field("meta", &self.meta)
            .field("compressed_data", &format_args!("<{} bytes>", self.compressed_data.len()))
            .finish()
    }
}

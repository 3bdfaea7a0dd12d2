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

use crate::format;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::convert;
use std::default;
use std::fmt;
use std::io;
use std::io::{Read, Write};

pub mod names;

/// Helper macro for defining packets
#[macro_export]
macro_rules! state_packets {
     ($($state:ident $stateName:ident {
        $($dir:ident $dirName:ident {
            $(
                $(#[$attr:meta])*
                packet $name:ident => $id:literal {
                    $($(#[$fattr:meta])* field $field:ident: $field_type:ty =,)*
                }
            )*
        })+
    })+) => {
        use $crate::protocol::*;
        use std::io;

        #[derive(Debug)]
        pub enum Packet {
        $(
            $(
                $(
        $name($state::$dir::$name),
                )*
            )+
        )+
        }

        $(
        pub mod $state {

            $(
            pub mod $dir {
                #![allow(unused_imports)]
                use $crate::protocol::*;
                use $crate::format;
                use std::io;

                pub mod internal_ids {
                    $(
                        #[allow(non_upper_case_globals)]
                        pub const $name: i32 = $id;
                    )*
                }

                $(
                    #[derive(Default, Debug)]
                    $(#[$attr])* pub struct $name {
                        $($(#[$fattr])* pub $field: $field_type,)*
                    }

                    impl PacketType for $name {

                        fn packet_id(&self) -> i32 { internal_ids::$name }

                        #[allow(unused_variables)]
                        fn write<W: io::Write>(self, buf: &mut W) -> Result<(), Error> {
                            $(
                                self.$field.write_to(buf)?;
                            )*

                            Result::Ok(())
                        }
                    }
                )*
            }
            )+
        }
        )+

        /// Returns the packet for the given state, direction and id after parsing the fields
        /// from the buffer.
        #[allow(unused_variables, unreachable_patterns)]
        pub fn packet_by_id<R: io::Read>(state: State, dir: Direction, id: i32, buf: &mut R) -> Result<Option<Packet>, Error> {
            match state {
                $(
                    State::$stateName => {
                        match dir {
                            $(
                                Direction::$dirName => {
                                    match id {
                                    $(
                                        self::$state::$dir::internal_ids::$name => {
                                            use self::$state::$dir::$name;
                                            #[allow(unused_mut)]
                                            let mut packet : $name = $name::default();
                                            $(
                                                packet.$field = Serializable::read_from(buf)?;
                                            )*
                                            Result::Ok(Option::Some(Packet::$name(packet)))
                                        },
                                    )*
                                        _ => Result::Ok(Option::None)
                                    }
                                }
                            )+
                            _ => Result::Ok(Option::None)
                        }
                    }
                )+
                _ => Result::Ok(Option::None)
            }
        }
    }
}

pub mod packet;

pub trait Serializable: Sized {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<Self, Error>;
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error>;
}

impl Serializable for Vec<u8> {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<Vec<u8>, Error> {
        let mut v = Vec::new();
        buf.read_to_end(&mut v)?;
        Ok(v)
    }

    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_all(&self[..]).map_err(|x| x.into())
    }
}

impl Serializable for String {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<String, Error> {
        let len = VarInt::read_from(buf)?.0;
        if len < 0 {
            return Err(Error::Err(format!("negative string length {}", len)));
        }
        let mut ret = String::new();
        buf.by_ref().take(len as u64).read_to_string(&mut ret)?;
        if ret.len() != len as usize {
            return Err(Error::Err("string ended early".to_owned()));
        }
        Result::Ok(ret)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        let bytes = self.as_bytes();
        VarInt(bytes.len() as i32).write_to(buf)?;
        buf.write_all(bytes)?;
        Result::Ok(())
    }
}

impl Serializable for format::Component {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<Self, Error> {
        let raw = String::read_from(buf)?;
        Result::Ok(Self::from_string(&raw))
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        let val = serde_json::to_string(&self.to_value())?;
        val.write_to(buf)
    }
}

impl Serializable for bool {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<bool, Error> {
        Result::Ok(buf.read_u8()? != 0)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_u8(if *self { 1 } else { 0 })?;
        Result::Ok(())
    }
}

impl Serializable for i16 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<i16, Error> {
        Result::Ok(buf.read_i16::<BigEndian>()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_i16::<BigEndian>(*self)?;
        Result::Ok(())
    }
}

impl Serializable for i32 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<i32, Error> {
        Result::Ok(buf.read_i32::<BigEndian>()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_i32::<BigEndian>(*self)?;
        Result::Ok(())
    }
}

impl Serializable for u8 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<u8, Error> {
        Result::Ok(buf.read_u8()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_u8(*self)?;
        Result::Ok(())
    }
}

impl Serializable for u16 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<u16, Error> {
        Result::Ok(buf.read_u16::<BigEndian>()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_u16::<BigEndian>(*self)?;
        Result::Ok(())
    }
}

impl Serializable for f32 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<f32, Error> {
        Result::Ok(buf.read_f32::<BigEndian>()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_f32::<BigEndian>(*self)?;
        Result::Ok(())
    }
}

impl Serializable for f64 {
    fn read_from<R: io::Read>(buf: &mut R) -> Result<f64, Error> {
        Result::Ok(buf.read_f64::<BigEndian>()?)
    }
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_f64::<BigEndian>(*self)?;
        Result::Ok(())
    }
}

/// `VarInt` have a variable size (between 1 and 5 bytes) when encoded based
/// on the size of the number
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub i32);

impl Serializable for VarInt {
    /// Decodes a `VarInt` from the Reader
    fn read_from<R: io::Read>(buf: &mut R) -> Result<VarInt, Error> {
        const PART: u32 = 0x7F;
        let mut size = 0;
        let mut val = 0u32;
        loop {
            if size >= 5 {
                return Result::Err(Error::Err("VarInt too big".to_owned()));
            }
            let b = buf.read_u8()? as u32;
            val |= (b & PART) << (size * 7);
            size += 1;
            if (b & 0x80) == 0 {
                break;
            }
        }

        Result::Ok(VarInt(val as i32))
    }

    /// Encodes a `VarInt` into the Writer
    fn write_to<W: io::Write>(&self, buf: &mut W) -> Result<(), Error> {
        const PART: u32 = 0x7F;
        let mut val = self.0 as u32;
        loop {
            if (val & !PART) == 0 {
                buf.write_u8(val as u8)?;
                return Result::Ok(());
            }
            buf.write_u8(((val & PART) | 0x80) as u8)?;
            val >>= 7;
        }
    }
}

impl default::Default for VarInt {
    fn default() -> VarInt {
        VarInt(0)
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction is used to define whether packets are going to the
/// server or the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

/// The protocol has multiple 'sub-protocols' or states which control which
/// packet an id points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Handshaking,
    Play,
    Status,
    Login,
}

/// Return for any protocol related error.
#[derive(Debug)]
pub enum Error {
    Err(String),
    IOError(io::Error),
    Json(serde_json::Error),
}

impl convert::From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IOError(e)
    }
}

impl convert::From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            Error::Err(_) => None,
            Error::IOError(ref e) => Some(e),
            Error::Json(ref e) => Some(e),
        }
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::Err(ref val) => write!(f, "protocol error: {}", val),
            Error::IOError(ref e) => e.fmt(f),
            Error::Json(ref e) => e.fmt(f),
        }
    }
}

pub trait PacketType: Sized {
    fn packet_id(&self) -> i32;

    fn write<W: io::Write>(self, buf: &mut W) -> Result<(), Error>;
}

/// The fields of a packet, either parsed into its typed form or kept raw
/// when the id is known to the protocol but has no typed definition here.
#[derive(Debug)]
pub enum Payload {
    Typed(packet::Packet),
    Opaque(Vec<u8>),
}

/// A single application level packet pulled out of a frame.
#[derive(Debug)]
pub struct DecodedPacket {
    pub name: &'static str,
    pub id: i32,
    pub payload: Payload,
}

/// Parses exactly one length prefixed packet out of `frame`.
///
/// The id is resolved to its protocol name first, an id without a name is
/// rejected before any field is read. The whole frame must be consumed.
pub fn decode_packet(frame: &[u8], state: State, dir: Direction) -> Result<DecodedPacket, Error> {
    let mut buf = io::Cursor::new(frame);
    let len = VarInt::read_from(&mut buf)?.0;
    let remaining = frame.len() - buf.position() as usize;
    if len < 0 || len as usize != remaining {
        return Err(Error::Err(format!(
            "packet length {} does not match frame ({} bytes left)",
            len, remaining
        )));
    }

    let id = VarInt::read_from(&mut buf)?.0;
    let name = names::packet_name(state, dir, id)
        .ok_or_else(|| Error::Err(format!("unknown packet id 0x{:X}", id)))?;

    let payload = match packet::packet_by_id(state, dir, id, &mut buf)? {
        Some(val) => {
            let pos = buf.position() as usize;
            if frame.len() != pos {
                return Err(Error::Err(format!(
                    "Failed to read all of packet 0x{:X}, had {} bytes left",
                    id,
                    frame.len() - pos
                )));
            }
            Payload::Typed(val)
        }
        None => Payload::Opaque(frame[buf.position() as usize..].to_vec()),
    };

    Ok(DecodedPacket { name, id, payload })
}

/// Serializes `packet` with its id and length prefix, ready to be written
/// as a single frame.
pub fn encode_packet<T: PacketType>(packet: T) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    VarInt(packet.packet_id()).write_to(&mut body)?;
    packet.write(&mut body)?;

    let mut frame = Vec::with_capacity(body.len() + 5);
    VarInt(body.len() as i32).write_to(&mut frame)?;
    frame.write_all(&body)?;
    Ok(frame)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn varint_lengths() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (255, &[0xff, 0x01]),
            (2097151, &[0xff, 0xff, 0x7f]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for &(val, bytes) in cases {
            let mut out = Vec::new();
            VarInt(val).write_to(&mut out).unwrap();
            assert_eq!(out, bytes);
            assert_eq!(VarInt::read_from(&mut io::Cursor::new(bytes)).unwrap().0, val);
        }
    }

    #[test]
    fn varint_too_big() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(VarInt::read_from(&mut io::Cursor::new(&bytes[..])).is_err());
    }

    #[test]
    fn decode_spawn_position() {
        let frame = [0x0d, 0x05, 0, 0, 0, 10, 0, 0, 0, 64, 0xff, 0xff, 0xff, 0xf6];
        let packet = decode_packet(&frame, State::Play, Direction::Clientbound).unwrap();
        assert_eq!(packet.name, "spawn_position");
        assert_eq!(packet.id, 0x05);
        match packet.payload {
            Payload::Typed(packet::Packet::SpawnPosition(pos)) => {
                assert_eq!((pos.x, pos.y, pos.z), (10, 64, -10));
            }
            other => panic!("wrong payload {:?}", other),
        }
    }

    #[test]
    fn decode_unknown_id() {
        let frame = [0x01, 0x7a];
        assert!(decode_packet(&frame, State::Play, Direction::Clientbound).is_err());
    }

    #[test]
    fn decode_named_but_untyped() {
        // keep_alive carries an i32 that is not parsed here
        let frame = [0x05, 0x00, 0, 0, 0, 42];
        let packet = decode_packet(&frame, State::Play, Direction::Clientbound).unwrap();
        assert_eq!(packet.name, "keep_alive");
        match packet.payload {
            Payload::Opaque(data) => assert_eq!(data, vec![0, 0, 0, 42]),
            other => panic!("wrong payload {:?}", other),
        }
    }

    #[test]
    fn decode_trailing_bytes() {
        let frame = [0x0e, 0x05, 0, 0, 0, 10, 0, 0, 0, 64, 0, 0, 0, 1, 0xaa];
        assert!(decode_packet(&frame, State::Play, Direction::Clientbound).is_err());
    }

    #[test]
    fn decode_truncated() {
        let frame = [0x0e, 0x05, 0, 0, 0, 10];
        assert!(decode_packet(&frame, State::Play, Direction::Clientbound).is_err());
    }

    #[test]
    fn encode_chat() {
        let frame = encode_packet(packet::play::serverbound::ChatMessage {
            message: "hi".to_owned(),
        })
        .unwrap();
        assert_eq!(frame, vec![0x04, 0x01, 0x02, b'h', b'i']);
    }
}

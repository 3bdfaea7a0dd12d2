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

//! Feeds a Minecraft 1.7 server's world stream into a voxel grid renderer.

extern crate clientmc_protocol as protocol;

pub mod chunk_loader;
pub mod console;
pub mod provider;
pub mod server;
pub mod settings;
pub mod types;
pub mod world;

pub use crate::server::{Frame, Host, Server};

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

use crate::settings::{BlockMapping, ConfigError};
use std::collections::HashMap;

/// A block id in the renderer's id space.
pub type BlockId = u16;

/// Number of source block ids. Source ids are single bytes on the wire, the
/// add (high) nibble is not applied.
pub const MAX_SOURCE_ID: usize = 256;

/// Resolves a block name to the renderer's id for it.
pub trait BlockRegistry {
    fn resolve(&self, name: &str) -> Option<BlockId>;
}

/// Registry that hands out ids in registration order, `air` being 0.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    ids: HashMap<String, BlockId>,
    names: Vec<String>,
}

impl NameRegistry {
    pub fn new() -> NameRegistry {
        let mut registry = NameRegistry {
            ids: HashMap::new(),
            names: vec![],
        };
        registry.register("air");
        registry
    }

    /// Registers `name`, returning its existing id if it is already known.
    pub fn register(&mut self, name: &str) -> BlockId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len() as BlockId;
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    pub fn name(&self, id: BlockId) -> Option<&str> {
        self.names.get(id as usize).map(|v| &v[..])
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        NameRegistry::new()
    }
}

impl BlockRegistry for NameRegistry {
    fn resolve(&self, name: &str) -> Option<BlockId> {
        self.ids.get(name).copied()
    }
}

/// Maps every source block id to a target id.
#[derive(Clone)]
pub struct TranslationTable {
    ids: Vec<BlockId>,
}

impl TranslationTable {
    /// Builds the table, failing on the first name the registry does not know.
    pub fn build<R: BlockRegistry + ?Sized>(
        mapping: &BlockMapping,
        registry: &R,
    ) -> Result<TranslationTable, ConfigError> {
        let default = registry
            .resolve(&mapping.default)
            .ok_or_else(|| ConfigError::UnknownBlock {
                source_id: None,
                name: mapping.default.clone(),
            })?;
        let mut ids = vec![default; MAX_SOURCE_ID];

        for (&source_id, name) in &mapping.overrides {
            if source_id as usize >= MAX_SOURCE_ID {
                return Err(ConfigError::SourceIdOutOfRange(source_id));
            }
            ids[source_id as usize] = registry
                .resolve(name)
                .ok_or_else(|| ConfigError::UnknownBlock {
                    source_id: Some(source_id),
                    name: name.clone(),
                })?;
        }
        Ok(TranslationTable { ids })
    }

    pub fn lookup(&self, source_id: u8) -> BlockId {
        self.ids[source_id as usize]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

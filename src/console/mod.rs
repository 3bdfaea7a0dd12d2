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

use std::sync::{Arc, Mutex};

use protocol::format::{Color, Component, TextComponent};

const HISTORY_LINES: usize = 200;

/// The user facing console.
pub trait Console: Send {
    fn log_component(&mut self, msg: &Component);

    /// Shows `msg` in a way the user can't miss.
    fn alert(&mut self, msg: &str);

    fn log(&mut self, msg: &str) {
        self.log_component(&Component::Text(TextComponent::new(msg)));
    }
}

pub type SharedConsole = Arc<Mutex<dyn Console>>;

/// A console without a display that keeps the last lines it was given.
pub struct History {
    lines: Vec<Component>,
    alerts: Vec<String>,
}

impl History {
    pub fn new() -> History {
        History {
            lines: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[Component] {
        &self.lines
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}

impl Console for History {
    fn log_component(&mut self, msg: &Component) {
        if self.lines.len() >= HISTORY_LINES {
            self.lines.remove(0);
        }
        self.lines.push(msg.clone());
    }

    fn alert(&mut self, msg: &str) {
        println!("!! {}", msg);
        self.alerts.push(msg.to_owned());
    }
}

/// Mirrors log records to stdout and into a `Console`.
pub struct ConsoleProxy {
    console: SharedConsole,
    level: log::LevelFilter,
}

impl ConsoleProxy {
    pub fn new(console: SharedConsole, level: log::LevelFilter) -> ConsoleProxy {
        ConsoleProxy { console, level }
    }

    fn format(file: &str, record: &log::Record) -> Component {
        let line = record.line().unwrap_or(0);
        let mut msg = TextComponent::new("");
        msg.modifier.extra = Some(vec![
            Component::Text(TextComponent::new("[")),
            {
                let mut msg = TextComponent::new(file);
                msg.modifier.color = Some(Color::Green);
                Component::Text(msg)
            },
            Component::Text(TextComponent::new(":")),
            {
                let mut msg = TextComponent::new(&format!("{}", line));
                msg.modifier.color = Some(Color::Aqua);
                Component::Text(msg)
            },
            Component::Text(TextComponent::new("]")),
            Component::Text(TextComponent::new("[")),
            {
                let mut msg = TextComponent::new(&format!("{}", record.level()));
                msg.modifier.color = Some(match record.level() {
                    log::Level::Debug => Color::Green,
                    log::Level::Error => Color::Red,
                    log::Level::Warn => Color::Yellow,
                    log::Level::Info => Color::Aqua,
                    log::Level::Trace => Color::Blue,
                });
                Component::Text(msg)
            },
            Component::Text(TextComponent::new("] ")),
            Component::Text(TextComponent::new(&format!("{}", record.args()))),
        ]);
        Component::Text(msg)
    }
}

impl log::Log for ConsoleProxy {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let file = record.file().unwrap_or("").replace('\\', "/");
        let file = match file.rfind("src/") {
            Some(pos) => &file[pos + 4..],
            None => &file[..],
        };

        println!(
            "[{}:{}][{}] {}",
            file,
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        );

        // The console may itself be logging from this thread.
        if let Ok(mut console) = self.console.try_lock() {
            console.log_component(&ConsoleProxy::format(file, record));
        }
    }

    fn flush(&self) {}
}

/// Installs a `ConsoleProxy` as the global logger.
pub fn init(console: SharedConsole, level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(ConsoleProxy::new(console, level)))?;
    log::set_max_level(level);
    Ok(())
}

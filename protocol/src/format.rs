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

//! Formatted text as carried by `chat` and `kick_disconnect`.

use log::warn;
use serde_json::{Map, Value};
use std::fmt;
use std::mem;

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Text(TextComponent),
}

impl Component {
    pub fn from_string(str: &str) -> Self {
        let mut component;
        match serde_json::from_str::<Value>(str) {
            Ok(value) => component = Component::from_value(&value),
            // Sometimes the server sends a literal string, so we should interpret it literally
            Err(_) => {
                component = Component::Text(TextComponent::new(str));
                convert_legacy(&mut component);
            }
        }
        component
    }

    pub fn from_value(v: &Value) -> Self {
        let modifier = Modifier::from_value(v);
        if let Some(val) = v.as_str() {
            let mut component = Component::Text(TextComponent {
                text: val.to_owned(),
                modifier,
            });
            convert_legacy(&mut component);
            component
        } else if v.get("text").is_some() {
            Component::Text(TextComponent::from_value(v, modifier))
        } else if let Some(key) = v.get("translate").and_then(Value::as_str) {
            // No translation tables; show the key followed by its arguments.
            let mut text = TextComponent {
                text: key.to_owned(),
                modifier,
            };
            if let Some(with) = v.get("with").and_then(Value::as_array) {
                let args = with.iter().map(Component::from_value);
                let mut extra = text.modifier.extra.take().unwrap_or_default();
                for arg in args {
                    extra.push(Component::Text(TextComponent::new(" ")));
                    extra.push(arg);
                }
                text.modifier.extra = Some(extra);
            }
            Component::Text(text)
        } else {
            let mut modifier = modifier;
            modifier.color = Some(Color::Red);
            Component::Text(TextComponent {
                text: "UNHANDLED".to_owned(),
                modifier,
            })
        }
    }

    pub fn to_value(&self) -> Value {
        match *self {
            Component::Text(ref txt) => txt.to_value(),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Component::Text(ref txt) => write!(f, "{}", txt),
        }
    }
}

impl Default for Component {
    fn default() -> Self {
        Component::Text(TextComponent::new(""))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Modifier {
    pub extra: Option<Vec<Component>>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underlined: Option<bool>,
    pub strikethrough: Option<bool>,
    pub obfuscated: Option<bool>,
    pub color: Option<Color>,
}

impl Modifier {
    pub fn from_value(v: &Value) -> Self {
        let mut m = Modifier {
            bold: v.get("bold").and_then(|v| v.as_bool()),
            italic: v.get("italic").and_then(|v| v.as_bool()),
            underlined: v.get("underlined").and_then(|v| v.as_bool()),
            strikethrough: v.get("strikethrough").and_then(|v| v.as_bool()),
            obfuscated: v.get("obfuscated").and_then(|v| v.as_bool()),
            color: v.get("color").and_then(|v| v.as_str()).map(Color::from_string),
            extra: Option::None,
        };
        if let Some(data) = v.get("extra").and_then(|v| v.as_array()) {
            m.extra = Some(data.iter().map(Component::from_value).collect());
        }
        m
    }

    fn write_into(&self, obj: &mut Map<String, Value>) {
        let flags = [
            ("bold", self.bold),
            ("italic", self.italic),
            ("underlined", self.underlined),
            ("strikethrough", self.strikethrough),
            ("obfuscated", self.obfuscated),
        ];
        for (key, val) in flags.iter() {
            if let Some(val) = *val {
                obj.insert((*key).to_owned(), Value::Bool(val));
            }
        }
        if let Some(color) = self.color {
            obj.insert("color".to_owned(), Value::String(color.to_string()));
        }
        if let Some(ref extra) = self.extra {
            obj.insert(
                "extra".to_owned(),
                Value::Array(extra.iter().map(Component::to_value).collect()),
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextComponent {
    pub text: String,
    pub modifier: Modifier,
}

impl TextComponent {
    pub fn new(val: &str) -> TextComponent {
        TextComponent {
            text: val.to_owned(),
            modifier: Modifier {
                ..Default::default()
            },
        }
    }

    pub fn from_value(v: &Value, modifier: Modifier) -> Self {
        TextComponent {
            text: v.get("text").and_then(Value::as_str).unwrap_or("").to_owned(),
            modifier,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("text".to_owned(), Value::String(self.text.clone()));
        self.modifier.write_into(&mut obj);
        Value::Object(obj)
    }
}

impl fmt::Display for TextComponent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)?;
        if let Some(ref extra) = self.modifier.extra {
            for c in extra {
                write!(f, "{}", c)?;
            }
        }
        Result::Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Color::Black => "black",
            Color::DarkBlue => "dark_blue",
            Color::DarkGreen => "dark_green",
            Color::DarkAqua => "dark_aqua",
            Color::DarkRed => "dark_red",
            Color::DarkPurple => "dark_purple",
            Color::Gold => "gold",
            Color::Gray => "gray",
            Color::DarkGray => "dark_gray",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Aqua => "aqua",
            Color::Red => "red",
            Color::LightPurple => "light_purple",
            Color::Yellow => "yellow",
            Color::White => "white",
        })
    }
}

impl Color {
    fn from_string(val: &str) -> Self {
        match val {
            "black" => Color::Black,
            "dark_blue" => Color::DarkBlue,
            "dark_green" => Color::DarkGreen,
            "dark_aqua" => Color::DarkAqua,
            "dark_red" => Color::DarkRed,
            "dark_purple" => Color::DarkPurple,
            "gold" => Color::Gold,
            "gray" => Color::Gray,
            "dark_gray" => Color::DarkGray,
            "blue" => Color::Blue,
            "green" => Color::Green,
            "aqua" => Color::Aqua,
            "red" => Color::Red,
            "light_purple" => Color::LightPurple,
            "yellow" => Color::Yellow,
            _ => Color::White,
        }
    }

    fn from_legacy(code: char) -> Option<Self> {
        Some(match code {
            '0' => Color::Black,
            '1' => Color::DarkBlue,
            '2' => Color::DarkGreen,
            '3' => Color::DarkAqua,
            '4' => Color::DarkRed,
            '5' => Color::DarkPurple,
            '6' => Color::Gold,
            '7' => Color::Gray,
            '8' => Color::DarkGray,
            '9' => Color::Blue,
            'a' => Color::Green,
            'b' => Color::Aqua,
            'c' => Color::Red,
            'd' => Color::LightPurple,
            'e' => Color::Yellow,
            'f' => Color::White,
            _ => return None,
        })
    }
}

const LEGACY_CHAR: char = '§';

/// Splits text using `§` formatting codes into styled parts.
pub fn convert_legacy(c: &mut Component) {
    match *c {
        Component::Text(ref mut txt) => {
            if let Some(extra) = txt.modifier.extra.as_mut() {
                for e in extra.iter_mut() {
                    convert_legacy(e);
                }
            }
            if !txt.text.contains(LEGACY_CHAR) {
                return;
            }
            let mut parts = Vec::new();
            let mut last = 0;
            let mut current = TextComponent::new("");
            {
                let mut iter = txt.text.char_indices();
                while let Some((i, c)) = iter.next() {
                    if c != LEGACY_CHAR {
                        continue;
                    }
                    let next = match iter.next() {
                        Some(val) => val,
                        None => break,
                    };
                    let code = next.1.to_ascii_lowercase();
                    current.text = txt.text[last..i].to_owned();
                    last = next.0 + next.1.len_utf8();

                    let mut modifier = if Color::from_legacy(code).is_some() {
                        Default::default()
                    } else {
                        current.modifier.clone()
                    };
                    if !current.text.is_empty() {
                        parts.push(Component::Text(mem::replace(&mut current, TextComponent::new(""))));
                    }

                    match code {
                        'k' => modifier.obfuscated = Some(true),
                        'l' => modifier.bold = Some(true),
                        'm' => modifier.strikethrough = Some(true),
                        'n' => modifier.underlined = Some(true),
                        'o' => modifier.italic = Some(true),
                        'r' => {}
                        code => match Color::from_legacy(code) {
                            Some(color) => modifier.color = Some(color),
                            None => warn!("unsupported color code {:?} in text '{}'", code, txt.text),
                        },
                    }

                    current.modifier = modifier;
                }
            }
            if last < txt.text.len() {
                current.text = txt.text[last..].to_owned();
                parts.push(Component::Text(current));
            }

            let old = mem::replace(&mut txt.modifier.extra, Some(parts));
            if let Some(old_extra) = old {
                if let Some(extra) = txt.modifier.extra.as_mut() {
                    extra.extend(old_extra);
                }
            }
            txt.text = "".to_owned();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chat_with_extra() {
        let c = Component::from_string(r#"{"text":"<","extra":[{"text":"steve","color":"gold"},{"text":"> hello"}]}"#);
        assert_eq!(c.to_string(), "<steve> hello");
        match c {
            Component::Text(ref txt) => {
                let extra = txt.modifier.extra.as_ref().unwrap();
                match extra[0] {
                    Component::Text(ref e) => assert_eq!(e.modifier.color, Some(Color::Gold)),
                }
            }
        }
    }

    #[test]
    fn translate_with_args() {
        let c = Component::from_string(r#"{"translate":"chat.type.text","with":["steve","hi"]}"#);
        assert_eq!(c.to_string(), "chat.type.text steve hi");
    }

    #[test]
    fn legacy_codes() {
        let c = Component::from_string("§cKicked §lnow");
        assert_eq!(c.to_string(), "Kicked now");
        match c {
            Component::Text(ref txt) => {
                let extra = txt.modifier.extra.as_ref().unwrap();
                assert_eq!(extra.len(), 2);
                match extra[0] {
                    Component::Text(ref e) => assert_eq!(e.modifier.color, Some(Color::Red)),
                }
                match extra[1] {
                    Component::Text(ref e) => assert_eq!(e.modifier.bold, Some(true)),
                }
            }
        }
    }

    #[test]
    fn value_round_trip() {
        let c = Component::from_string(r#"{"text":"a","bold":true,"extra":[{"text":"b","color":"red"}]}"#);
        assert_eq!(Component::from_value(&c.to_value()), c);
    }
}

#![recursion_limit = "300"]

pub mod format;
pub mod protocol;

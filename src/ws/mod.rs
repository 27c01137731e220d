//! WebSocket transport between the page shell and running scenes

pub mod handler;
pub mod protocol;

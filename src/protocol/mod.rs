//! STOMP frame codec
//!
//! Wire format for one frame, carried in one WebSocket text message:
//!
//! ```text
//! COMMAND\n
//! name:value\n
//! ...\n
//! \n
//! <body bytes>\0
//! ```
//!
//! A payload of a single `\n` is a transport heartbeat, not a frame.
//! Decoding never panics; every failure mode is a [`ParseError`].

pub mod codec;
pub mod command;
pub mod frame;

pub use codec::{decode, ParseError};
pub use command::Command;
pub use frame::Frame;

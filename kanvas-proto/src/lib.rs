//! Shared wire vocabulary for Kanvas boards.
//!
//! Everything here is plain data plus a JSON codec: no async, no I/O.

pub mod board;
pub mod codec;
pub mod command;
pub mod event;
pub mod ids;

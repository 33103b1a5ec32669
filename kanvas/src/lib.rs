//! `Kanvas`: client-side board state reconciliation for collaborative
//! Kanban boards.

pub mod config;
pub mod drag;
pub mod executor;
pub mod notice;
pub mod ordering;
pub mod patch;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod store;
pub mod transport;

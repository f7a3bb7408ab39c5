// src/user/mod.rs
//! End users: inbox, diagnostics and circuit-building sends.

pub mod node;

pub use node::{UserNode, UserProcess, UserState};

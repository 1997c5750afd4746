//! CLI command implementations

mod client;
mod rotate;
mod server;

pub use client::client_command;
pub use rotate::{rotate_command, rotate_url};
pub use server::server_command;

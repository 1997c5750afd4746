//! Control service
//!
//! A plain-HTTP endpoint for driving the testbed. `/next` rotates the TLS
//! echo service to the next pin generation and answers only after the new
//! configuration is live. Any other path gets a fixed greeting naming it.

mod server;

pub use server::{create_router, serve, ControlState};

//! tack-testbed: Command-line interface for the TACK rotation testbed
//!
//! Provides the `tack-testbed` binary: run the server, probe a running
//! server's handshake, and trigger pin rotations.

pub mod commands;
pub mod output;

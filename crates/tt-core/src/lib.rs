//! tt-core: Core abstractions and configuration for the TACK testbed
//!
//! This crate provides the configuration structures, the error taxonomy and
//! the pin state generator shared by the server and the CLI.

pub mod config;
pub mod error;
pub mod pin;
pub mod time;

pub use error::{ConfigError, PinError};
pub use pin::{AssertionBuilder, PinRecord, PinState, UnsignedTackBuilder};

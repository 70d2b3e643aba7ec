//! Tracing subscriber setup shared by Uppe binaries.
//!
//! `RUST_LOG` filters events (default `info`), `RUST_LOG_FORMAT=json`
//! switches from the compact human format to one JSON object per line.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, init_tracing_with_level, try_init_tracing};

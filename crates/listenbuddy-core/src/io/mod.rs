//! I/O primitives for the relay engine.
//!
//! This module provides the one-directional copy used by each half of a
//! relay pair, and the sink abstraction it writes through.

mod copy;

pub use copy::{ChunkSink, CopyError, StreamSink, copy_direction, is_closed_conn_error};

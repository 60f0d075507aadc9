//! Sluice - Assembler
//!
//! Reassembly of messages that arrive split across several datagrams.
//!
//! # Overview
//!
//! - [`ChunkAssembler`]: collects chunks per message id, returns the
//!   payload once complete, evicts stale partial messages after a TTL
//! - [`gelf`]: parses the GELF chunk header so a raw datagram can be fed
//!   to the assembler
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use sluice_assembler::ChunkAssembler;
//! use sluice_config::AssemblerConfig;
//!
//! let assembler = ChunkAssembler::new(AssemblerConfig::default());
//! assert!(assembler.on_chunk(b"id", 1, 2, Bytes::from_static(b"world")).unwrap().is_none());
//! let payload = assembler.on_chunk(b"id", 0, 2, Bytes::from_static(b"hello ")).unwrap();
//! assert_eq!(payload.as_deref(), Some(&b"hello world"[..]));
//! ```

mod assembler;
mod error;
pub mod gelf;

pub use assembler::{AssemblerMetricsHandle, ChunkAssembler};
pub use error::ChunkError;
pub use gelf::{Datagram, GelfChunk, parse_datagram};

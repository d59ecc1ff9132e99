//! Shared interfaces of the apt exporter
//!
//! This crate holds the seams between the collection core and the rest of the exporter: the
//! [`GaugeSink`] capability that collected values are written into, the [`Plugin`] lifecycle that
//! the binary drives, and the error type used across crate boundaries.

pub mod error;
pub mod plugin;
pub mod sink;

pub use error::ExporterError;
pub use plugin::Plugin;
pub use sink::GaugeSink;
pub use sink::MemorySink;

#[doc(no_inline)]
pub use tokio_util::sync::CancellationToken;

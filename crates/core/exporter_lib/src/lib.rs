//! Helpers shared by the plugins and the binary of the apt exporter

pub mod config;
pub mod mainloop;

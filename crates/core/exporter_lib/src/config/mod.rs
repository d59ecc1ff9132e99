mod humantime;
pub use crate::config::humantime::Humantime;

mod listen_address;
pub use listen_address::ListenAddress;
pub use listen_address::ListenAddressError;

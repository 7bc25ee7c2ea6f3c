pub mod config;
pub mod dump;
pub mod error;
pub mod filter;
pub mod store;

pub use config::*;
pub use dump::*;
pub use error::{Error, Result};
pub use filter::*;
pub use store::*;

// Selective save/restore of iptables chains

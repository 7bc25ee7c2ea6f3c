pub mod diff;
pub mod manager;
pub mod tool;

pub use diff::*;
pub use manager::*;
pub use tool::*;

// iptables-save / iptables-restore driver

pub mod checkpoint;
pub mod network;

pub use checkpoint::*;
pub use network::*;

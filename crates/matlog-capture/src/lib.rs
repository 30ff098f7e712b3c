pub mod flow;
pub mod gateway;

pub use flow::*;
pub use gateway::*;

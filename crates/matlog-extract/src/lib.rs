pub mod engine;
pub mod gap;
pub mod lexicon;
pub mod sentence;

pub use engine::*;
pub use gap::*;
pub use lexicon::*;
pub use sentence::*;

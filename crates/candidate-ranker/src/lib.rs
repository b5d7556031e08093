pub mod filter;
pub mod ranker;
pub mod scoring;

pub use filter::*;
pub use ranker::*;
pub use scoring::*;

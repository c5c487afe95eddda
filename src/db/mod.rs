pub mod analysis;
pub mod filter;
pub mod pool;
pub mod records;
pub mod tags;

pub use analysis::*;
pub use filter::*;
pub use pool::*;
pub use records::*;
pub use tags::*;

pub mod browse;
pub mod clear_cache;
pub mod status;

pub use browse::*;
pub use clear_cache::*;
pub use status::*;

pub mod creator;
pub mod layout;
pub mod replicator;

pub use creator::*;
pub use layout::*;
pub use replicator::*;

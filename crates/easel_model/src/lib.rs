pub mod bean;
pub mod component;
pub mod events;
pub mod history;
pub mod id;
pub mod model;
pub mod naming;
pub mod property;
pub mod resources;
pub mod value;

pub use bean::*;
pub use component::*;
pub use events::*;
pub use history::*;
pub use id::*;
pub use model::*;
pub use naming::*;
pub use property::*;
pub use resources::*;
pub use value::*;

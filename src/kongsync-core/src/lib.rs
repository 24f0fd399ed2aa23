pub mod builder;
pub mod models;
pub mod resolver;

pub use builder::*;
pub use models::*;
pub use resolver::*;

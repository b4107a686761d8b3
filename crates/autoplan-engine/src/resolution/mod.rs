pub mod cascade;
pub mod result;
pub mod strategy;
pub mod validate;

pub use cascade::ElementResolver;
pub use result::{Resolved, ResolutionError};
pub use strategy::Strategy;
pub use validate::Purpose;

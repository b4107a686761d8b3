pub mod error;
pub mod failure;
pub mod formatter;
pub mod normalizer;
pub mod plan;
pub mod report;

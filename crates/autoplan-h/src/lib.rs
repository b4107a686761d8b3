//! Chromium driver for the plan engine, speaking CDP through chromiumoxide.

pub mod backend;
pub mod cdp;
pub mod inject;

pub use backend::{ChromiumDriver, ChromiumSession};

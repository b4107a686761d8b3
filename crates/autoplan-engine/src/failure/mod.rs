pub mod classifier;
pub mod patterns;
pub mod remediation;

pub use classifier::{classify, record, record_message};
pub use patterns::{FailurePatterns, analyze_failure_patterns};
pub use remediation::remediation_for;

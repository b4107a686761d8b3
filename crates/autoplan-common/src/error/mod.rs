pub mod backend_error;
pub mod plan_error;

pub use backend_error::BackendError;
pub use plan_error::PlanError;

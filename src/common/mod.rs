pub mod constants;
pub mod context;
pub mod logging;

pub use context::QueryContext;

pub mod engine;
pub mod executor;
pub mod loader;
pub mod request;
pub mod rule;

pub use engine::{Decision, MemoryLogger, RewriteEngine, RewriteLogger, TracingLogger};
pub use loader::RewriteOptions;
pub use request::RequestDescriptor;
pub use rule::{RedirectStatus, RuleParseError, RuleSet};

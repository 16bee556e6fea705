//! Impact mapping: which modules, tests and repositories a change touches.

pub mod mapper;
pub mod rules;
pub mod test_index;

pub use mapper::DependencyMapper;
pub use rules::{ModuleClassifier, ModuleRule, Visibility, VisibilityPolicy};
pub use test_index::{StaticTestIndex, TestIndex};

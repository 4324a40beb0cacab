pub mod classifier;
pub mod matcher;
pub mod store;

pub use classifier::{Classifier, Decision, Route};
pub use matcher::{build_rule_set, matches, RuleSet};
pub use store::{Category, RuleSnapshot, RuleStore};

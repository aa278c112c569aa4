//! Decision advisors: turn a [`common::MarketSnapshot`] into a categorical
//! trading decision with a free-text rationale.

pub mod deepseek;
pub mod parse;
pub mod prompt;

pub use deepseek::{DeepSeekAdvisor, DeepSeekSettings};
pub use parse::parse_decision;
pub use prompt::build_prompt;

pub mod capability;
pub mod config;
pub mod error;
pub mod progress;
pub mod types;

pub use capability::{DecisionAdvisor, MarketDataSource, Notifier, ResultSink, WorkflowObserver};
pub use config::{Config, EmailConfig, NtfyConfig, TelegramConfig, WeComConfig};
pub use error::{truncate_payload, Error, Result};
pub use progress::{ProgressEvent, Stage, StageStatus};
pub use types::*;

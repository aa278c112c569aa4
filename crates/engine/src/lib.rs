pub mod dispatch;
pub mod fanout;
pub mod feed;
pub mod lifecycle;
pub mod message;
pub mod observer;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod watchlist;

#[cfg(test)]
mod testing;

pub use dispatch::{dispatch_isolated, DispatchReport};
pub use fanout::NotificationFanout;
pub use feed::{chain_from_config, SourceChain};
pub use lifecycle::BotController;
pub use observer::{BroadcastObserver, NullObserver};
pub use pipeline::{PipelineSettings, WorkflowOutcome, WorkflowPipeline};
pub use scheduler::Scheduler;
pub use store::{DecisionRow, SqliteSink};
pub use watchlist::{JobGrouping, ScheduleConfig, Watchlist};

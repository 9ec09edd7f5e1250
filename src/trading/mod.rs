pub mod creator_monitor;
pub mod directory;
pub mod executor;
pub mod hopfun;
pub mod launch_monitor;
pub mod watchlist;

pub use creator_monitor::{CreatorMonitorConfig, CreatorSellMonitor};
pub use directory::TokenDirectory;
pub use executor::{Executor, HopTargets};
pub use launch_monitor::{LaunchMonitor, LaunchMonitorConfig};
pub use watchlist::{JsonFileStorage, WatchList};

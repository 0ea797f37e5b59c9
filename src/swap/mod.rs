//! Swap records and the swap registry

pub mod db;
pub mod info;
pub mod manager;
pub mod record;

pub use db::{JsonFileDb, SwapDb};
pub use info::{status_channel, Info, InfoSnapshot, StatusNotifier, StatusObserver};
pub use manager::{Manager, SwapManager};
pub use record::SwapRecord;

//! queuewatch-core - The watch engine
//!
//! Counts the open tasks in one section of a remote project and decides when
//! the count has crossed the alert threshold:
//! - `remote`: paginated counting client
//! - `edge`: rising-edge detector and cooldown gate
//! - `state` / `config`: the small files the engine reads and writes
//! - `watcher`: one complete check, runnable by the scheduler
//! - `notify`: the contract alert channels implement

pub mod config;
pub mod edge;
pub mod error;
pub mod logging;
pub mod notify;
pub mod paths;
pub mod remote;
pub mod state;
pub mod watcher;

pub use config::WatchConfig;
pub use edge::{Decision, evaluate};
pub use error::{RemoteApiError, WatchError};
pub use notify::{Dispatcher, Notification};
pub use paths::AppPaths;
pub use remote::{AsanaClient, TaskSource};
pub use state::{StateStore, WatchState};
pub use watcher::{CheckReport, WatchBackend, Watcher};

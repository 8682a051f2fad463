//! Notification channels for queuewatch
//!
//! This crate provides the alert delivery side of the watcher: a fallback
//! chain ([`Notifier`]) over a desktop notifier command and a log channel.

pub mod channel;
pub mod log;
pub mod notifier;
pub mod toast;

pub use channel::{ChannelError, NotifyChannel};
pub use log::LogChannel;
pub use notifier::Notifier;
pub use toast::{Candidate, ToastChannel, ToastFlavor, ToastResolver};

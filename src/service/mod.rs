//! 监听服务生命周期

pub mod foreground;

pub use foreground::{ForegroundController, ForegroundState};

//! 监听服务的前台提升

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigStore, PromoteConfig};

pub trait ForegroundController: Send + Sync {
    /// 提升为前台服务，被拒绝时返回 `false`
    /// 这里不检查 `config` 的 `foreground` 标志
    fn promote(&self, config: &PromoteConfig) -> bool;

    /// 退回后台服务
    fn demote(&self) -> bool;

    fn is_running(&self) -> bool;

    /// 采集 worker 启动和停止时调用
    fn set_running(&self, running: bool);
}

/// 进程内控制器，持久化提升设置
pub struct ForegroundState {
    config: Arc<dyn ConfigStore>,
    running: AtomicBool,
    promoted: AtomicBool,
}

impl ForegroundState {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            promoted: AtomicBool::new(false),
        }
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted.load(Ordering::SeqCst)
    }
}

impl ForegroundController for ForegroundState {
    fn promote(&self, config: &PromoteConfig) -> bool {
        if !self.is_running() {
            warn!("Promotion refused: listener service not running");
            return false;
        }
        if let Err(e) = self.config.save_promote_config(config) {
            warn!(error = %e, "Failed to persist promotion settings");
            return false;
        }

        self.promoted.store(true, Ordering::SeqCst);
        info!(title = ?config.title, "Listener promoted to foreground");
        true
    }

    fn demote(&self) -> bool {
        if self.promoted.swap(false, Ordering::SeqCst) {
            info!("Listener demoted to background");
        }
        true
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if !running {
            self.promoted.store(false, Ordering::SeqCst);
        }
    }
}

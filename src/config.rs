//! 持久化配置 - 消费端注册的回调句柄和前台提升设置
//!
//! 管道只通过 `ConfigStore` 读取句柄，不关心它们存在哪里。
//!
//! 默认位置：`~/.config/notification-relay/config.json`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// 把监听服务提升为前台服务时使用的设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteConfig {
    #[serde(default)]
    pub foreground: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sub_title: Option<String>,
    #[serde(default)]
    pub show_when: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// 消费端路由 `sink_event` 推送的句柄，0 表示未设置
    pub callback_handle: i64,
    /// 路由 `sink_media_event` 推送的句柄，0 表示未设置
    pub media_callback_handle: i64,
    /// 消费端运行时启动用的入口
    pub dispatcher_handle: i64,
    pub media_dispatcher_handle: i64,
    pub promote: Option<PromoteConfig>,
}

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<RelayConfig>;

    /// 在存储自身的同步下读-改-写
    fn update(&self, apply: &mut dyn FnMut(&mut RelayConfig)) -> Result<()>;

    fn register_event_handles(&self, callback: i64, media_callback: i64) -> Result<()> {
        self.update(&mut |config| {
            config.callback_handle = callback;
            config.media_callback_handle = media_callback;
        })
    }

    fn register_dispatchers(&self, dispatcher: i64, media_dispatcher: i64) -> Result<()> {
        self.update(&mut |config| {
            config.dispatcher_handle = dispatcher;
            config.media_dispatcher_handle = media_dispatcher;
        })
    }

    fn save_promote_config(&self, promote: &PromoteConfig) -> Result<()> {
        self.update(&mut |config| config.promote = Some(promote.clone()))
    }
}

/// JSON 文件存储，写入时用 `fs2` 加锁
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notification-relay")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RelayConfig> {
        if !self.path.exists() {
            return Ok(RelayConfig::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(RelayConfig::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", self.path.display()))
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<RelayConfig> {
        self.read()
    }

    fn update(&self, apply: &mut dyn FnMut(&mut RelayConfig)) -> Result<()> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // 单独的锁文件：数据文件本身会被 rename 替换
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.path.with_extension("lock"))
            .context("Failed to open config lock file")?;
        lock.lock_exclusive()?;

        let result = (|| -> Result<()> {
            let mut config = self.read()?;
            apply(&mut config);

            let temp_path = self.path.with_extension("tmp");
            fs::write(&temp_path, serde_json::to_string_pretty(&config)?)
                .context("Failed to write config")?;
            fs::rename(&temp_path, &self.path).context("Failed to replace config")?;
            Ok(())
        })();

        lock.unlock()?;
        result
    }
}

/// 进程内存储
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<RelayConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn with_handles(callback: i64, media_callback: i64) -> Self {
        Self::new(RelayConfig {
            callback_handle: callback,
            media_callback_handle: media_callback,
            ..Default::default()
        })
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<RelayConfig> {
        Ok(self.config.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut RelayConfig)) -> Result<()> {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut *config);
        Ok(())
    }
}

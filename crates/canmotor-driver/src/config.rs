//! 驱动配置
//!
//! 握手轮询、批量操作间隔与接收超时等时序参数，可从 TOML 加载：
//!
//! ```toml
//! poll_attempts = 10
//! poll_interval_ms = 10
//! connect_retries = 3
//! connect_interval_ms = 100
//! write_interval_ms = 5
//! receive_timeout_ms = 2
//! ```

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 驱动时序配置
///
/// 缺省字段使用默认值，未知字段报错。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// 握手轮询次数
    pub poll_attempts: u32,
    /// 握手轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// `connect_all` 中每个端点的额外重试次数
    pub connect_retries: u32,
    /// `connect_all` 两次连接之间的停顿（毫秒）
    pub connect_interval_ms: u64,
    /// `write_all` 每次写入后的停顿（毫秒）
    pub write_interval_ms: u64,
    /// 接收线程的读超时（毫秒）
    pub receive_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 10,
            poll_interval_ms: 10,
            connect_retries: 3,
            connect_interval_ms: 100,
            write_interval_ms: 5,
            receive_timeout_ms: 2,
        }
    }
}

impl DriverConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.poll_attempts == 0 {
            return Err(DriverError::Config(
                "poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.receive_timeout_ms == 0 {
            return Err(DriverError::Config(
                "receive_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_interval(&self) -> Duration {
        Duration::from_millis(self.connect_interval_ms)
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

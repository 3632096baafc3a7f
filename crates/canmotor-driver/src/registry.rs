//! 端点注册表
//!
//! 显式的注册表对象（无全局状态），按注册顺序保存端点的非拥有引用，
//! 用于在共享总线上批量握手、批量下发控制帧和分发入站帧。
//!
//! 批量操作先在锁内取快照再逐个处理，遍历期间并发的 add/remove
//! 不会影响本次遍历，也不会长时间持锁阻塞注册。

use crate::config::DriverConfig;
use crate::delay::{Delay, SpinDelay};
use crate::endpoint::{InboundStatus, MotorEndpoint};
use canmotor_can::MotorFrame;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 端点注册表
///
/// 注册表不拥有端点：端点被释放后其条目自动失效，并在下一次修改时清理。
pub struct EndpointRegistry {
    endpoints: Mutex<Vec<Weak<MotorEndpoint>>>,
    delay: Arc<dyn Delay>,
    connect_retries: u32,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(Vec::new()),
            delay: Arc::new(SpinDelay),
            connect_retries: DriverConfig::default().connect_retries,
        }
    }

    /// 按驱动配置创建（读取 `connect_retries`）
    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new().with_connect_retries(config.connect_retries)
    }

    /// 替换批量操作之间的延时实现
    pub fn with_delay<D>(mut self, delay: D) -> Self
    where
        D: Delay + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = retries;
        self
    }

    pub fn connect_retries(&self) -> u32 {
        self.connect_retries
    }

    /// 注册端点（追加到末尾）
    pub fn add(&self, endpoint: &Arc<MotorEndpoint>) {
        let mut endpoints = self.endpoints.lock();
        endpoints.retain(|weak| weak.strong_count() > 0);
        endpoints.push(Arc::downgrade(endpoint));
        debug!("Registered motor 0x{:X} ({} total)", endpoint.id(), endpoints.len());
    }

    /// 注销端点（按指针比较，最多移除一个条目）
    ///
    /// 返回是否找到并移除。
    pub fn remove(&self, endpoint: &Arc<MotorEndpoint>) -> bool {
        let mut endpoints = self.endpoints.lock();
        let target = Arc::as_ptr(endpoint);
        let removed = match endpoints.iter().position(|weak| weak.as_ptr() == target) {
            Some(index) => {
                endpoints.remove(index);
                true
            },
            None => false,
        };
        endpoints.retain(|weak| weak.strong_count() > 0);
        removed
    }

    /// 存活的端点数量
    pub fn len(&self) -> usize {
        self.endpoints
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 锁内获取存活端点的快照（注册顺序）
    pub fn snapshot(&self) -> Vec<Arc<MotorEndpoint>> {
        self.endpoints.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// 对所有端点执行握手
    ///
    /// 每个端点最多尝试 `1 + connect_retries` 次，失败后停顿 `interval` 再重试；
    /// 每个端点处理完后停顿 `interval`。编码错误不重试。
    ///
    /// 返回最终仍未连接的端点数量。
    pub fn connect_all(&self, interval: Duration) -> usize {
        let endpoints = self.snapshot();
        let mut misses = 0;

        for endpoint in &endpoints {
            let mut retries = 0;
            loop {
                match endpoint.connect() {
                    Ok(()) => break,
                    Err(e) if e.is_recoverable() && retries < self.connect_retries => {
                        retries += 1;
                        debug!(
                            "Retrying connect to 0x{:X} ({}/{}): {}",
                            endpoint.id(),
                            retries,
                            self.connect_retries,
                            e
                        );
                        self.delay.delay(interval);
                    },
                    Err(e) => {
                        warn!("Motor 0x{:X} failed to connect: {}", endpoint.id(), e);
                        misses += 1;
                        break;
                    },
                }
            }
            self.delay.delay(interval);
        }

        info!(
            "connect_all: {}/{} motors connected",
            endpoints.len() - misses,
            endpoints.len()
        );
        misses
    }

    /// 向所有端点下发控制帧
    ///
    /// 按注册顺序逐个 `write()`，每次调用后停顿 `interval`（让出总线）。
    /// 单个端点失败不影响后续端点。
    ///
    /// 返回失败次数。
    pub fn write_all(&self, interval: Duration) -> usize {
        let endpoints = self.snapshot();
        let mut misses = 0;

        for endpoint in &endpoints {
            if let Err(e) = endpoint.write() {
                warn!("Write to motor 0x{:X} failed: {}", endpoint.id(), e);
                misses += 1;
            }
            self.delay.delay(interval);
        }

        if misses > 0 {
            info!("write_all: {} of {} writes failed", misses, endpoints.len());
        }
        misses
    }

    /// 按应答 ID 查找端点
    pub fn find_by_ack_id(&self, ack_id: u32) -> Option<Arc<MotorEndpoint>> {
        self.endpoints
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|endpoint| endpoint.ack_id() == ack_id)
    }

    /// 把入站帧交给对应端点处理
    ///
    /// 没有端点匹配该应答 ID 时返回 `None`。重新初始化请求会在当前线程上
    /// 同步执行握手。
    pub fn dispatch(&self, frame: &MotorFrame) -> Option<InboundStatus> {
        let endpoint = self.find_by_ack_id(frame.id)?;
        Some(endpoint.handle_frame(frame))
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("len", &self.len())
            .field("connect_retries", &self.connect_retries)
            .finish_non_exhaustive()
    }
}

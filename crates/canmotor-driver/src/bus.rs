//! 共享总线句柄
//!
//! 同一条 CAN 总线上的所有电机端点与接收线程共享一个适配器。
//! 锁只在单次 send/receive 调用期间持有。

use canmotor_can::{CanAdapter, CanError, MotorFrame};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 可克隆的共享总线句柄
#[derive(Clone)]
pub struct CanBus {
    adapter: Arc<Mutex<Box<dyn CanAdapter + Send>>>,
}

impl CanBus {
    pub fn new<A>(adapter: A) -> Self
    where
        A: CanAdapter + Send + 'static,
    {
        Self {
            adapter: Arc::new(Mutex::new(Box::new(adapter))),
        }
    }

    /// 发送一帧
    pub fn send(&self, frame: MotorFrame) -> Result<(), CanError> {
        self.adapter.lock().send(frame)
    }

    /// 带超时接收一帧
    ///
    /// 持锁期间其他端点无法发送，超时应保持在毫秒级。
    pub fn receive_timeout(&self, timeout: Duration) -> Result<MotorFrame, CanError> {
        self.adapter.lock().receive_timeout(timeout)
    }

    pub fn set_bit_rate(&self, hz: u32) -> Result<(), CanError> {
        self.adapter.lock().set_bit_rate(hz)
    }

    pub fn bit_rate(&self) -> u32 {
        self.adapter.lock().bit_rate()
    }
}

impl fmt::Debug for CanBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanBus")
            .field("handles", &Arc::strong_count(&self.adapter))
            .finish()
    }
}

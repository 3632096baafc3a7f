//! # CAN Motor Adapter Layer
//!
//! CAN 硬件抽象层：电机端点只依赖 [`CanAdapter`] 能力（发送、接收、波特率），
//! 具体后端（SocketCAN、测试用 Mock）在此实现。

use std::time::Duration;
use thiserror::Error;

// 重新导出 canmotor-protocol 中的 MotorFrame
pub use canmotor_protocol::MotorFrame;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::SocketCanAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCanAdapter, MockCanHandle};

/// 默认 CAN 波特率（1Mbps）
pub const DEFAULT_BIT_RATE: u32 = 1_000_000;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::AccessDenied | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// CAN 传输能力
///
/// 电机端点通过此 trait 访问总线，不关心底层是 SocketCAN 还是测试替身。
pub trait CanAdapter {
    /// 发送一帧（Fire-and-Forget）
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError>;

    /// 接收一帧，超时返回 `CanError::Timeout`
    fn receive(&mut self) -> Result<MotorFrame, CanError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    fn try_receive(&mut self) -> Result<Option<MotorFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 设置总线波特率（Hz）
    fn set_bit_rate(&mut self, hz: u32) -> Result<(), CanError>;

    /// 当前总线波特率（Hz）
    fn bit_rate(&self) -> u32;
}

impl<T: CanAdapter + ?Sized> CanAdapter for Box<T> {
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        (**self).receive()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        (**self).set_receive_timeout(timeout)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        (**self).receive_timeout(timeout)
    }

    fn try_receive(&mut self) -> Result<Option<MotorFrame>, CanError> {
        (**self).try_receive()
    }

    fn set_bit_rate(&mut self, hz: u32) -> Result<(), CanError> {
        (**self).set_bit_rate(hz)
    }

    fn bit_rate(&self) -> u32 {
        (**self).bit_rate()
    }
}

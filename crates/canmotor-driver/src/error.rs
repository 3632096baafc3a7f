//! 驱动层错误类型定义

use canmotor_can::CanError;
use canmotor_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议编码错误（字段宽度设计缺陷，不应重试）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 握手超时：轮询窗口内未收到应答
    #[error("No acknowledgement from 0x{id:X} after {attempts} polls")]
    HandshakeTimeout { id: u32, attempts: u32 },

    /// 发送失败
    #[error("Failed to send frame to 0x{id:X}: {source}")]
    TransportFailure {
        id: u32,
        #[source]
        source: CanError,
    },

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 配置文件读取错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 接收线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否值得重试
    ///
    /// 握手超时和发送失败是运行时条件；协议编码错误和配置错误是编程缺陷。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DriverError::HandshakeTimeout { .. } | DriverError::TransportFailure { .. }
        )
    }
}

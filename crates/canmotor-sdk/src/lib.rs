//! CAN Motor SDK
//!
//! 通过共享 CAN 总线驱动多个电机控制器。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 位域编码、控制帧与初始化帧、电机配置
//! - **CAN 层** (`can`): CAN 硬件抽象，支持 SocketCAN 与 Mock
//! - **驱动层** (`driver`): 端点握手、注册表批量操作、入站分发线程
//!
//! # 快速开始
//!
//! ```rust
//! use canmotor_sdk::prelude::*;
//! ```

pub use canmotor_can as can;
pub use canmotor_driver as driver;
pub use canmotor_protocol as protocol;

pub mod prelude;

// CAN 层常用类型
pub use can::{CanAdapter, CanError, MotorFrame};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use can::SocketCanAdapter;

#[cfg(feature = "mock")]
pub use can::{MockCanAdapter, MockCanHandle};

// 协议层
pub use protocol::{DecayMode, MotorConfig, MotorState, ProtocolError, RampLevel};

// 驱动层
pub use driver::{
    CanBus, Delay, DispatchHandle, DriverConfig, DriverError, EndpointRegistry, HandshakeState,
    InboundStatus, Motor, MotorEndpoint, spawn_dispatch_loop,
};

#[doc(hidden)]
pub mod __private {
    pub use tracing_log;
    pub use tracing_subscriber;
}

/// 默认日志级别
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// 初始化日志
///
/// 优先使用 `RUST_LOG` 环境变量，否则使用传入的默认指令。
/// 同时把 `log` crate 的记录桥接到 `tracing`。重复调用是安全的。
pub fn init_logging(default_directive: &str) {
    use __private::tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = __private::tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
    // tracing-subscriber 开启 tracing-log 时已经安装了桥接，这里的失败可以忽略
    let _ = __private::tracing_log::LogTracer::init();
}

/// 初始化日志的便捷宏
///
/// ```rust
/// canmotor_sdk::init_logger!();
/// canmotor_sdk::init_logger!("canmotor_driver=debug");
/// ```
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logging($crate::DEFAULT_LOG_DIRECTIVE)
    };
    ($directive:expr) => {
        $crate::init_logging($directive)
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logger_is_idempotent() {
        crate::init_logger!();
        crate::init_logger!("canmotor_driver=debug");
        tracing::info!("logger initialized");
    }
}

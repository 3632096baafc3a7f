//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use canmotor_sdk::prelude::*;
//! ```

// 协议层
pub use crate::protocol::{DecayMode, MotorConfig, MotorState, RampLevel};

// CAN 层（常用 Trait）
pub use crate::can::{CanAdapter, MotorFrame};

// 驱动层
pub use crate::driver::{
    CanBus, DriverConfig, EndpointRegistry, InboundStatus, Motor, MotorEndpoint,
    spawn_dispatch_loop,
};

// 错误类型
pub use crate::can::CanError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;

//! # CAN Motor Driver Layer
//!
//! 驱动层：把 [`MotorConfig`](canmotor_protocol::MotorConfig) 变成总线上的帧，
//! 并管理每个驱动器的连接握手。
//!
//! ## 组成
//!
//! - [`CanBus`]: 多个端点共享的总线句柄
//! - [`MotorEndpoint`]: 单个驱动器（握手、控制帧下发、入站处理）
//! - [`EndpointRegistry`]: 批量握手 / 批量写入 / 入站分发
//! - [`spawn_dispatch_loop`]: 后台接收线程
//! - [`DriverConfig`]: 时序参数（可从 TOML 加载）
//!
//! ## 示例
//!
//! ```no_run
//! # #[cfg(target_os = "linux")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use canmotor_can::SocketCanAdapter;
//! use canmotor_driver::{CanBus, DriverConfig, EndpointRegistry, MotorEndpoint, spawn_dispatch_loop};
//! use canmotor_protocol::MotorState;
//! use std::sync::Arc;
//!
//! let config = DriverConfig::default();
//! let bus = CanBus::new(SocketCanAdapter::new("can0")?);
//! let registry = Arc::new(EndpointRegistry::from_config(&config));
//!
//! let left = Arc::new(MotorEndpoint::from_dip(0, 0, bus.clone()));
//! let right = Arc::new(MotorEndpoint::from_dip(0, 1, bus.clone()));
//! registry.add(&left);
//! registry.add(&right);
//!
//! let _dispatch = spawn_dispatch_loop(bus, registry.clone(), &config)?;
//! registry.connect_all(config.connect_interval());
//!
//! left.configure(|c| {
//!     c.set_duty_cycle(0.3);
//!     c.set_state(MotorState::Cw);
//! });
//! registry.write_all(config.write_interval());
//! # Ok(())
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```

pub mod bus;
pub mod config;
pub mod delay;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod motor;
pub mod registry;

pub use bus::CanBus;
pub use config::DriverConfig;
pub use delay::{Delay, SpinDelay};
pub use dispatch::{DispatchHandle, spawn_dispatch_loop};
pub use endpoint::{EndpointBuilder, HandshakeState, InboundStatus, MotorEndpoint};
pub use error::DriverError;
pub use motor::Motor;
pub use registry::EndpointRegistry;

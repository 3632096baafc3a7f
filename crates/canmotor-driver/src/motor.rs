//! 电机能力抽象
//!
//! 上层代码只依赖 [`Motor`]：读写配置并把控制帧下发到总线。
//! [`MotorEndpoint`](crate::MotorEndpoint) 是 CAN 实现，测试中可以用任意替身。

use crate::error::DriverError;
use canmotor_protocol::{MotorConfig, MotorState};

/// "任意电机"的能力集合
///
/// trait 保持 object-safe，可以用 `&dyn Motor` / `Arc<dyn Motor>` 持有。
pub trait Motor: Send + Sync {
    /// 在锁内修改配置
    fn update_config(&self, update: &mut dyn FnMut(&mut MotorConfig));

    /// 当前配置快照
    fn config(&self) -> MotorConfig;

    /// 按当前配置构建控制帧并发送
    fn write(&self) -> Result<(), DriverError>;

    /// 泛型版本的 [`Motor::update_config`]
    fn configure<F>(&self, update: F)
    where
        F: FnOnce(&mut MotorConfig),
        Self: Sized,
    {
        let mut update = Some(update);
        self.update_config(&mut |config| {
            if let Some(update) = update.take() {
                update(config);
            }
        });
    }

    /// 设置占空比与转向并立即下发
    ///
    /// 越界的占空比按配置规则被忽略，转向仍然生效。
    fn drive(&self, duty_cycle: f32, state: MotorState) -> Result<(), DriverError> {
        self.update_config(&mut |config| {
            config.set_duty_cycle(duty_cycle);
            config.set_state(state);
        });
        self.write()
    }

    /// 刹车（保持当前占空比）
    fn brake(&self) -> Result<(), DriverError> {
        self.update_config(&mut |config| config.set_state(MotorState::Brake));
        self.write()
    }

    /// 自由停止
    fn coast(&self) -> Result<(), DriverError> {
        self.update_config(&mut |config| config.set_state(MotorState::Free));
        self.write()
    }
}

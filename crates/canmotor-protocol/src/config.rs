//! 电机逻辑配置
//!
//! `MotorConfig` 保存一个电机的全部逻辑设置。所有 setter 都是"静默钳制"语义：
//! 越界或非法的值会被直接忽略，保留之前的有效值，从不返回错误，也不会部分生效。
//!
//! 枚举的声明顺序（判别值）就是线上编码，不能重新排序。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 默认 PWM 周期（秒），即 50kHz
pub const DEFAULT_PULSE_PERIOD: f32 = 0.000_02;

/// 默认 PWM 频率（Hz）
pub const DEFAULT_FREQUENCY: f32 = 1.0 / DEFAULT_PULSE_PERIOD;

/// PWM 周期上限（秒）
pub const MAX_PULSE_PERIOD: f32 = 60_000.0;

/// 默认释放时间（毫秒）
pub const DEFAULT_RELEASE_TIME_MS: f32 = 100.0;

/// 电机旋转状态（2 位线上编码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MotorState {
    /// 自由（断开驱动）
    Free = 0,
    /// 顺时针
    Cw = 1,
    /// 逆时针
    Ccw = 2,
    /// 制动（默认）
    Brake = 3,
}

impl Default for MotorState {
    fn default() -> Self {
        MotorState::Brake
    }
}

/// 占空比变化斜率等级（3 位线上编码）
///
/// 判别值与驱动器固件的等级表一致，并非连续序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RampLevel {
    /// 不限制变化率（默认）
    Off = 0,
    Low = 2,
    Middle = 4,
    High = 6,
    Max = 7,
}

impl Default for RampLevel {
    fn default() -> Self {
        RampLevel::Off
    }
}

/// 电流衰减模式（2 位线上编码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DecayMode {
    /// 慢衰减（默认）
    SlowDecay = 0,
    /// 混合衰减
    MixedDecay = 1,
    /// 快衰减
    FastDecay = 2,
}

impl Default for DecayMode {
    fn default() -> Self {
        DecayMode::SlowDecay
    }
}

/// 电机逻辑配置
///
/// # 示例
///
/// ```rust
/// use canmotor_protocol::{MotorConfig, MotorState};
///
/// let mut config = MotorConfig::default();
/// config.set_duty_cycle(0.5);
/// config.set_state(MotorState::Cw);
///
/// // 越界写入被忽略
/// config.set_duty_cycle(1.5);
/// assert_eq!(config.duty_cycle(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    duty_cycle: f32,
    state: MotorState,
    rise_level: RampLevel,
    fall_level: RampLevel,
    pulse_period: f32,
    release_time_ms: f32,
    control: DecayMode,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            duty_cycle: 0.0,
            state: MotorState::default(),
            rise_level: RampLevel::default(),
            fall_level: RampLevel::default(),
            pulse_period: DEFAULT_PULSE_PERIOD,
            release_time_ms: DEFAULT_RELEASE_TIME_MS,
            control: DecayMode::default(),
        }
    }
}

impl MotorConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 恢复全部默认值
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 设置占空比，只接受 `[0.0, 1.0]`
    pub fn set_duty_cycle(&mut self, value: f32) {
        if (0.0..=1.0).contains(&value) {
            self.duty_cycle = value;
        }
    }

    pub fn duty_cycle(&self) -> f32 {
        self.duty_cycle
    }

    pub fn set_state(&mut self, state: MotorState) {
        self.state = state;
    }

    /// 以线上编码设置状态，非法编码被忽略
    pub fn set_state_raw(&mut self, raw: u8) {
        if let Ok(state) = MotorState::try_from(raw) {
            self.state = state;
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn set_rise_level(&mut self, level: RampLevel) {
        self.rise_level = level;
    }

    /// 以线上编码设置上升斜率，非法编码被忽略
    pub fn set_rise_level_raw(&mut self, raw: u8) {
        if let Ok(level) = RampLevel::try_from(raw) {
            self.rise_level = level;
        }
    }

    pub fn rise_level(&self) -> RampLevel {
        self.rise_level
    }

    pub fn set_fall_level(&mut self, level: RampLevel) {
        self.fall_level = level;
    }

    /// 以线上编码设置下降斜率，非法编码被忽略
    pub fn set_fall_level_raw(&mut self, raw: u8) {
        if let Ok(level) = RampLevel::try_from(raw) {
            self.fall_level = level;
        }
    }

    pub fn fall_level(&self) -> RampLevel {
        self.fall_level
    }

    /// 设置 PWM 周期（秒），只接受 `(0, 60000]`
    pub fn set_pulse_period(&mut self, seconds: f32) {
        if seconds > 0.0 && seconds <= MAX_PULSE_PERIOD {
            self.pulse_period = seconds;
        }
    }

    pub fn pulse_period(&self) -> f32 {
        self.pulse_period
    }

    /// 以频率（Hz）设置 PWM 周期，经过与 [`set_pulse_period`](Self::set_pulse_period) 相同的校验
    pub fn set_frequency(&mut self, hz: f32) {
        self.set_pulse_period(1.0 / hz);
    }

    pub fn frequency(&self) -> f32 {
        1.0 / self.pulse_period
    }

    /// 设置释放时间（毫秒）
    ///
    /// 不限范围，但 NaN 会被忽略：NaN 与默认值永远不相等，会让初始化帧无法判定是否省略。
    pub fn set_release_time_ms(&mut self, ms: f32) {
        if !ms.is_nan() {
            self.release_time_ms = ms;
        }
    }

    pub fn release_time_ms(&self) -> f32 {
        self.release_time_ms
    }

    pub fn set_control(&mut self, control: DecayMode) {
        self.control = control;
    }

    /// 以线上编码设置衰减模式，非法编码被忽略
    pub fn set_control_raw(&mut self, raw: u8) {
        if let Ok(control) = DecayMode::try_from(raw) {
            self.control = control;
        }
    }

    pub fn control(&self) -> DecayMode {
        self.control
    }

    /// 上升/下降斜率是否均为默认值
    pub fn has_default_ramp(&self) -> bool {
        self.rise_level == RampLevel::default() && self.fall_level == RampLevel::default()
    }

    pub fn has_default_control(&self) -> bool {
        self.control == DecayMode::default()
    }

    pub fn has_default_pulse_period(&self) -> bool {
        self.pulse_period == DEFAULT_PULSE_PERIOD
    }

    pub fn has_default_release_time(&self) -> bool {
        self.release_time_ms == DEFAULT_RELEASE_TIME_MS
    }
}

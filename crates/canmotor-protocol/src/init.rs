//! 初始化帧（最多 8 字节）
//!
//! 每次握手时构建一次。为了减小总线负载，只编码与默认值不同的设置。
//!
//! 帧以 2 位前缀 `0b10` 开头，随后按**固定顺序**出现可选块：
//!
//! | 顺序 | 条件 | 块头 | 内容 |
//! |---|---|---|---|
//! | 1 | rise/fall 非默认 | `0b10` (2 位) | rise (3 位) + fall (3 位) |
//! | 2 | control 非默认 | `0b10` (2 位) | control (2 位) |
//! | 3 | pulse_period 非默认 | `0b010` (3 位) | bfloat16 (16 位) |
//! | 4 | release_time_ms 非默认 | `0b110` (3 位) | bfloat16 (16 位) |
//!
//! 块头不是自描述的标签：驱动器固件按上述顺序解析，仅依靠位置区分后续块，
//! 所以块 1 与块 2 复用了同一个块头 `0b10`。增删或调整块的顺序都会破坏
//! 与固件的兼容性，修改前必须与固件实现核对。

use crate::bitfield::BitWriter;
use crate::config::MotorConfig;
use crate::ProtocolError;

/// 初始化帧长度（字节），未使用的位以 0 填充
pub const INIT_FRAME_LEN: usize = 8;

/// 初始化消息前缀
const INIT_PREFIX: (u64, usize) = (0b10, 2);

/// 斜率等级块
const RAMP_HEADER: (u64, usize) = (0b10, 2);
const RAMP_LEVEL_WIDTH: usize = 3;

/// 衰减模式块
const CONTROL_HEADER: (u64, usize) = (0b10, 2);
const CONTROL_WIDTH: usize = 2;

/// PWM 周期块
const PULSE_PERIOD_HEADER: (u64, usize) = (0b010, 3);

/// 释放时间块
const RELEASE_TIME_HEADER: (u64, usize) = (0b110, 3);

/// 编码后的初始化帧
///
/// `Default` 为尚未构建的空帧（0 位有效）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitFrame {
    data: [u8; INIT_FRAME_LEN],
    bits_used: usize,
}

impl InitFrame {
    /// 由配置构建初始化帧
    ///
    /// 缓冲区每次都从全零开始，同一配置的编码结果逐字节相同。
    ///
    /// # 错误
    /// - `ProtocolError::Overflow`: 可选块累计超过 64 位（字段宽度设计错误）
    ///
    /// # 示例
    ///
    /// ```rust
    /// use canmotor_protocol::{InitFrame, MotorConfig};
    ///
    /// let frame = InitFrame::encode(&MotorConfig::default()).unwrap();
    /// assert_eq!(frame.data(), &[0x80, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(frame.bits_used(), 2);
    /// ```
    pub fn encode(config: &MotorConfig) -> Result<Self, ProtocolError> {
        let mut writer = BitWriter::new();
        write_field(&mut writer, INIT_PREFIX)?;

        if !config.has_default_ramp() {
            write_field(&mut writer, RAMP_HEADER)?;
            writer.write_uint(u8::from(config.rise_level()) as u64, RAMP_LEVEL_WIDTH)?;
            writer.write_uint(u8::from(config.fall_level()) as u64, RAMP_LEVEL_WIDTH)?;
        }

        if !config.has_default_control() {
            write_field(&mut writer, CONTROL_HEADER)?;
            writer.write_uint(u8::from(config.control()) as u64, CONTROL_WIDTH)?;
        }

        if !config.has_default_pulse_period() {
            write_field(&mut writer, PULSE_PERIOD_HEADER)?;
            writer.write_bfloat16(config.pulse_period())?;
        }

        if !config.has_default_release_time() {
            write_field(&mut writer, RELEASE_TIME_HEADER)?;
            writer.write_bfloat16(config.release_time_ms())?;
        }

        Ok(Self {
            bits_used: writer.bits_used(),
            data: writer.into_inner(),
        })
    }

    /// 帧数据（8 字节，零填充）
    pub fn data(&self) -> &[u8; INIT_FRAME_LEN] {
        &self.data
    }

    /// 有效位数（含前缀）
    pub fn bits_used(&self) -> usize {
        self.bits_used
    }

    /// 容纳有效位所需的最少字节数
    pub fn bytes_used(&self) -> usize {
        self.bits_used.div_ceil(8)
    }
}

fn write_field(writer: &mut BitWriter, (value, width): (u64, usize)) -> Result<(), ProtocolError> {
    writer.write_uint(value, width)
}

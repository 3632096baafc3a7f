//! 控制帧（3 字节）
//!
//! 每次 `write()` 都会根据当前配置重建。布局（MSB 优先）：
//!
//! ```text
//! byte 0: [ R | D15 D14 D13 D12 D11 D10 D9 ]
//! byte 1: [ D8 D7 D6 D5 D4 D3 D2 D1 ]
//! byte 2: [ D0 | S1 S0 | r r r r r ]
//! ```
//!
//! - `D`: 占空比，`round(duty_cycle * 65536)`，饱和到 16 位
//! - `S`: 旋转状态序号（2 位）
//! - `R` / `r`: 保留位，本模块从不修改

use crate::bitfield::encode_uint;
use crate::config::MotorConfig;
use crate::ProtocolError;

/// 控制帧长度（字节）
pub const CONTROL_FRAME_LEN: usize = 3;

/// 占空比字段：起始位偏移 / 宽度
const DUTY_OFFSET: usize = 1;
const DUTY_WIDTH: usize = 16;

/// 状态字段：起始位偏移 / 宽度
const STATE_OFFSET: usize = 17;
const STATE_WIDTH: usize = 2;

/// 清除占空比和状态位时保留的掩码
const BYTE0_RESERVED_MASK: u8 = 0x80;
const BYTE2_RESERVED_MASK: u8 = 0x1F;

/// 占空比量化为 16 位无符号数
///
/// `1.0` 量化结果为 65536，超出 16 位，饱和为 65535。
pub fn duty_cycle_to_u16(duty_cycle: f32) -> u16 {
    (duty_cycle * 65536.0).round().clamp(0.0, u16::MAX as f32) as u16
}

/// 在已有的控制帧缓冲区上更新占空比与状态字段
///
/// 先清除占空比和状态所在的位，再写入新值；保留位保持原样。
pub fn update_control_frame(
    frame: &mut [u8; CONTROL_FRAME_LEN],
    config: &MotorConfig,
) -> Result<(), ProtocolError> {
    let mut scratch = [0u8; 8];
    scratch[0] = frame[0] & BYTE0_RESERVED_MASK;
    scratch[2] = frame[2] & BYTE2_RESERVED_MASK;

    let duty = duty_cycle_to_u16(config.duty_cycle());
    encode_uint(duty as u64, DUTY_WIDTH, &mut scratch, DUTY_OFFSET)?;

    let state: u8 = config.state().into();
    encode_uint(state as u64, STATE_WIDTH, &mut scratch, STATE_OFFSET)?;

    frame.copy_from_slice(&scratch[..CONTROL_FRAME_LEN]);
    Ok(())
}

/// 从全零缓冲区构建控制帧
pub fn encode_control_frame(config: &MotorConfig) -> Result<[u8; CONTROL_FRAME_LEN], ProtocolError> {
    let mut frame = [0u8; CONTROL_FRAME_LEN];
    update_control_frame(&mut frame, config)?;
    Ok(frame)
}

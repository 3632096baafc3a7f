//! # CAN Motor Protocol
//!
//! CAN 电机驱动器私有协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `bitfield`: MSB 优先的位流编码器
//! - `config`: 电机逻辑配置（占空比、状态、斜率等级等）
//! - `control`: 控制帧（3 字节）构建
//! - `init`: 初始化帧构建（仅包含非默认设置）
//! - `ids`: CAN ID 推导与协议常量
//!
//! ## 位序
//!
//! 协议按位打包，位偏移从第 0 字节的最高位开始计数（MSB 优先）。
//! 协议只定义编码方向：初始化帧的解析在远端驱动器固件中完成。

pub mod bitfield;
pub mod config;
pub mod control;
pub mod ids;
pub mod init;

// 重新导出常用类型
pub use bitfield::{BitWriter, FRAME_BITS, encode_bfloat16, encode_uint, to_bfloat16};
pub use config::*;
pub use control::{CONTROL_FRAME_LEN, encode_control_frame, update_control_frame};
pub use ids::*;
pub use init::{INIT_FRAME_LEN, InitFrame};

use thiserror::Error;

/// CAN 2.0 标准帧的统一抽象
///
/// 协议层与 CAN 适配层之间的中间类型：协议层只构建 `MotorFrame`，
/// 不依赖任何具体的 CAN 后端。
///
/// ```rust
/// use canmotor_protocol::MotorFrame;
///
/// let frame = MotorFrame::new_standard(0x300, &[0x12, 0x34, 0x60]);
///
/// assert_eq!(frame.id(), 0x300);
/// assert_eq!(frame.data_slice(), &[0x12, 0x34, 0x60]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,
}

impl MotorFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }
}

/// 协议编码错误类型
///
/// 两种错误都意味着字段宽度计算有误（编程/配置缺陷），调用方应直接向上传播，
/// 而不是重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Bit field overflow: offset {offset} + width {width} exceeds 64 bits")]
    Overflow { offset: usize, width: usize },

    #[error("Value {value:#x} does not fit in {width} bits")]
    ValueTooWide { value: u64, width: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_frame_new_standard() {
        let frame = MotorFrame::new_standard(0x312, &[0x01, 0x02]);
        assert_eq!(frame.id, 0x312);
        assert_eq!(frame.len, 2);
        assert!(!frame.is_extended);
        assert_eq!(frame.data, [0x01, 0x02, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_motor_frame_truncates_long_payload() {
        let frame = MotorFrame::new_extended(0x1234_5678, &[0xAA; 12]);
        assert_eq!(frame.len, 8);
        assert!(frame.is_extended);
        assert_eq!(frame.data_slice(), &[0xAA; 8]);
    }

    #[test]
    fn test_motor_frame_empty_data() {
        let frame = MotorFrame::new_standard(0x301, &[]);
        assert_eq!(frame.len, 0);
        assert!(frame.data_slice().is_empty());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Overflow {
            offset: 60,
            width: 8,
        };
        assert!(err.to_string().contains("overflow"));

        let err = ProtocolError::ValueTooWide { value: 8, width: 3 };
        assert_eq!(err.to_string(), "Value 0x8 does not fit in 3 bits");
    }
}

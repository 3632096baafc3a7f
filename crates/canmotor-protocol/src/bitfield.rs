//! MSB 优先的位流编码器
//!
//! 在固定 8 字节（64 位）缓冲区上按位写入不同宽度的字段。
//! 位偏移从 0 开始，第 0 位是 `buffer[0]` 的最高位。
//!
//! 所有写入都是按位 OR：编码器从不清除已有的位，调用方需要预先清零
//! 将要覆盖的区域。

use crate::ProtocolError;

/// 帧缓冲区容量（位）
pub const FRAME_BITS: usize = 64;

/// 检查 `[bit_offset, bit_offset + width_bits)` 是否落在帧内
fn check_bounds(width_bits: usize, bit_offset: usize) -> Result<(), ProtocolError> {
    match bit_offset.checked_add(width_bits) {
        Some(end) if end <= FRAME_BITS => Ok(()),
        _ => Err(ProtocolError::Overflow {
            offset: bit_offset,
            width: width_bits,
        }),
    }
}

/// 逐位写入，调用前必须已完成边界检查
fn write_bits(value: u64, width_bits: usize, buffer: &mut [u8; 8], bit_offset: usize) {
    for i in 0..width_bits {
        let bit = (value >> (width_bits - 1 - i)) & 0x01;
        let pos = bit_offset + i;
        buffer[pos / 8] |= (bit as u8) << (7 - pos % 8);
    }
}

/// 写入无符号整数字段（MSB 优先）
///
/// 将 `value` 的低 `width_bits` 位写入 `buffer`，起始位偏移为 `bit_offset`。
///
/// # 错误
/// - `ProtocolError::Overflow`: `bit_offset + width_bits > 64`
/// - `ProtocolError::ValueTooWide`: `value` 在 `width_bits` 及以上存在置位
///
/// # 示例
///
/// ```rust
/// use canmotor_protocol::encode_uint;
///
/// let mut buf = [0u8; 8];
/// encode_uint(0b10, 2, &mut buf, 0).unwrap();
/// assert_eq!(buf[0], 0x80);
///
/// // 8 需要 4 位
/// assert!(encode_uint(8, 3, &mut buf, 2).is_err());
/// ```
pub fn encode_uint(
    value: u64,
    width_bits: usize,
    buffer: &mut [u8; 8],
    bit_offset: usize,
) -> Result<(), ProtocolError> {
    check_bounds(width_bits, bit_offset)?;

    // width_bits <= 64 已由边界检查保证
    if value.checked_shr(width_bits as u32).unwrap_or(0) != 0 {
        return Err(ProtocolError::ValueTooWide {
            value,
            width: width_bits,
        });
    }

    write_bits(value, width_bits, buffer, bit_offset);
    Ok(())
}

/// f32 转 bfloat16（直接截断尾数，不做舍入）
///
/// 保留符号位、8 位指数和 7 位尾数，即 IEEE-754 单精度表示的高 16 位。
pub fn to_bfloat16(value: f32) -> u16 {
    (value.to_bits() >> 16) as u16
}

/// 以 bfloat16 格式写入 16 位浮点字段
///
/// # 错误
/// - `ProtocolError::Overflow`: `bit_offset + 16 > 64`
pub fn encode_bfloat16(
    value: f32,
    buffer: &mut [u8; 8],
    bit_offset: usize,
) -> Result<(), ProtocolError> {
    encode_uint(to_bfloat16(value) as u64, 16, buffer, bit_offset)
}

/// 固定容量的位写入游标
///
/// 在 [`encode_uint`] / [`encode_bfloat16`] 之上维护当前位偏移，
/// 每次成功写入后自动前移。写入失败时偏移保持不变。
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buffer: [u8; 8],
    offset: usize,
}

impl BitWriter {
    /// 在全零缓冲区上创建写入器
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; 8],
            offset: 0,
        }
    }

    /// 写入无符号整数字段
    pub fn write_uint(&mut self, value: u64, width_bits: usize) -> Result<(), ProtocolError> {
        encode_uint(value, width_bits, &mut self.buffer, self.offset)?;
        self.offset += width_bits;
        Ok(())
    }

    /// 写入 bfloat16 字段
    pub fn write_bfloat16(&mut self, value: f32) -> Result<(), ProtocolError> {
        encode_bfloat16(value, &mut self.buffer, self.offset)?;
        self.offset += 16;
        Ok(())
    }

    /// 已使用的位数
    pub fn bits_used(&self) -> usize {
        self.offset
    }

    /// 剩余可用位数
    pub fn bits_remaining(&self) -> usize {
        FRAME_BITS - self.offset
    }

    /// 当前缓冲区内容
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.buffer
    }

    /// 取出缓冲区
    pub fn into_inner(self) -> [u8; 8] {
        self.buffer
    }
}

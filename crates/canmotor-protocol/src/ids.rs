//! CAN ID 常量与推导
//!
//! 驱动器的总线地址由拨码开关（DIP）和板上电机序号决定：
//!
//! ```text
//! id     = BASE_OFFSET + dip * 16 + number * 2
//! ack_id = id + 1
//! ```
//!
//! 指令帧（控制帧、初始化帧）发往 `id`，驱动器在 `id + 1` 上应答。

/// 协议基地址
pub const BASE_OFFSET: u32 = 0x300;

/// 每个 DIP 地址占用的 ID 数量
pub const IDS_PER_DIP: u32 = 16;

/// 每个电机占用的 ID 数量（指令 ID + 应答 ID）
pub const IDS_PER_MOTOR: u32 = 2;

/// 应答帧相对指令 ID 的偏移
pub const ACK_ID_OFFSET: u32 = 1;

/// 应答帧 byte0：驱动器请求重新初始化
pub const INBOUND_REINIT_REQUEST: u8 = 0x00;

/// 应答帧 byte0：驱动器确认已收到初始化帧
pub const INBOUND_ACK: u8 = 0x01;

/// 由 DIP 值与电机序号推导指令 ID
///
/// ```rust
/// use canmotor_protocol::ids::command_id;
///
/// assert_eq!(command_id(0, 0), 0x300);
/// assert_eq!(command_id(1, 2), 0x314);
/// ```
pub const fn command_id(dip: u32, number: u32) -> u32 {
    BASE_OFFSET + dip * IDS_PER_DIP + number * IDS_PER_MOTOR
}

/// 指令 ID 对应的应答 ID
pub const fn ack_id(command_id: u32) -> u32 {
    command_id + ACK_ID_OFFSET
}

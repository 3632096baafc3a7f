//! SocketCAN CAN 适配器实现
//!
//! 支持 Linux 平台下的 SocketCAN 支持，使用内核级的 CAN 通讯接口。
//!
//! ## 依赖
//!
//! - `socketcan` crate (版本 3.5)
//! - Linux 内核 SocketCAN 支持
//! - CAN 接口必须已配置（通过 `ip link` 命令）
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率由系统工具（`ip link`）完成，不在应用层设置。
//!   `set_bit_rate` 只接受与接口当前配置一致的值。

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, DEFAULT_BIT_RATE, MotorFrame};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanFrame, CanSocket, EmbeddedFrame, ExtendedId,
    Frame, Socket, StandardId,
};
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tracing::{trace, warn};

/// 读超时下限：SocketCAN 上零超时等价于无限阻塞
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(100);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use canmotor_can::{CanAdapter, MotorFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(MotorFrame::new_standard(0x300, &[0x40, 0x00, 0x20])).unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    read_timeout: Duration,
    /// 接口的波特率（由 `ip link` 配置，这里只做记录）
    bit_rate: u32,
}

impl SocketCanAdapter {
    /// 打开 CAN 接口
    ///
    /// # 错误
    /// - `CanError::Device`: 无法打开接口（不存在或未 UP）
    /// - `CanError::Io`: 设置读超时失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NotFound,
                format!(
                    "Failed to open CAN interface '{}': {}. Make sure it is up:\n  sudo ip link set up {}",
                    interface, e, interface
                ),
            ))
        })?;

        // 禁用 Loopback：自己发出的指令帧不需要回到接收端
        let loopback_enabled: libc::c_int = 0;
        let loopback_result = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::SOL_CAN_RAW,
                libc::CAN_RAW_LOOPBACK,
                &loopback_enabled as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if loopback_result < 0 {
            warn!(
                "Failed to disable CAN_RAW_LOOPBACK on '{}': {}",
                interface,
                std::io::Error::last_os_error()
            );
        }

        let read_timeout = Duration::from_millis(2);
        socket.set_read_timeout(read_timeout).map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout,
            bit_rate: DEFAULT_BIT_RATE,
        })
    }

    /// 记录接口实际配置的波特率（当接口不是 1Mbps 时调用）
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取读超时时间
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 设置读超时
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        let data = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, data))
        } else {
            StandardId::new(frame.id as u16).and_then(|id| CanFrame::new(id, data))
        }
        .ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create frame with ID 0x{:X}", frame.id),
            ))
        })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧（阻塞直到收到有效数据帧或超时）
    ///
    /// 错误帧和远程帧会被过滤；总线关闭错误帧返回 `CanError::BusOff`。
    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        loop {
            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(CanError::Timeout);
                },
                Err(e) => return Err(CanError::Io(e)),
            };

            let data_frame = match can_frame {
                CanFrame::Data(data_frame) => data_frame,
                CanFrame::Error(error_frame) => {
                    if matches!(SocketCanError::from(error_frame), SocketCanError::BusOff) {
                        return Err(CanError::BusOff);
                    }
                    warn!("Ignoring CAN error frame on '{}'", self.interface);
                    continue;
                },
                CanFrame::Remote(_) => continue,
            };

            let mut frame = MotorFrame {
                id: data_frame.raw_id(),
                data: [0u8; 8],
                len: 0,
                is_extended: data_frame.is_extended(),
            };
            let payload = data_frame.data();
            let len = payload.len().min(8);
            frame.data[..len].copy_from_slice(&payload[..len]);
            frame.len = len as u8;

            trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
            return Ok(frame);
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MotorFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }

    fn set_bit_rate(&mut self, hz: u32) -> Result<(), CanError> {
        if hz == self.bit_rate {
            return Ok(());
        }
        Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::UnsupportedConfig,
            format!(
                "SocketCAN bit rate is configured by the system:\n  sudo ip link set {} type can bitrate {}",
                self.interface, hz
            ),
        )))
    }

    fn bit_rate(&self) -> u32 {
        self.bit_rate
    }
}

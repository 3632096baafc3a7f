//! Mock CAN 适配器（无硬件依赖）
//!
//! `MockCanAdapter` 交给被测代码使用，`MockCanHandle` 留在测试侧，
//! 两者共享同一份内部状态，用于：
//!
//! - 检查已发送的帧（按发送顺序）
//! - 注入入站帧
//! - 让指定 ID 或第 N 次发送失败
//! - 通过应答器（responder）模拟远端驱动器的自动应答
//!
//! ```rust,ignore
//! use canmotor_can::{CanAdapter, MockCanAdapter, MotorFrame};
//!
//! let (mut adapter, handle) = MockCanAdapter::new();
//! handle.fail_sends_to(0x302);
//!
//! assert!(adapter.send(MotorFrame::new_standard(0x300, &[0])).is_ok());
//! assert!(adapter.send(MotorFrame::new_standard(0x302, &[0])).is_err());
//! assert_eq!(handle.sent_frames().len(), 1);
//! ```

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, DEFAULT_BIT_RATE, MotorFrame};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

type Responder = Box<dyn Fn(&MotorFrame) -> Option<MotorFrame> + Send>;

struct MockState {
    sent: Vec<MotorFrame>,
    send_attempts: usize,
    rx_queue: VecDeque<MotorFrame>,
    failing_ids: HashSet<u32>,
    failing_attempts: HashSet<usize>,
    bit_rate: u32,
    responder: Option<Responder>,
}

/// Mock 适配器（被测代码侧）
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
    receive_timeout: Duration,
}

/// Mock 控制句柄（测试侧）
#[derive(Clone)]
pub struct MockCanHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockCanAdapter {
    /// 创建适配器及其控制句柄
    pub fn new() -> (Self, MockCanHandle) {
        let state = Arc::new(Mutex::new(MockState {
            sent: Vec::new(),
            send_attempts: 0,
            rx_queue: VecDeque::new(),
            failing_ids: HashSet::new(),
            failing_attempts: HashSet::new(),
            bit_rate: DEFAULT_BIT_RATE,
            responder: None,
        }));

        (
            Self {
                state: state.clone(),
                receive_timeout: Duration::from_millis(2),
            },
            MockCanHandle { state },
        )
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: MotorFrame) -> Result<(), CanError> {
        let mut state = self.state.lock();
        let attempt = state.send_attempts;
        state.send_attempts += 1;

        if state.failing_ids.contains(&frame.id) || state.failing_attempts.contains(&attempt) {
            trace!("Mock send #{} to 0x{:X} rejected", attempt, frame.id);
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("mock send #{} to 0x{:X} failed", attempt, frame.id),
            )));
        }

        state.sent.push(frame);
        let reply = state.responder.as_ref().and_then(|respond| respond(&frame));
        if let Some(reply) = reply {
            state.rx_queue.push_back(reply);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<MotorFrame, CanError> {
        if let Some(frame) = self.state.lock().rx_queue.pop_front() {
            return Ok(frame);
        }
        // 模拟真实总线的读超时，避免接收循环空转
        if !self.receive_timeout.is_zero() {
            std::thread::sleep(self.receive_timeout);
        }
        self.state.lock().rx_queue.pop_front().ok_or(CanError::Timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    fn set_bit_rate(&mut self, hz: u32) -> Result<(), CanError> {
        if hz == 0 {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::UnsupportedConfig,
                "bit rate must be non-zero",
            )));
        }
        self.state.lock().bit_rate = hz;
        Ok(())
    }

    fn bit_rate(&self) -> u32 {
        self.state.lock().bit_rate
    }
}

impl MockCanHandle {
    /// 成功发送的帧（按发送顺序）
    pub fn sent_frames(&self) -> Vec<MotorFrame> {
        self.state.lock().sent.clone()
    }

    /// 发往指定 ID 的成功帧
    pub fn sent_to(&self, id: u32) -> Vec<MotorFrame> {
        self.state.lock().sent.iter().filter(|f| f.id == id).copied().collect()
    }

    /// 发送尝试次数（含失败）
    pub fn send_attempts(&self) -> usize {
        self.state.lock().send_attempts
    }

    pub fn clear_sent(&self) {
        let mut state = self.state.lock();
        state.sent.clear();
        state.send_attempts = 0;
    }

    /// 注入一帧入站数据
    pub fn push_inbound(&self, frame: MotorFrame) {
        self.state.lock().rx_queue.push_back(frame);
    }

    /// 发往 `id` 的帧全部失败
    pub fn fail_sends_to(&self, id: u32) {
        self.state.lock().failing_ids.insert(id);
    }

    /// 第 `n` 次发送尝试（从 0 开始计数）失败
    pub fn fail_nth_send(&self, n: usize) {
        self.state.lock().failing_attempts.insert(n);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_ids.clear();
        state.failing_attempts.clear();
    }

    /// 设置应答器：每次成功发送后调用，返回的帧进入接收队列
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&MotorFrame) -> Option<MotorFrame> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    pub fn clear_responder(&self) {
        self.state.lock().responder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_sent_frames() {
        let (mut adapter, handle) = MockCanAdapter::new();
        adapter.send(MotorFrame::new_standard(0x300, &[1])).unwrap();
        adapter.send(MotorFrame::new_standard(0x302, &[2])).unwrap();

        let sent = handle.sent_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, 0x300);
        assert_eq!(sent[1].id, 0x302);
        assert_eq!(handle.sent_to(0x302).len(), 1);
    }

    #[test]
    fn test_mock_nth_send_fails() {
        let (mut adapter, handle) = MockCanAdapter::new();
        handle.fail_nth_send(1);

        assert!(adapter.send(MotorFrame::new_standard(0x300, &[])).is_ok());
        assert!(adapter.send(MotorFrame::new_standard(0x300, &[])).is_err());
        assert!(adapter.send(MotorFrame::new_standard(0x300, &[])).is_ok());

        assert_eq!(handle.send_attempts(), 3);
        assert_eq!(handle.sent_frames().len(), 2);
    }

    #[test]
    fn test_mock_receive_queue() {
        let (mut adapter, handle) = MockCanAdapter::new();
        adapter.set_receive_timeout(Duration::ZERO);
        handle.push_inbound(MotorFrame::new_standard(0x301, &[1]));

        assert_eq!(adapter.receive().unwrap().id, 0x301);
        assert!(matches!(adapter.receive(), Err(CanError::Timeout)));
        assert!(adapter.try_receive().unwrap().is_none());
    }

    #[test]
    fn test_mock_responder() {
        let (mut adapter, handle) = MockCanAdapter::new();
        handle.set_responder(|frame| Some(MotorFrame::new_standard(frame.id as u16 + 1, &[1])));

        adapter.send(MotorFrame::new_standard(0x310, &[0x80])).unwrap();
        let reply = adapter.receive_timeout(Duration::ZERO).unwrap();
        assert_eq!(reply.id, 0x311);
        assert_eq!(reply.data_slice(), &[1]);
    }

    #[test]
    fn test_mock_bit_rate() {
        let (mut adapter, _handle) = MockCanAdapter::new();
        assert_eq!(adapter.bit_rate(), DEFAULT_BIT_RATE);
        adapter.set_bit_rate(250_000).unwrap();
        assert_eq!(adapter.bit_rate(), 250_000);
        assert!(adapter.set_bit_rate(0).is_err());
        assert_eq!(adapter.bit_rate(), 250_000);
    }
}

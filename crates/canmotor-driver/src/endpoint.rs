//! 电机端点：一个物理驱动器在总线上的代理
//!
//! 每个端点持有自己的 [`MotorConfig`]、控制帧与初始化帧缓冲区，
//! 并实现连接握手：
//!
//! ```text
//!   Idle ──connect()──▶ AwaitingAck ──ack / 超时 / 发送失败──▶ Idle
//! ```
//!
//! 应答由接收线程通过 [`MotorEndpoint::handle_frame`] 送达，
//! 因此应答标志和握手状态使用原子量，配置与帧缓冲区使用互斥锁。

use crate::bus::CanBus;
use crate::config::DriverConfig;
use crate::delay::{Delay, SpinDelay};
use crate::error::DriverError;
use crate::motor::Motor;
use canmotor_can::MotorFrame;
use canmotor_protocol::{
    CONTROL_FRAME_LEN, INBOUND_ACK, INBOUND_REINIT_REQUEST, InitFrame, MotorConfig, ack_id,
    command_id, update_control_frame,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 标准帧 ID 上限（11 位）
const MAX_STANDARD_ID: u32 = 0x7FF;

/// 握手状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeState {
    Idle = 0,
    /// 初始化帧已发出，正在轮询应答
    AwaitingAck = 1,
}

impl HandshakeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => HandshakeState::AwaitingAck,
            _ => HandshakeState::Idle,
        }
    }
}

/// 入站帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundStatus {
    /// 驱动器请求重新初始化，已重新执行握手
    ReconnectTriggered,
    /// 收到应答
    AckReceived,
    /// 不认识的载荷，或帧不属于该端点
    Ignored,
}

/// 受锁保护的端点状态
#[derive(Debug)]
struct EndpointState {
    config: MotorConfig,
    control_frame: [u8; CONTROL_FRAME_LEN],
    init_frame: InitFrame,
}

/// 总线上的一个电机端点
pub struct MotorEndpoint {
    id: AtomicU32,
    number: Option<u32>,
    bus: CanBus,
    state: Mutex<EndpointState>,
    ack_received: AtomicBool,
    handshake: AtomicU8,
    connected: AtomicBool,
    poll_attempts: u32,
    poll_interval: Duration,
    delay: Arc<dyn Delay>,
}

impl MotorEndpoint {
    /// 使用显式 CAN ID 创建端点（默认时序）
    pub fn new(id: u32, bus: CanBus) -> Self {
        EndpointBuilder::new(bus).build_with_id(id, None)
    }

    /// 由拨码开关与电机序号推导 ID：`0x300 + dip*16 + number*2`
    pub fn from_dip(dip: u32, number: u32, bus: CanBus) -> Self {
        EndpointBuilder::new(bus).build_with_id(command_id(dip, number), Some(number))
    }

    /// 创建 Builder
    pub fn builder(bus: CanBus) -> EndpointBuilder {
        EndpointBuilder::new(bus)
    }

    /// 指令帧 ID
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    /// 修改指令帧 ID（应答 ID 随之变化）
    pub fn set_id(&self, id: u32) {
        self.id.store(id, Ordering::Release);
    }

    /// 应答帧 ID（指令 ID + 1）
    pub fn ack_id(&self) -> u32 {
        ack_id(self.id())
    }

    /// 由 `from_dip` 创建时的电机序号
    pub fn number(&self) -> Option<u32> {
        self.number
    }

    /// 最近一次握手是否收到应答
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn handshake_state(&self) -> HandshakeState {
        HandshakeState::from_u8(self.handshake.load(Ordering::Acquire))
    }

    /// 应答标志（每次 `connect()` 开始时清零）
    pub fn ack_received(&self) -> bool {
        self.ack_received.load(Ordering::Acquire)
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// 在锁内修改配置
    ///
    /// 配置修改不会自动下发，需要调用 [`write`](Self::write) 或 [`connect`](Self::connect)。
    pub fn configure<F>(&self, update: F)
    where
        F: FnOnce(&mut MotorConfig),
    {
        update(&mut self.state.lock().config);
    }

    /// 配置快照
    pub fn config(&self) -> MotorConfig {
        self.state.lock().config
    }

    /// 最近一次构建的控制帧
    pub fn control_frame(&self) -> [u8; CONTROL_FRAME_LEN] {
        self.state.lock().control_frame
    }

    /// 最近一次构建的初始化帧
    pub fn init_frame(&self) -> InitFrame {
        self.state.lock().init_frame
    }

    /// 设置共享总线的波特率
    pub fn set_bit_rate(&self, hz: u32) -> Result<(), DriverError> {
        self.bus.set_bit_rate(hz)?;
        Ok(())
    }

    pub fn bit_rate(&self) -> u32 {
        self.bus.bit_rate()
    }

    /// 连接握手
    ///
    /// 清除应答标志，发送初始化帧，然后最多轮询 `poll_attempts` 次，
    /// 每次间隔 `poll_interval`。应答由其他线程通过
    /// [`handle_frame`](Self::handle_frame) 设置。
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 初始化帧编码失败
    /// - `DriverError::TransportFailure`: 初始化帧发送失败
    /// - `DriverError::HandshakeTimeout`: 轮询窗口内未收到应答
    pub fn connect(&self) -> Result<(), DriverError> {
        let id = self.id();
        self.ack_received.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);

        let init_frame = {
            let mut state = self.state.lock();
            let init_frame = InitFrame::encode(&state.config)?;
            state.init_frame = init_frame;
            init_frame
        };

        self.set_handshake_state(HandshakeState::AwaitingAck);
        if let Err(source) = self.bus.send(frame_for(id, init_frame.data())) {
            self.set_handshake_state(HandshakeState::Idle);
            warn!("Failed to send init frame to 0x{:X}: {}", id, source);
            return Err(DriverError::TransportFailure { id, source });
        }
        trace!(
            "Init frame sent to 0x{:X} ({} bits used)",
            id,
            init_frame.bits_used()
        );

        let mut acked = self.ack_received();
        let mut polls = 0;
        while !acked && polls < self.poll_attempts {
            self.delay.delay(self.poll_interval);
            polls += 1;
            acked = self.ack_received();
        }

        self.set_handshake_state(HandshakeState::Idle);
        if acked {
            self.connected.store(true, Ordering::Release);
            debug!("Motor 0x{:X} acknowledged after {} polls", id, polls);
            Ok(())
        } else {
            warn!(
                "Motor 0x{:X} did not acknowledge within {} polls",
                id, self.poll_attempts
            );
            Err(DriverError::HandshakeTimeout {
                id,
                attempts: self.poll_attempts,
            })
        }
    }

    /// 处理入站载荷的第一个字节
    ///
    /// - `0x00`: 驱动器请求重新初始化，同步执行 `connect()`
    /// - `0x01`: 应答
    /// - 其他: 忽略
    pub fn handle_inbound(&self, byte0: u8) -> InboundStatus {
        match byte0 {
            INBOUND_REINIT_REQUEST => {
                debug!("Motor 0x{:X} requested re-initialization", self.id());
                if let Err(e) = self.connect() {
                    warn!("Reconnect of 0x{:X} failed: {}", self.id(), e);
                }
                InboundStatus::ReconnectTriggered
            },
            INBOUND_ACK => {
                self.ack_received.store(true, Ordering::Release);
                trace!("Ack received from 0x{:X}", self.ack_id());
                InboundStatus::AckReceived
            },
            other => {
                trace!("Ignoring inbound byte 0x{:02X} for 0x{:X}", other, self.id());
                InboundStatus::Ignored
            },
        }
    }

    /// 处理一帧入站数据
    ///
    /// 只接受发往应答 ID 且载荷非空的帧。
    pub fn handle_frame(&self, frame: &MotorFrame) -> InboundStatus {
        if frame.id != self.ack_id() {
            return InboundStatus::Ignored;
        }
        match frame.data_slice().first() {
            Some(&byte0) => self.handle_inbound(byte0),
            None => InboundStatus::Ignored,
        }
    }

    /// 按当前配置更新控制帧并发送
    ///
    /// 不改变握手状态。
    pub fn write(&self) -> Result<(), DriverError> {
        let id = self.id();
        let control_frame = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            update_control_frame(&mut state.control_frame, &state.config)?;
            state.control_frame
        };

        self.bus
            .send(frame_for(id, &control_frame))
            .map_err(|source| DriverError::TransportFailure { id, source })?;
        trace!("Control frame sent to 0x{:X}: {:02X?}", id, control_frame);
        Ok(())
    }

    fn set_handshake_state(&self, state: HandshakeState) {
        self.handshake.store(state as u8, Ordering::Release);
    }
}

impl Motor for MotorEndpoint {
    fn update_config(&self, update: &mut dyn FnMut(&mut MotorConfig)) {
        update(&mut self.state.lock().config);
    }

    fn config(&self) -> MotorConfig {
        MotorEndpoint::config(self)
    }

    fn write(&self) -> Result<(), DriverError> {
        MotorEndpoint::write(self)
    }
}

impl std::fmt::Debug for MotorEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorEndpoint")
            .field("id", &format_args!("0x{:X}", self.id()))
            .field("number", &self.number)
            .field("handshake", &self.handshake_state())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// 11 位以内的 ID 使用标准帧，否则使用扩展帧
fn frame_for(id: u32, data: &[u8]) -> MotorFrame {
    if id <= MAX_STANDARD_ID {
        MotorFrame::new_standard(id as u16, data)
    } else {
        MotorFrame::new_extended(id, data)
    }
}

/// 端点 Builder（链式构造）
///
/// # Example
///
/// ```
/// use canmotor_driver::{CanBus, MotorEndpoint};
/// # use canmotor_can::MockCanAdapter;
/// # let (adapter, _handle) = MockCanAdapter::new();
/// let bus = CanBus::new(adapter);
///
/// let endpoint = MotorEndpoint::builder(bus)
///     .dip(1, 1)
///     .poll_attempts(20)
///     .build()
///     .unwrap();
/// assert_eq!(endpoint.id(), 0x312);
/// ```
pub struct EndpointBuilder {
    bus: CanBus,
    id: Option<u32>,
    number: Option<u32>,
    config: MotorConfig,
    poll_attempts: u32,
    poll_interval: Duration,
    delay: Arc<dyn Delay>,
}

impl EndpointBuilder {
    pub fn new(bus: CanBus) -> Self {
        let defaults = DriverConfig::default();
        Self {
            bus,
            id: None,
            number: None,
            config: MotorConfig::default(),
            poll_attempts: defaults.poll_attempts,
            poll_interval: defaults.poll_interval(),
            delay: Arc::new(SpinDelay),
        }
    }

    /// 显式 CAN ID
    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self.number = None;
        self
    }

    /// 由拨码开关与电机序号推导 ID
    pub fn dip(mut self, dip: u32, number: u32) -> Self {
        self.id = Some(command_id(dip, number));
        self.number = Some(number);
        self
    }

    /// 初始配置
    pub fn config(mut self, config: MotorConfig) -> Self {
        self.config = config;
        self
    }

    /// 从驱动配置读取握手时序
    pub fn driver_config(mut self, config: &DriverConfig) -> Self {
        self.poll_attempts = config.poll_attempts;
        self.poll_interval = config.poll_interval();
        self
    }

    pub fn poll_attempts(mut self, attempts: u32) -> Self {
        self.poll_attempts = attempts;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 替换延时实现（测试中用于记录轮询）
    pub fn delay<D>(mut self, delay: D) -> Self
    where
        D: Delay + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    /// 多个端点共享同一个延时实现
    pub fn shared_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// 构建端点
    ///
    /// # 错误
    /// - `DriverError::Config`: 未指定 ID，或轮询次数为 0
    pub fn build(self) -> Result<MotorEndpoint, DriverError> {
        let id = self
            .id
            .ok_or_else(|| DriverError::Config("endpoint id is required".to_string()))?;
        if self.poll_attempts == 0 {
            return Err(DriverError::Config(
                "poll_attempts must be at least 1".to_string(),
            ));
        }
        let number = self.number;
        Ok(self.build_with_id(id, number))
    }

    fn build_with_id(self, id: u32, number: Option<u32>) -> MotorEndpoint {
        MotorEndpoint {
            id: AtomicU32::new(id),
            number,
            bus: self.bus,
            state: Mutex::new(EndpointState {
                config: self.config,
                control_frame: [0u8; CONTROL_FRAME_LEN],
                init_frame: InitFrame::default(),
            }),
            ack_received: AtomicBool::new(false),
            handshake: AtomicU8::new(HandshakeState::Idle as u8),
            connected: AtomicBool::new(false),
            poll_attempts: self.poll_attempts,
            poll_interval: self.poll_interval,
            delay: self.delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canmotor_can::{MockCanAdapter, MockCanHandle};
    use canmotor_protocol::{MotorState, RampLevel};
    use std::sync::atomic::AtomicUsize;

    /// 记录延时调用次数
    #[derive(Clone, Default)]
    struct CountingDelay {
        calls: Arc<AtomicUsize>,
    }

    impl Delay for CountingDelay {
        fn delay(&self, _duration: Duration) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn endpoint_with_delay(id: u32) -> (MotorEndpoint, MockCanHandle, CountingDelay) {
        let (adapter, handle) = MockCanAdapter::new();
        let delay = CountingDelay::default();
        let endpoint = MotorEndpoint::builder(CanBus::new(adapter))
            .id(id)
            .delay(delay.clone())
            .build()
            .unwrap();
        (endpoint, handle, delay)
    }

    #[test]
    fn test_id_derivation() {
        let (adapter, _handle) = MockCanAdapter::new();
        let endpoint = MotorEndpoint::from_dip(1, 1, CanBus::new(adapter));
        assert_eq!(endpoint.id(), 0x312);
        assert_eq!(endpoint.ack_id(), 0x313);
        assert_eq!(endpoint.number(), Some(1));

        endpoint.set_id(0x400);
        assert_eq!(endpoint.ack_id(), 0x401);
    }

    #[test]
    fn test_new_endpoint_is_idle() {
        let (adapter, _handle) = MockCanAdapter::new();
        let endpoint = MotorEndpoint::new(0x300, CanBus::new(adapter));
        assert_eq!(endpoint.handshake_state(), HandshakeState::Idle);
        assert!(!endpoint.is_connected());
        assert_eq!(endpoint.number(), None);
        assert_eq!(endpoint.poll_attempts(), 10);
        assert_eq!(endpoint.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_write_sends_control_frame() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x300);
        endpoint.configure(|config| {
            config.set_duty_cycle(0.5);
            config.set_state(MotorState::Cw);
        });
        endpoint.write().unwrap();

        let sent = handle.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x300);
        assert!(!sent[0].is_extended);
        assert_eq!(sent[0].data_slice(), &[0x40, 0x00, 0x20]);
        assert_eq!(endpoint.control_frame(), [0x40, 0x00, 0x20]);
        assert_eq!(endpoint.handshake_state(), HandshakeState::Idle);
    }

    #[test]
    fn test_write_failure_is_transport_failure() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x302);
        handle.fail_sends_to(0x302);

        match endpoint.write() {
            Err(DriverError::TransportFailure { id, .. }) => assert_eq!(id, 0x302),
            other => panic!("Expected TransportFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_connect_without_ack_times_out_after_all_polls() {
        let (endpoint, handle, delay) = endpoint_with_delay(0x300);

        match endpoint.connect() {
            Err(DriverError::HandshakeTimeout { id, attempts }) => {
                assert_eq!(id, 0x300);
                assert_eq!(attempts, 10);
            },
            other => panic!("Expected HandshakeTimeout, got {:?}", other),
        }
        assert_eq!(delay.calls.load(Ordering::SeqCst), 10);
        assert!(!endpoint.ack_received());
        assert!(!endpoint.is_connected());
        assert_eq!(endpoint.handshake_state(), HandshakeState::Idle);

        let sent = handle.sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len, 8);
        assert_eq!(sent[0].data, [0x80, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_connect_succeeds_when_ack_arrives() {
        let (adapter, _handle) = MockCanAdapter::new();
        let polls = Arc::new(AtomicUsize::new(0));

        // 延时回调模拟接收线程在第 3 次轮询时送达应答
        let polls_clone = polls.clone();
        let endpoint = Arc::new_cyclic(|weak: &std::sync::Weak<MotorEndpoint>| {
            let weak = weak.clone();
            MotorEndpoint::builder(CanBus::new(adapter))
                .id(0x300)
                .delay(move |_d: Duration| {
                    if polls_clone.fetch_add(1, Ordering::SeqCst) == 2
                        && let Some(endpoint) = weak.upgrade()
                    {
                        endpoint.handle_inbound(INBOUND_ACK);
                    }
                })
                .build_with_id(0x300, None)
        });

        endpoint.connect().unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(endpoint.ack_received());
        assert!(endpoint.is_connected());
        assert_eq!(endpoint.handshake_state(), HandshakeState::Idle);
    }

    #[test]
    fn test_connect_send_failure() {
        let (endpoint, handle, delay) = endpoint_with_delay(0x304);
        handle.fail_sends_to(0x304);

        assert!(matches!(
            endpoint.connect(),
            Err(DriverError::TransportFailure { id: 0x304, .. })
        ));
        assert_eq!(delay.calls.load(Ordering::SeqCst), 0);
        assert_eq!(endpoint.handshake_state(), HandshakeState::Idle);
    }

    #[test]
    fn test_connect_clears_stale_ack() {
        let (endpoint, _handle, _delay) = endpoint_with_delay(0x300);
        assert_eq!(endpoint.handle_inbound(INBOUND_ACK), InboundStatus::AckReceived);
        assert!(endpoint.ack_received());

        assert!(endpoint.connect().is_err());
        assert!(!endpoint.ack_received());
    }

    #[test]
    fn test_connect_sends_configured_init_frame() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x300);
        endpoint.configure(|config| {
            config.set_rise_level(RampLevel::Low);
            config.set_fall_level(RampLevel::Max);
        });
        let _ = endpoint.connect();

        // 前缀 10 + 头 10 + rise 010 + fall 111
        let sent = handle.sent_frames();
        assert_eq!(sent[0].data[0], 0b1010_0101);
        assert_eq!(sent[0].data[1], 0b1100_0000);
        assert_eq!(endpoint.init_frame().bits_used(), 10);
    }

    #[test]
    fn test_handle_inbound_reinit_reconnects_once() {
        let (endpoint, handle, delay) = endpoint_with_delay(0x300);

        assert_eq!(
            endpoint.handle_inbound(INBOUND_REINIT_REQUEST),
            InboundStatus::ReconnectTriggered
        );
        assert_eq!(handle.sent_frames().len(), 1);
        assert_eq!(delay.calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_handle_inbound_unknown_byte() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x300);
        assert_eq!(endpoint.handle_inbound(0x42), InboundStatus::Ignored);
        assert!(!endpoint.ack_received());
        assert!(handle.sent_frames().is_empty());
    }

    #[test]
    fn test_handle_frame_filters() {
        let (endpoint, _handle, _delay) = endpoint_with_delay(0x300);

        let wrong_id = MotorFrame::new_standard(0x303, &[INBOUND_ACK]);
        assert_eq!(endpoint.handle_frame(&wrong_id), InboundStatus::Ignored);

        let empty = MotorFrame::new_standard(0x301, &[]);
        assert_eq!(endpoint.handle_frame(&empty), InboundStatus::Ignored);

        let ack = MotorFrame::new_standard(0x301, &[INBOUND_ACK]);
        assert_eq!(endpoint.handle_frame(&ack), InboundStatus::AckReceived);
        assert!(endpoint.ack_received());
    }

    #[test]
    fn test_extended_id_uses_extended_frame() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x1000);
        endpoint.write().unwrap();
        assert!(handle.sent_frames()[0].is_extended);
    }

    #[test]
    fn test_bit_rate_through_endpoint() {
        let (endpoint, _handle, _delay) = endpoint_with_delay(0x300);
        endpoint.set_bit_rate(500_000).unwrap();
        assert_eq!(endpoint.bit_rate(), 500_000);
        assert!(matches!(endpoint.set_bit_rate(0), Err(DriverError::Can(_))));
    }

    #[test]
    fn test_builder_requires_id() {
        let (adapter, _handle) = MockCanAdapter::new();
        let result = MotorEndpoint::builder(CanBus::new(adapter)).build();
        assert!(matches!(result, Err(DriverError::Config(_))));

        let (adapter, _handle) = MockCanAdapter::new();
        let result = MotorEndpoint::builder(CanBus::new(adapter))
            .id(0x300)
            .poll_attempts(0)
            .build();
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_builder_driver_config() {
        let (adapter, _handle) = MockCanAdapter::new();
        let config = DriverConfig {
            poll_attempts: 4,
            poll_interval_ms: 1,
            ..Default::default()
        };
        let endpoint = MotorEndpoint::builder(CanBus::new(adapter))
            .id(0x300)
            .driver_config(&config)
            .build()
            .unwrap();
        assert_eq!(endpoint.poll_attempts(), 4);
        assert_eq!(endpoint.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_motor_trait_drive() {
        let (endpoint, handle, _delay) = endpoint_with_delay(0x300);
        let motor: &dyn Motor = &endpoint;
        motor.drive(1.0, MotorState::Free).unwrap();
        assert_eq!(handle.sent_frames()[0].data_slice(), &[0x7F, 0xFF, 0x80]);
    }
}

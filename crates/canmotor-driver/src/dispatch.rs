//! 入站帧分发线程
//!
//! 后台 RX 线程以短超时轮询总线，把应答帧交给对应端点。
//!
//! 重新初始化请求（载荷首字节 `0x00`）需要重新握手，而握手要等待的应答
//! 只能由 RX 线程送达；如果在 RX 线程上同步执行就会自己等自己。
//! 因此这类请求经由 channel 转给独立的重连线程执行，RX 线程继续接收。

use crate::bus::CanBus;
use crate::config::DriverConfig;
use crate::endpoint::MotorEndpoint;
use crate::error::DriverError;
use crate::registry::EndpointRegistry;
use canmotor_can::CanError;
use canmotor_protocol::INBOUND_REINIT_REQUEST;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, trace, warn};

/// 待处理重连请求的队列容量
const RECONNECT_QUEUE_CAPACITY: usize = 16;

/// 分发线程句柄
///
/// `stop()` 或 drop 时通知线程退出并等待其结束。
pub struct DispatchHandle {
    is_running: Arc<AtomicBool>,
    rx_thread: Option<JoinHandle<()>>,
    reconnect_thread: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
            && self.rx_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止分发线程并等待退出
    ///
    /// 正在进行的重连握手会执行完毕（不支持取消）。
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.rx_thread.take()
            && handle.join().is_err()
        {
            error!("Dispatch RX thread panicked");
        }
        // RX 线程退出时丢弃 Sender，重连线程随之结束
        if let Some(handle) = self.reconnect_thread.take()
            && handle.join().is_err()
        {
            error!("Dispatch reconnect thread panicked");
        }
    }
}

impl Drop for DispatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 启动入站分发线程
///
/// # 错误
/// - `DriverError::Config`: `receive_timeout_ms` 为 0
/// - `DriverError::IoThread`: 线程创建失败
///
/// # Example
///
/// ```
/// use canmotor_driver::{CanBus, DriverConfig, EndpointRegistry, spawn_dispatch_loop};
/// use std::sync::Arc;
/// # use canmotor_can::MockCanAdapter;
/// # let (adapter, _handle) = MockCanAdapter::new();
///
/// let bus = CanBus::new(adapter);
/// let registry = Arc::new(EndpointRegistry::new());
/// let mut dispatch = spawn_dispatch_loop(bus, registry, &DriverConfig::default()).unwrap();
/// dispatch.stop();
/// ```
pub fn spawn_dispatch_loop(
    bus: CanBus,
    registry: Arc<EndpointRegistry>,
    config: &DriverConfig,
) -> Result<DispatchHandle, DriverError> {
    config.validate()?;
    let receive_timeout = config.receive_timeout();

    let is_running = Arc::new(AtomicBool::new(true));
    let (reconnect_tx, reconnect_rx) =
        crossbeam_channel::bounded::<Arc<MotorEndpoint>>(RECONNECT_QUEUE_CAPACITY);

    let is_running_reconnect = is_running.clone();
    let reconnect_thread = thread::Builder::new()
        .name("canmotor-reconnect".to_string())
        .spawn(move || reconnect_loop(reconnect_rx, is_running_reconnect))
        .map_err(|e| DriverError::IoThread(e.to_string()))?;

    let is_running_rx = is_running.clone();
    let rx_thread = match thread::Builder::new()
        .name("canmotor-rx".to_string())
        .spawn(move || rx_loop(bus, registry, receive_timeout, reconnect_tx, is_running_rx))
    {
        Ok(handle) => handle,
        Err(e) => {
            // 重连线程的 Sender 已随闭包释放，线程会自行退出
            is_running.store(false, Ordering::Release);
            let _ = reconnect_thread.join();
            return Err(DriverError::IoThread(e.to_string()));
        },
    };

    Ok(DispatchHandle {
        is_running,
        rx_thread: Some(rx_thread),
        reconnect_thread: Some(reconnect_thread),
    })
}

fn rx_loop(
    bus: CanBus,
    registry: Arc<EndpointRegistry>,
    receive_timeout: Duration,
    reconnect_tx: Sender<Arc<MotorEndpoint>>,
    is_running: Arc<AtomicBool>,
) {
    while is_running.load(Ordering::Acquire) {
        let frame = match bus.receive_timeout(receive_timeout) {
            Ok(frame) => frame,
            Err(CanError::Timeout) => continue,
            Err(e) => {
                warn!("Dispatch receive error: {}", e);
                // 避免持续错误时空转占满总线锁
                spin_sleep::sleep(receive_timeout);
                continue;
            },
        };
        trace!("Dispatch received frame ID=0x{:X}", frame.id);

        let Some(endpoint) = registry.find_by_ack_id(frame.id) else {
            continue;
        };

        if frame.data_slice().first() == Some(&INBOUND_REINIT_REQUEST) {
            match reconnect_tx.try_send(endpoint) {
                Ok(()) => {},
                Err(TrySendError::Full(endpoint)) => {
                    warn!(
                        "Reconnect queue full, dropping request from 0x{:X}",
                        endpoint.id()
                    );
                },
                Err(TrySendError::Disconnected(_)) => {
                    error!("Reconnect thread exited, stopping dispatch");
                    break;
                },
            }
        } else {
            endpoint.handle_frame(&frame);
        }
    }
    trace!("Dispatch RX thread exiting");
}

fn reconnect_loop(reconnect_rx: Receiver<Arc<MotorEndpoint>>, is_running: Arc<AtomicBool>) {
    for endpoint in reconnect_rx.iter() {
        if !is_running.load(Ordering::Acquire) {
            break;
        }
        endpoint.handle_inbound(INBOUND_REINIT_REQUEST);
    }
    trace!("Dispatch reconnect thread exiting");
}

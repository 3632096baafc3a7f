//! 延时原语
//!
//! 握手轮询与批量操作之间的停顿都通过 [`Delay`] 注入，测试可以替换为
//! 记录调用的实现，而不必真的等待。

use std::time::Duration;

/// 阻塞延时能力
pub trait Delay: Send + Sync {
    fn delay(&self, duration: Duration);
}

/// 基于 `spin_sleep` 的高精度延时（默认实现）
///
/// 相比 `std::thread::sleep` 的 1-2ms 抖动，10ms 轮询间隔可以保持稳定。
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay(&self, duration: Duration) {
        if !duration.is_zero() {
            spin_sleep::sleep(duration);
        }
    }
}

impl<F> Delay for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn delay(&self, duration: Duration) {
        self(duration)
    }
}

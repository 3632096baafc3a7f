//! 帧编码的属性测试
//!
//! 使用 proptest 验证控制帧与初始化帧的位布局。

use canmotor_sdk::protocol::{
    InitFrame, encode_control_frame, encode_uint, update_control_frame,
};
use canmotor_sdk::{DecayMode, MotorConfig, MotorState, ProtocolError, RampLevel};
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = MotorState> {
    prop_oneof![
        Just(MotorState::Free),
        Just(MotorState::Cw),
        Just(MotorState::Ccw),
        Just(MotorState::Brake),
    ]
}

fn any_ramp() -> impl Strategy<Value = RampLevel> {
    prop_oneof![
        Just(RampLevel::Off),
        Just(RampLevel::Low),
        Just(RampLevel::Middle),
        Just(RampLevel::High),
        Just(RampLevel::Max),
    ]
}

fn any_decay() -> impl Strategy<Value = DecayMode> {
    prop_oneof![
        Just(DecayMode::SlowDecay),
        Just(DecayMode::MixedDecay),
        Just(DecayMode::FastDecay),
    ]
}

prop_compose! {
    fn any_config()(
        duty in 0.0f32..=1.0,
        state in any_state(),
        rise in any_ramp(),
        fall in any_ramp(),
        control in any_decay(),
        period in 0.000_001f32..60_000.0,
        release in -10_000.0f32..10_000.0,
    ) -> MotorConfig {
        let mut config = MotorConfig::default();
        config.set_duty_cycle(duty);
        config.set_state(state);
        config.set_rise_level(rise);
        config.set_fall_level(fall);
        config.set_control(control);
        config.set_pulse_period(period);
        config.set_release_time_ms(release);
        config
    }
}

/// 从控制帧取回 16 位占空比：byte0[6:0] ++ byte1 ++ byte2[7]
fn duty_bits(frame: &[u8; 3]) -> u32 {
    ((frame[0] as u32 & 0x7F) << 9) | ((frame[1] as u32) << 1) | (frame[2] as u32 >> 7)
}

proptest! {
    /// 占空比位等于 round(duty * 65536)，1.0 饱和为 65535
    #[test]
    fn control_frame_duty_bits(duty in 0.0f32..=1.0, state in any_state()) {
        let mut config = MotorConfig::default();
        config.set_duty_cycle(duty);
        config.set_state(state);

        let frame = encode_control_frame(&config).unwrap();
        let expected = ((duty * 65536.0).round() as u32).min(65535);
        prop_assert_eq!(duty_bits(&frame), expected);
    }

    /// 状态位 byte2[6:5] 等于状态序号，保留位不受影响
    #[test]
    fn control_frame_state_bits_keep_reserved(
        state in any_state(),
        duty in 0.0f32..=1.0,
        initial in any::<[u8; 3]>(),
    ) {
        let mut config = MotorConfig::default();
        config.set_duty_cycle(duty);
        config.set_state(state);

        let mut frame = initial;
        update_control_frame(&mut frame, &config).unwrap();

        prop_assert_eq!((frame[2] >> 5) & 0b11, u8::from(state));
        prop_assert_eq!(frame[0] & 0x80, initial[0] & 0x80);
        prop_assert_eq!(frame[2] & 0x1F, initial[2] & 0x1F);
    }

    /// 同一配置编码两次逐字节相同
    #[test]
    fn encoding_is_deterministic(config in any_config()) {
        prop_assert_eq!(encode_control_frame(&config).unwrap(), encode_control_frame(&config).unwrap());
        prop_assert_eq!(InitFrame::encode(&config).unwrap(), InitFrame::encode(&config).unwrap());
    }

    /// 初始化帧总是以 0b10 开头，且不超过 52 位
    #[test]
    fn init_frame_prefix_and_bound(config in any_config()) {
        let frame = InitFrame::encode(&config).unwrap();
        prop_assert_eq!(frame.data()[0] >> 6, 0b10);
        prop_assert!(frame.bits_used() >= 2);
        prop_assert!(frame.bits_used() <= 52);
    }

    /// 超出字段宽度的值被拒绝
    #[test]
    fn encode_uint_rejects_wide_values(width in 1usize..16, excess in 0u64..1024) {
        let value = (1u64 << width) + excess;
        let mut buffer = [0u8; 8];
        let result = encode_uint(value, width, &mut buffer, 0);
        prop_assert_eq!(result, Err(ProtocolError::ValueTooWide { value, width }));
        prop_assert_eq!(buffer, [0u8; 8]);
    }
}

#[test]
fn default_init_frame_is_prefix_only() {
    let frame = InitFrame::encode(&MotorConfig::default()).unwrap();
    assert_eq!(frame.data(), &[0x80, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(frame.bits_used(), 2);
}

#[test]
fn value_too_wide_for_three_bits() {
    let mut buffer = [0u8; 8];
    assert_eq!(
        encode_uint(8, 3, &mut buffer, 0),
        Err(ProtocolError::ValueTooWide { value: 8, width: 3 })
    );
}

#[test]
fn all_blocks_use_52_bits() {
    let mut config = MotorConfig::default();
    config.set_rise_level(RampLevel::High);
    config.set_control(DecayMode::FastDecay);
    config.set_frequency(20_000.0);
    config.set_release_time_ms(250.0);

    let frame = InitFrame::encode(&config).unwrap();
    assert_eq!(frame.bits_used(), 52);
    assert_eq!(frame.bytes_used(), 7);
}

//! Frame sampler tests.

use frameshard::{FrameSampler, FrameShardError, SampleRatePolicy};

fn emitted(sampler: &mut FrameSampler, indices: impl IntoIterator<Item = u64>) -> Vec<u64> {
    indices
        .into_iter()
        .filter(|&index| sampler.should_emit(index))
        .collect()
}

// ── policy parsing ─────────────────────────────────────────────────

#[test]
fn zero_rate_means_every_frame() {
    let policy = SampleRatePolicy::from_frames_per_second(0.0).expect("valid rate");
    assert_eq!(policy, SampleRatePolicy::EveryFrame);
}

#[test]
fn invalid_rates_are_rejected() {
    for rate in [-1.0, f64::NAN, f64::INFINITY] {
        let result = SampleRatePolicy::from_frames_per_second(rate);
        assert!(
            matches!(result, Err(FrameShardError::Configuration(_))),
            "rate {rate} should be rejected"
        );
    }
}

#[test]
fn cadence_needs_a_native_rate() {
    let policy = SampleRatePolicy::from_frames_per_second(5.0).expect("valid rate");
    assert!(FrameSampler::new(policy, 0.0).is_err());
    assert!(FrameSampler::new(policy, f64::NAN).is_err());

    // Every-frame sampling does not care about the native rate.
    assert!(FrameSampler::new(SampleRatePolicy::EveryFrame, 0.0).is_ok());
}

// ── every frame ────────────────────────────────────────────────────

#[test]
fn every_frame_emits_without_gaps() {
    let mut sampler = FrameSampler::new(SampleRatePolicy::EveryFrame, 25.0).expect("sampler");
    let frames = emitted(&mut sampler, 0..250);
    assert_eq!(frames, (0..250).collect::<Vec<_>>());
}

// ── cadence ────────────────────────────────────────────────────────

#[test]
fn thirty_to_ten_keeps_one_in_three() {
    let policy = SampleRatePolicy::from_frames_per_second(10.0).expect("valid rate");
    let mut sampler = FrameSampler::new(policy, 30.0).expect("sampler");
    let frames = emitted(&mut sampler, 0..300);

    assert_eq!(frames.len(), 100);
    for window in (0..300_u64).collect::<Vec<_>>().chunks(3) {
        let hits = window.iter().filter(|index| frames.contains(index)).count();
        assert_eq!(hits, 1, "window {window:?} should contain exactly one sample");
    }
}

#[test]
fn non_integer_step_does_not_drift() {
    // NTSC: 1001 seconds of video at one sample per second.
    let policy = SampleRatePolicy::from_frames_per_second(1.0).expect("valid rate");
    let mut sampler = FrameSampler::new(policy, 30_000.0 / 1_001.0).expect("sampler");
    let frames = emitted(&mut sampler, 0..30_000);

    assert_eq!(frames.len(), 1_001);
    assert_eq!(&frames[..3], &[0, 30, 60]);
    assert_eq!(frames.last(), Some(&29_971));
}

#[test]
fn fractional_step_alternates() {
    let policy = SampleRatePolicy::from_frames_per_second(10.0).expect("valid rate");
    let mut sampler = FrameSampler::new(policy, 25.0).expect("sampler");
    assert_eq!(sampler.step(), 2.5);
    assert_eq!(emitted(&mut sampler, 0..20), vec![0, 3, 5, 8, 10, 13, 15, 18]);
}

#[test]
fn cadence_above_native_rate_is_capped() {
    let policy = SampleRatePolicy::from_frames_per_second(60.0).expect("valid rate");
    let mut sampler = FrameSampler::new(policy, 24.0).expect("sampler");
    assert_eq!(sampler.step(), 1.0);
    assert_eq!(emitted(&mut sampler, 0..48).len(), 48);
}

#[test]
fn never_emits_an_index_twice() {
    let mut sampler = FrameSampler::new(SampleRatePolicy::EveryFrame, 30.0).expect("sampler");
    assert!(sampler.should_emit(4));
    assert!(!sampler.should_emit(4));
    assert!(!sampler.should_emit(2));
    assert!(sampler.should_emit(5));
}

#[test]
fn gaps_yield_one_sample_per_catch_up() {
    let policy = SampleRatePolicy::from_frames_per_second(10.0).expect("valid rate");
    let mut sampler = FrameSampler::new(policy, 30.0).expect("sampler");
    assert_eq!(emitted(&mut sampler, [0, 1, 2, 10, 11, 12, 13]), vec![0, 10, 12]);
}

#[test]
fn policy_display() {
    assert_eq!(SampleRatePolicy::EveryFrame.to_string(), "every frame");
    let policy = SampleRatePolicy::from_frames_per_second(2.5).expect("valid rate");
    assert_eq!(policy.to_string(), "2.5 fps");
}

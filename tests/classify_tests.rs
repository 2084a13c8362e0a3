// Threshold classification tests: band boundaries per parameter kind

use stationqc::classify::{Tier, classify, classify_vector};
use stationqc::models::{MetricVector, ParameterKind};

use ParameterKind::*;

#[test]
fn test_latency_bands() {
    assert_eq!(classify(Latency, Some(-1.0)), Some(Tier::Critical));
    assert_eq!(classify(Latency, Some(0.0)), Some(Tier::Good));
    assert_eq!(classify(Latency, Some(3.0)), Some(Tier::Good));
    assert_eq!(classify(Latency, Some(4.9)), Some(Tier::Good));
    assert_eq!(classify(Latency, Some(5.0)), Some(Tier::Warning));
    assert_eq!(classify(Latency, Some(7.0)), Some(Tier::Warning));
    assert_eq!(classify(Latency, Some(10.0)), Some(Tier::Critical));
    assert_eq!(classify(Latency, Some(12.0)), Some(Tier::Critical));
}

#[test]
fn test_delay_matches_latency() {
    for v in [-0.1, 0.0, 4.9, 5.0, 9.9, 10.0, 1000.0] {
        assert_eq!(classify(Delay, Some(v)), classify(Latency, Some(v)), "v = {}", v);
    }
}

#[test]
fn test_timing_quality_bands() {
    assert_eq!(classify(TimingQuality, Some(0.0)), Some(Tier::Critical));
    assert_eq!(classify(TimingQuality, Some(79.9)), Some(Tier::Critical));
    assert_eq!(classify(TimingQuality, Some(80.0)), Some(Tier::Good));
    assert_eq!(classify(TimingQuality, Some(100.0)), Some(Tier::Good));
    assert_eq!(classify(TimingQuality, Some(101.0)), None);
}

#[test]
fn test_count_bands() {
    for kind in [GapsCount, OverlapsCount] {
        assert_eq!(classify(kind, Some(0.0)), Some(Tier::Good));
        assert_eq!(classify(kind, Some(4.0)), Some(Tier::Good));
        assert_eq!(classify(kind, Some(5.0)), Some(Tier::Warning));
        assert_eq!(classify(kind, Some(9.0)), Some(Tier::Warning));
        assert_eq!(classify(kind, Some(10.0)), Some(Tier::Critical));
    }
}

#[test]
fn test_availability_bands() {
    assert_eq!(classify(Availability, None), Some(Tier::Critical));
    assert_eq!(classify(Availability, Some(89.9)), Some(Tier::Critical));
    assert_eq!(classify(Availability, Some(90.0)), Some(Tier::Warning));
    assert_eq!(classify(Availability, Some(92.0)), Some(Tier::Warning));
    assert_eq!(classify(Availability, Some(95.0)), Some(Tier::Good));
    assert_eq!(classify(Availability, Some(96.0)), Some(Tier::Good));
    assert_eq!(classify(Availability, Some(100.0)), Some(Tier::Good));
    assert_eq!(classify(Availability, Some(105.0)), None);
}

#[test]
fn test_absent_value_asymmetry() {
    // Missing latency/delay/timing is "unknown"; missing counts or
    // availability means the station is treated as down.
    assert_eq!(classify(Latency, None), Some(Tier::Unknown));
    assert_eq!(classify(Delay, None), Some(Tier::Unknown));
    assert_eq!(classify(TimingQuality, None), Some(Tier::Unknown));
    assert_eq!(classify(GapsCount, None), Some(Tier::Critical));
    assert_eq!(classify(OverlapsCount, None), Some(Tier::Critical));
    assert_eq!(classify(Availability, None), Some(Tier::Critical));
}

#[test]
fn test_classify_is_deterministic() {
    for kind in ParameterKind::ALL {
        for v in [None, Some(-5.0), Some(0.0), Some(7.5), Some(92.0), Some(150.0)] {
            assert_eq!(classify(kind, v), classify(kind, v));
        }
    }
}

#[test]
fn test_classify_unobserved_vector() {
    let tiers = classify_vector(&MetricVector::unobserved());
    assert_eq!(
        tiers,
        [
            Some(Tier::Unknown),
            Some(Tier::Unknown),
            Some(Tier::Unknown),
            Some(Tier::Critical),
            Some(Tier::Critical),
            Some(Tier::Critical),
        ]
    );
}

#[test]
fn test_classify_vector_slot_order() {
    let v = MetricVector([Some(2.0), Some(7.0), Some(99.0), Some(6.0), Some(0.0), Some(91.0)]);
    assert_eq!(
        classify_vector(&v),
        [
            Some(Tier::Good),
            Some(Tier::Warning),
            Some(Tier::Good),
            Some(Tier::Warning),
            Some(Tier::Good),
            Some(Tier::Warning),
        ]
    );
}

#[test]
fn test_tier_colors() {
    assert_eq!(Tier::Unknown.color(), "white");
    assert_eq!(Tier::Good.color(), "lightgreen");
    assert_eq!(Tier::Warning.color(), "#F9DA79");
    assert_eq!(Tier::Critical.color(), "#F97979");
}

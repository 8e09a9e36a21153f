// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use datasketches_hll::common::NumStdDev;
use datasketches_hll::error::ErrorKind;
use datasketches_hll::hll::CurMode;
use datasketches_hll::hll::HllSketch;
use datasketches_hll::hll::HllType;
use datasketches_hll::hll::HllUnion;
use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn sketch_of(lg_k: u8, hll_type: HllType, items: impl IntoIterator<Item = u64>) -> HllSketch {
    let mut sketch = HllSketch::new(lg_k, hll_type);
    for item in items {
        sketch.update(item);
    }
    sketch
}

#[test]
fn test_empty_union() {
    let union = HllUnion::new(12);
    assert!(union.is_empty());
    assert_eq!(union.estimate(), 0.0);
    assert_eq!(union.lg_max_k(), 12);
    assert_eq!(union.target_type(), HllType::Hll8);

    let result = union.result(HllType::Hll6);
    assert!(result.is_empty());
    assert_eq!(result.target_type(), HllType::Hll6);
    assert_eq!(result.lg_config_k(), 12);
}

#[test]
fn test_invalid_lg_max_k() {
    let err = HllUnion::try_new(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    let err = HllUnion::try_new(22).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_merge_empty_sketch_is_noop() {
    let mut union = HllUnion::new(12);
    union.merge(&sketch_of(12, HllType::Hll8, 0..5_000));
    let before = union.clone();

    union.merge(&HllSketch::new(12, HllType::Hll6));
    union.merge(&HllSketch::new(8, HllType::Hll8));
    union.merge_owned(HllSketch::new(16, HllType::Hll8));
    assert_eq!(union, before);
}

#[test]
fn test_direct_updates() {
    let mut union = HllUnion::new(11);
    for i in 0..1_000u64 {
        union.update(i);
    }
    union.update_f64(-0.0);
    union.update_f64(0.0);
    union.update_f32(2.0);
    assert_that!(union.estimate(), near(1_002.0, 1_002.0 * 0.05));
    assert!(!union.is_out_of_order());
}

#[test]
fn test_repeated_coupon_is_idempotent() {
    let mut union = HllUnion::new(10);
    union.update("x");
    let once = union.clone();
    union.update("x");
    union.coupon_update(datasketches_hll::hll::coupon("x"));
    assert_eq!(union, once);

    // the empty coupon carries no information
    union.coupon_update(datasketches_hll::hll::EMPTY_COUPON);
    assert_eq!(union, once);
}

#[test]
fn test_disjoint_sets_scenario() {
    let a = sketch_of(12, HllType::Hll8, 0..10_000);
    let b = sketch_of(12, HllType::Hll8, 10_000..20_000);

    let mut union = HllUnion::new(12);
    union.merge(&a);
    union.merge(&b);

    assert!(union.is_out_of_order());
    assert_eq!(union.current_mode(), CurMode::Hll);
    assert_that!(union.estimate(), near(20_000.0, 20_000.0 * 0.05));
    assert_that!(union.lower_bound(NumStdDev::Three), le(20_000.0));
    assert_that!(union.upper_bound(NumStdDev::Three), ge(20_000.0));

    let result = union.result(HllType::Hll6);
    assert_eq!(result.target_type(), HllType::Hll6);
    assert_eq!(result.estimate(), union.estimate());
}

#[test]
fn test_merge_order_does_not_matter() {
    let a = sketch_of(12, HllType::Hll6, 0..30_000);
    let b = sketch_of(12, HllType::Hll8, 15_000..60_000);

    let mut ab = HllUnion::new(12);
    ab.merge(&a);
    ab.merge(&b);

    let mut ba = HllUnion::new(12);
    ba.merge(&b);
    ba.merge(&a);

    // registers agree; only the carried accumulator depends on order
    assert_eq!(ab.estimate(), ba.estimate());
    assert_eq!(
        ab.lower_bound(NumStdDev::Two),
        ba.lower_bound(NumStdDev::Two)
    );
    assert_eq!(
        ab.upper_bound(NumStdDev::Two),
        ba.upper_bound(NumStdDev::Two)
    );
}

#[test]
fn test_mixed_precision_scenario() {
    let big = sketch_of(14, HllType::Hll8, 0..500);
    let small = sketch_of(10, HllType::Hll6, 0..500);
    let direct = sketch_of(10, HllType::Hll8, 0..500);
    assert_eq!(big.current_mode(), CurMode::Set);
    assert_eq!(small.current_mode(), CurMode::Hll);

    let mut big_first = HllUnion::new(10);
    big_first.merge(&big);
    big_first.merge(&small);

    let mut small_first = HllUnion::new(10);
    small_first.merge(&small);
    small_first.merge(&big);

    for union in [&big_first, &small_first] {
        assert_eq!(union.lg_config_k(), 10);
        assert_eq!(union.current_mode(), CurMode::Hll);
        assert!(union.is_out_of_order());
        assert_eq!(union.estimate(), direct.composite_estimate());
    }
}

#[test]
fn test_union_downsamples_dense_input() {
    let big = sketch_of(14, HllType::Hll8, 0..50_000);
    let direct = sketch_of(10, HllType::Hll8, 0..50_000);

    let mut union = HllUnion::new(10);
    union.merge(&big);
    assert_eq!(union.lg_config_k(), 10);
    assert!(!union.is_out_of_order());
    assert_eq!(union.composite_estimate(), direct.composite_estimate());

    // a coarser input drags the gadget down with it
    union.merge(&sketch_of(8, HllType::Hll8, 50_000..60_000));
    assert_eq!(union.lg_config_k(), 8);
    assert!(union.is_out_of_order());
    assert_that!(union.estimate(), near(60_000.0, 60_000.0 * 0.25));
}

#[test]
fn test_sparse_into_empty_union_keeps_sparse_mode() {
    let sketch = sketch_of(12, HllType::Hll6, 0..20);

    let mut union = HllUnion::new(12);
    union.merge(&sketch);
    assert_eq!(union.current_mode(), sketch.current_mode());
    assert_eq!(union.estimate(), sketch.estimate());
    assert!(!union.is_out_of_order());

    let mut other = HllUnion::new(12);
    other.update(1_000_000u64);
    other.merge(&sketch);
    assert!(other.is_out_of_order());
}

#[test]
fn test_finer_dense_source_into_sparse_gadget() {
    let mut union = HllUnion::new(10);
    for i in 100_000..100_003u64 {
        union.update(i);
    }
    assert_eq!(union.current_mode(), CurMode::List);

    let source = sketch_of(14, HllType::Hll8, 0..20_000);
    union.merge(&source);

    assert_eq!(union.lg_config_k(), 10);
    assert_eq!(union.current_mode(), CurMode::Hll);
    assert!(union.is_out_of_order());

    let expected = 20_003.0;
    assert_that!(union.lower_bound(NumStdDev::Three), le(expected));
    assert_that!(union.upper_bound(NumStdDev::Three), ge(expected));

    // same registers as a sketch that saw every item at the union's precision
    let mut direct = sketch_of(10, HllType::Hll8, 0..20_000);
    for i in 100_000..100_003u64 {
        direct.update(i);
    }
    assert_eq!(union.estimate(), direct.composite_estimate());
}

#[test]
fn test_sparse_into_dense_gadget() {
    let mut union = HllUnion::new(12);
    union.merge(&sketch_of(12, HllType::Hll8, 0..10_000));
    let before = union.estimate();

    union.merge(&sketch_of(12, HllType::Hll8, 10_000..10_005));
    assert!(union.is_out_of_order());
    assert_that!(union.estimate(), near(before, before * 0.05));
}

#[test]
fn test_merge_owned_matches_merge() {
    let mut rng = StdRng::seed_from_u64(42);
    let items: Vec<u64> = (0..20_000).map(|_| rng.random::<u64>()).collect();
    let sketch = sketch_of(11, HllType::Hll8, items.iter().copied());

    let mut borrowed = HllUnion::new(12);
    borrowed.merge(&sketch);
    let mut owned = HllUnion::new(12);
    owned.merge_owned(sketch.clone());

    assert_eq!(owned.estimate(), borrowed.estimate());
    assert_eq!(owned.result(HllType::Hll8), sketch);
    assert_eq!(borrowed.result(HllType::Hll8), sketch);
}

#[test]
fn test_many_random_merges() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut union = HllUnion::new(12);
    let mut total = 0u64;
    for _ in 0..20 {
        let lg_k = rng.random_range(11..=14u8);
        let n = rng.random_range(0..5_000u64);
        let hll_type = if rng.random::<bool>() {
            HllType::Hll6
        } else {
            HllType::Hll8
        };
        union.merge(&sketch_of(lg_k, hll_type, total..total + n));
        total += n;
    }

    let total = total as f64;
    assert_that!(union.estimate(), near(total, total * 0.1));
    assert_that!(union.lg_config_k(), le(12));
    assert_that!(union.lg_config_k(), ge(11));
}

#[test]
fn test_reset() {
    let mut union = HllUnion::new(11);
    union.merge(&sketch_of(8, HllType::Hll8, 0..10_000));
    assert_eq!(union.lg_config_k(), 8);

    union.reset();
    assert!(union.is_empty());
    assert_eq!(union.lg_config_k(), 11);
    assert_eq!(union, HllUnion::new(11));
}

#[test]
fn test_rel_err() {
    let upper = HllUnion::rel_err(true, true, 12, NumStdDev::Two);
    let lower = HllUnion::rel_err(false, true, 12, NumStdDev::Two);
    assert!(upper < 0.0);
    assert_eq!(lower, -upper);
    assert_that!(
        HllUnion::rel_err(false, false, 12, NumStdDev::Two),
        le(lower)
    );
}

#[test]
fn test_union_serialization_round_trip() {
    let mut union = HllUnion::new(12);
    union.merge(&sketch_of(12, HllType::Hll8, 0..10_000));
    union.merge(&sketch_of(12, HllType::Hll6, 5_000..25_000));

    for bytes in [union.serialize_compact(), union.serialize_updatable()] {
        let restored = HllUnion::deserialize(&bytes).unwrap();
        assert_eq!(restored.estimate(), union.estimate());
        assert_eq!(restored.lg_max_k(), 12);
        assert!(restored.is_out_of_order());
        assert_eq!(restored.serialization_version(), union.serialization_version());
    }
    assert_eq!(union.compact_serialization_bytes(), union.serialize_compact().len());
    assert_that!(
        HllUnion::max_serialization_bytes(12),
        ge(union.updatable_serialization_bytes())
    );

    // a dense union image read from a stream
    let bytes = union.serialize_compact();
    let restored = HllUnion::deserialize_from(&bytes[..]).unwrap();
    assert_eq!(restored, union);
}

#[test]
fn test_handles_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HllSketch>();
    assert_send_sync::<HllUnion>();
}

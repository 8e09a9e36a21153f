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

//! HyperLogLog Array8 mode - 8-bit (1 byte per slot) representation
//!
//! Array8 is the simplest HLL array implementation, storing one byte per slot.
//! It is the only dense layout a union gadget ever holds, so bucket-wise
//! merging and downsampling are implemented here.

use crate::common::NumStdDev;
use crate::hll::estimator::HipEstimator;
use crate::hll::mode::HllArray;
use crate::hll::get_slot;
use crate::hll::get_value;

/// Core Array8 data structure - one byte per slot, no packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array8 {
    lg_config_k: u8,
    /// Direct byte array: bytes[slot] = value
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    estimator: HipEstimator,
}

impl Array8 {
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1u32 << lg_config_k;

        Self {
            lg_config_k,
            bytes: vec![0u8; k as usize].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Reassemble an array from deserialized parts.
    pub fn from_parts(lg_config_k: u8, bytes: Box<[u8]>, estimator: HipEstimator) -> Self {
        debug_assert_eq!(bytes.len(), 1 << lg_config_k);
        let num_zeros = bytes.iter().filter(|&&v| v == 0).count() as u32;
        Self {
            lg_config_k,
            bytes,
            num_zeros,
            estimator,
        }
    }

    /// Copy any dense array at its own precision, keeping its estimator state.
    pub fn copy_of<A: HllArray + ?Sized>(src: &A) -> Self {
        let lg_config_k = src.lg_config_k();
        let bytes: Box<[u8]> = (0..src.num_registers())
            .map(|slot| src.get(slot as u32))
            .collect();
        Self {
            lg_config_k,
            bytes,
            num_zeros: src.num_zeros(),
            estimator: src.estimator().clone(),
        }
    }

    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        self.bytes[slot as usize]
    }

    #[inline]
    fn put(&mut self, slot: u32, value: u8) {
        self.bytes[slot as usize] = value;
    }

    pub fn values(&self) -> &[u8] {
        &self.bytes
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1u32 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get(slot);

        if new_value > old_value {
            self.estimator
                .update(self.lg_config_k, old_value, new_value);
            self.put(slot, new_value);
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    /// Replay every coupon of a sparse sketch into this array.
    pub fn merge_coupons(&mut self, coupons: impl Iterator<Item = u32>) {
        for coupon in coupons {
            self.update(coupon);
        }
    }

    /// Take the per-bucket maximum with another dense array.
    ///
    /// The source must be at least as fine as this array; finer sources are
    /// folded by masking their slot down to this array's precision. The
    /// estimator's KxQ registers and the zero count are rebuilt afterwards,
    /// the accumulator and out-of-order flag are left to the caller.
    pub fn merge_registers<A: HllArray + ?Sized>(&mut self, src: &A) {
        let src_lg_k = src.lg_config_k();
        assert!(
            src_lg_k >= self.lg_config_k,
            "merge_registers requires src_lg_k >= dst_lg_k (got src={}, dst={})",
            src_lg_k,
            self.lg_config_k
        );

        let dst_mask = (1u32 << self.lg_config_k) - 1;
        for src_slot in 0..src.num_registers() as u32 {
            let value = src.get(src_slot);
            if value > 0 {
                let dst_slot = src_slot & dst_mask;
                if value > self.get(dst_slot) {
                    self.put(dst_slot, value);
                }
            }
        }
        self.rebuild_estimator_from_registers();
    }

    fn rebuild_estimator_from_registers(&mut self) {
        self.num_zeros = self.bytes.iter().filter(|&&v| v == 0).count() as u32;
        self.estimator.rebuild_kxq(self.bytes.iter().copied());
    }

    pub fn estimate(&self) -> f64 {
        self.estimator.estimate(self.lg_config_k, self.num_zeros)
    }

    pub fn composite_estimate(&self) -> f64 {
        self.estimator
            .composite_estimate(self.lg_config_k, self.num_zeros)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .upper_bound(self.lg_config_k, self.num_zeros, num_std_dev)
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .lower_bound(self.lg_config_k, self.num_zeros, num_std_dev)
    }

    pub fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    pub fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut HipEstimator {
        &mut self.estimator
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }
}

impl HllArray for Array8 {
    fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    fn get(&self, slot: u32) -> u8 {
        Array8::get(self, slot)
    }

    fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }
}

/// Produce an Array8 at no more than `tgt_lg_k` from any dense array.
///
/// Sources at or below the target precision are copied as they are. Finer
/// sources are folded bucket-wise into a zeroed array at `tgt_lg_k`; the
/// accumulator and out-of-order flag are then copied from the source, both
/// of which are needed for the result to match a sketch built at `tgt_lg_k`
/// from the same stream.
pub(super) fn copy_or_downsample<A: HllArray + ?Sized>(src: &A, tgt_lg_k: u8) -> Array8 {
    let src_lg_k = src.lg_config_k();
    if src_lg_k <= tgt_lg_k {
        return Array8::copy_of(src);
    }

    log::debug!("downsampling HLL array from lg_k={src_lg_k} to lg_k={tgt_lg_k}");
    let mut result = Array8::new(tgt_lg_k);
    result.merge_registers(src);
    result
        .estimator_mut()
        .set_hip_accum(src.estimator().hip_accum());
    result
        .estimator_mut()
        .set_out_of_order(src.estimator().is_out_of_order());
    result
}

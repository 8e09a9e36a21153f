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

//! HyperLogLog Array6 mode - 6-bit packed representation
//!
//! Array6 stores HLL register values using 6 bits per slot, providing a range of 0-63.
//! Coupon values never exceed 63, so no exception table is needed.

use crate::common::NumStdDev;
use crate::hll::estimator::HipEstimator;
use crate::hll::mode::HllArray;
use crate::hll::get_slot;
use crate::hll::get_value;

const VAL_MASK_6: u16 = 0x3F; // 6 bits: 0b0011_1111

/// Core Array6 data structure - stores 6-bit values with cross-byte packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array6 {
    lg_config_k: u8,
    /// Packed 6-bit values, may cross byte boundaries
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    estimator: HipEstimator,
}

impl Array6 {
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;

        Self {
            lg_config_k,
            bytes: vec![0u8; num_bytes_for_k(k)].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Reassemble an array from deserialized packed bytes.
    pub fn from_parts(lg_config_k: u8, bytes: Box<[u8]>, estimator: HipEstimator) -> Self {
        debug_assert_eq!(bytes.len(), num_bytes_for_k(1 << lg_config_k));
        let mut arr = Self {
            lg_config_k,
            bytes,
            num_zeros: 0,
            estimator,
        };
        arr.num_zeros = (0..1u32 << lg_config_k)
            .filter(|&slot| arr.get_raw(slot) == 0)
            .count() as u32;
        arr
    }

    /// Repack any dense array at its own precision, keeping its estimator state.
    pub fn copy_of<A: HllArray + ?Sized>(src: &A) -> Self {
        let mut arr = Self::new(src.lg_config_k());
        for slot in 0..src.num_registers() as u32 {
            let value = src.get(slot);
            if value > 0 {
                arr.put_raw(slot, value.min(VAL_MASK_6 as u8));
            }
        }
        arr.num_zeros = src.num_zeros();
        arr.estimator = src.estimator().clone();
        arr
    }

    /// Get value from a slot (6-bit value)
    ///
    /// Uses 16-bit window reads to handle values crossing byte boundaries.
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 7) as u8;

        let two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        ((two_bytes >> shift) & VAL_MASK_6) as u8
    }

    /// Set value in a slot (6-bit value)
    ///
    /// Uses read-modify-write on 16-bit window to preserve surrounding bits.
    #[inline]
    fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= 63, "6-bit value must be 0-63");

        let start_bit = slot * 6;
        let byte_idx = (start_bit >> 3) as usize;
        let shift = (start_bit & 0x7) as u8;

        let mut two_bytes = u16::from_le_bytes([self.bytes[byte_idx], self.bytes[byte_idx + 1]]);
        two_bytes &= !(VAL_MASK_6 << shift);
        two_bytes |= ((value as u16) & VAL_MASK_6) << shift;

        let bytes_out = two_bytes.to_le_bytes();
        self.bytes[byte_idx] = bytes_out[0];
        self.bytes[byte_idx + 1] = bytes_out[1];
    }

    /// Packed register bytes as stored on the wire.
    pub fn packed_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get_raw(slot);

        if new_value > old_value {
            self.estimator
                .update(self.lg_config_k, old_value, new_value);
            self.put_raw(slot, new_value);
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
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
}

impl HllArray for Array6 {
    fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    fn get(&self, slot: u32) -> u8 {
        self.get_raw(slot)
    }

    fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    fn estimator(&self) -> &HipEstimator {
        &self.estimator
    }
}

/// Calculate number of bytes needed for k slots with 6 bits each
pub(super) fn num_bytes_for_k(k: u32) -> usize {
    // k slots * 6 bits = k * 3/4 bytes, plus one for the 16-bit window read
    (((k * 3) >> 2) + 1) as usize
}

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

//! Base container for coupon storage with cardinality estimation
//!
//! Provides a simple array-based storage for coupons shared by the List and
//! Set modes, together with the coupon-mode estimator and its confidence bounds.

use crate::common::NumStdDev;
use crate::hll::COUPON_RSE;
use crate::hll::EMPTY_COUPON;
use crate::hll::KEY_BITS_26;

/// Number of distinct slots a coupon can address.
const COUPON_SPACE: f64 = (1u64 << KEY_BITS_26) as f64;

/// Container for storing coupons with basic cardinality estimation
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// Log2 of container size
    lg_size: u8,
    /// Array of coupon values (0 = empty)
    coupons: Box<[u32]>,
    /// Number of non-empty coupons
    len: usize,
    /// Whether coupons may have arrived out of the original stream order
    out_of_order: bool,
}

impl Container {
    pub fn new(lg_size: u8) -> Self {
        Self {
            lg_size,
            coupons: vec![EMPTY_COUPON; 1 << lg_size].into_boxed_slice(),
            len: 0,
            out_of_order: false,
        }
    }

    /// Create container from existing coupons
    pub fn from_coupons(lg_size: u8, coupons: Box<[u32]>, out_of_order: bool) -> Self {
        debug_assert_eq!(coupons.len(), 1 << lg_size);
        let len = coupons.iter().filter(|&&c| c != EMPTY_COUPON).count();
        Self {
            lg_size,
            coupons,
            len,
            out_of_order,
        }
    }

    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw slots including empty ones, in storage order.
    pub fn slots(&self) -> &[u32] {
        &self.coupons
    }

    pub(super) fn slots_mut(&mut self) -> &mut [u32] {
        &mut self.coupons
    }

    /// Records that a coupon was written into a previously empty slot.
    pub(super) fn inc_len(&mut self) {
        self.len += 1;
    }

    /// Iterate over stored (non-empty) coupons.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.coupons.iter().copied().filter(|&c| c != EMPTY_COUPON)
    }

    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
    }

    /// Get cardinality estimate by inverting the coupon collector expectation
    pub fn estimate(&self) -> f64 {
        let len = self.len as f64;
        len.max(inverse_coupon_collector(len))
    }

    /// Get upper confidence bound for cardinality estimate
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        let len = self.len as f64;
        let est = inverse_coupon_collector(len);
        let bound = est / (1.0 - num_std_dev.as_f64() * COUPON_RSE);
        len.max(bound)
    }

    /// Get lower confidence bound for cardinality estimate
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        let len = self.len as f64;
        let est = inverse_coupon_collector(len);
        let bound = est / (1.0 + num_std_dev.as_f64() * COUPON_RSE);
        len.max(bound)
    }
}

/// Expected number of draws needed to see `len` distinct coupons.
fn inverse_coupon_collector(len: f64) -> f64 {
    if len <= 0.0 {
        return 0.0;
    }
    -COUPON_SPACE * (-len / COUPON_SPACE).ln_1p()
}

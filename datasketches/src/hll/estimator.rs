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

//! HIP (Historical Inverse Probability) Estimator for HyperLogLog
//!
//! The HIP estimator maintains an accumulator that tracks the historical
//! sequence of register updates. It is only valid while registers are updated
//! in stream order; once a sketch is the product of a bucket-wise merge the
//! out-of-order flag is raised and the composite estimator (raw HLL blended
//! with linear counting) is used instead.

use crate::common::NumStdDev;

/// RSE factor of the HIP estimator, `sqrt(ln 2)`.
const HLL_HIP_RSE_FACTOR: f64 = 0.8325546;
/// RSE factor of the composite estimator, `sqrt(3 ln 2 - 1)`.
const HLL_NON_HIP_RSE_FACTOR: f64 = 1.03896;

/// HIP estimator with KxQ registers for improved cardinality estimation
///
/// Composed into Array6 and Array8.
#[derive(Debug, Clone, PartialEq)]
pub struct HipEstimator {
    /// HIP estimator accumulator
    hip_accum: f64,
    /// KxQ register for values < 32 (larger inverse powers)
    kxq0: f64,
    /// KxQ register for values >= 32 (tiny inverse powers)
    kxq1: f64,
    /// Out-of-order flag: when true, HIP updates are skipped
    out_of_order: bool,
}

impl HipEstimator {
    /// Create a new HIP estimator for a sketch with 2^lg_config_k registers
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1u32 << lg_config_k;
        Self {
            hip_accum: 0.0,
            kxq0: k as f64, // All registers start at 0, so kxq0 = k * (1/2^0) = k
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Update the estimator when a register changes from old_value to new_value
    ///
    /// Must be called before the register itself is written.
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1u32 << lg_config_k) as f64;

        if !self.out_of_order {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        self.update_kxq(old_value, new_value);
    }

    fn update_kxq(&mut self, old_value: u8, new_value: u8) {
        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Recompute both KxQ registers from scratch.
    pub fn rebuild_kxq(&mut self, registers: impl Iterator<Item = u8>) {
        let mut kxq0 = 0.0;
        let mut kxq1 = 0.0;
        for value in registers {
            if value < 32 {
                kxq0 += inv_pow2(value);
            } else {
                kxq1 += inv_pow2(value);
            }
        }
        self.kxq0 = kxq0;
        self.kxq1 = kxq1;
    }

    /// Get the current cardinality estimate
    ///
    /// Dispatches to either HIP or composite estimator based on out-of-order flag.
    pub fn estimate(&self, lg_config_k: u8, num_zeros: u32) -> f64 {
        if self.out_of_order {
            self.composite_estimate(lg_config_k, num_zeros)
        } else {
            self.hip_accum
        }
    }

    /// Raw HLL estimate, `alpha * k^2 / sum(2^-register)`.
    fn raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1u32 << lg_config_k) as f64;

        let correction_factor = match lg_config_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / k),
        };

        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Linear counting over the empty registers.
    fn bitmap_estimate(lg_config_k: u8, num_zeros: u32) -> f64 {
        let k = (1u32 << lg_config_k) as f64;
        k * (k / num_zeros as f64).ln()
    }

    /// Estimate that does not depend on the update order of the registers.
    ///
    /// Raw HLL, with linear counting in the small range where empty registers remain.
    pub fn composite_estimate(&self, lg_config_k: u8, num_zeros: u32) -> f64 {
        let k = (1u32 << lg_config_k) as f64;
        let raw_est = self.raw_estimate(lg_config_k);
        if num_zeros > 0 && raw_est <= 2.5 * k {
            Self::bitmap_estimate(lg_config_k, num_zeros)
        } else {
            raw_est
        }
    }

    pub fn upper_bound(&self, lg_config_k: u8, num_zeros: u32, num_std_dev: NumStdDev) -> f64 {
        let est = self.estimate(lg_config_k, num_zeros);
        let rel_err = rel_err(true, self.out_of_order, lg_config_k, num_std_dev);
        est / (1.0 + rel_err)
    }

    pub fn lower_bound(&self, lg_config_k: u8, num_zeros: u32, num_std_dev: NumStdDev) -> f64 {
        let k = 1u32 << lg_config_k;
        let num_non_zeros = (k - num_zeros) as f64;
        let est = self.estimate(lg_config_k, num_zeros);
        let rel_err = rel_err(false, self.out_of_order, lg_config_k, num_std_dev);
        num_non_zeros.max(est / (1.0 + rel_err))
    }

    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    /// Set the out-of-order flag
    ///
    /// The accumulator is kept as is; the flag only selects which estimate is reported.
    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
    }

    pub fn set_hip_accum(&mut self, value: f64) {
        self.hip_accum = value;
    }

    pub fn set_kxq0(&mut self, value: f64) {
        self.kxq0 = value;
    }

    pub fn set_kxq1(&mut self, value: f64) {
        self.kxq1 = value;
    }
}

/// Relative error of an HLL estimate at the requested confidence.
///
/// Negative for the upper bound and positive for the lower bound, so that
/// `estimate / (1 + rel_err)` yields the bound. `unioned` selects the
/// composite estimator's wider error.
pub(super) fn rel_err(upper_bound: bool, unioned: bool, lg_config_k: u8, num_std_dev: NumStdDev) -> f64 {
    let k = (1u32 << lg_config_k) as f64;
    let factor = if unioned {
        HLL_NON_HIP_RSE_FACTOR
    } else {
        HLL_HIP_RSE_FACTOR
    };
    let rse = num_std_dev.as_f64() * factor / k.sqrt();
    if upper_bound { -rse } else { rse }
}

/// Compute 1 / 2^value (inverse power of 2)
#[inline]
fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

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

use crate::common::NumStdDev;
use crate::hll::CurMode;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;

/// Read access shared by the dense register arrays.
pub(super) trait HllArray {
    fn lg_config_k(&self) -> u8;

    fn get(&self, slot: u32) -> u8;

    fn num_zeros(&self) -> u32;

    fn estimator(&self) -> &HipEstimator;

    fn num_registers(&self) -> usize {
        1 << self.lg_config_k()
    }
}

/// The single representation owned by a sketch.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Mode {
    List(List),
    Set(HashSet),
    Array6(Array6),
    Array8(Array8),
}

impl Default for Mode {
    fn default() -> Self {
        Mode::List(List::default())
    }
}

impl Mode {
    pub fn cur_mode(&self) -> CurMode {
        match self {
            Mode::List(_) => CurMode::List,
            Mode::Set(_) => CurMode::Set,
            Mode::Array6(_) | Mode::Array8(_) => CurMode::Hll,
        }
    }

    /// The dense array behind an HLL-mode representation.
    pub fn dense(&self) -> Option<&dyn HllArray> {
        match self {
            Mode::Array6(arr) => Some(arr),
            Mode::Array8(arr) => Some(arr),
            Mode::List(_) | Mode::Set(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Mode::List(list) => list.container().is_empty(),
            Mode::Set(set) => set.container().is_empty(),
            Mode::Array6(arr) => arr.num_zeros() == 1 << arr.lg_config_k(),
            Mode::Array8(arr) => arr.num_zeros() == 1 << arr.lg_config_k(),
        }
    }

    pub fn estimate(&self) -> f64 {
        match self {
            Mode::List(list) => list.container().estimate(),
            Mode::Set(set) => set.container().estimate(),
            Mode::Array6(arr) => arr.estimate(),
            Mode::Array8(arr) => arr.estimate(),
        }
    }

    pub fn composite_estimate(&self) -> f64 {
        match self {
            Mode::List(list) => list.container().estimate(),
            Mode::Set(set) => set.container().estimate(),
            Mode::Array6(arr) => arr.composite_estimate(),
            Mode::Array8(arr) => arr.composite_estimate(),
        }
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self {
            Mode::List(list) => list.container().upper_bound(num_std_dev),
            Mode::Set(set) => set.container().upper_bound(num_std_dev),
            Mode::Array6(arr) => arr.upper_bound(num_std_dev),
            Mode::Array8(arr) => arr.upper_bound(num_std_dev),
        }
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        match self {
            Mode::List(list) => list.container().lower_bound(num_std_dev),
            Mode::Set(set) => set.container().lower_bound(num_std_dev),
            Mode::Array6(arr) => arr.lower_bound(num_std_dev),
            Mode::Array8(arr) => arr.lower_bound(num_std_dev),
        }
    }

    pub fn is_out_of_order(&self) -> bool {
        match self {
            Mode::List(list) => list.container().is_out_of_order(),
            Mode::Set(set) => set.container().is_out_of_order(),
            Mode::Array6(arr) => arr.estimator().is_out_of_order(),
            Mode::Array8(arr) => arr.estimator().is_out_of_order(),
        }
    }

    pub fn set_out_of_order(&mut self, ooo: bool) {
        match self {
            Mode::List(list) => list.container_mut().set_out_of_order(ooo),
            Mode::Set(set) => set.container_mut().set_out_of_order(ooo),
            Mode::Array6(arr) => arr.estimator_mut().set_out_of_order(ooo),
            Mode::Array8(arr) => arr.estimator_mut().set_out_of_order(ooo),
        }
    }

    fn estimator_mut(&mut self) -> Option<&mut HipEstimator> {
        match self {
            Mode::Array6(arr) => Some(arr.estimator_mut()),
            Mode::Array8(arr) => Some(arr.estimator_mut()),
            Mode::List(_) | Mode::Set(_) => None,
        }
    }

    pub fn hip_accum(&self) -> Option<f64> {
        self.dense().map(|arr| arr.estimator().hip_accum())
    }

    /// Overwrites the accumulator of a dense array; sparse modes have none.
    pub fn set_hip_accum(&mut self, value: f64) -> bool {
        match self.estimator_mut() {
            Some(estimator) => {
                estimator.set_hip_accum(value);
                true
            }
            None => false,
        }
    }
}

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

//! HyperLogLog Union for combining multiple HLL sketches
//!
//! The union maintains an internal "gadget" sketch that accumulates the union
//! of all input sketches. It can handle sketches with:
//! - Different lg_k values (the gadget is downsampled as needed)
//! - Different modes (List, Set, Array6/8)
//! - Different target HLL types
//!
//! The gadget always targets [`HllType::Hll8`] and never holds more than
//! `2^lg_max_k` buckets.
//!
//! # Example
//!
//! ```
//! use datasketches_hll::hll::{HllSketch, HllType, HllUnion};
//!
//! let mut sketch1 = HllSketch::new(12, HllType::Hll8);
//! sketch1.update("foo");
//! sketch1.update("bar");
//!
//! let mut sketch2 = HllSketch::new(12, HllType::Hll6);
//! sketch2.update("bar");
//! sketch2.update("baz");
//!
//! let mut union = HllUnion::new(12);
//! union.merge(&sketch1);
//! union.merge_owned(sketch2);
//!
//! let result = union.result(HllType::Hll8);
//! assert!((result.estimate() - 3.0).abs() < 0.01);
//! ```

use std::hash::Hash;
use std::io::Read;
use std::io::Write;

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::EMPTY_COUPON;
use crate::hll::HllSketch;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::array8::Array8;
use crate::hll::array8::copy_or_downsample;
use crate::hll::check_lg_k;
use crate::hll::container::Container;
use crate::hll::estimator;
use crate::hll::mode::HllArray;
use crate::hll::mode::Mode;
use crate::hll::serialization::SER_VER;

/// An HLL Union for combining multiple HLL sketches.
#[derive(Debug, Clone, PartialEq)]
pub struct HllUnion {
    /// Maximum lg_k that this union can handle
    lg_max_k: u8,
    /// Internal sketch that accumulates the union
    gadget: HllSketch,
}

impl HllUnion {
    /// Create a new HLL Union
    ///
    /// # Arguments
    ///
    /// * `lg_max_k` - Maximum log2 of the number of buckets. Must be in [4, 21].
    ///   Input sketches with larger lg_k will be down-sampled.
    ///
    /// # Panics
    ///
    /// Panics if `lg_max_k` is not in the range [4, 21].
    pub fn new(lg_max_k: u8) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_max_k),
            "lg_max_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_max_k}"
        );
        Self::with_lg_max_k(lg_max_k)
    }

    /// Create a new HLL Union, rejecting an out-of-range `lg_max_k`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `lg_max_k` is not in the range [4, 21].
    pub fn try_new(lg_max_k: u8) -> Result<Self, Error> {
        check_lg_k(lg_max_k).map(Self::with_lg_max_k)
    }

    fn with_lg_max_k(lg_max_k: u8) -> Self {
        Self {
            lg_max_k,
            gadget: HllSketch::new(lg_max_k, HllType::Hll8),
        }
    }

    /// Update the union with a single hashable value.
    pub fn update<T: Hash>(&mut self, value: T) {
        self.gadget.update(value);
    }

    pub fn update_f64(&mut self, value: f64) {
        self.gadget.update_f64(value);
    }

    pub fn update_f32(&mut self, value: f32) {
        self.gadget.update_f32(value);
    }

    /// Update the union with a precomputed coupon. The empty coupon is ignored.
    pub fn coupon_update(&mut self, coupon: u32) {
        if coupon == EMPTY_COUPON {
            return;
        }
        self.gadget.update_with_coupon(coupon);
    }

    /// Merge a sketch into the union.
    ///
    /// An empty sketch leaves the union untouched.
    pub fn merge(&mut self, sketch: &HllSketch) {
        if sketch.is_empty() {
            return;
        }
        self.union_impl(sketch);
    }

    /// Merge a sketch the caller no longer needs.
    ///
    /// An empty union adopts an `Hll8` sketch as its gadget without copying,
    /// provided the sketch is dense or already at `lg_max_k`.
    pub fn merge_owned(&mut self, sketch: HllSketch) {
        if sketch.is_empty() {
            return;
        }
        if self.gadget.is_empty()
            && sketch.target_type() == HllType::Hll8
            && sketch.lg_config_k() <= self.lg_max_k
            && (sketch.current_mode() == CurMode::Hll || sketch.lg_config_k() == self.lg_max_k)
        {
            log::debug!(
                "adopting {:?} mode sketch with lg_k={} as union gadget",
                sketch.current_mode(),
                sketch.lg_config_k()
            );
            self.gadget = sketch;
            return;
        }
        self.union_impl(&sketch);
    }

    fn union_impl(&mut self, sketch: &HllSketch) {
        match sketch.mode() {
            Mode::List(list) => self.merge_sparse(sketch, list.container()),
            Mode::Set(set) => self.merge_sparse(sketch, set.container()),
            Mode::Array6(arr) => self.merge_dense(arr),
            Mode::Array8(arr) => self.merge_dense(arr),
        }
    }

    fn merge_sparse(&mut self, sketch: &HllSketch, coupons: &Container) {
        let gadget_was_empty = self.gadget.is_empty();
        if gadget_was_empty && sketch.lg_config_k() == self.gadget.lg_config_k() {
            log::trace!("union: sparse source into empty gadget, copying as Hll8");
            self.gadget = sketch.copy_as(HllType::Hll8);
            return;
        }

        log::trace!(
            "union: replaying {} coupons into {:?} gadget",
            coupons.len(),
            self.gadget.current_mode()
        );
        for coupon in coupons.iter() {
            self.gadget.update_with_coupon(coupon);
        }
        if !gadget_was_empty {
            self.gadget.set_out_of_order();
        }
    }

    fn merge_dense<A: HllArray + ?Sized>(&mut self, src: &A) {
        if self.gadget.is_empty() {
            log::trace!("union: dense source into empty gadget");
            self.install(copy_or_downsample(src, self.lg_max_k));
            return;
        }

        let lg_max_k = self.lg_max_k;
        let replacement = match self.gadget.mode_mut() {
            Mode::List(list) => {
                log::trace!("union: dense source into LIST gadget");
                Some(dense_with_coupons(src, list.container(), lg_max_k))
            }
            Mode::Set(set) => {
                log::trace!("union: dense source into SET gadget");
                Some(dense_with_coupons(src, set.container(), lg_max_k))
            }
            Mode::Array8(dst) => {
                log::trace!(
                    "union: dense merge, src lg_k={}, gadget lg_k={}",
                    src.lg_config_k(),
                    dst.lg_config_k()
                );
                if src.lg_config_k() < dst.lg_config_k() {
                    let mut downsampled = copy_or_downsample(&*dst, src.lg_config_k());
                    merge_registers_out_of_order(&mut downsampled, src);
                    Some(downsampled)
                } else {
                    merge_registers_out_of_order(dst, src);
                    None
                }
            }
            Mode::Array6(dst) => {
                // never produced by the union itself, which works in Hll8
                let tgt_lg_k = src.lg_config_k().min(dst.lg_config_k());
                let mut widened = copy_or_downsample(&*dst, tgt_lg_k);
                merge_registers_out_of_order(&mut widened, src);
                Some(widened)
            }
        };

        if let Some(arr) = replacement {
            self.install(arr);
        }
    }

    /// Replace the gadget with a dense Hll8 array in one assignment.
    fn install(&mut self, arr: Array8) {
        log::debug!(
            "replacing {:?} mode union gadget with HLL array at lg_k={}",
            self.gadget.current_mode(),
            arr.lg_config_k()
        );
        debug_assert!(arr.lg_config_k() <= self.lg_max_k);
        self.gadget = HllSketch::from_parts(arr.lg_config_k(), HllType::Hll8, Mode::Array8(arr));
    }

    /// Get the union result as a new sketch in the requested layout.
    pub fn result(&self, hll_type: HllType) -> HllSketch {
        self.gadget.copy_as(hll_type)
    }

    /// Reset the union to its initial empty state at `lg_max_k`.
    pub fn reset(&mut self) {
        log::debug!("resetting union gadget to lg_k={}", self.lg_max_k);
        self.gadget = HllSketch::new(self.lg_max_k, HllType::Hll8);
    }

    pub fn is_empty(&self) -> bool {
        self.gadget.is_empty()
    }

    pub fn estimate(&self) -> f64 {
        self.gadget.estimate()
    }

    pub fn composite_estimate(&self) -> f64 {
        self.gadget.composite_estimate()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.lower_bound(num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.upper_bound(num_std_dev)
    }

    pub fn is_out_of_order(&self) -> bool {
        self.gadget.is_out_of_order()
    }

    pub fn current_mode(&self) -> CurMode {
        self.gadget.current_mode()
    }

    pub fn is_estimation_mode(&self) -> bool {
        self.gadget.is_estimation_mode()
    }

    /// Get the current lg_config_k of the internal gadget
    pub fn lg_config_k(&self) -> u8 {
        self.gadget.lg_config_k()
    }

    /// Get the maximum lg_k this union can handle
    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }

    /// The union always works in the 8-bit layout.
    pub fn target_type(&self) -> HllType {
        HllType::Hll8
    }

    pub fn serialize_compact(&self) -> Vec<u8> {
        self.gadget.serialize_compact()
    }

    pub fn serialize_updatable(&self) -> Vec<u8> {
        self.gadget.serialize_updatable()
    }

    /// Write the gadget's compact image to a stream.
    pub fn serialize_compact_to<W: Write>(&self, writer: W) -> Result<(), Error> {
        self.gadget.serialize_compact_to(writer)
    }

    /// Write the gadget's updatable image to a stream.
    pub fn serialize_updatable_to<W: Write>(&self, writer: W) -> Result<(), Error> {
        self.gadget.serialize_updatable_to(writer)
    }

    pub fn compact_serialization_bytes(&self) -> usize {
        self.gadget.compact_serialization_bytes()
    }

    pub fn updatable_serialization_bytes(&self) -> usize {
        self.gadget.updatable_serialization_bytes()
    }

    /// Largest image a union with this `lg_k` can serialize to.
    pub fn max_serialization_bytes(lg_k: u8) -> usize {
        HllSketch::max_updatable_serialization_bytes(lg_k, HllType::Hll8)
    }

    pub fn serialization_version(&self) -> u8 {
        SER_VER
    }

    /// Relative error of the bounds for a sketch with `lg_config_k`.
    ///
    /// `unioned` selects the wider error of a sketch built by merging.
    pub fn rel_err(
        upper_bound: bool,
        unioned: bool,
        lg_config_k: u8,
        num_std_dev: NumStdDev,
    ) -> f64 {
        estimator::rel_err(upper_bound, unioned, lg_config_k, num_std_dev)
    }

    /// Rebuild a union from a serialized sketch or union.
    ///
    /// The union is created at the sketch's precision. A dense `Hll8` image
    /// becomes the gadget directly; anything else is merged in.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllSketch, HllType, HllUnion};
    /// let mut sketch = HllSketch::new(11, HllType::Hll6);
    /// for i in 0..10_000 {
    ///     sketch.update(i);
    /// }
    /// let union = HllUnion::deserialize(&sketch.serialize_compact()).unwrap();
    /// assert_eq!(union.lg_max_k(), 11);
    /// assert_eq!(union.estimate(), sketch.estimate());
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<HllUnion, Error> {
        HllSketch::deserialize(bytes).map(HllUnion::from_sketch)
    }

    /// Rebuild a union from one serialized sketch read off a stream.
    pub fn deserialize_from<R: Read>(reader: R) -> Result<HllUnion, Error> {
        HllSketch::deserialize_from(reader).map(HllUnion::from_sketch)
    }

    fn from_sketch(sketch: HllSketch) -> HllUnion {
        let mut union = HllUnion::new(sketch.lg_config_k());
        if matches!(sketch.mode(), Mode::Array8(_)) {
            log::debug!("adopting deserialized HLL array as union gadget");
            union.gadget = sketch;
        } else {
            union.merge_owned(sketch);
        }
        union
    }

    pub fn to_summary_string(&self) -> String {
        self.gadget.to_summary_string()
    }

    /// See [`HllSketch::to_detail_string`].
    pub fn to_detail_string(&self, all: bool) -> String {
        self.gadget.to_detail_string(all)
    }
}

/// Fold a sparse gadget's coupons into a dense copy of `src`.
///
/// The coupons are treated as having the maximum addressable precision, so
/// `src` is only reduced to `lg_max_k`.
fn dense_with_coupons<A: HllArray + ?Sized>(src: &A, coupons: &Container, lg_max_k: u8) -> Array8 {
    let mut arr = copy_or_downsample(src, lg_max_k);
    arr.merge_coupons(coupons.iter());
    arr.estimator_mut().set_out_of_order(true);
    arr
}

fn merge_registers_out_of_order<A: HllArray + ?Sized>(dst: &mut Array8, src: &A) {
    dst.merge_registers(src);
    dst.estimator_mut().set_out_of_order(true);
}

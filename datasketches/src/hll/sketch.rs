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

//! HyperLogLog sketch
//!
//! The sketch owns exactly one representation at a time. Updates may replace
//! it with a larger one (LIST to SET to HLL); the replacement is installed in
//! a single assignment so the old representation is dropped exactly once.

use std::fmt::Write as _;
use std::hash::Hash;
use std::io::Read;
use std::io::Write;

use crate::common::NumStdDev;
use crate::common::canonical_double;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::hll::CurMode;
use crate::hll::EMPTY_COUPON;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::array8::copy_or_downsample;
use crate::hll::check_lg_k;
use crate::hll::container::Container;
use crate::hll::coupon;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::hash_set::HashSet;
use crate::hll::hash_set::LG_INIT_SET_SIZE;
use crate::hll::mode::HllArray;
use crate::hll::mode::Mode;
use crate::hll::serialization;

/// Below this precision a full LIST goes straight to HLL mode.
const LG_LIST_TO_HLL_THRESHOLD: u8 = 8;

/// A HyperLogLog sketch estimating the number of distinct items seen.
///
/// # Examples
///
/// ```
/// # use datasketches_hll::hll::{CurMode, HllSketch, HllType};
/// let mut sketch = HllSketch::new(12, HllType::Hll8);
/// for i in 0..1000 {
///     sketch.update(i);
/// }
/// assert_eq!(sketch.current_mode(), CurMode::Hll);
/// assert!((sketch.estimate() - 1000.0).abs() < 50.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HllSketch {
    lg_config_k: u8,
    target_type: HllType,
    mode: Mode,
}

impl HllSketch {
    /// Create a new empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in the range [4, 21].
    pub fn new(lg_config_k: u8, target_type: HllType) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
        );
        Self::from_parts(lg_config_k, target_type, Mode::default())
    }

    /// Create a new empty sketch, rejecting an out-of-range precision.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::error::ErrorKind;
    /// # use datasketches_hll::hll::{HllSketch, HllType};
    /// let err = HllSketch::try_new(3, HllType::Hll6).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    /// ```
    pub fn try_new(lg_config_k: u8, target_type: HllType) -> Result<Self, Error> {
        let lg_config_k = check_lg_k(lg_config_k)?;
        Ok(Self::from_parts(lg_config_k, target_type, Mode::default()))
    }

    pub(super) fn from_parts(lg_config_k: u8, target_type: HllType, mode: Mode) -> Self {
        Self {
            lg_config_k,
            target_type,
            mode,
        }
    }

    pub(super) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(super) fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    /// Layout used once the sketch reaches HLL mode.
    pub fn target_type(&self) -> HllType {
        self.target_type
    }

    pub fn current_mode(&self) -> CurMode {
        self.mode.cur_mode()
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_empty()
    }

    /// Always true: even sparse coupons only approximate the distinct items.
    pub fn is_estimation_mode(&self) -> bool {
        true
    }

    /// Update the sketch with a hashable value.
    ///
    /// For `f32`/`f64` values, use `update_f32`/`update_f64` instead.
    pub fn update<T: Hash>(&mut self, value: T) {
        self.update_with_coupon(coupon(value));
    }

    /// Update the sketch with a f64 value.
    pub fn update_f64(&mut self, value: f64) {
        self.update(canonical_double(value));
    }

    /// Update the sketch with a f32 value.
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// Update the sketch with a precomputed coupon.
    ///
    /// The empty coupon is ignored. When the update fills the current
    /// representation, the promoted one replaces it.
    pub fn update_with_coupon(&mut self, coupon: u32) {
        if coupon == EMPTY_COUPON {
            return;
        }

        let promoted = match &mut self.mode {
            Mode::List(list) => {
                list.update(coupon);
                let container = list.container();
                if !container.is_full() {
                    None
                } else if self.lg_config_k < LG_LIST_TO_HLL_THRESHOLD {
                    Some(promote_to_hll(
                        self.lg_config_k,
                        self.target_type,
                        container,
                    ))
                } else {
                    let mut set = HashSet::from_coupons(LG_INIT_SET_SIZE, container.iter());
                    set.container_mut()
                        .set_out_of_order(container.is_out_of_order());
                    Some(Mode::Set(set))
                }
            }
            Mode::Set(set) => {
                set.update(coupon);
                if !set.needs_resize() {
                    None
                } else if set.container().lg_size() >= self.lg_config_k.saturating_sub(3) {
                    Some(promote_to_hll(
                        self.lg_config_k,
                        self.target_type,
                        set.container(),
                    ))
                } else {
                    set.grow(set.container().lg_size() + 1);
                    None
                }
            }
            Mode::Array6(arr) => {
                arr.update(coupon);
                None
            }
            Mode::Array8(arr) => {
                arr.update(coupon);
                None
            }
        };

        if let Some(mode) = promoted {
            log::debug!(
                "promoting HLL sketch from {:?} to {:?} mode (lg_k={})",
                self.mode.cur_mode(),
                mode.cur_mode(),
                self.lg_config_k
            );
            self.mode = mode;
        }
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> f64 {
        self.mode.estimate()
    }

    /// Estimate that does not depend on the order in which buckets were filled.
    pub fn composite_estimate(&self) -> f64 {
        self.mode.composite_estimate()
    }

    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.lower_bound(num_std_dev)
    }

    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.upper_bound(num_std_dev)
    }

    /// Whether the sketch is the product of a merge that did not preserve
    /// the original update order.
    pub fn is_out_of_order(&self) -> bool {
        self.mode.is_out_of_order()
    }

    /// Flag the sketch as out of order. The flag cannot be cleared again,
    /// short of [`reset`](Self::reset).
    pub fn set_out_of_order(&mut self) {
        self.mode.set_out_of_order(true);
    }

    /// HIP accumulator of a dense sketch, `None` in LIST and SET mode.
    pub fn hip_accum(&self) -> Option<f64> {
        self.mode.hip_accum()
    }

    /// Overwrite the HIP accumulator of a dense sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`] when the sketch is not in HLL mode.
    pub fn set_hip_accum(&mut self, value: f64) -> Result<(), Error> {
        if self.mode.set_hip_accum(value) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidArgument,
                "HIP accumulator only exists in HLL mode",
            )
            .with_context("mode", format!("{:?}", self.current_mode())))
        }
    }

    /// Copy the sketch into another layout.
    ///
    /// Sparse sketches keep their mode and only change target; dense sketches
    /// are repacked, keeping the accumulator and the out-of-order flag.
    pub fn copy_as(&self, target_type: HllType) -> HllSketch {
        let mode = match self.mode.dense() {
            None => self.mode.clone(),
            Some(dense) => match target_type {
                HllType::Hll6 => Mode::Array6(Array6::copy_of(dense)),
                HllType::Hll8 => Mode::Array8(Array8::copy_of(dense)),
            },
        };
        HllSketch::from_parts(self.lg_config_k, target_type, mode)
    }

    /// Produce a dense copy at no more than `lg_k` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`] if the sketch is not in HLL mode,
    /// and [`ErrorKind::ConfigInvalid`] if `lg_k` is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllSketch, HllType};
    /// let mut sketch = HllSketch::new(14, HllType::Hll8);
    /// for i in 0..50_000 {
    ///     sketch.update(i);
    /// }
    /// let small = sketch.downsample(10).unwrap();
    /// assert_eq!(small.lg_config_k(), 10);
    /// ```
    pub fn downsample(&self, lg_k: u8) -> Result<HllSketch, Error> {
        let lg_k = check_lg_k(lg_k)?;
        let dense = self.mode.dense().ok_or_else(Error::downsample_non_hll)?;
        let arr = copy_or_downsample(dense, lg_k);
        let sketch = HllSketch::from_parts(arr.lg_config_k(), HllType::Hll8, Mode::Array8(arr));
        Ok(match self.target_type {
            HllType::Hll8 => sketch,
            other => sketch.copy_as(other),
        })
    }

    /// Return the sketch to its freshly constructed state.
    pub fn reset(&mut self) {
        self.mode = Mode::default();
    }

    /// Human readable summary of the sketch state.
    pub fn to_summary_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### HLL sketch summary:");
        let _ = writeln!(out, "  Log Config K   : {}", self.lg_config_k);
        let _ = writeln!(out, "  Hll Target     : {:?}", self.target_type);
        let _ = writeln!(out, "  Current Mode   : {:?}", self.current_mode());
        let _ = writeln!(out, "  LB             : {}", self.lower_bound(NumStdDev::One));
        let _ = writeln!(out, "  Estimate       : {}", self.estimate());
        let _ = writeln!(out, "  UB             : {}", self.upper_bound(NumStdDev::One));
        let _ = writeln!(out, "  OutOfOrder flag: {}", self.is_out_of_order());
        if let Some(hip) = self.hip_accum() {
            let _ = writeln!(out, "  HIP accumulator: {hip}");
        }
        let _ = writeln!(out, "### End HLL sketch summary");
        out
    }

    /// Summary followed by the stored data.
    ///
    /// Sparse sketches list their coupons as slot and value. Dense sketches
    /// list registers, skipping empty ones unless `all` is set.
    pub fn to_detail_string(&self, all: bool) -> String {
        let mut out = self.to_summary_string();
        let _ = writeln!(out, "### HLL sketch data detail:");
        match &self.mode {
            Mode::List(list) => write_coupons(&mut out, list.container()),
            Mode::Set(set) => write_coupons(&mut out, set.container()),
            Mode::Array6(arr) => write_registers(&mut out, arr, all),
            Mode::Array8(arr) => write_registers(&mut out, arr, all),
        }
        let _ = writeln!(out, "### End HLL sketch data detail");
        out
    }

    /// Serialize into the compact image: only stored coupons for LIST and SET.
    pub fn serialize_compact(&self) -> Vec<u8> {
        serialization::serialize(self.lg_config_k, self.target_type, &self.mode, true)
    }

    /// Serialize into the updatable image, which keeps the exact table layout.
    pub fn serialize_updatable(&self) -> Vec<u8> {
        serialization::serialize(self.lg_config_k, self.target_type, &self.mode, false)
    }

    /// Write the compact image to a stream.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::WriteFailed`] with the io error as its source.
    pub fn serialize_compact_to<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        serialization::write_image(&mut writer, &self.serialize_compact())
    }

    /// Write the updatable image to a stream.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::WriteFailed`] with the io error as its source.
    pub fn serialize_updatable_to<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        serialization::write_image(&mut writer, &self.serialize_updatable())
    }

    pub fn compact_serialization_bytes(&self) -> usize {
        serialization::serialized_bytes(self.lg_config_k, &self.mode, true)
    }

    pub fn updatable_serialization_bytes(&self) -> usize {
        serialization::serialized_bytes(self.lg_config_k, &self.mode, false)
    }

    /// Largest updatable image a sketch with this configuration can produce.
    pub fn max_updatable_serialization_bytes(lg_config_k: u8, target_type: HllType) -> usize {
        serialization::max_updatable_bytes(lg_config_k, target_type)
    }

    /// Deserialize a sketch from either a compact or an updatable image.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InsufficientData`] for truncated input,
    /// [`ErrorKind::UnsupportedSerialVersion`] for an unknown version and
    /// [`ErrorKind::MalformedDeserializeData`] for any other corruption.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllSketch, HllType};
    /// let mut sketch = HllSketch::new(10, HllType::Hll6);
    /// sketch.update("apple");
    /// let bytes = sketch.serialize_compact();
    /// let decoded = HllSketch::deserialize(&bytes).unwrap();
    /// assert_eq!(decoded.estimate(), sketch.estimate());
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<HllSketch, Error> {
        let decoded = serialization::deserialize(bytes)?;
        Ok(HllSketch::from_parts(
            decoded.lg_config_k,
            decoded.hll_type,
            decoded.mode,
        ))
    }

    /// Deserialize one sketch from a stream, consuming only its bytes.
    pub fn deserialize_from<R: Read>(mut reader: R) -> Result<HllSketch, Error> {
        let bytes = serialization::read_image(&mut reader)?;
        HllSketch::deserialize(&bytes)
    }
}

fn write_coupons(out: &mut String, container: &Container) {
    let _ = writeln!(out, "     Slot   Value");
    for coupon in container.iter() {
        let _ = writeln!(out, "  {:>8} {:>6}", get_slot(coupon), get_value(coupon));
    }
}

fn write_registers<A: HllArray>(out: &mut String, arr: &A, all: bool) {
    let _ = writeln!(out, "    Index   Value");
    for slot in 0..arr.num_registers() as u32 {
        let value = arr.get(slot);
        if all || value != 0 {
            let _ = writeln!(out, "  {slot:>8} {value:>6}");
        }
    }
}

/// Replay a coupon container into a fresh dense array of `hll_type`.
///
/// The accumulator starts at the coupon estimate so that the HIP estimate
/// continues from where coupon counting left off.
fn promote_to_hll(lg_config_k: u8, hll_type: HllType, container: &Container) -> Mode {
    let mut mode = match hll_type {
        HllType::Hll6 => {
            let mut arr = Array6::new(lg_config_k);
            for coupon in container.iter() {
                arr.update(coupon);
            }
            Mode::Array6(arr)
        }
        HllType::Hll8 => {
            let mut arr = Array8::new(lg_config_k);
            arr.merge_coupons(container.iter());
            Mode::Array8(arr)
        }
    };
    mode.set_hip_accum(container.estimate());
    if container.is_out_of_order() {
        mode.set_out_of_order(true);
    }
    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_list_promotes_to_set_then_hll() {
        let mut sketch = HllSketch::new(10, HllType::Hll8);
        for slot in 0..7 {
            sketch.update_with_coupon(pack_coupon(slot, 1));
        }
        assert_eq!(sketch.current_mode(), CurMode::List);

        sketch.update_with_coupon(pack_coupon(7, 1));
        assert_eq!(sketch.current_mode(), CurMode::Set);

        // the set grows from 32 to 128 slots, then promotes at 3/4 load
        for slot in 8..96 {
            sketch.update_with_coupon(pack_coupon(slot, 1));
        }
        assert_eq!(sketch.current_mode(), CurMode::Set);
        sketch.update_with_coupon(pack_coupon(96, 1));
        assert_eq!(sketch.current_mode(), CurMode::Hll);
        assert!(!sketch.is_out_of_order());
        assert!(sketch.hip_accum().is_some_and(|hip| hip >= 96.0));
    }

    #[test]
    fn test_small_k_list_goes_straight_to_hll() {
        let mut sketch = HllSketch::new(6, HllType::Hll6);
        for slot in 0..8 {
            sketch.update_with_coupon(pack_coupon(slot, 2));
        }
        assert!(matches!(sketch.mode(), Mode::Array6(_)));
    }

    #[test]
    fn test_promotion_carries_out_of_order() {
        let mut sketch = HllSketch::new(6, HllType::Hll8);
        sketch.update_with_coupon(pack_coupon(1, 1));
        sketch.set_out_of_order();
        for slot in 2..9 {
            sketch.update_with_coupon(pack_coupon(slot, 1));
        }
        assert_eq!(sketch.current_mode(), CurMode::Hll);
        assert!(sketch.is_out_of_order());
    }

    #[test]
    fn test_empty_coupon_is_ignored() {
        let mut sketch = HllSketch::new(8, HllType::Hll8);
        sketch.update_with_coupon(EMPTY_COUPON);
        assert!(sketch.is_empty());
    }

    #[test]
    fn test_set_hip_accum_requires_dense() {
        let mut sketch = HllSketch::new(8, HllType::Hll8);
        let err = sketch.set_hip_accum(3.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_downsample_sparse_is_invalid_argument() {
        let mut sketch = HllSketch::new(12, HllType::Hll8);
        sketch.update("a");
        let err = sketch.downsample(8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_summary_mentions_mode() {
        let sketch = HllSketch::new(9, HllType::Hll6);
        let summary = sketch.to_summary_string();
        assert!(summary.contains("Log Config K   : 9"));
        assert!(summary.contains("Current Mode   : List"));
        assert!(!summary.contains("HIP accumulator"));
    }

    #[test]
    fn test_detail_lists_coupons_and_registers() {
        let mut sketch = HllSketch::new(4, HllType::Hll6);
        sketch.update_with_coupon(pack_coupon(9, 3));
        let detail = sketch.to_detail_string(false);
        assert!(detail.starts_with("### HLL sketch summary:"));
        assert!(detail.contains("       9      3"));

        for slot in 0..16 {
            sketch.update_with_coupon(pack_coupon(slot * 2, 1));
        }
        assert_eq!(sketch.current_mode(), CurMode::Hll);
        let sparse_rows = sketch.to_detail_string(false).lines().count();
        let all_rows = sketch.to_detail_string(true).lines().count();
        assert_eq!(all_rows - sparse_rows, sketch.mode().dense().unwrap().num_zeros() as usize);
        assert!(sketch.to_detail_string(true).contains("       0      1"));
    }
}

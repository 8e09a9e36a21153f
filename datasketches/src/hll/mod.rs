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

//! HyperLogLog sketch and union implementation for cardinality estimation.
//!
//! # Overview
//!
//! An [`HllSketch`] estimates the number of distinct items it has seen using a
//! bounded amount of memory. It moves through three storage modes as it fills
//! up, and never goes back:
//!
//! - **List mode**: a short array of coupons for tiny cardinalities
//! - **Set mode**: an open-addressing hash set of coupons
//! - **HLL mode**: a dense array of `2^lg_config_k` bucket registers
//!
//! An [`HllUnion`] merges sketches built with different precisions and storage
//! modes into one sketch without access to the original items.
//!
//! # HLL Types
//!
//! Two dense register layouts are supported:
//!
//! - [`HllType::Hll6`]: 6 bits per bucket (compact)
//! - [`HllType::Hll8`]: 8 bits per bucket (the layout a union always works in)
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a value (6 bits).
//! The slot identifies which bucket to update, and the value represents the number of
//! leading zeros in the hash plus one. A coupon of `0` means "no observation".

use std::hash::Hash;

mod array6;
mod array8;
mod container;
mod estimator;
mod hash_set;
mod list;
mod mode;
mod serialization;
mod sketch;
mod union;

pub use self::sketch::HllSketch;
pub use self::union::HllUnion;

/// Target HLL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HllType {
    /// 6 bits per bucket register.
    Hll6 = 1,
    /// 8 bits per bucket register.
    Hll8 = 2,
}

/// Current storage mode of a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurMode {
    List = 0,
    Set = 1,
    Hll = 2,
}

/// Smallest supported `lg_config_k`.
pub const MIN_LG_K: u8 = 4;
/// Largest supported `lg_config_k`.
pub const MAX_LG_K: u8 = 21;

/// Seed used to hash items into coupons.
pub const DEFAULT_UPDATE_SEED: u32 = 9001;

/// The coupon value meaning "no observation".
pub const EMPTY_COUPON: u32 = 0;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

const COUPON_RSE_FACTOR: f64 = 0.409; // at transition point not the asymptote
const COUPON_RSE: f64 = COUPON_RSE_FACTOR / (1 << 13) as f64;

const RESIZE_NUMER: usize = 3; // Resize at 3/4 = 75% load factor
const RESIZE_DENOM: usize = 4;

pub(crate) fn check_lg_k(lg_k: u8) -> Result<u8, crate::error::Error> {
    if (MIN_LG_K..=MAX_LG_K).contains(&lg_k) {
        Ok(lg_k)
    } else {
        Err(crate::error::Error::config_invalid("lg_k", lg_k)
            .with_context("range", format!("[{MIN_LG_K}, {MAX_LG_K}]")))
    }
}

/// Extract slot number (low 26 bits) from coupon
#[inline]
pub fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
pub fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
pub fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Hash a value into a coupon.
///
/// The result is never [`EMPTY_COUPON`].
pub fn coupon<H: Hash>(v: H) -> u32 {
    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_UPDATE_SEED);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();

    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    (value << KEY_BITS_26) | addr26
}

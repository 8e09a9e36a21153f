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

//! HyperLogLog sketches for approximate distinct counting, and the union
//! operation that merges independently built sketches into one.
//!
//! # Example
//!
//! ```
//! use datasketches_hll::hll::HllSketch;
//! use datasketches_hll::hll::HllType;
//! use datasketches_hll::hll::HllUnion;
//!
//! let mut left = HllSketch::new(12, HllType::Hll8);
//! let mut right = HllSketch::new(10, HllType::Hll6);
//! for i in 0..5_000 {
//!     left.update(i);
//!     right.update(i + 2_500);
//! }
//!
//! let mut union = HllUnion::new(12);
//! union.merge(&left);
//! union.merge(&right);
//!
//! let result = union.result(HllType::Hll8);
//! assert_eq!(result.lg_config_k(), 10);
//! assert!((result.estimate() - 7_500.0).abs() < 7_500.0 * 0.1);
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod codec;

pub mod common;
pub mod error;
pub mod hll;

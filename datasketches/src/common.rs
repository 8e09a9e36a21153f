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

//! Shared types for sketch bounds and value canonicalization.

/// Number of standard deviations for confidence bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumStdDev {
    /// Approximately 68.3% confidence.
    One = 1,
    /// Approximately 95.4% confidence.
    Two = 2,
    /// Approximately 99.7% confidence.
    Three = 3,
}

impl NumStdDev {
    /// Returns the number of standard deviations as a float.
    pub fn as_f64(self) -> f64 {
        self as u8 as f64
    }
}

/// Canonicalize a double so that equal values hash identically.
///
/// `-0.0` becomes `0.0` and every NaN becomes the same NaN bit pattern.
pub(crate) fn canonical_double(value: f64) -> i64 {
    if value.is_nan() {
        0x7ff8000000000000i64
    } else {
        (value + 0.0).to_bits() as i64
    }
}

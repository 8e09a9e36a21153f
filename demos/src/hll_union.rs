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

//! Example demonstrating HLL union usage

use datasketches_hll::common::NumStdDev;
use datasketches_hll::hll::HllSketch;
use datasketches_hll::hll::HllType;
use datasketches_hll::hll::HllUnion;

fn main() {
    println!("=== HLL Union Example ===\n");

    // Example 1: two disjoint streams
    println!("1. Union of two disjoint streams:");
    let mut left = HllSketch::new(12, HllType::Hll8);
    let mut right = HllSketch::new(12, HllType::Hll6);
    for i in 0..10_000 {
        left.update(format!("item_{}", i));
        right.update(format!("item_{}", i + 10_000));
    }

    let mut union = HllUnion::new(12);
    union.merge(&left);
    union.merge(&right);
    println!("   Left estimate: {:.2}", left.estimate());
    println!("   Right estimate: {:.2}", right.estimate());
    println!("   Union estimate: {:.2} (actual 20000)", union.estimate());
    println!(
        "   Bounds (2 std dev): [{:.2}, {:.2}]",
        union.lower_bound(NumStdDev::Two),
        union.upper_bound(NumStdDev::Two)
    );
    println!();

    // Example 2: mixed precision, the union follows the coarsest input
    println!("2. Merge sketches of different precision:");
    let mut fine = HllSketch::new(14, HllType::Hll8);
    let mut coarse = HllSketch::new(10, HllType::Hll8);
    for i in 0..50_000 {
        fine.update(i);
        coarse.update(i + 25_000);
    }
    let mut union = HllUnion::new(14);
    union.merge(&fine);
    println!("   After fine sketch: lg_k = {}", union.lg_config_k());
    union.merge(&coarse);
    println!("   After coarse sketch: lg_k = {}", union.lg_config_k());
    println!("   Union estimate: {:.2} (actual 75000)", union.estimate());
    println!();

    // Example 3: ship the result and read it back
    println!("3. Serialize the union result:");
    let result = union.result(HllType::Hll6);
    let bytes = result.serialize_compact();
    println!("   Serialized size: {} bytes", bytes.len());
    match HllUnion::deserialize(&bytes) {
        Ok(restored) => println!("   Restored estimate: {:.2}", restored.estimate()),
        Err(err) => println!("   Failed to restore: {err}"),
    }
    println!();

    println!("{}", result.to_summary_string());
}

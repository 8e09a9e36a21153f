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

//! Simple list for storing unique coupons in order
//!
//! Provides sequential storage with linear search for duplicates.
//! Efficient for small numbers of coupons before transitioning to HashSet.

use crate::hll::EMPTY_COUPON;
use crate::hll::container::Container;

pub(super) const LG_INIT_LIST_SIZE: u8 = 3;

/// List for sequential coupon storage with duplicate detection
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    container: Container,
}

impl Default for List {
    fn default() -> Self {
        Self::new(LG_INIT_LIST_SIZE)
    }
}

impl List {
    pub fn new(lg_size: u8) -> Self {
        Self {
            container: Container::new(lg_size),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Insert coupon into list, ignoring duplicates
    ///
    /// The caller must promote the list once it is full.
    pub fn update(&mut self, coupon: u32) {
        let mut inserted = false;
        for value in self.container.slots_mut().iter_mut() {
            if *value == EMPTY_COUPON {
                *value = coupon;
                inserted = true;
                break;
            } else if *value == coupon {
                break;
            }
        }
        if inserted {
            self.container.inc_len();
        }
    }
}

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

//! Hash set for storing unique coupons with linear probing
//!
//! Uses open addressing with a custom stride function to handle collisions.
//! Provides better performance than List when many coupons are stored.

use crate::hll::EMPTY_COUPON;
use crate::hll::KEY_MASK_26;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::container::Container;

pub(super) const LG_INIT_SET_SIZE: u8 = 5;

/// Hash set for efficient coupon storage with collision handling
#[derive(Debug, Clone, PartialEq)]
pub struct HashSet {
    container: Container,
}

impl Default for HashSet {
    fn default() -> Self {
        Self::new(LG_INIT_SET_SIZE)
    }
}

impl HashSet {
    pub fn new(lg_size: u8) -> Self {
        Self {
            container: Container::new(lg_size),
        }
    }

    /// Wrap a full hash table as read from an updatable image.
    pub fn from_container(container: Container) -> Self {
        Self { container }
    }

    /// Build a table of `lg_size` slots by inserting the given coupons.
    pub fn from_coupons(lg_size: u8, coupons: impl IntoIterator<Item = u32>) -> Self {
        let mut set = HashSet::new(lg_size);
        for coupon in coupons {
            set.update(coupon);
        }
        set
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Insert coupon into hash set, ignoring duplicates
    ///
    /// Returns `true` if the coupon was not present before.
    pub fn update(&mut self, coupon: u32) -> bool {
        if coupon == EMPTY_COUPON {
            return false;
        }

        match self.probe(coupon) {
            Probe::Found(_) => false,
            Probe::Vacant(index) => {
                self.container.slots_mut()[index] = coupon;
                self.container.inc_len();
                true
            }
            Probe::Full => panic!("HashSet full; no empty slots"),
        }
    }

    /// Walk the probe sequence of `coupon` until it or an empty slot shows up.
    fn probe(&self, coupon: u32) -> Probe {
        let lg_size = self.container.lg_size();
        let mask = (1u32 << lg_size) - 1;
        let slots = self.container.slots();

        // Initial probe position from low bits of coupon
        let mut probe = coupon & mask;
        let starting_position = probe;
        // Stride is always odd to ensure all slots are visited
        let stride = ((coupon & KEY_MASK_26) >> lg_size) | 1;

        loop {
            let value = slots[probe as usize];
            if value == EMPTY_COUPON {
                return Probe::Vacant(probe as usize);
            } else if value == coupon {
                return Probe::Found(probe as usize);
            }

            probe = (probe + stride) & mask;
            if probe == starting_position {
                return Probe::Full;
            }
        }
    }

    /// Whether every stored coupon sits where a lookup finds it.
    ///
    /// Fails for duplicated coupons and for coupons moved off their probe
    /// sequence, which a table read from an image may contain.
    pub fn is_well_formed(&self) -> bool {
        self.container
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, coupon)| **coupon != EMPTY_COUPON)
            .all(|(index, &coupon)| matches!(self.probe(coupon), Probe::Found(found) if found == index))
    }

    /// Whether the load factor went past 3/4 and the set must grow or promote.
    pub fn needs_resize(&self) -> bool {
        RESIZE_DENOM * self.container.len() > RESIZE_NUMER * self.container.capacity()
    }

    /// Internally grow the set container by a power of two, copying all
    /// the existing values to the new container.
    pub fn grow(&mut self, lg_size: u8) {
        debug_assert!(lg_size > self.container.lg_size());

        let mut new_set = HashSet::new(lg_size);
        for coupon in self.container.iter() {
            new_set.update(coupon);
        }
        new_set
            .container
            .set_out_of_order(self.container.is_out_of_order());

        self.container = new_set.container;
    }
}

enum Probe {
    Found(usize),
    Vacant(usize),
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_insert_and_dedup() {
        let mut set = HashSet::default();
        assert!(set.update(pack_coupon(17, 3)));
        assert!(!set.update(pack_coupon(17, 3)));
        assert!(set.update(pack_coupon(17, 4)));
        assert!(!set.update(EMPTY_COUPON));
        assert_eq!(set.container().len(), 2);
    }

    #[test]
    fn test_needs_resize_at_three_quarters() {
        let mut set = HashSet::new(3); // 8 slots, resize once len > 6
        for slot in 0..6 {
            set.update(pack_coupon(slot, 1));
        }
        assert!(!set.needs_resize());
        set.update(pack_coupon(6, 1));
        assert!(set.needs_resize());
    }

    #[test]
    fn test_grow_keeps_coupons() {
        let mut set = HashSet::new(3);
        let coupons: Vec<u32> = (0..6).map(|s| pack_coupon(s * 37, 2)).collect();
        for &c in &coupons {
            set.update(c);
        }
        set.container_mut().set_out_of_order(true);
        set.grow(5);

        assert_eq!(set.container().capacity(), 32);
        assert_eq!(set.container().len(), 6);
        assert!(set.container().is_out_of_order());
        let mut stored: Vec<u32> = set.container().iter().collect();
        stored.sort_unstable();
        let mut expected = coupons.clone();
        expected.sort_unstable();
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_well_formed_rejects_misplaced_and_duplicate_coupons() {
        let mut set = HashSet::new(5);
        for slot in 0..10 {
            set.update(pack_coupon(slot * 7 + 1, 2));
        }
        assert!(set.is_well_formed());

        let mut rotated: Vec<u32> = set.container().slots().to_vec();
        rotated.rotate_right(1);
        let moved = HashSet::from_container(Container::from_coupons(
            5,
            rotated.into_boxed_slice(),
            false,
        ));
        assert!(!moved.is_well_formed());

        let mut doubled: Vec<u32> = set.container().slots().to_vec();
        let first = set.container().iter().next().unwrap();
        let vacant = doubled.iter().position(|&c| c == EMPTY_COUPON).unwrap();
        doubled[vacant] = first;
        let duplicated = HashSet::from_container(Container::from_coupons(
            5,
            doubled.into_boxed_slice(),
            false,
        ));
        assert!(!duplicated.is_well_formed());
    }

    #[test]
    fn test_from_coupons_rebuilds_table() {
        let coupons = [pack_coupon(1, 1), pack_coupon(2, 2), pack_coupon(1, 1)];
        let set = HashSet::from_coupons(LG_INIT_SET_SIZE, coupons);
        assert_eq!(set.container().len(), 2);
    }
}

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

//! Binary layout of serialized HLL sketches.
//!
//! Every image starts with an 8-byte preamble:
//!
//! | byte | field                                   |
//! |------|-----------------------------------------|
//! | 0    | preamble ints (LIST 2, SET 3, HLL 10)   |
//! | 1    | serial version (1)                      |
//! | 2    | family id (7)                           |
//! | 3    | `lg_config_k`                           |
//! | 4    | `lg_arr` of the coupon array            |
//! | 5    | flags                                   |
//! | 6    | LIST coupon count, or HLL `cur_min`     |
//! | 7    | mode byte, `cur_mode \| tgt_type << 2`  |
//!
//! LIST coupons follow from byte 8. SET stores its count at byte 8 and
//! coupons from byte 12. HLL stores the estimator state from byte 8 and
//! the registers from byte 40.

use std::io::Read;
use std::io::Write;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::read_exact_into;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::EMPTY_COUPON;
use crate::hll::HllType;
use crate::hll::KEY_BITS_26;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::array6::Array6;
use crate::hll::array6::num_bytes_for_k;
use crate::hll::array8::Array8;
use crate::hll::container::Container;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::HashSet;
use crate::hll::hash_set::LG_INIT_SET_SIZE;
use crate::hll::list::LG_INIT_LIST_SIZE;
use crate::hll::list::List;
use crate::hll::mode::Mode;

pub(super) const SER_VER: u8 = 1;
pub(super) const HLL_FAMILY_ID: u8 = 7;

const LIST_PREINTS: u8 = 2;
const HASH_SET_PREINTS: u8 = 3;
const HLL_PREINTS: u8 = 10;

const PREAMBLE_INTS_BYTE: usize = 0;
const SER_VER_BYTE: usize = 1;
const FAMILY_BYTE: usize = 2;
const LG_K_BYTE: usize = 3;
const LG_ARR_BYTE: usize = 4;
const FLAGS_BYTE: usize = 5;
const LIST_COUNT_BYTE: usize = 6;
const MODE_BYTE: usize = 7;

const PREAMBLE_BYTES: usize = 8;
const LIST_INT_ARR_START: usize = 8;
const HASH_SET_COUNT_INT: usize = 8;
const HASH_SET_INT_ARR_START: usize = 12;
const HLL_BYTE_ARR_START: usize = 40;

const EMPTY_FLAG_MASK: u8 = 4;
const COMPACT_FLAG_MASK: u8 = 8;
const OUT_OF_ORDER_FLAG_MASK: u8 = 16;

const COUPON_BYTES: usize = 4;

/// A sketch read back from its serialized image.
#[derive(Debug)]
pub(super) struct DecodedSketch {
    pub lg_config_k: u8,
    pub hll_type: HllType,
    pub mode: Mode,
}

/// Validated fixed-size header of a serialized sketch.
struct Preamble {
    lg_config_k: u8,
    lg_arr: u8,
    cur_mode: CurMode,
    hll_type: HllType,
    list_count: u8,
    compact: bool,
    out_of_order: bool,
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |_| Error::insufficient_data(tag)
}

fn stream_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

pub(super) fn encode_mode_byte(cur_mode: CurMode, hll_type: HllType) -> u8 {
    (cur_mode as u8) | ((hll_type as u8) << 2)
}

pub(super) fn decode_mode_byte(mode_byte: u8) -> Result<(CurMode, HllType), Error> {
    let cur_mode = match mode_byte & 0x3 {
        0 => CurMode::List,
        1 => CurMode::Set,
        2 => CurMode::Hll,
        _ => return Err(Error::invalid_mode_byte(mode_byte)),
    };
    let hll_type = match mode_byte >> 2 {
        1 => HllType::Hll6,
        2 => HllType::Hll8,
        // 0 is HLL_4, whose auxiliary exception table is not supported
        _ => return Err(Error::invalid_mode_byte(mode_byte)),
    };
    Ok((cur_mode, hll_type))
}

fn parse_preamble(bytes: &[u8]) -> Result<Preamble, Error> {
    if bytes.len() < PREAMBLE_BYTES {
        return Err(Error::insufficient_data("preamble"));
    }

    let preamble_ints = bytes[PREAMBLE_INTS_BYTE];
    let ser_ver = bytes[SER_VER_BYTE];
    let family_id = bytes[FAMILY_BYTE];
    let lg_config_k = bytes[LG_K_BYTE];
    let lg_arr = bytes[LG_ARR_BYTE];
    let flags = bytes[FLAGS_BYTE];
    let list_count = bytes[LIST_COUNT_BYTE];
    let mode_byte = bytes[MODE_BYTE];

    if family_id != HLL_FAMILY_ID {
        return Err(Error::invalid_family(HLL_FAMILY_ID, family_id, "HllSketch"));
    }
    if ser_ver != SER_VER {
        return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
    }
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        return Err(Error::deserial(format!(
            "lg_k {lg_config_k} is out of range [{MIN_LG_K}, {MAX_LG_K}]"
        ))
        .with_context("lg_k", lg_config_k));
    }

    let (cur_mode, hll_type) = decode_mode_byte(mode_byte)?;
    let (name, expected) = match cur_mode {
        CurMode::List => ("LIST", LIST_PREINTS),
        CurMode::Set => ("SET", HASH_SET_PREINTS),
        CurMode::Hll => ("HLL", HLL_PREINTS),
    };
    if preamble_ints != expected {
        return Err(Error::invalid_preamble_ints(name, expected, preamble_ints));
    }

    match cur_mode {
        CurMode::List if lg_arr != LG_INIT_LIST_SIZE => {
            return Err(Error::deserial(format!(
                "invalid lg_arr for LIST mode: expected {LG_INIT_LIST_SIZE}, got {lg_arr}"
            )));
        }
        CurMode::Set if !(LG_INIT_SET_SIZE..=KEY_BITS_26 as u8).contains(&lg_arr) => {
            return Err(Error::deserial(format!(
                "invalid lg_arr for SET mode: {lg_arr}"
            )));
        }
        _ => {}
    }
    if cur_mode == CurMode::List && list_count as usize > 1 << LG_INIT_LIST_SIZE {
        return Err(Error::deserial(format!(
            "LIST count {list_count} exceeds capacity {}",
            1 << LG_INIT_LIST_SIZE
        )));
    }

    let empty = (flags & EMPTY_FLAG_MASK) != 0;
    if empty && (cur_mode != CurMode::List || list_count != 0) {
        return Err(Error::deserial(
            "empty flag set on a sketch with stored data",
        ));
    }

    Ok(Preamble {
        lg_config_k,
        lg_arr,
        cur_mode,
        hll_type,
        list_count,
        compact: (flags & COMPACT_FLAG_MASK) != 0,
        out_of_order: (flags & OUT_OF_ORDER_FLAG_MASK) != 0,
    })
}

/// Bytes of dense register data for a layout.
fn register_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    let k = 1u32 << lg_config_k;
    match hll_type {
        HllType::Hll6 => num_bytes_for_k(k),
        HllType::Hll8 => k as usize,
    }
}

fn hll_image_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    HLL_BYTE_ARR_START + register_bytes(lg_config_k, hll_type)
}

/// Size of an image of `mode`, which must match what [`serialize`] writes.
pub(super) fn serialized_bytes(lg_config_k: u8, mode: &Mode, compact: bool) -> usize {
    match mode {
        Mode::List(list) => {
            let container = list.container();
            if compact {
                LIST_INT_ARR_START + COUPON_BYTES * container.len()
            } else {
                LIST_INT_ARR_START + COUPON_BYTES * container.capacity()
            }
        }
        Mode::Set(set) => {
            let container = set.container();
            if compact {
                HASH_SET_INT_ARR_START + COUPON_BYTES * container.len()
            } else {
                HASH_SET_INT_ARR_START + COUPON_BYTES * container.capacity()
            }
        }
        Mode::Array6(_) => hll_image_bytes(lg_config_k, HllType::Hll6),
        Mode::Array8(_) => hll_image_bytes(lg_config_k, HllType::Hll8),
    }
}

/// Upper bound of any updatable image at this precision and layout.
///
/// A dense image is always at least as large as the biggest coupon table
/// the sketch holds before promoting.
pub(super) fn max_updatable_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
    hll_image_bytes(lg_config_k, hll_type)
}

pub(super) fn serialize(lg_config_k: u8, hll_type: HllType, mode: &Mode, compact: bool) -> Vec<u8> {
    let mut bytes = SketchBytes::with_capacity(serialized_bytes(lg_config_k, mode, compact));

    let mut flags = 0u8;
    if compact {
        flags |= COMPACT_FLAG_MASK;
    }
    if mode.is_out_of_order() {
        flags |= OUT_OF_ORDER_FLAG_MASK;
    }

    match mode {
        Mode::List(list) => {
            let container = list.container();
            if container.is_empty() {
                flags |= EMPTY_FLAG_MASK;
            }
            bytes.write_u8(LIST_PREINTS);
            bytes.write_u8(SER_VER);
            bytes.write_u8(HLL_FAMILY_ID);
            bytes.write_u8(lg_config_k);
            bytes.write_u8(container.lg_size());
            bytes.write_u8(flags);
            bytes.write_u8(container.len() as u8);
            bytes.write_u8(encode_mode_byte(CurMode::List, hll_type));
            write_coupons(&mut bytes, container, compact);
        }
        Mode::Set(set) => {
            let container = set.container();
            bytes.write_u8(HASH_SET_PREINTS);
            bytes.write_u8(SER_VER);
            bytes.write_u8(HLL_FAMILY_ID);
            bytes.write_u8(lg_config_k);
            bytes.write_u8(container.lg_size());
            bytes.write_u8(flags);
            bytes.write_u8(0);
            bytes.write_u8(encode_mode_byte(CurMode::Set, hll_type));
            bytes.write_u32_le(container.len() as u32);
            write_coupons(&mut bytes, container, compact);
        }
        Mode::Array6(arr) => {
            write_hll_preamble(&mut bytes, lg_config_k, HllType::Hll6, flags);
            write_estimator(&mut bytes, arr.estimator(), arr.num_zeros());
            bytes.write(arr.packed_bytes());
        }
        Mode::Array8(arr) => {
            write_hll_preamble(&mut bytes, lg_config_k, HllType::Hll8, flags);
            write_estimator(&mut bytes, arr.estimator(), arr.num_zeros());
            bytes.write(arr.values());
        }
    }

    debug_assert_eq!(bytes.len(), serialized_bytes(lg_config_k, mode, compact));
    bytes.into_bytes()
}

fn write_coupons(bytes: &mut SketchBytes, container: &Container, compact: bool) {
    if compact {
        for coupon in container.iter() {
            bytes.write_u32_le(coupon);
        }
    } else {
        for &coupon in container.slots() {
            bytes.write_u32_le(coupon);
        }
    }
}

fn write_hll_preamble(bytes: &mut SketchBytes, lg_config_k: u8, hll_type: HllType, flags: u8) {
    bytes.write_u8(HLL_PREINTS);
    bytes.write_u8(SER_VER);
    bytes.write_u8(HLL_FAMILY_ID);
    bytes.write_u8(lg_config_k);
    bytes.write_u8(0); // lg_arr of the aux table, unused without exceptions
    bytes.write_u8(flags);
    bytes.write_u8(0); // cur_min is always 0 for 6 and 8 bit registers
    bytes.write_u8(encode_mode_byte(CurMode::Hll, hll_type));
}

fn write_estimator(bytes: &mut SketchBytes, estimator: &HipEstimator, num_zeros: u32) {
    bytes.write_f64_le(estimator.hip_accum());
    bytes.write_f64_le(estimator.kxq0());
    bytes.write_f64_le(estimator.kxq1());
    bytes.write_u32_le(num_zeros); // num_at_cur_min
    bytes.write_u32_le(0); // aux_count
}

pub(super) fn deserialize(bytes: &[u8]) -> Result<DecodedSketch, Error> {
    let preamble = parse_preamble(bytes)?;
    let mut cursor = SketchSlice::new(bytes);
    let mode = match preamble.cur_mode {
        CurMode::List => read_list(&mut cursor, &preamble)?,
        CurMode::Set => read_set(&mut cursor, &preamble)?,
        CurMode::Hll => read_hll(&mut cursor, &preamble)?,
    };
    Ok(DecodedSketch {
        lg_config_k: preamble.lg_config_k,
        hll_type: preamble.hll_type,
        mode,
    })
}

fn read_coupon_slots(
    cursor: &mut SketchSlice<'_>,
    count: usize,
    tag: &'static str,
) -> Result<Vec<u32>, Error> {
    let mut coupons = Vec::new();
    for _ in 0..count {
        coupons.push(cursor.read_u32_le().map_err(make_error(tag))?);
    }
    Ok(coupons)
}

fn read_list(cursor: &mut SketchSlice<'_>, preamble: &Preamble) -> Result<Mode, Error> {
    cursor.seek(LIST_INT_ARR_START);
    let count = preamble.list_count as usize;

    let coupons = if preamble.compact {
        let coupons = read_coupon_slots(cursor, count, "list_coupons")?;
        if coupons.contains(&EMPTY_COUPON) {
            return Err(Error::deserial("empty coupon in compact LIST image"));
        }
        coupons
    } else {
        let slots = read_coupon_slots(cursor, 1 << preamble.lg_arr, "list_coupons")?;
        slots.into_iter().filter(|&c| c != EMPTY_COUPON).collect()
    };
    if coupons.len() != count {
        return Err(Error::deserial(format!(
            "LIST count mismatch: header says {count}, found {}",
            coupons.len()
        )));
    }

    let mut list = List::new(preamble.lg_arr);
    for coupon in coupons {
        list.update(coupon);
    }
    if list.container().len() != count {
        return Err(Error::deserial("duplicate coupons in LIST image"));
    }
    // a sketch promotes its list the moment it fills up
    if list.container().is_full() {
        return Err(Error::deserial(format!("LIST image holds {count} coupons")));
    }

    list.container_mut().set_out_of_order(preamble.out_of_order);
    Ok(Mode::List(list))
}

/// Smallest table whose load stays within the resize threshold.
fn lg_set_size_for_count(count: usize) -> u8 {
    let mut lg_size = LG_INIT_SET_SIZE;
    while RESIZE_DENOM * count > RESIZE_NUMER * (1usize << lg_size) {
        lg_size += 1;
    }
    lg_size
}

fn read_set(cursor: &mut SketchSlice<'_>, preamble: &Preamble) -> Result<Mode, Error> {
    cursor.seek(HASH_SET_COUNT_INT);
    let count = cursor.read_u32_le().map_err(make_error("set_count"))? as usize;
    cursor.seek(HASH_SET_INT_ARR_START);

    let mut set = if preamble.compact {
        if count > 1 << KEY_BITS_26 {
            return Err(Error::deserial(format!("SET count {count} is out of range")));
        }
        let coupons = read_coupon_slots(cursor, count, "set_coupons")?;
        if coupons.contains(&EMPTY_COUPON) {
            return Err(Error::deserial("empty coupon in compact SET image"));
        }
        let set = HashSet::from_coupons(lg_set_size_for_count(count), coupons);
        if set.container().len() != count {
            return Err(Error::deserial("duplicate coupons in SET image"));
        }
        set
    } else {
        let slots = read_coupon_slots(cursor, 1 << preamble.lg_arr, "set_coupons")?;
        let container = Container::from_coupons(preamble.lg_arr, slots.into_boxed_slice(), false);
        if container.len() != count {
            return Err(Error::deserial(format!(
                "SET count mismatch: header says {count}, found {}",
                container.len()
            )));
        }
        let set = HashSet::from_container(container);
        if set.needs_resize() {
            return Err(Error::deserial(format!(
                "SET table of {} slots is overloaded with {count} coupons",
                set.container().capacity()
            )));
        }
        if !set.is_well_formed() {
            return Err(Error::deserial(
                "SET table has duplicate or misplaced coupons",
            ));
        }
        set
    };

    set.container_mut().set_out_of_order(preamble.out_of_order);
    Ok(Mode::Set(set))
}

fn read_hll(cursor: &mut SketchSlice<'_>, preamble: &Preamble) -> Result<Mode, Error> {
    let lg_config_k = preamble.lg_config_k;
    cursor.seek(PREAMBLE_BYTES);

    let hip_accum = cursor.read_f64_le().map_err(make_error("hip_accum"))?;
    let kxq0 = cursor.read_f64_le().map_err(make_error("kxq0"))?;
    let kxq1 = cursor.read_f64_le().map_err(make_error("kxq1"))?;
    let num_at_cur_min = cursor.read_u32_le().map_err(make_error("num_at_cur_min"))?;
    let aux_count = cursor.read_u32_le().map_err(make_error("aux_count"))?;
    if aux_count != 0 {
        return Err(Error::deserial(format!(
            "unexpected aux exceptions for 6 and 8 bit registers: {aux_count}"
        )));
    }

    let mut registers = vec![0u8; register_bytes(lg_config_k, preamble.hll_type)];
    cursor
        .read_exact(&mut registers)
        .map_err(make_error("hll_registers"))?;

    let mut estimator = HipEstimator::new(lg_config_k);
    estimator.set_hip_accum(hip_accum);
    estimator.set_kxq0(kxq0);
    estimator.set_kxq1(kxq1);
    estimator.set_out_of_order(preamble.out_of_order);

    let mode = match preamble.hll_type {
        HllType::Hll6 => {
            let arr = Array6::from_parts(lg_config_k, registers.into_boxed_slice(), estimator);
            check_num_zeros(num_at_cur_min, arr.num_zeros())?;
            Mode::Array6(arr)
        }
        HllType::Hll8 => {
            let arr = Array8::from_parts(lg_config_k, registers.into_boxed_slice(), estimator);
            check_num_zeros(num_at_cur_min, arr.num_zeros())?;
            Mode::Array8(arr)
        }
    };
    Ok(mode)
}

fn check_num_zeros(stored: u32, actual: u32) -> Result<(), Error> {
    if stored == actual {
        Ok(())
    } else {
        Err(Error::deserial(format!(
            "num_at_cur_min mismatch: header says {stored}, registers have {actual}"
        )))
    }
}

/// Read exactly one serialized sketch from a stream.
///
/// The preamble is read first to learn how many more bytes belong to the
/// image, so the reader is left positioned right after it.
pub(super) fn read_image<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::with_capacity(HLL_BYTE_ARR_START);
    read_exact_into(reader, &mut bytes, PREAMBLE_BYTES).map_err(stream_error("preamble"))?;
    let preamble = parse_preamble(&bytes)?;

    let remaining = match preamble.cur_mode {
        CurMode::List => {
            if preamble.compact {
                COUPON_BYTES * preamble.list_count as usize
            } else {
                COUPON_BYTES << preamble.lg_arr
            }
        }
        CurMode::Set => {
            read_exact_into(reader, &mut bytes, COUPON_BYTES).map_err(stream_error("set_count"))?;
            if preamble.compact {
                let mut cursor = SketchSlice::new(&bytes);
                cursor.seek(HASH_SET_COUNT_INT);
                let count = cursor.read_u32_le().map_err(make_error("set_count"))? as usize;
                if count > 1 << KEY_BITS_26 {
                    return Err(Error::deserial(format!("SET count {count} is out of range")));
                }
                COUPON_BYTES * count
            } else {
                COUPON_BYTES << preamble.lg_arr
            }
        }
        CurMode::Hll => {
            hll_image_bytes(preamble.lg_config_k, preamble.hll_type) - PREAMBLE_BYTES
        }
    };

    read_exact_into(reader, &mut bytes, remaining).map_err(stream_error("sketch_data"))?;
    Ok(bytes)
}

/// Write a whole image to a stream.
pub(super) fn write_image<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<(), Error> {
    writer
        .write_all(bytes)
        .map_err(|err| Error::write_failed("sketch image").set_source(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::pack_coupon;

    fn list_mode(coupons: &[u32]) -> Mode {
        let mut list = List::default();
        for &c in coupons {
            list.update(c);
        }
        Mode::List(list)
    }

    #[test]
    fn test_mode_byte_encoding() {
        assert_eq!(encode_mode_byte(CurMode::List, HllType::Hll8), 0x08);
        assert_eq!(encode_mode_byte(CurMode::Hll, HllType::Hll6), 0x06);
        assert_eq!(
            decode_mode_byte(0x09).unwrap(),
            (CurMode::Set, HllType::Hll8)
        );
        // HLL_4 target and the unused mode value are rejected
        assert!(decode_mode_byte(0x02).is_err());
        assert!(decode_mode_byte(0x0b).is_err());
    }

    #[test]
    fn test_empty_compact_list_is_preamble_only() {
        let mode = list_mode(&[]);
        let bytes = serialize(12, HllType::Hll8, &mode, true);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[FLAGS_BYTE], EMPTY_FLAG_MASK | COMPACT_FLAG_MASK);

        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.lg_config_k, 12);
        assert_eq!(decoded.hll_type, HllType::Hll8);
        assert!(decoded.mode.is_empty());
    }

    #[test]
    fn test_list_layouts() {
        let mode = list_mode(&[pack_coupon(5, 2), pack_coupon(9, 1)]);

        let compact = serialize(10, HllType::Hll6, &mode, true);
        assert_eq!(compact.len(), 16);
        assert_eq!(compact[LIST_COUNT_BYTE], 2);
        assert_eq!(deserialize(&compact).unwrap().mode, mode);

        let updatable = serialize(10, HllType::Hll6, &mode, false);
        assert_eq!(updatable.len(), 8 + 4 * 8);
        assert_eq!(deserialize(&updatable).unwrap().mode, mode);
    }

    #[test]
    fn test_compact_set_is_rebuilt_canonically() {
        let mut set = HashSet::new(7);
        for slot in 0..20 {
            set.update(pack_coupon(slot * 101, 3));
        }
        let mode = Mode::Set(set);

        let compact = serialize(14, HllType::Hll8, &mode, true);
        assert_eq!(compact.len(), 12 + 4 * 20);
        let decoded = deserialize(&compact).unwrap();
        let Mode::Set(rebuilt) = &decoded.mode else {
            panic!("expected SET mode, got {:?}", decoded.mode.cur_mode());
        };
        assert_eq!(rebuilt.container().lg_size(), 5);
        assert_eq!(rebuilt.container().len(), 20);
        assert_eq!(decoded.mode.estimate(), mode.estimate());

        let updatable = serialize(14, HllType::Hll8, &mode, false);
        assert_eq!(deserialize(&updatable).unwrap().mode, mode);
    }

    #[test]
    fn test_hll_layout_offsets() {
        let mut arr = Array8::new(4);
        arr.update(pack_coupon(3, 7));
        let mode = Mode::Array8(arr);

        let bytes = serialize(4, HllType::Hll8, &mode, false);
        assert_eq!(bytes.len(), 40 + 16);
        assert_eq!(bytes[PREAMBLE_INTS_BYTE], HLL_PREINTS);
        assert_eq!(bytes[MODE_BYTE], 0x0a);
        assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 15);
        assert_eq!(bytes[40 + 3], 7);
        assert_eq!(deserialize(&bytes).unwrap().mode, mode);
    }

    #[test]
    fn test_rejects_corrupt_preamble() {
        let mode = list_mode(&[pack_coupon(1, 1)]);
        let good = serialize(8, HllType::Hll8, &mode, true);

        let err = deserialize(&good[..5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let err = deserialize(&good[..9]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let mut bad = good.clone();
        bad[SER_VER_BYTE] = 2;
        assert_eq!(
            deserialize(&bad).unwrap_err().kind(),
            ErrorKind::UnsupportedSerialVersion
        );

        let mut bad = good.clone();
        bad[FAMILY_BYTE] = 3;
        assert_eq!(
            deserialize(&bad).unwrap_err().kind(),
            ErrorKind::MalformedDeserializeData
        );

        let mut bad = good.clone();
        bad[PREAMBLE_INTS_BYTE] = HLL_PREINTS;
        assert_eq!(
            deserialize(&bad).unwrap_err().kind(),
            ErrorKind::MalformedDeserializeData
        );

        let mut bad = good.clone();
        bad[LG_K_BYTE] = 22;
        assert_eq!(
            deserialize(&bad).unwrap_err().kind(),
            ErrorKind::MalformedDeserializeData
        );

        let mut bad = good;
        bad[MODE_BYTE] = 0x00;
        assert_eq!(
            deserialize(&bad).unwrap_err().kind(),
            ErrorKind::MalformedDeserializeData
        );
    }

    fn set_image(num_coupons: u32) -> Vec<u8> {
        let mut set = HashSet::new(LG_INIT_SET_SIZE);
        for slot in 0..num_coupons {
            set.update(pack_coupon(slot * 13 + 1, 4));
        }
        serialize(12, HllType::Hll8, &Mode::Set(set), false)
    }

    fn image_slots(bytes: &[u8], start: usize) -> Vec<u32> {
        bytes[start..]
            .chunks_exact(COUPON_BYTES)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn write_slots(bytes: &mut [u8], start: usize, slots: &[u32]) {
        for (i, slot) in slots.iter().enumerate() {
            let at = start + i * COUPON_BYTES;
            bytes[at..at + COUPON_BYTES].copy_from_slice(&slot.to_le_bytes());
        }
    }

    #[test]
    fn test_rejects_overloaded_set_table() {
        let mut bytes = set_image(10);
        let mut slots = image_slots(&bytes, HASH_SET_INT_ARR_START);
        let mut filler = 0;
        for slot in slots.iter_mut().filter(|c| **c == EMPTY_COUPON) {
            *slot = pack_coupon(5_000 + filler, 3);
            filler += 1;
        }
        write_slots(&mut bytes, HASH_SET_INT_ARR_START, &slots);
        let count = slots.len() as u32;
        bytes[HASH_SET_COUNT_INT..HASH_SET_INT_ARR_START].copy_from_slice(&count.to_le_bytes());

        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_rejects_misplaced_set_coupons() {
        let good = set_image(10);
        assert!(deserialize(&good).is_ok());

        let mut bytes = good;
        let mut slots = image_slots(&bytes, HASH_SET_INT_ARR_START);
        slots.rotate_right(1);
        write_slots(&mut bytes, HASH_SET_INT_ARR_START, &slots);

        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_rejects_duplicate_compact_set_coupons() {
        let mut set = HashSet::new(LG_INIT_SET_SIZE);
        for slot in 0..12 {
            set.update(pack_coupon(slot * 5 + 2, 1));
        }
        let mut bytes = serialize(12, HllType::Hll8, &Mode::Set(set), true);
        let mut slots = image_slots(&bytes, HASH_SET_INT_ARR_START);
        slots[1] = slots[0];
        write_slots(&mut bytes, HASH_SET_INT_ARR_START, &slots);

        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_rejects_duplicate_list_coupons() {
        let c1 = pack_coupon(3, 2);
        let c2 = pack_coupon(8, 5);
        let mut bytes = serialize(12, HllType::Hll6, &list_mode(&[c1, c2]), false);
        write_slots(&mut bytes, LIST_INT_ARR_START + 2 * COUPON_BYTES, &[c1]);
        bytes[LIST_COUNT_BYTE] = 3;

        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

        // a hole before the stored coupons is tolerated and compacted away
        let mut holey = serialize(12, HllType::Hll6, &list_mode(&[c1, c2]), false);
        write_slots(&mut holey, LIST_INT_ARR_START, &[EMPTY_COUPON, c2, c1]);
        let decoded = deserialize(&holey).unwrap();
        assert_eq!(decoded.mode.cur_mode(), CurMode::List);
        assert_eq!(decoded.mode.estimate(), list_mode(&[c2, c1]).estimate());
    }

    #[test]
    fn test_rejects_full_list() {
        let coupons: Vec<u32> = (1..=8).map(|slot| pack_coupon(slot, 1)).collect();
        let mode = list_mode(&coupons);
        for compact in [true, false] {
            let bytes = serialize(12, HllType::Hll8, &mode, compact);
            let err = deserialize(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        }
    }

    #[test]
    fn test_read_image_consumes_exactly_one_sketch() {
        let first = serialize(10, HllType::Hll8, &list_mode(&[pack_coupon(2, 2)]), true);
        let second = serialize(6, HllType::Hll6, &Mode::Array6(Array6::new(6)), false);
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut reader = stream.as_slice();
        assert_eq!(read_image(&mut reader).unwrap(), first);
        assert_eq!(read_image(&mut reader).unwrap(), second);
        assert!(reader.is_empty());

        let err = read_image(&mut &second[..20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }
}

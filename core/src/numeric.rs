//! Precision-step trie encoding of numeric values.
//!
//! A value is indexed as several terms: the full-precision value and copies
//! with the lowest `k * step` bits shifted away. A range is then covered by a
//! handful of terms, fine-grained at its edges and coarse in the middle, and
//! each term is looked up like any other term.
//!
//! Term layout: one byte `SHIFT_START + shift`, then the big-endian bytes of
//! `sortable >> shift` at the full width of the type, so that terms of one
//! type and shift sort like the numbers they encode.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PRECISION_STEP: u32 = 4;

pub const SHIFT_START_INT: u8 = 0x60;
pub const SHIFT_START_LONG: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    Int,
    Long,
    Float,
    Double,
}

impl NumericType {
    pub fn bits(self) -> u32 {
        match self {
            NumericType::Int | NumericType::Float => 32,
            NumericType::Long | NumericType::Double => 64,
        }
    }

    fn shift_start(self) -> u8 {
        match self.bits() {
            32 => SHIFT_START_INT,
            _ => SHIFT_START_LONG,
        }
    }

    /// Largest sortable value of the type.
    pub fn max_sortable(self) -> u64 {
        match self.bits() {
            32 => u32::MAX as u64,
            _ => u64::MAX,
        }
    }

    fn term_len(self) -> usize {
        1 + (self.bits() / 8) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl NumericValue {
    pub fn numeric_type(&self) -> NumericType {
        match self {
            NumericValue::Int(_) => NumericType::Int,
            NumericValue::Long(_) => NumericType::Long,
            NumericValue::Float(_) => NumericType::Float,
            NumericValue::Double(_) => NumericType::Double,
        }
    }

    /// Unsigned bits whose natural order matches the numeric order.
    pub fn to_sortable(self) -> u64 {
        match self {
            NumericValue::Int(v) => ((v as u32) ^ (1u32 << 31)) as u64,
            NumericValue::Long(v) => (v as u64) ^ (1u64 << 63),
            NumericValue::Float(v) => {
                let bits = v.to_bits();
                let ordered = if bits & 0x8000_0000 == 0 { bits ^ 0x8000_0000 } else { !bits };
                ordered as u64
            }
            NumericValue::Double(v) => {
                let bits = v.to_bits();
                if bits & 0x8000_0000_0000_0000 == 0 {
                    bits ^ 0x8000_0000_0000_0000
                } else {
                    !bits
                }
            }
        }
    }

    pub fn from_sortable(numeric_type: NumericType, sortable: u64) -> Self {
        match numeric_type {
            NumericType::Int => NumericValue::Int(((sortable as u32) ^ (1u32 << 31)) as i32),
            NumericType::Long => NumericValue::Long((sortable ^ (1u64 << 63)) as i64),
            NumericType::Float => {
                let ordered = sortable as u32;
                let bits = if ordered & 0x8000_0000 != 0 { ordered ^ 0x8000_0000 } else { !ordered };
                NumericValue::Float(f32::from_bits(bits))
            }
            NumericType::Double => {
                let bits = if sortable & 0x8000_0000_0000_0000 != 0 {
                    sortable ^ 0x8000_0000_0000_0000
                } else {
                    !sortable
                };
                NumericValue::Double(f64::from_bits(bits))
            }
        }
    }
}

/// Validated precision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionStep(u32);

impl PrecisionStep {
    pub fn new(step: u32) -> Result<Self> {
        if !(1..=64).contains(&step) {
            return Err(Error::InvalidPrecisionStep(step));
        }
        Ok(Self(step))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PrecisionStep {
    fn default() -> Self {
        Self(DEFAULT_PRECISION_STEP)
    }
}

pub fn encode_term(numeric_type: NumericType, sortable: u64, shift: u32) -> Vec<u8> {
    debug_assert!(shift < numeric_type.bits());
    let prefix = sortable >> shift;
    let mut term = Vec::with_capacity(numeric_type.term_len());
    term.push(numeric_type.shift_start() + shift as u8);
    match numeric_type.bits() {
        32 => term.extend_from_slice(&(prefix as u32).to_be_bytes()),
        _ => term.extend_from_slice(&prefix.to_be_bytes()),
    }
    term
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedTerm {
    pub shift: u32,
    /// Smallest value of the block the term stands for; exact when `shift == 0`.
    pub value: NumericValue,
}

pub fn decode_term(numeric_type: NumericType, term: &[u8]) -> Result<DecodedTerm> {
    if term.len() != numeric_type.term_len() {
        return Err(Error::MalformedTerm);
    }
    let shift = term[0]
        .checked_sub(numeric_type.shift_start())
        .map(u32::from)
        .filter(|&s| s < numeric_type.bits())
        .ok_or(Error::MalformedTerm)?;
    let prefix = term[1..].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    Ok(DecodedTerm {
        shift,
        value: NumericValue::from_sortable(numeric_type, prefix << shift),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericToken {
    pub shift: u32,
    pub term: Vec<u8>,
}

/// Terms of one value, full precision first.
#[derive(Debug, Clone)]
pub struct NumericTokens {
    numeric_type: NumericType,
    sortable: u64,
    step: u32,
    shift: u32,
}

impl NumericTokens {
    pub fn new(value: NumericValue, step: PrecisionStep) -> Self {
        Self {
            numeric_type: value.numeric_type(),
            sortable: value.to_sortable(),
            step: step.get(),
            shift: 0,
        }
    }
}

impl Iterator for NumericTokens {
    type Item = NumericToken;

    fn next(&mut self) -> Option<NumericToken> {
        if self.shift >= self.numeric_type.bits() {
            return None;
        }
        let shift = self.shift;
        self.shift = self.shift.saturating_add(self.step);
        Some(NumericToken { shift, term: encode_term(self.numeric_type, self.sortable, shift) })
    }
}

/// Inclusive term interval at one shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRange {
    pub shift: u32,
    pub lower_term: Vec<u8>,
    pub upper_term: Vec<u8>,
}

/// Resolves optional, possibly exclusive bounds into an inclusive sortable
/// interval. `None` means the range is empty.
pub fn sortable_bounds(
    field: &str,
    indexed: NumericType,
    lower: Option<NumericValue>,
    upper: Option<NumericValue>,
    include_lower: bool,
    include_upper: bool,
) -> Result<Option<(u64, u64)>> {
    for bound in [lower, upper].into_iter().flatten() {
        if bound.numeric_type() != indexed {
            return Err(Error::NumericTypeMismatch {
                field: field.to_string(),
                expected: indexed,
                found: bound.numeric_type(),
            });
        }
    }

    let min = match lower {
        None => Some(0),
        Some(v) if include_lower => Some(v.to_sortable()),
        Some(v) => v.to_sortable().checked_add(1).filter(|&s| s <= indexed.max_sortable()),
    };
    let max = match upper {
        None => Some(indexed.max_sortable()),
        Some(v) if include_upper => Some(v.to_sortable()),
        Some(v) => v.to_sortable().checked_sub(1),
    };
    Ok(match (min, max) {
        (Some(min), Some(max)) if min <= max => Some((min, max)),
        _ => None,
    })
}

/// Splits `[min, max]` (sortable, inclusive) into the fewest prefix ranges.
pub fn split_range(numeric_type: NumericType, step: PrecisionStep, min: u64, max: u64) -> Vec<PrefixRange> {
    let mut ranges = Vec::new();
    if min > max {
        return ranges;
    }
    let bits = numeric_type.bits();
    let step = step.get();
    let push = |ranges: &mut Vec<PrefixRange>, lo: u64, hi: u64, shift: u32| {
        ranges.push(PrefixRange {
            shift,
            lower_term: encode_term(numeric_type, lo, shift),
            upper_term: encode_term(numeric_type, hi, shift),
        });
    };

    let (mut min, mut max) = (min, max);
    let mut shift = 0u32;
    loop {
        if shift + step >= bits {
            push(&mut ranges, min, max, shift);
            break;
        }
        let diff = 1u64 << (shift + step);
        let mask = ((1u64 << step) - 1) << shift;
        let has_lower = min & mask != 0;
        let has_upper = max & mask != mask;
        let next_min = (if has_lower { min.wrapping_add(diff) } else { min }) & !mask;
        let next_max = (if has_upper { max.wrapping_sub(diff) } else { max }) & !mask;
        let lower_wrapped = next_min < min;
        let upper_wrapped = next_max > max;

        if next_min > next_max || lower_wrapped || upper_wrapped {
            push(&mut ranges, min, max, shift);
            break;
        }
        if has_lower {
            push(&mut ranges, min, min | mask, shift);
        }
        if has_upper {
            push(&mut ranges, max & !mask, max, shift);
        }
        min = next_min;
        max = next_max;
        shift += step;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(s: u32) -> PrecisionStep {
        PrecisionStep::new(s).unwrap()
    }

    #[test]
    fn full_precision_term_round_trips() {
        for value in [
            NumericValue::Int(-7),
            NumericValue::Int(500),
            NumericValue::Long(i64::MIN),
            NumericValue::Long(1 << 40),
            NumericValue::Float(-0.25),
            NumericValue::Double(1234.5),
        ] {
            let first = NumericTokens::new(value, step(4)).next().unwrap();
            assert_eq!(first.shift, 0);
            let decoded = decode_term(value.numeric_type(), &first.term).unwrap();
            assert_eq!(decoded.shift, 0);
            assert_eq!(decoded.value, value);
        }
    }

    #[test]
    fn tokens_decrease_in_precision_until_bit_width() {
        let shifts: Vec<u32> = NumericTokens::new(NumericValue::Int(500), step(8)).map(|t| t.shift).collect();
        assert_eq!(shifts, vec![0, 8, 16, 24]);
        let shifts: Vec<u32> = NumericTokens::new(NumericValue::Long(500), step(16)).map(|t| t.shift).collect();
        assert_eq!(shifts, vec![0, 16, 32, 48]);
        assert_eq!(NumericTokens::new(NumericValue::Int(1), step(64)).count(), 1);
    }

    #[test]
    fn sortable_bits_preserve_order() {
        let floats = [-1e10f32, -1.5, -0.0, 0.0, 1e-3, 2.0, f32::INFINITY];
        for w in floats.windows(2) {
            assert!(NumericValue::Float(w[0]).to_sortable() <= NumericValue::Float(w[1]).to_sortable());
        }
        let ints = [i32::MIN, -1, 0, 1, i32::MAX];
        for w in ints.windows(2) {
            assert!(NumericValue::Int(w[0]).to_sortable() < NumericValue::Int(w[1]).to_sortable());
        }
    }

    #[test]
    fn rejects_out_of_range_step() {
        assert!(matches!(PrecisionStep::new(0), Err(Error::InvalidPrecisionStep(0))));
        assert!(matches!(PrecisionStep::new(65), Err(Error::InvalidPrecisionStep(65))));
    }

    fn covering_ranges(ranges: &[PrefixRange], value: NumericValue) -> usize {
        NumericTokens::new(value, step(2))
            .filter(|token| {
                ranges.iter().any(|r| {
                    r.shift == token.shift
                        && r.lower_term.as_slice() <= token.term.as_slice()
                        && token.term.as_slice() <= r.upper_term.as_slice()
                })
            })
            .count()
    }

    #[test]
    fn split_covers_exactly_the_interval() {
        for (lo, hi) in [(-40, 37), (0, 0), (3, 64), (-1, 1), (10, 200)] {
            let (min, max) = sortable_bounds("n", NumericType::Int, Some(NumericValue::Int(lo)), Some(NumericValue::Int(hi)), true, true)
                .unwrap()
                .unwrap();
            let ranges = split_range(NumericType::Int, step(2), min, max);
            for v in (lo - 20)..=(hi + 20) {
                let hits = covering_ranges(&ranges, NumericValue::Int(v));
                let expected = usize::from(lo <= v && v <= hi);
                assert_eq!(hits, expected, "value {v} in [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn split_of_example_interval() {
        let (min, max) = sortable_bounds("n", NumericType::Int, Some(NumericValue::Int(10)), Some(NumericValue::Int(2000)), true, true)
            .unwrap()
            .unwrap();
        let ranges = split_range(NumericType::Int, step(4), min, max);
        let shifts: Vec<u32> = ranges.iter().map(|r| r.shift).collect();
        assert_eq!(shifts, vec![0, 0, 4, 4, 8]);
    }

    #[test]
    fn exclusive_and_open_bounds() {
        let b = sortable_bounds("n", NumericType::Int, Some(NumericValue::Int(5)), Some(NumericValue::Int(6)), false, false).unwrap();
        assert_eq!(b, None);
        let b = sortable_bounds("n", NumericType::Int, None, Some(NumericValue::Int(0)), true, false).unwrap();
        assert_eq!(b, Some((0, NumericValue::Int(-1).to_sortable())));
        let b = sortable_bounds("n", NumericType::Int, Some(NumericValue::Int(i32::MAX)), None, false, true).unwrap();
        assert_eq!(b, None);
    }

    #[test]
    fn bound_type_must_match_indexed_type() {
        let err = sortable_bounds("price", NumericType::Long, Some(NumericValue::Int(10)), None, true, true).unwrap_err();
        assert!(matches!(
            err,
            Error::NumericTypeMismatch { expected: NumericType::Long, found: NumericType::Int, .. }
        ));
    }
}

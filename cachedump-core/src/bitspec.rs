/*!
Raw bitfield extraction from fixed-size records.

A record is a little-endian byte array. Bits are numbered from the least significant
bit of byte 0 upwards, so byte `i` holds bits `8*i..=8*i+7`.
*/

use crate::error::{Error, Result};

use std::fmt;

use smallvec::SmallVec;

/// Source bit indices of a gathered field, output bit 0 first.
pub type BitPositions = SmallVec<[u32; 16]>;

/// Maximum number of 32-bit words a contiguous range may span.
pub const MAX_WORD_COUNT: u32 = 3;

/// Creates a mask covering the lowest `width` bits.
///
/// # Examples
///
/// ```
/// use cachedump_core::bitspec::bit_mask;
///
/// assert_eq!(bit_mask(12), 0xfff);
/// assert_eq!(bit_mask(64), !0);
/// ```
#[inline]
pub const fn bit_mask(width: u32) -> u64 {
    if width >= 64 {
        !0
    } else {
        (1u64 << width) - 1
    }
}

/// Returns the bit at `idx` of the record or `None` if it lies past the end.
#[inline]
pub fn bit_at(record: &[u8], idx: u32) -> Option<bool> {
    record
        .get((idx / 8) as usize)
        .map(|byte| (byte >> (idx % 8)) & 1 != 0)
}

/// Reads the little-endian 32-bit word with the given index.
#[inline]
pub fn read_word(record: &[u8], index: usize) -> Option<u32> {
    let start = index.checked_mul(4)?;
    record
        .get(start..start.checked_add(4)?)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Describes how the raw value of a single field is pulled out of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BitSpec {
    /// `width` consecutive bits starting at `bit_offset`.
    ///
    /// `word_count` words are assembled starting at the word holding `bit_offset`,
    /// the first word ending up in the least significant position.
    ContiguousRange {
        word_count: u32,
        bit_offset: u32,
        width: u32,
    },
    /// Arbitrary single bits, `positions[j]` becoming bit `j` of the result.
    Gather { positions: BitPositions },
}

impl BitSpec {
    /// Contiguous range spanning as few words as possible.
    pub fn range(bit_offset: u32, width: u32) -> Self {
        let word_count = ((bit_offset % 32) + width + 31) / 32;
        Self::words(word_count.max(1), bit_offset, width)
    }

    /// Contiguous range over an explicit number of words.
    pub fn words(word_count: u32, bit_offset: u32, width: u32) -> Self {
        BitSpec::ContiguousRange {
            word_count,
            bit_offset,
            width,
        }
    }

    pub fn gather<I: IntoIterator<Item = u32>>(positions: I) -> Self {
        BitSpec::Gather {
            positions: positions.into_iter().collect(),
        }
    }

    /// Parses a bit expression such as `"7,3:0,12"` into a gather.
    ///
    /// See [`parse_bit_expr`] for the grammar.
    pub fn parse(expr: &str) -> Result<Self> {
        parse_bit_expr(expr).map(|positions| BitSpec::Gather { positions })
    }

    /// Number of bits the extracted value can occupy before post processing.
    pub fn natural_width(&self) -> u32 {
        match self {
            BitSpec::ContiguousRange { width, .. } => *width,
            BitSpec::Gather { positions } => positions.len() as u32,
        }
    }

    /// Checks the spec for inconsistencies that do not depend on a record.
    pub fn validate(&self) -> Result<()> {
        match self {
            BitSpec::ContiguousRange {
                word_count,
                bit_offset,
                width,
            } => {
                if *width == 0 || *width > 64 {
                    return Err(Error::layout(format!(
                        "contiguous range width {} is not within 1..=64",
                        width
                    )));
                }
                if *word_count == 0 || *word_count > MAX_WORD_COUNT {
                    return Err(Error::layout(format!(
                        "contiguous range word count {} is not within 1..={}",
                        word_count, MAX_WORD_COUNT
                    )));
                }
                if (bit_offset % 32) + width > word_count * 32 {
                    return Err(Error::layout(format!(
                        "bits {}..{} do not fit into {} words",
                        bit_offset,
                        bit_offset + width,
                        word_count
                    )));
                }
                Ok(())
            }
            BitSpec::Gather { positions } => {
                if positions.is_empty() {
                    return Err(Error::layout("empty bit list"));
                }
                if positions.len() > 64 {
                    return Err(Error::layout(format!(
                        "{} gathered bits do not fit into 64 bits",
                        positions.len()
                    )));
                }
                if let Some(dup) = first_duplicate(positions) {
                    return Err(Error::layout(format!("bit {} is listed twice", dup)));
                }
                Ok(())
            }
        }
    }

    /// Checks that every bit referenced by the spec lies inside a record of `record_size` bytes.
    pub fn validate_for_record(&self, record_size: u32) -> Result<()> {
        self.validate()?;
        let record_bits = record_size as u64 * 8;
        let highest = match self {
            BitSpec::ContiguousRange {
                word_count,
                bit_offset,
                ..
            } => (*bit_offset as u64 / 32 + *word_count as u64) * 32 - 1,
            BitSpec::Gather { positions } => {
                positions.iter().copied().max().unwrap_or_default() as u64
            }
        };
        if highest >= record_bits {
            return Err(Error::layout(format!(
                "bit {} is outside of the {} byte record",
                highest, record_size
            )));
        }
        Ok(())
    }

    /// Extracts the raw field value from a record.
    ///
    /// Fails with `Error::Layout` when the spec references bits outside of the record
    /// or lists a bit twice.
    pub fn extract(&self, record: &[u8]) -> Result<u64> {
        match self {
            BitSpec::ContiguousRange {
                word_count,
                bit_offset,
                width,
            } => {
                if *word_count == 0 || *word_count > MAX_WORD_COUNT {
                    return Err(Error::layout(format!(
                        "contiguous range word count {} is not within 1..={}",
                        word_count, MAX_WORD_COUNT
                    )));
                }

                let first = (bit_offset / 32) as usize;
                let mut acc = 0u128;
                for i in 0..*word_count as usize {
                    let word = read_word(record, first + i).ok_or_else(|| {
                        Error::layout(format!(
                            "word {} is outside of the {} byte record",
                            first + i,
                            record.len()
                        ))
                    })?;
                    acc |= (word as u128) << (32 * i);
                }

                Ok(((acc >> (bit_offset % 32)) as u64) & bit_mask(*width))
            }
            BitSpec::Gather { positions } => {
                if positions.len() > 64 {
                    return Err(Error::layout(format!(
                        "{} gathered bits do not fit into 64 bits",
                        positions.len()
                    )));
                }

                let mut value = 0u64;
                for (j, &pos) in positions.iter().enumerate() {
                    let bit = bit_at(record, pos).ok_or_else(|| {
                        Error::layout(format!(
                            "bit {} is outside of the {} byte record",
                            pos,
                            record.len()
                        ))
                    })?;
                    if positions[..j].contains(&pos) {
                        return Err(Error::layout(format!("bit {} is listed twice", pos)));
                    }
                    if bit {
                        value |= 1 << j;
                    }
                }
                Ok(value)
            }
        }
    }
}

impl fmt::Display for BitSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BitSpec::ContiguousRange {
                bit_offset, width, ..
            } => write!(f, "[{}:{}]", bit_offset + width.saturating_sub(1), bit_offset),
            BitSpec::Gather { positions } => {
                write!(f, "{{")?;
                for (i, pos) in positions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", pos)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn first_duplicate(positions: &[u32]) -> Option<u32> {
    positions
        .iter()
        .enumerate()
        .find(|&(i, pos)| positions[..i].contains(pos))
        .map(|(_, pos)| *pos)
}

/// Parses an unsigned number, either decimal or `0x` prefixed hexadecimal.
pub fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Parses a comma-separated bit expression into gather positions.
///
/// Each item is either a single bit index or a range `a:b`. A range always expands in
/// ascending order `min(a, b)..=max(a, b)`, no matter which bound was written first,
/// while items keep the order in which they are listed.
///
/// # Examples
///
/// ```
/// use cachedump_core::bitspec::parse_bit_expr;
///
/// let bits = parse_bit_expr("9, 3:1").unwrap();
/// assert_eq!(&bits[..], &[9, 1, 2, 3]);
/// ```
pub fn parse_bit_expr(expr: &str) -> Result<BitPositions> {
    let mut positions = BitPositions::new();

    for item in expr.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(Error::layout(format!(
                "empty item in bit expression `{}`",
                expr
            )));
        }

        let mut bounds = item.splitn(2, ':');
        let first = bounds.next().and_then(parse_bit_index);
        match (first, bounds.next()) {
            (Some(bit), None) => positions.push(bit),
            (Some(a), Some(b)) => {
                let b = parse_bit_index(b).ok_or_else(|| {
                    Error::layout(format!("invalid bit range `{}` in `{}`", item, expr))
                })?;
                positions.extend(a.min(b)..=a.max(b));
            }
            (None, _) => {
                return Err(Error::layout(format!(
                    "invalid bit `{}` in `{}`",
                    item, expr
                )))
            }
        }
    }

    Ok(positions)
}

fn parse_bit_index(text: &str) -> Option<u32> {
    parse_number(text).and_then(|n| {
        if n <= u32::MAX as u64 {
            Some(n as u32)
        } else {
            None
        }
    })
}

/*!
Post processing of extracted field values.

Dumped fields frequently hold only a fragment of the value they describe, e.g. a tag
holding physical address bits `[39:12]` while the set index supplies bits `[11:6]`.
A small, ordered pipeline of [`PostProcessOp`] steps turns the raw value into the
value that gets displayed.
*/

use crate::bitspec::{bit_mask, parse_number};
use crate::error::{Error, Result};

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Coordinate of the cell that is currently being decoded.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CellIndex {
    pub way: u32,
    pub set: u32,
}

impl CellIndex {
    pub const fn new(way: u32, set: u32) -> Self {
        Self { way, set }
    }
}

/// Which index of the cell is folded into a value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IndexSource {
    Set,
    Way,
}

impl IndexSource {
    #[inline]
    fn pick(self, ctx: CellIndex) -> u32 {
        match self {
            IndexSource::Set => ctx.set,
            IndexSource::Way => ctx.way,
        }
    }

    fn to_str(self) -> &'static str {
        match self {
            IndexSource::Set => "set",
            IndexSource::Way => "way",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComposeOp {
    Or,
    And,
}

/// A single step of the post processing pipeline.
///
/// All steps are total functions over `u64`, configuration errors are reported by
/// [`PostProcessOp::validate`] when a layout is built.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PostProcessOp {
    ShiftLeft(u32),
    ShiftRight(u32),
    /// Folds bits `low..=high` of the set or way index into the value.
    ///
    /// The bits stay at their position in the index and are shifted left by `shift`
    /// before being combined with the value.
    ComposeWithIndex {
        source: IndexSource,
        low: u32,
        high: u32,
        op: ComposeOp,
        shift: u32,
    },
    /// Sets bits `extension_start..total_width` if bit `sign_bit` is set.
    SignExtend {
        total_width: u32,
        sign_bit: u32,
        extension_start: u32,
    },
}

impl PostProcessOp {
    pub fn compose(
        source: IndexSource,
        bits: RangeInclusive<u32>,
        op: ComposeOp,
        shift: u32,
    ) -> Self {
        PostProcessOp::ComposeWithIndex {
            source,
            low: *bits.start(),
            high: *bits.end(),
            op,
            shift,
        }
    }

    /// Sign extends a `width` bit value to 64 bits.
    pub fn sign_extend_to_u64(width: u32) -> Self {
        PostProcessOp::SignExtend {
            total_width: 64,
            sign_bit: width.saturating_sub(1),
            extension_start: width,
        }
    }

    /// Applies this step to `raw`.
    pub fn apply(&self, raw: u64, ctx: CellIndex) -> u64 {
        match *self {
            PostProcessOp::ShiftLeft(n) => raw.checked_shl(n).unwrap_or(0),
            PostProcessOp::ShiftRight(n) => raw.checked_shr(n).unwrap_or(0),
            PostProcessOp::ComposeWithIndex {
                source,
                low,
                high,
                op,
                shift,
            } => {
                let mask = bit_mask(high.saturating_add(1)) & !bit_mask(low);
                let operand = (source.pick(ctx) as u64 & mask)
                    .checked_shl(shift)
                    .unwrap_or(0);
                match op {
                    ComposeOp::Or => raw | operand,
                    ComposeOp::And => raw & operand,
                }
            }
            PostProcessOp::SignExtend {
                total_width,
                sign_bit,
                extension_start,
            } => {
                if sign_bit < 64 && (raw >> sign_bit) & 1 != 0 {
                    raw | (bit_mask(total_width) & !bit_mask(extension_start))
                } else {
                    raw
                }
            }
        }
    }

    /// Returns the bit width of a value of `width` bits after this step.
    pub fn widen(&self, width: u32) -> u32 {
        match *self {
            PostProcessOp::ShiftLeft(n) => width.saturating_add(n).min(64),
            PostProcessOp::SignExtend { total_width, .. } => width.max(total_width).min(64),
            _ => width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            PostProcessOp::ShiftLeft(_) | PostProcessOp::ShiftRight(_) => Ok(()),
            PostProcessOp::ComposeWithIndex {
                low, high, shift, ..
            } => {
                if low > high || high >= 32 {
                    Err(Error::layout(format!(
                        "index bits {}..={} are not within a 32 bit index",
                        low, high
                    )))
                } else if shift >= 64 {
                    Err(Error::layout(format!("index shift {} is too large", shift)))
                } else {
                    Ok(())
                }
            }
            PostProcessOp::SignExtend {
                total_width,
                sign_bit,
                extension_start,
            } => {
                if total_width > 64 {
                    Err(Error::layout(format!(
                        "sign extension width {} exceeds 64 bits",
                        total_width
                    )))
                } else if extension_start > total_width {
                    Err(Error::layout(format!(
                        "sign extension starts at bit {} past its width {}",
                        extension_start, total_width
                    )))
                } else if sign_bit >= 64 {
                    Err(Error::layout(format!("sign bit {} is out of range", sign_bit)))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Runs `raw` through every step of the pipeline in order.
pub fn apply_all(ops: &[PostProcessOp], raw: u64, ctx: CellIndex) -> u64 {
    ops.iter().fold(raw, |value, op| op.apply(value, ctx))
}

/// Tracks the bit width of a value through every step of the pipeline.
pub fn widen_all(ops: &[PostProcessOp], width: u32) -> u32 {
    ops.iter().fold(width, |width, op| op.widen(width))
}

impl fmt::Display for PostProcessOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PostProcessOp::ShiftLeft(n) => write!(f, "<<{}", n),
            PostProcessOp::ShiftRight(n) => write!(f, ">>{}", n),
            PostProcessOp::ComposeWithIndex {
                source,
                low,
                high,
                op,
                shift,
            } => {
                let op = match op {
                    ComposeOp::Or => '|',
                    ComposeOp::And => '&',
                };
                write!(f, "{}{}[{}:{}]", op, source.to_str(), high, low)?;
                if shift > 0 {
                    write!(f, "<<{}", shift)?;
                }
                Ok(())
            }
            PostProcessOp::SignExtend {
                total_width,
                sign_bit,
                extension_start,
            } => write!(f, "sext({},{},{})", total_width, sign_bit, extension_start),
        }
    }
}

/// Parses the textual form of a step.
///
/// Accepted forms are `<<N`, `>>N`, `|set[a:b]`, `&way[a]` optionally followed by
/// `<<N` and `sext(total_width,sign_bit,extension_start)`. Whitespace is ignored.
impl FromStr for PostProcessOp {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || Error::layout(format!("unable to parse post process step `{}`", text));

        if let Some(n) = compact.strip_prefix("<<") {
            return parse_u32(n).map(PostProcessOp::ShiftLeft).ok_or_else(invalid);
        }
        if let Some(n) = compact.strip_prefix(">>") {
            return parse_u32(n).map(PostProcessOp::ShiftRight).ok_or_else(invalid);
        }

        if let Some(args) = compact
            .strip_prefix("sext(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let args = args
                .split(',')
                .map(parse_u32)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?;
            if let [total_width, sign_bit, extension_start] = args[..] {
                return Ok(PostProcessOp::SignExtend {
                    total_width,
                    sign_bit,
                    extension_start,
                });
            }
            return Err(invalid());
        }

        let op = match compact.chars().next() {
            Some('|') => ComposeOp::Or,
            Some('&') => ComposeOp::And,
            _ => return Err(invalid()),
        };
        let rest = &compact[1..];
        let source = if rest.starts_with("set[") {
            IndexSource::Set
        } else if rest.starts_with("way[") {
            IndexSource::Way
        } else {
            return Err(invalid());
        };

        let close = rest.find(']').ok_or_else(invalid)?;
        let bits = &rest[4..close];
        let (low, high) = match bits.find(':') {
            Some(idx) => {
                let a = parse_u32(&bits[..idx]).ok_or_else(invalid)?;
                let b = parse_u32(&bits[idx + 1..]).ok_or_else(invalid)?;
                (a.min(b), a.max(b))
            }
            None => {
                let bit = parse_u32(bits).ok_or_else(invalid)?;
                (bit, bit)
            }
        };

        let tail = &rest[close + 1..];
        let shift = if tail.is_empty() {
            0
        } else {
            tail.strip_prefix("<<")
                .and_then(parse_u32)
                .ok_or_else(invalid)?
        };

        Ok(PostProcessOp::ComposeWithIndex {
            source,
            low,
            high,
            op,
            shift,
        })
    }
}

fn parse_u32(text: &str) -> Option<u32> {
    parse_number(text).and_then(|n| {
        if n <= u32::MAX as u64 {
            Some(n as u32)
        } else {
            None
        }
    })
}

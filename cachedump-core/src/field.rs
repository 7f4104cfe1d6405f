/*!
Field descriptors and their display rules.
*/

use crate::bitspec::BitSpec;
use crate::error::{Error, Result};
use crate::postprocess::{self, CellIndex, PostProcessOp};

use hashbrown::HashMap;
use smallvec::SmallVec;

/// Maps raw field values to symbolic labels.
pub type ValueMap = HashMap<u64, String>;

/// Ordered post processing steps of a field.
pub type PostProcess = SmallVec<[PostProcessOp; 2]>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DisplayBase {
    Hex,
    Decimal,
}

impl DisplayBase {
    /// Number of digits needed to print any value of `bits` bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachedump_core::field::DisplayBase;
    ///
    /// assert_eq!(DisplayBase::Hex.digits(32), 8);
    /// assert_eq!(DisplayBase::Decimal.digits(10), 4);
    /// assert_eq!(DisplayBase::Decimal.digits(0), 1);
    /// ```
    pub fn digits(self, bits: u32) -> u32 {
        match self {
            DisplayBase::Hex => ((bits + 3) / 4).max(1),
            DisplayBase::Decimal => decimal_digits(bits),
        }
    }
}

/// `ceil(log10(2^bits))`, computed exactly.
///
/// `2^bits` is never a power of ten for `bits > 0`, so the ceiling equals the
/// number of decimal digits of `2^bits`.
fn decimal_digits(bits: u32) -> u32 {
    if bits == 0 {
        return 1;
    }
    let mut n = 1u128 << bits.min(64);
    let mut digits = 0;
    while n > 0 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Describes a single named field of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub bitspec: BitSpec,
    pub post_process: PostProcess,
    pub base: DisplayBase,
    pub value_map: Option<ValueMap>,
}

impl FieldDescriptor {
    /// Creates a decimal field without post processing.
    pub fn new<S: Into<String>>(name: S, bitspec: BitSpec) -> Self {
        Self {
            name: name.into(),
            bitspec,
            post_process: PostProcess::new(),
            base: DisplayBase::Decimal,
            value_map: None,
        }
    }

    pub fn hex(self) -> Self {
        self.base(DisplayBase::Hex)
    }

    pub fn base(mut self, base: DisplayBase) -> Self {
        self.base = base;
        self
    }

    /// Appends a post processing step.
    pub fn post(mut self, op: PostProcessOp) -> Self {
        self.post_process.push(op);
        self
    }

    pub fn value_map<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        self.value_map = Some(
            labels
                .into_iter()
                .map(|(value, label)| (value, label.into()))
                .collect(),
        );
        self
    }

    pub fn natural_width(&self) -> u32 {
        self.bitspec.natural_width()
    }

    /// Width of the value after the post processing pipeline.
    pub fn effective_width(&self) -> u32 {
        postprocess::widen_all(&self.post_process, self.natural_width())
    }

    pub fn numeric_width(&self) -> u32 {
        self.base.digits(self.effective_width())
    }

    /// Characters needed to print the widest value or label of this field.
    pub fn display_width(&self) -> u32 {
        let label = self
            .value_map
            .as_ref()
            .and_then(|map| map.values().map(|label| label.chars().count()).max())
            .unwrap_or(0) as u32;
        self.numeric_width().max(label).max(1)
    }

    /// Width of the table column, wide enough for the header as well.
    pub fn column_width(&self) -> usize {
        (self.display_width() as usize).max(self.name.chars().count())
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::layout("field without a name"));
        }
        self.bitspec
            .validate()
            .and_then(|_| self.post_process.iter().try_for_each(PostProcessOp::validate))
            .map_err(|err| self.annotate(err))
    }

    pub fn validate_for_record(&self, record_size: u32) -> Result<()> {
        self.validate()?;
        self.bitspec
            .validate_for_record(record_size)
            .map_err(|err| self.annotate(err))
    }

    fn annotate(&self, err: Error) -> Error {
        match err {
            Error::Layout(reason) => Error::Layout(format!("field `{}`: {}", self.name, reason)),
            err => err,
        }
    }

    /// Extracts the raw value and runs it through the pipeline.
    ///
    /// Returns `(raw, value)`.
    pub fn process(&self, record: &[u8], ctx: CellIndex) -> Result<(u64, u64)> {
        let raw = self
            .bitspec
            .extract(record)
            .map_err(|err| self.annotate(err))?;
        Ok((raw, postprocess::apply_all(&self.post_process, raw, ctx)))
    }

    /// Renders a value padded to the display width of this field.
    pub fn render(&self, raw: u64, value: u64) -> String {
        self.render_padded(raw, value, self.display_width() as usize)
    }

    /// Renders a value padded to `width`.
    ///
    /// A label found in the value map for `raw` is printed as is. Numbers are zero
    /// padded if the field has a post processing pipeline and right-justified with
    /// spaces otherwise.
    pub fn render_padded(&self, raw: u64, value: u64, width: usize) -> String {
        if let Some(label) = self.value_map.as_ref().and_then(|map| map.get(&raw)) {
            return label.clone();
        }

        match (self.base, self.post_process.is_empty()) {
            (DisplayBase::Hex, false) => format!("{:0width$x}", value, width = width),
            (DisplayBase::Hex, true) => format!("{:>width$x}", value, width = width),
            (DisplayBase::Decimal, false) => format!("{:0width$}", value, width = width),
            (DisplayBase::Decimal, true) => format!("{:>width$}", value, width = width),
        }
    }

    /// Extracts, post processes and renders the field of a single record.
    pub fn decode(&self, record: &[u8], ctx: CellIndex) -> Result<(u64, String)> {
        let (raw, value) = self.process(record, ctx)?;
        Ok((value, self.render(raw, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::{ComposeOp, IndexSource};

    #[test]
    fn test_hex_digits() {
        assert_eq!(DisplayBase::Hex.digits(0), 1);
        assert_eq!(DisplayBase::Hex.digits(1), 1);
        assert_eq!(DisplayBase::Hex.digits(4), 1);
        assert_eq!(DisplayBase::Hex.digits(5), 2);
        assert_eq!(DisplayBase::Hex.digits(32), 8);
        assert_eq!(DisplayBase::Hex.digits(64), 16);
    }

    #[test]
    fn test_decimal_digits() {
        assert_eq!(DisplayBase::Decimal.digits(0), 1);
        assert_eq!(DisplayBase::Decimal.digits(1), 1);
        assert_eq!(DisplayBase::Decimal.digits(3), 1);
        assert_eq!(DisplayBase::Decimal.digits(4), 2);
        assert_eq!(DisplayBase::Decimal.digits(10), 4);
        assert_eq!(DisplayBase::Decimal.digits(32), 10);
        assert_eq!(DisplayBase::Decimal.digits(64), 20);
    }

    #[test]
    fn test_display_width_monotonic() {
        for base in [DisplayBase::Hex, DisplayBase::Decimal].iter() {
            let mut prev = 0;
            for width in 1..=64 {
                let field = FieldDescriptor::new("F", BitSpec::range(0, width)).base(*base);
                let cur = field.display_width();
                assert!(cur >= 1);
                assert!(cur >= prev, "{:?} width {} shrank", base, width);
                prev = cur;
            }
        }
    }

    #[test]
    fn test_effective_width() {
        let field = FieldDescriptor::new("PA", BitSpec::range(0, 28))
            .hex()
            .post(PostProcessOp::ShiftLeft(12));
        assert_eq!(field.effective_width(), 40);
        assert_eq!(field.display_width(), 10);

        let field = FieldDescriptor::new("VA", BitSpec::gather(vec![0]))
            .hex()
            .post(PostProcessOp::sign_extend_to_u64(1));
        assert_eq!(field.effective_width(), 64);
        assert_eq!(field.display_width(), 16);
    }

    #[test]
    fn test_label_width() {
        let field = FieldDescriptor::new("S", BitSpec::range(0, 2))
            .value_map(vec![(0, "Invalid"), (1, "Valid")]);
        assert_eq!(field.numeric_width(), 1);
        assert_eq!(field.display_width(), 7);
        assert_eq!(field.column_width(), 7);

        let field = FieldDescriptor::new("MESI_STATE", BitSpec::range(0, 2));
        assert_eq!(field.column_width(), 10);
    }

    #[test]
    fn test_render_padding() {
        let record = 0x0000_00abu32.to_le_bytes();

        let plain = FieldDescriptor::new("V", BitSpec::range(0, 16)).hex();
        assert_eq!(plain.decode(&record, CellIndex::default()).unwrap().1, "  ab");

        let shifted = FieldDescriptor::new("V", BitSpec::range(0, 16))
            .hex()
            .post(PostProcessOp::ShiftRight(0));
        assert_eq!(shifted.decode(&record, CellIndex::default()).unwrap().1, "00ab");

        let decimal = FieldDescriptor::new("V", BitSpec::range(0, 8));
        assert_eq!(decimal.decode(&record, CellIndex::default()).unwrap().1, "171");

        let decimal = FieldDescriptor::new("V", BitSpec::range(0, 16));
        assert_eq!(
            decimal.decode(&record, CellIndex::default()).unwrap().1,
            "  171"
        );
    }

    #[test]
    fn test_render_label_not_padded() {
        let field = FieldDescriptor::new("STATE", BitSpec::range(0, 2))
            .post(PostProcessOp::compose(
                IndexSource::Way,
                0..=0,
                ComposeOp::Or,
                0,
            ))
            .value_map(vec![(0, "I"), (3, "Modified")]);

        assert_eq!(field.display_width(), 8);
        // label of the raw value, left at its own length
        assert_eq!(field.render(0, 0), "I");
        assert_eq!(field.render(3, 3), "Modified");
        // unmapped values are zero padded to the full display width
        assert_eq!(field.render(2, 2), "00000002");
    }

    #[test]
    fn test_decode_with_index() {
        let record = 0x0000_0001u32.to_le_bytes();
        let field = FieldDescriptor::new("PA", BitSpec::range(0, 28))
            .hex()
            .post(PostProcessOp::ShiftLeft(12))
            .post(PostProcessOp::compose(IndexSource::Set, 0..=5, ComposeOp::Or, 6));

        let (value, rendered) = field.decode(&record, CellIndex::new(0, 0x3f)).unwrap();
        assert_eq!(value, 0x1fc0);
        assert_eq!(rendered, "0000001fc0");
    }

    #[test]
    fn test_validate() {
        assert!(FieldDescriptor::new("", BitSpec::range(0, 1)).validate().is_err());
        assert!(FieldDescriptor::new("A", BitSpec::gather(Vec::new()))
            .validate()
            .is_err());
        let err = FieldDescriptor::new("A", BitSpec::range(0, 4))
            .post(PostProcessOp::SignExtend {
                total_width: 8,
                sign_bit: 3,
                extension_start: 12,
            })
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("field `A`"));
        assert!(FieldDescriptor::new("A", BitSpec::range(30, 4))
            .validate_for_record(4)
            .is_err());
    }
}

/*!
Decoding of records into field values.
*/

use crate::error::{Error, Result};
use crate::layout::LayoutDescriptor;
use crate::postprocess::CellIndex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A single decoded field of a record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedValue {
    pub name: String,
    /// Value as extracted from the record.
    pub raw: u64,
    /// Value after post processing.
    pub value: u64,
    /// Printable form, padded to the display width of the field.
    pub rendered: String,
}

/// All decoded fields of the record at `(way, set)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedCell {
    pub way: u32,
    pub set: u32,
    pub values: Vec<DecodedValue>,
}

impl DecodedCell {
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.values.iter().find(|v| v.name == name)
    }
}

/// Decodes the records of a single layout.
///
/// The decoder borrows the layout and precomputes the display width of every field.
pub struct RecordDecoder<'a> {
    layout: &'a LayoutDescriptor,
    widths: Vec<usize>,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(layout: &'a LayoutDescriptor) -> Self {
        Self {
            layout,
            widths: layout
                .fields
                .iter()
                .map(|f| f.display_width() as usize)
                .collect(),
        }
    }

    pub fn layout(&self) -> &LayoutDescriptor {
        self.layout
    }

    /// Decodes a record that is exactly `record_size` bytes long.
    pub fn decode_cell(&self, record: &[u8], way: u32, set: u32) -> Result<DecodedCell> {
        if record.len() != self.layout.record_size as usize {
            return Err(Error::Bounds {
                what: "record bytes",
                required: self.layout.record_size as u64,
                available: record.len() as u64,
            });
        }

        let ctx = CellIndex::new(way, set);
        let values = self
            .layout
            .fields
            .iter()
            .zip(self.widths.iter())
            .map(|(field, width)| {
                let (raw, value) = field.process(record, ctx)?;
                Ok(DecodedValue {
                    name: field.name.clone(),
                    raw,
                    value,
                    rendered: field.render_padded(raw, value, *width),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DecodedCell { way, set, values })
    }

    /// Decodes every cell of the layout from `buf`, starting at `start`.
    ///
    /// The whole region, including the fragment offset, has to fit into `buf`.
    /// Cells are returned way-major.
    pub fn decode_region(&self, buf: &[u8], start: u64) -> Result<Vec<DecodedCell>> {
        let available = buf.len() as u64;
        let end = self
            .layout
            .span()
            .and_then(|span| start.checked_add(span))
            .ok_or_else(|| Error::bytes(u64::max_value(), available))?;
        if end > available {
            return Err(Error::bytes(end, available));
        }

        let region = &buf[(start + self.layout.fragment_offset) as usize..end as usize];
        let record_size = self.layout.record_size as usize;
        let sets = self.layout.sets;

        let decode = |(i, record): (usize, &[u8])| {
            let i = i as u32;
            self.decode_cell(record, i / sets, i % sets)
        };

        #[cfg(feature = "parallel")]
        let cells = region
            .par_chunks_exact(record_size)
            .enumerate()
            .map(decode)
            .collect::<Result<Vec<_>>>();

        #[cfg(not(feature = "parallel"))]
        let cells = region
            .chunks_exact(record_size)
            .enumerate()
            .map(decode)
            .collect::<Result<Vec<_>>>();

        cells
    }
}

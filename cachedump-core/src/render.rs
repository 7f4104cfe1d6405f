/*!
Fixed-width text tables of decoded cells.

Every table starts with the `Way` and `Set` index columns, followed by one column per
field. Columns are right-justified and separated by a single space:

```text
Way Set      TAG MESI
  0   0 11111111    M
  0   1 22222222    I
```
*/

use crate::decode::DecodedCell;
use crate::error::{Error, Result};
use crate::layout::LayoutDescriptor;

use std::fmt;
use std::io;

use itertools::Itertools;

const WAY_HEADER: &str = "Way";
const SET_HEADER: &str = "Set";

/// A rendered table, ready to be written out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderedTable {
    pub name: String,
    pub header: String,
    pub rows: Vec<String>,
    /// Length of the index columns of each line, including their trailing separator.
    pub index_width: usize,
}

impl RenderedTable {
    /// Header and rows, each terminated by a newline.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn write_to<W: io::Write>(&self, mut out: W) -> Result<()> {
        out.write_all(self.to_text().as_bytes())
            .map_err(|_| Error::IO("unable to write table"))
    }
}

impl fmt::Display for RenderedTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for row in self.rows.iter() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

fn index_width(header: &str, count: u32) -> usize {
    let digits = format!("{:x}", count.saturating_sub(1)).len();
    header.len().max(digits)
}

pub struct TableRenderer;

impl TableRenderer {
    /// Renders decoded cells of `layout` into a table named after the layout.
    pub fn render(layout: &LayoutDescriptor, cells: &[DecodedCell]) -> RenderedTable {
        let way_width = index_width(WAY_HEADER, layout.ways);
        let set_width = index_width(SET_HEADER, layout.sets);
        let widths: Vec<usize> = layout.fields.iter().map(|f| f.column_width()).collect();

        let header = format!(
            "{:>ww$} {:>sw$} {}",
            WAY_HEADER,
            SET_HEADER,
            layout
                .fields
                .iter()
                .zip(widths.iter())
                .map(|(field, width)| format!("{:>w$}", field.name, w = *width))
                .join(" "),
            ww = way_width,
            sw = set_width,
        );

        let rows = cells
            .iter()
            .map(|cell| {
                format!(
                    "{:>ww$x} {:>sw$x} {}",
                    cell.way,
                    cell.set,
                    cell.values
                        .iter()
                        .zip(widths.iter())
                        .map(|(value, width)| format!("{:>w$}", value.rendered, w = *width))
                        .join(" "),
                    ww = way_width,
                    sw = set_width,
                )
            })
            .collect();

        RenderedTable {
            name: layout.name.clone(),
            header,
            rows,
            index_width: way_width + set_width + 2,
        }
    }

    /// Joins a tag table and a data table row by row.
    ///
    /// The data rows lose their index columns, both tables need the same number of rows.
    pub fn merge(tag: &RenderedTable, data: &RenderedTable) -> Result<RenderedTable> {
        if tag.rows.len() != data.rows.len() {
            return Err(Error::Bounds {
                what: "rows",
                required: tag.rows.len() as u64,
                available: data.rows.len() as u64,
            });
        }

        let strip = |line: &str| line.get(data.index_width..).unwrap_or("").to_string();

        let tag_suffix = tag
            .name
            .len()
            .checked_sub(4)
            .and_then(|split| tag.name.get(split..));
        let name = match tag_suffix {
            Some(suffix) if suffix.eq_ignore_ascii_case("_TAG") => format!("{}_DATA", tag.name),
            _ => format!("{}+{}", tag.name, data.name),
        };

        Ok(RenderedTable {
            name,
            header: format!("{} {}", tag.header, strip(&data.header)),
            rows: tag
                .rows
                .iter()
                .zip(data.rows.iter())
                .map(|(t, d)| format!("{} {}", t, strip(d)))
                .collect(),
            index_width: tag.index_width,
        })
    }
}

/*!
Layout descriptors of cache and tlb ram dumps.
*/

use crate::error::{Error, Result};
use crate::field::FieldDescriptor;

use std::fmt;

/// Identifies a layout inside of a [`LayoutRegistry`](crate::registry::LayoutRegistry).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LayoutKey {
    /// Key found in the memory dump table of a target.
    Hardware {
        hardware_id: String,
        client_id: u32,
        version: u8,
    },
    /// Key of per-cpu layouts, hard-coded or loaded from a schema.
    Named { cpu_name: String, cache_type: String },
}

impl LayoutKey {
    pub fn hardware<S: Into<String>>(hardware_id: S, client_id: u32, version: u8) -> Self {
        LayoutKey::Hardware {
            hardware_id: hardware_id.into(),
            client_id,
            version,
        }
    }

    pub fn named<C: Into<String>, T: Into<String>>(cpu_name: C, cache_type: T) -> Self {
        LayoutKey::Named {
            cpu_name: cpu_name.into(),
            cache_type: cache_type.into(),
        }
    }

    /// Returns the key in the form used for lookups.
    ///
    /// Names are matched case-insensitively.
    pub fn normalized(&self) -> Self {
        match self {
            LayoutKey::Hardware {
                hardware_id,
                client_id,
                version,
            } => LayoutKey::Hardware {
                hardware_id: hardware_id.to_lowercase(),
                client_id: *client_id,
                version: *version,
            },
            LayoutKey::Named {
                cpu_name,
                cache_type,
            } => LayoutKey::Named {
                cpu_name: cpu_name.to_lowercase(),
                cache_type: cache_type.to_lowercase(),
            },
        }
    }
}

impl fmt::Display for LayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LayoutKey::Hardware {
                hardware_id,
                client_id,
                version,
            } => write!(
                f,
                "{} client {:#x} version {}",
                hardware_id, client_id, version
            ),
            LayoutKey::Named {
                cpu_name,
                cache_type,
            } => write!(f, "{} {}", cpu_name, cache_type),
        }
    }
}

/// Describes the shape of a dumped cache or tlb array.
///
/// Records are stored way-major: all sets of way 0 come first, then all sets of way 1,
/// and so on. `fragment_offset` skips a leading part of the region, which is used for
/// sub-caches embedded into a larger dump.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LayoutDescriptor {
    pub name: String,
    pub record_size: u32,
    pub ways: u32,
    pub sets: u32,
    pub fragment_offset: u64,
    pub fields: Vec<FieldDescriptor>,
    pub chain_next: Option<LayoutKey>,
}

impl LayoutDescriptor {
    pub fn builder<S: Into<String>>(name: S) -> LayoutBuilder {
        LayoutBuilder::new(name)
    }

    /// Number of bytes covered by all records of the layout.
    ///
    /// `None` if the size does not fit into 64 bits.
    pub fn region_size(&self) -> Option<u64> {
        (self.ways as u64)
            .checked_mul(self.sets as u64)?
            .checked_mul(self.record_size as u64)
    }

    /// Number of bytes the layout occupies in a dump, including the fragment offset.
    pub fn span(&self) -> Option<u64> {
        self.fragment_offset.checked_add(self.region_size()?)
    }

    pub fn cell_count(&self) -> Option<usize> {
        (self.ways as usize).checked_mul(self.sets as usize)
    }

    /// Offset of the record at `(way, set)` relative to the start of the region.
    pub fn cell_offset(&self, way: u32, set: u32) -> u64 {
        self.fragment_offset
            + way as u64 * self.sets as u64 * self.record_size as u64
            + set as u64 * self.record_size as u64
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns a copy of the layout with overridden geometry.
    pub fn with_geometry(&self, sets: Option<u32>, ways: Option<u32>) -> Result<Self> {
        let mut layout = self.clone();
        if let Some(sets) = sets {
            layout.sets = sets;
        }
        if let Some(ways) = ways {
            layout.ways = ways;
        }
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_size == 0 || self.record_size % 4 != 0 {
            return Err(Error::layout(format!(
                "{}: record size {} is not a multiple of 4",
                self.name, self.record_size
            )));
        }
        if self.ways == 0 || self.sets == 0 {
            return Err(Error::layout(format!(
                "{}: {} ways and {} sets do not describe an array",
                self.name, self.ways, self.sets
            )));
        }
        if self.span().is_none() || self.cell_count().is_none() {
            return Err(Error::layout(format!(
                "{}: {} ways and {} sets of {} bytes at offset {:#x} overflow the address space",
                self.name, self.ways, self.sets, self.record_size, self.fragment_offset
            )));
        }
        if self.fields.is_empty() {
            return Err(Error::layout(format!("{}: no fields", self.name)));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::layout(format!(
                    "{}: field `{}` is defined twice",
                    self.name, field.name
                )));
            }
            field
                .validate_for_record(self.record_size)
                .map_err(|err| match err {
                    Error::Layout(reason) => Error::Layout(format!("{}: {}", self.name, reason)),
                    err => err,
                })?;
        }

        Ok(())
    }
}

/// Builder for [`LayoutDescriptor`], validating the result.
///
/// # Examples
///
/// ```
/// use cachedump_core::prelude::v1::*;
///
/// let layout = LayoutDescriptor::builder("L1_DCache_TAG")
///     .record_size(4)
///     .ways(2)
///     .sets(2)
///     .field(FieldDescriptor::new("TAG", BitSpec::range(0, 32)).hex())
///     .build()
///     .unwrap();
///
/// assert_eq!(layout.region_size(), Some(16));
/// ```
pub struct LayoutBuilder {
    layout: LayoutDescriptor,
}

impl LayoutBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            layout: LayoutDescriptor {
                name: name.into(),
                record_size: 0,
                ways: 1,
                sets: 1,
                fragment_offset: 0,
                fields: Vec::new(),
                chain_next: None,
            },
        }
    }

    pub fn record_size(mut self, record_size: u32) -> Self {
        self.layout.record_size = record_size;
        self
    }

    pub fn ways(mut self, ways: u32) -> Self {
        self.layout.ways = ways;
        self
    }

    pub fn sets(mut self, sets: u32) -> Self {
        self.layout.sets = sets;
        self
    }

    pub fn fragment_offset(mut self, fragment_offset: u64) -> Self {
        self.layout.fragment_offset = fragment_offset;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.layout.fields.push(field);
        self
    }

    pub fn fields<I: IntoIterator<Item = FieldDescriptor>>(mut self, fields: I) -> Self {
        self.layout.fields.extend(fields);
        self
    }

    pub fn next(mut self, key: LayoutKey) -> Self {
        self.layout.chain_next = Some(key);
        self
    }

    pub fn build(self) -> Result<LayoutDescriptor> {
        self.layout.validate()?;
        Ok(self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitspec::BitSpec;

    fn tag(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, BitSpec::range(0, 32)).hex()
    }

    #[test]
    fn test_cell_offset() {
        let layout = LayoutDescriptor::builder("t")
            .record_size(8)
            .ways(4)
            .sets(16)
            .fragment_offset(0x100)
            .field(tag("TAG"))
            .build()
            .unwrap();

        assert_eq!(layout.region_size(), Some(4 * 16 * 8));
        assert_eq!(layout.span(), Some(0x100 + 4 * 16 * 8));
        assert_eq!(layout.cell_offset(0, 0), 0x100);
        assert_eq!(layout.cell_offset(0, 1), 0x108);
        assert_eq!(layout.cell_offset(1, 0), 0x100 + 16 * 8);
        assert_eq!(layout.cell_offset(3, 15), 0x100 + 63 * 8);
    }

    #[test]
    fn test_validate() {
        let base = || LayoutDescriptor::builder("t").ways(2).sets(2).field(tag("TAG"));

        assert!(base().record_size(4).build().is_ok());
        assert!(base().record_size(0).build().is_err());
        assert!(base().record_size(6).build().is_err());
        assert!(base().record_size(4).ways(0).build().is_err());
        assert!(base().record_size(4).field(tag("TAG")).build().is_err());
        assert!(LayoutDescriptor::builder("t").record_size(4).build().is_err());

        let err = base()
            .record_size(4)
            .field(FieldDescriptor::new("HI", BitSpec::range(32, 4)))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("field `HI`"));
    }

    #[test]
    fn test_with_geometry() {
        let layout = LayoutDescriptor::builder("t")
            .record_size(4)
            .ways(2)
            .sets(2)
            .field(tag("TAG"))
            .build()
            .unwrap();

        let resized = layout.with_geometry(Some(256), None).unwrap();
        assert_eq!(resized.sets, 256);
        assert_eq!(resized.ways, 2);
        assert!(layout.with_geometry(None, Some(0)).is_err());
    }

    #[test]
    fn test_geometry_overflow() {
        let layout = LayoutDescriptor::builder("t")
            .record_size(4)
            .ways(2)
            .sets(2)
            .field(tag("TAG"))
            .build()
            .unwrap();

        let err = layout
            .with_geometry(Some(u32::max_value()), Some(u32::max_value()))
            .unwrap_err();
        assert_eq!(err.to_str(), "invalid layout");

        let mut far = layout.clone();
        far.fragment_offset = u64::max_value();
        assert_eq!(far.span(), None);
        assert!(far.validate().is_err());

        assert!(LayoutDescriptor::builder("t")
            .record_size(4)
            .fragment_offset(u64::max_value() - 16)
            .ways(2)
            .sets(2)
            .field(tag("TAG"))
            .build()
            .is_ok());
    }

    #[test]
    fn test_key_normalized() {
        assert_eq!(
            LayoutKey::named("Kryo3xx-Gold", "L1_DCache_TAG").normalized(),
            LayoutKey::named("kryo3xx-gold", "l1_dcache_tag")
        );
        assert_eq!(
            LayoutKey::hardware("SDM845", 0x80, 1).to_string(),
            "SDM845 client 0x80 version 1"
        );
    }
}

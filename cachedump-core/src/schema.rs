/*!
External layout schemas.

A schema describes all cache types of a single cpu. The cpu name is taken from the
file stem, the document itself maps every cache type name to its geometry and fields:

```json
{
  "L1_DCache_TAG": {
    "blockSize": 8, "numSets": 256, "associativity": 4,
    "fields": [
      { "name": "PA", "bitfield": "2:29", "hex": true, "post_process": ["<<12"] },
      { "name": "MESI", "bitfield": "30:31", "valueMap": { "0": "I", "3": "M" } }
    ],
    "next": "L1_DCache_DATA"
  }
}
```

Every entry is converted on its own, a broken entry only fails its own cache type.
*/

use crate::bitspec::{self, BitSpec};
use crate::error::{Error, Result};
use crate::field::{DisplayBase, FieldDescriptor, ValueMap};
use crate::layout::{LayoutDescriptor, LayoutKey};
use crate::postprocess::PostProcessOp;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub bitfield: String,
    #[serde(default)]
    pub hex: bool,
    #[serde(default)]
    pub post_process: Vec<String>,
    #[serde(default, rename = "valueMap")]
    pub value_map: Option<BTreeMap<String, String>>,
}

impl SchemaField {
    pub fn to_field(&self) -> Result<FieldDescriptor> {
        let mut field = FieldDescriptor::new(self.name.as_str(), BitSpec::parse(&self.bitfield)?);
        if self.hex {
            field = field.base(DisplayBase::Hex);
        }

        for step in self.post_process.iter() {
            field = field.post(step.parse::<PostProcessOp>()?);
        }

        if let Some(labels) = &self.value_map {
            let map = labels
                .iter()
                .map(|(key, label)| {
                    bitspec::parse_number(key)
                        .map(|value| (value, label.clone()))
                        .ok_or_else(|| {
                            Error::layout(format!(
                                "field `{}`: invalid valueMap key `{}`",
                                self.name, key
                            ))
                        })
                })
                .collect::<Result<ValueMap>>()?;
            field.value_map = Some(map);
        }

        Ok(field)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEntry {
    pub block_size: u32,
    pub num_sets: u32,
    pub associativity: u32,
    #[serde(default)]
    pub sub_cache: bool,
    #[serde(default)]
    pub offset: Option<u64>,
    pub fields: Vec<SchemaField>,
    #[serde(default)]
    pub next: Option<String>,
}

impl SchemaEntry {
    /// Converts the entry into a validated layout of `cpu_name`.
    pub fn to_layout(&self, cpu_name: &str, cache_type: &str) -> Result<LayoutDescriptor> {
        let fragment_offset = match (self.sub_cache, self.offset) {
            (_, Some(offset)) => offset,
            (true, None) => return Err(Error::layout("subCache requires an offset")),
            (false, None) => 0,
        };

        let fields = self
            .fields
            .iter()
            .map(SchemaField::to_field)
            .collect::<Result<Vec<_>>>()?;

        let builder = LayoutDescriptor::builder(cache_type)
            .record_size(self.block_size)
            .ways(self.associativity)
            .sets(self.num_sets)
            .fragment_offset(fragment_offset)
            .fields(fields);

        let builder = match &self.next {
            Some(next) => builder.next(LayoutKey::named(cpu_name, next.as_str())),
            None => builder,
        };
        builder.build()
    }
}

/// A parsed schema document of a single cpu.
#[derive(Clone, Debug)]
pub struct SchemaFile {
    cpu_name: String,
    entries: Map<String, Value>,
}

impl SchemaFile {
    pub fn parse_json(cpu_name: &str, text: &str) -> Result<Self> {
        let entries = serde_json::from_str::<Map<String, Value>>(text)
            .map_err(|err| Error::schema(cpu_name, "", err.to_string()))?;
        Ok(Self::with_entries(cpu_name, entries))
    }

    #[cfg(feature = "toml_schema")]
    pub fn parse_toml(cpu_name: &str, text: &str) -> Result<Self> {
        let table = toml::from_str::<toml::value::Table>(text)
            .map_err(|err| Error::schema(cpu_name, "", err.to_string()))?;

        let mut entries = Map::new();
        for (cache_type, value) in table.into_iter() {
            let value = serde_json::to_value(value)
                .map_err(|err| Error::schema(cpu_name, cache_type.as_str(), err.to_string()))?;
            entries.insert(cache_type, value);
        }
        Ok(Self::with_entries(cpu_name, entries))
    }

    /// Reads a schema file, the file stem names the cpu.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let cpu_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or(Error::IO("invalid schema file name"))?;
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        debug!("reading layout schema {:?}", path);
        let text = fs::read_to_string(path).map_err(|_| Error::IO("unable to read schema file"))?;

        match extension.as_str() {
            "json" => Self::parse_json(cpu_name, &text),
            #[cfg(feature = "toml_schema")]
            "toml" => Self::parse_toml(cpu_name, &text),
            _ => Err(Error::schema(
                cpu_name,
                "",
                format!("unsupported schema format `{}`", extension),
            )),
        }
    }

    fn with_entries(cpu_name: &str, entries: Map<String, Value>) -> Self {
        Self {
            cpu_name: cpu_name.to_string(),
            entries,
        }
    }

    pub fn cpu_name(&self) -> &str {
        &self.cpu_name
    }

    pub fn cache_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Converts a single cache type into a layout.
    pub fn layout(&self, cache_type: &str) -> Result<LayoutDescriptor> {
        let value = self.entries.get(cache_type).ok_or_else(|| {
            Error::UnknownLayout(LayoutKey::named(self.cpu_name.as_str(), cache_type).to_string())
        })?;
        self.convert(cache_type, value)
    }

    /// Converts every cache type, each one with its own result.
    pub fn layouts(&self) -> impl Iterator<Item = (String, Result<LayoutDescriptor>)> + '_ {
        self.entries
            .iter()
            .map(move |(cache_type, value)| (cache_type.clone(), self.convert(cache_type, value)))
    }

    fn convert(&self, cache_type: &str, value: &Value) -> Result<LayoutDescriptor> {
        let schema_err = |reason: String| Error::schema(self.cpu_name.as_str(), cache_type, reason);

        let entry = SchemaEntry::deserialize(value).map_err(|err| schema_err(err.to_string()))?;
        entry
            .to_layout(&self.cpu_name, cache_type)
            .map_err(|err| match err {
                Error::Layout(reason) => schema_err(reason),
                err => err,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::CellIndex;

    const SCHEMA: &str = r#"{
        "L1_DCache_TAG": {
            "blockSize": 8, "numSets": 4, "associativity": 2,
            "fields": [
                { "name": "PA", "bitfield": "0:27", "hex": true,
                  "post_process": ["<<12", "|set[0:1]<<6"] },
                { "name": "MESI", "bitfield": "62:63",
                  "valueMap": { "0": "I", "0x3": "M" } }
            ],
            "next": "L1_DCache_DATA"
        },
        "L1_DCache_DATA": {
            "blockSize": 4, "numSets": 4, "associativity": 2,
            "subCache": true, "offset": 16,
            "fields": [ { "name": "DATA", "bitfield": "0:31", "hex": true } ]
        },
        "BAD_BITS": {
            "blockSize": 4, "numSets": 1, "associativity": 1,
            "fields": [ { "name": "X", "bitfield": "0:zz" } ]
        },
        "BAD_SUBCACHE": {
            "blockSize": 4, "numSets": 1, "associativity": 1, "subCache": true,
            "fields": [ { "name": "X", "bitfield": "0" } ]
        },
        "MISSING": { "blockSize": 4, "numSets": 1 }
    }"#;

    fn layouts(schema: &SchemaFile) -> BTreeMap<String, Result<LayoutDescriptor>> {
        schema.layouts().collect()
    }

    #[test]
    fn test_parse_entries() {
        let schema = SchemaFile::parse_json("cortex-a78", SCHEMA).unwrap();
        assert_eq!(schema.cpu_name(), "cortex-a78");
        let layouts = layouts(&schema);
        assert_eq!(layouts.len(), 5);

        let tag = layouts["L1_DCache_TAG"].as_ref().unwrap();
        assert_eq!(tag.record_size, 8);
        assert_eq!(tag.sets, 4);
        assert_eq!(tag.ways, 2);
        assert_eq!(
            tag.chain_next,
            Some(LayoutKey::named("cortex-a78", "L1_DCache_DATA"))
        );

        let pa = tag.field("PA").unwrap();
        assert_eq!(pa.base, DisplayBase::Hex);
        assert_eq!(pa.post_process.len(), 2);
        let record = 1u64.to_le_bytes();
        assert_eq!(pa.process(&record, CellIndex::new(0, 3)).unwrap().1, 0x10c0);

        let mesi = tag.field("MESI").unwrap();
        let record = (3u64 << 62).to_le_bytes();
        assert_eq!(mesi.decode(&record, CellIndex::default()).unwrap().1, "M");

        let data = layouts["L1_DCache_DATA"].as_ref().unwrap();
        assert_eq!(data.fragment_offset, 16);
        assert_eq!(data.chain_next, None);
    }

    #[test]
    fn test_entry_failures_are_isolated() {
        let schema = SchemaFile::parse_json("cortex-a78", SCHEMA).unwrap();
        let layouts = layouts(&schema);

        for name in ["BAD_BITS", "BAD_SUBCACHE", "MISSING"].iter() {
            match layouts[*name].as_ref().unwrap_err() {
                Error::Schema {
                    cpu, cache_type, ..
                } => {
                    assert_eq!(cpu, "cortex-a78");
                    assert_eq!(cache_type, name);
                }
                err => panic!("unexpected error {:?}", err),
            }
        }
    }

    #[test]
    fn test_bad_value_map_key() {
        let schema = SchemaFile::parse_json(
            "c",
            r#"{ "T": { "blockSize": 4, "numSets": 1, "associativity": 1,
                 "fields": [ { "name": "S", "bitfield": "0:1", "valueMap": { "one": "I" } } ] } }"#,
        )
        .unwrap();
        let err = schema.layout("T").unwrap_err();
        assert!(err.to_string().contains("valueMap"));
        assert_eq!(err.to_str(), "schema error");
    }

    #[test]
    fn test_offset_overflow() {
        let schema = SchemaFile::parse_json(
            "c",
            r#"{ "FAR": { "blockSize": 4, "numSets": 1, "associativity": 1,
                   "subCache": true, "offset": 18446744073709551615,
                   "fields": [ { "name": "X", "bitfield": "0:31" } ] } }"#,
        )
        .unwrap();
        let err = schema.layout("FAR").unwrap_err();
        assert_eq!(err.to_str(), "schema error");
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_document_failure() {
        let err = SchemaFile::parse_json("broken", "{ \"T\": ").unwrap_err();
        match err {
            Error::Schema {
                cpu, cache_type, ..
            } => {
                assert_eq!(cpu, "broken");
                assert!(cache_type.is_empty());
            }
            err => panic!("unexpected error {:?}", err),
        }
    }

    #[cfg(feature = "toml_schema")]
    #[test]
    fn test_parse_toml() {
        let schema = SchemaFile::parse_toml(
            "kryo",
            r#"
            [L2_TLB]
            blockSize = 8
            numSets = 2
            associativity = 1

            [[L2_TLB.fields]]
            name = "VA"
            bitfield = "0:35"
            hex = true
            post_process = ["sext(64, 35, 36)"]
            "#,
        )
        .unwrap();

        let tlb = schema.layout("L2_TLB").unwrap();
        let va = tlb.field("VA").unwrap();
        assert_eq!(va.effective_width(), 64);
        let record = (1u64 << 35).to_le_bytes();
        assert_eq!(
            va.process(&record, CellIndex::default()).unwrap().1,
            0xffff_fff8_0000_0000
        );
    }
}

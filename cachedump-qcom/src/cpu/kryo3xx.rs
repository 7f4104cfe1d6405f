/*!
Kryo3xx cores.

The silver cluster is built from Cortex-A55 class cores, the gold cluster from
Cortex-A75 class cores.
*/

use super::{data_layout, line_address, tlb_layout, walk_layout, ISA_STATES, MESI_STATES};

use cachedump_core::prelude::v1::*;

pub const SILVER: &str = "kryo3xx-silver";
pub const GOLD: &str = "kryo3xx-gold";

fn mesi(bit_offset: u32) -> FieldDescriptor {
    FieldDescriptor::new("MESI", BitSpec::range(bit_offset, 2))
        .value_map(MESI_STATES.iter().cloned())
}

fn isa(bit_offset: u32) -> FieldDescriptor {
    FieldDescriptor::new("ISA", BitSpec::range(bit_offset, 2))
        .value_map(ISA_STATES.iter().cloned())
}

pub fn silver_layouts() -> Result<Vec<LayoutDescriptor>> {
    Ok(vec![
        // 32 KiB, 4 ways
        LayoutDescriptor::builder("L1_DCache_TAG")
            .record_size(8)
            .ways(4)
            .sets(128)
            .field(mesi(0))
            .field(line_address(2))
            .field(FieldDescriptor::new("NS", BitSpec::range(30, 1)))
            .field(FieldDescriptor::new("OA", BitSpec::range(32, 2)))
            .build()?,
        data_layout("L1_DCache_DATA", 4, 128, 64)?,
        // 32 KiB, 4 ways
        LayoutDescriptor::builder("L1_ICache_TAG")
            .record_size(8)
            .ways(4)
            .sets(128)
            .field(FieldDescriptor::new("VALID", BitSpec::range(0, 1)))
            .field(isa(1))
            .field(FieldDescriptor::new("NS", BitSpec::range(3, 1)))
            .field(line_address(4))
            .build()?,
        data_layout("L1_ICache_DATA", 4, 128, 64)?,
        tlb_layout(4, 256, SILVER)?,
        walk_layout(4, 16)?,
    ])
}

pub fn gold_layouts() -> Result<Vec<LayoutDescriptor>> {
    Ok(vec![
        // 64 KiB, 16 ways
        LayoutDescriptor::builder("L1_DCache_TAG")
            .record_size(8)
            .ways(16)
            .sets(64)
            .field(mesi(0))
            .field(line_address(2))
            .field(FieldDescriptor::new("NS", BitSpec::range(30, 1)))
            // check bits straddle both tag words
            .field(FieldDescriptor::new("ECC", BitSpec::range(31, 7)).hex())
            .build()?,
        data_layout("L1_DCache_DATA", 16, 64, 64)?,
        // 64 KiB, 4 ways
        LayoutDescriptor::builder("L1_ICache_TAG")
            .record_size(8)
            .ways(4)
            .sets(256)
            .field(FieldDescriptor::new("VALID", BitSpec::range(0, 1)))
            .field(isa(1))
            .field(FieldDescriptor::new("NS", BitSpec::range(3, 1)))
            .field(line_address(4))
            .build()?,
        data_layout("L1_ICache_DATA", 4, 256, 64)?,
        tlb_layout(5, 256, GOLD)?,
        walk_layout(4, 32)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gold_tag() {
        let layouts = gold_layouts().unwrap();
        let tag = layouts.iter().find(|l| l.name == "L1_DCache_TAG").unwrap();
        let decoder = RecordDecoder::new(tag);

        // UD line at pa 0x8765_4000 | set 5 << 6, ecc 0x5b
        let record: u64 = 3 | (0x87654 << 2) | (1 << 31) | (0x2d << 32);
        let cell = decoder.decode_cell(&record.to_le_bytes(), 9, 5).unwrap();

        assert_eq!(cell.get("MESI").unwrap().rendered, "UD");
        assert_eq!(cell.get("PA").unwrap().value, 0x8765_4140);
        assert_eq!(cell.get("PA").unwrap().rendered, "0087654140");
        assert_eq!(cell.get("NS").unwrap().value, 0);
        assert_eq!(cell.get("ECC").unwrap().value, 0x5b);
    }
}

//! Cortex-A53 cores, as found on msm8953.

use super::{data_layout, line_address, tlb_layout, walk_layout, ISA_STATES, MESI_STATES};

use cachedump_core::prelude::v1::*;

pub const CPU_NAME: &str = "cortex-a53";

pub fn layouts() -> Result<Vec<LayoutDescriptor>> {
    Ok(vec![
        // 32 KiB, 4 ways
        LayoutDescriptor::builder("L1_DCache_TAG")
            .record_size(8)
            .ways(4)
            .sets(128)
            .field(line_address(0))
            .field(FieldDescriptor::new("NS", BitSpec::range(28, 1)))
            .field(
                FieldDescriptor::new("MESI", BitSpec::range(30, 2))
                    .value_map(MESI_STATES.iter().cloned()),
            )
            .field(FieldDescriptor::new("AGE", BitSpec::range(32, 3)))
            .build()?,
        data_layout("L1_DCache_DATA", 4, 128, 64)?,
        // 32 KiB, 2 ways
        LayoutDescriptor::builder("L1_ICache_TAG")
            .record_size(8)
            .ways(2)
            .sets(256)
            .field(line_address(0))
            .field(FieldDescriptor::new("NS", BitSpec::range(28, 1)))
            .field(FieldDescriptor::new("VALID", BitSpec::range(29, 1)))
            .field(
                FieldDescriptor::new("ISA", BitSpec::range(30, 2))
                    .value_map(ISA_STATES.iter().cloned()),
            )
            .build()?,
        data_layout("L1_ICache_DATA", 2, 256, 64)?,
        tlb_layout(4, 128, CPU_NAME)?,
        walk_layout(4, 16)?,
    ])
}

/*!
Hard-coded layouts of the cpu cores found on supported targets.

Layouts are named after the cache type they describe and registered under
`(cpu name, layout name)`.
*/

pub mod cortex_a53;
pub mod kryo3xx;

use cachedump_core::prelude::v1::*;

use log::debug;

pub const MESI_STATES: &[(u64, &str)] = &[(0, "I"), (1, "SC"), (2, "UC"), (3, "UD")];

pub const ISA_STATES: &[(u64, &str)] = &[(0, "A32"), (1, "T32"), (2, "A64"), (3, "-")];

pub const PAGE_SIZES: &[(u64, &str)] = &[
    (0, "4K"),
    (1, "16K"),
    (2, "64K"),
    (3, "1M"),
    (4, "2M"),
    (5, "32M"),
    (6, "512M"),
    (7, "1G"),
];

/// A cpu core and the function building its layouts.
pub struct CpuLayouts {
    pub cpu_name: &'static str,
    pub layouts: fn() -> Result<Vec<LayoutDescriptor>>,
}

pub const CPUS: &[CpuLayouts] = &[
    CpuLayouts {
        cpu_name: cortex_a53::CPU_NAME,
        layouts: cortex_a53::layouts,
    },
    CpuLayouts {
        cpu_name: kryo3xx::SILVER,
        layouts: kryo3xx::silver_layouts,
    },
    CpuLayouts {
        cpu_name: kryo3xx::GOLD,
        layouts: kryo3xx::gold_layouts,
    },
];

/// Registers the layouts of every known cpu.
pub fn register_all(registry: &mut LayoutRegistry) -> Vec<Error> {
    let mut failures = Vec::new();

    for cpu in CPUS.iter() {
        let layouts = match (cpu.layouts)() {
            Ok(layouts) => layouts,
            Err(err) => {
                failures.push(err.log_error(cpu.cpu_name));
                continue;
            }
        };

        debug!("registering {} layouts of {}", layouts.len(), cpu.cpu_name);
        for layout in layouts.into_iter() {
            let key = LayoutKey::named(cpu.cpu_name, layout.name.as_str());
            if let Err(err) = registry.register(key.clone(), layout) {
                failures.push(err.log_error(&key));
            }
        }
    }

    failures
}

/// The data words of a line, one hex column per 32 bit word.
pub(crate) fn data_words(record_size: u32) -> Vec<FieldDescriptor> {
    (0..record_size / 4)
        .map(|i| FieldDescriptor::new(format!("D{}", i), BitSpec::range(i * 32, 32)).hex())
        .collect()
}

/// Physical address of a cached line.
///
/// The tag holds `PA[39:12]`, the set index supplies `PA[11:6]`.
pub(crate) fn line_address(bit_offset: u32) -> FieldDescriptor {
    FieldDescriptor::new("PA", BitSpec::range(bit_offset, 28))
        .hex()
        .post(PostProcessOp::ShiftLeft(12))
        .post(PostProcessOp::compose(
            IndexSource::Set,
            0..=5,
            ComposeOp::Or,
            6,
        ))
}

pub(crate) fn data_layout(
    name: &str,
    ways: u32,
    sets: u32,
    record_size: u32,
) -> Result<LayoutDescriptor> {
    LayoutDescriptor::builder(name)
        .record_size(record_size)
        .ways(ways)
        .sets(sets)
        .fields(data_words(record_size))
        .build()
}

/// Main tlb entry shared by the cores.
///
/// ```text
/// 0        VALID
/// 1        NS
/// 2..=17   ASID
/// 18..=25  VMID
/// 26..=28  SIZE
/// 29..=64  VA[47:12]
/// 65..=92  PA[39:12]
/// 93..=95  ATTR
/// ```
pub(crate) fn tlb_layout(ways: u32, sets: u32, walk_cpu: &str) -> Result<LayoutDescriptor> {
    LayoutDescriptor::builder("L2_TLB")
        .record_size(16)
        .ways(ways)
        .sets(sets)
        .field(FieldDescriptor::new("VALID", BitSpec::range(0, 1)))
        .field(FieldDescriptor::new("NS", BitSpec::range(1, 1)))
        .field(FieldDescriptor::new("ASID", BitSpec::range(2, 16)).hex())
        .field(FieldDescriptor::new("VMID", BitSpec::range(18, 8)).hex())
        .field(
            FieldDescriptor::new("SIZE", BitSpec::range(26, 3))
                .value_map(PAGE_SIZES.iter().cloned()),
        )
        .field(
            FieldDescriptor::new("VA", BitSpec::range(29, 36))
                .hex()
                .post(PostProcessOp::ShiftLeft(12))
                .post(PostProcessOp::sign_extend_to_u64(48)),
        )
        .field(
            FieldDescriptor::new("PA", BitSpec::range(65, 28))
                .hex()
                .post(PostProcessOp::ShiftLeft(12)),
        )
        .field(FieldDescriptor::new("ATTR", BitSpec::range(93, 3)))
        .next(LayoutKey::named(walk_cpu, "L2_TLB_WALK"))
        .build()
}

/// Walk cache entry holding intermediate table addresses.
pub(crate) fn walk_layout(ways: u32, sets: u32) -> Result<LayoutDescriptor> {
    LayoutDescriptor::builder("L2_TLB_WALK")
        .record_size(8)
        .ways(ways)
        .sets(sets)
        .field(FieldDescriptor::new("VALID", BitSpec::range(0, 1)))
        .field(FieldDescriptor::new("ASID", BitSpec::range(1, 16)).hex())
        .field(
            FieldDescriptor::new("VA", BitSpec::range(17, 27))
                .hex()
                .post(PostProcessOp::ShiftLeft(21))
                .post(PostProcessOp::sign_extend_to_u64(48)),
        )
        .field(
            FieldDescriptor::new("TABLE", BitSpec::range(44, 20))
                .hex()
                .post(PostProcessOp::ShiftLeft(12)),
        )
        .build()
}

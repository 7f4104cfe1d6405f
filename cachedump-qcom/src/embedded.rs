/*!
Layout schemas embedded at build time.

Every `layouts/<cpu>.json` file of this crate ends up in [`EMBEDDED_LAYOUTS`] as
`(cpu name, schema text)`.
*/

use cachedump_core::prelude::v1::*;

use log::debug;

include!(concat!(env!("OUT_DIR"), "/embedded_layouts.rs"));

/// Parses and registers every embedded schema.
pub fn register_all(registry: &mut LayoutRegistry) -> Vec<Error> {
    let mut failures = Vec::new();

    for (cpu_name, text) in EMBEDDED_LAYOUTS.iter() {
        debug!("loading embedded layouts of {}", cpu_name);
        match SchemaFile::parse_json(cpu_name, text) {
            Ok(schema) => failures.extend(registry.load_schema(&schema)),
            Err(err) => failures.push(err.log_error(cpu_name)),
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_schemas() {
        assert!(EMBEDDED_LAYOUTS.iter().any(|(cpu, _)| *cpu == "cortex-a78"));

        let mut registry = LayoutRegistry::new();
        assert!(register_all(&mut registry).is_empty());
        assert!(registry
            .resolve_by_name("cortex-a78", "L1_DCache_TAG")
            .is_some());
    }
}

/*!
This crate contains cachedump's knowledge about qualcomm targets.

It provides the memory dump client ids, hard-coded layouts of the supported cpu cores,
the hardware dispatch table of the supported targets and a set of layout schemas that
are embedded into the binary at build time.

# Examples

```
use cachedump_core::prelude::v1::*;

let (registry, failures) = cachedump_qcom::builtin_registry();
assert!(failures.is_empty());

let buf = vec![0u8; 0x10000];
let mut session = DumpSession::new(&registry);
let output = session
    .run(&buf, &DumpRequest::parse_named("kryo3xx-gold", "L1_DCache_TAG"))
    .unwrap();
assert_eq!(output.tables()[0].rows.len(), 16 * 64);
```
*/

pub mod client;

pub mod cpu;

#[cfg(feature = "embed_layouts")]
pub mod embedded;

pub mod targets;

use cachedump_core::{Error, LayoutRegistry};

use log::{info, warn};

/// Creates a registry holding every layout this crate knows about.
///
/// Layouts failing to load are skipped, their errors are logged and returned.
pub fn builtin_registry() -> (LayoutRegistry, Vec<Error>) {
    let mut registry = LayoutRegistry::new();

    let mut failures = cpu::register_all(&mut registry);
    #[cfg(feature = "embed_layouts")]
    failures.extend(embedded::register_all(&mut registry));
    failures.extend(targets::register_all(&mut registry));

    if failures.is_empty() {
        info!("loaded {} builtin layouts", registry.len());
    } else {
        warn!(
            "loaded {} builtin layouts, {} failed",
            registry.len(),
            failures.len()
        );
    }

    (registry, failures)
}

pub mod prelude {
    pub mod v1 {
        pub use crate::builtin_registry;
        pub use crate::client::*;
        pub use crate::cpu::CpuLayouts;
        pub use crate::targets::*;
    }
    pub use v1::*;
}

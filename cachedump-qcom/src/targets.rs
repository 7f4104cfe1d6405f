/*!
Hardware dispatch table.

Maps the `(hardware id, client id, format version)` triple of a memory dump table entry
onto the layouts of the cpu that produced it.
*/

use crate::client::{self, L1_DCACHE, L1_ICACHE, L2_TLB};
use crate::cpu::{cortex_a53, kryo3xx};

use cachedump_core::prelude::v1::*;

use log::debug;

/// Cpus `first_cpu..first_cpu + count` share the same core type.
#[derive(Clone, Copy, Debug)]
pub struct Cluster {
    pub first_cpu: u32,
    pub count: u32,
    pub cpu_name: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub hardware_id: &'static str,
    pub version: u8,
    pub clusters: &'static [Cluster],
}

impl Target {
    /// Returns the core type of `cpu`.
    pub fn cpu_name(&self, cpu: u32) -> Option<&'static str> {
        self.clusters
            .iter()
            .find(|c| cpu >= c.first_cpu && cpu < c.first_cpu + c.count)
            .map(|c| c.cpu_name)
    }
}

pub const TARGETS: &[Target] = &[
    Target {
        hardware_id: "msm8953",
        version: 1,
        clusters: &[Cluster {
            first_cpu: 0,
            count: 8,
            cpu_name: cortex_a53::CPU_NAME,
        }],
    },
    Target {
        hardware_id: "sdm845",
        version: 1,
        clusters: &[
            Cluster {
                first_cpu: 0,
                count: 4,
                cpu_name: kryo3xx::SILVER,
            },
            Cluster {
                first_cpu: 4,
                count: 4,
                cpu_name: kryo3xx::GOLD,
            },
        ],
    },
    Target {
        hardware_id: "sdm670",
        version: 1,
        clusters: &[
            Cluster {
                first_cpu: 0,
                count: 6,
                cpu_name: kryo3xx::SILVER,
            },
            Cluster {
                first_cpu: 6,
                count: 2,
                cpu_name: kryo3xx::GOLD,
            },
        ],
    },
];

/// Client base, first layout of the dump and the layout following it.
///
/// Cache clients dump their tag ram directly followed by their data ram.
pub const CLIENT_LAYOUTS: &[(u32, &str, Option<&str>)] = &[
    (L1_DCACHE, "L1_DCache_TAG", Some("L1_DCache_DATA")),
    (L1_ICACHE, "L1_ICache_TAG", Some("L1_ICache_DATA")),
    (L2_TLB, "L2_TLB", None),
];

pub fn find_target(hardware_id: &str) -> Option<&'static Target> {
    TARGETS
        .iter()
        .find(|t| t.hardware_id.eq_ignore_ascii_case(hardware_id))
}

/// Registers every client of every target, the cpu layouts have to be registered already.
pub fn register_all(registry: &mut LayoutRegistry) -> Vec<Error> {
    let mut failures = Vec::new();

    for target in TARGETS.iter() {
        debug!("registering clients of {}", target.hardware_id);
        for cluster in target.clusters.iter() {
            for cpu in cluster.first_cpu..cluster.first_cpu + cluster.count {
                for (base, first, next) in CLIENT_LAYOUTS.iter() {
                    let key = LayoutKey::hardware(
                        target.hardware_id,
                        client::client_id(*base, cpu),
                        target.version,
                    );
                    if let Err(err) = register_client(registry, &key, cluster.cpu_name, first, *next)
                    {
                        failures.push(err.log_warn(&key));
                    }
                }
            }
        }
    }

    failures
}

fn register_client(
    registry: &mut LayoutRegistry,
    key: &LayoutKey,
    cpu_name: &str,
    first: &str,
    next: Option<&str>,
) -> Result<()> {
    let mut layout = (*registry.lookup(&LayoutKey::named(cpu_name, first))?).clone();
    if let Some(next) = next {
        let next = LayoutKey::named(cpu_name, next);
        registry.lookup(&next)?;
        layout.chain_next = Some(next);
    }
    registry.register(key.clone(), layout).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu;

    #[test]
    fn test_cluster_lookup() {
        let sdm845 = find_target("SDM845").unwrap();
        assert_eq!(sdm845.cpu_name(0), Some(kryo3xx::SILVER));
        assert_eq!(sdm845.cpu_name(7), Some(kryo3xx::GOLD));
        assert_eq!(sdm845.cpu_name(8), None);
        assert!(find_target("sm8150").is_none());
    }

    #[test]
    fn test_register_clients() {
        let mut registry = LayoutRegistry::new();
        assert!(cpu::register_all(&mut registry).is_empty());
        assert!(register_all(&mut registry).is_empty());

        let chain = registry
            .resolve_chain(&LayoutKey::hardware("sdm845", L1_DCACHE + 5, 1))
            .unwrap();
        let names: Vec<_> = chain.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["L1_DCache_TAG", "L1_DCache_DATA"]);
        assert_eq!(chain[0].ways, 16);

        let chain = registry
            .resolve_chain(&LayoutKey::hardware("msm8953", L2_TLB + 7, 1))
            .unwrap();
        assert_eq!(chain.len(), 2);

        // named tag layouts stay unchained
        assert!(registry
            .resolve_by_name(kryo3xx::GOLD, "L1_DCache_TAG")
            .unwrap()
            .chain_next
            .is_none());

        assert!(registry.resolve("sdm845", L1_DCACHE + 8, 1).is_none());
        assert!(registry.resolve("sdm845", L1_DCACHE, 2).is_none());
    }

    #[test]
    fn test_missing_cpu_layouts() {
        let mut registry = LayoutRegistry::new();
        let failures = register_all(&mut registry);
        assert!(!failures.is_empty());
        assert!(registry.is_empty());
    }
}

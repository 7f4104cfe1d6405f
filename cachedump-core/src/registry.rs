/*!
Layout registry.

The registry owns every known layout and resolves them by [`LayoutKey`]. Layouts are
validated when they are registered and are immutable afterwards, they are handed out
as `Arc`s so concurrent decoders can share them.
*/

use crate::error::{Error, Result};
use crate::layout::{LayoutDescriptor, LayoutKey};
use crate::schema::SchemaFile;

use std::sync::Arc;

use hashbrown::HashMap;
use log::{debug, warn};

/// Suffix of composite cache type names requesting a merged tag and data dump.
pub const TAG_DATA_SUFFIX: &str = "_TAG_DATA";

/// Splits `L1_DCache_TAG_DATA` into `L1_DCache`.
pub fn split_tag_data(cache_type: &str) -> Option<&str> {
    let split = cache_type.len().checked_sub(TAG_DATA_SUFFIX.len())?;
    if cache_type.is_char_boundary(split)
        && cache_type[split..].eq_ignore_ascii_case(TAG_DATA_SUFFIX)
    {
        Some(&cache_type[..split])
    } else {
        None
    }
}

/// A resolved chain of layouts, dumped back-to-back.
pub type LayoutChain = Vec<Arc<LayoutDescriptor>>;

#[derive(Clone)]
struct Entry {
    key: LayoutKey,
    layout: Arc<LayoutDescriptor>,
}

#[derive(Clone, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<LayoutKey, Entry>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Validates and registers a layout, replacing a previous layout with the same key.
    pub fn register(&mut self, key: LayoutKey, layout: LayoutDescriptor) -> Result<&mut Self> {
        self.register_arc(key, Arc::new(layout))
    }

    pub fn register_arc(
        &mut self,
        key: LayoutKey,
        layout: Arc<LayoutDescriptor>,
    ) -> Result<&mut Self> {
        layout.validate()?;
        debug!("registering layout {} as `{}`", key, layout.name);
        if self
            .layouts
            .insert(key.normalized(), Entry { key: key.clone(), layout })
            .is_some()
        {
            warn!("layout {} was registered twice, keeping the latest", key);
        }
        Ok(self)
    }

    pub fn unregister(&mut self, key: &LayoutKey) -> Option<Arc<LayoutDescriptor>> {
        self.layouts.remove(&key.normalized()).map(|e| e.layout)
    }

    pub fn resolve(
        &self,
        hardware_id: &str,
        client_id: u32,
        version: u8,
    ) -> Option<Arc<LayoutDescriptor>> {
        self.resolve_key(&LayoutKey::hardware(hardware_id, client_id, version))
    }

    pub fn resolve_by_name(&self, cpu_name: &str, cache_type: &str) -> Option<Arc<LayoutDescriptor>> {
        self.resolve_key(&LayoutKey::named(cpu_name, cache_type))
    }

    pub fn resolve_key(&self, key: &LayoutKey) -> Option<Arc<LayoutDescriptor>> {
        self.layouts
            .get(&key.normalized())
            .map(|e| e.layout.clone())
    }

    /// Resolves a key or fails with `Error::UnknownLayout` naming it.
    pub fn lookup(&self, key: &LayoutKey) -> Result<Arc<LayoutDescriptor>> {
        self.resolve_key(key)
            .ok_or_else(|| Error::UnknownLayout(key.to_string()))
    }

    /// Resolves a layout and every layout chained behind it.
    pub fn resolve_chain(&self, key: &LayoutKey) -> Result<LayoutChain> {
        let mut visited = vec![key.normalized()];
        let mut chain = vec![self.lookup(key)?];

        while let Some(next) = chain.last().and_then(|l| l.chain_next.clone()) {
            let normalized = next.normalized();
            if visited.contains(&normalized) {
                return Err(Error::layout(format!(
                    "layout chain starting at {} loops back to {}",
                    key, next
                )));
            }
            visited.push(normalized);
            chain.push(self.lookup(&next)?);
        }

        Ok(chain)
    }

    /// Resolves a composite `<base>_TAG_DATA` request into the tag and data chains.
    pub fn resolve_tag_data(
        &self,
        cpu_name: &str,
        cache_type: &str,
    ) -> Result<(LayoutChain, LayoutChain)> {
        let base = split_tag_data(cache_type)
            .ok_or_else(|| Error::UnknownLayout(LayoutKey::named(cpu_name, cache_type).to_string()))?;

        let tag = self.resolve_chain(&LayoutKey::named(cpu_name, format!("{}_TAG", base)))?;
        let data = self.resolve_chain(&LayoutKey::named(cpu_name, format!("{}_DATA", base)))?;
        Ok((tag, data))
    }

    /// Registers every cache type of a schema.
    ///
    /// Failing cache types are skipped and returned, the remaining ones are registered.
    pub fn load_schema(&mut self, schema: &SchemaFile) -> Vec<Error> {
        let mut failures = Vec::new();
        let mut loaded = Vec::new();

        for (cache_type, layout) in schema.layouts() {
            let key = LayoutKey::named(schema.cpu_name(), cache_type.as_str());
            match layout.and_then(|layout| self.register(key.clone(), layout).map(|_| ())) {
                Ok(()) => loaded.push(key),
                Err(err) => failures.push(err.log_warn(&key)),
            }
        }

        // drop entries chaining to layouts that are missing, until none is left
        loop {
            let dangling = loaded
                .iter()
                .filter_map(|key| {
                    let next = self.resolve_key(key)?.chain_next.clone()?;
                    if self.resolve_key(&next).is_none() {
                        Some((key.clone(), next))
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>();
            if dangling.is_empty() {
                break;
            }

            for (key, next) in dangling.into_iter() {
                self.unregister(&key);
                loaded.retain(|k| k != &key);
                let cache_type = match &key {
                    LayoutKey::Named { cache_type, .. } => cache_type.clone(),
                    _ => String::new(),
                };
                failures.push(
                    Error::schema(
                        schema.cpu_name(),
                        cache_type,
                        format!("next layout {} is not defined", next),
                    )
                    .log_warn(&key),
                );
            }
        }

        failures
    }

    /// Names of all cpus with named layouts, sorted.
    pub fn cpus(&self) -> Vec<String> {
        let mut cpus: Vec<String> = self
            .layouts
            .values()
            .filter_map(|e| match &e.key {
                LayoutKey::Named { cpu_name, .. } => Some(cpu_name.clone()),
                _ => None,
            })
            .collect();
        cpus.sort_by_key(|c| c.to_lowercase());
        cpus.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        cpus
    }

    /// Cache types registered for a cpu, sorted.
    pub fn cache_types(&self, cpu: &str) -> Vec<String> {
        let mut types: Vec<String> = self
            .layouts
            .values()
            .filter_map(|e| match &e.key {
                LayoutKey::Named {
                    cpu_name,
                    cache_type,
                } if cpu_name.eq_ignore_ascii_case(cpu) => Some(cache_type.clone()),
                _ => None,
            })
            .collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitspec::BitSpec;
    use crate::field::FieldDescriptor;

    fn layout(name: &str, next: Option<LayoutKey>) -> LayoutDescriptor {
        let builder = LayoutDescriptor::builder(name)
            .record_size(4)
            .ways(2)
            .sets(2)
            .field(FieldDescriptor::new("TAG", BitSpec::range(0, 32)).hex());
        let builder = match next {
            Some(next) => builder.next(next),
            None => builder,
        };
        builder.build().unwrap()
    }

    #[test]
    fn test_split_tag_data() {
        assert_eq!(split_tag_data("L1_DCache_TAG_DATA"), Some("L1_DCache"));
        assert_eq!(split_tag_data("l2_tag_data"), Some("l2"));
        assert_eq!(split_tag_data("L1_DCache_TAG"), None);
        assert_eq!(split_tag_data("DATA"), None);
    }

    #[test]
    fn test_resolve() {
        let mut registry = LayoutRegistry::new();
        registry
            .register(LayoutKey::hardware("sdm845", 0x80, 1), layout("a", None))
            .unwrap()
            .register(LayoutKey::named("Kryo3xx-Gold", "L1_DCache_TAG"), layout("b", None))
            .unwrap();

        assert_eq!(registry.resolve("SDM845", 0x80, 1).unwrap().name, "a");
        assert!(registry.resolve("sdm845", 0x80, 2).is_none());
        assert!(registry.resolve("sdm845", 0x81, 1).is_none());
        assert_eq!(
            registry
                .resolve_by_name("kryo3xx-gold", "l1_dcache_tag")
                .unwrap()
                .name,
            "b"
        );

        let err = registry
            .lookup(&LayoutKey::named("kryo3xx-gold", "L2_TLB"))
            .unwrap_err();
        assert_eq!(err, Error::UnknownLayout("kryo3xx-gold L2_TLB".into()));

        assert_eq!(registry.cpus(), vec!["Kryo3xx-Gold".to_string()]);
        assert_eq!(
            registry.cache_types("KRYO3XX-GOLD"),
            vec!["L1_DCache_TAG".to_string()]
        );
    }

    #[test]
    fn test_register_invalid() {
        let mut registry = LayoutRegistry::new();
        let mut bad = layout("bad", None);
        bad.record_size = 3;
        assert!(registry.register(LayoutKey::named("c", "t"), bad).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_chain() {
        let mut registry = LayoutRegistry::new();
        registry
            .register(
                LayoutKey::named("c", "TAG"),
                layout("tag", Some(LayoutKey::named("c", "DATA"))),
            )
            .unwrap()
            .register(LayoutKey::named("c", "DATA"), layout("data", None))
            .unwrap()
            .register(
                LayoutKey::named("c", "BROKEN"),
                layout("broken", Some(LayoutKey::named("c", "MISSING"))),
            )
            .unwrap();

        let chain = registry.resolve_chain(&LayoutKey::named("c", "TAG")).unwrap();
        let names: Vec<_> = chain.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["tag", "data"]);

        assert_eq!(
            registry
                .resolve_chain(&LayoutKey::named("c", "BROKEN"))
                .unwrap_err()
                .to_str(),
            "layout not supported"
        );
    }

    #[test]
    fn test_resolve_chain_cycle() {
        let mut registry = LayoutRegistry::new();
        registry
            .register(
                LayoutKey::named("c", "A"),
                layout("a", Some(LayoutKey::named("c", "B"))),
            )
            .unwrap()
            .register(
                LayoutKey::named("c", "B"),
                layout("b", Some(LayoutKey::named("C", "a"))),
            )
            .unwrap();

        let err = registry
            .resolve_chain(&LayoutKey::named("c", "A"))
            .unwrap_err();
        assert_eq!(err.to_str(), "invalid layout");
    }

    #[test]
    fn test_load_schema_dangling_next() {
        let schema = SchemaFile::parse_json(
            "c",
            r#"{
                "A": { "blockSize": 4, "numSets": 1, "associativity": 1, "next": "B",
                       "fields": [ { "name": "X", "bitfield": "0" } ] },
                "B": { "blockSize": 4, "numSets": 1, "associativity": 1, "next": "C",
                       "fields": [ { "name": "X", "bitfield": "0" } ] },
                "D": { "blockSize": 4, "numSets": 1, "associativity": 1,
                       "fields": [ { "name": "X", "bitfield": "0" } ] }
            }"#,
        )
        .unwrap();

        let mut registry = LayoutRegistry::new();
        let failures = registry.load_schema(&schema);

        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|err| err.to_str() == "schema error"));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve_by_name("c", "D").is_some());
    }

    #[test]
    fn test_resolve_tag_data() {
        let mut registry = LayoutRegistry::new();
        registry
            .register(LayoutKey::named("c", "L2_TAG"), layout("tag", None))
            .unwrap()
            .register(LayoutKey::named("c", "L2_DATA"), layout("data", None))
            .unwrap();

        let (tag, data) = registry.resolve_tag_data("c", "L2_TAG_DATA").unwrap();
        assert_eq!(tag[0].name, "tag");
        assert_eq!(data[0].name, "data");

        assert!(registry.resolve_tag_data("c", "L2_TAG").is_err());
        assert!(registry.resolve_tag_data("c", "L3_TAG_DATA").is_err());
    }
}

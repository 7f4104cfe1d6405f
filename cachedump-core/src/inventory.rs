/*!
Schema inventory interface.
*/

use crate::error::{Error, Result};
use crate::registry::LayoutRegistry;
use crate::schema::SchemaFile;

use std::fs::read_dir;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

/// Environment variable holding the schema search path, split like `PATH`.
pub const LAYOUT_PATH_VAR: &str = "CACHEDUMP_LAYOUT_PATH";

#[cfg(feature = "toml_schema")]
const SCHEMA_EXTENSIONS: &[&str] = &["json", "toml"];
#[cfg(not(feature = "toml_schema"))]
const SCHEMA_EXTENSIONS: &[&str] = &["json"];

/// Holds an inventory of layout schema files found on disk.
///
/// Schemas are named after the cpu they describe, `kryo3xx-gold.json` holds every
/// cache type of the `kryo3xx-gold` cpu.
#[derive(Clone, Debug, Default)]
pub struct SchemaInventory {
    schemas: Vec<PathBuf>,
}

impl SchemaInventory {
    /// Creates a new inventory of schemas from the provided path.
    /// The path has to be a valid directory or the function will fail with an `Error::IO` error.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachedump_core::inventory::SchemaInventory;
    ///
    /// let inventory = SchemaInventory::with_path("./").unwrap();
    /// ```
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut dir = PathBuf::default();
        dir.push(path);

        let mut ret = Self::default();
        ret.add_dir(dir)?;
        Ok(ret)
    }

    /// Creates a new inventory by searching `CACHEDUMP_LAYOUT_PATH`.
    ///
    /// Falls back to `<user data dir>/cachedump` if the variable is not set.
    pub fn try_new() -> Result<Self> {
        match std::env::var_os(LAYOUT_PATH_VAR) {
            Some(paths) => {
                let mut ret = Self::default();
                for path in std::env::split_paths(&paths) {
                    ret.add_dir(path).ok();
                }
                Ok(ret)
            }
            None => Self::with_default_dir(),
        }
    }

    #[cfg(feature = "inventory")]
    fn with_default_dir() -> Result<Self> {
        let mut dir = dirs::data_dir().ok_or(Error::Other("no user data directory"))?;
        dir.push("cachedump");

        let mut ret = Self::default();
        ret.add_dir(dir).ok();
        Ok(ret)
    }

    #[cfg(not(feature = "inventory"))]
    fn with_default_dir() -> Result<Self> {
        Err(Error::Other("CACHEDUMP_LAYOUT_PATH is not set"))
    }

    /// Adds a schema directory to the inventory
    pub fn add_dir(&mut self, dir: PathBuf) -> Result<&mut Self> {
        if !dir.is_dir() {
            return Err(Error::IO("invalid path argument"));
        }

        info!("scanning {:?} for layout schemas", dir);

        for entry in read_dir(dir).map_err(|_| Error::IO("unable to read directory"))? {
            let entry = entry.map_err(|_| Error::IO("unable to read directory entry"))?;
            let path = entry.path();
            if path.is_file() && is_schema(&path) {
                info!("adding layout schema: {:?}", path);
                self.schemas.push(path);
            }
        }

        Ok(self)
    }

    pub fn schemas(&self) -> &[PathBuf] {
        &self.schemas
    }

    /// Returns the names of all cpus with a schema.
    pub fn cpus(&self) -> Vec<String> {
        self.schemas
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect()
    }

    /// Finds the schema of a cpu, matching file names case-insensitively.
    ///
    /// The first directory added wins if several contain a schema of the cpu.
    pub fn find(&self, cpu_name: &str) -> Option<&Path> {
        self.schemas
            .iter()
            .find(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.eq_ignore_ascii_case(cpu_name))
                    .unwrap_or(false)
            })
            .map(PathBuf::as_path)
    }

    pub fn load(&self, cpu_name: &str) -> Result<SchemaFile> {
        let path = self
            .find(cpu_name)
            .ok_or_else(|| Error::UnknownLayout(format!("no schema for {}", cpu_name)))?;
        SchemaFile::open(path)
    }

    /// Loads the schema of a cpu into a registry.
    ///
    /// Returns the cache types that failed to load.
    pub fn load_into(&self, registry: &mut LayoutRegistry, cpu_name: &str) -> Result<Vec<Error>> {
        let schema = self.load(cpu_name)?;
        debug!(
            "loading {} cache types of {}",
            schema.cache_types().count(),
            schema.cpu_name()
        );
        Ok(registry.load_schema(&schema))
    }

    /// Loads every schema of the inventory into a registry.
    pub fn load_all(&self, registry: &mut LayoutRegistry) -> Vec<Error> {
        let mut failures = Vec::new();
        for path in self.schemas.iter() {
            match SchemaFile::open(path) {
                Ok(schema) => failures.extend(registry.load_schema(&schema)),
                Err(err) => {
                    warn!("unable to load layout schema {:?}: {}", path, err);
                    failures.push(err);
                }
            }
        }
        failures
    }
}

fn is_schema(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SCHEMA_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

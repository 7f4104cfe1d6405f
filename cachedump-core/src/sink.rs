/*!
Destinations of rendered tables.
*/

use crate::error::{Error, Result};
use crate::render::RenderedTable;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::debug;

/// Receives every table produced by a dump session.
pub trait OutputSink {
    fn write_table(&mut self, table: &RenderedTable) -> Result<()>;
}

/// Writes each table into `<dir>/<table name>.txt`.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates the sink, creating `dir` if it does not exist yet.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|_| Error::IO("unable to create output directory"))?;
        Ok(Self { dir })
    }

    pub fn path_of(&self, table: &RenderedTable) -> PathBuf {
        self.dir.join(format!("{}.txt", table.name))
    }
}

impl OutputSink for DirectorySink {
    fn write_table(&mut self, table: &RenderedTable) -> Result<()> {
        let path = self.path_of(table);
        debug!("writing table {} to {:?}", table.name, path);
        let file = File::create(&path).map_err(|_| Error::IO("unable to create output file"))?;
        table.write_to(file)
    }
}

/// Keeps every table in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub tables: Vec<RenderedTable>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RenderedTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl OutputSink for MemorySink {
    fn write_table(&mut self, table: &RenderedTable) -> Result<()> {
        self.tables.push(table.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> RenderedTable {
        RenderedTable {
            name: name.to_string(),
            header: "Way Set TAG".to_string(),
            rows: vec!["  0   0   1".to_string()],
            index_width: 8,
        }
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_table(&table("a")).unwrap();
        sink.write_table(&table("b")).unwrap();
        assert_eq!(sink.tables.len(), 2);
        assert_eq!(sink.get("b").unwrap().name, "b");
        assert!(sink.get("c").is_none());
    }

    #[test]
    fn test_directory_sink() {
        let dir = std::env::temp_dir().join(format!("cachedump-sink-{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();

        let mut sink = DirectorySink::new(&dir).unwrap();
        sink.write_table(&table("L1_DCache_TAG")).unwrap();

        let text = fs::read_to_string(dir.join("L1_DCache_TAG.txt")).unwrap();
        assert_eq!(text, "Way Set TAG\n  0   0   1\n");

        fs::remove_dir_all(&dir).ok();
    }
}

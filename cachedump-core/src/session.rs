/*!
Dump sessions.

A [`DumpSession`] turns dump requests into rendered tables. Every request walks through
the same states:

```text
Idle -> Resolving -> Slicing -> Decoding -> Rendering -> (Merging) -> Done
            |           |
            +-----------+-----> Failed
```

Chained layouts are decoded back-to-back, each link starting right behind the records
of the previous one. The fragment offset of a link only moves its own records.
Composite `<base>_TAG_DATA` requests decode the tag and the data chain and merge their
first tables row by row.
*/

use crate::args::DumpArgs;
use crate::decode::RecordDecoder;
use crate::error::{Error, Result};
use crate::layout::{LayoutDescriptor, LayoutKey};
use crate::registry::{split_tag_data, LayoutChain, LayoutRegistry};
use crate::render::{RenderedTable, TableRenderer};
use crate::sink::OutputSink;

use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};

/// What a request asks to be dumped.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum RequestKey {
    Layout(LayoutKey),
    /// Tag and data chains of `<base>_TAG_DATA`, merged into one table.
    TagData { cpu_name: String, cache_type: String },
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestKey::Layout(key) => write!(f, "{}", key),
            RequestKey::TagData {
                cpu_name,
                cache_type,
            } => write!(f, "{} {}", cpu_name, cache_type),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DumpRequest {
    pub key: RequestKey,
    pub sets: Option<u32>,
    pub ways: Option<u32>,
    /// Offset of the first layout in the dump.
    pub seek: u64,
    /// Offset of the data chain of composite requests, defaults to the end of the tag chain.
    pub data_seek: Option<u64>,
}

impl DumpRequest {
    pub fn new(key: RequestKey) -> Self {
        Self {
            key,
            sets: None,
            ways: None,
            seek: 0,
            data_seek: None,
        }
    }

    pub fn layout(key: LayoutKey) -> Self {
        Self::new(RequestKey::Layout(key))
    }

    pub fn hardware<S: Into<String>>(hardware_id: S, client_id: u32, version: u8) -> Self {
        Self::layout(LayoutKey::hardware(hardware_id, client_id, version))
    }

    /// Requests a named cache type, names ending in `_TAG_DATA` are composite requests.
    pub fn parse_named(cpu_name: &str, cache_type: &str) -> Self {
        if split_tag_data(cache_type).is_some() {
            Self::new(RequestKey::TagData {
                cpu_name: cpu_name.to_string(),
                cache_type: cache_type.to_string(),
            })
        } else {
            Self::layout(LayoutKey::named(cpu_name, cache_type))
        }
    }

    pub fn from_args(key: RequestKey, args: &DumpArgs) -> Result<Self> {
        Self::new(key).with_args(args)
    }

    /// Applies the overrides found in `args`.
    pub fn with_args(mut self, args: &DumpArgs) -> Result<Self> {
        if let Some(sets) = args.sets()? {
            self.sets = Some(sets);
        }
        if let Some(ways) = args.ways()? {
            self.ways = Some(ways);
        }
        if let Some(seek) = args.seek()? {
            self.seek = seek;
        }
        if let Some(data_seek) = args.data_seek()? {
            self.data_seek = Some(data_seek);
        }
        Ok(self)
    }

    pub fn sets(mut self, sets: u32) -> Self {
        self.sets = Some(sets);
        self
    }

    pub fn ways(mut self, ways: u32) -> Self {
        self.ways = Some(ways);
        self
    }

    pub fn seek(mut self, seek: u64) -> Self {
        self.seek = seek;
        self
    }

    pub fn data_seek(mut self, data_seek: u64) -> Self {
        self.data_seek = Some(data_seek);
        self
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// No request has been run yet.
    Idle,
    Resolving,
    Slicing,
    Decoding,
    Rendering,
    Merging,
    Done,
    Failed,
}

/// Tables produced by a single request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DumpOutput {
    /// One table per link of the chain.
    Single(Vec<RenderedTable>),
    Merged {
        merged: RenderedTable,
        tag: Vec<RenderedTable>,
        data: Vec<RenderedTable>,
    },
}

impl DumpOutput {
    /// All tables, the merged table first.
    pub fn tables(&self) -> Vec<&RenderedTable> {
        match self {
            DumpOutput::Single(tables) => tables.iter().collect(),
            DumpOutput::Merged { merged, tag, data } => std::iter::once(merged)
                .chain(tag.iter())
                .chain(data.iter())
                .collect(),
        }
    }
}

/// Outcome of a batch of requests.
#[derive(Clone, Debug, Default)]
pub struct DumpReport {
    pub outputs: Vec<(RequestKey, DumpOutput)>,
    pub failures: Vec<(RequestKey, Error)>,
}

impl DumpReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Hands every produced table to `sink`.
    pub fn write(&self, sink: &mut dyn OutputSink) -> Result<()> {
        self.outputs
            .iter()
            .flat_map(|(_, output)| output.tables())
            .try_for_each(|table| sink.write_table(table))
    }
}

pub struct DumpSession<'a> {
    registry: &'a LayoutRegistry,
    state: SessionState,
}

impl<'a> DumpSession<'a> {
    pub fn new(registry: &'a LayoutRegistry) -> Self {
        Self {
            registry,
            state: SessionState::Idle,
        }
    }

    /// State reached by the last request.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, key: &RequestKey, state: SessionState) {
        trace!("{}: {:?} -> {:?}", key, self.state, state);
        self.state = state;
    }

    fn fail<T>(&mut self, key: &RequestKey, err: Error) -> Result<T> {
        self.transition(key, SessionState::Failed);
        Err(err)
    }

    /// Decodes a single request from `buf`.
    pub fn run(&mut self, buf: &[u8], request: &DumpRequest) -> Result<DumpOutput> {
        let key = &request.key;
        debug!("dumping {} at {:#x}", key, request.seek);
        self.transition(key, SessionState::Resolving);

        let resolved = match key {
            RequestKey::Layout(layout) => self.registry.resolve_chain(layout).map(|c| (c, None)),
            RequestKey::TagData {
                cpu_name,
                cache_type,
            } => self
                .registry
                .resolve_tag_data(cpu_name, cache_type)
                .map(|(tag, data)| (tag, Some(data))),
        };
        let (first, second) = match resolved {
            Ok(chains) => chains,
            Err(err) => return self.fail(key, err),
        };

        let first = match apply_geometry(first, request) {
            Ok(chain) => chain,
            Err(err) => return self.fail(key, err),
        };
        let (tables, end) = self.dump_chain(buf, key, &first, request.seek)?;

        let data = match second {
            Some(data) => data,
            None => {
                self.transition(key, SessionState::Done);
                return Ok(DumpOutput::Single(tables));
            }
        };

        let data = match apply_geometry(data, request) {
            Ok(chain) => chain,
            Err(err) => return self.fail(key, err),
        };
        let (data_tables, _) =
            self.dump_chain(buf, key, &data, request.data_seek.unwrap_or(end))?;

        self.transition(key, SessionState::Merging);
        let merged = match (tables.first(), data_tables.first()) {
            (Some(tag), Some(data)) => TableRenderer::merge(tag, data),
            _ => Err(Error::Other("empty layout chain")),
        };

        match merged {
            Ok(merged) => {
                self.transition(key, SessionState::Done);
                Ok(DumpOutput::Merged {
                    merged,
                    tag: tables,
                    data: data_tables,
                })
            }
            Err(err) => self.fail(key, err),
        }
    }

    /// Decodes and renders every link of a chain back-to-back.
    ///
    /// Returns the tables and the offset right behind the records of the last link.
    fn dump_chain(
        &mut self,
        buf: &[u8],
        key: &RequestKey,
        chain: &[Arc<LayoutDescriptor>],
        start: u64,
    ) -> Result<(Vec<RenderedTable>, u64)> {
        let mut tables = Vec::with_capacity(chain.len());
        let mut offset = start;

        for layout in chain.iter() {
            self.transition(key, SessionState::Slicing);
            let available = buf.len() as u64;
            let end = layout.span().and_then(|span| offset.checked_add(span));
            let next = layout.region_size().and_then(|size| offset.checked_add(size));
            let (end, next) = match (end, next) {
                (Some(end), Some(next)) if end <= available => (end, next),
                (Some(end), _) => return self.fail(key, Error::bytes(end, available)),
                _ => return self.fail(key, Error::bytes(u64::max_value(), available)),
            };
            let region = &buf[offset as usize..end as usize];

            self.transition(key, SessionState::Decoding);
            let cells = match RecordDecoder::new(layout).decode_region(region, 0) {
                Ok(cells) => cells,
                Err(err) => return self.fail(key, err),
            };

            self.transition(key, SessionState::Rendering);
            tables.push(TableRenderer::render(layout, &cells));
            offset = next;
        }

        Ok((tables, offset))
    }

    /// Runs every request, collecting failures instead of stopping at the first one.
    pub fn run_all(&mut self, buf: &[u8], requests: &[DumpRequest]) -> DumpReport {
        let mut report = DumpReport::default();

        for request in requests.iter() {
            match self.run(buf, request) {
                Ok(output) => report.outputs.push((request.key.clone(), output)),
                Err(err) => {
                    warn!("unable to dump {}: {}", request.key, err);
                    report.failures.push((request.key.clone(), err));
                }
            }
        }

        report
    }
}

fn apply_geometry(chain: LayoutChain, request: &DumpRequest) -> Result<LayoutChain> {
    if request.sets.is_none() && request.ways.is_none() {
        return Ok(chain);
    }

    chain
        .iter()
        .map(|layout| {
            layout
                .with_geometry(request.sets, request.ways)
                .map(Arc::new)
        })
        .collect()
}

use crate::bitspec::parse_number;
use crate::error::{Error, Result};

use std::convert::TryFrom;

use hashbrown::HashMap;

/// Overrides of a single dump request.
///
/// Geometry and offsets default to what the layout describes. Values are decimal or
/// `0x` prefixed hexadecimal. Keys other than `sets`, `ways`, `seek` and `data_seek`
/// are kept but ignored by the session.
///
/// # Examples
///
/// Construct from a string:
/// ```
/// use cachedump_core::args::DumpArgs;
/// use std::convert::TryFrom;
///
/// let args = DumpArgs::try_from("sets=256,ways=4,seek=0x100").unwrap();
/// assert_eq!(args.sets().unwrap(), Some(256));
/// assert_eq!(args.seek().unwrap(), Some(0x100));
/// assert_eq!(args.data_seek().unwrap(), None);
/// ```
///
/// Construct as builder:
/// ```
/// use cachedump_core::args::DumpArgs;
///
/// let args = DumpArgs::new()
///     .insert("ways", "2")
///     .insert("data_seek", "0x4000");
/// ```
#[derive(Clone, Debug, Default)]
pub struct DumpArgs {
    map: HashMap<String, String>,
}

impl DumpArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_parse_str(args: &str) -> Result<Self> {
        let mut map = HashMap::new();

        for kv in args.split(',').map(str::trim).filter(|kv| !kv.is_empty()) {
            let mut kvsplit = kv.splitn(2, '=');
            match (kvsplit.next(), kvsplit.next()) {
                (Some(key), Some(value)) if !key.trim().is_empty() => {
                    map.insert(key.trim().to_lowercase(), value.trim().to_string());
                }
                _ => return Err(Error::Other("argument is not of the form key=value")),
            }
        }

        Ok(Self { map })
    }

    pub fn insert(mut self, key: &str, value: &str) -> Self {
        self.map.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    pub fn sets(&self) -> Result<Option<u32>> {
        self.get_u32("sets")
    }

    pub fn ways(&self) -> Result<Option<u32>> {
        self.get_u32("ways")
    }

    pub fn seek(&self) -> Result<Option<u64>> {
        self.get_u64("seek")
    }

    pub fn data_seek(&self) -> Result<Option<u64>> {
        self.get_u64("data_seek")
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)
            .map(|value| parse_number(value).ok_or(Error::Other("unable to parse numeric argument")))
            .transpose()
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        self.get_u64(key)?
            .map(|value| u32::try_from(value).map_err(|_| Error::Other("numeric argument too large")))
            .transpose()
    }
}

impl TryFrom<&str> for DumpArgs {
    type Error = Error;

    fn try_from(args: &str) -> Result<Self> {
        DumpArgs::try_parse_str(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn from_str() {
        let args = DumpArgs::try_from("sets=256, ways=4,seek=0x100,data_seek=16384").unwrap();
        assert_eq!(args.sets().unwrap(), Some(256));
        assert_eq!(args.ways().unwrap(), Some(4));
        assert_eq!(args.seek().unwrap(), Some(0x100));
        assert_eq!(args.data_seek().unwrap(), Some(0x4000));
    }

    #[test]
    pub fn unknown_keys_kept() {
        let args = DumpArgs::try_from("SETS=2,color=red").unwrap();
        assert_eq!(args.sets().unwrap(), Some(2));
        assert_eq!(args.get("color").unwrap(), "red");
        assert_eq!(args.ways().unwrap(), None);
    }

    #[test]
    pub fn parse_empty() {
        let args = DumpArgs::try_from("").unwrap();
        assert_eq!(args.sets().unwrap(), None);
        assert_eq!(args.seek().unwrap(), None);
    }

    #[test]
    pub fn parse_errors() {
        assert!(DumpArgs::try_from("sets").is_err());
        assert!(DumpArgs::try_from("=4").is_err());

        let args = DumpArgs::new().insert("sets", "many").insert("ways", "0x100000000");
        assert_eq!(
            args.sets().unwrap_err(),
            Error::Other("unable to parse numeric argument")
        );
        assert!(args.ways().is_err());
    }

    #[test]
    pub fn builder() {
        let args = DumpArgs::new().insert("seek", "0x40").insert("data_seek", "128");
        assert_eq!(args.seek().unwrap(), Some(0x40));
        assert_eq!(args.data_seek().unwrap(), Some(128));
    }
}

/*!
Memory dump client ids.

Every cache and tlb dump found in a memory dump table is tagged with a client id.
Per-cpu clients add the cpu number to the base id of their client type.
*/

pub const L1_ITLB: u32 = 0x20;
pub const L1_DTLB: u32 = 0x40;
pub const L1_ICACHE: u32 = 0x60;
pub const L1_DCACHE: u32 = 0x80;
pub const L2_CACHE: u32 = 0xc0;
pub const L3_CACHE: u32 = 0xd0;
pub const L2_TLB: u32 = 0x120;

/// Upper bound of cpus sharing one client base.
pub const MAX_CPUS: u32 = 16;

pub const CLIENTS: &[(u32, &str)] = &[
    (L1_ITLB, "L1_ITLB"),
    (L1_DTLB, "L1_DTLB"),
    (L1_ICACHE, "L1_ICACHE"),
    (L1_DCACHE, "L1_DCACHE"),
    (L2_CACHE, "L2_CACHE"),
    (L3_CACHE, "L3_CACHE"),
    (L2_TLB, "L2_TLB"),
];

/// Returns the client id of `base` for `cpu`.
pub const fn client_id(base: u32, cpu: u32) -> u32 {
    base + cpu
}

/// Maps a client id back to the name of its base and the cpu number.
///
/// # Examples
///
/// ```
/// use cachedump_qcom::client;
///
/// assert_eq!(client::describe(0x85), Some(("L1_DCACHE", 5)));
/// assert_eq!(client::describe(0x10), None);
/// ```
pub fn describe(client_id: u32) -> Option<(&'static str, u32)> {
    CLIENTS
        .iter()
        .filter(|(base, _)| *base <= client_id)
        .max_by_key(|(base, _)| *base)
        .and_then(|(base, name)| {
            let cpu = client_id - base;
            let limit = CLIENTS
                .iter()
                .map(|(b, _)| *b)
                .filter(|b| b > base)
                .min()
                .map_or(MAX_CPUS, |next| (next - base).min(MAX_CPUS));
            if cpu < limit {
                Some((*name, cpu))
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(L1_ITLB), Some(("L1_ITLB", 0)));
        assert_eq!(describe(client_id(L1_ICACHE, 7)), Some(("L1_ICACHE", 7)));
        assert_eq!(describe(client_id(L2_TLB, 3)), Some(("L2_TLB", 3)));
        assert_eq!(describe(client_id(L2_CACHE, 1)), Some(("L2_CACHE", 1)));
        assert_eq!(describe(0xa0), None);
        assert_eq!(describe(0x130), None);
    }
}

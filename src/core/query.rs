//! Read-only queries over the slashing store.

use serde::{Deserialize, Serialize};

use crate::core::params::{self, Params};
use crate::core::signing_info::{self, SigningInfo};
use crate::core::store::KvStore;
use crate::core::types::ConsAddress;
use crate::error::Result;

/// Page size used when a request leaves `limit` at zero.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    /// Zero means `DEFAULT_PAGE_LIMIT`.
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    pub infos: Vec<SigningInfo>,
    /// Signing infos in the store, regardless of the page.
    pub total: u64,
}

pub fn query_params(store: &dyn KvStore) -> Result<Params> {
    params::get_params(store)
}

/// `SigningInfoNotFound` if the validator never bonded.
pub fn query_signing_info(store: &dyn KvStore, addr: &ConsAddress) -> Result<SigningInfo> {
    signing_info::must_get_signing_info(store, addr)
}

/// One page of signing infos in store-key order.
pub fn query_signing_infos(store: &dyn KvStore, req: PageRequest) -> Result<PageResponse> {
    let all = signing_info::walk_signing_infos(store)?;
    let total = all.len() as u64;
    let limit = if req.limit == 0 { DEFAULT_PAGE_LIMIT } else { req.limit };
    let infos = all
        .into_iter()
        .skip(usize::try_from(req.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|(_, info)| info)
        .collect();
    Ok(PageResponse { infos, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemStore;
    use crate::error::SlashingError;

    fn seeded(n: u8) -> MemStore {
        let mut store = MemStore::new();
        for b in 1..=n {
            let addr = ConsAddress::from([b; 20]);
            signing_info::set_signing_info(&mut store, &addr, &SigningInfo::new(addr.clone(), b as i64)).unwrap();
        }
        store
    }

    #[test]
    fn test_pagination() {
        let store = seeded(5);
        let page = query_signing_infos(&store, PageRequest { offset: 1, limit: 2 }).unwrap();
        assert_eq!(page.total, 5);
        let heights: Vec<i64> = page.infos.iter().map(|i| i.start_height).collect();
        assert_eq!(heights, vec![2, 3]);

        let tail = query_signing_infos(&store, PageRequest { offset: 4, limit: 10 }).unwrap();
        assert_eq!(tail.infos.len(), 1);

        let past = query_signing_infos(&store, PageRequest { offset: 9, limit: 0 }).unwrap();
        assert!(past.infos.is_empty());
        assert_eq!(past.total, 5);
    }

    #[test]
    fn test_zero_limit_uses_default() {
        let store = seeded(3);
        let page = query_signing_infos(&store, PageRequest::default()).unwrap();
        assert_eq!(page.infos.len(), 3);
    }

    #[test]
    fn test_single_lookup() {
        let store = seeded(1);
        assert!(query_signing_info(&store, &ConsAddress::from([1u8; 20])).is_ok());
        let missing = ConsAddress::from([2u8; 20]);
        assert_eq!(
            query_signing_info(&store, &missing),
            Err(SlashingError::SigningInfoNotFound(missing.clone()))
        );
        assert!(query_params(&store).is_err());
    }
}

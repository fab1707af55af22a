//! ============================================================================
//! Test Support - Scripted Chain Gateway
//! ============================================================================
//! A mock gateway with scripted pages, per-asset fetch failures, injectable
//! latency and call counters. Lets verification, cache and resolver tests
//! run deterministically with zero network access.
//! ============================================================================

use futures_util::stream;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::GateError;
use crate::gateway::{AssetRefStream, ChainGateway};
use crate::types::{AssetRecord, AssetRef, Chain};

/// Build a minimal record in `collection` with the given traits
pub fn asset(id: &str, collection: &str, traits: &[(&str, &str)]) -> AssetRecord {
    AssetRecord {
        asset_id: id.to_string(),
        collection_id: Some(collection.to_string()),
        type_tag: None,
        traits: traits
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        display: Default::default(),
    }
}

/// Scripted outcome for a single asset fetch
#[derive(Debug, Clone, Copy)]
pub enum ScriptedFetch {
    NotFound,
    Unavailable,
}

pub struct MockGateway {
    chain: Chain,
    pages: Vec<Vec<AssetRecord>>,
    overrides: HashMap<String, ScriptedFetch>,
    failing_page: Option<usize>,
    latency: Option<Duration>,
    scans: Arc<AtomicUsize>,
    pages_served: Arc<AtomicUsize>,
    fetch_log: Arc<Mutex<Vec<String>>>,
}

impl MockGateway {
    pub fn new(chain: Chain, pages: Vec<Vec<AssetRecord>>) -> Self {
        Self {
            chain,
            pages,
            overrides: HashMap::new(),
            failing_page: None,
            latency: None,
            scans: Arc::new(AtomicUsize::new(0)),
            pages_served: Arc::new(AtomicUsize::new(0)),
            fetch_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the fetch outcome for one asset id
    pub fn with_fetch_override(mut self, id: &str, outcome: ScriptedFetch) -> Self {
        self.overrides.insert(id.to_string(), outcome);
        self
    }

    /// Make enumeration fail when it reaches the given page index
    pub fn with_failing_page(mut self, page: usize) -> Self {
        self.failing_page = Some(page);
        self
    }

    /// Delay the first enumeration page, so tests can overlap calls
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times a full enumeration was started
    pub fn scans(&self) -> Arc<AtomicUsize> {
        self.scans.clone()
    }

    /// Number of pages actually served across all scans
    pub fn pages_served(&self) -> Arc<AtomicUsize> {
        self.pages_served.clone()
    }

    /// Ids passed to fetch_asset, in call order
    pub fn fetch_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.fetch_log.clone()
    }
}

#[async_trait::async_trait]
impl ChainGateway for MockGateway {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn list_owned_assets(&self, _address: &str) -> AssetRefStream<'_> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let chain = self.chain;
        let pages: Vec<Vec<AssetRef>> = self
            .pages
            .iter()
            .map(|page| {
                page.iter()
                    .map(|record| AssetRef {
                        asset_id: record.asset_id.clone(),
                        chain,
                    })
                    .collect()
            })
            .collect();
        let failing_page = self.failing_page;
        let latency = self.latency;
        let pages_served = self.pages_served.clone();

        let state = (pages, 0usize, VecDeque::new(), true);
        Box::pin(stream::try_unfold(
            state,
            move |(pages, mut idx, mut buffered, mut first)| {
                let pages_served = pages_served.clone();
                async move {
                    loop {
                        if let Some(item) = buffered.pop_front() {
                            return Ok(Some((item, (pages, idx, buffered, first))));
                        }
                        if idx >= pages.len() {
                            return Ok(None);
                        }
                        if first {
                            if let Some(delay) = latency {
                                tokio::time::sleep(delay).await;
                            }
                            first = false;
                        }
                        if failing_page == Some(idx) {
                            return Err(GateError::ChainUnavailable(
                                "scripted page failure".into(),
                            ));
                        }
                        pages_served.fetch_add(1, Ordering::SeqCst);
                        buffered.extend(pages[idx].clone());
                        idx += 1;
                    }
                }
            },
        ))
    }

    async fn fetch_asset(&self, asset: &AssetRef) -> Result<AssetRecord, GateError> {
        self.fetch_log
            .lock()
            .unwrap()
            .push(asset.asset_id.clone());

        match self.overrides.get(&asset.asset_id) {
            Some(ScriptedFetch::NotFound) => {
                return Err(GateError::AssetNotFound(asset.asset_id.clone()))
            }
            Some(ScriptedFetch::Unavailable) => {
                return Err(GateError::ChainUnavailable("scripted fetch failure".into()))
            }
            None => {}
        }

        self.pages
            .iter()
            .flatten()
            .find(|record| record.asset_id == asset.asset_id)
            .cloned()
            .ok_or_else(|| GateError::AssetNotFound(asset.asset_id.clone()))
    }
}

//! Resolve place queries from the command line.
//!
//! ```text
//! geo_lookup [--config wayfare.toml] [--candidates] [--country PH] <query>...
//! geo_lookup [--config wayfare.toml] --boundary <name>...
//! ```

use std::sync::Arc;

use wayfare_core::telemetry::init_tracing;
use wayfare_core::{ConfigError, Resolution, StoreKind, WayfareConfig, WayfareError};
use wayfare_geo::{
    BoundaryLookup, CandidateOptions, CandidateSearch, CountryScope, GeoResolver, NominatimClient, OverpassClient,
    ResolverOptions, SessionLog,
};
use wayfare_storage::{
    CacheConfig, ChunkStore, InMemoryChunkStore, LmdbChunkStore, MemoCache, StoreLimits,
};

struct Invocation {
    queries: Vec<String>,
    candidates: bool,
    boundary: bool,
    country: Option<String>,
}

impl Invocation {
    fn from_args(args: impl Iterator<Item = String>) -> Self {
        let mut invocation = Invocation {
            queries: Vec::new(),
            candidates: false,
            boundary: false,
            country: None,
        };
        let mut args = args.skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                // Consumed by WayfareConfig::load_or_default.
                "--config" => {
                    args.next();
                }
                "--candidates" => invocation.candidates = true,
                "--boundary" => invocation.boundary = true,
                "--country" => invocation.country = args.next(),
                _ => invocation.queries.push(arg),
            }
        }
        invocation
    }
}

#[tokio::main]
async fn main() -> Result<(), WayfareError> {
    let config = WayfareConfig::load_or_default()?;
    init_tracing(&config.telemetry)?;
    let invocation = Invocation::from_args(std::env::args());

    match config.cache.store {
        StoreKind::Memory => {
            let limits = StoreLimits::dynamo_like();
            run(&config, Arc::new(InMemoryChunkStore::with_limits(limits)), &invocation).await
        }
        StoreKind::Lmdb => {
            let path = config
                .cache
                .lmdb_path
                .as_ref()
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "cache.lmdb_path",
                    reason: "required for the lmdb store".to_string(),
                })?;
            let store = LmdbChunkStore::open(path, config.cache.lmdb_map_size_mb)?;
            run(&config, Arc::new(store), &invocation).await
        }
    }
}

async fn run<S: ChunkStore>(
    config: &WayfareConfig,
    store: Arc<S>,
    invocation: &Invocation,
) -> Result<(), WayfareError> {
    let cache = Arc::new(MemoCache::new(store, CacheConfig::from_section(&config.cache)));

    if invocation.boundary {
        let outlines = BoundaryLookup::from_section(
            OverpassClient::from_config(&config.overpass)?,
            cache.clone(),
            &config.boundary,
        );
        for name in &invocation.queries {
            match outlines.boundary_for(name).await {
                Ok(read) => {
                    let marker = hit_marker(read.was_cache_hit());
                    match read.value() {
                        Some(boundary) => println!(
                            "{}\tboundary\t{}\t{}",
                            marker,
                            name,
                            boundary.to_feature_collection()
                        ),
                        None => println!("{}\tnot_found\t{}", marker, name),
                    }
                }
                Err(e) => println!("miss\terror\t{}\t{}", name, e),
            }
        }
    } else if invocation.candidates {
        let search = CandidateSearch::new(
            OverpassClient::from_config(&config.overpass)?,
            cache.clone(),
            CandidateOptions::from_section(&config.candidates),
        );
        let scope = invocation.country.as_deref().map(CountryScope::new);
        for query in &invocation.queries {
            match search.search(query, scope.as_ref()).await {
                Ok(read) => {
                    let marker = hit_marker(read.was_cache_hit());
                    for candidate in read.value() {
                        println!(
                            "{}\tcandidate\t{}\t{:.5},{:.5}\tpopulation={}",
                            marker,
                            candidate.name,
                            candidate.latitude,
                            candidate.longitude,
                            candidate
                                .population
                                .map(|p| p.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                        );
                    }
                    if read.value().is_empty() {
                        println!("{}\tnot_found\t{}", marker, query);
                    }
                }
                Err(e) => println!("miss\terror\t{}\t{}", query, e),
            }
        }
    } else {
        let resolver = GeoResolver::new(
            NominatimClient::from_config(&config.nominatim)?,
            cache.clone(),
            ResolverOptions::from_section(&config.resolver),
        );
        let mut session = SessionLog::new();
        let results = resolver.resolve_batch(&invocation.queries, &mut session).await;
        for (entry, resolution) in session.entries().iter().zip(&results) {
            let marker = hit_marker(entry.cache_hit);
            match resolution {
                Resolution::Found(found) => println!(
                    "{}\tfound\t{}\t{:.5},{:.5}\t{}",
                    marker, entry.query, found.latitude, found.longitude, found.display_name
                ),
                Resolution::NotFound => println!("{}\tnot_found\t{}", marker, entry.query),
                Resolution::Error(reason) => {
                    println!("{}\terror\t{}\t{}", marker, entry.query, reason)
                }
            }
        }
    }

    let stats = cache.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "Lookup finished"
    );
    Ok(())
}

fn hit_marker(cache_hit: bool) -> &'static str {
    if cache_hit {
        "hit"
    } else {
        "miss"
    }
}

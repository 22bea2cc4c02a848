//! Rate-limited Infinite Craft client with local discovery persistence.
//!
//! # Pipeline
//!
//! A call to [`InfiniteCraft::pair`] goes through these stages:
//!
//! 1. **Session check** - the session must be open
//! 2. **Admission** - the [`RateGate`] may suspend the caller until the rolling
//!    one-minute window has room
//! 3. **Request** - `GET {api_url}/api/infinite-craft/pair?first=..&second=..`
//! 4. **Release** - the gate ticket is returned as soon as the response (or
//!    error) arrives, before any further processing
//! 5. **Decode** - non-2xx statuses fail; the body is parsed into a
//!    [`PairResponse`]
//! 6. **Store** - on the blocking pool, new results are appended to the
//!    discovery file (dedup by name) and the in-memory cache is refreshed
//!    before the next append can start
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Resolved, validated client configuration |
//! | [`gate`] | Rolling-window request admission |
//! | [`http`] | Transport abstraction and the `reqwest` implementation |
//! | [`session`] | `NotStarted -> Open -> Closed` lifecycle |
//!
//! # Usage
//!
//! ```no_run
//! use craft_client::{ClientConfig, Element, InfiniteCraft};
//!
//! # async fn run() -> craft_client::Result<()> {
//! let client = InfiniteCraft::new(ClientConfig::default())?;
//! let steam = client
//!     .scope(|game| {
//!         Box::pin(async move {
//!             game.pair(&Element::new("Fire"), &Element::new("Water")).await
//!         })
//!     })
//!     .await?;
//! println!("{steam}");
//! # Ok(())
//! # }
//! ```
//!
//! # "Nothing" results
//!
//! When the game cannot combine two elements, [`InfiniteCraft::pair`] returns
//! the element with every field unset ([`CraftElement::nothing`]). It never
//! returns an absent value. [`InfiniteCraft::pair_or_none`] applies the
//! configured [`NothingPolicy`] for callers that prefer `None`.

pub mod config;
mod error;
pub mod gate;
pub mod http;
pub mod session;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use craft_store::{DiscoveryStore, PathStatus};
use tokio::time::Instant;
use url::Url;

pub use config::ClientConfig;
pub use craft_config::{CraftConfig, NothingPolicy};
pub use craft_store::StoreError;
pub use craft_types::{CraftElement, DiscoveryRecord, Element, PairResponse};
pub use error::{CraftError, Result, SessionStateError};
pub use gate::{GatePermit, RATE_WINDOW, RateGate, Ticket};
pub use http::{HttpClient, HttpFut, HttpResponse, ReqwestClient};
pub use session::{Session, SessionState};

/// Pairing endpoint, relative to the configured base URL.
pub const PAIR_PATH: &str = "/api/infinite-craft/pair";

/// Elements combined by [`InfiniteCraft::ping`].
pub const PING_PAIR: (&str, &str) = ("Fire", "Water");

/// Future returned by the body of [`InfiniteCraft::scope`].
pub type ScopeFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The client: one session, one rate gate, one discovery file.
///
/// Generic over the element type it produces (`E`) and the transport (`H`).
/// [`InfiniteCraft::new`] builds the default pairing of [`Element`] and
/// [`ReqwestClient`]; [`InfiniteCraft::with_http`] accepts any combination.
///
/// All methods take `&self`, so concurrent pairings on one client are
/// expected; the gate bounds how many reach the network per minute.
pub struct InfiniteCraft<E: CraftElement = Element, H: HttpClient = ReqwestClient> {
    config: ClientConfig,
    gate: RateGate,
    session: Session<H>,
    store: Arc<DiscoveryStore>,
    discoveries: Arc<RwLock<Vec<E>>>,
}

impl InfiniteCraft {
    /// Build a client using the `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = ReqwestClient::new(&config)?;
        Self::with_http(config, http)
    }

    /// Build a client from a configuration file model.
    pub fn from_config(file: &CraftConfig) -> Result<Self> {
        Self::new(ClientConfig::from_config(file)?)
    }
}

impl<E: CraftElement, H: HttpClient> InfiniteCraft<E, H> {
    /// Build a client over an arbitrary transport.
    ///
    /// Prepares the discovery file before returning:
    /// - missing file: created and seeded when `make_file` is set, otherwise
    ///   [`StoreError::NotFound`]
    /// - `reset_on_start`: existing file is reseeded
    ///
    /// The session is left `NotStarted`.
    pub fn with_http(config: ClientConfig, http: H) -> Result<Self> {
        let store = DiscoveryStore::new(config.discoveries_path(), config.store_options());

        let created = match store.check_path()? {
            PathStatus::Present => false,
            PathStatus::Missing if config.make_file() => {
                tracing::warn!(
                    path = %store.path().display(),
                    "Discoveries file not found; creating it"
                );
                store.reset()?;
                true
            }
            PathStatus::Missing => {
                return Err(StoreError::NotFound {
                    path: store.path().to_path_buf(),
                }
                .into());
            }
        };

        if config.reset_on_start() && !created {
            tracing::info!(path = %store.path().display(), "Resetting discoveries");
            store.reset()?;
        }

        let discoveries = store.load()?.iter().map(E::from_record).collect();

        Ok(Self {
            gate: RateGate::new(config.rate_limit()),
            session: Session::new(http),
            store: Arc::new(store),
            discoveries: Arc::new(RwLock::new(discoveries)),
            config,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn start(&self) -> Result<()> {
        self.session.start().await
    }

    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    /// Run `body` inside a managed session.
    ///
    /// Starts the session before `body` and closes it afterwards, whatever
    /// `body` returned. With `manual_control` set, both transitions are left
    /// to the caller. If `body` fails, its error wins over a close failure.
    pub async fn scope<T, F>(&self, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c Self) -> ScopeFut<'c, T>,
    {
        let managed = !self.config.manual_control();
        if managed {
            self.start().await?;
        }

        let outcome = body(self).await;

        if managed {
            match (self.close().await, &outcome) {
                (Err(close_err), Ok(_)) => return Err(close_err),
                (Err(close_err), Err(_)) => {
                    tracing::warn!(error = %close_err, "Failed to close session after error");
                }
                (Ok(()), _) => {}
            }
        }

        outcome
    }

    // ========================================================================
    // Pairing
    // ========================================================================

    /// Combine two elements and store the result.
    pub async fn pair(&self, first: &E, second: &E) -> Result<E> {
        self.pair_with(first, second, true).await
    }

    /// Combine two elements, storing the result only when `store` is set.
    ///
    /// The failure sentinel yields [`CraftElement::nothing`] and is never
    /// stored. A result whose name is already stored leaves the file
    /// untouched (first discovery wins) but still refreshes the cache.
    pub async fn pair_with(&self, first: &E, second: &E, store: bool) -> Result<E> {
        let first_name = element_name(first, "first")?;
        let second_name = element_name(second, "second")?;
        tracing::debug!(first = first_name, second = second_name, "Pairing");

        let (response, _) = self.dispatch(first_name, second_name).await?;
        let body: PairResponse =
            serde_json::from_slice(&response.body).map_err(CraftError::Decode)?;

        if body.is_nothing() {
            tracing::debug!(first = first_name, second = second_name, "Pairing produced nothing");
            return Ok(E::nothing());
        }

        let element = E::from_parts(body.result, body.emoji, body.is_new);
        if element.is_first_discovery() == Some(true) {
            tracing::info!(element = %element, "First discovery");
        } else {
            tracing::debug!(element = %element, "Pairing result");
        }

        if store {
            self.store_discovery(&element).await?;
        }
        Ok(element)
    }

    /// [`pair`](Self::pair), with the configured [`NothingPolicy`] applied:
    /// under `Absent` a failed pairing is `None`.
    pub async fn pair_or_none(&self, first: &E, second: &E) -> Result<Option<E>> {
        let element = self.pair(first, second).await?;
        let policy = self.config.nothing_policy();
        if element.is_nothing() {
            tracing::debug!(policy = policy.as_str(), "Applying nothing policy");
        }
        let absent = policy == NothingPolicy::Absent && element.is_nothing();
        Ok((!absent).then_some(element))
    }

    /// Round-trip time of one pairing request, excluding time spent waiting
    /// for admission. The result is discarded.
    pub async fn ping(&self) -> Result<Duration> {
        let (first, second) = PING_PAIR;
        let (_, elapsed) = self.dispatch(first, second).await?;
        tracing::debug!(elapsed_ms = elapsed.as_millis(), "Ping");
        Ok(elapsed)
    }

    /// Admit, send, release. Returns the successful response and the time
    /// spent on the request itself.
    async fn dispatch(&self, first: &str, second: &str) -> Result<(HttpResponse, Duration)> {
        let http = self.session.require_open()?;
        let url = self.pair_url(first, second)?;

        let permit = self.gate.admit().await;
        let sent_at = Instant::now();
        let response = http.get(&url).await;
        let elapsed = sent_at.elapsed();
        permit.release();

        Ok((response?.error_for_status()?, elapsed))
    }

    fn pair_url(&self, first: &str, second: &str) -> Result<Url> {
        let mut url = self.config.endpoint(PAIR_PATH)?;
        url.query_pairs_mut()
            .append_pair("first", first)
            .append_pair("second", second);
        Ok(url)
    }

    /// Append the result and refresh the cache from the file. Both happen under
    /// the store's write lock, so the cache always ends on the newest contents.
    async fn store_discovery(&self, element: &E) -> Result<()> {
        let Some(record) = element.to_record() else {
            return Ok(());
        };

        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.discoveries);
        let appended = tokio::task::spawn_blocking(move || {
            store.append_if_absent_with(record, |records| {
                replace_cache(&cache, records);
            })
        })
        .await;

        match appended {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Err(join_err) => Err(CraftError::StoreTask(join_err)),
        }
    }

    // ========================================================================
    // Discoveries
    // ========================================================================

    /// Snapshot of the in-memory discovery cache, in discovery order.
    #[must_use]
    pub fn discoveries(&self) -> Vec<E> {
        self.discoveries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stored discoveries matching `keep`, read from the file.
    pub fn discoveries_where(&self, keep: impl Fn(&E) -> bool) -> Result<Vec<E>> {
        Ok(self
            .store
            .load()?
            .iter()
            .map(E::from_record)
            .filter(|e| keep(e))
            .collect())
    }

    /// Reload the cache from the file and return the new snapshot.
    pub fn refresh_discoveries(&self) -> Result<Vec<E>> {
        let mut snapshot = Vec::new();
        self.store.load_with(|records| {
            snapshot = replace_cache(&self.discoveries, records);
        })?;
        Ok(snapshot)
    }

    /// Cached discovery with this name.
    #[must_use]
    pub fn discovery(&self, name: &str) -> Option<E> {
        self.discoveries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.name() == Some(name))
            .cloned()
    }

    /// Stored discovery with this name, read from the file.
    pub fn discovery_from_store(&self, name: &str) -> Result<Option<E>> {
        Ok(self.store.find(name)?.as_ref().map(E::from_record))
    }

    /// Reseed the file with the starting elements and reload the cache.
    pub fn reset(&self) -> Result<()> {
        self.store.reset()?;
        self.refresh_discoveries()?;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Gate tickets currently held by requests in flight or waiting for admission.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    #[must_use]
    pub fn store(&self) -> &DiscoveryStore {
        &self.store
    }
}

impl<E: CraftElement, H: HttpClient> fmt::Display for InfiniteCraft<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .discoveries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        write!(
            f,
            "<InfiniteCraft api_url={} discoveries={count} state={}>",
            self.config.api_url(),
            self.session.state()
        )
    }
}

impl<E: CraftElement, H: HttpClient> fmt::Debug for InfiniteCraft<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteCraft")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("session", &self.session)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Swap the cache for `records` and return the new contents.
fn replace_cache<E: CraftElement>(
    cache: &RwLock<Vec<E>>,
    records: &[DiscoveryRecord],
) -> Vec<E> {
    let fresh: Vec<E> = records.iter().map(E::from_record).collect();
    *cache.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
    fresh
}

fn element_name<'e, E: CraftElement>(element: &'e E, which: &str) -> Result<&'e str> {
    match element.name() {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(CraftError::invalid(format!(
            "{which} element has no name: {element:?}"
        ))),
    }
}

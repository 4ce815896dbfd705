//! Ordering of asynchronous model loads.
//!
//! Loads can't be cancelled once started and may complete in any order. The
//! [`LoadCoordinator`] tags every request with a monotonically increasing
//! [`RequestId`] and only lets the result of the most recently *issued*
//! request through. A slow response for an old URL therefore never replaces
//! the model of a newer, faster one.

use std::fmt;

use crate::error::LoadFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub id: RequestId,
}

/// Advisory progress of a running load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

/// What to do with a completed load.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// The result belongs to the current request and should be installed.
    Install(T),
    /// The current request failed.
    Failed(LoadFailure),
    /// A newer request was issued in the meantime; drop the result.
    Stale,
}

#[derive(Debug, Default)]
pub struct LoadCoordinator {
    issued: u64,
    current: Option<RequestId>,
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request and makes it the current one.
    pub fn issue(&mut self, url: &str) -> LoadRequest {
        self.issued += 1;
        let id = RequestId(self.issued);
        self.current = Some(id);
        log::info!("Loading model {} from {}", id, url);
        LoadRequest {
            url: url.to_string(),
            id,
        }
    }

    pub fn current(&self) -> Option<RequestId> {
        self.current
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.current == Some(id)
    }

    /// Makes every outstanding request stale without issuing a new one.
    pub fn invalidate(&mut self) {
        if let Some(id) = self.current.take() {
            log::debug!("Load request {} superseded", id);
        }
    }

    /// Classifies a completed load. The current request is settled afterwards,
    /// so a duplicate completion for it is stale as well.
    pub fn resolve<T>(&mut self, request: &LoadRequest, result: anyhow::Result<T>) -> LoadOutcome<T> {
        if !self.is_current(request.id) {
            log::debug!(
                "Discarding stale result of load {} ({}), current is {:?}",
                request.id,
                request.url,
                self.current
            );
            return LoadOutcome::Stale;
        }
        self.current = None;
        match result {
            Ok(value) => LoadOutcome::Install(value),
            Err(cause) => {
                let failure = LoadFailure {
                    url: request.url.clone(),
                    request: request.id,
                    cause,
                };
                log::error!("{}: {:#}", failure, failure.cause);
                LoadOutcome::Failed(failure)
            }
        }
    }

    /// Progress is for observability only and never changes any state.
    pub fn report_progress(request: &LoadRequest, progress: LoadProgress) {
        match progress.total {
            Some(total) if total > 0 => log::debug!(
                "Load {} ({}): {}/{} bytes ({:.0}%)",
                request.id,
                request.url,
                progress.loaded,
                total,
                progress.loaded as f64 / total as f64 * 100.0
            ),
            _ => log::debug!(
                "Load {} ({}): {} bytes",
                request.id,
                request.url,
                progress.loaded
            ),
        }
    }
}

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::models::{FetchOutcome, PostingQuery, SourceId};

/// Retrieves postings from one job source.
///
/// Ordinary "no results" and partial-page failures belong in
/// [`FetchOutcome::errors`]. Returning `Err` is reserved for unrecoverable
/// setup failures such as missing credentials; the search service treats it
/// the same as a reported error.
pub trait Fetcher: Send + Sync + 'static {
    /// Stable identifier used as a map key everywhere.
    fn source_id(&self) -> SourceId;

    fn fetch(
        &self,
        query: &PostingQuery,
    ) -> impl Future<Output = Result<FetchOutcome, AppError>> + Send;

    /// Release held resources (sessions, connections). Must be idempotent.
    fn close(&self) -> impl Future<Output = Result<(), AppError>> + Send {
        async { Ok(()) }
    }
}

/// Object-safe form of [`Fetcher`], so fetchers for different sources can
/// share one registry. Implemented for every `Fetcher`.
pub trait DynFetcher: Send + Sync {
    fn source_id(&self) -> SourceId;

    fn fetch_boxed<'a>(
        &'a self,
        query: &'a PostingQuery,
    ) -> BoxFuture<'a, Result<FetchOutcome, AppError>>;

    fn close_boxed(&self) -> BoxFuture<'_, Result<(), AppError>>;
}

impl<F: Fetcher> DynFetcher for F {
    fn source_id(&self) -> SourceId {
        Fetcher::source_id(self)
    }

    fn fetch_boxed<'a>(
        &'a self,
        query: &'a PostingQuery,
    ) -> BoxFuture<'a, Result<FetchOutcome, AppError>> {
        Box::pin(self.fetch(query))
    }

    fn close_boxed(&self) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(self.close())
    }
}

//! Cursor-paginated invoker
//!
//! Drives one operation against a [`RemoteClient`]: builds the request once,
//! then calls the remote side page by page, handing every page to the
//! caller as soon as it is unwrapped.
//!
//! Pagination mode is fixed at the start. If the caller bound the
//! descriptor's cursor parameter, exactly one page is fetched (manual mode)
//! and the returned cursor is surfaced on the page. Otherwise pages are
//! fetched until the descriptor's end-of-pages predicate says the cursor
//! is exhausted (automatic mode).

use super::descriptor::OperationDescriptor;
use super::params::BoundParams;
use super::request::{build_request, RequestValue};
use super::unwrap::{unwrap_response, Page, Selector};
use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The remote side of an invocation: one call per request value
pub trait RemoteClient {
    fn invoke(
        &self,
        descriptor: &OperationDescriptor,
        request: &RequestValue,
    ) -> impl Future<Output = Result<Value>>;

    /// Annotate a failed call before it reaches the caller
    fn normalize_error(&self, _descriptor: &OperationDescriptor, err: Error) -> Error {
        err
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Loop until the cursor is exhausted
    Automatic,
    /// Caller supplied the cursor: one page only
    Manual,
}

/// Invoker state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    Start,
    AwaitingResponse,
    EmitPage,
    Continue,
    Done,
    Cancelled,
    Failed,
}

/// Summary of a finished (or cancelled) pagination sequence
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOutcome {
    pub state: InvokerState,
    pub mode: PaginationMode,
    pub pages: usize,
    pub calls: usize,
    pub records: usize,
    /// Cursor returned with the last page
    pub last_cursor: Option<String>,
}

/// A sequence that ended in an error, with the progress made before it
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct InvocationFailure {
    pub error: Error,
    /// State is always [`InvokerState::Failed`]
    pub outcome: PaginationOutcome,
}

impl From<InvocationFailure> for Error {
    fn from(failure: InvocationFailure) -> Self {
        failure.error
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub selector: Selector,
    /// Checked before every call; pages already emitted stay emitted
    pub cancel: CancellationToken,
}

/// Determine the pagination mode for a bound parameter set
pub fn pagination_mode(descriptor: &OperationDescriptor, params: &BoundParams) -> PaginationMode {
    match descriptor.cursor_field() {
        Some(field) if params.is_bound(&field.name) => PaginationMode::Manual,
        _ => PaginationMode::Automatic,
    }
}

/// Invoke `descriptor`, emitting each page through `emit`.
///
/// Configuration errors surface before any remote call. A failed call ends
/// the sequence with the normalized error and the progress made so far;
/// nothing is retried here.
pub async fn invoke_paginated<C, F>(
    client: &C,
    descriptor: &OperationDescriptor,
    params: &BoundParams,
    options: &InvokeOptions,
    mut emit: F,
) -> std::result::Result<PaginationOutcome, InvocationFailure>
where
    C: RemoteClient,
    F: FnMut(Page),
{
    let mode = pagination_mode(descriptor, params);
    let cursor_field = descriptor.cursor_field();
    let end_of_pages = descriptor
        .pagination
        .as_ref()
        .map(|p| p.end_of_pages)
        .unwrap_or_default();

    let mut outcome = PaginationOutcome {
        state: InvokerState::Start,
        mode,
        pages: 0,
        calls: 0,
        records: 0,
        last_cursor: None,
    };

    let base = match build_request(descriptor, params) {
        Ok(base) => base,
        Err(error) => {
            outcome.state = InvokerState::Failed;
            return Err(InvocationFailure { error, outcome });
        }
    };

    let mut cursor: Option<String> = match (mode, cursor_field) {
        (PaginationMode::Manual, Some(field)) => base.get(field).as_str().map(String::from),
        _ => None,
    };

    debug!(
        "Invoking {} ({:?} pagination, paginated: {})",
        descriptor.name,
        mode,
        descriptor.is_paginated()
    );

    loop {
        if options.cancel.is_cancelled() {
            debug!(
                "{} cancelled after {} page(s)",
                descriptor.name, outcome.pages
            );
            outcome.state = InvokerState::Cancelled;
            return Ok(outcome);
        }

        outcome.state = InvokerState::AwaitingResponse;
        let request = match cursor_field {
            Some(field) => base.with_cursor(field, cursor.as_deref()),
            None => base.clone(),
        };

        outcome.calls += 1;
        trace!("{} call #{} cursor={:?}", descriptor.name, outcome.calls, cursor);
        let envelope = match client.invoke(descriptor, &request).await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("{} failed on call #{}: {}", descriptor.name, outcome.calls, err);
                outcome.state = InvokerState::Failed;
                return Err(InvocationFailure {
                    error: client.normalize_error(descriptor, err),
                    outcome,
                });
            }
        };

        outcome.state = InvokerState::EmitPage;
        let mut page = unwrap_response(descriptor, envelope, &options.selector, params);
        outcome.pages += 1;
        outcome.records += page.record_count();
        outcome.last_cursor = page.cursor.clone();
        page.page_number = outcome.pages;
        let next = page.cursor.clone();
        emit(page);

        if mode == PaginationMode::Manual || cursor_field.is_none() {
            break;
        }
        if end_of_pages.is_exhausted(next.as_deref()) {
            break;
        }
        if next.is_some() && next == cursor {
            warn!(
                "{} returned the cursor it was sent ({:?}); stopping",
                descriptor.name, next
            );
            break;
        }

        outcome.state = InvokerState::Continue;
        cursor = next;
    }

    outcome.state = InvokerState::Done;
    debug!(
        "{} done: {} page(s), {} record(s)",
        descriptor.name, outcome.pages, outcome.records
    );
    Ok(outcome)
}

//! Pipeline execution
//!
//! Runs one invocation per input. A failure is reported for its own input
//! and the run moves on to the next one.

use super::descriptor::OperationDescriptor;
use super::invoker::{
    invoke_paginated, InvocationFailure, InvokeOptions, InvokerState, PaginationOutcome,
    RemoteClient,
};
use super::params::BoundParams;
use super::unwrap::Page;
use tracing::debug;

/// Something that happened while processing one input
#[derive(Debug)]
pub enum BatchEvent {
    Page(Page),
    Failed(InvocationFailure),
    Finished(PaginationOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Invoke `descriptor` once per input, reporting `(input index, event)`.
///
/// Cancellation stops the run: the current input finishes as cancelled and
/// no further inputs are started.
pub async fn run_batch<C, F>(
    client: &C,
    descriptor: &OperationDescriptor,
    inputs: &[BoundParams],
    options: &InvokeOptions,
    mut emit: F,
) -> BatchSummary
where
    C: RemoteClient,
    F: FnMut(usize, BatchEvent),
{
    let mut summary = BatchSummary::default();

    for (index, params) in inputs.iter().enumerate() {
        if options.cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let result = invoke_paginated(client, descriptor, params, options, |page| {
            emit(index, BatchEvent::Page(page))
        })
        .await;

        match result {
            Ok(outcome) => {
                let cancelled = outcome.state == InvokerState::Cancelled;
                if !cancelled {
                    summary.succeeded += 1;
                }
                emit(index, BatchEvent::Finished(outcome));
                if cancelled {
                    summary.cancelled = true;
                    break;
                }
            }
            Err(failure) => {
                debug!(
                    "{} input #{} failed after {} page(s): {}",
                    descriptor.name,
                    index + 1,
                    failure.outcome.pages,
                    failure.error
                );
                summary.failed += 1;
                emit(index, BatchEvent::Failed(failure));
            }
        }
    }

    summary
}

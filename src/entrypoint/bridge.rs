//! Request/response bridge between a connection task and a worker.
//!
//! # Responsibilities
//! - Read the request body in full and freeze the request
//! - Derive context data from headers
//! - Submit the call to the [`WorkerScheduler`] with a completion handler that
//!   deposits the outcome into a single-use slot
//! - Suspend the connection task on that slot and return the outcome
//!
//! # Design Decisions
//! - Nothing escapes: every path ends in a [`BridgeOutcome`]
//! - Failures before submission (body read, submission itself) are returned
//!   directly, without creating a wait
//! - The completion handler deposits before it returns, so a failure reported
//!   by the worker still reaches the waiter exactly once

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerOptions;
use crate::entrypoint::slot::{rendezvous, SlotError};
use crate::entrypoint::{Reply, ServiceError};
use crate::http::IncomingRequest;
use crate::worker::{
    CompletionHandler, ContextExtractor, EmptyContext, ServiceMethod, WorkerCall, WorkerContext,
    WorkerScheduler,
};

/// Result of one bridged call: the context (when a worker ran) and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOutcome {
    pub context: Option<WorkerContext>,
    pub result: Result<Reply, ServiceError>,
}

impl BridgeOutcome {
    fn failed(error: ServiceError) -> Self {
        Self {
            context: None,
            result: Err(error),
        }
    }
}

/// Shared by every handler bound to one web server.
#[derive(Clone)]
pub struct Bridge {
    scheduler: Arc<dyn WorkerScheduler>,
    extractor: Arc<dyn ContextExtractor>,
    wait_timeout: Option<Duration>,
    max_body_size: usize,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("wait_timeout", &self.wait_timeout)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// A bridge with no header extraction, no wait bound and the default body limit.
    pub fn new(scheduler: Arc<dyn WorkerScheduler>) -> Self {
        Self {
            scheduler,
            extractor: Arc::new(EmptyContext),
            wait_timeout: None,
            max_body_size: ServerOptions::default().max_body_size,
        }
    }

    /// A bridge configured from the server's engine options.
    pub fn from_options(
        scheduler: Arc<dyn WorkerScheduler>,
        extractor: Arc<dyn ContextExtractor>,
        options: &ServerOptions,
    ) -> Self {
        Self {
            scheduler,
            extractor,
            wait_timeout: options.worker_timeout_ms.map(Duration::from_millis),
            max_body_size: options.max_body_size,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Run `service` for `request` on a worker and wait for its outcome.
    pub async fn handle_request(
        &self,
        entrypoint: &str,
        service: &ServiceMethod,
        request: IncomingRequest,
    ) -> BridgeOutcome {
        let params = request.params().clone();
        let request = match request.materialize(self.max_body_size).await {
            Ok(request) => Arc::new(request),
            Err(e) => {
                tracing::debug!(entrypoint = %entrypoint, error = %e, "Request body rejected");
                return BridgeOutcome::failed(e);
            }
        };

        let context_data = self.extractor.extract(request.headers());
        let (slot, waiter) = rendezvous::<(WorkerContext, Result<Reply, ServiceError>)>();

        let on_complete: CompletionHandler = Box::new(move |context, outcome| {
            if slot.deposit((context, outcome.clone())).is_err() {
                tracing::debug!("Outcome arrived after the waiter left");
            }
            outcome
        });

        let call = WorkerCall {
            service: Arc::clone(service),
            request,
            params,
        };

        if let Err(e) = self.scheduler.spawn_worker(entrypoint, call, context_data, on_complete) {
            tracing::warn!(entrypoint = %entrypoint, error = %e, "Worker submission failed");
            return BridgeOutcome::failed(ServiceError::unexpected("WorkerSubmissionError", e.to_string()));
        }

        match waiter.wait(self.wait_timeout).await {
            Ok((context, result)) => BridgeOutcome {
                context: Some(context),
                result,
            },
            Err(SlotError::Abandoned) => {
                tracing::error!(entrypoint = %entrypoint, "Worker finished without an outcome");
                BridgeOutcome::failed(ServiceError::unexpected("WorkerLost", SlotError::Abandoned.to_string()))
            }
            Err(e @ SlotError::TimedOut(_)) => {
                tracing::warn!(entrypoint = %entrypoint, error = %e, "Worker outcome timed out");
                BridgeOutcome::failed(ServiceError::unexpected("WorkerTimeout", e.to_string()))
            }
        }
    }
}

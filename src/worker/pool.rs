//! Worker scheduling: the trait the bridge submits to, and a tokio-backed pool.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::config::WorkerConfig;
use crate::entrypoint::{Reply, ServiceError};
use crate::http::ServiceRequest;
use crate::routing::PathParams;
use crate::worker::context::{ContextData, WorkerContext};

/// Future returned by business logic.
pub type ServiceFuture = BoxFuture<'static, Result<Reply, ServiceError>>;

/// Business logic bound to an entrypoint.
pub type ServiceMethod = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

/// Called once per unit of work with its context and outcome; returns the
/// outcome to the scheduler.
pub type CompletionHandler = Box<
    dyn FnOnce(WorkerContext, Result<Reply, ServiceError>) -> Result<Reply, ServiceError> + Send,
>;

/// Arguments passed to business logic.
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub request: Arc<ServiceRequest>,
    pub params: PathParams,
    pub context: WorkerContext,
}

/// A unit of work as submitted by the bridge.
pub struct WorkerCall {
    pub service: ServiceMethod,
    pub request: Arc<ServiceRequest>,
    pub params: PathParams,
}

/// Adapt an async closure into a [`ServiceMethod`].
pub fn service<F, Fut>(f: F) -> ServiceMethod
where
    F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, ServiceError>> + Send + 'static,
{
    Arc::new(move |call| f(call).boxed())
}

/// The scheduler could not accept a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("worker pool is closed")]
    Closed,

    #[error("no async runtime available to run workers")]
    NoRuntime,
}

/// Runs business logic on its own unit of execution.
pub trait WorkerScheduler: Send + Sync {
    /// Start `call` for `entrypoint`. `on_complete` must be invoked exactly
    /// once if, and only if, this returns `Ok`.
    fn spawn_worker(
        &self,
        entrypoint: &str,
        call: WorkerCall,
        context_data: ContextData,
        on_complete: CompletionHandler,
    ) -> Result<(), SubmitError>;
}

/// Tokio-task worker pool bounded by `max_workers`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    service_name: Arc<str>,
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(service_name: impl Into<String>, config: &WorkerConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        Self {
            service_name: Arc::from(service_name.into()),
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Workers currently running business logic.
    pub fn active_workers(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }

    /// Refuse further submissions. Queued calls fail; running calls finish.
    pub fn close(&self) {
        self.permits.close();
        tracing::info!(service = %self.service_name, "Worker pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    fn new_call_id(&self, entrypoint: &str) -> String {
        format!("{}.{}.{}", self.service_name, entrypoint, uuid::Uuid::new_v4())
    }
}

impl WorkerScheduler for WorkerPool {
    fn spawn_worker(
        &self,
        entrypoint: &str,
        call: WorkerCall,
        context_data: ContextData,
        on_complete: CompletionHandler,
    ) -> Result<(), SubmitError> {
        if self.permits.is_closed() {
            return Err(SubmitError::Closed);
        }
        let runtime = Handle::try_current().map_err(|_| SubmitError::NoRuntime)?;

        let context = WorkerContext::new(self.new_call_id(entrypoint), context_data);
        let permits = Arc::clone(&self.permits);
        let entrypoint = entrypoint.to_string();

        runtime.spawn(async move {
            let call_id = context.call_id.clone();
            tracing::debug!(call_id = %call_id, entrypoint = %entrypoint, "Worker queued");

            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => run_service(call, context.clone()).await,
                Err(_) => Err(ServiceError::unexpected(
                    "WorkerPoolClosed",
                    "worker pool closed before the call could run",
                )),
            };

            match on_complete(context, outcome) {
                Ok(_) => tracing::debug!(call_id = %call_id, entrypoint = %entrypoint, "Worker finished"),
                Err(e) => tracing::warn!(
                    call_id = %call_id,
                    entrypoint = %entrypoint,
                    exc_type = e.exc_type(),
                    error = %e,
                    "Worker failed"
                ),
            }
        });

        Ok(())
    }
}

/// Run business logic, turning a panic into a failure.
async fn run_service(call: WorkerCall, context: WorkerContext) -> Result<Reply, ServiceError> {
    let WorkerCall { service, request, params } = call;
    let work = async move { service(ServiceCall { request, params, context }).await };

    AssertUnwindSafe(work)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ServiceError::from_panic(panic)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::IncomingRequest;
    use bytes::Bytes;
    use tokio::sync::oneshot;

    async fn call_with(service: ServiceMethod) -> WorkerCall {
        let request = http::Request::builder()
            .uri("/work")
            .body(Bytes::new())
            .unwrap();
        let request = IncomingRequest::buffered(request, PathParams::new())
            .materialize(1024)
            .await
            .unwrap();
        WorkerCall {
            service,
            request: Arc::new(request),
            params: PathParams::new(),
        }
    }

    fn pool() -> WorkerPool {
        WorkerPool::new("orders", &WorkerConfig { max_workers: 2 })
    }

    fn capture() -> (CompletionHandler, oneshot::Receiver<(WorkerContext, Result<Reply, ServiceError>)>) {
        let (tx, rx) = oneshot::channel();
        let handler: CompletionHandler = Box::new(move |context, outcome| {
            let _ = tx.send((context, outcome.clone()));
            outcome
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn runs_business_logic_with_a_fresh_call_id() {
        let pool = pool();
        let (on_complete, rx) = capture();
        let call = call_with(service(|call: ServiceCall| async move {
            Ok(Reply::from(call.request.path().to_string()))
        }))
        .await;

        let mut data = ContextData::new();
        data.insert("user".into(), "ada".into());
        pool.spawn_worker("create", call, data, on_complete).unwrap();

        let (context, outcome) = rx.await.unwrap();
        assert!(context.call_id.starts_with("orders.create."));
        assert_eq!(context.data["user"], "ada");
        assert_eq!(outcome, Ok(Reply::from("/work")));
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let pool = pool();
        let (on_complete, rx) = capture();
        let call = call_with(service(|_call: ServiceCall| async move {
            if true {
                panic!("boom");
            }
            Ok(Reply::from("unreachable"))
        }))
        .await;

        pool.spawn_worker("explode", call, ContextData::new(), on_complete).unwrap();

        let (_, outcome) = rx.await.unwrap();
        let err = outcome.unwrap_err();
        assert_eq!(err.exc_type(), "Panic");
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn closed_pool_rejects_submissions() {
        let pool = pool();
        pool.close();
        assert!(pool.is_closed());

        let (on_complete, _rx) = capture();
        let call = call_with(service(|_call: ServiceCall| async move { Ok(Reply::from("x")) })).await;
        assert_eq!(
            pool.spawn_worker("x", call, ContextData::new(), on_complete),
            Err(SubmitError::Closed)
        );
    }

    #[test]
    fn submitting_outside_a_runtime_fails() {
        let pool = pool();
        let (on_complete, _rx) = capture();
        let request = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let request = runtime
            .block_on(IncomingRequest::buffered(request, PathParams::new()).materialize(16))
            .unwrap();
        drop(runtime);

        let call = WorkerCall {
            service: service(|_call: ServiceCall| async move { Ok(Reply::from("x")) }),
            request: Arc::new(request),
            params: PathParams::new(),
        };
        assert_eq!(
            pool.spawn_worker("x", call, ContextData::new(), on_complete),
            Err(SubmitError::NoRuntime)
        );
    }
}

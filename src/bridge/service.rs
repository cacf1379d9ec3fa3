use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::task::Context;
use futures::task::Poll;
use futures::Future;
use tokio::task::JoinError;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::util::BoxService;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};
use tracing::{error, instrument};

use super::request::{BridgeRequest, BridgeResponse, Operation};
use crate::error::{BridgeError, ProcessorError};
use crate::processing::ProcessingService;

/// Runs each request on tokio's blocking pool.
#[derive(Clone)]
pub struct ProcessorService {
    inner: Arc<ProcessingService>,
}

impl ProcessorService {
    pub fn new(inner: Arc<ProcessingService>) -> Self {
        Self { inner }
    }
}

impl Service<BridgeRequest> for ProcessorService {
    type Response = BridgeResponse;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: BridgeRequest) -> Self::Future {
        let inner = self.inner.clone();
        let operation = req.operation();

        Box::pin(async move {
            match tokio::task::spawn_blocking(move || handle_request(&inner, req)).await {
                Ok(response) => response.map_err(BoxError::from),
                Err(join_error) => Err(worker_fault(operation, join_error).into()),
            }
        })
    }
}

fn handle_request(
    service: &ProcessingService,
    request: BridgeRequest,
) -> Result<BridgeResponse, ProcessorError> {
    match request {
        BridgeRequest::ProcessImage {
            image_path,
            use_gpu,
            output_path,
        } => {
            let outcome = service.process_image(&image_path, use_gpu)?;
            if let Some(output_path) = output_path {
                outcome.save_edges(&output_path)?;
            }
            Ok(BridgeResponse::Processed(outcome.result))
        }
        BridgeRequest::Benchmark {
            image_path,
            iterations,
        } => {
            let iterations = u32::try_from(iterations).map_err(|_| {
                ProcessorError::InvalidArgument(format!(
                    "iterations must be a positive integer (got {})",
                    iterations
                ))
            })?;
            service
                .benchmark_image(&image_path, iterations)
                .map(BridgeResponse::Benchmarked)
        }
    }
}

fn worker_fault(operation: Operation, join_error: JoinError) -> ProcessorError {
    let message = if join_error.is_panic() {
        let payload = join_error.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string())
    } else {
        join_error.to_string()
    };

    match operation {
        Operation::ProcessImage => ProcessorError::Processing(message),
        Operation::Benchmark => ProcessorError::Benchmark(message),
    }
}

fn to_bridge_error(operation: Operation, error: BoxError) -> BridgeError {
    if let Some(processor_error) = error.downcast_ref::<ProcessorError>() {
        BridgeError::from_processor(operation, processor_error)
    } else if error.is::<Elapsed>() {
        BridgeError::new(
            operation.failure_code(),
            format!("{} request timed out", operation),
        )
    } else {
        BridgeError::new(operation.failure_code(), error.to_string())
    }
}

/// Async boundary in front of a [`ProcessingService`].
///
/// Every failure comes back as a [`BridgeError`]; nothing escapes as a panic
/// or a raw error.
pub struct ProcessorBridge {
    service: BoxService<BridgeRequest, BridgeResponse, BoxError>,
}

impl ProcessorBridge {
    pub fn new(service: Arc<ProcessingService>) -> Self {
        Self::builder(service).build()
    }

    pub fn builder(service: Arc<ProcessingService>) -> ProcessorBridgeBuilder {
        ProcessorBridgeBuilder::new(service)
    }

    #[instrument(skip(self), fields(operation = %request.operation()))]
    pub async fn call(&mut self, request: BridgeRequest) -> Result<BridgeResponse, BridgeError> {
        let operation = request.operation();

        let response = match self.service.ready().await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };

        response.map_err(|e| {
            let bridge_error = to_bridge_error(operation, e);
            error!("Request failed: {}", bridge_error);
            bridge_error
        })
    }

    pub async fn process_image(
        &mut self,
        image_path: impl Into<std::path::PathBuf>,
        use_gpu: bool,
    ) -> Result<BridgeResponse, BridgeError> {
        self.call(BridgeRequest::process_image(image_path, use_gpu))
            .await
    }

    pub async fn benchmark(
        &mut self,
        image_path: impl Into<std::path::PathBuf>,
        iterations: i64,
    ) -> Result<BridgeResponse, BridgeError> {
        self.call(BridgeRequest::benchmark(image_path, iterations))
            .await
    }
}

pub struct ProcessorBridgeBuilder {
    service: Arc<ProcessingService>,
    request_timeout: Option<Duration>,
    concurrency_limit: Option<usize>,
}

impl ProcessorBridgeBuilder {
    pub fn new(service: Arc<ProcessingService>) -> Self {
        let request_timeout = service.configuration().bridge.timeout();
        Self {
            service,
            request_timeout,
            concurrency_limit: None,
        }
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    pub fn concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = Some(concurrency_limit);
        self
    }

    pub fn build(self) -> ProcessorBridge {
        let service = ServiceBuilder::new()
            .option_layer(self.request_timeout.map(TimeoutLayer::new))
            .option_layer(self.concurrency_limit.map(ConcurrencyLimitLayer::new))
            .service(ProcessorService::new(self.service));

        ProcessorBridge {
            service: BoxService::new(service),
        }
    }
}

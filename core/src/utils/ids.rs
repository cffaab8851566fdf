//! A request id generator to allow requests to the scheduler's small HTTP
//! surface to be tracked through logs.

use std::fmt;
use std::task::{Context, Poll};

use axum::extract::Request;
use serde::Serialize;
use tower::{Layer, Service};
use uuid::Uuid;

/// A uuidv4 attached to every inbound request.
#[derive(Serialize, Clone)]
pub struct ReqId(Uuid);

impl Default for ReqId {
    fn default() -> Self {
        ReqId(Uuid::new_v4())
    }
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request id middleware service.
#[derive(Clone, Debug)]
pub struct ReqIdService<S> {
    inner: S,
}

impl<S> ReqIdService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Service<Request>> Service<Request> for ReqIdService<S> {
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        req.extensions_mut().insert(ReqId::default());
        self.inner.call(req)
    }
}

/// The layer to apply the request id middleware with.
#[derive(Clone, Debug)]
pub struct ReqIdLayer;

impl<S> Layer<S> for ReqIdLayer {
    type Service = ReqIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReqIdService { inner }
    }
}

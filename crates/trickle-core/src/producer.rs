//! Stream producers
//!
//! A producer is the caller's function that issues the request. Some
//! callers need no input, others need exactly one parameter.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::error::{BoxError, StreamError};
use crate::source::{BoxResponse, StreamResponse};

pub type ResponseFuture = BoxFuture<'static, Result<BoxResponse, StreamError>>;

/// Issues the request for a session
pub enum StreamProducer<P = ()> {
    /// Takes no parameter
    Nullary(Arc<dyn Fn() -> ResponseFuture + Send + Sync>),
    /// Takes exactly one parameter
    Unary(Arc<dyn Fn(P) -> ResponseFuture + Send + Sync>),
}

impl<P> StreamProducer<P> {
    /// Producer that takes no parameter
    pub fn new<F, Fut, R, E>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: StreamResponse + 'static,
        E: Into<BoxError>,
    {
        Self::Nullary(Arc::new(move || boxed(f())))
    }

    /// Producer that takes one parameter per session
    pub fn with_param<F, Fut, R, E>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: StreamResponse + 'static,
        E: Into<BoxError>,
    {
        Self::Unary(Arc::new(move |param| boxed(f(param))))
    }

    pub fn takes_param(&self) -> bool {
        matches!(self, Self::Unary(_))
    }

    /// Invoke with or without the parameter depending on what was supplied
    pub fn invoke(&self, param: Option<P>) -> ResponseFuture {
        match (self, param) {
            (Self::Nullary(f), None) => f(),
            (Self::Nullary(f), Some(_)) => {
                debug!("Parameter ignored by zero-argument producer");
                f()
            }
            (Self::Unary(f), Some(param)) => f(param),
            (Self::Unary(_), None) => {
                async { Err::<BoxResponse, _>(StreamError::MissingParameter) }.boxed()
            }
        }
    }
}

fn boxed<Fut, R, E>(fut: Fut) -> ResponseFuture
where
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: StreamResponse + 'static,
    E: Into<BoxError>,
{
    async move {
        fut.await
            .map(|response| Box::new(response) as BoxResponse)
            .map_err(|e| StreamError::Transport(e.into()))
    }
    .boxed()
}

impl<P> Clone for StreamProducer<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Nullary(f) => Self::Nullary(Arc::clone(f)),
            Self::Unary(f) => Self::Unary(Arc::clone(f)),
        }
    }
}

impl<P> fmt::Debug for StreamProducer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nullary(_) => f.write_str("StreamProducer::Nullary"),
            Self::Unary(_) => f.write_str("StreamProducer::Unary"),
        }
    }
}

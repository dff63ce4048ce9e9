//! Request/handler dispatch.
//!
//! Every query and command is a plain struct implementing [`Request`]. The
//! [`Mediator`] routes it to the single [`Handler`] registered for its type.
//! Registration happens once at startup through [`MediatorBuilder`]; the
//! built mediator is immutable and shared behind an `Arc`.

use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

pub trait Request: Send + 'static {
    type Response: Send + 'static;

    /// Name used in spans and metric labels
    const NAME: &'static str;
}

#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R) -> Result<R::Response>;
}

/// Holds an `Arc<dyn Handler<R>>` for the request type it is keyed under
type ErasedHandler = Box<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct MediatorBuilder {
    handlers: HashMap<TypeId, ErasedHandler>,
    duplicates: Vec<&'static str>,
}

impl MediatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R, H>(mut self, handler: Arc<H>) -> Self
    where
        R: Request,
        H: Handler<R> + 'static,
    {
        let handler: Arc<dyn Handler<R>> = handler;
        if self
            .handlers
            .insert(TypeId::of::<R>(), Box::new(handler))
            .is_some()
        {
            self.duplicates.push(R::NAME);
        }
        self
    }

    pub fn build(self) -> Result<Mediator> {
        if let Some(name) = self.duplicates.first() {
            return Err(ServiceError::DuplicateHandler(*name));
        }
        debug!("Mediator built with {} handlers", self.handlers.len());
        Ok(Mediator {
            handlers: self.handlers,
        })
    }
}

pub struct Mediator {
    handlers: HashMap<TypeId, ErasedHandler>,
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response> {
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|h| h.downcast_ref::<Arc<dyn Handler<R>>>())
            .ok_or(ServiceError::UnhandledRequest(R::NAME))?;

        let started = Instant::now();
        let result = handler
            .handle(request)
            .instrument(info_span!("mediator", request = R::NAME))
            .await;

        crate::metrics::mediator::request_dispatched(R::NAME, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            debug!(request = R::NAME, error = %e, "Request failed");
        }
        result
    }
}

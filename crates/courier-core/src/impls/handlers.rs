//! Lifecycle handlers shipped with the engine.
//!
//! - `ResponseHandler`: hands the `Response` itself back to the caller.
//! - `DecodingHandler<T>`: decodes the body as JSON into `T`.
//!
//! Both run the descriptor's `on_success` / `on_error` / `on_progress` callbacks.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::domain::{EngineError, Progress, RequestDescriptor, Response};
use crate::ports::LifecycleHandler;

fn notify_progress(descriptor: &RequestDescriptor, progress: &Progress) {
    if let Some(on_progress) = descriptor.on_progress() {
        on_progress(progress);
    }
}

fn notify_error(descriptor: &RequestDescriptor, response: &Response, cause: &EngineError) {
    if let Some(on_error) = descriptor.on_error() {
        on_error(cause, response);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseHandler;

impl LifecycleHandler for ResponseHandler {
    type Output = Response;

    fn handle_success(
        &self,
        descriptor: &RequestDescriptor,
        response: Response,
    ) -> Result<Response, EngineError> {
        if let Some(on_success) = descriptor.on_success() {
            on_success(&response);
        }
        Ok(response)
    }

    fn handle_sync(
        &self,
        _descriptor: &RequestDescriptor,
        response: Response,
    ) -> Result<Response, EngineError> {
        Ok(response)
    }

    fn handle_error(&self, descriptor: &RequestDescriptor, response: &Response, cause: &EngineError) {
        notify_error(descriptor, response, cause);
    }

    fn handle_progress(&self, descriptor: &RequestDescriptor, progress: &Progress) {
        notify_progress(descriptor, progress);
    }
}

/// Decodes the response body as JSON.
///
/// A body that does not decode is reported as [`EngineError::Decode`], which
/// the engine routes to `handle_error`.
pub struct DecodingHandler<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DecodingHandler<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DecodingHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Send + 'static> LifecycleHandler for DecodingHandler<T> {
    type Output = T;

    fn handle_success(
        &self,
        descriptor: &RequestDescriptor,
        response: Response,
    ) -> Result<T, EngineError> {
        let value = response.json::<T>()?;
        if let Some(on_success) = descriptor.on_success() {
            on_success(&response);
        }
        Ok(value)
    }

    fn handle_sync(&self, _descriptor: &RequestDescriptor, response: Response) -> Result<T, EngineError> {
        response.json::<T>()
    }

    fn handle_error(&self, descriptor: &RequestDescriptor, response: &Response, cause: &EngineError) {
        notify_error(descriptor, response, cause);
    }

    fn handle_progress(&self, descriptor: &RequestDescriptor, progress: &Progress) {
        notify_progress(descriptor, progress);
    }
}

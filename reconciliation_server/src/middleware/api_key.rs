//! API key middleware for the ledger read API.
//!
//! Callers present the key as `Authorization: Bearer <key>`. When the server has no key configured, every request is
//! refused with 403 Forbidden, so the ledger is never readable by accident.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::future::{ok, Ready};
use log::{debug, warn};
use rec_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::constant_time_eq,
};

pub struct ApiKeyMiddlewareFactory {
    key: Option<Secret<String>>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Option<Secret<String>>) -> Self {
        ApiKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) })
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Option<Secret<String>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.clone();
        Box::pin(async move {
            check_api_key(&req, key.as_ref())?;
            service.call(req).await
        })
    }
}

fn check_api_key(req: &ServiceRequest, key: Option<&Secret<String>>) -> Result<(), ServerError> {
    let Some(key) = key else {
        debug!("💻️ Ledger API call refused. No API key is configured.");
        return Err(AuthError::ApiDisabled.into());
    };
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingApiKey)?;
    if constant_time_eq(provided, key.reveal()) {
        Ok(())
    } else {
        warn!("💻️ Ledger API call with an invalid API key for {}", req.path());
        Err(AuthError::InvalidApiKey.into())
    }
}

//! Per-request tracing span and completion log line.
//!
//! Webhook deliveries carry their `X-GitHub-Delivery` id in the span so a delivery can be
//! traced from the app's "Recent Deliveries" page to the server log. Health check endpoints are
//! logged at debug level only.

use std::future::{Ready, ready};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::StatusCode;
use futures_util::future::LocalBoxFuture;
use tracing::{Instrument, Level, debug, error, info, info_span, warn};

use crate::config::{GITHUB_DELIVERY_HEADER, GITHUB_EVENT_HEADER};

/// Paths polled by orchestrators; not worth an info line per hit.
const HEALTH_CHECK_PATHS: [&str; 2] = ["/api/v1/health", "/api/v1/ready"];

/// Middleware factory, registered with `App::wrap`.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggedService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggedService { inner: service }))
    }
}

pub struct LoggedService<S> {
    inner: S,
}

fn header(req: &ServiceRequest, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn completion_level(status: StatusCode, health_check: bool) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else if health_check {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

impl<S, B> Service<ServiceRequest> for LoggedService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let health_check = HEALTH_CHECK_PATHS.contains(&req.path());
        let span = info_span!(
            target: "api",
            "request",
            method = %req.method(),
            path = %req.path(),
            delivery = %header(&req, GITHUB_DELIVERY_HEADER),
            event = %header(&req, GITHUB_EVENT_HEADER),
        );

        let response = {
            let _entered = span.enter();
            debug!(
                target: "api",
                remote_addr = %req.connection_info().realip_remote_addr().unwrap_or("unknown"),
                "Request received"
            );
            self.inner.call(req)
        };

        Box::pin(
            async move {
                let res = response.await?;
                let status = res.status();
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let status_code = status.as_u16();
                match completion_level(status, health_check) {
                    Level::ERROR => {
                        error!(target: "api", status = status_code, elapsed_ms, "Request failed")
                    }
                    Level::WARN => {
                        warn!(target: "api", status = status_code, elapsed_ms, "Request rejected")
                    }
                    Level::DEBUG => {
                        debug!(target: "api", status = status_code, elapsed_ms, "Health check answered")
                    }
                    _ => info!(target: "api", status = status_code, elapsed_ms, "Request completed"),
                }

                Ok(res)
            }
            .instrument(span),
        )
    }
}

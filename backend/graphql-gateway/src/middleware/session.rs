//! Session cookie authentication middleware
//!
//! Resolves the caller's identity from the shared session store and stores a
//! [`RequestContext`] in the request extensions. Anything short of a valid,
//! signed cookie naming a session with a user yields the anonymous context.
//! Only a session store outage fails the request (503).

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use session_store::SessionManager;
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::metrics;

pub struct SessionAuth {
    sessions: SessionManager,
}

impl SessionAuth {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    sessions: SessionManager,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sessions = self.sessions.clone();

        Box::pin(async move {
            let cookie = req
                .cookie(sessions.cookie_name())
                .map(|c| c.value().to_string());

            let user_id = match sessions.resolve_identity(cookie.as_deref()).await {
                Ok(user_id) => user_id,
                Err(e) => {
                    metrics::record_session_resolution("unavailable");
                    error!(error = %e, "Session lookup failed");
                    return Err(actix_web::error::ErrorServiceUnavailable(
                        "Session store unavailable",
                    ));
                }
            };

            match &user_id {
                Some(id) => {
                    metrics::record_session_resolution("authenticated");
                    debug!(user_id = %id, "Request authenticated from session");
                }
                None => metrics::record_session_resolution("anonymous"),
            }

            req.extensions_mut().insert(RequestContext { user_id });
            service.call(req).await
        })
    }
}

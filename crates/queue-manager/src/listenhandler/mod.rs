//! # Listen Handler
//!
//! Answers RPC requests sent to this service's request queue. Routes are
//! matched on method and path; the query string only carries paging.
//!
//! | status | when |
//! |--------|------|
//! | 200 | handled |
//! | 400 | bad body, bad argument, status guard failed |
//! | 404 | unknown route or missing record |
//! | 500 | anything else |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::bus::{Method, Request, Response, RpcHandler};
use crate::error::{QueueError, Result};
use crate::queuecallhandler::QueuecallHandler;
use crate::queuehandler::QueueHandler;
use crate::util::parse_timestamp;

pub mod request;
mod v1_queuecalls;
mod v1_queues;
mod v1_services;

const PAGE_SIZE: &str = "page_size";
const PAGE_TOKEN: &str = "page_token";

const UUID_PATTERN: &str = "([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    QueuesGet,
    QueuesPost,
    QueuesIDGet,
    QueuesIDPut,
    QueuesIDDelete,
    QueuesIDTagIDsPut,
    QueuesIDRoutingMethodPut,
    QueuesIDAgentsGet,
    QueuesIDExecutePut,
    QueuesIDExecuteRunPost,

    QueuecallsGet,
    QueuecallsIDGet,
    QueuecallsIDDelete,
    QueuecallsIDTimeoutWaitPost,
    QueuecallsIDTimeoutServicePost,
    QueuecallsIDExecutePost,
    QueuecallsIDHealthCheckPost,
    QueuecallsIDStatusWaitingPost,
    QueuecallsIDKickPost,
    QueuecallsReferenceIDGet,
    QueuecallsReferenceIDKickPost,

    ServicesTypeQueuecallPost,
}

static ROUTES: Lazy<Vec<(Method, Regex, Route)>> = Lazy::new(|| {
    let table = [
        (Method::Get, "/v1/queues".to_string(), Route::QueuesGet),
        (Method::Post, "/v1/queues".to_string(), Route::QueuesPost),
        (Method::Get, format!("/v1/queues/{}", UUID_PATTERN), Route::QueuesIDGet),
        (Method::Put, format!("/v1/queues/{}", UUID_PATTERN), Route::QueuesIDPut),
        (Method::Delete, format!("/v1/queues/{}", UUID_PATTERN), Route::QueuesIDDelete),
        (Method::Put, format!("/v1/queues/{}/tag_ids", UUID_PATTERN), Route::QueuesIDTagIDsPut),
        (
            Method::Put,
            format!("/v1/queues/{}/routing_method", UUID_PATTERN),
            Route::QueuesIDRoutingMethodPut,
        ),
        (Method::Get, format!("/v1/queues/{}/agents", UUID_PATTERN), Route::QueuesIDAgentsGet),
        (Method::Put, format!("/v1/queues/{}/execute", UUID_PATTERN), Route::QueuesIDExecutePut),
        (
            Method::Post,
            format!("/v1/queues/{}/execute_run", UUID_PATTERN),
            Route::QueuesIDExecuteRunPost,
        ),
        (Method::Get, "/v1/queuecalls".to_string(), Route::QueuecallsGet),
        (Method::Get, format!("/v1/queuecalls/{}", UUID_PATTERN), Route::QueuecallsIDGet),
        (Method::Delete, format!("/v1/queuecalls/{}", UUID_PATTERN), Route::QueuecallsIDDelete),
        (
            Method::Post,
            format!("/v1/queuecalls/{}/timeout_wait", UUID_PATTERN),
            Route::QueuecallsIDTimeoutWaitPost,
        ),
        (
            Method::Post,
            format!("/v1/queuecalls/{}/timeout_service", UUID_PATTERN),
            Route::QueuecallsIDTimeoutServicePost,
        ),
        (
            Method::Post,
            format!("/v1/queuecalls/{}/execute", UUID_PATTERN),
            Route::QueuecallsIDExecutePost,
        ),
        (
            Method::Post,
            format!("/v1/queuecalls/{}/health-check", UUID_PATTERN),
            Route::QueuecallsIDHealthCheckPost,
        ),
        (
            Method::Post,
            format!("/v1/queuecalls/{}/status_waiting", UUID_PATTERN),
            Route::QueuecallsIDStatusWaitingPost,
        ),
        (Method::Post, format!("/v1/queuecalls/{}/kick", UUID_PATTERN), Route::QueuecallsIDKickPost),
        (
            Method::Get,
            format!("/v1/queuecalls/reference_id/{}", UUID_PATTERN),
            Route::QueuecallsReferenceIDGet,
        ),
        (
            Method::Post,
            format!("/v1/queuecalls/reference_id/{}/kick", UUID_PATTERN),
            Route::QueuecallsReferenceIDKickPost,
        ),
        (Method::Post, "/v1/services/type/queuecall".to_string(), Route::ServicesTypeQueuecallPost),
    ];

    table
        .into_iter()
        .filter_map(|(method, pattern, route)| match Regex::new(&format!("^{}$", pattern)) {
            Ok(re) => Some((method, re, route)),
            Err(e) => {
                error!("Invalid route pattern {}: {}", pattern, e);
                None
            }
        })
        .collect()
});

/// A request matched to a route.
struct Matched<'a> {
    route: Route,
    id: Uuid,
    query: Option<&'a str>,
}

fn match_route(method: Method, uri: &str) -> Option<Matched<'_>> {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };

    ROUTES.iter().find_map(|(m, re, route)| {
        if *m != method {
            return None;
        }
        let caps = re.captures(path)?;
        let id = caps
            .get(1)
            .and_then(|c| Uuid::parse_str(c.as_str()).ok())
            .unwrap_or_else(Uuid::nil);
        Some(Matched {
            route: *route,
            id,
            query,
        })
    })
}

/// Paging parameters of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Page {
    pub size: u64,
    pub token: Option<DateTime<Utc>>,
}

impl Page {
    fn parse(query: Option<&str>) -> Result<Self> {
        let mut page = Page::default();
        let Some(query) = query else {
            return Ok(page);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                PAGE_SIZE if !value.is_empty() => {
                    page.size = value.parse().map_err(|_| {
                        QueueError::invalid_argument(format!("invalid page size: {}", value))
                    })?;
                }
                PAGE_TOKEN if !value.is_empty() => {
                    page.token = Some(parse_timestamp(&value)?);
                }
                _ => {}
            }
        }
        Ok(page)
    }
}

/// Routes RPC requests to the queue and queuecall handlers.
pub struct ListenHandler {
    queue_handler: Arc<dyn QueueHandler>,
    queuecall_handler: Arc<dyn QueuecallHandler>,
}

impl ListenHandler {
    pub fn new(
        queue_handler: Arc<dyn QueueHandler>,
        queuecall_handler: Arc<dyn QueuecallHandler>,
    ) -> Self {
        Self {
            queue_handler,
            queuecall_handler,
        }
    }

    async fn dispatch(&self, matched: Matched<'_>, request: &Request) -> Result<Response> {
        let id = matched.id;
        match matched.route {
            Route::QueuesGet => self.v1_queues_get(Page::parse(matched.query)?, request).await,
            Route::QueuesPost => self.v1_queues_post(request).await,
            Route::QueuesIDGet => self.v1_queues_id_get(id).await,
            Route::QueuesIDPut => self.v1_queues_id_put(id, request).await,
            Route::QueuesIDDelete => self.v1_queues_id_delete(id).await,
            Route::QueuesIDTagIDsPut => self.v1_queues_id_tag_ids_put(id, request).await,
            Route::QueuesIDRoutingMethodPut => self.v1_queues_id_routing_method_put(id, request).await,
            Route::QueuesIDAgentsGet => self.v1_queues_id_agents_get(id, request).await,
            Route::QueuesIDExecutePut => self.v1_queues_id_execute_put(id, request).await,
            Route::QueuesIDExecuteRunPost => self.v1_queues_id_execute_run_post(id).await,

            Route::QueuecallsGet => self.v1_queuecalls_get(Page::parse(matched.query)?, request).await,
            Route::QueuecallsIDGet => self.v1_queuecalls_id_get(id).await,
            Route::QueuecallsIDDelete => self.v1_queuecalls_id_delete(id).await,
            Route::QueuecallsIDTimeoutWaitPost => self.v1_queuecalls_id_timeout_wait_post(id).await,
            Route::QueuecallsIDTimeoutServicePost => self.v1_queuecalls_id_timeout_service_post(id).await,
            Route::QueuecallsIDExecutePost => self.v1_queuecalls_id_execute_post(id, request).await,
            Route::QueuecallsIDHealthCheckPost => self.v1_queuecalls_id_health_check_post(id, request).await,
            Route::QueuecallsIDStatusWaitingPost => self.v1_queuecalls_id_status_waiting_post(id).await,
            Route::QueuecallsIDKickPost => self.v1_queuecalls_id_kick_post(id).await,
            Route::QueuecallsReferenceIDGet => self.v1_queuecalls_reference_id_get(id).await,
            Route::QueuecallsReferenceIDKickPost => self.v1_queuecalls_reference_id_kick_post(id).await,

            Route::ServicesTypeQueuecallPost => self.v1_services_type_queuecall_post(request).await,
        }
    }
}

#[async_trait]
impl RpcHandler for ListenHandler {
    async fn process_request(&self, request: Request) -> Response {
        debug!("Received request. method: {:?}, uri: {}", request.method, request.uri);

        let Some(matched) = match_route(request.method, &request.uri) else {
            warn!(
                "Could not find a handler for the request. method: {:?}, uri: {}",
                request.method, request.uri
            );
            return Response::error(404);
        };

        match self.dispatch(matched, &request).await {
            Ok(response) => response,
            Err(e) => {
                let status_code = e.status_code();
                if status_code >= 500 {
                    error!(
                        "Could not handle the request. method: {:?}, uri: {}, err: {}",
                        request.method, request.uri, e
                    );
                } else {
                    debug!(
                        "Request rejected. method: {:?}, uri: {}, status: {}, err: {}",
                        request.method, request.uri, status_code, e
                    );
                }
                error_response(&e)
            }
        }
    }
}

fn json_response<T: Serialize>(data: &T) -> Result<Response> {
    Response::json(data)
}

fn error_response(err: &QueueError) -> Response {
    let mut response = Response::error(err.status_code());
    response.data = serde_json::json!({ "message": err.to_string() });
    response
}

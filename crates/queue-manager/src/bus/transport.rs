//! Transport abstraction and the in-process implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Event, Request, Response};
use crate::error::{QueueError, Result};

const CHANNEL_CAPACITY: usize = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response.
    async fn request(&self, queue: &str, request: Request) -> Result<Response>;

    /// Deliver a request to `queue` after `delay`. Nobody waits for the
    /// response.
    async fn request_delayed(&self, queue: &str, request: Request, delay: Duration) -> Result<()>;

    /// Publish an event to every subscriber of `exchange`.
    async fn publish(&self, exchange: &str, event: Event) -> Result<()>;
}

/// Consumer side of an RPC queue.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn process_request(&self, request: Request) -> Response;
}

/// Consumer side of an event subscription.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn process_event(&self, event: Event);
}

struct Envelope {
    request: Request,
    reply: Option<oneshot::Sender<Response>>,
}

/// Tokio channel backed transport for a single process.
///
/// Each consumed queue gets a dispatcher that hands requests to at most
/// `workers` concurrent tasks. Delayed requests are held by a sleeping task
/// until they are due; stopping the transport drops those still pending.
pub struct LocalTransport {
    queues: DashMap<String, mpsc::Sender<Envelope>>,
    exchanges: DashMap<String, Vec<mpsc::Sender<Event>>>,
    cancel: CancellationToken,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            exchanges: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Start consuming requests sent to `queue`.
    pub fn consume_rpc(
        &self,
        queue: &str,
        handler: Arc<dyn RpcHandler>,
        workers: usize,
    ) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
        self.queues.insert(queue.to_string(), tx);

        let cancel = self.cancel.clone();
        let permits = Arc::new(Semaphore::new(workers.max(1)));
        let queue = queue.to_string();

        tokio::spawn(async move {
            debug!("Consuming requests on {}", queue);
            loop {
                let envelope = tokio::select! {
                    _ = cancel.cancelled() => break,
                    envelope = rx.recv() => match envelope {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    let response = handler.process_request(envelope.request).await;
                    if let Some(reply) = envelope.reply {
                        let _ = reply.send(response);
                    }
                    drop(permit);
                });
            }
            debug!("Stopped consuming requests on {}", queue);
        })
    }

    /// Start receiving events published to any of `exchanges`.
    pub fn subscribe(
        &self,
        exchanges: &[String],
        handler: Arc<dyn EventHandler>,
        workers: usize,
    ) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
        for exchange in exchanges {
            self.exchanges
                .entry(exchange.clone())
                .or_default()
                .push(tx.clone());
        }
        drop(tx);

        let cancel = self.cancel.clone();
        let permits = Arc::new(Semaphore::new(workers.max(1)));

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.process_event(event).await;
                    drop(permit);
                });
            }
        })
    }

    /// Stop all consumers and drop pending delayed requests.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.queues.clear();
        self.exchanges.clear();
    }

    fn sender(&self, queue: &str) -> Result<mpsc::Sender<Envelope>> {
        self.queues
            .get(queue)
            .map(|tx| tx.value().clone())
            .ok_or_else(|| QueueError::transport(format!("no consumer for queue {}", queue)))
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request(&self, queue: &str, request: Request) -> Result<Response> {
        let tx = self.sender(queue)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        tx.send(Envelope {
            request,
            reply: Some(reply_tx),
        })
        .await
        .map_err(|_| QueueError::transport(format!("queue {} is closed", queue)))?;

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(QueueError::transport(format!("queue {} dropped the request", queue))),
            Err(_) => Err(QueueError::transport(format!("request to {} timed out", queue))),
        }
    }

    async fn request_delayed(&self, queue: &str, request: Request, delay: Duration) -> Result<()> {
        // Fail now rather than after the delay when nobody consumes the queue.
        let tx = self.sender(queue)?;
        let cancel = self.cancel.clone();
        let queue = queue.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Dropped delayed request {} for {}", request.uri, queue);
                }
                _ = tokio::time::sleep(delay) => {
                    let uri = request.uri.clone();
                    if tx.send(Envelope { request, reply: None }).await.is_err() {
                        warn!("Could not deliver delayed request {} to {}", uri, queue);
                    }
                }
            }
        });
        Ok(())
    }

    async fn publish(&self, exchange: &str, event: Event) -> Result<()> {
        let subscribers = match self.exchanges.get(exchange) {
            Some(subscribers) => subscribers.value().clone(),
            None => return Ok(()),
        };

        for tx in subscribers {
            if tx.send(event.clone()).await.is_err() {
                error!("Subscriber of {} is gone, event {} not delivered", exchange, event.event_type);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Method;
    use parking_lot::Mutex;

    struct Echo;

    #[async_trait]
    impl RpcHandler for Echo {
        async fn process_request(&self, request: Request) -> Response {
            Response::json(&request.uri).unwrap()
        }
    }

    #[derive(Default)]
    struct Recorder {
        uris: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RpcHandler for Recorder {
        async fn process_request(&self, request: Request) -> Response {
            self.uris.lock().push(request.uri);
            Response::ok()
        }
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let transport = LocalTransport::new();
        transport.consume_rpc("svc", Arc::new(Echo), 2);

        let res = transport
            .request("svc", Request::new(Method::Get, "/v1/ping"))
            .await
            .unwrap();
        assert_eq!(res.into_result::<String>().unwrap(), "/v1/ping");
    }

    #[tokio::test]
    async fn test_request_to_unknown_queue_fails() {
        let transport = LocalTransport::new();
        let res = transport
            .request("nobody", Request::new(Method::Get, "/v1/ping"))
            .await;
        assert!(matches!(res, Err(QueueError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_request_waits_for_delay() {
        let transport = LocalTransport::new();
        let recorder = Arc::new(Recorder::default());
        transport.consume_rpc("svc", recorder.clone(), 1);

        transport
            .request_delayed("svc", Request::new(Method::Post, "/v1/later"), Duration::from_millis(1000))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(recorder.uris.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*recorder.uris.lock(), vec!["/v1/later".to_string()]);
    }
}

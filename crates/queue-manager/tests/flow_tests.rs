//! End-to-end tests over the in-process bus.
//!
//! The queue manager runs with its real store and handlers. The flow, call
//! and agent managers are small fakes consuming their request queues, and
//! peer events are published on the exchanges the service subscribes to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use rvoip_queue_manager::bus::requesthandler::{
    QUEUE_AGENT_MANAGER, QUEUE_CALL_MANAGER, QUEUE_FLOW_MANAGER,
};
use rvoip_queue_manager::bus::{
    Event, EventHandler, LocalTransport, Method, Request, Response, RpcHandler, Transport,
};
use rvoip_queue_manager::config::QueueManagerConfig;
use rvoip_queue_manager::models::{Queue, Queuecall, QueuecallStatus, Service};
use rvoip_queue_manager::server::{QueueManagerServer, QueueManagerServerBuilder};

const CALL_MANAGER_EVENTS: &str = "bin-manager.call-manager.event";

/// Records every request and answers from a fixed script.
struct FakePeer {
    requests: Mutex<Vec<Request>>,
    replies: Vec<(Method, &'static str, serde_json::Value)>,
}

impl FakePeer {
    fn new(replies: Vec<(Method, &'static str, serde_json::Value)>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            replies,
        })
    }

    fn received(&self, method: Method, uri: &str) -> bool {
        self.requests
            .lock()
            .iter()
            .any(|r| r.method == method && r.uri == uri)
    }
}

#[async_trait]
impl RpcHandler for FakePeer {
    async fn process_request(&self, request: Request) -> Response {
        self.requests.lock().push(request.clone());
        self.replies
            .iter()
            .find(|(method, prefix, _)| *method == request.method && request.uri.starts_with(*prefix))
            .map(|(_, _, body)| Response::json(body).unwrap())
            .unwrap_or_else(Response::ok)
    }
}

async fn wait_for_request(peer: &FakePeer, method: Method, uri: &str) {
    for _ in 0..100 {
        if peer.received(method, uri) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{:?} {} was never requested", method, uri);
}

#[derive(Default)]
struct EventCollector {
    types: Mutex<Vec<String>>,
}

#[async_trait]
impl EventHandler for EventCollector {
    async fn process_event(&self, event: Event) {
        self.types.lock().push(event.event_type);
    }
}

struct Harness {
    server: QueueManagerServer,
    transport: Arc<LocalTransport>,
    flow_manager: Arc<FakePeer>,
    call_manager: Arc<FakePeer>,
    events: Arc<EventCollector>,
    customer_id: Uuid,
    call_id: Uuid,
    confbridge_id: Uuid,
    agent_id: Uuid,
}

async fn start_harness(with_agent: bool) -> Harness {
    start_harness_with_workers(with_agent, QueueManagerConfig::default().general.worker_count).await
}

async fn start_harness_with_workers(with_agent: bool, workers: usize) -> Harness {
    let transport = Arc::new(LocalTransport::new());
    let customer_id = Uuid::new_v4();
    let call_id = Uuid::new_v4();
    let confbridge_id = Uuid::new_v4();
    let agent_id = Uuid::new_v4();

    let flow_manager = FakePeer::new(vec![(
        Method::Post,
        "/v1/flows",
        json!({ "id": Uuid::new_v4(), "customer_id": customer_id, "type": "queue" }),
    )]);
    let call_manager = FakePeer::new(vec![
        (
            Method::Get,
            "/v1/calls/",
            json!({
                "id": call_id,
                "customer_id": customer_id,
                "source": { "type": "tel", "target": "+821100000001" },
                "status": "progressing",
                "direction": "incoming",
            }),
        ),
        (
            Method::Post,
            "/v1/calls",
            json!([{ "id": Uuid::new_v4(), "customer_id": customer_id }]),
        ),
        (
            Method::Post,
            "/v1/confbridges",
            json!({ "id": confbridge_id, "customer_id": customer_id, "type": "connect" }),
        ),
    ]);
    let agents = if with_agent {
        json!([{ "id": agent_id, "customer_id": customer_id, "status": "available" }])
    } else {
        json!([])
    };
    let agent_manager = FakePeer::new(vec![(Method::Get, "/v1/agents", agents)]);

    transport.consume_rpc(QUEUE_FLOW_MANAGER, flow_manager.clone(), 4);
    transport.consume_rpc(QUEUE_CALL_MANAGER, call_manager.clone(), 4);
    transport.consume_rpc(QUEUE_AGENT_MANAGER, agent_manager, 4);

    let mut config = QueueManagerConfig::default();
    config.general.worker_count = workers;
    config.execution.execute_delay_ms = 10;
    config.execution.execute_retry_delay_ms = 20;
    config.execution.execute_start_delay_ms = 10;
    config.execution.health_check_delay_ms = 60_000;

    let events = Arc::new(EventCollector::default());
    transport.subscribe(&[config.general.event_queue.clone()], events.clone(), 1);

    let mut server = QueueManagerServerBuilder::new()
        .with_config(config)
        .with_in_memory_database()
        .with_transport(transport.clone())
        .build()
        .await
        .expect("server build failed");
    server.start().await.expect("server start failed");

    Harness {
        server,
        transport,
        flow_manager,
        call_manager,
        events,
        customer_id,
        call_id,
        confbridge_id,
        agent_id,
    }
}

impl Harness {
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        uri: String,
        body: serde_json::Value,
    ) -> T {
        let listen_queue = self.server.config().general.listen_queue.clone();
        let request = Request::new(method, uri).with_json(&body).unwrap();
        self.transport
            .request(&listen_queue, request)
            .await
            .unwrap()
            .into_result()
            .unwrap()
    }

    async fn create_queue(&self) -> Queue {
        self.call(
            Method::Post,
            "/v1/queues".to_string(),
            json!({
                "customer_id": self.customer_id,
                "name": "support",
                "detail": "support line",
                "routing_method": "random",
                "tag_ids": [Uuid::new_v4()],
                "wait_flow_id": Uuid::new_v4(),
                "wait_timeout": 0,
                "service_timeout": 0,
            }),
        )
        .await
    }

    async fn join_queue(&self, queue_id: Uuid) -> Service {
        self.call(
            Method::Post,
            "/v1/services/type/queuecall".to_string(),
            json!({
                "queue_id": queue_id,
                "activeflow_id": Uuid::new_v4(),
                "reference_type": "call",
                "reference_id": self.call_id,
            }),
        )
        .await
    }

    async fn queuecall(&self, id: Uuid) -> Queuecall {
        self.call(Method::Get, format!("/v1/queuecalls/{}", id), json!(null)).await
    }

    async fn queue(&self, id: Uuid) -> Queue {
        self.call(Method::Get, format!("/v1/queues/{}", id), json!(null)).await
    }

    async fn wait_for_status(&self, id: Uuid, status: QueuecallStatus) -> Queuecall {
        for _ in 0..100 {
            let qc = self.queuecall(id).await;
            if qc.status == status {
                return qc;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("queuecall {} never became {:?}", id, status);
    }

    async fn wait_for_queue<F: Fn(&Queue) -> bool>(&self, id: Uuid, done: F) -> Queue {
        for _ in 0..100 {
            let queue = self.queue(id).await;
            if done(&queue) {
                return queue;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("queue {} never reached the expected state", id);
    }

    async fn wait_for_event(&self, event_type: &str) {
        for _ in 0..100 {
            if self.events.types.lock().iter().any(|t| t == event_type) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("event {} was never published", event_type);
    }

    async fn publish_call_event(&self, event_type: &str, data: serde_json::Value) {
        let event = Event::new("call-manager", event_type, &data).unwrap();
        self.transport.publish(CALL_MANAGER_EVENTS, event).await.unwrap();
    }
}

#[tokio::test]
#[serial]
async fn test_call_is_dispatched_serviced_and_done() {
    let mut h = start_harness(true).await;
    let queue = h.create_queue().await;

    let service = h.join_queue(queue.id).await;
    assert_eq!(service.push_actions.len(), 3);
    let qc = h.queuecall(service.id).await;
    assert_eq!(qc.status, QueuecallStatus::Initiating);
    assert_eq!(qc.confbridge_id, h.confbridge_id);

    let _: Queuecall = h
        .call(
            Method::Post,
            format!("/v1/queuecalls/{}/status_waiting", qc.id),
            json!(null),
        )
        .await;

    let connecting = h.wait_for_status(qc.id, QueuecallStatus::Connecting).await;
    assert_eq!(connecting.service_agent_id, h.agent_id);
    wait_for_request(
        &h.flow_manager,
        Method::Put,
        &format!("/v1/activeflows/{}/forward_action_id", qc.reference_activeflow_id),
    )
    .await;

    h.publish_call_event(
        "confbridge_joined",
        json!({ "id": h.confbridge_id, "joined_call_id": h.call_id }),
    )
    .await;
    let serviced = h.wait_for_status(qc.id, QueuecallStatus::Service).await;
    assert!(serviced.duration_waiting >= 0);
    h.wait_for_queue(queue.id, |q| q.service_queuecall_ids == vec![qc.id]).await;

    h.publish_call_event(
        "call_hangup",
        json!({ "id": h.call_id, "customer_id": h.customer_id, "status": "hangup" }),
    )
    .await;
    h.wait_for_status(qc.id, QueuecallStatus::Done).await;

    let queue = h
        .wait_for_queue(queue.id, |q| q.service_queuecall_ids.is_empty())
        .await;
    assert_eq!(queue.total_incoming_count, 1);
    assert_eq!(queue.total_serviced_count, 1);
    assert!(queue.wait_queuecall_ids.is_empty());

    for expected in ["queuecall_created", "queuecall_waiting", "queuecall_serviced", "queuecall_done"] {
        h.wait_for_event(expected).await;
    }

    h.server.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_kick_waiting_call_abandons_it() {
    let mut h = start_harness(false).await;
    let queue = h.create_queue().await;
    let service = h.join_queue(queue.id).await;

    let _: Queuecall = h
        .call(
            Method::Post,
            format!("/v1/queuecalls/{}/status_waiting", service.id),
            json!(null),
        )
        .await;
    h.wait_for_queue(queue.id, |q| q.wait_queuecall_ids == vec![service.id])
        .await;

    let kicked: Queuecall = h
        .call(Method::Post, format!("/v1/queuecalls/{}/kick", service.id), json!(null))
        .await;
    assert_eq!(kicked.status, QueuecallStatus::Abandoned);

    let queue = h.wait_for_queue(queue.id, |q| q.wait_queuecall_ids.is_empty()).await;
    assert_eq!(queue.total_abandoned_count, 1);
    wait_for_request(
        &h.call_manager,
        Method::Delete,
        &format!("/v1/confbridges/{}", h.confbridge_id),
    )
    .await;

    h.server.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_single_worker_still_dispatches() {
    let mut h = start_harness_with_workers(true, 1).await;
    let queue = h.create_queue().await;
    let service = h.join_queue(queue.id).await;

    let _: Queuecall = h
        .call(
            Method::Post,
            format!("/v1/queuecalls/{}/status_waiting", service.id),
            json!(null),
        )
        .await;

    // well under the bus request timeout
    let connecting = h.wait_for_status(service.id, QueuecallStatus::Connecting).await;
    assert_eq!(connecting.service_agent_id, h.agent_id);

    h.server.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_unknown_route_is_not_found() {
    let mut h = start_harness(false).await;
    let listen_queue = h.server.config().general.listen_queue.clone();

    let response = h
        .transport
        .request(&listen_queue, Request::new(Method::Get, "/v1/queues/summary"))
        .await
        .unwrap();
    assert_eq!(response.status_code, 404);

    h.server.stop().await.unwrap();
}

//! Typed RPC client for peer services and for this service itself.
//!
//! Every timer in the queue core is a delayed request sent back to this
//! service's own request queue; the `queue_v1_*` methods with a `delay`
//! argument are those timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{Method, Request, Transport};
use crate::error::Result;
use crate::models::{
    Action, Address, Agent, AgentStatus, Call, Confbridge, ConfbridgeType, Flow, FlowType,
    Queuecall,
};

pub const QUEUE_FLOW_MANAGER: &str = "bin-manager.flow-manager.request";
pub const QUEUE_CALL_MANAGER: &str = "bin-manager.call-manager.request";
pub const QUEUE_AGENT_MANAGER: &str = "bin-manager.agent-manager.request";

/// Outbound requests the queue core depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    // flow engine
    async fn flow_v1_flow_create(
        &self,
        customer_id: Uuid,
        flow_type: FlowType,
        name: String,
        detail: String,
        actions: Vec<Action>,
        persist: bool,
    ) -> Result<Flow>;
    async fn flow_v1_flow_get(&self, flow_id: Uuid) -> Result<Flow>;
    async fn flow_v1_variable_set_variable(
        &self,
        activeflow_id: Uuid,
        variables: HashMap<String, String>,
    ) -> Result<()>;
    async fn flow_v1_variable_delete_variable(&self, activeflow_id: Uuid, key: String) -> Result<()>;
    async fn flow_v1_activeflow_update_forward_action_id(
        &self,
        activeflow_id: Uuid,
        forward_action_id: Uuid,
        forward_now: bool,
    ) -> Result<()>;
    async fn flow_v1_activeflow_service_stop(&self, activeflow_id: Uuid, service_id: Uuid) -> Result<()>;

    // telephony control
    async fn call_v1_call_create(
        &self,
        customer_id: Uuid,
        flow_id: Uuid,
        source: Address,
        destinations: Vec<Address>,
    ) -> Result<Vec<Call>>;
    async fn call_v1_call_get(&self, call_id: Uuid) -> Result<Call>;
    async fn call_v1_confbridge_create(
        &self,
        customer_id: Uuid,
        confbridge_type: ConfbridgeType,
        reference_type: String,
        reference_id: Uuid,
    ) -> Result<Confbridge>;
    async fn call_v1_confbridge_delete(&self, confbridge_id: Uuid) -> Result<()>;

    // agent registry
    async fn agent_v1_agent_list(
        &self,
        customer_id: Uuid,
        tag_ids: Vec<Uuid>,
        status: AgentStatus,
    ) -> Result<Vec<Agent>>;

    // this service
    async fn queue_v1_queue_execute_run(&self, queue_id: Uuid, delay: Duration) -> Result<()>;
    async fn queue_v1_queuecall_execute(&self, queuecall_id: Uuid, agent_id: Uuid) -> Result<Queuecall>;
    async fn queue_v1_queuecall_kick(&self, queuecall_id: Uuid) -> Result<Queuecall>;
    async fn queue_v1_queuecall_health_check(
        &self,
        queuecall_id: Uuid,
        delay: Duration,
        retry_count: u32,
    ) -> Result<()>;
    async fn queue_v1_queuecall_timeout_wait(&self, queuecall_id: Uuid, delay: Duration) -> Result<()>;
    async fn queue_v1_queuecall_timeout_service(&self, queuecall_id: Uuid, delay: Duration) -> Result<()>;
}

/// [`RequestHandler`] over a [`Transport`].
pub struct BusRequestHandler {
    transport: Arc<dyn Transport>,
    publisher: String,
    self_queue: String,
}

impl BusRequestHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        publisher: impl Into<String>,
        self_queue: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            publisher: publisher.into(),
            self_queue: self_queue.into(),
        }
    }

    fn request(&self, method: Method, uri: String) -> Request {
        Request::new(method, uri).with_publisher(self.publisher.clone())
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, queue: &str, request: Request) -> Result<T> {
        debug!("Sending request. queue: {}, method: {:?}, uri: {}", queue, request.method, request.uri);
        self.transport.request(queue, request).await?.into_result()
    }

    async fn send_no_content(&self, queue: &str, request: Request) -> Result<()> {
        debug!("Sending request. queue: {}, method: {:?}, uri: {}", queue, request.method, request.uri);
        self.transport.request(queue, request).await?.ensure_success()
    }

    async fn send_self_delayed(&self, request: Request, delay: Duration) -> Result<()> {
        debug!("Scheduling request. uri: {}, delay: {:?}", request.uri, delay);
        self.transport
            .request_delayed(&self.self_queue, request, delay)
            .await
    }
}

#[async_trait]
impl RequestHandler for BusRequestHandler {
    async fn flow_v1_flow_create(
        &self,
        customer_id: Uuid,
        flow_type: FlowType,
        name: String,
        detail: String,
        actions: Vec<Action>,
        persist: bool,
    ) -> Result<Flow> {
        let req = self.request(Method::Post, "/v1/flows".to_string()).with_json(&json!({
            "customer_id": customer_id,
            "type": flow_type,
            "name": name,
            "detail": detail,
            "actions": actions,
            "persist": persist,
        }))?;
        self.send(QUEUE_FLOW_MANAGER, req).await
    }

    async fn flow_v1_flow_get(&self, flow_id: Uuid) -> Result<Flow> {
        let req = self.request(Method::Get, format!("/v1/flows/{}", flow_id));
        self.send(QUEUE_FLOW_MANAGER, req).await
    }

    async fn flow_v1_variable_set_variable(
        &self,
        activeflow_id: Uuid,
        variables: HashMap<String, String>,
    ) -> Result<()> {
        let req = self
            .request(Method::Post, format!("/v1/variables/{}/variables", activeflow_id))
            .with_json(&json!({ "variables": variables }))?;
        self.send_no_content(QUEUE_FLOW_MANAGER, req).await
    }

    async fn flow_v1_variable_delete_variable(&self, activeflow_id: Uuid, key: String) -> Result<()> {
        let req = self.request(
            Method::Delete,
            format!("/v1/variables/{}/variables/{}", activeflow_id, key),
        );
        self.send_no_content(QUEUE_FLOW_MANAGER, req).await
    }

    async fn flow_v1_activeflow_update_forward_action_id(
        &self,
        activeflow_id: Uuid,
        forward_action_id: Uuid,
        forward_now: bool,
    ) -> Result<()> {
        let req = self
            .request(Method::Put, format!("/v1/activeflows/{}/forward_action_id", activeflow_id))
            .with_json(&json!({
                "forward_action_id": forward_action_id,
                "forward_now": forward_now,
            }))?;
        self.send_no_content(QUEUE_FLOW_MANAGER, req).await
    }

    async fn flow_v1_activeflow_service_stop(&self, activeflow_id: Uuid, service_id: Uuid) -> Result<()> {
        let req = self
            .request(Method::Post, format!("/v1/activeflows/{}/service_stop", activeflow_id))
            .with_json(&json!({ "service_id": service_id }))?;
        self.send_no_content(QUEUE_FLOW_MANAGER, req).await
    }

    async fn call_v1_call_create(
        &self,
        customer_id: Uuid,
        flow_id: Uuid,
        source: Address,
        destinations: Vec<Address>,
    ) -> Result<Vec<Call>> {
        let req = self.request(Method::Post, "/v1/calls".to_string()).with_json(&json!({
            "customer_id": customer_id,
            "flow_id": flow_id,
            "source": source,
            "destinations": destinations,
        }))?;
        self.send(QUEUE_CALL_MANAGER, req).await
    }

    async fn call_v1_call_get(&self, call_id: Uuid) -> Result<Call> {
        let req = self.request(Method::Get, format!("/v1/calls/{}", call_id));
        self.send(QUEUE_CALL_MANAGER, req).await
    }

    async fn call_v1_confbridge_create(
        &self,
        customer_id: Uuid,
        confbridge_type: ConfbridgeType,
        reference_type: String,
        reference_id: Uuid,
    ) -> Result<Confbridge> {
        let req = self
            .request(Method::Post, "/v1/confbridges".to_string())
            .with_json(&json!({
                "customer_id": customer_id,
                "type": confbridge_type,
                "reference_type": reference_type,
                "reference_id": reference_id,
            }))?;
        self.send(QUEUE_CALL_MANAGER, req).await
    }

    async fn call_v1_confbridge_delete(&self, confbridge_id: Uuid) -> Result<()> {
        let req = self.request(Method::Delete, format!("/v1/confbridges/{}", confbridge_id));
        self.send_no_content(QUEUE_CALL_MANAGER, req).await
    }

    async fn agent_v1_agent_list(
        &self,
        customer_id: Uuid,
        tag_ids: Vec<Uuid>,
        status: AgentStatus,
    ) -> Result<Vec<Agent>> {
        let mut filters = json!({
            "customer_id": customer_id,
            "tag_ids": tag_ids,
            "deleted": false,
        });
        if status != AgentStatus::None {
            filters["status"] = json!(status);
        }

        let req = self
            .request(Method::Get, "/v1/agents".to_string())
            .with_json(&filters)?;
        self.send(QUEUE_AGENT_MANAGER, req).await
    }

    async fn queue_v1_queue_execute_run(&self, queue_id: Uuid, delay: Duration) -> Result<()> {
        let req = self.request(Method::Post, format!("/v1/queues/{}/execute_run", queue_id));
        self.send_self_delayed(req, delay).await
    }

    async fn queue_v1_queuecall_execute(&self, queuecall_id: Uuid, agent_id: Uuid) -> Result<Queuecall> {
        let req = self
            .request(Method::Post, format!("/v1/queuecalls/{}/execute", queuecall_id))
            .with_json(&json!({ "agent_id": agent_id }))?;
        let queue = self.self_queue.clone();
        self.send(&queue, req).await
    }

    async fn queue_v1_queuecall_kick(&self, queuecall_id: Uuid) -> Result<Queuecall> {
        let req = self.request(Method::Post, format!("/v1/queuecalls/{}/kick", queuecall_id));
        let queue = self.self_queue.clone();
        self.send(&queue, req).await
    }

    async fn queue_v1_queuecall_health_check(
        &self,
        queuecall_id: Uuid,
        delay: Duration,
        retry_count: u32,
    ) -> Result<()> {
        let req = self
            .request(Method::Post, format!("/v1/queuecalls/{}/health-check", queuecall_id))
            .with_json(&json!({ "retry_count": retry_count }))?;
        self.send_self_delayed(req, delay).await
    }

    async fn queue_v1_queuecall_timeout_wait(&self, queuecall_id: Uuid, delay: Duration) -> Result<()> {
        let req = self.request(Method::Post, format!("/v1/queuecalls/{}/timeout_wait", queuecall_id));
        self.send_self_delayed(req, delay).await
    }

    async fn queue_v1_queuecall_timeout_service(&self, queuecall_id: Uuid, delay: Duration) -> Result<()> {
        let req = self.request(
            Method::Post,
            format!("/v1/queuecalls/{}/timeout_service", queuecall_id),
        );
        self.send_self_delayed(req, delay).await
    }
}

//! Record fixtures for unit tests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Address, AddressType, Execute, Queue, Queuecall, QueuecallStatus, ReferenceType, RoutingMethod,
};
use crate::util::default_timestamp;

pub(crate) fn queue(id: Uuid) -> Queue {
    let now = Utc::now();
    Queue {
        id,
        customer_id: Uuid::new_v4(),
        name: "test queue".to_string(),
        detail: "test queue detail".to_string(),
        routing_method: RoutingMethod::Random,
        tag_ids: vec![Uuid::new_v4()],
        execute: Execute::Run,
        wait_flow_id: Uuid::new_v4(),
        wait_timeout: 0,
        service_timeout: 0,
        wait_queuecall_ids: vec![],
        service_queuecall_ids: vec![],
        total_incoming_count: 0,
        total_serviced_count: 0,
        total_abandoned_count: 0,
        tm_create: now,
        tm_update: now,
        tm_delete: default_timestamp(),
    }
}

pub(crate) fn queuecall(id: Uuid, status: QueuecallStatus) -> Queuecall {
    let now = Utc::now();
    Queuecall {
        id,
        customer_id: Uuid::new_v4(),
        queue_id: Uuid::new_v4(),
        reference_type: ReferenceType::Call,
        reference_id: Uuid::new_v4(),
        reference_activeflow_id: Uuid::new_v4(),
        forward_action_id: Uuid::new_v4(),
        exit_action_id: Uuid::new_v4(),
        confbridge_id: Uuid::new_v4(),
        source: Address::new(AddressType::Tel, "+821100000001"),
        routing_method: RoutingMethod::Random,
        tag_ids: vec![],
        status,
        service_agent_id: Uuid::nil(),
        timeout_wait: 0,
        timeout_service: 0,
        duration_waiting: 0,
        duration_service: 0,
        tm_create: now,
        tm_service: default_timestamp(),
        tm_update: now,
        tm_end: default_timestamp(),
        tm_delete: default_timestamp(),
    }
}

pub(crate) fn at(ts: &str) -> DateTime<Utc> {
    crate::util::parse_timestamp(ts).unwrap_or_else(|e| panic!("bad fixture timestamp {}: {}", ts, e))
}

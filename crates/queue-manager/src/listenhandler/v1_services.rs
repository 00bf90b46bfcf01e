//! `/v1/services/type/queuecall`: a flow puts its caller into a queue.

use super::request::V1DataServicesTypeQueuecallPost;
use super::{json_response, ListenHandler};
use crate::bus::{Request, Response};
use crate::error::Result;

impl ListenHandler {
    /// POST /v1/services/type/queuecall, called by the flow engine when a
    /// call reaches a queue-join action.
    pub(super) async fn v1_services_type_queuecall_post(&self, request: &Request) -> Result<Response> {
        let req: V1DataServicesTypeQueuecallPost = request.parse_data()?;
        let res = self
            .queuecall_handler
            .service_start(req.queue_id, req.activeflow_id, req.reference_type, req.reference_id)
            .await?;
        json_response(&res)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;
    use uuid::Uuid;

    use crate::bus::{Method, Request, RpcHandler};
    use crate::error::QueueError;
    use crate::listenhandler::ListenHandler;
    use crate::models::{ReferenceType, Service, ServiceType};
    use crate::queuecallhandler::MockQueuecallHandler;
    use crate::queuehandler::MockQueueHandler;

    #[tokio::test]
    async fn test_service_start() {
        let (queue_id, activeflow_id, call_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut qch = MockQueuecallHandler::new();
        qch.expect_service_start()
            .with(eq(queue_id), eq(activeflow_id), eq(ReferenceType::Call), eq(call_id))
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Service {
                    id: Uuid::new_v4(),
                    service_type: ServiceType::Queuecall,
                    push_actions: vec![],
                })
            });

        let h = ListenHandler::new(Arc::new(MockQueueHandler::new()), Arc::new(qch));
        let req = Request::new(Method::Post, "/v1/services/type/queuecall")
            .with_json(&serde_json::json!({
                "queue_id": queue_id,
                "activeflow_id": activeflow_id,
                "reference_type": "call",
                "reference_id": call_id,
            }))
            .unwrap();
        let res = h.process_request(req).await;
        let service: Service = res.into_result().unwrap();
        assert_eq!(service.service_type, ServiceType::Queuecall);
    }

    #[tokio::test]
    async fn test_service_start_unsupported_reference_is_400() {
        let mut qch = MockQueuecallHandler::new();
        qch.expect_service_start()
            .returning(|_, _, _, _| Err(QueueError::unsupported("reference type unknown cannot join a queue")));

        let h = ListenHandler::new(Arc::new(MockQueueHandler::new()), Arc::new(qch));
        let req = Request::new(Method::Post, "/v1/services/type/queuecall")
            .with_json(&serde_json::json!({ "reference_type": "sms" }))
            .unwrap();
        assert_eq!(h.process_request(req).await.status_code, 400);
    }
}

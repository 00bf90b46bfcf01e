//! Entry of a call into a queue: confbridge, queuecall record and the
//! wait-loop actions pushed onto the caller's activeflow.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::db::NewQueuecall;
use super::QueuecallHandlerImpl;
use crate::error::{QueueError, Result, ResultExt};
use crate::models::flow::ACTION_ID_NEXT;
use crate::models::{Action, ConfbridgeType, ReferenceType, Service, ServiceType};

/// Reference type the confbridge is created under.
const CONFBRIDGE_REFERENCE_TYPE: &str = "queuecall";

impl QueuecallHandlerImpl {
    pub(super) async fn start_service(
        &self,
        queue_id: Uuid,
        activeflow_id: Uuid,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Service> {
        if reference_type != ReferenceType::Call {
            return Err(QueueError::unsupported(format!(
                "reference type {} cannot join a queue",
                reference_type.as_str()
            )));
        }

        let queue = self.db.queue_get(queue_id).await.context("start queuecall service")?;
        let call = self
            .req
            .call_v1_call_get(reference_id)
            .await
            .context("start queuecall service")?;

        // The confbridge is keyed by the queuecall, so the id comes first.
        let id = Uuid::new_v4();
        let confbridge = self
            .req
            .call_v1_confbridge_create(
                queue.customer_id,
                ConfbridgeType::Connect,
                CONFBRIDGE_REFERENCE_TYPE.to_string(),
                id,
            )
            .await
            .context("start queuecall service")?;
        debug!("Created confbridge. queuecall_id: {}, confbridge_id: {}", id, confbridge.id);

        // fetch wait flow -> loop marker (back to fetch) -> join confbridge
        let fetch = Action::fetch_flow(queue.wait_flow_id);
        let marker = Action::empty(fetch.id);
        let join = Action::confbridge_join(confbridge.id);
        let forward_action_id = join.id;
        let actions = vec![fetch, marker, join];

        let created = self
            .create(
                &queue,
                NewQueuecall {
                    id,
                    reference_type,
                    reference_id,
                    reference_activeflow_id: activeflow_id,
                    forward_action_id,
                    exit_action_id: ACTION_ID_NEXT,
                    confbridge_id: confbridge.id,
                    source: call.customer_address(),
                },
            )
            .await;
        let qc = match created {
            Ok(qc) => qc,
            Err(e) => {
                if let Err(del_err) = self.req.call_v1_confbridge_delete(confbridge.id).await {
                    warn!(
                        "Could not delete the confbridge of a failed queuecall. queuecall_id: {}, confbridge_id: {}, err: {}",
                        id, confbridge.id, del_err
                    );
                }
                return Err(e);
            }
        };
        info!(
            "Started queuecall service. queuecall_id: {}, queue_id: {}, call_id: {}",
            qc.id, queue.id, reference_id
        );

        Ok(Service {
            id: qc.id,
            service_type: ServiceType::Queuecall,
            push_actions: actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::models::{ActionType, Address, AddressType, Call, CallDirection, Confbridge, QueuecallStatus};
    use crate::queuecallhandler::test_support::Mocks;
    use crate::queuecallhandler::QueuecallHandler;
    use crate::testutil;

    #[tokio::test]
    async fn test_service_start_builds_wait_loop() {
        let queue = testutil::queue(Uuid::new_v4());
        let queue_id = queue.id;
        let wait_flow_id = queue.wait_flow_id;
        let activeflow_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let confbridge_id = Uuid::new_v4();
        let call = Call {
            id: call_id,
            customer_id: queue.customer_id,
            source: Address::new(AddressType::Tel, "+821100000001"),
            destination: Address::new(AddressType::Tel, "+821100000002"),
            direction: CallDirection::Incoming,
            ..Default::default()
        };

        let mut mocks = Mocks::new();
        mocks.clock.expect_now().return_const(chrono::Utc::now());
        mocks
            .db
            .expect_queue_get()
            .with(eq(queue_id))
            .returning(move |_| Ok(queue.clone()));
        mocks
            .req
            .expect_call_v1_call_get()
            .with(eq(call_id))
            .returning(move |_| Ok(call.clone()));
        mocks
            .req
            .expect_call_v1_confbridge_create()
            .withf(|_, t, rt, _| *t == ConfbridgeType::Connect && rt == CONFBRIDGE_REFERENCE_TYPE)
            .times(1)
            .returning(move |customer_id, _, reference_type, reference_id| {
                Ok(Confbridge {
                    id: confbridge_id,
                    customer_id,
                    confbridge_type: ConfbridgeType::Connect,
                    reference_type,
                    reference_id,
                })
            });
        let created = std::sync::Arc::new(std::sync::Mutex::new(None));
        let record = created.clone();
        mocks
            .db
            .expect_queuecall_create()
            .withf(move |qc| {
                *record.lock().unwrap() = Some(qc.id);
                qc.confbridge_id == confbridge_id
                    && qc.reference_id == call_id
                    && qc.reference_activeflow_id == activeflow_id
                    && qc.exit_action_id == ACTION_ID_NEXT
                    && qc.source.target == "+821100000001"
            })
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .db
            .expect_queuecall_get()
            .returning(|id| Ok(testutil::queuecall(id, QueuecallStatus::Initiating)));
        mocks.notify.expect_publish_event().return_const(());
        mocks
            .req
            .expect_flow_v1_variable_set_variable()
            .returning(|_, _| Ok(()));
        mocks
            .req
            .expect_queue_v1_queuecall_health_check()
            .returning(|_, _, _| Ok(()));

        let res = mocks
            .build()
            .service_start(queue_id, activeflow_id, ReferenceType::Call, call_id)
            .await
            .unwrap();

        assert_eq!(Some(res.id), *created.lock().unwrap());
        assert_eq!(res.service_type, ServiceType::Queuecall);
        assert_eq!(res.push_actions.len(), 3);

        let (fetch, marker, join) = (&res.push_actions[0], &res.push_actions[1], &res.push_actions[2]);
        assert_eq!(fetch.action_type, ActionType::FetchFlow);
        assert_eq!(fetch.option["flow_id"], serde_json::json!(wait_flow_id));
        assert_eq!(marker.action_type, ActionType::Empty);
        assert_eq!(marker.next_id, fetch.id);
        assert_eq!(join.action_type, ActionType::ConfbridgeJoin);
        assert_eq!(join.option["confbridge_id"], serde_json::json!(confbridge_id));
    }

    #[tokio::test]
    async fn test_service_start_releases_confbridge_when_create_fails() {
        let queue = testutil::queue(Uuid::new_v4());
        let queue_id = queue.id;
        let confbridge_id = Uuid::new_v4();

        let mut mocks = Mocks::new();
        mocks.clock.expect_now().return_const(chrono::Utc::now());
        mocks.db.expect_queue_get().returning(move |_| Ok(queue.clone()));
        mocks
            .req
            .expect_call_v1_call_get()
            .returning(|id| Ok(Call { id, ..Default::default() }));
        mocks
            .req
            .expect_call_v1_confbridge_create()
            .times(1)
            .returning(move |customer_id, confbridge_type, reference_type, reference_id| {
                Ok(Confbridge {
                    id: confbridge_id,
                    customer_id,
                    confbridge_type,
                    reference_type,
                    reference_id,
                })
            });
        mocks
            .db
            .expect_queuecall_create()
            .times(1)
            .returning(|_| Err(QueueError::Database(sqlx::Error::PoolTimedOut)));
        mocks.db.expect_queuecall_get().never();
        mocks
            .req
            .expect_call_v1_confbridge_delete()
            .with(eq(confbridge_id))
            .times(1)
            .returning(|_| Ok(()));

        let res = mocks
            .build()
            .service_start(queue_id, Uuid::new_v4(), ReferenceType::Call, Uuid::new_v4())
            .await;
        assert!(matches!(res, Err(QueueError::Database(_))));
    }

    #[tokio::test]
    async fn test_service_start_rejects_non_call_reference() {
        let mut mocks = Mocks::new();
        mocks.db.expect_queue_get().never();

        let res = mocks
            .build()
            .service_start(Uuid::new_v4(), Uuid::new_v4(), ReferenceType::Unknown, Uuid::new_v4())
            .await;
        assert!(matches!(res, Err(QueueError::Unsupported(_))));
    }
}

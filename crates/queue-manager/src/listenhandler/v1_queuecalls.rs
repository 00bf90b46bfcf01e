//! `/v1/queuecalls` routes.

use uuid::Uuid;

use super::request::{V1DataQueuecallsIDExecutePost, V1DataQueuecallsIDHealthCheckPost};
use super::{json_response, ListenHandler, Page};
use crate::bus::{Request, Response};
use crate::database::QueuecallFilter;
use crate::error::Result;

impl ListenHandler {
    /// GET /v1/queuecalls?page_size=&page_token=, filters in the body.
    pub(super) async fn v1_queuecalls_get(&self, page: Page, request: &Request) -> Result<Response> {
        let filter: QueuecallFilter = request.parse_data()?;
        let res = self
            .queuecall_handler
            .list(page.size, page.token, filter)
            .await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_id_get(&self, id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.get(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_id_delete(&self, id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.delete(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_id_timeout_wait_post(&self, id: Uuid) -> Result<Response> {
        self.queuecall_handler.timeout_wait(id).await?;
        Ok(Response::ok())
    }

    pub(super) async fn v1_queuecalls_id_timeout_service_post(&self, id: Uuid) -> Result<Response> {
        self.queuecall_handler.timeout_service(id).await?;
        Ok(Response::ok())
    }

    pub(super) async fn v1_queuecalls_id_execute_post(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuecallsIDExecutePost = request.parse_data()?;
        let res = self.queuecall_handler.execute(id, req.agent_id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_id_health_check_post(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuecallsIDHealthCheckPost = request.parse_data()?;
        self.queuecall_handler.health_check(id, req.retry_count).await?;
        Ok(Response::ok())
    }

    pub(super) async fn v1_queuecalls_id_status_waiting_post(&self, id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.update_status_waiting(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_id_kick_post(&self, id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.kick(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_reference_id_get(&self, reference_id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.get_by_reference_id(reference_id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queuecalls_reference_id_kick_post(&self, reference_id: Uuid) -> Result<Response> {
        let res = self.queuecall_handler.kick_by_reference_id(reference_id).await?;
        json_response(&res)
    }
}

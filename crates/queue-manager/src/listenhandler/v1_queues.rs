//! `/v1/queues` routes, including the dispatch loop's `execute_run`.

use uuid::Uuid;

use super::request::{
    V1DataQueuesIDAgentsGet, V1DataQueuesIDExecutePut, V1DataQueuesIDPut, V1DataQueuesIDRoutingMethodPut,
    V1DataQueuesIDTagIDsPut, V1DataQueuesPost,
};
use super::{json_response, ListenHandler, Page};
use crate::bus::{Request, Response};
use crate::database::QueueFilter;
use crate::error::Result;

impl ListenHandler {
    /// GET /v1/queues?page_size=&page_token=, filters in the body.
    pub(super) async fn v1_queues_get(&self, page: Page, request: &Request) -> Result<Response> {
        let filter: QueueFilter = request.parse_data()?;
        let res = self.queue_handler.list(page.size, page.token, filter).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_post(&self, request: &Request) -> Result<Response> {
        let req: V1DataQueuesPost = request.parse_data()?;
        let res = self
            .queue_handler
            .create(
                req.customer_id,
                req.name,
                req.detail,
                req.routing_method,
                req.tag_ids,
                req.wait_flow_id,
                req.wait_timeout,
                req.service_timeout,
            )
            .await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_get(&self, id: Uuid) -> Result<Response> {
        let res = self.queue_handler.get(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_put(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuesIDPut = request.parse_data()?;
        let res = self
            .queue_handler
            .update_basic_info(
                id,
                req.name,
                req.detail,
                req.routing_method,
                req.tag_ids,
                req.wait_flow_id,
                req.wait_timeout,
                req.service_timeout,
            )
            .await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_delete(&self, id: Uuid) -> Result<Response> {
        let res = self.queue_handler.delete(id).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_tag_ids_put(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuesIDTagIDsPut = request.parse_data()?;
        let res = self.queue_handler.update_tag_ids(id, req.tag_ids).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_routing_method_put(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuesIDRoutingMethodPut = request.parse_data()?;
        let res = self
            .queue_handler
            .update_routing_method(id, req.routing_method)
            .await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_agents_get(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuesIDAgentsGet = request.parse_data()?;
        let res = self.queue_handler.get_agents(id, req.status).await?;
        json_response(&res)
    }

    pub(super) async fn v1_queues_id_execute_put(&self, id: Uuid, request: &Request) -> Result<Response> {
        let req: V1DataQueuesIDExecutePut = request.parse_data()?;
        let res = self.queue_handler.update_execute(id, req.execute).await?;
        json_response(&res)
    }

    /// One step of the dispatch loop. The loop reports through its own
    /// logs; the caller only needs the acknowledgement.
    ///
    /// The step runs on its own task so it holds no worker while it makes
    /// requests back to this service.
    pub(super) async fn v1_queues_id_execute_run_post(&self, id: Uuid) -> Result<Response> {
        let queue_handler = self.queue_handler.clone();
        tokio::spawn(async move {
            queue_handler.execute(id).await;
        });
        Ok(Response::ok())
    }
}

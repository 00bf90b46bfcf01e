//! # Dispatch Loop
//!
//! One step per invocation. A step runs for a queue only when no other step
//! for it is running in this process; a concurrent invocation is dropped
//! and relies on the running step to re-arm.
//!
//! The step result decides the next delay, see [`ExecuteOutcome::next_delay`].

use std::time::Duration;

use dashmap::DashSet;
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::QueueHandlerImpl;
use crate::models::{Agent, AgentStatus, Execute, Queue, Queuecall, RoutingMethod};

/// What one step of the dispatch loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Another step for the queue is running in this process
    Skipped,
    /// The queue is switched off or could not be loaded
    Stopped,
    /// Nobody is waiting; the loop switched itself off
    Idle,
    /// A waiting queuecall showed up while switching off; the loop continues
    Resumed,
    /// Waiting queuecalls but no free agent
    NoAgent,
    /// A queuecall was handed to an agent or sent out of the queue
    Dispatched,
    /// A downstream step failed
    Failed,
}

impl ExecuteOutcome {
    /// Delay before the next step, `None` when the loop ends here.
    pub fn next_delay(&self, short: Duration, retry: Duration) -> Option<Duration> {
        match self {
            ExecuteOutcome::Skipped | ExecuteOutcome::Stopped | ExecuteOutcome::Idle => None,
            ExecuteOutcome::Resumed | ExecuteOutcome::Dispatched => Some(short),
            ExecuteOutcome::NoAgent | ExecuteOutcome::Failed => Some(retry),
        }
    }
}

/// Marks a queue as executing for as long as it lives.
struct ExecutionGuard<'a> {
    executing: &'a DashSet<Uuid>,
    id: Uuid,
}

impl<'a> ExecutionGuard<'a> {
    fn acquire(executing: &'a DashSet<Uuid>, id: Uuid) -> Option<Self> {
        executing.insert(id).then(|| Self { executing, id })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.executing.remove(&self.id);
    }
}

impl QueueHandlerImpl {
    pub(super) async fn execute_step(&self, id: Uuid) -> ExecuteOutcome {
        let outcome = {
            let Some(_guard) = ExecutionGuard::acquire(&self.executing, id) else {
                debug!("Queue is already executing. queue_id: {}", id);
                return ExecuteOutcome::Skipped;
            };
            self.execute_once(id).await
        };
        debug!("Queue execute step finished. queue_id: {}, outcome: {:?}", id, outcome);

        let next = outcome.next_delay(
            self.config.execute_delay(),
            self.config.execute_retry_delay(),
        );
        if let Some(delay) = next {
            if let Err(e) = self.req.queue_v1_queue_execute_run(id, delay).await {
                error!("Could not re-arm the queue execution. queue_id: {}, err: {}", id, e);
            }
        }

        outcome
    }

    async fn execute_once(&self, id: Uuid) -> ExecuteOutcome {
        let queue = match self.db.queue_get(id).await {
            Ok(queue) => queue,
            Err(e) => {
                warn!("Could not get the queue, stopping execution. queue_id: {}, err: {}", id, e);
                if let Err(e) = self.db.queue_set_execute(id, Execute::Stop).await {
                    debug!("Could not stop the queue execution. queue_id: {}, err: {}", id, e);
                }
                return ExecuteOutcome::Stopped;
            }
        };
        if queue.execute == Execute::Stop || queue.is_deleted() {
            debug!("Queue execution is stopped. queue_id: {}", id);
            return ExecuteOutcome::Stopped;
        }

        let queuecall = match self.db.queuecall_get_oldest_waiting(id).await {
            Ok(queuecall) => queuecall,
            Err(e) if e.is_not_found() => return self.stop_when_empty(&queue).await,
            Err(e) => {
                error!("Could not get the waiting queuecall. queue_id: {}, err: {}", id, e);
                return ExecuteOutcome::Failed;
            }
        };

        if queue.routing_method != RoutingMethod::Random {
            return self.send_out_of_queue(&queue, &queuecall).await;
        }

        let agents = match self
            .req
            .agent_v1_agent_list(queue.customer_id, queue.tag_ids.clone(), AgentStatus::Available)
            .await
        {
            Ok(agents) => agents,
            Err(e) => {
                error!("Could not get available agents. queue_id: {}, err: {}", id, e);
                return ExecuteOutcome::Failed;
            }
        };

        let Some(agent) = pick_agent(queue.routing_method, &agents) else {
            debug!("No available agent. queue_id: {}", id);
            return ExecuteOutcome::NoAgent;
        };

        match self.req.queue_v1_queuecall_execute(queuecall.id, agent.id).await {
            Ok(res) => {
                info!(
                    "Dispatched queuecall. queue_id: {}, queuecall_id: {}, agent_id: {}, status: {}",
                    id,
                    res.id,
                    agent.id,
                    res.status.as_str()
                );
                ExecuteOutcome::Dispatched
            }
            Err(e) => {
                error!(
                    "Could not execute the queuecall. queue_id: {}, queuecall_id: {}, err: {}",
                    id, queuecall.id, e
                );
                ExecuteOutcome::Failed
            }
        }
    }

    /// Switch the loop off, then look once more so a queuecall that became
    /// waiting during the switch is not left behind.
    async fn stop_when_empty(&self, queue: &Queue) -> ExecuteOutcome {
        if let Err(e) = self.set_execute(queue.id, Execute::Stop).await {
            error!("Could not stop the queue execution. queue_id: {}, err: {}", queue.id, e);
            return ExecuteOutcome::Failed;
        }

        match self.db.queuecall_get_oldest_waiting(queue.id).await {
            Err(e) if e.is_not_found() => {
                info!("No more waiting queuecalls, execution stopped. queue_id: {}", queue.id);
                ExecuteOutcome::Idle
            }
            Err(e) => {
                warn!("Could not re-check waiting queuecalls. queue_id: {}, err: {}", queue.id, e);
                ExecuteOutcome::Idle
            }
            Ok(queuecall) => {
                debug!(
                    "Queuecall arrived while stopping. queue_id: {}, queuecall_id: {}",
                    queue.id, queuecall.id
                );
                match self.set_execute(queue.id, Execute::Run).await {
                    Ok(_) => ExecuteOutcome::Resumed,
                    Err(e) => {
                        error!("Could not resume the queue execution. queue_id: {}, err: {}", queue.id, e);
                        ExecuteOutcome::Failed
                    }
                }
            }
        }
    }

    /// The queue cannot pick an agent; kick the queuecall so the caller
    /// leaves through its exit action instead of waiting forever.
    async fn send_out_of_queue(&self, queue: &Queue, queuecall: &Queuecall) -> ExecuteOutcome {
        warn!(
            "Unsupported routing method, kicking the queuecall. queue_id: {}, queuecall_id: {}, routing_method: {:?}",
            queue.id, queuecall.id, queue.routing_method
        );
        match self.req.queue_v1_queuecall_kick(queuecall.id).await {
            Ok(_) => ExecuteOutcome::Dispatched,
            Err(e) => {
                error!("Could not kick the queuecall. queuecall_id: {}, err: {}", queuecall.id, e);
                ExecuteOutcome::Failed
            }
        }
    }
}

fn pick_agent(routing_method: RoutingMethod, agents: &[Agent]) -> Option<Agent> {
    match routing_method {
        RoutingMethod::Random => agents.choose(&mut rand::thread_rng()).cloned(),
        RoutingMethod::None => None,
    }
}

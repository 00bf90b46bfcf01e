//! Data model shared by the store, the handlers and the message bus.
//!
//! `queue` and `queuecall` are owned by this service. The remaining modules
//! mirror the subset of peer-service records the queue core reads or sends.

pub mod address;
pub mod agent;
pub mod call;
pub mod confbridge;
pub mod customer;
pub mod flow;
pub mod queue;
pub mod queuecall;
pub mod service;

pub use address::{Address, AddressType};
pub use agent::{Agent, AgentStatus};
pub use call::{Call, CallDirection, CallStatus};
pub use confbridge::{Confbridge, ConfbridgeType};
pub use customer::Customer;
pub use flow::{Action, ActionType, Flow, FlowType};
pub use queue::{Execute, Queue, RoutingMethod};
pub use queuecall::{Queuecall, QueuecallStatus, ReferenceType};
pub use service::{Service, ServiceType};

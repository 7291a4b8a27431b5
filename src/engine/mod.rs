// ABOUTME: Staged workflow engine module for ticketflow
// ABOUTME: Ticket data model, stage table, transition graph, escalation policy and the engine itself

pub mod error;
pub mod escalation;
pub mod executor;
pub mod graph;
pub mod result;
pub mod stage;
pub mod state;
pub mod ticket;

pub use error::{EngineError, Result, StageError};
pub use escalation::{EscalationDecision, EscalationPolicy, ProviderVerdict, ESCALATION_THRESHOLD};
pub use executor::{EngineConfig, RegistryFactory, WorkflowEngine};
pub use result::{AbilityExecution, AbilityOutcome, OutputRecord, StageLog};
pub use stage::{AbilityRef, Stage, StageCatalog, StageId, StageMode};
pub use state::TicketState;
pub use ticket::{InputRecord, Priority, TicketStatus};

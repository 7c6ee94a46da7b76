// Closed vocabularies from spec §3. Each enum round-trips through the
// database as its lowercase/snake_case `Display` form so a bad row value
// fails loudly instead of silently defaulting.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Business module a workflow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Appointments,
    Construction,
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Module::Appointments => write!(f, "appointments"),
            Module::Construction => write!(f, "construction"),
        }
    }
}

impl std::str::FromStr for Module {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appointments" => Ok(Module::Appointments),
            "construction" => Ok(Module::Construction),
            other => Err(format!("unknown module: {other}")),
        }
    }
}

/// Entity type a workflow drives, and the unit the Entity Data Provider
/// resolves variables against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Session,
    Budget,
    Project,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Session => write!(f, "session"),
            EntityType::Budget => write!(f, "budget"),
            EntityType::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(EntityType::Session),
            "budget" => Ok(EntityType::Budget),
            "project" => Ok(EntityType::Project),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

impl EntityType {
    /// The module an entity type belongs to. Each entity type is owned by
    /// exactly one module, so inbound events only need to carry the
    /// entity type; the Engine derives the module from it.
    pub fn module(self) -> Module {
        match self {
            EntityType::Session => Module::Appointments,
            EntityType::Budget | EntityType::Project => Module::Construction,
        }
    }
}

/// Position of a State within its workflow's linear display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Initial,
    Intermediate,
    Final,
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateType::Initial => write!(f, "initial"),
            StateType::Intermediate => write!(f, "intermediate"),
            StateType::Final => write!(f, "final"),
        }
    }
}

impl std::str::FromStr for StateType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(StateType::Initial),
            "intermediate" => Ok(StateType::Intermediate),
            "final" => Ok(StateType::Final),
            other => Err(format!("unknown state type: {other}")),
        }
    }
}

/// Trigger polymorphism (spec §3 Trigger, §9 "Trigger polymorphism").
/// The store projects this sum type onto the existing trigger columns;
/// the Engine switches on this variant, never on a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    OnEnter,
    OnExit,
    TimeBefore,
    TimeAfter,
    Recurring,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::OnEnter => write!(f, "on_enter"),
            TriggerType::OnExit => write!(f, "on_exit"),
            TriggerType::TimeBefore => write!(f, "time_before"),
            TriggerType::TimeAfter => write!(f, "time_after"),
            TriggerType::Recurring => write!(f, "recurring"),
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_enter" => Ok(TriggerType::OnEnter),
            "on_exit" => Ok(TriggerType::OnExit),
            "time_before" => Ok(TriggerType::TimeBefore),
            "time_after" => Ok(TriggerType::TimeAfter),
            "recurring" => Ok(TriggerType::Recurring),
            other => Err(format!("unknown trigger type: {other}")),
        }
    }
}

impl TriggerType {
    /// Triggers that fire immediately as part of the state-change call,
    /// as opposed to being handed to the Scheduler.
    pub fn is_immediate(self) -> bool {
        matches!(self, TriggerType::OnEnter | TriggerType::OnExit)
    }

    pub fn is_time_based(self) -> bool {
        matches!(self, TriggerType::TimeBefore | TriggerType::TimeAfter)
    }
}

/// Action kinds an ordered trigger child can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendWhatsapp,
    SendEmail,
    UpdateField,
    CreateTask,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::SendWhatsapp => write!(f, "send_whatsapp"),
            ActionType::SendEmail => write!(f, "send_email"),
            ActionType::UpdateField => write!(f, "update_field"),
            ActionType::CreateTask => write!(f, "create_task"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_whatsapp" => Ok(ActionType::SendWhatsapp),
            "send_email" => Ok(ActionType::SendEmail),
            "update_field" => Ok(ActionType::UpdateField),
            "create_task" => Ok(ActionType::CreateTask),
            other => Err(format!("unknown action type: {other}")),
        }
    }
}

/// Messaging channel a Template is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Email,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
            Channel::Email => write!(f, "email"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(Channel::Whatsapp),
            "email" => Ok(Channel::Email),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// Lifecycle of a durable ScheduledJob row (spec §3 ScheduledJob).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// ExecutionLogEntry event types (spec §3 ExecutionLogEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    StateChange,
    TriggerFired,
    ActionExecuted,
    ActionFailed,
}

impl std::fmt::Display for LogEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogEventType::StateChange => write!(f, "state_change"),
            LogEventType::TriggerFired => write!(f, "trigger_fired"),
            LogEventType::ActionExecuted => write!(f, "action_executed"),
            LogEventType::ActionFailed => write!(f, "action_failed"),
        }
    }
}

impl std::str::FromStr for LogEventType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state_change" => Ok(LogEventType::StateChange),
            "trigger_fired" => Ok(LogEventType::TriggerFired),
            "action_executed" => Ok(LogEventType::ActionExecuted),
            "action_failed" => Ok(LogEventType::ActionFailed),
            other => Err(format!("unknown log event type: {other}")),
        }
    }
}

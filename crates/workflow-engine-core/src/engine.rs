// Engine: orchestrates OnStateEnter/OnStateExit/OnTransition/the dispatch
// worker's per-trigger execution (spec §4.6). Every entry point resolves
// the entity's data once, then fires each matching trigger independently:
// one trigger (or one action within a trigger) failing is recorded as
// `action_failed` and does not stop the next trigger or sibling action
// from running (spec §4.6 "action failures don't short-circuit sibling
// actions").

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use workflow_engine_contracts::{
    EntityType, NewExecutionLogEntry, OnEntityDeletedEvent, OnStateEnterEvent, OnStateExitEvent,
    OnTransitionEvent, TriggerType, TriggerWithActions, WorkflowGraph,
};

use crate::action_executor::ActionExecutor;
use crate::data::DataMap;
use crate::entity_data::EntityDataProvider;
use crate::error::{EngineError, Result};
use crate::traits::{append_log_soft, SchedulerPort, Store};

pub struct Engine {
    store: Arc<dyn Store>,
    entity_data: EntityDataProvider,
    executor: ActionExecutor,
    scheduler: Arc<dyn SchedulerPort>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        entity_data: EntityDataProvider,
        executor: ActionExecutor,
        scheduler: Arc<dyn SchedulerPort>,
    ) -> Self {
        Self {
            store,
            entity_data,
            executor,
            scheduler,
        }
    }

    async fn load_graph(&self, tenant_id: Uuid, entity_type: EntityType) -> Result<WorkflowGraph> {
        self.store
            .get_workflow_by_entity_type(tenant_id, entity_type.module(), entity_type)
            .await?
            .ok_or_else(|| EngineError::config(format!("no active workflow for {entity_type}")))
    }

    /// Resolve an entity's data map, degrading to an empty map when the
    /// Entity Data Provider cannot load it (spec §7 Propagation policy:
    /// "the trigger runs with an empty data map, unresolved placeholders
    /// remain literal, and the failure is logged"). Only `NotFound` is
    /// swallowed this way; transient/tenant errors still propagate so the
    /// caller can retry or reject.
    async fn fetch_data_best_effort(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<DataMap> {
        match self.entity_data.fetch(tenant_id, entity_type, entity_id).await {
            Ok(data) => Ok(data),
            Err(EngineError::NotFound(msg)) => {
                tracing::warn!(%entity_id, error = %msg, "entity data unavailable, proceeding with empty data map");
                Ok(DataMap::new())
            }
            Err(other) => Err(other),
        }
    }

    /// A domain entity entered `event.new_state` (spec §6).
    pub async fn on_state_enter(&self, event: OnStateEnterEvent) -> Result<()> {
        let graph = self.load_graph(event.tenant_id, event.entity_type).await?;
        let state = graph.state_by_name(&event.new_state).ok_or_else(|| {
            EngineError::config(format!("workflow {} has no state '{}'", graph.workflow.id, event.new_state))
        })?;

        append_log_soft(
            self.store.as_ref(),
            NewExecutionLogEntry::state_change(
                event.tenant_id,
                graph.workflow.id,
                event.entity_type,
                event.entity_id,
                None,
                Some(event.new_state.clone()),
            ),
        )
        .await;

        let data = self
            .fetch_data_best_effort(event.tenant_id, event.entity_type, event.entity_id)
            .await?;

        self.enter_state(&graph, state, event.tenant_id, event.entity_type, event.entity_id, &data)
            .await
    }

    /// A domain entity exited `event.old_state` (spec §6).
    pub async fn on_state_exit(&self, event: OnStateExitEvent) -> Result<()> {
        let graph = self.load_graph(event.tenant_id, event.entity_type).await?;
        let state = graph.state_by_name(&event.old_state).ok_or_else(|| {
            EngineError::config(format!("workflow {} has no state '{}'", graph.workflow.id, event.old_state))
        })?;

        let data = self
            .fetch_data_best_effort(event.tenant_id, event.entity_type, event.entity_id)
            .await?;

        self.exit_state(&graph, state, event.tenant_id, event.entity_type, event.entity_id, &data)
            .await
    }

    /// A domain entity traversed a named Transition edge (spec §6):
    /// `OnStateExit(from)` then the transition's own `state_change` log
    /// entry then `OnStateEnter(to)`, plus the triggers attached to the
    /// Transition edge itself (spec §3 Trigger: "attached to either a
    /// State ... or a Transition").
    pub async fn on_transition(&self, event: OnTransitionEvent) -> Result<()> {
        let graph = self.load_graph(event.tenant_id, event.entity_type).await?;
        let from = graph
            .state_by_name(&event.from)
            .ok_or_else(|| EngineError::config(format!("workflow {} has no state '{}'", graph.workflow.id, event.from)))?;
        let to = graph
            .state_by_name(&event.to)
            .ok_or_else(|| EngineError::config(format!("workflow {} has no state '{}'", graph.workflow.id, event.to)))?;
        let transition = graph
            .transition_between(from.id, to.id)
            .ok_or_else(|| EngineError::config(format!("no transition {} -> {}", event.from, event.to)))?;

        let data = self
            .fetch_data_best_effort(event.tenant_id, event.entity_type, event.entity_id)
            .await?;

        self.exit_state(&graph, from, event.tenant_id, event.entity_type, event.entity_id, &data)
            .await?;

        append_log_soft(
            self.store.as_ref(),
            NewExecutionLogEntry::state_change(
                event.tenant_id,
                graph.workflow.id,
                event.entity_type,
                event.entity_id,
                Some(event.from.clone()),
                Some(event.to.clone()),
            ),
        )
        .await;

        let transition_triggers = graph.triggers_for_transition(transition.id);
        self.schedule_time_based(event.tenant_id, event.entity_type, event.entity_id, &transition_triggers, &data)
            .await?;
        for trigger in transition_triggers.iter().filter(|t| t.trigger.trigger_type.is_immediate()) {
            self.fire_trigger(&graph, trigger, event.tenant_id, event.entity_type, event.entity_id, &data)
                .await;
        }

        self.enter_state(&graph, to, event.tenant_id, event.entity_type, event.entity_id, &data)
            .await
    }

    /// Schedule/fire the triggers attached to `state` on entry (spec
    /// §4.6 `OnStateEnter`): time-based triggers go to the Scheduler,
    /// `on_enter` triggers run immediately.
    async fn enter_state(
        &self,
        graph: &WorkflowGraph,
        state: &workflow_engine_contracts::State,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        data: &DataMap,
    ) -> Result<()> {
        let triggers = graph.triggers_for_state(state.id);
        self.schedule_time_based(tenant_id, entity_type, entity_id, &triggers, data).await?;
        self.fire_immediate(graph, &triggers, TriggerType::OnEnter, tenant_id, entity_type, entity_id, data)
            .await;
        Ok(())
    }

    /// Cancel pending jobs and fire `on_exit` triggers for `state` (spec
    /// §4.6 `OnStateExit`: "1. Cancel all pending jobs for the entity. 2.
    /// Execute on_exit triggers immediately.").
    async fn exit_state(
        &self,
        graph: &WorkflowGraph,
        state: &workflow_engine_contracts::State,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        data: &DataMap,
    ) -> Result<()> {
        self.scheduler.cancel_pending(tenant_id, entity_type, entity_id).await?;

        let triggers = graph.triggers_for_state(state.id);
        self.fire_immediate(graph, &triggers, TriggerType::OnExit, tenant_id, entity_type, entity_id, data)
            .await;
        Ok(())
    }

    /// A domain entity was deleted: drop every Pending job still
    /// outstanding for it so the Scheduler never fires into a void
    /// (spec §6).
    pub async fn on_entity_deleted(&self, event: OnEntityDeletedEvent) -> Result<()> {
        self.scheduler
            .cancel_pending(event.tenant_id, event.entity_type, event.entity_id)
            .await
    }

    /// Execute one already-decided trigger firing, as handed to the
    /// dispatch worker by the Scheduler (TimeBefore/TimeAfter/Recurring).
    /// The Scheduler has already decided this trigger is due; this method
    /// only runs it.
    pub async fn execute_trigger_by_id(
        &self,
        tenant_id: Uuid,
        trigger_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<()> {
        let (trigger, actions, workflow) = self.store.get_trigger_with_workflow(tenant_id, trigger_id).await?;
        if workflow.tenant_id != tenant_id {
            return Err(EngineError::TenantMismatch);
        }
        if !trigger.active {
            tracing::info!(%trigger_id, "trigger no longer active, skipping firing");
            return Ok(());
        }

        let data = self.fetch_data_best_effort(tenant_id, entity_type, entity_id).await?;
        let bundle = TriggerWithActions { trigger, actions };

        append_log_soft(
            self.store.as_ref(),
            NewExecutionLogEntry {
                tenant_id,
                workflow_id: workflow.id,
                entity_type,
                entity_id,
                trigger_id: Some(bundle.trigger.id),
                action_id: None,
                event_type: workflow_engine_contracts::LogEventType::TriggerFired,
                from_state: None,
                to_state: None,
                details: json!({}),
            },
        )
        .await;

        self.run_actions(tenant_id, entity_type, entity_id, &bundle, &data).await;
        Ok(())
    }

    async fn schedule_time_based(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        triggers: &[&TriggerWithActions],
        data: &DataMap,
    ) -> Result<()> {
        let time_based: Vec<TriggerWithActions> = triggers
            .iter()
            .filter(|t| t.trigger.trigger_type.is_time_based())
            .map(|t| (*t).clone())
            .collect();
        if time_based.is_empty() {
            return Ok(());
        }
        self.scheduler
            .schedule_for_state(tenant_id, entity_type, entity_id, &time_based, data)
            .await
    }

    async fn fire_immediate(
        &self,
        graph: &WorkflowGraph,
        triggers: &[&TriggerWithActions],
        kind: TriggerType,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        data: &DataMap,
    ) {
        for trigger in triggers.iter().filter(|t| t.trigger.trigger_type == kind) {
            self.fire_trigger(graph, trigger, tenant_id, entity_type, entity_id, data).await;
        }
    }

    async fn fire_trigger(
        &self,
        graph: &WorkflowGraph,
        trigger: &TriggerWithActions,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        data: &DataMap,
    ) {
        append_log_soft(
            self.store.as_ref(),
            NewExecutionLogEntry {
                tenant_id,
                workflow_id: graph.workflow.id,
                entity_type,
                entity_id,
                trigger_id: Some(trigger.trigger.id),
                action_id: None,
                event_type: workflow_engine_contracts::LogEventType::TriggerFired,
                from_state: None,
                to_state: None,
                details: json!({}),
            },
        )
        .await;

        self.run_actions(tenant_id, entity_type, entity_id, trigger, data).await;
    }

    /// Run every active Action on `trigger` in order, logging each one
    /// independently. An action that fails is logged as `action_failed`
    /// and execution continues with the next action.
    async fn run_actions(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        trigger: &TriggerWithActions,
        data: &DataMap,
    ) {
        let mut actions: Vec<_> = trigger.actions.iter().filter(|a| a.active).collect();
        actions.sort_by_key(|a| a.order);

        for action in actions {
            let workflow_id = trigger.trigger.workflow_id;
            match self.executor.execute(tenant_id, entity_type, entity_id, action, data).await {
                Ok(details) => {
                    append_log_soft(
                        self.store.as_ref(),
                        NewExecutionLogEntry {
                            tenant_id,
                            workflow_id,
                            entity_type,
                            entity_id,
                            trigger_id: Some(trigger.trigger.id),
                            action_id: Some(action.id),
                            event_type: workflow_engine_contracts::LogEventType::ActionExecuted,
                            from_state: None,
                            to_state: None,
                            details,
                        },
                    )
                    .await;
                }
                Err(err) => {
                    tracing::warn!(action_id = %action.id, error = %err, "action failed");
                    append_log_soft(
                        self.store.as_ref(),
                        NewExecutionLogEntry {
                            tenant_id,
                            workflow_id,
                            entity_type,
                            entity_id,
                            trigger_id: Some(trigger.trigger.id),
                            action_id: Some(action.id),
                            event_type: workflow_engine_contracts::LogEventType::ActionFailed,
                            from_state: None,
                            to_state: None,
                            details: json!({"error": err.to_string()}),
                        },
                    )
                    .await;
                }
            }
        }
    }
}

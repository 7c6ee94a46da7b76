// Action Executor (spec §4.4): dispatches one Action against one entity's
// resolved data map. Each action type maps to exactly one outbound effect;
// a failure in one action never stops the Engine from running the next
// one in the trigger's action list (spec §4.6 "action failures don't
// short-circuit sibling actions") — that sequencing lives in the Engine,
// this module only knows how to run a single Action to completion.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;
use workflow_engine_contracts::{Action, ActionType, Channel, EntityType, NewTaskRecord};

use crate::catalogue::is_allowed_field;
use crate::data::{DataMap, DataValue};
use crate::error::{EngineError, Result};
use crate::template;
use crate::traits::{MessagingPort, Store};

pub struct ActionExecutor {
    store: Arc<dyn Store>,
    messaging: Option<Arc<dyn MessagingPort>>,
}

impl ActionExecutor {
    pub fn new(store: Arc<dyn Store>, messaging: Option<Arc<dyn MessagingPort>>) -> Self {
        Self { store, messaging }
    }

    /// Run `action` against `entity_id`'s data map. Returns a JSON blob
    /// suitable for the `details` column of an `action_executed` log
    /// entry; the Engine is responsible for turning an `Err` here into an
    /// `action_failed` entry instead.
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        action: &Action,
        data: &DataMap,
    ) -> Result<Value> {
        match action.action_type {
            ActionType::SendWhatsapp => self.send_whatsapp(tenant_id, entity_type, action, data).await,
            ActionType::SendEmail => self.send_email(tenant_id, entity_type, action, data).await,
            ActionType::UpdateField => {
                self.update_field(tenant_id, entity_type, entity_id, action, data).await
            }
            ActionType::CreateTask => {
                self.create_task(tenant_id, entity_type, entity_id, action, data).await
            }
        }
    }

    async fn load_template(
        &self,
        tenant_id: Uuid,
        action: &Action,
        expected: Channel,
    ) -> Result<workflow_engine_contracts::Template> {
        let template_id = action
            .template_id
            .ok_or_else(|| EngineError::config("action has no template_id"))?;
        let template = self.store.get_template(tenant_id, template_id).await?;
        if template.channel != expected {
            return Err(EngineError::config(format!(
                "template {template_id} is {:?}, action expects {:?}",
                template.channel, expected
            )));
        }
        Ok(template)
    }

    async fn send_whatsapp(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        action: &Action,
        data: &DataMap,
    ) -> Result<Value> {
        let template = self.load_template(tenant_id, action, Channel::Whatsapp).await?;
        let body = template::render(&template.body, data);
        let to = recipient_phone(entity_type, action, data)?;

        let Some(messaging) = &self.messaging else {
            tracing::warn!("messaging port not configured, skipping send_whatsapp");
            return Ok(json!({"skipped": "messaging_not_configured", "to": to, "body": body}));
        };
        messaging.send_whatsapp(&to, &body).await?;
        Ok(json!({"to": to, "body": body}))
    }

    /// `send_email` may resolve its subject/body from a Template (channel
    /// must be email) **or** from inline `config.subject`/`config.body`
    /// strings (spec §3 Action invariant). A `template_id` takes
    /// precedence when both are present.
    async fn send_email(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        action: &Action,
        data: &DataMap,
    ) -> Result<Value> {
        let (subject, body) = if action.template_id.is_some() {
            let template = self.load_template(tenant_id, action, Channel::Email).await?;
            template::render_pair(template.subject.as_deref(), &template.body, data)
        } else {
            let inline_subject = action.config.get("subject").and_then(Value::as_str);
            let inline_body = config_str(&action.config, "body")?;
            template::render_pair(inline_subject, inline_body, data)
        };
        let to = recipient_email(entity_type, action, data)?;

        let Some(messaging) = &self.messaging else {
            tracing::warn!("messaging port not configured, skipping send_email");
            return Ok(json!({"skipped": "messaging_not_configured", "to": to, "subject": subject, "body": body}));
        };
        messaging.send_email(&to, subject.as_deref(), &body).await?;
        Ok(json!({"to": to, "subject": subject, "body": body}))
    }

    async fn update_field(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        action: &Action,
        data: &DataMap,
    ) -> Result<Value> {
        let field = config_str(&action.config, "field")?;
        if !is_allowed_field(entity_type, field) {
            return Err(EngineError::config(format!(
                "field '{field}' is not writable on {entity_type}"
            )));
        }
        let raw_value = config_str(&action.config, "value")?;
        let rendered = template::render(raw_value, data);

        self.store
            .update_entity_field(tenant_id, entity_type, entity_id, field, &DataValue::Text(rendered.clone()))
            .await?;
        Ok(json!({"field": field, "value": rendered}))
    }

    async fn create_task(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        action: &Action,
        data: &DataMap,
    ) -> Result<Value> {
        let title = template::render(config_str(&action.config, "title")?, data);
        let description = action
            .config
            .get("description")
            .and_then(Value::as_str)
            .map(|s| template::render(s, data));
        let assignee = action
            .config
            .get("assignee")
            .and_then(Value::as_str)
            .map(str::to_string);

        let task_id = self
            .store
            .record_task(
                tenant_id,
                NewTaskRecord {
                    tenant_id,
                    entity_type,
                    entity_id,
                    title: title.clone(),
                    description,
                    assignee,
                },
            )
            .await?;
        Ok(json!({"task_id": task_id, "title": title}))
    }
}

fn config_str<'a>(config: &'a Value, key: &str) -> Result<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::config(format!("action config missing '{key}'")))
}

/// Recipient resolution order (spec §4.4): `config.to_field` names a data
/// map key to use instead of the entity-type default.
fn config_to_field(action: &Action) -> Option<&str> {
    action.config.get("to_field").and_then(Value::as_str)
}

fn recipient_phone(entity_type: EntityType, action: &Action, data: &DataMap) -> Result<String> {
    let default_key = match entity_type {
        EntityType::Session => "patient_phone",
        EntityType::Budget | EntityType::Project => "client_phone",
    };
    let key = config_to_field(action).unwrap_or(default_key);
    match data.get(key) {
        Some(DataValue::Text(phone)) => Ok(phone.clone()),
        _ => Err(EngineError::config(format!("entity has no {key}"))),
    }
}

fn recipient_email(entity_type: EntityType, action: &Action, data: &DataMap) -> Result<String> {
    let default_key = match entity_type {
        EntityType::Session => "patient_email",
        EntityType::Budget | EntityType::Project => "client_email",
    };
    let key = config_to_field(action).unwrap_or(default_key);
    match data.get(key) {
        Some(DataValue::Text(email)) => Ok(email.clone()),
        _ => Err(EngineError::config(format!("entity has no {key}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use workflow_engine_contracts::{Channel, Template};

    struct FakeMessaging {
        fail: bool,
    }

    #[async_trait]
    impl MessagingPort for FakeMessaging {
        async fn send_whatsapp(&self, _to: &str, _body: &str) -> crate::error::PortResult<()> {
            if self.fail {
                return Err(crate::error::PortError::Failed("down".to_string()));
            }
            Ok(())
        }
        async fn send_email(&self, _to: &str, _subject: Option<&str>, _body: &str) -> crate::error::PortResult<()> {
            Ok(())
        }
    }

    struct FakeStore {
        template: Template,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn get_workflow_by_entity_type(
            &self,
            _tenant_id: Uuid,
            _module: workflow_engine_contracts::Module,
            _entity_type: EntityType,
        ) -> crate::error::StoreResult<Option<workflow_engine_contracts::WorkflowGraph>> {
            unimplemented!()
        }
        async fn get_workflow_graph(&self, _tenant_id: Uuid, _workflow_id: Uuid) -> crate::error::StoreResult<workflow_engine_contracts::WorkflowGraph> {
            unimplemented!()
        }
        async fn list_workflows(&self, _tenant_id: Uuid) -> crate::error::StoreResult<Vec<workflow_engine_contracts::Workflow>> {
            unimplemented!()
        }
        async fn get_trigger_with_workflow(
            &self,
            _tenant_id: Uuid,
            _trigger_id: Uuid,
        ) -> crate::error::StoreResult<(workflow_engine_contracts::Trigger, Vec<Action>, workflow_engine_contracts::Workflow)> {
            unimplemented!()
        }
        async fn list_active_recurring_triggers(
            &self,
        ) -> crate::error::StoreResult<Vec<(workflow_engine_contracts::Trigger, workflow_engine_contracts::Workflow)>> {
            unimplemented!()
        }
        async fn create_workflow(&self, _tenant_id: Uuid, _input: workflow_engine_contracts::NewWorkflow) -> crate::error::StoreResult<workflow_engine_contracts::Workflow> {
            unimplemented!()
        }
        async fn update_workflow(&self, _tenant_id: Uuid, _workflow_id: Uuid, _input: workflow_engine_contracts::UpdateWorkflow) -> crate::error::StoreResult<workflow_engine_contracts::Workflow> {
            unimplemented!()
        }
        async fn delete_workflow(&self, _tenant_id: Uuid, _workflow_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_state(&self, _tenant_id: Uuid, _workflow_id: Uuid, _input: workflow_engine_contracts::NewState) -> crate::error::StoreResult<workflow_engine_contracts::State> {
            unimplemented!()
        }
        async fn delete_state(&self, _tenant_id: Uuid, _state_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_transition(&self, _tenant_id: Uuid, _workflow_id: Uuid, _input: workflow_engine_contracts::NewTransition) -> crate::error::StoreResult<workflow_engine_contracts::Transition> {
            unimplemented!()
        }
        async fn delete_transition(&self, _tenant_id: Uuid, _transition_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_trigger(&self, _tenant_id: Uuid, _workflow_id: Uuid, _input: workflow_engine_contracts::NewTrigger) -> crate::error::StoreResult<workflow_engine_contracts::Trigger> {
            unimplemented!()
        }
        async fn set_trigger_active(&self, _tenant_id: Uuid, _trigger_id: Uuid, _active: bool) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn delete_trigger(&self, _tenant_id: Uuid, _trigger_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_action(&self, _tenant_id: Uuid, _trigger_id: Uuid, _input: workflow_engine_contracts::NewAction) -> crate::error::StoreResult<Action> {
            unimplemented!()
        }
        async fn delete_action(&self, _tenant_id: Uuid, _action_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_template(&self, _tenant_id: Uuid, _input: workflow_engine_contracts::NewTemplate) -> crate::error::StoreResult<Template> {
            unimplemented!()
        }
        async fn get_template(&self, _tenant_id: Uuid, _template_id: Uuid) -> crate::error::StoreResult<Template> {
            Ok(self.template.clone())
        }
        async fn list_templates(&self, _tenant_id: Uuid, _channel: Option<Channel>) -> crate::error::StoreResult<Vec<Template>> {
            unimplemented!()
        }
        async fn update_template(&self, _tenant_id: Uuid, _template_id: Uuid, _input: workflow_engine_contracts::UpdateTemplate) -> crate::error::StoreResult<Template> {
            unimplemented!()
        }
        async fn delete_template(&self, _tenant_id: Uuid, _template_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn create_scheduled_job(&self, _input: workflow_engine_contracts::NewScheduledJob) -> crate::error::StoreResult<workflow_engine_contracts::ScheduledJob> {
            unimplemented!()
        }
        async fn cancel_pending(&self, _tenant_id: Uuid, _entity_type: EntityType, _entity_id: Uuid) -> crate::error::StoreResult<u64> {
            unimplemented!()
        }
        async fn list_due_pending(&self, _now: chrono::DateTime<chrono::Utc>, _limit: i64) -> crate::error::StoreResult<Vec<workflow_engine_contracts::ScheduledJob>> {
            unimplemented!()
        }
        async fn claim_job(&self, _job_id: Uuid) -> crate::error::StoreResult<bool> {
            unimplemented!()
        }
        async fn complete_job(&self, _job_id: Uuid) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn fail_job(&self, _job_id: Uuid, _error: String) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn requeue_job(&self, _job_id: Uuid, _error: String) -> crate::error::StoreResult<()> {
            unimplemented!()
        }
        async fn cleanup_old_jobs(&self, _older_than: chrono::Duration) -> crate::error::StoreResult<u64> {
            unimplemented!()
        }
        async fn append_log(
            &self,
            _entry: workflow_engine_contracts::NewExecutionLogEntry,
        ) -> crate::error::StoreResult<workflow_engine_contracts::ExecutionLogEntry> {
            unimplemented!()
        }
        async fn update_entity_field(
            &self,
            _tenant_id: Uuid,
            _entity_type: EntityType,
            _entity_id: Uuid,
            _field: &str,
            _value: &DataValue,
        ) -> crate::error::StoreResult<()> {
            Ok(())
        }
        async fn record_task(&self, _tenant_id: Uuid, input: NewTaskRecord) -> crate::error::StoreResult<Uuid> {
            let _ = input;
            Ok(Uuid::now_v7())
        }
    }

    fn session_data() -> DataMap {
        let mut data = DataMap::new();
        data.insert("patient_phone".to_string(), DataValue::Text("+351912000000".to_string()));
        data.insert("patient_name".to_string(), DataValue::Text("Ana".to_string()));
        data
    }

    #[tokio::test]
    async fn send_whatsapp_renders_and_dispatches() {
        let template = Template {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "reminder".to_string(),
            channel: Channel::Whatsapp,
            subject: None,
            body: "Olá {{patient_name}}, falta pouco!".to_string(),
            variables: vec!["patient_name".to_string()],
            active: true,
        };
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::SendWhatsapp,
            order: 0,
            template_id: Some(template.id),
            config: json!({}),
            active: true,
        };
        let executor = ActionExecutor::new(
            Arc::new(FakeStore { template }),
            Some(Arc::new(FakeMessaging { fail: false })),
        );
        let result = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &session_data())
            .await
            .unwrap();
        assert_eq!(result["to"], "+351912000000");
        assert_eq!(result["body"], "Olá Ana, falta pouco!");
    }

    #[tokio::test]
    async fn send_whatsapp_without_port_configured_is_a_soft_skip() {
        let template = Template {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "reminder".to_string(),
            channel: Channel::Whatsapp,
            subject: None,
            body: "oi".to_string(),
            variables: vec![],
            active: true,
        };
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::SendWhatsapp,
            order: 0,
            template_id: Some(template.id),
            config: json!({}),
            active: true,
        };
        let executor = ActionExecutor::new(Arc::new(FakeStore { template }), None);
        let result = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &session_data())
            .await
            .unwrap();
        assert_eq!(result["skipped"], "messaging_not_configured");
    }

    #[tokio::test]
    async fn update_field_rejects_columns_outside_the_allow_list() {
        let template = Template {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "n".to_string(),
            channel: Channel::Whatsapp,
            subject: None,
            body: "b".to_string(),
            variables: vec![],
            active: true,
        };
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::UpdateField,
            order: 0,
            template_id: None,
            config: json!({"field": "tenant_id", "value": "hijack"}),
            active: true,
        };
        let executor = ActionExecutor::new(Arc::new(FakeStore { template }), None);
        let err = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &DataMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    fn unused_template() -> Template {
        Template {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "unused".to_string(),
            channel: Channel::Email,
            subject: None,
            body: "unused".to_string(),
            variables: vec![],
            active: true,
        }
    }

    #[tokio::test]
    async fn send_email_renders_inline_config_without_a_template() {
        let mut data = session_data();
        data.insert("patient_email".to_string(), DataValue::Text("ana@example.com".to_string()));
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::SendEmail,
            order: 0,
            template_id: None,
            config: json!({"subject": "Olá {{patient_name}}", "body": "Confirmação para {{patient_name}}"}),
            active: true,
        };
        let executor = ActionExecutor::new(
            Arc::new(FakeStore { template: unused_template() }),
            Some(Arc::new(FakeMessaging { fail: false })),
        );
        let result = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &data)
            .await
            .unwrap();
        assert_eq!(result["to"], "ana@example.com");
        assert_eq!(result["subject"], "Olá Ana");
        assert_eq!(result["body"], "Confirmação para Ana");
    }

    #[tokio::test]
    async fn send_email_honours_to_field_override() {
        let mut data = session_data();
        data.insert("patient_email".to_string(), DataValue::Text("ana@example.com".to_string()));
        data.insert("therapist_email".to_string(), DataValue::Text("therapist@example.com".to_string()));
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::SendEmail,
            order: 0,
            template_id: None,
            config: json!({"to_field": "therapist_email", "body": "fyi"}),
            active: true,
        };
        let executor = ActionExecutor::new(
            Arc::new(FakeStore { template: unused_template() }),
            Some(Arc::new(FakeMessaging { fail: false })),
        );
        let result = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &data)
            .await
            .unwrap();
        assert_eq!(result["to"], "therapist@example.com");
    }

    #[tokio::test]
    async fn send_whatsapp_port_failure_is_surfaced_as_an_error() {
        let template = Template {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "reminder".to_string(),
            channel: Channel::Whatsapp,
            subject: None,
            body: "oi".to_string(),
            variables: vec![],
            active: true,
        };
        let action = Action {
            id: Uuid::now_v7(),
            trigger_id: Uuid::now_v7(),
            action_type: ActionType::SendWhatsapp,
            order: 0,
            template_id: Some(template.id),
            config: json!({}),
            active: true,
        };
        let executor = ActionExecutor::new(
            Arc::new(FakeStore { template }),
            Some(Arc::new(FakeMessaging { fail: true })),
        );
        let err = executor
            .execute(Uuid::now_v7(), EntityType::Session, Uuid::now_v7(), &action, &session_data())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Port(_)));
    }
}

// Template Renderer (spec §4.2).
//
// Render(body, data) substitutes every `{{identifier}}` with the
// stringified value from `data`; placeholders with no matching key are
// left literally in place. Validate reports declared-but-unknown
// variables against the per-entity-type catalogue so a bad template is
// caught at save time, not at dispatch time.

use std::sync::OnceLock;

use regex::Regex;
use workflow_engine_contracts::EntityType;

use crate::catalogue::{is_known_variable, sample_data, variable_catalogue};
use crate::data::DataMap;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("static pattern"))
}

/// Substitute `{{name}}` placeholders in `body` against `data`. Unresolved
/// placeholders are left unchanged. Empty/absent data is a no-op.
pub fn render(body: &str, data: &DataMap) -> String {
    if data.is_empty() {
        return body.to_string();
    }

    placeholder_pattern()
        .replace_all(body, |caps: &regex::Captures| {
            let name = &caps[1];
            match data.get(name) {
                Some(value) => value.render(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Render both subject and body of a template-shaped pair in one call.
pub fn render_pair(subject: Option<&str>, body: &str, data: &DataMap) -> (Option<String>, String) {
    (subject.map(|s| render(s, data)), render(body, data))
}

/// Every placeholder name referenced in `body`, de-duplicated, in first
/// occurrence order.
fn placeholder_names(body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for caps in placeholder_pattern().captures_iter(body) {
        let name = caps[1].to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Placeholder names in `body` that are not declared in the entity type's
/// variable catalogue (spec §4.2 Validate).
pub fn validate(body: &str, entity_type: EntityType) -> Vec<String> {
    placeholder_names(body)
        .into_iter()
        .filter(|name| !is_known_variable(entity_type, name))
        .collect()
}

/// Render `(subject, body)` against the canned sample map for
/// `entity_type`, for administration preview tooling (spec §4.2 Preview).
pub fn preview(
    subject: Option<&str>,
    body: &str,
    entity_type: EntityType,
) -> (Option<String>, String) {
    let sample = sample_data(entity_type);
    render_pair(subject, body, &sample)
}

/// All declared variables for `entity_type`, for UI autocomplete.
pub fn declared_variables(entity_type: EntityType) -> &'static [&'static str] {
    variable_catalogue(entity_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataValue;

    fn map(pairs: &[(&str, &str)]) -> DataMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), DataValue::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let data = map(&[("patient_name", "Ana"), ("session_time", "10:00")]);
        let out = render("Olá {{patient_name}}! Consulta amanhã às {{session_time}}", &data);
        assert_eq!(out, "Olá Ana! Consulta amanhã às 10:00");
    }

    #[test]
    fn unknown_variable_preserved_literally() {
        let data = map(&[("patient_name", "Ana")]);
        let out = render("Olá {{patient_name}}, ref {{missing_var}}", &data);
        assert_eq!(out, "Olá Ana, ref {{missing_var}}");
    }

    #[test]
    fn empty_data_is_a_no_op() {
        let body = "Olá {{patient_name}}";
        assert_eq!(render(body, &DataMap::new()), body);
    }

    #[test]
    fn render_is_idempotent_when_values_contain_no_braces() {
        let data = map(&[("patient_name", "Ana")]);
        let once = render("Olá {{patient_name}}", &data);
        let twice = render(&once, &data);
        assert_eq!(once, twice);
    }

    #[test]
    fn validate_flags_only_unknown_variables() {
        let unknown = validate(
            "Olá {{patient_name}}, pagamento {{mystery_field}}",
            EntityType::Session,
        );
        assert_eq!(unknown, vec!["mystery_field".to_string()]);
    }

    #[test]
    fn validate_dedupes_repeated_unknown_variables() {
        let unknown = validate("{{foo}} and {{foo}} again", EntityType::Session);
        assert_eq!(unknown, vec!["foo".to_string()]);
    }

    #[test]
    fn number_renders_without_locale_formatting() {
        let mut data = DataMap::new();
        data.insert("amount".to_string(), DataValue::Number(1500.0));
        assert_eq!(render("{{amount}}", &data), "1500");
        data.insert("amount".to_string(), DataValue::Number(1500.5));
        assert_eq!(render("{{amount}}", &data), "1500.5");
    }

    #[test]
    fn preview_renders_against_sample_data() {
        let (subject, body) = preview(
            Some("Lembrete para {{patient_name}}"),
            "Consulta às {{session_time}}",
            EntityType::Session,
        );
        assert!(subject.unwrap().contains("Ana Sousa"));
        assert!(body.contains("10:00"));
    }
}

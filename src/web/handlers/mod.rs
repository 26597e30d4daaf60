pub mod info;
pub mod runs;
pub mod schedule;
pub mod scripts;

use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::store::{ScriptMeta, ScriptStore, valid_id};

pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub(crate) fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not found")
}

/// Body parsing for the write endpoints: content type is ignored, but a
/// body that does not decode as JSON is a client error.
pub(crate) fn parse_strict(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body)
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "Invalid JSON body"))
}

/// The run endpoint takes its body as optional: anything that does not
/// parse as JSON is treated as an empty object.
pub(crate) fn parse_lenient(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| serde_json::json!({}))
}

/// Loose truthiness for flag fields, so `true`, `1` and `"yes"` all
/// switch sudo on while `false`, `0`, `""` and `null` leave it off.
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Metadata lookup that also rejects ids not shaped like ours, which
/// keeps raw path input away from the filesystem.
pub(crate) fn load_meta(store: &ScriptStore, id: &str) -> Option<ScriptMeta> {
    if !valid_id(id) {
        return None;
    }
    store.read_meta(id).ok().flatten()
}

/// Wire shape for a script: the stored metadata plus its id, with
/// `schedule` always present as a string so clients never branch on a
/// missing key.
pub(crate) fn script_json(id: &str, meta: &ScriptMeta) -> Value {
    let mut value = serde_json::to_value(meta).unwrap_or_else(|_| serde_json::json!({}));
    value["id"] = serde_json::json!(id);
    value["schedule"] = serde_json::json!(meta.schedule.clone().unwrap_or_default());
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_follows_loose_semantics() {
        assert!(truthy(Some(&serde_json::json!(true))));
        assert!(truthy(Some(&serde_json::json!(1))));
        assert!(truthy(Some(&serde_json::json!("yes"))));
        assert!(!truthy(Some(&serde_json::json!(false))));
        assert!(!truthy(Some(&serde_json::json!(0))));
        assert!(!truthy(Some(&serde_json::json!(""))));
        assert!(!truthy(Some(&serde_json::json!(null))));
        assert!(!truthy(None));
    }

    #[test]
    fn lenient_parse_swallows_garbage() {
        assert_eq!(
            parse_lenient(&Bytes::from_static(b"not json")),
            serde_json::json!({})
        );
        assert_eq!(
            parse_lenient(&Bytes::from_static(b"{\"a\":1}")),
            serde_json::json!({"a": 1})
        );
        assert_eq!(parse_lenient(&Bytes::new()), serde_json::json!({}));
    }

    #[test]
    fn strict_parse_rejects_garbage() {
        assert!(parse_strict(&Bytes::from_static(b"not json")).is_err());
        assert!(parse_strict(&Bytes::new()).is_err());
        assert_eq!(
            parse_strict(&Bytes::from_static(b"{\"a\":1}")).unwrap(),
            serde_json::json!({"a": 1})
        );
    }

    #[test]
    fn script_json_injects_id_and_normalizes_schedule() {
        let meta = ScriptMeta {
            name: "backup".to_string(),
            description: String::new(),
            created: 1700000000.0,
            schedule: None,
        };
        let value = script_json("deadbeef", &meta);
        assert_eq!(value["id"], "deadbeef");
        assert_eq!(value["name"], "backup");
        assert_eq!(value["schedule"], "");

        let scheduled = ScriptMeta {
            schedule: Some("@daily".to_string()),
            ..meta
        };
        assert_eq!(script_json("deadbeef", &scheduled)["schedule"], "@daily");
    }
}

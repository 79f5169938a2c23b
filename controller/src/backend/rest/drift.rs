use crate::backend::error::{self, BackendResult};
use serde_json::{Map, Value};
use snafu::{ensure, OptionExt};

/// Compares the desired state with what the API returned. Without a compare list every spec
/// field that the response also carries is compared. A listed field must be in the response; when
/// the spec leaves it unset it is compared as `null`.
pub(crate) fn check_drift(
    compare_list: &[String],
    spec: &Map<String, Value>,
    response: &Value,
) -> BackendResult<()> {
    let observed = match response.as_object() {
        Some(observed) => observed,
        None if compare_list.is_empty() => return Ok(()),
        None => {
            return error::ComparisonFieldSnafu {
                field: &compare_list[0],
            }
            .fail()
        }
    };

    if compare_list.is_empty() {
        for (field, desired) in spec {
            if let Some(actual) = observed.get(field) {
                ensure!(actual == desired, error::DriftSnafu { field });
            }
        }
        return Ok(());
    }

    for field in compare_list {
        let actual = observed
            .get(field)
            .context(error::ComparisonFieldSnafu { field })?;
        let desired = spec.get(field).unwrap_or(&Value::Null);
        ensure!(actual == desired, error::DriftSnafu { field });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn compare_list_detects_drift() {
        let spec = map(json!({"name": "a", "size": 2, "labels": {"x": "y"}}));
        let list = vec!["name".to_string(), "size".to_string()];
        let err = check_drift(&list, &spec, &json!({"name": "a", "size": 3})).unwrap_err();
        assert!(err.is_drift());
        check_drift(&list, &spec, &json!({"name": "a", "size": 2, "labels": {}})).unwrap();
    }

    #[test]
    fn compare_list_field_missing_from_response() {
        let spec = map(json!({"name": "a", "size": 2}));
        let list = vec!["size".to_string()];
        let err = check_drift(&list, &spec, &json!({"name": "a"})).unwrap_err();
        assert!(!err.is_drift());
        assert!(matches!(err, crate::backend::BackendError::ComparisonField { .. }));
    }

    #[test]
    fn compare_list_field_removed_from_spec_drifts() {
        let spec = map(json!({"name": "a"}));
        let list = vec!["name".to_string(), "size".to_string()];
        let err = check_drift(&list, &spec, &json!({"name": "a", "size": 3})).unwrap_err();
        assert!(err.is_drift());
        check_drift(&list, &spec, &json!({"name": "a", "size": null})).unwrap();
    }

    #[test]
    fn without_compare_list_only_shared_fields_count() {
        let spec = map(json!({"name": "a", "secret": "s", "tags": ["x"]}));
        check_drift(&[], &spec, &json!({"name": "a", "id": 1, "tags": ["x"]})).unwrap();
        let err = check_drift(&[], &spec, &json!({"name": "a", "tags": ["y"]})).unwrap_err();
        assert!(err.is_drift());
    }
}

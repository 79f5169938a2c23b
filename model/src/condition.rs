use crate::constants::{
    AVAILABILITY_MARKERS, CONDITION_READY, REASON_AVAILABLE, REASON_CREATING, REASON_DELETING,
    REASON_RECONCILE_FAILED, REASON_UNAVAILABLE,
};
use crate::error::{self, Result};
use crate::{ObjectRef, ResourceDocument};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use serde_json::Value;
use snafu::ResultExt;

/// The status of a `Condition`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConditionStatus {
    True,
    False,
}

impl ConditionStatus {
    fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
        }
    }
}

fn ready(status: ConditionStatus, reason: &str) -> Condition {
    Condition {
        last_transition_time: Time(Utc::now()),
        message: String::new(),
        observed_generation: None,
        reason: reason.to_string(),
        status: status.as_str().to_string(),
        type_: CONDITION_READY.to_string(),
    }
}

/// The external resource exists and matches the desired state.
pub fn available() -> Condition {
    ready(ConditionStatus::True, REASON_AVAILABLE)
}

/// The external resource, or one of its parts, is not usable.
pub fn unavailable() -> Condition {
    ready(ConditionStatus::False, REASON_UNAVAILABLE)
}

pub fn creating() -> Condition {
    ready(ConditionStatus::False, REASON_CREATING)
}

pub fn deleting() -> Condition {
    ready(ConditionStatus::False, REASON_DELETING)
}

/// Not ready because reconciling failed. `message` carries the diagnostic.
pub fn reconcile_failed<S: Into<String>>(message: S) -> Condition {
    Condition {
        message: message.into(),
        ..ready(ConditionStatus::False, REASON_RECONCILE_FAILED)
    }
}

impl ResourceDocument {
    /// Reads `status.conditions`. An absent list is empty.
    pub fn conditions(&self) -> Result<Vec<Condition>> {
        match self.get_field(&["status", "conditions"]) {
            Ok(value) => Ok(serde_json::from_value(value.clone())
                .context(error::SerdeSnafu { what: "conditions" })?),
            Err(e) if e.is_field_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Adds `condition`, replacing any condition of the same type. The transition time is kept
    /// when the status did not change.
    pub fn set_condition(&mut self, mut condition: Condition) -> Result<()> {
        let mut conditions = self.conditions()?;
        match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time.clone();
                }
                *existing = condition;
            }
            None => conditions.push(condition),
        }
        let value = serde_json::to_value(&conditions)
            .context(error::SerdeSnafu { what: "conditions" })?;
        self.set_field(&["status", "conditions"], value)
    }

    pub fn condition(&self, type_: &str) -> Result<Option<Condition>> {
        Ok(self.conditions()?.into_iter().find(|c| c.type_ == type_))
    }

    pub fn failed_object_ref(&self) -> Result<Option<ObjectRef>> {
        match self.get_field(&["status", "failedObjectRef"]) {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(serde_json::from_value(value.clone()).context(
                error::SerdeSnafu {
                    what: "failedObjectRef",
                },
            )?)),
            Err(e) if e.is_field_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_failed_object_ref(&mut self, object_ref: &ObjectRef) -> Result<()> {
        let value = serde_json::to_value(object_ref).context(error::SerdeSnafu {
            what: "failedObjectRef",
        })?;
        self.set_field(&["status", "failedObjectRef"], value)
    }

    pub fn unset_failed_object_ref(&mut self) {
        self.remove_field(&["status", "failedObjectRef"]);
    }

    /// Whether every readiness-like condition of this object is `True`. Objects that report no
    /// such conditions count as available. Only `type` and `status` are read so that conditions
    /// from arbitrary kinds are accepted.
    pub fn is_available(&self) -> bool {
        let conditions = match self.get_field(&["status", "conditions"]) {
            Ok(Value::Array(conditions)) => conditions,
            _ => return true,
        };
        conditions
            .iter()
            .filter(|c| {
                let type_ = c["type"].as_str().unwrap_or_default().to_lowercase();
                AVAILABILITY_MARKERS
                    .iter()
                    .any(|marker| type_.contains(marker))
            })
            .all(|c| c["status"].as_str() == Some(ConditionStatus::True.as_str()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn doc(status: Value) -> ResourceDocument {
        ResourceDocument::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web" },
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn upsert_by_type() {
        let mut d = doc(json!({}));
        d.set_condition(creating()).unwrap();
        d.set_condition(available()).unwrap();
        let conditions = d.conditions().unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, "Ready");
        assert_eq!(conditions[0].status, "True");
        assert_eq!(conditions[0].reason, "Available");
    }

    #[test]
    fn transition_time_kept_without_transition() {
        let mut d = doc(json!({}));
        let then: chrono::DateTime<Utc> = "2020-01-01T00:00:00Z".parse().unwrap();
        let mut first = unavailable();
        first.last_transition_time = Time(then);
        d.set_condition(first).unwrap();
        d.set_condition(reconcile_failed("backend said no")).unwrap();
        let condition = d.condition(CONDITION_READY).unwrap().unwrap();
        assert_eq!(condition.reason, "ReconcileFailed");
        assert_eq!(condition.last_transition_time, Time(then));
    }

    #[test]
    fn failure_reason_is_fixed() {
        let condition = reconcile_failed("POST /repos returned 503: maintenance");
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason, REASON_RECONCILE_FAILED);
        assert_eq!(condition.message, "POST /repos returned 503: maintenance");
        assert!(condition
            .reason
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn failed_object_ref_lifecycle() {
        let mut d = doc(json!({}));
        assert!(d.failed_object_ref().unwrap().is_none());
        let r = ObjectRef::new("v1", "Pod", "web-0", "default");
        d.set_failed_object_ref(&r).unwrap();
        assert_eq!(d.failed_object_ref().unwrap(), Some(r));
        d.unset_failed_object_ref();
        assert!(d.failed_object_ref().unwrap().is_none());
    }

    #[test]
    fn availability() {
        assert!(doc(json!({})).is_available());
        let d = doc(json!({ "conditions": [
            { "type": "Available", "status": "True" },
            { "type": "Progressing", "status": "False" },
        ]}));
        assert!(d.is_available());
        let d = doc(json!({ "conditions": [
            { "type": "Ready", "status": "False" },
        ]}));
        assert!(!d.is_available());
    }
}

//! Batch request shape and validation

use crate::error::ValidationError;
use crate::models::WorkloadDescriptor;
use serde::{Deserialize, Serialize};

/// Smallest accepted analysis window
pub const MIN_TIME_RANGE_HOURS: u32 = 1;

/// Largest accepted analysis window (one week)
pub const MAX_TIME_RANGE_HOURS: u32 = 168;

/// Request to analyze a batch of workloads in one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub project_id: String,
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_name: Option<String>,
    pub time_range_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workloads: Option<Vec<WorkloadDescriptor>>,
}

impl BatchRequest {
    pub fn new(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        time_range_hours: u32,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            namespace: None,
            workload_name: None,
            time_range_hours,
            workloads: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_workload_name(mut self, name: impl Into<String>) -> Self {
        self.workload_name = Some(name.into());
        self
    }

    pub fn with_workloads(mut self, workloads: Vec<WorkloadDescriptor>) -> Self {
        self.workloads = Some(workloads);
        self
    }

    /// Check identifiers and the time range; stops at the first problem
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("project_id", &self.project_id)?;
        validate_identifier("cluster_name", &self.cluster_name)?;
        if let Some(ns) = &self.namespace {
            validate_identifier("namespace", ns)?;
        }
        if let Some(name) = &self.workload_name {
            validate_identifier("workload_name", name)?;
        }
        if !(MIN_TIME_RANGE_HOURS..=MAX_TIME_RANGE_HOURS).contains(&self.time_range_hours) {
            return Err(ValidationError::TimeRangeOutOfBounds(self.time_range_hours));
        }
        if let Some(workloads) = &self.workloads {
            for w in workloads {
                validate_identifier("workloads.name", &w.name)?;
                validate_identifier("workloads.namespace", &w.namespace)?;
            }
        }
        Ok(())
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(ValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = BatchRequest::new("my-project", "prod-1", 24).with_namespace("shop");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_uppercase_identifier() {
        let req = BatchRequest::new("My-Project", "prod", 24);
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_identifier");
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn test_rejects_empty_cluster() {
        let req = BatchRequest::new("proj", "", 24);
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::MissingField("cluster_name")
        );
    }

    #[test]
    fn test_time_range_bounds() {
        assert!(BatchRequest::new("p", "c", 1).validate().is_ok());
        assert!(BatchRequest::new("p", "c", 168).validate().is_ok());
        assert_eq!(
            BatchRequest::new("p", "c", 0).validate().unwrap_err(),
            ValidationError::TimeRangeOutOfBounds(0)
        );
        assert_eq!(
            BatchRequest::new("p", "c", 169).validate().unwrap_err(),
            ValidationError::TimeRangeOutOfBounds(169)
        );
    }

    #[test]
    fn test_rejects_bad_workload_entry() {
        let req = BatchRequest::new("p", "c", 6)
            .with_workloads(vec![WorkloadDescriptor::new("web_frontend", "default")]);
        let err = req.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidIdentifier { field: "workloads.name", .. }
        ));
    }

    #[test]
    fn test_deserialize_minimal_request() {
        let req: BatchRequest = serde_json::from_str(
            r#"{"project_id": "p", "cluster_name": "c", "time_range_hours": 12}"#,
        )
        .unwrap();
        assert!(req.namespace.is_none());
        assert!(req.workloads.is_none());
        assert!(req.validate().is_ok());
    }
}

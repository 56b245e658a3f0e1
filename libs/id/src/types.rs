//! Typed ID definitions for scheduler resources.

use crate::{define_id, define_name};

// =============================================================================
// Cluster API resources
// =============================================================================

define_name!(ClusterId, "cluster id");
define_name!(InstanceId, "container instance id");
define_name!(TaskId, "task id");
define_name!(TaskDefinitionId, "task definition id");

// =============================================================================
// Desired state
// =============================================================================

define_name!(EnvironmentId, "environment id");
define_name!(RevisionId, "environment revision id");

// =============================================================================
// Reconciliation
// =============================================================================

define_id!(CycleId, "cyc");

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cycle_id_roundtrip() {
        let id = CycleId::new();
        let s = id.to_string();
        let parsed: CycleId = s.parse().unwrap();
        assert_eq!(id, parsed);
        assert!(s.starts_with("cyc_"));
    }

    #[test]
    fn test_cycle_id_invalid_prefix() {
        let result: Result<CycleId, _> = "req_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::InvalidPrefix { .. }
        ));
    }

    #[test]
    fn test_cycle_id_missing_separator() {
        let result: Result<CycleId, _> = "cyc01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::MissingSeparator));
    }

    #[test]
    fn test_cycle_id_invalid_ulid() {
        let result: Result<CycleId, _> = "cyc_invalid".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_cycle_ids_are_time_ordered() {
        let id1 = CycleId::new();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = CycleId::new();
        assert!(id1 < id2);
    }

    #[test]
    fn test_name_accepts_arn() {
        let arn = "arn:aws:ecs:us-east-1:123456789012:cluster/default";
        let cluster = ClusterId::parse(arn).unwrap();
        assert_eq!(cluster.as_str(), arn);
        assert_eq!(cluster.to_string(), arn);
    }

    #[test]
    fn test_name_rejects_empty() {
        assert!(TaskId::parse("").unwrap_err().is_empty());
    }

    #[test]
    fn test_name_rejects_surrounding_whitespace() {
        let err = InstanceId::parse(" instance1").unwrap_err();
        assert!(matches!(
            err,
            crate::IdError::Untrimmed {
                kind: "container instance id",
                ..
            }
        ));
    }

    #[test]
    fn test_name_json_is_bare_string() {
        let env = EnvironmentId::parse("env1").unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, "\"env1\"");

        let parsed: EnvironmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_name_json_rejects_empty() {
        let result: Result<RevisionId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn name_order_matches_string_order(a in "[a-z0-9/:-]{1,16}", b in "[a-z0-9/:-]{1,16}") {
            let ia = InstanceId::parse(a.clone()).unwrap();
            let ib = InstanceId::parse(b.clone()).unwrap();
            prop_assert_eq!(ia.cmp(&ib), a.cmp(&b));
        }
    }
}

//! Permission synthesis: access needs → minimal role statements.

use pipekit_core::definition::AccessNeed;
use pipekit_core::identity::{Capability, Effect, Permission, actions};
use pipekit_core::storage::PolicyScope;
use pipekit_core::{Error, LogicalId, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::registry::{RegisteredResource, ResourceKind, ResourceRegistry};

/// Statements of a single role, keyed by (effect, resource pattern).
///
/// Actions for the same key are unioned, so repeated grants collapse.
type StatementSet = BTreeMap<(Effect, String), BTreeSet<String>>;

/// Accumulates role statements from declared statements and access needs.
pub struct PermissionSynthesizer<'a> {
    registry: &'a ResourceRegistry,
    roles: BTreeMap<LogicalId, StatementSet>,
}

impl<'a> PermissionSynthesizer<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self {
            registry,
            roles: BTreeMap::new(),
        }
    }

    /// Add statements declared directly on a role.
    pub fn seed(&mut self, role: &LogicalId, statements: impl IntoIterator<Item = Permission>) {
        let set = self.roles.entry(role.clone()).or_default();
        for statement in statements {
            merge(set, statement);
        }
    }

    /// Make sure `role` appears in the output even with no statements.
    pub fn declare(&mut self, role: &LogicalId) {
        self.roles.entry(role.clone()).or_default();
    }

    /// Translate one access need into statements on the consumer's role.
    pub fn grant(&mut self, need: &AccessNeed) -> Result<()> {
        let role = self.registry.role_for(&need.consumer).ok_or_else(|| {
            Error::validation(
                format!("grant to '{}'", need.consumer),
                "consumer is neither a role nor a resource that owns one",
            )
        })?;

        let Some(target) = self.registry.get(&need.resource) else {
            if self.registry.is_broken(&need.resource) {
                return Ok(());
            }
            return Err(Error::UnknownResource {
                consumer: need.consumer.to_string(),
                resource: need.resource.to_string(),
            });
        };

        let statements = capability_statements(need.capability, target)?;
        debug!(
            role = %role,
            resource = %target.id,
            capability = %need.capability,
            "Granting access"
        );

        let set = self.roles.entry(role.clone()).or_default();
        for statement in statements {
            merge(set, statement);
        }
        Ok(())
    }

    /// Current statements of a role, in deterministic order.
    pub fn statements_for(&self, role: &LogicalId) -> Vec<Permission> {
        self.roles.get(role).map(render).unwrap_or_default()
    }

    pub fn finish(self) -> BTreeMap<LogicalId, Vec<Permission>> {
        self.roles
            .iter()
            .map(|(role, set)| (role.clone(), render(set)))
            .collect()
    }
}

fn merge(set: &mut StatementSet, statement: Permission) {
    set.entry((statement.effect, statement.resource))
        .or_default()
        .extend(statement.actions);
}

fn render(set: &StatementSet) -> Vec<Permission> {
    set.iter()
        .map(|((effect, resource), actions)| Permission {
            effect: *effect,
            actions: actions.clone(),
            resource: resource.clone(),
        })
        .collect()
}

/// The fixed capability table.
///
/// Any (kind, capability) pair not listed is an [`Error::UnsupportedCapability`].
pub fn capability_statements(
    capability: Capability,
    target: &RegisteredResource,
) -> Result<Vec<Permission>> {
    use actions::*;

    let arn = target.arn.as_str();
    let list_set = [LIST_BUCKET, GET_BUCKET_LOCATION];
    let log_set = [CREATE_LOG_GROUP, CREATE_LOG_STREAM, PUT_LOG_EVENTS];

    let statements = match (target.kind, capability) {
        (ResourceKind::Storage, Capability::Read) => {
            vec![Permission::allow([GET_OBJECT], PolicyScope::Objects.pattern(arn))]
        }
        (ResourceKind::Storage, Capability::ReadWrite) => vec![
            Permission::allow(
                [GET_OBJECT, PUT_OBJECT, DELETE_OBJECT],
                PolicyScope::Objects.pattern(arn),
            ),
            Permission::allow(list_set, PolicyScope::Bucket.pattern(arn)),
        ],
        (ResourceKind::Storage, Capability::List) => {
            vec![Permission::allow(list_set, PolicyScope::Bucket.pattern(arn))]
        }
        (ResourceKind::Build, Capability::Read) => vec![Permission::allow([BATCH_GET_BUILDS], arn)],
        (ResourceKind::Build, Capability::Invoke) => {
            vec![Permission::allow([START_BUILD, BATCH_GET_BUILDS], arn)]
        }
        (ResourceKind::Connection, Capability::Invoke) => {
            vec![Permission::allow([USE_CONNECTION], arn)]
        }
        (ResourceKind::Function, Capability::Read) => vec![Permission::allow([GET_FUNCTION], arn)],
        (ResourceKind::Function, Capability::Invoke) => {
            vec![Permission::allow([INVOKE_FUNCTION], arn)]
        }
        (ResourceKind::Function, Capability::Deploy) => vec![Permission::allow(
            [
                GET_FUNCTION,
                GET_FUNCTION_CONFIGURATION,
                UPDATE_FUNCTION_CODE,
                UPDATE_FUNCTION_CONFIGURATION,
            ],
            arn,
        )],
        (ResourceKind::LogGroup, Capability::ReadWrite) => vec![
            Permission::allow(log_set, arn),
            Permission::allow(log_set, format!("{}:*", arn)),
        ],
        _ => {
            return Err(Error::UnsupportedCapability {
                capability: capability.to_string(),
                target: format!("{} '{}'", target.kind, target.id),
            });
        }
    };
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipekit_config::DeploymentConfig;
    use pipekit_core::build::{BuildResource, BuildSource};
    use pipekit_core::storage::StorageResource;
    use pipekit_core::{Definition, Environment};

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn registry() -> ResourceRegistry {
        let mut definition = Definition::new("test");
        let mut bucket = StorageResource::private(id("Artifacts"));
        bucket.bucket_name = Some("artifacts-bucket".to_string());
        definition.storage.push(bucket);
        definition
            .builds
            .push(BuildResource::new(id("Build"), BuildSource::Pipeline));

        let config = DeploymentConfig::new(Environment::new("us-east-1", "123456789012").unwrap());
        let (registry, errors) = ResourceRegistry::build(&definition, &config);
        assert!(errors.is_empty(), "{errors:?}");
        registry
    }

    #[test]
    fn test_read_write_storage_statements() {
        let registry = registry();
        let mut synth = PermissionSynthesizer::new(&registry);
        synth
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::ReadWrite))
            .unwrap();

        let role = registry.role_for(&id("Build")).unwrap().clone();
        let statements = synth.statements_for(&role);
        assert_eq!(statements.len(), 2);

        let bucket = &statements[0];
        assert_eq!(bucket.resource, "arn:aws:s3:::artifacts-bucket");
        assert_eq!(
            bucket.actions.iter().collect::<Vec<_>>(),
            ["get-bucket-location", "list-bucket"]
        );

        let objects = &statements[1];
        assert_eq!(objects.resource, "arn:aws:s3:::artifacts-bucket/*");
        assert_eq!(
            objects.actions.iter().collect::<Vec<_>>(),
            ["delete-object", "get-object", "put-object"]
        );
    }

    #[test]
    fn test_grants_are_idempotent() {
        let registry = registry();
        let need = AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::Read);
        let role = registry.role_for(&id("Build")).unwrap().clone();

        let mut once = PermissionSynthesizer::new(&registry);
        once.grant(&need).unwrap();

        let mut twice = PermissionSynthesizer::new(&registry);
        twice.grant(&need).unwrap();
        twice.grant(&need).unwrap();

        assert_eq!(once.statements_for(&role), twice.statements_for(&role));
    }

    #[test]
    fn test_overlapping_grants_union() {
        let registry = registry();
        let role = registry.role_for(&id("Build")).unwrap().clone();

        let mut synth = PermissionSynthesizer::new(&registry);
        synth
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::Read))
            .unwrap();
        synth
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::ReadWrite))
            .unwrap();

        let mut reversed = PermissionSynthesizer::new(&registry);
        reversed
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::ReadWrite))
            .unwrap();
        reversed
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::Read))
            .unwrap();

        assert_eq!(synth.statements_for(&role), reversed.statements_for(&role));
        assert_eq!(synth.statements_for(&role).len(), 2);
    }

    #[test]
    fn test_unknown_resource() {
        let registry = registry();
        let mut synth = PermissionSynthesizer::new(&registry);
        let err = synth
            .grant(&AccessNeed::new(&id("Build"), &id("Missing"), Capability::Read))
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnknownResource {
                consumer: "Build".to_string(),
                resource: "Missing".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_capability_for_kind() {
        let registry = registry();
        let mut synth = PermissionSynthesizer::new(&registry);
        let err = synth
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::Invoke))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCapability { .. }));
        assert!(err.to_string().contains("invoke"));
    }

    #[test]
    fn test_declared_statements_merge_with_grants() {
        let registry = registry();
        let role = registry.role_for(&id("Build")).unwrap().clone();
        let mut synth = PermissionSynthesizer::new(&registry);
        synth.seed(
            &role,
            [Permission::allow(
                [actions::PUT_OBJECT],
                "arn:aws:s3:::artifacts-bucket/*",
            )],
        );
        synth
            .grant(&AccessNeed::new(&id("Build"), &id("Artifacts"), Capability::Read))
            .unwrap();

        let statements = synth.statements_for(&role);
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].actions.iter().collect::<Vec<_>>(),
            ["get-object", "put-object"]
        );
    }
}

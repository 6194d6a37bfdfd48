use serde_json::{Map, Value};
use tracing::{debug, trace};

use interoperator_dynamic::deep_merge;
use interoperator_metadata::{DynamicObject, ResourceClient};

use super::ResourceError;

const METADATA: &str = "metadata";
const STATUS: &str = "status";

/// outcome of applying an object
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Created(DynamicObject),
    Updated(DynamicObject),
    Unchanged(DynamicObject),
}

impl Applied {
    pub fn object(&self) -> &DynamicObject {
        match self {
            Self::Created(obj) | Self::Updated(obj) | Self::Unchanged(obj) => obj,
        }
    }

    pub fn into_object(self) -> DynamicObject {
        match self {
            Self::Created(obj) | Self::Updated(obj) | Self::Unchanged(obj) => obj,
        }
    }
}

/// portion of desired object merged into the live one.
/// Metadata contributes labels, annotations and owner references only,
/// status is never written.
pub fn merge_patch(desired: &DynamicObject) -> Result<Value, ResourceError> {
    let meta = &desired.metadata;
    let mut metadata = Map::new();
    if !meta.labels.is_empty() {
        metadata.insert("labels".to_owned(), serde_json::to_value(&meta.labels)?);
    }
    if !meta.annotations.is_empty() {
        metadata.insert("annotations".to_owned(), serde_json::to_value(&meta.annotations)?);
    }
    if !meta.owner_references.is_empty() {
        metadata.insert(
            "ownerReferences".to_owned(),
            serde_json::to_value(&meta.owner_references)?,
        );
    }

    let mut patch = Map::new();
    if !metadata.is_empty() {
        patch.insert(METADATA.to_owned(), Value::Object(metadata));
    }
    for (key, value) in &desired.data {
        if key != STATUS {
            patch.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(patch))
}

/// create object if absent, otherwise deep merge it into the live object
/// and update only when the merge changed something
pub async fn apply(
    client: &dyn ResourceClient,
    mut desired: DynamicObject,
) -> Result<Applied, ResourceError> {
    let ty = desired.type_meta();
    let key = desired.metadata.key();

    match client.get_opt(&ty, &key).await? {
        None => {
            desired.data.remove(STATUS);
            desired.metadata.uid.clear();
            desired.metadata.resource_version.clear();
            desired.metadata.deletion_timestamp = None;
            let created = client.create(desired).await?;
            debug!(%ty, %key, "created");
            Ok(Applied::Created(created))
        }
        Some(live) => {
            let current = live.to_value()?;
            let (merged, changed) = deep_merge(&current, &merge_patch(&desired)?);
            if !changed {
                trace!(%ty, %key, "up to date");
                return Ok(Applied::Unchanged(live));
            }
            let updated = client.update(DynamicObject::try_from(merged)?).await?;
            debug!(%ty, %key, "merged");
            Ok(Applied::Updated(updated))
        }
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use interoperator_metadata::{ObjectMeta, TypeMeta};
    use interoperator_metadata::client::MemoryClient;

    use super::*;

    fn deployment(replicas: u32) -> DynamicObject {
        let mut meta = ObjectMeta::new("d1", "ns");
        meta.set_label("app", "pg");
        DynamicObject::new(&TypeMeta::new("apps/v1", "Deployment"), meta)
            .with_field("spec", json!({"replicas": replicas}))
            .with_field("status", json!({"ready": false}))
    }

    #[test]
    fn test_merge_patch_only_carries_owned_metadata() {
        let mut desired = deployment(1);
        desired.metadata.uid = "abc".to_owned();
        desired.metadata.resource_version = "7".to_owned();
        assert_eq!(
            merge_patch(&desired).expect("patch"),
            json!({"metadata": {"labels": {"app": "pg"}}, "spec": {"replicas": 1}})
        );
    }

    #[fluvio_future::test]
    async fn test_apply_create_merge_unchanged() {
        let client = MemoryClient::default();

        let created = apply(&client, deployment(1)).await.expect("create");
        assert!(matches!(created, Applied::Created(_)));
        assert!(created.object().field("status").is_none());

        // field set by someone else survives the merge
        let mut live = created.into_object();
        live.data
            .insert("spec".to_owned(), json!({"replicas": 1, "paused": true}));
        client.update(live).await.expect("update");

        let updated = apply(&client, deployment(2)).await.expect("merge");
        assert!(matches!(updated, Applied::Updated(_)));
        assert_eq!(
            updated.object().field("spec"),
            Some(&json!({"replicas": 2, "paused": true}))
        );

        let again = apply(&client, deployment(2)).await.expect("unchanged");
        assert!(matches!(again, Applied::Unchanged(_)));
    }
}

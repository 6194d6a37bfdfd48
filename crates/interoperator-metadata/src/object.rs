use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::meta::{ObjectMeta, OwnerReference, ResourceRef, TypeMeta};

/// static description of a custom resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crd {
    pub group: &'static str,
    pub version: &'static str,
    pub names: CrdNames,
    pub namespaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdNames {
    pub kind: &'static str,
    pub plural: &'static str,
    pub singular: &'static str,
}

impl Crd {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_owned()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta::new(self.api_version(), self.names.kind)
    }

    /// name of the CustomResourceDefinition object
    pub fn definition_name(&self) -> String {
        format!("{}.{}", self.names.plural, self.group)
    }
}

/// typed portion of a custom resource
pub trait Spec:
    Sized + Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync + 'static
{
    type Status: Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync + 'static;

    fn metadata() -> &'static Crd;

    fn type_meta() -> TypeMeta {
        Self::metadata().type_meta()
    }

    fn kind() -> &'static str {
        Self::metadata().names.kind
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("expected kind {expected}, found {found}")]
    Kind { expected: TypeMeta, found: TypeMeta },
    #[error("object is not a resource: {0}")]
    Serde(#[from] serde_json::Error),
}

/// untyped object: type, metadata and the remaining fields as tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DynamicObject {
    pub fn new(ty: &TypeMeta, metadata: ObjectMeta) -> Self {
        Self {
            api_version: ty.api_version.clone(),
            kind: ty.kind.clone(),
            metadata,
            data: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_owned(), value);
        self
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta::new(&self.api_version, &self.kind)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(&self.type_meta(), &self.metadata.name, &self.metadata.namespace)
    }

    /// owner reference pointing at this object
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn to_value(&self) -> Result<Value, ConvertError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl TryFrom<Value> for DynamicObject {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}

/// custom resource with typed spec and status
#[derive(Debug, Clone, PartialEq)]
pub struct Object<S: Spec> {
    pub metadata: ObjectMeta,
    pub spec: S,
    pub status: S::Status,
}

impl<S: Spec> Object<S> {
    pub fn new(metadata: ObjectMeta, spec: S) -> Self {
        Self {
            metadata,
            spec,
            status: S::Status::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn into_dynamic(self) -> Result<DynamicObject, ConvertError> {
        let mut data = Map::new();
        data.insert("spec".to_owned(), serde_json::to_value(self.spec)?);
        data.insert("status".to_owned(), serde_json::to_value(self.status)?);
        Ok(DynamicObject {
            api_version: S::metadata().api_version(),
            kind: S::kind().to_owned(),
            metadata: self.metadata,
            data,
        })
    }

    pub fn from_dynamic(mut obj: DynamicObject) -> Result<Self, ConvertError> {
        let expected = S::type_meta();
        if obj.kind != expected.kind {
            return Err(ConvertError::Kind {
                expected,
                found: obj.type_meta(),
            });
        }

        let spec = match obj.data.remove("spec") {
            Some(Value::Null) | None => S::default(),
            Some(spec) => serde_json::from_value(spec)?,
        };
        let status = match obj.data.remove("status") {
            Some(Value::Null) | None => S::Status::default(),
            Some(status) => serde_json::from_value(status)?,
        };

        Ok(Self {
            metadata: obj.metadata,
            spec,
            status,
        })
    }
}

use serde::{Deserialize, Serialize};

use crate::object::{Crd, CrdNames, Object, Spec};

const CLUSTER_API: Crd = Crd {
    group: "resource.servicefabrik.io",
    version: "v1alpha1",
    names: CrdNames {
        kind: "SFCluster",
        plural: "sfclusters",
        singular: "sfcluster",
    },
    namespaced: true,
};

/// registration of a cluster, object name is the cluster id
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    /// secret in the same namespace holding the connection material
    pub secret_ref: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {}

impl Spec for ClusterSpec {
    type Status = ClusterStatus;

    fn metadata() -> &'static Crd {
        &CLUSTER_API
    }
}

pub type Cluster = Object<ClusterSpec>;

// object bookkeeping
pub const FINALIZER_NAME: &str = "interoperator.servicefabrik.io";
pub const LAST_OPERATION_KEY: &str = "lastOperation";
pub const ERROR_COUNT_KEY: &str = "errorCount";
pub const CLUSTER_SCOPED_ANNOTATION: &str = "interoperator.servicefabrik.io/cluster-scoped";

// retry budget shared by the error handler and local update loops
pub const ERROR_THRESHOLD: u32 = 10;

// clusters
pub const DEFAULT_MASTER_CLUSTER_ID: &str = "1";
pub const OWN_CLUSTER_ID_ENV_KEY: &str = "CLUSTER_ID";
pub const DEFAULT_SERVICE_FABRIK_NAMESPACE: &str = "default";

// provisioner bootstrap
pub const PROVISIONER_NAME: &str = "provisioner";
pub const PROVISIONER_CLUSTER_ROLE_BINDING: &str = "provisioner-clusterrolebinding";
pub const CONFIG_MAP_NAME: &str = "interoperator-config";
pub const CONFIG_MAP_KEY: &str = "config";

// user facing text once retries are exhausted
pub const TIMEOUT_DESCRIPTION: &str =
    "Service Broker Error, status code: ETIMEDOUT, error code: 10008";

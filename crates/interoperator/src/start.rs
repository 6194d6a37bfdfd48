//!
//! # Startup wiring
//!
//! Builds the cluster registry, the watch bridge and the resource manager,
//! then hands them to the white listed controllers.
//!

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use interoperator_dynamic::parse_manifest;
use interoperator_metadata::{DynamicObject, ObjectKey, SharedClient, Spec};
use interoperator_metadata::instance::ServiceInstanceSpec;

use crate::config::StartConfig;
use crate::controllers::{ControllerContext, start_controllers};
use crate::registry::{ClientFactory, DefaultClusterRegistry};
use crate::resources::{DefaultResourceManager, HandlebarsRenderer, apply};
use crate::runtime::{RequeuePolicy, RetryPolicy, WorkQueue};
use crate::watch::WatchManager;

/// running controllers
#[derive(Debug)]
pub struct Interoperator {
    queues: Vec<WorkQueue<ObjectKey>>,
    watch: Arc<WatchManager>,
}

impl Interoperator {
    pub fn controller_count(&self) -> usize {
        self.queues.len()
    }

    pub fn watch(&self) -> &Arc<WatchManager> {
        &self.watch
    }

    /// stop workers and sources of every controller
    pub fn shutdown(&self) {
        for queue in &self.queues {
            queue.shutdown();
        }
    }
}

/// build the shared context of the controllers
pub fn create_context(
    client: SharedClient,
    factory: Arc<dyn ClientFactory>,
    config: StartConfig,
) -> ControllerContext {
    let registry = DefaultClusterRegistry::shared(
        config.own_cluster_id.clone(),
        client.clone(),
        config.namespace.clone(),
        factory,
    );
    let watch = Arc::new(WatchManager::new(
        registry.clone(),
        vec![ServiceInstanceSpec::type_meta()],
        config.interoperator.watch_reconnect_delay,
    ));
    let resources = Arc::new(DefaultResourceManager::new(
        Arc::new(HandlebarsRenderer::default()),
        config.namespace.clone(),
    ));
    let retry = RetryPolicy {
        delay: config.interoperator.retry_delay,
        ..Default::default()
    };

    ControllerContext {
        client,
        registry,
        watch,
        resources,
        config,
        retry,
        requeue: RequeuePolicy::default(),
    }
}

/// start controllers of context, the master also bridges its sister clusters
pub async fn start_with_context(ctx: ControllerContext) -> Interoperator {
    let queues = start_controllers(&ctx);
    if ctx.config.is_master() {
        if let Err(err) = ctx.watch.start().await {
            error!(%err, "unable to bridge sister clusters");
        }
    }
    info!(controllers = queues.len(), "interoperator started");
    Interoperator {
        queues,
        watch: ctx.watch,
    }
}

pub async fn start(
    client: SharedClient,
    factory: Arc<dyn ClientFactory>,
    config: StartConfig,
) -> Interoperator {
    start_with_context(create_context(client, factory, config)).await
}

/// apply every manifest of a directory to the client, files in name order
pub async fn seed_manifests(client: &SharedClient, dir: &Path) -> Result<usize> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|path| {
        matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        )
    });
    paths.sort();

    let mut count = 0;
    for path in paths {
        let text = fs::read_to_string(&path)?;
        for value in parse_manifest(&text).with_context(|| format!("parsing {}", path.display()))? {
            let obj = DynamicObject::try_from(value)?;
            debug!(resource = %obj.resource_ref(), "seeding");
            apply(client.as_ref(), obj).await?;
            count += 1;
        }
    }
    info!(count, dir = %dir.display(), "seeded manifests");
    Ok(count)
}

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, error, instrument, warn};

use interoperator_dynamic::parse_manifest;
use interoperator_metadata::{DynamicObject, ObjectKey, ResourceClient, ResourceRef, Spec};
use interoperator_metadata::builtin::is_cluster_scoped_kind;
use interoperator_metadata::catalog::{Plan, PlanSpec, Service, ServiceSpec};
use interoperator_metadata::constants::{
    CLUSTER_SCOPED_ANNOTATION, DEFAULT_SERVICE_FABRIK_NAMESPACE,
};
use interoperator_metadata::instance::{ServiceBindingSpec, ServiceInstance, ServiceInstanceSpec};

use super::{
    HandlebarsRenderer, ResourceError, ResourceManager, ResourceRequest, SOURCES_ACTION,
    STATUS_ACTION, Status, TemplateRenderer, apply,
};

/// resource manager rendering plan templates
#[derive(Debug, Clone)]
pub struct DefaultResourceManager {
    renderer: Arc<dyn TemplateRenderer>,
    catalog_namespace: String,
}

impl Default for DefaultResourceManager {
    fn default() -> Self {
        Self::new(
            Arc::new(HandlebarsRenderer::default()),
            DEFAULT_SERVICE_FABRIK_NAMESPACE,
        )
    }
}

/// everything a template can refer to
struct TemplateInput {
    values: Value,
    plan: Plan,
    instance: ServiceInstance,
}

impl DefaultResourceManager {
    pub fn new(renderer: Arc<dyn TemplateRenderer>, catalog_namespace: impl Into<String>) -> Self {
        Self {
            renderer,
            catalog_namespace: catalog_namespace.into(),
        }
    }

    async fn find_plan(
        &self,
        client: &dyn ResourceClient,
        plan_id: &str,
    ) -> Result<Plan, ResourceError> {
        client
            .list_obj::<PlanSpec>(Some(&self.catalog_namespace))
            .await?
            .into_iter()
            .find(|plan| plan.spec.id == plan_id)
            .ok_or_else(|| ResourceError::NotFound(format!("plan {plan_id}")))
    }

    async fn find_service(
        &self,
        client: &dyn ResourceClient,
        service_id: &str,
    ) -> Result<Service, ResourceError> {
        client
            .list_obj::<ServiceSpec>(Some(&self.catalog_namespace))
            .await?
            .into_iter()
            .find(|service| service.spec.id == service_id)
            .ok_or_else(|| ResourceError::NotFound(format!("service {service_id}")))
    }

    async fn template_input(
        &self,
        client: &dyn ResourceClient,
        request: ResourceRequest<'_>,
    ) -> Result<TemplateInput, ResourceError> {
        let instance_key = ObjectKey::new(request.namespace, request.instance_id);
        let instance = client
            .get_opt(&ServiceInstanceSpec::type_meta(), &instance_key)
            .await?
            .ok_or_else(|| ResourceError::NotFound(format!("instance {instance_key}")))?;

        let binding = if request.binding_id.is_empty() {
            Value::Null
        } else {
            let binding_key = ObjectKey::new(request.namespace, request.binding_id);
            client
                .get_opt(&ServiceBindingSpec::type_meta(), &binding_key)
                .await?
                .ok_or_else(|| ResourceError::NotFound(format!("binding {binding_key}")))?
                .to_value()?
        };

        let plan = self.find_plan(client, request.plan_id).await?;
        let service = self.find_service(client, request.service_id).await?;

        let values = json!({
            "instance": instance.to_value()?,
            "binding": binding,
            "plan": plan.clone().into_dynamic()?.to_value()?,
            "service": service.into_dynamic()?.to_value()?,
            "action": request.action,
            "namespace": request.namespace,
        });

        Ok(TemplateInput {
            values,
            plan,
            instance: ServiceInstance::from_dynamic(instance)?,
        })
    }

    fn render(&self, plan: &Plan, action: &str, values: &Value) -> Result<String, ResourceError> {
        let template = plan.spec.template(action).ok_or_else(|| {
            ResourceError::NotFound(format!("{action} template of plan {}", plan.spec.id))
        })?;
        Ok(self.renderer.render(template, values)?)
    }

    /// references the status template depends on, keyed by source name
    fn sources(
        &self,
        input: &TemplateInput,
        namespace: &str,
    ) -> Result<BTreeMap<String, ResourceRef>, ResourceError> {
        if input.plan.spec.template(SOURCES_ACTION).is_none() {
            return Ok(fallback_sources(&input.instance.status.resources));
        }

        let text = self.render(&input.plan, SOURCES_ACTION, &input.values)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut sources: BTreeMap<String, ResourceRef> = serde_yaml::from_str(&text)?;
        for source in sources.values_mut() {
            if source.namespace.is_empty() && !is_cluster_scoped_kind(&source.kind) {
                source.namespace = namespace.to_owned();
            }
        }
        Ok(sources)
    }
}

/// sources named after the lower cased kind, repeated kinds get the object name appended
fn fallback_sources(resources: &[ResourceRef]) -> BTreeMap<String, ResourceRef> {
    let mut sources = BTreeMap::new();
    for resource in resources {
        let kind = resource.kind.to_lowercase();
        let name = if sources.contains_key(&kind) {
            format!("{kind}_{}", resource.name)
        } else {
            kind
        };
        sources.insert(name, resource.clone());
    }
    sources
}

fn is_cluster_scoped(resource: &DynamicObject) -> bool {
    resource.metadata.annotation(CLUSTER_SCOPED_ANNOTATION) == Some("true")
        || is_cluster_scoped_kind(&resource.kind)
}

#[async_trait]
impl ResourceManager for DefaultResourceManager {
    #[instrument(
        skip(self, client),
        fields(instance = request.instance_id, action = request.action)
    )]
    async fn compute_expected_resources(
        &self,
        client: &dyn ResourceClient,
        request: ResourceRequest<'_>,
    ) -> Result<Vec<DynamicObject>, ResourceError> {
        let input = self.template_input(client, request).await?;
        let text = self.render(&input.plan, request.action, &input.values)?;

        let resources = parse_manifest(&text)?
            .into_iter()
            .map(DynamicObject::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = resources.len(), "expected resources");
        Ok(resources)
    }

    fn set_owner_reference(&self, owner: &DynamicObject, resources: &mut [DynamicObject]) {
        let owner_ref = owner.owner_reference();
        for resource in resources.iter_mut() {
            if is_cluster_scoped(resource) {
                continue;
            }
            if resource.metadata.namespace.is_empty() {
                resource.metadata.namespace = owner.metadata.namespace.clone();
            }
            if !resource.metadata.is_owned_by(&owner_ref.uid) {
                resource.metadata.owner_references.push(owner_ref.clone());
            }
        }
    }

    async fn reconcile_resources(
        &self,
        target: &dyn ResourceClient,
        expected: Vec<DynamicObject>,
        previous: &[ResourceRef],
    ) -> Result<Vec<ResourceRef>, ResourceError> {
        let mut refs = previous.to_vec();
        for resource in expected {
            let reference = resource.resource_ref();
            if let Err(err) = apply(target, resource).await {
                error!(%reference, %err, "reconcile resource failed");
                return Err(err);
            }
            if !refs.contains(&reference) {
                refs.push(reference);
            }
        }
        Ok(refs)
    }

    #[instrument(
        skip(self, client, target),
        fields(instance = request.instance_id, action = request.action)
    )]
    async fn compute_status(
        &self,
        client: &dyn ResourceClient,
        target: &dyn ResourceClient,
        request: ResourceRequest<'_>,
    ) -> Result<Status, ResourceError> {
        let mut input = self.template_input(client, request).await?;

        let mut live = Map::new();
        for (name, source) in self.sources(&input, request.namespace)? {
            let obj = target
                .get_opt(&source.type_meta(), &source.key())
                .await?
                .ok_or_else(|| ResourceError::NotFound(format!("source {name} ({source})")))?;
            live.insert(name, obj.to_value()?);
        }
        if let Some(values) = input.values.as_object_mut() {
            values.insert("sources".to_owned(), Value::Object(live));
        }

        let text = self.render(&input.plan, STATUS_ACTION, &input.values)?;
        Ok(Status::from_yaml(&text)?)
    }

    async fn delete_sub_resources(
        &self,
        target: &dyn ResourceClient,
        resources: &[ResourceRef],
    ) -> Result<Vec<ResourceRef>, ResourceError> {
        let mut remaining = vec![];
        let mut first_error = None;

        for reference in resources {
            let ty = reference.type_meta();
            let key = reference.key();
            match target.delete(&ty, &key).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    warn!(%reference, %err, "delete failed");
                    first_error.get_or_insert(err);
                    remaining.push(reference.clone());
                    continue;
                }
            }

            // objects with finalizers linger after delete
            match target.get_opt(&ty, &key).await {
                Ok(None) => {}
                Ok(Some(_)) => remaining.push(reference.clone()),
                Err(err) => {
                    first_error.get_or_insert(err);
                    remaining.push(reference.clone());
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(remaining),
        }
    }
}

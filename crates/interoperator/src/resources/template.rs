use std::fmt::Debug;

use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde_json::Value;

use interoperator_metadata::catalog::TemplateSpec;

pub const STATIC_TEMPLATE: &str = "static";
pub const HANDLEBARS_TEMPLATE: &str = "handlebars";

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("unsupported template type {0}")]
    Unsupported(String),
    #[error("template {action}: {source}")]
    Handlebars {
        action: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

/// renders plan templates into manifest text
pub trait TemplateRenderer: Send + Sync + Debug {
    fn render(&self, template: &TemplateSpec, values: &Value) -> Result<String, RenderError>;
}

handlebars_helper!(to_json: |value: Json| value.to_string());

#[derive(Debug)]
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("toJson", Box::new(to_json));
        Self { registry }
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &TemplateSpec, values: &Value) -> Result<String, RenderError> {
        match template.template_type.as_str() {
            STATIC_TEMPLATE => Ok(template.content.clone()),
            HANDLEBARS_TEMPLATE => self
                .registry
                .render_template(&template.content, values)
                .map_err(|source| RenderError::Handlebars {
                    action: template.action.clone(),
                    source: Box::new(source),
                }),
            other => Err(RenderError::Unsupported(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::*;

    fn template(template_type: &str, content: &str) -> TemplateSpec {
        TemplateSpec {
            action: "provision".to_owned(),
            template_type: template_type.to_owned(),
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_static_template() {
        let renderer = HandlebarsRenderer::default();
        let out = renderer
            .render(&template("static", "kind: {{ untouched }}"), &json!({}))
            .expect("render");
        assert_eq!(out, "kind: {{ untouched }}");
    }

    #[test]
    fn test_handlebars_template() {
        let renderer = HandlebarsRenderer::default();
        let values = json!({
            "instance": {"metadata": {"name": "i1"}, "spec": {"parameters": {"size": "<1Gi>"}}}
        });
        let out = renderer
            .render(
                &template(
                    "handlebars",
                    "name: {{ instance.metadata.name }}\nsize: {{ instance.spec.parameters.size }}\nparams: {{ toJson instance.spec.parameters }}",
                ),
                &values,
            )
            .expect("render");
        assert_eq!(out, "name: i1\nsize: <1Gi>\nparams: {\"size\":\"<1Gi>\"}");
    }

    #[test]
    fn test_unsupported_type() {
        let renderer = HandlebarsRenderer::default();
        assert!(matches!(
            renderer.render(&template("gotemplate", ""), &json!({})),
            Err(RenderError::Unsupported(_))
        ));
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DynamicError {
    #[error("document {index} is not valid yaml: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("document {index} is not a mapping")]
    NotMapping { index: usize },
    #[error("document {index} has no {field}")]
    MissingField { index: usize, field: &'static str },
}

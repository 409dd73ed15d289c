//! Registry of operation kinds.

use crate::error::{Error, Result};
use crate::operation::{Chain, Operation, OperationDecl};
use crate::workflow::Step;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Options for one operation, as written in a workflow file or on the command line.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Builds configured operations of one kind.
pub trait OperationFactory: Send + Sync {
    /// Describe this kind: id and accepted options.
    fn decl(&self) -> &OperationDecl;

    /// Build an operation from options.
    ///
    /// Invalid options fail here, before any row is touched.
    fn build(&self, options: &Options) -> Result<Box<dyn Operation>>;
}

/// Deserialize `options` into a typed configuration for operation `id`.
pub fn parse_options<T: DeserializeOwned>(id: &str, options: &Options) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .map_err(|e| Error::config(format!("invalid options for '{id}': {e}")))
}

/// Registry of available operation kinds, keyed by id.
#[derive(Clone, Default)]
pub struct Registry {
    factories: IndexMap<String, Arc<dyn OperationFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation kind. A kind with the same id is replaced.
    pub fn register(&mut self, factory: impl OperationFactory + 'static) {
        let id = factory.decl().id.clone();
        self.factories.insert(id, Arc::new(factory));
    }

    /// Register an already boxed operation kind.
    pub fn register_boxed(&mut self, factory: Box<dyn OperationFactory>) {
        let id = factory.decl().id.clone();
        self.factories.insert(id, Arc::from(factory));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn OperationFactory>> {
        self.factories.get(id).cloned()
    }

    pub fn get_decl(&self, id: &str) -> Option<&OperationDecl> {
        self.factories.get(id).map(|f| f.decl())
    }

    /// All declarations, in registration order.
    pub fn declarations(&self) -> impl Iterator<Item = &OperationDecl> {
        self.factories.values().map(|f| f.decl())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build the operation a workflow step describes.
    pub fn build(&self, step: &Step) -> Result<Box<dyn Operation>> {
        let factory = self
            .factories
            .get(&step.operation)
            .ok_or_else(|| Error::config(format!("unknown operation '{}'", step.operation)))?;
        let decl = factory.decl();

        let missing: Vec<&str> = decl
            .required_options()
            .filter(|name| !step.options.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            let context = match &step.id {
                Some(id) => format!("step '{id}': "),
                None => String::new(),
            };
            return Err(Error::config(format!(
                "{context}operation '{}' requires option(s): {}",
                decl.id,
                missing.join(", ")
            )));
        }
        for name in step.options.keys() {
            if !decl.options.contains_key(name) {
                warn!(step = step.label(), operation = %decl.id, option = %name, "ignoring unknown option");
            }
        }

        debug!(step = step.label(), operation = %decl.id, "building operation");
        factory.build(&step.options)
    }

    /// Build every step and chain them into one operation.
    ///
    /// A single step is returned as is.
    pub fn build_chain(&self, steps: &[Step]) -> Result<Box<dyn Operation>> {
        let mut ops = steps
            .iter()
            .map(|step| self.build(step))
            .collect::<Result<Vec<_>>>()?;
        match ops.len() {
            0 => Err(Error::config("no steps to run")),
            1 => Ok(ops.remove(0)),
            _ => Ok(Box::new(Chain::new(ops))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyError;
    use crate::operation::from_fn;
    use crate::row::{Row, RowExt};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct UpperConfig {
        column: String,
        #[serde(default = "default_output")]
        output: String,
    }

    fn default_output() -> String {
        "upper".into()
    }

    struct Upper {
        decl: OperationDecl,
    }

    impl Upper {
        fn new() -> Self {
            Self {
                decl: OperationDecl::new("upper")
                    .description("Uppercase a column")
                    .required("column", "Column to read")
                    .option("output", "Column to write"),
            }
        }
    }

    impl OperationFactory for Upper {
        fn decl(&self) -> &OperationDecl {
            &self.decl
        }

        fn build(&self, options: &Options) -> Result<Box<dyn Operation>> {
            let config: UpperConfig = parse_options("upper", options)?;
            let output = config.output.clone();
            Ok(Box::new(
                from_fn("upper", move |row: &Row| {
                    Ok::<_, ApplyError>(
                        Row::new().with(&config.output, row.require(&config.column)?.to_uppercase()),
                    )
                })
                .done_when([output]),
            ))
        }
    }

    fn step(operation: &str, options: serde_json::Value) -> Step {
        let serde_json::Value::Object(options) = options else {
            panic!("options must be an object");
        };
        Step {
            operation: operation.into(),
            options,
            id: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry.register(Upper::new());

        assert_eq!(registry.len(), 1);
        assert!(registry.get("upper").is_some());
        assert_eq!(registry.get_decl("upper").unwrap().description, "Uppercase a column");
        assert_eq!(
            registry.declarations().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            ["upper"]
        );
    }

    #[test]
    fn test_build_step() {
        let mut registry = Registry::new();
        registry.register(Upper::new());

        let op = registry.build(&step("upper", json!({"column": "name"}))).unwrap();
        let delta = op.apply(&Row::new().with("name", "ada")).unwrap();
        assert_eq!(delta, Row::new().with("upper", "ADA"));
        assert!(op.has_previous_result(&Row::new().with("upper", "ADA")));
    }

    #[test]
    fn test_unknown_operation() {
        let registry = Registry::new();
        let err = registry.build(&step("nope", json!({}))).err().unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("unknown operation 'nope'")));
    }

    #[test]
    fn test_missing_required_option() {
        let mut registry = Registry::new();
        registry.register(Upper::new());

        let err = registry.build(&step("upper", json!({}))).err().unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("column")), "got {err:?}");
    }

    #[test]
    fn test_missing_option_names_the_step() {
        let mut registry = Registry::new();
        registry.register(Upper::new());

        let mut labelled = step("upper", json!({}));
        labelled.id = Some("shout".into());
        assert_eq!(labelled.label(), "shout");

        let err = registry.build_chain(&[labelled]).err().unwrap();
        assert!(
            matches!(err, Error::Config(ref m) if m.starts_with("step 'shout': operation 'upper'")),
            "got {err:?}"
        );
    }

    #[test]
    fn test_parse_options_rejects_wrong_type() {
        let serde_json::Value::Object(options) = json!({"column": 3}) else {
            unreachable!()
        };
        let err = parse_options::<UpperConfig>("upper", &options).err().unwrap();
        assert!(err.to_string().contains("invalid options for 'upper'"));
    }

    #[test]
    fn test_build_chain() {
        let mut registry = Registry::new();
        registry.register(Upper::new());

        let steps = vec![
            step("upper", json!({"column": "a", "output": "a2"})),
            step("upper", json!({"column": "a2", "output": "a3"})),
        ];
        let chain = registry.build_chain(&steps).unwrap();
        let delta = chain.apply(&Row::new().with("a", "x")).unwrap();
        assert_eq!(delta, Row::new().with("a2", "X").with("a3", "X"));

        assert!(registry.build_chain(&[]).is_err());
    }
}

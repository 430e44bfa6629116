mod layer;

pub use layer::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// A named layer and the names of the layers (or external inputs) it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub inputs: Vec<String>,
    pub spec: LayerSpec,
}

/// An ordered, name-keyed layer graph.
///
/// Layers may only reference names that are already present (or one of the
/// declared external inputs), so the graph is a DAG by construction and a
/// dangling reference is caught when the layer is added, not when the
/// framework consumes the definition.
#[derive(Debug, Clone, Default)]
pub struct NetSpec {
    inputs: Vec<String>,
    layers: Vec<Layer>,
    index: HashMap<String, usize>,
}

impl NetSpec {
    /// Create a graph with a single declared external input.
    pub fn with_input(input: &str) -> Self {
        Self {
            inputs: vec![input.to_string()],
            layers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a layer. Fails if `name` is taken or any input is undefined.
    pub fn add(&mut self, name: &str, inputs: &[&str], spec: LayerSpec) -> Result<()> {
        if self.index.contains_key(name) || self.inputs.iter().any(|i| i == name) {
            return Err(GraphError::DuplicateLayer(name.to_string()));
        }
        for input in inputs {
            if !self.index.contains_key(*input) && !self.inputs.iter().any(|i| i == input) {
                return Err(GraphError::UndefinedInput {
                    layer: name.to_string(),
                    input: input.to_string(),
                });
            }
        }
        self.index.insert(name.to_string(), self.layers.len());
        self.layers.push(Layer {
            name: name.to_string(),
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            spec,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.index.get(name).map(|&i| &self.layers[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared external input names.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Layers in insertion order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relu() -> LayerSpec {
        LayerSpec::Relu(ReluSpec { in_place: true })
    }

    #[test]
    fn add_resolves_external_input() {
        let mut net = NetSpec::with_input("data");
        net.add("a", &["data"], relu()).unwrap();
        net.add("b", &["a"], relu()).unwrap();
        assert_eq!(net.len(), 2);
        assert_eq!(net.get("b").unwrap().inputs, vec!["a".to_string()]);
    }

    #[test]
    fn add_rejects_undefined_input() {
        let mut net = NetSpec::with_input("data");
        let err = net.add("a", &["missing"], relu()).unwrap_err();
        assert_eq!(
            err,
            GraphError::UndefinedInput {
                layer: "a".to_string(),
                input: "missing".to_string(),
            }
        );
        assert!(net.is_empty());
    }

    #[test]
    fn add_rejects_duplicate_name() {
        let mut net = NetSpec::with_input("data");
        net.add("a", &["data"], relu()).unwrap();
        assert_eq!(
            net.add("a", &["data"], relu()).unwrap_err(),
            GraphError::DuplicateLayer("a".to_string())
        );
        assert_eq!(
            net.add("data", &["a"], relu()).unwrap_err(),
            GraphError::DuplicateLayer("data".to_string())
        );
    }

    #[test]
    fn layers_keep_insertion_order() {
        let mut net = NetSpec::with_input("data");
        for name in ["a", "b", "c"] {
            net.add(name, &["data"], relu()).unwrap();
        }
        let order: Vec<_> = net.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}

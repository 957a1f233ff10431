// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Immutable, validated execution plan of one loaded model.
//!
//! A [`ModelDescriptor`] is built from a decoded graph document plus the
//! shapes declared by the caller. Building resolves every weight, orders the
//! nodes topologically, drops nodes that do not feed the graph output, infers
//! every intermediate shape and checks the result against the declaration.
//! After that nothing about the model can fail for structural reasons at
//! predict time.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::path::PathBuf;

use serde::Serialize;

use super::format::{resolve_initializer, GraphDocument, InitializerDef, NodeDef};
use crate::engine::ops::{canonical_name, Operator, ParamSource, Weight};
use crate::engine::InferenceError;
use crate::tensor::Shape;

/// Where a model came from.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub path: PathBuf,
    /// SHA-256 of the file bytes, lowercase hex.
    pub fingerprint: String,
    pub size_bytes: u64,
}

/// One step of the execution plan.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub op: Operator,
    /// Value slots read by this node.
    pub inputs: Vec<usize>,
    /// Value slot written by this node.
    pub output: usize,
    pub output_shape: Shape,
}

/// A fully validated model, shared read-only between predictions.
#[derive(Debug)]
pub struct ModelDescriptor {
    metadata: ModelMetadata,
    input_shape: Shape,
    output_shape: Shape,
    nodes: Vec<Node>,
    /// Index of the last node reading each value slot. `None` for the graph
    /// output and for values nobody reads.
    last_use: Vec<Option<usize>>,
    output_slot: usize,
    weight_bytes: usize,
    peak_activation_bytes: usize,
    total_cost: usize,
}

/// Slot of the graph input in every plan.
pub const INPUT_SLOT: usize = 0;

impl ModelDescriptor {
    /// Validate `document` against the declared shapes and build the plan.
    pub fn build(
        metadata: ModelMetadata,
        document: &GraphDocument,
        payload: Option<&[u8]>,
        input_shape: Shape,
        output_shape: Shape,
    ) -> Result<Self, InferenceError> {
        input_shape.validate()?;
        output_shape.validate()?;
        check_embedded("input", document.input_shape, input_shape)?;
        check_embedded("output", document.output_shape, output_shape)?;

        for def in &document.nodes {
            if canonical_name(&def.op).is_none() {
                return Err(InferenceError::UnsupportedOperator {
                    op: def.op.clone(),
                    node: def.name.clone(),
                });
            }
        }

        let order = plan_order(document)?;

        // Slot 0 is the graph input; node `i` of the plan writes slot `i + 1`.
        let mut slots: HashMap<&str, usize> = HashMap::new();
        slots.insert(document.input.as_str(), INPUT_SLOT);
        for (i, &idx) in order.iter().enumerate() {
            slots.insert(document.nodes[idx].output.as_str(), i + 1);
        }

        let mut shapes = vec![input_shape];
        let mut nodes = Vec::with_capacity(order.len());
        let mut total_cost = 0usize;
        for &idx in &order {
            let def = &document.nodes[idx];
            let params = NodeParams {
                node: def,
                initializers: &document.initializers,
                payload,
            };
            let op = Operator::from_node(def, &params)?;
            let inputs: Vec<usize> = def.inputs.iter().map(|v| slots[v.as_str()]).collect();
            let in_shapes: Vec<Shape> = inputs.iter().map(|s| shapes[*s]).collect();
            let out_shape = op.infer_shape(&in_shapes).map_err(|e| match e {
                InferenceError::ShapeMismatch(detail) => InferenceError::ShapeMismatch(format!(
                    "node '{}': {}",
                    def.name, detail
                )),
                other => other,
            })?;
            out_shape.validate()?;
            total_cost = total_cost.saturating_add(op.cost(&in_shapes, out_shape));
            shapes.push(out_shape);
            nodes.push(Node {
                name: def.name.clone(),
                op,
                inputs,
                output: shapes.len() - 1,
                output_shape: out_shape,
            });
        }

        let output_slot = slots[document.output.as_str()];
        if shapes[output_slot] != output_shape {
            return Err(InferenceError::ShapeMismatch(format!(
                "graph produces {}, caller declared {}",
                shapes[output_slot], output_shape
            )));
        }

        let mut last_use = vec![None; shapes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for &slot in &node.inputs {
                last_use[slot] = Some(i);
            }
        }
        last_use[output_slot] = None;

        let peak_activation_bytes = peak_activation(&shapes, &nodes, &last_use);
        let weight_bytes = nodes.iter().map(|n| n.op.weight_bytes()).sum();

        Ok(Self {
            metadata,
            input_shape,
            output_shape,
            nodes,
            last_use,
            output_slot,
            weight_bytes,
            peak_activation_bytes,
            total_cost,
        })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    /// Nodes in execution order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn value_count(&self) -> usize {
        self.last_use.len()
    }

    pub fn output_slot(&self) -> usize {
        self.output_slot
    }

    /// Node index after which `slot` is dead, if it is ever released.
    pub fn last_use(&self, slot: usize) -> Option<usize> {
        self.last_use.get(slot).copied().flatten()
    }

    pub fn weight_bytes(&self) -> usize {
        self.weight_bytes
    }

    /// Largest total size of simultaneously live activations, input included.
    pub fn peak_activation_bytes(&self) -> usize {
        self.peak_activation_bytes
    }

    /// Estimated multiply-adds of one prediction.
    pub fn total_cost(&self) -> usize {
        self.total_cost
    }
}

fn check_embedded(which: &str, embedded: Option<[usize; 4]>, declared: Shape) -> Result<(), InferenceError> {
    match embedded {
        Some(dims) if dims != declared.dims() => Err(InferenceError::ShapeMismatch(format!(
            "model declares {} shape {:?}, caller declared {}",
            which, dims, declared
        ))),
        _ => Ok(()),
    }
}

/// Topological order (by index into `document.nodes`) of the nodes the graph
/// output depends on. Ties are broken by file order.
fn plan_order(document: &GraphDocument) -> Result<Vec<usize>, InferenceError> {
    let mut producer: HashMap<&str, usize> = HashMap::new();
    for (idx, def) in document.nodes.iter().enumerate() {
        if def.output == document.input {
            return Err(InferenceError::Parse(format!(
                "node '{}' overwrites the graph input '{}'",
                def.name, document.input
            )));
        }
        if producer.insert(def.output.as_str(), idx).is_some() {
            return Err(InferenceError::Parse(format!(
                "value '{}' is produced by more than one node",
                def.output
            )));
        }
    }
    for def in &document.nodes {
        for value in &def.inputs {
            if value != &document.input && !producer.contains_key(value.as_str()) {
                return Err(InferenceError::Parse(format!(
                    "node '{}' reads undefined value '{}'",
                    def.name, value
                )));
            }
        }
    }
    let root = *producer.get(document.output.as_str()).ok_or_else(|| {
        InferenceError::Parse(format!(
            "graph output '{}' is not produced by any node",
            document.output
        ))
    })?;

    // Reverse reachability from the output.
    let mut needed = vec![false; document.nodes.len()];
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if std::mem::replace(&mut needed[idx], true) {
            continue;
        }
        for value in &document.nodes[idx].inputs {
            if let Some(&p) = producer.get(value.as_str()) {
                if !needed[p] {
                    stack.push(p);
                }
            }
        }
    }

    let mut pending = vec![0usize; document.nodes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); document.nodes.len()];
    for (idx, def) in document.nodes.iter().enumerate().filter(|(i, _)| needed[*i]) {
        for value in &def.inputs {
            if let Some(&p) = producer.get(value.as_str()) {
                pending[idx] += 1;
                consumers[p].push(idx);
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..document.nodes.len())
        .filter(|i| needed[*i] && pending[*i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::new();
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &c in &consumers[idx] {
            pending[c] -= 1;
            if pending[c] == 0 {
                ready.push(Reverse(c));
            }
        }
    }

    let needed_count = needed.iter().filter(|n| **n).count();
    if order.len() != needed_count {
        return Err(InferenceError::Parse("graph contains a cycle".into()));
    }
    Ok(order)
}

fn peak_activation(shapes: &[Shape], nodes: &[Node], last_use: &[Option<usize>]) -> usize {
    let mut live = shapes[INPUT_SLOT].size_bytes();
    let mut peak = live;
    for (i, node) in nodes.iter().enumerate() {
        live = live.saturating_add(node.output_shape.size_bytes());
        peak = peak.max(live);
        let mut freed: Vec<usize> = node
            .inputs
            .iter()
            .copied()
            .filter(|s| last_use[*s] == Some(i))
            .collect();
        freed.sort_unstable();
        freed.dedup();
        for slot in freed {
            live -= shapes[slot].size_bytes();
        }
    }
    peak
}

/// Resolves a node's parameter roles through the document's initializers.
struct NodeParams<'a> {
    node: &'a NodeDef,
    initializers: &'a BTreeMap<String, InitializerDef>,
    payload: Option<&'a [u8]>,
}

impl ParamSource for NodeParams<'_> {
    fn param(&self, role: &str) -> Result<Option<Weight>, InferenceError> {
        let Some(name) = self.node.params.get(role) else {
            return Ok(None);
        };
        let def = self.initializers.get(name).ok_or_else(|| {
            InferenceError::Parse(format!(
                "node '{}' references unknown initializer '{}'",
                self.node.name, name
            ))
        })?;
        let values = resolve_initializer(name, def, self.payload)?;
        Ok(Some(Weight {
            dims: def.dims.clone(),
            values,
        }))
    }
}

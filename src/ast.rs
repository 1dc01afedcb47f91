//! The typed AST: a tagged-sum node type shared by id rather than a
//! class hierarchy with virtual dispatch. Every node owns a unique
//! [`NodeId`]; expressions are linked by id through a [`Module`]'s
//! arena rather than by direct ownership, so the same sub-expression
//! can be reached from more than one place (e.g. through an alias)
//! without cloning it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::id;

pub type NodeId = id::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    Tensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelScope {
    Global,
    Device,
}

/// A declared scalar or tensor (parameter). Tensors carry no shape:
/// they are addressed only by the implicit per-thread index.
#[derive(Debug)]
pub struct Variable {
    pub id: NodeId,
    pub name: String,
    pub dtype: DataType,
    pub kind: VariableKind,
}

/// The declared type of a kernel's return value (`void` is `None`).
#[derive(Debug, Clone, Copy)]
pub struct RetType {
    pub dtype: DataType,
    pub kind: VariableKind,
}

#[derive(Debug)]
pub struct Kernel {
    pub id: NodeId,
    pub name: String,
    pub scope: KernelScope,
    pub args: Vec<Rc<Variable>>,
    pub ret: Option<RetType>,
    pub body: RefCell<Vec<NodeId>>,
}

impl Kernel {
    pub fn is_void(&self) -> bool {
        self.ret.is_none()
    }
}

/// One AST node. Binary/unary/assignment/alias/return/call nodes
/// reference their operands by [`NodeId`] and are looked up through
/// the owning [`Module`]; variables are reached directly via `Rc`.
#[derive(Debug, Clone)]
pub enum Node {
    Constant {
        id: NodeId,
        value: f32,
        dtype: DataType,
    },
    Variable(Rc<Variable>),
    KernelCall {
        id: NodeId,
        kernel: Rc<Kernel>,
        args: Vec<NodeId>,
    },
    Add { id: NodeId, lhs: NodeId, rhs: NodeId },
    Sub { id: NodeId, lhs: NodeId, rhs: NodeId },
    Mul { id: NodeId, lhs: NodeId, rhs: NodeId },
    Div { id: NodeId, lhs: NodeId, rhs: NodeId },
    Abs { id: NodeId, x: NodeId },
    Sqrt { id: NodeId, x: NodeId },
    Log2 { id: NodeId, x: NodeId },
    Exp2 { id: NodeId, x: NodeId },
    Assignment {
        id: NodeId,
        target: Rc<Variable>,
        src: NodeId,
    },
    Alias {
        id: NodeId,
        name: String,
        src: NodeId,
    },
    Return {
        id: NodeId,
        value: Option<NodeId>,
    },
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Constant { id, .. }
            | Node::KernelCall { id, .. }
            | Node::Add { id, .. }
            | Node::Sub { id, .. }
            | Node::Mul { id, .. }
            | Node::Div { id, .. }
            | Node::Abs { id, .. }
            | Node::Sqrt { id, .. }
            | Node::Log2{ id, .. }
            | Node::Exp2 { id, .. }
            | Node::Assignment { id, .. }
            | Node::Alias { id, .. }
            | Node::Return { id, .. } => *id,
            Node::Variable(v) => v.id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Constant { .. } => "Constant",
            Node::Variable(v) => match v.kind {
                VariableKind::Scalar => "Scalar",
                VariableKind::Tensor => "Tensor",
            },
            Node::KernelCall { .. } => "KernelCall",
            Node::Add { .. } => "Add",
            Node::Sub { .. } => "Sub",
            Node::Mul { .. } => "Mul",
            Node::Div { .. } => "Div",
            Node::Abs { .. } => "Abs",
            Node::Sqrt { .. } => "Sqrt",
            Node::Log2 { .. } => "Log2",
            Node::Exp2 { .. } => "Exp2",
            Node::Assignment { .. } => "Assignment",
            Node::Alias { .. } => "Alias",
            Node::Return { .. } => "Return",
        }
    }
}

/// A name resolves to either a variable, a kernel, or an alias
/// (itself just an id into the node arena). All three share one flat
/// namespace, matching the source language having no nested scopes.
#[derive(Debug, Clone)]
pub enum Symbol {
    Variable(Rc<Variable>),
    Kernel(Rc<Kernel>),
    Alias(NodeId),
}

/// Owns every node produced while parsing one translation unit, plus
/// the flat name table and the per-scope kernel maps.
#[derive(Debug, Default)]
pub struct Module {
    pub nodes: HashMap<NodeId, Node>,
    pub defined_nodes: HashMap<String, Symbol>,
    pub global_kernels: HashMap<String, Rc<Kernel>>,
    pub device_kernels: HashMap<String, Rc<Kernel>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        self.nodes
            .get(&id)
            .unwrap_or_else(|| panic!("dangling node id {id}: referential integrity violated"))
    }

    pub fn all_kernels(&self) -> impl Iterator<Item = &Rc<Kernel>> {
        self.global_kernels.values().chain(self.device_kernels.values())
    }
}

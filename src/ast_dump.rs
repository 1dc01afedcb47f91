//! Renders a [`Module`] as the flat, indented text format written to
//! `.ast` files by `--save-temps`. Nodes are shared by id (an alias and
//! the kernel call it feeds may point at the same sub-expression), so
//! the walk keeps a visited set and prints a cross-reference instead of
//! re-expanding a node it has already emitted at this kernel's top
//! level.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::ast::{Kernel, KernelScope, Module, Node, NodeId};

pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    let mut kernels: Vec<_> = module.all_kernels().collect();
    kernels.sort_by(|a, b| a.name.cmp(&b.name));

    for kernel in kernels {
        dump_kernel(module, kernel, &mut out);
    }
    out
}

fn dump_kernel(module: &Module, kernel: &Kernel, out: &mut String) {
    let scope = match kernel.scope {
        KernelScope::Global => "global",
        KernelScope::Device => "device",
    };
    let ret = match &kernel.ret {
        None => "void".to_string(),
        Some(r) => format!("{:?}/{:?}", r.dtype, r.kind),
    };
    let _ = writeln!(out, "-- Kernel {} [{scope}] -> {ret}", kernel.name);
    for arg in &kernel.args {
        let _ = writeln!(out, "    param: {} ({:?}/{:?}) id={}", arg.name, arg.dtype, arg.kind, arg.id);
    }

    let mut visited = HashSet::new();
    for stmt in kernel.body.borrow().iter() {
        dump_node(module, *stmt, 1, &mut visited, out);
    }
    out.push('\n');
}

fn indent(level: usize) -> String {
    "    ".repeat(level)
}

fn dump_node(module: &Module, id: NodeId, level: usize, visited: &mut HashSet<NodeId>, out: &mut String) {
    let pad = indent(level);
    if !visited.insert(id) {
        let _ = writeln!(out, "{pad}-- ref id={id}");
        return;
    }

    let node = module.get(id);
    match node {
        Node::Constant { value, dtype, .. } => {
            let _ = writeln!(out, "{pad}-- Constant id={id}");
            let _ = writeln!(out, "{pad}    value: {value}");
            let _ = writeln!(out, "{pad}    dtype: {dtype:?}");
        }
        Node::Variable(var) => {
            let _ = writeln!(out, "{pad}-- {} id={id}", node.kind_name());
            let _ = writeln!(out, "{pad}    name: {}", var.name);
            let _ = writeln!(out, "{pad}    dtype: {:?}", var.dtype);
        }
        Node::KernelCall { kernel, args, .. } => {
            let _ = writeln!(out, "{pad}-- KernelCall id={id}");
            let _ = writeln!(out, "{pad}    callee: {}", kernel.name);
            for a in args {
                dump_node(module, *a, level + 1, visited, out);
            }
        }
        Node::Add { lhs, rhs, .. }
        | Node::Sub { lhs, rhs, .. }
        | Node::Mul { lhs, rhs, .. }
        | Node::Div { lhs, rhs, .. } => {
            let _ = writeln!(out, "{pad}-- {} id={id}", node.kind_name());
            dump_node(module, *lhs, level + 1, visited, out);
            dump_node(module, *rhs, level + 1, visited, out);
        }
        Node::Abs { x, .. } | Node::Sqrt { x, .. } | Node::Log2 { x, .. } | Node::Exp2 { x, .. } => {
            let _ = writeln!(out, "{pad}-- {} id={id}", node.kind_name());
            dump_node(module, *x, level + 1, visited, out);
        }
        Node::Assignment { target, src, .. } => {
            let _ = writeln!(out, "{pad}-- Assignment id={id}");
            let _ = writeln!(out, "{pad}    target: {}", target.name);
            dump_node(module, *src, level + 1, visited, out);
        }
        Node::Alias { name, src, .. } => {
            let _ = writeln!(out, "{pad}-- Alias id={id}");
            let _ = writeln!(out, "{pad}    name: {name}");
            dump_node(module, *src, level + 1, visited, out);
        }
        Node::Return { value, .. } => {
            let _ = writeln!(out, "{pad}-- Return id={id}");
            if let Some(v) = value {
                dump_node(module, *v, level + 1, visited, out);
            }
        }
    }
}

//! IR lowering: walks one kernel's AST body and emits a linear,
//! SSA-style instruction sequence through the [`Backend`] façade. The
//! façade isolates the rest of the compiler from the concrete
//! code-generation library; see `backend::ptx` and `backend::record`
//! for the two implementations shipped here.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::ast::{Kernel, KernelScope, Module, Node, NodeId, VariableKind};
use crate::error::{CompileError, CompileResult};

/// The only two shapes a value needs in this language: a 32-bit float
/// held in a register, or a pointer to one living in GPU global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar,
    Pointer,
}

fn value_type_of(kind: VariableKind) -> ValueType {
    match kind {
        VariableKind::Scalar => ValueType::Scalar,
        VariableKind::Tensor => ValueType::Pointer,
    }
}

/// Abstract backend façade. A lowering pass only ever talks to this
/// trait; it never knows whether values end up as text, as an
/// in-memory log, or (in principle) as a real codegen library's IR.
pub trait Backend {
    type Value: Clone;

    fn begin_module(&mut self, target_triple: &str) -> CompileResult<()>;

    /// Registers a function's signature so forward references from
    /// other kernels resolve regardless of lowering order.
    fn declare_signature(&mut self, name: &str, params: &[ValueType], ret: Option<ValueType>);

    /// Opens a fresh function body and returns its parameter values in
    /// declaration order, pre-seeding the caller's value table.
    fn begin_function(&mut self, name: &str) -> Vec<Self::Value>;
    fn finish_function(&mut self);
    fn mark_entry_point(&mut self, name: &str);

    fn read_tid(&mut self) -> Self::Value;
    fn const_f32(&mut self, value: f32) -> Self::Value;

    fn gep(&mut self, base: &Self::Value, index: &Self::Value) -> Self::Value;
    fn load(&mut self, ptr: &Self::Value) -> Self::Value;
    fn store(&mut self, ptr: &Self::Value, value: &Self::Value);

    fn fadd(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn fsub(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn fmul(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn fdiv(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;

    fn call_intrinsic(&mut self, name: &str, args: &[Self::Value]) -> Self::Value;
    fn call_function(&mut self, name: &str, args: &[Self::Value], has_return: bool) -> Option<Self::Value>;

    fn ret_void(&mut self);
    fn ret_value(&mut self, value: &Self::Value);

    fn emit_to_file(&mut self, path: &Path) -> CompileResult<()>;
    fn dump_ir(&self) -> String;
}

pub struct Lowering<'a, B: Backend> {
    backend: &'a mut B,
    module: &'a Module,
}

impl<'a, B: Backend> Lowering<'a, B> {
    pub fn new(backend: &'a mut B, module: &'a Module) -> Self {
        Self { backend, module }
    }

    pub fn lower_all(&mut self, target_triple: &str) -> CompileResult<()> {
        self.backend.begin_module(target_triple)?;

        for kernel in self.module.all_kernels() {
            let params: Vec<ValueType> = kernel.args.iter().map(|v| value_type_of(v.kind)).collect();
            let ret = kernel.ret.map(|r| value_type_of(r.kind));
            self.backend.declare_signature(&kernel.name, &params, ret);
        }

        for kernel in self.module.all_kernels() {
            self.lower_kernel(kernel)?;
        }

        Ok(())
    }

    fn lower_kernel(&mut self, kernel: &Rc<Kernel>) -> CompileResult<()> {
        let param_values = self.backend.begin_function(&kernel.name);

        let mut values: HashMap<NodeId, B::Value> = HashMap::new();
        for (var, val) in kernel.args.iter().zip(param_values.into_iter()) {
            values.insert(var.id, val);
        }

        let tid = self.backend.read_tid();

        let body = kernel.body.borrow().clone();
        for stmt_id in body {
            self.lower_node(stmt_id, &mut values, &tid)?;
        }

        self.backend.finish_function();
        if kernel.scope == KernelScope::Global {
            self.backend.mark_entry_point(&kernel.name);
        }
        Ok(())
    }

    /// Evaluates `nid`, applying the operand-read rule: a tensor
    /// variable's value is its base pointer, so it is offset by the
    /// thread index and loaded; everything else is used as-is.
    fn operand_value(
        &mut self,
        nid: NodeId,
        values: &mut HashMap<NodeId, B::Value>,
        tid: &B::Value,
    ) -> CompileResult<B::Value> {
        let is_tensor = matches!(self.module.get(nid), Node::Variable(var) if var.kind == VariableKind::Tensor);
        let v = self.lower_node(nid, values, tid)?.ok_or_else(|| {
            CompileError::backend(format!("internal error: node {nid} produced no value where one was required"))
        })?;
        if is_tensor {
            let ptr = self.backend.gep(&v, tid);
            Ok(self.backend.load(&ptr))
        } else {
            Ok(v)
        }
    }

    fn lower_node(
        &mut self,
        nid: NodeId,
        values: &mut HashMap<NodeId, B::Value>,
        tid: &B::Value,
    ) -> CompileResult<Option<B::Value>> {
        if let Some(v) = values.get(&nid) {
            return Ok(Some(v.clone()));
        }

        let node = self.module.get(nid).clone();
        let result = match node {
            Node::Constant { value, .. } => Some(self.backend.const_f32(value)),

            Node::Variable(var) => {
                return Err(CompileError::backend(format!(
                    "internal error: variable '{}' referenced before its parameter value was bound",
                    var.name
                )))
            }

            Node::KernelCall { kernel, args, .. } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    // no operand-read rule here: pointers and scalars pass through untouched
                    let v = self.lower_node(arg, values, tid)?.ok_or_else(|| {
                        CompileError::backend("internal error: call argument produced no value")
                    })?;
                    arg_values.push(v);
                }
                self.backend.call_function(&kernel.name, &arg_values, kernel.ret.is_some())
            }

            Node::Add { lhs, rhs, .. } => {
                let l = self.operand_value(lhs, values, tid)?;
                let r = self.operand_value(rhs, values, tid)?;
                Some(self.backend.fadd(&l, &r))
            }
            Node::Sub { lhs, rhs, .. } => {
                let l = self.operand_value(lhs, values, tid)?;
                let r = self.operand_value(rhs, values, tid)?;
                Some(self.backend.fsub(&l, &r))
            }
            Node::Mul { lhs, rhs, .. } => {
                let l = self.operand_value(lhs, values, tid)?;
                let r = self.operand_value(rhs, values, tid)?;
                Some(self.backend.fmul(&l, &r))
            }
            Node::Div { lhs, rhs, .. } => {
                let l = self.operand_value(lhs, values, tid)?;
                let r = self.operand_value(rhs, values, tid)?;
                Some(self.backend.fdiv(&l, &r))
            }

            Node::Abs { x, .. } => {
                let v = self.operand_value(x, values, tid)?;
                Some(self.backend.call_intrinsic("fabs", &[v]))
            }
            Node::Sqrt { x, .. } => {
                let v = self.operand_value(x, values, tid)?;
                Some(self.backend.call_intrinsic("sqrt", &[v]))
            }
            Node::Log2 { x, .. } => {
                let v = self.operand_value(x, values, tid)?;
                Some(self.backend.call_intrinsic("lg2", &[v]))
            }
            Node::Exp2 { x, .. } => {
                let v = self.operand_value(x, values, tid)?;
                Some(self.backend.call_intrinsic("ex2", &[v]))
            }

            Node::Assignment { target, src, .. } => {
                let src_val = self.operand_value(src, values, tid)?;
                let base = values.get(&target.id).cloned().ok_or_else(|| {
                    CompileError::backend(format!(
                        "internal error: assignment target '{}' is not a bound parameter",
                        target.name
                    ))
                })?;
                let ptr = self.backend.gep(&base, tid);
                self.backend.store(&ptr, &src_val);
                None
            }

            Node::Alias { src, .. } => Some(self.operand_value(src, values, tid)?),

            Node::Return { value, .. } => {
                match value {
                    None => self.backend.ret_void(),
                    Some(v) => {
                        let rv = self.operand_value(v, values, tid)?;
                        self.backend.ret_value(&rv);
                    }
                }
                None
            }
        };

        if let Some(ref v) = result {
            values.insert(nid, v.clone());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::record::{Instr, RecordingBackend};
    use crate::parser::parse_source;

    #[test]
    fn vector_add_emits_two_loads_one_fadd_one_store() {
        let src = "func global void add_vec(f32[] a, f32[] b, f32[] c) { c = a + b; return; }";
        let module = parse_source(src).unwrap();
        let mut backend = RecordingBackend::new();
        Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();

        let instrs = backend.instructions("add_vec");
        assert_eq!(instrs.iter().filter(|i| matches!(i, Instr::Load)).count(), 2);
        assert_eq!(instrs.iter().filter(|i| matches!(i, Instr::FAdd)).count(), 1);
        assert_eq!(instrs.iter().filter(|i| matches!(i, Instr::Store)).count(), 1);
        assert!(backend.is_entry_point("add_vec"));
    }

    #[test]
    fn device_kernel_is_not_an_entry_point() {
        let src = "func device f32 f(f32 x, f32 y) { return x + y; }\n\
                    func global void g(f32[] a, f32[] b, f32[] c) { var t = f(a, b); c = t; return; }";
        let module = parse_source(src).unwrap();
        let mut backend = RecordingBackend::new();
        Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();

        assert!(!backend.is_entry_point("f"));
        assert!(backend.is_entry_point("g"));
        let g_instrs = backend.instructions("g");
        assert!(g_instrs.iter().any(|i| matches!(i, Instr::Call(name) if name == "f")));
    }

    #[test]
    fn shared_alias_is_lowered_once() {
        let src = "func global void k(f32[] a, f32[] b, f32[] c) {\n\
                        var t = a + b;\n\
                        c = t / t;\n\
                        return;\n\
                    }";
        let module = parse_source(src).unwrap();
        let mut backend = RecordingBackend::new();
        Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();

        let instrs = backend.instructions("k");
        assert_eq!(instrs.iter().filter(|i| matches!(i, Instr::FAdd)).count(), 1);
        assert_eq!(instrs.iter().filter(|i| matches!(i, Instr::FDiv)).count(), 1);
    }

    #[test]
    fn builtin_unary_emits_named_intrinsic() {
        let src = "func global void k(f32[] a, f32[] d) { d = sqrt(a) + abs(a); return; }";
        let module = parse_source(src).unwrap();
        let mut backend = RecordingBackend::new();
        Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();

        let instrs = backend.instructions("k");
        assert!(instrs.iter().any(|i| matches!(i, Instr::Intrinsic(name) if name == "sqrt")));
        assert!(instrs.iter().any(|i| matches!(i, Instr::Intrinsic(name) if name == "fabs")));
    }
}

//! Reference backend: emits PTX-shaped assembly text directly. This is
//! a hand-written, schematic emitter rather than a wrapped
//! assembler — there is no LLVM/NVPTX dependency in this crate — good
//! enough to produce a `.ptx` file whose structure matches what the
//! lowering visitor describes (entry annotations, per-thread address
//! arithmetic, global loads/stores) without validating the result.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::CompileResult;
use crate::ir::{Backend, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegKind {
    F32,
    Ptr,
    U32,
}

#[derive(Debug, Clone)]
pub struct PtxValue {
    reg: String,
    #[allow(dead_code)]
    kind: RegKind,
}

struct FnCtx {
    name: String,
    param_decls: Vec<String>,
    body: Vec<String>,
    f_count: u32,
    rd_count: u32,
    r_count: u32,
}

impl FnCtx {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            param_decls: Vec::new(),
            body: Vec::new(),
            f_count: 0,
            rd_count: 0,
            r_count: 0,
        }
    }

    fn fresh(&mut self, kind: RegKind) -> PtxValue {
        let reg = match kind {
            RegKind::F32 => {
                self.f_count += 1;
                format!("%f{}", self.f_count)
            }
            RegKind::Ptr => {
                self.rd_count += 1;
                format!("%rd{}", self.rd_count)
            }
            RegKind::U32 => {
                self.r_count += 1;
                format!("%r{}", self.r_count)
            }
        };
        PtxValue { reg, kind }
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.body.push(format!("\t{}", line.into()));
    }
}

pub struct PtxBackend {
    sm: String,
    target_triple: String,
    signatures: HashMap<String, (Vec<ValueType>, Option<ValueType>)>,
    order: Vec<String>,
    functions: HashMap<String, FnCtx>,
    entry_points: HashSet<String>,
    current: Option<FnCtx>,
}

impl PtxBackend {
    pub fn new(sm: impl Into<String>) -> Self {
        Self {
            sm: sm.into(),
            target_triple: String::new(),
            signatures: HashMap::new(),
            order: Vec::new(),
            functions: HashMap::new(),
            entry_points: HashSet::new(),
            current: None,
        }
    }

    fn current_mut(&mut self) -> &mut FnCtx {
        self.current.as_mut().expect("backend operation issued outside of a function body")
    }

    fn intrinsic_mnemonic(name: &str) -> &str {
        match name {
            "fabs" => "abs.f32",
            "sqrt" => "sqrt.approx.f32",
            "lg2" => "lg2.approx.f32",
            "ex2" => "ex2.approx.f32",
            other => other,
        }
    }
}

impl Backend for PtxBackend {
    type Value = PtxValue;

    fn begin_module(&mut self, target_triple: &str) -> CompileResult<()> {
        self.target_triple = target_triple.to_string();
        Ok(())
    }

    fn declare_signature(&mut self, name: &str, params: &[ValueType], ret: Option<ValueType>) {
        self.signatures.insert(name.to_string(), (params.to_vec(), ret));
    }

    fn begin_function(&mut self, name: &str) -> Vec<Self::Value> {
        let (params, _ret) = self.signatures.get(name).cloned().unwrap_or_default();
        let mut ctx = FnCtx::new(name);
        let mut values = Vec::with_capacity(params.len());

        for (i, p) in params.iter().enumerate() {
            match p {
                ValueType::Pointer => {
                    ctx.param_decls.push(format!(".param .u64 {name}_param_{i}"));
                    let raw = ctx.fresh(RegKind::Ptr);
                    ctx.emit(format!("ld.param.u64 \t{}, [{name}_param_{i}];", raw.reg));
                    let generic = ctx.fresh(RegKind::Ptr);
                    ctx.emit(format!("cvta.to.global.u64 \t{}, {};", generic.reg, raw.reg));
                    values.push(generic);
                }
                ValueType::Scalar => {
                    ctx.param_decls.push(format!(".param .f32 {name}_param_{i}"));
                    let v = ctx.fresh(RegKind::F32);
                    ctx.emit(format!("ld.param.f32 \t{}, [{name}_param_{i}];", v.reg));
                    values.push(v);
                }
            }
        }

        self.current = Some(ctx);
        self.order.push(name.to_string());
        values
    }

    fn finish_function(&mut self) {
        if let Some(ctx) = self.current.take() {
            self.functions.insert(ctx.name.clone(), ctx);
        }
    }

    fn mark_entry_point(&mut self, name: &str) {
        self.entry_points.insert(name.to_string());
    }

    fn read_tid(&mut self) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::U32);
        ctx.emit(format!("mov.u32 \t{}, %tid.x;", v.reg));
        v
    }

    fn const_f32(&mut self, value: f32) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("mov.f32 \t{}, 0f{:08X};", v.reg, value.to_bits()));
        v
    }

    fn gep(&mut self, base: &Self::Value, index: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let offset = ctx.fresh(RegKind::Ptr);
        ctx.emit(format!("mul.wide.s32 \t{}, {}, 4;", offset.reg, index.reg));
        let addr = ctx.fresh(RegKind::Ptr);
        ctx.emit(format!("add.s64 \t{}, {}, {};", addr.reg, base.reg, offset.reg));
        addr
    }

    fn load(&mut self, ptr: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("ld.global.f32 \t{}, [{}];", v.reg, ptr.reg));
        v
    }

    fn store(&mut self, ptr: &Self::Value, value: &Self::Value) {
        let ctx = self.current_mut();
        ctx.emit(format!("st.global.f32 \t[{}], {};", ptr.reg, value.reg));
    }

    fn fadd(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("add.f32 \t{}, {}, {};", v.reg, lhs.reg, rhs.reg));
        v
    }

    fn fsub(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("sub.f32 \t{}, {}, {};", v.reg, lhs.reg, rhs.reg));
        v
    }

    fn fmul(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("mul.f32 \t{}, {}, {};", v.reg, lhs.reg, rhs.reg));
        v
    }

    fn fdiv(&mut self, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        ctx.emit(format!("div.rn.f32 \t{}, {}, {};", v.reg, lhs.reg, rhs.reg));
        v
    }

    fn call_intrinsic(&mut self, name: &str, args: &[Self::Value]) -> Self::Value {
        let mnemonic = Self::intrinsic_mnemonic(name).to_string();
        let ctx = self.current_mut();
        let v = ctx.fresh(RegKind::F32);
        let arg_list = args.iter().map(|a| a.reg.clone()).collect::<Vec<_>>().join(", ");
        ctx.emit(format!("{mnemonic} \t{}, {arg_list};", v.reg));
        v
    }

    fn call_function(&mut self, name: &str, args: &[Self::Value], has_return: bool) -> Option<Self::Value> {
        let ctx = self.current_mut();
        ctx.emit("{");
        let mut arg_names = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let pname = format!("call_arg{i}");
            ctx.emit(format!(".param .b64 {pname};"));
            ctx.emit(format!("st.param.b64 \t[{pname}], {};", a.reg));
            arg_names.push(pname);
        }
        let args_list = arg_names.join(", ");
        let ret = if has_return {
            ctx.emit(".param .f32 retval0;");
            ctx.emit(format!("call.uni (retval0), {name}, ({args_list});"));
            let v = ctx.fresh(RegKind::F32);
            ctx.emit(format!("ld.param.f32 \t{}, [retval0];", v.reg));
            Some(v)
        } else {
            ctx.emit(format!("call.uni {name}, ({args_list});"));
            None
        };
        ctx.emit("}");
        ret
    }

    fn ret_void(&mut self) {
        self.current_mut().emit("ret;");
    }

    fn ret_value(&mut self, value: &Self::Value) {
        let ctx = self.current_mut();
        ctx.emit("st.param.f32 \t[func_retval0], ".to_string() + &value.reg + ";");
        ctx.emit("ret;");
    }

    fn emit_to_file(&mut self, path: &Path) -> CompileResult<()> {
        let text = self.dump_ir();
        fs::write(path, text)?;
        Ok(())
    }

    fn dump_ir(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "//\n// target triple: {}\n//", self.target_triple);
        let _ = writeln!(out, ".version 7.8");
        let _ = writeln!(out, ".target {}", self.sm);
        let _ = writeln!(out, ".address_size 64\n");

        for name in &self.order {
            let Some(ctx) = self.functions.get(name) else { continue };
            let is_entry = self.entry_points.contains(name);
            let qualifier = if is_entry { ".visible .entry" } else { ".func" };

            let _ = write!(out, "{qualifier} {name}(\n");
            let _ = writeln!(out, "\t{}", ctx.param_decls.join(",\n\t"));
            let _ = writeln!(out, ")");
            let _ = writeln!(out, "{{");
            for line in &ctx.body {
                let _ = writeln!(out, "{line}");
            }
            let _ = writeln!(out, "}}\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kernel_is_marked_visible_entry() {
        let mut backend = PtxBackend::new("sm_70");
        backend.begin_module("nvptx64-nvidia-cuda").unwrap();
        backend.declare_signature("add_vec", &[ValueType::Pointer, ValueType::Pointer, ValueType::Pointer], None);
        let params = backend.begin_function("add_vec");
        let tid = backend.read_tid();
        let pa = backend.gep(&params[0], &tid);
        let pb = backend.gep(&params[1], &tid);
        let va = backend.load(&pa);
        let vb = backend.load(&pb);
        let sum = backend.fadd(&va, &vb);
        let pc = backend.gep(&params[2], &tid);
        backend.store(&pc, &sum);
        backend.ret_void();
        backend.finish_function();
        backend.mark_entry_point("add_vec");

        let ptx = backend.dump_ir();
        assert!(ptx.contains(".visible .entry add_vec"));
        assert!(ptx.contains("add.f32"));
        assert!(ptx.contains("ld.global.f32"));
        assert!(ptx.contains("st.global.f32"));
    }

    #[test]
    fn device_function_uses_func_qualifier() {
        let mut backend = PtxBackend::new("sm_70");
        backend.begin_module("nvptx64-nvidia-cuda").unwrap();
        backend.declare_signature("helper", &[ValueType::Scalar], Some(ValueType::Scalar));
        let params = backend.begin_function("helper");
        backend.ret_value(&params[0]);
        backend.finish_function();

        let ptx = backend.dump_ir();
        assert!(ptx.contains(".func helper"));
        assert!(!ptx.contains(".visible .entry helper"));
    }
}

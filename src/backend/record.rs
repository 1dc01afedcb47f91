//! An in-memory backend that only logs what it was asked to do. Used
//! by unit and integration tests to assert on the shape of emitted IR
//! without parsing generated assembly text.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::CompileResult;
use crate::ir::{Backend, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    ReadTid,
    Const(String),
    Gep,
    Load,
    Store,
    FAdd,
    FSub,
    FMul,
    FDiv,
    Intrinsic(String),
    Call(String),
    RetVoid,
    RetValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecValue(u32);

#[derive(Debug, Clone)]
struct Signature {
    params: Vec<ValueType>,
    #[allow(dead_code)]
    ret: Option<ValueType>,
}

#[derive(Default)]
pub struct RecordingBackend {
    target_triple: String,
    signatures: HashMap<String, Signature>,
    entry_points: HashSet<String>,
    functions: HashMap<String, Vec<Instr>>,
    order: Vec<String>,
    current: Option<String>,
    next_value: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self, function: &str) -> &[Instr] {
        self.functions.get(function).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_entry_point(&self, function: &str) -> bool {
        self.entry_points.contains(function)
    }

    fn fresh_value(&mut self) -> RecValue {
        let v = RecValue(self.next_value);
        self.next_value += 1;
        v
    }

    fn push(&mut self, instr: Instr) {
        let name = self.current.clone().expect("instruction emitted outside of a function body");
        self.functions.entry(name).or_default().push(instr);
    }
}

impl Backend for RecordingBackend {
    type Value = RecValue;

    fn begin_module(&mut self, target_triple: &str) -> CompileResult<()> {
        self.target_triple = target_triple.to_string();
        Ok(())
    }

    fn declare_signature(&mut self, name: &str, params: &[ValueType], ret: Option<ValueType>) {
        self.signatures.insert(name.to_string(), Signature { params: params.to_vec(), ret });
    }

    fn begin_function(&mut self, name: &str) -> Vec<Self::Value> {
        self.current = Some(name.to_string());
        self.functions.entry(name.to_string()).or_default();
        self.order.push(name.to_string());
        let param_count = self.signatures.get(name).map(|s| s.params.len()).unwrap_or(0);
        (0..param_count).map(|_| self.fresh_value()).collect()
    }

    fn finish_function(&mut self) {
        self.current = None;
    }

    fn mark_entry_point(&mut self, name: &str) {
        self.entry_points.insert(name.to_string());
    }

    fn read_tid(&mut self) -> Self::Value {
        self.push(Instr::ReadTid);
        self.fresh_value()
    }

    fn const_f32(&mut self, value: f32) -> Self::Value {
        self.push(Instr::Const(value.to_string()));
        self.fresh_value()
    }

    fn gep(&mut self, _base: &Self::Value, _index: &Self::Value) -> Self::Value {
        self.push(Instr::Gep);
        self.fresh_value()
    }

    fn load(&mut self, _ptr: &Self::Value) -> Self::Value {
        self.push(Instr::Load);
        self.fresh_value()
    }

    fn store(&mut self, _ptr: &Self::Value, _value: &Self::Value) {
        self.push(Instr::Store);
    }

    fn fadd(&mut self, _lhs: &Self::Value, _rhs: &Self::Value) -> Self::Value {
        self.push(Instr::FAdd);
        self.fresh_value()
    }

    fn fsub(&mut self, _lhs: &Self::Value, _rhs: &Self::Value) -> Self::Value {
        self.push(Instr::FSub);
        self.fresh_value()
    }

    fn fmul(&mut self, _lhs: &Self::Value, _rhs: &Self::Value) -> Self::Value {
        self.push(Instr::FMul);
        self.fresh_value()
    }

    fn fdiv(&mut self, _lhs: &Self::Value, _rhs: &Self::Value) -> Self::Value {
        self.push(Instr::FDiv);
        self.fresh_value()
    }

    fn call_intrinsic(&mut self, name: &str, _args: &[Self::Value]) -> Self::Value {
        self.push(Instr::Intrinsic(name.to_string()));
        self.fresh_value()
    }

    fn call_function(&mut self, name: &str, _args: &[Self::Value], has_return: bool) -> Option<Self::Value> {
        self.push(Instr::Call(name.to_string()));
        has_return.then(|| self.fresh_value())
    }

    fn ret_void(&mut self) {
        self.push(Instr::RetVoid);
    }

    fn ret_value(&mut self, _value: &Self::Value) {
        self.push(Instr::RetValue);
    }

    fn emit_to_file(&mut self, path: &Path) -> CompileResult<()> {
        fs::write(path, self.dump_ir())?;
        Ok(())
    }

    fn dump_ir(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; target {}", self.target_triple);
        for name in &self.order {
            let _ = writeln!(out, "function {}{}:", name, if self.entry_points.contains(name) { " [entry]" } else { "" });
            for instr in self.functions.get(name).into_iter().flatten() {
                let _ = writeln!(out, "    {instr:?}");
            }
        }
        out
    }
}

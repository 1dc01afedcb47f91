//! End-to-end scenarios run over literal `.tgl` source strings through
//! the full lexer → parser → IR lowering → backend pipeline.

use tglc::ast::{DataType, Node, VariableKind};
use tglc::backend::record::{Instr, RecordingBackend};
use tglc::driver::compile;
use tglc::ir::Lowering;
use tglc::parser::parse_source;

#[test]
fn s1_vector_add() {
    let src = "func global void ret_vec(f32[] a, f32[] b, f32[] c) { c = a + b; return; }";
    let module = parse_source(src).unwrap();

    let kernel = module.global_kernels.get("ret_vec").expect("kernel should be global");
    assert_eq!(kernel.args.len(), 3);
    assert!(kernel.args.iter().all(|a| a.kind == VariableKind::Tensor));
    assert!(kernel.is_void());

    let body = kernel.body.borrow();
    assert_eq!(body.len(), 2);
    match module.get(body[0]) {
        Node::Assignment { target, src, .. } => {
            assert_eq!(target.name, "c");
            match module.get(*src) {
                Node::Add { .. } => {}
                other => panic!("expected Add, got {other:?}"),
            }
        }
        other => panic!("expected Assignment, got {other:?}"),
    }
    match module.get(body[1]) {
        Node::Return { value: None, .. } => {}
        other => panic!("expected void Return, got {other:?}"),
    }

    let mut backend = RecordingBackend::new();
    Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();
    assert!(backend.is_entry_point("ret_vec"));

    let unit = compile(src, "sm_70", "nvptx64-nvidia-cuda", false).unwrap();
    assert!(unit.ptx.contains(".visible .entry ret_vec"));
}

#[test]
fn s2_precedence_multiply_binds_tighter_than_add() {
    let src = "func global void k(f32[] a, f32[] b, f32[] c, f32[] d) { d = a + b * c; return; }";
    let module = parse_source(src).unwrap();
    let kernel = module.global_kernels.get("k").unwrap();
    let body = kernel.body.borrow();

    match module.get(body[0]) {
        Node::Assignment { src, .. } => match module.get(*src) {
            Node::Add { lhs, rhs, .. } => {
                assert!(matches!(module.get(*lhs), Node::Variable(v) if v.name == "a"));
                assert!(matches!(module.get(*rhs), Node::Mul { .. }));
            }
            other => panic!("expected Add at root, got {other:?}"),
        },
        other => panic!("expected Assignment, got {other:?}"),
    }
}

#[test]
fn s3_left_associative_subtraction() {
    let src = "func global void k(f32[] a, f32[] b, f32[] c, f32[] d) { d = a - b - c; return; }";
    let module = parse_source(src).unwrap();
    let kernel = module.global_kernels.get("k").unwrap();
    let body = kernel.body.borrow();

    match module.get(body[0]) {
        Node::Assignment { src, .. } => match module.get(*src) {
            Node::Sub { lhs, rhs, .. } => {
                assert!(matches!(module.get(*lhs), Node::Sub { .. }));
                assert!(matches!(module.get(*rhs), Node::Variable(v) if v.name == "c"));
            }
            other => panic!("expected Sub at root, got {other:?}"),
        },
        other => panic!("expected Assignment, got {other:?}"),
    }
}

#[test]
fn s4_builtin_and_literal() {
    let src = "func global void k(f32[] a, f32[] d) { d = sqrt(a) + 1.5; return; }";
    let module = parse_source(src).unwrap();
    let kernel = module.global_kernels.get("k").unwrap();
    let body = kernel.body.borrow();

    match module.get(body[0]) {
        Node::Assignment { src, .. } => match module.get(*src) {
            Node::Add { lhs, rhs, .. } => {
                assert!(matches!(module.get(*lhs), Node::Sqrt { .. }));
                match module.get(*rhs) {
                    Node::Constant { value, dtype, .. } => {
                        assert_eq!(*value, 1.5);
                        assert_eq!(*dtype, DataType::Float32);
                    }
                    other => panic!("expected Constant, got {other:?}"),
                }
            }
            other => panic!("expected Add at root, got {other:?}"),
        },
        other => panic!("expected Assignment, got {other:?}"),
    }
}

#[test]
fn s5_device_call_through_an_alias() {
    let src = "func device f32 f(f32 x, f32 y) { return x + y; }\n\
               func global void g(f32[] a, f32[] b, f32[] c) { var t = f(a, b); c = t; return; }";
    let module = parse_source(src).unwrap();

    assert!(module.device_kernels.contains_key("f"));
    let g = module.global_kernels.get("g").unwrap();
    let body = g.body.borrow();

    match module.get(body[0]) {
        Node::Alias { name, src, .. } => {
            assert_eq!(name, "t");
            assert!(matches!(module.get(*src), Node::KernelCall { .. }));
        }
        other => panic!("expected Alias, got {other:?}"),
    }
    match module.get(body[1]) {
        Node::Assignment { target, src, .. } => {
            assert_eq!(target.name, "c");
            assert!(matches!(module.get(*src), Node::Alias { .. }));
        }
        other => panic!("expected Assignment, got {other:?}"),
    }

    let mut backend = RecordingBackend::new();
    Lowering::new(&mut backend, &module).lower_all("nvptx64-nvidia-cuda").unwrap();
    assert!(!backend.is_entry_point("f"));
    assert!(backend.is_entry_point("g"));
    assert!(backend.instructions("g").iter().any(|i| matches!(i, Instr::Call(name) if name == "f")));
}

#[test]
fn s6_assignment_to_undefined_variable_is_fatal() {
    let src = "func global void k(f32[] a) { b = a; return; }";
    let err = parse_source(src).unwrap_err();
    assert!(err.to_string().contains("Assigning to undefined variable: b"));
}

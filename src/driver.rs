//! Ties lexer → parser → IR lowering → backend together for a single
//! source file. Shared by the CLI binary and the end-to-end tests so
//! both exercise the exact same pipeline.

use std::fs;
use std::path::Path;

use crate::ast_dump;
use crate::backend::ptx::PtxBackend;
use crate::error::{CompileError, CompileResult};
use crate::ir::Lowering;
use crate::parser::parse_source;

/// One fully compiled translation unit: the PTX text plus, when
/// requested, the `.ast` and `.ll` companion dumps.
pub struct CompiledUnit {
    pub ptx: String,
    pub ast_dump: Option<String>,
    pub ir_dump: Option<String>,
}

/// Compiles `source` for `sm`, targeting `target_triple`. `dump_extras`
/// controls whether the AST and backend-IR text dumps are produced.
pub fn compile(source: &str, sm: &str, target_triple: &str, dump_extras: bool) -> CompileResult<CompiledUnit> {
    let module = parse_source(source)?;

    let ast_dump = dump_extras.then(|| ast_dump::dump_module(&module));

    let mut backend = PtxBackend::new(sm);
    Lowering::new(&mut backend, &module).lower_all(target_triple)?;

    let ptx = backend.dump_ir();
    let ir_dump = dump_extras.then(|| backend.dump_ir());

    Ok(CompiledUnit { ptx, ast_dump, ir_dump })
}

/// Reads `src_path`, compiles it, and writes the resulting artifacts
/// next to `out_dir` (or alongside the source if `out_dir` is `None`),
/// preserving the source's base filename.
pub fn compile_file(src_path: &Path, sm: &str, target_triple: &str, save_temps: bool, out_dir: Option<&Path>) -> CompileResult<()> {
    if src_path.extension().and_then(|e| e.to_str()) != Some("tgl") {
        return Err(CompileError::invalid_args(format!(
            "expected a .tgl source file, got '{}'",
            src_path.display()
        )));
    }

    let source = fs::read_to_string(src_path)?;
    let unit = compile(&source, sm, target_triple, save_temps)?;

    let stem = src_path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let dir = out_dir.unwrap_or_else(|| src_path.parent().unwrap_or_else(|| Path::new(".")));
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir)?;
    }

    fs::write(dir.join(format!("{stem}.ptx")), &unit.ptx)?;
    if let Some(ast) = &unit.ast_dump {
        fs::write(dir.join(format!("{stem}.ast")), ast)?;
    }
    if let Some(ir) = &unit.ir_dump {
        fs::write(dir.join(format!("{stem}.ll")), ir)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_vector_add_to_ptx_with_entry_annotation() {
        let src = "func global void add_vec(f32[] a, f32[] b, f32[] c) { c = a + b; return; }";
        let unit = compile(src, "sm_70", "nvptx64-nvidia-cuda", false).unwrap();
        assert!(unit.ptx.contains(".visible .entry add_vec"));
        assert!(unit.ast_dump.is_none());
        assert!(unit.ir_dump.is_none());
    }

    #[test]
    fn save_temps_produces_ast_and_ir_dumps() {
        let src = "func global void k(f32[] a, f32[] b) { a = b; return; }";
        let unit = compile(src, "sm_70", "nvptx64-nvidia-cuda", true).unwrap();
        assert!(unit.ast_dump.unwrap().contains("-- Kernel k"));
        assert!(unit.ir_dump.unwrap().contains(".visible .entry k"));
    }

    #[test]
    fn rejects_source_with_wrong_extension() {
        let path = Path::new("program.txt");
        let err = compile_file(path, "sm_70", "nvptx64-nvidia-cuda", false, None).unwrap_err();
        assert!(err.to_string().contains(".tgl"));
    }
}

//! Recursive-descent parser. Drives the lexer directly over
//! `(line, column)` cursors — there is no separate tokenization pass —
//! and builds the AST while resolving names against a single flat
//! symbol table shared by variables, kernels, and aliases.

use std::rc::Rc;

use crate::ast::{DataType, Kernel, KernelScope, Module, Node, NodeId, RetType, Symbol, Variable, VariableKind};
use crate::error::{CompileError, CompileResult, Location};
use crate::id;
use crate::lexer;

const ARITH_OPS: [char; 4] = ['*', '/', '+', '-'];

fn precedence(op: char) -> i32 {
    match op {
        '*' | '/' => 2,
        '+' | '-' => 1,
        _ => 0,
    }
}

pub struct Parser {
    lines: Vec<String>,
    module: Module,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.lines().map(|l| l.to_string()).collect(),
            module: Module::new(),
        }
    }

    pub fn parse(mut self) -> CompileResult<Module> {
        let mut line = 0usize;
        let mut col = 0usize;
        loop {
            if line >= self.lines.len() {
                break;
            }
            let (tok, pos) = self.next_token(line, col);
            if tok.is_empty() {
                line += 1;
                col = 0;
                continue;
            }
            if tok == "func" {
                let (newline, newcol) = self.parse_kernel(line, pos)?;
                line = newline;
                col = newcol;
            } else {
                return Err(self.err_syntax(line, col, format!("expected 'func' but found '{tok}'")));
            }
        }
        Ok(self.module)
    }

    fn next_token(&self, line: usize, col: usize) -> (String, usize) {
        if line >= self.lines.len() {
            return (String::new(), col);
        }
        lexer::next_token(&self.lines[line], col)
    }

    fn loc(&self, line0: usize, col0: usize) -> Location {
        Location::new(line0 + 1, col0 + 1)
    }

    fn err_syntax(&self, line0: usize, col0: usize, msg: impl Into<String>) -> CompileError {
        CompileError::syntax(self.loc(line0, col0), msg)
    }

    fn err_semantic(&self, line0: usize, col0: usize, msg: impl Into<String>) -> CompileError {
        CompileError::semantic(self.loc(line0, col0), msg)
    }

    fn check_paren_balance(&self, line: usize) -> CompileResult<()> {
        let text = &self.lines[line];
        let mut depth = 0i32;
        for c in text.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(self.err_syntax(line, 0, "unbalanced parentheses on this line"));
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(self.err_syntax(line, 0, "unbalanced parentheses on this line"));
        }
        Ok(())
    }

    // ---- kernel header & body -------------------------------------

    fn parse_kernel(&mut self, line: usize, col: usize) -> CompileResult<(usize, usize)> {
        let (kernel, header_line, header_col) = self.parse_kernel_header(line, col)?;
        let kernel_rc = Rc::new(kernel);

        self.module
            .defined_nodes
            .insert(kernel_rc.name.clone(), Symbol::Kernel(kernel_rc.clone()));
        match kernel_rc.scope {
            KernelScope::Global => {
                self.module.global_kernels.insert(kernel_rc.name.clone(), kernel_rc.clone());
            }
            KernelScope::Device => {
                self.module.device_kernels.insert(kernel_rc.name.clone(), kernel_rc.clone());
            }
        }

        let (body_line, body_col) = self.parse_kernel_body(&kernel_rc, header_line, header_col)?;

        let has_return = kernel_rc
            .body
            .borrow()
            .iter()
            .any(|nid| matches!(self.module.get(*nid), Node::Return { .. }));
        if !has_return {
            return Err(self.err_semantic(
                body_line,
                body_col,
                format!("kernel '{}' has no return statement", kernel_rc.name),
            ));
        }

        Ok((body_line, body_col))
    }

    fn parse_kind_suffix(&self, line: usize, col: usize) -> CompileResult<(VariableKind, usize)> {
        let (tok, pos) = self.next_token(line, col);
        if tok == "[" {
            let (close, close_pos) = self.next_token(line, pos);
            if close != "]" {
                return Err(self.err_syntax(line, pos, "expected ']' to close a tensor type"));
            }
            Ok((VariableKind::Tensor, close_pos))
        } else {
            Ok((VariableKind::Scalar, col))
        }
    }

    fn parse_param(&mut self, line: usize, col: usize) -> CompileResult<(Rc<Variable>, usize)> {
        let (type_tok, pos) = self.next_token(line, col);
        if type_tok != "f32" {
            return Err(self.err_semantic(line, col, format!("expected a f32 type, found '{type_tok}'")));
        }
        let (kind, col2) = self.parse_kind_suffix(line, pos)?;
        let (name_tok, name_pos) = self.next_token(line, col2);
        if name_tok.is_empty() {
            return Err(self.err_syntax(line, col2, "expected a parameter name"));
        }
        if self.module.defined_nodes.contains_key(&name_tok) {
            return Err(self.err_semantic(line, col2, format!("duplicate definition: {name_tok}")));
        }
        let var = Rc::new(Variable {
            id: id::next(),
            name: name_tok.clone(),
            dtype: DataType::Float32,
            kind,
        });
        self.module.defined_nodes.insert(name_tok, Symbol::Variable(var.clone()));
        self.module.insert(Node::Variable(var.clone()));
        Ok((var, name_pos))
    }

    fn parse_kernel_header(&mut self, line: usize, col: usize) -> CompileResult<(Kernel, usize, usize)> {
        let (scope_tok, pos) = self.next_token(line, col);
        let scope = match scope_tok.as_str() {
            "global" => KernelScope::Global,
            "device" => KernelScope::Device,
            _ => {
                return Err(self.err_semantic(
                    line,
                    col,
                    format!("unsupported scope keyword '{scope_tok}', expected 'global' or 'device'"),
                ))
            }
        };

        let (ret_tok, ret_pos) = self.next_token(line, pos);
        let (ret, col) = if ret_tok == "void" {
            (None, ret_pos)
        } else if ret_tok == "f32" {
            let (kind, col2) = self.parse_kind_suffix(line, ret_pos)?;
            (Some(RetType { dtype: DataType::Float32, kind }), col2)
        } else {
            return Err(self.err_semantic(line, pos, format!("expected 'void' or 'f32' return type, found '{ret_tok}'")));
        };

        let (name_tok, name_pos) = self.next_token(line, col);
        if name_tok.is_empty() {
            return Err(self.err_syntax(line, col, "expected a kernel name"));
        }
        if self.module.defined_nodes.contains_key(&name_tok) {
            return Err(self.err_semantic(line, col, format!("duplicate definition: {name_tok}")));
        }

        let (paren, paren_pos) = self.next_token(line, name_pos);
        if paren != "(" {
            return Err(self.err_syntax(line, name_pos, format!("expected '(' but found '{paren}'")));
        }

        let mut args = Vec::new();
        let mut col = paren_pos;
        loop {
            let (peek, peek_pos) = self.next_token(line, col);
            if peek == ")" {
                col = peek_pos;
                break;
            }
            let (var, newcol) = self.parse_param(line, col)?;
            args.push(var);
            let (sep, sep_pos) = self.next_token(line, newcol);
            if sep == "," {
                col = sep_pos;
            } else if sep == ")" {
                col = sep_pos;
                break;
            } else {
                return Err(self.err_syntax(line, newcol, format!("expected ',' or ')' but found '{sep}'")));
            }
        }

        let kernel = Kernel {
            id: id::next(),
            name: name_tok,
            scope,
            args,
            ret,
            body: std::cell::RefCell::new(Vec::new()),
        };
        Ok((kernel, line, col))
    }

    fn parse_kernel_body(&mut self, kernel: &Rc<Kernel>, line: usize, col: usize) -> CompileResult<(usize, usize)> {
        let mut line = line;
        let mut col = col;

        loop {
            if line >= self.lines.len() {
                return Err(self.err_syntax(line.saturating_sub(1), 0, "expected '{' to start the kernel body"));
            }
            let (tok, pos) = self.next_token(line, col);
            if tok.is_empty() {
                line += 1;
                col = 0;
                continue;
            }
            if tok == "{" {
                col = pos;
                break;
            }
            return Err(self.err_syntax(line, col, format!("expected '{{' but found '{tok}'")));
        }

        loop {
            if line >= self.lines.len() {
                return Err(self.err_syntax(line.saturating_sub(1), 0, "expected '}' to close the kernel body"));
            }
            let (tok, pos) = self.next_token(line, col);
            if tok.is_empty() {
                line += 1;
                col = 0;
                continue;
            }
            if tok == "}" {
                col = pos;
                break;
            }

            self.check_paren_balance(line)?;

            if tok == "var" {
                let (node_id, newcol) = self.parse_alias(line, pos)?;
                kernel.body.borrow_mut().push(node_id);
                col = newcol;
            } else if tok == "return" {
                let (node_id, newcol) = self.parse_return(kernel, line, pos)?;
                kernel.body.borrow_mut().push(node_id);
                col = newcol;
            } else {
                let first = tok;
                let (tok2, pos2) = self.next_token(line, pos);
                if tok2 == "=" {
                    let (node_id, newcol) = self.parse_assignment(&first, line, pos2)?;
                    kernel.body.borrow_mut().push(node_id);
                    col = newcol;
                } else if tok2 == "(" {
                    let (call_id, newcol) = self.parse_call(&first, line, pos2, line, pos)?;
                    let (semi, semi_pos) = self.next_token(line, newcol);
                    if semi != ";" {
                        return Err(self.err_syntax(line, newcol, "expected ';' after expression statement"));
                    }
                    kernel.body.borrow_mut().push(call_id);
                    col = semi_pos;
                } else {
                    return Err(self.err_syntax(line, pos, format!("unexpected expression, starts with '{first}'")));
                }
            }
        }

        Ok((line, col))
    }

    // ---- statements -------------------------------------------------

    fn parse_alias(&mut self, line: usize, col: usize) -> CompileResult<(NodeId, usize)> {
        let (name_tok, pos) = self.next_token(line, col);
        if self.module.defined_nodes.contains_key(&name_tok) {
            return Err(self.err_semantic(
                line,
                col,
                format!("alias variable is already defined (duplication not allowed): {name_tok}"),
            ));
        }
        let (eq_tok, eq_pos) = self.next_token(line, pos);
        if eq_tok != "=" {
            return Err(self.err_syntax(line, pos, format!("expected '=' but found '{eq_tok}'")));
        }
        let (src, newcol, term) = self.parse_expr(line, eq_pos, &[";"])?;
        if term != ";" {
            return Err(self.err_syntax(line, newcol, "alias statement not terminated with ';'"));
        }
        let src_id = src.ok_or_else(|| self.err_syntax(line, eq_pos, "alias requires a value"))?;

        let aid = id::next();
        self.module.insert(Node::Alias { id: aid, name: name_tok.clone(), src: src_id });
        self.module.defined_nodes.insert(name_tok, Symbol::Alias(aid));
        Ok((aid, newcol))
    }

    fn parse_return(&mut self, kernel: &Rc<Kernel>, line: usize, col: usize) -> CompileResult<(NodeId, usize)> {
        let (value, newcol, term) = self.parse_expr(line, col, &[";"])?;
        if term != ";" {
            return Err(self.err_syntax(line, newcol, "return statement not terminated with ';'"));
        }
        match (&kernel.ret, &value) {
            (None, Some(_)) => {
                return Err(self.err_semantic(line, col, format!("kernel '{}' is void but returns a value", kernel.name)))
            }
            (Some(_), None) => {
                return Err(self.err_semantic(
                    line,
                    col,
                    format!("kernel '{}' declares a return type but returns void", kernel.name),
                ))
            }
            _ => {}
        }
        let rid = id::next();
        self.module.insert(Node::Return { id: rid, value });
        Ok((rid, newcol))
    }

    fn parse_assignment(&mut self, name: &str, line: usize, col: usize) -> CompileResult<(NodeId, usize)> {
        let target = match self.module.defined_nodes.get(name) {
            Some(Symbol::Variable(v)) if v.kind == VariableKind::Tensor => v.clone(),
            Some(Symbol::Variable(_)) => {
                return Err(self.err_semantic(line, col, format!("cannot assign to non-tensor variable: {name}")))
            }
            Some(_) => return Err(self.err_semantic(line, col, format!("cannot assign to non-variable: {name}"))),
            None => return Err(self.err_semantic(line, col, format!("Assigning to undefined variable: {name}"))),
        };
        let (src, newcol, term) = self.parse_expr(line, col, &[";"])?;
        if term != ";" {
            return Err(self.err_syntax(line, newcol, "assignment not terminated with ';'"));
        }
        let src_id = src.ok_or_else(|| self.err_syntax(line, col, "assignment requires a value"))?;

        let aid = id::next();
        self.module.insert(Node::Assignment { id: aid, target, src: src_id });
        Ok((aid, newcol))
    }

    // ---- expressions --------------------------------------------------

    fn value_kind(&self, nid: NodeId) -> VariableKind {
        match self.module.get(nid) {
            Node::Variable(v) => v.kind,
            Node::KernelCall { kernel, .. } => kernel.ret.map(|r| r.kind).unwrap_or(VariableKind::Scalar),
            _ => VariableKind::Scalar,
        }
    }

    fn resolve_value_name(&self, name: &str, line: usize, col: usize) -> CompileResult<NodeId> {
        match self.module.defined_nodes.get(name) {
            Some(Symbol::Variable(v)) => Ok(v.id),
            Some(Symbol::Alias(id)) => Ok(*id),
            Some(Symbol::Kernel(_)) => {
                Err(self.err_semantic(line, col, format!("'{name}' names a kernel, not a value")))
            }
            None => Err(self.err_semantic(line, col, format!("undefined variable: {name}"))),
        }
    }

    fn parse_call(
        &mut self,
        name: &str,
        line: usize,
        start_col: usize,
        err_line: usize,
        err_col: usize,
    ) -> CompileResult<(NodeId, usize)> {
        let sym = self.module.defined_nodes.get(name).cloned();
        match sym {
            Some(Symbol::Kernel(kernel)) => {
                let mut args = Vec::new();
                let mut col = start_col;
                loop {
                    let (peek, peek_pos) = self.next_token(line, col);
                    if peek == ")" {
                        col = peek_pos;
                        break;
                    }
                    let (arg, newcol, term) = self.parse_expr(line, col, &[",", ")"])?;
                    let arg_id = arg.ok_or_else(|| self.err_syntax(line, col, "expected an argument expression"))?;
                    args.push(arg_id);
                    col = newcol;
                    if term.is_empty() {
                        return Err(self.err_syntax(line, newcol, "call arguments not terminated with ')'"));
                    }
                    if term == ")" {
                        break;
                    }
                }
                if args.len() != kernel.args.len() {
                    return Err(self.err_semantic(
                        err_line,
                        err_col,
                        format!(
                            "wrong number of arguments calling '{}': expected {}, found {}",
                            name,
                            kernel.args.len(),
                            args.len()
                        ),
                    ));
                }
                for (i, (arg, param)) in args.iter().zip(kernel.args.iter()).enumerate() {
                    if self.value_kind(*arg) != param.kind {
                        return Err(self.err_semantic(
                            err_line,
                            err_col,
                            format!("argument {} to '{}' has the wrong kind", i, name),
                        ));
                    }
                }
                let cid = id::next();
                self.module.insert(Node::KernelCall { id: cid, kernel: kernel.clone(), args });
                Ok((cid, col))
            }
            Some(Symbol::Variable(_)) | Some(Symbol::Alias(_)) => {
                Err(self.err_semantic(err_line, err_col, format!("'{name}' is not callable")))
            }
            None => match name {
                "abs" | "sqrt" | "log2" | "exp2" => {
                    let (arg, newcol, term) = self.parse_expr(line, start_col, &[")"])?;
                    let arg_id = arg.ok_or_else(|| {
                        self.err_syntax(line, start_col, format!("{name}() requires exactly one argument"))
                    })?;
                    if term != ")" {
                        return Err(self.err_syntax(line, newcol, format!("{name}() call not terminated with ')'")));
                    }
                    let cid = id::next();
                    let node = match name {
                        "abs" => Node::Abs { id: cid, x: arg_id },
                        "sqrt" => Node::Sqrt { id: cid, x: arg_id },
                        "log2" => Node::Log2 { id: cid, x: arg_id },
                        "exp2" => Node::Exp2 { id: cid, x: arg_id },
                        _ => unreachable!(),
                    };
                    self.module.insert(node);
                    Ok((cid, newcol))
                }
                _ => Err(self.err_semantic(err_line, err_col, format!("undefined function can not be called: {name}"))),
            },
        }
    }

    /// Parses one arithmetic expression, stopping at (and consuming) the
    /// first token in `stops`, or at end-of-line. Returns the resulting
    /// node (`None` for an empty/void expression), the column just past
    /// the terminator, and the terminator token itself (empty string if
    /// the line ran out first).
    fn parse_expr(&mut self, line: usize, start_col: usize, stops: &[&str]) -> CompileResult<(Option<NodeId>, usize, String)> {
        let mut col = start_col;
        let mut operands: Vec<NodeId> = Vec::new();
        let mut ops: Vec<char> = Vec::new();
        let mut expect_operand = true;

        let (mut tok, mut pos) = self.next_token(line, col);
        col = pos;

        while !tok.is_empty() && !stops.contains(&tok.as_str()) {
            if tok == "(" {
                if !expect_operand {
                    return Err(self.err_syntax(line, col, "expected an operator before '('"));
                }
                let (sub, newcol, term) = self.parse_expr(line, col, &[")"])?;
                if term != ")" {
                    return Err(self.err_syntax(line, newcol, "parenthesized expression not closed"));
                }
                let sub_id = sub.ok_or_else(|| self.err_syntax(line, col, "empty parenthesized expression"))?;
                operands.push(sub_id);
                expect_operand = false;
                col = newcol;
            } else if tok.chars().count() == 1 && ARITH_OPS.contains(&tok.chars().next().unwrap()) {
                if expect_operand {
                    return Err(self.err_syntax(line, col, format!("expected an operand before '{tok}'")));
                }
                ops.push(tok.chars().next().unwrap());
                expect_operand = true;
            } else if tok == "=" {
                return Err(self.err_syntax(line, col, "unexpected '=' inside an expression"));
            } else {
                if !expect_operand {
                    return Err(self.err_syntax(line, col, format!("expected an operator before '{tok}'")));
                }
                let name = tok.clone();
                let (peek_tok, peek_pos) = self.next_token(line, col);
                if peek_tok == "(" {
                    let (call_id, newcol) = self.parse_call(&name, line, peek_pos, line, col)?;
                    operands.push(call_id);
                    col = newcol;
                } else if name.contains('.') {
                    let value: f32 = name
                        .parse()
                        .map_err(|_| self.err_semantic(line, col, format!("malformed numeric literal: {name}")))?;
                    let cid = id::next();
                    self.module.insert(Node::Constant { id: cid, value, dtype: DataType::Float32 });
                    operands.push(cid);
                } else {
                    let nid = self.resolve_value_name(&name, line, col)?;
                    operands.push(nid);
                }
                expect_operand = false;
            }

            let (ntok, npos) = self.next_token(line, col);
            tok = ntok;
            col = npos;
        }

        if expect_operand && !ops.is_empty() {
            return Err(self.err_syntax(line, col, "expression ends with a dangling operator"));
        }

        let result = Self::collapse(&mut self.module, operands, ops);
        Ok((result, col, tok))
    }

    fn collapse(module: &mut Module, mut operands: Vec<NodeId>, mut ops: Vec<char>) -> Option<NodeId> {
        while !ops.is_empty() {
            let mut best = 0usize;
            let mut best_prec = precedence(ops[0]);
            for i in 1..ops.len() {
                let p = precedence(ops[i]);
                if best_prec < p {
                    best = i;
                    best_prec = p;
                }
            }
            let op = ops.remove(best);
            let rhs = operands.remove(best + 1);
            let lhs = operands[best];
            let nid = id::next();
            let node = match op {
                '*' => Node::Mul { id: nid, lhs, rhs },
                '/' => Node::Div { id: nid, lhs, rhs },
                '+' => Node::Add { id: nid, lhs, rhs },
                '-' => Node::Sub { id: nid, lhs, rhs },
                _ => unreachable!("only arithmetic operators are ever pushed"),
            };
            module.insert(node);
            operands[best] = nid;
        }
        operands.into_iter().next()
    }
}

pub fn parse_source(source: &str) -> CompileResult<Module> {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, VariableKind};

    #[test]
    fn s1_vector_add() {
        let src = "func global void ret_vec(f32[] a, f32[] b, f32[] c) { c = a + b; return; }";
        let module = parse_source(src).expect("should parse");
        assert_eq!(module.global_kernels.len(), 1);
        let kernel = module.global_kernels.get("ret_vec").unwrap();
        assert_eq!(kernel.args.len(), 3);
        assert!(kernel.is_void());
        let body = kernel.body.borrow();
        assert_eq!(body.len(), 2);
        match module.get(body[0]) {
            Node::Assignment { src, .. } => match module.get(*src) {
                Node::Add { .. } => {}
                other => panic!("expected Add, found {other:?}"),
            },
            other => panic!("expected Assignment, found {other:?}"),
        }
        assert!(matches!(module.get(body[1]), Node::Return { value: None, .. }));
    }

    #[test]
    fn s2_precedence_add_before_mul() {
        let src = "func global void k(f32[] a, f32[] b, f32[] c, f32[] d) { d = a + b * c; return; }";
        let module = parse_source(src).expect("should parse");
        let kernel = module.global_kernels.get("k").unwrap();
        let body = kernel.body.borrow();
        match module.get(body[0]) {
            Node::Assignment { src, .. } => match module.get(*src) {
                Node::Add { rhs, .. } => {
                    assert!(matches!(module.get(*rhs), Node::Mul { .. }));
                }
                other => panic!("expected Add at the root, found {other:?}"),
            },
            other => panic!("expected Assignment, found {other:?}"),
        }
    }

    #[test]
    fn s3_left_associative_subtraction() {
        let src = "func global void k(f32[] a, f32[] b, f32[] c, f32[] d) { d = a - b - c; return; }";
        let module = parse_source(src).expect("should parse");
        let kernel = module.global_kernels.get("k").unwrap();
        let body = kernel.body.borrow();
        match module.get(body[0]) {
            Node::Assignment { src, .. } => match module.get(*src) {
                Node::Sub { lhs, rhs, .. } => {
                    assert!(matches!(module.get(*rhs), Node::Variable(v) if v.kind == VariableKind::Tensor));
                    assert!(matches!(module.get(*lhs), Node::Sub { .. }));
                }
                other => panic!("expected Sub at the root, found {other:?}"),
            },
            other => panic!("expected Assignment, found {other:?}"),
        }
    }

    #[test]
    fn s4_builtin_and_literal() {
        let src = "func global void k(f32[] a, f32[] d) { d = sqrt(a) + 1.5; return; }";
        let module = parse_source(src).expect("should parse");
        let kernel = module.global_kernels.get("k").unwrap();
        let body = kernel.body.borrow();
        match module.get(body[0]) {
            Node::Assignment { src, .. } => match module.get(*src) {
                Node::Add { lhs, rhs, .. } => {
                    assert!(matches!(module.get(*lhs), Node::Sqrt { .. }));
                    assert!(matches!(module.get(*rhs), Node::Constant { value, .. } if (*value - 1.5).abs() < 1e-6));
                }
                other => panic!("expected Add, found {other:?}"),
            },
            other => panic!("expected Assignment, found {other:?}"),
        }
    }

    #[test]
    fn s5_device_call_through_alias() {
        let src = "func device f32 f(f32 x, f32 y) { return x + y; }\n\
                    func global void g(f32[] a, f32[] b, f32[] c) { var t = f(a, b); c = t; return; }";
        let module = parse_source(src).expect("should parse");
        assert_eq!(module.device_kernels.len(), 1);
        let g = module.global_kernels.get("g").unwrap();
        let body = g.body.borrow();
        assert!(matches!(module.get(body[0]), Node::Alias { .. }));
        match module.get(body[1]) {
            Node::Assignment { src, .. } => assert!(matches!(module.get(*src), Node::Alias { .. })),
            other => panic!("expected Assignment, found {other:?}"),
        }
    }

    #[test]
    fn s6_assignment_to_undefined_variable() {
        let src = "func global void k(f32[] a) { b = a; return; }";
        let err = parse_source(src).unwrap_err();
        assert!(err.to_string().ends_with("Assigning to undefined variable: b"));
    }

    #[test]
    fn missing_return_is_fatal() {
        let src = "func global void k(f32[] a) { }";
        assert!(parse_source(src).is_err());
    }

    #[test]
    fn empty_parameter_list_parses() {
        let src = "func global void k() { return; }";
        let module = parse_source(src).expect("should parse");
        assert_eq!(module.global_kernels.get("k").unwrap().args.len(), 0);
    }

    #[test]
    fn comment_only_lines_are_skipped() {
        let src = "# just a comment\n\nfunc global void k() { # inline comment\nreturn; }";
        assert!(parse_source(src).is_ok());
    }

    #[test]
    fn duplicate_kernel_name_is_fatal() {
        let src = "func global void k() { return; }\nfunc global void k() { return; }";
        assert!(parse_source(src).is_err());
    }

    #[test]
    fn arity_mismatch_is_fatal() {
        let src = "func device f32 f(f32 x) { return x; }\n\
                    func global void g(f32 a) { var t = f(a, a); return; }";
        assert!(parse_source(src).is_err());
    }
}

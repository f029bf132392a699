//! Executor: runs an assembled [`Program`] against a binding environment.

use crate::assemble::{INCLUDE, PRINT};
use crate::env::Environment;
use crate::error::{EvalError, EvalResult};
use crate::print::print_values;
use crate::value::{is_truthy, loose_eq, number, to_text, type_name};
use stencil_types::ast::*;
use stencil_types::{Bindings, Value};

/// Renders nested templates for the `include` builtin.
///
/// The engine implements this with a handle to itself, so nested includes
/// share its cache and globals.
pub trait Includer {
    /// Render `file` (relative to the including template) with `imports`.
    fn include(&self, file: &str, imports: &Bindings) -> EvalResult<String>;
}

/// An [`Includer`] for standalone execution: every include fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl Includer for NoIncludes {
    fn include(&self, file: &str, _imports: &Bindings) -> EvalResult<String> {
        Err(EvalError::UnknownFunction(format!(
            "include(\"{file}\") is not available without an engine"
        )))
    }
}

/// Executes one program and collects its output.
pub struct Executor<'a> {
    /// Variable environment (scoped).
    env: Environment,
    /// Output accumulator.
    output: String,
    /// Handle used to render included templates.
    includer: &'a dyn Includer,
}

impl<'a> Executor<'a> {
    /// Create an executor with an empty environment.
    pub fn new(includer: &'a dyn Includer) -> Self {
        Self {
            env: Environment::new(),
            output: String::new(),
            includer,
        }
    }

    /// Bind globals then imports; imports win on name clashes.
    pub fn with_bindings(mut self, globals: &Bindings, imports: &Bindings) -> Self {
        self.env.bind_all(globals);
        self.env.bind_all(imports);
        self
    }

    /// Run the program and return the accumulated output.
    pub fn execute(mut self, program: &Program) -> EvalResult<String> {
        self.exec_block(&program.body)?;
        Ok(self.output)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn exec_block(&mut self, body: &[Stmt]) -> EvalResult<()> {
        for stmt in body {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_scoped(&mut self, body: &[Stmt]) -> EvalResult<()> {
        self.env.push_scope();
        let result = self.exec_block(body);
        self.env.pop_scope();
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match &stmt.kind {
            StmtKind::Emit(text) => self.output.push_str(text),
            StmtKind::Let { name, value } => {
                let v = self.eval_expr(value)?;
                self.env.define(&name.name, v);
            }
            StmtKind::Assign { name, op, value } => self.exec_assign(name, *op, value)?,
            StmtKind::If(if_stmt) => self.exec_if(if_stmt)?,
            StmtKind::For(for_stmt) => self.exec_for(for_stmt)?,
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
            }
        }
        Ok(())
    }

    fn exec_assign(&mut self, name: &Ident, op: AssignOp, value: &Expr) -> EvalResult<()> {
        let rv = self.eval_expr(value)?;
        let new_value = match op {
            AssignOp::Set => rv,
            AssignOp::Add => {
                let current = self.eval_identifier(&name.name)?;
                self.eval_add(&current, &rv)?
            }
        };
        if self.env.set(&name.name, new_value) {
            Ok(())
        } else {
            Err(EvalError::UndeclaredAssignment(name.name.clone()))
        }
    }

    fn exec_if(&mut self, if_stmt: &IfStmt) -> EvalResult<()> {
        let cond = self.eval_expr(&if_stmt.condition)?;
        if is_truthy(&cond) {
            self.exec_scoped(&if_stmt.then_body)
        } else {
            match &if_stmt.else_branch {
                Some(ElseBranch::ElseIf(elif)) => self.exec_if(elif),
                Some(ElseBranch::Block(body)) => self.exec_scoped(body),
                None => Ok(()),
            }
        }
    }

    fn exec_for(&mut self, for_stmt: &ForStmt) -> EvalResult<()> {
        let iterable = self.eval_expr(&for_stmt.iterable)?;
        let items: Vec<Value> = match (for_stmt.kind, iterable) {
            (ForKind::Of, Value::Array(items)) => items,
            (ForKind::Of, Value::String(s)) => {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            }
            (ForKind::In, Value::Object(map)) => map.keys().cloned().map(Value::String).collect(),
            (ForKind::In, Value::Array(items)) => {
                (0..items.len()).map(|i| Value::String(i.to_string())).collect()
            }
            (ForKind::In, Value::String(s)) => {
                (0..s.chars().count()).map(|i| Value::String(i.to_string())).collect()
            }
            (kind, other) => {
                let word = if kind == ForKind::Of { "of" } else { "in" };
                return Err(EvalError::TypeMismatch(format!(
                    "cannot iterate {} with 'for...{word}'",
                    type_name(&other)
                )));
            }
        };

        for item in items {
            self.env.push_scope();
            self.env.define(&for_stmt.binding.name, item);
            let result = self.exec_block(&for_stmt.body);
            self.env.pop_scope();
            result?;
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a value.
    pub fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::NumberLit(n) => Ok(number(*n)),
            ExprKind::StringLit(s) => Ok(Value::String(s.clone())),
            ExprKind::BoolLit(b) => Ok(Value::Bool(*b)),
            ExprKind::NullLit => Ok(Value::Null),
            ExprKind::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::Array(values))
            }
            ExprKind::ObjectLit(entries) => {
                let mut map = Bindings::new();
                for (key, value) in entries {
                    let v = self.eval_expr(value)?;
                    map.insert(key.clone(), v);
                }
                Ok(Value::Object(map))
            }
            ExprKind::Identifier(name) => self.eval_identifier(name),
            ExprKind::Member { object, property } => {
                let obj = self.eval_expr(object)?;
                member(&obj, &property.name)
            }
            ExprKind::Index { object, index } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                self.eval_index(&obj, &idx)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
            ExprKind::Unary { op, operand } => {
                let v = self.eval_expr(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&v))),
                    UnaryOp::Neg => match v.as_f64() {
                        Some(n) => Ok(number(-n)),
                        None => Err(EvalError::TypeMismatch(format!(
                            "cannot negate {}",
                            type_name(&v)
                        ))),
                    },
                }
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let cond = self.eval_expr(condition)?;
                if is_truthy(&cond) {
                    self.eval_expr(then_expr)
                } else {
                    self.eval_expr(else_expr)
                }
            }
        }
    }

    // ── Identifiers & Access ─────────────────────────────────────────────

    fn eval_identifier(&self, name: &str) -> EvalResult<Value> {
        self.env
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn eval_index(&self, obj: &Value, idx: &Value) -> EvalResult<Value> {
        match (obj, idx) {
            (Value::Null, _) => Err(EvalError::NullAccess(format!(
                "cannot read index {} of null",
                to_text(idx)
            ))),
            (Value::Array(items), Value::Number(n)) => Ok(n
                .as_u64()
                .and_then(|i| items.get(i as usize))
                .cloned()
                .unwrap_or(Value::Null)),
            (Value::String(s), Value::Number(n)) => Ok(n
                .as_u64()
                .and_then(|i| s.chars().nth(i as usize))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null)),
            (_, key) => member(obj, &to_text(key)),
        }
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn eval_args(&mut self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> EvalResult<Value> {
        match &callee.kind {
            ExprKind::Identifier(name) if name == PRINT => {
                let values = self.eval_args(args)?;
                let text = print_values(&values)?;
                self.output.push_str(&text);
                Ok(Value::Null)
            }
            ExprKind::Identifier(name) if name == INCLUDE => {
                let values = self.eval_args(args)?;
                self.call_include(values)
            }
            ExprKind::Identifier(name) => Err(EvalError::UnknownFunction(name.clone())),
            ExprKind::Member { object, property } => {
                let receiver = self.eval_expr(object)?;
                let values = self.eval_args(args)?;
                call_method(&receiver, &property.name, &values)
            }
            _ => Err(EvalError::TypeMismatch(
                "expression is not callable".to_string(),
            )),
        }
    }

    fn call_include(&mut self, args: Vec<Value>) -> EvalResult<Value> {
        let mut args = args.into_iter();
        let (file, imports) = match (args.next(), args.next(), args.next()) {
            (Some(Value::String(file)), imports, None) => (file, imports),
            (Some(other), _, None) => {
                return Err(EvalError::TypeMismatch(format!(
                    "include expects a file name string, got {}",
                    type_name(&other)
                )))
            }
            _ => {
                return Err(EvalError::ArgumentCount(
                    "include takes a file name and optional imports".to_string(),
                ))
            }
        };
        let imports = match imports {
            None | Some(Value::Null) => Bindings::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(EvalError::TypeMismatch(format!(
                    "include imports must be an object, got {}",
                    type_name(&other)
                )))
            }
        };
        let text = self.includer.include(&file, &imports)?;
        self.output.push_str(&text);
        Ok(Value::Null)
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn eval_binary(&mut self, left: &Expr, op: BinOp, right: &Expr) -> EvalResult<Value> {
        let lv = self.eval_expr(left)?;
        // Logical operators short-circuit and yield an operand, as in JS.
        match op {
            BinOp::And if !is_truthy(&lv) => return Ok(lv),
            BinOp::Or if is_truthy(&lv) => return Ok(lv),
            _ => {}
        }
        let rv = self.eval_expr(right)?;

        match op {
            BinOp::And | BinOp::Or => Ok(rv),
            BinOp::Add => self.eval_add(&lv, &rv),
            BinOp::Sub => arith(&lv, &rv, "-", |a, b| a - b),
            BinOp::Mul => arith(&lv, &rv, "*", |a, b| a * b),
            BinOp::Div => {
                if rv.as_f64() == Some(0.0) {
                    return Err(EvalError::ArithmeticTrap("division by zero".into()));
                }
                arith(&lv, &rv, "/", |a, b| a / b)
            }
            BinOp::Mod => {
                if rv.as_f64() == Some(0.0) {
                    return Err(EvalError::ArithmeticTrap("modulo by zero".into()));
                }
                arith(&lv, &rv, "%", |a, b| a % b)
            }
            BinOp::Eq => Ok(Value::Bool(loose_eq(&lv, &rv))),
            BinOp::NotEq => Ok(Value::Bool(!loose_eq(&lv, &rv))),
            BinOp::Less => compare(&lv, &rv, |o| o.is_lt()),
            BinOp::Greater => compare(&lv, &rv, |o| o.is_gt()),
            BinOp::LessEq => compare(&lv, &rv, |o| o.is_le()),
            BinOp::GreaterEq => compare(&lv, &rv, |o| o.is_ge()),
        }
    }

    fn eval_add(&self, lv: &Value, rv: &Value) -> EvalResult<Value> {
        match (lv, rv) {
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Ok(number(a + b)),
                _ => Err(EvalError::TypeMismatch("number out of range".into())),
            },
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", to_text(lv), to_text(rv))))
            }
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot add {} and {}",
                type_name(lv),
                type_name(rv)
            ))),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Value operations
// ══════════════════════════════════════════════════════════════════════════

fn arith(lv: &Value, rv: &Value, symbol: &str, op: fn(f64, f64) -> f64) -> EvalResult<Value> {
    match (lv.as_f64(), rv.as_f64()) {
        (Some(a), Some(b)) => Ok(number(op(a, b))),
        _ => Err(EvalError::TypeMismatch(format!(
            "cannot apply '{symbol}' to {} and {}",
            type_name(lv),
            type_name(rv)
        ))),
    }
}

fn compare(lv: &Value, rv: &Value, test: fn(std::cmp::Ordering) -> bool) -> EvalResult<Value> {
    let ordering = match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot compare {} and {}",
                type_name(lv),
                type_name(rv)
            )))
        }
    };
    // NaN never orders; comparisons against it are false.
    Ok(Value::Bool(ordering.is_some_and(test)))
}

/// `value.property`; missing properties read as `null`.
fn member(value: &Value, property: &str) -> EvalResult<Value> {
    match value {
        Value::Null => Err(EvalError::NullAccess(format!(
            "cannot read property '{property}' of null"
        ))),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::from(items.len())),
        Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult<Value> {
    match (receiver, method) {
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "includes") => {
            let needle = string_arg(method, args)?;
            Ok(Value::Bool(s.contains(needle.as_str())))
        }
        (Value::String(s), "startsWith") => {
            let prefix = string_arg(method, args)?;
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        (Value::String(s), "endsWith") => {
            let suffix = string_arg(method, args)?;
            Ok(Value::Bool(s.ends_with(suffix.as_str())))
        }
        (Value::Array(items), "join") => {
            let separator = match args.first() {
                None | Some(Value::Null) => ",".to_string(),
                Some(sep) => to_text(sep),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => to_text(other),
                })
                .collect();
            Ok(Value::String(parts.join(&separator)))
        }
        (Value::Array(items), "includes") => {
            let needle = args.first().unwrap_or(&Value::Null);
            Ok(Value::Bool(items.iter().any(|item| loose_eq(item, needle))))
        }
        (Value::Null, _) => Err(EvalError::NullAccess(format!(
            "cannot call '{method}' on null"
        ))),
        _ => Err(EvalError::UnknownFunction(format!(
            "{}.{method}",
            type_name(receiver)
        ))),
    }
}

fn string_arg(method: &str, args: &[Value]) -> EvalResult<String> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(to_text(other)),
        None => Err(EvalError::ArgumentCount(format!(
            "{method} expects one argument"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_on_null_fails() {
        let err = member(&Value::Null, "name").unwrap_err();
        assert!(matches!(err, EvalError::NullAccess(_)));
    }

    #[test]
    fn test_member_length() {
        assert_eq!(member(&json!("héllo"), "length").unwrap(), json!(5));
        assert_eq!(member(&json!([1, 2]), "length").unwrap(), json!(2));
        assert_eq!(member(&json!({"a": 1}), "b").unwrap(), Value::Null);
    }

    #[test]
    fn test_compare_strings_lexicographically() {
        assert_eq!(compare(&json!("a"), &json!("b"), |o| o.is_lt()).unwrap(), json!(true));
        assert!(compare(&json!("a"), &json!(1), |o| o.is_lt()).is_err());
    }

    #[test]
    fn test_join_skips_nulls() {
        let out = call_method(&json!(["a", null, 1]), "join", &[json!("-")]).unwrap();
        assert_eq!(out, json!("a--1"));
    }
}

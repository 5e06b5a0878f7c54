//! Tree-walking evaluator for the shell's script language.
//!
//! The interpreter runs in one of two modes:
//!
//! - **Real**: `await` performs pending operations against the backend.
//!   Calls inside functions defined by an earlier program are performed
//!   where they are made, like the body of an async function.
//! - **Tracking** (dry run): the interpreter carries a
//!   [`SuspensionCollector`]. Nothing is ever performed; every call in the
//!   current source that produced a pending operation without being
//!   awaited is recorded instead. Values the dry run cannot know become
//!   [`Value::Opaque`], which flows through every operation without error.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::ast::{
    BinaryOp, Expr, ExprKind, FunctionBody, FunctionDef, LogicalOp, Program, Stmt, UnaryOp,
};
use super::scope::Scope;
use super::source::{SourceId, Span};
use super::value::{format_number, Builtin, Object, PendingOp, Value};
use crate::backend::{Backend, BackendCall, Target};
use crate::editor::SourceLookup;
use crate::error::{EvalError, EvalResult};
use crate::rewrite::SuspensionCollector;

/// Maximum nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 48;

/// Database-level operations; every other property of a database is a
/// collection.
const DATABASE_METHODS: &[&str] = &["getCollectionNames", "dropDatabase"];

/// How a statement completed.
enum Flow {
    Normal(Value),
    Return(Value),
}

/// One step of an assignment target path.
enum PathKey {
    Field(String),
    Index(Value),
}

/// Evaluates programs against a scope and a backend.
pub struct Interpreter {
    scope: Scope,
    backend: Arc<dyn Backend>,
    collector: Option<SuspensionCollector>,
    /// The text of the program being run; spans elsewhere belong to
    /// functions defined by earlier programs.
    source: Option<SourceId>,
    output: Vec<String>,
    depth: usize,
}

impl Interpreter {
    /// Create an interpreter with the builtins bound.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let mut scope = Scope::new();
        for builtin in [Builtin::Print, Builtin::Sleep] {
            scope.set_global(builtin.name(), Value::Builtin(builtin));
        }
        Self {
            scope,
            backend,
            collector: None,
            source: None,
            output: Vec::new(),
            depth: 0,
        }
    }

    /// A tracking interpreter over an independent snapshot of this scope.
    ///
    /// Nothing the sandbox does is visible to `self`.
    pub fn sandbox(&self, collector: SuspensionCollector) -> Self {
        Self {
            scope: self.scope.snapshot(),
            backend: Arc::clone(&self.backend),
            collector: Some(collector),
            source: None,
            output: Vec::new(),
            depth: 0,
        }
    }

    /// True while suspension points are being recorded.
    pub fn is_tracking(&self) -> bool {
        self.collector.is_some()
    }

    /// Give up the collector, ending tracking.
    pub fn into_collector(self) -> Option<SuspensionCollector> {
        self.collector
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Drain lines written by `print`.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Run a program and return its completion value.
    ///
    /// The completion value is the value of the final statement if it is
    /// an expression, `undefined` otherwise.
    pub async fn run(&mut self, program: &Program) -> EvalResult<Value> {
        self.depth = 0;
        self.source = Some(program.source);
        self.hoist(&program.body);
        let last = program.body.len().saturating_sub(1);
        let mut completion = Value::Undefined;
        for (index, stmt) in program.body.iter().enumerate() {
            match self.exec(stmt).await? {
                Flow::Normal(value) if index == last => {
                    if matches!(stmt, Stmt::Expr(_)) {
                        completion = value;
                    }
                }
                Flow::Normal(Value::Pending(op)) if !self.is_tracking() => {
                    warn!(operation = %op, "discarding pending operation that was never awaited");
                }
                Flow::Normal(_) => {}
                // top-level `return` is rejected by the parser
                Flow::Return(value) => return Ok(value),
            }
        }
        Ok(completion)
    }

    /// True for values whose contents the dry run cannot know.
    fn unknown(&self, value: &Value) -> bool {
        match value {
            Value::Opaque => true,
            Value::Pending(_) => self.is_tracking(),
            _ => false,
        }
    }

    /// True for spans outside the program being run.
    fn is_foreign(&self, span: Span) -> bool {
        self.source.is_some_and(|source| source != span.source)
    }

    /// Bind function declarations before the statements that use them run.
    fn hoist(&mut self, body: &[Stmt]) {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    self.scope.declare(name.clone(), Value::Function(Arc::clone(def)));
                }
            }
        }
    }

    fn exec_block<'a>(&'a mut self, body: &'a [Stmt]) -> BoxFuture<'a, EvalResult<Flow>> {
        async move {
            self.hoist(body);
            for stmt in body {
                match self.exec(stmt).await? {
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal(Value::Pending(op)) if !self.is_tracking() => {
                        warn!(operation = %op, "discarding pending operation that was never awaited");
                    }
                    Flow::Normal(_) => {}
                }
            }
            Ok(Flow::Normal(Value::Undefined))
        }
        .boxed()
    }

    fn exec<'a>(&'a mut self, stmt: &'a Stmt) -> BoxFuture<'a, EvalResult<Flow>> {
        async move {
            match stmt {
                Stmt::Declare { name, init } => {
                    let value = match init {
                        Some(expr) => self.eval(expr).await?,
                        None => Value::Undefined,
                    };
                    self.scope.declare(name.clone(), value);
                    Ok(Flow::Normal(Value::Undefined))
                }
                Stmt::Function(_) => Ok(Flow::Normal(Value::Undefined)),
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let cond = self.eval(cond).await?;
                    if self.unknown(&cond) {
                        // Either branch may run for real, so both are explored.
                        let a = self.explore(then).await;
                        let b = match otherwise {
                            Some(stmt) => self.explore(stmt).await,
                            None => Flow::Normal(Value::Undefined),
                        };
                        return Ok(match (a, b) {
                            (Flow::Normal(_), Flow::Normal(_)) => Flow::Normal(Value::Opaque),
                            _ => Flow::Return(Value::Opaque),
                        });
                    }
                    if cond.truthy() {
                        self.exec(then).await
                    } else if let Some(stmt) = otherwise {
                        self.exec(stmt).await
                    } else {
                        Ok(Flow::Normal(Value::Undefined))
                    }
                }
                Stmt::Return(value) => {
                    let value = match value {
                        Some(expr) => self.eval(expr).await?,
                        None => Value::Undefined,
                    };
                    Ok(Flow::Return(value))
                }
                Stmt::Block(body) => self.exec_block(body).await,
                Stmt::Expr(expr) => Ok(Flow::Normal(self.eval(expr).await?)),
            }
        }
        .boxed()
    }

    fn eval<'a>(&'a mut self, expr: &'a Expr) -> BoxFuture<'a, EvalResult<Value>> {
        async move {
            match &expr.kind {
                ExprKind::Number(n) => Ok(Value::Number(*n)),
                ExprKind::Str(s) => Ok(Value::String(s.clone())),
                ExprKind::Bool(b) => Ok(Value::Bool(*b)),
                ExprKind::Null => Ok(Value::Null),
                ExprKind::Undefined => Ok(Value::Undefined),
                ExprKind::Ident(name) => self
                    .scope
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::Reference(name.clone())),
                ExprKind::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    Ok(Value::Array(values))
                }
                ExprKind::Object(props) => {
                    let mut map = Object::new();
                    for (key, value) in props {
                        let value = self.eval(value).await?;
                        map.insert(key.clone(), value);
                    }
                    Ok(Value::Object(map))
                }
                ExprKind::Function(def) => Ok(Value::Function(Arc::clone(def))),
                ExprKind::Member { object, property } => {
                    let object = self.eval(object).await?;
                    self.member_of(object, property)
                }
                ExprKind::Index { object, index } => {
                    let object = self.eval(object).await?;
                    let index = self.eval(index).await?;
                    self.index_of(object, index)
                }
                ExprKind::Call { .. } => self.eval_call(expr, false).await,
                ExprKind::Await(operand) => {
                    let value = match &operand.kind {
                        ExprKind::Call { .. } => self.eval_call(operand, true).await?,
                        _ => self.eval(operand).await?,
                    };
                    self.resolve(value).await
                }
                ExprKind::Unary { op, operand } => {
                    let value = self.eval(operand).await?;
                    if self.unknown(&value) {
                        return Ok(Value::Opaque);
                    }
                    self.ensure_settled(&value)?;
                    Ok(match op {
                        UnaryOp::Not => Value::Bool(!value.truthy()),
                        UnaryOp::Neg => Value::Number(-value.to_number()),
                    })
                }
                ExprKind::Binary { op, left, right } => {
                    let left = self.eval(left).await?;
                    let right = self.eval(right).await?;
                    if self.unknown(&left) || self.unknown(&right) {
                        return Ok(Value::Opaque);
                    }
                    self.ensure_settled(&left)?;
                    self.ensure_settled(&right)?;
                    Ok(binary(*op, &left, &right))
                }
                ExprKind::Logical { op, left, right } => {
                    let left = self.eval(left).await?;
                    if self.unknown(&left) {
                        self.explore_expr(right).await;
                        return Ok(Value::Opaque);
                    }
                    let short_circuit = match op {
                        LogicalOp::And => !left.truthy(),
                        LogicalOp::Or => left.truthy(),
                    };
                    if short_circuit {
                        Ok(left)
                    } else {
                        self.eval(right).await
                    }
                }
                ExprKind::Conditional {
                    cond,
                    then,
                    otherwise,
                } => {
                    let cond = self.eval(cond).await?;
                    if self.unknown(&cond) {
                        self.explore_expr(then).await;
                        self.explore_expr(otherwise).await;
                        return Ok(Value::Opaque);
                    }
                    if cond.truthy() {
                        self.eval(then).await
                    } else {
                        self.eval(otherwise).await
                    }
                }
                ExprKind::Assign { target, value } => {
                    let value = self.eval(value).await?;
                    self.assign(target, value.clone()).await?;
                    Ok(value)
                }
            }
        }
        .boxed()
    }

    /// Evaluate a call expression.
    ///
    /// `awaited` is set when the call is the direct operand of `await`; such
    /// calls are already marked and are never recorded.
    fn eval_call<'a>(
        &'a mut self,
        expr: &'a Expr,
        awaited: bool,
    ) -> BoxFuture<'a, EvalResult<Value>> {
        async move {
            let ExprKind::Call { callee, args } = &expr.kind else {
                return self.eval(expr).await;
            };
            let function = self.eval(callee).await?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval(arg).await?);
            }

            let result = match function {
                Value::Builtin(Builtin::Print) => {
                    if !self.is_tracking() {
                        let line = values.iter().map(print_form).collect::<Vec<_>>().join(" ");
                        self.output.push(line);
                    }
                    Value::Undefined
                }
                Value::Builtin(Builtin::Sleep) => {
                    let ms = values.first().map(Value::to_number).unwrap_or(0.0);
                    let ms = if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 };
                    Value::Pending(Box::new(PendingOp::Sleep(Duration::from_millis(ms))))
                }
                Value::Method { target, name } => {
                    Value::Pending(Box::new(PendingOp::Backend(BackendCall {
                        target,
                        method: name,
                        args: values,
                    })))
                }
                Value::Function(def) => self.call_function(def, values).await?,
                ref other if self.unknown(other) => Value::Opaque,
                Value::Pending(op) => {
                    return Err(EvalError::type_error(format!(
                        "{} is a pending operation, not a function; await it first",
                        op
                    )))
                }
                _ => {
                    return Err(EvalError::type_error(format!(
                        "{} is not a function",
                        describe_callee(callee)
                    )))
                }
            };

            if result.is_pending() && !awaited {
                if let Some(collector) = self.collector.as_mut() {
                    collector.record(expr.span);
                } else if self.is_foreign(expr.span) {
                    // Bodies from earlier programs run as if every call in
                    // them had been awaited when they were defined.
                    return self.resolve(result).await;
                }
            }
            Ok(result)
        }
        .boxed()
    }

    /// Run a branch the real pass may not take.
    ///
    /// A failure ends the branch as `Opaque`; locations recorded before it
    /// are kept.
    async fn explore(&mut self, stmt: &Stmt) -> Flow {
        match self.exec(stmt).await {
            Ok(flow) => flow,
            Err(e) => {
                debug!(error = %e, "speculative branch failed");
                Flow::Normal(Value::Opaque)
            }
        }
    }

    async fn explore_expr(&mut self, expr: &Expr) -> Value {
        match self.eval(expr).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "speculative branch failed");
                Value::Opaque
            }
        }
    }

    async fn call_function(
        &mut self,
        def: Arc<FunctionDef>,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            if self.is_tracking() {
                return Ok(Value::Opaque);
            }
            return Err(EvalError::type_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        self.scope.push_frame();
        let mut args = args.into_iter();
        for param in &def.params {
            self.scope
                .declare(param.clone(), args.next().unwrap_or(Value::Undefined));
        }
        let result = match &def.body {
            FunctionBody::Block(body) => self.exec_block(body).await.map(|flow| match flow {
                Flow::Return(value) => value,
                Flow::Normal(_) => Value::Undefined,
            }),
            FunctionBody::Expr(expr) => self.eval(expr).await,
        };
        self.scope.pop_frame();
        self.depth -= 1;
        result
    }

    /// The value of `await value`.
    async fn resolve(&mut self, value: Value) -> EvalResult<Value> {
        let Value::Pending(op) = value else {
            return Ok(value);
        };
        if self.is_tracking() {
            return Ok(Value::Opaque);
        }
        match *op {
            PendingOp::Backend(call) => {
                debug!(operation = %call, "awaiting backend operation");
                Ok(self.backend.call(&call).await?)
            }
            PendingOp::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Value::Undefined)
            }
        }
    }

    fn ensure_settled(&self, value: &Value) -> EvalResult<()> {
        match value {
            Value::Pending(op) => Err(EvalError::type_error(format!(
                "{} is a pending operation; await it first",
                op
            ))),
            _ => Ok(()),
        }
    }

    /// Property read `object.property`.
    pub fn member_of(&self, object: Value, property: &str) -> EvalResult<Value> {
        Ok(match object {
            Value::Opaque => Value::Opaque,
            Value::Pending(_) if self.is_tracking() => Value::Opaque,
            Value::Pending(op) => {
                return Err(EvalError::type_error(format!(
                    "cannot read '{}' of {}, a pending operation; await it first",
                    property, op
                )))
            }
            missing @ (Value::Undefined | Value::Null) => {
                return Err(EvalError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    missing.type_name(),
                    property
                )))
            }
            Value::Object(mut map) => map.swap_remove(property).unwrap_or(Value::Undefined),
            Value::Array(items) if property == "length" => Value::Number(items.len() as f64),
            Value::String(s) if property == "length" => {
                Value::Number(s.chars().count() as f64)
            }
            Value::Database(database) => {
                if DATABASE_METHODS.contains(&property) {
                    Value::Method {
                        target: Target::database(database),
                        name: property.to_string(),
                    }
                } else {
                    Value::Collection {
                        database,
                        name: property.to_string(),
                    }
                }
            }
            Value::Collection { database, name } => Value::Method {
                target: Target::collection(database, name),
                name: property.to_string(),
            },
            // `db.a.b` names the collection "a.b"
            Value::Method { target, name } => {
                let collection = Value::Collection {
                    name: match target.collection {
                        Some(collection) => format!("{}.{}", collection, name),
                        None => name,
                    },
                    database: target.database,
                };
                return self.member_of(collection, property);
            }
            _ => Value::Undefined,
        })
    }

    /// Indexed read `object[index]`.
    fn index_of(&self, object: Value, index: Value) -> EvalResult<Value> {
        if self.unknown(&object) || self.unknown(&index) {
            return Ok(Value::Opaque);
        }
        match (object, index) {
            (Value::Array(mut items), Value::Number(n)) => {
                if n >= 0.0 && n.fract() == 0.0 && (n as usize) < items.len() {
                    Ok(items.swap_remove(n as usize))
                } else {
                    Ok(Value::Undefined)
                }
            }
            (Value::String(s), Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => Ok(s
                .chars()
                .nth(n as usize)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined)),
            (object, index) => self.member_of(object, &key_string(&index)),
        }
    }

    async fn assign(&mut self, target: &Expr, value: Value) -> EvalResult<()> {
        let mut path = Vec::new();
        let mut cursor = target;
        let root = loop {
            match &cursor.kind {
                ExprKind::Ident(name) => break name,
                ExprKind::Member { object, property } => {
                    path.push(PathKey::Field(property.clone()));
                    cursor = object;
                }
                ExprKind::Index { object, index } => {
                    let key = self.eval(index).await?;
                    path.push(PathKey::Index(key));
                    cursor = object;
                }
                _ => return Err(EvalError::type_error("invalid assignment target")),
            }
        };
        path.reverse();

        let tracking = self.is_tracking();
        let Some((last, parents)) = path.split_last() else {
            self.scope.assign(root, value);
            return Ok(());
        };
        let mut slot = self
            .scope
            .get_mut(root)
            .ok_or_else(|| EvalError::Reference(root.clone()))?;
        for key in parents {
            let type_name = slot.type_name();
            slot = match slot {
                Value::Opaque => return Ok(()),
                Value::Pending(_) if tracking => return Ok(()),
                Value::Object(map) => {
                    let name = path_key_string(key);
                    map.get_mut(&name).ok_or_else(|| unset_parent(&name))?
                }
                Value::Array(items) => match array_index(key) {
                    Some(index) if index < items.len() => &mut items[index],
                    _ => return Err(unset_parent(&path_key_string(key))),
                },
                _ => return Err(cannot_set(type_name, key)),
            };
        }

        let type_name = slot.type_name();
        match slot {
            Value::Opaque => Ok(()),
            Value::Pending(_) if tracking => Ok(()),
            Value::Object(map) => {
                map.insert(path_key_string(last), value);
                Ok(())
            }
            Value::Array(items) => {
                let Some(index) = array_index(last) else {
                    return Err(cannot_set(type_name, last));
                };
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
            _ if tracking && value == Value::Opaque => Ok(()),
            _ => Err(cannot_set(type_name, last)),
        }
    }
}

impl SourceLookup for Interpreter {
    fn source_of(&self, path: &str) -> Option<String> {
        let mut segments = path.split('.');
        let mut value = self.scope.get(segments.next()?)?.clone();
        for segment in segments {
            value = self.member_of(value, segment).ok()?;
        }
        match value {
            Value::Undefined => None,
            other => other.to_source(),
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use BinaryOp::*;
    match op {
        Add => {
            let concat = |v: &Value| {
                matches!(
                    v,
                    Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
                )
            };
            if concat(left) || concat(right) {
                Value::String(left.to_display_string() + &right.to_display_string())
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        Sub => Value::Number(left.to_number() - right.to_number()),
        Mul => Value::Number(left.to_number() * right.to_number()),
        Div => Value::Number(left.to_number() / right.to_number()),
        Rem => Value::Number(left.to_number() % right.to_number()),
        Eq => Value::Bool(left == right),
        Ne => Value::Bool(left != right),
        Lt | Le | Gt | Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match ordering {
                None => false,
                Some(o) => match op {
                    Lt => o.is_lt(),
                    Le => o.is_le(),
                    Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            })
        }
    }
}

fn key_string(index: &Value) -> String {
    match index {
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    }
}

fn path_key_string(key: &PathKey) -> String {
    match key {
        PathKey::Field(name) => name.clone(),
        PathKey::Index(value) => key_string(value),
    }
}

/// The array position named by `key`, if it is a non-negative integer.
fn array_index(key: &PathKey) -> Option<usize> {
    match key {
        PathKey::Index(Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        _ => None,
    }
}

fn cannot_set(type_name: &str, key: &PathKey) -> EvalError {
    EvalError::type_error(format!(
        "Cannot set properties of {} (setting '{}')",
        type_name,
        path_key_string(key)
    ))
}

fn unset_parent(name: &str) -> EvalError {
    EvalError::type_error(format!(
        "Cannot set properties of undefined (setting '{}')",
        name
    ))
}

/// How `print` shows a value: strings raw, everything else inspected.
fn print_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => crate::shell::format::inspect(other),
    }
}

fn describe_callee(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Member { object, property } => {
            format!("{}.{}", describe_callee(object), property)
        }
        ExprKind::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::script::parse;

    fn interpreter() -> Interpreter {
        let mut interp = Interpreter::new(Arc::new(MemoryBackend::new()));
        interp
            .scope_mut()
            .set_global("db", Value::Database("test".into()));
        interp
    }

    async fn eval(interp: &mut Interpreter, code: &str) -> EvalResult<Value> {
        let program = parse(code)?;
        interp.run(&program).await
    }

    async fn dry_run(interp: &Interpreter, code: &str) -> Vec<(usize, usize)> {
        let program = parse(code).unwrap();
        let mut sandbox = interp.sandbox(SuspensionCollector::new(program.source));
        sandbox.run(&program).await.unwrap();
        sandbox
            .into_collector()
            .unwrap()
            .into_locations()
            .into_iter()
            .map(|l| (l.start, l.end))
            .collect()
    }

    #[tokio::test]
    async fn test_arithmetic_and_strings() {
        let mut interp = interpreter();
        assert_eq!(eval(&mut interp, "1 + 2 * 3").await.unwrap(), Value::Number(7.0));
        assert_eq!(
            eval(&mut interp, "'a' + 1").await.unwrap(),
            Value::from("a1")
        );
        assert_eq!(
            eval(&mut interp, "2 < 3 && 'x' || 'y'").await.unwrap(),
            Value::from("x")
        );
    }

    #[tokio::test]
    async fn test_variables_persist_between_runs() {
        let mut interp = interpreter();
        eval(&mut interp, "var x = { a: [1, 2] }").await.unwrap();
        eval(&mut interp, "x.a[2] = 3; x.b = 'new'").await.unwrap();
        assert_eq!(
            eval(&mut interp, "x.a.length").await.unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(eval(&mut interp, "x.b").await.unwrap(), Value::from("new"));
    }

    #[tokio::test]
    async fn test_functions_and_recursion() {
        let mut interp = interpreter();
        eval(
            &mut interp,
            "function fact(n) { if (n <= 1) return 1; return n * fact(n - 1) }",
        )
        .await
        .unwrap();
        assert_eq!(
            eval(&mut interp, "fact(5)").await.unwrap(),
            Value::Number(120.0)
        );
        assert_eq!(
            eval(&mut interp, "(x => x + 1)(1)").await.unwrap(),
            Value::Number(2.0)
        );
    }

    #[tokio::test]
    async fn test_hoisting() {
        let mut interp = interpreter();
        assert_eq!(
            eval(&mut interp, "twice(2); function twice(n) { return n * 2 }")
                .await
                .unwrap(),
            Value::Undefined
        );
        assert_eq!(
            eval(&mut interp, "twice(4)").await.unwrap(),
            Value::Number(8.0)
        );
    }

    #[tokio::test]
    async fn test_reference_error() {
        let mut interp = interpreter();
        let err = eval(&mut interp, "missing + 1").await.unwrap_err();
        assert_eq!(err, EvalError::Reference("missing".into()));
    }

    #[tokio::test]
    async fn test_call_depth_limit() {
        let mut interp = interpreter();
        eval(&mut interp, "function f() { return f() }").await.unwrap();
        let err = eval(&mut interp, "f()").await.unwrap_err();
        assert!(err.to_string().contains("Maximum call stack"));
    }

    #[tokio::test]
    async fn test_backend_call_is_pending_until_awaited() {
        let mut interp = interpreter();
        let pending = eval(&mut interp, "db.users.insertOne({ a: 1 })").await.unwrap();
        assert!(pending.is_pending());
        assert_eq!(
            eval(&mut interp, "await db.users.countDocuments()").await.unwrap(),
            Value::Number(0.0)
        );
        eval(&mut interp, "await db.users.insertOne({ a: 1 })")
            .await
            .unwrap();
        assert_eq!(
            eval(&mut interp, "await db.users.countDocuments()").await.unwrap(),
            Value::Number(1.0)
        );
    }

    #[tokio::test]
    async fn test_member_of_pending_is_an_error() {
        let mut interp = interpreter();
        let err = eval(&mut interp, "db.users.find().length").await.unwrap_err();
        assert!(err.to_string().contains("await"));
    }

    #[tokio::test]
    async fn test_print_buffers_output() {
        let mut interp = interpreter();
        eval(&mut interp, "print('a', 1, { b: true })").await.unwrap();
        assert_eq!(interp.take_output(), vec!["a 1 { b: true }".to_string()]);
        assert!(interp.take_output().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_records_unawaited_calls() {
        let interp = interpreter();
        assert_eq!(dry_run(&interp, "db.users.find()").await, vec![(0, 15)]);
        assert_eq!(dry_run(&interp, "await db.users.find()").await, vec![]);
        assert_eq!(dry_run(&interp, "1 + 2").await, vec![]);
    }

    #[tokio::test]
    async fn test_dry_run_records_nested_calls_in_order() {
        let interp = interpreter();
        let code = "db.a.insertOne({ n: db.b.countDocuments() })";
        assert_eq!(dry_run(&interp, code).await, vec![(20, 41), (0, 44)]);
    }

    #[tokio::test]
    async fn test_dry_run_explores_unknown_branches() {
        let interp = interpreter();
        let code = "if (db.a.findOne()) { db.b.find() } else { sleep(1) }";
        let recorded = dry_run(&interp, code).await;
        assert_eq!(recorded.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_is_observation_only() {
        let mut interp = interpreter();
        eval(&mut interp, "var counter = { n: 0 }").await.unwrap();
        let code = "counter.n = counter.n + 1; print('hi'); db.users.insertOne({})";
        dry_run(&interp, code).await;
        assert_eq!(
            eval(&mut interp, "counter.n").await.unwrap(),
            Value::Number(0.0)
        );
        assert!(interp.take_output().is_empty());
        assert_eq!(
            eval(&mut interp, "await db.users.countDocuments()").await.unwrap(),
            Value::Number(0.0)
        );
    }

    #[tokio::test]
    async fn test_dry_run_ignores_bodies_from_other_lines() {
        let mut interp = interpreter();
        eval(&mut interp, "function load() { return db.users.find() }")
            .await
            .unwrap();
        // only the call written on this line is recorded
        assert_eq!(dry_run(&interp, "load()").await, vec![(0, 6)]);
    }

    #[tokio::test]
    async fn test_assign_through_nested_array() {
        let mut interp = interpreter();
        eval(&mut interp, "var a = [{ x: 0 }, [1, 2]]").await.unwrap();
        eval(&mut interp, "a[0].x = 1; a[1][0] = 'one'").await.unwrap();
        assert_eq!(eval(&mut interp, "a[0].x").await.unwrap(), Value::Number(1.0));
        assert_eq!(eval(&mut interp, "a[1][0]").await.unwrap(), Value::from("one"));

        let err = eval(&mut interp, "a[5].x = 1").await.unwrap_err();
        assert!(err.to_string().contains("Cannot set properties of undefined"));
        let err = eval(&mut interp, "a[0].x.y = 1").await.unwrap_err();
        assert!(err.to_string().contains("(setting 'y')"));
    }

    #[tokio::test]
    async fn test_calls_in_earlier_bodies_are_performed() {
        let mut interp = interpreter();
        eval(
            &mut interp,
            "function add() { db.users.insertOne({ a: 1 }); return 1 }",
        )
        .await
        .unwrap();
        assert_eq!(eval(&mut interp, "add()").await.unwrap(), Value::Number(1.0));
        assert_eq!(
            eval(&mut interp, "await db.users.countDocuments()").await.unwrap(),
            Value::Number(1.0)
        );
    }

    #[tokio::test]
    async fn test_same_line_bodies_stay_pending() {
        let mut interp = interpreter();
        let value = eval(&mut interp, "(() => db.users.countDocuments())()")
            .await
            .unwrap();
        assert!(value.is_pending());
    }

    #[tokio::test]
    async fn test_dry_run_tolerates_failing_unknown_branches() {
        let interp = interpreter();
        let code = "var d = db.users.findOne(); if (d) { print(d.name) } else { missingHelper() }";
        assert_eq!(dry_run(&interp, code).await, vec![(8, 26)]);

        let code = "db.a.findOne() ? nope() : db.b.find()";
        assert_eq!(dry_run(&interp, code).await.len(), 2);
        let code = "db.a.findOne() && nope.x";
        assert_eq!(dry_run(&interp, code).await, vec![(0, 14)]);
    }

    #[tokio::test]
    async fn test_known_branch_errors_still_fail_dry_run() {
        let interp = interpreter();
        let program = parse("if (true) { missingHelper() }").unwrap();
        let mut sandbox = interp.sandbox(SuspensionCollector::new(program.source));
        let err = sandbox.run(&program).await.unwrap_err();
        assert_eq!(err, EvalError::Reference("missingHelper".into()));
    }

    #[tokio::test]
    async fn test_source_lookup() {
        let mut interp = interpreter();
        eval(&mut interp, "var f = function (a) { return a }; var o = { k: 'v' }")
            .await
            .unwrap();
        assert_eq!(
            interp.source_of("f").as_deref(),
            Some("function (a) { return a }")
        );
        assert_eq!(interp.source_of("o.k").as_deref(), Some("'v'"));
        assert_eq!(
            interp.source_of("db.test.find").as_deref(),
            Some("db.test.find")
        );
        assert_eq!(interp.source_of("nothing"), None);
    }
}

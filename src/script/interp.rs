//! Step-metered tree-walking interpreter
//!
//! Every statement, loop iteration, comprehension element, call and generated
//! range element consumes one step. Exhausting the budget raises
//! `ScriptError::StepLimit`, so a submitted infinite loop cannot hang the
//! engine. The sandbox has no host access: the only way out is captured
//! `print` output.

use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{BinOp, CmpOp, Expr, FunctionDef, Stmt, StmtKind, Target, UnaryOp};
use super::value::{Builtin, Value};
use crate::error::{ScriptError, ScriptResult};

/// Resource ceilings for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub max_output_lines: usize,
    /// Longest string or list (in bytes or elements) a value may grow to
    pub max_value_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_call_depth: 64,
            max_output_lines: 200,
            max_value_len: 1_000_000,
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Variable scope for the code being run. Module-level code has no locals and
/// writes straight to the globals.
struct Frame {
    locals: Option<HashMap<String, Value>>,
}

impl Frame {
    fn module() -> Self {
        Self { locals: None }
    }

    fn function(locals: HashMap<String, Value>) -> Self {
        Self {
            locals: Some(locals),
        }
    }

    fn is_module(&self) -> bool {
        self.locals.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Interpreter {
    globals: HashMap<String, Value>,
    /// User functions in the order they were first defined
    declared: Vec<Rc<FunctionDef>>,
    limits: Limits,
    steps: u64,
    depth: usize,
    output: Vec<String>,
    /// Line of the innermost statement that raised the current fault
    fault_line: Option<usize>,
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        let globals = Builtin::ALL
            .iter()
            .map(|b| (b.name().to_string(), Value::Builtin(*b)))
            .collect();
        Self {
            globals,
            declared: Vec::new(),
            limits,
            steps: 0,
            depth: 0,
            output: Vec::new(),
            fault_line: None,
        }
    }

    /// Run module-level code: function definitions and any top-level statements
    pub fn load(&mut self, module: &[Stmt]) -> ScriptResult<()> {
        self.reset_budget();
        let mut frame = Frame::module();
        let flow = self.exec_block(module, &mut frame);
        match self.annotate(flow)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(ScriptError::runtime(
                "SyntaxError: 'return' outside function",
            )),
            Flow::Break | Flow::Continue => {
                Err(ScriptError::runtime("SyntaxError: 'break' outside loop"))
            }
        }
    }

    /// User-defined function bound to `name` at module level
    pub fn function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        match self.globals.get(name) {
            Some(Value::Function(def)) => Some(Rc::clone(def)),
            _ => None,
        }
    }

    /// Module-level functions in definition order
    pub fn declared(&self) -> &[Rc<FunctionDef>] {
        &self.declared
    }

    /// Call a function with a fresh step budget and empty output
    pub fn invoke(&mut self, def: &Rc<FunctionDef>, args: Vec<Value>) -> ScriptResult<Value> {
        self.reset_budget();
        let result = self.call_function(def, args);
        self.annotate(result)
    }

    /// Lines printed during the last `load` or `invoke`
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }


    fn reset_budget(&mut self) {
        self.steps = 0;
        self.depth = 0;
        self.output.clear();
        self.fault_line = None;
    }

    /// Attach the faulting line to runtime errors
    fn annotate<T>(&mut self, result: ScriptResult<T>) -> ScriptResult<T> {
        let line = self.fault_line.take();
        result.map_err(|err| match (err, line) {
            (ScriptError::Runtime(message), Some(line)) => {
                ScriptError::Runtime(format!("{message} (line {line})"))
            }
            (err, _) => err,
        })
    }

    fn step(&mut self) -> ScriptResult<()> {
        self.charge(1)
    }

    fn charge(&mut self, steps: u64) -> ScriptResult<()> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepLimit {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    /// Refuse to build a string or list longer than the size limit
    fn check_size(&self, len: usize) -> ScriptResult<()> {
        if len > self.limits.max_value_len {
            return Err(ScriptError::SizeLimit {
                limit: self.limits.max_value_len,
            });
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> ScriptResult<Flow> {
        for stmt in stmts {
            match self.exec(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> ScriptResult<Flow> {
        let result = self.exec_kind(&stmt.kind, frame);
        if result.is_err() && self.fault_line.is_none() {
            self.fault_line = Some(stmt.line);
        }
        result
    }

    fn exec_kind(&mut self, kind: &StmtKind, frame: &mut Frame) -> ScriptResult<Flow> {
        self.step()?;
        match kind {
            StmtKind::Def(def) => {
                if frame.is_module() && !self.declared.iter().any(|d| d.name == def.name) {
                    self.declared.push(Rc::clone(def));
                }
                self.set_var(frame, &def.name, Value::Function(Rc::clone(def)));
                Ok(Flow::Normal)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Pass => Ok(Flow::Normal),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond, frame)?.truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                self.exec_block(otherwise, frame)
            }
            StmtKind::While { cond, body } => {
                loop {
                    self.step()?;
                    if !self.eval(cond, frame)?.truthy() {
                        break;
                    }
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval(iter, frame)?;
                for item in iterate(iterable)? {
                    self.step()?;
                    self.set_var(frame, var, item);
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                match target {
                    Target::Name(name) => self.set_var(frame, name, value),
                    Target::Index { name, index } => {
                        let index = self.eval(index, frame)?;
                        self.assign_index(frame, name, &index, value)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::AugAssign { target, op, value } => {
                match target {
                    Target::Name(name) => {
                        let current = self.lookup(frame, name)?;
                        let rhs = self.eval(value, frame)?;
                        let updated = self.binary(*op, current, rhs)?;
                        self.set_var(frame, name, updated);
                    }
                    Target::Index { name, index } => {
                        let index = self.eval(index, frame)?;
                        let container = self.lookup(frame, name)?;
                        let current = index_value(&container, &index)?;
                        let rhs = self.eval(value, frame)?;
                        let updated = self.binary(*op, current, rhs)?;
                        self.assign_index(frame, name, &index, updated)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, frame)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn lookup(&self, frame: &Frame, name: &str) -> ScriptResult<Value> {
        frame
            .locals
            .as_ref()
            .and_then(|locals| locals.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| ScriptError::runtime(format!("NameError: name '{name}' is not defined")))
    }

    fn set_var(&mut self, frame: &mut Frame, name: &str, value: Value) {
        match frame.locals.as_mut() {
            Some(locals) => locals.insert(name.to_string(), value),
            None => self.globals.insert(name.to_string(), value),
        };
    }

    /// Current binding in the innermost scope only (for comprehension restore)
    fn scoped_binding(&self, frame: &Frame, name: &str) -> Option<Value> {
        match frame.locals.as_ref() {
            Some(locals) => locals.get(name).cloned(),
            None => self.globals.get(name).cloned(),
        }
    }

    fn unset_var(&mut self, frame: &mut Frame, name: &str) {
        match frame.locals.as_mut() {
            Some(locals) => locals.remove(name),
            None => self.globals.remove(name),
        };
    }

    fn assign_index(
        &mut self,
        frame: &mut Frame,
        name: &str,
        index: &Value,
        value: Value,
    ) -> ScriptResult<()> {
        let target = var_mut(&mut self.globals, frame, name)
            .ok_or_else(|| ScriptError::runtime(format!("NameError: name '{name}' is not defined")))?;
        match target {
            Value::List(items) => {
                let i = list_index(items.len(), index, "list assignment index out of range")?;
                items[i] = value;
                Ok(())
            }
            other => Err(ScriptError::runtime(format!(
                "TypeError: '{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> ScriptResult<Value> {
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Name(name) => self.lookup(frame, name),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, frame)?);
                }
                Ok(Value::List(values))
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, frame)?;
                let index = self.eval(index, frame)?;
                index_value(&target, &index)
            }
            Expr::Slice { target, start, end } => {
                let target = self.eval(target, frame)?;
                let start = match start {
                    Some(e) => Some(self.eval(e, frame)?),
                    None => None,
                };
                let end = match end {
                    Some(e) => Some(self.eval(e, frame)?),
                    None => None,
                };
                slice_value(&target, start.as_ref(), end.as_ref())
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func, frame)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                self.call_value(callee, values)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                self.call_method(receiver, name, values, frame)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                unary(*op, value)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                self.binary(*op, left, right)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first, frame)?;
                for (op, expr) in rest {
                    let right = self.eval(expr, frame)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left, frame)?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval(right, frame)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, frame)?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval(right, frame)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, frame)?.truthy() {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            Expr::Comprehension {
                element,
                var,
                iter,
                cond,
            } => {
                let iterable = self.eval(iter, frame)?;
                let saved = self.scoped_binding(frame, var);
                let result = self.comprehension(element, var, iterate(iterable)?, cond, frame);
                match saved {
                    Some(value) => self.set_var(frame, var, value),
                    None => self.unset_var(frame, var),
                }
                result
            }
        }
    }

    fn comprehension(
        &mut self,
        element: &Expr,
        var: &str,
        items: Vec<Value>,
        cond: &Option<Box<Expr>>,
        frame: &mut Frame,
    ) -> ScriptResult<Value> {
        let mut out = Vec::new();
        for item in items {
            self.step()?;
            self.set_var(frame, var, item);
            if let Some(cond) = cond
                && !self.eval(cond, frame)?.truthy()
            {
                continue;
            }
            out.push(self.eval(element, frame)?);
        }
        Ok(Value::List(out))
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> ScriptResult<Value> {
        match callee {
            Value::Function(def) => self.call_function(&def, args),
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            other => Err(ScriptError::runtime(format!(
                "TypeError: '{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, def: &Rc<FunctionDef>, args: Vec<Value>) -> ScriptResult<Value> {
        if args.len() != def.params.len() {
            return Err(ScriptError::runtime(format!(
                "TypeError: {}() takes {} positional argument{} but {} {} given",
                def.name,
                def.params.len(),
                if def.params.len() == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" },
            )));
        }
        if self.depth >= self.limits.max_call_depth {
            return Err(ScriptError::RecursionLimit {
                depth: self.limits.max_call_depth,
            });
        }
        self.step()?;

        let locals = def.params.iter().cloned().zip(args).collect();
        let mut frame = Frame::function(locals);
        self.depth += 1;
        let flow = self.exec_block(&def.body, &mut frame);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
            Flow::Break | Flow::Continue => Err(ScriptError::runtime(
                "SyntaxError: 'break' outside loop",
            )),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> ScriptResult<Value> {
        match builtin {
            Builtin::Print => {
                let line: Vec<String> = args.iter().map(Value::display).collect();
                let line = line.join(" ");
                log::debug!("sandbox print: {line}");
                if self.output.len() < self.limits.max_output_lines {
                    self.output.push(line);
                }
                Ok(Value::None)
            }
            Builtin::Len => {
                let [value] = exact_args::<1>(builtin, args)?;
                match &value {
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    other => Err(ScriptError::runtime(format!(
                        "TypeError: object of type '{}' has no len()",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Sum => {
                if args.is_empty() || args.len() > 2 {
                    return Err(arity_error(builtin, "1 or 2", args.len()));
                }
                let mut args = args.into_iter();
                let iterable = args.next().unwrap_or(Value::None);
                let mut total = args.next().unwrap_or(Value::Int(0));
                for item in iterate(iterable)? {
                    self.step()?;
                    if matches!(item, Value::Str(_)) {
                        return Err(ScriptError::runtime(
                            "TypeError: unsupported operand type(s) for +: 'int' and 'str'",
                        ));
                    }
                    total = self.binary(BinOp::Add, total, item)?;
                }
                Ok(total)
            }
            Builtin::Range => self.range(args),
            Builtin::Min | Builtin::Max => {
                let items = match args.len() {
                    0 => return Err(arity_error(builtin, "at least 1", 0)),
                    1 => iterate(args.into_iter().next().unwrap_or(Value::None))?,
                    _ => args,
                };
                let mut items = items.into_iter();
                let mut best = items.next().ok_or_else(|| {
                    ScriptError::runtime(format!(
                        "ValueError: {}() arg is an empty sequence",
                        builtin.name()
                    ))
                })?;
                for item in items {
                    self.step()?;
                    let ordering = item.py_cmp(&best).ok_or_else(|| {
                        ScriptError::runtime(format!(
                            "TypeError: '<' not supported between instances of '{}' and '{}'",
                            item.type_name(),
                            best.type_name()
                        ))
                    })?;
                    let better = match builtin {
                        Builtin::Min => ordering.is_lt(),
                        _ => ordering.is_gt(),
                    };
                    if better {
                        best = item;
                    }
                }
                Ok(best)
            }
            Builtin::Abs => {
                let [value] = exact_args::<1>(builtin, args)?;
                match value {
                    Value::Int(i) => i
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(overflow_error),
                    Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(ScriptError::runtime(format!(
                        "TypeError: bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    fn range(&mut self, args: Vec<Value>) -> ScriptResult<Value> {
        let mut ints = Vec::with_capacity(args.len());
        for arg in &args {
            ints.push(arg.as_int().ok_or_else(|| {
                ScriptError::runtime(format!(
                    "TypeError: '{}' object cannot be interpreted as an integer",
                    arg.type_name()
                ))
            })?);
        }
        let (start, stop, step) = match ints[..] {
            [stop] => (0, stop, 1),
            [start, stop] => (start, stop, 1),
            [start, stop, step] => (start, stop, step),
            _ => return Err(arity_error(Builtin::Range, "1 to 3", args.len())),
        };
        if step == 0 {
            return Err(ScriptError::runtime(
                "ValueError: range() arg 3 must not be zero",
            ));
        }

        let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
        let count = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        // Generated elements are paid for up front
        self.charge(u64::try_from(count).unwrap_or(u64::MAX))?;

        let mut items = Vec::with_capacity(count as usize);
        let mut current = start;
        for _ in 0..count {
            items.push(Value::Int(current as i64));
            current += step;
        }
        Ok(Value::List(items))
    }

    fn call_method(
        &mut self,
        receiver: &Expr,
        name: &str,
        args: Vec<Value>,
        frame: &mut Frame,
    ) -> ScriptResult<Value> {
        if matches!(name, "append" | "pop" | "extend") {
            let Expr::Name(var) = receiver else {
                return Err(ScriptError::runtime(format!(
                    "AttributeError: '{name}' is only supported on a named list"
                )));
            };
            let extension = match name {
                "extend" => {
                    let [iterable] = exact_method_args::<1>(name, args.clone())?;
                    let items = iterate(iterable)?;
                    self.charge(items.len() as u64)?;
                    Some(items)
                }
                _ => None,
            };
            let max_len = self.limits.max_value_len;
            let target = var_mut(&mut self.globals, frame, var).ok_or_else(|| {
                ScriptError::runtime(format!("NameError: name '{var}' is not defined"))
            })?;
            let Value::List(items) = target else {
                return Err(ScriptError::runtime(format!(
                    "AttributeError: '{}' object has no attribute '{name}'",
                    target.type_name()
                )));
            };
            return match name {
                "append" => {
                    let [value] = exact_method_args::<1>(name, args)?;
                    items.push(value);
                    Ok(Value::None)
                }
                "extend" => {
                    let extension = extension.unwrap_or_default();
                    if items.len().saturating_add(extension.len()) > max_len {
                        return Err(ScriptError::SizeLimit { limit: max_len });
                    }
                    items.extend(extension);
                    Ok(Value::None)
                }
                _ => {
                    if items.is_empty() {
                        return Err(ScriptError::runtime("IndexError: pop from empty list"));
                    }
                    let index = match args.as_slice() {
                        [] => items.len() - 1,
                        [index] => list_index(items.len(), index, "pop index out of range")?,
                        _ => return Err(ScriptError::runtime(
                            "TypeError: pop expected at most 1 argument",
                        )),
                    };
                    Ok(items.remove(index))
                }
            };
        }

        let value = self.eval(receiver, frame)?;
        match (&value, name) {
            (Value::Str(s), "upper") => Ok(Value::Str(s.to_uppercase())),
            (Value::Str(s), "lower") => Ok(Value::Str(s.to_lowercase())),
            (Value::Str(s), "strip") => Ok(Value::Str(s.trim().to_string())),
            (Value::List(items), "count") => {
                let [needle] = exact_method_args::<1>(name, args)?;
                Ok(Value::Int(
                    items.iter().filter(|item| item.py_eq(&needle)).count() as i64,
                ))
            }
            _ => Err(ScriptError::runtime(format!(
                "AttributeError: '{}' object has no attribute '{name}'",
                value.type_name()
            ))),
        }
    }

    fn binary(&mut self, op: BinOp, left: Value, right: Value) -> ScriptResult<Value> {
        match (op, &left, &right) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => {
                self.check_size(a.len().saturating_add(b.len()))?;
                self.charge(b.len() as u64)?;
                Ok(Value::Str(format!("{a}{b}")))
            }
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                self.check_size(a.len().saturating_add(b.len()))?;
                self.charge(b.len() as u64)?;
                let mut joined = a.clone();
                joined.extend(b.iter().cloned());
                Ok(Value::List(joined))
            }
            (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
                let count = usize::try_from(*n).unwrap_or(0);
                let len = s.len().saturating_mul(count);
                self.check_size(len)?;
                self.charge(len as u64)?;
                Ok(Value::Str(s.repeat(count)))
            }
            (BinOp::Mul, Value::List(items), Value::Int(n))
            | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
                let count = usize::try_from(*n).unwrap_or(0);
                let len = items.len().saturating_mul(count);
                self.check_size(len)?;
                self.charge(len as u64)?;
                let mut out = Vec::with_capacity(items.len() * count);
                for _ in 0..count {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::List(out))
            }
            _ => numeric(op, &left, &right),
        }
    }
}

/// Mutable access to a variable in the innermost scope that has it
fn var_mut<'a>(
    globals: &'a mut HashMap<String, Value>,
    frame: &'a mut Frame,
    name: &str,
) -> Option<&'a mut Value> {
    if let Some(locals) = frame.locals.as_mut()
        && locals.contains_key(name)
    {
        return locals.get_mut(name);
    }
    globals.get_mut(name)
}

fn iterate(value: Value) -> ScriptResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(ScriptError::runtime(format!(
            "TypeError: '{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn exact_args<const N: usize>(builtin: Builtin, args: Vec<Value>) -> ScriptResult<[Value; N]> {
    let given = args.len();
    args.try_into()
        .map_err(|_| arity_error(builtin, &N.to_string(), given))
}

fn exact_method_args<const N: usize>(name: &str, args: Vec<Value>) -> ScriptResult<[Value; N]> {
    let given = args.len();
    args.try_into().map_err(|_| {
        ScriptError::runtime(format!(
            "TypeError: {name}() takes exactly {N} argument(s) ({given} given)"
        ))
    })
}

fn arity_error(builtin: Builtin, expected: &str, given: usize) -> ScriptError {
    ScriptError::runtime(format!(
        "TypeError: {}() expected {expected} argument(s), got {given}",
        builtin.name()
    ))
}

fn overflow_error() -> ScriptError {
    ScriptError::runtime("OverflowError: integer result does not fit in 64 bits")
}

/// Resolve a possibly negative index against a length
fn list_index(len: usize, index: &Value, out_of_range: &str) -> ScriptResult<usize> {
    let i = index.as_int().ok_or_else(|| {
        ScriptError::runtime(format!(
            "TypeError: indices must be integers, not {}",
            index.type_name()
        ))
    })?;
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return Err(ScriptError::runtime(format!("IndexError: {out_of_range}")));
    }
    Ok(resolved as usize)
}

fn index_value(target: &Value, index: &Value) -> ScriptResult<Value> {
    match target {
        Value::List(items) => {
            let i = list_index(items.len(), index, "list index out of range")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = list_index(chars.len(), index, "string index out of range")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        other => Err(ScriptError::runtime(format!(
            "TypeError: '{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_value(target: &Value, start: Option<&Value>, end: Option<&Value>) -> ScriptResult<Value> {
    let bound = |value: Option<&Value>, len: i64, default: i64| -> ScriptResult<i64> {
        let Some(value) = value else {
            return Ok(default);
        };
        if matches!(value, Value::None) {
            return Ok(default);
        }
        let i = value.as_int().ok_or_else(|| {
            ScriptError::runtime("TypeError: slice indices must be integers or None")
        })?;
        Ok(if i < 0 { (i + len).max(0) } else { i.min(len) })
    };

    match target {
        Value::List(items) => {
            let len = items.len() as i64;
            let (s, e) = (bound(start, len, 0)?, bound(end, len, len)?);
            if s >= e {
                return Ok(Value::List(Vec::new()));
            }
            Ok(Value::List(items[s as usize..e as usize].to_vec()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len() as i64;
            let (s, e) = (bound(start, len, 0)?, bound(end, len, len)?);
            if s >= e {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(chars[s as usize..e as usize].iter().collect()))
        }
        other => Err(ScriptError::runtime(format!(
            "TypeError: '{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, value: Value) -> ScriptResult<Value> {
    match (op, &value) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Float(_)) => Ok(value),
        (UnaryOp::Neg, _) if value.as_int().is_some() => value
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(overflow_error),
        (UnaryOp::Pos, _) if value.as_int().is_some() => Ok(Value::Int(value.as_int().unwrap_or(0))),
        _ => Err(ScriptError::runtime(format!(
            "TypeError: bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

fn numeric(op: BinOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    let unsupported = || {
        ScriptError::runtime(format!(
            "TypeError: unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_op(op, a, b);
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => float_op(op, a, b),
        _ => Err(unsupported()),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> ScriptResult<Value> {
    let zero = || ScriptError::runtime("ZeroDivisionError: integer division or modulo by zero");
    let value = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow_error)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow_error)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow_error)?,
        BinOp::Div => {
            if b == 0 {
                return Err(ScriptError::runtime("ZeroDivisionError: division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(zero());
            }
            let q = a.checked_div(b).ok_or_else(overflow_error)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(zero());
            }
            let r = a.checked_rem(b).ok_or_else(overflow_error)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(ScriptError::runtime(
                        "ZeroDivisionError: 0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow_error())?;
            a.checked_pow(exp).ok_or_else(overflow_error)?
        }
    };
    Ok(Value::Int(value))
}

fn float_op(op: BinOp, a: f64, b: f64) -> ScriptResult<Value> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => {
            return Err(ScriptError::runtime("ZeroDivisionError: float division by zero"));
        }
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> ScriptResult<bool> {
    let ordering = || {
        left.py_cmp(right).ok_or_else(|| {
            ScriptError::runtime(format!(
                "TypeError: comparison not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))
        })
    };
    match op {
        CmpOp::Eq => Ok(left.py_eq(right)),
        CmpOp::NotEq => Ok(!left.py_eq(right)),
        CmpOp::Lt => Ok(ordering()?.is_lt()),
        CmpOp::Le => Ok(ordering()?.is_le()),
        CmpOp::Gt => Ok(ordering()?.is_gt()),
        CmpOp::Ge => Ok(ordering()?.is_ge()),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
    }
}

fn contains(container: &Value, needle: &Value) -> ScriptResult<bool> {
    match (container, needle) {
        (Value::List(items), _) => Ok(items.iter().any(|item| item.py_eq(needle))),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(ScriptError::runtime(format!(
            "TypeError: 'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (other, _) => Err(ScriptError::runtime(format!(
            "TypeError: argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn run(source: &str, entry: &str, args: Vec<Value>) -> ScriptResult<Value> {
        let module = parse(source)?;
        let mut interp = Interpreter::new(Limits::default());
        interp.load(&module)?;
        let def = interp.function(entry).expect("function defined");
        interp.invoke(&def, args)
    }

    #[test]
    fn test_sum_loop() {
        let source = "def total(xs):\n    t = 0\n    for x in xs:\n        t += x\n    return t\n";
        let xs = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(run(source, "total", vec![xs]).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_comprehension_does_not_leak_variable() {
        let source = "def f(n):\n    x = 'kept'\n    ys = [x * 2 for x in range(n)]\n    return x\n";
        assert_eq!(
            run(source, "f", vec![Value::Int(3)]).unwrap(),
            Value::Str("kept".into())
        );
    }

    #[test]
    fn test_python_division_semantics() {
        let source = "def f():\n    return [7 // -2, -7 % 3, 7 / 2, 2 ** 10, 2 ** -1]\n";
        assert_eq!(
            run(source, "f", vec![]).unwrap().repr(),
            "[-4, 2, 3.5, 1024, 0.5]"
        );
    }

    #[test]
    fn test_infinite_loop_hits_step_limit() {
        let source = "def f(n):\n    while n > 0:\n        print(n)\n    return 'Done!'\n";
        let err = run(source, "f", vec![Value::Int(3)]).unwrap_err();
        assert_eq!(err, ScriptError::StepLimit { limit: 100_000 });
    }

    #[test]
    fn test_recursion_limit() {
        let source = "def f(n):\n    return f(n + 1)\n";
        let err = run(source, "f", vec![Value::Int(0)]).unwrap_err();
        assert!(matches!(err, ScriptError::RecursionLimit { depth: 64 }));
    }

    #[test]
    fn test_recursion_within_limit() {
        let source = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n";
        assert_eq!(
            run(source, "fact", vec![Value::Int(10)]).unwrap(),
            Value::Int(3_628_800)
        );
    }

    #[test]
    fn test_string_doubling_is_bounded() {
        let source = "def f():\n    s = 'x'\n    for i in range(64):\n        s = s + s\n    return len(s)\n";
        assert!(matches!(
            run(source, "f", vec![]),
            Err(ScriptError::StepLimit { .. } | ScriptError::SizeLimit { .. })
        ));
    }

    #[test]
    fn test_string_repeat_is_bounded() {
        let source = "def f():\n    s = 'ab'\n    for i in range(64):\n        s = s * 2\n    return len(s)\n";
        assert!(matches!(
            run(source, "f", vec![]),
            Err(ScriptError::StepLimit { .. } | ScriptError::SizeLimit { .. })
        ));

        let source = "def f():\n    return 'ab' * 10 ** 9\n";
        assert_eq!(
            run(source, "f", vec![]).unwrap_err(),
            ScriptError::SizeLimit { limit: 1_000_000 }
        );
        assert_eq!(
            run("def f():\n    return 'ab' * 3\n", "f", vec![]).unwrap(),
            Value::Str("ababab".into())
        );
    }

    #[test]
    fn test_size_limit_on_concat_and_extend() {
        let limits = Limits {
            max_value_len: 8,
            ..Limits::default()
        };
        let source = "def cat():\n    return 'abcd' + 'abcde'\ndef grow():\n    xs = [1, 2, 3, 4, 5]\n    xs.extend(xs)\n    return xs\n";
        let mut interp = Interpreter::new(limits);
        interp.load(&parse(source).unwrap()).unwrap();
        for name in ["cat", "grow"] {
            let def = interp.function(name).unwrap();
            assert_eq!(
                interp.invoke(&def, vec![]).unwrap_err(),
                ScriptError::SizeLimit { limit: 8 }
            );
        }
    }

    #[test]
    fn test_huge_range_is_metered_not_allocated() {
        let source = "def f():\n    return len(range(10 ** 12))\n";
        assert!(matches!(
            run(source, "f", vec![]),
            Err(ScriptError::StepLimit { .. })
        ));
    }

    #[test]
    fn test_runtime_error_carries_line() {
        let source = "def f(xs):\n    y = 1\n    return xs[5]\n";
        let err = run(source, "f", vec![Value::List(vec![])]).unwrap_err();
        assert_eq!(
            err,
            ScriptError::Runtime("IndexError: list index out of range (line 3)".into())
        );
    }

    #[test]
    fn test_name_error() {
        let err = run("def f():\n    return missing\n", "f", vec![]).unwrap_err();
        assert!(err.to_string().starts_with("NameError"));
    }

    #[test]
    fn test_print_is_captured() {
        let module = parse("def f(n):\n    print('n is', n)\n    return None\n").unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.load(&module).unwrap();
        let def = interp.function("f").unwrap();
        interp.invoke(&def, vec![Value::Int(2)]).unwrap();
        assert_eq!(interp.take_output(), ["n is 2"]);
    }

    #[test]
    fn test_append_and_index_assignment() {
        let source = "def f():\n    xs = []\n    xs.append(1)\n    xs.append(2)\n    xs[0] = 9\n    xs[-1] += 1\n    return xs\n";
        assert_eq!(run(source, "f", vec![]).unwrap().repr(), "[9, 3]");
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("def f(a, b):\n    return a\n", "f", vec![Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("takes 2 positional arguments but 1 was given"));
    }

    #[test]
    fn test_declared_order() {
        let module = parse("def b():\n    pass\ndef a():\n    pass\n").unwrap();
        let mut interp = Interpreter::new(Limits::default());
        interp.load(&module).unwrap();
        let names: Vec<_> = interp.declared().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_short_circuit_and_chained_compare() {
        let source = "def f(x):\n    return 0 < x <= 5 and x != 3 or 'no'\n";
        assert_eq!(run(source, "f", vec![Value::Int(4)]).unwrap(), Value::Bool(true));
        assert_eq!(run(source, "f", vec![Value::Int(3)]).unwrap(), Value::Str("no".into()));
    }

    #[test]
    fn test_min_max_abs() {
        let source = "def f(xs):\n    return [min(xs), max(xs), abs(-4), max(1, 7, 3)]\n";
        let xs = Value::List(vec![Value::Int(5), Value::Int(-2), Value::Int(9)]);
        assert_eq!(run(source, "f", vec![xs]).unwrap().repr(), "[-2, 9, 4, 7]");
    }
}

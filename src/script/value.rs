//! Runtime values and their Python-flavoured semantics

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde_json::{Number, Value as Json};

use super::ast::FunctionDef;
use crate::error::{ScriptError, ScriptResult};

/// Functions available in every sandbox without a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sum,
    Len,
    Range,
    Print,
    Min,
    Max,
    Abs,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Sum,
        Builtin::Len,
        Builtin::Range,
        Builtin::Print,
        Builtin::Min,
        Builtin::Max,
        Builtin::Abs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Sum => "sum",
            Builtin::Len => "len",
            Builtin::Range => "range",
            Builtin::Print => "print",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Function(Rc<FunctionDef>),
    Builtin(Builtin),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Function(_) | Value::Builtin(_) => true,
        }
    }

    /// Numeric view; bools count as 0/1 like Python
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Python `==`: numbers compare by value across int/float, lists element-wise
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering for `<`, `min`, `max`; None when the types don't compare
    pub fn py_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.py_cmp(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Text `print` writes (strings unquoted)
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Python `repr`
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Function(def) => format!("<function {}>", def.name),
            Value::Builtin(b) => format!("<built-in function {}>", b.name()),
        }
    }

    /// Convert a JSON test input into a runtime value
    pub fn from_json(json: &Json) -> ScriptResult<Value> {
        Ok(match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<ScriptResult<_>>()?,
            ),
            Json::Object(_) => {
                return Err(ScriptError::runtime(
                    "dictionary test inputs are not supported",
                ));
            }
        })
    }

    /// JSON view of a result, for "Expected/Got" diagnostics
    pub fn to_json(&self) -> Json {
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Function(_) | Value::Builtin(_) => Json::String(self.repr()),
        }
    }

    /// Deep comparison against an expected JSON value
    pub fn matches_json(&self, expected: &Json) -> bool {
        match (self, expected) {
            (Value::None, Json::Null) => true,
            (Value::Bool(a), Json::Bool(b)) => a == b,
            (Value::Str(a), Json::String(b)) => a == b,
            (Value::List(items), Json::Array(expected)) => {
                items.len() == expected.len()
                    && items.iter().zip(expected).all(|(v, e)| v.matches_json(e))
            }
            (Value::Int(a), Json::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64().is_some_and(|b| *a as f64 == b),
            },
            (Value::Float(a), Json::Number(n)) => n.as_f64().is_some_and(|b| *a == b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Python-style float text: whole numbers keep a trailing `.0`
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

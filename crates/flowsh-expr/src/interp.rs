//! Tree-walking evaluator.
//!
//! Evaluation is async because calls may land in pipeline subroutines, which
//! run a nested dispatch. Name lookup goes local parameters first, then the
//! caller's bindings, then the builtin globals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowsh_types::{call_value, Bindings, Callable, EvalError, Object, Value};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::ast::{Expr, Lambda, LogicalOp, TemplatePart};
use crate::builtins;
use crate::methods::{call_method, length};
use crate::ops::{self, stringify};

/// Evaluation environment: parameters over caller bindings.
#[derive(Clone)]
pub(crate) struct Env {
    locals: Arc<HashMap<String, Value>>,
    globals: Arc<dyn Bindings>,
}

impl Env {
    pub(crate) fn new(globals: Arc<dyn Bindings>) -> Self {
        Self {
            locals: Arc::new(HashMap::new()),
            globals,
        }
    }

    /// A child environment binding `names` to `args`. Missing args are null.
    pub(crate) fn bind(&self, names: &[String], args: Vec<Value>) -> Self {
        if names.is_empty() {
            return self.clone();
        }
        let mut locals = (*self.locals).clone();
        let mut args = args.into_iter();
        for name in names {
            locals.insert(name.clone(), args.next().unwrap_or(Value::Null));
        }
        Self {
            locals: Arc::new(locals),
            globals: self.globals.clone(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.lookup(name) {
            return Ok(value);
        }
        builtins::global(name).ok_or_else(|| EvalError::Undefined(name.to_string()))
    }
}

/// An arrow function value, closed over the environment it was created in.
struct Closure {
    lambda: Arc<Lambda>,
    env: Env,
}

#[async_trait]
impl Callable for Closure {
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let env = self.env.bind(&self.lambda.params, args);
        eval(&self.lambda.body, &env).await
    }
}

pub(crate) fn eval<'a>(expr: &'a Expr, env: &'a Env) -> BoxFuture<'a, Result<Value, EvalError>> {
    async move {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => env.lookup(name),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(inner) => {
                            out.push_str(&stringify(&eval(inner, env).await?))
                        }
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Array(elements) => Ok(Value::Array(eval_all(elements, env).await?)),
            Expr::Object(entries) => {
                let mut map = Object::new();
                for (key, value) in entries {
                    map.insert(key.clone(), eval(value, env).await?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member { object, property } => {
                let object = eval(object, env).await?;
                property_of(&object, property)
            }
            Expr::Index { object, index } => {
                let object = eval(object, env).await?;
                let index = eval(index, env).await?;
                index_into(&object, &index)
            }
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member { object, property } => {
                    let receiver = eval(object, env).await?;
                    let args = eval_all(args, env).await?;
                    call_method(receiver, property, args).await
                }
                Expr::Ident(name) => {
                    let func = env.lookup(name)?;
                    if !matches!(func, Value::Function(_)) {
                        return Err(EvalError::Type(format!("{name} is not a function")));
                    }
                    let args = eval_all(args, env).await?;
                    call_value(&func, args).await
                }
                other => {
                    let func = eval(other, env).await?;
                    let args = eval_all(args, env).await?;
                    call_value(&func, args).await
                }
            },
            Expr::Unary { op, operand } => ops::unary(*op, &eval(operand, env).await?),
            Expr::Binary { op, left, right } => {
                let left = eval(left, env).await?;
                let right = eval(right, env).await?;
                ops::binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = eval(left, env).await?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_null(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    eval(right, env).await
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if eval(test, env).await?.is_truthy() {
                    eval(consequent, env).await
                } else {
                    eval(alternate, env).await
                }
            }
            Expr::Arrow(lambda) => Ok(Value::Function(Arc::new(Closure {
                lambda: lambda.clone(),
                env: env.clone(),
            }))),
        }
    }
    .boxed()
}

async fn eval_all(exprs: &[Expr], env: &Env) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        values.push(eval(expr, env).await?);
    }
    Ok(values)
}

fn property_of(object: &Value, property: &str) -> Result<Value, EvalError> {
    match object {
        Value::Null => Err(EvalError::Type(format!(
            "cannot read property '{property}' of null"
        ))),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        other if property == "length" => Ok(length(other).unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn index_into(object: &Value, index: &Value) -> Result<Value, EvalError> {
    let position = match index {
        Value::Int(i) => usize::try_from(*i).ok(),
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
        _ => None,
    };
    match (object, position) {
        (Value::Array(items), Some(i)) => Ok(items.get(i).cloned().unwrap_or(Value::Null)),
        (Value::String(s), Some(i)) => Ok(s
            .chars()
            .nth(i)
            .map_or(Value::Null, |c| Value::String(c.to_string()))),
        (Value::Array(_) | Value::String(_), None) if !matches!(index, Value::String(_)) => {
            Ok(Value::Null)
        }
        _ => property_of(object, &stringify(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    async fn run(source: &str, x: Value) -> Result<Value, EvalError> {
        let expr = parse_expression(source).expect("parses");
        let env = Env::new(Arc::new(flowsh_types::EmptyBindings)).bind(&["x".to_string()], vec![x]);
        eval(&expr, &env).await
    }

    #[tokio::test]
    async fn test_member_and_index() {
        let x = Value::object([("a", Value::Array(vec![Value::Int(5), Value::Int(6)]))]);
        assert_eq!(run("x.a[1]", x.clone()).await, Ok(Value::Int(6)));
        assert_eq!(run("x['a'].length", x.clone()).await, Ok(Value::Int(2)));
        assert_eq!(run("x.missing", x).await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_null_member_is_type_error() {
        assert!(matches!(run("x.a", Value::Null).await, Err(EvalError::Type(_))));
    }

    #[tokio::test]
    async fn test_closure_captures_environment() {
        assert_eq!(run("(y => x + y)(2)", Value::Int(40)).await, Ok(Value::Int(42)));
    }

    #[tokio::test]
    async fn test_logical_returns_operand() {
        assert_eq!(run("x || 'default'", Value::String(String::new())).await, Ok("default".into()));
        assert_eq!(run("x ?? 'default'", Value::Int(0)).await, Ok(Value::Int(0)));
        assert_eq!(run("x && x.length", Value::Null).await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_undefined_name() {
        assert_eq!(
            run("nope + 1", Value::Null).await,
            Err(EvalError::Undefined("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_calling_non_function() {
        assert_eq!(
            run("x()", Value::Int(1)).await,
            Err(EvalError::Type("x is not a function".into()))
        );
    }
}

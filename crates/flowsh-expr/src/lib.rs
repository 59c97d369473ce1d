//! flowsh-expr: the default expression language for flowsh pipelines.
//!
//! A small JavaScript-flavoured expression language: literals, arrays,
//! objects, arrow functions, member access, method calls and the usual
//! operators. Expressions are parsed once at compile time and evaluated
//! against the pipeline scope plus positional parameters (`x`, `i`, `acc`).
//!
//! ```text
//! source ──▶ lexer ──▶ parser ──▶ Expr ──▶ interp::eval(env) ──▶ Value
//! ```

pub mod ast;
mod builtins;
mod interp;
mod lexer;
mod methods;
mod ops;
mod parser;

use std::sync::Arc;

use async_trait::async_trait;
use flowsh_types::{Bindings, EvalError, Expression, ExpressionEngine, Value};

pub use ast::Expr;
pub use parser::{parse_expression, parse_template, ParseError};

use interp::Env;

/// Compiles expression text into evaluable programs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEngine;

impl ExprEngine {
    pub fn new() -> Self {
        Self
    }

    fn program(source: &str, params: &[&str], expr: Expr) -> Arc<dyn Expression> {
        Arc::new(Program {
            source: source.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            expr,
        })
    }
}

impl ExpressionEngine for ExprEngine {
    fn compile(&self, source: &str, params: &[&str]) -> Result<Arc<dyn Expression>, EvalError> {
        let expr = parse_expression(source).map_err(|e| {
            tracing::debug!(source, error = %e, "expression failed to parse");
            EvalError::Syntax(e.to_string())
        })?;
        Ok(Self::program(source, params, expr))
    }

    fn compile_template(
        &self,
        template: &str,
        params: &[&str],
    ) -> Result<Arc<dyn Expression>, EvalError> {
        let parts = parse_template(template).map_err(|e| {
            tracing::debug!(template, error = %e, "template failed to parse");
            EvalError::Syntax(e.to_string())
        })?;
        Ok(Self::program(template, params, Expr::Template(parts)))
    }
}

/// A parsed expression plus its positional parameter names.
struct Program {
    source: String,
    params: Vec<String>,
    expr: Expr,
}

#[async_trait]
impl Expression for Program {
    fn source(&self) -> &str {
        &self.source
    }

    async fn eval(&self, env: Arc<dyn Bindings>, args: Vec<Value>) -> Result<Value, EvalError> {
        let env = Env::new(env).bind(&self.params, args);
        interp::eval(&self.expr, &env).await
    }
}

//! Await placement check
//!
//! An `await` is allowed only when its nearest enclosing function or lambda
//! is `async`, or when that function is the designated entry point.

use crate::frontend::ast::*;
use crate::frontend::visit::{self, Visitor};
use crate::utils::{Error, Result};

/// The entity an expression is lexically nested in
enum Scope<'a> {
    Function { name: &'a str, is_async: bool, is_entry: bool },
    Lambda { is_async: bool },
    Global { name: &'a str },
    /// A statement outside of any function
    TopLevel,
}

impl Scope<'_> {
    fn allows_await(&self) -> bool {
        match self {
            Scope::Function { is_async, is_entry, .. } => *is_async || *is_entry,
            Scope::Lambda { is_async } => *is_async,
            Scope::Global { .. } | Scope::TopLevel => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Scope::Function { name, .. } => format!("non-async function `{}`", name),
            Scope::Lambda { .. } => "a non-async lambda".to_string(),
            Scope::Global { name } => format!("the initializer of global `{}`", name),
            Scope::TopLevel => "top-level code".to_string(),
        }
    }
}

struct PlacementChecker<'a> {
    entry_point: &'a str,
    scopes: Vec<Scope<'a>>,
    /// First violation in source order
    error: Option<Error>,
}

impl<'a> PlacementChecker<'a> {
    fn in_scope(&mut self, scope: Scope<'a>, walk: impl FnOnce(&mut Self)) {
        self.scopes.push(scope);
        walk(self);
        self.scopes.pop();
    }

    fn check_item(&mut self, item: &'a Item) {
        match item {
            Item::Function(function) => {
                let scope = Scope::Function {
                    name: &function.name,
                    is_async: function.is_async,
                    is_entry: function.name == self.entry_point,
                };
                self.in_scope(scope, |checker| visit::walk_function(checker, function));
            }
            Item::Variable(decl) => {
                let scope = Scope::Global { name: &decl.name };
                self.in_scope(scope, |checker| visit::walk_item(checker, item));
            }
            Item::Statement(_) => {
                self.in_scope(Scope::TopLevel, |checker| visit::walk_item(checker, item));
            }
            Item::Directive { .. } | Item::Using { .. } | Item::Prototype(_) => {}
        }
    }
}

impl Visitor for PlacementChecker<'_> {
    fn visit_lambda(&mut self, lambda: &Lambda) {
        self.scopes.push(Scope::Lambda { is_async: lambda.is_async });
        visit::walk_lambda(self, lambda);
        self.scopes.pop();
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Await { span, .. } = expr {
            if self.error.is_none() {
                if let Some(scope) = self.scopes.last().filter(|s| !s.allows_await()) {
                    self.error = Some(Error::AwaitOutsideAsync {
                        context: scope.describe(),
                        span: *span,
                    });
                }
            }
        }
        visit::walk_expr(self, expr);
    }
}

/// Verify that every `await` sits in an async entity or the entry point.
/// Reports the first offending `await` in source order.
pub fn check_await_placement(program: &Program, entry_point: &str) -> Result<()> {
    let mut checker = PlacementChecker {
        entry_point,
        scopes: Vec::new(),
        error: None,
    };
    for item in &program.items {
        checker.check_item(item);
    }
    match checker.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

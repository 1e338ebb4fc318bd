//! Counts of the async constructs left in a tree

use crate::frontend::ast::*;
use crate::frontend::visit::{self, Visitor};

/// How many async-only constructs a program still contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub async_functions: usize,
    pub async_lambdas: usize,
    pub awaits: usize,
}

impl Census {
    pub fn of(program: &Program) -> Self {
        let mut census = Census::default();
        visit::walk_program(&mut census, program);
        census
    }

    pub fn is_empty(&self) -> bool {
        *self == Census::default()
    }
}

impl Visitor for Census {
    fn visit_item(&mut self, item: &Item) {
        if let Item::Prototype(prototype) = item {
            if prototype.is_async {
                self.async_functions += 1;
            }
        }
        visit::walk_item(self, item);
    }

    fn visit_function(&mut self, function: &FunctionDecl) {
        if function.is_async {
            self.async_functions += 1;
        }
        visit::walk_function(self, function);
    }

    fn visit_lambda(&mut self, lambda: &Lambda) {
        if lambda.is_async {
            self.async_lambdas += 1;
        }
        visit::walk_lambda(self, lambda);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if matches!(expr, Expr::Await { .. }) {
            self.awaits += 1;
        }
        visit::walk_expr(self, expr);
    }
}

/// True when no `await` and no `async` flag remain anywhere in the tree
pub fn is_fully_lowered(program: &Program) -> bool {
    Census::of(program).is_empty()
}

//! Read-only AST traversal
//!
//! Override the `visit_*` hooks you care about and call the matching
//! `walk_*` function to keep descending. Children are always visited
//! left-to-right in source order.

use crate::frontend::ast::*;

pub trait Visitor {
    fn visit_item(&mut self, item: &Item) {
        walk_item(self, item);
    }

    fn visit_function(&mut self, function: &FunctionDecl) {
        walk_function(self, function);
    }

    fn visit_lambda(&mut self, lambda: &Lambda) {
        walk_lambda(self, lambda);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for item in &program.items {
        visitor.visit_item(item);
    }
}

pub fn walk_item<V: Visitor + ?Sized>(visitor: &mut V, item: &Item) {
    match item {
        Item::Function(function) => visitor.visit_function(function),
        Item::Variable(decl) => {
            if let Some(init) = &decl.init {
                visitor.visit_expr(init);
            }
        }
        Item::Statement(stmt) => visitor.visit_stmt(stmt),
        Item::Directive { .. } | Item::Using { .. } | Item::Prototype(_) => {}
    }
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &FunctionDecl) {
    walk_block(visitor, &function.body);
}

pub fn walk_lambda<V: Visitor + ?Sized>(visitor: &mut V, lambda: &Lambda) {
    walk_block(visitor, &lambda.body);
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(expr) => visitor.visit_expr(expr),
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        Stmt::VarDecl(decl) => {
            if let Some(init) = &decl.init {
                visitor.visit_expr(init);
            }
        }
        Stmt::If { cond, then_branch, else_branch, .. } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_stmt(else_branch);
            }
        }
        Stmt::While { cond, body, .. } => {
            visitor.visit_expr(cond);
            visitor.visit_stmt(body);
        }
        Stmt::For { init, cond, step, body, .. } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            if let Some(step) = step {
                visitor.visit_expr(step);
            }
            visitor.visit_stmt(body);
        }
        Stmt::DoWhile { body, cond, .. } => {
            visitor.visit_stmt(body);
            visitor.visit_expr(cond);
        }
        Stmt::Block(block) => walk_block(visitor, block),
        Stmt::Empty { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Literal { .. } | Expr::Ident { .. } => {}
        Expr::Call { callee, args, .. } => {
            visitor.visit_expr(callee);
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        Expr::Await { expr, .. } => visitor.visit_expr(expr),
        Expr::Lambda(lambda) => visitor.visit_lambda(lambda),
        Expr::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Unary { expr, .. } | Expr::Postfix { expr, .. } | Expr::Paren { expr, .. } => {
            visitor.visit_expr(expr);
        }
        Expr::Member { object, .. } => visitor.visit_expr(object),
        Expr::Index { object, index, .. } => {
            visitor.visit_expr(object);
            visitor.visit_expr(index);
        }
        Expr::Conditional { cond, then_expr, else_expr, .. } => {
            visitor.visit_expr(cond);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
    }
}

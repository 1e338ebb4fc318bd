//! Target constructs produced by the lowering pass
//!
//! | construct       | emitted as                                     |
//! |-----------------|------------------------------------------------|
//! | `Future<T>`     | `std::future<T>`                               |
//! | submit closure  | `std::async(std::launch::async, [=]() {...})`  |
//! | blocking get    | `future.get()`                                 |
//!
//! `std::launch::async` runs every submitted body on its own thread.
//! `std::future::get` blocks the caller and rethrows whatever the task
//! body threw.

use crate::frontend::ast::*;
use crate::utils::Span;

pub const FUTURE_TYPE: &str = "std::future";
pub const SUBMIT: &str = "std::async";
pub const LAUNCH_POLICY: &str = "std::launch::async";
pub const BLOCKING_GET: &str = "get";

/// `T` -> `std::future<T>`
pub fn future_of(ty: Type) -> Type {
    Type::generic(FUTURE_TYPE, vec![ty])
}

/// Capture everything by value
pub fn copy_capture() -> Vec<String> {
    vec!["=".to_string()]
}

fn ident(name: &str, span: Span) -> Expr {
    Expr::Ident { name: name.to_string(), span }
}

/// Replace `body` with `{ return std::async(std::launch::async, [=]() body); }`
pub fn submit_body(body: Block) -> Block {
    let span = body.span;
    let closure = Expr::Lambda(Box::new(Lambda {
        captures: Some(copy_capture()),
        params: Vec::new(),
        ret_type: None,
        body,
        is_async: false,
        span,
    }));
    let submit = Expr::Call {
        callee: Box::new(ident(SUBMIT, span)),
        args: vec![ident(LAUNCH_POLICY, span), closure],
        span,
    };
    Block {
        stmts: vec![Stmt::Return { value: Some(submit), span }],
        span,
    }
}

/// `future` -> `future.get()`, parenthesising low-precedence receivers
pub fn blocking_get(future: Expr, span: Span) -> Expr {
    let object = if future.is_postfix_level() {
        future
    } else {
        Expr::Paren {
            span: future.span(),
            expr: Box::new(future),
        }
    };
    Expr::Call {
        callee: Box::new(Expr::Member {
            object: Box::new(object),
            member: BLOCKING_GET.to_string(),
            arrow: false,
            span,
        }),
        args: Vec::new(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_of_wraps_type() {
        let ty = future_of(Type::named("Data"));
        assert_eq!(ty.name, "std::future");
        assert_eq!(ty.args, vec![Type::named("Data")]);
    }

    #[test]
    fn test_blocking_get_parenthesises_unary_receiver() {
        let deref = Expr::Unary {
            op: UnaryOp::Deref,
            expr: Box::new(ident("p", Span::dummy())),
            span: Span::dummy(),
        };
        let Expr::Call { callee, .. } = blocking_get(deref, Span::dummy()) else {
            panic!("expected call");
        };
        let Expr::Member { object, member, .. } = *callee else {
            panic!("expected member");
        };
        assert_eq!(member, "get");
        assert!(matches!(*object, Expr::Paren { .. }));
    }
}

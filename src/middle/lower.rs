//! Async lowering pass
//!
//! Rewrites a validated program so that no `async` flag and no `await`
//! remains:
//!
//! - an `async` function or lambda returning `T` now returns
//!   `std::future<T>`; its original body runs inside a `[=]` closure handed
//!   to `std::async`;
//! - `await e` becomes `e.get()`, which blocks the calling thread until the
//!   task finishes.
//!
//! The rewrite is bottom-up: nested lambdas are lowered before the call or
//! `await` that wraps them. Nothing is reordered or hoisted, so the `.get()`
//! calls keep the left-to-right order of the source `await`s.
//!
//! Blocking is a deliberate narrowing of cooperative suspension: a pending
//! `.get()` holds its thread for the whole wait, and two calls only overlap
//! when both futures are created before either is awaited.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::frontend::ast::*;
use crate::middle::placement::check_await_placement;
use crate::middle::primitives;
use crate::utils::Result;

/// Lowering configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerOptions {
    /// Synchronous root: never wrapped, may `await` directly
    pub entry_point: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
        }
    }
}

/// What a run rewrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoweringStats {
    pub functions: usize,
    pub lambdas: usize,
    pub awaits: usize,
}

/// The lowering pass. One instance per program.
pub struct Lowerer<'a> {
    options: &'a LowerOptions,
    stats: LoweringStats,
}

impl<'a> Lowerer<'a> {
    pub fn new(options: &'a LowerOptions) -> Self {
        Self {
            options,
            stats: LoweringStats::default(),
        }
    }

    /// Validate await placement, then lower the whole program
    pub fn lower(mut self, program: Program) -> Result<(Program, LoweringStats)> {
        check_await_placement(&program, &self.options.entry_point)?;

        let items = program
            .items
            .into_iter()
            .map(|item| self.lower_item(item))
            .collect();

        debug!(
            "lowered {} function(s), {} lambda(s), {} await(s)",
            self.stats.functions, self.stats.lambdas, self.stats.awaits
        );
        Ok((Program { items }, self.stats))
    }

    fn lower_item(&mut self, item: Item) -> Item {
        match item {
            Item::Function(function) => Item::Function(self.lower_function(function)),
            Item::Variable(decl) => Item::Variable(self.lower_var_decl(decl)),
            Item::Prototype(prototype) => Item::Prototype(self.lower_prototype(prototype)),
            Item::Statement(stmt) => Item::Statement(self.lower_stmt(stmt)),
            other => other,
        }
    }

    /// A declaration must agree with its lowered definition, so only the
    /// return type changes
    fn lower_prototype(&self, prototype: Prototype) -> Prototype {
        if !prototype.is_async {
            return prototype;
        }
        let ret_type = if prototype.name == self.options.entry_point {
            prototype.ret_type
        } else {
            primitives::future_of(prototype.ret_type)
        };
        Prototype {
            ret_type,
            is_async: false,
            ..prototype
        }
    }

    fn lower_function(&mut self, function: FunctionDecl) -> FunctionDecl {
        let body = self.lower_block(function.body);

        if !function.is_async {
            return FunctionDecl { body, ..function };
        }

        if function.name == self.options.entry_point {
            warn!(
                "entry point `{}` is declared async; it stays synchronous",
                function.name
            );
            return FunctionDecl {
                body,
                is_async: false,
                ..function
            };
        }

        debug!("lowering async function `{}`", function.name);
        self.stats.functions += 1;
        FunctionDecl {
            ret_type: primitives::future_of(function.ret_type),
            body: primitives::submit_body(body),
            is_async: false,
            ..function
        }
    }

    fn lower_lambda(&mut self, lambda: Lambda) -> Lambda {
        let body = self.lower_block(lambda.body);
        // A lambda spelled without brackets sees its enclosing scope by value
        let captures = Some(lambda.captures.unwrap_or_else(primitives::copy_capture));

        if !lambda.is_async {
            return Lambda { captures, body, ..lambda };
        }

        debug!("lowering async lambda at {}:{}", lambda.span.line, lambda.span.column);
        self.stats.lambdas += 1;
        Lambda {
            captures,
            ret_type: lambda.ret_type.map(primitives::future_of),
            body: primitives::submit_body(body),
            is_async: false,
            ..lambda
        }
    }

    fn lower_block(&mut self, block: Block) -> Block {
        Block {
            stmts: block.stmts.into_iter().map(|stmt| self.lower_stmt(stmt)).collect(),
            span: block.span,
        }
    }

    fn lower_var_decl(&mut self, decl: VarDecl) -> VarDecl {
        VarDecl {
            init: decl.init.map(|init| self.lower_expr(init)),
            ..decl
        }
    }

    fn lower_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Expr(expr) => Stmt::Expr(self.lower_expr(expr)),
            Stmt::Return { value, span } => Stmt::Return {
                value: value.map(|v| self.lower_expr(v)),
                span,
            },
            Stmt::VarDecl(decl) => Stmt::VarDecl(self.lower_var_decl(decl)),
            Stmt::If { cond, then_branch, else_branch, span } => {
                let cond = self.lower_expr(cond);
                let then_branch = self.lower_boxed_stmt(then_branch);
                let else_branch = else_branch.map(|s| self.lower_boxed_stmt(s));
                Stmt::If { cond, then_branch, else_branch, span }
            }
            Stmt::While { cond, body, span } => {
                let cond = self.lower_expr(cond);
                let body = self.lower_boxed_stmt(body);
                Stmt::While { cond, body, span }
            }
            Stmt::For { init, cond, step, body, span } => {
                let init = init.map(|s| self.lower_boxed_stmt(s));
                let cond = cond.map(|c| self.lower_expr(c));
                let step = step.map(|s| self.lower_expr(s));
                let body = self.lower_boxed_stmt(body);
                Stmt::For { init, cond, step, body, span }
            }
            Stmt::DoWhile { body, cond, span } => {
                let body = self.lower_boxed_stmt(body);
                let cond = self.lower_expr(cond);
                Stmt::DoWhile { body, cond, span }
            }
            Stmt::Block(block) => Stmt::Block(self.lower_block(block)),
            leaf @ (Stmt::Empty { .. } | Stmt::Break { .. } | Stmt::Continue { .. }) => leaf,
        }
    }

    fn lower_boxed_stmt(&mut self, stmt: Box<Stmt>) -> Box<Stmt> {
        Box::new(self.lower_stmt(*stmt))
    }

    fn lower_boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.lower_expr(*expr))
    }

    /// Children first, left to right
    fn lower_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Await { expr, span } => {
                let future = self.lower_expr(*expr);
                self.stats.awaits += 1;
                primitives::blocking_get(future, span)
            }
            Expr::Lambda(lambda) => Expr::Lambda(Box::new(self.lower_lambda(*lambda))),
            Expr::Call { callee, args, span } => {
                let callee = self.lower_boxed(callee);
                let args = args.into_iter().map(|arg| self.lower_expr(arg)).collect();
                Expr::Call { callee, args, span }
            }
            Expr::Binary { left, op, right, span } => {
                let left = self.lower_boxed(left);
                let right = self.lower_boxed(right);
                Expr::Binary { left, op, right, span }
            }
            Expr::Unary { op, expr, span } => Expr::Unary {
                op,
                expr: self.lower_boxed(expr),
                span,
            },
            Expr::Postfix { op, expr, span } => Expr::Postfix {
                op,
                expr: self.lower_boxed(expr),
                span,
            },
            Expr::Member { object, member, arrow, span } => Expr::Member {
                object: self.lower_boxed(object),
                member,
                arrow,
                span,
            },
            Expr::Index { object, index, span } => {
                let object = self.lower_boxed(object);
                let index = self.lower_boxed(index);
                Expr::Index { object, index, span }
            }
            Expr::Conditional { cond, then_expr, else_expr, span } => {
                let cond = self.lower_boxed(cond);
                let then_expr = self.lower_boxed(then_expr);
                let else_expr = self.lower_boxed(else_expr);
                Expr::Conditional { cond, then_expr, else_expr, span }
            }
            Expr::Paren { expr, span } => Expr::Paren {
                expr: self.lower_boxed(expr),
                span,
            },
            leaf @ (Expr::Literal { .. } | Expr::Ident { .. }) => leaf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;
    use crate::middle::census::is_fully_lowered;
    use crate::utils::Error;

    fn lower(source: &str) -> Result<(Program, LoweringStats)> {
        let options = LowerOptions::default();
        Lowerer::new(&options).lower(parse(source).unwrap())
    }

    fn function<'p>(program: &'p Program, name: &str) -> &'p FunctionDecl {
        program.functions().find(|f| f.name == name).expect("function not found")
    }

    /// The closure handed to `std::async` by a lowered body
    fn submitted_closure(body: &Block) -> &Lambda {
        let [Stmt::Return { value: Some(Expr::Call { callee, args, .. }), .. }] = body.stmts.as_slice() else {
            panic!("expected a single submitting return, got {:?}", body.stmts);
        };
        assert!(matches!(callee.as_ref(), Expr::Ident { name, .. } if name == "std::async"));
        assert!(matches!(&args[0], Expr::Ident { name, .. } if name == "std::launch::async"));
        let Expr::Lambda(closure) = &args[1] else {
            panic!("expected closure argument");
        };
        closure
    }

    fn is_blocking_get(expr: &Expr) -> bool {
        matches!(
            expr,
            Expr::Call { callee, args, .. }
                if args.is_empty()
                    && matches!(callee.as_ref(), Expr::Member { member, arrow: false, .. } if member == "get")
        )
    }

    #[test]
    fn test_async_function_returns_future() {
        let (program, stats) = lower("async Data fetchData(string url) { Data data = await download(url); return data; }").unwrap();
        let f = function(&program, "fetchData");
        assert!(!f.is_async);
        assert_eq!(f.ret_type, Type::generic("std::future", vec![Type::named("Data")]));
        assert_eq!(f.params.len(), 1);

        let closure = submitted_closure(&f.body);
        assert_eq!(closure.captures, Some(vec!["=".to_string()]));
        assert!(closure.params.is_empty());
        assert_eq!(closure.body.stmts.len(), 2);
        let Stmt::VarDecl(VarDecl { init: Some(init), .. }) = &closure.body.stmts[0] else {
            panic!("expected declaration");
        };
        assert!(is_blocking_get(init));

        assert_eq!(stats, LoweringStats { functions: 1, lambdas: 0, awaits: 1 });
        assert!(is_fully_lowered(&program));
    }

    #[test]
    fn test_entry_point_is_not_wrapped() {
        let (program, _) = lower("int main() { int v = await compute(); return v; }").unwrap();
        let main = function(&program, "main");
        assert_eq!(main.ret_type, Type::named("int"));
        assert_eq!(main.body.stmts.len(), 2);
        let Stmt::VarDecl(VarDecl { init: Some(init), .. }) = &main.body.stmts[0] else {
            panic!("expected declaration");
        };
        assert!(is_blocking_get(init));
    }

    #[test]
    fn test_async_entry_point_stays_synchronous() {
        let (program, stats) = lower("async int main() { return await compute(); }").unwrap();
        let main = function(&program, "main");
        assert!(!main.is_async);
        assert_eq!(main.ret_type, Type::named("int"));
        assert_eq!(stats.functions, 0);
        assert!(matches!(&main.body.stmts[0], Stmt::Return { value: Some(v), .. } if is_blocking_get(v)));
    }

    #[test]
    fn test_immediately_invoked_async_lambda() {
        let (program, stats) = lower(
            "int main() { Data d = await async Data(string url) { return fetchData(url); } (\"google.com\"); }",
        )
        .unwrap();
        let main = function(&program, "main");
        let Stmt::VarDecl(VarDecl { init: Some(init), .. }) = &main.body.stmts[0] else {
            panic!("expected declaration");
        };
        assert!(is_blocking_get(init));

        let Expr::Call { callee, .. } = init else { unreachable!() };
        let Expr::Member { object, .. } = callee.as_ref() else { unreachable!() };
        let Expr::Call { callee: lambda, args, .. } = object.as_ref() else {
            panic!("expected the lambda invocation as receiver");
        };
        assert_eq!(args.len(), 1);
        let Expr::Lambda(lambda) = lambda.as_ref() else {
            panic!("expected lambda callee");
        };
        assert!(!lambda.is_async);
        assert_eq!(lambda.captures, Some(vec!["=".to_string()]));
        assert_eq!(lambda.params[0].name, "url");
        assert_eq!(lambda.ret_type, Some(Type::generic("std::future", vec![Type::named("Data")])));
        let closure = submitted_closure(&lambda.body);
        assert!(matches!(&closure.body.stmts[0], Stmt::Return { .. }));

        assert_eq!(stats, LoweringStats { functions: 0, lambdas: 1, awaits: 1 });
    }

    #[test]
    fn test_nested_await_lowers_inner_first() {
        let (program, stats) = lower("async int f() { return await (await outer()).inner(); }").unwrap();
        assert_eq!(stats.awaits, 2);
        assert!(is_fully_lowered(&program));
    }

    #[test]
    fn test_sequential_awaits_keep_order() {
        let (program, _) = lower("async int f() { int a = await first(); int b = await second(); return a + b; }").unwrap();
        let f = function(&program, "f");
        let closure = submitted_closure(&f.body);
        let callees: Vec<&str> = closure
            .body
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::VarDecl(VarDecl { init: Some(Expr::Call { callee, .. }), .. }) => match callee.as_ref() {
                    Expr::Member { object, .. } => match object.as_ref() {
                        Expr::Call { callee, .. } => match callee.as_ref() {
                            Expr::Ident { name, .. } => Some(name.as_str()),
                            _ => None,
                        },
                        _ => None,
                    },
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(callees, vec!["first", "second"]);
    }

    #[test]
    fn test_plain_program_is_unchanged() {
        let source = "#include <iostream>\nint add(int a, int b) { return a + b; }\nint main() { auto f = [&](int x) { return x; }; std::cout << add(1, f(2)); }";
        let original = parse(source).unwrap();
        let (lowered, stats) = lower(source).unwrap();
        assert_eq!(lowered, original);
        assert_eq!(stats, LoweringStats::default());
    }

    #[test]
    fn test_prototypes_follow_their_definitions() {
        let (program, stats) = lower("async Data fetch(string url);\nData download(string url);\nasync int main();").unwrap();
        let prototypes: Vec<&Prototype> = program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Prototype(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(prototypes[0].ret_type, Type::generic("std::future", vec![Type::named("Data")]));
        assert_eq!(prototypes[1].ret_type, Type::named("Data"));
        assert_eq!(prototypes[2].ret_type, Type::named("int"));
        assert!(prototypes.iter().all(|p| !p.is_async));
        assert_eq!(stats, LoweringStats::default());
        assert!(is_fully_lowered(&program));
    }

    #[test]
    fn test_awaits_inside_loops() {
        let (program, stats) = lower(
            "async int f() { for (int i = await first(); i < await bound(); i++) { await g(i); } do { await h(); } while (await more()); return 0; }",
        )
        .unwrap();
        assert_eq!(stats.awaits, 5);
        assert!(is_fully_lowered(&program));
    }

    #[test]
    fn test_await_outside_async_aborts() {
        let err = lower("void helper() {\n    await foo();\n}\nint main() { helper(); }").unwrap_err();
        assert!(matches!(err, Error::AwaitOutsideAsync { .. }));
        assert_eq!(err.line(), 2);
    }
}

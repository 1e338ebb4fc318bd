//! C++ Code Generator
//!
//! Renders the AST as C++ text with four-space indentation. Statements are
//! written line by line; expressions are built as strings, and a lambda
//! body is rendered by a nested generator one level deeper so that its
//! closing brace lines up with the statement that contains it.

use crate::backend::codegen::CodeGen;
use crate::frontend::ast::*;

const INDENT: &str = "    ";

/// C++ code generator
pub struct CppCodeGen {
    output: String,
    indent: usize,
}

impl Default for CppCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CppCodeGen {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    fn nested(indent: usize) -> Self {
        Self {
            output: String::new(),
            indent,
        }
    }

    /// Write indented line
    fn writeln(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.output.push_str(INDENT);
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn blank_line(&mut self) {
        self.output.push('\n');
    }

    // ==================== Items ====================

    fn generate_item(&mut self, item: &Item) {
        match item {
            Item::Directive { text, .. } => self.writeln(text),
            Item::Using { path, .. } => self.writeln(&format!("using {};", path)),
            Item::Variable(decl) => {
                let line = self.var_decl_to_cpp(decl);
                self.writeln(&line);
            }
            Item::Function(function) => self.generate_function(function),
            Item::Prototype(prototype) => {
                let line = format!(
                    "{}{};",
                    self.signature_to_cpp(prototype.is_async, &prototype.ret_type, &prototype.name),
                    self.params_in_parens(&prototype.params)
                );
                self.writeln(&line);
            }
            Item::Statement(stmt) => self.generate_stmt(stmt),
        }
    }

    fn generate_function(&mut self, function: &FunctionDecl) {
        let header = format!(
            "{}{} {{",
            self.signature_to_cpp(function.is_async, &function.ret_type, &function.name),
            self.params_in_parens(&function.params)
        );
        self.writeln(&header);
        self.generate_block_body(&function.body);
        self.writeln("}");
    }

    /// `[async ]Type name`
    fn signature_to_cpp(&self, is_async: bool, ret_type: &Type, name: &str) -> String {
        let qualifier = if is_async { "async " } else { "" };
        format!("{}{} {}", qualifier, self.type_to_cpp(ret_type), name)
    }

    fn params_in_parens(&self, params: &[Param]) -> String {
        format!("({})", self.params_to_cpp(params))
    }

    fn generate_block_body(&mut self, block: &Block) {
        self.indent += 1;
        for stmt in &block.stmts {
            self.generate_stmt(stmt);
        }
        self.indent -= 1;
    }

    // ==================== Statements ====================

    fn generate_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                let line = format!("{};", self.expr_to_cpp(expr));
                self.writeln(&line);
            }
            Stmt::Return { value: Some(value), .. } => {
                let line = format!("return {};", self.expr_to_cpp(value));
                self.writeln(&line);
            }
            Stmt::Return { value: None, .. } => self.writeln("return;"),
            Stmt::VarDecl(decl) => {
                let line = self.var_decl_to_cpp(decl);
                self.writeln(&line);
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.generate_if(cond, then_branch, else_branch.as_deref(), "");
            }
            Stmt::While { cond, body, .. } => {
                let header = format!("while ({})", self.expr_to_cpp(cond));
                if self.open_branch(&header, body) {
                    self.writeln("}");
                }
            }
            Stmt::For { init, cond, step, body, .. } => {
                let init = match init.as_deref() {
                    Some(Stmt::VarDecl(decl)) => self.var_decl_to_cpp(decl),
                    Some(Stmt::Expr(expr)) => format!("{};", self.expr_to_cpp(expr)),
                    _ => ";".to_string(),
                };
                let cond = cond.as_ref().map_or_else(String::new, |c| format!(" {}", self.expr_to_cpp(c)));
                let step = step.as_ref().map_or_else(String::new, |s| format!(" {}", self.expr_to_cpp(s)));
                let header = format!("for ({}{};{})", init, cond, step);
                if self.open_branch(&header, body) {
                    self.writeln("}");
                }
            }
            Stmt::DoWhile { body, cond, .. } => {
                let tail = format!("while ({});", self.expr_to_cpp(cond));
                if self.open_branch("do", body) {
                    self.writeln(&format!("}} {}", tail));
                } else {
                    self.writeln(&tail);
                }
            }
            Stmt::Break { .. } => self.writeln("break;"),
            Stmt::Continue { .. } => self.writeln("continue;"),
            Stmt::Block(block) => {
                self.writeln("{");
                self.generate_block_body(block);
                self.writeln("}");
            }
            Stmt::Empty { .. } => self.writeln(";"),
        }
    }

    /// `lead` is what precedes `if` on its line: nothing, `else ` or `} else `
    fn generate_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>, lead: &str) {
        let header = format!("{}if ({})", lead, self.expr_to_cpp(cond));
        let braced = self.open_branch(&header, then_branch);
        let else_lead = if braced { "} else" } else { "else" };

        match else_branch {
            None => {
                if braced {
                    self.writeln("}");
                }
            }
            Some(Stmt::If { cond, then_branch, else_branch, .. }) => {
                self.generate_if(cond, then_branch, else_branch.as_deref(), &format!("{} ", else_lead));
            }
            Some(other) => {
                if self.open_branch(else_lead, other) {
                    self.writeln("}");
                }
            }
        }
    }

    /// Write `header` and the branch body. A block body leaves its closing
    /// brace to the caller and returns true.
    fn open_branch(&mut self, header: &str, body: &Stmt) -> bool {
        match body {
            Stmt::Block(block) => {
                self.writeln(&format!("{} {{", header));
                self.generate_block_body(block);
                true
            }
            other => {
                self.writeln(header);
                self.indent += 1;
                self.generate_stmt(other);
                self.indent -= 1;
                false
            }
        }
    }

    fn var_decl_to_cpp(&self, decl: &VarDecl) -> String {
        match &decl.init {
            Some(init) => format!("{} {} = {};", self.type_to_cpp(&decl.ty), decl.name, self.expr_to_cpp(init)),
            None => format!("{} {};", self.type_to_cpp(&decl.ty), decl.name),
        }
    }

    // ==================== Types ====================

    fn type_to_cpp(&self, ty: &Type) -> String {
        let mut out = String::new();
        if ty.is_const {
            out.push_str("const ");
        }
        out.push_str(&ty.name);
        if !ty.args.is_empty() {
            let args: Vec<String> = ty.args.iter().map(|arg| self.type_to_cpp(arg)).collect();
            out.push('<');
            out.push_str(&args.join(", "));
            out.push('>');
        }
        for declarator in &ty.declarators {
            out.push(match declarator {
                Declarator::Pointer => '*',
                Declarator::Reference => '&',
            });
        }
        out
    }

    fn params_to_cpp(&self, params: &[Param]) -> String {
        params
            .iter()
            .map(|p| format!("{} {}", self.type_to_cpp(&p.ty), p.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ==================== Expressions ====================

    fn expr_to_cpp(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal { value, .. } => match value {
                Literal::Number(n) => n.clone(),
                Literal::String(s) => format!("\"{}\"", s),
                Literal::Char(c) => format!("'{}'", c),
                Literal::Bool(b) => b.to_string(),
            },
            Expr::Ident { name, .. } => name.clone(),
            Expr::Call { callee, args, .. } => {
                let args: Vec<String> = args.iter().map(|a| self.expr_to_cpp(a)).collect();
                format!("{}({})", self.expr_to_cpp(callee), args.join(", "))
            }
            Expr::Await { expr, .. } => format!("await {}", self.expr_to_cpp(expr)),
            Expr::Lambda(lambda) => self.lambda_to_cpp(lambda),
            Expr::Binary { left, op, right, .. } => format!(
                "{} {} {}",
                self.expr_to_cpp(left),
                op.as_str(),
                self.expr_to_cpp(right)
            ),
            Expr::Unary { op, expr, .. } => {
                let operand = self.expr_to_cpp(expr);
                let op = op.as_str();
                // `- -x` must not turn into `--x`
                if op.chars().last() == operand.chars().next() {
                    format!("{} {}", op, operand)
                } else {
                    format!("{}{}", op, operand)
                }
            }
            Expr::Postfix { op, expr, .. } => format!("{}{}", self.expr_to_cpp(expr), op.as_str()),
            Expr::Member { object, member, arrow, .. } => format!(
                "{}{}{}",
                self.expr_to_cpp(object),
                if *arrow { "->" } else { "." },
                member
            ),
            Expr::Index { object, index, .. } => {
                format!("{}[{}]", self.expr_to_cpp(object), self.expr_to_cpp(index))
            }
            Expr::Conditional { cond, then_expr, else_expr, .. } => format!(
                "{} ? {} : {}",
                self.expr_to_cpp(cond),
                self.expr_to_cpp(then_expr),
                self.expr_to_cpp(else_expr)
            ),
            Expr::Paren { expr, .. } => format!("({})", self.expr_to_cpp(expr)),
        }
    }

    fn lambda_to_cpp(&self, lambda: &Lambda) -> String {
        let qualifier = if lambda.is_async { "async " } else { "" };
        let params = self.params_to_cpp(&lambda.params);

        let head = match (&lambda.captures, &lambda.ret_type) {
            (Some(captures), Some(ret)) => format!(
                "{}[{}]({}) -> {}",
                qualifier,
                captures.join(", "),
                params,
                self.type_to_cpp(ret)
            ),
            (Some(captures), None) => format!("{}[{}]({})", qualifier, captures.join(", "), params),
            (None, ret) => {
                let ret = ret.as_ref().map_or_else(|| "auto".to_string(), |t| self.type_to_cpp(t));
                format!("{}{}({})", qualifier, ret, params)
            }
        };

        if lambda.body.stmts.is_empty() {
            return format!("{} {{}}", head);
        }

        let mut body = Self::nested(self.indent + 1);
        for stmt in &lambda.body.stmts {
            body.generate_stmt(stmt);
        }
        format!("{} {{\n{}{}}}", head, body.output, INDENT.repeat(self.indent))
    }
}

impl CodeGen for CppCodeGen {
    fn generate_source(&mut self, program: &Program) -> String {
        self.output.clear();
        self.indent = 0;

        let mut after_function = false;
        for (i, item) in program.items.iter().enumerate() {
            let is_function = matches!(item, Item::Function(_));
            if i > 0 && (is_function || after_function) {
                self.blank_line();
            }
            self.generate_item(item);
            after_function = is_function;
        }

        self.output.clone()
    }

    fn name(&self) -> &str {
        "C++"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;
    use pretty_assertions::assert_eq;

    fn generate(source: &str) -> String {
        let program = parse(source).unwrap();
        CppCodeGen::new().generate_source(&program)
    }

    #[test]
    fn test_items_and_spacing() {
        let source = "#include <iostream>\nusing namespace std;\nint counter = 0;\nint get() { return counter; }\nvoid reset() { counter = 0; }\nint limit;";
        let expected = "\
#include <iostream>
using namespace std;
int counter = 0;

int get() {
    return counter;
}

void reset() {
    counter = 0;
}

int limit;
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_if_else_chains() {
        let source = "void f(int x) { if (x) a(); else if (x > 1) { b(); } else c(); while (x) { x--; } if (x) { } }";
        let expected = "\
void f(int x) {
    if (x)
        a();
    else if (x > 1) {
        b();
    } else
        c();
    while (x) {
        x--;
    }
    if (x) {
    }
}
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_unlowered_async_forms() {
        let source = "async int f() { auto g = async [=](int n) -> int { return n; }; return await async int(int v) { return v; }(1); }";
        let expected = "\
async int f() {
    auto g = async [=](int n) -> int {
        return n;
    };
    return await async int(int v) {
        return v;
    }(1);
}
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_nested_lambda_indentation() {
        let source = "void f() { run([&]() { run([=]() { go(); }); }); }";
        let expected = "\
void f() {
    run([&]() {
        run([=]() {
            go();
        });
    });
}
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_expressions() {
        let source = "void f() { x = - -a + (b - c) * d[i]; p->q.r(&v, *w, !ok, 'c', \"s\\n\", true); y = z ? ++i : j--; auto e = [] {}; }";
        let expected = "\
void f() {
    x = - -a + (b - c) * d[i];
    p->q.r(&v, *w, !ok, 'c', \"s\\n\", true);
    y = z ? ++i : j--;
    auto e = []() {};
}
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_types() {
        let source = "std::map<int, std::vector<Data*>> f(const std::string& s, T&& t) { ; }";
        let expected = "\
std::map<int, std::vector<Data*>> f(const std::string& s, T&& t) {
    ;
}
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_prototypes_and_top_level_statements() {
        let source = "Data download(string url);\nasync bool push(string url, Data d);\nint main() { return 0; }\nstd::cout << 1;";
        let expected = "\
Data download(string url);
async bool push(string url, Data d);

int main() {
    return 0;
}

std::cout << 1;
";
        assert_eq!(generate(source), expected);
    }

    #[test]
    fn test_loops() {
        let source = "void f() { for (int i = 0; i < n; i++) { if (i) continue; g(i); } for (;;) break; for (i = 0; ; ) x(); do { y(); } while (a); do z(); while (b); }";
        let expected = "\
void f() {
    for (int i = 0; i < n; i++) {
        if (i)
            continue;
        g(i);
    }
    for (;;)
        break;
    for (i = 0;;)
        x();
    do {
        y();
    } while (a);
    do
        z();
    while (b);
}
";
        let first = generate(source);
        assert_eq!(first, expected);
        assert_eq!(generate(&first), first);
    }

    #[test]
    fn test_output_reparses_to_same_text() {
        let source = "int main() { if (a) { if (b) x(); else y(); } std::cout << [=](int n) -> int { return n * 2; }(21) << std::endl; }";
        let first = generate(source);
        assert_eq!(generate(&first), first);
    }
}

//! Recursive descent parser building the [AST](crate::compiler::common::ast).
//!
//! Expressions are parsed in two steps: `parse_single_expression` recognizes
//! a head expression, then `post_expression` absorbs trailing binary
//! operators and `.`/`@` dispatches. Binary operators are inserted into the
//! existing operator sub-tree by walking its right spine and rotating, which
//! enforces precedence and associativity even across intervening dispatches.
//! Parenthesized operator sub-trees are opaque to the rotation.
//!
//! The parser aborts on the first mismatch.

pub mod double_peek;

use crate::compiler::common::{ast::*, error::*, names, token::*};
use crate::compiler::parser::double_peek::DoublePeek;

// helper macros that allow comparing enums without specifying their fields:
// TokenKind::ObjectId(_)
macro_rules! match_next {
    ($parser:expr, $expected:pat) => {{
        let matched = match $parser.tokens.peek() {
            Ok(token) => matches!(token.kind, $expected),
            Err(_) => false,
        };
        if matched {
            $parser.next()
        } else {
            None
        }
    }};
}
macro_rules! consume {
    ($parser:expr, $expected:pat) => {{
        let matched = {
            let token = $parser.tokens.peek()?;
            matches!(token.kind, $expected)
        };
        if matched {
            Ok($parser.next().expect("just peeked"))
        } else {
            let token = $parser.tokens.peek()?;
            Err(Error::new(token.line, ErrorKind::Syntax(token.kind.to_string())))
        }
    }};
}
macro_rules! check {
    ($parser:expr, $expected:pat) => {
        if let Ok(token) = $parser.tokens.peek() {
            matches!(token.kind, $expected)
        } else {
            false
        }
    };
}

pub struct Parser {
    tokens: DoublePeek,

    // line of the most recently consumed token; new AST nodes pick it up
    last_line: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: DoublePeek::new(tokens),
            last_line: 1,
        }
    }

    // <program> ::= (<class>)+
    pub fn parse(mut self) -> Result<Program, Error> {
        let mut classes = Vec::new();

        // at least one class is required
        loop {
            consume!(self, TokenKind::Class)?;
            classes.push(self.parse_class()?);

            if self.tokens.is_empty() {
                break;
            }
        }

        Ok(Program { classes, line: 1 })
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.next();
        if let Some(token) = &token {
            self.last_line = token.line;
        }
        token
    }

    fn syntax_error(&self, token: &Token) -> Error {
        Error::new(token.line, ErrorKind::Syntax(token.kind.to_string()))
    }

    // <class> ::= CLASS TYPEID [INHERITS TYPEID] '{' <features> '}' ';'
    fn parse_class(&mut self) -> Result<Class, Error> {
        let name = consume!(self, TokenKind::TypeId(_))?;
        let mut class = Class::new(name.unwrap_string(), self.last_line);

        if match_next!(self, TokenKind::Inherits).is_some() {
            let base = consume!(self, TokenKind::TypeId(_))?;
            class.base_class = base.unwrap_string();
        }

        consume!(self, TokenKind::LeftBrace)?;
        self.parse_features(&mut class)?;
        consume!(self, TokenKind::RightBrace)?;
        consume!(self, TokenKind::Semicolon)?;

        Ok(class)
    }

    // <features> ::= (<attribute> | <method>)*
    fn parse_features(&mut self, class: &mut Class) -> Result<(), Error> {
        while let Some(name) = match_next!(self, TokenKind::ObjectId(_)) {
            let name = name.unwrap_string();
            let token = self.tokens.peek()?;

            match token.kind {
                // <attribute> ::= OBJECTID ':' TYPEID ['<-' <expr>] ';'
                TokenKind::Colon => {
                    self.next();
                    let declared_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();
                    let line = self.last_line;

                    let init = if match_next!(self, TokenKind::Assign).is_some() {
                        self.parse_expression()?
                    } else {
                        self.no_expr(&declared_type)
                    };
                    consume!(self, TokenKind::Semicolon)?;

                    class.features.push(Feature::Attribute(Attribute {
                        name,
                        declared_type,
                        init,
                        line,
                    }));
                }
                // <method> ::= OBJECTID '(' <formals> ')' ':' TYPEID '{' <expr> '}' ';'
                TokenKind::LeftParen => {
                    self.next();
                    let line = self.last_line;

                    let formals = self.parse_formals()?;
                    consume!(self, TokenKind::Colon)?;
                    let return_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();

                    consume!(self, TokenKind::LeftBrace)?;
                    let body = self.parse_expression()?;
                    consume!(self, TokenKind::RightBrace)?;
                    consume!(self, TokenKind::Semicolon)?;

                    class.features.push(Feature::Method(Method {
                        name,
                        formals,
                        return_type,
                        body,
                        line,
                    }));
                }
                _ => return Err(self.syntax_error(token)),
            }
        }
        Ok(())
    }

    // <formals> ::= [OBJECTID ':' TYPEID (',' OBJECTID ':' TYPEID)*]
    fn parse_formals(&mut self) -> Result<Vec<Formal>, Error> {
        let mut formals = Vec::new();

        loop {
            let token = self.tokens.peek()?;
            match token.kind {
                TokenKind::RightParen => {
                    self.next();
                    return Ok(formals);
                }
                TokenKind::ObjectId(_) => {
                    let name = self.next().expect("just peeked").unwrap_string();
                    consume!(self, TokenKind::Colon)?;
                    let declared_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();

                    formals.push(Formal {
                        name,
                        declared_type,
                        line: self.last_line,
                    });

                    if match_next!(self, TokenKind::Comma).is_none()
                        && !check!(self, TokenKind::RightParen)
                    {
                        let token = self.tokens.peek()?;
                        return Err(self.syntax_error(token));
                    }
                }
                _ => return Err(self.syntax_error(token)),
            }
        }
    }

    fn no_expr(&self, declared_type: &str) -> Expr {
        Expr::new(
            ExprKind::NoExpr { declared_type: declared_type.to_string() },
            self.last_line,
        )
    }

    pub(crate) fn parse_expression(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_single_expression()?;
        self.post_expression(expr)
    }

    /// Parses one head expression without any trailing operators
    fn parse_single_expression(&mut self) -> Result<Expr, Error> {
        let token = self.tokens.peek()?;
        match token.kind {
            TokenKind::ObjectId(_) => {
                if matches!(self.tokens.double_peek()?.kind, TokenKind::Assign) {
                    self.parse_assignment()
                } else if matches!(self.tokens.double_peek()?.kind, TokenKind::LeftParen) {
                    self.parse_self_dispatch()
                } else {
                    let name = self.next().expect("just peeked").unwrap_string();
                    Ok(Expr::new(ExprKind::Identifier(name), self.last_line))
                }
            }
            TokenKind::If => self.parse_conditional(),
            TokenKind::While => self.parse_while(),
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Let => self.parse_let(),
            TokenKind::Case => self.parse_case(),
            TokenKind::New => self.parse_new(),
            TokenKind::IsVoid => self.parse_unary(UnOp::IsVoid),
            TokenKind::Tilde => self.parse_unary(UnOp::Neg),
            TokenKind::Not => self.parse_unary(UnOp::Not),
            TokenKind::IntConst(_) => {
                let value = self.next().expect("just peeked").unwrap_string();
                Ok(Expr::new(ExprKind::Int(value), self.last_line))
            }
            TokenKind::StrConst(_) => {
                let value = self.next().expect("just peeked").unwrap_string();
                Ok(Expr::new(ExprKind::Str(value), self.last_line))
            }
            TokenKind::BoolConst(value) => {
                self.next();
                Ok(Expr::new(ExprKind::Bool(value), self.last_line))
            }
            TokenKind::LeftParen => self.parse_parentheses(),
            _ => Err(self.syntax_error(token)),
        }
    }

    // OBJECTID '<-' <expr>
    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        let name = self.next().expect("peeked object id").unwrap_string();
        consume!(self, TokenKind::Assign)?;
        let line = self.last_line;

        let expr = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::Assign { name, expr: Box::new(expr) },
            line,
        ))
    }

    // OBJECTID '(' <args> ')' is shorthand for self.OBJECTID(<args>)
    fn parse_self_dispatch(&mut self) -> Result<Expr, Error> {
        let method = self.next().expect("peeked object id").unwrap_string();
        let object = Expr::new(ExprKind::Identifier(names::SELF.to_string()), self.last_line);

        consume!(self, TokenKind::LeftParen)?;
        let line = self.last_line;
        let args = self.parse_dispatch_parameters()?;

        Ok(Expr::new(
            ExprKind::Dispatch {
                object: Box::new(object),
                method,
                args,
            },
            line,
        ))
    }

    // IF <expr> THEN <expr> ELSE <expr> FI
    fn parse_conditional(&mut self) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let predicate = self.parse_expression()?;
        consume!(self, TokenKind::Then)?;
        let then_branch = self.parse_expression()?;
        consume!(self, TokenKind::Else)?;
        let else_branch = self.parse_expression()?;
        consume!(self, TokenKind::Fi)?;

        Ok(Expr::new(
            ExprKind::If {
                predicate: Box::new(predicate),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            line,
        ))
    }

    // WHILE <expr> LOOP <expr> POOL
    fn parse_while(&mut self) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let predicate = self.parse_expression()?;
        consume!(self, TokenKind::Loop)?;
        let body = self.parse_expression()?;
        consume!(self, TokenKind::Pool)?;

        Ok(Expr::new(
            ExprKind::While {
                predicate: Box::new(predicate),
                body: Box::new(body),
            },
            line,
        ))
    }

    // '{' (<expr> ';')+ '}'
    fn parse_block(&mut self) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let mut exprs = Vec::new();
        // at least one expression is required
        loop {
            exprs.push(self.parse_expression()?);
            consume!(self, TokenKind::Semicolon)?;
            if match_next!(self, TokenKind::RightBrace).is_some() {
                break;
            }
        }

        Ok(Expr::new(ExprKind::Block { exprs }, line))
    }

    // LET OBJECTID ':' TYPEID ['<-' <expr>]
    //     (',' OBJECTID ':' TYPEID ['<-' <expr>])* IN <expr>
    fn parse_let(&mut self) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let mut initializers = Vec::new();
        loop {
            let name = consume!(self, TokenKind::ObjectId(_))?.unwrap_string();
            consume!(self, TokenKind::Colon)?;
            let declared_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();
            let init_line = self.last_line;

            let init = if match_next!(self, TokenKind::Assign).is_some() {
                self.parse_expression()?
            } else {
                self.no_expr(&declared_type)
            };

            initializers.push(LetInitializer {
                name,
                declared_type,
                init,
                line: init_line,
                checked_type: names::NO_TYPE.to_string(),
            });

            let token = self.tokens.peek()?;
            match token.kind {
                TokenKind::In => {
                    self.next();
                    break;
                }
                TokenKind::Comma => {
                    self.next();
                }
                _ => return Err(self.syntax_error(token)),
            }
        }

        let body = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::Let {
                initializers,
                body: Box::new(body),
            },
            line,
        ))
    }

    // CASE <expr> OF (OBJECTID ':' TYPEID '=>' <expr> ';')+ ESAC
    fn parse_case(&mut self) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let target = self.parse_expression()?;
        consume!(self, TokenKind::Of)?;

        let mut branches = Vec::new();
        // at least one branch is required
        loop {
            let name = consume!(self, TokenKind::ObjectId(_))?.unwrap_string();
            consume!(self, TokenKind::Colon)?;
            let declared_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();
            consume!(self, TokenKind::DArrow)?;
            let branch_line = self.last_line;

            let body = self.parse_expression()?;
            consume!(self, TokenKind::Semicolon)?;

            branches.push(CaseBranch {
                name,
                declared_type,
                body,
                line: branch_line,
            });

            if match_next!(self, TokenKind::Esac).is_some() {
                break;
            }
        }

        Ok(Expr::new(
            ExprKind::Case {
                target: Box::new(target),
                branches,
            },
            line,
        ))
    }

    // NEW TYPEID
    fn parse_new(&mut self) -> Result<Expr, Error> {
        self.next();
        let class = consume!(self, TokenKind::TypeId(_))?.unwrap_string();
        Ok(Expr::new(ExprKind::New { class }, self.last_line))
    }

    // the operand of a unary operator is a head expression; trailing
    // operators are still handled by post_expression of the outer call
    fn parse_unary(&mut self, op: UnOp) -> Result<Expr, Error> {
        self.next();
        let line = self.last_line;

        let expr = self.parse_single_expression()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
                parenthesized: false,
            },
            line,
        ))
    }

    // '(' <expr> ')'
    fn parse_parentheses(&mut self) -> Result<Expr, Error> {
        self.next();
        let mut expr = self.parse_expression()?;

        // operator sub-trees inside parentheses are atomic for the rotation
        expr.set_parenthesized();

        consume!(self, TokenKind::RightParen)?;
        Ok(expr)
    }

    // comma-separated expressions terminated by ')'; a trailing comma is an
    // error
    fn parse_dispatch_parameters(&mut self) -> Result<Vec<Expr>, Error> {
        let mut params = Vec::new();

        while !check!(self, TokenKind::RightParen) {
            params.push(self.parse_expression()?);

            if check!(self, TokenKind::RightParen) {
                break;
            }
            consume!(self, TokenKind::Comma)?;
            if check!(self, TokenKind::RightParen) {
                let token = self.tokens.peek()?;
                return Err(self.syntax_error(token));
            }
        }

        consume!(self, TokenKind::RightParen)?;
        Ok(params)
    }

    /// Absorbs binary operators and dispatches following a head expression
    fn post_expression(&mut self, mut expr: Expr) -> Result<Expr, Error> {
        loop {
            let Ok(token) = self.tokens.peek() else {
                return Ok(expr);
            };
            let token = token.clone();

            let op = match token.kind {
                TokenKind::Plus => Some(BinOp::Plus),
                TokenKind::Minus => Some(BinOp::Minus),
                TokenKind::Star => Some(BinOp::Mul),
                TokenKind::Slash => Some(BinOp::Div),
                TokenKind::Less => Some(BinOp::Lt),
                TokenKind::LessEqual => Some(BinOp::Leq),
                TokenKind::Equal => Some(BinOp::Eq),
                TokenKind::Dot => {
                    self.next();
                    let method = consume!(self, TokenKind::ObjectId(_))?.unwrap_string();
                    consume!(self, TokenKind::LeftParen)?;
                    let line = self.last_line;
                    let args = self.parse_dispatch_parameters()?;

                    expr = absorb_dispatch(expr, |object| {
                        Expr::new(
                            ExprKind::Dispatch { object: Box::new(object), method, args },
                            line,
                        )
                    });
                    continue;
                }
                TokenKind::At => {
                    self.next();
                    let static_type = consume!(self, TokenKind::TypeId(_))?.unwrap_string();
                    consume!(self, TokenKind::Dot)?;
                    let method = consume!(self, TokenKind::ObjectId(_))?.unwrap_string();
                    consume!(self, TokenKind::LeftParen)?;
                    let line = self.last_line;
                    let args = self.parse_dispatch_parameters()?;

                    expr = absorb_dispatch(expr, |object| {
                        Expr::new(
                            ExprKind::StaticDispatch {
                                object: Box::new(object),
                                static_type,
                                method,
                                args,
                            },
                            line,
                        )
                    });
                    continue;
                }
                _ => None,
            };

            let Some(op) = op else {
                return Ok(expr);
            };

            self.next();
            let line = self.last_line;
            let rhs = self.parse_single_expression()?;

            // chaining non-associative comparisons without parentheses is an
            // error, e.g. a = b = c
            if expr.is_nonassoc_binary()
                && !expr.is_parenthesized()
                && op.associativity() == Associativity::None
            {
                return Err(self.syntax_error(&token));
            }

            expr = insert_binary(expr, op, line, rhs);
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, line: u32) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            parenthesized: false,
        },
        line,
    )
}

/// Inserts a freshly parsed binary operator into the expression built so
/// far. If the current expression is an open operator sub-tree, the new
/// operator steals the right-most operand of the deepest ancestor it binds
/// tighter than; otherwise the whole expression becomes its left operand.
fn insert_binary(expr: Expr, op: BinOp, line: u32, rhs: Expr) -> Expr {
    if expr.is_operation() && !expr.is_parenthesized() {
        let mut expr = expr;
        match try_insert(&mut expr, op, line, rhs) {
            Ok(()) => expr,
            Err(rhs) => binary(op, expr, rhs, line),
        }
    } else {
        binary(op, expr, rhs, line)
    }
}

/// Walks to the deepest operator on the right spine and climbs back up
/// until the incoming operator binds strictly tighter; hands the right
/// operand back if no such ancestor exists
fn try_insert(node: &mut Expr, op: BinOp, line: u32, rhs: Expr) -> Result<(), Expr> {
    let rhs = {
        let last = node.last_operand_mut();
        if last.is_operation() && !last.is_parenthesized() {
            match try_insert(last, op, line, rhs) {
                Ok(()) => return Ok(()),
                Err(rhs) => rhs,
            }
        } else {
            rhs
        }
    };

    if op.precedence() < node.precedence() {
        let slot = node.last_operand_mut();
        let stolen = std::mem::replace(slot, Expr::new(ExprKind::Bool(false), line));
        *slot = binary(op, stolen, rhs, line);
        Ok(())
    } else {
        Err(rhs)
    }
}

/// Dispatch binds tighter than any binary operator: applied to an open
/// operator sub-tree it only wraps the right-most operand
fn absorb_dispatch(mut expr: Expr, make: impl FnOnce(Expr) -> Expr) -> Expr {
    if expr.is_operation() && !expr.is_parenthesized() {
        let slot = rightmost_operand_slot(&mut expr);
        let object = std::mem::replace(slot, Expr::new(ExprKind::Bool(false), 0));
        *slot = make(object);
        expr
    } else {
        make(expr)
    }
}

fn rightmost_operand_slot(node: &mut Expr) -> &mut Expr {
    let last = node.last_operand_mut();
    if last.is_operation() && !last.is_parenthesized() {
        rightmost_operand_slot(last)
    } else {
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::scanner::Scanner;

    fn setup(input: &str) -> Parser {
        Parser::new(Scanner::new(input).scan())
    }

    fn setup_expr(input: &str) -> Expr {
        setup(input).parse_expression().unwrap()
    }

    fn setup_expr_err(input: &str) -> Error {
        setup(input).parse_expression().unwrap_err()
    }

    fn int(value: &str) -> Expr {
        Expr::new(ExprKind::Int(value.to_string()), 1)
    }
    fn ident(name: &str) -> Expr {
        Expr::new(ExprKind::Identifier(name.to_string()), 1)
    }
    fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        binary(op, lhs, rhs, 1)
    }
    fn paren(mut expr: Expr) -> Expr {
        expr.set_parenthesized();
        expr
    }
    fn dispatch(object: Expr, method: &str, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Dispatch {
                object: Box::new(object),
                method: method.to_string(),
                args,
            },
            1,
        )
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let actual = setup_expr("1+2*3");
        let expected = bin(
            BinOp::Plus,
            int("1"),
            bin(BinOp::Mul, int("2"), int("3")),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn parentheses_override_precedence() {
        let actual = setup_expr("(1+2)*3");
        let expected = bin(
            BinOp::Mul,
            paren(bin(BinOp::Plus, int("1"), int("2"))),
            int("3"),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn additive_operators_are_left_associative() {
        let actual = setup_expr("1+2-3");
        let expected = bin(
            BinOp::Minus,
            bin(BinOp::Plus, int("1"), int("2")),
            int("3"),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn chained_comparison_is_rejected() {
        let err = setup_expr_err("a=b=c");
        assert_eq!(err.kind, ErrorKind::Syntax("'='".to_string()));

        setup("a<b=c").parse_expression().unwrap_err();
        setup("a<=b<c").parse_expression().unwrap_err();
    }

    #[test]
    fn parenthesized_comparison_can_be_compared_again() {
        let actual = setup_expr("(a=b)=c");
        let expected = bin(
            BinOp::Eq,
            paren(bin(BinOp::Eq, ident("a"), ident("b"))),
            ident("c"),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn dispatch_binds_tighter_than_operators() {
        let actual = setup_expr("a+b.f()");
        let expected = bin(
            BinOp::Plus,
            ident("a"),
            dispatch(ident("b"), "f", vec![]),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn dispatch_result_as_left_operand() {
        let actual = setup_expr("a.f() + b");
        let expected = bin(
            BinOp::Plus,
            dispatch(ident("a"), "f", vec![]),
            ident("b"),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn operator_insertion_after_absorbed_dispatch() {
        let actual = setup_expr("a + b.f() * c");
        let expected = bin(
            BinOp::Plus,
            ident("a"),
            bin(BinOp::Mul, dispatch(ident("b"), "f", vec![]), ident("c")),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn chained_dispatches() {
        let actual = setup_expr("a.f().g(1)");
        let expected = dispatch(dispatch(ident("a"), "f", vec![]), "g", vec![int("1")]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn not_binds_weaker_than_comparison() {
        let actual = setup_expr("not 1 < 2");
        let expected = Expr::new(
            ExprKind::Unary {
                op: UnOp::Not,
                expr: Box::new(bin(BinOp::Lt, int("1"), int("2"))),
                parenthesized: false,
            },
            1,
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn neg_binds_tighter_than_addition() {
        let actual = setup_expr("~a + b");
        let expected = bin(
            BinOp::Plus,
            Expr::new(
                ExprKind::Unary {
                    op: UnOp::Neg,
                    expr: Box::new(ident("a")),
                    parenthesized: false,
                },
                1,
            ),
            ident("b"),
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn neg_operand_absorbs_dispatch() {
        let actual = setup_expr("~a.f()");
        let expected = Expr::new(
            ExprKind::Unary {
                op: UnOp::Neg,
                expr: Box::new(dispatch(ident("a"), "f", vec![])),
                parenthesized: false,
            },
            1,
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn assignment_is_right_recursive() {
        let actual = setup_expr("x <- y <- z");
        let expected = Expr::new(
            ExprKind::Assign {
                name: "x".to_string(),
                expr: Box::new(Expr::new(
                    ExprKind::Assign {
                        name: "y".to_string(),
                        expr: Box::new(ident("z")),
                    },
                    1,
                )),
            },
            1,
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn self_dispatch_shorthand() {
        let actual = setup_expr("f(x, 1)");
        let expected = dispatch(ident("self"), "f", vec![ident("x"), int("1")]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn static_dispatch() {
        let actual = setup_expr("a@B.f(c)");
        let expected = Expr::new(
            ExprKind::StaticDispatch {
                object: Box::new(ident("a")),
                static_type: "B".to_string(),
                method: "f".to_string(),
                args: vec![ident("c")],
            },
            1,
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn trailing_comma_in_arguments_is_rejected() {
        let err = setup_expr_err("f(a,)");
        assert_eq!(err.kind, ErrorKind::Syntax("')'".to_string()));
    }

    #[test]
    fn let_with_multiple_initializers() {
        let actual = setup_expr("let x:Int <- 1, y:Int in x + y");
        match actual.kind {
            ExprKind::Let { initializers, body } => {
                assert_eq!(initializers.len(), 2);
                assert_eq!(initializers[0].name, "x");
                assert!(matches!(initializers[0].init.kind, ExprKind::Int(_)));
                assert_eq!(initializers[1].name, "y");
                assert!(matches!(initializers[1].init.kind, ExprKind::NoExpr { .. }));
                assert!(matches!(body.kind, ExprKind::Binary { op: BinOp::Plus, .. }));
            }
            kind => panic!("expected let, got {:?}", kind),
        }
    }

    #[test]
    fn case_with_branches() {
        let actual = setup_expr("case x of a:A => 1; b:B => 2; esac");
        match actual.kind {
            ExprKind::Case { target, branches } => {
                assert!(matches!(target.kind, ExprKind::Identifier(_)));
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].declared_type, "A");
                assert_eq!(branches[1].name, "b");
            }
            kind => panic!("expected case, got {:?}", kind),
        }
    }

    #[test]
    fn parses_minimal_program() {
        let program = setup("class Main { main():Int { 2+3 }; };").parse().unwrap();
        assert_eq!(program.classes.len(), 1);
        assert_eq!(program.classes[0].name, "Main");
        assert_eq!(program.classes[0].base_class, "Object");
        assert_eq!(program.classes[0].methods().count(), 1);
    }

    #[test]
    fn reports_syntax_error_with_token_display() {
        let err = setup("class main { };").parse().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax("OBJECTID = main".to_string()));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn reports_eof() {
        let err = setup("class Main").parse().unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxEof);
    }

    #[test]
    fn scan_error_token_is_syntax_error() {
        let err = setup("class Main { x:Int <- \"a\nb\"; };").parse().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Syntax(msg) if msg.starts_with("ERROR")));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recursive-descent parser (C4): turns the token stream from the lexer
//! (C2) into the arena-backed AST (C3).
//!
//! Expressions are parsed with a precedence-climbing ("Pratt") loop keyed
//! off [`Token::lbp`] rather than one grammar production per precedence
//! level. The arrow-function cover grammar (`(a, b)` vs `(a, b) => ...`)
//! and the `async` triple-ambiguity (identifier / `async function` /
//! `async (...) =>`) are both resolved by a lexer checkpoint: try the
//! more specific parse, and rewind on failure instead of reinterpreting
//! an already-built tree.

use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::lexer::Lexer;
use crate::token::{Span, Token};
use generational_arena::Arena;

#[derive(Debug, Clone, Copy)]
struct Ctx {
    strict: bool,
    in_loop: bool,
    in_switch: bool,
    in_function: bool,
    in_generator: bool,
    in_async: bool,
    in_module: bool,
    /// False inside the head of a classic `for (;;)`, where a bare `in`
    /// must not be parsed as the relational operator.
    allow_in: bool,
}

impl Ctx {
    fn top(is_module: bool) -> Self {
        Ctx {
            strict: is_module,
            in_loop: false,
            in_switch: false,
            in_function: false,
            in_generator: false,
            in_async: false,
            in_module: is_module,
            allow_in: true,
        }
    }

    fn with_allow_in(mut self, v: bool) -> Self {
        self.allow_in = v;
        self
    }

    fn for_function_body(self, kind: FunctionKind, extra_strict: bool) -> Self {
        Ctx {
            strict: self.strict || extra_strict,
            in_loop: false,
            in_switch: false,
            in_function: true,
            in_generator: matches!(kind, FunctionKind::Generator | FunctionKind::AsyncGenerator),
            in_async: matches!(kind, FunctionKind::Async | FunctionKind::AsyncGenerator),
            in_module: self.in_module,
            allow_in: true,
        }
    }
}

/// Result of a successful parse: the populated arena, the statement-level
/// span table, and the root [`Node::Program`] reference.
pub struct ParseOutput {
    pub arena: Arena<Node>,
    pub spans: Spans,
    pub program: NodeRef,
}

pub fn parse(source: &str, is_module: bool) -> Result<ParseOutput> {
    let mut parser = Parser::new(source)?;
    let program = parser.parse_program(is_module)?;
    Ok(ParseOutput {
        arena: parser.arena,
        spans: parser.spans,
        program,
    })
}

struct Parser<'a> {
    lex: Lexer<'a>,
    arena: Arena<Node>,
    spans: Spans,
    last_end: u32,
    /// Labels reachable from the statement currently being parsed. Reset
    /// only at function/method/arrow-body/static-block boundaries, since
    /// labels are function-scoped in JS, not block-scoped.
    labels: Vec<Box<str>>,
    exported_names: Vec<Box<str>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self> {
        let mut arena = Arena::new();
        // Guarantee Node::empty()'s hardcoded (0, 0) index is valid.
        let empty_ref = arena.insert(Node::Empty);
        debug_assert_eq!(empty_ref, Node::empty());
        let mut lex = Lexer::new(source);
        lex.next()?;
        Ok(Parser {
            lex,
            arena,
            spans: Spans::default(),
            last_end: 0,
            labels: Vec::new(),
            exported_names: Vec::new(),
        })
    }

    // --- low-level token plumbing ---

    fn bump(&mut self) -> Result<()> {
        self.last_end = self.lex.span().end;
        self.lex.next()
    }

    fn at(&self, t: Token) -> bool {
        self.lex.token == t
    }

    fn eat(&mut self, t: Token) -> Result<bool> {
        if self.at(t) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, t: Token) -> Result<()> {
        if self.at(t) {
            self.bump()
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", t, self.lex.token)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.lex.span())
    }

    fn cur_text(&self) -> &str {
        &self.lex.source[self.lex.span().as_range()]
    }

    /// ASI: a semicolon is consumed, implied before `}`/EOF, or implied
    /// after a line terminator; otherwise it's an error.
    fn consume_semi(&mut self) -> Result<()> {
        if self.eat(Token::Semi)? {
            return Ok(());
        }
        if self.at(Token::RBrace) || self.at(Token::Eof) || self.lex.has_newline_before {
            return Ok(());
        }
        Err(self.error("expected ';'"))
    }

    fn push(&mut self, node: Node) -> NodeRef {
        self.arena.insert(node)
    }

    fn push_span(&mut self, node: Node, span: Span) -> NodeRef {
        let r = self.push(node);
        self.spans.0.insert(r, span);
        r
    }

    /// Wraps a statement-level node with its source span, from `start` to
    /// the end of the token just consumed.
    fn stmt(&mut self, node: Node, start: u32) -> NodeRef {
        self.push_span(node, Span::new(start, self.last_end))
    }

    fn start(&self) -> u32 {
        self.lex.span().start
    }

    fn is_keyword_token(t: Token) -> bool {
        matches!(
            t,
            Token::KeywordAwait
                | Token::KeywordAsync
                | Token::KeywordBreak
                | Token::KeywordCase
                | Token::KeywordCatch
                | Token::KeywordClass
                | Token::KeywordContinue
                | Token::KeywordConst
                | Token::KeywordDebugger
                | Token::KeywordDefault
                | Token::KeywordDelete
                | Token::KeywordDo
                | Token::KeywordElse
                | Token::KeywordExport
                | Token::KeywordExtends
                | Token::KeywordFalse
                | Token::KeywordFinally
                | Token::KeywordFor
                | Token::KeywordFunction
                | Token::KeywordGet
                | Token::KeywordIf
                | Token::KeywordIn
                | Token::KeywordInstanceOf
                | Token::KeywordImport
                | Token::KeywordLet
                | Token::KeywordNew
                | Token::KeywordNull
                | Token::KeywordOf
                | Token::KeywordReturn
                | Token::KeywordSet
                | Token::KeywordStatic
                | Token::KeywordSuper
                | Token::KeywordSwitch
                | Token::KeywordThis
                | Token::KeywordThrow
                | Token::KeywordTrue
                | Token::KeywordTry
                | Token::KeywordTypeOf
                | Token::KeywordVar
                | Token::KeywordVoid
                | Token::KeywordWhile
                | Token::KeywordWith
                | Token::KeywordYield
        )
    }

    /// Any name usable after `.` or as an object-literal/class-member key:
    /// identifiers and keywords alike (`a.class`, `{ if: 1 }`).
    fn any_name(&mut self) -> Result<Box<str>> {
        if self.at(Token::Ident) || Self::is_keyword_token(self.lex.token) {
            let text = self.cur_text().to_string().into_boxed_str();
            self.bump()?;
            Ok(text)
        } else {
            Err(self.error("expected a name"))
        }
    }

    /// A binding identifier: plain identifiers plus the contextual
    /// keywords that are allowed as names depending on `ctx`.
    fn ident_name(&mut self, ctx: Ctx) -> Result<Box<str>> {
        let tok = self.lex.token;
        let is_ident_like = matches!(
            tok,
            Token::Ident
                | Token::KeywordAsync
                | Token::KeywordGet
                | Token::KeywordSet
                | Token::KeywordStatic
                | Token::KeywordOf
                | Token::KeywordLet
                | Token::KeywordYield
                | Token::KeywordAwait
        );
        if !is_ident_like {
            return Err(self.error(format!("expected identifier, found {:?}", tok)));
        }
        let text = self.cur_text().to_string();
        if ctx.strict
            && (tok == Token::KeywordYield
                || tok == Token::KeywordLet
                || crate::token::STRICT_RESERVED.contains(text.as_str()))
        {
            return Err(self.error(format!("'{text}' is a reserved identifier in strict mode")));
        }
        if ctx.in_generator && tok == Token::KeywordYield {
            return Err(self.error("'yield' is reserved inside generator bodies"));
        }
        if (ctx.in_async || ctx.in_module) && tok == Token::KeywordAwait {
            return Err(self.error("'await' is reserved inside async functions and modules"));
        }
        self.bump()?;
        Ok(text.into_boxed_str())
    }

    // --- program / statement lists ---

    fn parse_program(&mut self, is_module: bool) -> Result<NodeRef> {
        let ctx = Ctx::top(is_module);
        let (body, _strict) = self.parse_statement_list(ctx, Token::Eof)?;
        if !self.at(Token::Eof) {
            return Err(self.error("expected end of input"));
        }
        let exported_names = std::mem::take(&mut self.exported_names);
        Ok(self.push(Node::Program(Program {
            body: body.into_boxed_slice(),
            is_module,
            exported_names: exported_names.into_boxed_slice(),
        })))
    }

    /// Parses statements until `end` is reached, detecting a leading
    /// `"use strict"` directive prologue. Returns the effective strict
    /// mode for the body (ambient strictness or-ed with the directive).
    fn parse_statement_list(&mut self, mut ctx: Ctx, end: Token) -> Result<(Vec<NodeRef>, bool)> {
        let mut body = Vec::new();
        let mut in_prologue = true;
        while !self.at(end) && !self.at(Token::Eof) {
            if in_prologue {
                if let Some(directive) = self.peek_directive()? {
                    if directive == "use strict" {
                        ctx.strict = true;
                    }
                    let start = self.start();
                    let lit = self.push(Node::StringLit(directive.into()));
                    self.bump()?;
                    self.consume_semi()?;
                    body.push(self.stmt(Node::ExpressionStmt(lit), start));
                    continue;
                }
                in_prologue = false;
            }
            body.push(self.parse_statement(ctx)?);
        }
        Ok((body, ctx.strict))
    }

    /// If the upcoming statement is a bare string-literal expression
    /// statement (a directive candidate), returns its cooked value
    /// without consuming anything but the string token itself.
    fn peek_directive(&mut self) -> Result<Option<String>> {
        if !self.at(Token::String) {
            return Ok(None);
        }
        let cp = self.lex.checkpoint();
        let value = self.lex.string_value.to_string();
        let raw_ok = self.cur_text().len() == value.len() + 2; // no escapes
        self.bump()?;
        let terminates = self.at(Token::Semi)
            || self.at(Token::RBrace)
            || self.at(Token::Eof)
            || self.lex.has_newline_before;
        if terminates && raw_ok {
            Ok(Some(value))
        } else {
            self.lex.restore(cp);
            Ok(None)
        }
    }

    // --- statements ---

    fn parse_statement(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let start = self.start();
        match self.lex.token {
            Token::LBrace => self.parse_block_stmt(ctx),
            Token::KeywordVar | Token::KeywordLet | Token::KeywordConst => {
                self.parse_var_decl_stmt(ctx, start)
            }
            Token::KeywordFunction => self.parse_function_decl(ctx, false),
            Token::KeywordAsync if self.peek_async_function() => self.parse_function_decl(ctx, true),
            Token::KeywordClass => self.parse_class_decl(ctx, start),
            Token::KeywordIf => self.parse_if(ctx, start),
            Token::KeywordFor => self.parse_for(ctx, start),
            Token::KeywordWhile => self.parse_while(ctx, start),
            Token::KeywordDo => self.parse_do_while(ctx, start),
            Token::KeywordSwitch => self.parse_switch(ctx, start),
            Token::KeywordTry => self.parse_try(ctx, start),
            Token::KeywordWith => self.parse_with(ctx, start),
            Token::KeywordThrow => self.parse_throw(ctx, start),
            Token::KeywordReturn => self.parse_return(ctx, start),
            Token::KeywordBreak => self.parse_break(ctx, start),
            Token::KeywordContinue => self.parse_continue(ctx, start),
            Token::KeywordDebugger => {
                self.bump()?;
                self.consume_semi()?;
                Ok(self.stmt(Node::Debugger, start))
            }
            Token::KeywordImport if !self.peek_import_call_or_meta() => {
                self.parse_import_decl(ctx, start)
            }
            Token::KeywordExport => self.parse_export_decl(ctx, start),
            Token::Semi => {
                self.bump()?;
                Ok(self.stmt(Node::Block(Block { body: Box::new([]) }), start))
            }
            _ => self.parse_expr_or_label_statement(ctx, start),
        }
    }

    fn parse_block_stmt(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let start = self.start();
        let body = self.parse_block_body(ctx)?;
        Ok(self.stmt(Node::Block(Block { body: body.into_boxed_slice() }), start))
    }

    /// Parses `{ stmt* }`, leaving label-scope management to the caller
    /// (plain blocks don't reset it; function bodies do).
    fn parse_block_body(&mut self, ctx: Ctx) -> Result<Vec<NodeRef>> {
        self.expect(Token::LBrace)?;
        let (body, _) = self.parse_statement_list(ctx, Token::RBrace)?;
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn parse_var_decl_stmt(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        let decl = self.parse_var_decl(ctx)?;
        self.consume_semi()?;
        Ok(self.stmt(decl, start))
    }

    /// Parses the `var`/`let`/`const` declarators themselves, without the
    /// trailing semicolon or span wrapping, so `for` heads can reuse it.
    fn parse_var_decl(&mut self, ctx: Ctx) -> Result<Node> {
        let kind = match self.lex.token {
            Token::KeywordVar => VarKind::Var,
            Token::KeywordLet => VarKind::Let,
            Token::KeywordConst => VarKind::Const,
            _ => return Err(self.error("expected a variable declaration")),
        };
        self.bump()?;
        let declarators = self.parse_var_declarators(ctx)?;
        Ok(Node::VarDecl(VarDecl { kind, declarators: declarators.into_boxed_slice() }))
    }

    fn parse_var_declarators(&mut self, ctx: Ctx) -> Result<Vec<VarDeclarator>> {
        let mut out = Vec::new();
        loop {
            let binding = self.parse_binding_target(ctx)?;
            let init = if self.eat(Token::Equal)? {
                self.parse_assignment(ctx)?
            } else {
                Node::empty()
            };
            out.push(VarDeclarator { binding, init });
            if !self.eat(Token::Comma)? {
                break;
            }
        }
        Ok(out)
    }

    fn parse_if(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        self.expect(Token::LParen)?;
        let test = self.parse_expression(ctx.with_allow_in(true))?;
        self.expect(Token::RParen)?;
        let consequent = self.parse_statement(ctx)?;
        let alternate = if self.eat(Token::KeywordElse)? {
            self.parse_statement(ctx)?
        } else {
            Node::empty()
        };
        Ok(self.stmt(Node::If(If { test, consequent, alternate }), start))
    }

    fn parse_while(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        self.expect(Token::LParen)?;
        let test = self.parse_expression(ctx.with_allow_in(true))?;
        self.expect(Token::RParen)?;
        let body_ctx = Ctx { in_loop: true, ..ctx };
        let body = self.parse_statement(body_ctx)?;
        Ok(self.stmt(Node::While(While { test, body }), start))
    }

    fn parse_do_while(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        let body_ctx = Ctx { in_loop: true, ..ctx };
        let body = self.parse_statement(body_ctx)?;
        self.expect(Token::KeywordWhile)?;
        self.expect(Token::LParen)?;
        let test = self.parse_expression(ctx.with_allow_in(true))?;
        self.expect(Token::RParen)?;
        // ASI after `do ... while (test)` never requires a line terminator.
        self.eat(Token::Semi)?;
        Ok(self.stmt(Node::DoWhile(While { test, body }), start))
    }

    fn parse_switch(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        self.expect(Token::LParen)?;
        let discriminant = self.parse_expression(ctx.with_allow_in(true))?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let body_ctx = Ctx { in_switch: true, ..ctx };
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.at(Token::RBrace) {
            let test = if self.eat(Token::KeywordCase)? {
                let t = self.parse_expression(body_ctx.with_allow_in(true))?;
                self.expect(Token::Colon)?;
                t
            } else {
                self.expect(Token::KeywordDefault)?;
                self.expect(Token::Colon)?;
                if seen_default {
                    return Err(self.error("a switch may only have one default clause"));
                }
                seen_default = true;
                Node::empty()
            };
            let mut body = Vec::new();
            while !self.at(Token::RBrace)
                && !self.at(Token::KeywordCase)
                && !self.at(Token::KeywordDefault)
            {
                body.push(self.parse_statement(body_ctx)?);
            }
            cases.push(SwitchCase { test, body: body.into_boxed_slice() });
        }
        self.expect(Token::RBrace)?;
        Ok(self.stmt(Node::Switch(Switch { discriminant, cases: cases.into_boxed_slice() }), start))
    }

    fn parse_try(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        let block = self.parse_block_body(ctx)?.into_boxed_slice();
        let handler = if self.eat(Token::KeywordCatch)? {
            let cstart = self.last_end;
            let param = if self.eat(Token::LParen)? {
                let p = self.parse_binding_target(ctx)?;
                self.expect(Token::RParen)?;
                p
            } else {
                Node::empty()
            };
            let cbody = self.parse_block_body(ctx)?.into_boxed_slice();
            self.stmt(Node::Catch(Catch { param, body: cbody }), cstart)
        } else {
            Node::empty()
        };
        let finalizer = if self.eat(Token::KeywordFinally)? {
            Some(self.parse_block_body(ctx)?.into_boxed_slice())
        } else {
            None
        };
        if Node::is_empty_ref(handler) && finalizer.is_none() {
            return Err(self.error("missing catch or finally after try block"));
        }
        Ok(self.stmt(Node::Try(Try { block, handler, finalizer }), start))
    }

    fn parse_with(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        if ctx.strict {
            return Err(self.error("'with' statements are not allowed in strict mode"));
        }
        self.bump()?;
        self.expect(Token::LParen)?;
        let object = self.parse_expression(ctx.with_allow_in(true))?;
        self.expect(Token::RParen)?;
        let body = self.parse_statement(ctx)?;
        Ok(self.stmt(Node::With(BinaryOp { lhs: object, rhs: body }), start))
    }

    fn parse_throw(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        if self.lex.has_newline_before {
            return Err(self.error("illegal newline after 'throw'"));
        }
        let arg = self.parse_expression(ctx.with_allow_in(true))?;
        self.consume_semi()?;
        Ok(self.stmt(Node::Throw(arg), start))
    }

    fn parse_return(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        if !ctx.in_function {
            return Err(self.error("'return' outside of a function"));
        }
        self.bump()?;
        let arg = if self.at(Token::Semi)
            || self.at(Token::RBrace)
            || self.at(Token::Eof)
            || self.lex.has_newline_before
        {
            Node::empty()
        } else {
            self.parse_expression(ctx.with_allow_in(true))?
        };
        self.consume_semi()?;
        Ok(self.stmt(Node::Return(arg), start))
    }

    fn parse_break(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        let label = self.parse_optional_label()?;
        if label.is_none() && !ctx.in_loop && !ctx.in_switch {
            return Err(self.error("illegal break statement"));
        }
        self.consume_semi()?;
        Ok(self.stmt(Node::Break(label), start))
    }

    fn parse_continue(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        let label = self.parse_optional_label()?;
        if !ctx.in_loop {
            return Err(self.error("illegal continue statement"));
        }
        self.consume_semi()?;
        Ok(self.stmt(Node::Continue(label), start))
    }

    fn parse_optional_label(&mut self) -> Result<Option<Box<str>>> {
        if self.lex.has_newline_before || !self.at(Token::Ident) {
            return Ok(None);
        }
        let name = self.cur_text().to_string().into_boxed_str();
        if !self.labels.iter().any(|l| **l == *name) {
            return Err(self.error(format!("undefined label '{name}'")));
        }
        self.bump()?;
        Ok(Some(name))
    }

    fn parse_for(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        self.bump()?;
        let is_await = self.eat(Token::KeywordAwait)?;
        if is_await && !ctx.in_async {
            return Err(self.error("'for await' is only valid inside async functions"));
        }
        self.expect(Token::LParen)?;
        let body_ctx = Ctx { in_loop: true, ..ctx };

        if self.at(Token::Semi) {
            return self.finish_for_classic(ctx, body_ctx, start, Node::empty());
        }

        if matches!(self.lex.token, Token::KeywordVar | Token::KeywordLet | Token::KeywordConst) {
            let decl_start = self.start();
            let kind = match self.lex.token {
                Token::KeywordVar => VarKind::Var,
                Token::KeywordLet => VarKind::Let,
                _ => VarKind::Const,
            };
            self.bump()?;
            let binding = self.parse_binding_target(ctx.with_allow_in(false))?;
            if matches!(self.lex.token, Token::KeywordIn | Token::KeywordOf) {
                let is_of = self.at(Token::KeywordOf);
                self.bump()?;
                let decl = self.push_span(
                    Node::VarDecl(VarDecl {
                        kind,
                        declarators: Box::new([VarDeclarator { binding, init: Node::empty() }]),
                    }),
                    Span::new(decl_start, self.last_end),
                );
                return self.finish_for_in_of(ctx, body_ctx, start, decl, is_of, is_await);
            }
            let init = if self.eat(Token::Equal)? {
                self.parse_assignment(ctx.with_allow_in(false))?
            } else {
                Node::empty()
            };
            let mut declarators = vec![VarDeclarator { binding, init }];
            while self.eat(Token::Comma)? {
                let b = self.parse_binding_target(ctx.with_allow_in(false))?;
                let i = if self.eat(Token::Equal)? {
                    self.parse_assignment(ctx.with_allow_in(false))?
                } else {
                    Node::empty()
                };
                declarators.push(VarDeclarator { binding: b, init: i });
            }
            let decl = self.push(Node::VarDecl(VarDecl { kind, declarators: declarators.into_boxed_slice() }));
            self.expect(Token::Semi)?;
            return self.finish_for_classic(ctx, body_ctx, start, decl);
        }

        let expr = self.parse_expression(ctx.with_allow_in(false))?;
        if matches!(self.lex.token, Token::KeywordIn | Token::KeywordOf) {
            let is_of = self.at(Token::KeywordOf);
            self.bump()?;
            return self.finish_for_in_of(ctx, body_ctx, start, expr, is_of, is_await);
        }
        self.expect(Token::Semi)?;
        let init = self.push(Node::ExpressionStmt(expr));
        self.finish_for_classic(ctx, body_ctx, start, init)
    }

    fn finish_for_classic(&mut self, ctx: Ctx, body_ctx: Ctx, start: u32, init: NodeRef) -> Result<NodeRef> {
        // `init` may have been wrapped as an ExpressionStmt above; the
        // `for` head wants the bare expression, not the statement node.
        let init = match self.arena.get(init) {
            Some(Node::ExpressionStmt(e)) => *e,
            _ => init,
        };
        let test = if self.at(Token::Semi) {
            Node::empty()
        } else {
            self.parse_expression(ctx.with_allow_in(true))?
        };
        self.expect(Token::Semi)?;
        let update = if self.at(Token::RParen) {
            Node::empty()
        } else {
            self.parse_expression(ctx.with_allow_in(true))?
        };
        self.expect(Token::RParen)?;
        let body = self.parse_statement(body_ctx)?;
        Ok(self.stmt(Node::ForClassic(ForClassic { init, test, update, body }), start))
    }

    fn finish_for_in_of(
        &mut self,
        ctx: Ctx,
        body_ctx: Ctx,
        start: u32,
        left: NodeRef,
        is_of: bool,
        is_await: bool,
    ) -> Result<NodeRef> {
        let right = if is_of {
            self.parse_assignment(ctx.with_allow_in(true))?
        } else {
            self.parse_expression(ctx.with_allow_in(true))?
        };
        self.expect(Token::RParen)?;
        let body = self.parse_statement(body_ctx)?;
        let data = ForInOf { left, right, body, is_await };
        let node = if is_of { Node::ForOf(data) } else { Node::ForIn(data) };
        Ok(self.stmt(node, start))
    }

    /// Disambiguates `label: stmt` from an expression statement that
    /// happens to start with an identifier followed by `:`.
    fn parse_expr_or_label_statement(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        if self.at(Token::Ident) {
            let cp = self.lex.checkpoint();
            let name = self.cur_text().to_string();
            self.bump()?;
            if self.eat(Token::Colon)? {
                if self.labels.iter().any(|l| **l == *name) {
                    return Err(self.error(format!("label '{name}' is already in use")));
                }
                let label: Box<str> = name.into_boxed_str();
                self.labels.push(label.clone());
                let body = self.parse_statement(ctx)?;
                self.labels.pop();
                return Ok(self.stmt(Node::Labeled(Labeled { label, body }), start));
            }
            self.lex.restore(cp);
        }
        let expr = self.parse_expression(ctx.with_allow_in(true))?;
        self.consume_semi()?;
        Ok(self.stmt(Node::ExpressionStmt(expr), start))
    }

    // --- functions ---

    fn peek_async_function(&mut self) -> bool {
        let cp = self.lex.checkpoint();
        let mut ok = false;
        if self.bump().is_ok() && self.at(Token::KeywordFunction) && !self.lex.has_newline_before {
            ok = true;
        }
        self.lex.restore(cp);
        ok
    }

    fn peek_import_call_or_meta(&mut self) -> bool {
        let cp = self.lex.checkpoint();
        let mut ok = false;
        if self.bump().is_ok() && matches!(self.lex.token, Token::LParen | Token::Dot) {
            ok = true;
        }
        self.lex.restore(cp);
        ok
    }

    fn parse_function_decl(&mut self, ctx: Ctx, is_async: bool) -> Result<NodeRef> {
        let start = self.start();
        if is_async {
            self.bump()?; // 'async'
        }
        self.bump()?; // 'function'
        let is_generator = self.eat(Token::Mul)?;
        let kind = match (is_async, is_generator) {
            (true, true) => FunctionKind::AsyncGenerator,
            (true, false) => FunctionKind::Async,
            (false, true) => FunctionKind::Generator,
            (false, false) => FunctionKind::Normal,
        };
        let name = self.ident_name(ctx)?;
        let name_ref = self.push(Node::Ident(name));
        let params = self.parse_function_like(ctx, kind, name_ref)?;
        Ok(self.stmt(Node::FunctionDecl(params), start))
    }

    /// Shared by function declarations/expressions and object/class
    /// methods once the name and `function`/`*`/`async` tokens are
    /// already consumed: parses `(params) { body }`.
    fn parse_function_like(&mut self, ctx: Ctx, kind: FunctionKind, name: NodeRef) -> Result<Params> {
        self.expect(Token::LParen)?;
        let params = self.parse_formal_params(ctx)?;
        self.expect(Token::RParen)?;
        let saved_labels = std::mem::take(&mut self.labels);
        let body_ctx = ctx.for_function_body(kind, false);
        self.expect(Token::LBrace)?;
        let (body, strict) = self.parse_statement_list(body_ctx, Token::RBrace)?;
        self.expect(Token::RBrace)?;
        self.labels = saved_labels;
        Ok(Params {
            name,
            params: params.into_boxed_slice(),
            body: body.into_boxed_slice(),
            kind,
            is_expression_body: false,
            is_strict: strict,
        })
    }

    fn parse_formal_params(&mut self, ctx: Ctx) -> Result<Vec<NodeRef>> {
        let mut params = Vec::new();
        while !self.at(Token::RParen) {
            if self.eat(Token::Spread)? {
                let target = self.parse_binding_target(ctx)?;
                params.push(self.push(Node::RestElement(target)));
                break;
            }
            let target = self.parse_binding_target(ctx)?;
            let param = if self.eat(Token::Equal)? {
                let default = self.parse_assignment(ctx)?;
                self.push(Node::PatternDefault(PatternDefault { target, default }))
            } else {
                target
            };
            params.push(param);
            if !self.eat(Token::Comma)? {
                break;
            }
        }
        Ok(params)
    }

    // --- binding patterns ---

    fn parse_binding_target(&mut self, ctx: Ctx) -> Result<NodeRef> {
        match self.lex.token {
            Token::LBrack => self.parse_array_pattern(ctx),
            Token::LBrace => self.parse_object_pattern(ctx),
            _ => {
                let name = self.ident_name(ctx)?;
                Ok(self.push(Node::Ident(name)))
            }
        }
    }

    fn parse_array_pattern(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.expect(Token::LBrack)?;
        let mut elements = Vec::new();
        while !self.at(Token::RBrack) {
            if self.at(Token::Comma) {
                elements.push(Node::empty());
                self.bump()?;
                continue;
            }
            if self.eat(Token::Spread)? {
                let target = self.parse_binding_target(ctx)?;
                elements.push(self.push(Node::RestElement(target)));
                break;
            }
            let target = self.parse_binding_target(ctx)?;
            let elem = if self.eat(Token::Equal)? {
                let default = self.parse_assignment(ctx)?;
                self.push(Node::PatternDefault(PatternDefault { target, default }))
            } else {
                target
            };
            elements.push(elem);
            if !self.at(Token::RBrack) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RBrack)?;
        Ok(self.push(Node::ArrayPattern(ArrayPattern { elements: elements.into_boxed_slice() })))
    }

    fn parse_object_pattern(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.expect(Token::LBrace)?;
        let mut props = Vec::new();
        let mut rest = Node::empty();
        while !self.at(Token::RBrace) {
            if self.eat(Token::Spread)? {
                rest = self.parse_binding_target(ctx)?;
                break;
            }
            let (key, computed) = self.parse_property_key(ctx)?;
            let (value, shorthand) = if self.eat(Token::Colon)? {
                (self.parse_binding_target(ctx)?, false)
            } else {
                let name = match self.arena.get(key) {
                    Some(Node::StringLit(s)) => s.clone(),
                    _ => return Err(self.error("invalid shorthand property in pattern")),
                };
                (self.push(Node::Ident(name)), true)
            };
            let value = if self.eat(Token::Equal)? {
                let default = self.parse_assignment(ctx)?;
                self.push(Node::PatternDefault(PatternDefault { target: value, default }))
            } else {
                value
            };
            props.push(ObjectPatternProp { key, value, computed, shorthand });
            if !self.at(Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(self.push(Node::ObjectPattern(ObjectPattern { props: props.into_boxed_slice(), rest })))
    }

    /// A property key in either a pattern or an object/class literal:
    /// `name`, `"string"`, `123`, or `[computed]`. Returns the key node
    /// (a `StringLit` for names, any expression when computed) plus
    /// whether it was computed.
    fn parse_property_key(&mut self, ctx: Ctx) -> Result<(NodeRef, bool)> {
        match self.lex.token {
            Token::LBrack => {
                self.bump()?;
                let expr = self.parse_assignment(ctx.with_allow_in(true))?;
                self.expect(Token::RBrack)?;
                Ok((expr, true))
            }
            Token::String => {
                let s = self.lex.string_value.to_string().into_boxed_str();
                self.bump()?;
                Ok((self.push(Node::StringLit(s)), false))
            }
            Token::Number => {
                let n = self.lex.number_value;
                self.bump()?;
                Ok((self.push(Node::StringLit(number_to_key(n))), false))
            }
            Token::PrivateName => {
                let name = self.cur_text().trim_start_matches('#').to_string().into_boxed_str();
                self.bump()?;
                Ok((self.push(Node::PrivateName(name)), false))
            }
            _ => {
                let name = self.any_name()?;
                Ok((self.push(Node::StringLit(name)), false))
            }
        }
    }

    // --- classes ---

    fn parse_class_decl(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        let class = self.parse_class(ctx)?;
        Ok(self.stmt(Node::ClassDecl(class), start))
    }

    fn parse_class(&mut self, ctx: Ctx) -> Result<Class> {
        self.expect(Token::KeywordClass)?;
        let class_ctx = Ctx { strict: true, ..ctx };
        let name = if self.at(Token::Ident) {
            let n = self.ident_name(class_ctx)?;
            self.push(Node::Ident(n))
        } else {
            Node::empty()
        };
        let superclass = if self.eat(Token::KeywordExtends)? {
            self.parse_lhs_expr(class_ctx)?
        } else {
            Node::empty()
        };
        self.parse_class_body(class_ctx, name, superclass)
    }

    fn parse_class_body(&mut self, ctx: Ctx, name: NodeRef, superclass: NodeRef) -> Result<Class> {
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        let mut static_blocks = Vec::new();
        while !self.at(Token::RBrace) {
            if self.eat(Token::Semi)? {
                continue;
            }
            if self.at(Token::KeywordStatic) {
                let cp = self.lex.checkpoint();
                self.bump()?;
                if self.at(Token::LBrace) {
                    let saved_labels = std::mem::take(&mut self.labels);
                    let body = self.parse_block_body(ctx.for_function_body(FunctionKind::Normal, true))?;
                    self.labels = saved_labels;
                    static_blocks.push(body.into_boxed_slice());
                    continue;
                }
                self.lex.restore(cp);
            }
            members.push(self.parse_class_member(ctx)?);
        }
        self.expect(Token::RBrace)?;
        Ok(Class {
            name,
            superclass,
            members: members.into_boxed_slice(),
            static_blocks: static_blocks.into_boxed_slice(),
        })
    }

    fn parse_class_member(&mut self, ctx: Ctx) -> Result<ClassMember> {
        let is_static = self.eat_modifier(Token::KeywordStatic)?;

        let mut kind = PropKind::Method;
        let mut is_async = false;
        let mut is_generator = false;

        if self.eat_modifier(Token::KeywordAsync)? {
            is_async = true;
        }
        if self.eat(Token::Mul)? {
            is_generator = true;
        }
        if !is_async && !is_generator {
            if self.eat_modifier(Token::KeywordGet)? {
                kind = PropKind::Get;
            } else if self.eat_modifier(Token::KeywordSet)? {
                kind = PropKind::Set;
            }
        }

        let (key, computed) = self.parse_property_key(ctx)?;

        if self.at(Token::LParen) {
            let fn_kind = match (is_async, is_generator) {
                (true, true) => FunctionKind::AsyncGenerator,
                (true, false) => FunctionKind::Async,
                (false, true) => FunctionKind::Generator,
                (false, false) => FunctionKind::Normal,
            };
            let params = self.parse_function_like(ctx, fn_kind, Node::empty())?;
            let value = self.push(Node::Function(params));
            return Ok(ClassMember { key, value, kind, is_static, computed, is_field: false });
        }

        // Field declaration, with or without an initializer.
        let value = if self.eat(Token::Equal)? {
            self.parse_assignment(ctx)?
        } else {
            Node::empty()
        };
        self.consume_semi()?;
        Ok(ClassMember { key, value, kind: PropKind::Init, is_static, computed, is_field: true })
    }

    /// Consumes a class-member modifier keyword only if it isn't actually
    /// the member's own name (`static() {}`, `static = 1;`, `class C { static }`).
    fn eat_modifier(&mut self, t: Token) -> Result<bool> {
        if !self.at(t) {
            return Ok(false);
        }
        let cp = self.lex.checkpoint();
        self.bump()?;
        if matches!(self.lex.token, Token::LParen | Token::Equal | Token::Semi | Token::RBrace) {
            self.lex.restore(cp);
            return Ok(false);
        }
        Ok(true)
    }

    // --- object/array literals ---

    fn parse_array_literal(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.expect(Token::LBrack)?;
        let ctx = ctx.with_allow_in(true);
        let mut elements = Vec::new();
        while !self.at(Token::RBrack) {
            if self.at(Token::Comma) {
                elements.push(Node::empty());
                self.bump()?;
                continue;
            }
            if self.eat(Token::Spread)? {
                let e = self.parse_assignment(ctx)?;
                elements.push(self.push(Node::Spread(e)));
            } else {
                elements.push(self.parse_assignment(ctx)?);
            }
            if !self.at(Token::RBrack) && !self.eat(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RBrack)?;
        Ok(self.push(Node::Array(Array { elements: elements.into_boxed_slice() })))
    }

    fn parse_object_literal(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.expect(Token::LBrace)?;
        let ctx = ctx.with_allow_in(true);
        let mut props = Vec::new();
        while !self.at(Token::RBrace) {
            if self.eat(Token::Spread)? {
                let e = self.parse_assignment(ctx)?;
                props.push(self.push(Node::Spread(e)));
            } else {
                props.push(self.parse_object_member(ctx)?);
            }
            if !self.at(Token::RBrace) && !self.eat(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(self.push(Node::ObjectLit(ObjectLit { props: props.into_boxed_slice() })))
    }

    fn parse_object_member(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let mut is_async = false;
        let mut is_generator = false;
        let mut kind = PropKind::Init;

        if self.at(Token::KeywordAsync) {
            let cp = self.lex.checkpoint();
            self.bump()?;
            if !self.lex.has_newline_before
                && !matches!(
                    self.lex.token,
                    Token::Colon | Token::LParen | Token::Comma | Token::RBrace | Token::Equal
                )
            {
                is_async = true;
            } else {
                self.lex.restore(cp);
            }
        }
        if self.eat(Token::Mul)? {
            is_generator = true;
        }
        if !is_async && !is_generator && matches!(self.lex.token, Token::KeywordGet | Token::KeywordSet) {
            let cp = self.lex.checkpoint();
            let want_get = self.at(Token::KeywordGet);
            self.bump()?;
            if matches!(
                self.lex.token,
                Token::Colon | Token::LParen | Token::Comma | Token::RBrace | Token::Equal
            ) {
                self.lex.restore(cp);
            } else {
                kind = if want_get { PropKind::Get } else { PropKind::Set };
            }
        }

        let (key, computed) = self.parse_property_key(ctx)?;

        if self.at(Token::LParen) || is_async || is_generator || kind != PropKind::Init {
            let fn_kind = match (is_async, is_generator) {
                (true, true) => FunctionKind::AsyncGenerator,
                (true, false) => FunctionKind::Async,
                (false, true) => FunctionKind::Generator,
                (false, false) => FunctionKind::Normal,
            };
            let params = self.parse_function_like(ctx, fn_kind, Node::empty())?;
            let value = self.push(Node::Function(params));
            return Ok(self.push(Node::Property(Property {
                key,
                value,
                kind,
                computed,
                shorthand: false,
                method: true,
            })));
        }

        if self.eat(Token::Colon)? {
            let value = self.parse_assignment(ctx)?;
            return Ok(self.push(Node::Property(Property {
                key,
                value,
                kind: PropKind::Init,
                computed,
                shorthand: false,
                method: false,
            })));
        }

        // Shorthand `{ foo }` or `{ foo = default }` (the latter only
        // legal when this literal is later reinterpreted as a pattern).
        let name = match self.arena.get(key) {
            Some(Node::StringLit(s)) => s.clone(),
            _ => return Err(self.error("invalid shorthand property")),
        };
        let ident = self.push(Node::Ident(name));
        let value = if self.eat(Token::Equal)? {
            let default = self.parse_assignment(ctx)?;
            self.push(Node::PatternDefault(PatternDefault { target: ident, default }))
        } else {
            ident
        };
        Ok(self.push(Node::Property(Property {
            key,
            value,
            kind: PropKind::Init,
            computed,
            shorthand: true,
            method: false,
        })))
    }

    // --- expressions ---

    fn parse_expression(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let first = self.parse_assignment(ctx)?;
        if !self.at(Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(Token::Comma)? {
            exprs.push(self.parse_assignment(ctx)?);
        }
        Ok(self.push(Node::Sequence(exprs.into_boxed_slice())))
    }

    fn parse_assignment(&mut self, ctx: Ctx) -> Result<NodeRef> {
        if ctx.in_generator && self.at(Token::KeywordYield) {
            return self.parse_yield(ctx);
        }

        if let Some(arrow) = self.try_parse_arrow(ctx)? {
            return Ok(arrow);
        }

        let lhs = self.parse_conditional(ctx)?;

        let tok = self.lex.token;
        if tok.is_assignment_op() || tok.is_logical_assignment_op() {
            let op = assign_op_of(tok);
            self.bump()?;
            let rhs = self.parse_assignment(ctx)?;
            return Ok(self.push(Node::Assignment { op, data: BinaryOp { lhs, rhs } }));
        }
        Ok(lhs)
    }

    fn parse_yield(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.bump()?; // 'yield'
        let delegate = !self.lex.has_newline_before && self.eat(Token::Mul)?;
        let can_have_arg = !self.lex.has_newline_before
            && !matches!(
                self.lex.token,
                Token::Semi
                    | Token::RBrace
                    | Token::RBrack
                    | Token::RParen
                    | Token::Colon
                    | Token::Comma
                    | Token::Eof
            );
        let argument = if delegate || can_have_arg {
            self.parse_assignment(ctx)?
        } else {
            Node::empty()
        };
        Ok(self.push(Node::Yield { argument, delegate }))
    }

    /// Tries the arrow-function cover grammar: a single bare identifier
    /// followed by `=>`, a parenthesized parameter list followed by
    /// `=>`, or either of those prefixed by `async`. Returns `None` (and
    /// rewinds) when the lookahead doesn't pan out, leaving the normal
    /// expression grammar to parse whatever it actually was.
    fn try_parse_arrow(&mut self, ctx: Ctx) -> Result<Option<NodeRef>> {
        let outer_cp = self.lex.checkpoint();

        let mut is_async = false;
        if self.at(Token::KeywordAsync) {
            self.bump()?;
            if self.lex.has_newline_before {
                self.lex.restore(outer_cp);
                return Ok(None);
            }
            is_async = true;
        }

        if matches!(
            self.lex.token,
            Token::Ident | Token::KeywordYield | Token::KeywordAwait | Token::KeywordOf | Token::KeywordLet
        ) {
            let cp = self.lex.checkpoint();
            let name = self.cur_text().to_string().into_boxed_str();
            self.bump()?;
            if self.at(Token::Arrow) && !self.lex.has_newline_before {
                self.bump()?;
                let param = self.push(Node::Ident(name));
                let arrow = self.parse_arrow_body(ctx, is_async, vec![param])?;
                return Ok(Some(arrow));
            }
            self.lex.restore(cp);
            if is_async {
                self.lex.restore(outer_cp);
            }
            return Ok(None);
        }

        if self.at(Token::LParen) {
            self.bump()?;
            let params = match self.parse_formal_params(ctx) {
                Ok(p) => p,
                Err(_) => {
                    self.lex.restore(outer_cp);
                    return Ok(None);
                }
            };
            if !self.at(Token::RParen) {
                self.lex.restore(outer_cp);
                return Ok(None);
            }
            self.bump()?;
            if !self.at(Token::Arrow) || self.lex.has_newline_before {
                self.lex.restore(outer_cp);
                return Ok(None);
            }
            self.bump()?;
            let arrow = self.parse_arrow_body(ctx, is_async, params)?;
            return Ok(Some(arrow));
        }

        self.lex.restore(outer_cp);
        Ok(None)
    }

    fn parse_arrow_body(&mut self, ctx: Ctx, is_async: bool, params: Vec<NodeRef>) -> Result<NodeRef> {
        let kind = if is_async { FunctionKind::Async } else { FunctionKind::Normal };
        let saved_labels = std::mem::take(&mut self.labels);
        let (body, is_expression_body, is_strict) = if self.at(Token::LBrace) {
            let body_ctx = ctx.for_function_body(kind, false);
            self.expect(Token::LBrace)?;
            let (body, strict) = self.parse_statement_list(body_ctx, Token::RBrace)?;
            self.expect(Token::RBrace)?;
            (body, false, strict)
        } else {
            let body_ctx = ctx.for_function_body(kind, false);
            let expr = self.parse_assignment(body_ctx)?;
            (vec![expr], true, ctx.strict)
        };
        self.labels = saved_labels;
        Ok(self.push(Node::Arrow(Params {
            name: Node::empty(),
            params: params.into_boxed_slice(),
            body: body.into_boxed_slice(),
            kind,
            is_expression_body,
            is_strict,
        })))
    }

    fn parse_conditional(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let test = self.parse_binary(ctx, 0)?;
        if self.eat(Token::Question)? {
            let consequent = self.parse_assignment(ctx.with_allow_in(true))?;
            self.expect(Token::Colon)?;
            let alternate = self.parse_assignment(ctx)?;
            return Ok(self.push(Node::Conditional(Ternary { test, consequent, alternate })));
        }
        Ok(test)
    }

    /// Precedence-climbing loop over binary and logical operators,
    /// stopping once the next operator's binding power drops below
    /// `min_bp`. Right-associative operators (currently only `**`)
    /// recurse at the same `bp` instead of `bp + 1`.
    fn parse_binary(&mut self, ctx: Ctx, min_bp: u8) -> Result<NodeRef> {
        let mut lhs = self.parse_unary(ctx)?;
        loop {
            let tok = self.lex.token;
            if tok == Token::KeywordIn && !ctx.allow_in {
                break;
            }
            let is_logical = matches!(tok, Token::And | Token::Or | Token::Nullish);
            if !is_logical && !is_binary_operator_token(tok) {
                break;
            }
            let bp = tok.lbp();
            if bp < min_bp {
                break;
            }
            self.bump()?;
            let next_min = if tok.is_right_assoc() { bp } else { bp + 1 };
            let rhs = self.parse_binary(ctx, next_min)?;
            lhs = if is_logical {
                self.push(Node::Logical { op: logical_kind_of(tok), data: BinaryOp { lhs, rhs } })
            } else {
                self.push(Node::Binary { op: binary_kind_of(tok), data: BinaryOp { lhs, rhs } })
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let op = match self.lex.token {
            Token::Add => Some(UnaryOp::Pos),
            Token::Sub => Some(UnaryOp::Neg),
            Token::Not => Some(UnaryOp::Not),
            Token::BNot => Some(UnaryOp::BNot),
            Token::KeywordTypeOf => Some(UnaryOp::TypeOf),
            Token::KeywordVoid => Some(UnaryOp::Void),
            Token::KeywordDelete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let argument = self.parse_unary(ctx)?;
            return Ok(self.push(Node::Unary { op, argument }));
        }
        if matches!(self.lex.token, Token::Inc | Token::Dec) {
            let op = if self.at(Token::Inc) { UpdateOp::Inc } else { UpdateOp::Dec };
            self.bump()?;
            let argument = self.parse_unary(ctx)?;
            return Ok(self.push(Node::Update { op, argument, prefix: true }));
        }
        if self.at(Token::KeywordAwait) && ctx.in_async {
            self.bump()?;
            let argument = self.parse_unary(ctx)?;
            return Ok(self.push(Node::Await(argument)));
        }
        self.parse_postfix(ctx)
    }

    fn parse_postfix(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let expr = self.parse_lhs_expr(ctx)?;
        if !self.lex.has_newline_before && matches!(self.lex.token, Token::Inc | Token::Dec) {
            let op = if self.at(Token::Inc) { UpdateOp::Inc } else { UpdateOp::Dec };
            self.bump()?;
            return Ok(self.push(Node::Update { op, argument: expr, prefix: false }));
        }
        Ok(expr)
    }

    fn parse_lhs_expr(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let expr = if self.at(Token::KeywordNew) {
            self.parse_new_expr(ctx)?
        } else {
            self.parse_primary(ctx)?
        };
        self.parse_call_tail(expr, ctx)
    }

    fn parse_new_expr(&mut self, ctx: Ctx) -> Result<NodeRef> {
        self.bump()?; // 'new'
        if self.at(Token::Dot) {
            self.bump()?;
            let name = self.any_name()?;
            if &*name != "target" {
                return Err(self.error("expected 'new.target'"));
            }
            return Ok(self.push(Node::NewTarget));
        }
        let callee = if self.at(Token::KeywordNew) {
            self.parse_new_expr(ctx)?
        } else {
            self.parse_primary(ctx)?
        };
        let callee = self.parse_member_tail_no_call(callee, ctx)?;
        let args = if self.at(Token::LParen) {
            self.parse_call_args(ctx)?
        } else {
            Box::new([]) as Box<[NodeRef]>
        };
        Ok(self.push(Node::New(Call { callee, args, optional: false })))
    }

    /// Member accesses bind tighter than a `new` expression's arguments,
    /// so `new a.b.c(x)` constructs `a.b.c`, not `a.b` called with `.c(x)`.
    fn parse_member_tail_no_call(&mut self, mut expr: NodeRef, ctx: Ctx) -> Result<NodeRef> {
        loop {
            match self.lex.token {
                Token::Dot => {
                    self.bump()?;
                    let property = self.parse_member_property_name()?;
                    expr = self.push(Node::Member(Member { object: expr, property, computed: false, optional: false }));
                }
                Token::LBrack => {
                    self.bump()?;
                    let property = self.parse_expression(ctx.with_allow_in(true))?;
                    self.expect(Token::RBrack)?;
                    expr = self.push(Node::Member(Member { object: expr, property, computed: true, optional: false }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_tail(&mut self, mut expr: NodeRef, ctx: Ctx) -> Result<NodeRef> {
        loop {
            match self.lex.token {
                Token::Dot => {
                    self.bump()?;
                    let property = self.parse_member_property_name()?;
                    expr = self.push(Node::Member(Member { object: expr, property, computed: false, optional: false }));
                }
                Token::OptionalChain => {
                    self.bump()?;
                    if self.at(Token::LParen) {
                        let args = self.parse_call_args(ctx)?;
                        expr = self.push(Node::OptionalCall(Call { callee: expr, args, optional: true }));
                    } else if self.at(Token::LBrack) {
                        self.bump()?;
                        let property = self.parse_expression(ctx.with_allow_in(true))?;
                        self.expect(Token::RBrack)?;
                        expr = self.push(Node::OptionalMember(Member {
                            object: expr,
                            property,
                            computed: true,
                            optional: true,
                        }));
                    } else {
                        let property = self.parse_member_property_name()?;
                        expr = self.push(Node::OptionalMember(Member {
                            object: expr,
                            property,
                            computed: false,
                            optional: true,
                        }));
                    }
                }
                Token::LBrack => {
                    self.bump()?;
                    let property = self.parse_expression(ctx.with_allow_in(true))?;
                    self.expect(Token::RBrack)?;
                    expr = self.push(Node::Member(Member { object: expr, property, computed: true, optional: false }));
                }
                Token::LParen => {
                    let args = self.parse_call_args(ctx)?;
                    expr = self.push(Node::Call(Call { callee: expr, args, optional: false }));
                }
                Token::TemplateFull | Token::TemplateHead => {
                    let quasi = self.parse_template_literal(ctx)?;
                    expr = self.push(Node::TaggedTemplate(TaggedTemplate { tag: expr, quasi }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_member_property_name(&mut self) -> Result<NodeRef> {
        if self.at(Token::PrivateName) {
            let name = self.cur_text().trim_start_matches('#').to_string().into_boxed_str();
            self.bump()?;
            return Ok(self.push(Node::PrivateName(name)));
        }
        let name = self.any_name()?;
        Ok(self.push(Node::StringLit(name)))
    }

    fn parse_call_args(&mut self, ctx: Ctx) -> Result<Box<[NodeRef]>> {
        self.expect(Token::LParen)?;
        let ctx = ctx.with_allow_in(true);
        let mut args = Vec::new();
        while !self.at(Token::RParen) {
            if self.eat(Token::Spread)? {
                let e = self.parse_assignment(ctx)?;
                args.push(self.push(Node::Spread(e)));
            } else {
                args.push(self.parse_assignment(ctx)?);
            }
            if !self.eat(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args.into_boxed_slice())
    }

    fn parse_template_literal(&mut self, ctx: Ctx) -> Result<NodeRef> {
        let mut quasis = Vec::new();
        let mut raws = Vec::new();
        let mut expressions = Vec::new();
        loop {
            match self.lex.token {
                Token::TemplateFull | Token::TemplateTail => {
                    quasis.push(self.lex.template_cooked.clone().into_boxed_str());
                    raws.push(self.lex.template_raw.clone());
                    self.bump()?;
                    break;
                }
                Token::TemplateHead | Token::TemplateMiddle => {
                    quasis.push(self.lex.template_cooked.clone().into_boxed_str());
                    raws.push(self.lex.template_raw.clone());
                    self.bump()?;
                    let expr = self.parse_expression(ctx.with_allow_in(true))?;
                    expressions.push(expr);
                    // The lexer resumes template scanning itself once the
                    // brace depth unwinds back to the substitution's
                    // opening `${`, so the current token is already the
                    // next Middle/Tail chunk, with no RBrace in between.
                    if !matches!(self.lex.token, Token::TemplateMiddle | Token::TemplateTail) {
                        return Err(self.error("unterminated template substitution"));
                    }
                }
                _ => return Err(self.error("expected template literal")),
            }
        }
        Ok(self.push(Node::Template(TemplateLiteral {
            quasis: quasis.into_boxed_slice(),
            raws: raws.into_boxed_slice(),
            expressions: expressions.into_boxed_slice(),
        })))
    }

    fn parse_primary(&mut self, ctx: Ctx) -> Result<NodeRef> {
        match self.lex.token {
            Token::Number => {
                let n = self.lex.number_value;
                self.bump()?;
                Ok(self.push(Node::NumberLit(n)))
            }
            Token::BigInt => {
                let text = self.cur_text();
                let digits = text.strip_suffix('n').unwrap_or(text).to_string().into_boxed_str();
                self.bump()?;
                Ok(self.push(Node::BigIntLit(digits)))
            }
            Token::String => {
                let s = self.lex.string_value.to_string().into_boxed_str();
                self.bump()?;
                Ok(self.push(Node::StringLit(s)))
            }
            Token::Regex => {
                let pattern = self.lex.regex_pattern.clone();
                let flags = self.lex.regex_flags.clone();
                self.bump()?;
                Ok(self.push(Node::RegexLit { pattern, flags }))
            }
            Token::TemplateFull | Token::TemplateHead => self.parse_template_literal(ctx),
            Token::KeywordTrue => {
                self.bump()?;
                Ok(self.push(Node::True))
            }
            Token::KeywordFalse => {
                self.bump()?;
                Ok(self.push(Node::False))
            }
            Token::KeywordNull => {
                self.bump()?;
                Ok(self.push(Node::Null))
            }
            Token::KeywordThis => {
                self.bump()?;
                Ok(self.push(Node::This))
            }
            Token::KeywordSuper => {
                self.bump()?;
                Ok(self.push(Node::Super))
            }
            Token::LParen => {
                self.bump()?;
                let expr = self.parse_expression(ctx.with_allow_in(true))?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBrack => self.parse_array_literal(ctx),
            Token::LBrace => self.parse_object_literal(ctx),
            Token::KeywordFunction => self.parse_function_expr(ctx, false),
            Token::KeywordClass => {
                let class = self.parse_class(ctx)?;
                Ok(self.push(Node::Class(class)))
            }
            Token::KeywordAsync if self.peek_async_function() => self.parse_function_expr(ctx, true),
            Token::KeywordImport => {
                self.bump()?;
                if self.eat(Token::Dot)? {
                    let name = self.any_name()?;
                    if &*name != "meta" {
                        return Err(self.error("expected 'import.meta'"));
                    }
                    return Ok(self.push(Node::ImportMeta));
                }
                self.expect(Token::LParen)?;
                let arg = self.parse_assignment(ctx.with_allow_in(true))?;
                self.eat(Token::Comma)?;
                self.expect(Token::RParen)?;
                Ok(self.push(Node::ImportCall(arg)))
            }
            Token::PrivateName => {
                let name = self.cur_text().trim_start_matches('#').to_string().into_boxed_str();
                self.bump()?;
                Ok(self.push(Node::PrivateName(name)))
            }
            Token::Ident
            | Token::KeywordAsync
            | Token::KeywordGet
            | Token::KeywordSet
            | Token::KeywordStatic
            | Token::KeywordOf
            | Token::KeywordLet
            | Token::KeywordYield
            | Token::KeywordAwait => {
                let name = self.ident_name(ctx)?;
                Ok(self.push(Node::Ident(name)))
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_function_expr(&mut self, ctx: Ctx, is_async: bool) -> Result<NodeRef> {
        if is_async {
            self.bump()?;
        }
        self.bump()?; // 'function'
        let is_generator = self.eat(Token::Mul)?;
        let kind = match (is_async, is_generator) {
            (true, true) => FunctionKind::AsyncGenerator,
            (true, false) => FunctionKind::Async,
            (false, true) => FunctionKind::Generator,
            (false, false) => FunctionKind::Normal,
        };
        let name = if self.at(Token::Ident) {
            let n = self.ident_name(ctx)?;
            self.push(Node::Ident(n))
        } else {
            Node::empty()
        };
        let params = self.parse_function_like(ctx, kind, name)?;
        Ok(self.push(Node::Function(params)))
    }

    // --- modules ---

    fn parse_import_decl(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        if !ctx.in_module {
            return Err(self.error("'import' declarations are only valid in modules"));
        }
        self.bump()?;
        let mut specifiers = Vec::new();
        if self.at(Token::Ident) {
            let local = self.ident_name(ctx)?;
            specifiers.push(ImportSpecifier { kind: ImportKind::Default, imported: "default".into(), local });
            if self.eat(Token::Comma)? {
                self.parse_import_clause_tail(ctx, &mut specifiers)?;
            }
        } else {
            self.parse_import_clause_tail(ctx, &mut specifiers)?;
        }
        self.expect_contextual("from")?;
        let source = self.expect_string()?;
        self.consume_semi()?;
        Ok(self.stmt(Node::ImportDecl(ImportDecl { specifiers: specifiers.into_boxed_slice(), source }), start))
    }

    fn parse_import_clause_tail(&mut self, ctx: Ctx, specifiers: &mut Vec<ImportSpecifier>) -> Result<()> {
        if self.eat(Token::Mul)? {
            self.expect_contextual("as")?;
            let local = self.ident_name(ctx)?;
            specifiers.push(ImportSpecifier { kind: ImportKind::Namespace, imported: "*".into(), local });
            return Ok(());
        }
        self.expect(Token::LBrace)?;
        while !self.at(Token::RBrace) {
            let imported = self.any_name()?;
            let local = if self.eat_contextual("as")? {
                self.ident_name(ctx)?
            } else {
                imported.clone()
            };
            specifiers.push(ImportSpecifier { kind: ImportKind::Named, imported, local });
            if !self.eat(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(())
    }

    fn parse_export_decl(&mut self, ctx: Ctx, start: u32) -> Result<NodeRef> {
        if !ctx.in_module {
            return Err(self.error("'export' declarations are only valid in modules"));
        }
        self.bump()?;
        if self.eat(Token::KeywordDefault)? {
            let decl = if matches!(self.lex.token, Token::KeywordFunction)
                || (self.at(Token::KeywordAsync) && self.peek_async_function())
            {
                let is_async = self.at(Token::KeywordAsync);
                self.parse_function_decl(ctx, is_async)?
            } else if self.at(Token::KeywordClass) {
                self.parse_class_decl(ctx, self.start())?
            } else {
                let expr = self.parse_assignment(ctx.with_allow_in(true))?;
                self.consume_semi()?;
                expr
            };
            self.exported_names.push("default".into());
            return Ok(self.stmt(Node::ExportDefaultDecl(decl), start));
        }
        if self.eat(Token::Mul)? {
            let exported_as = if self.eat_contextual("as")? { Some(self.any_name()?) } else { None };
            self.expect_contextual("from")?;
            let source = self.expect_string()?;
            self.consume_semi()?;
            return Ok(self.stmt(Node::ExportAllDecl { source, exported_as }, start));
        }
        if self.at(Token::LBrace) {
            self.bump()?;
            let mut specifiers = Vec::new();
            while !self.at(Token::RBrace) {
                let local = self.any_name()?;
                let exported = if self.eat_contextual("as")? { self.any_name()? } else { local.clone() };
                specifiers.push((local, exported));
                if !self.eat(Token::Comma)? {
                    break;
                }
            }
            self.expect(Token::RBrace)?;
            let source = if self.eat_contextual("from")? { Some(self.expect_string()?) } else { None };
            self.consume_semi()?;
            for (_, exported) in specifiers.iter() {
                self.exported_names.push(exported.clone());
            }
            return Ok(self.stmt(
                Node::ExportNamedDecl(ExportNamedDecl {
                    declaration: Node::empty(),
                    specifiers: specifiers.into_boxed_slice(),
                    source,
                }),
                start,
            ));
        }
        let decl = self.parse_statement(ctx)?;
        if let Some(name) = self.decl_name_of(decl) {
            self.exported_names.push(name);
        }
        Ok(self.stmt(
            Node::ExportNamedDecl(ExportNamedDecl { declaration: decl, specifiers: Box::new([]), source: None }),
            start,
        ))
    }

    fn decl_name_of(&self, decl: NodeRef) -> Option<Box<str>> {
        match self.arena.get(decl)? {
            Node::FunctionDecl(params) => self.binding_name_of(params.name),
            Node::ClassDecl(class) => self.binding_name_of(class.name),
            Node::VarDecl(decl) => decl.declarators.first().and_then(|d| self.binding_name_of(d.binding)),
            _ => None,
        }
    }

    fn binding_name_of(&self, node: NodeRef) -> Option<Box<str>> {
        match self.arena.get(node)? {
            Node::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn expect_string(&mut self) -> Result<Box<str>> {
        if !self.at(Token::String) {
            return Err(self.error("expected a string literal"));
        }
        let s = self.lex.string_value.to_string().into_boxed_str();
        self.bump()?;
        Ok(s)
    }

    /// `as`/`from` are contextual keywords lexed as plain identifiers.
    fn expect_contextual(&mut self, word: &str) -> Result<()> {
        if !self.eat_contextual(word)? {
            return Err(self.error(format!("expected '{word}'")));
        }
        Ok(())
    }

    fn eat_contextual(&mut self, word: &str) -> Result<bool> {
        if self.at(Token::Ident) && self.cur_text() == word {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn is_binary_operator_token(t: Token) -> bool {
    matches!(
        t,
        Token::Pow
            | Token::Mul
            | Token::Div
            | Token::Mod
            | Token::Add
            | Token::Sub
            | Token::ShiftLeft
            | Token::ShiftRight
            | Token::UShiftRight
            | Token::Lt
            | Token::Lte
            | Token::Gt
            | Token::Gte
            | Token::KeywordIn
            | Token::KeywordInstanceOf
            | Token::Equality
            | Token::Inequality
            | Token::StrictEquality
            | Token::StrictInequality
            | Token::BAnd
            | Token::Xor
            | Token::BOr
    )
}

fn assign_op_of(t: Token) -> AssignOp {
    match t {
        Token::Equal => AssignOp::Assign,
        Token::AddAssign => AssignOp::Add,
        Token::SubAssign => AssignOp::Sub,
        Token::MulAssign => AssignOp::Mul,
        Token::DivAssign => AssignOp::Div,
        Token::ModAssign => AssignOp::Mod,
        Token::PowAssign => AssignOp::Pow,
        Token::ShiftLeftAssign => AssignOp::ShiftLeft,
        Token::ShiftRightAssign => AssignOp::ShiftRight,
        Token::UShiftRightAssign => AssignOp::UShiftRight,
        Token::BAndAssign => AssignOp::BAnd,
        Token::BOrAssign => AssignOp::BOr,
        Token::XorAssign => AssignOp::Xor,
        Token::AndAssign => AssignOp::LogicalAnd,
        Token::OrAssign => AssignOp::LogicalOr,
        Token::NullishAssign => AssignOp::Nullish,
        _ => unreachable!("not an assignment operator"),
    }
}

fn binary_kind_of(t: Token) -> BinaryKind {
    match t {
        Token::Add => BinaryKind::Add,
        Token::Sub => BinaryKind::Sub,
        Token::Mul => BinaryKind::Mul,
        Token::Div => BinaryKind::Div,
        Token::Mod => BinaryKind::Mod,
        Token::Pow => BinaryKind::Pow,
        Token::ShiftLeft => BinaryKind::ShiftLeft,
        Token::ShiftRight => BinaryKind::ShiftRight,
        Token::UShiftRight => BinaryKind::UShiftRight,
        Token::Lt => BinaryKind::Lt,
        Token::Gt => BinaryKind::Gt,
        Token::Lte => BinaryKind::Lte,
        Token::Gte => BinaryKind::Gte,
        Token::Equality => BinaryKind::Equality,
        Token::Inequality => BinaryKind::Inequality,
        Token::StrictEquality => BinaryKind::StrictEquality,
        Token::StrictInequality => BinaryKind::StrictInequality,
        Token::BAnd => BinaryKind::BAnd,
        Token::BOr => BinaryKind::BOr,
        Token::Xor => BinaryKind::Xor,
        Token::KeywordIn => BinaryKind::In,
        Token::KeywordInstanceOf => BinaryKind::InstanceOf,
        _ => unreachable!("not a binary operator"),
    }
}

fn logical_kind_of(t: Token) -> LogicalKind {
    match t {
        Token::And => LogicalKind::And,
        Token::Or => LogicalKind::Or,
        Token::Nullish => LogicalKind::Nullish,
        _ => unreachable!("not a logical operator"),
    }
}

/// Converts an object-literal/class numeric key to its property-name
/// string. Integral values in safe range print as plain digits; anything
/// else falls back to Rust's float formatting, which is close enough for
/// the rare `{ 1.5: x }` case without pulling in a full dtoa routine.
fn number_to_key(n: f64) -> Box<str> {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64).into_boxed_str()
    } else {
        format!("{n}").into_boxed_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> ParseOutput {
        parse(src, false).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"))
    }

    #[test]
    fn asi_inserts_semicolons_across_newlines() {
        let out = parse_ok("let a = 1\nlet b = 2\n");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 2);
    }

    #[test]
    fn asi_does_not_break_across_operators() {
        let out = parse_ok("let a = 1\n+ 2\n");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 1);
    }

    #[test]
    fn destructuring_object_and_array_patterns() {
        let out = parse_ok("let { a, b: [c, ...d] = [] } = obj;");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 1);
    }

    #[test]
    fn arrow_functions_cover_grammar() {
        let out = parse_ok("let f = (a, b = 1, ...rest) => a + b;");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 1);
    }

    #[test]
    fn arrow_single_ident_param() {
        let out = parse_ok("let f = x => x * 2;");
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn parenthesized_expression_is_not_mistaken_for_arrow() {
        let out = parse_ok("let a = (1, 2, 3);");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 1);
    }

    #[test]
    fn classes_with_inheritance_and_accessors() {
        let out = parse_ok(
            "class A extends B { #x = 1; static count = 0; get x() { return this.#x; } set x(v) { this.#x = v; } }",
        );
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn for_of_and_for_in_loops() {
        let out = parse_ok("for (const x of xs) { f(x); }\nfor (const k in o) { g(k); }");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 2);
    }

    #[test]
    fn template_literals_with_substitutions() {
        let out = parse_ok("let s = `a${1 + 1}b${ ({ x: 2 }).x }c`;");
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn import_and_export_declarations_in_module_mode() {
        let out = parse(
            "import a, { b as c } from 'm';\nexport const d = 1;\nexport default function () {}\n",
            true,
        )
        .expect("module parse failed");
        let Node::Program(p) = &out.arena[out.program] else { panic!() };
        assert_eq!(p.body.len(), 3);
        assert!(p.exported_names.iter().any(|n| &**n == "d"));
        assert!(p.exported_names.iter().any(|n| &**n == "default"));
    }

    #[test]
    fn optional_chaining_and_nullish_coalescing() {
        let out = parse_ok("let v = a?.b?.[0]?.() ?? fallback;");
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn generator_and_async_functions() {
        let out = parse_ok("async function* gen() { yield 1; for await (const x of xs) { await x; } }");
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn labeled_statements_and_break_continue() {
        let out = parse_ok("outer: for (;;) { break outer; }");
        assert!(matches!(out.arena[out.program], Node::Program(_)));
    }

    #[test]
    fn strict_mode_directive_rejects_reserved_words() {
        let err = parse("'use strict'; let yield = 1;", false).unwrap_err();
        assert!(err.message.contains("reserved"));
    }
}

use crate::language::{
    ast::*,
    errors::{ParseError, ParseErrors},
    lexer::tokenize,
    span::Span,
    token::{LexToken, Token},
};

pub fn parse_program(source: &str) -> Result<Program, ParseErrors> {
    let tokens = tokenize(source);
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<LexToken>,
    pos: usize,
    errors: Vec<ParseError>,
    last_span: Option<Span>,
}

impl Parser {
    fn new(tokens: Vec<LexToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_span: None,
        }
    }

    fn parse(mut self) -> Result<Program, ParseErrors> {
        let mut kernels = Vec::new();

        while !self.is_eof() {
            if self.matches(Token::Semi) {
                continue;
            }
            if self.matches(Token::Fn) {
                match self.parse_kernel() {
                    Ok(kernel) => kernels.push(kernel),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_item();
                    }
                }
                continue;
            }
            self.report(self.error_here("Expected `fn` declaration"));
            self.synchronize_item();
        }

        if self.errors.is_empty() {
            Ok(Program { kernels })
        } else {
            Err(ParseErrors::new(self.errors))
        }
    }

    fn parse_kernel(&mut self) -> Result<KernelDef, ParseError> {
        let name = self.expect_identifier("Expected function name after `fn`")?;
        let start = name.span.start;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        while !self.check(Token::RParen) && !self.is_eof() {
            params.push(self.expect_identifier("Expected parameter name")?);
            if !self.matches(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        let end = self.last_span_end(start);
        Ok(KernelDef {
            name,
            params,
            body,
            span: Span::new(start, end),
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.current_span_start();
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(Token::RBrace) && !self.is_eof() {
            if self.matches(Token::Semi) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        let end = self.last_span_end(start);
        Ok(Block {
            statements,
            span: Span::new(start, end),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.matches(Token::Let) {
            return self.parse_let();
        }
        if self.check(Token::For) {
            return self.parse_for().map(Statement::For);
        }
        if self.matches(Token::Return) {
            return self.parse_return();
        }

        // Assignments need lookahead: `a = ...`, `a, b = ...`, `(a, (b, c)) = ...`
        // and `a[i] = ...` all begin like an expression.
        let saved = self.pos;
        if let Some(statement) = self.try_parse_assignment()? {
            return Ok(statement);
        }
        self.pos = saved;

        let expr = self.parse_expr()?;
        self.expect(Token::Semi)?;
        Ok(Statement::Expr(expr))
    }

    fn parse_let(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect_identifier("Expected binding name after `let`")?;
        let start = name.span.start;
        self.expect(Token::Eq)?;
        let value = self.parse_expr()?;
        self.expect(Token::Semi)?;
        let end = self.last_span_end(start);
        Ok(Statement::Let {
            name,
            value,
            span: Span::new(start, end),
        })
    }

    fn parse_for(&mut self) -> Result<ForLoop, ParseError> {
        let start = self.current_span_start();
        self.expect(Token::For)?;
        let binding = self.expect_identifier("Expected loop variable after `for`")?;
        self.expect(Token::In)?;
        let head = self.expect_identifier("Expected `range(...)` as the loop bound")?;
        if head.name != "range" {
            return Err(ParseError::new(
                "Loops are unrolled at trace time and must iterate over `range(...)`",
                head.span,
            )
            .with_label("not a range"));
        }
        self.expect(Token::LParen)?;
        let bound = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        let end = self.last_span_end(start);
        Ok(ForLoop {
            binding,
            bound,
            body,
            span: Span::new(start, end),
        })
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        let start = self
            .last_span
            .map(|span| span.start)
            .unwrap_or_else(|| self.current_span_start());
        let mut values = Vec::new();
        if !self.check(Token::Semi) {
            values.push(self.parse_expr()?);
            while self.matches(Token::Comma) {
                values.push(self.parse_expr()?);
            }
        }
        self.expect(Token::Semi)?;
        let end = self.last_span_end(start);
        Ok(Statement::Return {
            values,
            span: Span::new(start, end),
        })
    }

    /// Returns `Ok(None)` when the lookahead does not find an assignment,
    /// leaving the caller to rewind and parse an expression statement.
    fn try_parse_assignment(&mut self) -> Result<Option<Statement>, ParseError> {
        // `name[index] = value;`
        if let (Some(Token::Identifier(_)), Some(Token::LBracket)) =
            (self.peek_token(), self.peek_token_n(1))
        {
            let saved = self.pos;
            let target = self.expect_identifier("Expected tuple name")?;
            self.expect(Token::LBracket)?;
            let index = self.parse_expr()?;
            self.expect(Token::RBracket)?;
            if self.matches(Token::Eq) {
                let value = self.parse_expr()?;
                self.expect(Token::Semi)?;
                let end = self.last_span_end(target.span.start);
                return Ok(Some(Statement::SlotAssign {
                    span: Span::new(target.span.start, end),
                    target,
                    index,
                    value,
                }));
            }
            self.pos = saved;
            return Ok(None);
        }

        let start = self.current_span_start();
        let Some(patterns) = self.try_parse_pattern_list() else {
            return Ok(None);
        };
        if !self.matches(Token::Eq) {
            return Ok(None);
        }
        let value = self.parse_expr()?;
        self.expect(Token::Semi)?;
        let end = self.last_span_end(start);
        let span = Span::new(start, end);

        if patterns.len() == 1 {
            match patterns.into_iter().next().unwrap() {
                Pattern::Name(name) => Ok(Some(Statement::Assign { name, value, span })),
                pattern => Ok(Some(Statement::Destructure {
                    pattern,
                    value,
                    span,
                })),
            }
        } else {
            let pattern_span = patterns
                .iter()
                .map(Pattern::span)
                .reduce(Span::to)
                .unwrap_or(span);
            Ok(Some(Statement::Destructure {
                pattern: Pattern::Tuple(patterns, pattern_span),
                value,
                span,
            }))
        }
    }

    fn try_parse_pattern_list(&mut self) -> Option<Vec<Pattern>> {
        let mut patterns = vec![self.try_parse_pattern()?];
        while self.matches(Token::Comma) {
            patterns.push(self.try_parse_pattern()?);
        }
        Some(patterns)
    }

    fn try_parse_pattern(&mut self) -> Option<Pattern> {
        match self.peek_token() {
            Some(Token::Identifier(_)) => {
                let ident = self.expect_identifier("Expected name").ok()?;
                Some(Pattern::Name(ident))
            }
            Some(Token::LParen) => {
                let start = self.current_span_start();
                self.advance();
                let patterns = self.try_parse_pattern_list()?;
                if !self.matches(Token::RParen) {
                    return None;
                }
                let end = self.last_span_end(start);
                Some(Pattern::Tuple(patterns, Span::new(start, end)))
            }
            _ => None,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_postfix()?;
        while self.matches(Token::Plus) {
            let right = self.parse_postfix()?;
            let span = left.span().to(right.span());
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Add,
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.matches(Token::LBracket) {
            let index = self.parse_expr()?;
            self.expect(Token::RBracket)?;
            let end = self.last_span_end(expr.span().start);
            let span = Span::new(expr.span().start, end);
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
                span,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_token() {
            Some(Token::Integer(value)) => {
                let span = self.advance_span();
                Ok(Expr::Literal(Literal::Int(value, span)))
            }
            Some(Token::Float(value)) => {
                let span = self.advance_span();
                Ok(Expr::Literal(Literal::Float(value, span)))
            }
            Some(Token::Identifier(_)) => {
                let ident = self.expect_identifier("Expected identifier")?;
                if self.matches(Token::LParen) {
                    let mut args = Vec::new();
                    while !self.check(Token::RParen) && !self.is_eof() {
                        args.push(self.parse_expr()?);
                        if !self.matches(Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RParen)?;
                    let end = self.last_span_end(ident.span.start);
                    let span = Span::new(ident.span.start, end);
                    return Ok(Expr::Call {
                        callee: ident,
                        args,
                        span,
                    });
                }
                Ok(Expr::Identifier(ident))
            }
            Some(Token::LParen) => {
                let start = self.current_span_start();
                self.advance();
                if self.matches(Token::RParen) {
                    let end = self.last_span_end(start);
                    return Ok(Expr::Tuple(Vec::new(), Span::new(start, end)));
                }
                let first = self.parse_expr()?;
                if self.check(Token::RParen) {
                    // Parenthesized grouping, not a one-element tuple.
                    self.advance();
                    return Ok(first);
                }
                let mut elements = vec![first];
                while self.matches(Token::Comma) {
                    if self.check(Token::RParen) {
                        break; // trailing comma makes a one-element tuple legal
                    }
                    elements.push(self.parse_expr()?);
                }
                self.expect(Token::RParen)?;
                let end = self.last_span_end(start);
                Ok(Expr::Tuple(elements, Span::new(start, end)))
            }
            _ => Err(self.error_here("Expected expression")),
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<Identifier, ParseError> {
        match self.peek_token() {
            Some(Token::Identifier(name)) => {
                let span = self.advance_span();
                Ok(Identifier { name, span })
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, token: Token) -> Result<&LexToken, ParseError> {
        if self.check(token.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("Expected {:?}", token)))
        }
    }

    fn matches(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token: Token) -> bool {
        matches!(self.peek_token(), Some(t) if t == token)
    }

    fn peek_token(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|t| t.token.clone())
    }

    fn peek_token_n(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).map(|t| t.token.clone())
    }

    fn advance(&mut self) -> &LexToken {
        let token = self
            .tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().unwrap());
        self.pos = (self.pos + 1).min(self.tokens.len());
        self.last_span = Some(token.span);
        token
    }

    fn advance_span(&mut self) -> Span {
        self.advance().span
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_token(), Some(Token::Eof) | None)
    }

    fn current_span_start(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    fn last_span_end(&self, fallback: usize) -> usize {
        self.last_span.map(|span| span.end).unwrap_or(fallback)
    }

    fn error_here(&self, message: &str) -> ParseError {
        let span = self
            .tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(0, 0));
        ParseError::new(message, span)
    }

    fn report(&mut self, err: ParseError) {
        self.errors.push(err);
    }

    fn synchronize_item(&mut self) {
        while !self.is_eof() {
            if self.check(Token::Fn) {
                return;
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse_program(source).expect("program should parse")
    }

    fn single_kernel(source: &str) -> KernelDef {
        let program = parse_ok(source);
        assert_eq!(program.kernels.len(), 1);
        program.kernels.into_iter().next().unwrap()
    }

    #[test]
    fn parses_kernel_with_parameters() {
        let kernel = single_kernel("fn inc(ptrs, values) { }");
        assert_eq!(kernel.name.name, "inc");
        assert_eq!(kernel.params.len(), 2);
        assert_eq!(kernel.params[1].name, "values");
    }

    #[test]
    fn parses_slot_assignment() {
        let kernel = single_kernel("fn k(t) { t[0] = t[0] + 1; }");
        match &kernel.body.statements[0] {
            Statement::SlotAssign { target, .. } => assert_eq!(target.name, "t"),
            other => panic!("expected slot assignment, got {other:?}"),
        }
    }

    #[test]
    fn parses_flat_destructure() {
        let kernel = single_kernel("fn k(t) { x0, x1 = t; }");
        match &kernel.body.statements[0] {
            Statement::Destructure {
                pattern: Pattern::Tuple(patterns, _),
                ..
            } => assert_eq!(patterns.len(), 2),
            other => panic!("expected destructure, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_destructure() {
        let kernel = single_kernel("fn k(t) { (a, (b, c)) = t; }");
        match &kernel.body.statements[0] {
            Statement::Destructure {
                pattern: Pattern::Tuple(patterns, _),
                ..
            } => {
                assert_eq!(patterns.len(), 2);
                assert!(matches!(&patterns[1], Pattern::Tuple(inner, _) if inner.len() == 2));
            }
            other => panic!("expected destructure, got {other:?}"),
        }
    }

    #[test]
    fn call_statement_is_not_mistaken_for_assignment() {
        let kernel = single_kernel("fn k(p, v) { store(p, v); }");
        assert!(matches!(
            &kernel.body.statements[0],
            Statement::Expr(Expr::Call { .. })
        ));
    }

    #[test]
    fn parses_static_for_loop() {
        let kernel = single_kernel("fn k(t) { for i in range(len(t)) { t[i] = t[i] + 1; } }");
        match &kernel.body.statements[0] {
            Statement::For(for_loop) => {
                assert_eq!(for_loop.binding.name, "i");
                assert!(matches!(&for_loop.bound, Expr::Call { callee, .. } if callee.name == "len"));
            }
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_range_loop_bound() {
        let err = parse_program("fn k(t) { for i in t { } }").unwrap_err();
        assert!(err.errors[0].message.contains("range"));
    }

    #[test]
    fn parses_multi_value_return() {
        let kernel = single_kernel("fn k(a, b) { return b, a; }");
        match &kernel.body.statements[0] {
            Statement::Return { values, .. } => assert_eq!(values.len(), 2),
            other => panic!("expected return, got {other:?}"),
        }
    }

    #[test]
    fn grouping_parens_do_not_build_tuples() {
        let kernel = single_kernel("fn k(a) { let x = (a); let y = (a,); }");
        match &kernel.body.statements[0] {
            Statement::Let { value, .. } => assert!(matches!(value, Expr::Identifier(_))),
            other => panic!("expected let, got {other:?}"),
        }
        match &kernel.body.statements[1] {
            Statement::Let { value, .. } => {
                assert!(matches!(value, Expr::Tuple(items, _) if items.len() == 1));
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn empty_parens_build_the_empty_tuple() {
        let kernel = single_kernel("fn k() { let u = (); }");
        match &kernel.body.statements[0] {
            Statement::Let { value, .. } => {
                assert!(matches!(value, Expr::Tuple(items, _) if items.is_empty()));
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn reports_error_with_span() {
        let err = parse_program("fn k( { }").unwrap_err();
        assert!(!err.errors.is_empty());
        assert!(err.errors[0].span.start <= err.errors[0].span.end);
    }
}

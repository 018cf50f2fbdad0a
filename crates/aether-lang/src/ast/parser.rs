use std::iter::Peekable;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;

use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Ident, Literal, Node};
use super::{Params, Program};

pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
}

fn merge(start: Range, end: Range) -> Range {
    Range {
        start: start.start,
        end: end.end,
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: core::slice::Iter<'a, Token>) -> Self {
        Self {
            tokens: tokens.peekable(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let program = self.parse_statements(false)?;

        match self.tokens.next() {
            None => Ok(program),
            Some(token) if token.kind == TokenKind::Eof => Ok(program),
            Some(token) => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    /// Parses newline-separated statements until EOF (top level) or a
    /// closing brace (inside a block). The terminator is not consumed.
    fn parse_statements(&mut self, in_block: bool) -> Result<Program, ParseError> {
        let mut program = Vec::new();

        loop {
            self.skip_separators();

            match self.tokens.peek() {
                None => break,
                Some(token) if token.kind == TokenKind::Eof => break,
                Some(token) if in_block && token.kind == TokenKind::RBrace => break,
                Some(_) => {}
            }

            program.push(self.parse_statement()?);

            // A statement ends at a newline, EOF, or the enclosing block's brace.
            match self.tokens.peek() {
                None => {}
                Some(token) => match &token.kind {
                    TokenKind::NewLine | TokenKind::Comment(_) | TokenKind::Eof => {}
                    TokenKind::RBrace if in_block => {}
                    _ => return Err(ParseError::UnexpectedToken((*token).clone())),
                },
            }
        }

        Ok(program)
    }

    fn parse_statement(&mut self) -> Result<Arc<Node>, ParseError> {
        let token = match self.tokens.peek() {
            Some(token) => (*token).clone(),
            None => return Err(ParseError::UnexpectedEOFDetected),
        };

        match &token.kind {
            TokenKind::Set => {
                self.tokens.next();
                let ident = self.expect_ident()?;
                let value = self.parse_expr()?;
                let range = merge(token.range, value.range);
                Ok(Node::new(range, Expr::Set(ident, value)))
            }
            TokenKind::Func => {
                self.tokens.next();
                let name = self.expect_ident()?;
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(Node::new(token.range, Expr::Func(name, params, body)))
            }
            TokenKind::Return => {
                self.tokens.next();
                let value = self.parse_expr()?;
                let range = merge(token.range, value.range);
                Ok(Node::new(range, Expr::Return(value)))
            }
            TokenKind::If => {
                self.tokens.next();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Node::new(token.range, Expr::If(cond, body)))
            }
            TokenKind::For => {
                self.tokens.next();
                let binding = self.expect_ident()?;
                match self.next_token()? {
                    token if token.kind == TokenKind::In => {}
                    token => return Err(ParseError::UnexpectedToken(token.clone())),
                }
                let collection = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Node::new(token.range, Expr::For(binding, collection, body)))
            }
            _ => self.parse_expr(),
        }
    }

    fn parse_expr(&mut self) -> Result<Arc<Node>, ParseError> {
        let mut node = self.parse_primary()?;

        // Postfix indexing binds tighter than anything else and may chain.
        while let Some(token) = self.tokens.peek() {
            if token.kind != TokenKind::LBracket {
                break;
            }
            self.tokens.next();
            self.skip_separators();
            let index = self.parse_expr()?;
            self.skip_separators();
            match self.next_token()? {
                token if token.kind == TokenKind::RBracket => {
                    let range = merge(node.range, token.range);
                    node = Node::new(range, Expr::Index(node, index));
                }
                token => return Err(ParseError::ExpectedClosingBracket(token.clone())),
            }
        }

        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Arc<Node>, ParseError> {
        let token = self.next_token()?.clone();

        match token.kind {
            TokenKind::NumberLiteral(n) => {
                Ok(Node::new(token.range, Expr::Literal(Literal::Number(n))))
            }
            TokenKind::StringLiteral(s) => {
                Ok(Node::new(token.range, Expr::Literal(Literal::String(s))))
            }
            TokenKind::Ident(name) => {
                let ident = Ident {
                    name,
                    range: token.range,
                };
                match self.tokens.peek() {
                    Some(next) if next.kind == TokenKind::LParen => {
                        self.tokens.next();
                        let (args, close) = self.parse_call_args()?;
                        let range = merge(token.range, close);
                        Ok(Node::new(range, Expr::Call(ident, args, false)))
                    }
                    _ => Ok(Node::new(token.range, Expr::Ident(ident))),
                }
            }
            TokenKind::LParen => self.parse_paren_expr(&token),
            TokenKind::LBracket => self.parse_array_literal(&token),
            TokenKind::LBrace => self.parse_object_literal(&token),
            _ => Err(ParseError::UnexpectedToken(token)),
        }
    }

    /// A parenthesized form is either a grouped expression `(e)` or a binary
    /// expression `(a op b)`. Compound expressions require explicit
    /// parenthesization, so there is no precedence to resolve here.
    fn parse_paren_expr(&mut self, open: &Token) -> Result<Arc<Node>, ParseError> {
        self.skip_separators();
        let lhs = self.parse_expr()?;
        self.skip_separators();

        let token = self.next_token()?.clone();
        if token.kind == TokenKind::RParen {
            return Ok(lhs);
        }

        let op = match BinaryOp::from_token_kind(&token.kind) {
            Some(op) => op,
            None => return Err(ParseError::UnexpectedToken(token)),
        };

        self.skip_separators();
        let rhs = self.parse_expr()?;
        self.skip_separators();

        match self.next_token()? {
            token if token.kind == TokenKind::RParen => {
                let range = merge(open.range, token.range);
                Ok(Node::new(range, Expr::Binary(op, lhs, rhs)))
            }
            token => Err(ParseError::ExpectedClosingParen(token.clone())),
        }
    }

    fn parse_array_literal(&mut self, open: &Token) -> Result<Arc<Node>, ParseError> {
        let mut elements = Vec::new();

        self.skip_separators();
        if let Some(token) = self.tokens.peek()
            && token.kind == TokenKind::RBracket
        {
            let close = self.tokens.next().unwrap();
            let range = merge(open.range, close.range);
            return Ok(Node::new(range, Expr::Array(elements)));
        }

        loop {
            elements.push(self.parse_expr()?);
            self.skip_separators();

            let token = self.next_token()?.clone();
            match token.kind {
                TokenKind::Comma => self.skip_separators(),
                TokenKind::RBracket => {
                    let range = merge(open.range, token.range);
                    return Ok(Node::new(range, Expr::Array(elements)));
                }
                _ => return Err(ParseError::ExpectedClosingBracket(token)),
            }
        }
    }

    fn parse_object_literal(&mut self, open: &Token) -> Result<Arc<Node>, ParseError> {
        let mut entries = Vec::new();

        self.skip_separators();
        if let Some(token) = self.tokens.peek()
            && token.kind == TokenKind::RBrace
        {
            let close = self.tokens.next().unwrap();
            let range = merge(open.range, close.range);
            return Ok(Node::new(range, Expr::Object(entries)));
        }

        loop {
            let key = match self.next_token()?.clone() {
                Token {
                    kind: TokenKind::StringLiteral(key),
                    ..
                } => key,
                token => return Err(ParseError::UnexpectedToken(token)),
            };

            self.skip_separators();
            match self.next_token()? {
                token if token.kind == TokenKind::Colon => {}
                token => return Err(ParseError::UnexpectedToken(token.clone())),
            }
            self.skip_separators();

            entries.push((key, self.parse_expr()?));
            self.skip_separators();

            let token = self.next_token()?.clone();
            match token.kind {
                TokenKind::Comma => self.skip_separators(),
                TokenKind::RBrace => {
                    let range = merge(open.range, token.range);
                    return Ok(Node::new(range, Expr::Object(entries)));
                }
                _ => return Err(ParseError::ExpectedClosingBrace(token)),
            }
        }
    }

    /// Arguments of a call; the opening paren is already consumed.
    /// Returns the arguments and the closing paren's range.
    fn parse_call_args(&mut self) -> Result<(Args, Range), ParseError> {
        let mut args: Args = SmallVec::new();

        self.skip_separators();
        if let Some(token) = self.tokens.peek()
            && token.kind == TokenKind::RParen
        {
            let close = self.tokens.next().unwrap();
            return Ok((args, close.range));
        }

        loop {
            args.push(self.parse_expr()?);
            self.skip_separators();

            let token = self.next_token()?.clone();
            match token.kind {
                TokenKind::Comma => self.skip_separators(),
                TokenKind::RParen => return Ok((args, token.range)),
                _ => return Err(ParseError::ExpectedClosingParen(token)),
            }
        }
    }

    fn parse_params(&mut self) -> Result<Params, ParseError> {
        match self.next_token()? {
            token if token.kind == TokenKind::LParen => {}
            token => return Err(ParseError::UnexpectedToken(token.clone())),
        }

        let mut params: Params = SmallVec::new();

        self.skip_separators();
        if let Some(token) = self.tokens.peek()
            && token.kind == TokenKind::RParen
        {
            self.tokens.next();
            return Ok(params);
        }

        loop {
            params.push(self.expect_ident()?);
            self.skip_separators();

            let token = self.next_token()?.clone();
            match token.kind {
                TokenKind::Comma => self.skip_separators(),
                TokenKind::RParen => return Ok(params),
                _ => return Err(ParseError::ExpectedClosingParen(token)),
            }
        }
    }

    fn parse_block(&mut self) -> Result<Program, ParseError> {
        self.skip_separators();
        match self.next_token()? {
            token if token.kind == TokenKind::LBrace => {}
            token => return Err(ParseError::UnexpectedToken(token.clone())),
        }

        let program = self.parse_statements(true)?;

        match self.next_token()? {
            token if token.kind == TokenKind::RBrace => Ok(program),
            token => Err(ParseError::ExpectedClosingBrace(token.clone())),
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        match self.next_token()?.clone() {
            Token {
                kind: TokenKind::Ident(name),
                range,
            } => Ok(Ident { name, range }),
            token => Err(ParseError::ExpectedIdent(token)),
        }
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        match self.tokens.next() {
            Some(token) if token.kind == TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected),
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEOFDetected),
        }
    }

    fn skip_separators(&mut self) {
        while let Some(token) = self.tokens.peek() {
            match &token.kind {
                TokenKind::NewLine | TokenKind::Comment(_) => {
                    self.tokens.next();
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(code: &str) -> Result<Program, ParseError> {
        let tokens = Lexer::new().tokenize(code).unwrap();
        Parser::new(tokens.iter()).parse()
    }

    #[test]
    fn test_parse_set() {
        let program = parse("Set X 10").unwrap();

        assert_eq!(program.len(), 1);
        match &*program[0].expr {
            Expr::Set(ident, value) => {
                assert_eq!(ident.name, "X");
                assert_eq!(
                    *value.expr,
                    Expr::Literal(Literal::Number(10.into()))
                );
            }
            expr => panic!("expected Set, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_binary_expr() {
        let program = parse("(X + Y)").unwrap();

        match &*program[0].expr {
            Expr::Binary(BinaryOp::Add, lhs, rhs) => {
                assert!(matches!(&*lhs.expr, Expr::Ident(ident) if ident.name == "X"));
                assert!(matches!(&*rhs.expr, Expr::Ident(ident) if ident.name == "Y"));
            }
            expr => panic!("expected Binary, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_nested_binary_expr() {
        let program = parse("((A + B) * C)").unwrap();

        match &*program[0].expr {
            Expr::Binary(BinaryOp::Mul, lhs, _) => {
                assert!(matches!(&*lhs.expr, Expr::Binary(BinaryOp::Add, _, _)));
            }
            expr => panic!("expected Binary, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_grouped_expr() {
        let program = parse("(X)").unwrap();
        assert!(matches!(&*program[0].expr, Expr::Ident(ident) if ident.name == "X"));
    }

    #[test]
    fn test_parse_func_def() {
        let program = parse("Func ADD (A, B) {\n  Return (A + B)\n}").unwrap();

        match &*program[0].expr {
            Expr::Func(name, params, body) => {
                assert_eq!(name.name, "ADD");
                assert_eq!(
                    params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                    vec!["A", "B"]
                );
                assert_eq!(body.len(), 1);
                assert!(matches!(&*body[0].expr, Expr::Return(_)));
            }
            expr => panic!("expected Func, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_if() {
        let program = parse("If ((X > 10)) {\n  TRACE(\"hit\", X)\n}").unwrap();

        match &*program[0].expr {
            Expr::If(cond, body) => {
                assert!(matches!(&*cond.expr, Expr::Binary(BinaryOp::Gt, _, _)));
                assert_eq!(body.len(), 1);
            }
            expr => panic!("expected If, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_for() {
        let program = parse("For USER In USERS {\n  TRACE(\"u\", USER)\n}").unwrap();

        match &*program[0].expr {
            Expr::For(binding, collection, body) => {
                assert_eq!(binding.name, "USER");
                assert!(matches!(&*collection.expr, Expr::Ident(_)));
                assert_eq!(body.len(), 1);
            }
            expr => panic!("expected For, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_index_chain() {
        let program = parse("CONFIG[\"users\"][0]").unwrap();

        match &*program[0].expr {
            Expr::Index(target, index) => {
                assert!(matches!(&*target.expr, Expr::Index(_, _)));
                assert!(matches!(
                    &*index.expr,
                    Expr::Literal(Literal::Number(n)) if n.is_zero()
                ));
            }
            expr => panic!("expected Index, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_call() {
        let program = parse("ADD(15, 15)").unwrap();

        match &*program[0].expr {
            Expr::Call(name, args, tail) => {
                assert_eq!(name.name, "ADD");
                assert_eq!(args.len(), 2);
                assert!(!tail);
            }
            expr => panic!("expected Call, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_array_literal() {
        let program = parse("[1, 2, 3]").unwrap();

        match &*program[0].expr {
            Expr::Array(elements) => assert_eq!(elements.len(), 3),
            expr => panic!("expected Array, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_empty_array_literal() {
        let program = parse("Set RESULT []").unwrap();

        match &*program[0].expr {
            Expr::Set(_, value) => {
                assert!(matches!(&*value.expr, Expr::Array(elements) if elements.is_empty()));
            }
            expr => panic!("expected Set, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_object_literal() {
        let program = parse("{ \"name\": \"Alice\", \"age\": 30 }").unwrap();

        match &*program[0].expr {
            Expr::Object(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "name");
                assert_eq!(entries[1].0, "age");
            }
            expr => panic!("expected Object, got {:?}", expr),
        }
    }

    #[test]
    fn test_parse_multiline_program() {
        let program = parse("Set X 10\nSet Y 20\n(X + Y)").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_parse_skips_comments() {
        let program = parse("# setup\nSet X 10\n# use it\nX").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_parse_empty_program() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_unclosed_paren() {
        assert_eq!(parse("(X + "), Err(ParseError::UnexpectedEOFDetected));
    }

    #[test]
    fn test_parse_missing_operator_paren() {
        assert!(matches!(
            parse("(A + B + C)"),
            Err(ParseError::ExpectedClosingParen(_))
        ));
    }

    #[test]
    fn test_parse_set_requires_ident() {
        assert!(matches!(parse("Set 10 10"), Err(ParseError::ExpectedIdent(_))));
    }

    #[test]
    fn test_parse_rejects_two_statements_on_one_line() {
        assert!(matches!(parse("X Y"), Err(ParseError::UnexpectedToken(_))));
    }

    #[test]
    fn test_parse_unclosed_array() {
        assert_eq!(parse("[1, 2"), Err(ParseError::UnexpectedEOFDetected));
    }
}

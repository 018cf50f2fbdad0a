pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::bytes::complete::take_while;
use nom::character::complete::line_ending;
use nom::combinator::opt;
use nom::number::complete::double;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while_m_n},
    character::complete::{alpha1, alphanumeric1, char, none_of},
    combinator::{map, map_opt, map_res, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
};
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::range::{Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Self
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        match tokens(Span::new(input)) {
            Ok((span, tokens)) => {
                let eof: Range = span.into();

                if eof.start == eof.end {
                    Ok([
                        tokens,
                        vec![Token {
                            range: eof,
                            kind: TokenKind::Eof,
                        }],
                    ]
                    .concat())
                } else {
                    Err(LexerError::UnexpectedToken(Token {
                        range: eof,
                        kind: TokenKind::Eof,
                    }))
                }
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(LexerError::UnexpectedToken(Token {
                    range: e.input.into(),
                    kind: TokenKind::Eof,
                }))
            }
            _ => Err(LexerError::UnexpectedEOFDetected),
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

fn unicode(input: Span) -> IResult<Span, char> {
    map_opt(
        map_res(
            preceded(
                char('u'),
                delimited(
                    char('{'),
                    take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit()),
                    char('}'),
                ),
            ),
            |span: Span| u32::from_str_radix(span.fragment(), 16),
        ),
        char::from_u32,
    )
    .parse(input)
}

fn inline_comment(input: Span) -> IResult<Span, Token> {
    map(
        preceded(char('#'), take_while(|c| c != '\n' && c != '\r')),
        |span: Span| Token {
            range: span.into(),
            kind: TokenKind::Comment(span.fragment().to_string()),
        },
    )
    .parse(input)
}

fn newline(input: Span) -> IResult<Span, Token> {
    map(line_ending, |span: Span| Token {
        range: span.into(),
        kind: TokenKind::NewLine,
    })
    .parse(input)
}

define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(and_and, "&&", TokenKind::AndAnd);
define_token_parser!(or_or, "||", TokenKind::OrOr);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(
    empty_string,
    "\"\"",
    TokenKind::StringLiteral(String::new())
);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, l_bracket, r_bracket, l_brace, r_brace, comma, colon,
    ))
    .parse(input)
}

fn operators(input: Span) -> IResult<Span, Token> {
    // Two-character operators must be tried before their one-character prefixes.
    alt((
        gte, lte, eq_eq, ne_eq, and_and, or_or, gt, lt, plus, minus, asterisk, slash, percent,
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(recognize(pair(opt(char('-')), double)), |span: Span| {
        str::parse(span.fragment()).map(|n: f64| Token {
            range: span.into(),
            kind: TokenKind::NumberLiteral(n.into()),
        })
    })
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = nom_locate::position(input)?;
    let (span, s) = delimited(
        char('"'),
        escaped_transform(
            none_of("\"\\"),
            '\\',
            alt((
                value('\\', char('\\')),
                value('\"', char('\"')),
                value('\r', char('r')),
                value('\n', char('n')),
                value('\t', char('t')),
                unicode,
            )),
        ),
        char('"'),
    )
    .parse(span)?;
    let (span, end) = nom_locate::position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s),
        },
    ))
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((number_literal, empty_string, string_literal)).parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |span: Span| {
            let kind = match *span.fragment() {
                "Set" => TokenKind::Set,
                "Func" => TokenKind::Func,
                "Return" => TokenKind::Return,
                "If" => TokenKind::If,
                "For" => TokenKind::For,
                "In" => TokenKind::In,
                name => TokenKind::Ident(SmolStr::new(name)),
            };
            Token {
                range: span.into(),
                kind,
            }
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((newline, inline_comment, literals, operators, punctuations, ident)).parse(input)
}

fn hspace(input: Span) -> IResult<Span, Span> {
    take_while(|c| c == ' ' || c == '\t')(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    many0(delimited(hspace, token, hspace)).parse(input)
}

#[cfg(test)]
mod tests {
    use crate::range::Position;

    use super::*;
    use rstest::rstest;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[rstest]
    #[case("Set X 10", vec![
        TokenKind::Set,
        TokenKind::Ident(SmolStr::new("X")),
        TokenKind::NumberLiteral(10.into()),
        TokenKind::Eof,
    ])]
    #[case("(X + Y)", vec![
        TokenKind::LParen,
        TokenKind::Ident(SmolStr::new("X")),
        TokenKind::Plus,
        TokenKind::Ident(SmolStr::new("Y")),
        TokenKind::RParen,
        TokenKind::Eof,
    ])]
    #[case("Func ADD (A, B) {\nReturn (A + B)\n}", vec![
        TokenKind::Func,
        TokenKind::Ident(SmolStr::new("ADD")),
        TokenKind::LParen,
        TokenKind::Ident(SmolStr::new("A")),
        TokenKind::Comma,
        TokenKind::Ident(SmolStr::new("B")),
        TokenKind::RParen,
        TokenKind::LBrace,
        TokenKind::NewLine,
        TokenKind::Return,
        TokenKind::LParen,
        TokenKind::Ident(SmolStr::new("A")),
        TokenKind::Plus,
        TokenKind::Ident(SmolStr::new("B")),
        TokenKind::RParen,
        TokenKind::NewLine,
        TokenKind::RBrace,
        TokenKind::Eof,
    ])]
    #[case("For USER In USERS { TRACE(\"cat\", USER) }", vec![
        TokenKind::For,
        TokenKind::Ident(SmolStr::new("USER")),
        TokenKind::In,
        TokenKind::Ident(SmolStr::new("USERS")),
        TokenKind::LBrace,
        TokenKind::Ident(SmolStr::new("TRACE")),
        TokenKind::LParen,
        TokenKind::StringLiteral("cat".to_string()),
        TokenKind::Comma,
        TokenKind::Ident(SmolStr::new("USER")),
        TokenKind::RParen,
        TokenKind::RBrace,
        TokenKind::Eof,
    ])]
    #[case("USER[\"score\"]", vec![
        TokenKind::Ident(SmolStr::new("USER")),
        TokenKind::LBracket,
        TokenKind::StringLiteral("score".to_string()),
        TokenKind::RBracket,
        TokenKind::Eof,
    ])]
    #[case("(A >= B) || (A != C)", vec![
        TokenKind::LParen,
        TokenKind::Ident(SmolStr::new("A")),
        TokenKind::Gte,
        TokenKind::Ident(SmolStr::new("B")),
        TokenKind::RParen,
        TokenKind::OrOr,
        TokenKind::LParen,
        TokenKind::Ident(SmolStr::new("A")),
        TokenKind::NeEq,
        TokenKind::Ident(SmolStr::new("C")),
        TokenKind::RParen,
        TokenKind::Eof,
    ])]
    #[case("-2.5", vec![TokenKind::NumberLiteral((-2.5).into()), TokenKind::Eof])]
    #[case("\"tab\\there\"", vec![
        TokenKind::StringLiteral("tab\there".to_string()),
        TokenKind::Eof,
    ])]
    #[case("\"\\u{0061}\"", vec![
        TokenKind::StringLiteral("a".to_string()),
        TokenKind::Eof,
    ])]
    #[case("\"\"", vec![TokenKind::StringLiteral(String::new()), TokenKind::Eof])]
    #[case("# note\nX", vec![
        TokenKind::Comment(" note".to_string()),
        TokenKind::NewLine,
        TokenKind::Ident(SmolStr::new("X")),
        TokenKind::Eof,
    ])]
    #[case("{ \"key\": 123 }", vec![
        TokenKind::LBrace,
        TokenKind::StringLiteral("key".to_string()),
        TokenKind::Colon,
        TokenKind::NumberLiteral(123.into()),
        TokenKind::RBrace,
        TokenKind::Eof,
    ])]
    fn test_tokenize(#[case] input: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = Lexer::new().tokenize("Set X 10").unwrap();

        assert_eq!(
            tokens[0].range,
            Range {
                start: Position { line: 1, column: 1 },
                end: Position { line: 1, column: 4 }
            }
        );
        assert_eq!(
            tokens[2].range,
            Range {
                start: Position { line: 1, column: 7 },
                end: Position { line: 1, column: 9 }
            }
        );
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        assert!(matches!(
            Lexer::new().tokenize("\"test"),
            Err(LexerError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_keywords_do_not_swallow_identifiers() {
        assert_eq!(
            kinds("Settings"),
            vec![TokenKind::Ident(SmolStr::new("Settings")), TokenKind::Eof]
        );
    }
}

use crate::language::span::Span;
use crate::language::token::{LexToken, Token};
use nom::{
    IResult, Parser as NomParser,
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, anychar, digit1, one_of},
    combinator::{map_res, opt, recognize},
    multi::many0,
    sequence::{pair, tuple},
};

fn parse_identifier_or_keyword(input: &str) -> IResult<&str, Token> {
    let (input, ident) = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)?;
    let token = match ident {
        "fn" => Token::Fn,
        "let" => Token::Let,
        "for" => Token::For,
        "in" => Token::In,
        "return" => Token::Return,
        _ => Token::Identifier(ident.to_string()),
    };
    Ok((input, token))
}

fn parse_float(input: &str) -> IResult<&str, Token> {
    let (input, value) = map_res(recognize(tuple((digit1, tag("."), digit1))), |s: &str| {
        s.parse::<f64>()
    })
    .parse(input)?;
    Ok((input, Token::Float(value)))
}

fn parse_integer(input: &str) -> IResult<&str, Token> {
    let (input, value) =
        map_res(recognize(digit1), |s: &str| s.parse::<i64>()).parse(input)?;
    Ok((input, Token::Integer(value)))
}

fn parse_symbol(input: &str) -> IResult<&str, Token> {
    let (input, ch) = one_of("=+,;(){}[]")(input)?;
    let token = match ch {
        '=' => Token::Eq,
        '+' => Token::Plus,
        ',' => Token::Comma,
        ';' => Token::Semi,
        '(' => Token::LParen,
        ')' => Token::RParen,
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        _ => Token::Unknown,
    };
    Ok((input, token))
}

fn parse_line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), opt(is_not("\n")))).parse(input)
}

fn parse_any(input: &str) -> IResult<&str, Token> {
    let (input, _) = anychar(input)?;
    Ok((input, Token::Unknown))
}

pub fn tokenize(input: &str) -> Vec<LexToken> {
    let mut tokens = Vec::new();
    let mut remaining = input;
    let mut offset = 0usize;

    loop {
        let trimmed = remaining.trim_start();
        offset += remaining.len() - trimmed.len();
        remaining = trimmed;

        if let Ok((rest, _)) = parse_line_comment(remaining) {
            offset += remaining.len() - rest.len();
            remaining = rest;
            continue;
        }

        if remaining.is_empty() {
            break;
        }

        let result = parse_identifier_or_keyword(remaining)
            .or_else(|_| parse_float(remaining))
            .or_else(|_| parse_integer(remaining))
            .or_else(|_| parse_symbol(remaining))
            .or_else(|_| parse_any(remaining));

        match result {
            Ok((rest, token)) => {
                let consumed = remaining.len() - rest.len();
                tokens.push(LexToken {
                    token,
                    span: Span::new(offset, offset + consumed),
                });
                remaining = rest;
                offset += consumed;
            }
            Err(_) => break,
        }
    }

    tokens.push(LexToken {
        token: Token::Eof,
        span: Span::new(offset, offset),
    });
    tokens
}

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use log::{debug, warn};

use crate::error::CompileError;
use crate::ir::ast::BinaryOperator;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Ключевые слова
    Def, Extern, If, Then, Else,
    // Скобки и разделители
    LParen,        // (
    RParen,        // )
    Comma,         // ,
    Semicolon,     // ;
    // Операторы: + - * / %
    Operator(BinaryOperator),
    // Идентификаторы и литералы
    Identifier(String),
    Number(f64),
}

/// Токен вместе с позицией в исходнике
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Span,
}

/// Односимвольные токены: пунктуация и бинарные операторы
static SINGLE_CHAR_TOKENS: [(char, Token); 9] = [
    ('(', Token::LParen),
    (')', Token::RParen),
    (',', Token::Comma),
    (';', Token::Semicolon),
    ('+', Token::Operator(BinaryOperator::Add)),
    ('-', Token::Operator(BinaryOperator::Subtract)),
    ('*', Token::Operator(BinaryOperator::Multiply)),
    ('/', Token::Operator(BinaryOperator::Divide)),
    ('%', Token::Operator(BinaryOperator::Remainder)),
];

static KEYWORDS: [(&str, Token); 5] = [
    ("def", Token::Def),
    ("extern", Token::Extern),
    ("if", Token::If),
    ("then", Token::Then),
    ("else", Token::Else),
];

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Def => write!(f, "keyword 'def'"),
            Token::Extern => write!(f, "keyword 'extern'"),
            Token::If => write!(f, "keyword 'if'"),
            Token::Then => write!(f, "keyword 'then'"),
            Token::Else => write!(f, "keyword 'else'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Semicolon => write!(f, "';'"),
            Token::Operator(op) => write!(f, "operator '{}'", op),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Number(value) => write!(f, "number {}", value),
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, CompileError> {
    let mut lexer = Lexer::new(source);
    let mut lexemes = Vec::new();

    while let Some(lexeme) = lexer.next_lexeme()? {
        lexemes.push(lexeme);
    }

    debug!("lexed {} token(s)", lexemes.len());
    Ok(lexemes)
}

/// Только токены, без позиций
pub fn tokens(source: &str) -> Result<Vec<Token>, CompileError> {
    Ok(tokenize(source)?.into_iter().map(|lexeme| lexeme.token).collect())
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    source_len: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source_len: source.len(),
            line: 1,
            column: 1,
        }
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, CompileError> {
        self.skip_whitespace_and_comments();

        let Some(&(start, ch)) = self.chars.peek() else {
            return Ok(None);
        };
        let (line, column) = (self.line, self.column);

        if let Some((_, token)) = SINGLE_CHAR_TOKENS.iter().find(|(c, _)| *c == ch) {
            self.bump();
            return Ok(Some(Lexeme {
                token: token.clone(),
                span: Span::new(line, column, start, start + 1),
            }));
        }

        if ch.is_ascii_alphabetic() {
            let word = self.take_while(|c| c.is_ascii_alphanumeric());
            let token = KEYWORDS
                .iter()
                .find(|(keyword, _)| *keyword == word)
                .map(|(_, token)| token.clone())
                .unwrap_or(Token::Identifier(word));
            return Ok(Some(Lexeme {
                token,
                span: Span::new(line, column, start, self.offset()),
            }));
        }

        if ch.is_ascii_digit() {
            let literal = self.take_while(|c| c.is_ascii_digit() || c == '.');
            let span = Span::new(line, column, start, self.offset());
            return match literal.parse::<f64>() {
                Ok(value) => Ok(Some(Lexeme {
                    token: Token::Number(value),
                    span,
                })),
                Err(_) => Err(CompileError::InvalidNumber { literal, span }),
            };
        }

        // Неизвестный символ обрывает поток токенов, остаток исходника отбрасывается
        warn!(
            "unrecognized character '{}' at line {}, column {}: ignoring the rest of the input",
            ch, line, column
        );
        Ok(None)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            // is_ascii_whitespace не считает пробелом \x0B, а C isspace считает
            if ch.is_ascii_whitespace() || ch == '\x0B' {
                self.bump();
            } else if ch == '#' {
                // Комментарии - пропускаем до конца строки
                while let Some(&(_, ch)) = self.chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut text = String::new();

        while let Some(&(_, ch)) = self.chars.peek() {
            if !accept(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }

        text
    }

    fn bump(&mut self) {
        if let Some((_, ch)) = self.chars.next() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source_len, |&(offset, _)| offset)
    }
}

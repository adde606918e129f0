use log::debug;

use crate::error::CompileError;
use crate::ir::ast;
use super::lexer::{Lexeme, Token};

pub fn parse_tokens(tokens: Vec<Lexeme>) -> Result<ast::Program, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Lexeme>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Lexeme>) -> Self {
        Self { tokens, position: 0 }
    }

    fn parse_program(&mut self) -> Result<ast::Program, CompileError> {
        let mut program = ast::Program::default();

        while let Some(token) = self.peek() {
            match token {
                Token::Extern => {
                    let prototype = self.parse_extern()?;
                    program.add_extern(prototype);
                }
                Token::Def => {
                    let definition = self.parse_definition()?;
                    program.add_definition(definition);
                }
                _ => {
                    let expression = self.parse_expression()?;
                    self.expect(Token::Semicolon)?;
                    program.expressions.push(expression);
                }
            }
        }

        debug!(
            "parsed {} extern(s), {} definition(s), {} top-level expression(s)",
            program.externs.len(),
            program.definitions.len(),
            program.expressions.len()
        );
        Ok(program)
    }

    fn parse_extern(&mut self) -> Result<ast::Prototype, CompileError> {
        self.expect(Token::Extern)?;
        let prototype = self.parse_prototype()?;
        self.expect(Token::Semicolon)?;
        Ok(prototype)
    }

    fn parse_definition(&mut self) -> Result<ast::Definition, CompileError> {
        self.expect(Token::Def)?;
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        self.expect(Token::Semicolon)?;
        Ok(ast::Definition { prototype, body })
    }

    fn parse_prototype(&mut self) -> Result<ast::Prototype, CompileError> {
        let name = self.parse_identifier()?;

        self.expect(Token::LParen)?;
        let params = self.parse_comma_separated(Self::parse_identifier)?;
        self.expect(Token::RParen)?;

        Ok(ast::Prototype { name, params })
    }

    /// Одно правило на все выражения. Правый операнд бинарной операции - снова
    /// полное выражение, поэтому цепочки правоассоциативны и без приоритетов:
    /// `a - b - c` это `a - (b - c)`.
    fn parse_expression(&mut self) -> Result<ast::Expression, CompileError> {
        let left = self.parse_primary()?;

        if let Some(&Token::Operator(op)) = self.peek() {
            self.advance(); // consume operator
            let right = self.parse_expression()?;
            return Ok(ast::Expression::binary(left, op, right));
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<ast::Expression, CompileError> {
        let Some(lexeme) = self.tokens.get(self.position) else {
            return Err(CompileError::UnexpectedEof {
                expected: "an expression".to_string(),
            });
        };

        match &lexeme.token {
            Token::LParen => {
                self.advance(); // consume '('
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Number(value) => {
                let value = *value;
                self.advance();
                Ok(ast::Expression::Number(value))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                if let Some(Token::LParen) = self.peek() {
                    self.advance(); // consume '('
                    let args = self.parse_comma_separated(Self::parse_expression)?;
                    self.expect(Token::RParen)?;
                    Ok(ast::Expression::Call { callee: name, args })
                } else {
                    Ok(ast::Expression::Variable(name))
                }
            }
            Token::If => {
                self.advance(); // consume 'if'
                let condition = self.parse_expression()?;
                self.expect(Token::Then)?;
                let then_branch = self.parse_expression()?;
                self.expect(Token::Else)?;
                let else_branch = self.parse_expression()?;
                Ok(ast::Expression::IfElse {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                })
            }
            other => Err(CompileError::UnexpectedToken {
                found: other.clone(),
                expected: "an expression".to_string(),
                span: lexeme.span,
            }),
        }
    }

    /// Термы через запятую до закрывающей скобки; сама `)` не потребляется
    fn parse_comma_separated<T>(
        &mut self,
        parse_term: fn(&mut Self) -> Result<T, CompileError>,
    ) -> Result<Vec<T>, CompileError> {
        let mut terms = Vec::new();

        while let Some(token) = self.peek() {
            if *token == Token::RParen {
                break;
            }
            terms.push(parse_term(self)?);
            if let Some(Token::Comma) = self.peek() {
                self.advance(); // consume ','
            }
        }

        Ok(terms)
    }

    fn parse_identifier(&mut self) -> Result<String, CompileError> {
        match self.advance() {
            Some(Lexeme { token: Token::Identifier(name), .. }) => Ok(name.clone()),
            Some(lexeme) => Err(CompileError::UnexpectedToken {
                found: lexeme.token.clone(),
                expected: "an identifier".to_string(),
                span: lexeme.span,
            }),
            None => Err(CompileError::UnexpectedEof {
                expected: "an identifier".to_string(),
            }),
        }
    }

    // Вспомогательные методы
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|lexeme| &lexeme.token)
    }

    fn advance(&mut self) -> Option<&Lexeme> {
        let lexeme = self.tokens.get(self.position);
        if lexeme.is_some() {
            self.position += 1;
        }
        lexeme
    }

    fn expect(&mut self, expected: Token) -> Result<(), CompileError> {
        match self.advance() {
            Some(lexeme) if lexeme.token == expected => Ok(()),
            Some(lexeme) => Err(CompileError::UnexpectedToken {
                found: lexeme.token.clone(),
                expected: expected.to_string(),
                span: lexeme.span,
            }),
            None => Err(CompileError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{BinaryOperator, Expression};
    use crate::parser::lexer::tokenize;

    fn parse(source: &str) -> Result<ast::Program, CompileError> {
        parse_tokens(tokenize(source)?)
    }

    #[test]
    fn empty_input_is_an_empty_program() {
        let program = parse("").unwrap();
        assert!(program.externs.is_empty());
        assert!(program.definitions.is_empty());
        assert!(program.expressions.is_empty());
    }

    #[test]
    fn call_with_nested_arguments() {
        let program = parse("f(1, g(x), (2));").unwrap();
        assert_eq!(
            program.expressions,
            vec![Expression::Call {
                callee: "f".to_string(),
                args: vec![
                    Expression::Number(1.0),
                    Expression::Call {
                        callee: "g".to_string(),
                        args: vec![Expression::variable("x")],
                    },
                    Expression::Number(2.0),
                ],
            }]
        );
    }

    #[test]
    fn parenthesized_left_operand_groups() {
        let program = parse("(a - b) - c;").unwrap();
        assert_eq!(
            program.expressions[0],
            Expression::binary(
                Expression::binary(
                    Expression::variable("a"),
                    BinaryOperator::Subtract,
                    Expression::variable("b"),
                ),
                BinaryOperator::Subtract,
                Expression::variable("c"),
            )
        );
    }

    #[test]
    fn missing_comma_is_tolerated() {
        let program = parse("extern f(a b);").unwrap();
        assert_eq!(program.externs[0].params, vec!["a", "b"]);
    }

    #[test]
    fn missing_semicolon_reports_eof() {
        let err = parse("1 + 2").unwrap_err();
        match err {
            CompileError::UnexpectedEof { expected } => assert_eq!(expected, "';'"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stray_token_reports_position() {
        let err = parse("def f(x)\n  then;").unwrap_err();
        match err {
            CompileError::UnexpectedToken { found, span, .. } => {
                assert_eq!(found, Token::Then);
                assert_eq!((span.line, span.column), (2, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn prototype_needs_identifier_name() {
        let err = parse("extern 1(x);").unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnexpectedToken { found: Token::Number(_), .. }
        ));
    }
}

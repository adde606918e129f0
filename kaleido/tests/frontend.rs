use kaleido::ir::ast::{BinaryOperator, Expression, Prototype};
use kaleido::parser::lexer::{Token, tokens};
use kaleido::parser::parse;

// ── Лексер ───────────────────────────────────────────────────────────────

#[test]
fn punctuation_and_operators_lex_to_one_token_each() {
    let cases = [
        ("(", Token::LParen),
        (")", Token::RParen),
        (",", Token::Comma),
        (";", Token::Semicolon),
        ("+", Token::Operator(BinaryOperator::Add)),
        ("-", Token::Operator(BinaryOperator::Subtract)),
        ("*", Token::Operator(BinaryOperator::Multiply)),
        ("/", Token::Operator(BinaryOperator::Divide)),
        ("%", Token::Operator(BinaryOperator::Remainder)),
    ];
    for (source, expected) in cases {
        assert_eq!(tokens(source).unwrap(), vec![expected], "source {:?}", source);
    }
}

#[test]
fn tokenize_float_plus_integer() {
    assert_eq!(
        tokens("1.5 + 2").unwrap(),
        vec![
            Token::Number(1.5),
            Token::Operator(BinaryOperator::Add),
            Token::Number(2.0),
        ]
    );
}

// ── Парсер ───────────────────────────────────────────────────────────────

#[test]
fn parse_definition() {
    let program = parse("def foo(a, b) a + b;").unwrap();
    assert_eq!(program.definitions.len(), 1);

    let definition = &program.definitions[0];
    assert_eq!(
        definition.prototype,
        Prototype {
            name: "foo".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
        }
    );
    assert_eq!(
        definition.body,
        Expression::binary(
            Expression::variable("a"),
            BinaryOperator::Add,
            Expression::variable("b"),
        )
    );
    assert_eq!(program.prototype("foo"), Some(&definition.prototype));
}

#[test]
fn subtraction_chains_are_right_associative() {
    let program = parse("a - b - c;").unwrap();
    assert_eq!(
        program.expressions,
        vec![Expression::binary(
            Expression::variable("a"),
            BinaryOperator::Subtract,
            Expression::binary(
                Expression::variable("b"),
                BinaryOperator::Subtract,
                Expression::variable("c"),
            ),
        )]
    );
}

#[test]
fn no_operator_precedence() {
    // 2 * 3 + 4 это 2 * (3 + 4)
    let program = parse("2 * 3 + 4;").unwrap();
    assert_eq!(
        program.expressions[0],
        Expression::binary(
            Expression::Number(2.0),
            BinaryOperator::Multiply,
            Expression::binary(
                Expression::Number(3.0),
                BinaryOperator::Add,
                Expression::Number(4.0),
            ),
        )
    );
}

#[test]
fn if_then_else_expression() {
    let program = parse("if x then f(1) else 2;").unwrap();
    assert_eq!(
        program.expressions[0],
        Expression::IfElse {
            condition: Box::new(Expression::variable("x")),
            then_branch: Box::new(Expression::Call {
                callee: "f".to_string(),
                args: vec![Expression::Number(1.0)],
            }),
            else_branch: Box::new(Expression::Number(2.0)),
        }
    );
}

#[test]
fn items_keep_source_order_and_last_prototype_wins() {
    let program = parse("extern f(x); 1; def g() 2; def f(a, b) a; f(1, 2);").unwrap();
    assert_eq!(program.externs.len(), 1);
    assert_eq!(program.definitions.len(), 2);
    assert_eq!(program.expressions.len(), 2);
    assert_eq!(program.prototype("f").unwrap().params.len(), 2);
    assert!(program.prototype("g").unwrap().params.is_empty());
}

#[test]
fn sample_programs_parse() {
    for name in ["fib", "math", "assoc"] {
        let path = format!("../samples/{}.ks", name);
        let source = std::fs::read_to_string(&path).expect("failed to read sample");
        let program = parse(&source).unwrap_or_else(|e| panic!("{} should parse: {}", path, e));
        assert!(!program.expressions.is_empty());
    }
}

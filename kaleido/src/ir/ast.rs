use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct Program {
    /// extern sin(x);
    pub externs: Vec<Prototype>,
    /// def add(a, b) a + b;
    pub definitions: Vec<Definition>,
    /// Выражения верхнего уровня, вычисляются и печатаются по порядку
    pub expressions: Vec<Expression>,
    /// Все прототипы по имени; при совпадении имён побеждает последний
    pub prototypes: HashMap<String, Prototype>,
}

impl Program {
    pub fn add_extern(&mut self, prototype: Prototype) {
        self.prototypes.insert(prototype.name.clone(), prototype.clone());
        self.externs.push(prototype);
    }

    pub fn add_definition(&mut self, definition: Definition) {
        self.prototypes
            .insert(definition.prototype.name.clone(), definition.prototype.clone());
        self.definitions.push(definition);
    }

    pub fn prototype(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }
}

/// Имя функции и имена параметров (все значения - f64)
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub prototype: Prototype,
    pub body: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// 10, 1.5
    Number(f64),
    /// x
    Variable(String),
    /// a + b
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// foo(1, x)
    Call {
        callee: String,
        args: Vec<Expression>,
    },
    /// if x then 1 else 2
    IfElse {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn variable(name: &str) -> Self {
        Expression::Variable(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,       // +
    Subtract,  // -
    Multiply,  // *
    Divide,    // /
    Remainder, // %
}

impl BinaryOperator {
    pub fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
            Self::Remainder => '%',
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

//! Reverse polish notation operations over a stack snapshot.
//!
//! A [`Calculator`] is built from a copy of a stack's content, applies exactly
//! one [`Operator`] to the two topmost values and hands the new content back.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Multiply,
    #[serde(alias = "substract")]
    Subtract,
    Divide,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::Add,
        Operator::Multiply,
        Operator::Subtract,
        Operator::Divide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Subtract => "subtract",
            Self::Divide => "divide",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CalculatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "multiply" => Ok(Self::Multiply),
            "subtract" | "substract" => Ok(Self::Subtract),
            "divide" => Ok(Self::Divide),
            other => Err(CalculatorError::UnsupportedOperation {
                op: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    NotAList,
    NonNumericElement,
    TooFewElements,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAList => write!(f, "stack content should be a list"),
            Self::NonNumericElement => {
                write!(f, "all elements in the stack should be float or integer")
            }
            Self::TooFewElements => write!(f, "stack should contain at least two elements"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculatorError {
    Validation(ValidationError),
    DivisionByZero,
    UnsupportedOperation { op: String },
}

impl fmt::Display for CalculatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::DivisionByZero => write!(f, "cannot divide by 0"),
            Self::UnsupportedOperation { op } => write!(f, "operation not implemented: {op}"),
        }
    }
}

impl std::error::Error for CalculatorError {}

impl From<ValidationError> for CalculatorError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Checks that `value` is a list of numbers and returns it as `f64`s.
///
/// No length rule applies here; stored stacks may hold any number of values.
pub fn parse_content(value: &Value) -> Result<Vec<f64>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAList);
    };
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_f64().ok_or(ValidationError::NonNumericElement),
            _ => Err(ValidationError::NonNumericElement),
        })
        .collect()
}

#[derive(Debug)]
pub struct Calculator {
    content: Vec<f64>,
}

impl Calculator {
    pub fn new(content: Vec<f64>) -> Result<Self, CalculatorError> {
        if content.len() < 2 {
            return Err(ValidationError::TooFewElements.into());
        }
        Ok(Self { content })
    }

    /// Validates in order: list shape, element types, arity.
    pub fn from_value(value: &Value) -> Result<Self, CalculatorError> {
        Self::new(parse_content(value)?)
    }

    /// Pops `b` (top) then `a`, pushes `a op b` and returns the new content.
    ///
    /// Consumes the calculator: one instance serves exactly one operation.
    pub fn apply_operand(mut self, op: Operator) -> Result<Vec<f64>, CalculatorError> {
        let len = self.content.len();
        let (a, b) = (self.content[len - 2], self.content[len - 1]);

        let result = match op {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => {
                if b == 0.0 {
                    return Err(CalculatorError::DivisionByZero);
                }
                a / b
            }
        };
        self.content.truncate(len - 2);
        self.content.push(result);
        Ok(self.content)
    }
}

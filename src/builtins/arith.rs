//! `add`, `sub`, `mul`, `div`, `mod`.

use crate::error::{Error, Result};
use crate::expr::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(name: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Float(f) => Ok(Self::Float(*f)),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Self::Int)
                    .or_else(|_| s.parse::<f64>().map(Self::Float))
                    .map_err(|_| Error::evaluation(format!("{name}: `{s}` is not a number")))
            }
            other => Err(Error::evaluation(format!(
                "{name}: expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Op {
    pub(super) const ALL: [Op; 5] = [Op::Add, Op::Sub, Op::Mul, Op::Div, Op::Mod];

    pub(super) const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }

    fn apply(self, lhs: Number, rhs: Number) -> Result<Number> {
        match (lhs, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                let result = match self {
                    Self::Add => a.checked_add(b),
                    Self::Sub => a.checked_sub(b),
                    Self::Mul => a.checked_mul(b),
                    Self::Div | Self::Mod if b == 0 => {
                        return Err(Error::evaluation(format!("{}: division by zero", self.name())));
                    }
                    Self::Div => a.checked_div(b),
                    Self::Mod => a.checked_rem(b),
                };
                result
                    .map(Number::Int)
                    .ok_or_else(|| Error::evaluation(format!("{}: integer overflow", self.name())))
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Ok(Number::Float(match self {
                    Self::Add => a + b,
                    Self::Sub => a - b,
                    Self::Mul => a * b,
                    Self::Div => a / b,
                    Self::Mod => a % b,
                }))
            }
        }
    }

    /// Left fold over one or more numeric arguments.
    pub(super) fn fold(self, args: &[Value]) -> Result<Value> {
        let name = self.name();
        let Some((first, rest)) = args.split_first() else {
            return Err(Error::evaluation(format!("{name}: needs at least one argument")));
        };
        let mut acc = Number::from_value(name, first)?;
        for arg in rest {
            acc = self.apply(acc, Number::from_value(name, arg)?)?;
        }
        Ok(acc.into_value())
    }
}

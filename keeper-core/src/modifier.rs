//! Sheet edit modifiers.
//!
//! An edit is either a relative operation applied to the current value
//! (`+3`, `-1D`, `*2`, `/2`) or an absolute integer replacement (`45`).
//! Relative results are floored toward negative infinity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for modifier parsing and application.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModifierError {
    #[error("No modifier given")]
    Empty,
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Result out of range: {0}")]
    OutOfRange(f64),
}

/// A parsed edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    Add(f64),
    Subtract(f64),
    Multiply(f64),
    Divide(f64),
    Set(i32),
}

impl Modifier {
    /// Parse an edit string.
    pub fn parse(input: &str) -> Result<Self, ModifierError> {
        let input = input.trim();
        let mut chars = input.chars();
        let Some(first) = chars.next() else {
            return Err(ModifierError::Empty);
        };

        let operand = || -> Result<f64, ModifierError> {
            let rest = chars.as_str().trim();
            match rest.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(ModifierError::InvalidOperand(rest.to_string())),
            }
        };

        match first {
            '+' => Ok(Modifier::Add(operand()?)),
            '-' => Ok(Modifier::Subtract(operand()?)),
            '*' => Ok(Modifier::Multiply(operand()?)),
            '/' => Ok(Modifier::Divide(operand()?)),
            _ => {
                // Absolute values must be written exactly as an integer
                // would print, so "45abc" or "4.5" never slip through.
                match input.parse::<i32>() {
                    Ok(value) if value.to_string() == input => Ok(Modifier::Set(value)),
                    _ => Err(ModifierError::InvalidValue(input.to_string())),
                }
            }
        }
    }

    /// Apply this edit to a current value.
    pub fn apply(&self, current: i32) -> Result<i32, ModifierError> {
        let current = f64::from(current);
        let result = match *self {
            Modifier::Set(value) => return Ok(value),
            Modifier::Add(x) => current + x,
            Modifier::Subtract(x) => current - x,
            Modifier::Multiply(x) => current * x,
            Modifier::Divide(x) => {
                if x == 0.0 {
                    return Err(ModifierError::DivisionByZero);
                }
                current / x
            }
        };

        let floored = result.floor();
        if !floored.is_finite() || floored < f64::from(i32::MIN) || floored > f64::from(i32::MAX)
        {
            return Err(ModifierError::OutOfRange(result));
        }
        Ok(floored as i32)
    }
}

impl FromStr for Modifier {
    type Err = ModifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modifier::parse(s)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Add(x) => write!(f, "+{}", x),
            Modifier::Subtract(x) => write!(f, "-{}", x),
            Modifier::Multiply(x) => write!(f, "*{}", x),
            Modifier::Divide(x) => write!(f, "/{}", x),
            Modifier::Set(v) => write!(f, "{}", v),
        }
    }
}

/// Resolve raw operator input against a current value.
pub fn resolve(current: i32, input: &str) -> Result<i32, ModifierError> {
    Modifier::parse(input)?.apply(current)
}

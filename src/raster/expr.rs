//! Deferred per-pixel band algebra.
//!
//! An [`Expr`] describes how to compute one band from the bands of a source image; nothing is
//! computed until [`Expr::evaluate`] is called. An [`ImageExpr`] bundles several named
//! expressions so one pass over a source image yields a stacked multi-band result.
//!
//! No-data propagates through every operation: any operation with a no-data operand is
//! no-data, and results that are not finite (division by zero) become no-data too.

use std::ops::{Add, Div, Mul, Sub};

use crate::error::Result;

use super::{Band, RasterImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let value = match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Subtract => lhs - rhs,
            BinaryOp::Multiply => lhs * rhs,
            BinaryOp::Divide => {
                if rhs == 0.0 {
                    return None;
                }
                lhs / rhs
            }
        };

        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Band(String),
    Constant(f64),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// 1.0 where none of the bits in the mask are set, 0.0 otherwise.
    BitsClear(Box<Expr>, u64),
    /// The first expression where the second is valid and non-zero, no-data elsewhere.
    Masked(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn band(name: &str) -> Self {
        Expr::Band(name.to_string())
    }

    pub fn constant(value: f64) -> Self {
        Expr::Constant(value)
    }

    /// Validity predicate over an integer quality band: true where all `bits` are unset.
    pub fn bits_clear(self, bits: &[u8]) -> Self {
        let mask = bits.iter().fold(0u64, |acc, bit| acc | (1u64 << bit));
        Expr::BitsClear(Box::new(self), mask)
    }

    pub fn update_mask(self, mask: Expr) -> Self {
        Expr::Masked(Box::new(self), Box::new(mask))
    }

    /// Normalised difference `(self - other) / (self + other)`.
    pub fn normalized_difference(self, other: Expr) -> Self {
        (self.clone() - other.clone()) / (self + other)
    }

    pub fn evaluate(&self, image: &RasterImage) -> Result<Vec<Option<f64>>> {
        let values = match self {
            Expr::Band(name) => image.require_band(name)?.values.clone(),
            Expr::Constant(c) => vec![Some(*c); image.pixel_count()],
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(image)?;
                let rhs = rhs.evaluate(image)?;
                lhs.into_iter()
                    .zip(rhs)
                    .map(|pair| match pair {
                        (Some(a), Some(b)) => op.apply(a, b),
                        _ => None,
                    })
                    .collect()
            }
            Expr::BitsClear(input, mask) => input
                .evaluate(image)?
                .into_iter()
                .map(|v| v.map(|qa| if (qa as u64) & mask == 0 { 1.0 } else { 0.0 }))
                .collect(),
            Expr::Masked(input, mask) => {
                let input = input.evaluate(image)?;
                let mask = mask.evaluate(image)?;
                input
                    .into_iter()
                    .zip(mask)
                    .map(|pair| match pair {
                        (Some(v), Some(m)) if m != 0.0 => Some(v),
                        _ => None,
                    })
                    .collect()
            }
        };

        Ok(values)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Subtract);
impl_binary_op!(Mul, mul, BinaryOp::Multiply);
impl_binary_op!(Div, div, BinaryOp::Divide);

#[derive(Debug, Clone, Default, PartialEq)]
/// Named band expressions evaluated together against one source image.
pub struct ImageExpr {
    outputs: Vec<(String, Expr)>,
}

impl ImageExpr {
    pub fn new() -> Self {
        ImageExpr::default()
    }

    pub fn band(mut self, name: &str, expr: Expr) -> Self {
        self.outputs.push((name.to_string(), expr));
        self
    }

    pub fn output_bands(&self) -> Vec<&str> {
        self.outputs.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Evaluates every output band. The result keeps the source id, `time_start` and grid,
    /// but none of its bands or properties.
    pub fn evaluate(&self, image: &RasterImage) -> Result<RasterImage> {
        let mut result = image.empty_like();
        for (name, expr) in &self.outputs {
            result.add_band(Band::new(name, expr.evaluate(image)?))?;
        }

        Ok(result)
    }
}

// -- Tests -------------------------------------------------------------------

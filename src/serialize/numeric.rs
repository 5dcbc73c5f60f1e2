//! Integer and floating point serializers with range-checked coercion.

use std::marker::PhantomData;

use crate::error::{SerializationError, SerializationResult};
use crate::node::{Scalar, ScalarKind};
use crate::serialize::ScalarSerializer;
use crate::types::{TypeToken, Typed};

/// Intermediate form of any numeric input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i128),
    Float(f64),
}

/// Parse numeric text.
///
/// Accepts a sign, the radix prefixes `0x`, `#` and `0b`, an optional type
/// suffix (`b`, `s`, `i`, `l` for integers, `f`, `d` for floats) and an
/// unsigned marker `u` before the type suffix.
pub fn parse_number(input: &str) -> Option<Number> {
    let text = input.trim();
    if text.is_empty() {
        return None;
    }
    parse_integer(text).or_else(|| parse_float(text))
}

fn parse_integer(text: &str) -> Option<Number> {
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(d) = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
        .or_else(|| rest.strip_prefix('#'))
    {
        (16, d)
    } else if let Some(d) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, d)
    } else {
        (10, rest)
    };
    // b/B are hex digits, so they only count as a suffix outside hex.
    let suffixes: &[char] = if radix == 16 {
        &['l', 'L', 's', 'S', 'i', 'I']
    } else {
        &['l', 'L', 's', 'S', 'i', 'I', 'b', 'B']
    };
    let digits = digits.strip_suffix(suffixes).unwrap_or(digits);
    let digits = digits.strip_suffix(&['u', 'U'][..]).unwrap_or(digits);
    if digits.is_empty() || digits.starts_with(&['+', '-'][..]) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(Number::Integer(if negative { -magnitude } else { magnitude }))
}

fn parse_float(text: &str) -> Option<Number> {
    let body = text.strip_suffix(&['f', 'F', 'd', 'D'][..]).unwrap_or(text);
    body.parse::<f64>().ok().map(Number::Float)
}

fn number_of(raw: &Scalar, target: &'static str) -> SerializationResult<Number> {
    match raw {
        Scalar::Float(v) => Ok(Number::Float(f64::from(*v))),
        Scalar::Double(v) => Ok(Number::Float(*v)),
        Scalar::String(s) => parse_number(s).ok_or_else(|| SerializationError::coercion(s, target)),
        other => other
            .as_integer()
            .map(|v| Number::Integer(i128::from(v)))
            .ok_or_else(|| SerializationError::coercion(other, target)),
    }
}

fn integral(value: f64, target: &'static str) -> SerializationResult<i128> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i128)
    } else {
        Err(SerializationError::coercion(value, target))
    }
}

fn out_of_range(value: impl std::fmt::Display, target: &str, min: impl std::fmt::Display, max: impl std::fmt::Display) -> SerializationError {
    SerializationError::coercion(
        format!("{value} is out of range"),
        format!("{target} ([{min},{max}])"),
    )
}

const EXACT_DOUBLE_LIMIT: i128 = 1 << 53;

fn integer_scalar(value: i128, own: Option<ScalarKind>, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
    let candidates = own
        .into_iter()
        .chain([ScalarKind::Int, ScalarKind::Long]);
    for kind in candidates {
        if !accepts(kind) {
            continue;
        }
        let fitted = match kind {
            ScalarKind::Byte => i8::try_from(value).ok().map(Scalar::Byte),
            ScalarKind::Short => i16::try_from(value).ok().map(Scalar::Short),
            ScalarKind::Int => i32::try_from(value).ok().map(Scalar::Int),
            ScalarKind::Long => i64::try_from(value).ok().map(Scalar::Long),
            _ => None,
        };
        if let Some(scalar) = fitted {
            return scalar;
        }
    }
    if accepts(ScalarKind::Double) && value.abs() <= EXACT_DOUBLE_LIMIT {
        return Scalar::Double(value as f64);
    }
    Scalar::String(value.to_string())
}

/// Numeric types with checked conversion from any numeric input.
pub trait Numeric: Typed + Copy {
    /// Short type name used in error messages.
    const NAME: &'static str;

    fn from_number(number: Number) -> SerializationResult<Self>;

    fn to_scalar(self, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar;
}

macro_rules! integers {
    ($($ty:ty => $name:literal, $own:expr;)*) => {
        $(
            impl Numeric for $ty {
                const NAME: &'static str = $name;

                fn from_number(number: Number) -> SerializationResult<Self> {
                    let value = match number {
                        Number::Integer(v) => v,
                        Number::Float(f) => integral(f, $name)?,
                    };
                    <$ty>::try_from(value)
                        .map_err(|_| out_of_range(value, $name, <$ty>::MIN, <$ty>::MAX))
                }

                fn to_scalar(self, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
                    integer_scalar(self as i128, $own, accepts)
                }
            }
        )*
    };
}

integers! {
    i8 => "i8", Some(ScalarKind::Byte);
    i16 => "i16", Some(ScalarKind::Short);
    i32 => "i32", Some(ScalarKind::Int);
    i64 => "i64", Some(ScalarKind::Long);
    isize => "isize", Some(ScalarKind::Long);
    u8 => "u8", None;
    u16 => "u16", None;
    u32 => "u32", None;
    u64 => "u64", None;
    usize => "usize", None;
}

impl Numeric for f32 {
    const NAME: &'static str = "f32";

    fn from_number(number: Number) -> SerializationResult<Self> {
        match number {
            Number::Integer(v) => Ok(v as f32),
            Number::Float(f) if f.is_finite() && f.abs() > f64::from(f32::MAX) => {
                Err(out_of_range(f, Self::NAME, f32::MIN, f32::MAX))
            }
            Number::Float(f) => Ok(f as f32),
        }
    }

    fn to_scalar(self, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        if accepts(ScalarKind::Float) {
            Scalar::Float(self)
        } else if accepts(ScalarKind::Double) {
            Scalar::Double(f64::from(self))
        } else {
            Scalar::String(self.to_string())
        }
    }
}

impl Numeric for f64 {
    const NAME: &'static str = "f64";

    fn from_number(number: Number) -> SerializationResult<Self> {
        match number {
            Number::Integer(v) => Ok(v as f64),
            Number::Float(f) => Ok(f),
        }
    }

    fn to_scalar(self, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        if accepts(ScalarKind::Double) {
            Scalar::Double(self)
        } else if accepts(ScalarKind::Float) && f64::from(self as f32) == self {
            Scalar::Float(self as f32)
        } else {
            Scalar::String(self.to_string())
        }
    }
}

/// Serializer for any [`Numeric`] type.
pub struct NumericSerializer<T>(PhantomData<fn() -> T>);

impl<T> NumericSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for NumericSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> ScalarSerializer for NumericSerializer<T> {
    type Value = T;

    fn deserialize(&self, _ty: &TypeToken, raw: &Scalar) -> SerializationResult<T> {
        T::from_number(number_of(raw, T::NAME)?)
    }

    fn serialize(&self, value: &T, accepts: &dyn Fn(ScalarKind) -> bool) -> Scalar {
        value.to_scalar(accepts)
    }
}

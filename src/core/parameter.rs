//! Named, domain-constrained parameter cells (§4.1).
//!
//! A [`Parameter`] holds one of `{integer, floating, enumeration}` values
//! together with an admissible domain expressed as left/right bounds, each
//! tagged [`Bound::Le`] (closed) or [`Bound::Lt`] (open). Setting a value
//! outside the domain fails with [`ParameterError::InvalidValue`].

use std::fmt;

use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::ParameterError;

/// One edge of a parameter's admissible interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound<T> {
    /// Closed bound: the edge value itself is admissible.
    Le(T),
    /// Open bound: the edge value itself is not admissible.
    Lt(T),
}

impl<T: PartialOrd + Copy> Bound<T> {
    fn value(&self) -> T {
        match *self {
            Bound::Le(v) | Bound::Lt(v) => v,
        }
    }

    /// `true` iff `x` is on the admissible side of this bound, acting as a
    /// left edge (`bound <= x` / `bound < x`).
    fn admits_as_left(&self, x: T) -> bool {
        match self {
            Bound::Le(v) => *v <= x,
            Bound::Lt(v) => *v < x,
        }
    }

    /// `true` iff `x` is on the admissible side of this bound, acting as a
    /// right edge (`x <= bound` / `x < bound`).
    fn admits_as_right(&self, x: T) -> bool {
        match self {
            Bound::Le(v) => x <= *v,
            Bound::Lt(v) => x < *v,
        }
    }
}

/// A domain an interval `[a, LE|LT, b]` together with the value kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Integer domain bounded by `[left, right]`.
    Int { left: Bound<i64>, right: Bound<i64> },
    /// Floating-point domain bounded by `[left, right]`.
    Float { left: Bound<f64>, right: Bound<f64> },
    /// Enumeration domain: the admissible string labels and their integer codes.
    Enum { variants: Vec<String> },
}

impl Domain {
    /// Unbounded integer domain, `(-inf, inf)`.
    pub fn any_int() -> Self {
        Domain::Int {
            left: Bound::Le(i64::MIN),
            right: Bound::Le(i64::MAX),
        }
    }

    /// Unbounded float domain, `(-inf, inf)`.
    pub fn any_float() -> Self {
        Domain::Float {
            left: Bound::Lt(f64::NEG_INFINITY),
            right: Bound::Lt(f64::INFINITY),
        }
    }

    /// Closed interval `[lo, hi]` of integers.
    pub fn int_range(lo: i64, hi: i64) -> Self {
        Domain::Int {
            left: Bound::Le(lo),
            right: Bound::Le(hi),
        }
    }

    /// Closed interval `[lo, hi]` of floats.
    pub fn float_range(lo: f64, hi: f64) -> Self {
        Domain::Float {
            left: Bound::Le(lo),
            right: Bound::Le(hi),
        }
    }

    /// Open-left / closed-right interval `(lo, hi]`, useful for step sizes
    /// and ratios that must be strictly positive.
    pub fn positive_float(hi: f64) -> Self {
        Domain::Float {
            left: Bound::Lt(0.0),
            right: Bound::Le(hi),
        }
    }

    fn enumeration(variants: &[&str]) -> Self {
        Domain::Enum {
            variants: variants.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build an enumeration domain from string labels.
    pub fn enum_of(variants: &[&str]) -> Self {
        Self::enumeration(variants)
    }
}

/// The literal value held by a [`Parameter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Enum(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Enum(v) => write!(f, "{v}"),
        }
    }
}

/// A named cell holding a value and its admissible domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: ParamValue,
    domain: Domain,
}

impl Parameter {
    /// Creates an integer parameter, failing if `default` is out of `domain`.
    pub fn int(name: impl Into<String>, default: i64, domain: Domain) -> Result<Self, Problem> {
        Self::new(name, ParamValue::Int(default), domain)
    }

    /// Creates a floating-point parameter, failing if `default` is out of `domain`.
    pub fn float(name: impl Into<String>, default: f64, domain: Domain) -> Result<Self, Problem> {
        Self::new(name, ParamValue::Float(default), domain)
    }

    /// Creates an enumeration parameter, failing if `default` is not one of `variants`.
    pub fn enum_value(
        name: impl Into<String>,
        default: impl Into<String>,
        variants: &[&str],
    ) -> Result<Self, Problem> {
        Self::new(
            name,
            ParamValue::Enum(default.into()),
            Domain::enum_of(variants),
        )
    }

    fn new(name: impl Into<String>, value: ParamValue, domain: Domain) -> Result<Self, Problem> {
        let name = name.into();
        let param = Self {
            name: name.clone(),
            value,
            domain,
        };
        param.validate(&param.value).via(ParameterError::InvalidValue { name })?;
        Ok(param)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            ParamValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match &self.value {
            ParamValue::Enum(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Sets the value, verifying it lies within the admissible domain
    /// bit-exactly at both the `Le`/`Lt` edges.
    pub fn set(&mut self, value: ParamValue) -> Result<(), Problem> {
        self.validate(&value).via(ParameterError::InvalidValue {
            name: self.name.clone(),
        })?;
        self.value = value;
        Ok(())
    }

    fn validate(&self, value: &ParamValue) -> Result<(), ()> {
        match (&self.domain, value) {
            (Domain::Int { left, right }, ParamValue::Int(v)) => {
                if left.admits_as_left(*v) && right.admits_as_right(*v) {
                    Ok(())
                } else {
                    Err(())
                }
            }
            (Domain::Float { left, right }, ParamValue::Float(v)) => {
                if left.admits_as_left(*v) && right.admits_as_right(*v) {
                    Ok(())
                } else {
                    Err(())
                }
            }
            (Domain::Float { left, right }, ParamValue::Int(v)) => {
                let v = *v as f64;
                if left.admits_as_left(v) && right.admits_as_right(v) {
                    Ok(())
                } else {
                    Err(())
                }
            }
            (Domain::Enum { variants }, ParamValue::Enum(v)) => {
                if variants.iter().any(|s| s == v) {
                    Ok(())
                } else {
                    Err(())
                }
            }
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_value_outside_closed_domain() {
        let mut p = Parameter::int("max_evals", 100, Domain::int_range(1, 1000)).unwrap();
        assert!(p.set(ParamValue::Int(0)).is_err());
        assert!(p.set(ParamValue::Int(1)).is_ok());
        assert!(p.set(ParamValue::Int(1000)).is_ok());
        assert!(p.set(ParamValue::Int(1001)).is_err());
    }

    #[test]
    fn respects_open_bound_exactly() {
        let mut p = Parameter::float("epsilon", 1e-8, Domain::positive_float(1.0)).unwrap();
        assert!(p.set(ParamValue::Float(0.0)).is_err());
        assert!(p.set(ParamValue::Float(f64::MIN_POSITIVE)).is_ok());
        assert!(p.set(ParamValue::Float(1.0)).is_ok());
    }

    #[test]
    fn rejects_unknown_enum_variant() {
        let mut p = Parameter::enum_value("lsearch0", "quadratic", &["constant", "quadratic", "cgdescent"]).unwrap();
        assert!(p.set(ParamValue::Enum("bogus".to_string())).is_err());
        assert!(p.set(ParamValue::Enum("cgdescent".to_string())).is_ok());
    }
}

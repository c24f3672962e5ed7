// Copyright 2022 Lucas Javaudin
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode

//! Definition of types representing values expressed in a given unit.
//!
//! The types assume the following units:
//!
//! - [Length]: in meters
//! - [Time]: in seconds
//! - [Speed]: in meter per second
//! - [Flow]: in vehicle per second
//! - [Density]: in vehicle per meter
//!
//! Other units can be assumed but the coherence between units must be kept.
//!
//! Vehicle counts (cumulative curves, outflow budgets) are plain `f64` values
//! and are not wrapped.
use std::fmt;
use std::ops::*;

use num_traits::Zero;
use serde_derive::{Deserialize, Serialize};

macro_rules! impl_unit(
    ( $( $t:ident ),* ) => {
        $(
            #[derive(
                Clone, Copy, Debug, Default, PartialEq, PartialOrd, Deserialize, Serialize,
            )]
            pub struct $t(pub f64);

            impl Add for $t {
                type Output = Self;
                fn add(self, rhs: Self) -> Self::Output {
                    Self(self.0 + rhs.0)
                }
            }

            impl AddAssign for $t {
                fn add_assign(&mut self, rhs: Self) {
                    self.0 += rhs.0;
                }
            }

            impl Sub for $t {
                type Output = Self;
                fn sub(self, rhs: Self) -> Self::Output {
                    Self(self.0 - rhs.0)
                }
            }

            impl SubAssign for $t {
                fn sub_assign(&mut self, rhs: Self) {
                    self.0 -= rhs.0;
                }
            }

            impl Neg for $t {
                type Output = Self;
                fn neg(self) -> Self::Output {
                    Self(-self.0)
                }
            }

            impl Mul<f64> for $t {
                type Output = Self;
                fn mul(self, rhs: f64) -> Self::Output {
                    Self(self.0 * rhs)
                }
            }

            impl Div<f64> for $t {
                type Output = Self;
                fn div(self, rhs: f64) -> Self::Output {
                    Self(self.0 / rhs)
                }
            }

            impl Zero for $t {
                fn zero() -> Self {
                    Self(0.0)
                }
                fn is_zero(&self) -> bool {
                    self.0 == 0.0
                }
            }

            impl fmt::Display for $t {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    self.0.fmt(f)
                }
            }

            impl $t {
                /// Returns `true` if the two values are equal up to a small tolerance.
                pub fn approx_eq(&self, other: &Self) -> bool {
                    (self.0 - other.0).abs() <= 1e-9 + 1e-6 * other.0.abs()
                }

                /// Returns `true` if the value is neither infinite nor NaN.
                pub fn is_finite(&self) -> bool {
                    self.0.is_finite()
                }
            }
        )*
    }
);

impl_unit!(Time, Length, Speed, Flow, Density);

impl Mul<Time> for Speed {
    type Output = Length;
    fn mul(self, rhs: Time) -> Self::Output {
        Length(self.0 * rhs.0)
    }
}

impl Mul<Speed> for Time {
    type Output = Length;
    fn mul(self, rhs: Speed) -> Self::Output {
        Length(self.0 * rhs.0)
    }
}

impl Div<Speed> for Length {
    type Output = Time;
    fn div(self, rhs: Speed) -> Self::Output {
        Time(self.0 / rhs.0)
    }
}

impl Div<Time> for Length {
    type Output = Speed;
    fn div(self, rhs: Time) -> Self::Output {
        Speed(self.0 / rhs.0)
    }
}

impl Div for Time {
    type Output = f64;
    fn div(self, rhs: Time) -> Self::Output {
        self.0 / rhs.0
    }
}

impl Mul<Time> for Flow {
    /// A flow sustained for some duration yields a vehicle count.
    type Output = f64;
    fn mul(self, rhs: Time) -> Self::Output {
        self.0 * rhs.0
    }
}

impl Flow {
    /// Returns a [Flow] representing an unbounded capacity.
    pub const fn infinity() -> Self {
        Flow(f64::INFINITY)
    }
}

impl Density {
    /// Returns the spacing occupied by a single vehicle at this density.
    pub fn spacing(self) -> Length {
        Length(1.0 / self.0)
    }
}

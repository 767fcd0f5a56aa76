// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Short-Weierstrass curve arithmetic, the Simplified SWU map, and the
//! SEC1 compressed codec, shared by the P-256/P-384/P-521 and secp256k1
//! backends.
//!
//! All supported curves have cofactor 1 and `p ≡ 3 (mod 4)`, which this
//! module assumes: cofactor clearing is a no-op and square roots are a
//! single exponentiation.

use num_bigint::BigUint;
use num_traits::Zero;
use subtle::Choice;

use crate::errors::ProtocolError;
use crate::group::expand::expand_message_xmd;
use crate::group::field;
use crate::hash::Hash;

/// The rational 3-isogeny used by curves (secp256k1) whose SSWU map runs
/// on an isogenous curve E'. Denominator polynomials are monic, so only
/// the lower coefficients are stored.
pub(crate) struct Isogeny {
    /// A coefficient of E'.
    pub(crate) a: BigUint,
    /// B coefficient of E'.
    pub(crate) b: BigUint,
    pub(crate) x_num: [BigUint; 4],
    pub(crate) x_den: [BigUint; 2],
    pub(crate) y_num: [BigUint; 4],
    pub(crate) y_den: [BigUint; 3],
}

/// Domain parameters for one short-Weierstrass curve, plus its
/// hash-to-curve suite constants.
pub(crate) struct CurveParams {
    pub(crate) p: BigUint,
    pub(crate) a: BigUint,
    pub(crate) b: BigUint,
    pub(crate) n: BigUint,
    pub(crate) gx: BigUint,
    pub(crate) gy: BigUint,
    /// The SSWU constant Z (already reduced mod p); applies to E', not the
    /// target curve, when `iso` is present.
    pub(crate) z: BigUint,
    /// Field element width in bytes.
    pub(crate) fe_len: usize,
    /// `hash_to_field` expansion length per element.
    pub(crate) l: usize,
    pub(crate) iso: Option<Isogeny>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl CurveParams {
    pub(crate) fn generator(&self) -> Point {
        Point::Affine {
            x: self.gx.clone(),
            y: self.gy.clone(),
        }
    }

    pub(crate) fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                let lhs = field::sqr(y, &self.p);
                let rhs = self.curve_equation(x);
                lhs == rhs
            }
        }
    }

    /// `x^3 + a*x + b mod p`.
    fn curve_equation(&self, x: &BigUint) -> BigUint {
        let x2 = field::sqr(x, &self.p);
        let x3 = field::mul(&x2, x, &self.p);
        let ax = field::mul(&self.a, x, &self.p);
        field::add(&field::add(&x3, &ax, &self.p), &self.b, &self.p)
    }

    pub(crate) fn add(&self, lhs: &Point, rhs: &Point) -> Point {
        let p = &self.p;
        let (x1, y1) = match lhs {
            Point::Infinity => return rhs.clone(),
            Point::Affine { x, y } => (x, y),
        };
        let (x2, y2) = match rhs {
            Point::Infinity => return lhs.clone(),
            Point::Affine { x, y } => (x, y),
        };

        if x1 == x2 {
            if *y1 == field::neg(y2, p) {
                return Point::Infinity;
            }
            return self.double(lhs);
        }

        let slope = field::mul(
            &field::sub(y2, y1, p),
            &field::inv0(&field::sub(x2, x1, p), p),
            p,
        );
        let x3 = field::sub(&field::sub(&field::sqr(&slope, p), x1, p), x2, p);
        let y3 = field::sub(&field::mul(&slope, &field::sub(x1, &x3, p), p), y1, p);
        Point::Affine { x: x3, y: y3 }
    }

    pub(crate) fn double(&self, point: &Point) -> Point {
        let p = &self.p;
        let (x1, y1) = match point {
            Point::Infinity => return Point::Infinity,
            Point::Affine { x, y } => (x, y),
        };
        if y1.is_zero() {
            return Point::Infinity;
        }
        // slope = (3*x1^2 + a) / (2*y1)
        let three_x2 = field::mul(&BigUint::from(3u32), &field::sqr(x1, p), p);
        let numer = field::add(&three_x2, &self.a, p);
        let denom = field::inv0(&field::mul(&BigUint::from(2u32), y1, p), p);
        let slope = field::mul(&numer, &denom, p);
        let x3 = field::sub(&field::sub(&field::sqr(&slope, p), x1, p), x1, p);
        let y3 = field::sub(&field::mul(&slope, &field::sub(x1, &x3, p), p), y1, p);
        Point::Affine { x: x3, y: y3 }
    }

    pub(crate) fn scalar_mul(&self, scalar: &BigUint, point: &Point) -> Point {
        let k = scalar % &self.n;
        let mut acc = Point::Infinity;
        let bits = k.bits();
        for i in (0..bits).rev() {
            acc = self.double(&acc);
            if k.bit(i) {
                acc = self.add(&acc, point);
            }
        }
        acc
    }

    // SEC1 compressed codec

    pub(crate) fn serialize(&self, point: &Point) -> Result<Vec<u8>, ProtocolError> {
        match point {
            Point::Infinity => Err(ProtocolError::InvalidPoint),
            Point::Affine { x, y } => {
                let mut out = Vec::with_capacity(1 + self.fe_len);
                out.push(if y.bit(0) { 0x03 } else { 0x02 });
                out.extend_from_slice(&field::i2osp(x, self.fe_len)?);
                Ok(out)
            }
        }
    }

    pub(crate) fn deserialize(&self, bytes: &[u8]) -> Result<Point, ProtocolError> {
        if bytes.len() != 1 + self.fe_len {
            return Err(ProtocolError::InvalidPoint);
        }
        let y_is_odd = match bytes[0] {
            0x02 => false,
            0x03 => true,
            _ => return Err(ProtocolError::InvalidPoint),
        };
        let x = field::os2ip(&bytes[1..]);
        if x >= self.p {
            return Err(ProtocolError::InvalidPoint);
        }
        let rhs = self.curve_equation(&x);
        if !field::is_square(&rhs, &self.p) {
            return Err(ProtocolError::InvalidPoint);
        }
        let mut y = field::sqrt_3mod4(&rhs, &self.p);
        if field::sqr(&y, &self.p) != rhs {
            return Err(ProtocolError::InvalidPoint);
        }
        if y.bit(0) != y_is_odd {
            y = field::neg(&y, &self.p);
        }
        if y.bit(0) != y_is_odd {
            // Only reachable for y = 0, which no odd-order curve contains.
            return Err(ProtocolError::InvalidPoint);
        }
        Ok(Point::Affine { x, y })
    }

    // RFC 9380 pipeline

    pub(crate) fn hash_to_field<D: Hash>(
        &self,
        msg: &[&[u8]],
        dst: &[u8],
        count: usize,
    ) -> Result<Vec<BigUint>, ProtocolError> {
        let uniform = expand_message_xmd::<D>(msg, dst, count * self.l)?;
        Ok((0..count)
            .map(|i| field::os2ip(&uniform[i * self.l..(i + 1) * self.l]) % &self.p)
            .collect())
    }

    pub(crate) fn hash_to_scalar<D: Hash>(
        &self,
        msg: &[&[u8]],
        dst: &[u8],
    ) -> Result<BigUint, ProtocolError> {
        let uniform = expand_message_xmd::<D>(msg, dst, self.l)?;
        Ok(field::os2ip(&uniform) % &self.n)
    }

    pub(crate) fn hash_to_curve<D: Hash>(
        &self,
        msg: &[&[u8]],
        dst: &[u8],
    ) -> Result<Point, ProtocolError> {
        let u = self.hash_to_field::<D>(msg, dst, 2)?;
        let q0 = self.map_to_curve(&u[0]);
        let q1 = self.map_to_curve(&u[1]);
        // Cofactor clearing is the identity map on these h = 1 curves.
        let r = self.add(&q0, &q1);
        match r {
            // Q0 = -Q1 has cryptographically negligible probability for
            // a random-oracle output; treat it as a malformed element.
            Point::Infinity => Err(ProtocolError::InvalidPoint),
            point => Ok(point),
        }
    }

    /// Simplified SWU (RFC 9380 §6.6.2) followed by the 3-isogeny where
    /// the suite defines one.
    pub(crate) fn map_to_curve(&self, u: &BigUint) -> Point {
        let (a, b) = match &self.iso {
            Some(iso) => (&iso.a, &iso.b),
            None => (&self.a, &self.b),
        };
        let p = &self.p;

        // tv1 = inv0(Z^2 * u^4 + Z * u^2)
        let zu2 = field::mul(&self.z, &field::sqr(u, p), p);
        let tv1 = field::inv0(&field::add(&field::sqr(&zu2, p), &zu2, p), p);

        let minus_b_over_a = field::mul(
            &field::neg(b, p),
            &field::inv0(a, p),
            p,
        );
        let x1 = if tv1.is_zero() {
            // x1 = B / (Z * A)
            field::mul(
                b,
                &field::inv0(&field::mul(&self.z, a, p), p),
                p,
            )
        } else {
            field::mul(
                &minus_b_over_a,
                &field::add(&BigUint::from(1u32), &tv1, p),
                p,
            )
        };

        let gx1 = {
            let x2 = field::sqr(&x1, p);
            let x3 = field::mul(&x2, &x1, p);
            field::add(&field::add(&x3, &field::mul(a, &x1, p), p), b, p)
        };
        let x2 = field::mul(&zu2, &x1, p);
        let gx2 = {
            let xx = field::sqr(&x2, p);
            let x3 = field::mul(&xx, &x2, p);
            field::add(&field::add(&x3, &field::mul(a, &x2, p), p), b, p)
        };

        let gx1_is_square = Choice::from(field::is_square(&gx1, p) as u8);
        let x = field::ct_select(&x2, &x1, gx1_is_square, self.fe_len);
        let gx = field::ct_select(&gx2, &gx1, gx1_is_square, self.fe_len);
        let mut y = field::sqrt_3mod4(&gx, p);

        // sgn0(u) == sgn0(y)
        if u.bit(0) != y.bit(0) {
            y = field::neg(&y, p);
        }

        match &self.iso {
            Some(iso) => self.iso_map(iso, &x, &y),
            None => Point::Affine { x, y },
        }
    }

    /// Evaluates the rational isogeny map at `(x', y')` on E'.
    fn iso_map(&self, iso: &Isogeny, x: &BigUint, y: &BigUint) -> Point {
        let p = &self.p;
        let eval = |coeffs: &[BigUint], monic: bool| -> BigUint {
            // Horner, highest coefficient first; monic polynomials carry
            // an implicit leading 1.
            let mut acc = if monic {
                BigUint::from(1u32)
            } else {
                coeffs[coeffs.len() - 1].clone()
            };
            let lower = if monic {
                coeffs.len()
            } else {
                coeffs.len() - 1
            };
            for i in (0..lower).rev() {
                acc = field::add(&field::mul(&acc, x, p), &coeffs[i], p);
            }
            acc
        };

        let x_num = eval(&iso.x_num, false);
        let x_den = eval(&iso.x_den, true);
        let y_num = eval(&iso.y_num, false);
        let y_den = eval(&iso.y_den, true);

        if x_den.is_zero() || y_den.is_zero() {
            return Point::Infinity;
        }

        let out_x = field::mul(&x_num, &field::inv0(&x_den, p), p);
        let out_y = field::mul(
            y,
            &field::mul(&y_num, &field::inv0(&y_den, p), p),
            p,
        );
        Point::Affine { x: out_x, y: out_y }
    }
}

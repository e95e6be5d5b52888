//! Planar projective transform from four point correspondences.
//!
//! Four correspondences fix the eight degrees of freedom exactly, so the
//! transform is the solution of an 8x8 linear system (h33 = 1) rather than a
//! least-squares fit.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

use crate::error::HomographyError;

/// Sine of the smallest angle still considered non-collinear.
const COLLINEAR_SINE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Build the transform mapping `src[i]` onto `dst[i]`.
    ///
    /// Both quads must be given in the same order (TL, TR, BR, BL). Fails
    /// when three points of either quad are collinear or coincide.
    pub fn from_correspondences(
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Result<Self, HomographyError> {
        check_general_position("source", src)?;
        check_general_position("destination", dst)?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);

            // u * (h6 x + h7 y + 1) = h0 x + h1 y + h2
            a[(2 * i, 0)] = x;
            a[(2 * i, 1)] = y;
            a[(2 * i, 2)] = 1.0;
            a[(2 * i, 6)] = -x * u;
            a[(2 * i, 7)] = -y * u;
            b[2 * i] = u;

            // v * (h6 x + h7 y + 1) = h3 x + h4 y + h5
            a[(2 * i + 1, 3)] = x;
            a[(2 * i + 1, 4)] = y;
            a[(2 * i + 1, 5)] = 1.0;
            a[(2 * i + 1, 6)] = -x * v;
            a[(2 * i + 1, 7)] = -y * v;
            b[2 * i + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or(HomographyError::Singular)?;
        if h.iter().any(|c| !c.is_finite()) {
            return Err(HomographyError::Singular);
        }

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );
        Ok(Self { matrix })
    }

    /// Transform taking the pixel grid of a `width` x `height` canvas onto `dst`.
    pub fn from_canvas(
        width: u32,
        height: u32,
        dst: &[Point2<f64>; 4],
    ) -> Result<Self, HomographyError> {
        let w = f64::from(width.max(1) - 1);
        let h = f64::from(height.max(1) - 1);
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        Self::from_correspondences(&src, dst)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> Result<Self, HomographyError> {
        let inv = self
            .matrix
            .try_inverse()
            .ok_or(HomographyError::NotInvertible)?;
        let scale = inv[(2, 2)];
        let matrix = if scale.abs() > f64::EPSILON {
            inv / scale
        } else {
            inv
        };
        Ok(Self { matrix })
    }

    /// Map one point with projective division.
    pub fn map(&self, p: &Point2<f64>) -> Point2<f64> {
        let q = self.matrix * Vector3::new(p.x, p.y, 1.0);
        Point2::new(q.x / q.z, q.y / q.z)
    }

    /// Map an ordered list of points, preserving order and length.
    pub fn map_points(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.map(p)).collect()
    }

    pub fn map_quad(&self, quad: &[Point2<f64>; 4]) -> [Point2<f64>; 4] {
        quad.map(|p| self.map(&p))
    }
}

fn check_general_position(
    side: &'static str,
    quad: &[Point2<f64>; 4],
) -> Result<(), HomographyError> {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (a, b, c) in TRIPLES {
        if collinear(&quad[a], &quad[b], &quad[c]) {
            return Err(HomographyError::Collinear { side, a, b, c });
        }
    }
    if !convex(quad) {
        return Err(HomographyError::NotConvex { side });
    }
    Ok(())
}

// Every turn along the closed quad goes the same way. Either winding is
// accepted.
fn convex(quad: &[Point2<f64>; 4]) -> bool {
    let turns = (0..4).map(|i| {
        let a = &quad[i];
        let b = &quad[(i + 1) % 4];
        let c = &quad[(i + 2) % 4];
        let ab = b - a;
        let bc = c - b;
        ab.x * bc.y - ab.y * bc.x
    });
    let mut sign = 0.0;
    for turn in turns {
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

fn collinear(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let ab = b - a;
    let ac = c - a;
    let norms = ab.norm() * ac.norm();
    if !norms.is_finite() || norms <= f64::EPSILON {
        return true;
    }
    let cross = ab.x * ac.y - ab.y * ac.x;
    cross.abs() <= COLLINEAR_SINE * norms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [[f64; 2]; 4]) -> [Point2<f64>; 4] {
        points.map(|[x, y]| Point2::new(x, y))
    }

    fn assert_close(a: &Point2<f64>, b: &Point2<f64>, tol: f64) {
        assert!(
            (a - b).norm() < tol,
            "expected {:?} to be within {} of {:?}",
            a,
            tol,
            b
        );
    }

    #[test]
    fn maps_reference_corners_onto_frame_corners() {
        let src = quad([[0.0, 0.0], [607.0, 0.0], [607.0, 511.0], [0.0, 511.0]]);
        let cases = [
            quad([[100.0, 100.0], [700.0, 100.0], [700.0, 500.0], [100.0, 500.0]]),
            quad([[13.0, 40.0], [598.0, 12.0], [640.0, 470.0], [2.0, 430.0]]),
            quad([[250.0, 80.0], [420.0, 95.0], [500.0, 380.0], [180.0, 350.0]]),
        ];
        for dst in &cases {
            let h = Homography::from_correspondences(&src, dst).unwrap();
            for (s, d) in src.iter().zip(dst.iter()) {
                assert_close(&h.map(s), d, 1e-6);
            }
        }
    }

    #[test]
    fn inverse_round_trips() {
        let src = quad([[0.0, 0.0], [607.0, 0.0], [607.0, 511.0], [0.0, 511.0]]);
        let dst = quad([[13.0, 40.0], [598.0, 12.0], [640.0, 470.0], [2.0, 430.0]]);
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        let inv = h.inverse().unwrap();
        for p in [
            Point2::new(46.0, 103.0),
            Point2::new(300.0, 250.0),
            Point2::new(561.0, 409.0),
            Point2::new(-20.0, 700.0),
        ] {
            assert_close(&inv.map(&h.map(&p)), &p, 1e-6);
        }
    }

    #[test]
    fn map_points_preserves_order_and_length() {
        let src = quad([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        let dst = quad([[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 20.0]]);
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        let mapped = h.map_points(&[Point2::new(1.0, 2.0), Point2::new(5.0, 5.0)]);
        assert_eq!(mapped.len(), 2);
        assert_close(&mapped[0], &Point2::new(2.0, 4.0), 1e-9);
        assert_close(&mapped[1], &Point2::new(10.0, 10.0), 1e-9);
        assert!(h.map_points(&[]).is_empty());
    }

    #[test]
    fn rejects_collinear_destination() {
        let src = quad([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        let dst = quad([[0.0, 0.0], [5.0, 5.0], [10.0, 10.0], [0.0, 10.0]]);
        assert!(matches!(
            Homography::from_correspondences(&src, &dst),
            Err(HomographyError::Collinear { side: "destination", .. })
        ));
    }

    #[test]
    fn rejects_self_crossing_destination() {
        let src = quad([[0.0, 0.0], [607.0, 0.0], [607.0, 511.0], [0.0, 511.0]]);
        // Bottom corners swapped, so the side edges cross
        let bowtie = quad([[0.0, 100.0], [700.0, 100.0], [0.0, 500.0], [700.0, 500.0]]);
        assert_eq!(
            Homography::from_correspondences(&src, &bowtie),
            Err(HomographyError::NotConvex {
                side: "destination"
            })
        );

        // Convex but wound the other way round is fine
        let mirrored = quad([[700.0, 100.0], [0.0, 100.0], [0.0, 500.0], [700.0, 500.0]]);
        assert!(Homography::from_correspondences(&src, &mirrored).is_ok());
    }

    #[test]
    fn rejects_coincident_points() {
        let src = quad([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        let dst = quad([[3.0, 3.0], [3.0, 3.0], [10.0, 10.0], [0.0, 10.0]]);
        assert!(Homography::from_correspondences(&src, &dst).is_err());
    }

    #[test]
    fn canvas_corners_land_on_quad() {
        let dst = quad([[10.0, 10.0], [110.0, 20.0], [120.0, 90.0], [5.0, 100.0]]);
        let h = Homography::from_canvas(512, 400, &dst).unwrap();
        assert_close(&h.map(&Point2::new(511.0, 399.0)), &dst[2], 1e-6);
        assert_close(&h.map(&Point2::new(0.0, 0.0)), &dst[0], 1e-6);
    }
}

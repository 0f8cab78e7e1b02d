use geo::Coord;
use num_traits::Float;

#[derive(Debug, Copy, Clone, PartialEq, Neg, Add, Sub, Mul, Div)]
pub struct Vector<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vector<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T> Vector<T>
where
    T: Copy + core::ops::Add<Output = T> + core::ops::Sub<Output = T> + core::ops::Mul<Output = T>,
{
    pub fn dot(self, rhs: Self) -> T {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn norm_sqr(self) -> T {
        self.dot(self)
    }
}

impl<T: Float> Vector<T> {
    pub fn norm(self) -> T {
        self.norm_sqr().sqrt()
    }

    /// Rotation about the vertical (z) axis.
    pub fn rotate_z(self, theta: T) -> Self {
        let (s, c) = theta.sin_cos();
        Self {
            x: c * self.x - s * self.y,
            y: s * self.x + c * self.y,
            z: self.z,
        }
    }
}

impl Vector<f64> {
    /// Lift a planar point into the plane `z`.
    pub fn from_planar(p: Coord<f64>, z: f64) -> Self {
        Self::new(p.x, p.y, z)
    }

    pub fn planar(self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deref)]
pub struct UnitVector<T>(pub Vector<T>);

impl UnitVector<f64> {
    pub fn normalize(v: Vector<f64>) -> Option<Self> {
        let n = v.norm();
        if n > 0.0 && n.is_finite() {
            Some(Self(v / n))
        } else {
            None
        }
    }
}

//! Fixed-size integer vectors over the buckets of a rounding scheme.

use std::ops::{Add, AddAssign, Index, IndexMut, Sub, SubAssign};

use crate::rounding::RoundingScheme;

/// Job counts per bucket, or a delta relative to an anchor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ProfileVector {
    data: Vec<i32>,
}

impl ProfileVector {
    /// The zero vector of dimension `dim`.
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0; dim],
        }
    }

    /// Vector with a single unit entry.
    pub fn unit(dim: usize, bucket: usize) -> Self {
        let mut v = Self::zeros(dim);
        v.data[bucket] = 1;
        v
    }

    pub fn from_slice(values: &[i32]) -> Self {
        Self {
            data: values.to_vec(),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<i32> {
        self.data
    }

    /// Set every component to zero.
    #[inline]
    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|c| *c = 0);
    }

    /// Overwrite with `other` without reallocating.
    #[inline]
    pub fn copy_from(&mut self, other: &ProfileVector) {
        self.data.copy_from_slice(&other.data);
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&c| c == 0)
    }

    #[inline]
    pub fn is_non_negative(&self) -> bool {
        self.data.iter().all(|&c| c >= 0)
    }

    /// Every component lies in `[0, deviation_i)`.
    #[inline]
    pub fn is_within_deviation(&self, scheme: &RoundingScheme) -> bool {
        self.data
            .iter()
            .zip(scheme.deviations())
            .all(|(&c, &d)| c >= 0 && (c as usize) < d)
    }

    #[inline]
    pub fn l1_norm(&self) -> i32 {
        self.data.iter().map(|c| c.abs()).sum()
    }

    /// Estimated load: `Σ size_i * component_i`.
    #[inline]
    pub fn volume(&self, scheme: &RoundingScheme) -> f64 {
        self.data
            .iter()
            .zip(scheme.sizes())
            .map(|(&c, &s)| s * c as f64)
            .sum()
    }

    /// First bucket with a negative component.
    pub fn first_negative(&self) -> Option<usize> {
        self.data.iter().position(|&c| c < 0)
    }
}

impl From<Vec<i32>> for ProfileVector {
    fn from(data: Vec<i32>) -> Self {
        Self { data }
    }
}

impl Index<usize> for ProfileVector {
    type Output = i32;

    #[inline]
    fn index(&self, bucket: usize) -> &i32 {
        &self.data[bucket]
    }
}

impl IndexMut<usize> for ProfileVector {
    #[inline]
    fn index_mut(&mut self, bucket: usize) -> &mut i32 {
        &mut self.data[bucket]
    }
}

impl AddAssign<&ProfileVector> for ProfileVector {
    #[inline]
    fn add_assign(&mut self, rhs: &ProfileVector) {
        debug_assert_eq!(self.dim(), rhs.dim());
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a += *b;
        }
    }
}

impl SubAssign<&ProfileVector> for ProfileVector {
    #[inline]
    fn sub_assign(&mut self, rhs: &ProfileVector) {
        debug_assert_eq!(self.dim(), rhs.dim());
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a -= *b;
        }
    }
}

impl Add for &ProfileVector {
    type Output = ProfileVector;

    fn add(self, rhs: &ProfileVector) -> ProfileVector {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub for &ProfileVector {
    type Output = ProfileVector;

    fn sub(self, rhs: &ProfileVector) -> ProfileVector {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl std::fmt::Display for ProfileVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// Component-wise sum of a collection of vectors.
pub fn sum_vectors<'a, I>(dim: usize, vectors: I) -> ProfileVector
where
    I: IntoIterator<Item = &'a ProfileVector>,
{
    let mut total = ProfileVector::zeros(dim);
    for v in vectors {
        total += v;
    }
    total
}

//! Dense configuration tables over a bounded window of profile vectors.
//!
//! A table at anchor `A` stores, for every key `k` inside its window, the
//! minimum number of composed machine groups whose combined configuration
//! equals the actual vector `k + A`.

use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::rounding::RoundingScheme;
use crate::vector::ProfileVector;

/// Sentinel stored for unknown cells. Chosen as the maximum so that the
/// minimum update is a plain `fetch_min`.
const UNKNOWN: u32 = u32::MAX;

/// Box of vectors with every component `i` in `[0, deviation_i)`.
///
/// Keys are laid out row-major with bucket 0 varying fastest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    deviations: Vec<usize>,
    strides: Vec<usize>,
    len: usize,
}

impl Window {
    pub fn new(deviations: &[usize]) -> Self {
        let mut strides = Vec::with_capacity(deviations.len());
        let mut len = 1usize;
        for &d in deviations {
            strides.push(len);
            len *= d;
        }
        Self {
            deviations: deviations.to_vec(),
            strides,
            len,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.deviations.len()
    }

    /// Number of keys in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn deviation(&self, bucket: usize) -> usize {
        self.deviations[bucket]
    }

    #[inline]
    pub fn stride(&self, bucket: usize) -> usize {
        self.strides[bucket]
    }

    #[inline]
    pub fn contains(&self, key: &ProfileVector) -> bool {
        key.as_slice()
            .iter()
            .zip(&self.deviations)
            .all(|(&c, &d)| c >= 0 && (c as usize) < d)
    }

    /// Linear index of a key. The key must lie inside the window.
    #[inline]
    pub fn to_index(&self, key: &ProfileVector) -> usize {
        debug_assert!(self.contains(key), "key {} outside window", key);
        key.as_slice()
            .iter()
            .zip(&self.strides)
            .map(|(&c, &s)| c as usize * s)
            .sum()
    }

    /// Linear index of a key, or `None` outside the window.
    #[inline]
    pub fn try_index(&self, key: &ProfileVector) -> Option<usize> {
        if self.contains(key) {
            Some(self.to_index(key))
        } else {
            None
        }
    }

    /// Decode a linear index into `out`, reusing its storage.
    #[inline]
    pub fn from_index(&self, mut idx: usize, out: &mut ProfileVector) {
        debug_assert!(idx < self.len);
        for (bucket, &d) in self.deviations.iter().enumerate() {
            out[bucket] = (idx % d) as i32;
            idx /= d;
        }
    }

    pub fn vector_at(&self, idx: usize) -> ProfileVector {
        let mut out = ProfileVector::zeros(self.dim());
        self.from_index(idx, &mut out);
        out
    }
}

/// Window-bounded map from vector to minimum machine-group count.
pub struct ConfigurationTable {
    window: Window,
    anchor: ProfileVector,
    cells: Vec<AtomicU32>,
}

impl ConfigurationTable {
    /// Table with every cell unknown.
    pub fn new(window: Window, anchor: ProfileVector) -> Self {
        debug_assert_eq!(window.dim(), anchor.dim());
        let cells = (0..window.len()).map(|_| AtomicU32::new(UNKNOWN)).collect();
        Self {
            window,
            anchor,
            cells,
        }
    }

    pub fn for_scheme(scheme: &RoundingScheme, anchor: ProfileVector) -> Self {
        Self::new(scheme.window(), anchor)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn anchor(&self) -> &ProfileVector {
        &self.anchor
    }

    pub fn set_anchor(&mut self, anchor: &ProfileVector) {
        self.anchor.copy_from(anchor);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Mark every cell unknown.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            *cell.get_mut() = UNKNOWN;
        }
    }

    #[inline]
    pub fn get_index(&self, idx: usize) -> Option<u32> {
        match self.cells[idx].load(Ordering::Relaxed) {
            UNKNOWN => None,
            v => Some(v),
        }
    }

    /// Value stored for a key (relative to the anchor).
    #[inline]
    pub fn get(&self, key: &ProfileVector) -> Option<u32> {
        self.get_index(self.window.to_index(key))
    }

    /// Value stored for an absolute vector, `None` outside the window.
    pub fn get_actual(&self, actual: &ProfileVector) -> Option<u32> {
        let key = actual - &self.anchor;
        self.window
            .try_index(&key)
            .and_then(|idx| self.get_index(idx))
    }

    #[inline]
    pub fn set(&mut self, key: &ProfileVector, value: u32) {
        let idx = self.window.to_index(key);
        *self.cells[idx].get_mut() = value;
    }

    /// Overwrite a cell through a shared reference.
    #[inline]
    pub fn store_index(&self, idx: usize, value: Option<u32>) {
        self.cells[idx].store(value.unwrap_or(UNKNOWN), Ordering::Relaxed);
    }

    /// Keep the smaller of the stored value and `value`. Returns whether the cell improved.
    #[inline]
    pub fn update_min_index(&self, idx: usize, value: u32) -> bool {
        self.cells[idx].fetch_min(value, Ordering::Relaxed) > value
    }

    /// Populate the base level at `anchor`.
    ///
    /// Directly realisable single-machine configurations get 1, the zero
    /// vector and volume-neutral substitutions `-e_i + e_j + e_k` get 0.
    pub fn initialize(&mut self, scheme: &RoundingScheme, anchor: &ProfileVector) {
        self.set_anchor(anchor);
        self.reset();

        let dim = scheme.dim();
        let mut key = ProfileVector::zeros(dim);
        key -= anchor;
        if let Some(idx) = self.window.try_index(&key) {
            self.update_min_index(idx, 0);
        }

        for_each_configuration(dim, scheme.max_l1_norm(), &mut |config| {
            if !scheme.fits_single_machine(config.volume(scheme)) {
                return;
            }
            let key = config - anchor;
            if let Some(idx) = self.window.try_index(&key) {
                self.update_min_index(idx, 1);
            }
        });

        let mut delta = ProfileVector::zeros(dim);
        for i in 0..dim {
            for j in 0..dim {
                for k in j..dim {
                    if j == i || k == i {
                        continue;
                    }
                    delta.reset();
                    delta[i] = -1;
                    delta[j] += 1;
                    delta[k] += 1;
                    if delta.volume(scheme).abs() > scheme.precision() {
                        continue;
                    }
                    let key = &delta - anchor;
                    if let Some(idx) = self.window.try_index(&key) {
                        self.update_min_index(idx, 0);
                    }
                }
            }
        }
    }

    /// Iterate over `(index, value)` of every known cell in ascending index order.
    pub fn known(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        (0..self.cells.len()).filter_map(move |idx| self.get_index(idx).map(|v| (idx, v)))
    }

    pub fn known_count(&self) -> usize {
        self.known().count()
    }

    /// Smallest and largest known value.
    pub fn value_range(&self) -> Option<(u32, u32)> {
        self.known().fold(None, |range, (_, v)| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Hash of the full cell contents.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for cell in &self.cells {
            hasher.write_u32(cell.load(Ordering::Relaxed));
        }
        hasher.finish()
    }
}

impl Clone for ConfigurationTable {
    fn clone(&self) -> Self {
        Self {
            window: self.window.clone(),
            anchor: self.anchor.clone(),
            cells: self
                .cells
                .iter()
                .map(|c| AtomicU32::new(c.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Tables are equal when every cell matches.
impl PartialEq for ConfigurationTable {
    fn eq(&self, other: &Self) -> bool {
        self.cells.len() == other.cells.len()
            && self
                .cells
                .iter()
                .zip(&other.cells)
                .all(|(a, b)| a.load(Ordering::Relaxed) == b.load(Ordering::Relaxed))
    }
}

impl std::fmt::Debug for ConfigurationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationTable")
            .field("anchor", &self.anchor)
            .field("len", &self.cells.len())
            .field("known", &self.known_count())
            .finish()
    }
}

/// Visit every non-zero non-negative vector with L1 norm at most `max_norm`.
pub(crate) fn for_each_configuration<F>(dim: usize, max_norm: i32, f: &mut F)
where
    F: FnMut(&ProfileVector),
{
    fn visit<F: FnMut(&ProfileVector)>(
        v: &mut ProfileVector,
        bucket: usize,
        remaining: i32,
        f: &mut F,
    ) {
        if bucket == v.dim() {
            if !v.is_zero() {
                f(v);
            }
            return;
        }
        for c in 0..=remaining {
            v[bucket] = c;
            visit(v, bucket + 1, remaining - c, f);
        }
        v[bucket] = 0;
    }

    let mut v = ProfileVector::zeros(dim);
    visit(&mut v, 0, max_norm, f);
}

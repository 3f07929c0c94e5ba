//! Rust implementation of the P||Cmax configuration convolution engine.
//!
//! Buckets of rounded job sizes are counted in [`ProfileVector`]s. The engine
//! squares [`ConfigurationTable`]s of machine counts up a ladder of anchors to
//! find the minimum number of machines for a profile, and backtracks the
//! same ladder to recover one configuration per machine.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

mod config;
pub mod convolution;
pub mod engine;
pub mod logging;
pub mod parallel;
pub mod pcmax;
pub mod rounding;
pub mod table;
pub mod vector;

pub use config::EngineConfig;
pub use convolution::{Convolution, ConvolutionKind};
pub use engine::{EngineError, SchedulingEngine, Target, INFEASIBLE};
pub use pcmax::{Approximation, Instance, InstanceError, PcmaxError, Schedule};
pub use rounding::{Padding, RoundingScheme, SchemeError, RATIO_EPSILON};
pub use table::{ConfigurationTable, Window};
pub use vector::ProfileVector;

use rounding::{DEFAULT_DEVIATION, DEFAULT_MAX_L1_NORM};

fn engine_error(e: EngineError) -> PyErr {
    match e {
        EngineError::DimensionMismatch { .. }
        | EngineError::NegativeProfile(_)
        | EngineError::UnknownStrategy(_)
        | EngineError::InvalidConfig(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn pcmax_error(e: PcmaxError) -> PyErr {
    match e {
        PcmaxError::Engine(inner) => engine_error(inner),
        PcmaxError::InvalidEpsilon(_) | PcmaxError::UnroundableJob { .. } => {
            PyValueError::new_err(e.to_string())
        }
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Rounding scheme (PyO3 wrapper).
#[pyclass(name = "RoundingScheme")]
#[derive(Clone, Debug)]
pub struct PyRoundingScheme {
    inner: RoundingScheme,
}

#[pymethods]
impl PyRoundingScheme {
    #[new]
    #[pyo3(signature = (sizes, deviation=DEFAULT_DEVIATION, max_l1_norm=DEFAULT_MAX_L1_NORM, makespan=1.0, precision=0.00001, deviations=None))]
    fn new(
        sizes: Vec<f64>,
        deviation: usize,
        max_l1_norm: i32,
        makespan: f64,
        precision: f64,
        deviations: Option<Vec<usize>>,
    ) -> PyResult<Self> {
        let deviations = deviations.unwrap_or_else(|| vec![deviation; sizes.len()]);
        RoundingScheme::new(sizes, deviations, max_l1_norm, makespan, precision)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[staticmethod]
    fn rounding9() -> Self {
        Self {
            inner: RoundingScheme::rounding9(),
        }
    }

    #[staticmethod]
    fn rounding10() -> Self {
        Self {
            inner: RoundingScheme::rounding10(),
        }
    }

    #[staticmethod]
    fn arithmetic(k: usize) -> PyResult<Self> {
        RoundingScheme::arithmetic(k)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[getter]
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    #[getter]
    fn sizes(&self) -> Vec<f64> {
        self.inner.sizes().to_vec()
    }

    #[getter]
    fn deviations(&self) -> Vec<usize> {
        self.inner.deviations().to_vec()
    }

    #[getter]
    fn max_l1_norm(&self) -> i32 {
        self.inner.max_l1_norm()
    }

    #[getter]
    fn makespan(&self) -> f64 {
        self.inner.makespan()
    }

    /// Bucket a job of normalised size `p` rounds down to, if any.
    fn rounded_index(&self, p: f64) -> Option<usize> {
        self.inner.rounded_index(p)
    }

    fn __repr__(&self) -> String {
        format!(
            "RoundingScheme(sizes={:?}, deviations={:?}, max_l1_norm={}, makespan={})",
            self.inner.sizes(),
            self.inner.deviations(),
            self.inner.max_l1_norm(),
            self.inner.makespan()
        )
    }
}

fn build_engine(scheme: &PyRoundingScheme, config: Option<EngineConfig>) -> PyResult<SchedulingEngine> {
    let config = config.unwrap_or_default();
    SchedulingEngine::new(scheme.inner.clone(), &config).map_err(engine_error)
}

fn build_instance(machines: usize, jobs: &[u64]) -> PyResult<Instance> {
    Instance::from_jobs(machines, jobs).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Minimum number of machines whose configurations sum to `profile`.
///
/// # Returns
/// * The machine count, or None when no composition reaches the profile
///
/// # Raises
/// * ValueError if the profile has the wrong dimension or a negative entry
#[pyfunction]
#[pyo3(signature = (profile, scheme, config=None))]
fn min_machines(
    profile: Vec<i32>,
    scheme: PyRoundingScheme,
    config: Option<EngineConfig>,
) -> PyResult<Option<u32>> {
    let engine = build_engine(&scheme, config)?;
    let machines = engine
        .min_machines(&ProfileVector::from(profile))
        .map_err(engine_error)?;
    Ok((machines != INFEASIBLE).then_some(machines))
}

/// One configuration per machine summing to `profile`, using at most `machines` machines.
///
/// An empty list means the profile cannot be scheduled on `machines` machines.
///
/// # Raises
/// * ValueError for invalid profiles or configuration
/// * RuntimeError if the backtrace cannot resolve every target
#[pyfunction]
#[pyo3(signature = (profile, machines, scheme, config=None))]
fn compute_schedule(
    profile: Vec<i32>,
    machines: u32,
    scheme: PyRoundingScheme,
    config: Option<EngineConfig>,
) -> PyResult<Vec<Vec<i32>>> {
    let engine = build_engine(&scheme, config)?;
    let configs = engine
        .compute_schedule(&ProfileVector::from(profile), machines)
        .map_err(engine_error)?;
    Ok(configs.into_iter().map(ProfileVector::into_inner).collect())
}

/// Fold configurations with negative entries into the others.
///
/// # Raises
/// * RuntimeError if a debit has no configuration to absorb it
#[pyfunction]
#[pyo3(name = "remove_replacement_columns")]
fn py_remove_replacement_columns(vectors: Vec<Vec<i32>>) -> PyResult<Vec<Vec<i32>>> {
    let mut configs: Vec<ProfileVector> = vectors.into_iter().map(ProfileVector::from).collect();
    engine::remove_replacement_columns(&mut configs).map_err(engine_error)?;
    Ok(configs.into_iter().map(ProfileVector::into_inner).collect())
}

/// Classic makespan lower bound of an instance.
#[pyfunction]
#[pyo3(name = "lower_bound")]
fn py_lower_bound(machines: usize, jobs: Vec<u64>) -> PyResult<u64> {
    let instance = build_instance(machines, &jobs)?;
    Ok(pcmax::lower_bound(&instance))
}

/// Longest-processing-time schedule.
///
/// # Returns
/// * (makespan, jobs per machine)
#[pyfunction]
#[pyo3(name = "lpt_schedule")]
fn py_lpt_schedule(machines: usize, jobs: Vec<u64>) -> PyResult<(u64, Vec<Vec<u64>>)> {
    let instance = build_instance(machines, &jobs)?;
    let mut schedule = Schedule::new();
    let makespan = pcmax::lpt_schedule(&instance, &mut schedule);
    Ok((makespan, schedule.into_inner()))
}

/// MultiFit schedule.
///
/// # Returns
/// * (makespan, jobs per machine)
#[pyfunction]
#[pyo3(name = "multifit_schedule")]
fn py_multifit_schedule(machines: usize, jobs: Vec<u64>) -> PyResult<(u64, Vec<Vec<u64>>)> {
    let instance = build_instance(machines, &jobs)?;
    let (makespan, schedule) = pcmax::multifit_schedule(&instance);
    Ok((makespan, schedule.into_inner()))
}

/// Approximate an optimal schedule through the bucket engine.
///
/// # Arguments
/// * `machines` - Number of identical machines
/// * `jobs` - Processing times
/// * `scheme` - Bucket scheme on a unit capacity (defaults to the nine-bucket scheme)
/// * `eps` - Small-job threshold as a fraction of the trial makespan
/// * `config` - Engine configuration
///
/// # Returns
/// * (makespan, jobs per machine)
///
/// # Raises
/// * ValueError for an empty instance, zero machines or eps outside (0, 1/3)
/// * RuntimeError if no trial makespan can be realised
#[pyfunction]
#[pyo3(signature = (machines, jobs, scheme=None, eps=RATIO_EPSILON, config=None))]
fn approximate_schedule(
    machines: usize,
    jobs: Vec<u64>,
    scheme: Option<PyRoundingScheme>,
    eps: f64,
    config: Option<EngineConfig>,
) -> PyResult<(u64, Vec<Vec<u64>>)> {
    let instance = build_instance(machines, &jobs)?;
    let scheme = scheme.unwrap_or_else(PyRoundingScheme::rounding9);
    let engine = build_engine(&scheme, config)?;
    let result = pcmax::approximate(&instance, &engine, eps).map_err(pcmax_error)?;
    Ok((result.makespan, result.schedule.into_inner()))
}

/// The pcmax.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Config types
    m.add_class::<PyRoundingScheme>()?;
    m.add_class::<EngineConfig>()?;

    // Engine
    m.add_function(wrap_pyfunction!(min_machines, m)?)?;
    m.add_function(wrap_pyfunction!(compute_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_remove_replacement_columns, m)?)?;

    // Heuristics
    m.add_function(wrap_pyfunction!(py_lower_bound, m)?)?;
    m.add_function(wrap_pyfunction!(py_lpt_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_multifit_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(approximate_schedule, m)?)?;

    Ok(())
}

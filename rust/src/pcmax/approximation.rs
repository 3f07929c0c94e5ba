//! Approximation driver: guess a makespan, reduce to a bucket profile,
//! solve it with the engine, then map buckets back to real jobs.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::{EngineError, SchedulingEngine};
use crate::rounding::RoundingScheme;
use crate::vector::ProfileVector;
use crate::{log_detail, log_progress};

use super::heuristic::{lpt_onto, multifit_makespan};
use super::instance::{lower_bound, Instance, Schedule};

/// Errors that can occur while approximating a schedule.
#[derive(Error, Debug)]
pub enum PcmaxError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("No trial makespan in [{lower}, {upper}] admits a bucket schedule")]
    NoFeasibleMakespan { lower: u64, upper: u64 },
    #[error("Job of size {size} has no bucket at trial makespan {makespan}")]
    UnroundableJob { size: u64, makespan: u64 },
    #[error("No machine has a free slot in bucket {bucket} for a job of size {size}")]
    MissingSlot { bucket: usize, size: u64 },
    #[error("Invalid ratio epsilon {0}: must lie in (0, 1/3)")]
    InvalidEpsilon(f64),
}

/// Result of [`approximate`].
#[derive(Debug, Clone)]
pub struct Approximation {
    /// Makespan of `schedule`.
    pub makespan: u64,
    /// Trial makespan the jobs were classified against.
    pub trial_makespan: u64,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobClass {
    Small,
    Medium,
    Huge,
}

fn classify(p: u64, t: u64, eps: f64) -> JobClass {
    let ratio = p as f64 / t as f64;
    if ratio >= 1.0 - 2.0 * eps {
        JobClass::Huge
    } else if ratio <= eps {
        JobClass::Small
    } else {
        JobClass::Medium
    }
}

/// One machine per huge job, paired with the largest non-small job that still fits.
///
/// Paired partners are removed from `jobs`. Returns the number of machines used.
fn schedule_huge_jobs(
    jobs: &mut BTreeMap<u64, usize>,
    t: u64,
    eps: f64,
    schedule: &mut Schedule,
) -> usize {
    let sizes: Vec<u64> = jobs.keys().rev().copied().collect();
    let mut machines = 0;
    for (pos, &p) in sizes.iter().enumerate() {
        if classify(p, t, eps) != JobClass::Huge {
            break;
        }
        let Some(&count) = jobs.get(&p) else {
            continue;
        };
        let mut alone = count;
        for &q in &sizes[pos + 1..] {
            if alone == 0 || classify(q, t, eps) == JobClass::Small {
                break;
            }
            if p > t || q > t - p {
                continue;
            }
            let Some(&available) = jobs.get(&q) else {
                continue;
            };
            let paired = available.min(alone);
            for _ in 0..paired {
                schedule.push_machine(vec![p, q]);
            }
            if available <= alone {
                jobs.remove(&q);
            } else if let Some(a) = jobs.get_mut(&q) {
                *a -= paired;
            }
            machines += paired;
            alone -= paired;
        }
        for _ in 0..alone {
            schedule.push_machine(vec![p]);
        }
        machines += alone;
    }
    machines
}

/// Bucket profile of the medium jobs at trial makespan `t`.
fn round_medium_jobs(
    jobs: &BTreeMap<u64, usize>,
    t: u64,
    eps: f64,
    scheme: &RoundingScheme,
) -> Result<ProfileVector, PcmaxError> {
    let mut profile = ProfileVector::zeros(scheme.dim());
    for (&p, &a) in jobs.iter().rev() {
        if classify(p, t, eps) != JobClass::Medium {
            continue;
        }
        let bucket = scheme
            .rounded_index(p as f64 / t as f64)
            .ok_or(PcmaxError::UnroundableJob { size: p, makespan: t })?;
        profile[bucket] += a as i32;
    }
    Ok(profile)
}

/// Machines the medium jobs need at `t`, if the huge and medium jobs fit on `m` machines.
fn dual_task(
    instance: &Instance,
    engine: &SchedulingEngine,
    t: u64,
    eps: f64,
) -> Result<Option<u32>, PcmaxError> {
    let mut jobs = instance.jobs().clone();
    let huge = schedule_huge_jobs(&mut jobs, t, eps, &mut Schedule::new());
    if huge > instance.machines() {
        return Ok(None);
    }
    let profile = round_medium_jobs(&jobs, t, eps, engine.scheme())?;
    let needed = engine.min_machines(&profile)?;
    let available = (instance.machines() - huge) as u64;
    log_detail!(
        engine.verbosity(),
        "dual task T = {}: {} huge machines, medium profile {} needs {}",
        t,
        huge,
        profile,
        needed
    );
    Ok((needed as u64 <= available).then_some(needed))
}

/// Smallest accepted trial makespan and the medium machine count at it.
fn first_makespan(
    instance: &Instance,
    engine: &SchedulingEngine,
    eps: f64,
) -> Result<(u64, u32), PcmaxError> {
    let lower = lower_bound(instance);
    let upper = multifit_makespan(instance).max(lower);
    log_progress!(engine.verbosity(), "bounds: l = {}, u = {}", lower, upper);

    let (mut lo, mut hi) = (lower, upper);
    let mut found = None;
    while lo < hi {
        let t = lo + (hi - lo) / 2;
        match dual_task(instance, engine, t, eps)? {
            Some(needed) => {
                hi = t;
                found = Some(needed);
            }
            None => lo = t + 1,
        }
    }
    if found.is_none() {
        found = dual_task(instance, engine, hi, eps)?;
    }
    match found {
        Some(needed) => Ok((hi, needed)),
        None => Err(PcmaxError::NoFeasibleMakespan { lower, upper }),
    }
}

/// Assign every medium job to the least loaded bucket machine with a free slot in its bucket.
fn unround_medium_jobs(
    jobs: &BTreeMap<u64, usize>,
    t: u64,
    eps: f64,
    scheme: &RoundingScheme,
    offset: usize,
    slots: &mut [ProfileVector],
    schedule: &mut Schedule,
) -> Result<(), PcmaxError> {
    let mut loads = vec![0u64; slots.len()];
    for (&p, &a) in jobs.iter().rev() {
        if classify(p, t, eps) != JobClass::Medium {
            continue;
        }
        let bucket = scheme
            .rounded_index(p as f64 / t as f64)
            .ok_or(PcmaxError::UnroundableJob { size: p, makespan: t })?;
        for _ in 0..a {
            let machine = (0..slots.len())
                .filter(|&u| slots[u][bucket] > 0)
                .min_by_key(|&u| loads[u])
                .ok_or(PcmaxError::MissingSlot { bucket, size: p })?;
            slots[machine][bucket] -= 1;
            loads[machine] += p;
            schedule.add_load(offset + machine, p);
        }
    }
    Ok(())
}

/// Approximate an optimal schedule of `instance` with the bucket `engine`.
///
/// Jobs are classified against a trial makespan `T` into huge (`p/T >= 1 - 2eps`),
/// medium and small (`p/T <= eps`). Small jobs are added by LPT at the end.
pub fn approximate(
    instance: &Instance,
    engine: &SchedulingEngine,
    eps: f64,
) -> Result<Approximation, PcmaxError> {
    if !(eps > 0.0 && eps < 1.0 / 3.0) {
        return Err(PcmaxError::InvalidEpsilon(eps));
    }
    let verbosity = engine.verbosity();
    let (t, needed) = first_makespan(instance, engine, eps)?;
    log_progress!(verbosity, "first makespan: T = {}", t);

    let mut jobs = instance.jobs().clone();
    let mut schedule = Schedule::new();
    let huge = schedule_huge_jobs(&mut jobs, t, eps, &mut schedule);
    log_detail!(verbosity, "after huge jobs: {}", schedule);

    let profile = round_medium_jobs(&jobs, t, eps, engine.scheme())?;
    let mut slots = engine.compute_schedule(&profile, needed)?;
    log_detail!(verbosity, "medium profile {} on {} machines", profile, slots.len());

    schedule.ensure_machines(huge + slots.len());
    unround_medium_jobs(&jobs, t, eps, engine.scheme(), huge, &mut slots, &mut schedule)?;
    log_detail!(verbosity, "after unrounding: {}", schedule);

    let small: BTreeMap<u64, usize> = jobs
        .iter()
        .filter(|&(&p, _)| classify(p, t, eps) == JobClass::Small)
        .map(|(&p, &a)| (p, a))
        .collect();
    lpt_onto(instance.machines(), &small, &mut schedule);

    let makespan = schedule.makespan();
    log_progress!(verbosity, "approximate: makespan {} at T = {}", makespan, t);
    Ok(Approximation {
        makespan,
        trial_makespan: t,
        schedule,
    })
}

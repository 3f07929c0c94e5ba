//! Longest-processing-time and MultiFit list heuristics.

use std::collections::BTreeMap;

use super::instance::{lower_bound, Instance, Schedule};

/// Machine with the smallest load, the lowest index winning ties.
fn least_loaded(loads: &[u64]) -> usize {
    let mut best = 0;
    for (u, &load) in loads.iter().enumerate().skip(1) {
        if load < loads[best] {
            best = u;
        }
    }
    best
}

/// Makespan of the LPT schedule without building it.
pub fn lpt_makespan(instance: &Instance) -> u64 {
    let mut loads = vec![0u64; instance.machines()];
    let mut makespan = 0;
    for (&p, &a) in instance.jobs().iter().rev() {
        for _ in 0..a {
            let u = least_loaded(&loads);
            loads[u] += p;
            makespan = makespan.max(loads[u]);
        }
    }
    makespan
}

/// Schedule the instance's jobs with LPT on top of `schedule`. Returns the makespan.
pub fn lpt_schedule(instance: &Instance, schedule: &mut Schedule) -> u64 {
    lpt_onto(instance.machines(), instance.jobs(), schedule)
}

/// LPT over `machines` machines for an arbitrary (possibly empty) job map.
pub(crate) fn lpt_onto(machines: usize, jobs: &BTreeMap<u64, usize>, schedule: &mut Schedule) -> u64 {
    let mut loads = schedule.loads();
    loads.resize(machines.max(loads.len()).max(1), 0);
    let mut makespan = loads.iter().copied().max().unwrap_or(0);
    for (&p, &a) in jobs.iter().rev() {
        for _ in 0..a {
            let u = least_loaded(&loads);
            loads[u] += p;
            makespan = makespan.max(loads[u]);
            schedule.add_load(u, p);
        }
    }
    makespan
}

/// First-fit decreasing against bin capacity `t`, filling `schedule` when given.
fn first_fit_decreasing(instance: &Instance, t: u64, mut schedule: Option<&mut Schedule>) -> bool {
    let mut loads = vec![0u64; instance.machines()];
    for (&p, &a) in instance.jobs().iter().rev() {
        let mut remaining = a as u64;
        for (u, load) in loads.iter_mut().enumerate() {
            if remaining == 0 {
                break;
            }
            let room = t.saturating_sub(*load);
            let fit = if p == 0 { remaining } else { (room / p).min(remaining) };
            *load += fit * p;
            remaining -= fit;
            if let Some(schedule) = schedule.as_deref_mut() {
                for _ in 0..fit {
                    schedule.add_load(u, p);
                }
            }
        }
        if remaining > 0 {
            return false;
        }
    }
    true
}

/// Smallest capacity in `[lower_bound, lpt_makespan]` found by bisection on FFD.
pub fn multifit_makespan(instance: &Instance) -> u64 {
    let mut lo = lower_bound(instance);
    let mut hi = lpt_makespan(instance).max(lo);
    while lo < hi {
        let t = lo + (hi - lo) / 2;
        if first_fit_decreasing(instance, t, None) {
            hi = t;
        } else {
            lo = t + 1;
        }
    }
    hi
}

/// MultiFit schedule and its makespan. Falls back to LPT when FFD cannot meet the bound.
pub fn multifit_schedule(instance: &Instance) -> (u64, Schedule) {
    let t = multifit_makespan(instance);
    let mut schedule = Schedule::new();
    if first_fit_decreasing(instance, t, Some(&mut schedule)) {
        return (schedule.makespan(), schedule);
    }
    let mut schedule = Schedule::new();
    let makespan = lpt_schedule(instance, &mut schedule);
    (makespan, schedule)
}

//! Identical-machine instances, their schedules and the classic lower bound.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Errors when building or reading an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    MissingMachineCount,
    MissingJobCount,
    InvalidNumber { line: usize, value: String },
    ZeroMachines,
    NoJobs,
    Io(String),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::MissingMachineCount => write!(f, "Instance is missing the machine count"),
            InstanceError::MissingJobCount => write!(f, "Instance is missing the job count"),
            InstanceError::InvalidNumber { line, value } => {
                write!(f, "Line {}: {:?} is not a non-negative integer", line, value)
            }
            InstanceError::ZeroMachines => write!(f, "Instance needs at least one machine"),
            InstanceError::NoJobs => write!(f, "Instance has no jobs"),
            InstanceError::Io(msg) => write!(f, "Failed to read instance: {}", msg),
        }
    }
}

impl std::error::Error for InstanceError {}

/// `m` identical machines and a multiset of processing times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    machines: usize,
    jobs: BTreeMap<u64, usize>,
}

impl Instance {
    /// Jobs map processing time to multiplicity.
    pub fn new(machines: usize, jobs: BTreeMap<u64, usize>) -> Result<Self, InstanceError> {
        if machines == 0 {
            return Err(InstanceError::ZeroMachines);
        }
        let jobs: BTreeMap<u64, usize> = jobs.into_iter().filter(|&(_, a)| a > 0).collect();
        if jobs.is_empty() {
            return Err(InstanceError::NoJobs);
        }
        Ok(Self { machines, jobs })
    }

    pub fn from_jobs(machines: usize, jobs: &[u64]) -> Result<Self, InstanceError> {
        let mut map = BTreeMap::new();
        for &p in jobs {
            *map.entry(p).or_insert(0) += 1;
        }
        Self::new(machines, map)
    }

    /// Parse "m\nn\np1\np2..."; the declared job count is not checked.
    pub fn parse(text: &str) -> Result<Self, InstanceError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()));

        let (line, value) = lines.next().ok_or(InstanceError::MissingMachineCount)?;
        let machines = parse_number(line, value)? as usize;
        lines.next().ok_or(InstanceError::MissingJobCount)?;

        let mut jobs = BTreeMap::new();
        for (line, value) in lines {
            if value.is_empty() {
                continue;
            }
            *jobs.entry(parse_number(line, value)?).or_insert(0) += 1;
        }
        Self::new(machines, jobs)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let text = std::fs::read_to_string(path).map_err(|e| InstanceError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn machines(&self) -> usize {
        self.machines
    }

    pub fn jobs(&self) -> &BTreeMap<u64, usize> {
        &self.jobs
    }

    pub fn job_count(&self) -> usize {
        self.jobs.values().sum()
    }

    pub fn total_load(&self) -> u64 {
        self.jobs.iter().map(|(&p, &a)| p * a as u64).sum()
    }

    pub fn max_job(&self) -> u64 {
        self.jobs.keys().next_back().copied().unwrap_or(0)
    }
}

fn parse_number(line: usize, value: &str) -> Result<u64, InstanceError> {
    value.parse().map_err(|_| InstanceError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance[m = {}, jobs (processing time, amount): ", self.machines)?;
        for (i, (p, a)) in self.jobs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", p, a)?;
        }
        write!(f, "]")
    }
}

/// Processing times assigned to each machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    machines: Vec<Vec<u64>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machines(&self) -> &[Vec<u64>] {
        &self.machines
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn into_inner(self) -> Vec<Vec<u64>> {
        self.machines
    }

    pub fn push_machine(&mut self, jobs: Vec<u64>) {
        self.machines.push(jobs);
    }

    /// Grow the schedule to at least `count` machines.
    pub fn ensure_machines(&mut self, count: usize) {
        if self.machines.len() < count {
            self.machines.resize_with(count, Vec::new);
        }
    }

    /// Append a job to `machine`, growing the schedule as needed.
    pub fn add_load(&mut self, machine: usize, p: u64) {
        self.ensure_machines(machine + 1);
        self.machines[machine].push(p);
    }

    pub fn machine_load(&self, machine: usize) -> u64 {
        self.machines.get(machine).map_or(0, |jobs| jobs.iter().sum())
    }

    pub fn loads(&self) -> Vec<u64> {
        self.machines.iter().map(|jobs| jobs.iter().sum()).collect()
    }

    pub fn makespan(&self) -> u64 {
        self.loads().into_iter().max().unwrap_or(0)
    }

    /// Uses at most `m` machines and schedules exactly the instance's jobs.
    pub fn is_feasible_for(&self, instance: &Instance) -> bool {
        if self.machines.len() > instance.machines() {
            return false;
        }
        let mut remaining = instance.jobs().clone();
        for &p in self.machines.iter().flatten() {
            match remaining.get_mut(&p) {
                Some(a) if *a > 0 => *a -= 1,
                _ => return false,
            }
        }
        remaining.values().all(|&a| a == 0)
    }
}

impl From<Vec<Vec<u64>>> for Schedule {
    fn from(machines: Vec<Vec<u64>>) -> Self {
        Self { machines }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, jobs) in self.machines.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            let parts: Vec<String> = jobs.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", parts.join(","))?;
        }
        write!(f, "]")
    }
}

/// `max(ceil(P / m), p_max, p_m + p_{m+1})`, or `p_max` when there are at most `m` jobs.
pub fn lower_bound(instance: &Instance) -> u64 {
    let m = instance.machines();
    let p_max = instance.max_job();
    if instance.job_count() <= m {
        return p_max;
    }

    let mut seen = 0usize;
    let mut p_m = 0;
    let mut p_m1 = 0;
    for (&p, &a) in instance.jobs().iter().rev() {
        if seen < m && m <= seen + a {
            p_m = p;
        }
        if seen < m + 1 && m < seen + a {
            p_m1 = p;
        }
        seen += a;
    }

    let average = instance.total_load().div_ceil(m as u64);
    average.max(p_max).max(p_m + p_m1)
}

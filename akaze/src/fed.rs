//! Fast Explicit Diffusion step sizes.
//!
//! Derived from the FED/FJ scheme of Grewenig et al., as used by the AKAZE
//! library of Pablo F. Alcantarilla and Jesus Nuevo:
//!
//! S. Grewenig, J. Weickert, C. Schroers, A. Bruhn. Cyclic Schemes for
//! PDE-Based Image Analysis. Technical Report No. 327, Department of Mathematics,
//! Saarland University, Saarbrücken, Germany, March 2013
//!
//! S. Grewenig, J. Weickert, A. Bruhn. From box filtering to fast explicit diffusion.
//! DAGM, 2010
//!
//! A FED cycle of `n` steps uses the step sizes
//! `tau_i = tau_max / (2 cos^2(pi (2i + 1) / (4n + 2)))`, which add up to
//! `tau_max (n^2 + n) / 3`. Single steps of a cycle exceed `tau_max`, but the
//! cycle as a whole has the stability of `n` steps of at most `tau_max`.
//! The steps are scaled down so a cycle covers exactly the requested time.
use crate::evolution::LevelGeometry;
use log::*;
use std::f64::consts::PI;

/// Number of steps of the shortest FED cycle that reaches time `t`.
pub fn num_steps(t: f64, tau_max: f64) -> usize {
    if t <= 0.0 {
        return 0;
    }
    (f64::ceil(f64::sqrt(3.0 * t / tau_max + 0.25) - 0.5 - 1.0e-8) + 0.5) as usize
}

/// Split the stopping time `t` into the fewest equal cycles whose step count
/// stays within `max_cycle_steps`, returning the step sizes of one cycle per cycle.
pub fn fed_cycles(t: f64, tau_max: f64, max_cycle_steps: usize, reordering: bool) -> Vec<Vec<f64>> {
    if t <= 0.0 {
        return vec![];
    }
    let mut num_cycles = 1usize;
    while num_steps(t / num_cycles as f64, tau_max) > max_cycle_steps {
        num_cycles += 1;
    }
    let cycle = fed_tau_by_process_time(t, num_cycles, tau_max, reordering);
    vec![cycle; num_cycles]
}

/// This function allocates an array of the least number of time steps such
/// that a certain stopping time for the whole process can be obtained and fills
/// it with the respective FED time step sizes for one cycle
///
/// # Arguments
/// * `t` - Desired process stopping time
/// * `num_cycles` - Desired number of cycles
/// * `tau_max` - Stability limit for the explicit scheme
/// * `reordering` - Reordering flag
/// # Return value
/// The vector with the dynamic step sizes
pub fn fed_tau_by_process_time(t: f64, num_cycles: usize, tau_max: f64, reordering: bool) -> Vec<f64> {
    // All cycles have the same fraction of the stopping time
    fed_tau_by_cycle_time(t / num_cycles as f64, tau_max, reordering)
}

/// Step sizes of one cycle reaching the cycle stopping time `t`.
fn fed_tau_by_cycle_time(t: f64, tau_max: f64, reordering: bool) -> Vec<f64> {
    let n = num_steps(t, tau_max);
    if n == 0 {
        return vec![];
    }
    // Ratio of t we search to maximal t
    let scale = 3.0 * t / (tau_max * ((n * (n + 1)) as f64));
    fed_tau_internal(n, scale, tau_max, reordering)
}

/// Fill a cycle of `n` FED steps scaled by `scale`.
fn fed_tau_internal(n: usize, scale: f64, tau_max: f64, reordering: bool) -> Vec<f64> {
    let c = 1.0 / (4.0 * (n as f64) + 2.0);
    let d = scale * tau_max / 2.0;
    let tau: Vec<f64> = (0..n)
        .map(|k| {
            let h = f64::cos(PI * (2.0 * (k as f64) + 1.0) * c);
            d / (h * h)
        })
        .collect();
    if reordering {
        kappa_cycle(&tau)
    } else {
        tau
    }
}

/// Permute the steps with a kappa cycle, `kappa = n / 2`, modulo the smallest
/// prime above `n`, so large and small steps alternate.
fn kappa_cycle(tau: &[f64]) -> Vec<f64> {
    let n = tau.len();
    let kappa = n / 2;
    if kappa == 0 {
        return tau.to_vec();
    }
    let mut prime = n + 1;
    while !primal::is_prime(prime as u64) {
        prime += 1;
    }
    // `k * kappa` runs through every residue of the prime field once, so the
    // residues in 1..=n form a permutation of the steps.
    (1..prime)
        .map(|k| (k * kappa) % prime)
        .filter(|residue| (1..=n).contains(residue))
        .map(|residue| tau[residue - 1])
        .collect()
}

/// FED step sizes for one level transition.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSchedule {
    /// Diffusion time between the previous level and this one.
    pub time: f64,
    /// The cycles, each a sequence of step sizes.
    pub cycles: Vec<Vec<f64>>,
}

impl LevelSchedule {
    pub fn num_steps(&self) -> usize {
        self.cycles.iter().map(Vec::len).sum()
    }

    pub fn total_time(&self) -> f64 {
        self.cycles.iter().flatten().sum()
    }
}

/// The FED steps of every level of a scale space, computed once per
/// configuration. The base level has an empty schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct FedSchedule {
    levels: Vec<LevelSchedule>,
}

impl FedSchedule {
    pub fn new(
        geometry: &[LevelGeometry],
        tau_max: f64,
        max_cycle_steps: usize,
        reordering: bool,
    ) -> Self {
        let levels = geometry
            .iter()
            .enumerate()
            .map(|(i, level)| {
                if i == 0 {
                    return LevelSchedule {
                        time: 0.0,
                        cycles: vec![],
                    };
                }
                let time = level.etime - geometry[i - 1].etime;
                let cycles = fed_cycles(time, tau_max, max_cycle_steps, reordering);
                let schedule = LevelSchedule { time, cycles };
                debug!(
                    "{} steps in {} cycles for evolution {}.",
                    schedule.num_steps(),
                    schedule.cycles.len(),
                    i
                );
                schedule
            })
            .collect();
        Self { levels }
    }

    pub fn level(&self, index: usize) -> &LevelSchedule {
        &self.levels[index]
    }

    pub fn levels(&self) -> &[LevelSchedule] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

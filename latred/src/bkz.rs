//! Block Korkine-Zolotarev reduction.
//!
//! A window of `β` consecutive rows slides over the LLL-reduced basis. In
//! each window a Schnorr-Euchner enumeration looks for the combination with
//! the shortest projection orthogonal to the rows before the window. If it
//! is notably shorter than the first row of the window, it is spliced into
//! the basis and the basis is LLL-reduced again.
//!
//! The enumeration runs in the same working type as the Gram-Schmidt data,
//! so the extended and exact variants are not limited to the range of a
//! double.

use std::f64::consts::PI;

use crate::bb::splice;
use crate::config::ReductionParams;
use crate::error::{Error, Result};
use crate::gram_schmidt::GramSchmidt;
use crate::lattice::{IntLattice, WorkingType, WorkingTypeFor};
use crate::lll::{Lll, LllOutcome, round_half_down, shortest_first};
use crate::rings::{Ring, RingElement, Z};
use crate::vector::*;
use num_bigint::BigInt;

/// Counters of a BKZ run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BkzStats {
    pub iterations: u64,
    /// Improvements by a single basis vector.
    pub trivial: u64,
    pub nontrivial: u64,
    pub no_ops: u64,
}

/// `γ(i/2 + 1)^(2/i) * 2^(-2p/i) / π` for `i = 1..β`, the expected
/// squared length of the shortest vector of an `i`-dimensional projection,
/// relative to the geometric mean of its `c`.
fn pruning_constants(beta: usize, p: u32) -> Vec<f64> {
    let log = |j: usize| (j as f64).ln();
    (1..beta)
        .map(|i| {
            let k = i / 2;
            let x = if i % 2 == 0 {
                // ln(k!) / k
                ((1..=k).map(log).sum::<f64>() / k as f64).exp()
            } else {
                let s: f64 = (k + 2..=2 * k + 2).map(log).sum();
                let x = 0.5 * PI.ln() + s - 2. * (k + 1) as f64 * 2f64.ln();
                (x * 2. / i as f64).exp()
            };
            let y = (-(2. * p as f64 / i as f64) * 2f64.ln()).exp();
            x * y / PI
        })
        .collect()
}

/// Fills `out` with the thresholds of the pruned enumeration in the window
/// starting with the squared lengths `c`. The geometric means are taken in
/// the log domain, so `c` may be far outside the range of a double.
fn pruning_thresholds<'a, W: WorkingType>(
    wt: &W,
    c: impl Iterator<Item = &'a W::Element>,
    constants: &[f64],
    out: &mut Vec<W::Element>,
) {
    out.clear();
    let mut x = 0.;
    for (i, (k, c)) in constants.iter().zip(c).enumerate() {
        x += W::log2(c);
        let t = x / (i + 1) as f64 + k.log2();
        out.push(if t.is_finite() { wt.exp2(t) } else { W::zero() });
    }
}

/// Buffers of the enumeration. Indexed by row, one more than the rows.
struct Enumeration<W: WorkingType> {
    ctilda: Vec<W::Element>,
    v: Vec<W::Element>,
    y: Vec<W::Element>,
    u: Vec<W::Element>,
    utilda: Vec<W::Element>,
    big_delta: Vec<i64>,
    small_delta: Vec<i64>,
}

impl<W: WorkingTypeFor<Z>> Enumeration<W> {
    fn new(n: usize) -> Self {
        let zeros = || std::iter::repeat_with(W::zero).take(n + 1).collect::<Vec<_>>();
        Self {
            ctilda: zeros(),
            v: zeros(),
            y: zeros(),
            u: zeros(),
            utilda: zeros(),
            big_delta: vec![0; n + 1],
            small_delta: vec![0; n + 1],
        }
    }

    /// Enumerates the combinations of the rows `jj..=kk` and returns the
    /// smallest projected squared length found. The coefficients are in
    /// `u[jj..=kk]`.
    fn run(
        &mut self,
        gs: &GramSchmidt<W>,
        jj: usize,
        kk: usize,
        thresholds: Option<&[W::Element]>,
    ) -> W::Element {
        let wt = &gs.wt;
        let mut cbar = gs.c(jj).clone();
        self.utilda[jj] = W::one();
        self.u[jj] = W::one();
        self.y[jj] = W::zero();
        self.v[jj] = W::zero();
        self.big_delta[jj] = 0;
        self.small_delta[jj] = 1;
        let mut s = jj;
        let mut t = jj;

        for i in jj + 1..=kk + 1 {
            self.ctilda[i] = W::zero();
            self.u[i] = W::zero();
            self.utilda[i] = W::zero();
            self.y[i] = W::zero();
            self.big_delta[i] = 0;
            self.v[i] = W::zero();
            self.small_delta[i] = 1;
        }

        while t <= kk {
            let e = wt.add(self.y[t].clone(), &self.utilda[t]);
            let e2 = wt.mul(e.clone(), &e);
            self.ctilda[t] = wt.mul_add(self.ctilda[t + 1].clone(), &e2, gs.c(t));

            let bound = match thresholds {
                Some(th) if t > jj => wt.sub(cbar.clone(), &th[t - jj - 1]),
                _ => cbar.clone(),
            };

            if wt.is_lt(&self.ctilda[t], &bound) {
                if t > jj {
                    t -= 1;
                    let y = (t + 1..=s).fold(W::zero(), |acc, i| {
                        wt.mul_add(acc, &self.utilda[i], gs.mu(i, t))
                    });
                    let r = round_half_down(wt, &wt.neg(y.clone()));
                    self.small_delta[t] = if wt.is_gt(&r, &wt.neg(y.clone())) { -1 } else { 1 };
                    self.y[t] = y;
                    self.utilda[t] = r.clone();
                    self.v[t] = r;
                    self.big_delta[t] = 0;
                } else {
                    cbar = self.ctilda[jj].clone();
                    self.u[jj..=kk].clone_from_slice(&self.utilda[jj..=kk]);
                }
            } else {
                t += 1;
                s = s.max(t);
                if t < s {
                    self.big_delta[t] = -self.big_delta[t];
                }
                if self.big_delta[t] * self.small_delta[t] >= 0 {
                    self.big_delta[t] += self.small_delta[t];
                }
                self.utilda[t] = W::add_isize(self.v[t].clone(), self.big_delta[t] as isize);
            }
        }

        cbar
    }
}

/// The workspace of the block reduction: the LLL kernel and the buffers of
/// the enumeration and of the splicing, allocated once for bases of up to
/// `capacity` rows.
pub(crate) struct Bkz<W: WorkingTypeFor<Z>> {
    pub(crate) lll: Lll<W>,
    enumeration: Enumeration<W>,
    thresholds: Vec<W::Element>,
    z: Vec<i64>,
    v: OwnedVector<Z>,
}

impl<W: WorkingTypeFor<Z>> Bkz<W> {
    pub(crate) fn new(wt: W, capacity: usize) -> Self {
        Self {
            lll: Lll::new(wt, capacity),
            enumeration: Enumeration::new(capacity),
            thresholds: Vec::with_capacity(capacity),
            z: vec![0; capacity],
            v: OwnedVector::zero(capacity),
        }
    }

    /// BKZ-reduces the basis of the lattice and swaps the shortest row
    /// into row 0.
    pub(crate) fn reduce(
        &mut self,
        lattice: &mut IntLattice,
        params: &ReductionParams,
    ) -> Result<LllOutcome> {
        let (rank, _) = self.run(lattice, params)?;
        Ok(shortest_first(lattice, rank))
    }

    /// LLL-reduces the basis and then runs the tours of the block
    /// reduction. Returns the rank.
    fn run(
        &mut self,
        lattice: &mut IntLattice,
        params: &ReductionParams,
    ) -> Result<(usize, BkzStats)> {
        params.validate()?;
        let dim = lattice.dim();
        self.lll.check_capacity(dim)?;
        self.lll.configure(params);
        self.lll.gs.load(lattice, dim)?;
        let m = self.lll.run_window(lattice, dim, 0)?;

        let mut stats = BkzStats::default();
        if m > 1 {
            let beta = params.block_size.unwrap_or(2).min(m);
            stats = self.tours(lattice, m, beta, params)?;
        }

        log::debug!(
            "BKZ: {} iterations, {} trivial, {} nontrivial, {} no-ops, {} swaps, rank {m}",
            stats.iterations,
            stats.trivial,
            stats.nontrivial,
            stats.no_ops,
            self.lll.swaps
        );
        Ok((m, stats))
    }

    /// The tours of the block reduction over the first `m` rows, which have
    /// to be LLL-reduced.
    fn tours(
        &mut self,
        lattice: &mut IntLattice,
        m: usize,
        beta: usize,
        params: &ReductionParams,
    ) -> Result<BkzStats> {
        let mut stats = BkzStats::default();
        let dim = lattice.dim();
        let constants = (params.prune > 0).then(|| pruning_constants(beta, params.prune));
        let factor = self
            .lll
            .gs
            .wt
            .from_f64(params.delta - 8. * self.lll.red_fudge());
        let mut clean = true;

        // Number of consecutive windows without improvement.
        let mut no_ops = 0;
        let mut jj = usize::MAX;
        while no_ops < m - 1 {
            jj = jj.wrapping_add(1);
            let mut kk = (jj + beta - 1).min(m - 1);
            if jj == m - 1 {
                jj = 0;
                kk = beta - 1;
                clean = true;
            }

            let gs = &self.lll.gs;
            if let Some(k) = &constants {
                let c = (jj..=kk).map(|i| gs.c(i));
                pruning_thresholds(&gs.wt, c, k, &mut self.thresholds);
            }
            let thresholds = constants.is_some().then_some(self.thresholds.as_slice());
            let cbar = self.enumeration.run(gs, jj, kk, thresholds);

            stats.iterations += 1;
            let h = (kk + 2).min(m);
            let improved = gs.wt.is_gt(&gs.wt.mul(factor.clone(), gs.c(jj)), &cbar);
            if improved {
                clean = false;
                let u = &self.enumeration.u[jj..=kk];
                let mut nonzero = (jj..=kk).filter(|&i| !u[i - jj].is_zero());
                match (nonzero.next(), nonzero.next()) {
                    (None, _) => {
                        return Err(Error::Internal("empty combination in the block reduction"));
                    }
                    (Some(s), None) if s > jj => {
                        stats.trivial += 1;
                        self.lll.rotate(lattice, s, jj);
                    }
                    _ => {
                        stats.nontrivial += 1;
                        let z = &mut self.z[..dim];
                        z.fill(0);
                        let v = &mut self.v[0..dim];
                        for e in v.iter_mut() {
                            *e = Z::zero();
                        }
                        for i in jj..=kk {
                            z[i] = W::to_i64(&u[i - jj]);
                            if z[i] != 0 {
                                v.mul_add_assign(&BigInt::from(z[i]), lattice.row(i), &Z);
                            }
                        }
                        let k = splice(lattice, z, v)?;
                        lattice.rotate(k, jj);
                    }
                }

                for i in jj..h {
                    self.lll.gs.load_row(lattice, i)?;
                }
                if self.lll.run_window(lattice, h, jj)? != h {
                    return Err(Error::Internal("block reduction lost rank"));
                }
                no_ops = 0;
            } else {
                stats.no_ops += 1;
                if !clean && self.lll.run_window(lattice, h, h - 1)? != h {
                    return Err(Error::Internal("block reduction lost rank"));
                }
                no_ops += 1;
            }
        }

        Ok(stats)
    }
}

/// BKZ-reduces the basis of the lattice with block size
/// `params.block_size` (2 if unset) and the Gram-Schmidt data in the
/// working type `W`. The dual basis, if any, is kept in sync.
///
/// Afterwards the shortest nonzero row is in row 0.
pub fn bkz<W: WorkingTypeFor<Z>>(
    wt: W,
    lattice: &mut IntLattice,
    params: &ReductionParams,
) -> Result<LllOutcome> {
    Bkz::new(wt, lattice.dim()).reduce(lattice, params)
}

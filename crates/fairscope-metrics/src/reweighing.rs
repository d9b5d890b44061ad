use crate::groups::ResolvedAttribute;
use crate::outcome::Outcomes;

/// Largest absolute difference between a weighted cell total and its target
/// at which raking counts as converged.
const TOLERANCE: f64 = 1e-9;
const MAX_SWEEPS: usize = 500;

/// Per-record weights that decorrelate group membership from the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Reweighing {
    pub weights: Vec<f64>,
    /// Raking sweeps performed.
    pub iterations: usize,
    /// False when the marginal targets could not all be met; the weights
    /// are then the best sweep that widened no attribute's parity gap.
    pub converged: bool,
    /// `(group, outcome)` cells of some attribute with no members.
    pub empty_cells: usize,
}

/// Group × outcome margin of one attribute.
struct Margin<'a> {
    attribute: &'a ResolvedAttribute,
    /// `(row, cell)` for every row counted in this attribute.
    rows: Vec<(usize, usize)>,
    /// Target weighted total per cell; `None` for an empty cell.
    targets: Vec<Option<f64>>,
    baseline_gap: Option<f64>,
}

impl<'a> Margin<'a> {
    fn new(attribute: &'a ResolvedAttribute, outcomes: &Outcomes, empty_cells: &mut usize) -> Self {
        let mut rows = Vec::new();
        let mut groups = 0usize;
        for row in 0..outcomes.len() {
            let (Some(favorable), Some(group)) = (outcomes.get(row), attribute.stratum_of(row))
            else {
                continue;
            };
            groups = groups.max(group + 1);
            rows.push((row, group * 2 + usize::from(favorable)));
        }

        let mut cell_counts = vec![0usize; groups * 2];
        for (_, cell) in &rows {
            cell_counts[*cell] += 1;
        }
        let total = rows.len() as f64;
        let by_outcome = [0, 1].map(|outcome| {
            cell_counts
                .iter()
                .skip(outcome)
                .step_by(2)
                .sum::<usize>() as f64
        });

        let mut targets = vec![None; groups * 2];
        for group in 0..groups {
            let size = cell_counts[group * 2] + cell_counts[group * 2 + 1];
            if size == 0 {
                continue;
            }
            for outcome in 0..2 {
                let cell = group * 2 + outcome;
                if cell_counts[cell] == 0 {
                    *empty_cells += 1;
                    continue;
                }
                targets[cell] = Some(size as f64 * by_outcome[outcome] / total);
            }
        }

        Self {
            attribute,
            rows,
            targets,
            baseline_gap: None,
        }
    }

    fn cell_totals(&self, weights: &[f64]) -> Vec<f64> {
        let mut totals = vec![0.0; self.targets.len()];
        for (row, cell) in &self.rows {
            totals[*cell] += weights[*row];
        }
        totals
    }

    fn deviation(&self, weights: &[f64]) -> f64 {
        self.cell_totals(weights)
            .iter()
            .zip(&self.targets)
            .filter_map(|(total, target)| target.map(|target| (total - target).abs()))
            .fold(0.0, f64::max)
    }

    fn adjust(&self, weights: &mut [f64]) {
        let factors: Vec<Option<f64>> = self
            .cell_totals(weights)
            .iter()
            .zip(&self.targets)
            .map(|(total, target)| target.filter(|_| *total > 0.0).map(|target| target / total))
            .collect();
        for (row, cell) in &self.rows {
            if let Some(factor) = factors[*cell] {
                weights[*row] *= factor;
            }
        }
    }

    /// Absolute weighted rate difference across the attribute's partition.
    fn gap(&self, weights: &[f64], outcomes: &Outcomes) -> Option<f64> {
        let rate = |rows: &[usize]| {
            let (mass, favorable) = rows.iter().fold((0.0, 0.0), |(mass, favorable), row| {
                match outcomes.get(*row) {
                    Some(true) => (mass + weights[*row], favorable + weights[*row]),
                    Some(false) => (mass + weights[*row], favorable),
                    None => (mass, favorable),
                }
            });
            (mass > 0.0).then(|| favorable / mass)
        };
        let partition = &self.attribute.partition;
        Some((rate(&partition.unprivileged)? - rate(&partition.privileged)?).abs())
    }
}

/// Compute reweighing weights that make outcome independent of group within
/// every resolved attribute.
///
/// Weights are raked: starting from 1, each sweep rescales every attribute's
/// `(group, outcome)` cells toward `n_g * n_y / n` counted over that
/// attribute's rows. A single attribute reaches the classic
/// `n_g * n_y / (n * n_gy)` weights in one sweep, and data already balanced
/// on every attribute keeps unit weights. Empty cells are skipped. Rows with
/// a missing outcome keep weight 1.
pub fn reweigh(attributes: &[ResolvedAttribute], outcomes: &Outcomes) -> Reweighing {
    let unit = vec![1.0; outcomes.len()];
    let mut empty_cells = 0usize;
    let mut margins: Vec<Margin> = attributes
        .iter()
        .map(|attribute| Margin::new(attribute, outcomes, &mut empty_cells))
        .collect();
    for margin in &mut margins {
        margin.baseline_gap = margin.gap(&unit, outcomes);
    }

    let mut weights = unit.clone();
    let mut best: (f64, Vec<f64>) = (worst_gap(&margins, &unit, outcomes), unit);
    let mut iterations = 0usize;
    let mut converged = false;

    loop {
        let deviation = margins
            .iter()
            .map(|margin| margin.deviation(&weights))
            .fold(0.0, f64::max);
        if deviation <= TOLERANCE {
            converged = true;
            break;
        }
        if iterations == MAX_SWEEPS {
            break;
        }
        for margin in &margins {
            margin.adjust(&mut weights);
        }
        iterations += 1;

        let no_wider = margins.iter().all(|margin| {
            match (margin.baseline_gap, margin.gap(&weights, outcomes)) {
                (Some(before), Some(after)) => after <= before + TOLERANCE,
                (None, _) => true,
                (Some(_), None) => false,
            }
        });
        let worst = worst_gap(&margins, &weights, outcomes);
        if no_wider && worst < best.0 {
            best = (worst, weights.clone());
        }
    }

    if !converged {
        tracing::warn!(
            iterations,
            empty_cells,
            worst_gap = best.0,
            "reweighing did not converge; keeping the best sweep"
        );
        weights = best.1;
    }

    tracing::debug!(
        attributes = margins.len(),
        iterations,
        converged,
        empty_cells,
        "reweighing computed"
    );

    Reweighing {
        weights,
        iterations,
        converged,
        empty_cells,
    }
}

fn worst_gap(margins: &[Margin], weights: &[f64], outcomes: &Outcomes) -> f64 {
    margins
        .iter()
        .filter_map(|margin| margin.gap(weights, outcomes))
        .fold(0.0, f64::max)
}

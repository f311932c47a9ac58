use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};
use strum::IntoEnumIterator;

use crate::analysis::correlation_groups::{correlation_matrix, group_metrics};
use crate::analysis::normalization::{apply_nan_policy, build_pairs, normalize_table};
use crate::analysis::ranking::dense_rank_descending;
use crate::analysis::scoring::{custom_score, orthogonality_factor, practical_peak_capacity, suggested_score};
use crate::analysis::{MetricContext, NanPolicy, NormalizationMethod, NormalizationReport, computer_for};
use crate::config::{ANALYSIS, PRINT_PAIR_METRICS, PRINT_PROGRESS};
use crate::domain::{ConditionValues, NormalizedRetentionTimeTable, RetentionTimeTable};
use crate::models::{
    CorrelationGroup, CorrelationMatrix, MetricKey, MetricKind, MetricTable, MetricTableRow, Pair, PairDelta,
    PeakCapacities, ResultRow, ResultsTableRow, ScoreRecord,
};

use super::state::{DataStatus, MetricState};

/// Owns every pair of a loaded retention-time table together with its flat
/// result row and score record. Metric computers never touch it directly: they
/// return deltas which are merged here once they finish.
pub struct OrthogonalityEngine {
    /// Registry of all pairs, keyed by set number
    pairs: BTreeMap<usize, Pair>,

    /// Flat result rows, one per pair
    rows: BTreeMap<usize, ResultRow>,

    /// Scored values, one record per pair
    scores: BTreeMap<usize, ScoreRecord>,

    /// Input tables
    raw: Option<RetentionTimeTable>,
    normalized: Option<NormalizedRetentionTimeTable>,
    normalization: Option<NormalizationMethod>,
    void_times: Option<ConditionValues>,
    gradient_end_times: Option<ConditionValues>,
    peak_capacities: Option<ConditionValues>,

    status: DataStatus,
    metric_state: MetricState,

    /// Live settings
    bin_number: usize,
    use_suggested_score: bool,
    ranking_key: MetricKey,

    /// Derived tables
    metric_table: MetricTable,
    correlation_matrix: CorrelationMatrix,
    correlation_groups: Vec<CorrelationGroup>,
    results: Vec<ResultsTableRow>,
}

impl Default for OrthogonalityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OrthogonalityEngine {
    pub fn new() -> Self {
        Self {
            pairs: BTreeMap::new(),
            rows: BTreeMap::new(),
            scores: BTreeMap::new(),
            raw: None,
            normalized: None,
            normalization: None,
            void_times: None,
            gradient_end_times: None,
            peak_capacities: None,
            status: DataStatus::NoData,
            metric_state: MetricState::new(),
            bin_number: ANALYSIS.bin_box.default_bin_number,
            use_suggested_score: false,
            ranking_key: MetricKey::Practical2dPeakCapacity,
            metric_table: MetricTable::default(),
            correlation_matrix: CorrelationMatrix::default(),
            correlation_groups: Vec::new(),
            results: Vec::new(),
        }
    }

    // --- LOADING ---

    /// Replace everything with `table`. Pairs are built straight from the raw
    /// retention times (each pair is min-max scaled on its own).
    pub fn load_retention_times(&mut self, table: RetentionTimeTable) -> Result<()> {
        table.validate().context("Invalid retention time table")?;
        if table.nb_conditions() < 2 {
            bail!(
                "At least two conditions are needed to build a combination (got {})",
                table.nb_conditions()
            );
        }

        let bin_number = self.bin_number;
        let use_suggested_score = self.use_suggested_score;
        *self = Self::new();
        self.bin_number = bin_number;
        self.use_suggested_score = use_suggested_score;

        let pairs = build_pairs(&table.conditions, &table.columns)?;
        log::info!(
            "Loaded {} peaks x {} conditions: {} combinations",
            table.nb_peaks(),
            table.nb_conditions(),
            pairs.len()
        );
        self.raw = Some(table);
        self.install_pairs(pairs);
        self.status = DataStatus::Loaded;
        Ok(())
    }

    pub fn set_void_times(&mut self, void_times: ConditionValues) {
        self.void_times = Some(void_times);
    }

    pub fn set_gradient_end_times(&mut self, gradient_end_times: ConditionValues) {
        self.gradient_end_times = Some(gradient_end_times);
    }

    /// Attach the 1D peak capacity of each condition and derive N1·N2 per pair.
    ///
    /// Pairs whose conditions are not both listed keep no 2D capacity.
    pub fn load_peak_capacities(&mut self, capacities: ConditionValues) -> Result<()> {
        self.require_data()?;
        for (condition, value) in &capacities.0 {
            if !value.is_finite() || *value <= 0.0 {
                bail!("Peak capacity of '{condition}' must be a positive number (got {value})");
            }
        }
        let attachable = self
            .pairs
            .values()
            .filter(|p| capacities.get(&p.x_title).is_some() && capacities.get(&p.y_title).is_some())
            .count();
        if attachable == 0 {
            bail!("None of the loaded conditions has a peak capacity");
        }

        self.peak_capacities = Some(capacities);
        let attached = self.attach_peak_capacities();
        // Geometric values were derived from the previous capacities
        self.forget_with_dependents(MetricKind::GeometricApproach);
        if self.status != DataStatus::Error {
            self.status = DataStatus::PeakCapacityLoaded;
        }
        log::info!("Peak capacities attached to {attached}/{} pairs", self.pairs.len());
        Ok(())
    }

    /// Rescale the raw table with `method` and rebuild every pair from it.
    ///
    /// A condition whose reference time is missing is blanked and puts the
    /// engine in `Error`; the other conditions are still used.
    pub fn normalize(&mut self, method: NormalizationMethod) -> Result<NormalizationReport> {
        let raw = self.require_raw()?;
        let (normalized, report) =
            normalize_table(raw, method, self.void_times.as_ref(), self.gradient_end_times.as_ref());
        let pairs = build_pairs(&normalized.conditions, &normalized.columns)?;

        log::info!(
            "Normalized with {method}: {} pairs, {} negative values blanked",
            pairs.len(),
            report.negative_values
        );
        self.normalized = Some(normalized);
        self.normalization = Some(method);
        self.install_pairs(pairs);
        self.status = if report.is_ok() {
            self.loaded_status()
        } else {
            log::error!("Normalization incomplete, blanked: {:?}", report.blanked_conditions);
            DataStatus::Error
        };
        Ok(report)
    }

    /// Apply `policy` to the raw table, then rebuild the pairs (re-normalising
    /// when a method was applied before). Returns the number of peaks dropped.
    pub fn clean_nan(&mut self, policy: NanPolicy) -> Result<usize> {
        let (cleaned, dropped) = apply_nan_policy(self.require_raw()?, policy);
        log::info!("NaN policy {policy:?}: {dropped} peaks dropped");
        self.raw = Some(cleaned);

        match self.normalization {
            Some(method) => {
                self.normalize(method)?;
            }
            None => {
                let raw = self.require_raw()?;
                let pairs = build_pairs(&raw.conditions, &raw.columns)?;
                self.install_pairs(pairs);
            }
        }
        Ok(dropped)
    }

    pub fn has_missing_values(&self) -> bool {
        self.raw.as_ref().is_some_and(RetentionTimeTable::has_missing_values)
    }

    /// Change the occupancy grid resolution. Grid-based metrics and the
    /// composites reading them must be recomputed.
    pub fn set_bin_number(&mut self, bin_number: usize) -> Result<()> {
        if bin_number == 0 {
            bail!("The occupancy grid needs at least one bin per axis");
        }
        if bin_number == self.bin_number {
            return Ok(());
        }
        self.bin_number = bin_number;
        for kind in MetricKind::iter().filter(|k| k.depends_on_bin_number()) {
            self.forget_with_dependents(kind);
        }
        Ok(())
    }

    // --- METRICS ---

    /// Compute `kinds` (and whatever they depend on) for every pair.
    ///
    /// Already computed kinds are skipped unless one of their prerequisites is
    /// recomputed in the same request. Computed kinds reading a recomputed one
    /// outside the request are forgotten. `progress` receives a monotonic
    /// percentage weighted by each metric's cost.
    pub fn compute_metrics(&mut self, kinds: &[MetricKind], mut progress: impl FnMut(u8)) -> Result<()> {
        self.require_data()?;

        let mut plan: Vec<MetricKind> = Vec::new();
        for kind in with_prerequisites(kinds) {
            let stale_input = kind.prerequisites().iter().any(|p| plan.contains(p));
            if stale_input || !self.metric_state.is_computed(kind) {
                plan.push(kind);
            }
        }
        let total_weight: u32 = plan.iter().map(|k| k.weight()).sum();
        let mut done_weight = 0;
        let mut refreshed: BTreeSet<MetricKind> = BTreeSet::new();

        for &kind in &plan {
            if !refreshed.contains(&kind) {
                let outcome = {
                    let ctx = MetricContext {
                        bin_number: self.bin_number,
                        scores: &self.scores,
                    };
                    computer_for(kind)(&self.pairs, &ctx)
                };
                let deltas = match outcome {
                    Ok(deltas) => deltas,
                    Err(err) => {
                        self.forget_with_dependents(kind);
                        return Err(err.context(format!("Failed to compute '{kind}'")));
                    }
                };
                self.apply_deltas(deltas);
                self.metric_state.mark_computed(kind);
                refreshed.insert(kind);
                refreshed.extend(kind.computed_together().iter().copied());

                for dependent in dependents_of(kind) {
                    if !plan.contains(&dependent) {
                        self.forget_with_dependents(dependent);
                    }
                }
            }

            done_weight += kind.weight();
            let pct = (done_weight * 100 / total_weight.max(1)) as u8;
            if PRINT_PROGRESS {
                log::info!("[{pct:>3}%] {kind}");
            }
            progress(pct);
        }
        if total_weight == 0 {
            progress(100);
        }

        self.rebuild_metric_tables(kinds);
        Ok(())
    }

    pub fn is_computed(&self, kind: MetricKind) -> bool {
        self.metric_state.is_computed(kind)
    }

    /// Mark `kind` (and its siblings from the same run) not computed and drop
    /// their values and intermediates from every pair.
    fn forget(&mut self, kind: MetricKind) {
        let kinds: Vec<MetricKind> = std::iter::once(kind)
            .chain(kind.computed_together().iter().copied())
            .collect();
        self.metric_state.reset(kinds.iter().copied());
        for pair in self.pairs.values_mut() {
            pair.bundle.forget(kind);
        }
        for &k in &kinds {
            for row in self.rows.values_mut() {
                row.reset(k.key());
            }
            for record in self.scores.values_mut() {
                record.reset(k.key());
            }
        }
    }

    fn forget_with_dependents(&mut self, kind: MetricKind) {
        self.forget(kind);
        for dependent in dependents_of(kind) {
            if self.metric_state.is_computed(dependent) {
                self.forget_with_dependents(dependent);
            }
        }
    }

    fn apply_deltas(&mut self, deltas: Vec<PairDelta>) {
        for delta in deltas {
            let Some(pair) = self.pairs.get_mut(&delta.set_number) else {
                log::warn!("Dropping metric values for unknown set {}", delta.set_number);
                continue;
            };
            for update in delta.updates {
                pair.bundle.apply(update);
            }
            for (key, value) in delta.values {
                self.update_metric(delta.set_number, key, value);
            }
        }
    }

    /// Write one value into the flat row and, for scored keys, the score record.
    fn update_metric(&mut self, set_number: usize, key: MetricKey, value: f64) {
        if let Some(row) = self.rows.get_mut(&set_number) {
            row.set_number_value(key, value);
        }
        if let Some(record) = self.scores.get_mut(&set_number) {
            record.set(key, value);
        }
        if PRINT_PAIR_METRICS {
            log::info!("Set {set_number}: {key} = {value:.6}");
        }
    }

    fn rebuild_metric_tables(&mut self, kinds: &[MetricKind]) {
        let mut metrics: Vec<MetricKind> = Vec::new();
        for &kind in kinds {
            if !metrics.contains(&kind) {
                metrics.push(kind);
            }
        }
        self.metric_table = self.table_of(&metrics);

        let correlated: Vec<MetricKind> = metrics
            .into_iter()
            .filter(|k| k.key().include_in_corr_mat())
            .collect();
        self.correlation_matrix = correlation_matrix(&self.table_of(&correlated));
    }

    fn table_of(&self, metrics: &[MetricKind]) -> MetricTable {
        let rows = self
            .pairs
            .values()
            .map(|pair| {
                let row = self.rows.get(&pair.set_number);
                MetricTableRow {
                    set_number: pair.set_number,
                    title: pair.title.clone(),
                    values: metrics
                        .iter()
                        .map(|k| row.and_then(|r| r.number(k.key())).unwrap_or(f64::NAN))
                        .collect(),
                }
            })
            .collect();
        MetricTable {
            metrics: metrics.to_vec(),
            rows,
        }
    }

    // --- SCORES ---

    /// Mean of `kinds` per pair, stored as the computed score and the orthogonality value.
    pub fn compute_custom_score(&mut self, kinds: &[MetricKind]) -> Result<()> {
        let Some(values) = self.score_per_pair(|record| custom_score(record, kinds))? else {
            return Ok(());
        };
        for (set_number, value) in values {
            self.update_metric(set_number, MetricKey::ComputedScore, value);
            self.update_metric(set_number, MetricKey::OrthogonalityValue, value);
        }
        Ok(())
    }

    /// Product of `kinds` per pair.
    pub fn compute_orthogonality_factor(&mut self, kinds: &[MetricKind]) -> Result<()> {
        let Some(values) = self.score_per_pair(|record| orthogonality_factor(record, kinds))? else {
            return Ok(());
        };
        for (set_number, value) in values {
            self.update_metric(set_number, MetricKey::OrthogonalityFactor, value);
        }
        Ok(())
    }

    /// Group the metrics of the last computation whose correlation reaches
    /// `threshold - tolerance`.
    pub fn create_correlation_groups(&mut self, threshold: f64, tolerance: f64) -> &[CorrelationGroup] {
        self.correlation_groups = group_metrics(&self.correlation_matrix, threshold, tolerance);
        log::info!(
            "{} correlation groups over {} metrics",
            self.correlation_groups.len(),
            self.correlation_matrix.metrics.len()
        );
        &self.correlation_groups
    }

    /// Mean of group means per pair, stored as the suggested score and the
    /// orthogonality value. Does nothing until groups exist.
    pub fn compute_suggested_score(&mut self) -> Result<()> {
        let groups = &self.correlation_groups;
        let Some(values) = self.score_per_pair(|record| suggested_score(record, groups))? else {
            return Ok(());
        };
        for (set_number, value) in values {
            self.update_metric(set_number, MetricKey::SuggestedScore, value);
            self.update_metric(set_number, MetricKey::OrthogonalityValue, value);
        }
        Ok(())
    }

    /// Copy the value of `key` into the orthogonality value of every pair.
    pub fn set_orthogonality_value(&mut self, key: MetricKey) -> Result<()> {
        if !key.include_in_score() {
            bail!("'{key}' is not a score column");
        }
        let values = self
            .scores
            .iter()
            .map(|(&set_number, record)| {
                record
                    .get(key)
                    .map(|v| (set_number, v))
                    .with_context(|| format!("Set {set_number}: '{key}' has not been computed"))
            })
            .collect::<Result<Vec<_>>>()?;
        for (set_number, value) in values {
            self.update_metric(set_number, MetricKey::OrthogonalityValue, value);
        }
        Ok(())
    }

    pub fn set_use_suggested_score(&mut self, use_suggested_score: bool) {
        self.use_suggested_score = use_suggested_score;
    }

    /// Evaluate `f` for every pair; `None` when the selection is empty.
    /// Nothing is written unless every pair succeeds.
    fn score_per_pair<F>(&self, f: F) -> Result<Option<Vec<(usize, f64)>>>
    where
        F: Fn(&ScoreRecord) -> Result<Option<f64>>,
    {
        let mut values = Vec::with_capacity(self.scores.len());
        for (&set_number, record) in &self.scores {
            match f(record).with_context(|| format!("Set {set_number}"))? {
                Some(value) => values.push((set_number, value)),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    // --- RANKING ---

    /// Chosen score × N1·N2 for every pair carrying a 2D peak capacity.
    pub fn compute_practical_2d_peak_capacity(&mut self) {
        if !matches!(self.status, DataStatus::Loaded | DataStatus::PeakCapacityLoaded) {
            log::warn!("Practical 2D peak capacity skipped: data status is {}", self.status);
            return;
        }
        let values: Vec<(usize, f64)> = self
            .scores
            .iter()
            .filter_map(|(&set_number, record)| {
                practical_peak_capacity(record, self.use_suggested_score).map(|v| (set_number, v))
            })
            .collect();
        for (set_number, value) in values {
            self.update_metric(set_number, MetricKey::Practical2dPeakCapacity, value);
        }
    }

    /// Summary table of every pair, ranked by the current ranking column.
    pub fn create_results_table(&mut self) -> &[ResultsTableRow] {
        self.results = self
            .pairs
            .values()
            .map(|pair| {
                let record = self.scores.get(&pair.set_number);
                ResultsTableRow {
                    set_number: pair.set_number,
                    title: pair.title.clone(),
                    suggested_score: record.and_then(ScoreRecord::suggested_score),
                    computed_score: record.and_then(ScoreRecord::computed_score),
                    practical_2d_peak_capacity: pair
                        .bundle
                        .peak_capacity_2d
                        .and(record.and_then(|r| r.get(MetricKey::Practical2dPeakCapacity))),
                    rank: None,
                }
            })
            .collect();
        self.apply_ranks();
        &self.results
    }

    /// Re-rank the results table by `key`.
    pub fn rank_by(&mut self, key: MetricKey) -> Result<()> {
        if key == MetricKey::Title {
            bail!("Cannot rank by a text column");
        }
        self.ranking_key = key;
        self.apply_ranks();
        Ok(())
    }

    fn apply_ranks(&mut self) {
        let values: Vec<Option<f64>> = self
            .results
            .iter()
            .map(|result| match self.ranking_key {
                MetricKey::Practical2dPeakCapacity => result.practical_2d_peak_capacity,
                key => self.rows.get(&result.set_number).and_then(|row| row.number(key)),
            })
            .collect();
        for (result, rank) in self.results.iter_mut().zip(dense_rank_descending(&values)) {
            result.rank = rank;
        }
    }

    // --- ACCESSORS ---

    pub fn status(&self) -> DataStatus {
        self.status
    }

    pub fn bin_number(&self) -> usize {
        self.bin_number
    }

    pub fn pair(&self, set_number: usize) -> Option<&Pair> {
        self.pairs.get(&set_number)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    pub fn nb_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn score(&self, set_number: usize) -> Option<&ScoreRecord> {
        self.scores.get(&set_number)
    }

    pub fn result_rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.values()
    }

    pub fn results_table(&self) -> &[ResultsTableRow] {
        &self.results
    }

    pub fn correlation_groups(&self) -> &[CorrelationGroup] {
        &self.correlation_groups
    }

    pub fn metric_table(&self) -> &MetricTable {
        &self.metric_table
    }

    pub fn correlation_matrix(&self) -> &CorrelationMatrix {
        &self.correlation_matrix
    }

    pub fn retention_times(&self) -> Option<&RetentionTimeTable> {
        self.raw.as_ref()
    }

    pub fn normalized_retention_times(&self) -> Option<&NormalizedRetentionTimeTable> {
        self.normalized.as_ref()
    }

    // --- INTERNALS ---

    fn require_raw(&self) -> Result<&RetentionTimeTable> {
        match &self.raw {
            Some(raw) => Ok(raw),
            None => bail!("No retention time data loaded"),
        }
    }

    fn require_data(&self) -> Result<()> {
        self.require_raw()?;
        if self.pairs.is_empty() {
            bail!("No combination has any complete retention time pair");
        }
        Ok(())
    }

    fn loaded_status(&self) -> DataStatus {
        if self.pairs.values().any(|p| p.bundle.peak_capacity_2d.is_some()) {
            DataStatus::PeakCapacityLoaded
        } else {
            DataStatus::Loaded
        }
    }

    /// Swap in freshly built series. All metrics are stale afterwards.
    fn install_pairs(&mut self, pairs: Vec<Pair>) {
        self.rows = pairs
            .iter()
            .map(|p| (p.set_number, ResultRow::new(p.set_number, &p.title, p.nb_peaks())))
            .collect();
        self.scores = pairs.iter().map(|p| (p.set_number, ScoreRecord::default())).collect();
        self.pairs = pairs.into_iter().map(|p| (p.set_number, p)).collect();

        self.metric_state.reset_all();
        self.metric_table = MetricTable::default();
        self.correlation_matrix = CorrelationMatrix::default();
        self.correlation_groups.clear();
        self.results.clear();

        if self.peak_capacities.is_some() {
            self.attach_peak_capacities();
        }
    }

    fn reset_value(&mut self, set_number: usize, key: MetricKey) {
        if let Some(row) = self.rows.get_mut(&set_number) {
            row.reset(key);
        }
        if let Some(record) = self.scores.get_mut(&set_number) {
            record.reset(key);
        }
    }

    /// Returns the number of pairs that received a 2D peak capacity. Practical
    /// capacities computed from earlier capacities are reset everywhere.
    fn attach_peak_capacities(&mut self) -> usize {
        let Some(capacities) = &self.peak_capacities else {
            return 0;
        };
        let mut attached = Vec::new();
        let mut detached = Vec::new();
        for pair in self.pairs.values_mut() {
            match (capacities.get(&pair.x_title), capacities.get(&pair.y_title)) {
                (Some(n1), Some(n2)) => {
                    let caps = PeakCapacities { n1, n2 };
                    pair.bundle.peak_capacities = Some(caps);
                    pair.bundle.peak_capacity_2d = Some(caps.product());
                    attached.push((pair.set_number, caps.product()));
                }
                _ => {
                    log::warn!("Set {} ({}): no peak capacity for one of its conditions", pair.set_number, pair.title);
                    pair.bundle.peak_capacities = None;
                    pair.bundle.peak_capacity_2d = None;
                    detached.push(pair.set_number);
                }
            }
        }
        for set_number in detached {
            self.reset_value(set_number, MetricKey::PeakCapacity2d);
        }
        let all_sets: Vec<usize> = self.pairs.keys().copied().collect();
        for set_number in all_sets {
            self.reset_value(set_number, MetricKey::Practical2dPeakCapacity);
        }
        let count = attached.len();
        for (set_number, value) in attached {
            self.update_metric(set_number, MetricKey::PeakCapacity2d, value);
        }
        count
    }
}

/// Kinds listing `kind` as a direct prerequisite.
fn dependents_of(kind: MetricKind) -> Vec<MetricKind> {
    MetricKind::iter()
        .filter(|d| d.prerequisites().contains(&kind))
        .collect()
}

/// `kinds` with their prerequisites placed before them, without duplicates.
fn with_prerequisites(kinds: &[MetricKind]) -> Vec<MetricKind> {
    fn visit(kind: MetricKind, out: &mut Vec<MetricKind>) {
        if out.contains(&kind) {
            return;
        }
        for &prerequisite in kind.prerequisites() {
            visit(prerequisite, out);
        }
        out.push(kind);
    }

    let mut out = Vec::new();
    for &kind in kinds {
        visit(kind, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn three_by_five() -> RetentionTimeTable {
        RetentionTimeTable::from_rows(
            names(&["A", "B", "C"]),
            vec![
                ("p1".into(), vec![Some(1.0), Some(2.5), Some(3.0)]),
                ("p2".into(), vec![Some(2.0), Some(1.2), Some(4.5)]),
                ("p3".into(), vec![Some(3.0), Some(4.1), Some(1.0)]),
                ("p4".into(), vec![Some(4.0), Some(3.3), Some(2.2)]),
                ("p5".into(), vec![Some(5.0), Some(5.0), Some(3.9)]),
            ],
        )
        .unwrap()
    }

    fn with_gaps() -> RetentionTimeTable {
        RetentionTimeTable::from_rows(
            names(&["A", "B", "C", "D"]),
            vec![
                ("p1".into(), vec![Some(1.0), Some(2.5), Some(3.0), Some(1.1)]),
                ("p2".into(), vec![Some(2.0), Some(1.2), Some(4.5), Some(2.9)]),
                ("p3".into(), vec![Some(3.0), None, None, None]),
                ("p4".into(), vec![Some(4.0), Some(3.3), Some(2.2), None]),
                ("p5".into(), vec![Some(5.0), Some(5.0), Some(3.9), Some(4.4)]),
                ("p6".into(), vec![Some(6.0), Some(0.7), Some(5.1), Some(3.6)]),
            ],
        )
        .unwrap()
    }

    fn capacities() -> ConditionValues {
        [("A", 40.0), ("B", 35.0), ("C", 50.0)].into_iter().collect()
    }

    fn loaded() -> OrthogonalityEngine {
        let mut engine = OrthogonalityEngine::new();
        engine.load_retention_times(three_by_five()).unwrap();
        engine
    }

    #[test]
    fn load_builds_one_pair_per_combination() {
        let engine = loaded();
        let titles: Vec<&str> = engine.pairs().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A vs B", "A vs C", "B vs C"]);
        assert_eq!(engine.pair(2).unwrap().nb_peaks(), 5);
        assert_eq!(engine.status(), DataStatus::Loaded);
        assert_eq!(engine.result_rows().count(), 3);
    }

    #[test]
    fn computing_before_load_is_an_error() {
        let mut engine = OrthogonalityEngine::new();
        assert!(engine.compute_metrics(&[MetricKind::Pearson], |_| {}).is_err());
        assert!(engine.normalize(NormalizationMethod::MinMax).is_err());
    }

    #[test]
    fn every_metric_is_computed_with_monotonic_progress() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        assert_eq!(engine.status(), DataStatus::PeakCapacityLoaded);

        let all: Vec<MetricKind> = MetricKind::iter().collect();
        let mut reported = Vec::new();
        engine.compute_metrics(&all, |pct| reported.push(pct)).unwrap();

        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reported.last(), Some(&100));
        for kind in MetricKind::iter() {
            assert!(engine.is_computed(kind), "{kind} not computed");
        }
        let record = engine.score(1).unwrap();
        let pearson = record.get(MetricKey::PearsonR).unwrap();
        assert!((0.0..=1.0).contains(&pearson));
        assert_eq!(engine.metric_table().rows.len(), 3);
        assert_eq!(engine.metric_table().metrics.len(), all.len());
        assert!(
            engine
                .correlation_matrix()
                .metrics
                .iter()
                .all(|k| k.key().include_in_corr_mat())
        );
    }

    #[test]
    fn prerequisites_are_computed_first() {
        let mut engine = loaded();
        engine.compute_metrics(&[MetricKind::CcMean], |_| {}).unwrap();
        assert!(engine.is_computed(MetricKind::Pearson));
        assert!(engine.is_computed(MetricKind::Kendall));

        let record = engine.score(3).unwrap();
        let expected = (record.get(MetricKey::PearsonR).unwrap()
            + record.get(MetricKey::SpearmanRho).unwrap()
            + record.get(MetricKey::KendallTau).unwrap())
            / 3.0;
        assert!((record.get(MetricKey::CcMean).unwrap() - expected).abs() < 1e-12);
        // Only the requested kind goes into the metric table
        assert_eq!(engine.metric_table().metrics, vec![MetricKind::CcMean]);
    }

    #[test]
    fn geometric_approach_needs_peak_capacities() {
        let mut engine = loaded();
        assert!(engine.compute_metrics(&[MetricKind::GeometricApproach], |_| {}).is_err());
        assert!(!engine.is_computed(MetricKind::GeometricApproach));

        engine.load_peak_capacities(capacities()).unwrap();
        engine.compute_metrics(&[MetricKind::GeometricApproach], |_| {}).unwrap();
        assert!(engine.pair(1).unwrap().bundle.geometric.is_some());
    }

    #[test]
    fn bin_number_change_resets_grid_metrics_only() {
        let mut engine = loaded();
        let kinds = [MetricKind::BinBox, MetricKind::GilarWatson, MetricKind::ConvexHull];
        engine.compute_metrics(&kinds, |_| {}).unwrap();

        assert!(engine.set_bin_number(0).is_err());
        engine.set_bin_number(5).unwrap();
        assert_eq!(engine.bin_number(), 5);
        assert!(!engine.is_computed(MetricKind::BinBox));
        assert!(!engine.is_computed(MetricKind::GilarWatson));
        assert!(engine.is_computed(MetricKind::ConvexHull));
        assert!(engine.pair(1).unwrap().bundle.bin_box.is_none());

        engine.compute_metrics(&kinds, |_| {}).unwrap();
        let grid = engine.pair(1).unwrap().bundle.bin_box.clone().unwrap();
        assert_eq!(grid.bins, 5);
    }

    #[test]
    fn grid_composites_follow_a_bin_change() {
        let mut engine = loaded();
        engine.compute_metrics(&[MetricKind::MeanBinBoxPercentBin], |_| {}).unwrap();

        engine.set_bin_number(2).unwrap();
        assert!(!engine.is_computed(MetricKind::MeanBinBoxPercentBin));
        assert!(engine.is_computed(MetricKind::PercentBin));
        let record = engine.score(1).unwrap();
        assert_eq!(record.get(MetricKey::BinBoxRatio), None);
        assert_eq!(record.get(MetricKey::MeanBinBoxPercentBin), None);
        assert!(engine.result_rows().all(|row| row.number(MetricKey::BinBoxRatio).is_none()));
        assert!(engine.compute_custom_score(&[MetricKind::BinBox]).is_err());

        engine.compute_metrics(&[MetricKind::MeanBinBoxPercentBin], |_| {}).unwrap();
        for set_number in 1..=3 {
            let record = engine.score(set_number).unwrap();
            let expected = (record.get(MetricKey::BinBoxRatio).unwrap()
                + record.get(MetricKey::PercentBin).unwrap())
                / 2.0;
            let composite = record.get(MetricKey::MeanBinBoxPercentBin).unwrap();
            assert!((composite - expected).abs() < 1e-12, "set {set_number}");
        }
        assert_eq!(engine.pair(1).unwrap().bundle.bin_box.as_ref().unwrap().bins, 2);
    }

    #[test]
    fn grid_metric_alone_does_not_revive_composites() {
        let mut engine = loaded();
        engine.compute_metrics(&[MetricKind::MeanBinBoxPercentBin], |_| {}).unwrap();
        engine.set_bin_number(3).unwrap();

        engine.compute_metrics(&[MetricKind::BinBox], |_| {}).unwrap();
        assert!(engine.is_computed(MetricKind::BinBox));
        assert!(!engine.is_computed(MetricKind::MeanBinBoxPercentBin));
        assert_eq!(engine.score(2).unwrap().get(MetricKey::MeanBinBoxPercentBin), None);

        // Both in one request: the composite reads the new grid
        engine.compute_metrics(&[MetricKind::MeanBinBoxPercentBin], |_| {}).unwrap();
        engine.set_bin_number(4).unwrap();
        engine
            .compute_metrics(&[MetricKind::BinBox, MetricKind::MeanBinBoxPercentBin], |_| {})
            .unwrap();
        let record = engine.score(2).unwrap();
        let expected = (record.get(MetricKey::BinBoxRatio).unwrap() + record.get(MetricKey::PercentBin).unwrap()) / 2.0;
        assert!((record.get(MetricKey::MeanBinBoxPercentBin).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn capacity_reload_detaches_missing_conditions() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        engine.compute_metrics(&[MetricKind::ConvexHull], |_| {}).unwrap();
        engine.compute_custom_score(&[MetricKind::ConvexHull]).unwrap();
        engine.compute_practical_2d_peak_capacity();
        assert_eq!(engine.score(2).unwrap().get(MetricKey::PeakCapacity2d), Some(2000.0));

        engine
            .load_peak_capacities([("A", 40.0), ("B", 35.0)].into_iter().collect())
            .unwrap();
        // Set 2 is A vs C
        let record = engine.score(2).unwrap();
        assert_eq!(record.get(MetricKey::PeakCapacity2d), None);
        assert_eq!(record.get(MetricKey::Practical2dPeakCapacity), Some(0.0));
        assert!(engine.pair(2).unwrap().bundle.peak_capacity_2d.is_none());
        let row = engine
            .result_rows()
            .find(|r| r.number(MetricKey::SetNumber) == Some(2.0))
            .unwrap();
        assert_eq!(row.number(MetricKey::PeakCapacity2d), None);
        assert_eq!(row.number(MetricKey::Practical2dPeakCapacity), Some(0.0));

        engine.compute_practical_2d_peak_capacity();
        assert_eq!(engine.score(2).unwrap().get(MetricKey::Practical2dPeakCapacity), Some(0.0));
        let results = engine.create_results_table().to_vec();
        let a_vs_c = results.iter().find(|r| r.set_number == 2).unwrap();
        assert_eq!(a_vs_c.practical_2d_peak_capacity, None);
        let a_vs_b = results.iter().find(|r| r.set_number == 1).unwrap();
        let expected = engine.score(1).unwrap().computed_score().unwrap() * 40.0 * 35.0;
        assert!((a_vs_b.practical_2d_peak_capacity.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn capacity_reload_forgets_geometric_values() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        engine.compute_metrics(&[MetricKind::GeometricApproach], |_| {}).unwrap();

        engine
            .load_peak_capacities([("A", 80.0), ("B", 70.0), ("C", 20.0)].into_iter().collect())
            .unwrap();
        assert!(!engine.is_computed(MetricKind::GeometricApproach));
        assert!(engine.pair(1).unwrap().bundle.geometric.is_none());
        assert_eq!(engine.score(1).unwrap().get(MetricKey::GeometricApproach), None);
    }

    #[test]
    fn failed_capacity_load_leaves_engine_untouched() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        engine.compute_metrics(&[MetricKind::ConvexHull], |_| {}).unwrap();
        engine.compute_custom_score(&[MetricKind::ConvexHull]).unwrap();
        engine.compute_practical_2d_peak_capacity();
        let practical = engine.score(1).unwrap().get(MetricKey::Practical2dPeakCapacity);

        assert!(engine.load_peak_capacities([("Z", 10.0)].into_iter().collect()).is_err());
        assert!(
            engine
                .load_peak_capacities([("A", 10.0), ("B", -1.0)].into_iter().collect())
                .is_err()
        );

        assert_eq!(engine.status(), DataStatus::PeakCapacityLoaded);
        for (set_number, n2d) in [(1, 1400.0), (2, 2000.0), (3, 1750.0)] {
            assert_eq!(engine.score(set_number).unwrap().get(MetricKey::PeakCapacity2d), Some(n2d));
            assert_eq!(engine.pair(set_number).unwrap().bundle.peak_capacity_2d, Some(n2d));
        }
        assert_eq!(engine.score(1).unwrap().get(MetricKey::Practical2dPeakCapacity), practical);
    }

    #[test]
    fn nan_drop_then_recompute() {
        let mut engine = OrthogonalityEngine::new();
        engine.load_retention_times(with_gaps()).unwrap();
        assert!(engine.has_missing_values());
        let before = engine.nb_pairs();

        let dropped = engine
            .clean_nan(NanPolicy::DropSparsePeaks { threshold_pct: 50.0 })
            .unwrap();
        assert_eq!(dropped, 1);
        assert!(engine.nb_pairs() <= before);

        let all: Vec<MetricKind> = MetricKind::iter()
            .filter(|&k| k != MetricKind::GeometricApproach)
            .collect();
        engine.compute_metrics(&all, |_| {}).unwrap();
        // p4 is missing under D, so pairs with D keep 4 points
        let a_vs_d = engine.pairs().find(|p| p.title == "A vs D").unwrap();
        assert_eq!(a_vs_d.nb_peaks(), 4);
    }

    #[test]
    fn normalization_resets_flags_and_flags_missing_references() {
        let mut engine = loaded();
        engine.compute_metrics(&[MetricKind::ConvexHull], |_| {}).unwrap();

        let report = engine.normalize(NormalizationMethod::MinMax).unwrap();
        assert!(report.is_ok());
        assert!(!engine.is_computed(MetricKind::ConvexHull));
        assert_eq!(engine.status(), DataStatus::Loaded);

        engine.set_void_times([("A", 0.5), ("B", 0.5)].into_iter().collect());
        let report = engine.normalize(NormalizationMethod::VoidMax).unwrap();
        assert_eq!(report.blanked_conditions, vec!["C".to_string()]);
        assert_eq!(engine.status(), DataStatus::Error);
        // Only A vs B still has complete points
        assert_eq!(engine.nb_pairs(), 1);
    }

    #[test]
    fn scores_and_ranking() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        let kinds = [MetricKind::ConvexHull, MetricKind::BinBox, MetricKind::Pearson];

        assert!(engine.compute_custom_score(&kinds).is_err());
        engine.compute_metrics(&kinds, |_| {}).unwrap();
        engine.compute_custom_score(&kinds).unwrap();
        engine.compute_orthogonality_factor(&kinds).unwrap();

        let record = engine.score(1).unwrap().clone();
        let mean = kinds.iter().map(|k| record.get(k.key()).unwrap()).sum::<f64>() / 3.0;
        assert!((record.computed_score().unwrap() - mean).abs() < 1e-12);
        assert_eq!(record.orthogonality_value(), record.computed_score());

        // No groups yet: suggested score is left alone
        engine.compute_suggested_score().unwrap();
        assert_eq!(engine.score(1).unwrap().suggested_score(), Some(0.0));

        engine.create_correlation_groups(0.85, 0.0);
        assert!(!engine.correlation_groups().is_empty());
        engine.compute_suggested_score().unwrap();

        engine.compute_practical_2d_peak_capacity();
        let results = engine.create_results_table().to_vec();
        assert_eq!(results.len(), 3);
        let first = &results[0];
        assert_eq!(first.title, "A vs B");
        let expected = engine.score(1).unwrap().computed_score().unwrap() * 40.0 * 35.0;
        assert!((first.practical_2d_peak_capacity.unwrap() - expected).abs() < 1e-9);
        assert!(results.iter().any(|r| r.rank == Some(1)));

        engine.rank_by(MetricKey::ConvexHull).unwrap();
        assert!(engine.rank_by(MetricKey::Title).is_err());
        assert!(engine.results_table().iter().all(|r| r.rank.is_some()));
    }

    #[test]
    fn practical_capacity_is_skipped_in_error_status() {
        let mut engine = loaded();
        engine.load_peak_capacities(capacities()).unwrap();
        engine.set_void_times([("A", 0.5), ("B", 0.5)].into_iter().collect());
        engine.normalize(NormalizationMethod::VoidMax).unwrap();
        assert_eq!(engine.status(), DataStatus::Error);
        assert!(engine.pair(1).unwrap().bundle.peak_capacity_2d.is_some());

        engine.compute_metrics(&[MetricKind::ConvexHull], |_| {}).unwrap();
        engine.compute_custom_score(&[MetricKind::ConvexHull]).unwrap();
        engine.compute_practical_2d_peak_capacity();
        let row = engine.result_rows().next().unwrap();
        assert_eq!(row.number(MetricKey::Practical2dPeakCapacity), Some(0.0));
    }

    #[test]
    fn prerequisite_expansion_keeps_dependency_order() {
        let order = with_prerequisites(&[MetricKind::MeanBinBoxPercentBinNndMean, MetricKind::BinBox]);
        let pos = |k| order.iter().position(|&o| o == k).unwrap();
        assert!(pos(MetricKind::BinBox) < pos(MetricKind::MeanBinBoxPercentBinNndMean));
        assert!(pos(MetricKind::NndHarmonicMean) < pos(MetricKind::NndMean));
        assert!(pos(MetricKind::NndMean) < pos(MetricKind::MeanBinBoxPercentBinNndMean));
        assert_eq!(order.iter().filter(|&&k| k == MetricKind::BinBox).count(), 1);
    }
}

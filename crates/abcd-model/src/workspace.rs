//! ABCD workspace synthesis.
//!
//! For each block, the background prediction in cell (i, j) is expressed as
//! `rscale · rx_j · ry_i`: one overall normalization times a ratio per
//! non-dominant column and row, all free parameters seeded from the
//! aggregated simulation yields. Expressing the grid relative to its
//! dominant row and column keeps the seeded ratios in (0, 1] and their
//! fitted uncertainties weakly correlated.

use std::collections::BTreeSet;

use abcd_core::{
    Bin, Block, BlockYields, Cut, Error, GammaParams, Process, Result, YieldManager,
};

use crate::builder::{FactoryCall, ModelBuilder};

/// Whether observed counts come from data or from summed simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlindLevel {
    /// Observed counts are the data yields.
    Unblinded,
    /// Observed counts are the summed background expectation; data is never
    /// queried.
    #[default]
    Blinded,
}

/// Synthesizes the parameters and formulas of an ABCD likelihood model.
///
/// Holds the analysis configuration (baseline selection, blocks, processes)
/// plus a [`YieldManager`] view of the shared cache, and writes the model
/// content into a [`ModelBuilder`]. The POI, nuisance, and observable name
/// sets accumulated during synthesis are exposed for the caller's model
/// configuration.
pub struct WorkspaceGenerator {
    baseline: Cut,
    blocks: BTreeSet<Block>,
    backgrounds: BTreeSet<Process>,
    signal: Process,
    data: Process,
    yields: YieldManager,
    blind_level: BlindLevel,
    do_systematics: bool,
    do_kappa_correction: bool,
    pois: BTreeSet<String>,
    nuisances: BTreeSet<String>,
    observables: BTreeSet<String>,
}

impl WorkspaceGenerator {
    /// Create a generator. Defaults: blinded, systematics on, simulation
    /// closure correction on.
    pub fn new(
        baseline: Cut,
        blocks: BTreeSet<Block>,
        backgrounds: BTreeSet<Process>,
        signal: Process,
        data: Process,
        yields: YieldManager,
    ) -> Self {
        WorkspaceGenerator {
            baseline,
            blocks,
            backgrounds,
            signal,
            data,
            yields,
            blind_level: BlindLevel::default(),
            do_systematics: true,
            do_kappa_correction: true,
            pois: BTreeSet::new(),
            nuisances: BTreeSet::new(),
            observables: BTreeSet::new(),
        }
    }

    /// Set the blinding policy.
    pub fn set_blind_level(&mut self, blind_level: BlindLevel) -> &mut Self {
        self.blind_level = blind_level;
        self
    }

    /// Enable or disable systematic factors.
    pub fn set_do_systematics(&mut self, do_systematics: bool) -> &mut Self {
        self.do_systematics = do_systematics;
        self
    }

    /// Enable or disable the simulation closure correction.
    pub fn set_kappa_corrected(&mut self, do_kappa_correction: bool) -> &mut Self {
        self.do_kappa_correction = do_kappa_correction;
        self
    }

    /// The luminosity yields are evaluated at.
    pub fn luminosity(&self) -> f64 {
        self.yields.luminosity()
    }

    /// Change the luminosity for all subsequent yield retrievals.
    pub fn set_luminosity(&mut self, luminosity: f64) -> &mut Self {
        self.yields.set_luminosity(luminosity);
        self
    }

    /// Parameter-of-interest names from the last synthesis.
    pub fn pois(&self) -> &BTreeSet<String> {
        &self.pois
    }

    /// Nuisance-parameter names from the last synthesis.
    pub fn nuisances(&self) -> &BTreeSet<String> {
        &self.nuisances
    }

    /// Observable names from the last synthesis.
    pub fn observables(&self) -> &BTreeSet<String> {
        &self.observables
    }

    /// Yield for one bin and process under the baseline selection.
    pub fn get_yield(&self, bin: &Bin, process: &Process) -> Result<GammaParams> {
        self.yields.get(bin, process, &self.baseline)
    }

    /// Emit the full model content into `builder`.
    pub fn synthesize(&mut self, builder: &mut dyn ModelBuilder) -> Result<()> {
        self.pois.clear();
        self.nuisances.clear();
        self.observables.clear();

        self.add_poi(builder)?;
        if self.do_systematics {
            self.add_systematics_generators(builder)?;
        }

        let blocks: Vec<Block> = self.blocks.iter().cloned().collect();
        for block in &blocks {
            self.add_observed(builder, block)?;
            self.add_mc_yields(builder, block)?;
            self.add_mc_process_sums(builder, block)?;
            self.add_background_fractions(builder, block)?;
            self.add_abcd_parameters(builder, block)?;
            self.add_raw_background_predictions(builder, block)?;
            if self.do_kappa_correction {
                self.add_kappas(builder, block)?;
            }
            self.add_full_background_predictions(builder, block)?;
            self.add_signal_predictions(builder, block)?;
        }

        log::info!(
            "synthesized model content for {} block(s) at luminosity {}",
            blocks.len(),
            self.yields.luminosity()
        );
        Ok(())
    }

    fn bb_name(block: &Block, bin: &Bin) -> String {
        format!("BLK_{}_BIN_{}", block.name(), bin.name())
    }

    fn add_poi(&mut self, builder: &mut dyn ModelBuilder) -> Result<()> {
        builder.add(FactoryCall::Parameter { name: "r".into(), value: 1.0, lo: 0.0, hi: 20.0 })?;
        self.pois.insert("r".into());
        Ok(())
    }

    /// One nuisance per distinct systematic name, plus a per-bin log-normal
    /// factor `exp(strength·θ)`.
    fn add_systematics_generators(&mut self, builder: &mut dyn ModelBuilder) -> Result<()> {
        log::debug!("add_systematics_generators()");
        let mut defined: BTreeSet<String> = BTreeSet::new();
        for block in self.blocks.clone() {
            for row in block.bins() {
                for bin in row {
                    for systematic in bin.systematics() {
                        if defined.insert(systematic.name().to_string()) {
                            builder.add(FactoryCall::Parameter {
                                name: systematic.name().into(),
                                value: 0.0,
                                lo: -10.0,
                                hi: 10.0,
                            })?;
                            self.nuisances.insert(systematic.name().into());
                        }
                        let full_name =
                            format!("{}_{}", systematic.name(), Self::bb_name(&block, bin));
                        let strength_name = format!("strength_{full_name}");
                        builder.add(FactoryCall::Constant {
                            name: strength_name.clone(),
                            value: systematic.strength(),
                        })?;
                        builder.add(FactoryCall::Formula {
                            name: full_name,
                            expression: format!(
                                "exp({strength_name}*{})",
                                systematic.name()
                            ),
                            arguments: vec![strength_name, systematic.name().into()],
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    fn add_observed(&mut self, builder: &mut dyn ModelBuilder, block: &Block) -> Result<()> {
        log::debug!("add_observed({block})");
        for row in block.bins() {
            for bin in row {
                let gps = match self.blind_level {
                    BlindLevel::Unblinded => self.get_yield(bin, &self.data)?,
                    BlindLevel::Blinded => {
                        let mut sum = GammaParams::default();
                        for background in &self.backgrounds {
                            sum += self.yields.get(bin, background, &self.baseline)?;
                        }
                        sum
                    }
                };
                let name = format!("nobs_{}", Self::bb_name(block, bin));
                self.observables.insert(name.clone());
                builder.add(FactoryCall::Observed { name, value: gps.value() })?;
            }
        }
        Ok(())
    }

    /// Per bin and process: the effective simulated count as a constrained
    /// parameter and the per-event weight as a constant, multiplied into
    /// the simulated yield.
    fn add_mc_yields(&mut self, builder: &mut dyn ModelBuilder, block: &Block) -> Result<()> {
        log::debug!("add_mc_yields({block})");
        for row in block.bins() {
            for bin in row {
                for background in self.backgrounds.clone() {
                    let gp = self.get_yield(bin, &background)?;
                    let bbp = format!("{}_PRC_{}", Self::bb_name(block, bin), background.name());

                    let observed = format!("nobsmc_{bbp}");
                    self.observables.insert(observed.clone());
                    builder
                        .add(FactoryCall::Observed { name: observed, value: gp.n_effective() })?;

                    let count = format!("nmc_{bbp}");
                    self.nuisances.insert(count.clone());
                    builder.add(FactoryCall::Parameter {
                        name: count.clone(),
                        value: gp.n_effective(),
                        lo: 0.0,
                        hi: (5.0 * gp.n_effective()).max(20.0),
                    })?;

                    let weight = format!("wmc_{bbp}");
                    builder.add(FactoryCall::Constant { name: weight.clone(), value: gp.weight() })?;

                    builder.add(FactoryCall::Product {
                        name: format!("ymc_{bbp}"),
                        factors: vec![count, weight],
                    })?;
                }
            }
        }
        Ok(())
    }

    fn add_mc_process_sums(&mut self, builder: &mut dyn ModelBuilder, block: &Block) -> Result<()> {
        log::debug!("add_mc_process_sums({block})");
        for row in block.bins() {
            for bin in row {
                let bb = Self::bb_name(block, bin);
                let terms: Vec<String> = self
                    .backgrounds
                    .iter()
                    .map(|background| format!("ymc_{bb}_PRC_{}", background.name()))
                    .collect();
                builder.add(FactoryCall::Sum { name: format!("ymc_{bb}"), terms })?;
            }
        }
        Ok(())
    }

    fn add_background_fractions(
        &mut self,
        builder: &mut dyn ModelBuilder,
        block: &Block,
    ) -> Result<()> {
        log::debug!("add_background_fractions({block})");
        for row in block.bins() {
            for bin in row {
                let bb = Self::bb_name(block, bin);
                for background in &self.backgrounds {
                    let numerator = format!("ymc_{bb}_PRC_{}", background.name());
                    let denominator = format!("ymc_{bb}");
                    builder.add(FactoryCall::Formula {
                        name: format!("frac_BIN_{}_PRC_{}", bin.name(), background.name()),
                        expression: format!("{numerator}/{denominator}"),
                        arguments: vec![numerator, denominator],
                    })?;
                }
            }
        }
        Ok(())
    }

    /// The normalization parameter and the off-dominant row/column ratios,
    /// all seeded from the aggregated background yields.
    fn add_abcd_parameters(&mut self, builder: &mut dyn ModelBuilder, block: &Block) -> Result<()> {
        log::debug!("add_abcd_parameters({block})");
        let by = BlockYields::new(block, &self.backgrounds, &self.baseline, &self.yields)?;
        let (max_row, max_col) = match (by.max_row(), by.max_col()) {
            (Some(r), Some(c)) => (r, c),
            _ => return Err(Error::Validation(format!("block {} has no bins", block.name()))),
        };

        let norm = format!("norm_BLK_{}", block.name());
        self.nuisances.insert(norm.clone());
        let total = by.total().value();
        builder.add(FactoryCall::Parameter {
            name: norm.clone(),
            value: total.max(1.0),
            lo: 0.0,
            hi: (5.0 * total).max(20.0),
        })?;

        let mut ry_terms = vec!["1.".to_string()];
        let row_sums = by.row_sums();
        for (irow, sum) in row_sums.iter().enumerate() {
            if irow == max_row {
                continue;
            }
            let name = format!("ry{}{}_BLK_{}", irow + 1, max_row + 1, block.name());
            ry_terms.push(name.clone());
            self.nuisances.insert(name.clone());
            builder.add(FactoryCall::Parameter {
                name,
                value: sum.value() / row_sums[max_row].value(),
                lo: 0.0,
                hi: 10.0,
            })?;
        }
        let rynorm = format!("rynorm_BLK_{}", block.name());
        builder.add(FactoryCall::Sum { name: rynorm.clone(), terms: ry_terms })?;

        let mut rx_terms = vec!["1.".to_string()];
        let col_sums = by.col_sums();
        for (icol, sum) in col_sums.iter().enumerate() {
            if icol == max_col {
                continue;
            }
            let name = format!("rx{}{}_BLK_{}", icol + 1, max_col + 1, block.name());
            rx_terms.push(name.clone());
            self.nuisances.insert(name.clone());
            builder.add(FactoryCall::Parameter {
                name,
                value: sum.value() / col_sums[max_col].value(),
                lo: 0.0,
                hi: 10.0,
            })?;
        }
        let rxnorm = format!("rxnorm_BLK_{}", block.name());
        builder.add(FactoryCall::Sum { name: rxnorm.clone(), terms: rx_terms })?;

        let rnorm = format!("rnorm_BLK_{}", block.name());
        builder.add(FactoryCall::Product {
            name: rnorm.clone(),
            factors: vec![rxnorm, rynorm],
        })?;
        builder.add(FactoryCall::Formula {
            name: format!("rscale_BLK_{}", block.name()),
            expression: format!("{norm}/{rnorm}"),
            arguments: vec![norm, rnorm],
        })?;
        Ok(())
    }

    fn add_raw_background_predictions(
        &mut self,
        builder: &mut dyn ModelBuilder,
        block: &Block,
    ) -> Result<()> {
        log::debug!("add_raw_background_predictions({block})");
        let by = BlockYields::new(block, &self.backgrounds, &self.baseline, &self.yields)?;
        let (max_row, max_col) = match (by.max_row(), by.max_col()) {
            (Some(r), Some(c)) => (r, c),
            _ => return Err(Error::Validation(format!("block {} has no bins", block.name()))),
        };

        for (irow, row) in block.bins().iter().enumerate() {
            for (icol, bin) in row.iter().enumerate() {
                let bb = Self::bb_name(block, bin);
                let mut rates = Vec::new();
                for background in &self.backgrounds {
                    let mut factors = vec![format!("rscale_BLK_{}", block.name())];
                    if icol != max_col {
                        factors.push(format!(
                            "rx{}{}_BLK_{}",
                            icol + 1,
                            max_col + 1,
                            block.name()
                        ));
                    }
                    if irow != max_row {
                        factors.push(format!(
                            "ry{}{}_BLK_{}",
                            irow + 1,
                            max_row + 1,
                            block.name()
                        ));
                    }
                    factors.push(format!("frac_BIN_{}_PRC_{}", bin.name(), background.name()));
                    let rate = format!("rate_{bb}_PRC_{}", background.name());
                    rates.push(rate.clone());
                    builder.add(FactoryCall::Product { name: rate, factors })?;
                }
                builder.add(FactoryCall::Sum { name: format!("nbkg_raw_{bb}"), terms: rates })?;
            }
        }
        Ok(())
    }

    /// The simulation closure correction: the ratio of the simulated yield
    /// to its own ABCD prediction, per cell.
    fn add_kappas(&mut self, builder: &mut dyn ModelBuilder, block: &Block) -> Result<()> {
        log::debug!("add_kappas({block})");
        let blk = block.name();
        for (irow, row) in block.bins().iter().enumerate() {
            let terms: Vec<String> =
                row.iter().map(|bin| format!("ymc_{}", Self::bb_name(block, bin))).collect();
            builder
                .add(FactoryCall::Sum { name: format!("rowmc{}_BLK_{blk}", irow + 1), terms })?;
        }
        for icol in 0..block.n_cols() {
            let terms: Vec<String> = block
                .bins()
                .iter()
                .map(|row| format!("ymc_{}", Self::bb_name(block, &row[icol])))
                .collect();
            builder
                .add(FactoryCall::Sum { name: format!("colmc{}_BLK_{blk}", icol + 1), terms })?;
        }
        let row_names: Vec<String> =
            (1..=block.n_rows()).map(|i| format!("rowmc{i}_BLK_{blk}")).collect();
        builder.add(FactoryCall::Sum { name: format!("totmc_BLK_{blk}"), terms: row_names })?;

        for (irow, row) in block.bins().iter().enumerate() {
            for (icol, bin) in row.iter().enumerate() {
                let bb = Self::bb_name(block, bin);
                let rowmc = format!("rowmc{}_BLK_{blk}", irow + 1);
                let colmc = format!("colmc{}_BLK_{blk}", icol + 1);
                let totmc = format!("totmc_BLK_{blk}");
                builder.add(FactoryCall::Formula {
                    name: format!("predmc_{bb}"),
                    expression: format!("({rowmc}*{colmc})/{totmc}"),
                    arguments: vec![rowmc, colmc, totmc],
                })?;
                let ymc = format!("ymc_{bb}");
                let predmc = format!("predmc_{bb}");
                builder.add(FactoryCall::Formula {
                    name: format!("kappamc_{bb}"),
                    expression: format!("{ymc}/{predmc}"),
                    arguments: vec![ymc, predmc],
                })?;
            }
        }
        Ok(())
    }

    fn add_full_background_predictions(
        &mut self,
        builder: &mut dyn ModelBuilder,
        block: &Block,
    ) -> Result<()> {
        log::debug!("add_full_background_predictions({block})");
        for row in block.bins() {
            for bin in row {
                let bb = Self::bb_name(block, bin);
                let mut factors = vec![format!("nbkg_raw_{bb}")];
                if self.do_systematics {
                    for systematic in bin.systematics() {
                        factors.push(format!("{}_{bb}", systematic.name()));
                    }
                }
                if self.do_kappa_correction {
                    factors.push(format!("kappamc_{bb}"));
                }
                builder.add(FactoryCall::Product { name: format!("nbkg_{bb}"), factors })?;
            }
        }
        Ok(())
    }

    fn add_signal_predictions(
        &mut self,
        builder: &mut dyn ModelBuilder,
        block: &Block,
    ) -> Result<()> {
        log::debug!("add_signal_predictions({block})");
        for row in block.bins() {
            for bin in row {
                let bb = Self::bb_name(block, bin);
                let rate = format!("rate_{bb}_PRC_{}", self.signal.name());
                builder.add(FactoryCall::Constant {
                    name: rate.clone(),
                    value: self.get_yield(bin, &self.signal)?.value(),
                })?;
                builder.add(FactoryCall::Product {
                    name: format!("nsig_{bb}"),
                    factors: vec!["r".into(), rate],
                })?;
            }
        }
        Ok(())
    }
}

//! Runs the calculators in statutory order and commits the result.
//!
//! Each stage of a run is its own type and the only way to reach a stage is the previous stage's
//! transition method, so calculators cannot be invoked out of order. Everything stays in memory
//! until the final commit; an error anywhere leaves the stored snapshot untouched.

use super::allowances::{
    GiftAidCalculator, MarriageAllowanceCalculator, MarriedCouplesAllowanceCalculator,
    PensionReliefCalculator, PersonalAllowanceCalculator,
};
use super::bands::{BandLimits, TaxBandCalculator, TaxableIncome};
use super::breakdown::{BreakdownStep, CalculationStep, StepRecorder};
use super::error::CalculationError;
use super::income::{AggregatedIncome, IncomeAggregator, ReturnId, TaxReturn};
use super::investment::{
    DividendAllowanceCalculator, InvestmentIncomeTaxCalculator, SavingsAllowanceCalculator,
};
use super::liability::{input_digest, Liability, LiabilityFigures};
use super::ni::NationalInsuranceCalculator;
use super::rates::{RateStore, RateTable};
use super::reliefs::{
    FurnishedPropertyCalculator, HighIncomeChildBenefitCalculator, TradingAllowanceCalculator,
};
use super::store::{LiabilityStore, MemoryStore};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationState {
    Aggregating,
    AllowancesComputed,
    TaxableIncomeResolved,
    BandsAllocated,
    NiComputed,
    ReliefsApplied,
    Persisted,
}

impl fmt::Display for CalculationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalculationState::Aggregating => "aggregating",
            CalculationState::AllowancesComputed => "allowances_computed",
            CalculationState::TaxableIncomeResolved => "taxable_income_resolved",
            CalculationState::BandsAllocated => "bands_allocated",
            CalculationState::NiComputed => "ni_computed",
            CalculationState::ReliefsApplied => "reliefs_applied",
            CalculationState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// A stage of the pipeline
pub trait Stage {
    const STATE: CalculationState;
}

pub struct Aggregated {
    income: AggregatedIncome,
}

#[derive(Default)]
pub struct AllowancesComputed {
    income: AggregatedIncome,
    trading_income_net: Decimal,
    taxable_rental: Decimal,
    band_extension: Decimal,
}

pub struct TaxableIncomeResolved {
    income: AggregatedIncome,
    trading_income_net: Decimal,
    band_extension: Decimal,
    unused_allowance: Decimal,
}

pub struct BandsAllocated {
    employment: Decimal,
    trading_income_net: Decimal,
}

pub struct NiComputed;

pub struct ReliefsApplied;

impl Stage for Aggregated {
    const STATE: CalculationState = CalculationState::Aggregating;
}
impl Stage for AllowancesComputed {
    const STATE: CalculationState = CalculationState::AllowancesComputed;
}
impl Stage for TaxableIncomeResolved {
    const STATE: CalculationState = CalculationState::TaxableIncomeResolved;
}
impl Stage for BandsAllocated {
    const STATE: CalculationState = CalculationState::BandsAllocated;
}
impl Stage for NiComputed {
    const STATE: CalculationState = CalculationState::NiComputed;
}
impl Stage for ReliefsApplied {
    const STATE: CalculationState = CalculationState::ReliefsApplied;
}

/// One in-flight calculation run
pub struct Calculation<'a, S: Stage> {
    tax_return: &'a TaxReturn,
    rates: &'a RateTable,
    recorder: StepRecorder,
    figures: LiabilityFigures,
    stage: S,
}

impl<'a, S: Stage> Calculation<'a, S> {
    pub fn state(&self) -> CalculationState {
        S::STATE
    }

    pub fn steps(&self) -> &[CalculationStep] {
        self.recorder.steps()
    }

    fn advance<N: Stage>(self, next: N) -> Calculation<'a, N> {
        log::info!(
            "[{} run {}] {} -> {}",
            self.tax_return.id,
            self.recorder.run(),
            S::STATE,
            N::STATE
        );
        Calculation {
            tax_return: self.tax_return,
            rates: self.rates,
            recorder: self.recorder,
            figures: self.figures,
            stage: next,
        }
    }

    fn record<T: BreakdownStep>(&mut self, step: T) -> T {
        self.recorder.record(&step);
        step
    }
}

impl<'a> Calculation<'a, Aggregated> {
    pub fn start(
        tax_return: &'a TaxReturn,
        rates: &'a RateTable,
        run: u32,
    ) -> Result<Self, CalculationError> {
        let mut calc = Calculation {
            tax_return,
            rates,
            recorder: StepRecorder::new(tax_return.id.clone(), run),
            figures: LiabilityFigures::default(),
            stage: Aggregated {
                income: AggregatedIncome::default(),
            },
        };
        let income = IncomeAggregator::aggregate(&tax_return.income_sources)?;
        let income = calc.record(income);
        calc.figures.gross_income = income.gross_total;
        calc.figures.tax_paid_at_source = income.tax_paid_at_source;
        calc.stage.income = income;
        Ok(calc)
    }

    /// Income-specific reliefs, then the allowances that depend on adjusted net income.
    pub fn compute_allowances(mut self) -> Result<Calculation<'a, AllowancesComputed>, CalculationError> {
        let rates = self.rates;
        let tax_return = self.tax_return;
        let elections = &tax_return.elections;
        let income = std::mem::take(&mut self.stage.income);

        let trading = self.record(
            TradingAllowanceCalculator::new(rates)
                .calculate(income.self_employment, elections.uses_trading_allowance)?,
        );
        let ftcr = self.record(FurnishedPropertyCalculator::new(rates).calculate(income.rental));
        let pension = self.record(
            PensionReliefCalculator::new(rates).calculate(income.pension_contributions)?,
        );
        let gift_aid =
            self.record(GiftAidCalculator::new(rates).calculate(income.gift_aid_donations)?);

        let net_income = income.gross_total - trading.allowance - ftcr.relief;
        let adjusted_net_income = (net_income
            - pension.gross_contributions
            - gift_aid.total_gross_donation)
            .max(Decimal::ZERO);

        let personal = self.record(
            PersonalAllowanceCalculator::new(rates)
                .calculate(adjusted_net_income, elections.blind_person)?,
        );
        let marriage =
            self.record(MarriageAllowanceCalculator::new(rates).calculate(elections.marriage_allowance));

        let f = &mut self.figures;
        f.net_income = net_income;
        f.adjusted_net_income = adjusted_net_income;
        f.trading_allowance = trading.allowance;
        f.furnished_property_relief = ftcr.relief;
        f.pension_contributions_gross = pension.gross_contributions;
        f.pension_relief_at_source = pension.relief_at_source;
        f.gift_aid_gross = gift_aid.total_gross_donation;
        f.gift_aid_band_extension = gift_aid.band_extension;
        f.personal_allowance = (personal.total_pa + marriage.pa_adjustment).max(Decimal::ZERO);
        f.marriage_allowance_reduction = marriage.tax_reduction;

        Ok(self.advance(AllowancesComputed {
            income,
            trading_income_net: trading.trading_income_net,
            taxable_rental: ftcr.taxable_rental,
            band_extension: gift_aid.band_extension,
        }))
    }
}

impl<'a> Calculation<'a, AllowancesComputed> {
    pub fn resolve_taxable_income(mut self) -> Calculation<'a, TaxableIncomeResolved> {
        let AllowancesComputed {
            income,
            trading_income_net,
            taxable_rental,
            band_extension,
        } = std::mem::take(&mut self.stage);

        let non_savings_income =
            income.employment + trading_income_net + income.pension + taxable_rental + income.other;
        let taxable = self.record(TaxableIncome::resolve(
            self.figures.gross_income,
            self.figures.net_income,
            self.figures.adjusted_net_income,
            non_savings_income,
            self.figures.pension_contributions_gross,
            self.figures.personal_allowance,
        ));
        self.figures.taxable_income = taxable.non_savings_taxable;

        self.advance(TaxableIncomeResolved {
            income,
            trading_income_net,
            band_extension,
            unused_allowance: taxable.unused_allowance,
        })
    }
}

impl<'a> Calculation<'a, TaxableIncomeResolved> {
    /// Non-savings income first, then savings interest, then dividends.
    pub fn allocate_bands(mut self) -> Result<Calculation<'a, BandsAllocated>, CalculationError> {
        let rates = self.rates;
        let taxable = self.figures.taxable_income;
        let extension = self.stage.band_extension;
        let interest = self.stage.income.interest;
        let dividends = self.stage.income.dividends;
        let unused_allowance = self.stage.unused_allowance;

        let bands = self.record(
            TaxBandCalculator::new(rates).calculate_with_extension(taxable, extension)?,
        );
        let savings = self.record(
            SavingsAllowanceCalculator::new(rates).calculate(interest, taxable, unused_allowance),
        );
        let dividends = self.record(
            DividendAllowanceCalculator::new(rates)
                .calculate(dividends, unused_allowance - savings.personal_allowance_used),
        );
        // Extended limits size band room only
        let limits = BandLimits::new(rates, extension);
        let investment = self.record(InvestmentIncomeTaxCalculator::new(rates).calculate(
            taxable,
            savings.taxable_interest,
            dividends.taxable_dividends,
            &limits,
        ));

        let f = &mut self.figures;
        f.basic_rate_tax = bands.basic_tax;
        f.higher_rate_tax = bands.higher_tax;
        f.additional_rate_tax = bands.additional_tax;
        f.savings_allowance = savings.allowance;
        f.taxable_interest = savings.taxable_interest;
        f.savings_interest_tax = investment.savings_interest_tax;
        f.dividend_allowance = dividends.allowance;
        f.taxable_dividends = dividends.taxable_dividends;
        f.dividend_basic_tax = investment.dividend_basic_tax;
        f.dividend_higher_tax = investment.dividend_higher_tax;
        f.dividend_additional_tax = investment.dividend_additional_tax;
        f.total_dividend_tax = investment.total_dividend_tax;

        let next = BandsAllocated {
            employment: self.stage.income.employment,
            trading_income_net: self.stage.trading_income_net,
        };
        Ok(self.advance(next))
    }
}

impl<'a> Calculation<'a, BandsAllocated> {
    pub fn compute_ni(mut self) -> Result<Calculation<'a, NiComputed>, CalculationError> {
        let ni = NationalInsuranceCalculator::new(self.rates);
        let class_1 = self.record(ni.class_1(self.stage.employment)?);
        let class_2 = self.record(ni.class_2(self.stage.trading_income_net)?);
        let class_4 = self.record(ni.class_4(self.stage.trading_income_net)?);

        self.figures.class_1_ni = class_1.contribution;
        self.figures.class_2_ni = class_2.contribution;
        self.figures.class_4_ni = class_4.contribution;

        Ok(self.advance(NiComputed))
    }
}

impl<'a> Calculation<'a, NiComputed> {
    /// Charges and tax reductions that sit on top of the band tax.
    pub fn apply_reliefs(mut self) -> Result<Calculation<'a, ReliefsApplied>, CalculationError> {
        let rates = self.rates;
        let tax_return = self.tax_return;
        let elections = &tax_return.elections;
        let adjusted_net_income = self.figures.adjusted_net_income;

        let hicbc = self.record(
            HighIncomeChildBenefitCalculator::new(rates)
                .calculate(adjusted_net_income, elections.child_benefit_received)?,
        );
        let mca = self.record(MarriedCouplesAllowanceCalculator::new(rates).calculate(
            elections.claims_married_couples_allowance,
            elections.spouse_dob,
            adjusted_net_income,
        )?);

        self.figures.hicbc_charge = hicbc.charge;
        self.figures.married_couples_allowance_relief = mca.relief;

        Ok(self.advance(ReliefsApplied))
    }
}

impl<'a> Calculation<'a, ReliefsApplied> {
    /// Derive the liability and hand back everything the commit needs.
    pub fn finish(mut self) -> Result<(Liability, Vec<CalculationStep>), CalculationError> {
        let digest = input_digest(self.tax_return, self.rates)?;
        let liability = self.record(Liability::new(
            self.tax_return.id.clone(),
            self.tax_return.tax_year,
            self.recorder.run(),
            digest,
            self.figures.clone(),
        ));
        Ok((liability, self.recorder.into_steps()))
    }
}

fn run_pipeline(
    tax_return: &TaxReturn,
    rates: &RateTable,
    run: u32,
) -> Result<(Liability, Vec<CalculationStep>), CalculationError> {
    Calculation::start(tax_return, rates, run)?
        .compute_allowances()?
        .resolve_taxable_income()
        .allocate_bands()?
        .compute_ni()?
        .apply_reliefs()?
        .finish()
}

/// Sequences calculation runs and owns their persistence.
pub struct Orchestrator<S: LiabilityStore = MemoryStore> {
    rates: RateStore,
    store: S,
    locks: Mutex<HashMap<ReturnId, Arc<Mutex<()>>>>,
}

impl Orchestrator<MemoryStore> {
    pub fn new(rates: RateStore) -> Self {
        Self::with_store(rates, MemoryStore::new())
    }
}

impl<S: LiabilityStore> Orchestrator<S> {
    pub fn with_store(rates: RateStore, store: S) -> Self {
        Orchestrator {
            rates,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rates(&self) -> &RateStore {
        &self.rates
    }

    pub fn liability(&self, id: &ReturnId) -> Option<Liability> {
        self.store.liability(id)
    }

    /// Latest step per key for reporting
    pub fn breakdown(&self, id: &ReturnId) -> Vec<CalculationStep> {
        self.store.latest_steps(id)
    }

    /// Run the full pipeline for a return. Runs for the same return are serialised.
    pub fn calculate(&self, tax_return: &TaxReturn) -> Result<Liability, CalculationError> {
        let lock = self.lock_for(&tax_return.id);
        let result = {
            let _guard = lock.lock();
            self.calculate_locked(tax_return)
        };
        self.release_lock(&tax_return.id, lock);
        result
    }

    fn calculate_locked(&self, tax_return: &TaxReturn) -> Result<Liability, CalculationError> {
        let rates = self.rates.for_tax_year(tax_return.tax_year);
        let run = self.store.last_run(&tax_return.id) + 1;
        log::info!(
            "Calculating {} for {} (run {})",
            tax_return.id,
            tax_return.tax_year,
            run
        );

        let (liability, steps) = run_pipeline(tax_return, &rates, run)
            .inspect_err(|e| log::warn!("Calculation for {} failed: {}", tax_return.id, e))?;

        self.store
            .commit(&tax_return.id, run, steps, liability.clone())?;
        log::info!(
            "[{} run {}] {} -> {}: net liability {}",
            tax_return.id,
            run,
            CalculationState::ReliefsApplied,
            CalculationState::Persisted,
            liability.net_liability
        );
        Ok(liability)
    }

    fn lock_for(&self, id: &ReturnId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(id.clone()).or_default().clone()
    }

    /// Drop the return's lock once no other run holds or waits on it.
    fn release_lock(&self, id: &ReturnId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(id);
        }
    }
}

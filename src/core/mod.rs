pub mod allowances;
pub mod bands;
pub mod breakdown;
pub mod error;
pub mod income;
pub mod investment;
pub mod liability;
pub mod money;
pub mod ni;
pub mod orchestrator;
pub mod rates;
pub mod reliefs;
pub mod store;

// Flat public surface for domain types and calculators.
pub use allowances::{
    GiftAid, GiftAidCalculator, MarriageAllowance, MarriageAllowanceCalculator,
    MarriedCouplesAllowance, MarriedCouplesAllowanceCalculator, PensionRelief,
    PensionReliefCalculator, PersonalAllowance, PersonalAllowanceCalculator,
};
pub use bands::{BandAllocation, BandLimits, TaxBandCalculator, TaxableIncome};
pub use breakdown::{latest_per_key, BreakdownStep, CalculationStep, InputValue, StepInputs};
pub use error::{CalculationError, MAX_AMOUNT};
pub use income::{
    AggregatedIncome, Elections, IncomeAggregator, IncomeCategory, IncomeSource,
    MarriageAllowanceRole, ReturnId, TaxReturn,
};
pub use investment::{
    BandRoom, BandSlices, DividendAllowance, DividendAllowanceCalculator, InvestmentIncomeTax,
    InvestmentIncomeTaxCalculator, SavingsAllowance, SavingsAllowanceCalculator,
};
pub use liability::{input_digest, Liability, LiabilityFigures, LiabilitySummary};
pub use money::{format_gbp, pence};
pub use ni::{ClassTwoContribution, NationalInsuranceCalculator, NiClass, TieredContribution};
pub use orchestrator::{Calculation, CalculationState, Orchestrator};
pub use rates::{RateStore, RateTable, TaxBand, TaxYear};
pub use reliefs::{
    ChildBenefitCharge, FurnishedPropertyCalculator, FurnishedPropertyRelief,
    HighIncomeChildBenefitCalculator, TradingAllowance, TradingAllowanceCalculator,
};
pub use store::{LiabilityStore, MemoryStore};

use serde::{Deserialize, Serialize};

use super::currency::parse_brl;
use super::domain::{RegionRule, ThresholdRule};

/// Score breakdown for one lead. Derived on every request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    #[serde(rename = "valorPorConvidado")]
    pub per_guest_value: f64,
    #[serde(rename = "pesoRegiao")]
    pub region_weight: f64,
    #[serde(rename = "pesoValor")]
    pub value_weight: f64,
    #[serde(rename = "thresholdApplied")]
    pub threshold_applied: Option<f64>,
    #[serde(rename = "scoreFinal")]
    pub final_score: f64,
    #[serde(rename = "aprovado")]
    pub approved: bool,
}

impl CalculationResult {
    pub fn verdict_label(&self) -> &'static str {
        if self.approved {
            "Aprovado"
        } else {
            "Reprovado"
        }
    }
}

/// Compute the lead score from the current rule tables.
///
/// Inputs are not validated here: zero guests degrade to a per-guest value of
/// zero, and unknown regions (including "Outro") weigh nothing.
pub fn calculate_score(
    region_name: &str,
    guests: u32,
    investment: f64,
    regions: &[RegionRule],
    thresholds: &[ThresholdRule],
    cutoff: f64,
) -> CalculationResult {
    let per_guest_value = if guests > 0 {
        investment / f64::from(guests)
    } else {
        0.0
    };

    let region_weight = regions
        .iter()
        .find(|region| region.matches(region_name))
        .map(|region| region.weight)
        .unwrap_or(0.0);

    let (value_weight, threshold_applied) = match floor_threshold(thresholds, per_guest_value) {
        Some(threshold) => (threshold.weight, Some(threshold.value)),
        None => (0.0, None),
    };

    let final_score = region_weight + value_weight;

    CalculationResult {
        per_guest_value,
        region_weight,
        value_weight,
        threshold_applied,
        final_score,
        approved: final_score >= cutoff,
    }
}

/// Largest threshold whose value does not exceed `per_guest_value`.
///
/// Equal values resolve to the one listed last in the input.
pub fn floor_threshold(thresholds: &[ThresholdRule], per_guest_value: f64) -> Option<&ThresholdRule> {
    let mut sorted: Vec<&ThresholdRule> = thresholds.iter().collect();
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let qualifying = sorted.partition_point(|threshold| threshold.value <= per_guest_value);
    qualifying.checked_sub(1).map(|index| sorted[index])
}

/// Integer at the start of `text`, ignoring whatever follows it:
/// `"150.0"` and `"150 convidados"` both read as 150.
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

/// Validated calculator form.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub region: String,
    pub guests: u32,
    pub investment: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreInputError {
    #[error("select a region")]
    MissingRegion,
    #[error("guest count must be a whole number greater than zero (got '{0}')")]
    InvalidGuests(String),
    #[error("investment must be greater than zero (got '{0}')")]
    InvalidInvestment(String),
}

impl ScoreInput {
    /// Validate raw form fields. The investment accepts currency text.
    pub fn from_form(region: &str, guests: &str, investment: &str) -> Result<Self, ScoreInputError> {
        Self::validate(region, guests, parse_brl(investment), investment)
    }

    /// Same checks as [`ScoreInput::from_form`] for an already numeric investment.
    pub fn from_parts(region: &str, guests: &str, investment: f64) -> Result<Self, ScoreInputError> {
        Self::validate(region, guests, investment, &investment.to_string())
    }

    fn validate(
        region: &str,
        guests: &str,
        amount: f64,
        raw_investment: &str,
    ) -> Result<Self, ScoreInputError> {
        let region = region.trim();
        if region.is_empty() {
            return Err(ScoreInputError::MissingRegion);
        }

        let guest_count = leading_integer(guests)
            .filter(|count| *count > 0)
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| ScoreInputError::InvalidGuests(guests.to_string()))?;

        if amount.is_nan() || amount <= 0.0 {
            return Err(ScoreInputError::InvalidInvestment(raw_investment.to_string()));
        }

        Ok(Self {
            region: region.to_string(),
            guests: guest_count,
            investment: amount,
        })
    }

    pub fn evaluate(
        &self,
        regions: &[RegionRule],
        thresholds: &[ThresholdRule],
        cutoff: f64,
    ) -> CalculationResult {
        calculate_score(
            &self.region,
            self.guests,
            self.investment,
            regions,
            thresholds,
            cutoff,
        )
    }
}

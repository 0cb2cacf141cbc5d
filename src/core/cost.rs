//! Cost estimation from token usage

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use crate::core::models::{TokenUsage, TranslationRequest, TranslationResult};

/// Domain recorded for requests without context
pub const DEFAULT_DOMAIN: &str = "general";

/// Models flagged as expensive translators
const PREMIUM_MODELS: &[&str] = &["gpt-4", "gpt-4-turbo"];

/// Average cost per translation above which a domain is flagged
const DOMAIN_COST_ALERT: f64 = 0.01;

/// Price in USD per 1k tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Default pricing table
const DEFAULT_PRICING: &[(&str, f64, f64)] = &[
    ("gpt-3.5-turbo", 0.0015, 0.002),
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4", 0.03, 0.06),
];

/// Estimated spend for one translation result
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// `None` when the model has no known price
    pub translation: Option<f64>,
    pub evaluation: Option<f64>,
}

impl CostBreakdown {
    /// Sum of the known parts
    pub fn total(&self) -> f64 {
        round_usd(self.translation.unwrap_or(0.0) + self.evaluation.unwrap_or(0.0))
    }

    pub fn add(&mut self, other: CostBreakdown) {
        self.translation = sum_known(self.translation, other.translation);
        self.evaluation = sum_known(self.evaluation, other.evaluation);
    }
}

fn sum_known(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(round_usd(a.unwrap_or(0.0) + b.unwrap_or(0.0))),
    }
}

fn round_usd(value: f64) -> f64 {
    round_to(value, 6)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Prices token usage per model
#[derive(Debug, Clone)]
pub struct CostEstimator {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for CostEstimator {
    fn default() -> Self {
        let pricing = DEFAULT_PRICING
            .iter()
            .map(|(model, input, output)| {
                (
                    model.to_string(),
                    ModelPricing {
                        input_per_1k: *input,
                        output_per_1k: *output,
                    },
                )
            })
            .collect();
        Self { pricing }
    }
}

impl CostEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the price of a model
    pub fn with_pricing(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.pricing.insert(model.into(), pricing);
        self
    }

    /// Cost of `usage` on `model`, `None` for unknown models
    pub fn estimate(&self, model: &str, usage: &TokenUsage) -> Option<f64> {
        let pricing = self.pricing.get(model)?;
        Some(round_usd(
            usage.input_tokens as f64 / 1000.0 * pricing.input_per_1k
                + usage.output_tokens as f64 / 1000.0 * pricing.output_per_1k,
        ))
    }

    /// Translation and evaluation cost of a finished request
    pub fn estimate_result(&self, result: &TranslationResult) -> CostBreakdown {
        CostBreakdown {
            translation: self.estimate(&result.translation_model, &result.usage.translation),
            evaluation: self.estimate(&result.evaluation_model, &result.usage.evaluation),
        }
    }

    /// Summed cost of many requests
    pub fn estimate_all<'a>(&self, results: impl IntoIterator<Item = &'a TranslationResult>) -> CostBreakdown {
        results
            .into_iter()
            .fold(CostBreakdown::default(), |mut total, result| {
                total.add(self.estimate_result(result));
                total
            })
    }
}

/// One priced translation kept by [`CostLedger`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub timestamp: DateTime<Utc>,
    pub source_lang: String,
    pub target_lang: String,
    /// Source text length in characters
    pub text_length: usize,
    pub tokens_used: u64,
    pub translation_cost: f64,
    pub evaluation_cost: f64,
    pub total_cost: f64,
    pub model_used: String,
    pub quality_score: f64,
    pub attempts: usize,
    /// Request context, or [`DEFAULT_DOMAIN`]
    pub domain: String,
}

/// Spend of a single UTC day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_translations: usize,
    pub total_cost: f64,
    pub translation_cost: f64,
    pub evaluation_cost: f64,
    pub avg_cost_per_translation: f64,
    pub total_tokens: u64,
}

/// Aggregates of one domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainStats {
    pub count: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub avg_cost: f64,
    pub avg_quality: f64,
    pub avg_attempts: f64,
}

/// In-memory log of priced translations with summary reports
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    estimator: CostEstimator,
    records: Vec<CostRecord>,
}

impl CostLedger {
    pub fn new(estimator: CostEstimator) -> Self {
        Self {
            estimator,
            records: Vec::new(),
        }
    }

    /// Price `result` and keep it, stamped with the current time
    pub fn record(&mut self, request: &TranslationRequest, result: &TranslationResult) -> &CostRecord {
        self.record_at(request, result, Utc::now())
    }

    /// Price `result` and keep it with an explicit timestamp
    pub fn record_at(
        &mut self,
        request: &TranslationRequest,
        result: &TranslationResult,
        timestamp: DateTime<Utc>,
    ) -> &CostRecord {
        let breakdown = self.estimator.estimate_result(result);
        let translation_cost = breakdown.translation.unwrap_or(0.0);
        let evaluation_cost = breakdown.evaluation.unwrap_or(0.0);

        self.records.push(CostRecord {
            timestamp,
            source_lang: request.source_lang().to_string(),
            target_lang: request.target_lang().to_string(),
            text_length: request.text().chars().count(),
            tokens_used: result.usage.total_tokens(),
            translation_cost,
            evaluation_cost,
            total_cost: breakdown.total(),
            model_used: result.translation_model.clone(),
            quality_score: result.quality_score,
            attempts: result.attempts_count(),
            domain: request.context().unwrap_or(DEFAULT_DOMAIN).to_string(),
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[CostRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Totals for translations recorded on `date` (UTC)
    pub fn daily_summary(&self, date: NaiveDate) -> DailySummary {
        let day: Vec<&CostRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp.date_naive() == date)
            .collect();

        let total_cost: f64 = day.iter().map(|r| r.total_cost).sum();
        let avg = if day.is_empty() { 0.0 } else { total_cost / day.len() as f64 };

        DailySummary {
            date,
            total_translations: day.len(),
            total_cost: round_to(total_cost, 4),
            translation_cost: round_to(day.iter().map(|r| r.translation_cost).sum(), 4),
            evaluation_cost: round_to(day.iter().map(|r| r.evaluation_cost).sum(), 4),
            avg_cost_per_translation: round_to(avg, 4),
            total_tokens: day.iter().map(|r| r.tokens_used).sum(),
        }
    }

    /// Cost, quality and retry averages per domain
    pub fn domain_analysis(&self) -> BTreeMap<String, DomainStats> {
        let mut domains: BTreeMap<String, DomainStats> = BTreeMap::new();
        for record in &self.records {
            let stats = domains.entry(record.domain.clone()).or_default();
            stats.count += 1;
            stats.total_cost += record.total_cost;
            stats.total_tokens += record.tokens_used;
            stats.avg_quality += record.quality_score;
            stats.avg_attempts += record.attempts as f64;
        }

        for stats in domains.values_mut() {
            let count = stats.count as f64;
            stats.avg_cost = round_to(stats.total_cost / count, 4);
            stats.avg_quality = round_to(stats.avg_quality / count, 1);
            stats.avg_attempts = round_to(stats.avg_attempts / count, 1);
            stats.total_cost = round_to(stats.total_cost, 4);
        }
        domains
    }

    /// Hints for lowering spend, derived from the recorded usage
    pub fn suggestions(&self) -> Vec<String> {
        if self.records.is_empty() {
            return vec!["No data available for analysis".to_string()];
        }

        let total = self.records.len() as f64;
        let mut suggestions = Vec::new();

        let high_retry = self.records.iter().filter(|r| r.attempts > 2).count() as f64;
        if high_retry > total * 0.2 {
            suggestions.push(
                "High retry rate detected. Consider lowering quality threshold or improving prompts.".to_string(),
            );
        }

        let premium = self
            .records
            .iter()
            .filter(|r| PREMIUM_MODELS.contains(&r.model_used.as_str()))
            .count() as f64;
        if premium > total * 0.5 {
            suggestions.push(
                "Consider using gpt-3.5-turbo for translation and gpt-4o for evaluation only.".to_string(),
            );
        }

        for (domain, stats) in self.domain_analysis() {
            if stats.avg_cost > DOMAIN_COST_ALERT {
                suggestions.push(format!(
                    "High costs in {} domain (${}/translation). Consider domain-specific optimization.",
                    domain, stats.avg_cost
                ));
            }
        }

        if suggestions.is_empty() {
            suggestions.push("Cost usage appears optimized!".to_string());
        }
        suggestions
    }

    /// Human-readable cost report; "recent" means the 7 days before `now`
    pub fn report(&self, now: DateTime<Utc>) -> String {
        if self.records.is_empty() {
            return "No cost data available for analysis.".to_string();
        }

        let total_cost: f64 = self.records.iter().map(|r| r.total_cost).sum();
        let count = self.records.len();
        let week_ago = now - Duration::days(7);
        let recent: Vec<&CostRecord> = self.records.iter().filter(|r| r.timestamp > week_ago).collect();

        let mut out = String::new();
        let _ = writeln!(out, "📊 TRANSLATION COST REPORT");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "\n📈 Overall");
        let _ = writeln!(out, "Translations: {}", count);
        let _ = writeln!(out, "Total cost: ${:.4}", total_cost);
        let _ = writeln!(out, "Average cost per translation: ${:.4}", total_cost / count as f64);
        let _ = writeln!(out, "\n📅 Last 7 days");
        let _ = writeln!(out, "Translations: {}", recent.len());
        let _ = writeln!(
            out,
            "Cost: ${:.4}",
            recent.iter().map(|r| r.total_cost).sum::<f64>()
        );

        let _ = writeln!(out, "\n🏷️  Domains");
        for (domain, stats) in self.domain_analysis() {
            let _ = writeln!(
                out,
                "{}: {} translations, ${:.4} total, ${:.4} avg, quality {:.1}, {:.1} attempts",
                domain, stats.count, stats.total_cost, stats.avg_cost, stats.avg_quality, stats.avg_attempts
            );
        }

        let _ = writeln!(out, "\n💡 Suggestions");
        for (i, suggestion) in self.suggestions().iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, suggestion);
        }
        out
    }
}

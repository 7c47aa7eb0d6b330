//! Statement line matching
//!
//! A candidate payment must have exactly the line's amount. Among those,
//! [`score_candidate`] blends date proximity and reference similarity into a
//! confidence in `[0, 1]`. A line is auto-matched only when exactly one
//! candidate clears the threshold and no other line in the same pass wants
//! that candidate; everything else is left for a person to resolve.
//!
//! The weights are policy, not contract. Only the shape is fixed: hard
//! amount equality, soft date and reference scoring, never break ties.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{PaymentId, ReconciliationLineId};
use crate::error::BillingError;
use crate::payment::Payment;
use crate::reconciliation::ReconciliationLine;

/// Tunable matching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPolicy {
    /// Dates further apart than this score zero on proximity
    pub date_window_days: u32,
    /// Minimum confidence for an auto-match
    pub threshold: Decimal,
    pub amount_weight: Decimal,
    pub date_weight: Decimal,
    pub reference_weight: Decimal,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            date_window_days: 3,
            threshold: Decimal::new(70, 2),
            amount_weight: Decimal::new(40, 2),
            date_weight: Decimal::new(30, 2),
            reference_weight: Decimal::new(30, 2),
        }
    }
}

impl MatchingPolicy {
    /// Overrides the window and threshold, keeping the default weights
    pub fn with_window_and_threshold(
        date_window_days: u32,
        threshold: Decimal,
    ) -> Result<Self, BillingError> {
        let policy = Self {
            date_window_days,
            threshold,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that the weights sum to one and the threshold is reachable
    pub fn validate(&self) -> Result<(), BillingError> {
        let weights = [self.amount_weight, self.date_weight, self.reference_weight];
        if weights.iter().any(|w| w.is_sign_negative()) {
            return Err(BillingError::validation("Matching weights must not be negative"));
        }
        if weights.iter().sum::<Decimal>() != Decimal::ONE {
            return Err(BillingError::validation("Matching weights must sum to 1"));
        }
        if self.threshold <= Decimal::ZERO || self.threshold > Decimal::ONE {
            return Err(BillingError::validation("Matching threshold must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Score of one payment against one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub payment_id: PaymentId,
    /// Weighted total in `[0, 1]`
    pub confidence: Decimal,
    pub date_score: Decimal,
    pub reference_score: Decimal,
    /// Line date minus payment date
    pub date_offset_days: i64,
}

/// An auto-match accepted by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedMatch {
    pub line_id: ReconciliationLineId,
    pub payment_id: PaymentId,
    pub confidence: Decimal,
}

/// Scores `payment` as a candidate for `line`
///
/// Returns `None` when the payment cannot represent the line at all: a debit
/// line, a payment that does not count toward any bill, or any difference
/// in amount or currency.
pub fn score_candidate(
    policy: &MatchingPolicy,
    line: &ReconciliationLine,
    payment: &Payment,
) -> Option<CandidateScore> {
    if !line.is_credit() || !payment.contributes() || line.amount != payment.amount {
        return None;
    }

    let date_offset_days = (line.transaction_date - payment.paid_on).num_days();
    let date_score = date_proximity(date_offset_days, policy.date_window_days);
    let reference_score = reference_similarity(
        &payment.receipt_number,
        line.reference.as_deref(),
        &line.description,
    );

    let confidence = (policy.amount_weight
        + policy.date_weight * date_score
        + policy.reference_weight * reference_score)
        .round_dp(4)
        .min(Decimal::ONE);

    Some(CandidateScore {
        payment_id: payment.id,
        confidence,
        date_score,
        reference_score,
        date_offset_days,
    })
}

/// All scorable candidates for a line, best first
///
/// Ties are ordered by payment id so the listing is stable.
pub fn rank_candidates<'a, I>(
    policy: &MatchingPolicy,
    line: &ReconciliationLine,
    pool: I,
) -> Vec<CandidateScore>
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut scores: Vec<CandidateScore> = pool
        .into_iter()
        .filter_map(|payment| score_candidate(policy, line, payment))
        .collect();
    scores.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.payment_id.cmp(&b.payment_id))
    });
    scores
}

/// Runs one matching pass over the unmatched credit lines
///
/// `pool` must already exclude payments linked to any line. The result is
/// independent of the order of `lines` and `pool`.
pub fn plan_pass(
    policy: &MatchingPolicy,
    lines: &[ReconciliationLine],
    pool: &[Payment],
) -> Vec<ProposedMatch> {
    let mut qualifying: BTreeMap<ReconciliationLineId, Vec<CandidateScore>> = BTreeMap::new();
    let mut demand: BTreeMap<PaymentId, usize> = BTreeMap::new();

    for line in lines.iter().filter(|l| l.is_credit() && !l.is_matched()) {
        let above: Vec<CandidateScore> = rank_candidates(policy, line, pool)
            .into_iter()
            .filter(|s| s.confidence >= policy.threshold)
            .collect();
        for score in &above {
            *demand.entry(score.payment_id).or_default() += 1;
        }
        qualifying.insert(line.id, above);
    }

    let mut claimed = BTreeSet::new();
    let mut accepted = Vec::new();
    for (line_id, scores) in qualifying {
        let [only] = scores.as_slice() else {
            tracing::debug!(line_id = %line_id, candidates = scores.len(), "no unique candidate");
            continue;
        };
        if demand.get(&only.payment_id).copied() != Some(1) || !claimed.insert(only.payment_id) {
            tracing::debug!(
                line_id = %line_id,
                payment_id = %only.payment_id,
                "candidate contested"
            );
            continue;
        }
        accepted.push(ProposedMatch {
            line_id,
            payment_id: only.payment_id,
            confidence: only.confidence,
        });
    }
    accepted
}

fn date_proximity(offset_days: i64, window_days: u32) -> Decimal {
    let distance = offset_days.unsigned_abs();
    if distance > u64::from(window_days) {
        return Decimal::ZERO;
    }
    let span = Decimal::from(u64::from(window_days) + 1);
    ((span - Decimal::from(distance)) / span).round_dp(4)
}

/// 1 when the whole receipt number appears, else the share of its tokens found
fn reference_similarity(receipt: &str, reference: Option<&str>, description: &str) -> Decimal {
    let haystack = format!("{} {}", reference.unwrap_or_default(), description);

    let needle = compact(receipt);
    if needle.is_empty() {
        return Decimal::ZERO;
    }
    if compact(&haystack).contains(&needle) {
        return Decimal::ONE;
    }

    let wanted = tokens(receipt);
    let present = tokens(&haystack);
    let hits = wanted.iter().filter(|t| present.contains(*t)).count();
    if wanted.is_empty() {
        Decimal::ZERO
    } else {
        (Decimal::from(hits) / Decimal::from(wanted.len())).round_dp(4)
    }
}

fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::{BillId, Currency, Money, ReconciliationBatchId, StudentId, UserId};
    use rust_decimal_macros::dec;

    use crate::payment::PaymentMethod;
    use crate::reconciliation::{Direction, LineMatch};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn verified(receipt: &str, amount: Decimal, day: u32) -> Payment {
        let mut p = Payment::new(
            receipt.to_string(),
            BillId::new(),
            StudentId::new(),
            Money::new(amount, Currency::IDR),
            PaymentMethod::BankTransfer,
            date(day),
            UserId::new(),
        )
        .unwrap();
        p.verify(UserId::new()).unwrap();
        p
    }

    fn line(amount: Decimal, day: u32, reference: Option<&str>) -> ReconciliationLine {
        let now = Utc::now();
        ReconciliationLine {
            id: ReconciliationLineId::new_v7(),
            batch_id: ReconciliationBatchId::new(),
            line_number: 1,
            transaction_date: date(day),
            description: "TRSF E-BANKING CR".to_string(),
            amount: Money::new(amount, Currency::IDR),
            direction: Direction::Credit,
            reference: reference.map(str::to_string),
            match_state: LineMatch::Unmatched,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_exact_reference_scores_full_confidence() {
        let policy = MatchingPolicy::default();
        let p = verified("KWT/2025/01/00007", dec!(300000), 10);
        let l = line(dec!(300000), 10, Some("KWT/2025/01/00007"));

        let score = score_candidate(&policy, &l, &p).unwrap();
        assert_eq!(score.confidence, dec!(1));
        assert_eq!(score.reference_score, dec!(1));
    }

    #[test]
    fn test_amount_must_match_exactly() {
        let policy = MatchingPolicy::default();
        let p = verified("KWT/2025/01/00007", dec!(300000), 10);
        let l = line(dec!(299999), 10, Some("KWT/2025/01/00007"));
        assert!(score_candidate(&policy, &l, &p).is_none());
    }

    #[test]
    fn test_date_score_decays_to_zero_outside_window() {
        assert_eq!(date_proximity(0, 3), dec!(1));
        assert_eq!(date_proximity(-2, 3), dec!(0.5));
        assert_eq!(date_proximity(4, 3), dec!(0));
    }

    #[test]
    fn test_reference_token_overlap() {
        let score = reference_similarity("KWT/2025/01/00007", Some("BAYAR 00007 KWT"), "");
        assert_eq!(score, dec!(0.5));
        assert_eq!(reference_similarity("KWT/2025/01/00007", None, "kwt2025 01 00007"), dec!(1));
    }

    #[test]
    fn test_unique_candidate_is_accepted() {
        let policy = MatchingPolicy::default();
        let p = verified("KWT/2025/01/00007", dec!(300000), 10);
        let l = line(dec!(300000), 10, Some("KWT/2025/01/00007"));

        let plan = plan_pass(&policy, &[l.clone()], &[p.clone()]);
        assert_eq!(
            plan,
            vec![ProposedMatch {
                line_id: l.id,
                payment_id: p.id,
                confidence: dec!(1)
            }]
        );
    }

    #[test]
    fn test_ambiguous_candidates_are_left_alone() {
        let policy = MatchingPolicy::default();
        let pool = vec![
            verified("KWT/2025/01/00001", dec!(300000), 10),
            verified("KWT/2025/01/00002", dec!(300000), 10),
        ];
        let l = line(dec!(300000), 10, None);
        assert!(plan_pass(&policy, &[l], &pool).is_empty());
    }

    #[test]
    fn test_contested_payment_is_left_alone() {
        let policy = MatchingPolicy::default();
        let pool = vec![verified("KWT/2025/01/00001", dec!(300000), 10)];
        let lines = vec![line(dec!(300000), 10, None), line(dec!(300000), 10, None)];
        assert!(plan_pass(&policy, &lines, &pool).is_empty());
    }

    #[test]
    fn test_pass_is_order_independent() {
        let policy = MatchingPolicy::default();
        let pool = vec![
            verified("KWT/2025/01/00001", dec!(100000), 3),
            verified("KWT/2025/01/00002", dec!(200000), 4),
        ];
        let lines = vec![
            line(dec!(100000), 3, Some("KWT/2025/01/00001")),
            line(dec!(200000), 5, Some("KWT/2025/01/00002")),
        ];

        let forward = plan_pass(&policy, &lines, &pool);
        let mut rev_lines = lines.clone();
        rev_lines.reverse();
        let mut rev_pool = pool.clone();
        rev_pool.reverse();
        let backward = plan_pass(&policy, &rev_lines, &rev_pool);

        assert_eq!(forward.len(), 2);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_policy_validation() {
        assert!(MatchingPolicy::default().validate().is_ok());
        let skewed = MatchingPolicy { amount_weight: dec!(0.5), ..MatchingPolicy::default() };
        assert!(skewed.validate().is_err());
        assert!(MatchingPolicy::with_window_and_threshold(5, dec!(0)).is_err());
    }
}

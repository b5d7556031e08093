use std::cmp::Ordering;

use engine_core::{IndicatorRow, RankedCandidate};
use serde::{Deserialize, Serialize};

use crate::filter::Predicate;
use crate::scoring::ScoreTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }
}

/// Full ranking recipe for one strategy variant: threshold predicates,
/// the score table, the ordering, and a result-count limit. When
/// `score_primary` is set the integer score leads the ordering and the
/// indicator keys break ties; otherwise the keys lead and score breaks ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSpec {
    pub predicates: Vec<Predicate>,
    pub score_table: ScoreTable,
    pub sort_keys: Vec<SortKey>,
    pub score_primary: bool,
    pub limit: usize,
}

/// Filter, score, order, and truncate a snapshot. An empty snapshot or one
/// where nothing satisfies the predicates yields an empty list, not an
/// error. The sort is stable: equal keys keep their snapshot order.
pub fn rank(spec: &RankSpec, snapshot: &[IndicatorRow]) -> Vec<RankedCandidate> {
    let mut candidates: Vec<RankedCandidate> = snapshot
        .iter()
        .filter(|row| spec.predicates.iter().all(|p| p.passes(row)))
        .map(|row| RankedCandidate {
            score: spec.score_table.score(row),
            row: row.clone(),
        })
        .collect();

    tracing::debug!(
        "ranker: {} of {} snapshot rows passed {} predicates",
        candidates.len(),
        snapshot.len(),
        spec.predicates.len()
    );

    candidates.sort_by(|a, b| compare(spec, a, b));
    candidates.truncate(spec.limit);
    candidates
}

fn compare(spec: &RankSpec, a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    let by_score = b.score.cmp(&a.score);
    let by_keys = || {
        for key in &spec.sort_keys {
            let av = a.row.get(&key.field).unwrap_or(f64::NEG_INFINITY);
            let bv = b.row.get(&key.field).unwrap_or(f64::NEG_INFINITY);
            let ord = if key.descending {
                bv.partial_cmp(&av)
            } else {
                av.partial_cmp(&bv)
            }
            .unwrap_or(Ordering::Equal);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    };

    if spec.score_primary {
        by_score.then_with(by_keys)
    } else {
        by_keys().then(by_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::FieldBands;

    fn spec(predicates: Vec<Predicate>) -> RankSpec {
        RankSpec {
            predicates,
            score_table: ScoreTable {
                fields: vec![FieldBands::new("relative_volume", vec![(2.0, 1.0), (5.0, 1.0)])],
                max_score: 5,
            },
            sort_keys: vec![SortKey::desc("relative_volume")],
            score_primary: false,
            limit: 10,
        }
    }

    fn snapshot() -> Vec<IndicatorRow> {
        vec![
            IndicatorRow::new("SBER")
                .with("indicatorA", 3.0)
                .with("relative_volume", 4.0),
            IndicatorRow::new("GAZP")
                .with("indicatorA", 1.0)
                .with("relative_volume", 6.0),
            IndicatorRow::new("LKOH")
                .with("indicatorA", 5.0)
                .with("relative_volume", 4.0),
        ]
    }

    #[test]
    fn output_is_subset_of_snapshot() {
        let ranked = rank(&spec(vec![Predicate::gt("indicatorA", 2.0)]), &snapshot());
        assert!(ranked.len() <= snapshot().len());
        for c in &ranked {
            assert!(snapshot().iter().any(|r| r.symbol == c.row.symbol));
        }
    }

    #[test]
    fn two_of_three_pass_and_ties_keep_snapshot_order() {
        let ranked = rank(&spec(vec![Predicate::gt("indicatorA", 2.0)]), &snapshot());
        assert_eq!(ranked.len(), 2);
        // SBER and LKOH tie on relative_volume 4.0 — snapshot order holds.
        assert_eq!(ranked[0].row.symbol, "SBER");
        assert_eq!(ranked[1].row.symbol, "LKOH");
    }

    #[test]
    fn removing_a_predicate_never_shrinks_the_result() {
        let with = rank(
            &spec(vec![
                Predicate::gt("indicatorA", 2.0),
                Predicate::lt("relative_volume", 5.0),
            ]),
            &snapshot(),
        );
        let without = rank(&spec(vec![Predicate::gt("indicatorA", 2.0)]), &snapshot());
        assert!(without.len() >= with.len());
    }

    #[test]
    fn empty_snapshot_yields_empty_list() {
        assert!(rank(&spec(vec![]), &[]).is_empty());
    }

    #[test]
    fn no_survivors_yields_empty_list() {
        let ranked = rank(&spec(vec![Predicate::gt("indicatorA", 99.0)]), &snapshot());
        assert!(ranked.is_empty());
    }

    #[test]
    fn sort_key_orders_descending() {
        let ranked = rank(&spec(vec![]), &snapshot());
        assert_eq!(ranked[0].row.symbol, "GAZP");
    }

    #[test]
    fn score_primary_leads_the_ordering() {
        let mut s = spec(vec![]);
        s.score_primary = true;
        // GAZP clears both bands (6.0 > 2.0 and > 5.0) => score 2; the
        // others clear one band => score 1.
        let ranked = rank(&s, &snapshot());
        assert_eq!(ranked[0].row.symbol, "GAZP");
        assert_eq!(ranked[0].score, 2);
        assert_eq!(ranked[1].score, 1);
    }

    #[test]
    fn limit_truncates() {
        let mut s = spec(vec![]);
        s.limit = 1;
        assert_eq!(rank(&s, &snapshot()).len(), 1);
    }
}

use engine_core::IndicatorRow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    Gt,
    Lt,
    Eq,
}

/// One threshold predicate: a named indicator compared against a constant.
/// Candidates must satisfy every predicate of a spec (logical AND).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
    pub value: f64,
}

impl Predicate {
    pub fn gt(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            op: PredicateOp::Gt,
            value,
        }
    }

    pub fn lt(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            op: PredicateOp::Lt,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            op: PredicateOp::Eq,
            value,
        }
    }

    /// A row missing the field fails the predicate.
    pub fn passes(&self, row: &IndicatorRow) -> bool {
        match row.get(&self.field) {
            Some(v) => match self.op {
                PredicateOp::Gt => v > self.value,
                PredicateOp::Lt => v < self.value,
                PredicateOp::Eq => v == self.value,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_fails() {
        let row = IndicatorRow::new("SBER").with("rsi", 45.0);
        assert!(!Predicate::gt("adx", 20.0).passes(&row));
    }

    #[test]
    fn operators() {
        let row = IndicatorRow::new("SBER").with("rsi", 45.0);
        assert!(Predicate::gt("rsi", 40.0).passes(&row));
        assert!(!Predicate::gt("rsi", 45.0).passes(&row));
        assert!(Predicate::lt("rsi", 50.0).passes(&row));
        assert!(Predicate::eq("rsi", 45.0).passes(&row));
    }
}

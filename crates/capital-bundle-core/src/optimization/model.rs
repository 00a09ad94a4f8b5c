//! Solver-agnostic linear program representation.
//!
//! The formulator writes into this structure and solver adapters read from
//! it, so neither side depends on a particular LP library.

use serde::{Deserialize, Serialize};

/// Index of a variable within an [`LpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpVariable {
    pub name: String,
    pub lower: f64,
    /// `None` means unbounded above.
    pub upper: Option<f64>,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintSense {
    LessEq,
    GreaterEq,
    Equal,
}

/// `Σ coef·var  (sense)  rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

/// A minimisation problem over continuous variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LpModel {
    pub name: String,
    pub variables: Vec<LpVariable>,
    pub constraints: Vec<LpConstraint>,
}

impl LpModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: Option<f64>,
        objective: f64,
    ) -> VarId {
        self.variables.push(LpVariable {
            name: name.into(),
            lower,
            upper,
            objective,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        sense: ConstraintSense,
        rhs: f64,
    ) {
        self.constraints.push(LpConstraint {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
    }

    pub fn variable(&self, id: VarId) -> &LpVariable {
        &self.variables[id.0]
    }

    /// Objective value at `values` (one entry per variable).
    pub fn objective_at(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// Largest violation of any bound or constraint at `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let mut worst: f64 = 0.0;
        for (v, x) in self.variables.iter().zip(values) {
            worst = worst.max(v.lower - x);
            if let Some(upper) = v.upper {
                worst = worst.max(x - upper);
            }
        }
        for c in &self.constraints {
            let lhs: f64 = c.terms.iter().map(|(id, coef)| coef * values[id.0]).sum();
            let gap = match c.sense {
                ConstraintSense::LessEq => lhs - c.rhs,
                ConstraintSense::GreaterEq => c.rhs - lhs,
                ConstraintSense::Equal => (lhs - c.rhs).abs(),
            };
            worst = worst.max(gap);
        }
        worst
    }
}

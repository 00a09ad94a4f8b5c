use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use super::model::{ConstraintSense, LpModel};
use super::solver::{SolveStatus, SolverAdapter, SolverOutput};

/// [`SolverAdapter`] backed by `good_lp` with its pure-Rust simplex backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl SolverAdapter for GoodLpSolver {
    fn name(&self) -> &str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &LpModel) -> SolverOutput {
        let mut vars = ProblemVariables::new();

        let handles: Vec<Variable> = model
            .variables
            .iter()
            .map(|v| {
                let mut def = variable().min(v.lower);
                if let Some(upper) = v.upper {
                    def = def.max(upper);
                }
                vars.add(def)
            })
            .collect();

        let objective: Expression = model
            .variables
            .iter()
            .zip(&handles)
            .fold(Expression::from(0.0), |acc, (v, &h)| acc + v.objective * h);

        let mut problem = vars.minimise(objective).using(good_lp::default_solver);

        for c in &model.constraints {
            let lhs: Expression = c
                .terms
                .iter()
                .fold(Expression::from(0.0), |acc, (id, coef)| acc + *coef * handles[id.0]);
            let rhs = c.rhs;
            problem = match c.sense {
                ConstraintSense::LessEq => problem.with(constraint!(lhs <= rhs)),
                ConstraintSense::GreaterEq => problem.with(constraint!(lhs >= rhs)),
                ConstraintSense::Equal => problem.with(constraint!(lhs == rhs)),
            };
        }

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = handles.iter().map(|&h| solution.value(h)).collect();
                if values.iter().any(|v| !v.is_finite()) {
                    return SolverOutput::without_solution(
                        SolveStatus::Error,
                        "backend returned a non-finite variable value",
                    );
                }
                let objective = model.objective_at(&values);
                SolverOutput::optimal(values, Some(objective))
            }
            Err(ResolutionError::Infeasible) => {
                SolverOutput::without_solution(SolveStatus::Infeasible, "problem is infeasible")
            }
            Err(ResolutionError::Unbounded) => {
                SolverOutput::without_solution(SolveStatus::Unbounded, "problem is unbounded")
            }
            Err(other) => SolverOutput::without_solution(SolveStatus::Error, other.to_string()),
        }
    }
}

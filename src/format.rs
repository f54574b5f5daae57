use std::fmt::Display;

use crate::solve::SolutionSet;

pub const NO_SOLUTION: &str = "No solution exists";

/// Renders a solution set as the single line shown to the user.
pub fn format_solution(solutions: &SolutionSet, variable: &str) -> String {
    Formatted {
        solutions,
        variable,
    }
    .to_string()
}

/// `Display` adapter over a [`SolutionSet`] and the name it was solved for.
pub struct Formatted<'a> {
    pub solutions: &'a SolutionSet,
    pub variable: &'a str,
}

impl Display for Formatted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let var = self.variable;
        match self.solutions {
            SolutionSet::Empty => write!(f, "{NO_SOLUTION}"),
            SolutionSet::Finite(roots) if roots.is_empty() => write!(f, "{NO_SOLUTION}"),
            SolutionSet::AllReals => write!(f, "{var} can be any real number"),
            SolutionSet::Scalar(value) => write!(f, "{value}"),
            SolutionSet::Finite(roots) => {
                for (i, root) in roots.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{var} = {root}")?;
                }
                Ok(())
            }
        }
    }
}

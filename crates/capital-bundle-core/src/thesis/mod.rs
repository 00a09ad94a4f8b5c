pub mod constraints;
pub mod extract;

pub use constraints::{ThesisConstraints, TARGET_SUM_EPSILON};
pub use extract::{NormalizedThesis, ThesisExtract};

//! Survey queries: the operation catalogue, the parameters a querier sends and
//! the consistency rules every participant applies before running a survey.

mod operation;
mod survey;
mod validation;

pub use operation::{
    choose_logreg_operation, choose_operation, LogisticRegressionParameters, Operation,
    OperationKind,
};
pub use survey::{
    Query, QueryDPDataGen, QueryDiffP, QueryIVSigs, Roster, ServerIdentity, SurveyQuery,
};
pub use validation::{check_parameters, query_to_proofs_nbrs};

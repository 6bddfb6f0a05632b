use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Statistic a survey computes. Serialized under the names clients type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[default]
    #[serde(rename = "sum")]
    Sum,
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "variance")]
    Variance,
    #[serde(rename = "cosim")]
    Cosim,
    #[serde(rename = "frequencyCount")]
    FrequencyCount,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "union")]
    Union,
    #[serde(rename = "inter")]
    Inter,
    #[serde(rename = "bool_OR")]
    BoolOr,
    #[serde(rename = "bool_AND")]
    BoolAnd,
    #[serde(rename = "lin_reg")]
    LinReg,
    #[serde(rename = "logreg", alias = "log_reg", alias = "logistic regression")]
    LogReg,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        OperationKind::Sum,
        OperationKind::Mean,
        OperationKind::Variance,
        OperationKind::Cosim,
        OperationKind::FrequencyCount,
        OperationKind::Min,
        OperationKind::Max,
        OperationKind::Union,
        OperationKind::Inter,
        OperationKind::BoolOr,
        OperationKind::BoolAnd,
        OperationKind::LinReg,
        OperationKind::LogReg,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Sum => "sum",
            OperationKind::Mean => "mean",
            OperationKind::Variance => "variance",
            OperationKind::Cosim => "cosim",
            OperationKind::FrequencyCount => "frequencyCount",
            OperationKind::Min => "min",
            OperationKind::Max => "max",
            OperationKind::Union => "union",
            OperationKind::Inter => "inter",
            OperationKind::BoolOr => "bool_OR",
            OperationKind::BoolAnd => "bool_AND",
            OperationKind::LinReg => "lin_reg",
            OperationKind::LogReg => "logreg",
        }
    }

    pub fn parse(name: &str) -> Result<Self, QueryError> {
        match name {
            "log_reg" | "logistic regression" => Ok(OperationKind::LogReg),
            _ => Self::ALL
                .into_iter()
                .find(|kind| kind.name() == name)
                .ok_or_else(|| QueryError::UnknownOperation(name.to_string())),
        }
    }

    /// Operations whose per-provider outputs are bits, which obfuscation may scale.
    pub fn accepts_obfuscation(self) -> bool {
        matches!(
            self,
            OperationKind::BoolAnd
                | OperationKind::BoolOr
                | OperationKind::Min
                | OperationKind::Max
                | OperationKind::Union
                | OperationKind::Inter
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionParameters {
    pub file_path: String,
    pub nbr_records: i64,
    pub nbr_features: i64,
    pub means: Vec<f64>,
    pub standard_deviations: Vec<f64>,

    pub lambda: f64,
    pub step: f64,
    pub max_iterations: usize,
    pub initial_weights: Vec<f64>,

    /// Approximation degree.
    pub k: usize,
    pub precision_approx_coefficients: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name_op: OperationKind,
    pub nbr_input: usize,
    pub nbr_output: usize,
    pub query_min: i64,
    pub query_max: i64,
    #[serde(default)]
    pub lr_parameters: LogisticRegressionParameters,
}

fn apply_cutting_factor(nbr_output: usize, cutting_factor: usize) -> Result<usize, QueryError> {
    if cutting_factor == 0 {
        return Ok(nbr_output);
    }
    nbr_output
        .checked_mul(cutting_factor)
        .ok_or_else(|| QueryError::Malformed(format!("cutting factor {cutting_factor} overflows")))
}

/// Fixes input and output arity for `name`. `d` is the feature count of a
/// linear regression; a non-zero `cutting_factor` multiplies the outputs,
/// which providers fill with
/// [`EncodedResponse::replicate`](crate::encoding::EncodedResponse::replicate)
/// and the querier undoes with [`uncut`](crate::encoding::uncut).
pub fn choose_operation(
    name: &str,
    query_min: i64,
    query_max: i64,
    d: usize,
    cutting_factor: usize,
) -> Result<Operation, QueryError> {
    let kind = OperationKind::parse(name)?;
    let (nbr_input, nbr_output) = match kind {
        OperationKind::Sum => (1, 1),
        OperationKind::Mean => (1, 2),
        OperationKind::Variance => (1, 3),
        OperationKind::Cosim => (2, 5),
        OperationKind::FrequencyCount
        | OperationKind::Min
        | OperationKind::Max
        | OperationKind::Union
        | OperationKind::Inter => {
            let width = query_max
                .checked_sub(query_min)
                .and_then(|span| span.checked_add(1))
                .filter(|width| *width > 0)
                .ok_or_else(|| {
                    QueryError::Malformed(format!("empty value range [{query_min}, {query_max}]"))
                })?;
            (1, width as usize)
        }
        OperationKind::BoolOr | OperationKind::BoolAnd => (1, 1),
        OperationKind::LinReg => (d + 1, (d * d + 5 * d + 4) / 2),
        OperationKind::LogReg => {
            return Err(QueryError::Malformed(
                "logistic regression arity comes from its parameters".into(),
            ))
        }
    };
    Ok(Operation {
        name_op: kind,
        nbr_input,
        nbr_output: apply_cutting_factor(nbr_output, cutting_factor)?,
        query_min,
        query_max,
        lr_parameters: LogisticRegressionParameters::default(),
    })
}

/// Logistic regression over `nbr_features` features with approximation degree
/// `k`: one input per feature plus the label, and the flattened tensor powers
/// `Σ_{j=1..k} (d+1)^j` as outputs.
pub fn choose_logreg_operation(
    parameters: LogisticRegressionParameters,
    query_min: i64,
    query_max: i64,
    cutting_factor: usize,
) -> Result<Operation, QueryError> {
    let features = usize::try_from(parameters.nbr_features).map_err(|_| {
        QueryError::Malformed(format!("negative feature count {}", parameters.nbr_features))
    })?;
    let base = features + 1;
    let nbr_output = (1..=parameters.k as u32)
        .map(|j| base.checked_pow(j))
        .try_fold(0usize, |acc, term| term.and_then(|t| acc.checked_add(t)))
        .ok_or_else(|| QueryError::Malformed("logistic regression arity overflows".into()))?;
    Ok(Operation {
        name_op: OperationKind::LogReg,
        nbr_input: base,
        nbr_output: apply_cutting_factor(nbr_output, cutting_factor)?,
        query_min,
        query_max,
        lr_parameters: parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn arity_table() {
        let cases: [(&str, usize, usize); 8] = [
            ("sum", 1, 1),
            ("mean", 1, 2),
            ("variance", 1, 3),
            ("cosim", 2, 5),
            ("frequencyCount", 1, 11),
            ("union", 1, 11),
            ("bool_AND", 1, 1),
            ("lin_reg", 4, 14),
        ];
        for (name, input, output) in cases {
            let op = choose_operation(name, 0, 10, 3, 0).unwrap();
            assert_eq!((op.nbr_input, op.nbr_output), (input, output), "{name}");
            assert_eq!(op.name_op.name(), name);
        }
    }

    #[test]
    fn cutting_factor_scales_outputs() {
        let op = choose_operation("mean", 0, 10, 0, 3).unwrap();
        assert_eq!(op.nbr_output, 6);
        assert_eq!(choose_operation("min", 5, 7, 0, 2).unwrap().nbr_output, 6);
    }

    #[test]
    fn unknown_and_empty_operations_fail() {
        assert_eq!(
            choose_operation("median", 0, 1, 0, 0),
            Err(QueryError::UnknownOperation("median".into()))
        );
        assert!(choose_operation("max", 4, 1, 0, 0).is_err());
        assert!(choose_operation("logreg", 0, 1, 0, 0).is_err());
    }

    #[test]
    fn logreg_arity_counts_tensor_powers() {
        let params = LogisticRegressionParameters {
            nbr_features: 2,
            k: 2,
            ..Default::default()
        };
        let op = choose_logreg_operation(params, 0, 1, 0).unwrap();
        assert_eq!(op.nbr_input, 3);
        assert_eq!(op.nbr_output, 3 + 9);
        assert_eq!(OperationKind::parse("log_reg").unwrap(), OperationKind::LogReg);
    }

    #[test]
    fn operation_serializes_with_wire_names() {
        let op = choose_operation("bool_OR", 0, 1, 0, 0).unwrap();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["name_op"], "bool_OR");
        assert_round_trip_eq(&op);
    }
}

//! Transform vocabulary for in-memory datasets.
//!
//! Each [`Transform`] consumes the dataset produced by the previous one.
//! Order is significant and not reorderable: filtering after aggregation
//! yields different results than filtering before it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::dataset::{Dataset, Value};
use crate::error::TransformError;

/// All available dataset transforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Multiply a numeric column by a factor. Result cells are Real.
    Scale { column: String, factor: f64 },

    /// Replace NULLs in a column with a constant value.
    FillNull { column: String, value: Value },

    /// Drop rows containing any NULL.
    DropNulls,

    /// Keep the first occurrence of each key; keys default to all columns.
    DropDuplicates {
        #[serde(default)]
        key_columns: Option<Vec<String>>,
    },

    /// Keep rows where the comparison holds. NULL never matches.
    Filter {
        column: String,
        op: CompareOp,
        value: Value,
    },

    /// Add (or overwrite) a column derived from a constant or another column.
    AddColumn { name: String, derivation: Derivation },

    /// Group by one column and aggregate another. Output has exactly those
    /// two columns, groups in first-appearance order.
    GroupAndAggregate {
        group_column: String,
        agg_column: String,
        agg: AggFn,
    },
}

/// Comparison operator for [`Transform::Filter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Evaluate `left <op> right`.
    ///
    /// NULL compares false against everything (SQL semantics). Numbers
    /// compare numerically, text lexicographically; mixed types are false.
    pub fn compare(&self, left: &Value, right: &Value) -> bool {
        let ordering = match (left, right) {
            (Value::Null, _) | (_, Value::Null) => return false,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(ord) => ord,
                    None => return false,
                },
                _ => return false,
            },
        };
        match self {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        }
    }
}

/// How [`Transform::AddColumn`] derives its values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Derivation {
    /// The same constant for every row.
    Constant { value: Value },

    /// A numeric source column multiplied by a factor (e.g. a 5% bonus).
    Scaled { source: String, factor: f64 },
}

/// Aggregation function for [`Transform::GroupAndAggregate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AggFn {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

/// Apply a sequence of transforms in the literal order given.
pub fn apply_transforms(
    mut dataset: Dataset,
    transforms: &[Transform],
) -> Result<Dataset, TransformError> {
    for transform in transforms {
        dataset = transform.apply(dataset)?;
    }
    Ok(dataset)
}

impl Transform {
    /// Apply this transform, consuming the input dataset.
    pub fn apply(&self, dataset: Dataset) -> Result<Dataset, TransformError> {
        match self {
            Transform::Scale { column, factor } => apply_scale(dataset, column, *factor),
            Transform::FillNull { column, value } => apply_fill_null(dataset, column, value),
            Transform::DropNulls => Ok(apply_drop_nulls(dataset)),
            Transform::DropDuplicates { key_columns } => {
                apply_drop_duplicates(dataset, key_columns.as_deref())
            }
            Transform::Filter { column, op, value } => apply_filter(dataset, column, *op, value),
            Transform::AddColumn { name, derivation } => {
                apply_add_column(dataset, name, derivation)
            }
            Transform::GroupAndAggregate {
                group_column,
                agg_column,
                agg,
            } => apply_group_and_aggregate(dataset, group_column, agg_column, *agg),
        }
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Scale { .. } => "scale",
            Transform::FillNull { .. } => "fill_null",
            Transform::DropNulls => "drop_nulls",
            Transform::DropDuplicates { .. } => "drop_duplicates",
            Transform::Filter { .. } => "filter",
            Transform::AddColumn { .. } => "add_column",
            Transform::GroupAndAggregate { .. } => "group_and_aggregate",
        }
    }
}

fn numeric_error(transform: &str, column: &str, value: &Value) -> TransformError {
    TransformError::OperationFailed {
        transform: transform.to_string(),
        column: column.to_string(),
        message: format!("expected a number, found {}", value.type_name()),
    }
}

fn apply_scale(mut dataset: Dataset, column: &str, factor: f64) -> Result<Dataset, TransformError> {
    let idx = dataset.require_column(column)?;
    for row in dataset.rows() {
        let value = &row[idx];
        if !value.is_null() && value.as_f64().is_none() {
            return Err(numeric_error("scale", column, value));
        }
    }
    dataset.map_column(idx, |value| match value.as_f64() {
        Some(n) => Value::Real(n * factor),
        None => Value::Null,
    });
    Ok(dataset)
}

fn apply_fill_null(
    mut dataset: Dataset,
    column: &str,
    fill: &Value,
) -> Result<Dataset, TransformError> {
    let idx = dataset.require_column(column)?;
    dataset.map_column(idx, |value| {
        if value.is_null() {
            fill.clone()
        } else {
            value.clone()
        }
    });
    Ok(dataset)
}

fn apply_drop_nulls(mut dataset: Dataset) -> Dataset {
    dataset.retain_rows(|row| !row.iter().any(Value::is_null));
    dataset
}

fn apply_drop_duplicates(
    mut dataset: Dataset,
    key_columns: Option<&[String]>,
) -> Result<Dataset, TransformError> {
    let indices: Vec<usize> = match key_columns {
        Some(columns) => columns
            .iter()
            .map(|c| dataset.require_column(c))
            .collect::<Result<_, _>>()?,
        None => (0..dataset.columns().len()).collect(),
    };

    let mut seen: HashSet<String> = HashSet::new();
    dataset.retain_rows(|row| {
        let key = indices
            .iter()
            .map(|&i| row[i].group_key())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        seen.insert(key)
    });
    Ok(dataset)
}

fn apply_filter(
    mut dataset: Dataset,
    column: &str,
    op: CompareOp,
    value: &Value,
) -> Result<Dataset, TransformError> {
    let idx = dataset.require_column(column)?;
    dataset.retain_rows(|row| op.compare(&row[idx], value));
    Ok(dataset)
}

fn apply_add_column(
    mut dataset: Dataset,
    name: &str,
    derivation: &Derivation,
) -> Result<Dataset, TransformError> {
    let values: Vec<Value> = match derivation {
        Derivation::Constant { value } => vec![value.clone(); dataset.len()],
        Derivation::Scaled { source, factor } => {
            let src = dataset.require_column(source)?;
            dataset
                .rows()
                .iter()
                .map(|row| {
                    let value = &row[src];
                    if value.is_null() {
                        Ok(Value::Null)
                    } else {
                        value
                            .as_f64()
                            .map(|n| Value::Real(n * factor))
                            .ok_or_else(|| numeric_error("add_column", source, value))
                    }
                })
                .collect::<Result<_, _>>()?
        }
    };

    match dataset.column_index(name) {
        // Existing column: overwrite in place.
        Some(idx) => {
            let mut iter = values.into_iter();
            dataset.map_column(idx, |_| iter.next().unwrap_or(Value::Null));
        }
        None => dataset.add_column(name, values),
    }
    Ok(dataset)
}

fn apply_group_and_aggregate(
    dataset: Dataset,
    group_column: &str,
    agg_column: &str,
    agg: AggFn,
) -> Result<Dataset, TransformError> {
    let group_idx = dataset.require_column(group_column)?;
    let agg_idx = dataset.require_column(agg_column)?;

    // Collect non-null values per group, first-appearance order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Value, Vec<Value>)> = HashMap::new();
    for row in dataset.rows() {
        let key = row[group_idx].group_key();
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (row[group_idx].clone(), Vec::new())
        });
        if !row[agg_idx].is_null() {
            entry.1.push(row[agg_idx].clone());
        }
    }

    let mut result = Dataset::new(vec![group_column.to_string(), agg_column.to_string()]);
    for key in order {
        let (group_value, values) = groups
            .remove(&key)
            .unwrap_or_else(|| (Value::Null, Vec::new()));
        let aggregated = aggregate(&values, agg, agg_column)?;
        result.push_row(vec![group_value, aggregated]);
    }
    Ok(result)
}

/// Aggregate non-null values. Empty input yields 0 for sum/count, NULL
/// otherwise.
fn aggregate(values: &[Value], agg: AggFn, column: &str) -> Result<Value, TransformError> {
    match agg {
        AggFn::Count => Ok(Value::Integer(values.len() as i64)),
        AggFn::Sum => {
            let numbers = require_numbers(values, column)?;
            if values.iter().all(|v| matches!(v, Value::Integer(_))) {
                Ok(Value::Integer(numbers.iter().map(|n| *n as i64).sum()))
            } else {
                Ok(Value::Real(numbers.iter().sum()))
            }
        }
        AggFn::Avg => {
            let numbers = require_numbers(values, column)?;
            if numbers.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Real(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
        }
        AggFn::Min | AggFn::Max => extremum(values, agg, column),
    }
}

fn require_numbers(values: &[Value], column: &str) -> Result<Vec<f64>, TransformError> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| numeric_error("group_and_aggregate", column, v))
        })
        .collect()
}

fn extremum(values: &[Value], agg: AggFn, column: &str) -> Result<Value, TransformError> {
    let mut best: Option<&Value> = None;
    for value in values {
        let current = match best {
            None => {
                best = Some(value);
                continue;
            }
            Some(b) => b,
        };
        let ordering = match (current, value) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => {
                    return Err(TransformError::OperationFailed {
                        transform: "group_and_aggregate".to_string(),
                        column: column.to_string(),
                        message: "mixed text and numeric values".to_string(),
                    })
                }
            },
        };
        let replace = match agg {
            AggFn::Min => ordering.is_gt(),
            _ => ordering.is_lt(),
        };
        if replace {
            best = Some(value);
        }
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

/// Get a description of all available transforms for the CLI.
pub fn transforms_description() -> String {
    r#"Available transforms:

| Transform | Description | Parameters |
|-----------|-------------|------------|
| scale | Multiply a numeric column by a factor | column, factor |
| fill_null | Replace NULLs with a constant | column, value |
| drop_nulls | Drop rows containing any NULL | - |
| drop_duplicates | Keep first occurrence per key | key_columns: optional list (default: all columns) |
| filter | Keep rows matching a comparison | column, op: eq/ne/lt/le/gt/ge, value |
| add_column | Add a constant or scaled column | name, derivation: {type: constant, value} or {type: scaled, source, factor} |
| group_and_aggregate | Group one column, aggregate another | group_column, agg_column, agg: sum/avg/min/max/count |

Example transforms in JSON:
[
  {"type": "fill_null", "column": "Quantity", "value": 0},
  {"type": "filter", "column": "Amount", "op": "le", "value": 2000},
  {"type": "add_column", "name": "Category", "derivation": {"type": "constant", "value": "Electronics"}},
  {"type": "group_and_aggregate", "group_column": "Product", "agg_column": "Amount", "agg": "sum"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Dataset {
        let mut d = Dataset::new(vec!["SaleID".into(), "Product".into(), "Amount".into()]);
        d.push_row(vec![
            Value::Integer(1),
            Value::Text("Laptop".into()),
            Value::Real(999.99),
        ]);
        d.push_row(vec![
            Value::Integer(2),
            Value::Text("Mouse".into()),
            Value::Real(29.99),
        ]);
        d.push_row(vec![
            Value::Integer(3),
            Value::Text("Laptop".into()),
            Value::Real(100.0),
        ]);
        d
    }

    #[test]
    fn test_filter_then_add_column() {
        // Load Sales with (1, 'Laptop', 999.99), keep Amount <= 2000,
        // then tag everything as Electronics.
        let mut d = Dataset::new(vec!["SaleID".into(), "Product".into(), "Amount".into()]);
        d.push_row(vec![
            Value::Integer(1),
            Value::Text("Laptop".into()),
            Value::Real(999.99),
        ]);

        let transforms = vec![
            Transform::Filter {
                column: "Amount".into(),
                op: CompareOp::Le,
                value: Value::Integer(2000),
            },
            Transform::AddColumn {
                name: "Category".into(),
                derivation: Derivation::Constant {
                    value: Value::Text("Electronics".into()),
                },
            },
        ];
        let result = apply_transforms(d, &transforms).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(
            result.rows()[0],
            vec![
                Value::Integer(1),
                Value::Text("Laptop".into()),
                Value::Real(999.99),
                Value::Text("Electronics".into()),
            ]
        );
    }

    #[test]
    fn test_fill_null_inventory() {
        let mut d = Dataset::new(vec!["ItemID".into(), "ItemName".into(), "Quantity".into()]);
        d.push_row(vec![
            Value::Integer(1),
            Value::Text("Laptop".into()),
            Value::Integer(10),
        ]);
        d.push_row(vec![Value::Integer(2), Value::Text("Mouse".into()), Value::Null]);

        let t = Transform::FillNull {
            column: "Quantity".into(),
            value: Value::Integer(0),
        };
        let result = t.apply(d).unwrap();
        assert_eq!(result.get(1, "Quantity"), Some(&Value::Integer(0)));
        assert_eq!(result.get(0, "Quantity"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_fill_null_idempotent() {
        let mut d = Dataset::new(vec!["q".into()]);
        d.push_row(vec![Value::Null]);
        d.push_row(vec![Value::Integer(3)]);

        let t = Transform::FillNull {
            column: "q".into(),
            value: Value::Integer(0),
        };
        let once = t.apply(d).unwrap();
        let twice = t.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_drop_duplicates_idempotent() {
        let mut d = Dataset::new(vec!["name".into(), "dept".into()]);
        d.push_row(vec![Value::Text("Alice".into()), Value::Text("IT".into())]);
        d.push_row(vec![Value::Text("Alice".into()), Value::Text("IT".into())]);
        d.push_row(vec![Value::Text("Bob".into()), Value::Text("HR".into())]);

        let t = Transform::DropDuplicates { key_columns: None };
        let once = t.apply(d).unwrap();
        assert_eq!(once.len(), 2);
        let twice = t.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_drop_duplicates_by_key() {
        // Keyed on name only: the second Alice goes even though the
        // departments differ.
        let mut d = Dataset::new(vec!["name".into(), "dept".into()]);
        d.push_row(vec![Value::Text("Alice".into()), Value::Text("IT".into())]);
        d.push_row(vec![Value::Text("Alice".into()), Value::Text("HR".into())]);

        let t = Transform::DropDuplicates {
            key_columns: Some(vec!["name".into()]),
        };
        let result = t.apply(d).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, "dept"), Some(&Value::Text("IT".into())));
    }

    #[test]
    fn test_scale_composes() {
        let mut d = Dataset::new(vec!["Salary".into()]);
        d.push_row(vec![Value::Integer(85000)]);
        d.push_row(vec![Value::Real(1000.0)]);

        let chained = apply_transforms(
            d.clone(),
            &[
                Transform::Scale {
                    column: "Salary".into(),
                    factor: 2.0,
                },
                Transform::Scale {
                    column: "Salary".into(),
                    factor: 0.5,
                },
            ],
        )
        .unwrap();

        let single = Transform::Scale {
            column: "Salary".into(),
            factor: 1.0,
        }
        .apply(d)
        .unwrap();

        assert_eq!(chained, single);
    }

    #[test]
    fn test_scale_keeps_nulls_and_rejects_text() {
        let mut d = Dataset::new(vec!["n".into()]);
        d.push_row(vec![Value::Null]);
        d.push_row(vec![Value::Integer(2)]);
        let t = Transform::Scale {
            column: "n".into(),
            factor: 1.5,
        };
        let result = t.apply(d).unwrap();
        assert_eq!(result.get(0, "n"), Some(&Value::Null));
        assert_eq!(result.get(1, "n"), Some(&Value::Real(3.0)));

        let mut bad = Dataset::new(vec!["n".into()]);
        bad.push_row(vec![Value::Text("ten".into())]);
        assert!(t.apply(bad).is_err());
    }

    #[test]
    fn test_drop_nulls() {
        let mut d = Dataset::new(vec!["a".into(), "b".into()]);
        d.push_row(vec![Value::Integer(1), Value::Text("x".into())]);
        d.push_row(vec![Value::Integer(2), Value::Null]);
        let result = Transform::DropNulls.apply(d).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_add_column_scaled() {
        // Bonus = Salary * 0.05
        let mut d = Dataset::new(vec!["Name".into(), "Salary".into()]);
        d.push_row(vec![Value::Text("Alice".into()), Value::Integer(85000)]);

        let t = Transform::AddColumn {
            name: "Bonus".into(),
            derivation: Derivation::Scaled {
                source: "Salary".into(),
                factor: 0.05,
            },
        };
        let result = t.apply(d).unwrap();
        assert_eq!(result.columns(), &["Name", "Salary", "Bonus"]);
        assert_eq!(result.get(0, "Bonus"), Some(&Value::Real(4250.0)));
    }

    #[test]
    fn test_group_sum_then_filter() {
        // Aggregate first, then filter on the total: a product whose sales
        // sum past 1000 stays, one below goes. Reversing the order would
        // filter individual sales instead.
        let mut d = sales();
        d.push_row(vec![
            Value::Integer(4),
            Value::Text("Mouse".into()),
            Value::Real(5.0),
        ]);

        let transforms = vec![
            Transform::GroupAndAggregate {
                group_column: "Product".into(),
                agg_column: "Amount".into(),
                agg: AggFn::Sum,
            },
            Transform::Filter {
                column: "Amount".into(),
                op: CompareOp::Gt,
                value: Value::Integer(1000),
            },
        ];
        let result = apply_transforms(d, &transforms).unwrap();

        assert_eq!(result.columns(), &["Product", "Amount"]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, "Product"), Some(&Value::Text("Laptop".into())));
        assert_eq!(result.get(0, "Amount"), Some(&Value::Real(1099.99)));
    }

    #[test]
    fn test_group_aggregate_fns() {
        let d = sales();
        let run = |agg| {
            Transform::GroupAndAggregate {
                group_column: "Product".into(),
                agg_column: "Amount".into(),
                agg,
            }
            .apply(d.clone())
            .unwrap()
        };

        let count = run(AggFn::Count);
        assert_eq!(count.get(0, "Amount"), Some(&Value::Integer(2)));

        let min = run(AggFn::Min);
        assert_eq!(min.get(0, "Amount"), Some(&Value::Real(100.0)));

        let max = run(AggFn::Max);
        assert_eq!(max.get(0, "Amount"), Some(&Value::Real(999.99)));

        let avg = run(AggFn::Avg);
        let value = avg.get(0, "Amount").and_then(Value::as_f64).unwrap();
        assert!((value - 549.995).abs() < 1e-9);
    }

    #[test]
    fn test_group_sum_integers_stay_integer() {
        let mut d = Dataset::new(vec!["k".into(), "v".into()]);
        d.push_row(vec![Value::Text("a".into()), Value::Integer(2)]);
        d.push_row(vec![Value::Text("a".into()), Value::Integer(3)]);
        let result = Transform::GroupAndAggregate {
            group_column: "k".into(),
            agg_column: "v".into(),
            agg: AggFn::Sum,
        }
        .apply(d)
        .unwrap();
        assert_eq!(result.get(0, "v"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_filter_null_never_matches() {
        let mut d = Dataset::new(vec!["q".into()]);
        d.push_row(vec![Value::Null]);
        d.push_row(vec![Value::Integer(1)]);
        for op in [CompareOp::Eq, CompareOp::Ne, CompareOp::Le, CompareOp::Gt] {
            let result = Transform::Filter {
                column: "q".into(),
                op,
                value: Value::Integer(1),
            }
            .apply(d.clone())
            .unwrap();
            assert!(result.rows().iter().all(|r| !r[0].is_null()));
        }
    }

    #[test]
    fn test_missing_column_error() {
        let d = sales();
        let t = Transform::Scale {
            column: "Price".into(),
            factor: 2.0,
        };
        match t.apply(d) {
            Err(TransformError::MissingColumn(c)) => assert_eq!(c, "Price"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_serialization() {
        let json = r#"[
            {"type": "scale", "column": "Salary", "factor": 1.1},
            {"type": "fill_null", "column": "Quantity", "value": 0},
            {"type": "drop_nulls"},
            {"type": "drop_duplicates", "key_columns": ["Name"]},
            {"type": "filter", "column": "Amount", "op": "le", "value": 2000},
            {"type": "add_column", "name": "Category",
             "derivation": {"type": "constant", "value": "Electronics"}},
            {"type": "group_and_aggregate", "group_column": "Product",
             "agg_column": "Amount", "agg": "sum"}
        ]"#;
        let transforms: Vec<Transform> = serde_json::from_str(json).unwrap();
        assert_eq!(transforms.len(), 7);
        assert_eq!(transforms[0].name(), "scale");
        assert_eq!(transforms[6].name(), "group_and_aggregate");

        // Round trip through JSON keeps the tags stable.
        let back = serde_json::to_string(&transforms).unwrap();
        let reparsed: Vec<Transform> = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed.len(), 7);
    }
}

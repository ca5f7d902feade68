//! Aggregation pipelines: ordered sequences of transformation stages.
//!
//! Stage order is significant and is preserved exactly as declared.

use bson::{ doc, Bson, Document };
use crate::{
    literal::Order,
    utils::u64_to_i64_with_msg,
    error::{ Error, ErrorKind, Result },
};

/// An accumulator computing one output field of a `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Sum of the expression over the group, `$sum`.
    Sum(Bson),
    /// Arithmetic mean of the expression over the group, `$avg`.
    Avg(Bson),
    /// Smallest value of the expression in the group, `$min`.
    Min(Bson),
    /// Greatest value of the expression in the group, `$max`.
    Max(Bson),
    /// Value of the expression for the first document of the group, `$first`.
    First(Bson),
    /// All values of the expression in the group, as an array, `$push`.
    Push(Bson),
}

impl Accumulator {
    /// Counts the documents in the group: `{ $sum: 1 }`.
    pub fn count() -> Self {
        Accumulator::Sum(Bson::Int32(1))
    }

    /// Averages the given field: `{ $avg: "$field" }`.
    pub fn avg_of(field: &str) -> Self {
        Accumulator::Avg(field_path(field))
    }

    /// The accumulator expression as it appears in a `$group` stage.
    pub fn to_document(&self) -> Document {
        match *self {
            Accumulator::Sum(ref expr)   => doc!{ "$sum": expr.clone() },
            Accumulator::Avg(ref expr)   => doc!{ "$avg": expr.clone() },
            Accumulator::Min(ref expr)   => doc!{ "$min": expr.clone() },
            Accumulator::Max(ref expr)   => doc!{ "$max": expr.clone() },
            Accumulator::First(ref expr) => doc!{ "$first": expr.clone() },
            Accumulator::Push(ref expr)  => doc!{ "$push": expr.clone() },
        }
    }
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps only the documents matching a filter, `$match`.
    Match(Document),
    /// Groups documents by a key expression, `$group`.
    Group {
        /// The grouping key; becomes the `_id` of each output document.
        id: Bson,
        /// Output fields and the accumulators computing them.
        fields: Vec<(String, Accumulator)>,
    },
    /// Orders documents by one or more keys, `$sort`.
    Sort(Vec<(String, Order)>),
    /// Drops the given number of leading documents, `$skip`.
    Skip(u64),
    /// Passes through at most the given number of documents, `$limit`.
    Limit(u64),
    /// Reshapes each document, `$project`.
    Project(Document),
}

impl Stage {
    /// Validates the stage and converts it into its document form.
    pub fn to_document(&self) -> Result<Document> {
        match *self {
            Stage::Match(ref filter) => Ok(doc!{ "$match": filter.clone() }),
            Stage::Group { ref id, ref fields } => {
                let mut group = Document::new();
                group.insert("_id", id.clone());

                for (name, acc) in fields {
                    validate_output_field(name)?;
                    group.insert(name.clone(), acc.to_document());
                }

                Ok(doc!{ "$group": group })
            }
            Stage::Sort(ref keys) => {
                if keys.is_empty() {
                    return Err(Error::new(ErrorKind::Query, "$sort stage has no keys"));
                }

                let keys: Document = keys
                    .iter()
                    .map(|(field, order)| (field.clone(), Bson::from(*order)))
                    .collect();

                Ok(doc!{ "$sort": keys })
            }
            Stage::Skip(n) => {
                let n = u64_to_i64_with_msg(n, "$skip")?;
                Ok(doc!{ "$skip": n })
            }
            Stage::Limit(n) => {
                if n == 0 {
                    return Err(Error::new(ErrorKind::Query, "$limit must be positive"));
                }

                let n = u64_to_i64_with_msg(n, "$limit")?;
                Ok(doc!{ "$limit": n })
            }
            Stage::Project(ref spec) => {
                if spec.is_empty() {
                    Err(Error::new(ErrorKind::Query, "$project stage is empty"))
                } else {
                    Ok(doc!{ "$project": spec.clone() })
                }
            }
        }
    }
}

/// Output fields of a `$group` stage are plain, top-level field names.
fn validate_output_field(name: &str) -> Result<()> {
    if name.is_empty() {
        Err(Error::new(ErrorKind::Query, "$group output field name is empty"))
    } else if name == "_id" {
        Err(Error::new(ErrorKind::Query, "$group output field `_id` is reserved for the key"))
    } else if name.starts_with('$') || name.contains('.') {
        Err(Error::new(
            ErrorKind::Query,
            format!("invalid $group output field name `{}`", name),
        ))
    } else {
        Ok(())
    }
}

/// Checks that a raw stage document names exactly one stage operator.
pub fn validate_raw_stage(stage: &Document) -> Result<()> {
    let mut keys = stage.keys();

    match (keys.next(), keys.next()) {
        (Some(key), None) if key.starts_with('$') => {}
        _ => return Err(Error::new(
            ErrorKind::Query,
            format!("pipeline stage must have exactly one operator, got {:?}",
                    stage.keys().collect::<Vec<_>>()),
        )),
    }

    match stage.get("$limit") {
        Some(&Bson::Int32(n)) if n <= 0 => {
            Err(Error::new(ErrorKind::Query, "$limit must be positive"))
        }
        Some(&Bson::Int64(n)) if n <= 0 => {
            Err(Error::new(ErrorKind::Query, "$limit must be positive"))
        }
        _ => Ok(()),
    }
}

/// An ordered sequence of aggregation stages.
/// ```
/// # use bson::doc;
/// # use folio::pipeline::{ Pipeline, Accumulator };
/// # use folio::literal::Order;
/// #
/// let pipeline = Pipeline::new()
///     .group("$author", vec![("count", Accumulator::count())])
///     .sort(vec![("count", Order::Descending)])
///     .limit(1);
///
/// assert_eq!(pipeline.stages().unwrap(), vec![
///     doc!{ "$group": { "_id": "$author", "count": { "$sum": 1 } } },
///     doc!{ "$sort": { "count": -1 } },
///     doc!{ "$limit": 1_i64 },
/// ]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    /// The stages, in execution order.
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline, which passes every document through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arbitrary stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a `$match` stage.
    pub fn matching<F: Into<Document>>(self, filter: F) -> Self {
        self.stage(Stage::Match(filter.into()))
    }

    /// Appends a `$group` stage.
    pub fn group<I, N>(self, id: I, fields: Vec<(N, Accumulator)>) -> Self
        where I: Into<Bson>,
              N: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, acc)| (name.into(), acc))
            .collect();

        self.stage(Stage::Group { id: id.into(), fields })
    }

    /// Appends a `$sort` stage with keys in order of significance.
    pub fn sort<K: Into<String>>(self, keys: Vec<(K, Order)>) -> Self {
        let keys = keys
            .into_iter()
            .map(|(field, order)| (field.into(), order))
            .collect();

        self.stage(Stage::Sort(keys))
    }

    /// Appends a `$skip` stage.
    pub fn skip(self, n: u64) -> Self {
        self.stage(Stage::Skip(n))
    }

    /// Appends a `$limit` stage.
    pub fn limit(self, n: u64) -> Self {
        self.stage(Stage::Limit(n))
    }

    /// Appends a `$project` stage.
    pub fn project<P: Into<Document>>(self, spec: P) -> Self {
        self.stage(Stage::Project(spec.into()))
    }

    /// Returns the number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Validates every stage and returns the raw stage documents, in order.
    pub fn stages(&self) -> Result<Vec<Document>> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

/// `"$field"`: a reference to the value of a field in an expression.
fn field_path(field: &str) -> Bson {
    Bson::String(format!("${}", field))
}

/// Average of `value_field` per distinct value of `group_field`, stored
/// under `output` in each result.
/// ```
/// # use bson::doc;
/// # use folio::pipeline::average_by;
/// #
/// assert_eq!(average_by("genre", "price", "avgPrice").stages().unwrap(), vec![
///     doc!{ "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } },
/// ]);
/// ```
pub fn average_by(group_field: &str, value_field: &str, output: &str) -> Pipeline {
    Pipeline::new().group(
        field_path(group_field),
        vec![(output, Accumulator::avg_of(value_field))],
    )
}

/// The `n` most frequent values of `field`, each with its `count`,
/// most frequent first. Ties are broken by the value itself.
pub fn most_frequent(field: &str, n: u64) -> Pipeline {
    Pipeline::new()
        .group(field_path(field), vec![("count", Accumulator::count())])
        .sort(vec![("count", Order::Descending), ("_id", Order::Ascending)])
        .limit(n)
}

/// Number of documents per decade of the integer `year_field`, in
/// chronological order. The `_id` of each result is the first year of the
/// decade, so 2015 and 2019 both count towards 2010.
pub fn count_by_decade(year_field: &str) -> Pipeline {
    Pipeline::new()
        .group(decade_of(year_field), vec![("count", Accumulator::count())])
        .sort(vec![("_id", Order::Ascending)])
}

/// Expression computing the decade of an integer field with integer
/// arithmetic only: `y - ((y % 10 + 10) % 10)`, which floors towards
/// negative infinity like `decade_bucket()`.
pub fn decade_of(year_field: &str) -> Bson {
    let year = field_path(year_field);
    let remainder = doc!{
        "$mod": [
            { "$add": [{ "$mod": [year.clone(), 10] }, 10] },
            10,
        ]
    };

    Bson::Document(doc!{ "$subtract": [year, remainder] })
}

/// The first year of the decade `year` falls in, i.e. `floor(year / 10) * 10`.
/// ```
/// # use folio::pipeline::decade_bucket;
/// #
/// assert_eq!(decade_bucket(2015), 2010);
/// assert_eq!(decade_bucket(2019), 2010);
/// assert_eq!(decade_bucket(2020), 2020);
/// assert_eq!(decade_bucket(-5), -10);
/// ```
pub fn decade_bucket(year: i64) -> i64 {
    year - year.rem_euclid(10)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorExt;
    use super::*;

    #[test]
    fn stage_order_is_preserved() -> Result<()> {
        let pipeline = Pipeline::new()
            .limit(10)
            .matching(doc!{ "in_stock": true })
            .skip(2)
            .project(doc!{ "title": 1 });

        let names: Vec<String> = pipeline
            .stages()?
            .iter()
            .filter_map(|stage| stage.keys().next().cloned())
            .collect();

        assert_eq!(names, ["$limit", "$match", "$skip", "$project"]);
        assert_eq!(pipeline.len(), 4);

        Ok(())
    }

    #[test]
    fn invalid_stages_are_rejected() {
        let cases = vec![
            Pipeline::new().limit(0),
            Pipeline::new().sort(Vec::<(String, Order)>::new()),
            Pipeline::new().project(Document::new()),
            Pipeline::new().group("$genre", vec![("$avg", Accumulator::count())]),
            Pipeline::new().group("$genre", vec![("a.b", Accumulator::count())]),
            Pipeline::new().group("$genre", vec![("_id", Accumulator::count())]),
            Pipeline::new().group("$genre", vec![("", Accumulator::count())]),
        ];

        for pipeline in cases {
            let error = pipeline.stages().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Query, "{:?}", pipeline);
        }

        let huge = Pipeline::new().skip(u64::MAX).stages().unwrap_err();
        assert_eq!(huge.kind(), ErrorKind::IntConversionOverflow);
    }

    #[test]
    fn raw_stage_validation() {
        assert!(validate_raw_stage(&doc!{ "$limit": 1 }).is_ok());
        assert!(validate_raw_stage(&doc!{ "$match": { "genre": "Fiction" } }).is_ok());

        assert!(validate_raw_stage(&doc!{ "$limit": 0 }).is_err());
        assert!(validate_raw_stage(&doc!{ "$limit": -3_i64 }).is_err());
        assert!(validate_raw_stage(&doc!{}).is_err());
        assert!(validate_raw_stage(&doc!{ "genre": "Fiction" }).is_err());
        assert!(validate_raw_stage(&doc!{ "$match": {}, "$limit": 1 }).is_err());
    }

    #[test]
    fn most_frequent_breaks_ties_by_value() -> Result<()> {
        assert_eq!(most_frequent("author", 1).stages()?, vec![
            doc!{ "$group": { "_id": "$author", "count": { "$sum": 1 } } },
            doc!{ "$sort": { "count": -1, "_id": 1 } },
            doc!{ "$limit": 1_i64 },
        ]);

        Ok(())
    }

    #[test]
    fn decade_grouping_uses_integer_arithmetic() -> Result<()> {
        let stages = count_by_decade("published_year").stages()?;

        assert_eq!(stages, vec![
            doc!{
                "$group": {
                    "_id": {
                        "$subtract": [
                            "$published_year",
                            { "$mod": [{ "$add": [{ "$mod": ["$published_year", 10] }, 10] }, 10] },
                        ]
                    },
                    "count": { "$sum": 1 },
                }
            },
            doc!{ "$sort": { "_id": 1 } },
        ]);

        Ok(())
    }

    #[test]
    fn decade_buckets() {
        assert_eq!(decade_bucket(2015), 2010);
        assert_eq!(decade_bucket(2019), 2010);
        assert_eq!(decade_bucket(2010), 2010);
        assert_eq!(decade_bucket(2020), 2020);
        assert_eq!(decade_bucket(0), 0);
        assert_eq!(decade_bucket(-1), -10);
    }
}

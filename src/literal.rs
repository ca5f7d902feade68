//! Helper types for making the construction of sort, index and command
//! documents a little less stringly-typed.

use std::fmt;
use bson::Bson;
use serde::ser::{ Serialize, Serializer };

/// Ordering, for specifying in which order to sort results yielded by a query
/// or in which direction a field of an index is kept.
/// ```
/// # use bson::doc;
/// # use folio::literal::Order;
/// #
/// let sorting = doc! {
///     "price": Order::Ascending,
///     "title": Order::Descending,
/// };
/// assert_eq!(sorting, doc!{
///     "price":  1,
///     "title": -1,
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Order {
    /// Order smaller values first.
    #[default]
    Ascending  =  1,
    /// Order greater values first.
    Descending = -1,
}

impl Order {
    /// The numeric direction as it appears in sort and index documents.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// This impl is provided so that you can use these more expressive ordering
/// names instead of the not very clear `1` and `-1` when constructing literal
/// BSON sort or index documents.
impl From<Order> for Bson {
    fn from(order: Order) -> Self {
        Bson::Int32(order.as_i32())
    }
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_i32(self.as_i32())
    }
}

/// How much detail the store should report when explaining a query plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verbosity {
    /// Only the winning plan chosen by the query planner.
    QueryPlanner,
    /// The winning plan, executed, together with its execution statistics.
    #[default]
    ExecutionStats,
    /// Execution statistics for the winning plan and all rejected candidates.
    AllPlansExecution,
}

impl Verbosity {
    /// The name of the verbosity mode as understood by the `explain` command.
    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::QueryPlanner      => "queryPlanner",
            Verbosity::ExecutionStats    => "executionStats",
            Verbosity::AllPlansExecution => "allPlansExecution",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verbosity> for Bson {
    fn from(verbosity: Verbosity) -> Self {
        Bson::String(verbosity.as_str().into())
    }
}

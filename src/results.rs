//! Raw driver results and the shapes they are normalized into.

pub mod outcome;
pub mod result_set;
pub mod row;

pub use outcome::{
    ERROR_ROW_COUNT, QueryOutcome, ReadResult, Record, TypedRecord, UNKNOWN_INSERT_ID, normalize,
};
pub use result_set::{ResultSet, SQLSTATE_OK};
pub use row::CustomDbRow;

//! Checked integer conversions.

use crate::error::{ Error, ErrorKind, Result };

/// Converts an unsigned value to the `i64` representation used on the wire
/// (e.g. for `limit`) if the range permits.
/// ```
/// # use folio::utils::u64_to_i64_with_msg;
/// #
/// assert_eq!(u64_to_i64_with_msg(5, "limit").unwrap(), 5);
/// assert!(u64_to_i64_with_msg(u64::MAX, "limit")
///         .unwrap_err()
///         .to_string()
///         .contains("limit (18446744073709551615) overflows `i64`"));
/// ```
pub fn u64_to_i64_with_msg(n: u64, msg: &str) -> Result<i64> {
    i64::try_from(n).map_err(|_| Error::new(
        ErrorKind::IntConversionOverflow,
        format!("{} ({}) overflows `i64`", msg, n),
    ))
}

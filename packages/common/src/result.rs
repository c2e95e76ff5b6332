use crate::error::CommonError;

/// Result of the fallible helpers, e.g. parsing a [`Priority`](crate::Priority)
pub type CommonResult<T> = Result<T, CommonError>;

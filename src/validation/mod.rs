//! Input validation for external data.
//!
//! Turns remote-call requests into domain parameters. Everything rejected
//! here maps to `INVALID_ARGUMENT` and never reaches the store.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tonic::Status;

use crate::model::{NewTransaction, TransactionWindow, UserId};
use crate::proto::{CreateTransactionRequest, GetUserBalanceRequest, ListTransactionRequest};

/// Error constants for validation failures.
pub mod errmsg {
    pub const USER_ID_REQUIRED: &str = "user_id is required and must be positive";
    pub const DATETIME_REQUIRED: &str = "datetime is required";
    pub const DATETIME_OUT_OF_RANGE: &str = "datetime is out of range";
    pub const AMOUNT_NOT_POSITIVE: &str = "amount must be greater than zero";
    pub const AMOUNT_NOT_FINITE: &str = "amount must be a finite number";
    pub const AMOUNT_OUT_OF_RANGE: &str = "amount is out of range";
    pub const WINDOW_INVERTED: &str = "start_datetime must not be after end_datetime";
}

/// Rejected request input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{}", errmsg::USER_ID_REQUIRED)]
    UserIdRequired,

    #[error("{}", errmsg::DATETIME_REQUIRED)]
    DatetimeRequired,

    #[error("{}: {field}", errmsg::DATETIME_OUT_OF_RANGE)]
    DatetimeOutOfRange { field: &'static str },

    #[error("{} (got: {amount})", errmsg::AMOUNT_NOT_POSITIVE)]
    AmountNotPositive { amount: f64 },

    #[error("{}", errmsg::AMOUNT_NOT_FINITE)]
    AmountNotFinite,

    #[error("{} (got: {amount})", errmsg::AMOUNT_OUT_OF_RANGE)]
    AmountOutOfRange { amount: f64 },

    #[error("{}", errmsg::WINDOW_INVERTED)]
    WindowInverted,
}

impl From<ValidationError> for Status {
    fn from(err: ValidationError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

/// Validate a user id. Zero (the protobuf default) counts as missing.
pub fn validate_user_id(user_id: UserId) -> Result<UserId, ValidationError> {
    if user_id <= 0 {
        return Err(ValidationError::UserIdRequired);
    }
    Ok(user_id)
}

/// Validate a deposit amount.
///
/// Rules:
/// - Must be finite (no NaN or infinity)
/// - Must fit in a `Decimal`
/// - Must be strictly greater than zero after conversion, so doubles that
///   round to zero are rejected here rather than by the store
pub fn validate_amount(amount: f64) -> Result<Decimal, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::AmountNotFinite);
    }
    if amount <= 0.0 {
        return Err(ValidationError::AmountNotPositive { amount });
    }
    let value = Decimal::from_f64(amount).ok_or(ValidationError::AmountOutOfRange { amount })?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::AmountNotPositive { amount });
    }
    Ok(value)
}

/// Convert a protobuf timestamp, rejecting values chrono cannot represent.
pub fn timestamp_to_datetime(
    timestamp: &prost_types::Timestamp,
    field: &'static str,
) -> Result<DateTime<Utc>, ValidationError> {
    let nanos = u32::try_from(timestamp.nanos)
        .map_err(|_| ValidationError::DatetimeOutOfRange { field })?;
    DateTime::from_timestamp(timestamp.seconds, nanos)
        .ok_or(ValidationError::DatetimeOutOfRange { field })
}

/// Validate a create request.
pub fn validate_create(request: &CreateTransactionRequest) -> Result<NewTransaction, ValidationError> {
    let user_id = validate_user_id(request.user_id)?;
    let datetime = request
        .datetime
        .as_ref()
        .ok_or(ValidationError::DatetimeRequired)?;
    let datetime = timestamp_to_datetime(datetime, "datetime")?;
    let amount = validate_amount(request.amount)?;

    Ok(NewTransaction {
        user_id,
        datetime,
        amount,
    })
}

/// Validate a list request.
///
/// A missing start means the Unix epoch, a missing end means `now`.
pub fn validate_list(
    request: &ListTransactionRequest,
    now: DateTime<Utc>,
) -> Result<TransactionWindow, ValidationError> {
    let user_id = validate_user_id(request.user_id)?;
    let start = match request.start_datetime.as_ref() {
        Some(ts) => timestamp_to_datetime(ts, "start_datetime")?,
        None => DateTime::UNIX_EPOCH,
    };
    let end = match request.end_datetime.as_ref() {
        Some(ts) => timestamp_to_datetime(ts, "end_datetime")?,
        None => now,
    };
    if start > end {
        return Err(ValidationError::WindowInverted);
    }

    Ok(TransactionWindow {
        user_id,
        start,
        end,
        open_end: request.end_datetime.is_none(),
    })
}

/// Validate a balance request.
pub fn validate_balance(request: &GetUserBalanceRequest) -> Result<UserId, ValidationError> {
    validate_user_id(request.user_id)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use prost_types::Timestamp;

    fn ts(seconds: i64) -> Option<Timestamp> {
        Some(Timestamp { seconds, nanos: 0 })
    }

    #[test]
    fn test_create_valid() {
        let new = validate_create(&CreateTransactionRequest {
            user_id: 1988,
            datetime: ts(1_676_169_338),
            amount: 100.5,
        })
        .unwrap();

        assert_eq!(new.user_id, 1988);
        assert_eq!(new.datetime.timestamp(), 1_676_169_338);
        assert_eq!(new.amount, Decimal::from_str("100.5").unwrap());
    }

    #[test]
    fn test_create_rejects_bad_amounts() {
        for amount in [0.0, -1.5] {
            let err = validate_create(&CreateTransactionRequest {
                user_id: 1,
                datetime: ts(0),
                amount,
            })
            .unwrap_err();
            assert!(matches!(err, ValidationError::AmountNotPositive { .. }));
        }

        for amount in [f64::NAN, f64::INFINITY] {
            let err = validate_create(&CreateTransactionRequest {
                user_id: 1,
                datetime: ts(0),
                amount,
            })
            .unwrap_err();
            assert_eq!(err, ValidationError::AmountNotFinite);
        }
    }

    #[test]
    fn test_amount_rounding_to_zero_rejected() {
        assert_eq!(
            validate_amount(1e-30),
            Err(ValidationError::AmountNotPositive { amount: 1e-30 })
        );
        assert_eq!(
            validate_amount(1e30),
            Err(ValidationError::AmountOutOfRange { amount: 1e30 })
        );
        assert!(validate_amount(0.00000001).unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_create_requires_user_and_datetime() {
        let err = validate_create(&CreateTransactionRequest {
            user_id: 0,
            datetime: ts(0),
            amount: 1.0,
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::UserIdRequired);

        let err = validate_create(&CreateTransactionRequest {
            user_id: 1,
            datetime: None,
            amount: 1.0,
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::DatetimeRequired);
    }

    #[test]
    fn test_negative_nanos_rejected() {
        let err = validate_create(&CreateTransactionRequest {
            user_id: 1,
            datetime: Some(Timestamp {
                seconds: 0,
                nanos: -1,
            }),
            amount: 1.0,
        })
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DatetimeOutOfRange { field: "datetime" }
        );
    }

    #[test]
    fn test_list_defaults_open_bounds() {
        let now = DateTime::from_timestamp(2_000, 0).unwrap();
        let window = validate_list(
            &ListTransactionRequest {
                user_id: 7,
                start_datetime: None,
                end_datetime: None,
            },
            now,
        )
        .unwrap();

        assert_eq!(window.start, DateTime::UNIX_EPOCH);
        assert_eq!(window.end, now);
        assert!(window.open_end);
    }

    #[test]
    fn test_list_rejects_inverted_window() {
        let err = validate_list(
            &ListTransactionRequest {
                user_id: 7,
                start_datetime: ts(20),
                end_datetime: ts(10),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::WindowInverted);
    }

    #[test]
    fn test_list_accepts_single_instant() {
        let window = validate_list(
            &ListTransactionRequest {
                user_id: 7,
                start_datetime: ts(10),
                end_datetime: ts(10),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(window.start, window.end);
        assert!(!window.open_end);
    }

    #[test]
    fn test_balance_requires_user() {
        assert_eq!(
            validate_balance(&GetUserBalanceRequest { user_id: -3 }),
            Err(ValidationError::UserIdRequired)
        );
        assert_eq!(
            validate_balance(&GetUserBalanceRequest { user_id: 3 }),
            Ok(3)
        );
    }

    #[test]
    fn test_into_status() {
        let status: Status = ValidationError::WindowInverted.into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), errmsg::WINDOW_INVERTED);
    }
}

//! Syntactic checks run before any network call.

use uuid::Uuid;

use crate::error::ValidationError;

/// Length of the hyphenated textual UUID form.
const HYPHENATED_UUID_LEN: usize = 36;

pub const OTP_LEN: usize = 6;

/// True iff `s` is a hyphenated UUID of any version or variant. The simple,
/// braced and URN spellings are not accepted.
pub fn is_valid_remote_id(s: &str) -> bool {
    s.len() == HYPHENATED_UUID_LEN && Uuid::try_parse(s).is_ok()
}

/// True iff `s` is exactly six ASCII digits.
pub fn is_valid_otp(s: &str) -> bool {
    s.len() == OTP_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Checks the remote id first, then the code, so the operator is pointed at
/// the first bad field.
pub fn validate_inputs(remote_id: &str, otp: &str) -> Result<Uuid, ValidationError> {
    if !is_valid_remote_id(remote_id) {
        return Err(ValidationError::RemoteId);
    }
    if !is_valid_otp(otp) {
        return Err(ValidationError::Otp);
    }
    Uuid::try_parse(remote_id).map_err(|_| ValidationError::RemoteId)
}

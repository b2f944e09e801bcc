use serde::Deserialize;

/// Request body for profile updates. Only the display name is mutable here;
/// email changes would need a fresh verification flow and are not offered.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

/// Request body for an authenticated password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

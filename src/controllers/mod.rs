//! Form and listing controllers for the site pages

pub mod password;
pub mod tricks;
pub mod validation;

pub use password::{ForgotPasswordForm, PasswordController, ResetPasswordForm, LOGIN_PATH};
pub use tricks::{
    gravatar_url, prepare_for_render, tricks_cache_key, OwnerCard, TrickCard, TrickController,
    BOOKMARK_CONTENT_TYPE, BOOKMARK_FIELD,
};
pub use validation::{Form, Rule, Validator};

use crate::api::Params;

/// Anti-forgery token sent as `_csrf` with every form post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrfToken(Option<String>);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn from_option(token: Option<String>) -> Self {
        Self(token)
    }

    pub fn append_to(&self, params: &mut Params) {
        if let Some(token) = &self.0 {
            params.push(("_csrf".to_string(), token.clone()));
        }
    }
}

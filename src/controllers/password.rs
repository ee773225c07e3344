//! Forgot-password and reset-password forms

use super::validation::{Form, Rule, Validator};
use super::CsrfToken;
use crate::api::{ApiClient, Params};
use crate::errors::{FieldError, Result, ShelfError};
use crate::progress::ProgressBar;
use serde_json::Value;
use tracing::info;

/// Where a successful reset sends the user.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgotPasswordForm {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPasswordForm {
    pub new_password: String,
    pub confirm_new_password: String,
}

#[derive(Debug, Clone)]
pub struct PasswordController {
    client: ApiClient,
    progress: ProgressBar,
    csrf: CsrfToken,
}

impl PasswordController {
    pub fn new(client: ApiClient, progress: ProgressBar, csrf: CsrfToken) -> Self {
        Self {
            client,
            progress,
            csrf,
        }
    }

    fn forgot_rules() -> Validator {
        Validator::new()
            .rule("email", Rule::Required)
            .rule("email", Rule::Email)
    }

    fn reset_rules() -> Validator {
        Validator::new()
            .rule_with_message("new_password", Rule::Required, "Please provide a password")
            .rule_with_message(
                "new_password",
                Rule::MinLength(6),
                "Your password must be at least 6 characters long",
            )
            .rule_with_message(
                "confirm_new_password",
                Rule::Required,
                "Please provide a confirm password",
            )
            .rule("confirm_new_password", Rule::MinLength(6))
            .rule_with_message(
                "confirm_new_password",
                Rule::EqualTo("new_password".to_string()),
                "Please enter the same password as above",
            )
    }

    /// Request a reset e-mail. Returns the confirmation to show the user.
    ///
    /// The indicator runs for the duration of the request.
    pub async fn forgot_password(&self, form: &ForgotPasswordForm) -> Result<String> {
        let email = form.email.trim();
        Self::forgot_rules().validate(&Form::new().with("email", email))?;

        let mut params: Params = Vec::new();
        self.csrf.append_to(&mut params);
        params.push(("email".to_string(), email.to_string()));

        self.progress.start();
        let outcome = self
            .client
            .post_form::<Value>(&self.client.site_url("/forgot-password"), &params)
            .await;
        self.progress.done(false);
        outcome?;

        info!(email, "password reset requested");
        Ok(format!(
            "An e-mail has been sent to {} with further instructions.",
            email
        ))
    }

    /// Set a new password with the emailed `token`. Returns the path to
    /// redirect to.
    pub async fn reset_password(&self, token: &str, form: &ResetPasswordForm) -> Result<String> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ShelfError::ValidationError(vec![FieldError::new(
                "token",
                "Reset token is missing",
            )]));
        }
        let values = Form::new()
            .with("new_password", form.new_password.as_str())
            .with("confirm_new_password", form.confirm_new_password.as_str());
        Self::reset_rules().validate(&values)?;

        let mut params: Params = vec![
            ("password".to_string(), form.new_password.clone()),
            ("confirm_password".to_string(), form.confirm_new_password.clone()),
        ];
        self.csrf.append_to(&mut params);

        self.progress.start();
        let outcome = self
            .client
            .post_form::<Value>(&self.client.endpoint(["reset", token]), &params)
            .await;
        self.progress.done(false);
        outcome?;

        info!("password reset");
        Ok(LOGIN_PATH.to_string())
    }
}

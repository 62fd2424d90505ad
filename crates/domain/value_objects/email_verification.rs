use serde::{Deserialize, Serialize};

/// Every parameter a confirmation link may carry, whether from the query string or the
/// URL fragment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmEmailParams {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub access_token: Option<String>,
    pub token: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMethod {
    TokenHash { token_hash: String, otp_type: String },
    PkceCode { code: String, code_verifier: String },
    AccessToken { access_token: String },
    EmailOtp { email: String, token: String, otp_type: String },
}

impl VerificationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            VerificationMethod::TokenHash { .. } => "token_hash",
            VerificationMethod::PkceCode { .. } => "pkce_code",
            VerificationMethod::AccessToken { .. } => "access_token",
            VerificationMethod::EmailOtp { .. } => "email_otp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmEmailResponse {
    pub success: bool,
    pub method: &'static str,
    pub user: VerifiedUser,
}

const DEFAULT_OTP_TYPE: &str = "email";

/// Recognised verification methods for the given parameters, highest priority first.
///
/// Each method appears at most once and only when all of its inputs are present.
pub fn verification_methods(params: &ConfirmEmailParams) -> Vec<VerificationMethod> {
    let otp_type = non_empty(&params.otp_type).unwrap_or_else(|| DEFAULT_OTP_TYPE.to_string());
    let mut methods = Vec::new();

    if let Some(token_hash) = non_empty(&params.token_hash) {
        methods.push(VerificationMethod::TokenHash {
            token_hash,
            otp_type: otp_type.clone(),
        });
    }

    if let (Some(code), Some(code_verifier)) =
        (non_empty(&params.code), non_empty(&params.code_verifier))
    {
        methods.push(VerificationMethod::PkceCode {
            code,
            code_verifier,
        });
    }

    if let Some(access_token) = non_empty(&params.access_token) {
        methods.push(VerificationMethod::AccessToken { access_token });
    }

    if let (Some(email), Some(token)) = (non_empty(&params.email), non_empty(&params.token)) {
        methods.push(VerificationMethod::EmailOtp {
            email,
            token,
            otp_type,
        });
    }

    methods
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_follow_priority_order() {
        let params = ConfirmEmailParams {
            token_hash: Some("hash".into()),
            otp_type: Some("signup".into()),
            code: Some("code".into()),
            code_verifier: Some("verifier".into()),
            access_token: Some("jwt".into()),
            token: Some("123456".into()),
            email: Some("renter@example.com".into()),
        };

        let names: Vec<_> = verification_methods(&params)
            .iter()
            .map(VerificationMethod::name)
            .collect();
        assert_eq!(
            names,
            vec!["token_hash", "pkce_code", "access_token", "email_otp"]
        );
    }

    #[test]
    fn missing_type_defaults_to_email() {
        let params = ConfirmEmailParams {
            token_hash: Some("hash".into()),
            ..Default::default()
        };

        assert_eq!(
            verification_methods(&params),
            vec![VerificationMethod::TokenHash {
                token_hash: "hash".into(),
                otp_type: "email".into(),
            }]
        );
    }

    #[test]
    fn blank_and_incomplete_params_are_skipped() {
        let params = ConfirmEmailParams {
            token_hash: Some("   ".into()),
            code: Some("code-without-verifier".into()),
            token: Some("123456".into()),
            ..Default::default()
        };

        assert!(verification_methods(&params).is_empty());
    }
}

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Identity claims carried by the company access token payload.
#[derive(Debug, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "authClass")]
    pub auth_class: Option<String>,
    /// company id for agency-level tokens
    #[serde(rename = "authClassId")]
    pub auth_class_id: Option<Value>,
}

impl IdentityClaims {
    pub fn company_id(&self) -> Option<String> {
        match self.auth_class_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Decode the payload segment of a JWT-shaped token. Signature is not verified,
/// the token is only inspected to read who it was issued for.
pub fn decode_identity_claims(token: &str) -> Option<IdentityClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() < 2 {
        return None;
    }

    let payload = parts[1].trim_end_matches('=');
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(payload))
        .inspect_err(|e| debug!("token payload is not base64: {}", e))
        .ok()?;

    serde_json::from_slice::<IdentityClaims>(&decoded)
        .inspect_err(|e| debug!("token payload is not a claims object: {}", e))
        .ok()
}

/// Company id embedded in the company token, if it carries one.
pub fn company_id_from_token(token: &str) -> Option<String> {
    decode_identity_claims(token).and_then(|claims| claims.company_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(payload: Value) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            engine.encode(payload.to_string()),
            "signature"
        )
    }

    #[test]
    fn reads_string_company_claim() {
        let token = jwt(json!({"authClass": "Company", "authClassId": "comp_42"}));
        assert_eq!(company_id_from_token(&token).as_deref(), Some("comp_42"));
    }

    #[test]
    fn reads_numeric_company_claim() {
        let token = jwt(json!({"authClassId": 1234}));
        assert_eq!(company_id_from_token(&token).as_deref(), Some("1234"));
    }

    #[test]
    fn opaque_or_claimless_tokens_yield_nothing() {
        assert!(company_id_from_token("opaque-token").is_none());
        assert!(company_id_from_token("a.!!!.c").is_none());
        assert!(company_id_from_token(&jwt(json!({"sub": "user"}))).is_none());
        assert!(company_id_from_token(&jwt(json!({"authClassId": ""}))).is_none());
    }
}

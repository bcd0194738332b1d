#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::exchange::{AuthErrorKind, ExchangeClient, HttpExchangeClient};
    use crate::tests::common::{fake_jwt, oauth_config};

    fn client_for(server: &MockServer) -> HttpExchangeClient {
        HttpExchangeClient::new(oauth_config(&server.base_url())).expect("http client")
    }

    #[tokio::test]
    async fn code_exchange_posts_authorization_code_grant() {
        let server = MockServer::start_async().await;
        let access_token = fake_jwt(json!({"authClass": "Company", "authClassId": "cmp_42"}));
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .header("version", "2021-07-28")
                    .header("accept", "application/json")
                    .form_urlencoded_tuple("grant_type", "authorization_code")
                    .form_urlencoded_tuple("code", "the-code")
                    .form_urlencoded_tuple("redirect_uri", "http://localhost:8080/oauth/callback")
                    .form_urlencoded_tuple("client_id", "client-id")
                    .form_urlencoded_tuple("client_secret", "client-secret")
                    .form_urlencoded_tuple("user_type", "Company");
                then.status(200).json_body(json!({
                    "access_token": access_token,
                    "token_type": "Bearer",
                    "expires_in": 86399,
                    "refresh_token": "refresh-1",
                    "scope": "contacts.readonly locations.readonly",
                    "userType": "Company"
                }));
            })
            .await;

        let credential = client_for(&server)
            .exchange_code("the-code", "http://localhost:8080/oauth/callback")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(credential.company_id, "cmp_42");
        assert_eq!(credential.refresh_token, "refresh-1");
        assert_eq!((credential.expires_at - credential.issued_at).num_seconds(), 86399);
        assert!(credential.scope_set.contains("locations.readonly"));
    }

    #[tokio::test]
    async fn refresh_keeps_sent_refresh_token_when_none_returned() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .form_urlencoded_tuple("grant_type", "refresh_token")
                    .form_urlencoded_tuple("refresh_token", "refresh-0");
                then.status(200).json_body(json!({
                    "access_token": "opaque-access",
                    "expires_in": 3600,
                    "companyId": "cmp_7"
                }));
            })
            .await;

        let credential = client_for(&server).refresh_company("refresh-0").await.unwrap();

        mock.assert_async().await;
        assert_eq!(credential.access_token, "opaque-access");
        assert_eq!(credential.refresh_token, "refresh-0");
        assert_eq!(credential.company_id, "cmp_7");
    }

    #[tokio::test]
    async fn rejected_refresh_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(401)
                    .json_body(json!({"error": "invalid_grant", "error_description": "Invalid grant: refresh token is invalid"}));
            })
            .await;

        let err = client_for(&server).refresh_company("revoked").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::Rejected);
        assert_eq!(err.http_status, Some(401));
        assert_eq!(err.oauth_error().as_deref(), Some("invalid_grant"));
    }

    #[tokio::test]
    async fn derivation_sends_bearer_and_accepts_created() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/locationToken")
                    .header("authorization", "Bearer company-access")
                    .header("version", "2021-07-28")
                    .form_urlencoded_tuple("companyId", "cmp_42")
                    .form_urlencoded_tuple("locationId", "loc_1");
                then.status(201).json_body(json!({
                    "access_token": "location-access",
                    "token_type": "Bearer",
                    "scope": "contacts.readonly",
                    "locationId": "loc_1",
                    "userType": "Location"
                }));
            })
            .await;

        let credential = client_for(&server)
            .derive_location("company-access", "cmp_42", "loc_1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(credential.access_token, "location-access");
        assert_eq!(credential.location_id, "loc_1");
        assert_eq!(credential.company_id, "cmp_42");
        // no expires_in: one day
        assert_eq!((credential.expires_at - credential.issued_at).num_seconds(), 86_400);
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/locationToken");
                then.status(429).body("slow down");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(502).body("bad gateway");
            })
            .await;

        let client = client_for(&server);
        let rate_limited = client.derive_location("t", "c", "l").await.unwrap_err();
        assert_eq!(rate_limited.kind, AuthErrorKind::RateLimited);
        assert!(rate_limited.is_transient());

        let upstream = client.refresh_company("r").await.unwrap_err();
        assert_eq!(upstream.kind, AuthErrorKind::Upstream);
        assert_eq!(upstream.body, "bad gateway");
    }

    #[tokio::test]
    async fn success_without_token_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200).json_body(json!({"message": "ok"}));
            })
            .await;

        let err = client_for(&server).refresh_company("r").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::InvalidResponse);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let mut config = oauth_config("http://127.0.0.1:9");
        config.timeout_ms = 500;
        let client = HttpExchangeClient::new(config).unwrap();

        let err = client.refresh_company("r").await.unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::Network);
    }
}

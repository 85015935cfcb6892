//! Integration tests for IdentityService.

use oidc_session::{
    create_mock_oidc_client, identity_service, session_config, AuthResponse,
    AuthenticationUrlOptions, CallbackParams, Claims, ClaimsSource, CookieUpdate,
    DefaultPkceGenerator, IdentityService, MockCacheBackend, MockClientResolver, MockOidcClient,
    NoHooks, OutboundQuery, ProviderError, ProviderTokenSet, RequestContext, SessionConfig,
    SessionCookie, SessionError,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn create_test_config() -> SessionConfig {
    session_config()
        .identity_app_url("https://identity.example")
        .service_id("0f8fad5b-d9cb-469f-a165-70867728950e")
        .client_id("7c9e6679-7425-40de-944b-e07fc1f90ae7")
        .client_secret("client-secret")
        .cookie_password("0123456789abcdef0123456789abcdef")
        .app_domain("https://app.example")
        .default_policy("b2c_1a_signin")
        .build()
        .unwrap()
}

fn create_test_service() -> (IdentityService, Arc<MockOidcClient>, Arc<MockClientResolver>) {
    let client = Arc::new(create_mock_oidc_client());
    let resolver = Arc::new(MockClientResolver::new(client.clone()));
    let service = identity_service(create_test_config(), resolver.clone()).unwrap();
    (service, client, resolver)
}

fn signed_in_token_set(policy: &str) -> ProviderTokenSet {
    let claims = Claims {
        sub: Some("user-1".to_string()),
        exp: Some(chrono::Utc::now().timestamp() + 3600),
        tfp: Some(policy.to_string()),
        contact_id: Some("contact-1".to_string()),
        ..Default::default()
    };
    ProviderTokenSet {
        access_token: Some("access-1".to_string()),
        refresh_token: Some("refresh-1".to_string()),
        id_token: Some("id-1".to_string()),
        claims: ClaimsSource::deferred(move || Some(claims.clone())),
        ..Default::default()
    }
}

/// Run the outbound endpoint and return the state sent to the provider.
async fn start_login(service: &IdentityService, back_to_path: &str) -> String {
    let outbound = service
        .generate_authentication_url(Some(back_to_path), &AuthenticationUrlOptions::default())
        .unwrap();
    let query = OutboundQuery::from_url(&outbound);

    let response = service
        .handle_outbound(&RequestContext::new(), &query)
        .await
        .unwrap();
    let provider_url = Url::parse(response.location().unwrap()).unwrap();
    provider_url
        .query_pairs()
        .find(|(name, _)| name == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

fn session_cookie(request: &RequestContext) -> SessionCookie {
    match request.cookie_update() {
        CookieUpdate::Set(cookie) => cookie.clone(),
        other => panic!("expected a session cookie, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_url_carries_back_to_path() {
    let (service, _, _) = create_test_service();

    let url = service
        .generate_authentication_url(Some("/dashboard"), &AuthenticationUrlOptions::default())
        .unwrap();

    assert!(url.as_str().starts_with("https://app.example/login/out?"));
    assert!(url.as_str().contains("backToPath=%2Fdashboard"));
}

#[tokio::test]
async fn test_login_round_trip() {
    let (service, client, _) = create_test_service();
    client.set_default_token_set(signed_in_token_set("b2c_1a_signin"));

    let state = start_login(&service, "/dashboard").await;
    assert!(service.state_store().consume(&state, None).await.unwrap().is_some());

    let mut request = RequestContext::new();
    let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);
    let response = service.handle_return(&mut request, &params).await.unwrap();

    // Continuation page points back at the requested path
    let body = response.body().unwrap();
    assert!(body.contains("https://app.example/dashboard"));
    assert!(body.contains("/postAuthRedirect"));

    // Pending attempt is gone
    assert!(service.state_store().consume(&state, None).await.unwrap().is_none());

    // Session is readable through the new cookie
    let cookie = session_cookie(&request);
    let next = RequestContext::with_session_cookie(cookie);
    let session = service.get_credentials(&next).await.unwrap().unwrap();
    assert_eq!(session.token_set.access_token.as_deref(), Some("access-1"));
    assert_eq!(session.policy_name(), Some("b2c_1a_signin"));
    assert!(!session.is_expired());

    // The provider saw the attempt's verifier and nonce
    let (redirect_uri, _, checks) = client.get_callback_history().remove(0);
    assert_eq!(redirect_uri, "https://app.example/login/return");
    assert_eq!(checks.state, state);
    assert_eq!(checks.response_type, "code");
    assert_eq!(checks.code_verifier.len(), 43);
    let sent = client.get_authorization_history().remove(0);
    assert_eq!(checks.nonce, sent.nonce);
}

#[tokio::test]
async fn test_callback_cannot_be_replayed() {
    let (service, client, _) = create_test_service();
    client.set_default_token_set(signed_in_token_set("b2c_1a_signin"));

    let state = start_login(&service, "/dashboard").await;
    let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);

    let mut first = RequestContext::new();
    service.handle_return(&mut first, &params).await.unwrap();

    let mut second = RequestContext::new();
    let err = service.handle_return(&mut second, &params).await.unwrap_err();
    assert!(matches!(err, SessionError::StateNotFound { .. }));
    assert_eq!(second.cookie_update(), &CookieUpdate::Unchanged);
    assert_eq!(client.get_callback_history().len(), 1);
}

#[tokio::test]
async fn test_provider_error_redirects_to_error_page() {
    let (service, client, _) = create_test_service();

    let state = start_login(&service, "/dashboard").await;
    let mut request = RequestContext::new();
    let params = CallbackParams::from_form(&format!(
        "error=access_denied&error_description=access_denied&state={}",
        state
    ));

    let response = service.handle_return(&mut request, &params).await.unwrap();
    let location = Url::parse(response.location().unwrap()).unwrap();

    assert_eq!(location.host_str(), Some("app.example"));
    assert_eq!(location.path(), "/error");
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("errorDescription".to_string(), "access_denied".to_string())));
    assert!(pairs.contains(&("state".to_string(), state.clone())));

    // No exchange, no session, attempt dropped
    assert!(client.get_callback_history().is_empty());
    assert_eq!(request.cookie_update(), &CookieUpdate::Unchanged);
    assert!(service.state_store().consume(&state, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_exchange_rejection_redirects_to_error_page() {
    let (service, client, _) = create_test_service();
    client.queue_callback_result(Err(ProviderError::Rejected {
        error: "invalid_grant".to_string(),
        error_description: Some("code expired".to_string()),
    }));

    let state = start_login(&service, "/").await;
    let mut request = RequestContext::new();
    let params = CallbackParams::from_pairs([("code", "stale"), ("state", state.as_str())]);

    let response = service.handle_return(&mut request, &params).await.unwrap();
    let location = response.location().unwrap();

    assert!(location.starts_with("https://app.example/error?"));
    assert!(location.contains("errorMessage=invalid_grant"));
    assert!(location.contains("errorDescription=code+expired"));
}

#[tokio::test]
async fn test_exchange_failure_propagates() {
    let (service, client, _) = create_test_service();
    client.queue_callback_result(Err(ProviderError::Unavailable {
        message: "connection reset".to_string(),
    }));

    let state = start_login(&service, "/").await;
    let mut request = RequestContext::new();
    let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);

    let err = service.handle_return(&mut request, &params).await.unwrap_err();
    assert!(matches!(err, SessionError::Provider(ProviderError::Unavailable { .. })));
    assert_eq!(request.cookie_update(), &CookieUpdate::Unchanged);
}

#[tokio::test]
async fn test_get_credentials_without_cookie() {
    let (service, _, _) = create_test_service();

    let request = RequestContext::new();
    assert!(service.get_credentials(&request).await.unwrap().is_none());
    assert!(service.get_claims(&request).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_retries_with_policy_client() {
    let (service, client, resolver) = create_test_service();
    client.set_default_token_set(signed_in_token_set("policyA"));

    let state = start_login(&service, "/").await;
    let mut login = RequestContext::new();
    let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);
    service.handle_return(&mut login, &params).await.unwrap();
    let request = RequestContext::with_session_cookie(session_cookie(&login));

    client
        .queue_refresh_result(Err(ProviderError::Unavailable {
            message: "timeout".to_string(),
        }))
        .queue_refresh_result(Ok(ProviderTokenSet {
            access_token: Some("access-2".to_string()),
            refresh_token: Some("refresh-2".to_string()),
            claims: ClaimsSource::from(Claims {
                tfp: Some("policyA".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }));

    let started = tokio::time::Instant::now();
    let session = service.refresh_token(&request, None).await.unwrap();

    // Delay before attempt 2 is one multiplier
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
    assert_eq!(client.get_refresh_history(), vec!["refresh-1", "refresh-1"]);
    assert_eq!(resolver.get_requested_policies().last().map(String::as_str), Some("policyA"));

    assert_eq!(session.token_set.access_token.as_deref(), Some("access-2"));
    let claims = session.claims.unwrap();
    assert_eq!(claims.contact_id.as_deref(), Some("contact-1"));

    let stored = service.get_credentials(&request).await.unwrap().unwrap();
    assert_eq!(stored.token_set.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (service, client, _) = create_test_service();
    client.set_default_token_set(signed_in_token_set("b2c_1a_signin"));

    let state = start_login(&service, "/").await;
    let mut login = RequestContext::new();
    let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);
    service.handle_return(&mut login, &params).await.unwrap();

    let mut request = RequestContext::with_session_cookie(session_cookie(&login));
    service.logout(&mut request).await.unwrap();

    assert_eq!(request.cookie_update(), &CookieUpdate::Clear);
    let after = RequestContext::with_session_cookie(session_cookie(&login));
    assert!(service.get_credentials(&after).await.unwrap().is_none());
}

#[tokio::test]
async fn test_backend_failure_renders_error_redirect() {
    let cache = Arc::new(MockCacheBackend::new());
    let resolver = Arc::new(MockClientResolver::new(Arc::new(create_mock_oidc_client())));
    let service = IdentityService::with_components(
        create_test_config(),
        cache.clone(),
        resolver,
        Arc::new(NoHooks),
        Arc::new(DefaultPkceGenerator::new()),
    )
    .unwrap();
    cache.set_should_fail(true);

    let request = RequestContext::new();
    let err = service
        .handle_outbound(&request, &OutboundQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Backend(_)));

    let response = service.error_response(&err, Some(&request)).await;
    match response {
        AuthResponse::Redirect { location } => {
            assert!(location.starts_with("https://app.example/error?errorMessage=IDM_BACKEND"));
            assert!(!location.contains("mock cache failure"));
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_policy_leaves_no_pending_attempt() {
    let cache = Arc::new(MockCacheBackend::new());
    let resolver = Arc::new(MockClientResolver::new(Arc::new(create_mock_oidc_client())));
    resolver.reject_policy("retired");
    let service = IdentityService::with_components(
        create_test_config(),
        cache.clone(),
        resolver,
        Arc::new(NoHooks),
        Arc::new(DefaultPkceGenerator::new()),
    )
    .unwrap();

    let query = OutboundQuery::from_pairs([("backToPath", "/"), ("policyName", "retired")]);
    let err = service
        .handle_outbound(&RequestContext::new(), &query)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::ProviderResolution { ref policy_name } if policy_name == "retired"
    ));
    assert!(cache.keys().is_empty());
}

#[tokio::test]
async fn test_concurrent_logins_are_independent() {
    let (service, client, _) = create_test_service();
    client.set_default_token_set(signed_in_token_set("b2c_1a_signin"));

    let paths = ["/a", "/b", "/c"];
    let states = futures::future::join_all(paths.iter().map(|path| start_login(&service, path))).await;

    let mut unique = states.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), paths.len());

    // Complete them in reverse order; each lands on its own path
    for (state, path) in states.iter().zip(paths.iter()).rev() {
        let mut request = RequestContext::new();
        let params = CallbackParams::from_pairs([("code", "auth-code"), ("state", state.as_str())]);
        let response = service.handle_return(&mut request, &params).await.unwrap();

        let expected = format!("https://app.example{}", path);
        assert!(response.body().unwrap().contains(&expected));
    }
}

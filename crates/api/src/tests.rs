use alloy_primitives::Address;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::{
    router::{PATH_PREPARE_BEACON_PROPOSER as PREPARE_PATH, PATH_REGISTER_VALIDATOR as REGISTER_PATH},
    test_utils::{TestHarness, REWARDS_POOL_ADDRESS, UPSTREAM_RESPONSE},
};

const BAD_FEE_RECIPIENT: &str = "0xabcf8e0d4e9587369b2301d0790347320302cc09";
const TEST_SIGNATURE: &str = "0x1b66ac1fb663c9bc59509846d6ec05345bd908eda73e670af888da41af171505cc411d61252fb6cb3fa0017b679f8bb2305b26a285fa2737f175668d0dff91cc1b66ac1fb663c9bc59509846d6ec05345bd908eda73e670af888da41af171505";

fn prepare_body(items: &[(u64, String)]) -> String {
    let items: Vec<Value> = items
        .iter()
        .map(|(index, fee_recipient)| {
            json!({
                "validator_index": index.to_string(),
                "fee_recipient": fee_recipient,
            })
        })
        .collect();
    serde_json::to_string(&items).unwrap()
}

fn register_body(items: &[(String, String)]) -> String {
    let items: Vec<Value> = items
        .iter()
        .map(|(pubkey, fee_recipient)| {
            json!({
                "message": {
                    "gas_limit": "1",
                    "timestamp": "1",
                    "pubkey": pubkey,
                    "fee_recipient": fee_recipient,
                },
                "signature": TEST_SIGNATURE,
            })
        })
        .collect();
    serde_json::to_string(&items).unwrap()
}

fn lower_hex(address: Address) -> String {
    format!("{address:#x}")
}

async fn get(harness: &TestHarness, path: &str, auth: Option<&(String, String)>) -> reqwest::Response {
    let mut request = harness.client.get(harness.url(path));
    if let Some((username, password)) = auth {
        request = request.basic_auth(username, Some(password));
    }
    request.send().await.unwrap()
}

async fn post(
    harness: &TestHarness,
    path: &str,
    auth: &(String, String),
    body: String,
) -> reqwest::Response {
    harness
        .client
        .post(harness.url(path))
        .basic_auth(&auth.0, Some(&auth.1))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn missing_auth_is_unauthorized() {
    let harness = TestHarness::spawn(true).await;

    let response = get(&harness, "/", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn tampered_password_is_unauthorized() {
    let harness = TestHarness::spawn(true).await;

    let (username, password) = harness.valid_auth(false);
    let response = get(&harness, "/", Some(&(username, password.to_lowercase()))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn expired_credentials_are_unauthorized() {
    let harness = TestHarness::spawn(true).await;

    let node = harness.state.node_addresses[0];
    let ac = harness.cm.create(
        guard_common::utils::utcnow_sec() - 7200,
        node,
        guard_credentials::OperatorType::Pool,
    );
    let auth = (ac.encode_username(), ac.encode_password());
    let response = get(&harness, "/", Some(&auth)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn valid_pool_credential_passes_through() {
    let harness = TestHarness::spawn(true).await;

    let auth = harness.valid_auth(false);
    let response = get(&harness, "/", Some(&auth)).await;
    assert_eq!(response.status(), StatusCode::OK);
    // Credentials are stripped before the request reaches the beacon.
    assert_eq!(response.headers()["x-saw-authorization"], "false");
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn valid_solo_credential_passes_through() {
    let harness = TestHarness::spawn(true).await;

    let auth = harness.valid_auth(true);
    let response = get(&harness, "/", Some(&auth)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn solo_credential_backs_off_when_disabled() {
    let harness = TestHarness::spawn(false).await;

    let auth = harness.valid_auth(true);
    let response = get(&harness, "/", Some(&auth)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "300");
    assert_eq!(harness.upstream_hits(), 0);

    // Pool credentials are unaffected by the gate.
    let auth = harness.valid_auth(false);
    let response = get(&harness, "/", Some(&auth)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn prepare_unknown_index_is_bad_request() {
    let harness = TestHarness::spawn(true).await;

    let auth = harness.valid_auth(true);
    let body = prepare_body(&[(1010101, BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.starts_with("unknown validator index"));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn prepare_solo_validator_chooses_its_recipient() {
    let harness = TestHarness::spawn(true).await;

    let solo = harness.state.solo_with_execution_credentials();
    let fee_recipient = lower_hex(solo.withdrawal_address().unwrap());

    let auth = harness.valid_auth(true);
    let body = prepare_body(&[(solo.index, fee_recipient)]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn prepare_solo_without_execution_credentials_is_forbidden() {
    let harness = TestHarness::spawn(true).await;

    let solo = harness.state.solo_with_bls_credentials();

    let auth = harness.valid_auth(true);
    let body = prepare_body(&[(solo.index, BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(error_message(response).await.starts_with("attempting to set fee recipient"));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn prepare_pool_credential_accepts_expected_and_rewards_pool() {
    let harness = TestHarness::spawn(true).await;

    let (first, first_info) = harness.state.pool_members[0];
    let (second, _) = harness.state.pool_members[1];

    let auth = harness.valid_auth(false);
    let body = prepare_body(&[
        (first.index, lower_hex(first_info.expected_fee_recipient)),
        (second.index, REWARDS_POOL_ADDRESS.to_string()),
    ]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn prepare_pool_mismatch_is_a_conflict_and_atomic() {
    let harness = TestHarness::spawn(true).await;

    let (first, first_info) = harness.state.pool_members[0];
    let (second, _) = harness.state.pool_members[1];

    let auth = harness.valid_auth(false);
    let body = prepare_body(&[
        (first.index, lower_hex(first_info.expected_fee_recipient)),
        (second.index, BAD_FEE_RECIPIENT.to_string()),
    ]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(error_message(response).await.starts_with(
        "actual fee recipient 0xabcf8e0d4e9587369b2301d0790347320302cc09 \
         didn't match expected fee recipient"
    ));
    // The whole request is rejected, nothing reaches the beacon.
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn prepare_solo_credential_on_pool_member_is_forbidden() {
    let harness = TestHarness::spawn(true).await;

    let (member, info) = harness.state.pool_members[0];

    let auth = harness.valid_auth(true);
    let body = prepare_body(&[(member.index, lower_hex(info.expected_fee_recipient))]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(error_message(response).await.starts_with("attempting to set fee recipient"));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn prepare_pool_credential_on_solo_validator_is_forbidden() {
    let harness = TestHarness::spawn(true).await;

    let solo = harness.state.solo_with_execution_credentials();

    let auth = harness.valid_auth(false);
    let body = prepare_body(&[(solo.index, BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, PREPARE_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(error_message(response).await.starts_with("attempting to set fee recipient"));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn prepare_rejects_bodies_that_do_not_parse() {
    let harness = TestHarness::spawn(true).await;

    let auth = harness.valid_auth(false);
    let response = post(&harness, PREPARE_PATH, &auth, "not json".to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn register_solo_validator_is_forwarded() {
    let harness = TestHarness::spawn(true).await;

    let solo = harness.state.solo_with_execution_credentials();

    let auth = harness.valid_auth(true);
    let body = register_body(&[(solo.pubkey.to_string(), BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, REGISTER_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn register_malformed_pubkey_reports_the_parser_message() {
    let harness = TestHarness::spawn(true).await;

    let auth = harness.valid_auth(true);
    let body = register_body(&[("bob".to_string(), BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, REGISTER_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.starts_with(
        "error parsing pubkey from request body: \
         Invalid validator public key hex string bob: invalid length 3"
    ));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn register_pool_credential_accepts_expected_and_rewards_pool() {
    let harness = TestHarness::spawn(true).await;

    let (first, first_info) = harness.state.pool_members[0];
    let (second, _) = harness.state.pool_members[1];

    let auth = harness.valid_auth(false);
    let body = register_body(&[
        (first.pubkey.to_string(), lower_hex(first_info.expected_fee_recipient)),
        (second.pubkey.to_string(), REWARDS_POOL_ADDRESS.to_string()),
    ]);
    let response = post(&harness, REGISTER_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), UPSTREAM_RESPONSE);
}

#[tokio::test]
async fn register_cheating_fee_recipient_is_a_conflict() {
    let harness = TestHarness::spawn(true).await;

    let (first, first_info) = harness.state.pool_members[0];
    let (second, _) = harness.state.pool_members[1];

    // Solo credential fronting for pool validators, second one redirecting
    // rewards to an address it picked.
    let auth = harness.valid_auth(true);
    let body = register_body(&[
        (first.pubkey.to_string(), lower_hex(first_info.expected_fee_recipient)),
        (second.pubkey.to_string(), BAD_FEE_RECIPIENT.to_string()),
    ]);
    let response = post(&harness, REGISTER_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(error_message(response).await.starts_with(
        "actual fee recipient 0xabcf8e0d4e9587369b2301d0790347320302cc09 \
         didn't match expected fee recipient"
    ));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn register_unknown_pubkey_is_bad_request() {
    let harness = TestHarness::spawn(true).await;

    let mut bytes = [0u8; guard_state::PUBKEY_LEN];
    bytes[0] = 0xff;
    let unknown = guard_state::ValidatorPubkey::new(bytes);

    let auth = harness.valid_auth(true);
    let body = register_body(&[(unknown.to_string(), BAD_FEE_RECIPIENT.to_string())]);
    let response = post(&harness, REGISTER_PATH, &auth, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.starts_with("unknown validator"));
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn guarded_paths_require_auth_too() {
    let harness = TestHarness::spawn(true).await;

    let response = harness
        .client
        .post(harness.url(PREPARE_PATH))
        .header("content-type", "application/json")
        .body(prepare_body(&[(1, BAD_FEE_RECIPIENT.to_string())]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.upstream_hits(), 0);
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let harness = TestHarness::spawn_unreachable_upstream().await;

    let auth = harness.valid_auth(false);
    let response = get(&harness, "/", Some(&auth)).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_message(response).await, "upstream unavailable");
}

#[tokio::test]
async fn stalled_upstream_is_a_gateway_timeout() {
    let harness = TestHarness::spawn_stalled_upstream().await;

    let auth = harness.valid_auth(false);
    let response = get(&harness, "/", Some(&auth)).await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_message(response).await, "upstream timed out");
}

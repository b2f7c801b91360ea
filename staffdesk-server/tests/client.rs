use serde_json::json;
use staffdesk_engine::{fulfillment::Action, ContractError};
use staffdesk_server::{ApiError, BackendClient};
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_file(true)
        .with_line_number(true)
        .without_time()
        .with_test_writer()
        .try_init();
}

fn order_detail(status: &str) -> serde_json::Value {
    json!({
        "id": 12,
        "status": status,
        "createdAt": "2026-04-01T12:00:00Z",
        "totalAmount": "440.00",
        "shippingCharge": "40.00",
        "codVerification": {"id": 3, "status": "PENDING"},
        "items": [{"id": 1, "quantity": 1, "unitPrice": "400.00"}]
    })
}

#[tokio::test]
async fn sends_bearer_token_and_decodes_orders() {
    init_logging();
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/seller-orders"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [{
                "id": 1,
                "status": "PENDING",
                "totalAmount": 250,
                "shippingCharge": "0",
                "shippingTatMin": 2,
                "shippingTatMax": 4,
                "order": {"user": {"name": "Kiran", "phone": "9000000000"}}
            }]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let client = BackendClient::new(backend.uri()).with_token("s3cret");
    let page = client.seller_orders(2, 5).await.unwrap();
    assert_eq!(page.orders.len(), 1);
    assert_eq!(page.orders[0].order.user.name, "Kiran");
    assert_eq!(page.orders[0].total_amount.rupees(), "₹250.00");
}

#[tokio::test]
async fn missing_orders_key_is_an_empty_queue() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/seller-orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&backend)
        .await;

    let client = BackendClient::new(backend.uri()).with_token("t");
    assert!(client.seller_orders(1, 20).await.unwrap().orders.is_empty());
}

#[tokio::test]
async fn surfaces_backend_message() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/employee/login"))
        .and(body_json(json!({"email": "ops@example.com", "password": "nope"})))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Account locked"})),
        )
        .mount(&backend)
        .await;

    let err = BackendClient::new(backend.uri())
        .login("ops@example.com", "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
    assert_eq!(err.user_message(), "Account locked");
}

#[tokio::test]
async fn falls_back_when_backend_gives_no_message() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/employee/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("<html>nope</html>"))
        .mount(&backend)
        .await;

    let err = BackendClient::new(backend.uri())
        .login("ops@example.com", "bad")
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message(), "Invalid credentials");
}

#[tokio::test]
async fn rejects_responses_that_break_the_contract() {
    let backend = MockServer::start().await;
    let mut negative = order_detail("PENDING");
    negative["totalAmount"] = json!("-1.00");
    Mock::given(method("GET"))
        .and(path("/api/admin/seller-orders/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(negative))
        .mount(&backend)
        .await;

    let err = BackendClient::new(backend.uri())
        .with_token("t")
        .seller_order(12)
        .await
        .unwrap_err();
    match err {
        ApiError::Contract(ContractError::Negative { id, field, .. }) => {
            assert_eq!(id, 12);
            assert_eq!(field, "totalAmount");
        }
        other => panic!("expected a contract error, got {:?}", other),
    }
}

#[tokio::test]
async fn confirm_cod_carries_remarks() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/admin/fulfillment/confirm-cod/12"))
        .and(body_json(json!({"remarks": "called buyer"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/admin/fulfillment/mark-packed/12"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    let client = BackendClient::new(backend.uri()).with_token("t");
    client
        .fulfill(12, Action::ConfirmCod, Some("called buyer"))
        .await
        .unwrap();

    let err = client.fulfill(12, Action::MarkPacked, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 500, .. }));
    assert_eq!(err.user_message(), "Failed to mark packed");
}

#[tokio::test]
async fn campaign_moderation_round() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/employee/campaigns/pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 4, "name": "Festive", "status": "PENDING", "totalCredits": 100}
        ])))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/employee/campaigns/4/reject"))
        .and(body_json(json!({"reason": "misleading banner"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;

    let client = BackendClient::new(backend.uri()).with_token("t");
    let pending = client.pending_campaigns().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Festive");
    client.reject_campaign(4, "misleading banner").await.unwrap();
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    // Nothing listens on the discard port.
    let client = BackendClient::new("http://127.0.0.1:9").with_token("t");
    let err = client.seller_order(1).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport { .. }));
    assert!(!err.is_unauthorized());
}

//! API tests for companies, orders and offers.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`makerdb migrate`)
//! - The API server running (`cargo run -p makerdb-server`)
//!
//! Run with: cargo test -p makerdb-integration-tests -- --ignored

use makerdb_integration_tests::{TestContext, unique};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_company_roles_are_enforced() {
    let ctx = TestContext::new();

    let maker = ctx
        .create(
            "/companies",
            &json!({ "name": unique("maker"), "is_manufacturer": true }),
        )
        .await;
    let shop = ctx
        .create("/companies", &json!({ "name": unique("shop"), "is_vendor": true }))
        .await;

    // A manufacturer cannot be ordered from.
    let (status, body) = ctx
        .post(
            "/procurement/orders",
            &json!({ "vendor_id": maker, "number": unique("PO") }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.contains("not a vendor")));

    // A vendor cannot be a part's manufacturer.
    let (status, _) = ctx
        .post(
            "/parts",
            &json!({ "name": unique("opamp"), "manufacturer_id": shop }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .post(
            "/procurement/offers",
            &json!({ "vendor_id": maker, "sku": "X-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let part = ctx
        .create(
            "/parts",
            &json!({ "name": unique("opamp"), "manufacturer_id": maker }),
        )
        .await;
    let order = ctx
        .create(
            "/procurement/orders",
            &json!({ "vendor_id": shop, "number": unique("PO") }),
        )
        .await;

    ctx.delete(&format!("/procurement/orders/{order}")).await;
    ctx.delete(&format!("/parts/{part}")).await;
    ctx.delete(&format!("/companies/{maker}")).await;
    ctx.delete(&format!("/companies/{shop}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_order_is_received_into_stock_once() {
    let ctx = TestContext::new();

    let shop = ctx
        .create("/companies", &json!({ "name": unique("shop"), "is_vendor": true }))
        .await;
    let dock = ctx
        .create("/inventory/locations", &json!({ "name": unique("dock") }))
        .await;
    let part = ctx.create("/parts", &json!({ "name": unique("diode") })).await;
    let number = unique("PO");
    let order = ctx
        .create(
            "/procurement/orders",
            &json!({ "vendor_id": shop, "number": number, "status": "ordered" }),
        )
        .await;

    let receipt = json!({
        "storage_id": dock,
        "lines": [{ "part_id": part, "quantity": 25, "price_unit": "0.12", "currency": "USD" }]
    });
    let (status, received) = ctx
        .post(&format!("/procurement/orders/{order}/receive"), &receipt)
        .await;
    assert_eq!(status, StatusCode::OK, "receive failed: {received}");
    assert_eq!(received["order"]["status"], "received");
    assert_eq!(received["lot"]["name"], number);
    assert_eq!(received["stock"][0]["quantity"], 25);
    assert_eq!(received["stock"][0]["status"], "available");

    let (_, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(stock["total_on_hand"], 25);

    let (status, _) = ctx
        .post(&format!("/procurement/orders/{order}/receive"), &receipt)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(stock["total_on_hand"], 25);

    ctx.delete(&format!("/parts/{part}")).await;
    ctx.delete(&format!("/inventory/locations/{dock}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_receive_honours_mandatory_default_storage() {
    let ctx = TestContext::new();

    let shop = ctx
        .create("/companies", &json!({ "name": unique("shop"), "is_vendor": true }))
        .await;
    let home = ctx
        .create("/inventory/locations", &json!({ "name": unique("fridge") }))
        .await;
    let dock = ctx
        .create("/inventory/locations", &json!({ "name": unique("dock") }))
        .await;
    let part = ctx
        .create(
            "/parts",
            &json!({
                "name": unique("solder paste"),
                "default_storage_id": home,
                "is_default_storage_mandatory": true
            }),
        )
        .await;
    let order = ctx
        .create(
            "/procurement/orders",
            &json!({ "vendor_id": shop, "number": unique("PO") }),
        )
        .await;

    let (status, body) = ctx
        .post(
            &format!("/procurement/orders/{order}/receive"),
            &json!({ "storage_id": dock, "lines": [{ "part_id": part, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.contains("default location")));

    // Nothing was booked and the order can still be received.
    let (_, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(stock["total_on_hand"], 0);
    let (_, fetched) = ctx.get(&format!("/procurement/orders/{order}")).await;
    assert_ne!(fetched["status"], "received");

    let (status, _) = ctx
        .post(
            &format!("/procurement/orders/{order}/receive"),
            &json!({ "storage_id": home, "lines": [{ "part_id": part, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    ctx.delete(&format!("/parts/{part}")).await;
    ctx.delete(&format!("/inventory/locations/{dock}")).await;
    ctx.delete(&format!("/inventory/locations/{home}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_offer_quote_rounds_and_stays_in_one_currency() {
    let ctx = TestContext::new();

    let shop = ctx
        .create("/companies", &json!({ "name": unique("shop"), "is_vendor": true }))
        .await;
    let offer = ctx
        .create(
            "/procurement/offers",
            &json!({
                "vendor_id": shop,
                "sku": unique("SKU"),
                "moq": 10,
                "order_multiple": 5,
                "prices": [
                    { "currency": "USD", "discounts": [
                        { "qty": 1, "amount": "0.10" },
                        { "qty": 100, "amount": "0.04" }
                    ]},
                    { "currency": "EUR", "discounts": [{ "qty": 1, "amount": "0.01" }] }
                ]
            }),
        )
        .await;

    // Mixed currencies need an explicit choice.
    let (status, body) = ctx
        .get(&format!("/procurement/offers/{offer}/quote?quantity=7"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.starts_with("currency")));

    let (status, body) = ctx
        .get(&format!("/procurement/offers/{offer}/quote?quantity=7&currency=USD"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"]["order_quantity"], 10);
    assert_eq!(body["quote"]["currency"], "USD");

    let (status, body) = ctx
        .get(&format!("/procurement/offers/{offer}/quote?quantity=7&currency=GBP"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["quote"].is_null());

    let (status, _) = ctx
        .get(&format!("/procurement/offers/{offer}/quote?quantity=0&currency=USD"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.delete(&format!("/procurement/offers/{offer}")).await;
    ctx.delete(&format!("/companies/{shop}")).await;
}

//! API tests for parts, locations and stock.
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
async fn test_health_and_readiness() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = ctx.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["search_ready"].is_boolean());
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_part_crud_and_not_found() {
    let ctx = TestContext::new();
    let name = unique("resistor");

    let id = ctx
        .create("/parts", &json!({ "name": name, "mpn": "RC0603FR-0710KL" }))
        .await;

    let (status, part) = ctx.get(&format!("/parts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(part["name"], name);
    assert_eq!(part["part_type"], "local");
    assert_eq!(part["total_stock"], 0);

    let (status, part) = ctx
        .put(&format!("/parts/{id}"), &json!({ "description": "10k 1%" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(part["description"], "10k 1%");
    assert_eq!(part["name"], name);

    assert_eq!(ctx.delete(&format!("/parts/{id}")).await, StatusCode::NO_CONTENT);

    let (status, body) = ctx.get(&format!("/parts/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_invalid_part_input_is_rejected() {
    let ctx = TestContext::new();

    let (status, body) = ctx.post("/parts", &json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.starts_with("name")));

    let (status, _) = ctx
        .post("/parts", &json!({ "name": unique("bad"), "part_type": "gizmo" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_stock_adjust_move_and_levels() {
    let ctx = TestContext::new();

    let shelf = ctx
        .create("/inventory/locations", &json!({ "name": unique("shelf") }))
        .await;
    let bin = ctx
        .create(
            "/inventory/locations",
            &json!({ "name": unique("bin"), "parent_id": shelf }),
        )
        .await;
    let part = ctx
        .create(
            "/parts",
            &json!({ "name": unique("led"), "low_stock_threshold": 5 }),
        )
        .await;

    let entry = ctx
        .create(
            "/inventory/stock",
            &json!({ "part_id": part, "storage_id": shelf, "quantity": 10 }),
        )
        .await;

    let (status, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["total_on_hand"], 10);
    assert_eq!(stock["level"], "ok");

    // Driving the quantity below zero is rejected.
    let (status, _) = ctx
        .post(&format!("/inventory/stock/{entry}/adjust"), &json!({ "delta": -11 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, adjusted) = ctx
        .post(&format!("/inventory/stock/{entry}/adjust"), &json!({ "delta": -6 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjusted["quantity"], 4);

    let (_, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(stock["level"], "low");

    let (status, moved) = ctx
        .post(
            &format!("/inventory/stock/{entry}/move"),
            &json!({ "storage_id": bin, "quantity": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["source"]["quantity"], 1);
    assert_eq!(moved["destination"]["quantity"], 3);

    let (_, stock) = ctx.get(&format!("/parts/{part}/stock")).await;
    assert_eq!(stock["total_on_hand"], 4);

    // A location holding stock cannot be deleted.
    assert_eq!(
        ctx.delete(&format!("/inventory/locations/{bin}")).await,
        StatusCode::CONFLICT
    );

    ctx.delete(&format!("/parts/{part}")).await;
    ctx.delete(&format!("/inventory/locations/{bin}")).await;
    ctx.delete(&format!("/inventory/locations/{shelf}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_location_cannot_move_under_itself() {
    let ctx = TestContext::new();

    let room = ctx
        .create("/inventory/locations", &json!({ "name": unique("room") }))
        .await;
    let cabinet = ctx
        .create(
            "/inventory/locations",
            &json!({ "name": unique("cabinet"), "parent_id": room }),
        )
        .await;
    let drawer = ctx
        .create(
            "/inventory/locations",
            &json!({ "name": unique("drawer"), "parent_id": cabinet }),
        )
        .await;

    let (status, _) = ctx
        .put(&format!("/inventory/locations/{room}"), &json!({ "parent_id": room }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .put(&format!("/inventory/locations/{room}"), &json!({ "parent_id": drawer }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.contains("under itself")));

    let (_, location) = ctx.get(&format!("/inventory/locations/{room}")).await;
    assert!(location["parent_id"].is_null());

    ctx.delete(&format!("/inventory/locations/{drawer}")).await;
    ctx.delete(&format!("/inventory/locations/{cabinet}")).await;
    ctx.delete(&format!("/inventory/locations/{room}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_occupancy_counts_only_on_hand_stock() {
    let ctx = TestContext::new();

    let bin = ctx
        .create("/inventory/locations", &json!({ "name": unique("bin") }))
        .await;
    let resistor = ctx.create("/parts", &json!({ "name": unique("resistor") })).await;
    let capacitor = ctx.create("/parts", &json!({ "name": unique("capacitor") })).await;

    let ordered = ctx
        .create(
            "/inventory/stock",
            &json!({
                "part_id": resistor,
                "storage_id": bin,
                "quantity": 50,
                "status": "ordered"
            }),
        )
        .await;

    let row = ctx
        .find_listed("/inventory/locations/occupancy", "storage_id", &bin)
        .await
        .expect("location is listed");
    assert_eq!(row["part_count"], 0);
    assert_eq!(row["total_quantity"], 0);
    assert_eq!(row["occupancy"], "empty");

    ctx.create(
        "/inventory/stock",
        &json!({ "part_id": resistor, "storage_id": bin, "quantity": 5, "status": "available" }),
    )
    .await;
    ctx.create(
        "/inventory/stock",
        &json!({ "part_id": capacitor, "storage_id": bin, "quantity": 2 }),
    )
    .await;

    let row = ctx
        .find_listed("/inventory/locations/occupancy", "storage_id", &bin)
        .await
        .expect("location is listed");
    assert_eq!(row["part_count"], 2);
    assert_eq!(row["total_quantity"], 7);
    assert_eq!(row["occupancy"], "mixed");

    ctx.delete(&format!("/inventory/stock/{ordered}")).await;
    ctx.delete(&format!("/parts/{resistor}")).await;
    ctx.delete(&format!("/parts/{capacitor}")).await;
    ctx.delete(&format!("/inventory/locations/{bin}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_low_stock_lists_parts_at_or_below_threshold() {
    let ctx = TestContext::new();

    let shelf = ctx
        .create("/inventory/locations", &json!({ "name": unique("shelf") }))
        .await;
    let low = ctx
        .create("/parts", &json!({ "name": unique("low"), "low_stock_threshold": 10 }))
        .await;
    let plenty = ctx
        .create("/parts", &json!({ "name": unique("plenty"), "low_stock_threshold": 10 }))
        .await;
    let untracked = ctx.create("/parts", &json!({ "name": unique("untracked") })).await;

    for (part, quantity) in [(&low, 10), (&plenty, 11)] {
        ctx.create(
            "/inventory/stock",
            &json!({ "part_id": part, "storage_id": shelf, "quantity": quantity }),
        )
        .await;
    }
    // Stock on order does not lift a part out of low stock.
    ctx.create(
        "/inventory/stock",
        &json!({ "part_id": low, "storage_id": shelf, "quantity": 500, "status": "ordered" }),
    )
    .await;

    let listed = ctx
        .find_listed("/parts/low-stock", "id", &low)
        .await
        .expect("low part is listed");
    assert_eq!(listed["total_stock"], 10);
    assert!(ctx.find_listed("/parts/low-stock", "id", &plenty).await.is_none());
    assert!(ctx.find_listed("/parts/low-stock", "id", &untracked).await.is_none());

    for part in [&low, &plenty, &untracked] {
        ctx.delete(&format!("/parts/{part}")).await;
    }
    ctx.delete(&format!("/inventory/locations/{shelf}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_search_finds_new_part_by_mpn_fragment() {
    let ctx = TestContext::new();
    let mpn = format!("ZX{}", uuid::Uuid::new_v4().simple());
    let fragment = mpn.get(2..10).expect("mpn is long enough").to_string();

    let part = ctx
        .create("/parts", &json!({ "name": unique("search"), "mpn": mpn }))
        .await;

    // Index updates are applied asynchronously.
    let mut found = false;
    for _ in 0..20 {
        let (status, body) = ctx.get(&format!("/search/parts?q={fragment}")).await;
        assert_eq!(status, StatusCode::OK);
        if body["hits"]
            .as_array()
            .is_some_and(|hits| hits.iter().any(|h| h["id"] == part.as_str()))
        {
            found = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(found, "part never appeared in search results");

    ctx.delete(&format!("/parts/{part}")).await;
}

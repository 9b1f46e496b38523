//! API tests for projects, BOMs and build availability.
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
async fn test_build_availability_counts_substitutes() {
    let ctx = TestContext::new();

    let location = ctx
        .create("/inventory/locations", &json!({ "name": unique("bom-bin") }))
        .await;
    let primary = ctx.create("/parts", &json!({ "name": unique("mcu") })).await;
    let substitute = ctx
        .create("/parts", &json!({ "name": unique("mcu-alt") }))
        .await;

    for (part, quantity) in [(&primary, 4), (&substitute, 2)] {
        ctx.create(
            "/inventory/stock",
            &json!({ "part_id": part, "storage_id": location, "quantity": quantity }),
        )
        .await;
    }

    let project = ctx
        .create("/projects", &json!({ "name": unique("board") }))
        .await;
    let (status, item) = ctx
        .post(
            &format!("/projects/{project}/bom"),
            &json!({
                "part_id": primary,
                "quantity": 2,
                "designators": "U1, U2",
                "substitute_ids": [substitute],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["part_id"], primary.as_str());

    let (status, report) = ctx
        .get(&format!("/projects/{project}/availability?builds=3"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["can_build"], true);
    assert_eq!(report["max_buildable"], 3);
    assert_eq!(report["lines"][0]["required"], 6);

    let (_, report) = ctx
        .get(&format!("/projects/{project}/availability?builds=4"))
        .await;
    assert_eq!(report["can_build"], false);
    assert_eq!(report["lines"][0]["shortfall"], 2);

    let (status, _) = ctx
        .get(&format!("/projects/{project}/availability?builds=0"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.delete(&format!("/projects/{project}")).await;
    ctx.delete(&format!("/parts/{primary}")).await;
    ctx.delete(&format!("/parts/{substitute}")).await;
    ctx.delete(&format!("/inventory/locations/{location}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_build_availability_shares_stock_between_lines() {
    let ctx = TestContext::new();

    let location = ctx
        .create("/inventory/locations", &json!({ "name": unique("bom-bin") }))
        .await;
    let part = ctx.create("/parts", &json!({ "name": unique("cap") })).await;
    ctx.create(
        "/inventory/stock",
        &json!({ "part_id": part, "storage_id": location, "quantity": 6 }),
    )
    .await;

    let project = ctx
        .create("/projects", &json!({ "name": unique("board") }))
        .await;
    for designators in ["C1-C5", "C6-C10"] {
        let (status, _) = ctx
            .post(
                &format!("/projects/{project}/bom"),
                &json!({ "part_id": part, "quantity": 5, "designators": designators }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, report) = ctx
        .get(&format!("/projects/{project}/availability?builds=1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["can_build"], false);
    assert_eq!(report["max_buildable"], 0);
    assert_eq!(report["lines"][0]["shortfall"], 0);
    assert_eq!(report["lines"][1]["shortfall"], 4);

    ctx.delete(&format!("/projects/{project}")).await;
    ctx.delete(&format!("/parts/{part}")).await;
    ctx.delete(&format!("/inventory/locations/{location}")).await;
}

#[tokio::test]
#[ignore = "Requires running server and PostgreSQL"]
async fn test_dashboard_reflects_new_project() {
    let ctx = TestContext::new();

    let (status, before) = ctx.get("/dashboard/summary").await;
    assert_eq!(status, StatusCode::OK);

    let project = ctx
        .create(
            "/projects",
            &json!({ "name": unique("dash"), "status": "active" }),
        )
        .await;

    let (_, after) = ctx.get("/dashboard/summary").await;
    assert_eq!(
        after["activeProjects"].as_i64(),
        before["activeProjects"].as_i64().map(|n| n + 1)
    );

    let (status, stats) = ctx.get("/dashboard/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["valueTrends"].as_array().map(Vec::len), Some(7));

    ctx.delete(&format!("/projects/{project}")).await;
}

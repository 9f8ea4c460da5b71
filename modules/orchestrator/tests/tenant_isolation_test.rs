//! Rows never leak across tenants. Two tenants each reserve the same logical
//! influencer id space; neither's repo lookups should ever surface the
//! other's rows.

mod common;

use serial_test::serial;

use uuid::Uuid;

use orchestrator::repos::{influencer_repo, run_repo};

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn run_lookup_is_scoped_to_its_tenant() {
    let pool = common::get_test_pool().await;
    let tenant_a = common::new_tenant();
    let tenant_b = common::new_tenant();
    let run_id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    run_repo::insert_running(&mut tx, run_id, tenant_a, "trace-a").await.unwrap();
    tx.commit().await.unwrap();

    let found_for_owner = run_repo::find_by_id(&pool, tenant_a, run_id).await.unwrap();
    assert!(found_for_owner.is_some());

    let found_for_other = run_repo::find_by_id(&pool, tenant_b, run_id).await.unwrap();
    assert!(found_for_other.is_none(), "a run created for tenant_a must not be visible to tenant_b");
}

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn influencer_lookup_is_scoped_to_its_tenant() {
    let pool = common::get_test_pool().await;
    let tenant_a = common::new_tenant();
    let tenant_b = common::new_tenant();
    let influencer_id = Uuid::new_v4();

    sqlx::query("INSERT INTO influencers (id, tenant_id, canonical_name) VALUES ($1, $2, 'Scoped')")
        .bind(influencer_id)
        .bind(tenant_a)
        .execute(&pool)
        .await
        .unwrap();

    assert!(influencer_repo::find_by_id(&pool, tenant_a, influencer_id).await.unwrap().is_some());
    assert!(influencer_repo::find_by_id(&pool, tenant_b, influencer_id).await.unwrap().is_none());
}

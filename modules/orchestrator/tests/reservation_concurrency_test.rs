//! Concurrent reservation attempts for the same influencer never both
//! succeed. Two transactions race on an overlapping candidate list; the
//! `FOR UPDATE OF i SKIP LOCKED` CTE must let exactly one claim the row.

mod common;

use serial_test::serial;

use uuid::Uuid;

use orchestrator::queries::reserve_top_influencers::reserve_candidates;

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn only_one_concurrent_reservation_wins_per_influencer() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let influencer_id = Uuid::new_v4();

    sqlx::query("INSERT INTO influencers (id, tenant_id, canonical_name) VALUES ($1, $2, 'Contested')")
        .bind(influencer_id)
        .bind(tenant_id)
        .execute(&pool)
        .await
        .unwrap();

    let candidates = vec![influencer_id];
    let duration = chrono::Duration::hours(1);

    let pool_a = pool.clone();
    let pool_b = pool.clone();
    let candidates_a = candidates.clone();
    let candidates_b = candidates.clone();

    let task_a = tokio::spawn(async move {
        let mut tx = pool_a.begin().await.unwrap();
        let reserved = reserve_candidates(&mut tx, tenant_id, &candidates_a, duration, "race-a")
            .await
            .unwrap();
        tx.commit().await.unwrap();
        reserved
    });
    let task_b = tokio::spawn(async move {
        let mut tx = pool_b.begin().await.unwrap();
        let reserved = reserve_candidates(&mut tx, tenant_id, &candidates_b, duration, "race-b")
            .await
            .unwrap();
        tx.commit().await.unwrap();
        reserved
    });

    let (reserved_a, reserved_b) = tokio::join!(task_a, task_b);
    let total_wins = reserved_a.unwrap().len() + reserved_b.unwrap().len();
    assert_eq!(total_wins, 1, "exactly one of the two racing transactions reserves the influencer");

    let active = sqlx::query_scalar::<_, i64>(
        "SELECT count(*) FROM reservations WHERE tenant_id = $1 AND influencer_id = $2 AND reserved_until > now()",
    )
    .bind(tenant_id)
    .bind(influencer_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
#[serial]
async fn reserving_an_empty_candidate_list_writes_nothing() {
    let pool = common::get_test_pool().await;
    let tenant_id = common::new_tenant();
    let mut tx = pool.begin().await.unwrap();
    let reserved = reserve_candidates(&mut tx, tenant_id, &[], chrono::Duration::hours(1), "noop")
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(reserved.is_empty());
}

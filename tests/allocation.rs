mod common;

use std::sync::Arc;

use anyhow::Result;

use common::{instance, TestHarness};
use messaging_gateway::services::allocator::AllocatorService;
use messaging_gateway::services::{GatewayError, SoftFailure};

fn allocator(harness: &TestHarness, capacity: i32) -> AllocatorService {
    AllocatorService::new(
        Arc::new(harness.store.clone()),
        Arc::new(harness.directory.clone()),
        harness.pool.registry.clone(),
        capacity,
        "http://gateway.test".to_string(),
    )
}

#[tokio::test]
async fn allocating_twice_is_idempotent() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 45), instance(2, 50), instance(3, 41)], &["t1"]);
    let allocator = allocator(&harness, 100);

    let first = allocator.allocate("t1").await?;
    assert_eq!(first.binding.instance_id, 3, "lowest occupancy wins");
    assert_eq!(harness.store.instance_count(3).await, Some(42));

    let second = allocator.allocate("t1").await?;
    assert_eq!(second.binding.instance_id, 3);
    assert_eq!(
        harness.store.instance_count(3).await,
        Some(42),
        "re-allocation must not count twice"
    );
    Ok(())
}

#[tokio::test]
async fn lowest_id_breaks_occupancy_ties() -> Result<()> {
    let harness = TestHarness::new(vec![instance(2, 7), instance(5, 7)], &["t1"]);
    let allocator = allocator(&harness, 100);

    let allocation = allocator.allocate("t1").await?;
    assert_eq!(allocation.binding.instance_id, 2);
    Ok(())
}

#[tokio::test]
async fn unknown_tenant_is_rejected_before_placement() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 0)], &["t1"]);
    let allocator = allocator(&harness, 100);

    let err = allocator.allocate("ghost").await.unwrap_err();
    assert!(matches!(err, GatewayError::TenantNotFound(ref t) if t == "ghost"));
    assert_eq!(harness.store.instance_count(1).await, Some(0));
    Ok(())
}

#[tokio::test]
async fn saturated_pool_reports_capacity_exhausted() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 0)], &["t1", "t2", "t3"]);
    let allocator = allocator(&harness, 2);

    allocator.allocate("t1").await?;
    allocator.allocate("t2").await?;
    let err = allocator.allocate("t3").await.unwrap_err();
    assert!(matches!(err, GatewayError::CapacityExhausted));
    assert_eq!(
        harness.store.instance_count(1).await,
        Some(2),
        "count never exceeds capacity"
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_allocations_never_exceed_capacity() -> Result<()> {
    let tenants: Vec<String> = (1..=20).map(|n| format!("t{n}")).collect();
    let tenant_refs: Vec<&str> = tenants.iter().map(String::as_str).collect();
    let harness = TestHarness::new(vec![instance(1, 0), instance(2, 0)], &tenant_refs);
    let allocator = Arc::new(allocator(&harness, 5));

    let handles: Vec<_> = tenants
        .into_iter()
        .map(|tenant| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.allocate(&tenant).await })
        })
        .collect();

    let mut placed = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => placed += 1,
            Err(GatewayError::CapacityExhausted) => exhausted += 1,
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(placed, 10, "every slot fills, none twice");
    assert_eq!(exhausted, 10);
    for id in [1, 2] {
        let count = harness.store.instance_count(id).await.unwrap();
        assert!(count <= 5, "instance {id} over capacity at {count}");
    }
    Ok(())
}

#[tokio::test]
async fn release_restores_count_and_is_idempotent() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 10)], &["t1"]);
    let allocator = allocator(&harness, 100);

    allocator.allocate("t1").await?;
    assert_eq!(harness.store.instance_count(1).await, Some(11));

    allocator.release("t1").await?;
    assert_eq!(harness.store.instance_count(1).await, Some(10));

    // Releasing an unbound tenant succeeds trivially.
    allocator.release("t1").await?;
    assert_eq!(harness.store.instance_count(1).await, Some(10));
    Ok(())
}

#[tokio::test]
async fn allocation_survives_webhook_config_failure() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 0)], &["t1"]);
    harness
        .pool
        .gateway(1)
        .state
        .lock()
        .unwrap()
        .webhook_config_fails = true;
    let allocator = allocator(&harness, 100);

    let allocation = allocator.allocate("t1").await?;
    assert_eq!(allocation.binding.instance_id, 1);
    assert_eq!(allocation.warnings.len(), 1);
    assert!(matches!(
        allocation.warnings[0],
        SoftFailure::WebhookConfig { instance_id: 1, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn allocation_configures_push_webhook() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 0)], &["t1"]);
    let allocator = allocator(&harness, 100);

    let allocation = allocator.allocate("t1").await?;
    assert!(allocation.warnings.is_empty());
    assert_eq!(harness.pool.gateway(1).webhook_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn occupancy_listing_reports_percentages() -> Result<()> {
    let harness = TestHarness::new(vec![instance(1, 25), instance(2, 50)], &[]);
    let allocator = allocator(&harness, 100);

    let mut occupancy = allocator.instance_occupancy().await?;
    occupancy.sort_by_key(|o| o.instance_id);
    assert_eq!(occupancy.len(), 2);
    assert_eq!(occupancy[0].tenant_count, 25);
    assert!((occupancy[0].occupancy_percent - 25.0).abs() < f64::EPSILON);
    assert!((occupancy[1].occupancy_percent - 50.0).abs() < f64::EPSILON);
    Ok(())
}

//! Contact codes and payment signatures through the wired gate.

use chrono::{Duration, Utc};
use marigold_core::Phone;
use marigold_integration_tests::{TestContext, phone, sign};
use marigold_storefront::services::VerificationError;

#[tokio::test]
async fn test_code_is_accepted_at_most_once() {
    let ctx = TestContext::new();
    let phone = phone();

    assert!(ctx.pipeline.gate.request_code(&phone).await);
    let code = ctx.notifier.last_code(&phone).unwrap();

    assert_eq!(ctx.pipeline.gate.check_code(&phone, &code).await, Ok(()));
    assert_eq!(
        ctx.pipeline.gate.check_code(&phone, &code).await,
        Err(VerificationError::NotFound)
    );
    assert!(ctx.pipeline.gate.is_recently_verified(&phone).await);
}

#[tokio::test]
async fn test_code_past_expiry_is_expired_even_if_unchecked() {
    let ctx = TestContext::new();
    let phone = phone();
    let issued = Utc::now() - Duration::minutes(6);

    ctx.pipeline
        .gate
        .issue_code_at(&phone, "482913".to_string(), issued)
        .await;

    assert_eq!(
        ctx.pipeline.gate.check_code(&phone, "482913").await,
        Err(VerificationError::Expired)
    );
    assert!(!ctx.pipeline.gate.is_recently_verified(&phone).await);
}

#[tokio::test]
async fn test_formatting_does_not_split_contacts() {
    let ctx = TestContext::new();
    let spaced = Phone::parse("98765 43210").unwrap();

    ctx.verify_phone(&spaced).await;

    assert!(ctx.pipeline.gate.is_recently_verified(&phone()).await);
}

#[tokio::test]
async fn test_request_fails_when_channel_is_down() {
    let ctx = TestContext::new();
    ctx.notifier.go_down();

    assert!(!ctx.pipeline.gate.request_code(&phone()).await);
    assert_eq!(
        ctx.pipeline.gate.check_code(&phone(), "000000").await,
        Err(VerificationError::NotFound)
    );
}

#[test]
fn test_any_single_character_mutation_is_rejected() {
    let ctx = TestContext::new();
    let gate = &ctx.pipeline.gate;
    let signature = sign("order_M1", "pay_M1");

    assert!(gate.check_payment_authenticity("order_M1", "pay_M1", &signature));

    for (i, original) in signature.char_indices() {
        for replacement in ['0', 'f', 'g', 'A'] {
            if replacement == original {
                continue;
            }
            let mut mutated = signature.clone();
            mutated.replace_range(i..=i, &replacement.to_string());
            assert!(
                !gate.check_payment_authenticity("order_M1", "pay_M1", &mutated),
                "mutation at {i} accepted"
            );
        }
    }

    assert!(!gate.check_payment_authenticity("order_M1", "pay_M2", &signature));
    assert!(!gate.check_payment_authenticity("", "pay_M1", &signature));
}

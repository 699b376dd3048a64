//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use payments_types::{
        CurrencyCode, Money, OrderId, PaymentIntent, PaymentIntentId, PaymentRepository,
        PaymentStatus, ReceiptInsertOutcome, ReceiptRepository, RepoError, SettlementMessage,
        UsedToken,
    };
    use serde_json::json;

    use crate::SqliteRepo;
    use crate::security::fingerprint_token;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn intent_for(order_id: OrderId) -> PaymentIntent {
        let money = Money::new(500_000, CurrencyCode::default()).unwrap();
        PaymentIntent::succeeded(
            order_id,
            &money,
            "c2lnbmF0dXJl".into(),
            json!({"order_id": order_id.to_string(), "amount": 500000}),
        )
    }

    fn settlement(signature: &str, order_id: &str) -> SettlementMessage {
        let body = json!({
            "receipt": {
                "order_id": order_id,
                "psp_reference": "pi_mock_00112233",
                "status": "SUCCESS",
                "amount": 500000
            },
            "signature": signature,
        })
        .to_string();
        SettlementMessage::parse(body.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_record_payment_persists_intent_and_token() {
        let repo = setup_repo().await;
        let order_id = OrderId::new();
        let intent = intent_for(order_id);
        let fingerprint = fingerprint_token("hsm:v1:token-a");

        assert!(!repo.is_token_used(&fingerprint).await.unwrap());

        repo.record_payment(&intent, &UsedToken::new(fingerprint.clone(), order_id))
            .await
            .unwrap();

        assert!(repo.is_token_used(&fingerprint).await.unwrap());

        let fetched = repo.get_payment_intent(intent.id).await.unwrap().unwrap();
        assert_eq!(fetched.order_id, order_id);
        assert_eq!(fetched.amount, 500_000);
        assert_eq!(fetched.currency.as_str(), "VND");
        assert_eq!(fetched.status, PaymentStatus::Success);
        assert_eq!(fetched.signed_receipt.as_deref(), Some("c2lnbmF0dXJl"));
        assert_eq!(fetched.receipt_payload["amount"], 500000);
    }

    #[tokio::test]
    async fn test_get_payment_intent_not_found() {
        let repo = setup_repo().await;

        let result = repo.get_payment_intent(PaymentIntentId::new()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_rolls_back_whole_payment() {
        let repo = setup_repo().await;
        let fingerprint = fingerprint_token("hsm:v1:token-a");

        let first_order = OrderId::new();
        repo.record_payment(
            &intent_for(first_order),
            &UsedToken::new(fingerprint.clone(), first_order),
        )
        .await
        .unwrap();

        let second_order = OrderId::new();
        let second = intent_for(second_order);
        let result = repo
            .record_payment(&second, &UsedToken::new(fingerprint, second_order))
            .await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
        assert!(repo.get_payment_intent(second.id).await.unwrap().is_none());
        assert!(
            repo.list_payment_intents_for_order(second_order)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_yield_one_success() {
        let repo = Arc::new(setup_repo().await);
        let fingerprint = fingerprint_token("hsm:v1:contended");

        let attempts = (0..5).map(|_| {
            let repo = Arc::clone(&repo);
            let fingerprint = fingerprint.clone();
            async move {
                let order_id = OrderId::new();
                repo.record_payment(&intent_for(order_id), &UsedToken::new(fingerprint, order_id))
                    .await
            }
        });
        let results = futures::future::join_all(attempts).await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(RepoError::Conflict(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 4);
    }

    #[tokio::test]
    async fn test_list_payment_intents_for_order() {
        let repo = setup_repo().await;
        let order_id = OrderId::new();

        for token in ["hsm:v1:a", "hsm:v1:b"] {
            repo.record_payment(
                &intent_for(order_id),
                &UsedToken::new(fingerprint_token(token), order_id),
            )
            .await
            .unwrap();
        }

        let intents = repo.list_payment_intents_for_order(order_id).await.unwrap();
        assert_eq!(intents.len(), 2);
        assert!(
            repo.list_payment_intents_for_order(OrderId::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_failed_intent_without_receipt_round_trips() {
        let repo = setup_repo().await;
        let order_id = OrderId::new();
        let now = Utc::now();
        let failed = PaymentIntent::from_parts(
            PaymentIntentId::new(),
            order_id,
            100,
            CurrencyCode::default(),
            PaymentStatus::Failed,
            None,
            json!({}),
            now,
            now,
        )
        .unwrap();

        repo.record_payment(
            &failed,
            &UsedToken::new(fingerprint_token("hsm:v1:f"), order_id),
        )
        .await
        .unwrap();

        let fetched = repo.get_payment_intent(failed.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PaymentStatus::Failed);
        assert!(fetched.signed_receipt.is_none());
    }

    #[tokio::test]
    async fn test_store_receipt_is_idempotent_by_signature() {
        let repo = setup_repo().await;

        let first = settlement("sig-1", "order-1").into_record();
        let redelivered = settlement("sig-1", "order-1").into_record();

        assert_eq!(
            repo.store_receipt(&first).await.unwrap(),
            ReceiptInsertOutcome::Stored
        );
        assert_eq!(
            repo.store_receipt(&redelivered).await.unwrap(),
            ReceiptInsertOutcome::Duplicate
        );

        let rows = repo.list_receipts_for_order("order-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
    }

    #[tokio::test]
    async fn test_find_receipt_by_signature() {
        let repo = setup_repo().await;
        let record = settlement("sig-2", "order-2").into_record();
        repo.store_receipt(&record).await.unwrap();

        let found = repo.find_receipt_by_signature("sig-2").await.unwrap().unwrap();
        assert_eq!(found.order_id.as_deref(), Some("order-2"));
        assert_eq!(found.psp_reference.as_deref(), Some("pi_mock_00112233"));
        assert_eq!(found.status.as_deref(), Some("SUCCESS"));
        assert_eq!(found.payload["amount"], 500000);

        assert!(repo.find_receipt_by_signature("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receipt_without_order_id_is_stored() {
        let repo = setup_repo().await;
        let body = json!({"receipt": {"amount": 1}, "signature": "sig-3"}).to_string();
        let record = SettlementMessage::parse(body.as_bytes())
            .unwrap()
            .into_record();

        assert_eq!(
            repo.store_receipt(&record).await.unwrap(),
            ReceiptInsertOutcome::Stored
        );
        let found = repo.find_receipt_by_signature("sig-3").await.unwrap().unwrap();
        assert!(found.order_id.is_none());
    }
}

//! Property tests for ledger idempotency and forward-only transitions.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use entitlement_ledger::adapters::notify::NoopNotifier;
use entitlement_ledger::adapters::{
    InMemoryAccessRightStore, InMemoryAlertSink, InMemoryDiagnosisReader, InMemoryPurchaseLedger,
};
use entitlement_ledger::application::handlers::payment::{EntitlementGranter, SettlePaymentHandler};
use entitlement_ledger::domain::foundation::{DiagnosisId, ErrorCode, StateMachine, Timestamp, UserId};
use entitlement_ledger::domain::payment::{
    Attribution, CanonicalEvent, CanonicalStatus, Currency, Money, PaymentProvider, PurchaseKey,
    PurchaseStatus, TransitionDecision,
};
use entitlement_ledger::ports::{AccessRightStore, PurchaseLedger};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn event(status: CanonicalStatus) -> CanonicalEvent {
    CanonicalEvent {
        provider: PaymentProvider::Stripe,
        external_event_id: "cs_1".to_string(),
        attribution: Some(Attribution {
            user_id: UserId::new("u1").unwrap(),
            diagnosis_id: DiagnosisId::new("d1").unwrap(),
        }),
        amount: Some(Money::new(98_000, Currency::jpy()).unwrap()),
        raw_status: format!("{:?}", status),
        status,
        metadata: json!({}),
        observed_at: Timestamp::now(),
    }
}

fn canonical_status() -> impl Strategy<Value = CanonicalStatus> {
    prop_oneof![
        Just(CanonicalStatus::Completed),
        Just(CanonicalStatus::Failed),
        Just(CanonicalStatus::Refunded),
        Just(CanonicalStatus::Other),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repeated_completion_yields_one_row_and_one_grant(deliveries in 1usize..12) {
        let rt = runtime();
        rt.block_on(async {
            let ledger = InMemoryPurchaseLedger::new();
            let rights = InMemoryAccessRightStore::new();
            let granter = Arc::new(EntitlementGranter::new(
                Arc::new(InMemoryDiagnosisReader::with_diagnoses(["d1"])),
                Arc::new(rights.clone()),
                Arc::new(ledger.clone()),
                Arc::new(NoopNotifier),
            ));
            let settle = SettlePaymentHandler::new(
                Arc::new(ledger.clone()),
                granter,
                Arc::new(InMemoryAlertSink::new()),
            );

            let mut first_id = None;
            for _ in 0..deliveries {
                let outcome = settle.settle(&event(CanonicalStatus::Completed), "webhook").await.unwrap();
                let id = *first_id.get_or_insert(outcome.purchase.id);
                assert_eq!(outcome.purchase.id, id);
            }

            assert_eq!(ledger.len().await, 1);
            let listed = rights.list_for_user(&UserId::new("u1").unwrap()).await.unwrap();
            assert_eq!(listed.len(), 1);
            assert!(listed[0].is_full());
        });
    }

    #[test]
    fn status_only_moves_along_legal_edges(
        sequence in proptest::collection::vec(canonical_status(), 1..16)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let ledger = InMemoryPurchaseLedger::new();
            let key = PurchaseKey::new(PaymentProvider::Stripe, "cs_1");
            let mut model: Option<PurchaseStatus> = None;

            for status in sequence {
                let target = status.target();
                let result = ledger.record_or_advance(&event(status)).await;

                match model {
                    None => {
                        let recorded = result.unwrap();
                        assert!(recorded.created);
                        assert_eq!(recorded.purchase.status, target);
                        model = Some(target);
                    }
                    Some(current) => match current.classify(target) {
                        TransitionDecision::Duplicate | TransitionDecision::Stale => {
                            let recorded = result.unwrap();
                            assert!(!recorded.transitioned);
                            assert_eq!(recorded.purchase.status, current);
                        }
                        TransitionDecision::Advance => {
                            let recorded = result.unwrap();
                            assert!(recorded.transitioned);
                            assert!(current.can_transition_to(&recorded.purchase.status));
                            model = Some(target);
                        }
                        TransitionDecision::Illegal => {
                            let err = result.unwrap_err();
                            assert_eq!(err.code, ErrorCode::InvalidStateTransition);
                        }
                    },
                }

                let stored = ledger.find_by_key(&key).await.unwrap().map(|p| p.status);
                assert_eq!(stored, model);
            }

            assert_eq!(ledger.len().await, 1);
        });
    }
}

use std::sync::Arc;

use dfmea_core::{AnalysisRecord, CascadeLevel};
use dfmea_gateway::{MockGateway, MockLatency as GatewayLatency};
use dfmea_infer::{MockGenerationProvider, MockLatency};
use dfmea_session::{
    DfmeaSession, NullNotifier, PageVariant, SessionDeps, SessionError, SessionSettings,
};
use dfmea_store::RecordStore;
use proptest::prelude::*;

fn session(page: PageVariant) -> DfmeaSession {
    let records = vec![
        AnalysisRecord::new("A", "A", "A", "A"),
        AnalysisRecord::new("B", "B", "C", "C"),
    ];
    DfmeaSession::new(
        page,
        SessionDeps {
            records: Arc::new(RecordStore::from_records(records)),
            provider: Arc::new(MockGenerationProvider::new(Some(3), MockLatency::ZERO)),
            gateway: Arc::new(MockGateway::new(GatewayLatency::ZERO)),
            notifier: Arc::new(NullNotifier),
        },
        SessionSettings {
            viewer_seed: Some(3),
            ..SessionSettings::default()
        },
    )
}

fn page() -> impl Strategy<Value = PageVariant> {
    prop_oneof![
        Just(PageVariant::Viewer),
        Just(PageVariant::Engineer),
        Just(PageVariant::Admin),
    ]
}

fn step() -> impl Strategy<Value = (CascadeLevel, Vec<String>)> {
    (
        prop::sample::select(CascadeLevel::ALL.to_vec()),
        prop::collection::vec("[A-C]{0,1}", 0..3),
    )
}

proptest! {
    #[test]
    fn every_step_keeps_the_cascade_consistent(
        page in page(),
        steps in prop::collection::vec(step(), 1..32),
    ) {
        let session = session(page);

        for (level, values) in steps {
            let before = session.snapshot().expect("snapshot");
            let result = session.set_level(level, values);
            let after = session.snapshot().expect("snapshot");

            prop_assert!(after.selection.is_upstream_complete());
            match result {
                Err(SessionError::Validation(_)) => prop_assert_eq!(after, before),
                Err(err) => prop_assert!(false, "unexpected error: {err}"),
                Ok(()) => {
                    prop_assert_eq!(after.epoch, before.epoch + 1);
                    for downstream in level.downstream() {
                        prop_assert!(after.selection.values(*downstream).is_empty());
                    }
                    if level != CascadeLevel::Product {
                        prop_assert!(after.rows.is_empty());
                    } else if page.multi_select() {
                        prop_assert_eq!(after.rows.is_empty(), after.selection.product.is_empty());
                    } else {
                        prop_assert_eq!(&after.rows, &before.rows);
                    }
                }
            }
        }
    }

    #[test]
    fn set_program_resets_everything_below(
        page in page(),
        steps in prop::collection::vec(step(), 0..16),
        program in "[A-C]",
    ) {
        let session = session(page);
        for (level, values) in steps {
            let _ = session.set_level(level, values);
        }

        session.set_program(&program).expect("program has no parent");

        let snapshot = session.snapshot().expect("snapshot");
        prop_assert_eq!(snapshot.selection.program, vec![program]);
        prop_assert!(snapshot.selection.product_category.is_empty());
        prop_assert!(snapshot.selection.subsystem.is_empty());
        prop_assert!(snapshot.selection.product.is_empty());
        prop_assert!(snapshot.rows.is_empty());
    }
}

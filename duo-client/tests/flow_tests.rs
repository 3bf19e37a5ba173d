//! End-to-end session flow through the driver and the mock backend

mod helpers;

use duo_client::{BackendClient, Driver};
use duo_common::hypothesis::Side;
use duo_common::reconcile::CellKey;
use duo_common::sample::{LayoutKind, SampleLayout};
use duo_common::session::{Input, ParticipantStatus, SessionSettings, Stage};
use duo_common::Error;
use helpers::MockBackend;
use serde_json::json;

fn driver(backend: &MockBackend, settings: SessionSettings) -> Driver {
    let client = BackendClient::new(backend.base_url(), settings.layout.kind).unwrap();
    Driver::new(client, settings)
}

async fn to_first_sample(driver: &mut Driver) {
    driver
        .submit(Input::SubmitEmail("p@example.org".to_string()))
        .await
        .unwrap();
    driver
        .submit(Input::Assign {
            side: Side::Lhs,
            columns: vec!["name".to_string()],
        })
        .await
        .unwrap();
    driver
        .submit(Input::Assign {
            side: Side::Rhs,
            columns: vec!["manager".to_string()],
        })
        .await
        .unwrap();
    driver.submit(Input::ConfirmBriefing).await.unwrap();
}

#[tokio::test]
async fn test_full_study_flow() {
    let backend = MockBackend::start().await;
    let mut driver = driver(&backend, SessionSettings::default());

    driver
        .submit(Input::SubmitEmail("p@example.org".to_string()))
        .await
        .unwrap();
    assert_eq!(driver.session().participant(), Some(ParticipantStatus::New));
    match driver.session().stage() {
        Stage::Briefing(b) => {
            assert_eq!(b.scenario, 8);
            assert_eq!(b.header.as_ref().map(|h| h.len()), Some(3));
        }
        other => panic!("expected briefing, got {}", other.name()),
    }
    assert_eq!(
        backend.requests("post-interaction"),
        vec![json!({"next_scenario_id": "8", "prev_scenario_id": "0", "email": "p@example.org"})]
    );

    driver
        .submit(Input::Assign {
            side: Side::Lhs,
            columns: vec!["name".to_string()],
        })
        .await
        .unwrap();
    driver
        .submit(Input::Assign {
            side: Side::Rhs,
            columns: vec!["manager".to_string()],
        })
        .await
        .unwrap();
    driver.submit(Input::ConfirmBriefing).await.unwrap();
    assert_eq!(backend.requests("import")[0]["initial_fd"], json!("(name) => (manager)"));

    // Import is followed by the first sample
    match driver.session().stage() {
        Stage::Interact(i) => {
            assert_eq!(i.project_id, "42");
            assert_eq!(i.iterations, 1);
            assert!(i.grid.is_some());
        }
        other => panic!("expected interact, got {}", other.name()),
    }

    driver
        .submit(Input::ToggleCell(CellKey::new(0, "manager")))
        .await
        .unwrap();
    driver.submit(Input::SetUnknown(true)).await.unwrap();
    driver.submit(Input::SubmitFeedback).await.unwrap();

    let submitted = &backend.requests("feedback")[0];
    assert_eq!(
        submitted["feedback"],
        json!({
            "7": {"id": false, "name": false, "manager": true},
            "9": {"id": false, "name": false, "manager": true}
        })
    );
    assert_eq!(submitted["project_id"], json!("42"));
    assert_eq!(submitted["current_user_h"], json!("Not Sure"));

    // Second submission ends the scenario; no scenarios remain
    driver.submit(Input::SetUnknown(true)).await.unwrap();
    driver.submit(Input::SubmitFeedback).await.unwrap();
    assert!(matches!(driver.session().stage(), Stage::Completion));
    assert_eq!(
        backend.requests("post-interaction")[1],
        json!({"next_scenario_id": "0", "prev_scenario_id": "8", "email": "p@example.org"})
    );

    driver
        .submit(Input::SubmitComments(Some("Fun!".to_string())))
        .await
        .unwrap();
    assert!(driver.session().is_finished());
    assert_eq!(
        backend.requests("done"),
        vec![json!({"email": "p@example.org", "comments": "Fun!"})]
    );
    assert!(driver.last_failure().is_none());
}

#[tokio::test]
async fn test_rejected_input_leaves_session_unchanged() {
    let backend = MockBackend::start().await;
    let mut driver = driver(&backend, SessionSettings::default());
    to_first_sample(&mut driver).await;

    let err = driver.submit(Input::FinishScenario).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(backend.requests("post-interaction").len() == 1);
}

#[tokio::test]
async fn test_unusable_sample_is_reported_and_retryable() {
    let backend = MockBackend::start().await;
    let settings = SessionSettings {
        layout: SampleLayout::clean(),
        ..SessionSettings::default()
    };
    assert_eq!(settings.layout.kind, LayoutKind::Clean);
    let mut driver = driver(&backend, settings);
    to_first_sample(&mut driver).await;

    // Clean rows are keyed "0"/"1" while the feedback covers ids 7/9
    let failure = driver.last_failure().expect("sample should have failed");
    assert!(failure.starts_with("sample failed"), "got {}", failure);
    assert!(driver.session().pending().is_none());
    match driver.session().stage() {
        Stage::Interact(i) => assert!(i.grid.is_none()),
        other => panic!("expected interact, got {}", other.name()),
    }

    driver.submit(Input::Refresh).await.unwrap();
    assert_eq!(backend.requests("sample").len(), 2);
}

#[tokio::test]
async fn test_resumed_scenario_skips_sample_call() {
    let backend = MockBackend::resuming().await;
    let mut driver = driver(&backend, SessionSettings::default());
    to_first_sample(&mut driver).await;

    assert!(driver.last_failure().is_none());
    assert!(backend.requests("sample").is_empty());
    match driver.session().stage() {
        Stage::Interact(i) => {
            assert_eq!(i.project_id, "42");
            assert_eq!(i.iterations, 1);
            assert_eq!(i.scores.true_pos, Some(json!(3)));
            let grid = i.grid.as_ref().expect("handed-off sample");
            assert!(grid.is_marked(1, "manager").unwrap());
        }
        other => panic!("expected interact, got {}", other.name()),
    }

    // The loop carries on from the handed-off sample
    driver.submit(Input::SetUnknown(true)).await.unwrap();
    driver.submit(Input::SubmitFeedback).await.unwrap();
    assert_eq!(backend.requests("feedback").len(), 1);
    assert_eq!(
        backend.requests("feedback")[0]["feedback"]["9"]["manager"],
        json!(true)
    );
}

use mermaid_flow_core::aggregate::InputSource;
use mermaid_flow_core::config::GenerationConfig;
use mermaid_flow_core::contract::{
    CompletionResult, FlattenOutput, MockCompletionClient, MockFlattener, MockNotifier,
    MockPresenter, PanelHandle,
};
use mermaid_flow_core::error::{AggregationError, CompletionError, GenerationError};
use mermaid_flow_core::generate::{generate, Collaborators, GenerationOutcome};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn config_with_key() -> GenerationConfig {
    GenerationConfig {
        api_key: Some("sk-test".to_string()),
        ..Default::default()
    }
}

/// Notifier that accepts progress updates and nothing else unless told.
fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_progress().return_const(());
    notifier
}

fn presenter_accepting_once() -> MockPresenter {
    let mut presenter = MockPresenter::new();
    presenter.expect_present().times(1).returning(|session| {
        Ok(PanelHandle {
            session_id: session.id(),
            location: format!("http://127.0.0.1:1/sessions/{}/", session.id()),
        })
    });
    presenter
}

#[tokio::test]
async fn test_selection_with_fenced_reply_is_presented() {
    let mut completion = MockCompletionClient::new();
    completion
        .expect_complete()
        .times(1)
        .withf(|req| req.raw_input_text == "fn main() {}" && req.prompt().ends_with("fn main() {}"))
        .returning(|_| {
            Ok(CompletionResult {
                content: Some("Sure!\n```mermaid\ngraph TD\nA-->B\n```\nDone.".to_string()),
            })
        });
    let mut flattener = MockFlattener::new();
    flattener.expect_flatten().never();
    let mut presenter = MockPresenter::new();
    presenter
        .expect_present()
        .times(1)
        .withf(|session| session.diagram_code() == "graph TD\nA-->B")
        .returning(|session| {
            Ok(PanelHandle {
                session_id: session.id(),
                location: "panel".to_string(),
            })
        });
    let notifier = quiet_notifier();

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Selection("fn main() {}".to_string()),
        &config_with_key(),
        &deps,
    )
    .await;

    match outcome {
        GenerationOutcome::Presented { diagram, handle } => {
            assert_eq!(diagram.code, "graph TD\nA-->B");
            assert!(diagram.was_fenced);
            assert_eq!(handle.location, "panel");
        }
        other => panic!("Expected a preview, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unfenced_reply_is_presented_verbatim() {
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().times(1).returning(|_| {
        Ok(CompletionResult {
            content: Some("graph TD\nA-->B\n".to_string()),
        })
    });
    let flattener = MockFlattener::new();
    let presenter = presenter_accepting_once();
    let notifier = quiet_notifier();
    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };

    let outcome = generate(
        InputSource::Document {
            path: PathBuf::from("src/main.rs"),
            text: "fn main() {}".to_string(),
        },
        &config_with_key(),
        &deps,
    )
    .await;

    let GenerationOutcome::Presented { diagram, .. } = outcome else {
        panic!("Expected a preview");
    };
    assert_eq!(diagram.code, "graph TD\nA-->B\n");
    assert!(!diagram.was_fenced);
}

#[tokio::test]
async fn test_missing_api_key_makes_no_calls() {
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().never();
    let mut flattener = MockFlattener::new();
    flattener.expect_flatten().never();
    let mut presenter = MockPresenter::new();
    presenter.expect_present().never();
    let mut notifier = MockNotifier::new();
    notifier
        .expect_error()
        .times(1)
        .withf(|msg| msg.contains("API key"))
        .return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Selection("fn main() {}".to_string()),
        &GenerationConfig::default(),
        &deps,
    )
    .await;

    assert!(matches!(
        outcome,
        GenerationOutcome::Failed(GenerationError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_empty_selection_is_informational() {
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().never();
    let flattener = MockFlattener::new();
    let mut presenter = MockPresenter::new();
    presenter.expect_present().never();
    let mut notifier = MockNotifier::new();
    notifier
        .expect_info()
        .times(1)
        .withf(|msg| msg == "No text selected.")
        .return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Selection(String::new()),
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(matches!(outcome, GenerationOutcome::NothingToDo(_)));
}

#[tokio::test]
async fn test_empty_input_without_api_key_is_informational() {
    let cases = [
        (InputSource::Selection(String::new()), "No text selected."),
        (
            InputSource::Capture {
                workspace_root: PathBuf::from("."),
                paths: Vec::new(),
            },
            "No files or folders selected.",
        ),
    ];
    for (input, expected) in cases {
        let mut completion = MockCompletionClient::new();
        completion.expect_complete().never();
        let mut flattener = MockFlattener::new();
        flattener.expect_flatten().never();
        let mut presenter = MockPresenter::new();
        presenter.expect_present().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_error().never();
        notifier
            .expect_info()
            .times(1)
            .withf(move |msg| msg == expected)
            .return_const(());

        let deps = Collaborators {
            completion: &completion,
            flattener: &flattener,
            presenter: &presenter,
            notifier: &notifier,
        };
        let outcome = generate(input, &GenerationConfig::default(), &deps).await;

        assert!(
            matches!(outcome, GenerationOutcome::NothingToDo(message) if message == expected),
            "expected informational outcome for {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_empty_or_absent_content_warns_without_preview() {
    for content in [None, Some(String::new())] {
        let mut completion = MockCompletionClient::new();
        completion
            .expect_complete()
            .times(1)
            .returning(move |_| Ok(CompletionResult { content: content.clone() }));
        let flattener = MockFlattener::new();
        let mut presenter = MockPresenter::new();
        presenter.expect_present().never();
        let mut notifier = quiet_notifier();
        notifier.expect_warn().times(1).return_const(());

        let deps = Collaborators {
            completion: &completion,
            flattener: &flattener,
            presenter: &presenter,
            notifier: &notifier,
        };
        let outcome = generate(
            InputSource::Selection("code".to_string()),
            &config_with_key(),
            &deps,
        )
        .await;

        assert!(matches!(outcome, GenerationOutcome::EmptyResult));
    }
}

#[tokio::test]
async fn test_completion_error_is_reported_with_underlying_message() {
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().times(1).returning(|_| {
        Err(CompletionError::Endpoint {
            status: 401,
            body: "invalid api key".to_string(),
        })
    });
    let flattener = MockFlattener::new();
    let mut presenter = MockPresenter::new();
    presenter.expect_present().never();
    let mut notifier = quiet_notifier();
    notifier
        .expect_error()
        .times(1)
        .withf(|msg| msg.contains("invalid api key") && msg.contains("401"))
        .return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Selection("code".to_string()),
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(outcome.is_failure());
}

#[tokio::test]
async fn test_capture_flattens_once_and_completes_once() {
    let workspace = tempdir().unwrap();
    let root = workspace.path().to_path_buf();
    fs::write(root.join("a.rs"), "fn a() {}").unwrap();
    fs::write(root.join("b.rs"), "fn b() {}").unwrap();
    fs::create_dir(root.join("nested")).unwrap();
    fs::write(root.join("nested/c.rs"), "fn c() {}").unwrap();
    let absolute_b = root.join("b.rs");

    let expected: Vec<PathBuf> = ["a.rs", "b.rs", "nested"]
        .iter()
        .map(|p| fs::canonicalize(root.join(p)).unwrap())
        .collect();

    let mut flattener = MockFlattener::new();
    flattener
        .expect_flatten()
        .times(1)
        .withf(move |_root, paths, _out| paths == expected.as_slice())
        .returning(|_root, _paths, out| {
            fs::write(out, "flattened capture").unwrap();
            Ok(FlattenOutput {
                stderr: String::new(),
            })
        });
    let mut completion = MockCompletionClient::new();
    completion
        .expect_complete()
        .times(1)
        .withf(|req| req.raw_input_text == "flattened capture")
        .returning(|_| {
            Ok(CompletionResult {
                content: Some("graph TD\nA-->B".to_string()),
            })
        });
    let presenter = presenter_accepting_once();
    let notifier = quiet_notifier();

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Capture {
            workspace_root: root.clone(),
            paths: vec![PathBuf::from("a.rs"), absolute_b, PathBuf::from("nested")],
        },
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(matches!(outcome, GenerationOutcome::Presented { .. }));
}

#[tokio::test]
async fn test_flattener_stderr_warns_but_continues() {
    let workspace = tempdir().unwrap();
    fs::write(workspace.path().join("a.rs"), "fn a() {}").unwrap();

    let mut flattener = MockFlattener::new();
    flattener.expect_flatten().times(1).returning(|_, _, out| {
        fs::write(out, "text").unwrap();
        Ok(FlattenOutput {
            stderr: "deprecated flag\n".to_string(),
        })
    });
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().times(1).returning(|_| {
        Ok(CompletionResult {
            content: Some("graph TD".to_string()),
        })
    });
    let presenter = presenter_accepting_once();
    let mut notifier = quiet_notifier();
    notifier
        .expect_warn()
        .times(1)
        .withf(|msg| msg.contains("deprecated flag"))
        .return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Capture {
            workspace_root: workspace.path().to_path_buf(),
            paths: vec![PathBuf::from("a.rs")],
        },
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(matches!(outcome, GenerationOutcome::Presented { .. }));
}

#[tokio::test]
async fn test_flattener_failure_aborts_before_completion() {
    let workspace = tempdir().unwrap();
    fs::write(workspace.path().join("a.rs"), "fn a() {}").unwrap();

    let mut flattener = MockFlattener::new();
    flattener
        .expect_flatten()
        .times(1)
        .returning(|_, _, _| Err(AggregationError::Tool("npx: not found".to_string())));
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().never();
    let mut presenter = MockPresenter::new();
    presenter.expect_present().never();
    let mut notifier = quiet_notifier();
    notifier
        .expect_error()
        .times(1)
        .withf(|msg| msg.contains("npx: not found"))
        .return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Capture {
            workspace_root: workspace.path().to_path_buf(),
            paths: vec![PathBuf::from("a.rs")],
        },
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(matches!(
        outcome,
        GenerationOutcome::Failed(GenerationError::Aggregation(_))
    ));
}

#[tokio::test]
async fn test_missing_capture_path_aborts_before_flattening() {
    let workspace = tempdir().unwrap();

    let mut flattener = MockFlattener::new();
    flattener.expect_flatten().never();
    let mut completion = MockCompletionClient::new();
    completion.expect_complete().never();
    let presenter = MockPresenter::new();
    let mut notifier = quiet_notifier();
    notifier.expect_error().times(1).return_const(());

    let deps = Collaborators {
        completion: &completion,
        flattener: &flattener,
        presenter: &presenter,
        notifier: &notifier,
    };
    let outcome = generate(
        InputSource::Capture {
            workspace_root: workspace.path().to_path_buf(),
            paths: vec![PathBuf::from("does-not-exist.rs")],
        },
        &config_with_key(),
        &deps,
    )
    .await;

    assert!(matches!(
        outcome,
        GenerationOutcome::Failed(GenerationError::Aggregation(
            AggregationError::ResolvePath { .. }
        ))
    ));
}

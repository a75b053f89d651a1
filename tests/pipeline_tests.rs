mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{make_docx, make_pdf, pdf_page_count, read_document_xml, FailingConverter, MockConverter};
use docproc_server::config::ServerConfig;
use docproc_server::convert::{ConvertError, Converter};
use docproc_server::merge::MergeInput;
use docproc_server::pipeline::{OutputFormat, PipelineError, RenderPipeline, RenderRequest};

fn scratch_root() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("scratch");
    (dir, root)
}

fn pipeline_with(root: &Path, converter: Arc<dyn Converter>) -> RenderPipeline {
    let mut config = ServerConfig::default();
    config.scratch_root = root.to_path_buf();
    RenderPipeline::new(&config, converter)
}

fn assert_no_leftover_files(root: &Path) {
    if root.exists() {
        let leftovers: Vec<_> = std::fs::read_dir(root).unwrap().collect();
        assert!(leftovers.is_empty(), "workspace leaked: {:?}", leftovers);
    }
}

#[tokio::test]
async fn pdf_request_returns_pdf_magic() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("Cher {{civilite}} {{nom}},"),
        json_data: r#"{"civilite":"M.","nom":"Dupont"}"#.to_string(),
    };
    let artifact = pipeline.handle(request, OutputFormat::Pdf).await.unwrap();

    assert!(artifact.bytes.starts_with(b"%PDF-"));
    assert!(!artifact.bytes.is_empty());
    assert_no_leftover_files(&root);
}

#[tokio::test]
async fn docx_request_returns_filled_document() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("Cher {{civilite}} {{nom}},"),
        json_data: r#"{"civilite":"M.","nom":"Dupont"}"#.to_string(),
    };
    let artifact = pipeline.handle(request, OutputFormat::Docx).await.unwrap();

    let xml = read_document_xml(&artifact.bytes);
    assert!(xml.contains("Cher M. Dupont,"));
    // Docx output never leaves memory, so no scratch dir is ever created.
    assert!(!root.exists());
}

#[tokio::test]
async fn malformed_json_fails_before_any_workspace_exists() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("Cher {{nom}},"),
        json_data: r#"{"nom":}"#.to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    // Validation failed before acquisition, so the scratch root was never created.
    assert!(!root.exists());
}

#[tokio::test]
async fn non_object_payload_is_invalid_input() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("{{nom}}"),
        json_data: "[1,2,3]".to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn empty_template_is_rejected_up_front() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: Vec::new(),
        json_data: "{}".to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(!root.exists());
}

#[tokio::test]
async fn oversized_template_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("scratch");
    let mut config = ServerConfig::default();
    config.scratch_root = root.clone();
    config.max_template_bytes = 16;
    let pipeline = RenderPipeline::new(&config, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("{{nom}}"),
        json_data: r#"{"nom":"Dupont"}"#.to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(!root.exists());
}

#[tokio::test]
async fn missing_tag_key_cleans_up_the_workspace() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let request = RenderRequest {
        template: make_docx("Cher {{nom}},"),
        json_data: r#"{"civilite":"M."}"#.to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();

    assert!(matches!(err, PipelineError::Template(_)));
    // Rendering happens before acquisition, so the failure touches no disk.
    assert!(!root.exists());
}

#[tokio::test]
async fn converter_failure_cleans_up_the_workspace() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(
        &root,
        Arc::new(FailingConverter(|| ConvertError::MissingOutput)),
    );

    let request = RenderRequest {
        template: make_docx("Cher {{nom}},"),
        json_data: r#"{"nom":"Dupont"}"#.to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Convert(ConvertError::MissingOutput)
    ));
    assert_no_leftover_files(&root);
}

#[tokio::test]
async fn engine_unavailability_propagates() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(
        &root,
        Arc::new(FailingConverter(|| ConvertError::EngineUnavailable {
            attempts: 15,
        })),
    );

    let request = RenderRequest {
        template: make_docx("{{nom}}"),
        json_data: r#"{"nom":"Dupont"}"#.to_string(),
    };
    let err = pipeline.handle(request, OutputFormat::Pdf).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Convert(ConvertError::EngineUnavailable { attempts: 15 })
    ));
    assert_no_leftover_files(&root);
}

#[tokio::test]
async fn merge_runs_through_the_pipeline() {
    let (_guard, root) = scratch_root();
    let pipeline = pipeline_with(&root, Arc::new(MockConverter));

    let inputs = [
        MergeInput {
            filename: "a.pdf".to_string(),
            bytes: make_pdf(1),
        },
        MergeInput {
            filename: "b.pdf".to_string(),
            bytes: make_pdf(1),
        },
    ];
    let merged = pipeline.merge(&inputs).unwrap();
    assert_eq!(pdf_page_count(&merged), 2);

    let err = pipeline.merge(&inputs[..1]).unwrap_err();
    assert!(matches!(err, PipelineError::Merge(_)));
    assert!(!root.exists());
}

#[tokio::test]
async fn concurrent_requests_do_not_cross_contaminate() {
    let (_guard, root) = scratch_root();
    let pipeline = Arc::new(pipeline_with(&root, Arc::new(MockConverter)));

    let mut handles = Vec::new();
    for i in 0..20 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let request = RenderRequest {
                template: make_docx("Dossier de {{nom}}"),
                json_data: format!(r#"{{"nom":"client-{}"}}"#, i),
            };
            let artifact = pipeline.handle(request, OutputFormat::Docx).await.unwrap();
            (i, artifact)
        }));
    }

    for handle in handles {
        let (i, artifact) = handle.await.unwrap();
        let xml = read_document_xml(&artifact.bytes);
        let expected = format!("Dossier de client-{}", i);
        assert!(xml.contains(&expected), "request {} got: {}", i, xml);
    }
    assert_no_leftover_files(&root);
}

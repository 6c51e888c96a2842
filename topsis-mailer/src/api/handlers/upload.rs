//! `POST /upload`: rank an uploaded decision matrix and mail the result.
//!
//! The pipeline is strictly sequential:
//!
//! 1. Read the multipart form; reject it with `400` if the file or any text field is missing.
//! 2. Allocate a fresh input/output pair under the upload directory and write the file verbatim.
//! 3. Run the ranking tool with `<input> <weights> <impacts> <output>`.
//! 4. Fail with `500` if it exited non-zero or left no output file.
//! 5. Mail the output file to the requester.
//!
//! Both files are owned by a [`JobArtifacts`] guard and removed when the handler returns,
//! whatever the outcome.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::api::models::MessageResponse;
use crate::artifacts::JobArtifacts;
use crate::errors::{Error, Result};
use crate::ranking::RankingJob;
use crate::validation;

/// Fields of the upload form once fully read.
#[derive(Debug)]
pub struct UploadSubmission {
    pub file: Bytes,
    pub weights: String,
    pub impacts: String,
    pub email: String,
}

impl UploadSubmission {
    /// Drain the multipart stream, enforcing the upload size limit as chunks arrive.
    ///
    /// A request without a `file` part carrying a filename is [`Error::NoFile`]; an empty filename,
    /// or a missing or blank text field, is [`Error::MissingFields`].
    pub async fn from_multipart(mut multipart: Multipart, max_upload_bytes: u64) -> Result<Self> {
        let mut file: Option<(String, Bytes)> = None;
        let mut weights: Option<String> = None;
        let mut impacts: Option<String> = None;
        let mut email: Option<String> = None;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_upload_bytes, "parse multipart data"))?
        {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "file" => {
                    // Parts without a filename are form values, not uploads
                    let Some(filename) = field.file_name().map(|s| s.to_string()) else {
                        tracing::debug!("Ignoring 'file' part without a filename");
                        continue;
                    };
                    let mut buffer = BytesMut::new();

                    while let Some(chunk) = field
                        .chunk()
                        .await
                        .map_err(|e| multipart_error(e, max_upload_bytes, "read file chunk"))?
                    {
                        if (buffer.len() + chunk.len()) as u64 > max_upload_bytes {
                            return Err(too_large(max_upload_bytes));
                        }
                        buffer.extend_from_slice(&chunk);
                    }

                    file = Some((filename, buffer.freeze()));
                }
                "weights" | "impacts" | "email" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, max_upload_bytes, &format!("read field '{field_name}'")))?;
                    match field_name.as_str() {
                        "weights" => weights = Some(value),
                        "impacts" => impacts = Some(value),
                        _ => email = Some(value),
                    }
                }
                other => {
                    tracing::debug!(field = other, "Ignoring unknown multipart field");
                }
            }
        }

        let Some((filename, file)) = file else {
            return Err(Error::NoFile);
        };

        // A file input left empty in a browser form still sends a part, with an empty filename
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());

        match (!filename.is_empty(), present(weights), present(impacts), present(email)) {
            (true, Some(weights), Some(impacts), Some(email)) => Ok(Self {
                file,
                weights,
                impacts,
                email,
            }),
            _ => Err(Error::MissingFields),
        }
    }
}

fn too_large(max_upload_bytes: u64) -> Error {
    Error::PayloadTooLarge {
        message: format!(
            "File size exceeds maximum allowed size of {} bytes ({} MB)",
            max_upload_bytes,
            max_upload_bytes / (1024 * 1024)
        ),
    }
}

/// Body limit hits surface as multipart errors; keep them as 413 rather than a parse failure.
fn multipart_error(e: MultipartError, max_upload_bytes: u64, action: &str) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_upload_bytes);
    }
    Error::BadRequest {
        message: format!("Failed to {action}: {e}"),
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    summary = "Rank a decision matrix",
    description = "Run the uploaded CSV through the topsis tool with the given weights and impacts, \
                   and mail the ranked result to the given address.",
    request_body(
        content = crate::api::models::UploadForm,
        content_type = "multipart/form-data",
        description = "CSV file plus weights, impacts and recipient"
    ),
    responses(
        (status = 200, description = "Result mailed", body = MessageResponse),
        (status = 400, description = "File or fields missing", body = MessageResponse),
        (status = 413, description = "Upload too large", body = MessageResponse),
        (status = 500, description = "Tool failed, produced no output, or mail delivery failed", body = MessageResponse)
    )
)]
#[instrument(skip_all)]
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<MessageResponse>)> {
    let submission = UploadSubmission::from_multipart(multipart, state.config.limits.max_upload_bytes).await?;

    if state.config.validate_inputs {
        validation::validate_submission(&submission.weights, &submission.impacts, &submission.email)?;
    }

    let job = JobArtifacts::allocate(&state.config.upload_dir);
    job.write_input(&submission.file).await?;

    info!(
        job_id = %job.short_id(),
        bytes = submission.file.len(),
        "Saved upload"
    );

    let ranking_job = RankingJob {
        input: job.input().path().to_path_buf(),
        weights: submission.weights,
        impacts: submission.impacts,
        output: job.output().path().to_path_buf(),
    };

    info!(job_id = %job.short_id(), "Running command: {}", state.tool.describe(&ranking_job));
    let outcome = state.tool.rank(&ranking_job).await?;

    if !outcome.succeeded() {
        warn!(job_id = %job.short_id(), exit_code = ?outcome.exit_code, "Ranking tool failed");
        return Err(Error::ToolFailed { stderr: outcome.stderr });
    }

    if !job.output().exists().await? {
        return Err(Error::MissingOutput);
    }

    if let Err(e) = state.mailer.send_result(&submission.email, job.output().path()).await {
        warn!(job_id = %job.short_id(), error = %e, "Failed to mail result");
        return Err(Error::NotificationFailed);
    }

    info!(job_id = %job.short_id(), "Result mailed");

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(format!("Success! Results sent to {}", submission.email))),
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::models::MessageResponse;
    use crate::test_utils::{
        FakeBehavior, FakeTool, create_test_app, create_test_config, file_email_config, unreachable_smtp_config,
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use std::future::IntoFuture;
    use std::path::Path;

    const MATRIX: &str = "Fund Name,P1,P2,P3,P4\nM1,0.84,0.71,6.7,42.1\nM2,0.91,0.83,7,31.7\n";
    const RESULT: &str = "Fund Name,P1,P2,P3,P4,Topsis Score,Rank\nM1,0.84,0.71,6.7,42.1,0.53,1\n";

    fn full_form() -> MultipartForm {
        MultipartForm::new()
            .add_part("file", Part::bytes(MATRIX.as_bytes()).file_name("data.csv"))
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,-,+")
            .add_text("email", "someone@example.com")
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test_log::test(tokio::test)]
    async fn test_success_mails_result_and_cleans_up() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::OK);
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Success! Results sent to someone@example.com");

        let calls = tool.calls();
        assert_eq!(calls.len(), 1);
        let job = &calls[0].job;
        assert_eq!(job.weights, "1,1,1,2");
        assert_eq!(job.impacts, "+,+,-,+");
        assert_eq!(job.input.parent(), Some(uploads.path()));
        assert!(job.input.file_name().unwrap().to_str().unwrap().starts_with("data_"));
        assert!(job.output.file_name().unwrap().to_str().unwrap().starts_with("result_"));
        assert_eq!(calls[0].input_contents.as_deref(), Some(MATRIX.as_bytes()));

        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 1);
    }

    #[tokio::test]
    async fn test_missing_file_part_is_rejected_without_side_effects() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let form = MultipartForm::new()
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,-,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<MessageResponse>().message, "No file uploaded");
        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 0);
    }

    #[tokio::test]
    async fn test_each_missing_field_is_rejected() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let fields = [("weights", "1,1,1,2"), ("impacts", "+,+,-,+"), ("email", "someone@example.com")];
        for skipped in ["weights", "impacts", "email"] {
            let mut form = MultipartForm::new().add_part("file", Part::bytes(MATRIX.as_bytes()).file_name("data.csv"));
            for (name, value) in fields {
                if name != skipped {
                    form = form.add_text(name, value);
                }
            }

            let response = app.post("/upload").multipart(form).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(
                response.json::<MessageResponse>().message,
                "Missing data fields",
                "when '{skipped}' is missing"
            );
        }

        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_blank_field_and_empty_file_count_as_missing() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let blank_weights = MultipartForm::new()
            .add_part("file", Part::bytes(MATRIX.as_bytes()).file_name("data.csv"))
            .add_text("weights", "")
            .add_text("impacts", "+,+,-,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(blank_weights).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<MessageResponse>().message, "Missing data fields");

        let empty_file = MultipartForm::new()
            .add_part("file", Part::bytes(Vec::<u8>::new()).file_name(""))
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,-,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(empty_file).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<MessageResponse>().message, "Missing data fields");

        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_file_part_needs_a_filename() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let text_file = MultipartForm::new()
            .add_text("file", "a,b\n1,2\n")
            .add_text("weights", "1,1")
            .add_text("impacts", "+,-")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(text_file).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<MessageResponse>().message, "No file uploaded");

        let unnamed = MultipartForm::new()
            .add_part("file", Part::bytes(MATRIX.as_bytes()).file_name(""))
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,-,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(unnamed).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<MessageResponse>().message, "Missing data fields");

        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_text_field_hits_body_limit() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let mut config = create_test_config(uploads.path(), file_email_config(mails.path()));
        config.limits.max_upload_bytes = 16;
        let app = create_test_app(config, tool.clone());

        let form = MultipartForm::new()
            .add_text("weights", "1,".repeat(50_000))
            .add_part("file", Part::bytes(b"x".as_slice()).file_name("data.csv"))
            .add_text("impacts", "+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(
            response
                .json::<MessageResponse>()
                .message
                .starts_with("File size exceeds maximum allowed size of 16 bytes")
        );
        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_tool_failure_reports_stderr_and_sends_nothing() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Fail(1, "Number of weights, impacts and columns must be same".to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<MessageResponse>().message,
            "Topsis Error: Number of weights, impacts and columns must be same"
        );
        assert_eq!(tool.calls().len(), 1);
        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_output_is_reported_without_mailing() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::NoOutput);
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<MessageResponse>().message,
            "Processing failed, output file not generated."
        );
        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 0);
    }

    #[tokio::test]
    async fn test_mail_failure_is_distinguished_and_cleans_up() {
        let uploads = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), unreachable_smtp_config()), tool.clone());

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<MessageResponse>().message,
            "Processing done, but failed to send email."
        );
        assert_eq!(tool.calls().len(), 1);
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_tool_that_cannot_run_surfaces_error_text() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Unavailable("No such file or directory (os error 2)".to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool);

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<MessageResponse>().message,
            "Failed to run topsis: No such file or directory (os error 2)"
        );
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_before_saving() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let mut config = create_test_config(uploads.path(), file_email_config(mails.path()));
        config.limits.max_upload_bytes = 16;
        let app = create_test_app(config, tool.clone());

        let response = app.post("/upload").multipart(full_form()).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(
            response
                .json::<MessageResponse>()
                .message
                .starts_with("File size exceeds maximum allowed size of 16 bytes")
        );
        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_pre_validation_rejects_bad_impacts_when_enabled() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let mut config = create_test_config(uploads.path(), file_email_config(mails.path()));
        config.validate_inputs = true;
        let app = create_test_app(config, tool.clone());

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(MATRIX.as_bytes()).file_name("data.csv"))
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,*,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<MessageResponse>().message,
            "Impacts must only contain '+' or '-' separated by commas."
        );
        assert!(tool.calls().is_empty());
        assert_eq!(dir_entries(uploads.path()), 0);
    }

    #[tokio::test]
    async fn test_without_pre_validation_tool_sees_raw_fields() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Fail(1, "Impacts must be either +ve or -ve.".to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(MATRIX.as_bytes()).file_name("data.csv"))
            .add_text("weights", "1,1,1,2")
            .add_text("impacts", "+,+,*,+")
            .add_text("email", "someone@example.com");
        let response = app.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(tool.calls()[0].job.impacts, "+,+,*,+");
    }

    #[tokio::test]
    async fn test_concurrent_uploads_use_distinct_artifacts() {
        let uploads = tempfile::tempdir().unwrap();
        let mails = tempfile::tempdir().unwrap();
        let tool = FakeTool::new(FakeBehavior::Succeed(RESULT.to_string()));
        let app = create_test_app(create_test_config(uploads.path(), file_email_config(mails.path())), tool.clone());

        let (a, b, c) = tokio::join!(
            app.post("/upload").multipart(full_form()).into_future(),
            app.post("/upload").multipart(full_form()).into_future(),
            app.post("/upload").multipart(full_form()).into_future(),
        );
        for response in [a, b, c] {
            response.assert_status(StatusCode::OK);
        }

        let calls = tool.calls();
        let inputs: std::collections::HashSet<_> = calls.iter().map(|c| c.job.input.clone()).collect();
        assert_eq!(inputs.len(), 3);
        assert_eq!(dir_entries(uploads.path()), 0);
        assert_eq!(dir_entries(mails.path()), 3);
    }
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dfmea_core::write_csv;
use dfmea_session::{CollectingNotifier, DfmeaSession, NullNotifier, SaveOutcome, SessionError};
use serde_json::json;

use crate::cli::{GenerateArgs, OptionsArgs, OutputFormat, SelectionArgs};
use crate::output::{notification_lines, rows_table, write_json_to_stdout, write_text_to_stdout};
use crate::workbench::{Workbench, build_runtime};

pub fn run_options_command(workspace: &Path, args: OptionsArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let page = workbench.page(args.page)?;
    let session = workbench.session(page, None, Arc::new(NullNotifier))?;
    let runtime = build_runtime()?;

    let outcome = runtime.block_on(async {
        apply_selection(&session, &args.selection).await?;
        session.options(args.level).await
    });
    let options = outcome.map_err(|err| workbench.fail(err))?;

    match args.output {
        OutputFormat::Json => write_json_to_stdout(&json!({
            "page": page.as_str(),
            "level": args.level.as_str(),
            "options": options,
        })),
        OutputFormat::Table => {
            let mut text = String::new();
            for option in &options {
                text.push_str(option);
                text.push('\n');
            }
            write_text_to_stdout(&text)
        }
    }
}

pub fn run_generate_command(workspace: &Path, args: GenerateArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let page = workbench.page(args.page)?;
    let notifier = Arc::new(CollectingNotifier::default());
    let session = workbench.session(page, args.seed, notifier.clone())?;
    let runtime = build_runtime()?;

    let saved = runtime
        .block_on(drive_generation(&session, &args))
        .map_err(|err| workbench.fail(err))?;
    let snapshot = session.snapshot()?;

    if let Some(path) = &args.export {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_csv(&snapshot.rows, &mut out)
            .and_then(|()| out.flush())
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = snapshot.rows.len(), "exported csv");
    }

    let notifications = notifier.take();
    match args.output {
        OutputFormat::Json => write_json_to_stdout(&json!({
            "page": page.as_str(),
            "selection": snapshot.selection,
            "prompt": snapshot.prompt,
            "generatedBy": snapshot.generated_by,
            "rows": snapshot.rows,
            "saved": saved.is_some(),
            "selectionChanged": saved.as_ref().is_some_and(|outcome| outcome.selection_changed),
            "export": args.export.as_ref().map(|path| path.display().to_string()),
            "notifications": notifications,
        })),
        OutputFormat::Table => {
            let mut text = if snapshot.rows.is_empty() {
                "No rows: select program, product category, subsystem and product\n".to_owned()
            } else {
                rows_table(&snapshot.rows)
            };
            text.push_str(&notification_lines(&notifications));
            if let Some(path) = &args.export {
                text.push_str(&format!("Exported to {}\n", path.display()));
            }
            write_text_to_stdout(&text)
        }
    }
}

/// Walks the session through selection, generation, feedback and save in
/// the order a user would on the page.
async fn drive_generation(
    session: &DfmeaSession,
    args: &GenerateArgs,
) -> Result<Option<SaveOutcome>, SessionError> {
    apply_selection(session, &args.selection).await?;
    if let Some(prompt) = &args.prompt {
        session.set_prompt(Some(prompt.clone()))?;
    }
    if let Some(generated_by) = &args.generated_by {
        session.set_generated_by(Some(generated_by.clone()))?;
    }

    if session.page().can_generate() {
        session.generate().await?;
        if args.regenerate {
            session.regenerate().await?;
        }
    }

    for feedback in &args.feedback {
        session.set_feedback(feedback.index, feedback.kind)?;
    }

    if args.save {
        return session.save().await.map(Some);
    }
    Ok(None)
}

async fn apply_selection(
    session: &DfmeaSession,
    selection: &SelectionArgs,
) -> Result<(), SessionError> {
    for (level, values) in selection.levels() {
        session.select(level, values).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use dfmea_core::{CSV_HEADER, CascadeLevel, Feedback, Page};
    use tempfile::tempdir;

    use super::*;
    use crate::account::{run_init_command, run_login_command};
    use crate::cli::{ConfigAssignment, FeedbackArg, InitArgs, LoginArgs};

    fn workspace_signed_in_as(email: &str, password: &str) -> tempfile::TempDir {
        let temp = tempdir().expect("tempdir");
        let assignments = [
            "generation.generate_latency_ms=0",
            "generation.regenerate_latency_ms=0",
            "gateway.save_latency_ms=0",
        ]
        .into_iter()
        .map(|raw| raw.parse::<ConfigAssignment>().expect("assignment"))
        .collect();
        run_init_command(temp.path(), InitArgs { assignments }).expect("init");
        run_login_command(
            temp.path(),
            LoginArgs {
                email: email.to_owned(),
                password: password.to_owned(),
            },
        )
        .expect("login");
        temp
    }

    fn full_selection() -> SelectionArgs {
        SelectionArgs {
            program: vec!["P1".to_owned()],
            category: vec!["Body".to_owned()],
            subsystem: vec!["Housing".to_owned()],
            product: vec!["Case".to_owned()],
        }
    }

    fn generate_args(export: &Path) -> GenerateArgs {
        GenerateArgs {
            selection: full_selection(),
            page: None,
            seed: Some(11),
            prompt: None,
            generated_by: None,
            regenerate: false,
            feedback: vec![FeedbackArg {
                index: 0,
                kind: Feedback::Down,
            }],
            save: true,
            export: Some(export.to_path_buf()),
            output: OutputFormat::Json,
        }
    }

    #[test]
    fn engineer_generates_saves_and_exports() {
        let temp = workspace_signed_in_as("engineer@dfmea.com", "engineer123");
        let export = temp.path().join("out.csv");

        run_generate_command(temp.path(), generate_args(&export)).expect("generate");

        let csv = fs::read_to_string(&export).expect("read export");
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 9);
        assert!(lines[1..].iter().all(|line| line.starts_with("Body,Case,Housing,")));
    }

    #[test]
    fn viewer_cannot_save() {
        let temp = workspace_signed_in_as("viewer@dfmea.com", "viewer123");
        let export = temp.path().join("out.csv");

        let err = run_generate_command(temp.path(), generate_args(&export))
            .expect_err("viewer has no feedback or save");

        assert!(err.to_string().contains("viewer page"));
        assert!(!export.exists());
    }

    #[test]
    fn unknown_selection_values_are_rejected() {
        let temp = workspace_signed_in_as("viewer@dfmea.com", "viewer123");
        let export = temp.path().join("out.csv");
        let args = GenerateArgs {
            selection: SelectionArgs {
                program: vec!["NOPE".to_owned()],
                ..full_selection()
            },
            feedback: Vec::new(),
            save: false,
            ..generate_args(&export)
        };

        let err = run_generate_command(temp.path(), args).expect_err("unknown program");

        assert!(err.to_string().contains("'NOPE' is not an available"));
        assert!(!export.exists());
    }

    #[test]
    fn engineer_asking_for_admin_page_stays_on_engineer() {
        let temp = workspace_signed_in_as("engineer@dfmea.com", "engineer123");
        let workbench = Workbench::open(temp.path()).expect("open");

        let page = workbench.page(Some(Page::Admin)).expect("page");

        assert_eq!(page.page(), Page::Engineer);
    }

    #[test]
    fn commands_require_sign_in() {
        let temp = tempdir().expect("tempdir");

        let err = run_options_command(
            temp.path(),
            OptionsArgs {
                level: CascadeLevel::Program,
                selection: SelectionArgs::default(),
                page: None,
                output: OutputFormat::Table,
            },
        )
        .expect_err("signed out");

        assert!(err.to_string().contains("dfmea login"));
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dfmea_core::Page;
use dfmea_gateway::{UploadCategory, UploadFile, UploadPolicy};
use dfmea_session::{CollectingNotifier, UploadField, UploadForm};
use serde_json::json;

use crate::cli::{FilesArgs, OutputFormat, UploadArgs};
use crate::output::{
    indexed_files_table, notification_lines, receipts_table, write_json_to_stdout,
    write_text_to_stdout,
};
use crate::workbench::{Workbench, build_runtime};

pub fn run_upload_command(workspace: &Path, args: UploadArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let page = workbench.page(Some(Page::Admin))?;
    let mut form = UploadForm::new(page, UploadPolicy::from_config(&workbench.config.upload))?;
    let notifier = CollectingNotifier::default();

    if let Some(name) = &args.add_programme {
        form.request_add_programme(name)?;
        form.confirm_add_programme(&notifier);
    }

    let fields = [
        (UploadField::Programme, &args.programme),
        (UploadField::ProductCategory, &args.product_category),
        (UploadField::Subsystem, &args.subsystem),
        (UploadField::Product, &args.product),
    ];
    let mut wants_upload = false;
    for (field, value) in fields {
        if let Some(value) = value {
            form.set_field(field, value.as_str());
            wants_upload = true;
        }
    }

    let files = [
        (UploadCategory::Prd, &args.prd),
        (UploadCategory::KnowledgeBase, &args.kb),
        (UploadCategory::FieldRepair, &args.field_repair),
    ];
    for (category, paths) in files {
        for path in paths {
            form.add_file(read_upload_file(category, path)?)?;
            wants_upload = true;
        }
    }

    let receipt = if wants_upload {
        let gateway = workbench.gateway()?;
        let runtime = build_runtime()?;
        let outcome = runtime.block_on(form.submit(gateway.gateway.as_ref(), &notifier));
        Some(outcome.map_err(|err| workbench.fail(err))?)
    } else {
        None
    };

    let notifications = notifier.take();
    match args.output {
        OutputFormat::Json => write_json_to_stdout(&json!({
            "addedProgrammes": form.added_programmes(),
            "receipt": receipt,
            "notifications": notifications,
        })),
        OutputFormat::Table => {
            let mut text = String::new();
            if let Some(receipt) = &receipt {
                text.push_str(&receipts_table(&receipt.files));
            }
            text.push_str(&notification_lines(&notifications));
            write_text_to_stdout(&text)
        }
    }
}

pub fn run_files_command(workspace: &Path, args: FilesArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let page = workbench.page(Some(Page::Admin))?;
    if !page.can_upload() {
        anyhow::bail!("the indexed file list is only available on the admin page");
    }

    let gateway = workbench.gateway()?;
    let runtime = build_runtime()?;
    let files = runtime
        .block_on(gateway.gateway.list_indexed_files())
        .map_err(|err| workbench.fail(err.into()))?;

    match args.output {
        OutputFormat::Json => write_json_to_stdout(&json!({ "files": files })),
        OutputFormat::Table => write_text_to_stdout(&indexed_files_table(&files)),
    }
}

fn read_upload_file(category: UploadCategory, path: &Path) -> Result<UploadFile> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadFile::new(category, file_name, bytes))
}

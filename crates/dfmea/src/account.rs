use std::path::Path;

use anyhow::{Context, Result};
use dfmea_config::{config_path, ensure_workspace_config, set_config_value, validate_config};
use serde_json::json;

use crate::cli::{InitArgs, LoginArgs, OutputFormat, ThemeArgs, ThemeChoice, WhoamiArgs};
use crate::output::{write_json_to_stdout, write_text_to_stdout};
use crate::workbench::Workbench;

pub fn run_login_command(workspace: &Path, args: LoginArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let user = workbench.context.login(&args.email, &args.password)?;

    write_text_to_stdout(&format!(
        "Signed in as {} <{}> ({})\nHome page: {}\n",
        user.name,
        user.email,
        user.role.as_str(),
        user.role.home_page().path()
    ))
}

pub fn run_logout_command(workspace: &Path) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    workbench
        .context
        .logout()
        .context("failed to clear session")?;
    write_text_to_stdout("Signed out\n")
}

pub fn run_whoami_command(workspace: &Path, args: WhoamiArgs) -> Result<()> {
    let workbench = Workbench::open(workspace)?;
    let context = &workbench.context;
    let theme = context.theme();

    if matches!(args.output, OutputFormat::Json) {
        let user = context.user().map(|user| {
            json!({
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.role.as_str(),
                "initials": user.initials(),
                "homePage": user.role.home_page().path(),
            })
        });
        return write_json_to_stdout(&json!({
            "signedIn": user.is_some(),
            "user": user,
            "theme": theme.as_str(),
        }));
    }

    let text = match context.user() {
        Some(user) => format!(
            "[{}] {} <{}>\nrole: {}\nhome page: {}\ntheme: {}\n",
            user.initials(),
            user.name,
            user.email,
            user.role.as_str(),
            user.role.home_page().path(),
            theme.as_str()
        ),
        None => format!("Not signed in\ntheme: {}\n", theme.as_str()),
    };
    write_text_to_stdout(&text)
}

pub fn run_theme_command(workspace: &Path, args: ThemeArgs) -> Result<()> {
    let mut workbench = Workbench::open(workspace)?;
    let theme = match args.theme {
        None => workbench.context.theme(),
        Some(ThemeChoice::Toggle) => workbench.context.toggle_theme()?,
        Some(ThemeChoice::Set(theme)) => {
            workbench.context.set_theme(theme)?;
            theme
        }
    };
    write_text_to_stdout(&format!("{}\n", theme.as_str()))
}

pub fn run_init_command(workspace: &Path, args: InitArgs) -> Result<()> {
    let mut config = ensure_workspace_config(workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(workspace).display()
        )
    })?;

    for assignment in &args.assignments {
        config = set_config_value(workspace, &assignment.key, &assignment.value)
            .with_context(|| format!("failed to set {}", assignment.key))?;
        tracing::info!(key = %assignment.key, value = %assignment.value, "config updated");
    }

    let mut text = format!("Config: {}\n", config_path(workspace).display());
    for warning in validate_config(&config) {
        text.push_str(&format!("warning [{}]: {}\n", warning.code, warning.message));
    }
    write_text_to_stdout(&text)
}

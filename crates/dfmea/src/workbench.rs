use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dfmea_config::{DfmeaConfig, config_path, ensure_workspace_config, validate_config};
use dfmea_core::Page;
use dfmea_gateway::{LoadedGateway, load_gateway};
use dfmea_infer::{ProviderOverrides, load_generation_provider};
use dfmea_session::{
    AppContext, DfmeaSession, Notifier, PageVariant, SessionDeps, SessionError, SessionSettings,
};
use dfmea_store::open_record_store;

/// Workspace config plus the signed-in context, loaded once per command.
pub struct Workbench {
    pub root: PathBuf,
    pub config: DfmeaConfig,
    pub context: AppContext,
}

impl Workbench {
    pub fn open(root: &Path) -> Result<Self> {
        let config = ensure_workspace_config(root).with_context(|| {
            format!(
                "failed to load or create workspace config at {}",
                config_path(root).display()
            )
        })?;
        for warning in validate_config(&config) {
            tracing::warn!(code = warning.code, "{}", warning.message);
        }

        let context = AppContext::load(root, &config.auth)
            .with_context(|| format!("failed to load session for {}", root.display()))?;

        Ok(Self {
            root: root.to_path_buf(),
            config,
            context,
        })
    }

    /// Page the signed-in user ends up on when asking for `requested`.
    pub fn page(&self, requested: Option<Page>) -> Result<PageVariant> {
        let user = self
            .context
            .require_user()
            .context("sign in with `dfmea login` first")?;
        let requested = requested.unwrap_or(user.role.home_page());
        let resolved = self.context.resolve(requested);
        if resolved != requested {
            tracing::warn!(
                requested = requested.path(),
                resolved = resolved.path(),
                role = user.role.as_str(),
                "page not available for role, using home page"
            );
        }
        PageVariant::from_page(resolved)
            .with_context(|| format!("no page available at {}", resolved.path()))
    }

    pub fn token(&self) -> Option<String> {
        self.context.token().map(str::to_owned)
    }

    pub fn gateway(&self) -> Result<LoadedGateway> {
        let loaded = load_gateway(&self.config.gateway, self.token())
            .context("failed to configure persistence gateway")?;
        tracing::debug!(provider = %loaded.provider_name, "gateway ready");
        Ok(loaded)
    }

    pub fn session(
        &self,
        page: PageVariant,
        seed: Option<u64>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<DfmeaSession> {
        let records = open_record_store(&self.root, &self.config.records, self.token())
            .context("failed to open records source")?;
        tracing::debug!(source = %records.source_description(), "records source ready");

        let overrides = ProviderOverrides {
            seed,
            ..ProviderOverrides::default()
        };
        let loaded = load_generation_provider(&self.config.generation, overrides)
            .context("failed to configure generation provider")?;
        tracing::debug!(
            provider = %loaded.provider_name,
            model = %loaded.model_name,
            "generation provider ready"
        );

        let gateway = self.gateway()?;
        let settings = SessionSettings {
            row_count: self.config.generation.row_count,
            ancestor_policy: self.config.cascade.ancestor_policy,
            viewer_seed: seed.or(self.config.generation.seed),
        };

        Ok(DfmeaSession::new(
            page,
            SessionDeps {
                records: Arc::new(records),
                provider: Arc::from(loaded.provider),
                gateway: gateway.gateway,
                notifier,
            },
            settings,
        ))
    }

    /// Converts a session failure for the user, signing out first when a
    /// service rejected the token.
    pub fn fail(&mut self, err: SessionError) -> anyhow::Error {
        if !err.is_unauthorized() {
            return err.into();
        }
        if let Err(logout_err) = self.context.session_expired() {
            tracing::warn!(error = %logout_err, "failed to clear expired session");
        }
        anyhow::Error::new(err).context("session expired, sign in again with `dfmea login`")
    }
}

pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use dfmea_core::{
    AncestorPolicy, CascadeLevel, Feedback, FmeaRow, Selection, apply_feedback, options_for,
};
use dfmea_gateway::{GatewayError, PersistenceGateway, SavePayload};
use dfmea_infer::{GenerationKind, GenerationProvider, GenerationRequest, MockRowGenerator};
use dfmea_store::RecordStore;
use serde::Serialize;

use crate::{Notification, Notifier, PageVariant, SessionError, ValidationError};

/// Services a session talks to.
pub struct SessionDeps {
    pub records: Arc<RecordStore>,
    pub provider: Arc<dyn GenerationProvider>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub row_count: usize,
    pub ancestor_policy: AncestorPolicy,
    /// Seed for the rows the Viewer page fabricates on product selection.
    pub viewer_seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            row_count: dfmea_config::DEFAULT_ROW_COUNT,
            ancestor_policy: AncestorPolicy::default(),
            viewer_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub page: PageVariant,
    pub selection: Selection,
    pub rows: Vec<FmeaRow>,
    pub generating: bool,
    pub saving: bool,
    pub epoch: u64,
    pub prompt: Option<String>,
    pub generated_by: Option<String>,
}

/// A save the gateway accepted. `selection_changed` is set when the selection
/// moved on while the call was pending; the payload was persisted either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub payload: SavePayload,
    pub selection_changed: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    selection: Selection,
    rows: Vec<FmeaRow>,
    generating: bool,
    saving: bool,
    epoch: u64,
    prompt: Option<String>,
    generated_by: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Generating,
    Saving,
}

impl Flag {
    fn action(self) -> &'static str {
        match self {
            Self::Generating => "generation",
            Self::Saving => "save",
        }
    }

    fn slot(self, state: &mut SessionState) -> &mut bool {
        match self {
            Self::Generating => &mut state.generating,
            Self::Saving => &mut state.saving,
        }
    }
}

/// Clears an in-flight flag when the operation ends, including when its future is dropped.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
    flag: Flag,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            *self.flag.slot(&mut state) = false;
        }
    }
}

/// Selection state machine of one role page.
///
/// Every selection change bumps an epoch. Generate, regenerate and save are
/// serialized on an async operation lock, and a completion whose epoch no longer
/// matches the current one is discarded instead of applied.
pub struct DfmeaSession {
    page: PageVariant,
    deps: SessionDeps,
    settings: SessionSettings,
    viewer_rows: MockRowGenerator,
    state: Mutex<SessionState>,
    op_lock: tokio::sync::Mutex<()>,
}

impl DfmeaSession {
    pub fn new(page: PageVariant, deps: SessionDeps, settings: SessionSettings) -> Self {
        Self {
            page,
            deps,
            viewer_rows: MockRowGenerator::new(settings.viewer_seed),
            settings,
            state: Mutex::new(SessionState::default()),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn page(&self) -> PageVariant {
        self.page
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let state = self.lock_state()?;
        Ok(SessionSnapshot {
            page: self.page,
            selection: state.selection.clone(),
            rows: state.rows.clone(),
            generating: state.generating,
            saving: state.saving,
            epoch: state.epoch,
            prompt: state.prompt.clone(),
            generated_by: state.generated_by.clone(),
        })
    }

    pub fn rows(&self) -> Result<Vec<FmeaRow>, SessionError> {
        Ok(self.lock_state()?.rows.clone())
    }

    pub fn selection(&self) -> Result<Selection, SessionError> {
        Ok(self.lock_state()?.selection.clone())
    }

    /// Options for `level` under the current selection.
    pub async fn options(&self, level: CascadeLevel) -> Result<Vec<String>, SessionError> {
        let records = self.deps.records.records().await?;
        let selection = self.selection()?;
        Ok(options_for(
            level,
            &records,
            &selection,
            self.settings.ancestor_policy,
        ))
    }

    pub fn set_program(&self, value: &str) -> Result<(), SessionError> {
        self.set_level(CascadeLevel::Program, single(value))
    }

    pub fn set_category(&self, value: &str) -> Result<(), SessionError> {
        self.set_level(CascadeLevel::ProductCategory, single(value))
    }

    pub fn set_subsystem(&self, value: &str) -> Result<(), SessionError> {
        self.set_level(CascadeLevel::Subsystem, single(value))
    }

    pub fn set_product(&self, value: &str) -> Result<(), SessionError> {
        self.set_level(CascadeLevel::Product, single(value))
    }

    /// Sets `level` from user input. Once the parent level is selected, only values
    /// the level currently offers are accepted.
    pub async fn select(
        &self,
        level: CascadeLevel,
        values: Vec<String>,
    ) -> Result<(), SessionError> {
        let selection = self.selection()?;
        let parent_selected = level
            .parent()
            .is_none_or(|parent| !selection.values(parent).is_empty());
        if parent_selected {
            let offered = self.options(level).await?;
            if let Some(value) = values
                .iter()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .find(|value| !offered.iter().any(|option| option == value))
            {
                return Err(ValidationError::UnknownOption {
                    level,
                    value: value.to_owned(),
                }
                .into());
            }
        }
        self.set_level(level, values)
    }

    /// Replaces one level. Levels above the product clear every level below them
    /// and the rows. The product level keeps rows on Engineer/Admin and re-fabricates
    /// them on Viewer.
    pub fn set_level(&self, level: CascadeLevel, values: Vec<String>) -> Result<(), SessionError> {
        if !self.page.multi_select() && distinct_count(&values) > 1 {
            return Err(ValidationError::MultipleValues(level).into());
        }

        let mut state = self.lock_state()?;
        state.selection.set(level, values)?;
        state.epoch += 1;

        if level != CascadeLevel::Product {
            state.rows.clear();
            return Ok(());
        }

        if self.page.multi_select() {
            state.rows = if state.selection.product.is_empty() {
                Vec::new()
            } else {
                let request = self.request_for(&state, GenerationKind::Generate);
                self.viewer_rows.rows(&request)?
            };
        }
        Ok(())
    }

    pub fn set_prompt(&self, prompt: Option<String>) -> Result<(), SessionError> {
        let mut state = self.lock_state()?;
        if !state.selection.is_complete() {
            return Err(ValidationError::PromptUnavailable.into());
        }
        state.prompt = prompt
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        Ok(())
    }

    pub fn set_generated_by(&self, generated_by: Option<String>) -> Result<(), SessionError> {
        if !self.page.has_generated_by() {
            return Err(self.forbidden("generated-by filter"));
        }
        let mut state = self.lock_state()?;
        if !state.selection.is_complete() {
            return Err(ValidationError::PromptUnavailable.into());
        }
        state.generated_by = generated_by.filter(|value| !value.trim().is_empty());
        Ok(())
    }

    pub async fn generate(&self) -> Result<Vec<FmeaRow>, SessionError> {
        self.run_generation(GenerationKind::Generate).await
    }

    /// Same as `generate` with the shorter latency; requires existing rows.
    pub async fn regenerate(&self) -> Result<Vec<FmeaRow>, SessionError> {
        self.run_generation(GenerationKind::Regenerate).await
    }

    /// Toggles feedback on row `index`. Returns the row's feedback afterwards.
    pub fn set_feedback(
        &self,
        index: usize,
        kind: Feedback,
    ) -> Result<Option<Feedback>, SessionError> {
        if !self.page.can_feedback() {
            return Err(self.forbidden("feedback"));
        }
        let mut state = self.lock_state()?;
        match apply_feedback(&mut state.rows, index, kind) {
            Ok(feedback) => Ok(feedback),
            Err(err) => {
                tracing::warn!(index = err.index, len = err.len, "feedback index out of range");
                Err(err.into())
            }
        }
    }

    /// Submits the current rows. On success the record cache is invalidated and
    /// the save notification raised, also when the selection moved on while the
    /// gateway call was pending.
    pub async fn save(&self) -> Result<SaveOutcome, SessionError> {
        if !self.page.can_save() {
            return Err(self.forbidden("save"));
        }
        let in_flight = self.claim(Flag::Saving, check_save)?;

        let _op = self.op_lock.lock().await;
        let (epoch, payload) = {
            let state = self.lock_state()?;
            check_save(&state)?;
            let payload = SavePayload {
                program: primary(&state.selection, CascadeLevel::Program),
                product_category: primary(&state.selection, CascadeLevel::ProductCategory),
                subsystem: primary(&state.selection, CascadeLevel::Subsystem),
                product: primary(&state.selection, CascadeLevel::Product),
                rows: state.rows.clone(),
            };
            (state.epoch, payload)
        };

        let outcome = self.deps.gateway.save_dfmea(&payload).await;
        drop(in_flight);

        let response = outcome?;
        if !response.success {
            return Err(GatewayError::Rejected("save").into());
        }
        self.deps.records.invalidate().await;

        let selection_changed = self.lock_state()?.epoch != epoch;
        if selection_changed {
            tracing::warn!(epoch, "selection changed while saving");
        }

        tracing::info!(
            program = %payload.program,
            product = %payload.product,
            rows = payload.rows.len(),
            "dfmea saved"
        );
        self.deps.notifier.notify(Notification::dfmea_saved());
        Ok(SaveOutcome {
            payload,
            selection_changed,
        })
    }

    async fn run_generation(&self, kind: GenerationKind) -> Result<Vec<FmeaRow>, SessionError> {
        if !self.page.can_generate() {
            return Err(self.forbidden("generate"));
        }
        let in_flight = self.claim(Flag::Generating, |state| check_generation(state, kind))?;

        let _op = self.op_lock.lock().await;
        let (epoch, request) = {
            let state = self.lock_state()?;
            check_generation(&state, kind)?;
            (state.epoch, self.request_for(&state, kind))
        };

        let outcome = self.deps.provider.generate_rows(&request).await;
        drop(in_flight);

        let mut state = self.lock_state()?;
        if state.epoch != epoch {
            tracing::debug!(epoch, current = state.epoch, "dropping stale generation result");
            return Err(SessionError::StaleResult("generation"));
        }

        let rows = outcome?;
        state.rows = rows.clone();
        Ok(rows)
    }

    fn request_for(&self, state: &SessionState, kind: GenerationKind) -> GenerationRequest {
        let selection = &state.selection;
        let mut request = GenerationRequest::new(
            primary(selection, CascadeLevel::ProductCategory),
            primary(selection, CascadeLevel::Product),
            primary(selection, CascadeLevel::Subsystem),
        )
        .with_count(self.settings.row_count)
        .with_prompt(state.prompt.clone());
        if kind == GenerationKind::Regenerate {
            request = request.regenerate();
        }
        request
    }

    /// Raises `flag` before the operation queues on the op lock, so a second call
    /// sees it as busy while the first one waits.
    fn claim(
        &self,
        flag: Flag,
        check: impl FnOnce(&SessionState) -> Result<(), SessionError>,
    ) -> Result<InFlight<'_>, SessionError> {
        let mut state = self.lock_state()?;
        if *flag.slot(&mut state) {
            return Err(SessionError::Busy(flag.action()));
        }
        check(&*state)?;
        *flag.slot(&mut state) = true;
        Ok(InFlight {
            state: &self.state,
            flag,
        })
    }

    fn forbidden(&self, action: &'static str) -> SessionError {
        SessionError::Forbidden {
            page: self.page.as_str(),
            action,
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        self.state
            .lock()
            .map_err(|err| SessionError::LockPoisoned(err.to_string()))
    }
}

fn check_generation(state: &SessionState, kind: GenerationKind) -> Result<(), SessionError> {
    if !state.selection.is_complete() {
        return Err(ValidationError::IncompleteSelection.into());
    }
    if kind == GenerationKind::Regenerate && state.rows.is_empty() {
        return Err(ValidationError::NoRows.into());
    }
    Ok(())
}

fn check_save(state: &SessionState) -> Result<(), SessionError> {
    if !state.selection.is_complete() {
        return Err(ValidationError::IncompleteSelection.into());
    }
    if state.rows.is_empty() {
        return Err(ValidationError::NoRows.into());
    }
    Ok(())
}

fn primary(selection: &Selection, level: CascadeLevel) -> String {
    selection.primary(level).unwrap_or_default().to_owned()
}

fn single(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        Vec::new()
    } else {
        vec![value.to_owned()]
    }
}

fn distinct_count(values: &[String]) -> usize {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dfmea_core::AnalysisRecord;
    use dfmea_gateway::{MockGateway, MockLatency as GatewayLatency};
    use dfmea_infer::{MockGenerationProvider, MockLatency};

    use super::*;
    use crate::CollectingNotifier;

    fn records() -> Vec<AnalysisRecord> {
        vec![
            AnalysisRecord::new("P1", "Body", "Housing", "Case"),
            AnalysisRecord::new("P1", "Body", "Housing", "Bezel"),
            AnalysisRecord::new("P1", "Electronics", "Display", "Panel"),
            AnalysisRecord::new("P2", "Power", "Battery", "Pack"),
        ]
    }

    struct Harness {
        session: Arc<DfmeaSession>,
        gateway: Arc<MockGateway>,
        notifier: Arc<CollectingNotifier>,
    }

    fn harness(page: PageVariant, generate_ms: u64, save_ms: u64) -> Harness {
        let gateway = Arc::new(MockGateway::new(GatewayLatency::from_millis(save_ms, 0)));
        let notifier = Arc::new(CollectingNotifier::default());
        let deps = SessionDeps {
            records: Arc::new(RecordStore::from_records(records())),
            provider: Arc::new(MockGenerationProvider::new(
                Some(5),
                MockLatency::from_millis(generate_ms, generate_ms),
            )),
            gateway: gateway.clone(),
            notifier: notifier.clone(),
        };
        let settings = SessionSettings {
            viewer_seed: Some(5),
            ..SessionSettings::default()
        };
        Harness {
            session: Arc::new(DfmeaSession::new(page, deps, settings)),
            gateway,
            notifier,
        }
    }

    fn select_all(session: &DfmeaSession) {
        session.set_program("P1").expect("program");
        session.set_category("Body").expect("category");
        session.set_subsystem("Housing").expect("subsystem");
        session.set_product("Case").expect("product");
    }

    #[tokio::test]
    async fn options_follow_the_selection() {
        let h = harness(PageVariant::Engineer, 0, 0);

        assert_eq!(
            h.session.options(CascadeLevel::Program).await.expect("programs"),
            vec!["P1", "P2"]
        );
        assert!(
            h.session
                .options(CascadeLevel::ProductCategory)
                .await
                .expect("categories")
                .is_empty()
        );

        h.session.set_program("P1").expect("program");
        assert_eq!(
            h.session
                .options(CascadeLevel::ProductCategory)
                .await
                .expect("categories"),
            vec!["Body", "Electronics"]
        );
    }

    #[tokio::test]
    async fn changing_program_resets_everything_below() {
        let h = harness(PageVariant::Engineer, 0, 0);
        select_all(&h.session);
        h.session.generate().await.expect("generate");

        h.session.set_program("P2").expect("program");

        let snapshot = h.session.snapshot().expect("snapshot");
        assert_eq!(snapshot.selection.program, vec!["P2"]);
        assert!(snapshot.selection.product_category.is_empty());
        assert!(snapshot.selection.subsystem.is_empty());
        assert!(snapshot.selection.product.is_empty());
        assert!(snapshot.rows.is_empty());
    }

    #[tokio::test]
    async fn engineer_product_change_keeps_rows() {
        let h = harness(PageVariant::Engineer, 0, 0);
        select_all(&h.session);
        h.session.generate().await.expect("generate");

        h.session.set_product("Bezel").expect("product");

        assert_eq!(h.session.rows().expect("rows").len(), 8);
    }

    #[test]
    fn setting_a_level_without_its_parent_is_rejected() {
        let h = harness(PageVariant::Engineer, 0, 0);

        let err = h.session.set_subsystem("Housing").expect_err("no parent");

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::Selection(_))
        ));
        assert!(h.session.selection().expect("selection").is_empty());
    }

    #[test]
    fn single_value_pages_reject_multiple_values() {
        let h = harness(PageVariant::Admin, 0, 0);

        let err = h
            .session
            .set_level(
                CascadeLevel::Program,
                vec!["P1".to_owned(), "P2".to_owned()],
            )
            .expect_err("single value page");
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::MultipleValues(CascadeLevel::Program))
        ));

        h.session
            .set_level(
                CascadeLevel::Program,
                vec!["P1".to_owned(), " P1 ".to_owned()],
            )
            .expect("duplicates collapse to one value");
    }

    #[test]
    fn viewer_fabricates_rows_on_product_selection() {
        let h = harness(PageVariant::Viewer, 0, 0);
        h.session
            .set_level(
                CascadeLevel::Program,
                vec!["P1".to_owned(), "P2".to_owned()],
            )
            .expect("programs");
        h.session
            .set_level(
                CascadeLevel::ProductCategory,
                vec!["Body".to_owned(), "Power".to_owned()],
            )
            .expect("categories");
        h.session.set_subsystem("Housing").expect("subsystem");
        h.session
            .set_level(
                CascadeLevel::Product,
                vec!["Case".to_owned(), "Bezel".to_owned()],
            )
            .expect("products");

        let rows = h.session.rows().expect("rows");
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|row| row.product_category == "Body"
            && row.product == "Case"
            && row.subsystem == "Housing"));

        h.session
            .set_level(CascadeLevel::Product, Vec::new())
            .expect("clear product");
        assert!(h.session.rows().expect("rows").is_empty());
    }

    #[tokio::test]
    async fn viewer_cannot_generate_save_or_annotate() {
        let h = harness(PageVariant::Viewer, 0, 0);
        select_all(&h.session);

        assert!(matches!(
            h.session.generate().await,
            Err(SessionError::Forbidden { page: "viewer", .. })
        ));
        assert!(matches!(
            h.session.save().await,
            Err(SessionError::Forbidden { .. })
        ));
        assert!(matches!(
            h.session.set_feedback(0, Feedback::Up),
            Err(SessionError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn generate_requires_a_complete_selection() {
        let h = harness(PageVariant::Engineer, 0, 0);
        h.session.set_program("P1").expect("program");
        h.session.set_category("Body").expect("category");
        h.session.set_subsystem("Housing").expect("subsystem");
        let before = h.session.snapshot().expect("snapshot");

        let err = h.session.generate().await.expect_err("incomplete");

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::IncompleteSelection)
        ));
        assert_eq!(h.session.snapshot().expect("snapshot"), before);
    }

    #[tokio::test]
    async fn regenerate_requires_rows() {
        let h = harness(PageVariant::Engineer, 0, 0);
        select_all(&h.session);

        assert!(matches!(
            h.session.regenerate().await,
            Err(SessionError::Validation(ValidationError::NoRows))
        ));

        h.session.generate().await.expect("generate");
        let rows = h.session.regenerate().await.expect("regenerate");
        assert_eq!(rows.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn second_generate_while_pending_is_busy() {
        let h = harness(PageVariant::Engineer, 900, 0);
        select_all(&h.session);

        let pending = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.generate().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.session.snapshot().expect("snapshot").generating);

        assert!(matches!(
            h.session.generate().await,
            Err(SessionError::Busy("generation"))
        ));

        pending.await.expect("join").expect("first generate");
        let snapshot = h.session.snapshot().expect("snapshot");
        assert!(!snapshot.generating);
        assert_eq!(snapshot.rows.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_never_overwrites_reset_rows() {
        let h = harness(PageVariant::Engineer, 900, 0);
        select_all(&h.session);

        let pending = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.generate().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.session.set_program("P2").expect("program");

        let result = pending.await.expect("join");

        assert!(matches!(result, Err(SessionError::StaleResult(_))));
        let snapshot = h.session.snapshot().expect("snapshot");
        assert!(snapshot.rows.is_empty());
        assert!(!snapshot.generating);
    }

    #[tokio::test(start_paused = true)]
    async fn generate_waits_for_a_pending_save() {
        let h = harness(PageVariant::Engineer, 900, 800);
        select_all(&h.session);
        h.session.generate().await.expect("generate");
        h.session.set_feedback(1, Feedback::Up).expect("feedback");

        let saving = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.save().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.session.snapshot().expect("snapshot").saving);

        let regenerated = h.session.regenerate().await.expect("regenerate");

        let saved = saving.await.expect("join").expect("save");
        assert_eq!(saved.payload.rows[1].feedback, Some(Feedback::Up));
        assert!(!saved.selection_changed);
        assert!(regenerated.iter().all(|row| row.feedback.is_none()));
        assert_eq!(h.gateway.saved_payloads().expect("saved").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_operations_keep_their_flags_raised() {
        let h = harness(PageVariant::Engineer, 900, 800);
        select_all(&h.session);
        h.session.generate().await.expect("generate");

        let saving = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.save().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let queued = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.generate().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = h.session.snapshot().expect("snapshot");
        assert!(snapshot.saving);
        assert!(snapshot.generating);
        assert!(matches!(
            h.session.generate().await,
            Err(SessionError::Busy("generation"))
        ));
        assert!(matches!(
            h.session.save().await,
            Err(SessionError::Busy("save"))
        ));

        saving.await.expect("join").expect("save");
        queued.await.expect("join").expect("queued generate");
        let snapshot = h.session.snapshot().expect("snapshot");
        assert!(!snapshot.generating);
        assert!(!snapshot.saving);
        assert_eq!(h.gateway.saved_payloads().expect("saved").len(), 1);
    }

    #[tokio::test]
    async fn rejected_generation_leaves_the_flag_clear() {
        let h = harness(PageVariant::Engineer, 0, 0);
        select_all(&h.session);

        assert!(h.session.regenerate().await.is_err());

        assert!(!h.session.snapshot().expect("snapshot").generating);
        h.session.generate().await.expect("generate after rejection");
    }

    #[tokio::test(start_paused = true)]
    async fn save_reports_selection_change_but_still_persists() {
        let h = harness(PageVariant::Engineer, 0, 800);
        select_all(&h.session);
        h.session.generate().await.expect("generate");

        let saving = tokio::spawn({
            let session = Arc::clone(&h.session);
            async move { session.save().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.session.set_product("Bezel").expect("product");

        let outcome = saving.await.expect("join").expect("save");

        assert!(outcome.selection_changed);
        assert_eq!(outcome.payload.product, "Case");
        assert_eq!(h.gateway.saved_payloads().expect("saved").len(), 1);
        assert_eq!(h.notifier.take(), vec![Notification::dfmea_saved()]);
    }

    #[tokio::test]
    async fn select_accepts_only_offered_values() {
        let h = harness(PageVariant::Viewer, 0, 0);

        let err = h
            .session
            .select(CascadeLevel::Program, vec!["NOPE".to_owned()])
            .await
            .expect_err("unknown program");
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::UnknownOption {
                level: CascadeLevel::Program,
                ..
            })
        ));
        assert!(h.session.selection().expect("selection").is_empty());

        h.session
            .select(CascadeLevel::Program, vec!["P1".to_owned(), "P2".to_owned()])
            .await
            .expect("programs");
        let err = h
            .session
            .select(
                CascadeLevel::ProductCategory,
                vec!["Body".to_owned(), "Bogus".to_owned()],
            )
            .await
            .expect_err("unknown category");
        assert!(err.to_string().contains("'Bogus'"));
        assert!(h.session.rows().expect("rows").is_empty());
    }

    #[tokio::test]
    async fn select_without_parent_reports_the_missing_level() {
        let h = harness(PageVariant::Engineer, 0, 0);

        let err = h
            .session
            .select(CascadeLevel::Subsystem, vec!["Housing".to_owned()])
            .await
            .expect_err("no parent");

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::Selection(_))
        ));
    }

    #[tokio::test]
    async fn save_notifies_and_reports_gateway_failures() {
        let h = harness(PageVariant::Admin, 0, 0);
        select_all(&h.session);

        assert!(matches!(
            h.session.save().await,
            Err(SessionError::Validation(ValidationError::NoRows))
        ));

        h.session.generate().await.expect("generate");
        h.gateway.set_available(false).expect("toggle");
        let err = h.session.save().await.expect_err("gateway down");
        assert!(matches!(err, SessionError::Gateway(GatewayError::Unavailable)));
        assert!(!h.session.snapshot().expect("snapshot").saving);
        assert!(h.notifier.take().is_empty());

        h.gateway.set_available(true).expect("toggle");
        h.session.save().await.expect("save");
        assert_eq!(h.notifier.take(), vec![Notification::dfmea_saved()]);
    }

    #[tokio::test]
    async fn feedback_out_of_range_is_a_no_op() {
        let h = harness(PageVariant::Engineer, 0, 0);
        select_all(&h.session);
        h.session.generate().await.expect("generate");
        let before = h.session.rows().expect("rows");

        let err = h.session.set_feedback(8, Feedback::Down).expect_err("out of range");

        assert!(matches!(err, SessionError::FeedbackOutOfRange(_)));
        assert_eq!(h.session.rows().expect("rows"), before);
    }

    #[tokio::test]
    async fn prompt_requires_complete_selection_and_reaches_the_request() {
        let h = harness(PageVariant::Engineer, 0, 0);
        assert!(matches!(
            h.session.set_prompt(Some("High RPN items only".to_owned())),
            Err(SessionError::Validation(ValidationError::PromptUnavailable))
        ));

        select_all(&h.session);
        h.session
            .set_prompt(Some(" High RPN items only ".to_owned()))
            .expect("prompt");

        assert_eq!(
            h.session.snapshot().expect("snapshot").prompt.as_deref(),
            Some("High RPN items only")
        );
    }
}

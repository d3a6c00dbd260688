use dfmea_gateway::{
    GatewayError, PersistenceGateway, UploadCategory, UploadFile, UploadPolicy, UploadReceipt,
    UploadRequest,
};

use crate::{Notification, Notifier, PageVariant, SessionError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Programme,
    ProductCategory,
    Subsystem,
    Product,
}

/// "Add new Programme" confirmation dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AddProgrammeDialog {
    #[default]
    Closed,
    Confirming {
        name: String,
    },
}

/// Admin upload tab: four text fields, files per category and the programme dialog.
#[derive(Debug, Clone)]
pub struct UploadForm {
    programme: String,
    product_category: String,
    subsystem: String,
    product: String,
    files: Vec<UploadFile>,
    added_programmes: Vec<String>,
    dialog: AddProgrammeDialog,
    policy: UploadPolicy,
}

impl UploadForm {
    pub fn new(page: PageVariant, policy: UploadPolicy) -> Result<Self, SessionError> {
        if !page.can_upload() {
            return Err(SessionError::Forbidden {
                page: page.as_str(),
                action: "upload",
            });
        }
        Ok(Self {
            programme: String::new(),
            product_category: String::new(),
            subsystem: String::new(),
            product: String::new(),
            files: Vec::new(),
            added_programmes: Vec::new(),
            dialog: AddProgrammeDialog::Closed,
            policy,
        })
    }

    pub fn set_field(&mut self, field: UploadField, value: impl Into<String>) {
        let slot = match field {
            UploadField::Programme => &mut self.programme,
            UploadField::ProductCategory => &mut self.product_category,
            UploadField::Subsystem => &mut self.subsystem,
            UploadField::Product => &mut self.product,
        };
        *slot = value.into();
    }

    /// Submit stays disabled until all four fields hold text.
    pub fn can_submit(&self) -> bool {
        [
            &self.programme,
            &self.product_category,
            &self.subsystem,
            &self.product,
        ]
        .iter()
        .all(|value| !value.trim().is_empty())
    }

    pub fn add_file(&mut self, file: UploadFile) -> Result<(), SessionError> {
        self.policy.check_file(&file)?;
        self.files.push(file);
        Ok(())
    }

    /// Removes the `index`-th file of `category`.
    pub fn remove_file(&mut self, category: UploadCategory, index: usize) -> Option<UploadFile> {
        let position = self
            .files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.category == category)
            .nth(index)
            .map(|(position, _)| position)?;
        Some(self.files.remove(position))
    }

    pub fn files(&self, category: UploadCategory) -> impl Iterator<Item = &UploadFile> {
        self.files.iter().filter(move |file| file.category == category)
    }

    pub fn added_programmes(&self) -> &[String] {
        &self.added_programmes
    }

    pub fn dialog(&self) -> &AddProgrammeDialog {
        &self.dialog
    }

    /// Opens the confirmation dialog for a non-blank name.
    pub fn request_add_programme(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyProgramme);
        }
        self.dialog = AddProgrammeDialog::Confirming {
            name: name.to_owned(),
        };
        Ok(())
    }

    pub fn cancel_add_programme(&mut self) {
        self.dialog = AddProgrammeDialog::Closed;
    }

    /// Confirms the open dialog. Returns the added name, or `None` when no dialog was open.
    pub fn confirm_add_programme(&mut self, notifier: &dyn Notifier) -> Option<String> {
        let AddProgrammeDialog::Confirming { name } = std::mem::take(&mut self.dialog) else {
            return None;
        };
        notifier.notify(Notification::programme_added(&name));
        self.added_programmes.push(name.clone());
        Some(name)
    }

    pub fn build_request(&self) -> Result<UploadRequest, SessionError> {
        let request = UploadRequest {
            programme: self.programme.trim().to_owned(),
            product_category: self.product_category.trim().to_owned(),
            subsystem: self.subsystem.trim().to_owned(),
            product: self.product.trim().to_owned(),
            files: self.files.clone(),
        };
        self.policy.check_request(&request)?;
        Ok(request)
    }

    pub async fn submit(
        &self,
        gateway: &dyn PersistenceGateway,
        notifier: &dyn Notifier,
    ) -> Result<UploadReceipt, SessionError> {
        let request = self.build_request()?;
        let receipt = gateway.upload_files(&request).await?;
        if !receipt.success {
            return Err(GatewayError::Rejected("upload").into());
        }

        tracing::info!(
            programme = %request.programme,
            files = receipt.files.len(),
            "files uploaded"
        );
        notifier.notify(Notification::files_uploaded());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use dfmea_gateway::{IndexStatus, MockGateway, UploadError};

    use super::*;
    use crate::CollectingNotifier;

    fn filled_form() -> UploadForm {
        let mut form =
            UploadForm::new(PageVariant::Admin, UploadPolicy::default()).expect("admin form");
        form.set_field(UploadField::Programme, "P1");
        form.set_field(UploadField::ProductCategory, "Body");
        form.set_field(UploadField::Subsystem, "Housing");
        form.set_field(UploadField::Product, "Case");
        form
    }

    #[test]
    fn only_admin_gets_an_upload_form() {
        assert!(matches!(
            UploadForm::new(PageVariant::Engineer, UploadPolicy::default()),
            Err(SessionError::Forbidden {
                action: "upload",
                ..
            })
        ));
    }

    #[test]
    fn add_programme_dialog_confirms_and_cancels() {
        let mut form = filled_form();
        let notifier = CollectingNotifier::default();

        assert_eq!(
            form.request_add_programme("   "),
            Err(ValidationError::EmptyProgramme)
        );
        assert_eq!(form.dialog(), &AddProgrammeDialog::Closed);

        form.request_add_programme(" TC58 ").expect("open dialog");
        form.cancel_add_programme();
        assert_eq!(form.confirm_add_programme(&notifier), None);

        form.request_add_programme("TC58").expect("open dialog");
        assert_eq!(
            form.confirm_add_programme(&notifier).as_deref(),
            Some("TC58")
        );
        assert_eq!(form.dialog(), &AddProgrammeDialog::Closed);
        assert_eq!(form.added_programmes(), ["TC58".to_owned()]);
        assert_eq!(
            notifier.take(),
            vec![Notification::programme_added("TC58")]
        );
    }

    #[test]
    fn files_are_checked_and_removed_per_category() {
        let mut form = filled_form();

        form.add_file(UploadFile::new(UploadCategory::Prd, "a.pdf", vec![1]))
            .expect("pdf");
        form.add_file(UploadFile::new(UploadCategory::Prd, "b.txt", vec![2]))
            .expect("txt");
        let err = form
            .add_file(UploadFile::new(UploadCategory::KnowledgeBase, "c.png", vec![3]))
            .expect_err("png");
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::Upload(UploadError::DisallowedType { .. }))
        ));

        let removed = form.remove_file(UploadCategory::Prd, 1).expect("second prd");
        assert_eq!(removed.file_name, "b.txt");
        assert_eq!(form.files(UploadCategory::Prd).count(), 1);
        assert!(form.remove_file(UploadCategory::FieldRepair, 0).is_none());
    }

    #[tokio::test]
    async fn submit_requires_all_fields_and_notifies() {
        let gateway = MockGateway::default();
        let notifier = CollectingNotifier::default();
        let mut form = filled_form();
        form.add_file(UploadFile::new(UploadCategory::FieldRepair, "r.csv", b"x".to_vec()))
            .expect("csv");

        form.set_field(UploadField::Product, "");
        assert!(!form.can_submit());
        assert!(form.submit(&gateway, &notifier).await.is_err());
        assert!(notifier.take().is_empty());

        form.set_field(UploadField::Product, "Case");
        let receipt = form.submit(&gateway, &notifier).await.expect("upload");

        assert_eq!(receipt.files[0].status, IndexStatus::Processing);
        assert_eq!(notifier.take(), vec![Notification::files_uploaded()]);
        let uploads = gateway.uploads().expect("uploads");
        assert_eq!(uploads[0].programme, "P1");
    }
}

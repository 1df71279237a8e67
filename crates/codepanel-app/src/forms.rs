// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::SyncError;
use crate::model::{Field, FormProfile, RowFields};

/// Raw text bound to the add form or the edit modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowForm {
    pub codes: String,
    pub url_name: String,
    pub color_id: String,
}

impl RowForm {
    pub fn blank(default_color: &str) -> Self {
        Self {
            codes: String::new(),
            url_name: String::new(),
            color_id: default_color.to_owned(),
        }
    }

    /// Seeds the edit modal. Missing fields stay empty so an untouched form
    /// diffs clean against the row.
    pub fn from_fields(fields: &RowFields) -> Self {
        Self {
            codes: fields.codes.clone(),
            url_name: fields.url_name.clone().unwrap_or_default(),
            color_id: fields.color_id.clone().unwrap_or_default(),
        }
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Codes => &self.codes,
            Field::UrlName => &self.url_name,
            Field::ColorId => &self.color_id,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Codes => self.codes = value,
            Field::UrlName => self.url_name = value,
            Field::ColorId => self.color_id = value,
        }
    }

    /// Checks required fields and returns the row to send. Fields outside the
    /// profile are dropped.
    pub fn validate(&self, profile: FormProfile) -> Result<RowFields, SyncError> {
        for field in profile.fields() {
            if profile.requires(*field) && self.value(*field).trim().is_empty() {
                return Err(SyncError::validation(format!(
                    "{} is required -- enter a {} and retry",
                    field.label(),
                    field.label()
                )));
            }
        }

        let mut fields = RowFields::new(self.codes.clone());
        for field in profile.fields() {
            if *field != Field::Codes {
                fields.set(*field, self.value(*field).to_owned());
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::RowForm;
    use crate::error::SyncError;
    use crate::model::{DEFAULT_COLOR, Field, FormProfile, RowFields};

    #[test]
    fn blank_form_starts_with_default_color() {
        let form = RowForm::blank(DEFAULT_COLOR);
        assert!(form.codes.is_empty());
        assert_eq!(form.color_id, "#ffffff");
    }

    #[test]
    fn empty_code_is_rejected() {
        let form = RowForm::blank(DEFAULT_COLOR);
        let error = form
            .validate(FormProfile::Simple)
            .expect_err("empty code should fail");
        assert!(matches!(error, SyncError::Validation(_)));
        assert!(error.to_string().contains("code is required"));
    }

    #[test]
    fn whitespace_only_code_is_rejected() {
        let mut form = RowForm::blank(DEFAULT_COLOR);
        form.set(Field::Codes, "   ".to_owned());
        assert!(form.validate(FormProfile::Simple).is_err());
    }

    #[test]
    fn rich_profile_requires_url_name() {
        let mut form = RowForm::blank(DEFAULT_COLOR);
        form.set(Field::Codes, "ABC".to_owned());
        let error = form
            .validate(FormProfile::Rich)
            .expect_err("missing URL name should fail");
        assert!(error.to_string().contains("URL name is required"));

        form.set(Field::UrlName, "Landing".to_owned());
        let fields = form.validate(FormProfile::Rich).expect("form should validate");
        assert_eq!(
            fields,
            RowFields::new("ABC")
                .with_url_name("Landing")
                .with_color("#ffffff")
        );
    }

    #[test]
    fn simple_profile_sends_only_the_code() {
        let mut form = RowForm::blank(DEFAULT_COLOR);
        form.set(Field::Codes, "ABC".to_owned());
        form.set(Field::UrlName, "ignored".to_owned());
        let fields = form.validate(FormProfile::Simple).expect("form should validate");
        assert_eq!(fields, RowFields::new("ABC"));
    }

    #[test]
    fn from_fields_leaves_missing_color_empty() {
        let form = RowForm::from_fields(&RowFields::new("ABC").with_url_name("x"));
        assert_eq!(form.value(Field::UrlName), "x");
        assert_eq!(form.value(Field::ColorId), "");
    }
}

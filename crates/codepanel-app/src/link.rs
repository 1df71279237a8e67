// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::Url;

use crate::error::SyncError;
use crate::model::RowFields;

pub const DEFAULT_LINK_BASE: &str = "https://us-now.vercel.app";

/// Builds `{base}/{UrlName without whitespace}?groupid={Codes}`.
///
/// Both values are percent-encoded by `url`, so reserved characters stay
/// inside their component.
pub fn landing_link(base: &str, fields: &RowFields) -> Result<Url, SyncError> {
    let slug: String = fields
        .url_name
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    if slug.is_empty() {
        return Err(SyncError::validation(format!(
            "code {:?} has no URL name -- edit the row and add one",
            fields.codes
        )));
    }

    let mut url = Url::parse(base).map_err(|error| {
        SyncError::validation(format!("link base {base:?} is not a valid URL: {error}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| SyncError::validation(format!("link base {base:?} cannot take a path")))?
        .pop_if_empty()
        .push(&slug);
    url.set_query(None);
    url.query_pairs_mut().append_pair("groupid", &fields.codes);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_LINK_BASE, landing_link};
    use crate::model::RowFields;

    #[test]
    fn strips_whitespace_from_url_name() {
        let fields = RowFields::new("ABC").with_url_name("My Link");
        let url = landing_link(DEFAULT_LINK_BASE, &fields).expect("link should build");
        assert_eq!(url.as_str(), "https://us-now.vercel.app/MyLink?groupid=ABC");
    }

    #[test]
    fn keeps_base_path_prefix() {
        let fields = RowFields::new("7").with_url_name("promo\tpage");
        let url = landing_link("https://example.com/landing/", &fields).expect("link builds");
        assert_eq!(url.as_str(), "https://example.com/landing/promopage?groupid=7");
    }

    #[test]
    fn reserved_characters_stay_inside_their_component() {
        let fields = RowFields::new("A&B=C").with_url_name("a/b?c");
        let url = landing_link(DEFAULT_LINK_BASE, &fields).expect("link should build");
        assert_eq!(url.path(), "/a%2Fb%3Fc");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("groupid".to_owned(), "A&B=C".to_owned())]);
    }

    #[test]
    fn missing_url_name_is_a_validation_error() {
        let error = landing_link(DEFAULT_LINK_BASE, &RowFields::new("ABC"))
            .expect_err("link without URL name should fail");
        assert!(error.to_string().contains("has no URL name"));
    }

    #[test]
    fn invalid_base_is_reported() {
        let fields = RowFields::new("ABC").with_url_name("x");
        assert!(landing_link("not a url", &fields).is_err());
        assert!(landing_link("mailto:someone@example.com", &fields).is_err());
    }
}

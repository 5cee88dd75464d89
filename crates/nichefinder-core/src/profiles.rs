//! Page profiles: what to wait for, what to dismiss, and which selectors
//! feed each record field for a given page type.
//!
//! Profiles are configured once per page type and never mutated during a
//! run. Built-in defaults target the storefront's product, site-directory and
//! search-results pages; a YAML file can replace them (see
//! `config/profiles.yaml`).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How the value of a field is pulled out of a matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractRule {
    /// The element's visible text.
    #[default]
    Text,
    /// The value of a named attribute (e.g. `href`).
    Attribute { name: String },
    /// The first capture group of a regex applied to the element's text.
    Pattern { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub selector: String,
    #[serde(default)]
    pub rule: ExtractRule,
}

impl FieldSelector {
    #[must_use]
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_owned(),
            rule: ExtractRule::Text,
        }
    }

    #[must_use]
    pub fn attribute(selector: &str, name: &str) -> Self {
        Self {
            selector: selector.to_owned(),
            rule: ExtractRule::Attribute {
                name: name.to_owned(),
            },
        }
    }
}

/// Best-seller rank lookup: scan every `candidates` element for one whose
/// text contains `marker`, then capture digits with `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSelector {
    pub candidates: String,
    pub marker: String,
    pub pattern: String,
}

/// Field name → selector mapping for one page type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSelectorConfig {
    Product {
        title: FieldSelector,
        price: FieldSelector,
        /// When `false`, an absent or unparsable price becomes `0`.
        #[serde(default = "default_true")]
        price_required: bool,
        review_count: FieldSelector,
        #[serde(default)]
        rank: Option<RankSelector>,
    },
    CategoryLinks {
        link: FieldSelector,
    },
}

impl FieldSelectorConfig {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FieldSelectorConfig::Product { .. } => "product",
            FieldSelectorConfig::CategoryLinks { .. } => "category_links",
        }
    }
}

/// The element whose visibility gates extraction, and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReadinessSpec {
    pub selector: String,
    /// Overrides the configured readiness timeout for this page type.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A consent banner's dismiss control. Its absence is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSpec {
    pub dismiss_selector: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProfile {
    pub name: String,
    pub readiness: PageReadinessSpec,
    #[serde(default)]
    pub consent: Option<ConsentSpec>,
    /// Selectors whose presence after a readiness timeout suggests a robot check.
    #[serde(default)]
    pub captcha_markers: Vec<String>,
    pub fields: FieldSelectorConfig,
}

impl PageProfile {
    /// Returns a copy with the product price requirement set. Category-link
    /// profiles are returned unchanged.
    #[must_use]
    pub fn with_price_required(mut self, required: bool) -> Self {
        if let FieldSelectorConfig::Product { price_required, .. } = &mut self.fields {
            *price_required = required;
        }
        self
    }
}

/// The three page types the pipelines visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profiles {
    pub product: PageProfile,
    pub category_directory: PageProfile,
    pub search_results: PageProfile,
}

const CONSENT_SELECTOR: &str = "#sp-cc-accept";
const SEARCH_RESULT_LINK: &str =
    "a.a-link-normal.s-underline-text.s-underline-link-text.s-link-style.a-text-normal";

fn default_captcha_markers() -> Vec<String> {
    vec![
        "form[action*='validateCaptcha']".to_owned(),
        "#captchacharacters".to_owned(),
    ]
}

impl Default for Profiles {
    fn default() -> Self {
        let consent = Some(ConsentSpec {
            dismiss_selector: CONSENT_SELECTOR.to_owned(),
            timeout_secs: None,
        });

        Self {
            product: PageProfile {
                name: "product".to_owned(),
                readiness: PageReadinessSpec {
                    selector: "#productTitle".to_owned(),
                    timeout_secs: None,
                },
                consent: consent.clone(),
                captcha_markers: default_captcha_markers(),
                fields: FieldSelectorConfig::Product {
                    title: FieldSelector::text("#productTitle"),
                    price: FieldSelector::text("span.a-price-whole"),
                    price_required: true,
                    review_count: FieldSelector::text("#acrCustomerReviewText"),
                    rank: Some(RankSelector {
                        candidates: "#detailBullets_feature_div .a-list-item, \
                                     #productDetails_detailBullets_sections1 .a-list-item"
                            .to_owned(),
                        marker: "Best Sellers Rank".to_owned(),
                        pattern: r"#([\d,]+)".to_owned(),
                    }),
                },
            },
            category_directory: PageProfile {
                name: "category_directory".to_owned(),
                readiness: PageReadinessSpec {
                    selector: "div.fsdDeptCol a".to_owned(),
                    timeout_secs: None,
                },
                consent: consent.clone(),
                captcha_markers: default_captcha_markers(),
                fields: FieldSelectorConfig::CategoryLinks {
                    link: FieldSelector::attribute("div.fsdDeptCol a", "href"),
                },
            },
            search_results: PageProfile {
                name: "search_results".to_owned(),
                readiness: PageReadinessSpec {
                    selector: SEARCH_RESULT_LINK.to_owned(),
                    timeout_secs: None,
                },
                consent,
                captcha_markers: default_captcha_markers(),
                fields: FieldSelectorConfig::CategoryLinks {
                    link: FieldSelector::attribute(SEARCH_RESULT_LINK, "href"),
                },
            },
        }
    }
}

fn default_true() -> bool {
    true
}

/// Load and validate page profiles from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_profiles(path: &Path) -> Result<Profiles, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfilesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let profiles: Profiles = serde_yaml::from_str(&content)?;

    validate_profiles(&profiles)?;

    Ok(profiles)
}

fn validate_profiles(profiles: &Profiles) -> Result<(), ConfigError> {
    let expectations = [
        (&profiles.product, "product"),
        (&profiles.category_directory, "category_links"),
        (&profiles.search_results, "category_links"),
    ];

    let mut seen_names = HashSet::new();
    for (profile, expected_kind) in expectations {
        if !seen_names.insert(profile.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate profile name: '{}'",
                profile.name
            )));
        }
        if profile.fields.kind() != expected_kind {
            return Err(ConfigError::Validation(format!(
                "profile '{}' must define {expected_kind} fields, found {}",
                profile.name,
                profile.fields.kind()
            )));
        }
        validate_profile(profile)?;
    }

    Ok(())
}

fn validate_profile(profile: &PageProfile) -> Result<(), ConfigError> {
    let require = |what: &str, value: &str| -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            Err(ConfigError::Validation(format!(
                "profile '{}' has an empty {what}",
                profile.name
            )))
        } else {
            Ok(())
        }
    };

    require("name", &profile.name)?;
    require("readiness selector", &profile.readiness.selector)?;
    if profile.readiness.timeout_secs == Some(0) {
        return Err(ConfigError::Validation(format!(
            "profile '{}' has a zero readiness timeout",
            profile.name
        )));
    }
    if let Some(consent) = &profile.consent {
        require("consent selector", &consent.dismiss_selector)?;
    }
    for marker in &profile.captcha_markers {
        require("captcha marker", marker)?;
    }

    match &profile.fields {
        FieldSelectorConfig::Product {
            title,
            price,
            review_count,
            rank,
            ..
        } => {
            require("title selector", &title.selector)?;
            require("price selector", &price.selector)?;
            require("review_count selector", &review_count.selector)?;
            if let Some(rank) = rank {
                require("rank candidates selector", &rank.candidates)?;
                require("rank marker", &rank.marker)?;
                require("rank pattern", &rank.pattern)?;
            }
        }
        FieldSelectorConfig::CategoryLinks { link } => {
            require("link selector", &link.selector)?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;

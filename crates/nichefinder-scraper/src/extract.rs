//! Field extraction from a rendered page.
//!
//! Call only after navigation reported [`crate::NavigationOutcome::Ready`].
//! Extraction reads the page and never mutates it, so running it twice
//! against an unchanged page yields identical records.

use nichefinder_core::{
    CategoryRecord, ExtractRule, FieldSelector, FieldSelectorConfig, PageProfile, ProductRecord,
};
use regex::Regex;
use rust_decimal::Decimal;

use crate::backend::{ElementHandle, RenderBackend};
use crate::diagnostics::DiagnosticSink;
use crate::error::{BackendError, ScraperError};
use crate::parse::{capture_first, parse_price, parse_rank, parse_review_count};
use crate::types::{ExtractionFailure, ExtractionResult, FailureKind, PageRecords};

#[derive(Debug)]
enum CompiledRule {
    Text,
    Attribute(String),
    Pattern(Regex),
}

#[derive(Debug)]
struct CompiledField {
    selector: String,
    rule: CompiledRule,
}

impl CompiledField {
    fn compile(field: &'static str, selector: &FieldSelector) -> Result<Self, ScraperError> {
        let rule = match &selector.rule {
            ExtractRule::Text => CompiledRule::Text,
            ExtractRule::Attribute { name } => CompiledRule::Attribute(name.clone()),
            ExtractRule::Pattern { pattern } => CompiledRule::Pattern(compile_pattern(field, pattern)?),
        };
        Ok(Self {
            selector: selector.selector.clone(),
            rule,
        })
    }

    /// Value of this field on `element` per its rule. `None` when the
    /// attribute is unset or the pattern does not match.
    async fn value_of<E: ElementHandle>(&self, element: &E) -> Result<Option<String>, BackendError> {
        match &self.rule {
            CompiledRule::Text => element.text().await.map(Some),
            CompiledRule::Attribute(name) => element.attribute(name).await,
            CompiledRule::Pattern(re) => {
                let text = element.text().await?;
                Ok(capture_first(&text, re))
            }
        }
    }
}

#[derive(Debug)]
struct CompiledRank {
    candidates: String,
    marker: String,
    pattern: Regex,
}

#[derive(Debug)]
enum CompiledFields {
    Product {
        title: CompiledField,
        price: CompiledField,
        price_required: bool,
        review_count: CompiledField,
        rank: Option<CompiledRank>,
    },
    CategoryLinks {
        link: CompiledField,
    },
}

fn compile_pattern(field: &'static str, pattern: &str) -> Result<Regex, ScraperError> {
    let re = Regex::new(pattern).map_err(|source| ScraperError::InvalidPattern { field, source })?;
    if re.captures_len() < 2 {
        return Err(ScraperError::PatternWithoutCapture {
            field,
            pattern: pattern.to_owned(),
        });
    }
    Ok(re)
}

/// Applies one page profile's field selectors to the current page.
///
/// Patterns are compiled once at construction; an invalid pattern is a
/// configuration error, reported before any page is visited.
#[derive(Debug)]
pub struct Extractor {
    profile: String,
    fields: CompiledFields,
}

impl Extractor {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidPattern`] if a pattern rule does not
    /// compile, or [`ScraperError::PatternWithoutCapture`] if it has no
    /// capture group.
    pub fn new(profile: &PageProfile) -> Result<Self, ScraperError> {
        let fields = match &profile.fields {
            FieldSelectorConfig::Product {
                title,
                price,
                price_required,
                review_count,
                rank,
            } => CompiledFields::Product {
                title: CompiledField::compile("title", title)?,
                price: CompiledField::compile("price", price)?,
                price_required: *price_required,
                review_count: CompiledField::compile("review_count", review_count)?,
                rank: rank
                    .as_ref()
                    .map(|r| {
                        Ok::<_, ScraperError>(CompiledRank {
                            candidates: r.candidates.clone(),
                            marker: r.marker.clone(),
                            pattern: compile_pattern("rank", &r.pattern)?,
                        })
                    })
                    .transpose()?,
            },
            FieldSelectorConfig::CategoryLinks { link } => CompiledFields::CategoryLinks {
                link: CompiledField::compile("category_link", link)?,
            },
        };

        Ok(Self {
            profile: profile.name.clone(),
            fields,
        })
    }

    /// Like [`Extractor::new`], but requires `profile` to carry `expected`
    /// fields (`"product"` or `"category_links"`).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ProfileMismatch`] on a kind mismatch, or any
    /// error from [`Extractor::new`].
    pub fn expecting(profile: &PageProfile, expected: &'static str) -> Result<Self, ScraperError> {
        let found = profile.fields.kind();
        if found != expected {
            return Err(ScraperError::ProfileMismatch {
                profile: profile.name.clone(),
                expected,
                found,
            });
        }
        Self::new(profile)
    }

    #[must_use]
    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    /// Extracts records from the page currently loaded in `backend`.
    ///
    /// `page_url` is recorded as the product's source and used to resolve
    /// relative links. Backend errors capture a snapshot through
    /// `diagnostics` and fail the page with [`FailureKind::BackendError`].
    pub async fn extract<B: RenderBackend>(
        &self,
        backend: &B,
        page_url: &str,
        diagnostics: &DiagnosticSink,
    ) -> ExtractionResult {
        let result = match &self.fields {
            CompiledFields::Product {
                title,
                price,
                price_required,
                review_count,
                rank,
            } => {
                extract_product(
                    backend,
                    page_url,
                    title,
                    price,
                    *price_required,
                    review_count,
                    rank.as_ref(),
                )
                .await
            }
            CompiledFields::CategoryLinks { link } => extract_links(backend, page_url, link).await,
        };

        match result {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(failure)) => Err(failure),
            Err(e) => {
                let snapshot = diagnostics
                    .capture(backend, page_url, FailureKind::BackendError)
                    .await;
                let mut failure = ExtractionFailure::new(FailureKind::BackendError, e.to_string());
                failure.diagnostic.snapshot = snapshot;
                Err(failure)
            }
        }
    }
}

/// Reads one field from the first matching element.
async fn read_field<B: RenderBackend>(
    backend: &B,
    field: &CompiledField,
) -> Result<Option<String>, BackendError> {
    match backend.find_element(&field.selector).await? {
        Some(element) => field.value_of(&element).await,
        None => Ok(None),
    }
}

/// Outer `Err` is a backend malfunction; inner `Err` is a page-level failure.
type FieldOutcome<T> = Result<Result<T, ExtractionFailure>, BackendError>;

async fn extract_product<B: RenderBackend>(
    backend: &B,
    page_url: &str,
    title_field: &CompiledField,
    price_field: &CompiledField,
    price_required: bool,
    review_field: &CompiledField,
    rank_field: Option<&CompiledRank>,
) -> FieldOutcome<PageRecords> {
    let title = read_field(backend, title_field).await?.unwrap_or_default();
    let title = title.trim();
    if title.is_empty() {
        return Ok(Err(ExtractionFailure::new(
            FailureKind::MissingRequiredField,
            format!("title \"{}\" absent or empty", title_field.selector),
        )));
    }

    let price_text = read_field(backend, price_field).await?;
    let price = match price_text.as_deref().and_then(parse_price) {
        Some(price) => price,
        None if price_required => {
            let detail = match &price_text {
                Some(text) => format!("price text \"{}\" is not a number", text.trim()),
                None => format!("price \"{}\" absent", price_field.selector),
            };
            return Ok(Err(ExtractionFailure::new(FailureKind::ParseError, detail)));
        }
        None => {
            tracing::debug!(url = page_url, "price absent or unparsable; recording 0");
            Decimal::ZERO
        }
    };

    let review_count = match read_field(backend, review_field).await? {
        Some(text) => parse_review_count(&text).unwrap_or_else(|| {
            tracing::debug!(url = page_url, text = %text.trim(), "review count unparsable; recording 0");
            0
        }),
        None => 0,
    };

    let rank = match rank_field {
        Some(rank_field) => find_rank(backend, rank_field).await?,
        None => None,
    };

    Ok(ProductRecord::new(title, price, review_count, rank, page_url)
        .map(PageRecords::Product)
        .map_err(|e| ExtractionFailure::new(FailureKind::ParseError, e.to_string())))
}

/// First candidate line carrying the marker phrase decides the rank.
async fn find_rank<B: RenderBackend>(
    backend: &B,
    rank: &CompiledRank,
) -> Result<Option<u64>, BackendError> {
    for candidate in backend.find_all_elements(&rank.candidates).await? {
        let text = candidate.text().await?;
        if let Some(value) = parse_rank(&text, &rank.marker, &rank.pattern) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

async fn extract_links<B: RenderBackend>(
    backend: &B,
    page_url: &str,
    link: &CompiledField,
) -> FieldOutcome<PageRecords> {
    let elements = backend.find_all_elements(&link.selector).await?;
    let base = url::Url::parse(page_url).ok();
    let total = elements.len();
    let mut records = Vec::with_capacity(total);

    for (position, element) in elements.iter().enumerate() {
        let name = match element.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(url = page_url, position, error = %e, "could not read link text; skipping");
                continue;
            }
        };
        let raw_target = match link.value_of(element).await {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(url = page_url, position, error = %e, "could not read link target; skipping");
                continue;
            }
        };
        if name.trim().is_empty() || raw_target.trim().is_empty() {
            continue;
        }

        let Some(target) = resolve(base.as_ref(), raw_target.trim()) else {
            tracing::debug!(url = page_url, position, raw = %raw_target, "unresolvable link; skipping");
            continue;
        };

        match CategoryRecord::new(&name, &target) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!(url = page_url, position, error = %e, "invalid link; skipping");
            }
        }
    }

    tracing::debug!(url = page_url, found = total, kept = records.len(), "extracted links");
    Ok(Ok(PageRecords::Categories(records)))
}

fn resolve(base: Option<&url::Url>, raw: &str) -> Option<String> {
    match base {
        Some(base) => base.join(raw).ok().map(String::from),
        None => url::Url::parse(raw).ok().map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use nichefinder_core::Profiles;

    use super::*;

    #[test]
    fn resolve_joins_relative_links() {
        let base = url::Url::parse("https://shop.test/gp/site-directory").unwrap();
        assert_eq!(
            resolve(Some(&base), "/b?node=42").as_deref(),
            Some("https://shop.test/b?node=42")
        );
        assert_eq!(
            resolve(Some(&base), "https://other.test/x").as_deref(),
            Some("https://other.test/x")
        );
    }

    #[test]
    fn resolve_without_base_needs_absolute() {
        assert!(resolve(None, "/b?node=42").is_none());
        assert!(resolve(None, "https://shop.test/b").is_some());
    }

    #[test]
    fn default_profiles_compile() {
        let profiles = Profiles::default();
        assert!(Extractor::expecting(&profiles.product, "product").is_ok());
        assert!(Extractor::expecting(&profiles.category_directory, "category_links").is_ok());
        assert!(Extractor::expecting(&profiles.search_results, "category_links").is_ok());
    }

    #[test]
    fn expecting_rejects_wrong_kind() {
        let profiles = Profiles::default();
        let err = Extractor::expecting(&profiles.category_directory, "product").unwrap_err();
        assert!(matches!(err, ScraperError::ProfileMismatch { .. }));
    }

    #[test]
    fn invalid_rank_pattern_is_a_config_error() {
        let mut profile = Profiles::default().product;
        if let FieldSelectorConfig::Product { rank: Some(rank), .. } = &mut profile.fields {
            rank.pattern = "#([".to_owned();
        }
        let err = Extractor::new(&profile).unwrap_err();
        assert!(matches!(err, ScraperError::InvalidPattern { field: "rank", .. }));
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let mut profile = Profiles::default().product;
        if let FieldSelectorConfig::Product { price, .. } = &mut profile.fields {
            price.rule = ExtractRule::Pattern {
                pattern: r"\d+".to_owned(),
            };
        }
        let err = Extractor::new(&profile).unwrap_err();
        assert!(matches!(
            err,
            ScraperError::PatternWithoutCapture { field: "price", .. }
        ));
    }
}

//! End-to-end runs: launch a browser, drive batches through it, write tables.

use std::path::Path;

use anyhow::Context as _;

use nichefinder_core::{AppConfig, FilterCriteria, PageProfile, Profiles};
use nichefinder_scraper::{
    with_session, BatchReport, BatchRunner, ChromiumBackend, ChromiumOptions, DiagnosticSink,
    Extractor, IntervalPacer, NavigationTimings, RenderBackend, RetryPolicy,
};

use crate::output::{self, CategoryRow, NicheRow, ProductRow};
use crate::targets;

/// Settings shared by every command.
pub(crate) struct Context {
    pub config: AppConfig,
    pub profiles: Profiles,
}

async fn launch(config: &AppConfig) -> anyhow::Result<ChromiumBackend> {
    let options = ChromiumOptions::from_app_config(config);
    tracing::info!(headless = options.headless, "launching browser");
    ChromiumBackend::launch(&options)
        .await
        .context("failed to launch browser")
}

fn runner<'a, B: RenderBackend>(
    backend: &'a B,
    config: &AppConfig,
) -> BatchRunner<'a, B, IntervalPacer> {
    BatchRunner::new(backend)
        .with_timings(NavigationTimings::from_app_config(config))
        .with_diagnostics(DiagnosticSink::new(config.diagnostics_dir.clone()))
        .with_retry(RetryPolicy::from_app_config(config))
        .with_pacer(IntervalPacer::new(config.inter_target_delay()))
}

/// Rejects a profile whose fields are not of the `expected` kind before any
/// browser is launched.
fn check_profile(profile: &PageProfile, expected: &'static str) -> anyhow::Result<()> {
    Extractor::expecting(profile, expected)
        .with_context(|| format!("page profile '{}' is unusable", profile.name))?;
    Ok(())
}

fn log_report(stage: &str, report: &BatchReport) {
    tracing::info!(
        stage,
        attempted = report.attempted,
        succeeded = report.succeeded(),
        failed = report.failed(),
        records = report.records.len(),
        "stage finished"
    );
}

fn ensure_targets(targets: &[String]) -> anyhow::Result<()> {
    anyhow::ensure!(
        !targets.is_empty(),
        "no targets given; pass --url or --urls-file"
    );
    Ok(())
}

/// Product pages to a product table. A missing price is recorded as `0`.
pub(crate) async fn run_products(
    ctx: &Context,
    targets: Vec<String>,
    out: &Path,
) -> anyhow::Result<()> {
    ensure_targets(&targets)?;
    let profile = ctx.profiles.product.clone().with_price_required(false);
    check_profile(&profile, "product")?;
    let config = ctx.config.clone();
    let backend = launch(&ctx.config).await?;

    let report = with_session(backend, move |b| {
        Box::pin(async move { runner(b, &config).run_batch(&targets, &profile).await })
    })
    .await?;
    log_report("products", &report);

    let products = report.into_products();
    let rows: Vec<ProductRow<'_>> = products.iter().map(ProductRow::from).collect();
    output::write_table(out, &rows)?;
    Ok(())
}

/// Directory pages to a category table.
pub(crate) async fn run_categories(
    ctx: &Context,
    targets: Vec<String>,
    out: &Path,
) -> anyhow::Result<()> {
    ensure_targets(&targets)?;
    let profile = ctx.profiles.category_directory.clone();
    check_profile(&profile, "category_links")?;
    let config = ctx.config.clone();
    let backend = launch(&ctx.config).await?;

    let report = with_session(backend, move |b| {
        Box::pin(async move { runner(b, &config).run_batch(&targets, &profile).await })
    })
    .await?;
    log_report("categories", &report);

    let categories = report.into_categories();
    let rows: Vec<CategoryRow<'_>> = categories.iter().map(CategoryRow::from).collect();
    output::write_table(out, &rows)?;
    Ok(())
}

/// Search pages to product links, product pages to records, records to a
/// ranked opportunity table. Products without a usable price are dropped.
pub(crate) async fn run_niche(
    ctx: &Context,
    targets: Vec<String>,
    criteria: &FilterCriteria,
    max_products: Option<usize>,
    out: &Path,
) -> anyhow::Result<()> {
    ensure_targets(&targets)?;
    let search_profile = ctx.profiles.search_results.clone();
    let product_profile = ctx.profiles.product.clone().with_price_required(true);
    check_profile(&search_profile, "category_links")?;
    check_profile(&product_profile, "product")?;
    let config = ctx.config.clone();
    let backend = launch(&ctx.config).await?;

    let report = with_session(backend, move |b| {
        Box::pin(async move {
            let mut batches = runner(b, &config);

            let harvest = batches.run_batch(&targets, &search_profile).await?;
            log_report("search", &harvest);

            let mut links = targets::dedupe(
                harvest
                    .into_categories()
                    .into_iter()
                    .map(|link| link.target_url().to_owned()),
            );
            if let Some(max) = max_products {
                links.truncate(max);
            }
            tracing::info!(products = links.len(), "harvested product links");

            batches.run_batch(&links, &product_profile).await
        })
    })
    .await?;
    log_report("products", &report);

    let scored = nichefinder_scorer::score(&report.into_products(), criteria);
    let summary = nichefinder_scorer::summarize(&scored);
    match &summary.best {
        Some((title, score)) => tracing::info!(
            total = summary.total,
            meeting_criteria = summary.meeting_criteria,
            unranked = summary.unranked,
            best = %title,
            best_score = score,
            "niche analysis complete"
        ),
        None => tracing::info!(
            total = summary.total,
            meeting_criteria = summary.meeting_criteria,
            unranked = summary.unranked,
            "niche analysis complete; no product meets the criteria"
        ),
    }

    let rows: Vec<NicheRow<'_>> = scored.iter().map(NicheRow::from).collect();
    output::write_table(out, &rows)?;
    Ok(())
}

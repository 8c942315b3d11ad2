//! # Pack Subcommands
//!
//! `install`, `update`, `uninstall`, `verify` and `list`. Each handler
//! prints a short human-readable summary and returns the process exit code.

use anyhow::{Context, Result};
use packreg_core::PackSlug;
use packreg_install::{FileStatus, InstallReport, Installer, LicenseStatus, VerifyReport};

use crate::EXIT_VERIFY_FAILED;

fn parse_slug(raw: &str) -> Result<PackSlug> {
    PackSlug::parse(raw).with_context(|| format!("invalid pack slug '{raw}'"))
}

pub async fn run_install(installer: &Installer, slug: &str, version: Option<&str>) -> Result<u8> {
    let slug = parse_slug(slug)?;
    let report = installer
        .install(&slug, version)
        .await
        .with_context(|| format!("install of '{slug}' failed"))?;
    print_report("installed", &report);
    Ok(0)
}

pub async fn run_update(
    installer: &Installer,
    slug: &str,
    version: Option<&str>,
    force: bool,
) -> Result<u8> {
    let slug = parse_slug(slug)?;
    let report = installer
        .update(&slug, version, force)
        .await
        .with_context(|| format!("update of '{slug}' failed"))?;
    print_report("updated", &report);
    for path in &report.removed {
        println!("  removed  {path}");
    }
    Ok(0)
}

pub async fn run_uninstall(installer: &Installer, slug: &str) -> Result<u8> {
    let slug = parse_slug(slug)?;
    let removed = installer
        .uninstall(&slug)
        .await
        .with_context(|| format!("uninstall of '{slug}' failed"))?;
    println!("uninstalled {slug} ({} files)", removed.len());
    Ok(0)
}

pub async fn run_verify(installer: &Installer, slug: Option<&str>) -> Result<u8> {
    let slug = slug.map(parse_slug).transpose()?;
    let reports = installer.verify(slug.as_ref()).await.context("verify failed")?;
    if reports.is_empty() {
        println!("no packs installed");
        return Ok(0);
    }
    let mut failed = false;
    for report in &reports {
        print!("{}", render_verify(report));
        failed |= !report.is_ok();
    }
    Ok(if failed { EXIT_VERIFY_FAILED } else { 0 })
}

pub async fn run_list(installer: &Installer) -> Result<u8> {
    let packs = installer.list().await.context("list failed")?;
    if packs.is_empty() {
        println!("no packs installed");
        return Ok(0);
    }
    println!("{:<24} {:<12} {:<22} FILES", "PACK", "VERSION", "LICENSE EXPIRES");
    for p in &packs {
        let expires = p
            .license_expires_at
            .map(|t| t.to_iso8601())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<24} {:<12} {:<22} {}",
            p.pack.as_str(),
            p.version.to_string(),
            expires,
            p.artifacts
        );
    }
    Ok(0)
}

fn print_report(verb: &str, report: &InstallReport) {
    println!("{verb} {}@{}", report.pack, report.version);
    println!("  license expires {}", report.license_expires_at);
    println!("  watermark       {}", report.watermark);
    for path in &report.artifacts {
        println!("  wrote    {path}");
    }
}

fn status_label(status: &FileStatus) -> &'static str {
    match status {
        FileStatus::Intact => "ok",
        FileStatus::Modified { .. } => "modified",
        FileStatus::Unmarked => "unmarked",
        FileStatus::Missing => "missing",
    }
}

fn render_verify(report: &VerifyReport) -> String {
    let license = match &report.license {
        LicenseStatus::Valid { expires_at } => format!("license valid until {expires_at}"),
        LicenseStatus::Invalid { reason } => format!("license INVALID ({reason})"),
    };
    let mut out = format!(
        "{}@{}: {license}; {}/{} files intact\n",
        report.pack,
        report.version,
        report.files.iter().filter(|f| f.status.is_intact()).count(),
        report.files.len()
    );
    for file in report.problems() {
        out.push_str(&format!("  {:<9} {}\n", status_label(&file.status), file.path));
    }
    out
}

//! Validation report packaging
//!
//! The verbose validation report is written to a per-job scratch directory
//! and compressed into `downloads/jobs/<job id>.zip`. Failures never crash
//! the job; they are collected and logged as one error line.

use super::JobContext;
use archivist_common::config::RootLayout;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const REPORT_FILE_NAME: &str = "validation_results.txt";

/// Extensions non-administrators may download
const REPORT_EXTENSIONS: &[&str] = &["txt", "csv"];

#[derive(Debug, Clone)]
pub struct ReportPackager {
    root: PathBuf,
    tmp_dir: PathBuf,
}

impl ReportPackager {
    pub fn new(layout: &RootLayout) -> Self {
        Self {
            root: layout.root().to_path_buf(),
            tmp_dir: layout.jobs_tmp_dir(),
        }
    }

    /// Download path relative to the root folder
    pub fn relative_download_path(job_id: Uuid) -> String {
        format!("downloads/jobs/{}.zip", job_id)
    }

    pub fn download_path(&self, job_id: Uuid) -> PathBuf {
        self.root.join(Self::relative_download_path(job_id))
    }

    /// Resolve a stored relative download path against the root folder
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Package `verbose_report` for the job in `ctx`
    ///
    /// Records the relative download path on the job and returns it, or logs
    /// the collected failures and returns `None`.
    pub fn package(&self, ctx: &mut JobContext, verbose_report: &str) -> Option<String> {
        let job_id = ctx.job().id;
        let include_all = ctx.job().user.is_administrator;
        let work_dir = self.tmp_dir.join(job_id.to_string());
        let zip_path = self.download_path(job_id);

        let mut errors = Vec::new();
        if let Err(e) = std::fs::create_dir_all(&work_dir)
            .and_then(|_| std::fs::write(work_dir.join(REPORT_FILE_NAME), verbose_report))
        {
            errors.push(format!("Unable to write {}: {}", REPORT_FILE_NAME, e));
        }

        ctx.info("report.creating_zip", &[&zip_path.display()]);

        if errors.is_empty() {
            errors = create_zip(&work_dir, &zip_path, include_all);
        }

        if work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                tracing::warn!(job_id = %job_id, path = %work_dir.display(), error = %e, "Failed to remove job temp directory");
            }
        }

        if !errors.is_empty() {
            let message = format!("{} : {}", ctx.tr("report.zip_failed", &[]), errors.join(" : "));
            ctx.log(archivist_common::events::LogLevel::Error, message);
            return None;
        }

        let relative = Self::relative_download_path(job_id);
        ctx.job_mut().download_path = Some(relative.clone());
        Some(relative)
    }
}

fn is_report_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| REPORT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Compress the files of `dir` into `zip_path`, returning collected errors
///
/// Only report files are included unless `include_all` is set. A partial
/// archive is removed when anything went wrong.
fn create_zip(dir: &Path, zip_path: &Path, include_all: bool) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(parent) = zip_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            errors.push(format!("Unable to create {}: {}", parent.display(), e));
            return errors;
        }
    }

    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| include_all || is_report_file(path))
            .collect(),
        Err(e) => {
            errors.push(format!("Unable to read {}: {}", dir.display(), e));
            return errors;
        }
    };
    entries.sort();

    let file = match File::create(zip_path) {
        Ok(file) => file,
        Err(e) => {
            errors.push(format!("Unable to create {}: {}", zip_path.display(), e));
            return errors;
        }
    };

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &entries {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let added = File::open(path)
            .map_err(|e| e.to_string())
            .and_then(|source| {
                zip.start_file(name.clone(), options)
                    .map_err(|e| e.to_string())?;
                std::io::copy(&mut BufReader::new(source), &mut zip).map_err(|e| e.to_string())
            });
        if let Err(e) = added {
            errors.push(format!("Unable to add {}: {}", name, e));
        }
    }

    if let Err(e) = zip.finish() {
        errors.push(format!("Unable to finish {}: {}", zip_path.display(), e));
    }

    if !errors.is_empty() {
        let _ = std::fs::remove_file(zip_path);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobPayload, JobUser, UpdateDocumentsRequest};
    use archivist_common::events::EventBus;
    use archivist_common::i18n::Catalog;
    use std::io::Read;
    use std::sync::Arc;

    fn context(is_administrator: bool) -> JobContext {
        let job = Job::new(
            JobPayload::UpdateDocuments(UpdateDocumentsRequest {
                object_ids: vec![],
                term_id: None,
            }),
            JobUser {
                name: "archivist".to_string(),
                is_administrator,
            },
        );
        JobContext::new(job, EventBus::new(10), Arc::new(Catalog::english()))
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_package_writes_zip_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let packager = ReportPackager::new(&layout);
        let mut ctx = context(false);
        let job_id = ctx.job().id;

        let relative = packager.package(&mut ctx, "Row 3: unknown column\n").unwrap();
        assert_eq!(relative, format!("downloads/jobs/{}.zip", job_id));
        assert_eq!(ctx.job().download_path.as_deref(), Some(relative.as_str()));

        let zip_path = packager.resolve(&relative);
        assert_eq!(zip_names(&zip_path), vec![REPORT_FILE_NAME]);

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name(REPORT_FILE_NAME)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "Row 3: unknown column\n");

        // Scratch directory is gone
        assert!(!layout.jobs_tmp_dir().join(job_id.to_string()).exists());
        assert!(ctx.job().log_messages()[0].starts_with("Creating ZIP file "));
    }

    #[test]
    fn test_non_admin_archive_holds_report_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("validation_results.txt"), "report").unwrap();
        std::fs::write(dir.path().join("rows.csv"), "a,b").unwrap();
        std::fs::write(dir.path().join("trace.log"), "debug").unwrap();

        let user_zip = dir.path().join("out").join("user.zip");
        assert!(create_zip(dir.path(), &user_zip, false).is_empty());
        assert_eq!(zip_names(&user_zip), vec!["rows.csv", "validation_results.txt"]);

        let admin_zip = dir.path().join("out").join("admin.zip");
        assert!(create_zip(dir.path(), &admin_zip, true).is_empty());
        assert_eq!(zip_names(&admin_zip).len(), 3);
    }

    #[test]
    fn test_failure_is_logged_without_download_path() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the downloads directory should be
        std::fs::write(dir.path().join("downloads"), "").unwrap();
        let packager = ReportPackager::new(&RootLayout::new(dir.path()));
        let mut ctx = context(true);

        assert!(packager.package(&mut ctx, "report").is_none());
        assert!(ctx.job().download_path.is_none());

        let last = ctx.job().log.last().unwrap();
        assert_eq!(last.level, archivist_common::events::LogLevel::Error);
        assert!(last.message.starts_with("Failed to create ZIP file. : Unable to create "));
    }
}
